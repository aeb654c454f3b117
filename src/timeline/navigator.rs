use super::FeedState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Up,
    Down,
    PageUp,
    PageDown,
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error("nothing to navigate: feed is empty")]
    EmptyFeed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: usize,
    pub to: usize,
    /// Set when a downward move landed close enough to the tail that the
    /// next page should be requested.
    pub near_end: bool,
}

/// Moves the selection of `state` and reports whether a prefetch is due.
///
/// `page_size` is the current visible item count; `threshold` is how close to
/// the last item a downward move has to land to count as near the end.
pub fn navigate(
    state: &mut FeedState,
    nav: Navigation,
    page_size: usize,
    threshold: usize,
) -> Result<Transition, NavigationError> {
    let len = state.items.len();
    if len == 0 {
        return Err(NavigationError::EmptyFeed);
    }

    let last = len - 1;
    let from = state.selected_index.min(last);
    let page_size = page_size.max(1);
    let tail_start = len.saturating_sub(threshold);

    let (to, near_end) = match nav {
        Navigation::Up => (from.saturating_sub(1), false),
        Navigation::Down => {
            let to = (from + 1).min(last);
            (to, to != from && to >= tail_start)
        }
        Navigation::PageUp => (from.saturating_sub(page_size), false),
        Navigation::PageDown => {
            let to = from.saturating_add(page_size).min(last);
            (to, to >= tail_start)
        }
        Navigation::Top => {
            state.scroll_offset = 0;
            (0, false)
        }
        Navigation::Bottom => (last, true),
    };

    state.selected_index = to;
    Ok(Transition { from, to, near_end })
}
