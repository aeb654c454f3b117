//! Visible window over the feed.
//!
//! The window is measured in items, not rows: every item renders at a fixed
//! height, so the terminal height maps directly to a visible item count.

use super::{FeedState, Item};

pub const DEFAULT_ITEM_HEIGHT: u16 = 6;
pub const DEFAULT_RESERVED_ROWS: u16 = 8;
pub const DEFAULT_TERMINAL_HEIGHT: u16 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportGeometry {
    terminal_height: u16,
    item_height: u16,
    reserved_rows: u16,
}

impl Default for ViewportGeometry {
    fn default() -> Self {
        Self::new(
            DEFAULT_TERMINAL_HEIGHT,
            DEFAULT_ITEM_HEIGHT,
            DEFAULT_RESERVED_ROWS,
        )
    }
}

impl ViewportGeometry {
    pub fn new(terminal_height: u16, item_height: u16, reserved_rows: u16) -> Self {
        Self {
            terminal_height,
            item_height: item_height.max(1),
            reserved_rows,
        }
    }

    /// Rows left for items once the header and footer chrome is drawn.
    pub fn available_rows(&self) -> u16 {
        self.terminal_height.saturating_sub(self.reserved_rows).max(1)
    }

    /// Number of whole items that fit, never less than one so a selected
    /// item always has somewhere to be.
    pub fn visible_count(&self) -> usize {
        usize::from(self.available_rows() / self.item_height).max(1)
    }

    pub fn resize(&mut self, terminal_height: u16) {
        self.terminal_height = terminal_height;
    }
}

/// Returns the scroll offset that keeps `selected` inside a window of
/// `visible` items, moving the window as little as possible.
pub fn snap_offset(selected: usize, offset: usize, len: usize, visible: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let visible = visible.max(1);
    if selected < offset {
        selected
    } else if selected >= offset + visible {
        selected + 1 - visible
    } else {
        offset
    }
}

/// Re-establishes `offset <= selected < offset + visible` after any state
/// change. Selection itself is never touched here.
pub fn recompute(state: &mut FeedState, geometry: &ViewportGeometry) {
    state.scroll_offset = snap_offset(
        state.selected_index,
        state.scroll_offset,
        state.items.len(),
        geometry.visible_count(),
    );
}

/// Position of the middle of the window through the whole list, in percent.
pub fn scroll_percent(offset: usize, visible: usize, len: usize) -> u32 {
    if len == 0 {
        return 0;
    }
    let middle = offset as f64 + visible as f64 / 2.0;
    (middle / len as f64 * 100.0).round() as u32
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisibleItem {
    pub index: usize,
    pub selected: bool,
    pub item: Item,
}

/// Everything a renderer needs for one frame of the timeline.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderState {
    pub visible_items: Vec<VisibleItem>,
    pub scroll_indicator: Option<String>,
    pub loading: bool,
    pub error: Option<String>,
    pub total: usize,
    pub selected_index: usize,
}

impl RenderState {
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

pub fn snapshot(state: &FeedState, geometry: &ViewportGeometry) -> RenderState {
    let len = state.items.len();
    let visible = geometry.visible_count();
    let start = state.scroll_offset.min(len);
    let end = (start + visible).min(len);

    let visible_items = state.items[start..end]
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let index = start + i;
            VisibleItem {
                index,
                selected: index == state.selected_index,
                item: item.clone(),
            }
        })
        .collect();

    let scroll_indicator = (len > visible).then(|| {
        format!(
            "{}/{} ({}%)",
            state.selected_index + 1,
            len,
            scroll_percent(state.scroll_offset, visible, len)
        )
    });

    RenderState {
        visible_items,
        scroll_indicator,
        loading: state.loading,
        error: state.error.as_ref().map(ToString::to_string),
        total: len,
        selected_index: state.selected_index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::test_item;

    fn state_with(len: usize) -> FeedState {
        let mut state = FeedState::new();
        let items = (0..len).map(|i| test_item(&format!("p{i}"))).collect();
        state.replace(items, None, None);
        state
    }

    #[test]
    fn visible_count_uses_item_rows() {
        assert_eq!(ViewportGeometry::new(24, 6, 8).visible_count(), 2);
        assert_eq!(ViewportGeometry::new(26, 6, 8).visible_count(), 3);
        assert_eq!(ViewportGeometry::new(50, 6, 8).visible_count(), 7);
    }

    #[test]
    fn visible_count_never_zero() {
        assert_eq!(ViewportGeometry::new(3, 6, 8).visible_count(), 1);
        assert_eq!(ViewportGeometry::new(0, 6, 8).visible_count(), 1);
        assert_eq!(ViewportGeometry::new(10, 0, 8).visible_count(), 2);
    }

    #[test]
    fn snap_up_and_down() {
        assert_eq!(snap_offset(2, 5, 10, 3), 2);
        assert_eq!(snap_offset(7, 2, 10, 3), 5);
        assert_eq!(snap_offset(3, 2, 10, 3), 2);
        assert_eq!(snap_offset(0, 4, 0, 3), 0);
    }

    #[test]
    fn resize_keeps_selection_and_snaps() {
        let mut state = state_with(10);
        state.selected_index = 8;
        let mut geometry = ViewportGeometry::new(50, 6, 8);
        recompute(&mut state, &geometry);
        assert_eq!(state.scroll_offset(), 2);

        geometry.resize(20);
        recompute(&mut state, &geometry);
        assert_eq!(state.selected_index(), 8);
        assert_eq!(state.scroll_offset(), 7);
    }

    #[test]
    fn snapshot_tags_selected_row() {
        let mut state = state_with(10);
        state.selected_index = 4;
        let geometry = ViewportGeometry::new(26, 6, 8);
        recompute(&mut state, &geometry);

        let render = snapshot(&state, &geometry);
        let indices: Vec<usize> = render.visible_items.iter().map(|v| v.index).collect();
        assert_eq!(indices, vec![2, 3, 4]);
        assert!(render.visible_items[2].selected);
        assert!(!render.visible_items[0].selected);
        assert_eq!(render.total, 10);
    }

    #[test]
    fn indicator_only_when_list_overflows() {
        let geometry = ViewportGeometry::new(26, 6, 8);
        let state = state_with(3);
        assert_eq!(snapshot(&state, &geometry).scroll_indicator, None);

        let state = state_with(10);
        // middle of window = 0 + 1.5 -> 15%
        assert_eq!(
            snapshot(&state, &geometry).scroll_indicator.as_deref(),
            Some("1/10 (15%)")
        );
    }

    #[test]
    fn scroll_percent_rounds_half_up() {
        assert_eq!(scroll_percent(0, 1, 4), 13);
        assert_eq!(scroll_percent(3, 3, 10), 45);
        assert_eq!(scroll_percent(0, 2, 0), 0);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn selection_always_inside_window(
                len in 1..200usize,
                selected_seed in 0..200usize,
                offset_seed in 0..200usize,
                heights in proptest::collection::vec(0..120u16, 1..10),
            ) {
                let mut state = state_with(len);
                state.selected_index = selected_seed % len;
                state.scroll_offset = offset_seed % len;
                let mut geometry = ViewportGeometry::default();
                for height in heights {
                    geometry.resize(height);
                    recompute(&mut state, &geometry);
                    let visible = geometry.visible_count();
                    let offset = state.scroll_offset();
                    let selected = state.selected_index();
                    prop_assert!(offset <= selected);
                    prop_assert!(selected < offset + visible);
                    prop_assert!(offset < len);
                }
            }
        }
    }
}
