use tracing::{debug, warn};

use super::{EngineError, FeedState, Page};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchMode {
    Replace { preserve_uri: Option<String> },
    Append,
}

/// A page fetch the controller should hand to the feed service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub request_id: u64,
    pub cursor: Option<String>,
}

#[derive(Debug)]
struct PendingFetch {
    request_id: u64,
    mode: FetchMode,
}

/// Decides when pages are fetched and how their results land in the store.
///
/// `FeedState::loading` is the single-flight guard for `load_more`. A full
/// reload is always allowed and supersedes whatever fetch was outstanding;
/// the superseded completion is dropped when it arrives.
#[derive(Debug)]
pub struct Pagination {
    next_request_id: u64,
    pending: Option<PendingFetch>,
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new()
    }
}

impl Pagination {
    pub fn new() -> Self {
        Self {
            next_request_id: 1,
            pending: None,
        }
    }

    fn issue(&mut self, mode: FetchMode) -> u64 {
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        if let Some(previous) = self.pending.replace(PendingFetch { request_id, mode }) {
            debug!(
                superseded = previous.request_id,
                request_id, "timeline reload supersedes pending fetch"
            );
        }
        request_id
    }

    pub fn begin_load_timeline(&mut self, state: &mut FeedState, preserve_selection: bool) -> FetchRequest {
        let preserve_uri = if preserve_selection {
            state.selected_item().map(|item| item.uri.clone())
        } else {
            None
        };

        state.loading = true;
        state.error = None;
        let request_id = self.issue(FetchMode::Replace { preserve_uri });
        debug!(request_id, preserve_selection, "loading timeline");
        FetchRequest {
            request_id,
            cursor: None,
        }
    }

    /// Returns `None` when there is no next page or a fetch is already out.
    pub fn begin_load_more(&mut self, state: &mut FeedState) -> Option<FetchRequest> {
        if state.loading {
            debug!("load more skipped: fetch already in flight");
            return None;
        }
        let cursor = state.cursor.clone()?;

        state.loading = true;
        let request_id = self.issue(FetchMode::Append);
        debug!(request_id, cursor = %cursor, "loading next page");
        Some(FetchRequest {
            request_id,
            cursor: Some(cursor),
        })
    }

    /// Applies a finished fetch. Returns false when the result belonged to a
    /// superseded request and was discarded.
    pub fn complete(
        &mut self,
        state: &mut FeedState,
        request_id: u64,
        result: anyhow::Result<Page>,
    ) -> bool {
        let is_current = self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.request_id == request_id);
        if !is_current {
            debug!(request_id, "discarding stale page");
            return false;
        }
        let Some(pending) = self.pending.take() else {
            return false;
        };
        state.loading = false;

        match (pending.mode, result) {
            (FetchMode::Replace { preserve_uri }, Ok(page)) => {
                debug!(request_id, items = page.items.len(), "timeline loaded");
                state.replace(page.items, page.cursor, preserve_uri.as_deref());
                state.error = None;
            }
            (FetchMode::Append, Ok(page)) => {
                debug!(request_id, items = page.items.len(), "page appended");
                let previous_len = state.items.len();
                let appended = !page.items.is_empty();
                state.append(page.items, page.cursor);
                if appended {
                    state.selected_index = previous_len;
                }
                state.error = None;
            }
            (FetchMode::Replace { .. }, Err(err)) => {
                warn!(request_id, error = %format!("{err:#}"), "timeline load failed");
                state.error = Some(EngineError::Fetch(format!("Failed to load timeline: {err}")));
            }
            (FetchMode::Append, Err(err)) => {
                warn!(request_id, error = %format!("{err:#}"), "load more failed");
                state.error = Some(EngineError::Fetch(format!("Failed to load more posts: {err}")));
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::test_item;
    use anyhow::anyhow;

    fn page(uris: &[&str], cursor: Option<&str>) -> Page {
        Page {
            items: uris.iter().map(|uri| test_item(uri)).collect(),
            cursor: cursor.map(str::to_string),
        }
    }

    #[test]
    fn load_timeline_sets_and_clears_loading() {
        let mut state = FeedState::new();
        let mut pagination = Pagination::new();
        let req = pagination.begin_load_timeline(&mut state, false);
        assert!(state.is_loading());
        assert_eq!(req.cursor, None);

        assert!(pagination.complete(&mut state, req.request_id, Ok(page(&["a", "b"], Some("c1")))));
        assert!(!state.is_loading());
        assert_eq!(state.len(), 2);
        assert_eq!(state.cursor(), Some("c1"));
    }

    #[test]
    fn empty_response_leaves_clean_state() {
        let mut state = FeedState::new();
        let mut pagination = Pagination::new();
        let req = pagination.begin_load_timeline(&mut state, false);
        pagination.complete(&mut state, req.request_id, Ok(page(&[], None)));
        assert!(state.is_empty());
        assert_eq!(state.selected_index(), 0);
        assert!(state.error().is_none());
    }

    #[test]
    fn load_more_is_single_flight() {
        let mut state = FeedState::new();
        state.replace(vec![test_item("a")], Some("c1".into()), None);
        let mut pagination = Pagination::new();

        let first = pagination.begin_load_more(&mut state);
        assert!(first.is_some());
        assert!(pagination.begin_load_more(&mut state).is_none());
    }

    #[test]
    fn load_more_without_cursor_is_noop() {
        let mut state = FeedState::new();
        state.replace(vec![test_item("a")], None, None);
        let mut pagination = Pagination::new();
        assert!(pagination.begin_load_more(&mut state).is_none());
        assert!(!state.is_loading());
    }

    #[test]
    fn append_moves_selection_to_first_new_item() {
        let mut state = FeedState::new();
        state.replace(vec![test_item("a"), test_item("b")], Some("c1".into()), None);
        let mut pagination = Pagination::new();
        let req = pagination.begin_load_more(&mut state).unwrap();
        assert_eq!(req.cursor.as_deref(), Some("c1"));

        pagination.complete(&mut state, req.request_id, Ok(page(&["c", "d"], Some("c2"))));
        assert_eq!(state.selected_index(), 2);
        assert_eq!(state.cursor(), Some("c2"));
    }

    #[test]
    fn empty_append_keeps_selection() {
        let mut state = FeedState::new();
        state.replace(vec![test_item("a"), test_item("b")], Some("c1".into()), None);
        state.selected_index = 1;
        let mut pagination = Pagination::new();
        let req = pagination.begin_load_more(&mut state).unwrap();
        pagination.complete(&mut state, req.request_id, Ok(page(&[], None)));
        assert_eq!(state.selected_index(), 1);
        assert!(!state.has_more());
    }

    #[test]
    fn failure_keeps_list_and_sets_error() {
        let mut state = FeedState::new();
        state.replace(vec![test_item("a")], Some("c1".into()), None);
        let mut pagination = Pagination::new();
        let req = pagination.begin_load_timeline(&mut state, true);
        pagination.complete(&mut state, req.request_id, Err(anyhow!("network down")));

        assert_eq!(state.len(), 1);
        assert!(!state.is_loading());
        let message = state.error().map(ToString::to_string).unwrap_or_default();
        assert!(message.contains("network down"), "{message}");
    }

    #[test]
    fn reload_supersedes_pending_append() {
        let mut state = FeedState::new();
        state.replace(vec![test_item("a")], Some("c1".into()), None);
        let mut pagination = Pagination::new();
        let more = pagination.begin_load_more(&mut state).unwrap();
        let reload = pagination.begin_load_timeline(&mut state, false);

        assert!(!pagination.complete(&mut state, more.request_id, Ok(page(&["stale"], None))));
        assert!(state.is_loading());
        assert_eq!(state.len(), 1);

        assert!(pagination.complete(&mut state, reload.request_id, Ok(page(&["x", "y"], Some("c9")))));
        assert!(!state.is_loading());
        assert_eq!(state.items()[0].uri, "x");
    }

    #[test]
    fn refresh_preserves_selected_item() {
        let mut state = FeedState::new();
        state.replace(vec![test_item("A"), test_item("B"), test_item("C")], None, None);
        state.selected_index = 1;
        let mut pagination = Pagination::new();
        let req = pagination.begin_load_timeline(&mut state, true);
        pagination.complete(&mut state, req.request_id, Ok(page(&["A", "B", "C", "D"], None)));
        assert_eq!(state.selected_index(), 1);
        assert_eq!(state.selected_item().map(|item| item.uri.as_str()), Some("B"));
    }
}
