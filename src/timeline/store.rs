use super::{EngineError, Item};

/// The ordered item list of one mounted timeline, plus the selection and
/// pagination state that travels with it.
///
/// Items keep feed-service order and are never re-sorted. Only the fields of
/// an existing item change in place; everything else is a wholesale replace
/// or a tail append.
#[derive(Debug, Default)]
pub struct FeedState {
    pub(super) items: Vec<Item>,
    pub(super) cursor: Option<String>,
    pub(super) selected_index: usize,
    pub(super) scroll_offset: usize,
    pub(super) loading: bool,
    pub(super) error: Option<EngineError>,
}

impl FeedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn selected_index(&self) -> usize {
        self.selected_index
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&EngineError> {
        self.error.as_ref()
    }

    pub fn selected_item(&self) -> Option<&Item> {
        self.items.get(self.selected_index)
    }

    pub fn position(&self, uri: &str) -> Option<usize> {
        self.items.iter().position(|item| item.uri == uri)
    }

    pub fn get(&self, uri: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.uri == uri)
    }

    /// Overwrites the list and cursor after a full reload.
    ///
    /// When `preserve_uri` names an item that survived the reload, selection
    /// follows it to its new index; otherwise selection returns to the top.
    /// The scroll offset is left alone so the viewport only moves if it has
    /// to.
    pub fn replace(&mut self, items: Vec<Item>, cursor: Option<String>, preserve_uri: Option<&str>) {
        self.items = items;
        self.cursor = cursor;
        self.selected_index = preserve_uri
            .and_then(|uri| self.position(uri))
            .unwrap_or(0);
    }

    /// Adds a page to the tail. Selection keeps its numeric index; moving it
    /// onto the new page is the caller's decision.
    ///
    /// No de-duplication happens here: overlapping pages from the service
    /// show up as repeated rows.
    pub fn append(&mut self, items: Vec<Item>, cursor: Option<String>) {
        self.items.extend(items);
        self.cursor = cursor;
    }

    /// Applies `mutate` to the first item with the given uri. Returns false
    /// if the item is gone, which happens when a refresh lands while a
    /// mutation is in flight.
    pub fn update_item<F>(&mut self, uri: &str, mutate: F) -> bool
    where
        F: FnOnce(&mut Item),
    {
        match self.items.iter_mut().find(|item| item.uri == uri) {
            Some(item) => {
                mutate(item);
                true
            }
            None => false,
        }
    }
}
