//! Feed viewport and pagination engine.
//!
//! [`Timeline`] owns one [`FeedState`] and is the only thing that mutates it.
//! Every command runs to completion on the caller's thread: the state is
//! changed, the viewport is recomputed, and a [`RenderState`] comes back.
//! Feed-service calls run on worker threads and report back over a channel;
//! their results are applied only when the owner calls [`Timeline::poll`] or
//! [`Timeline::wait_for`], so a completion never interleaves with a command.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::debug;

use crate::data::FeedService;

pub mod mutation;
pub mod navigator;
pub mod pagination;
pub mod store;
pub mod viewport;

pub use mutation::{MutationOutcome, MutationRequest};
pub use navigator::{Navigation, NavigationError, Transition};
pub use pagination::{FetchRequest, Pagination};
pub use store::FeedState;
pub use viewport::{RenderState, ViewportGeometry, VisibleItem};

/// Reference to the record that represents the viewer's like of an item.
pub type LikeRef = String;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Author {
    pub did: String,
    pub handle: String,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewerState {
    pub like: Option<LikeRef>,
    pub repost: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Item {
    pub uri: String,
    pub cid: String,
    pub author: Author,
    pub text: String,
    pub created_at: String,
    pub indexed_at: String,
    pub like_count: u64,
    pub repost_count: u64,
    pub reply_count: u64,
    pub viewer: ViewerState,
}

impl Item {
    pub fn is_liked(&self) -> bool {
        self.viewer.like.is_some()
    }

    pub fn is_reposted(&self) -> bool {
        self.viewer.repost.is_some()
    }
}

/// One page of the feed as returned by the feed service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Page {
    pub items: Vec<Item>,
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("{0}")]
    Fetch(String),
    #[error("{0}")]
    Mutation(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Up,
    Down,
    PageUp,
    PageDown,
    Top,
    Bottom,
    Refresh,
    LoadMore,
    ToggleLike,
    Resize(u16),
}

impl Command {
    pub fn navigation(self) -> Option<Navigation> {
        match self {
            Command::Up => Some(Navigation::Up),
            Command::Down => Some(Navigation::Down),
            Command::PageUp => Some(Navigation::PageUp),
            Command::PageDown => Some(Navigation::PageDown),
            Command::Top => Some(Navigation::Top),
            Command::Bottom => Some(Navigation::Bottom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineOptions {
    pub item_height: u16,
    pub reserved_rows: u16,
    pub prefetch_threshold: usize,
}

impl Default for TimelineOptions {
    fn default() -> Self {
        Self {
            item_height: viewport::DEFAULT_ITEM_HEIGHT,
            reserved_rows: viewport::DEFAULT_RESERVED_ROWS,
            prefetch_threshold: 3,
        }
    }
}

enum Completion {
    Page {
        request_id: u64,
        result: anyhow::Result<Page>,
    },
    Mutation(MutationOutcome),
}

pub struct Timeline {
    state: FeedState,
    geometry: ViewportGeometry,
    pagination: Pagination,
    prefetch_threshold: usize,
    service: Arc<dyn FeedService>,
    completion_tx: Sender<Completion>,
    completion_rx: Receiver<Completion>,
}

impl Timeline {
    pub fn new(service: Arc<dyn FeedService>, options: TimelineOptions, terminal_height: u16) -> Self {
        let (completion_tx, completion_rx) = unbounded();
        Self {
            state: FeedState::new(),
            geometry: ViewportGeometry::new(
                terminal_height,
                options.item_height,
                options.reserved_rows,
            ),
            pagination: Pagination::new(),
            prefetch_threshold: options.prefetch_threshold,
            service,
            completion_tx,
            completion_rx,
        }
    }

    pub fn state(&self) -> &FeedState {
        &self.state
    }

    pub fn geometry(&self) -> &ViewportGeometry {
        &self.geometry
    }

    pub fn render_state(&self) -> RenderState {
        viewport::snapshot(&self.state, &self.geometry)
    }

    /// Full reload from the first page. With `preserve_selection` the
    /// currently selected item stays selected if it is still in the feed.
    pub fn load_timeline(&mut self, preserve_selection: bool) -> RenderState {
        let request = self
            .pagination
            .begin_load_timeline(&mut self.state, preserve_selection);
        self.spawn_fetch(request);
        self.recompute();
        self.render_state()
    }

    pub fn dispatch(&mut self, command: Command) -> RenderState {
        if let Some(nav) = command.navigation() {
            self.navigate(nav);
        } else {
            match command {
                Command::Refresh => {
                    let request = self.pagination.begin_load_timeline(&mut self.state, true);
                    self.spawn_fetch(request);
                }
                Command::LoadMore => self.load_more(),
                Command::ToggleLike => self.toggle_like_selected(),
                Command::Resize(height) => self.geometry.resize(height),
                _ => {}
            }
        }
        self.recompute();
        self.render_state()
    }

    /// Applies every completion that has arrived so far. Returns a fresh
    /// snapshot only if something changed.
    pub fn poll(&mut self) -> Option<RenderState> {
        let mut changed = false;
        while let Ok(completion) = self.completion_rx.try_recv() {
            self.apply(completion);
            changed = true;
        }
        if !changed {
            return None;
        }
        self.recompute();
        Some(self.render_state())
    }

    /// Blocks until at least one completion arrives or `timeout` passes.
    pub fn wait_for(&mut self, timeout: Duration) -> Option<RenderState> {
        let completion = self.completion_rx.recv_timeout(timeout).ok()?;
        self.apply(completion);
        while let Ok(completion) = self.completion_rx.try_recv() {
            self.apply(completion);
        }
        self.recompute();
        Some(self.render_state())
    }

    fn navigate(&mut self, nav: Navigation) {
        let page_size = self.geometry.visible_count();
        match navigator::navigate(&mut self.state, nav, page_size, self.prefetch_threshold) {
            Ok(transition) => {
                if transition.near_end {
                    self.load_more();
                }
            }
            Err(NavigationError::EmptyFeed) => {
                debug!(?nav, "navigation ignored on empty feed");
            }
        }
    }

    fn load_more(&mut self) {
        if let Some(request) = self.pagination.begin_load_more(&mut self.state) {
            self.spawn_fetch(request);
        }
    }

    fn toggle_like_selected(&mut self) {
        let Some(uri) = self.state.selected_item().map(|item| item.uri.clone()) else {
            return;
        };
        let Some(request) = mutation::plan_toggle_like(&self.state, &uri) else {
            return;
        };
        self.spawn_mutation(request.clone());
        mutation::apply_optimistic(&mut self.state, &request);
    }

    fn recompute(&mut self) {
        viewport::recompute(&mut self.state, &self.geometry);
    }

    fn apply(&mut self, completion: Completion) {
        match completion {
            Completion::Page { request_id, result } => {
                self.pagination
                    .complete(&mut self.state, request_id, result);
            }
            Completion::Mutation(outcome) => mutation::complete(&mut self.state, outcome),
        }
    }

    fn spawn_fetch(&self, request: FetchRequest) {
        let service = Arc::clone(&self.service);
        let tx = self.completion_tx.clone();
        thread::spawn(move || {
            let result = service.fetch_page(request.cursor.as_deref());
            let _ = tx.send(Completion::Page {
                request_id: request.request_id,
                result,
            });
        });
    }

    fn spawn_mutation(&self, request: MutationRequest) {
        let service = Arc::clone(&self.service);
        let tx = self.completion_tx.clone();
        thread::spawn(move || {
            let outcome = match request {
                MutationRequest::Like { uri, cid } => {
                    let result = service.like(&uri, &cid);
                    MutationOutcome::Liked { uri, result }
                }
                MutationRequest::Unlike { uri, like_ref } => {
                    let result = service.unlike(&like_ref);
                    MutationOutcome::Unliked { uri, result }
                }
            };
            let _ = tx.send(Completion::Mutation(outcome));
        });
    }
}

#[cfg(test)]
pub(crate) fn test_item(uri: &str) -> Item {
    Item {
        uri: uri.to_string(),
        cid: format!("cid-{uri}"),
        author: Author {
            did: "did:plc:test".into(),
            handle: "test.bsky.social".into(),
            ..Default::default()
        },
        text: format!("post {uri}"),
        created_at: "2024-01-01T00:00:00Z".into(),
        ..Default::default()
    }
}
