use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use bsky_tui::data::FeedService;
use bsky_tui::timeline::{
    Author, Command, Item, LikeRef, Page, RenderState, Timeline, TimelineOptions,
};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

const WAIT: Duration = Duration::from_secs(5);

/// Feed service whose pages are scripted per cursor. Calls can be held back
/// with a gate until the test releases them.
#[derive(Default)]
struct ScriptedFeed {
    script: Mutex<HashMap<Option<String>, VecDeque<Result<Page, String>>>>,
    fetches: Mutex<Vec<Option<String>>>,
    fetch_gate: Option<Receiver<()>>,
    like_gate: Option<Receiver<()>>,
    fail_likes: bool,
    likes: AtomicUsize,
    unlikes: Mutex<Vec<String>>,
}

impl ScriptedFeed {
    fn on(self, cursor: Option<&str>, response: Result<Page, String>) -> Self {
        self.script
            .lock()
            .entry(cursor.map(str::to_string))
            .or_default()
            .push_back(response);
        self
    }

    fn gated_fetches(mut self) -> (Self, Sender<()>) {
        let (tx, rx) = unbounded();
        self.fetch_gate = Some(rx);
        (self, tx)
    }

    fn gated_likes(mut self) -> (Self, Sender<()>) {
        let (tx, rx) = unbounded();
        self.like_gate = Some(rx);
        (self, tx)
    }

    fn fetch_count(&self) -> usize {
        self.fetches.lock().len()
    }
}

impl FeedService for ScriptedFeed {
    fn fetch_page(&self, cursor: Option<&str>) -> Result<Page> {
        self.fetches.lock().push(cursor.map(str::to_string));
        if let Some(gate) = &self.fetch_gate {
            let _ = gate.recv();
        }
        let next = self
            .script
            .lock()
            .get_mut(&cursor.map(str::to_string))
            .and_then(VecDeque::pop_front);
        match next {
            Some(Ok(page)) => Ok(page),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(Page::default()),
        }
    }

    fn like(&self, _uri: &str, _cid: &str) -> Result<LikeRef> {
        let n = self.likes.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(gate) = &self.like_gate {
            let _ = gate.recv();
        }
        if self.fail_likes {
            bail!("like rejected");
        }
        Ok(format!("at://did:plc:me/app.bsky.feed.like/{n}"))
    }

    fn unlike(&self, like_ref: &str) -> Result<()> {
        self.unlikes.lock().push(like_ref.to_string());
        Ok(())
    }
}

fn item(uri: &str, like_count: u64) -> Item {
    Item {
        uri: uri.to_string(),
        cid: format!("cid-{uri}"),
        author: Author {
            did: "did:plc:author".into(),
            handle: "author.bsky.social".into(),
            ..Default::default()
        },
        text: format!("post {uri}"),
        created_at: "2024-05-01T10:00:00.000Z".into(),
        like_count,
        ..Default::default()
    }
}

fn page(uris: &[&str], cursor: Option<&str>) -> Page {
    Page {
        items: uris.iter().map(|uri| item(uri, 0)).collect(),
        cursor: cursor.map(str::to_string),
    }
}

fn numbered(prefix: &str, count: usize, cursor: Option<&str>) -> Page {
    Page {
        items: (0..count)
            .map(|i| item(&format!("at://{prefix}/{i}"), 0))
            .collect(),
        cursor: cursor.map(str::to_string),
    }
}

/// Terminal height 26 leaves (26 - 8) / 6 = 3 visible items.
fn timeline(feed: &Arc<ScriptedFeed>) -> Timeline {
    Timeline::new(feed.clone(), TimelineOptions::default(), 26)
}

fn settle(timeline: &mut Timeline) -> RenderState {
    timeline.wait_for(WAIT).expect("completion arrives")
}

fn loaded(feed: &Arc<ScriptedFeed>) -> Timeline {
    let mut timeline = timeline(feed);
    timeline.load_timeline(false);
    settle(&mut timeline);
    timeline
}

#[test]
fn five_downs_scroll_the_window() {
    let feed = Arc::new(ScriptedFeed::default().on(None, Ok(numbered("p", 10, None))));
    let mut timeline = loaded(&feed);

    for _ in 0..4 {
        timeline.dispatch(Command::Down);
    }
    let view = timeline.dispatch(Command::Down);

    assert_eq!(timeline.state().selected_index(), 5);
    assert_eq!(timeline.state().scroll_offset(), 3);
    let indices: Vec<_> = view.visible_items.iter().map(|v| v.index).collect();
    assert_eq!(indices, vec![3, 4, 5]);
    assert!(view.visible_items[2].selected);
    assert_eq!(view.scroll_indicator.as_deref(), Some("6/10 (45%)"));
}

#[test]
fn load_more_is_single_flight() {
    let (script, gate) = ScriptedFeed::default()
        .on(None, Ok(numbered("a", 10, Some("c1"))))
        .on(Some("c1"), Ok(numbered("b", 5, None)))
        .gated_fetches();
    let feed = Arc::new(script);
    let mut timeline = timeline(&feed);

    timeline.load_timeline(false);
    gate.send(()).unwrap();
    settle(&mut timeline);

    let view = timeline.dispatch(Command::Bottom);
    assert!(view.loading);
    timeline.dispatch(Command::LoadMore);
    timeline.dispatch(Command::LoadMore);
    timeline.dispatch(Command::Down);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(feed.fetch_count(), 2);

    gate.send(()).unwrap();
    let view = settle(&mut timeline);
    assert_eq!(view.total, 15);
    assert!(!view.loading);
    assert_eq!(timeline.state().selected_index(), 10);
    assert_eq!(
        *feed.fetches.lock(),
        vec![None, Some("c1".to_string())]
    );
}

#[test]
fn refresh_keeps_selected_item() {
    let feed = Arc::new(
        ScriptedFeed::default()
            .on(None, Ok(page(&["A", "B", "C"], None)))
            .on(None, Ok(page(&["A", "B", "C", "D"], None))),
    );
    let mut timeline = loaded(&feed);
    timeline.dispatch(Command::Down);
    assert_eq!(timeline.state().selected_item().unwrap().uri, "B");

    let view = timeline.dispatch(Command::Refresh);
    assert!(view.loading);
    let view = settle(&mut timeline);

    assert_eq!(view.total, 4);
    assert_eq!(timeline.state().selected_index(), 1);
    assert_eq!(timeline.state().selected_item().unwrap().uri, "B");
    assert_eq!(timeline.state().scroll_offset(), 0);
}

#[test]
fn refresh_without_selected_item_resets_selection() {
    let feed = Arc::new(
        ScriptedFeed::default()
            .on(None, Ok(page(&["A", "B", "C"], None)))
            .on(None, Ok(page(&["X", "Y"], None))),
    );
    let mut timeline = loaded(&feed);
    timeline.dispatch(Command::Bottom);
    timeline.dispatch(Command::Refresh);
    settle(&mut timeline);

    assert_eq!(timeline.state().selected_index(), 0);
    assert_eq!(timeline.state().selected_item().unwrap().uri, "X");
}

#[test]
fn empty_feed_loads_cleanly() {
    let feed = Arc::new(ScriptedFeed::default().on(None, Ok(Page::default())));
    let mut timeline = loaded(&feed);

    let view = timeline.render_state();
    assert!(view.is_empty());
    assert!(!view.loading);
    assert!(view.error.is_none());
    assert_eq!(timeline.state().selected_index(), 0);

    let view = timeline.dispatch(Command::Down);
    assert_eq!(view.selected_index, 0);
    assert!(view.error.is_none());
}

#[test]
fn like_is_optimistic() {
    let (script, gate) = ScriptedFeed::default()
        .on(
            None,
            Ok(Page {
                items: vec![item("A", 5)],
                cursor: None,
            }),
        )
        .gated_likes();
    let feed = Arc::new(script);
    let mut timeline = loaded(&feed);

    let view = timeline.dispatch(Command::ToggleLike);
    let liked = &view.visible_items[0].item;
    assert_eq!(liked.like_count, 6);
    assert!(liked.viewer.like.as_deref().is_some_and(|r| !r.is_empty()));

    gate.send(()).unwrap();
    let view = settle(&mut timeline);
    let liked = &view.visible_items[0].item;
    assert_eq!(liked.like_count, 6);
    assert_eq!(
        liked.viewer.like.as_deref(),
        Some("at://did:plc:me/app.bsky.feed.like/1")
    );
    assert!(view.error.is_none());
}

#[test]
fn like_then_unlike_restores_count() {
    let feed = Arc::new(ScriptedFeed::default().on(
        None,
        Ok(Page {
            items: vec![item("A", 5)],
            cursor: None,
        }),
    ));
    let mut timeline = loaded(&feed);

    timeline.dispatch(Command::ToggleLike);
    settle(&mut timeline);
    let view = timeline.dispatch(Command::ToggleLike);
    assert_eq!(view.visible_items[0].item.like_count, 5);
    assert!(view.visible_items[0].item.viewer.like.is_none());

    settle(&mut timeline);
    assert_eq!(
        *feed.unlikes.lock(),
        vec!["at://did:plc:me/app.bsky.feed.like/1".to_string()]
    );
}

#[test]
fn failed_like_keeps_optimistic_count() {
    let mut script = ScriptedFeed::default().on(
        None,
        Ok(Page {
            items: vec![item("A", 5)],
            cursor: None,
        }),
    );
    script.fail_likes = true;
    let feed = Arc::new(script);
    let mut timeline = loaded(&feed);

    timeline.dispatch(Command::ToggleLike);
    let view = settle(&mut timeline);
    assert_eq!(view.visible_items[0].item.like_count, 6);
    assert_eq!(view.error.as_deref(), Some("Failed to like/unlike post"));
}

#[test]
fn failed_load_more_keeps_list() {
    let feed = Arc::new(
        ScriptedFeed::default()
            .on(None, Ok(numbered("a", 10, Some("c1"))))
            .on(Some("c1"), Err("connection reset".into())),
    );
    let mut timeline = loaded(&feed);

    timeline.dispatch(Command::Bottom);
    let view = settle(&mut timeline);
    assert_eq!(view.total, 10);
    assert!(!view.loading);
    assert!(view
        .error
        .as_deref()
        .is_some_and(|e| e.starts_with("Failed to load more posts")));
    assert_eq!(timeline.state().selected_index(), 9);
}

#[test]
fn failed_initial_load_reports_error() {
    let feed = Arc::new(ScriptedFeed::default().on(None, Err("offline".into())));
    let mut timeline = loaded(&feed);

    let view = timeline.render_state();
    assert!(view.is_empty());
    assert!(!view.loading);
    assert!(view
        .error
        .as_deref()
        .is_some_and(|e| e.starts_with("Failed to load timeline")));
}

#[test]
fn resize_keeps_selection_visible() {
    let feed = Arc::new(ScriptedFeed::default().on(None, Ok(numbered("p", 10, None))));
    let mut timeline = loaded(&feed);
    timeline.dispatch(Command::Bottom);

    for height in [60u16, 10, 26, 14, 100] {
        timeline.dispatch(Command::Resize(height));
        let state = timeline.state();
        let visible = timeline.geometry().visible_count();
        assert_eq!(state.selected_index(), 9);
        assert!(state.scroll_offset() <= state.selected_index());
        assert!(state.selected_index() < state.scroll_offset() + visible);
    }
}

#[test]
fn refresh_supersedes_pending_load_more() {
    let (script, gate) = ScriptedFeed::default()
        .on(None, Ok(numbered("a", 10, Some("c1"))))
        .on(Some("c1"), Ok(numbered("b", 5, None)))
        .on(None, Ok(page(&["N1", "N2", "N3"], None)))
        .gated_fetches();
    let feed = Arc::new(script);
    let mut timeline = timeline(&feed);
    timeline.load_timeline(false);
    gate.send(()).unwrap();
    settle(&mut timeline);

    timeline.dispatch(Command::Bottom);
    timeline.dispatch(Command::Refresh);
    gate.send(()).unwrap();
    gate.send(()).unwrap();

    while timeline.state().is_loading() {
        timeline.wait_for(WAIT).expect("completion arrives");
    }
    thread::sleep(Duration::from_millis(100));
    timeline.poll();

    assert_eq!(feed.fetch_count(), 3);
    let uris: Vec<_> = timeline.state().items().iter().map(|i| i.uri.as_str()).collect();
    assert_eq!(uris, vec!["N1", "N2", "N3"]);
}
