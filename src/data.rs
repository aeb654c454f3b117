use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};

use crate::session;
use crate::timeline::{Author, Item, LikeRef, Page};

pub const DEFAULT_PAGE_SIZE: u32 = 20;

pub trait FeedService: Send + Sync {
    fn fetch_page(&self, cursor: Option<&str>) -> Result<Page>;
    fn like(&self, uri: &str, cid: &str) -> Result<LikeRef>;
    fn unlike(&self, like_ref: &str) -> Result<()>;
}

pub trait PostService: Send + Sync {
    fn create_post(&self, text: &str) -> Result<()>;
}

pub struct BlueskyFeedService {
    sessions: Arc<session::Manager>,
    page_size: u32,
}

impl BlueskyFeedService {
    pub fn new(sessions: Arc<session::Manager>, page_size: u32) -> Self {
        Self {
            sessions,
            page_size: page_size.clamp(1, 100),
        }
    }
}

impl FeedService for BlueskyFeedService {
    fn fetch_page(&self, cursor: Option<&str>) -> Result<Page> {
        self.sessions
            .with_session(|client, session| client.timeline(session, cursor, self.page_size))
            .context("fetch timeline")
    }

    fn like(&self, uri: &str, cid: &str) -> Result<LikeRef> {
        self.sessions
            .with_session(|client, session| client.like(session, uri, cid))
            .context("like post")
    }

    fn unlike(&self, like_ref: &str) -> Result<()> {
        self.sessions
            .with_session(|client, session| client.unlike(session, like_ref))
            .context("unlike post")
    }
}

pub struct BlueskyPostService {
    sessions: Arc<session::Manager>,
}

impl BlueskyPostService {
    pub fn new(sessions: Arc<session::Manager>) -> Self {
        Self { sessions }
    }
}

impl PostService for BlueskyPostService {
    fn create_post(&self, text: &str) -> Result<()> {
        self.sessions
            .with_session(|client, session| client.create_post(session, text))
            .context("create post")?;
        Ok(())
    }
}

/// Offline feed used by `--demo`: a fixed number of synthetic pages,
/// newest first.
pub struct MockFeedService {
    pages: usize,
    page_size: usize,
    next_like: AtomicU64,
}

impl Default for MockFeedService {
    fn default() -> Self {
        Self::new(5, DEFAULT_PAGE_SIZE as usize)
    }
}

impl MockFeedService {
    pub fn new(pages: usize, page_size: usize) -> Self {
        Self {
            pages,
            page_size: page_size.max(1),
            next_like: AtomicU64::new(1),
        }
    }
}

const MOCK_AUTHORS: [(&str, Option<&str>); 4] = [
    ("team.bsky.social", Some("Bluesky Team")),
    ("alice.example.com", Some("Alice")),
    ("bob.bsky.social", None),
    ("ferris.rs", Some("Ferris")),
];

const MOCK_TEXTS: [&str; 4] = [
    "Welcome to bsky-tui! Use j/k to move, l to like, r to refresh.",
    "Reading the timeline from a terminal feels right. #terminal",
    "Ping @alice.example.com, have you seen https://bsky.app yet?",
    "Pages load as you scroll. Keep pressing j to reach the next one.",
];

impl FeedService for MockFeedService {
    fn fetch_page(&self, cursor: Option<&str>) -> Result<Page> {
        let page = match cursor {
            None => 0,
            Some(raw) => raw
                .strip_prefix("page-")
                .and_then(|n| n.parse::<usize>().ok())
                .with_context(|| format!("mock feed: bad cursor {raw:?}"))?,
        };
        if page >= self.pages {
            return Ok(Page::default());
        }

        let now = Utc::now();
        let items = (0..self.page_size)
            .map(|i| {
                let n = page * self.page_size + i;
                let (handle, display_name) = MOCK_AUTHORS[n % MOCK_AUTHORS.len()];
                let created = now - ChronoDuration::minutes(7 * n as i64 + 1);
                Item {
                    uri: format!("at://did:plc:demo{n}/app.bsky.feed.post/{n}"),
                    cid: format!("bafydemo{n}"),
                    author: Author {
                        did: format!("did:plc:demo{}", n % MOCK_AUTHORS.len()),
                        handle: handle.to_string(),
                        display_name: display_name.map(str::to_string),
                        avatar: None,
                    },
                    text: format!("{} ({})", MOCK_TEXTS[n % MOCK_TEXTS.len()], n + 1),
                    created_at: created.to_rfc3339_opts(SecondsFormat::Millis, true),
                    indexed_at: created.to_rfc3339_opts(SecondsFormat::Millis, true),
                    like_count: (n as u64 * 7) % 23,
                    repost_count: (n as u64 * 3) % 5,
                    reply_count: (n as u64) % 4,
                    ..Default::default()
                }
            })
            .collect();

        let next = page + 1;
        Ok(Page {
            items,
            cursor: (next < self.pages).then(|| format!("page-{next}")),
        })
    }

    fn like(&self, _uri: &str, _cid: &str) -> Result<LikeRef> {
        let n = self.next_like.fetch_add(1, Ordering::Relaxed);
        Ok(format!("at://did:plc:demo/app.bsky.feed.like/{n}"))
    }

    fn unlike(&self, like_ref: &str) -> Result<()> {
        if !like_ref.starts_with("at://") {
            bail!("mock feed: unknown like {like_ref:?}");
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MockPostService;

impl PostService for MockPostService {
    fn create_post(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            bail!("mock feed: empty post");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_feed_pages_until_exhausted() {
        let service = MockFeedService::new(2, 3);
        let first = service.fetch_page(None).unwrap();
        assert_eq!(first.items.len(), 3);
        assert_eq!(first.cursor.as_deref(), Some("page-1"));

        let second = service.fetch_page(first.cursor.as_deref()).unwrap();
        assert_eq!(second.items.len(), 3);
        assert_eq!(second.cursor, None);
        assert_ne!(first.items[0].uri, second.items[0].uri);
    }

    #[test]
    fn mock_feed_rejects_unknown_cursor() {
        let service = MockFeedService::default();
        assert!(service.fetch_page(Some("bogus")).is_err());
    }

    #[test]
    fn mock_like_refs_are_unique() {
        let service = MockFeedService::default();
        let a = service.like("at://x", "c").unwrap();
        let b = service.like("at://x", "c").unwrap();
        assert_ne!(a, b);
        assert!(service.unlike(&a).is_ok());
        assert!(service.unlike("pending-like").is_err());
    }
}
