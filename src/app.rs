use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::bluesky;
use crate::config::{self, Config};
use crate::credentials;
use crate::data::{self, FeedService, PostService};
use crate::logging;
use crate::session;
use crate::ui;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Browse the built-in offline feed instead of a Bluesky account.
    pub demo: bool,
}

pub fn run(options: RunOptions) -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    let _log_guard = logging::init(&cfg.log).context("init logging")?;
    info!(version = crate::VERSION, demo = options.demo, "starting bsky-tui");

    let ui_options = if options.demo {
        demo_options(&cfg)
    } else {
        account_options(&cfg)?
    };

    let mut model = ui::Model::new(ui_options);
    model.run()?;

    info!("exiting");
    Ok(())
}

/// Removes the stored session without starting the UI.
pub fn logout() -> Result<()> {
    let store = credentials::Store::open(credentials::Options::default())
        .context("open credential store")?;
    let had_session = store.has_session();
    store.clear()?;
    if had_session {
        println!("Logged out. Removed {}", friendly_path(Some(&store.path().to_path_buf())));
    } else {
        println!("No stored session.");
    }
    Ok(())
}

fn demo_options(cfg: &Config) -> ui::Options {
    ui::Options {
        feed_service: Arc::new(data::MockFeedService::default()),
        post_service: Arc::new(data::MockPostService),
        sessions: None,
        timeline_options: cfg.timeline_options(),
        handle: None,
        login_handle: String::new(),
        status_message: "Demo mode: nothing is sent to Bluesky.".to_string(),
    }
}

fn account_options(cfg: &Config) -> Result<ui::Options> {
    let client = bluesky::Client::new(bluesky::ClientConfig {
        service_url: cfg.service.url.clone(),
        user_agent: format!("bsky-tui/{}", crate::VERSION),
        timeout: Some(cfg.service.timeout),
        http_client: None,
    })
    .context("create bluesky client")?;
    let store = credentials::Store::open(credentials::Options::default())
        .context("open credential store")?;
    let sessions = Arc::new(session::Manager::new(Arc::new(client), store));

    let mut status_message = String::new();
    if !sessions.resume().context("restore session")? && cfg.auth.has_login() {
        match sessions.login(&cfg.auth.handle, &cfg.auth.password) {
            Ok(session) => info!(handle = %session.handle, "auto-login succeeded"),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "auto-login failed");
                status_message = format!("Automatic login failed: {err:#}");
            }
        }
    }
    if status_message.is_empty() && !sessions.is_logged_in() {
        status_message = format!(
            "Tip: set BSKY_HANDLE and BSKY_PASSWORD or edit {}",
            friendly_path(config::default_path().as_ref())
        );
    }

    let feed_service: Arc<dyn FeedService> = Arc::new(data::BlueskyFeedService::new(
        Arc::clone(&sessions),
        cfg.service.page_size,
    ));
    let post_service: Arc<dyn PostService> =
        Arc::new(data::BlueskyPostService::new(Arc::clone(&sessions)));

    Ok(ui::Options {
        feed_service,
        post_service,
        handle: sessions.handle(),
        sessions: Some(sessions),
        timeline_options: cfg.timeline_options(),
        login_handle: cfg.auth.handle.clone(),
        status_message,
    })
}

fn friendly_path(path: Option<&PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "~/.config/bsky-tui/config.yaml".to_string()
    }
}
