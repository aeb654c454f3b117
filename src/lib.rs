#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod bluesky;
pub mod config;
pub mod credentials;
pub mod data;
pub mod format;
pub mod logging;
pub mod session;
pub mod timeline;
pub mod ui;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::{run, RunOptions};
