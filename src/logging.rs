use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

pub const LOG_FILTER_ENV: &str = "BSKY_TUI_LOG";
const LOG_FILE_NAME: &str = "bsky-tui.log";

/// Installs the global subscriber writing to the log file. The terminal is
/// owned by the UI, so nothing is ever written to stdout or stderr.
///
/// The returned guard flushes buffered lines on drop and must be held for
/// the life of the program. `None` means a subscriber was already installed.
pub fn init(cfg: &LogConfig) -> Result<Option<WorkerGuard>> {
    let path = match cfg.file.clone() {
        Some(path) => path,
        None => default_log_path().context("logging: resolve log directory")?,
    };
    let (dir, file_name) = split_log_path(&path);
    fs::create_dir_all(&dir)
        .with_context(|| format!("logging: create directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(&dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter(&cfg.level))
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .is_ok();

    Ok(installed.then_some(guard))
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_FILTER_ENV)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| LOG_FILE_NAME.to_string());
    (dir, file_name)
}

pub fn default_log_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("bsky-tui").join(LOG_FILE_NAME))
}
