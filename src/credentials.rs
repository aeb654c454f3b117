use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bluesky::Session;

const CREDENTIALS_FILE: &str = "credentials.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCredentials {
    pub handle: String,
    pub session: Session,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone)]
pub struct Options {
    pub path: Option<PathBuf>,
}

/// File-backed store for the one persisted login session.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn open(opts: Options) -> Result<Self> {
        let path = match opts.path {
            Some(path) => path,
            None => default_path().context("credentials: resolve default path")?,
        };
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_session(&self) -> bool {
        self.path.is_file()
    }

    /// Missing or unreadable credentials are reported as `None`; a corrupt
    /// file only means the user has to log in again.
    pub fn load(&self) -> Result<Option<StoredCredentials>> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("credentials: read {}", self.path.display())
                })
            }
        };
        match serde_json::from_str(&data) {
            Ok(creds) => Ok(Some(creds)),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "ignoring corrupt credentials file");
                Ok(None)
            }
        }
    }

    pub fn save(&self, handle: &str, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("credentials: create directory {}", parent.display()))?;
        }

        let creds = StoredCredentials {
            handle: handle.to_string(),
            session: session.clone(),
            saved_at: Utc::now(),
        };
        let contents =
            serde_json::to_string_pretty(&creds).context("credentials: serialize session")?;

        let mut file = open_private(&self.path)
            .with_context(|| format!("credentials: open {}", self.path.display()))?;
        file.write_all(contents.as_bytes())
            .with_context(|| format!("credentials: write {}", self.path.display()))?;
        info!(handle, "saved session credentials");
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("cleared stored credentials");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no stored credentials to clear");
                Ok(())
            }
            Err(err) => Err(err)
                .with_context(|| format!("credentials: remove {}", self.path.display())),
        }
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies on creation; tighten files left by older versions too.
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("bsky-tui").join(CREDENTIALS_FILE))
}
