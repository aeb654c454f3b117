use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::bluesky::{self, ApiError, Session};
use crate::credentials;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("not logged in")]
    NotLoggedIn,
    #[error("handle and app password are required")]
    MissingCredentials,
}

pub struct Manager {
    client: Arc<bluesky::Client>,
    store: credentials::Store,
    active: RwLock<Option<Session>>,
    refresh_lock: Mutex<()>,
}

impl Manager {
    pub fn new(client: Arc<bluesky::Client>, store: credentials::Store) -> Self {
        Self {
            client,
            store,
            active: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn active(&self) -> Option<Session> {
        self.active.read().clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.active.read().is_some()
    }

    pub fn handle(&self) -> Option<String> {
        self.active.read().as_ref().map(|session| session.handle.clone())
    }

    /// Restores the stored session, if any. The tokens are not validated
    /// here; an expired access token is refreshed on first use.
    pub fn resume(&self) -> Result<bool> {
        if !self.store.has_session() {
            return Ok(false);
        }
        let Some(stored) = self.store.load()? else {
            return Ok(false);
        };
        info!(handle = %stored.handle, "resumed stored session");
        *self.active.write() = Some(stored.session);
        Ok(true)
    }

    pub fn login(&self, identifier: &str, password: &str) -> Result<Session> {
        let identifier = identifier.trim().trim_start_matches('@');
        if identifier.is_empty() || password.trim().is_empty() {
            return Err(SessionError::MissingCredentials.into());
        }
        let session = self
            .client
            .create_session(identifier, password.trim())
            .context("log in")?;
        if let Err(err) = self.store.save(&session.handle, &session) {
            warn!(error = %format!("{err:#}"), "could not persist session");
        }
        info!(handle = %session.handle, "logged in");
        *self.active.write() = Some(session.clone());
        Ok(session)
    }

    pub fn logout(&self) -> Result<()> {
        *self.active.write() = None;
        self.store.clear()
    }

    /// Runs `call` with the active session. If the access token has expired
    /// the session is refreshed, persisted, and `call` is retried once.
    pub fn with_session<T, F>(&self, call: F) -> Result<T>
    where
        F: Fn(&bluesky::Client, &Session) -> Result<T, ApiError>,
    {
        let session = self.active().ok_or(SessionError::NotLoggedIn)?;
        match call(self.client.as_ref(), &session) {
            Err(ApiError::ExpiredToken) => {
                let refreshed = self.refresh(&session)?;
                call(self.client.as_ref(), &refreshed).map_err(Into::into)
            }
            other => other.map_err(Into::into),
        }
    }

    fn refresh(&self, stale: &Session) -> Result<Session> {
        let _guard = self.refresh_lock.lock();
        // Another worker may have refreshed while this one waited.
        if let Some(current) = self.active() {
            if current.access_jwt != stale.access_jwt {
                return Ok(current);
            }
        }

        let refreshed = match self.client.refresh_session(stale) {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "session refresh failed");
                return Err(err).context("refresh session");
            }
        };
        info!(handle = %refreshed.handle, "refreshed session");
        if let Err(err) = self.store.save(&refreshed.handle, &refreshed) {
            warn!(error = %format!("{err:#}"), "could not persist refreshed session");
        }
        *self.active.write() = Some(refreshed.clone());
        Ok(refreshed)
    }
}
