//! The identity of the signed-in user.
//!
//! A [`Session`] is created once, by [`Session::begin`], after the host has
//! verified the user's credentials, and passed by reference to every
//! operation that records who made a change. The only state that survives a
//! restart is the username in the [`SessionMarker`] file, from which
//! [`Session::restore`] re-derives the session.

use crate::{KnowledgeBase, OryokiError, Result, Role, UserRef};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    user: UserRef,
    role: Role,
}

impl Session {
    /// Starts a session for `username` and stamps the user's last login.
    ///
    /// # Errors
    ///
    /// Returns [`OryokiError::UserNotFound`] for an unknown username and
    /// [`OryokiError::InactiveUser`] for a deactivated one.
    pub fn begin(kb: &mut KnowledgeBase, username: &str) -> Result<Self> {
        let user = kb
            .find_user_by_username(username)?
            .ok_or_else(|| {
                log::warn!("login refused for unknown user {username}");
                OryokiError::UserNotFound(username.to_string())
            })?;
        if !user.is_active {
            log::warn!("login refused for inactive user {}", user.username);
            return Err(OryokiError::InactiveUser(user.username));
        }
        kb.record_login(&user.id)?;
        log::info!("session started for {}", user.username);
        Ok(Self {
            user: user.user_ref(),
            role: user.role,
        })
    }

    /// Re-derives the session from a persisted marker.
    ///
    /// Returns `Ok(None)` when there is no marker, or when the user it names
    /// no longer exists or was deactivated; the stale marker is cleared then.
    pub fn restore(kb: &mut KnowledgeBase, marker: &SessionMarker) -> Result<Option<Self>> {
        let Some(username) = marker.read()? else {
            return Ok(None);
        };
        match Self::begin(kb, &username) {
            Ok(session) => Ok(Some(session)),
            Err(OryokiError::UserNotFound(_)) | Err(OryokiError::InactiveUser(_)) => {
                log::warn!("discarding session marker for {username}");
                marker.clear()?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Writes this session's username to `marker`.
    pub fn persist(&self, marker: &SessionMarker) -> Result<()> {
        marker
            .write(&self.user.username)
            .inspect_err(|e| log::error!("failed to persist session marker: {e}"))
    }

    /// Ends the session and removes the persisted marker.
    pub fn end(self, marker: &SessionMarker) -> Result<()> {
        log::info!("session ended for {}", self.user.username);
        marker
            .clear()
            .inspect_err(|e| log::error!("failed to clear session marker: {e}"))
    }

    pub fn user(&self) -> &UserRef {
        &self.user
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Serialize, Deserialize)]
struct MarkerFile {
    username: String,
}

/// The on-disk "current user" marker.
#[derive(Debug, Clone)]
pub struct SessionMarker {
    path: PathBuf,
}

impl SessionMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The marker next to the settings file.
    pub fn default_location() -> Self {
        Self::new(crate::core::settings::session_marker_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored username, or `None` if the marker is missing or unreadable.
    pub fn read(&self) -> Result<Option<String>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str::<MarkerFile>(&content) {
            Ok(marker) if !marker.username.is_empty() => Ok(Some(marker.username)),
            _ => {
                log::warn!("ignoring corrupt session marker at {}", self.path.display());
                Ok(None)
            }
        }
    }

    fn write(&self, username: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(&MarkerFile { username: username.to_string() })?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
