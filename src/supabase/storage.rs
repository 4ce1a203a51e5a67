//! Session persistence between runs.
//!
//! The auth adapter writes the session here after every change and the
//! client reads it back once at construction. A missing, unreadable or
//! undecodable file counts as "no session"; the next sign-in overwrites it.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::types::Session;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("session file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("session encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct SessionStorage {
    path: Option<PathBuf>,
}

impl SessionStorage {
    /// Keep nothing on disk.
    #[must_use]
    pub fn memory() -> Self {
        Self { path: None }
    }

    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self { path: Some(path.into()) }
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read the persisted session, if any.
    #[must_use]
    pub fn load(&self) -> Option<Session> {
        let path = self.path.as_deref()?;
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "session file unreadable");
                return None;
            }
        };
        match serde_json::from_str::<Session>(&text) {
            Ok(session) => {
                debug!(path = %path.display(), user_id = %session.user.id, "session restored");
                Some(session)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "session file corrupt; ignoring");
                None
            }
        }
    }

    /// Write `session`, or remove the file when it is `None`.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the file cannot be written or removed.
    pub async fn save(&self, session: Option<&Session>) -> Result<(), StorageError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let Some(session) = session else {
            return match tokio::fs::remove_file(path).await {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        };

        let bytes = serde_json::to_vec(session)?;
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        // Tokens: owner read/write only.
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(path).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
