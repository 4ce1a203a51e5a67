//! Supabase adapters: GoTrue auth and PostgREST data access over HTTP.
//!
//! DESIGN
//! ======
//! Both adapters share one `reqwest::Client` and one session slot. The auth
//! adapter owns the slot (sign-in, refresh, sign-out write it); the data
//! adapter only reads the access token so row-level security sees the
//! signed-in user. Token lifecycle and query semantics stay on the server.
//!
//! When the configuration names a session file, the slot starts from the
//! session persisted by the previous run so the startup check can resume it.

pub mod auth;
pub mod postgrest;
pub mod storage;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::info;

use crate::config::SupabaseConfig;
pub use auth::GoTrueClient;
pub use postgrest::PostgrestClient;
pub use storage::SessionStorage;
pub use types::{AuthApi, AuthChangeEvent, AuthError, AuthEvent, Session, SignUpData, User};

/// Session currently held by the auth adapter, shared with the data adapter.
pub type SessionSlot = Arc<RwLock<Option<Session>>>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

/// Connected pair of Supabase adapters built from one configuration.
pub struct SupabaseClient {
    auth: Arc<GoTrueClient>,
    rest: Arc<PostgrestClient>,
}

impl SupabaseClient {
    /// Build both adapters from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &SupabaseConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| ClientError::HttpClientBuild(e.to_string()))?;

        let storage = config.session_file.as_ref().map_or_else(SessionStorage::memory, SessionStorage::file);
        let restored = storage.load();
        if let Some(restored) = &restored {
            info!(user_id = %restored.user.id, "resuming persisted session");
        }

        let session: SessionSlot = Arc::new(RwLock::new(restored));
        let auth = GoTrueClient::new(http.clone(), &config.url, &config.key, Arc::clone(&session)).with_storage(storage);
        let rest = PostgrestClient::new(http, &config.url, &config.key, session);
        Ok(Self { auth: Arc::new(auth), rest: Arc::new(rest) })
    }

    #[must_use]
    pub fn auth(&self) -> Arc<GoTrueClient> {
        Arc::clone(&self.auth)
    }

    #[must_use]
    pub fn rest(&self) -> Arc<PostgrestClient> {
        Arc::clone(&self.rest)
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
