//! Auth wire types, errors, and the provider-neutral `AuthApi` trait.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by auth adapter operations.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    /// No auth client was created (missing or placeholder configuration).
    #[error("auth client not configured")]
    NotConfigured,

    /// The HTTP request never produced a response.
    #[error("auth request failed: {0}")]
    Request(String),

    /// The auth server rejected the request.
    #[error("auth error (status {status}): {message}")]
    Api { status: u16, code: Option<String>, message: String },

    /// The response body could not be deserialized.
    #[error("auth response parse failed: {0}")]
    Parse(String),
}

impl AuthError {
    /// Text suitable for the notification surface.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotConfigured => "Cliente Supabase não disponível".to_owned(),
            Self::Api { code: Some(code), .. } if code == "invalid_credentials" || code == "invalid_grant" => {
                "Email ou senha inválidos.".to_owned()
            }
            Self::Api { message, .. } => message.clone(),
            Self::Request(_) | Self::Parse(_) => "Erro de comunicação com o servidor de autenticação.".to_owned(),
        }
    }
}

// =============================================================================
// USER / SESSION
// =============================================================================

/// A Supabase auth user. Owned by the provider; locally read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub aud: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_sign_in_at: Option<String>,
}

impl User {
    /// `display_name` metadata, falling back to the email address.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.user_metadata
            .get("display_name")
            .and_then(serde_json::Value::as_str)
            .filter(|name| !name.is_empty())
            .or(self.email.as_deref())
            .unwrap_or("")
    }
}

/// A token pair bound to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
    /// Unix seconds. Older servers omit it; see [`Session::with_expiry`].
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_owned()
}

impl Session {
    /// Fill `expires_at` from `expires_in` when the server omitted it.
    #[must_use]
    pub fn with_expiry(mut self, now: i64) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = Some(now.saturating_add(self.expires_in));
        }
        self
    }

    /// `true` when the access token expires within `margin_secs` of `now`.
    #[must_use]
    pub fn is_expired(&self, now: i64, margin_secs: i64) -> bool {
        self.expires_at.is_some_and(|at| at.saturating_sub(margin_secs) <= now)
    }
}

/// Result of a sign-up call. `session` is `None` while email confirmation
/// is pending.
#[derive(Debug, Clone, PartialEq)]
pub struct SignUpData {
    pub user: Option<User>,
    pub session: Option<Session>,
}

// =============================================================================
// EVENTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthChangeEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// Session-change notification emitted by the auth adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthEvent {
    pub event: AuthChangeEvent,
    pub session: Option<Session>,
}

// =============================================================================
// AUTH API TRAIT
// =============================================================================

/// Remote auth operations. Enables in-memory fakes in tests.
#[async_trait::async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange email and password for a session.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the credentials are rejected or the
    /// request fails.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    /// Create an account with profile metadata.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the server refuses the account.
    async fn sign_up(&self, email: &str, password: &str, metadata: serde_json::Value)
    -> Result<SignUpData, AuthError>;

    /// End the current session. The local session is dropped even when the
    /// server call fails.
    ///
    /// # Errors
    ///
    /// Returns the server or transport error, if any.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Current session, refreshed first when its token has expired.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if a needed refresh fails.
    async fn get_session(&self) -> Result<Option<Session>, AuthError>;

    /// Ask the server who owns the current access token.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] on transport or parse failures.
    async fn get_user(&self) -> Result<Option<User>, AuthError>;

    /// Subscribe to session-change events.
    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent>;
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
