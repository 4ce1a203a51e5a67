//! GoTrue (Supabase Auth) client.
//!
//! Thin HTTP wrapper for `/auth/v1`. Pure parsing in `parse_session`,
//! `parse_sign_up` and `parse_error` for testability. Every change to the
//! held session is announced on a broadcast channel and written through to
//! the [`SessionStorage`].

use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::SessionSlot;
use super::storage::SessionStorage;
use super::types::{AuthApi, AuthChangeEvent, AuthError, AuthEvent, Session, SignUpData, User};

/// Refresh this many seconds before the access token actually expires.
const EXPIRY_MARGIN_SECS: i64 = 30;
const EVENT_CAPACITY: usize = 16;

// =============================================================================
// CLIENT
// =============================================================================

pub struct GoTrueClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    session: SessionSlot,
    storage: SessionStorage,
    events: broadcast::Sender<AuthEvent>,
}

impl GoTrueClient {
    #[must_use]
    pub fn new(http: reqwest::Client, project_url: &str, api_key: &str, session: SessionSlot) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            http,
            base_url: format!("{project_url}/auth/v1"),
            api_key: api_key.to_owned(),
            session,
            storage: SessionStorage::memory(),
            events,
        }
    }

    /// Persist every session change to `storage`.
    #[must_use]
    pub fn with_storage(mut self, storage: SessionStorage) -> Self {
        self.storage = storage;
        self
    }

    fn emit(&self, event: AuthChangeEvent, session: Option<Session>) {
        // No subscribers is fine.
        let _ = self.events.send(AuthEvent { event, session });
    }

    async fn store(&self, session: Option<Session>) {
        self.persist(session.as_ref()).await;
        *self.session.write().await = session;
    }

    async fn persist(&self, session: Option<&Session>) {
        if let Err(e) = self.storage.save(session).await {
            warn!(path = ?self.storage.path(), error = %e, "session persistence failed");
        }
    }

    async fn post_token(&self, grant_type: &str, body: serde_json::Value) -> Result<Session, AuthError> {
        let response = self
            .http
            .post(format!("{}/token", self.base_url))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(parse_error(status, &text));
        }
        parse_session(&text, unix_now())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
        debug!("refreshing expired session");
        self.post_token("refresh_token", serde_json::json!({ "refresh_token": refresh_token }))
            .await
    }
}

#[async_trait::async_trait]
impl AuthApi for GoTrueClient {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let session = self
            .post_token("password", serde_json::json!({ "email": email, "password": password }))
            .await?;
        self.store(Some(session.clone())).await;
        self.emit(AuthChangeEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> Result<SignUpData, AuthError> {
        let response = self
            .http
            .post(format!("{}/signup", self.base_url))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password, "data": metadata }))
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(parse_error(status, &text));
        }

        let data = parse_sign_up(&text, unix_now())?;
        if let Some(session) = &data.session {
            self.store(Some(session.clone())).await;
            self.emit(AuthChangeEvent::SignedIn, Some(session.clone()));
        }
        Ok(data)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let Some(session) = self.session.write().await.take() else {
            return Ok(());
        };
        self.persist(None).await;
        self.emit(AuthChangeEvent::SignedOut, None);

        let response = self
            .http
            .post(format!("{}/logout", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        // 401/404: token already revoked or expired on the server.
        if (200..300).contains(&status) || status == 401 || status == 404 {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(parse_error(status, &text))
    }

    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let current = self.session.read().await.clone();
        let Some(session) = current else {
            return Ok(None);
        };
        if !session.is_expired(unix_now(), EXPIRY_MARGIN_SECS) {
            return Ok(Some(session));
        }

        match self.refresh(&session.refresh_token).await {
            Ok(refreshed) => {
                self.store(Some(refreshed.clone())).await;
                self.emit(AuthChangeEvent::TokenRefreshed, Some(refreshed.clone()));
                Ok(Some(refreshed))
            }
            Err(e @ AuthError::Api { .. }) => {
                warn!(error = %e, "session refresh rejected; signing out locally");
                self.store(None).await;
                self.emit(AuthChangeEvent::SignedOut, None);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn get_user(&self) -> Result<Option<User>, AuthError> {
        let Some(session) = self.get_session().await? else {
            return Ok(None);
        };

        let response = self
            .http
            .get(format!("{}/user", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            return Ok(None);
        }
        let text = response
            .text()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(parse_error(status, &text));
        }
        serde_json::from_str::<User>(&text)
            .map(Some)
            .map_err(|e| AuthError::Parse(e.to_string()))
    }

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

fn unix_now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

// =============================================================================
// PARSING
// =============================================================================

fn parse_session(json: &str, now: i64) -> Result<Session, AuthError> {
    let session: Session = serde_json::from_str(json).map_err(|e| AuthError::Parse(e.to_string()))?;
    Ok(session.with_expiry(now))
}

/// Sign-up answers with a full session when auto-confirm is on, or with the
/// bare user while the confirmation email is outstanding.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(Session),
    User(User),
}

fn parse_sign_up(json: &str, now: i64) -> Result<SignUpData, AuthError> {
    let parsed: SignUpResponse = serde_json::from_str(json).map_err(|e| AuthError::Parse(e.to_string()))?;
    Ok(match parsed {
        SignUpResponse::Session(session) => {
            let session = session.with_expiry(now);
            SignUpData { user: Some(session.user.clone()), session: Some(session) }
        }
        SignUpResponse::User(user) => SignUpData { user: Some(user), session: None },
    })
}

/// GoTrue has shipped two error shapes: `{error, error_description}` and
/// `{code, error_code, msg}`. Accept either.
#[derive(Deserialize, Default)]
struct ErrorBody {
    error: Option<String>,
    error_description: Option<String>,
    error_code: Option<String>,
    msg: Option<String>,
    message: Option<String>,
}

fn parse_error(status: u16, body: &str) -> AuthError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .msg
        .or(parsed.error_description)
        .or(parsed.message)
        .or_else(|| parsed.error.clone())
        .unwrap_or_else(|| format!("unexpected response: {body}"));
    let code = parsed.error_code.or(parsed.error);
    AuthError::Api { status, code, message }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
