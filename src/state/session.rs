//! Session mirror for the current user.
//!
//! SYSTEM CONTEXT
//! ==============
//! Used by the route guard and the console to decide what the user may see.
//! The mirror is a read-only copy of what the auth provider reports; it is
//! never the authority.
//!
//! DESIGN
//! ======
//! Every login, logout, session check and auth event funnels through
//! [`SessionStore::sync_user_state`], the single writer of the user cell.
//! The auth-event listener is started at most once per store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::supabase::types::{AuthApi, AuthError, AuthEvent, Session, User};

/// Snapshot of the mirror.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AuthSnapshot {
    pub user: Option<User>,
    pub loading: bool,
}

/// Outcome of a successful sign-up.
#[derive(Clone, Debug, PartialEq)]
pub enum SignUpOutcome {
    /// Account exists but has no session until the email link is followed.
    ConfirmationPending { user: Option<User> },
    /// Account created and signed in.
    SignedIn { user: User },
}

impl SignUpOutcome {
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::ConfirmationPending { .. } => "Conta criada! Verifique seu email para confirmar a conta.",
            Self::SignedIn { .. } => "Conta criada e login realizado com sucesso!",
        }
    }
}

/// Handle for the auth-event listener task.
pub struct AuthSubscription {
    handle: JoinHandle<()>,
}

impl AuthSubscription {
    /// Stop listening for auth events.
    pub fn unsubscribe(self) {
        self.handle.abort();
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

pub struct SessionStore {
    auth: Option<Arc<dyn AuthApi>>,
    state: watch::Sender<AuthSnapshot>,
    initialized: AtomicBool,
}

impl SessionStore {
    #[must_use]
    pub fn new(auth: Option<Arc<dyn AuthApi>>) -> Self {
        let (state, _) = watch::channel(AuthSnapshot::default());
        Self { auth, state, initialized: AtomicBool::new(false) }
    }

    // =========================================================================
    // READ-ONLY VIEWS
    // =========================================================================

    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().user.is_some()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver that observes every mirror change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.state.subscribe()
    }

    pub(crate) fn auth_client(&self) -> Option<&Arc<dyn AuthApi>> {
        self.auth.as_ref()
    }

    // =========================================================================
    // WRITE-THROUGH
    // =========================================================================

    /// The only writer of the user cell.
    pub fn sync_user_state(&self, user: Option<User>) {
        debug!(user_id = ?user.as_ref().map(|u| u.id), "sync user state");
        self.state.send_modify(|s| s.user = user);
    }

    fn set_loading(&self, loading: bool) {
        self.state.send_if_modified(|s| {
            let changed = s.loading != loading;
            s.loading = loading;
            changed
        });
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotConfigured`] without an auth client, or the
    /// provider's rejection. The mirror is untouched on error.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let auth = self.auth.as_ref().ok_or(AuthError::NotConfigured)?;

        self.set_loading(true);
        let result = auth.sign_in_with_password(email.trim(), password).await;
        self.set_loading(false);

        match result {
            Ok(session) => {
                info!(user_id = %session.user.id, "login succeeded");
                self.sync_user_state(Some(session.user.clone()));
                Ok(session.user)
            }
            Err(e) => {
                error!(error = %e, "login failed");
                Err(e)
            }
        }
    }

    /// Create an account. `display_name` becomes profile metadata.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotConfigured`] without an auth client, or the
    /// provider's rejection.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<SignUpOutcome, AuthError> {
        let auth = self.auth.as_ref().ok_or(AuthError::NotConfigured)?;
        let email = email.trim();

        self.set_loading(true);
        let result = auth
            .sign_up(email, password, signup_metadata(email, display_name))
            .await;
        self.set_loading(false);

        let data = result.inspect_err(|e| error!(error = %e, "sign-up failed"))?;
        match (data.user, data.session) {
            (_, Some(session)) => {
                info!(user_id = %session.user.id, "sign-up succeeded with active session");
                self.sync_user_state(Some(session.user.clone()));
                Ok(SignUpOutcome::SignedIn { user: session.user })
            }
            (user, None) => {
                info!("sign-up succeeded; email confirmation pending");
                Ok(SignUpOutcome::ConfirmationPending { user })
            }
        }
    }

    /// Sign out. The mirror is cleared whatever the provider answers.
    ///
    /// # Errors
    ///
    /// Returns the provider's error after the mirror has been cleared.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let Some(auth) = self.auth.as_ref() else {
            self.sync_user_state(None);
            return Ok(());
        };

        self.set_loading(true);
        let result = auth.sign_out().await;
        self.sync_user_state(None);
        self.set_loading(false);

        if let Err(e) = &result {
            error!(error = %e, "logout failed remotely; local session cleared");
        }
        result
    }

    /// Ask the provider for the active session and mirror it. A failed
    /// check clears the mirror.
    pub async fn check_session(&self) -> Option<Session> {
        let auth = self.auth.as_ref()?;
        match auth.get_session().await {
            Ok(session) => {
                self.sync_user_state(session.as_ref().map(|s| s.user.clone()));
                session
            }
            Err(e) => {
                error!(error = %e, "session check failed");
                self.sync_user_state(None);
                None
            }
        }
    }

    /// Run one session check and start mirroring auth events.
    ///
    /// Returns `None` when no auth client is configured or when the
    /// listener is already running for this store.
    pub async fn initialize_auth(self: &Arc<Self>) -> Option<AuthSubscription> {
        let Some(auth) = self.auth.as_ref() else {
            warn!("auth not initialized: Supabase client unavailable");
            return None;
        };
        if self.initialized.swap(true, Ordering::SeqCst) {
            debug!("auth already initialized");
            return None;
        }

        // Subscribe before the check so no event between the two is lost.
        let events = auth.on_auth_state_change();
        self.check_session().await;

        let handle = tokio::spawn(listen(Arc::downgrade(self), events));
        info!("auth state listener started");
        Some(AuthSubscription { handle })
    }

    fn apply_event(&self, event: AuthEvent) {
        debug!(event = ?event.event, "auth state change");
        self.sync_user_state(event.session.map(|s| s.user));
    }

    async fn resync(&self) {
        self.check_session().await;
    }
}

async fn listen(store: Weak<SessionStore>, mut events: broadcast::Receiver<AuthEvent>) {
    loop {
        let received = events.recv().await;
        let Some(live) = store.upgrade() else {
            return;
        };
        match received {
            Ok(event) => live.apply_event(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "auth listener lagged; resyncing session");
                live.resync().await;
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("auth event stream closed");
                return;
            }
        }
    }
}

/// Profile metadata sent on sign-up.
#[must_use]
pub fn signup_metadata(email: &str, display_name: Option<&str>) -> serde_json::Value {
    let name = display_name.map(str::trim).filter(|n| !n.is_empty());
    let local_part = email.split('@').next().unwrap_or_default();
    serde_json::json!({
        "full_name": name.unwrap_or_default(),
        "display_name": name.unwrap_or(local_part),
    })
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
