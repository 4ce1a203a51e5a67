//! Route guard run on every navigation.
//!
//! SYSTEM CONTEXT
//! ==============
//! The console calls [`RouteGuard::check`] before showing any page. The
//! guard asks the auth provider for the session on every call instead of
//! trusting the mirror, which may be stale relative to token expiry, and
//! fixes the mirror when the two disagree.
//!
//! ERROR HANDLING
//! ==============
//! Fail closed: a provider failure counts as "no session", so only public
//! routes stay reachable. Without a configured provider the guard is a
//! no-op and permits every navigation.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::state::session::SessionStore;
use crate::supabase::types::User;

pub const LOGIN_ROUTE: &str = "/login";
pub const HOME_ROUTE: &str = "/";
pub const PUBLIC_ROUTES: &[&str] = &[LOGIN_ROUTE];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Permit,
    Redirect { to: String, replace: bool },
}

impl Navigation {
    fn redirect(to: &str) -> Self {
        Self::Redirect { to: to.to_owned(), replace: true }
    }
}

/// Strip query and fragment, and any trailing slash except on the root.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default().trim();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return HOME_ROUTE.to_owned();
    }
    if trimmed.starts_with('/') { trimmed.to_owned() } else { format!("/{trimmed}") }
}

#[must_use]
pub fn is_public_route(path: &str) -> bool {
    PUBLIC_ROUTES.contains(&path)
}

/// Decision table for one navigation.
#[must_use]
pub fn decide(authenticated: bool, path: &str) -> Navigation {
    match (authenticated, is_public_route(path)) {
        (true, true) => Navigation::redirect(HOME_ROUTE),
        (false, false) => Navigation::redirect(LOGIN_ROUTE),
        _ => Navigation::Permit,
    }
}

pub struct RouteGuard {
    session: Arc<SessionStore>,
}

impl RouteGuard {
    #[must_use]
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self { session }
    }

    /// Classify a navigation to `path`.
    pub async fn check(&self, path: &str) -> Navigation {
        let path = normalize_path(path);
        let Some(auth) = self.session.auth_client() else {
            warn!(%path, "route guard running without Supabase client; navigation permitted");
            return Navigation::Permit;
        };

        let authenticated = match auth.get_session().await {
            Ok(session) => {
                let user = session.map(|s| s.user);
                self.reconcile(user.as_ref());
                user.is_some()
            }
            Err(e) => {
                error!(%path, error = %e, "route guard could not verify session; failing closed");
                false
            }
        };

        let navigation = decide(authenticated, &path);
        debug!(%path, authenticated, ?navigation, "route guard");
        navigation
    }

    /// Write the fresh session into the mirror only when they disagree.
    fn reconcile(&self, fresh: Option<&User>) {
        let mirrored = self.session.current_user().map(|u| u.id);
        if mirrored != fresh.map(|u| u.id) {
            self.session.sync_user_state(fresh.cloned());
        }
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
