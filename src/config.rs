//! Supabase configuration parsed from environment variables.
//!
//! SYSTEM CONTEXT
//! ==============
//! Startup treats a missing or placeholder configuration as non-fatal: the
//! caller logs a warning and every remote-backed feature degrades to a
//! "not configured" error instead of crashing the process.

use std::path::PathBuf;

pub const URL_VAR: &str = "SUPABASE_URL";
pub const KEY_VAR: &str = "SUPABASE_KEY";
pub const SESSION_FILE_VAR: &str = "SUPABASE_SESSION_FILE";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Fragments found in the values shipped by the `.env` template.
const PLACEHOLDER_URL: &str = "your-project";
const PLACEHOLDER_KEY: &str = "your-anon-key";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing configuration: env var {var} not set")]
    Missing { var: &'static str },
    #[error("placeholder configuration: env var {var} still holds the template value")]
    Placeholder { var: &'static str },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    /// Project base URL without a trailing slash.
    pub url: String,
    /// Anonymous (publishable) API key.
    pub key: String,
    pub timeouts: HttpTimeouts,
    /// Where the signed-in session is kept between runs. `None` keeps it in
    /// memory only.
    pub session_file: Option<PathBuf>,
}

impl SupabaseConfig {
    /// Build typed config from environment variables.
    ///
    /// Required:
    /// - `SUPABASE_URL`
    /// - `SUPABASE_KEY`
    ///
    /// Optional:
    /// - `SUPABASE_REQUEST_TIMEOUT_SECS`: default 30
    /// - `SUPABASE_CONNECT_TIMEOUT_SECS`: default 10
    /// - `SUPABASE_SESSION_FILE`: session persistence path, unset by default
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if either required value is absent, blank,
    /// or still the template placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var(URL_VAR).ok();
        let key = std::env::var(KEY_VAR).ok();
        let timeouts = HttpTimeouts {
            request_secs: env_parse_u64("SUPABASE_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_u64("SUPABASE_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        let session_file = std::env::var(SESSION_FILE_VAR)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        Ok(Self::from_values(url.as_deref(), key.as_deref(), timeouts)?.with_session_file(session_file))
    }

    /// Validate raw values. Shared by [`Self::from_env`] and the CLI flags.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::from_env`].
    pub fn from_values(url: Option<&str>, key: Option<&str>, timeouts: HttpTimeouts) -> Result<Self, ConfigError> {
        let url = required(URL_VAR, url, PLACEHOLDER_URL)?;
        let key = required(KEY_VAR, key, PLACEHOLDER_KEY)?;

        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ConfigError::Invalid(format!("{URL_VAR} must be an http(s) URL, got '{url}'")));
        }

        Ok(Self { url: url.trim_end_matches('/').to_owned(), key: key.to_owned(), timeouts, session_file: None })
    }

    #[must_use]
    pub fn with_session_file(mut self, path: Option<PathBuf>) -> Self {
        self.session_file = path;
        self
    }
}

fn required<'a>(var: &'static str, raw: Option<&'a str>, placeholder: &str) -> Result<&'a str, ConfigError> {
    let value = raw.map(str::trim).filter(|v| !v.is_empty()).ok_or(ConfigError::Missing { var })?;
    if value.contains(placeholder) {
        return Err(ConfigError::Placeholder { var });
    }
    Ok(value)
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
