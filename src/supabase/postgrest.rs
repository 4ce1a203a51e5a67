//! PostgREST client with a fluent table-query builder.
//!
//! ```text
//! rest.from("funcionarios").select("*").order("nome", true).execute::<Row>()
//! rest.from("funcionarios").update(body).eq("id", 7).select("*").execute::<Row>()
//! ```
//!
//! Query shape (`select`, `eq`, `order`) is encoded into URL pairs by
//! `query_pairs` so it can be checked without a server.

use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::SessionSlot;

/// SQLSTATE for `unique_violation`, passed through by PostgREST.
pub const UNIQUE_VIOLATION: &str = "23505";

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PostgrestError {
    #[error("data request failed: {0}")]
    Request(String),
    #[error("data API error (status {status}): {message}")]
    Api { status: u16, code: Option<String>, message: String, details: Option<String>, hint: Option<String> },
    #[error("data response parse failed: {0}")]
    Parse(String),
}

impl PostgrestError {
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            Self::Request(_) | Self::Parse(_) => None,
        }
    }

    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        self.code() == Some(UNIQUE_VIOLATION)
    }
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct PostgrestClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    session: SessionSlot,
}

impl PostgrestClient {
    #[must_use]
    pub fn new(http: reqwest::Client, project_url: &str, api_key: &str, session: SessionSlot) -> Self {
        Self { http, base_url: format!("{project_url}/rest/v1"), api_key: api_key.to_owned(), session }
    }

    /// Start a query against `table`.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn from(&self, table: &str) -> QueryBuilder<'_> {
        QueryBuilder {
            client: self,
            table: table.to_owned(),
            action: Action::Select,
            columns: None,
            filters: Vec::new(),
            order: Vec::new(),
        }
    }

    /// Signed-in user's token, or the anon key when nobody is signed in.
    async fn bearer(&self) -> String {
        self.session
            .read()
            .await
            .as_ref()
            .map_or_else(|| self.api_key.clone(), |s| s.access_token.clone())
    }
}

// =============================================================================
// QUERY BUILDER
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Action {
    Select,
    Insert(serde_json::Value),
    Update(serde_json::Value),
    Delete,
}

pub struct QueryBuilder<'a> {
    client: &'a PostgrestClient,
    table: String,
    action: Action,
    columns: Option<String>,
    filters: Vec<(String, String)>,
    order: Vec<String>,
}

impl QueryBuilder<'_> {
    /// Columns to read. After a mutation, asks for the affected rows back.
    #[must_use]
    pub fn select(mut self, columns: &str) -> Self {
        self.columns = Some(columns.to_owned());
        self
    }

    #[must_use]
    pub fn insert(mut self, body: serde_json::Value) -> Self {
        self.action = Action::Insert(body);
        self
    }

    #[must_use]
    pub fn update(mut self, body: serde_json::Value) -> Self {
        self.action = Action::Update(body);
        self
    }

    #[must_use]
    pub fn delete(mut self) -> Self {
        self.action = Action::Delete;
        self
    }

    /// Equality filter: `column=eq.value`.
    #[must_use]
    pub fn eq(mut self, column: &str, value: impl std::fmt::Display) -> Self {
        self.filters.push((column.to_owned(), format!("eq.{value}")));
        self
    }

    #[must_use]
    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.order.push(format!("{column}.{direction}"));
        self
    }

    fn method(&self) -> Method {
        match self.action {
            Action::Select => Method::GET,
            Action::Insert(_) => Method::POST,
            Action::Update(_) => Method::PATCH,
            Action::Delete => Method::DELETE,
        }
    }

    fn returns_rows(&self) -> bool {
        matches!(self.action, Action::Select) || self.columns.is_some()
    }

    fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if self.returns_rows() {
            pairs.push(("select".to_owned(), self.columns.clone().unwrap_or_else(|| "*".to_owned())));
        }
        pairs.extend(self.filters.iter().cloned());
        if !self.order.is_empty() {
            pairs.push(("order".to_owned(), self.order.join(",")));
        }
        pairs
    }

    /// Send the request and decode the returned rows. Mutations without a
    /// `select` return an empty list.
    ///
    /// # Errors
    ///
    /// Returns a [`PostgrestError`] on transport failure, a non-success
    /// status (carrying the PostgREST error code), or an undecodable body.
    pub async fn execute<T: DeserializeOwned>(self) -> Result<Vec<T>, PostgrestError> {
        let client = self.client;
        let url = format!("{}/{}", client.base_url, self.table);
        let prefer = if self.returns_rows() { "return=representation" } else { "return=minimal" };

        let mut request = client
            .http
            .request(self.method(), url)
            .query(&self.query_pairs())
            .header("apikey", &client.api_key)
            .bearer_auth(client.bearer().await);

        match &self.action {
            Action::Insert(body) | Action::Update(body) => {
                request = request.header("Prefer", prefer).json(body);
            }
            Action::Delete => request = request.header("Prefer", prefer),
            Action::Select => {}
        }

        let response = request
            .send()
            .await
            .map_err(|e| PostgrestError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| PostgrestError::Request(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(parse_error(status, &text));
        }
        parse_rows(&text)
    }
}

// =============================================================================
// PARSING
// =============================================================================

fn parse_rows<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, PostgrestError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(body).map_err(|e| PostgrestError::Parse(e.to_string()))
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

fn parse_error(status: u16, body: &str) -> PostgrestError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    PostgrestError::Api {
        status,
        code: parsed.code,
        message: parsed
            .message
            .unwrap_or_else(|| format!("unexpected response: {body}")),
        details: parsed.details,
        hint: parsed.hint,
    }
}

#[cfg(test)]
#[path = "postgrest_test.rs"]
mod tests;
