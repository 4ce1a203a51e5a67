//! Employee list cache for the registry views.
//!
//! DESIGN
//! ======
//! `fetch` rebuilds the list wholesale; mutations patch it in place from the
//! row the store returns (append, replace by id, remove by id) so the list
//! stays ordered without a refetch.
//!
//! ERROR HANDLING
//! ==============
//! Operations return `Result` and also record the user-facing message in
//! `EmployeesState::error`, cleared on entry to the next operation. A
//! uniqueness violation on email surfaces as `RegistryError::DuplicateEmail`.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::employee::{Employee, EmployeeUpdate, NewEmployee, ValidationError};
use crate::supabase::postgrest::{PostgrestClient, PostgrestError};

pub const TABLE: &str = "funcionarios";

// =============================================================================
// TABLE ACCESS
// =============================================================================

/// Remote operations on the `funcionarios` table. Enables mocking in tests.
#[async_trait::async_trait]
pub trait EmployeeTable: Send + Sync {
    /// All rows ordered by `nome` ascending.
    async fn list(&self) -> Result<Vec<Employee>, PostgrestError>;

    /// Insert one row and return it with its assigned id.
    async fn insert(&self, employee: &NewEmployee) -> Result<Employee, PostgrestError>;

    /// Patch the row with `id`; `None` when no row matched.
    async fn update(&self, id: i64, changes: &EmployeeUpdate) -> Result<Option<Employee>, PostgrestError>;

    async fn delete(&self, id: i64) -> Result<(), PostgrestError>;
}

fn to_body<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, PostgrestError> {
    serde_json::to_value(value).map_err(|e| PostgrestError::Parse(e.to_string()))
}

#[async_trait::async_trait]
impl EmployeeTable for PostgrestClient {
    async fn list(&self) -> Result<Vec<Employee>, PostgrestError> {
        self.from(TABLE).select("*").order("nome", true).execute().await
    }

    async fn insert(&self, employee: &NewEmployee) -> Result<Employee, PostgrestError> {
        let rows: Vec<Employee> = self
            .from(TABLE)
            .insert(to_body(&[employee])?)
            .select("*")
            .execute()
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| PostgrestError::Parse("insert returned no row".to_owned()))
    }

    async fn update(&self, id: i64, changes: &EmployeeUpdate) -> Result<Option<Employee>, PostgrestError> {
        let rows: Vec<Employee> = self
            .from(TABLE)
            .update(to_body(changes)?)
            .eq("id", id)
            .select("*")
            .execute()
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn delete(&self, id: i64) -> Result<(), PostgrestError> {
        self.from(TABLE)
            .delete()
            .eq("id", id)
            .execute::<serde_json::Value>()
            .await
            .map(|_| ())
    }
}

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum RegistryError {
    #[error("data client not configured")]
    NotConfigured,
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("an employee with this email already exists")]
    DuplicateEmail,
    #[error("employee not found: {0}")]
    NotFound(i64),
    #[error(transparent)]
    Remote(PostgrestError),
}

impl From<PostgrestError> for RegistryError {
    fn from(err: PostgrestError) -> Self {
        if err.is_unique_violation() { Self::DuplicateEmail } else { Self::Remote(err) }
    }
}

impl RegistryError {
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotConfigured => "Cliente Supabase não disponível".to_owned(),
            Self::Validation(e) => e.user_message(),
            Self::DuplicateEmail => "Já existe um funcionário cadastrado com este email.".to_owned(),
            Self::NotFound(_) => "Funcionário não encontrado.".to_owned(),
            Self::Remote(PostgrestError::Api { message, .. }) => message.clone(),
            Self::Remote(_) => "Erro de comunicação com o servidor. Verifique sua conexão.".to_owned(),
        }
    }
}

// =============================================================================
// STATE
// =============================================================================

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EmployeesState {
    pub items: Vec<Employee>,
    pub loading: bool,
    pub error: Option<String>,
}

pub struct EmployeeRegistry {
    table: Option<Arc<dyn EmployeeTable>>,
    state: watch::Sender<EmployeesState>,
}

impl EmployeeRegistry {
    #[must_use]
    pub fn new(table: Option<Arc<dyn EmployeeTable>>) -> Self {
        let (state, _) = watch::channel(EmployeesState::default());
        Self { table, state }
    }

    #[must_use]
    pub fn snapshot(&self) -> EmployeesState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn items(&self) -> Vec<Employee> {
        self.state.borrow().items.clone()
    }

    #[must_use]
    pub fn get(&self, id: i64) -> Option<Employee> {
        self.state.borrow().items.iter().find(|e| e.id == id).cloned()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<EmployeesState> {
        self.state.subscribe()
    }

    fn begin(&self) {
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });
    }

    fn finish<T>(&self, op: &'static str, result: &Result<T, RegistryError>) {
        let message = result.as_ref().err().map(|e| {
            error!(op, error = %e, "employee registry operation failed");
            e.user_message()
        });
        self.state.send_modify(|s| {
            s.loading = false;
            s.error = message;
        });
    }

    fn table(&self) -> Result<&Arc<dyn EmployeeTable>, RegistryError> {
        self.table.as_ref().ok_or(RegistryError::NotConfigured)
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// Replace the list with the table's rows ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] if the client is missing or the read fails;
    /// the previous list is kept in that case.
    pub async fn fetch(&self) -> Result<usize, RegistryError> {
        self.begin();
        let result = self.fetch_inner().await;
        self.finish("fetch", &result);
        result
    }

    async fn fetch_inner(&self) -> Result<usize, RegistryError> {
        let rows = self.table()?.list().await?;
        let count = rows.len();
        self.state.send_modify(|s| s.items = rows);
        debug!(count, "employee list fetched");
        Ok(count)
    }

    /// Validate, insert, and append the stored row.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Validation`] before any remote call,
    /// [`RegistryError::DuplicateEmail`] for a taken email, or the remote
    /// failure. The list is unchanged on error.
    pub async fn create(&self, input: NewEmployee) -> Result<Employee, RegistryError> {
        self.begin();
        let result = self.create_inner(input).await;
        self.finish("create", &result);
        result
    }

    async fn create_inner(&self, input: NewEmployee) -> Result<Employee, RegistryError> {
        let valid = input.validated()?;
        let row = self.table()?.insert(&valid).await?;
        info!(id = row.id, "employee created");
        self.state.send_modify(|s| s.items.push(row.clone()));
        Ok(row)
    }

    /// Send the fields of `changes` that differ from the cached row and
    /// replace that row in place with the stored result.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Validation`] for blank required fields or an
    /// empty update, [`RegistryError::NotFound`] when no row has `id`,
    /// [`RegistryError::DuplicateEmail`], or the remote failure.
    pub async fn update(&self, id: i64, changes: EmployeeUpdate) -> Result<Employee, RegistryError> {
        self.begin();
        let result = self.update_inner(id, changes).await;
        self.finish("update", &result);
        result
    }

    async fn update_inner(&self, id: i64, changes: EmployeeUpdate) -> Result<Employee, RegistryError> {
        let changes = changes.validated()?;
        if changes.is_empty() {
            return Err(ValidationError::EmptyUpdate.into());
        }
        let table = self.table()?;

        let changes = match self.get(id) {
            Some(current) => {
                let diff = changes.changes_from(&current);
                if diff.is_empty() {
                    debug!(id, "update has no changed fields; skipping remote call");
                    return Ok(current);
                }
                diff
            }
            None => changes,
        };

        let row = table.update(id, &changes).await?.ok_or(RegistryError::NotFound(id))?;
        info!(id, "employee updated");
        self.state.send_modify(|s| match s.items.iter_mut().find(|e| e.id == id) {
            Some(slot) => *slot = row.clone(),
            None => s.items.push(row.clone()),
        });
        Ok(row)
    }

    /// Delete remotely, then drop the row from the list.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] if the client is missing or the delete
    /// fails; the list is unchanged in that case.
    pub async fn delete(&self, id: i64) -> Result<(), RegistryError> {
        self.begin();
        let result = self.delete_inner(id).await;
        self.finish("delete", &result);
        result
    }

    async fn delete_inner(&self, id: i64) -> Result<(), RegistryError> {
        self.table()?.delete(id).await?;
        info!(id, "employee deleted");
        self.state.send_modify(|s| s.items.retain(|e| e.id != id));
        Ok(())
    }
}

#[cfg(test)]
#[path = "employees_test.rs"]
mod tests;
