//! Employee records and input validation.
//!
//! Mirrors the `funcionarios` table. Required text fields are trimmed and
//! must not be blank; email is lower-cased. Uniqueness of email is enforced
//! by the store, not here.

use serde::{Deserialize, Serialize};

/// Row of the `funcionarios` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    pub nome: String,
    pub cargo: String,
    pub endereco: Option<String>,
    pub email: String,
    pub salario: Option<f64>,
}

/// Insert payload; `id` is assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NewEmployee {
    pub nome: String,
    pub cargo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endereco: Option<String>,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salario: Option<f64>,
}

/// Partial update. Outer `None` leaves a field untouched; for the optional
/// columns `Some(None)` clears the value.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct EmployeeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cargo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endereco: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salario: Option<Option<f64>>,
}

#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("required field `{0}` is empty")]
    Required(&'static str),
    #[error("invalid email")]
    InvalidEmail,
    #[error("salary must be a non-negative number")]
    InvalidSalary,
    #[error("update has no fields")]
    EmptyUpdate,
}

impl ValidationError {
    #[must_use]
    pub fn user_message(self) -> String {
        match self {
            Self::Required(field) => format!("O campo {} é obrigatório.", field_label(field)),
            Self::InvalidEmail => "Informe um email válido.".to_owned(),
            Self::InvalidSalary => "O salário deve ser um valor positivo.".to_owned(),
            Self::EmptyUpdate => "Nenhuma alteração informada.".to_owned(),
        }
    }
}

fn field_label(field: &str) -> &str {
    match field {
        "nome" => "Nome",
        "cargo" => "Cargo",
        "email" => "Email",
        other => other,
    }
}

// =============================================================================
// NORMALIZATION
// =============================================================================

#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_lowercase();
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') || normalized.contains(char::is_whitespace) {
        return None;
    }
    Some(normalized)
}

fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required(field));
    }
    Ok(trimmed.to_owned())
}

fn email(value: &str) -> Result<String, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required("email"));
    }
    normalize_email(value).ok_or(ValidationError::InvalidEmail)
}

fn address(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn salary(value: Option<f64>) -> Result<Option<f64>, ValidationError> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(ValidationError::InvalidSalary),
        other => Ok(other),
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

impl NewEmployee {
    /// Trim, lower-case and check the payload before it is sent.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found, in the order
    /// nome, cargo, email, salario.
    pub fn validated(self) -> Result<Self, ValidationError> {
        Ok(Self {
            nome: required("nome", &self.nome)?,
            cargo: required("cargo", &self.cargo)?,
            email: email(&self.email)?,
            endereco: address(self.endereco),
            salario: salary(self.salario)?,
        })
    }
}

impl EmployeeUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nome.is_none()
            && self.cargo.is_none()
            && self.endereco.is_none()
            && self.email.is_none()
            && self.salario.is_none()
    }

    /// Normalize present fields; a present required field must not be blank.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for a blank required field, a
    /// malformed email, or a negative salary.
    pub fn validated(self) -> Result<Self, ValidationError> {
        Ok(Self {
            nome: self.nome.as_deref().map(|v| required("nome", v)).transpose()?,
            cargo: self.cargo.as_deref().map(|v| required("cargo", v)).transpose()?,
            email: self.email.as_deref().map(email).transpose()?,
            endereco: self.endereco.map(address),
            salario: self.salario.map(salary).transpose()?,
        })
    }

    /// Keep only the fields whose value differs from `current`.
    #[must_use]
    pub fn changes_from(self, current: &Employee) -> Self {
        Self {
            nome: self.nome.filter(|v| *v != current.nome),
            cargo: self.cargo.filter(|v| *v != current.cargo),
            endereco: self.endereco.filter(|v| *v != current.endereco),
            email: self.email.filter(|v| *v != current.email),
            salario: self.salario.filter(|v| *v != current.salario),
        }
    }
}

#[cfg(test)]
#[path = "employee_test.rs"]
mod tests;
