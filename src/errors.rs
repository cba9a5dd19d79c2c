//! Unified error types for the scholarship engine.
//!
//! Every fallible operation returns [`Result`]. Variants are grouped into the
//! client-facing [`ErrorKind`] taxonomy by [`Error::kind`], and
//! [`Error::user_message`] renders the message a client is allowed to see.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// A single violated rule reported by a validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field or requirement that failed (e.g. `"personal_info.email"`)
    pub field: String,
    /// Human-readable description of the problem
    pub message: String,
}

impl FieldError {
    /// Creates a field error from anything string-like.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Client-facing error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input or incomplete required data
    Validation,
    /// Referenced entity does not exist
    NotFound,
    /// Wrong current state or uniqueness violated
    Conflict,
    /// Caller lacks ownership or role
    Forbidden,
    /// Quota or budget capacity is gone
    ExhaustedResource,
    /// Storage, configuration or other internal failure
    Internal,
}

/// All errors produced by the engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation failed: {}", summarize(.errors))]
    Validation { errors: Vec<FieldError> },

    #[error("Invalid amount: {amount}")]
    InvalidAmount { amount: Decimal },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Scholarship {scholarship_id} has no remaining quota")]
    QuotaExhausted { scholarship_id: i64 },

    #[error(
        "Budget {budget_year} for scholarship {scholarship_id} cannot cover {requested} (remaining {remaining})"
    )]
    BudgetExceeded {
        scholarship_id: i64,
        budget_year: i32,
        requested: Decimal,
        remaining: Decimal,
    },
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Shorthand for a `NotFound` error keyed by any displayable id.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for a `Conflict` error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Shorthand for a `Forbidden` error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Builds a validation error from a single field failure.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            errors: vec![FieldError::new(field, message)],
        }
    }

    /// Maps the error onto the client-facing taxonomy.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } | Self::InvalidAmount { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::QuotaExhausted { .. } | Self::BudgetExceeded { .. } => {
                ErrorKind::ExhaustedResource
            }
            Self::Config { .. }
            | Self::Database(_)
            | Self::Io(_)
            | Self::EnvVar(_)
            | Self::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// Every violated rule for validation failures, empty otherwise.
    #[must_use]
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Validation { errors } => errors,
            _ => &[],
        }
    }

    /// Message safe to show to a client: no identifiers, no storage details.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { errors } => {
                format!("{} field(s) need attention", errors.len())
            }
            Self::InvalidAmount { .. } => "The amount is not a valid currency value".to_string(),
            Self::NotFound { entity, .. } => format!("The requested {entity} was not found"),
            Self::Conflict { message } | Self::Forbidden { message } => message.clone(),
            Self::QuotaExhausted { .. } => {
                "This scholarship has no remaining recipient places".to_string()
            }
            Self::BudgetExceeded { .. } => {
                "The scholarship budget cannot cover this allocation".to_string()
            }
            Self::Config { .. }
            | Self::Database(_)
            | Self::Io(_)
            | Self::EnvVar(_)
            | Self::Serialization(_) => "An internal error occurred".to_string(),
        }
    }

    /// Whether a read that failed with this error may be retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Database(sea_orm::DbErr::ConnectionAcquire(_) | sea_orm::DbErr::Conn(_))
        )
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
