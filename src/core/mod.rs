//! Core business logic - framework-agnostic application lifecycle, ledgers,
//! allocation workflow and reporting.
//!
//! Every function takes its connection as a parameter; nothing here holds
//! process-wide state.

pub mod access;
pub mod allocation;
pub mod application;
pub mod budget;
pub mod eligibility;
pub mod money;
pub mod notify;
pub mod priority;
pub mod quota;
pub mod report;
pub mod retry;
pub mod scholarship;
pub mod sections;

use sea_orm::{DbErr, SqlErr};

/// Whether a storage error is a unique-constraint violation.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
