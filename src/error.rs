use thiserror::Error;

use crate::validation::ValidationErrors;

/// Errors raised by the storage layer.
///
/// Callers (the web layer) turn these into user-visible messages; nothing in
/// this crate retries or swallows them.
#[derive(Error, Debug)]
pub enum StoreError {
    /// UNIQUE, NOT NULL, CHECK or dangling foreign key on write.
    #[error("constraint violation on {table}: {detail}")]
    ConstraintViolation { table: &'static str, detail: String },

    /// Delete (or lookup type change) refused because other rows still
    /// reference this one.
    #[error("{table} {id} is still referenced by other rows")]
    ProtectedReference { table: &'static str, id: i64 },

    /// A company was created without an account and none exists yet.
    #[error("no account exists to attach the company to")]
    MissingDefaultAccount,

    /// A lookup reference points at an entry of the wrong type (or nothing).
    #[error("{field} must reference a lookup entry of type {expected:?} (got id {lookup_id})")]
    InvalidChoice {
        field: &'static str,
        expected: &'static str,
        lookup_id: i64,
    },

    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("{table} {id} not found")]
    NotFound { table: &'static str, id: i64 },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
