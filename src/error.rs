// src/error.rs

use thiserror::Error;

use crate::db::schema::SchemaRevision;

/// Core error types for the history store.
#[derive(Error, Debug)]
pub enum Error {
    /// Database-related errors bubbled up from `rusqlite`.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A lookup by name (or other key) found nothing.
    #[error("not found: {0}")]
    NotFound(String),

    /// An insert conflicted with an existing row, or referenced a missing
    /// foreign entity (e.g. a tag naming an unknown branch).
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// A mutating operation was attempted on a handle opened read-only.
    #[error("database was opened read-only")]
    ReadOnly,

    /// The requested operation is not supported at the database's current
    /// on-disk schema revision (e.g. `ListRecycleBin` pre-v1r2).
    #[error("{op} is not available at schema revision {revision:?}")]
    NotAvailableAtSchema {
        revision: SchemaRevision,
        op: &'static str,
    },

    /// Underlying storage I/O or corruption not otherwise classified.
    #[error("storage error: {0}")]
    Storage(String),

    /// `Create` was called against a path that already exists.
    #[error("database already exists at path: {0}")]
    AlreadyExists(String),

    /// Database not found at the given path on `Open`/`OpenWritable`.
    #[error("database not found at path: {0}")]
    DatabaseNotFound(String),

    /// Operation intentionally unimplemented for this backend variant
    /// (e.g. `PruneBranches` against the in-memory mock).
    #[error("{0} is not supported by this history store variant")]
    Unsupported(&'static str),

    /// A transactional operation was attempted while one was already open,
    /// or a commit/abort was attempted with none open.
    #[error("transaction error: {0}")]
    Transaction(String),
}

/// Result type alias using the history store's `Error` type.
pub type Result<T> = std::result::Result<T, Error>;
