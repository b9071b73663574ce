//! Error types for the chain indexing core.
//!
//! Validation errors (`BadCursor`, `InvalidArgument`) surface immediately and
//! are never retried; `Storage` wraps the underlying engine error after the
//! owning transaction has rolled back, and callers may retry it. A "not
//! found" row is deliberately not a variant here — absent rows are
//! represented as `Option::None` at the call site, not as an error.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    /// Cursor bytes did not decode to valid JSON of the expected arity.
    #[error("bad cursor: {0}")]
    BadCursor(String),

    /// A caller-supplied argument violates a documented precondition.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The underlying storage engine reported an error.
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, IndexError>;
