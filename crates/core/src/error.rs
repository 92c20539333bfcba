//! Error model shared by the queue crates.

use thiserror::Error;

/// Result alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Deterministic failures of queue semantics: enqueue validation, state
/// machine violations, kind/queue mismatches. Anything involving I/O or a
/// backend belongs to the store's error type, not here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An enqueue or filter value failed validation (bad priority, missing
    /// target, malformed timestamp).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A job kind is unknown or not accepted by the queue it was posted to.
    #[error("invalid job type: {0}")]
    InvalidKind(String),

    /// A state-machine rule was broken (claiming a terminal job, finalizing
    /// a row that is not processing).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier did not parse.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The referenced job does not exist within the caller's scope.
    #[error("not found")]
    NotFound,

    /// A transition raced another writer and lost.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The caller's identity does not permit the operation.
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_kind(msg: impl Into<String>) -> Self {
        Self::InvalidKind(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
