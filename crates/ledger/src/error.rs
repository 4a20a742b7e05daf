//! Error types for ledger transactions.
//!
//! Every error aborts the transaction: no writes are committed and no
//! events are delivered.

use thiserror::Error;

/// Errors raised while executing a ledger transaction.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Referenced record does not exist.
    #[error("the {kind} {id} does not exist")]
    NotFound {
        /// Record kind (e.g. "training round").
        kind: &'static str,
        /// Record identifier.
        id: String,
    },

    /// Record identifier already taken.
    #[error("the {kind} {id} already exists")]
    AlreadyExists {
        /// Record kind.
        kind: &'static str,
        /// Record identifier.
        id: String,
    },

    /// Caller-supplied argument could not be parsed.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Operation not allowed in the record's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// No transaction with this name.
    #[error("unknown transaction: {0}")]
    UnknownTransaction(String),

    /// World state backend failure.
    #[error("world state error: {0}")]
    Storage(String),

    /// Stored record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LedgerError {
    /// Shorthand for [`LedgerError::NotFound`].
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        LedgerError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Shorthand for [`LedgerError::AlreadyExists`].
    pub fn already_exists(kind: &'static str, id: impl Into<String>) -> Self {
        LedgerError::AlreadyExists {
            kind,
            id: id.into(),
        }
    }

    /// Whether the error reports a missing record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::NotFound { .. })
    }
}

/// Result type alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
