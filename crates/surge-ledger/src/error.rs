//! Error types for the scaling-request ledger.

use thiserror::Error;

use crate::types::RequestStatus;

/// Result type alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("request not found: {0}")]
    NotFound(String),

    #[error("duplicate request id: {0}")]
    Duplicate(String),

    #[error("status conflict: expected {expected}, found {found}")]
    StatusConflict {
        expected: RequestStatus,
        found: RequestStatus,
    },

    #[error("status cannot move backwards: {from} -> {to}")]
    Regression {
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("request is terminal: {0}")]
    Terminal(RequestStatus),
}
