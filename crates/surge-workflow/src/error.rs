//! Error types for workflow execution.

use thiserror::Error;

use surge_ledger::LedgerError;

pub type WorkflowResult<T> = Result<T, WorkflowError>;

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The trigger fired for a request the ledger has never seen.
    #[error("request not found in ledger: {0}")]
    UnknownRequest(String),

    /// A workflow run is already driving this request.
    #[error("workflow already active for request: {0}")]
    AlreadyActive(String),

    /// Ledger access failed; includes compare-and-set conflicts, which
    /// mean a newer writer owns the row and this run must abort.
    #[error("ledger operation failed: {0}")]
    Ledger(#[from] LedgerError),
}
