//! surge-workflow — the workflow orchestrator.
//!
//! Drives one scaling request through its lifecycle as an explicit
//! finite-state machine:
//!
//! ```text
//! ScaleOut ──► CheckOutLoop ──► Hold ──► ScaleIn ──► CheckInLoop ──► Completed
//!     │             │                        │             │
//!     └─────────────┴────────── Failed ◄─────┴─────────────┘
//! ```
//!
//! Each phase entry is persisted to the ledger with a compare-and-set,
//! so the row can never move backwards and a restart resumes from the
//! last persisted status. Settle-polling is bounded twice over: a fixed
//! number of pending observations, and a separate budget of consecutive
//! transient platform errors with exponential backoff between retries.
//!
//! [`WorkflowEngine`] runs one tokio task per request and is the only
//! place concurrency appears; inside a run everything is strictly
//! sequential. Suspension points (poll wait, backoff wait, hold) all
//! race the engine's shutdown signal, so a draining daemon suspends
//! runs without writing a terminal status.

pub mod config;
pub mod engine;
pub mod error;
pub mod run;

pub use config::WorkflowConfig;
pub use engine::WorkflowEngine;
pub use error::{WorkflowError, WorkflowResult};
pub use run::{RunOutcome, WorkflowPhase, WorkflowRun};
