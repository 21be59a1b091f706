//! surge-ledger — durable scaling-request ledger.
//!
//! Backed by [redb](https://docs.rs/redb), this crate persists one row per
//! scaling request and is the audit record of the request's lifecycle:
//! every status transition is appended to the row, so the outcome of a
//! request can be reconstructed long after the workflow finished.
//!
//! # Architecture
//!
//! Rows are JSON-serialized into redb's `&[u8]` value column, keyed by the
//! request id. Status updates go through [`Ledger::update_status`], a
//! compare-and-set inside a single write transaction: the caller names the
//! status it believes the row is in, and the write is refused on mismatch.
//! Combined with the monotonic status order this prevents a stale writer
//! from regressing a request.
//!
//! The `Ledger` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{LedgerError, LedgerResult};
pub use store::Ledger;
pub use types::*;
