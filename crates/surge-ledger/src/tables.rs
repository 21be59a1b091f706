//! redb table definitions for the scaling-request ledger.
//!
//! A single point-lookup table: `&str` request-id keys, `&[u8]` values
//! (JSON-serialized [`ScalingRequest`](crate::types::ScalingRequest) rows).

use redb::TableDefinition;

/// Scaling-request rows keyed by `{request_id}`.
pub const REQUESTS: TableDefinition<&str, &[u8]> = TableDefinition::new("scaling_requests");
