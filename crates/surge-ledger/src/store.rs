//! redb-backed ledger with compare-and-set status transitions.

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::backends::InMemoryBackend;
use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{LedgerError, LedgerResult};
use crate::tables::REQUESTS;
use crate::types::{RequestStatus, ScalingRequest, StatusChange};

/// Builds a closure mapping any displayable error into a ledger variant.
macro_rules! map_err {
    ($variant:ident) => {
        |e| LedgerError::$variant(e.to_string())
    };
}

/// Durable store of scaling requests. Cheap to clone; all clones share
/// one database handle.
#[derive(Clone)]
pub struct Ledger {
    db: Arc<Database>,
}

impl Ledger {
    /// Open (or create) the ledger at `path`.
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let ledger = Self { db: Arc::new(db) };
        ledger.ensure_tables()?;
        Ok(ledger)
    }

    /// Open a throwaway in-memory ledger.
    pub fn open_in_memory() -> LedgerResult<Self> {
        let db = Database::builder()
            .create_with_backend(InMemoryBackend::new())
            .map_err(map_err!(Open))?;
        let ledger = Self { db: Arc::new(db) };
        ledger.ensure_tables()?;
        Ok(ledger)
    }

    fn ensure_tables(&self) -> LedgerResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(REQUESTS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Write))?;
        Ok(())
    }

    /// Insert a fresh request row. Request ids are write-once: a second
    /// insert under the same id is rejected.
    pub fn create(&self, record: &ScalingRequest) -> LedgerResult<()> {
        let raw = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(REQUESTS).map_err(map_err!(Table))?;
            let exists = table
                .get(record.request_id.as_str())
                .map_err(map_err!(Read))?
                .is_some();
            if exists {
                return Err(LedgerError::Duplicate(record.request_id.clone()));
            }
            table
                .insert(record.request_id.as_str(), raw.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Write))?;
        debug!(request_id = %record.request_id, status = %record.status, "request row created");
        Ok(())
    }

    /// Fetch one request by id.
    pub fn get(&self, request_id: &str) -> LedgerResult<Option<ScalingRequest>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(REQUESTS).map_err(map_err!(Table))?;
        let Some(raw) = table.get(request_id).map_err(map_err!(Read))? else {
            return Ok(None);
        };
        let record = serde_json::from_slice(raw.value()).map_err(map_err!(Deserialize))?;
        Ok(Some(record))
    }

    /// Advance a request's status with a compare-and-set.
    ///
    /// The write succeeds only when the stored status equals `expected`,
    /// the row is not terminal, and `new_status` does not move backwards
    /// in lifecycle order. Every successful call appends to the audit
    /// trail. Read-check-write runs inside one write transaction, so
    /// racing updaters serialize and the loser gets a conflict.
    pub fn update_status(
        &self,
        request_id: &str,
        expected: RequestStatus,
        new_status: RequestStatus,
        reason: Option<&str>,
    ) -> LedgerResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(REQUESTS).map_err(map_err!(Table))?;
            let mut record = {
                let Some(raw) = table.get(request_id).map_err(map_err!(Read))? else {
                    return Err(LedgerError::NotFound(request_id.to_string()));
                };
                serde_json::from_slice::<ScalingRequest>(raw.value())
                    .map_err(map_err!(Deserialize))?
            };
            if record.status.is_terminal() {
                return Err(LedgerError::Terminal(record.status));
            }
            if record.status != expected {
                return Err(LedgerError::StatusConflict {
                    expected,
                    found: record.status,
                });
            }
            if new_status.rank() < record.status.rank() {
                return Err(LedgerError::Regression {
                    from: record.status,
                    to: new_status,
                });
            }
            let now = epoch_secs();
            record.status = new_status;
            record.status_reason = reason.map(str::to_string);
            record.updated_at = now;
            record.transitions.push(StatusChange {
                status: new_status,
                at: now,
                reason: reason.map(str::to_string),
            });
            let raw = serde_json::to_vec(&record).map_err(map_err!(Serialize))?;
            table
                .insert(request_id, raw.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Write))?;
        debug!(%request_id, from = %expected, to = %new_status, "request status updated");
        Ok(())
    }

    /// All request rows, terminal ones included. Rows are never deleted,
    /// so this is the full submission history.
    pub fn list(&self) -> LedgerResult<Vec<ScalingRequest>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(REQUESTS).map_err(map_err!(Table))?;
        let mut records = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, raw) = entry.map_err(map_err!(Read))?;
            records.push(serde_json::from_slice(raw.value()).map_err(map_err!(Deserialize))?);
        }
        Ok(records)
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PopularityTier;

    fn test_request(id: &str) -> ScalingRequest {
        ScalingRequest::new(
            id,
            "payments",
            PopularityTier::Medium,
            1,
            60,
            1_900_000_000,
            "cluster-a",
            "svc-checkout",
        )
    }

    fn advance(ledger: &Ledger, id: &str, from: RequestStatus, to: RequestStatus) {
        ledger.update_status(id, from, to, None).unwrap();
    }

    #[test]
    fn create_then_get_roundtrips() {
        let ledger = Ledger::open_in_memory().unwrap();
        let record = test_request("sr-1");
        ledger.create(&record).unwrap();
        let stored = ledger.get("sr-1").unwrap().unwrap();
        assert_eq!(stored, record);
    }

    #[test]
    fn get_unknown_returns_none() {
        let ledger = Ledger::open_in_memory().unwrap();
        assert!(ledger.get("sr-missing").unwrap().is_none());
    }

    #[test]
    fn duplicate_create_is_rejected() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger.create(&test_request("sr-1")).unwrap();
        let err = ledger.create(&test_request("sr-1")).unwrap_err();
        assert!(matches!(err, LedgerError::Duplicate(id) if id == "sr-1"));
    }

    #[test]
    fn update_status_advances_and_records_reason() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger.create(&test_request("sr-1")).unwrap();
        ledger
            .update_status(
                "sr-1",
                RequestStatus::Scheduled,
                RequestStatus::ScalingOut,
                Some("trigger fired"),
            )
            .unwrap();
        let stored = ledger.get("sr-1").unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::ScalingOut);
        assert_eq!(stored.status_reason.as_deref(), Some("trigger fired"));
        assert_eq!(stored.transitions.len(), 2);
        assert_eq!(stored.transitions[1].status, RequestStatus::ScalingOut);
        assert_eq!(stored.transitions[1].reason.as_deref(), Some("trigger fired"));
    }

    #[test]
    fn update_status_with_stale_expectation_conflicts() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger.create(&test_request("sr-1")).unwrap();
        advance(&ledger, "sr-1", RequestStatus::Scheduled, RequestStatus::ScalingOut);
        let err = ledger
            .update_status(
                "sr-1",
                RequestStatus::Scheduled,
                RequestStatus::PendingOut,
                None,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::StatusConflict {
                expected: RequestStatus::Scheduled,
                found: RequestStatus::ScalingOut,
            }
        ));
        // The losing write left no trace.
        let stored = ledger.get("sr-1").unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::ScalingOut);
        assert_eq!(stored.transitions.len(), 2);
    }

    #[test]
    fn update_status_on_unknown_request_fails() {
        let ledger = Ledger::open_in_memory().unwrap();
        let err = ledger
            .update_status(
                "sr-ghost",
                RequestStatus::Scheduled,
                RequestStatus::ScalingOut,
                None,
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(id) if id == "sr-ghost"));
    }

    #[test]
    fn status_cannot_move_backwards() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger.create(&test_request("sr-1")).unwrap();
        advance(&ledger, "sr-1", RequestStatus::Scheduled, RequestStatus::ScalingOut);
        advance(&ledger, "sr-1", RequestStatus::ScalingOut, RequestStatus::PendingOut);
        let err = ledger
            .update_status(
                "sr-1",
                RequestStatus::PendingOut,
                RequestStatus::ScalingOut,
                None,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Regression {
                from: RequestStatus::PendingOut,
                to: RequestStatus::ScalingOut,
            }
        ));
    }

    #[test]
    fn same_status_rewrite_updates_the_reason() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger.create(&test_request("sr-1")).unwrap();
        ledger
            .update_status(
                "sr-1",
                RequestStatus::Scheduled,
                RequestStatus::Scheduled,
                Some("re-armed after restart"),
            )
            .unwrap();
        let stored = ledger.get("sr-1").unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Scheduled);
        assert_eq!(stored.status_reason.as_deref(), Some("re-armed after restart"));
        assert_eq!(stored.transitions.len(), 2);
    }

    #[test]
    fn failed_is_reachable_from_any_non_terminal_status() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger.create(&test_request("sr-1")).unwrap();
        ledger
            .update_status(
                "sr-1",
                RequestStatus::Scheduled,
                RequestStatus::Failed,
                Some("could not arm trigger"),
            )
            .unwrap();
        let stored = ledger.get("sr-1").unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Failed);
        assert_eq!(stored.status_reason.as_deref(), Some("could not arm trigger"));
    }

    #[test]
    fn terminal_rows_are_frozen() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger.create(&test_request("sr-1")).unwrap();
        advance(&ledger, "sr-1", RequestStatus::Scheduled, RequestStatus::Failed);
        let err = ledger
            .update_status(
                "sr-1",
                RequestStatus::Failed,
                RequestStatus::Failed,
                Some("again"),
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::Terminal(RequestStatus::Failed)));
    }

    #[test]
    fn full_lifecycle_leaves_an_exact_audit_trail() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger.create(&test_request("sr-1")).unwrap();
        let path = [
            RequestStatus::Scheduled,
            RequestStatus::ScalingOut,
            RequestStatus::PendingOut,
            RequestStatus::SucceededOut,
            RequestStatus::ScalingIn,
            RequestStatus::PendingIn,
            RequestStatus::Completed,
        ];
        for pair in path.windows(2) {
            advance(&ledger, "sr-1", pair[0], pair[1]);
        }
        let stored = ledger.get("sr-1").unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Completed);
        let trail: Vec<RequestStatus> = stored.transitions.iter().map(|t| t.status).collect();
        assert_eq!(trail, path);

        // Completed is final, even against a failure write.
        let err = ledger
            .update_status(
                "sr-1",
                RequestStatus::Completed,
                RequestStatus::Failed,
                None,
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::Terminal(RequestStatus::Completed)));
    }

    #[test]
    fn rows_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.redb");
        {
            let ledger = Ledger::open(&path).unwrap();
            ledger.create(&test_request("sr-1")).unwrap();
            advance(&ledger, "sr-1", RequestStatus::Scheduled, RequestStatus::ScalingOut);
        }
        let ledger = Ledger::open(&path).unwrap();
        let stored = ledger.get("sr-1").unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::ScalingOut);
        assert_eq!(stored.transitions.len(), 2);
    }

    #[test]
    fn list_returns_every_row() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger.create(&test_request("sr-1")).unwrap();
        ledger.create(&test_request("sr-2")).unwrap();
        advance(&ledger, "sr-2", RequestStatus::Scheduled, RequestStatus::Failed);
        let mut ids: Vec<String> = ledger
            .list()
            .unwrap()
            .into_iter()
            .map(|r| r.request_id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["sr-1", "sr-2"]);
    }
}
