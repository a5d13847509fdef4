use std::sync::Arc;

use brandfeed_core::RunRecord;
use chrono::Utc;

use crate::{StateBackend, StoreError};

const LAST_RUN_SLOT: &str = "last_run";

/// Remembers the single most recently processed ingestion run.
pub struct RunLedger {
    backend: Arc<dyn StateBackend>,
}

impl RunLedger {
    #[must_use]
    pub fn new(backend: Arc<dyn StateBackend>) -> Self {
        Self { backend }
    }

    /// # Errors
    ///
    /// Returns [`StoreError`] if the ledger slot cannot be read or decoded.
    pub async fn last_run(&self) -> Result<Option<RunRecord>, StoreError> {
        match self.backend.load(LAST_RUN_SLOT).await? {
            None => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| StoreError::Decode {
                    slot: LAST_RUN_SLOT.to_string(),
                    source,
                }),
        }
    }

    /// `true` only when `run_id` equals the recorded run id exactly.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the ledger slot cannot be read or decoded.
    pub async fn already_processed(&self, run_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .last_run()
            .await?
            .is_some_and(|record| record.run_id == run_id))
    }

    /// Overwrite the ledger with `run_id`. No history is kept.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the record cannot be written.
    pub async fn record(&self, run_id: &str, item_count: usize) -> Result<RunRecord, StoreError> {
        let record = RunRecord {
            run_id: run_id.to_string(),
            processed_at: Utc::now(),
            item_count,
        };
        let value = serde_json::to_value(&record).map_err(|source| StoreError::Encode {
            slot: LAST_RUN_SLOT.to_string(),
            source,
        })?;
        self.backend.store(LAST_RUN_SLOT, &value).await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBackend;

    fn ledger() -> RunLedger {
        RunLedger::new(Arc::new(MemoryBackend::new()))
    }

    #[tokio::test]
    async fn empty_ledger_has_processed_nothing() {
        let ledger = ledger();
        assert!(ledger.last_run().await.unwrap().is_none());
        assert!(!ledger.already_processed("run-1").await.unwrap());
    }

    #[tokio::test]
    async fn record_overwrites_previous_run() {
        let ledger = ledger();
        ledger.record("run-1", 10).await.unwrap();
        ledger.record("run-2", 4).await.unwrap();

        let last = ledger.last_run().await.unwrap().unwrap();
        assert_eq!(last.run_id, "run-2");
        assert_eq!(last.item_count, 4);
        assert!(ledger.already_processed("run-2").await.unwrap());
        assert!(!ledger.already_processed("run-1").await.unwrap());
    }

    #[tokio::test]
    async fn match_is_exact() {
        let ledger = ledger();
        ledger.record("Run-1", 1).await.unwrap();
        assert!(!ledger.already_processed("run-1").await.unwrap());
        assert!(!ledger.already_processed("Run-1 ").await.unwrap());
    }

    #[tokio::test]
    async fn malformed_record_is_a_decode_error() {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .store(LAST_RUN_SLOT, &serde_json::json!("not a record"))
            .await
            .unwrap();
        let ledger = RunLedger::new(backend);
        assert!(matches!(
            ledger.last_run().await,
            Err(StoreError::Decode { .. })
        ));
    }
}
