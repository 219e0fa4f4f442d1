use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{PurchaseId, PurchaseLedger, PurchaseRecord, RecordOutcome, Result, StoreError, UserId};

#[derive(Debug, Default)]
struct LedgerState {
    records: HashMap<PurchaseId, PurchaseRecord>,
    fail_on_record: bool,
}

/// In-memory purchase ledger.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPurchaseLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryPurchaseLedger {
    /// Creates a new empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the ledger to fail every record call.
    pub async fn set_fail_on_record(&self, fail: bool) {
        self.state.write().await.fail_on_record = fail;
    }

    /// Returns the number of stored records.
    pub async fn record_count(&self) -> usize {
        self.state.read().await.records.len()
    }
}

#[async_trait]
impl PurchaseLedger for InMemoryPurchaseLedger {
    async fn record(&self, record: PurchaseRecord) -> Result<RecordOutcome> {
        let mut state = self.state.write().await;
        if state.fail_on_record {
            return Err(StoreError::Unavailable(
                "ledger rejected the record".to_string(),
            ));
        }
        if state.records.contains_key(&record.purchase_id) {
            return Ok(RecordOutcome::AlreadyRecorded);
        }
        state.records.insert(record.purchase_id, record);
        Ok(RecordOutcome::Inserted)
    }

    async fn get(&self, purchase_id: PurchaseId) -> Result<Option<PurchaseRecord>> {
        Ok(self.state.read().await.records.get(&purchase_id).cloned())
    }

    async fn list_for_buyer(&self, buyer_id: &UserId) -> Result<Vec<PurchaseRecord>> {
        let state = self.state.read().await;
        let mut records: Vec<_> = state
            .records
            .values()
            .filter(|r| &r.buyer_id == buyer_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }
}
