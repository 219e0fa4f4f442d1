use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{CheckoutIntent, CheckoutJournal, IntentState, PurchaseId, Result, StoreError};

#[derive(Debug, Default)]
struct JournalState {
    intents: HashMap<PurchaseId, CheckoutIntent>,
    fail_on_open: bool,
    failing_advances: u32,
}

/// In-memory checkout journal.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCheckoutJournal {
    state: Arc<RwLock<JournalState>>,
}

impl InMemoryCheckoutJournal {
    /// Creates a new empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the journal to fail every open call.
    pub async fn set_fail_on_open(&self, fail: bool) {
        self.state.write().await.fail_on_open = fail;
    }

    /// Configures the journal to fail the next `count` advance calls.
    pub async fn fail_next_advances(&self, count: u32) {
        self.state.write().await.failing_advances = count;
    }

    /// Returns the number of intents in any state.
    pub async fn intent_count(&self) -> usize {
        self.state.read().await.intents.len()
    }
}

#[async_trait]
impl CheckoutJournal for InMemoryCheckoutJournal {
    async fn open(&self, intent: CheckoutIntent) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_open {
            return Err(StoreError::Unavailable(
                "journal rejected the intent".to_string(),
            ));
        }
        if state.intents.contains_key(&intent.purchase_id) {
            return Err(StoreError::InvalidState(format!(
                "checkout intent {} already exists",
                intent.purchase_id
            )));
        }
        // One unfinished intent per cart entry.
        let claimed = state.intents.values().any(|open| {
            !open.state.is_terminal()
                && open.buyer_id == intent.buyer_id
                && open.item_id == intent.item_id
        });
        if claimed {
            return Err(StoreError::CheckoutInProgress {
                buyer_id: intent.buyer_id,
                item_id: intent.item_id,
            });
        }
        state.intents.insert(intent.purchase_id, intent);
        Ok(())
    }

    async fn advance(
        &self,
        purchase_id: PurchaseId,
        next: IntentState,
        now: DateTime<Utc>,
    ) -> Result<CheckoutIntent> {
        let mut state = self.state.write().await;
        if state.failing_advances > 0 {
            state.failing_advances -= 1;
            return Err(StoreError::Unavailable(
                "journal rejected the advance".to_string(),
            ));
        }
        let intent = state.intents.get_mut(&purchase_id).ok_or_else(|| {
            StoreError::InvalidState(format!("checkout intent {purchase_id} not found"))
        })?;
        intent.advance(next, now)?;
        Ok(intent.clone())
    }

    async fn get(&self, purchase_id: PurchaseId) -> Result<Option<CheckoutIntent>> {
        Ok(self.state.read().await.intents.get(&purchase_id).cloned())
    }

    async fn list_unfinished(&self, older_than: DateTime<Utc>) -> Result<Vec<CheckoutIntent>> {
        let state = self.state.read().await;
        let mut intents: Vec<_> = state
            .intents
            .values()
            .filter(|i| !i.state.is_terminal() && i.created_at <= older_than)
            .cloned()
            .collect();
        intents.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(intents)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;
    use crate::{ItemId, ItemSnapshot, UserId};

    fn intent(created_at: DateTime<Utc>) -> CheckoutIntent {
        intent_for("I1", created_at)
    }

    fn intent_for(item: &str, created_at: DateTime<Utc>) -> CheckoutIntent {
        CheckoutIntent {
            purchase_id: PurchaseId::new(),
            buyer_id: UserId::new("b1"),
            item_id: ItemId::new(item),
            seller_id: UserId::new("seller-1"),
            quantity: 1,
            snapshot: ItemSnapshot::default(),
            state: IntentState::Pending,
            created_at,
            updated_at: created_at,
        }
    }

    #[tokio::test]
    async fn open_advance_and_get() {
        let journal = InMemoryCheckoutJournal::new();
        let t = Utc::now();
        let i = intent(t);
        journal.open(i.clone()).await.unwrap();

        let later = t + TimeDelta::seconds(1);
        let advanced = journal
            .advance(i.purchase_id, IntentState::Decremented, later)
            .await
            .unwrap();
        assert_eq!(advanced.state, IntentState::Decremented);
        assert_eq!(advanced.updated_at, later);

        let stored = journal.get(i.purchase_id).await.unwrap().unwrap();
        assert_eq!(stored.state, IntentState::Decremented);
    }

    #[tokio::test]
    async fn open_rejects_duplicates() {
        let journal = InMemoryCheckoutJournal::new();
        let i = intent(Utc::now());
        journal.open(i.clone()).await.unwrap();
        assert!(matches!(
            journal.open(i).await,
            Err(StoreError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn advance_refuses_backward_moves() {
        let journal = InMemoryCheckoutJournal::new();
        let t = Utc::now();
        let i = intent(t);
        journal.open(i.clone()).await.unwrap();
        journal
            .advance(i.purchase_id, IntentState::Recorded, t)
            .await
            .unwrap();

        let result = journal
            .advance(i.purchase_id, IntentState::Decremented, t)
            .await;
        assert!(matches!(result, Err(StoreError::InvalidState(_))));
    }

    #[tokio::test]
    async fn list_unfinished_filters_by_age_and_state() {
        let journal = InMemoryCheckoutJournal::new();
        let t = Utc::now();

        let old_pending = intent_for("I1", t - TimeDelta::minutes(10));
        let old_done = intent_for("I2", t - TimeDelta::minutes(10));
        let fresh = intent_for("I3", t);
        journal.open(old_pending.clone()).await.unwrap();
        journal.open(old_done.clone()).await.unwrap();
        journal.open(fresh).await.unwrap();
        journal
            .advance(old_done.purchase_id, IntentState::Completed, t)
            .await
            .unwrap();

        let unfinished = journal
            .list_unfinished(t - TimeDelta::minutes(5))
            .await
            .unwrap();
        assert_eq!(unfinished.len(), 1);
        assert_eq!(unfinished[0].purchase_id, old_pending.purchase_id);
    }

    #[tokio::test]
    async fn open_refuses_second_unfinished_intent_for_same_entry() {
        let journal = InMemoryCheckoutJournal::new();
        let t = Utc::now();
        let first = intent(t);
        journal.open(first.clone()).await.unwrap();

        let result = journal.open(intent(t)).await;
        assert!(matches!(
            result,
            Err(StoreError::CheckoutInProgress { ref item_id, .. }) if item_id.as_str() == "I1"
        ));

        // Other items and other buyers are unaffected
        journal.open(intent_for("I2", t)).await.unwrap();
        let mut other_buyer = intent(t);
        other_buyer.buyer_id = UserId::new("b2");
        journal.open(other_buyer).await.unwrap();

        // A finished intent releases the entry
        journal
            .advance(first.purchase_id, IntentState::Rejected, t)
            .await
            .unwrap();
        journal.open(intent(t)).await.unwrap();
        assert_eq!(journal.intent_count().await, 4);
    }

    #[tokio::test]
    async fn injected_advance_failures_run_out() {
        let journal = InMemoryCheckoutJournal::new();
        let t = Utc::now();
        let i = intent(t);
        journal.open(i.clone()).await.unwrap();
        journal.fail_next_advances(1).await;

        let failed = journal
            .advance(i.purchase_id, IntentState::Rejected, t)
            .await;
        assert!(matches!(failed, Err(StoreError::Unavailable(_))));
        journal
            .advance(i.purchase_id, IntentState::Rejected, t)
            .await
            .unwrap();
    }
}
