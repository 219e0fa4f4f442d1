use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{CartAddition, CartEntry, CartStore, ItemId, Result, StoreError, UserId};

#[derive(Debug, Default)]
struct CartState {
    entries: BTreeMap<(UserId, ItemId), CartEntry>,
    fail_on_remove: bool,
}

/// In-memory cart store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartStore {
    state: Arc<RwLock<CartState>>,
}

impl InMemoryCartStore {
    /// Creates a new empty cart store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the store to fail every remove call.
    pub async fn set_fail_on_remove(&self, fail: bool) {
        self.state.write().await.fail_on_remove = fail;
    }

    /// Returns the number of stored entries, expired ones included.
    pub async fn entry_count(&self) -> usize {
        self.state.read().await.entries.len()
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn add_or_increment(&self, addition: CartAddition) -> Result<CartEntry> {
        let mut state = self.state.write().await;
        let key = (addition.buyer_id.clone(), addition.item_id.clone());

        let entry = match state.entries.remove(&key) {
            Some(existing) => addition.merge_into(existing),
            None => addition.into_entry(),
        };
        state.entries.insert(key, entry.clone());
        Ok(entry)
    }

    async fn get(
        &self,
        buyer_id: &UserId,
        item_id: &ItemId,
        now: DateTime<Utc>,
    ) -> Result<Option<CartEntry>> {
        let state = self.state.read().await;
        Ok(state
            .entries
            .get(&(buyer_id.clone(), item_id.clone()))
            .filter(|entry| !entry.is_expired(now))
            .cloned())
    }

    async fn list_for_buyer(
        &self,
        buyer_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<CartEntry>> {
        let state = self.state.read().await;
        let mut entries: Vec<_> = state
            .entries
            .values()
            .filter(|entry| &entry.buyer_id == buyer_id && !entry.is_expired(now))
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.added_at.cmp(&b.added_at));
        Ok(entries)
    }

    async fn remove(&self, buyer_id: &UserId, item_id: &ItemId) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_remove {
            return Err(StoreError::Unavailable(
                "cart store rejected the remove".to_string(),
            ));
        }
        state.entries.remove(&(buyer_id.clone(), item_id.clone()));
        Ok(())
    }

    async fn remove_if_unchanged(&self, expected: &CartEntry) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.fail_on_remove {
            return Err(StoreError::Unavailable(
                "cart store rejected the remove".to_string(),
            ));
        }
        let key = (expected.buyer_id.clone(), expected.item_id.clone());
        let unchanged = state.entries.get(&key).is_some_and(|stored| {
            stored.quantity == expected.quantity && stored.added_at == expected.added_at
        });
        if unchanged {
            state.entries.remove(&key);
        }
        Ok(unchanged)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut state = self.state.write().await;
        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_expired(now));
        Ok((before - state.entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use rust_decimal::Decimal;

    use super::*;
    use crate::{DEFAULT_CART_TTL_DAYS, ItemSnapshot};

    fn addition(buyer: &str, item: &str, quantity: u32, at: DateTime<Utc>) -> CartAddition {
        CartAddition::new(
            UserId::new(buyer),
            ItemId::new(item),
            UserId::new("seller-1"),
            quantity,
            ItemSnapshot {
                title: format!("Item {item}"),
                price: Decimal::new(500, 2),
                ..Default::default()
            },
            at,
            TimeDelta::days(DEFAULT_CART_TTL_DAYS),
        )
    }

    #[tokio::test]
    async fn add_creates_then_increments() {
        let store = InMemoryCartStore::new();
        let t = Utc::now();

        let first = store.add_or_increment(addition("b1", "I1", 2, t)).await.unwrap();
        assert_eq!(first.quantity, 2);

        let later = t + TimeDelta::hours(1);
        let second = store
            .add_or_increment(addition("b1", "I1", 1, later))
            .await
            .unwrap();
        assert_eq!(second.quantity, 3);
        assert_eq!(second.added_at, t);
        assert_eq!(second.expires_at, later + TimeDelta::days(30));
        assert_eq!(store.entry_count().await, 1);
    }

    #[tokio::test]
    async fn entries_expire_after_thirty_days() {
        let store = InMemoryCartStore::new();
        let t = Utc::now();
        let buyer = UserId::new("b1");
        store.add_or_increment(addition("b1", "I1", 1, t)).await.unwrap();

        let day_29 = store
            .list_for_buyer(&buyer, t + TimeDelta::days(29))
            .await
            .unwrap();
        assert_eq!(day_29.len(), 1);

        let day_31 = store
            .list_for_buyer(&buyer, t + TimeDelta::days(31))
            .await
            .unwrap();
        assert!(day_31.is_empty());

        let single = store
            .get(&buyer, &ItemId::new("I1"), t + TimeDelta::days(31))
            .await
            .unwrap();
        assert!(single.is_none());
    }

    #[tokio::test]
    async fn list_is_scoped_to_buyer() {
        let store = InMemoryCartStore::new();
        let t = Utc::now();
        store.add_or_increment(addition("b1", "I1", 1, t)).await.unwrap();
        store.add_or_increment(addition("b1", "I2", 1, t)).await.unwrap();
        store.add_or_increment(addition("b2", "I1", 1, t)).await.unwrap();

        let entries = store.list_for_buyer(&UserId::new("b1"), t).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.buyer_id.as_str() == "b1"));
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let store = InMemoryCartStore::new();
        let t = Utc::now();
        store.add_or_increment(addition("b1", "I1", 1, t)).await.unwrap();

        let buyer = UserId::new("b1");
        let item = ItemId::new("I1");
        store.remove(&buyer, &item).await.unwrap();
        store.remove(&buyer, &item).await.unwrap();
        assert!(store.get(&buyer, &item, t).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_if_unchanged_spares_grown_entries() {
        let store = InMemoryCartStore::new();
        let t = Utc::now();
        let read = store.add_or_increment(addition("b1", "I1", 2, t)).await.unwrap();
        store
            .add_or_increment(addition("b1", "I1", 1, t + TimeDelta::minutes(1)))
            .await
            .unwrap();

        assert!(!store.remove_if_unchanged(&read).await.unwrap());
        assert_eq!(store.entry_count().await, 1);

        let current = store
            .get(&UserId::new("b1"), &ItemId::new("I1"), t)
            .await
            .unwrap()
            .unwrap();
        assert!(store.remove_if_unchanged(&current).await.unwrap());
        assert_eq!(store.entry_count().await, 0);
        assert!(!store.remove_if_unchanged(&current).await.unwrap());
    }

    #[tokio::test]
    async fn injected_remove_failure_keeps_entry() {
        let store = InMemoryCartStore::new();
        let t = Utc::now();
        store.add_or_increment(addition("b1", "I1", 1, t)).await.unwrap();
        store.set_fail_on_remove(true).await;

        let result = store.remove(&UserId::new("b1"), &ItemId::new("I1")).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(store.entry_count().await, 1);
    }

    #[tokio::test]
    async fn purge_drops_only_expired_entries() {
        let store = InMemoryCartStore::new();
        let t = Utc::now();
        store.add_or_increment(addition("b1", "I1", 1, t)).await.unwrap();
        store
            .add_or_increment(addition("b1", "I2", 1, t + TimeDelta::days(5)))
            .await
            .unwrap();

        let purged = store.purge_expired(t + TimeDelta::days(31)).await.unwrap();
        assert_eq!(purged, 1);
        assert_eq!(store.entry_count().await, 1);
    }
}
