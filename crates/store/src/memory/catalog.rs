use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{Catalog, Item, ItemId, Result, StoreError, UserId, Version};

#[derive(Debug, Default)]
struct CatalogState {
    items: HashMap<ItemId, Item>,
    fail_on_decrement: bool,
}

/// In-memory catalog for tests and single-process deployments.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<RwLock<CatalogState>>,
}

impl InMemoryCatalog {
    /// Creates a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the catalog to fail every guarded decrement.
    pub async fn set_fail_on_decrement(&self, fail: bool) {
        self.state.write().await.fail_on_decrement = fail;
    }

    /// Returns the number of items stored.
    pub async fn item_count(&self) -> usize {
        self.state.read().await.items.len()
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn insert(&self, item: Item) -> Result<Item> {
        let mut state = self.state.write().await;
        if state.items.contains_key(&item.item_id) {
            return Err(StoreError::InvalidState(format!(
                "item {} already exists",
                item.item_id
            )));
        }
        let item = Item {
            version: Version::first(),
            ..item.with_consistent_status()
        };
        state.items.insert(item.item_id.clone(), item.clone());
        Ok(item)
    }

    async fn get(&self, item_id: &ItemId) -> Result<Item> {
        self.state
            .read()
            .await
            .items
            .get(item_id)
            .cloned()
            .ok_or_else(|| StoreError::ItemNotFound(item_id.clone()))
    }

    async fn guarded_decrement(&self, item_id: &ItemId, requested: u32) -> Result<Item> {
        let mut state = self.state.write().await;

        if state.fail_on_decrement {
            return Err(StoreError::Unavailable(
                "catalog rejected the decrement".to_string(),
            ));
        }

        let current = state
            .items
            .get_mut(item_id)
            .ok_or_else(|| StoreError::ItemNotFound(item_id.clone()))?;

        // Decide and write under the same lock.
        let next = current.decremented(requested)?;
        *current = next.clone();
        Ok(next)
    }

    async fn update(&self, seller_id: &UserId, item: Item, expected: Version) -> Result<Item> {
        let mut state = self.state.write().await;

        let current = state
            .items
            .get_mut(&item.item_id)
            .ok_or_else(|| StoreError::ItemNotFound(item.item_id.clone()))?;

        if &current.seller_id != seller_id {
            return Err(StoreError::Forbidden {
                item_id: item.item_id,
            });
        }
        if current.version != expected {
            return Err(StoreError::VersionConflict {
                item_id: item.item_id,
                expected,
                actual: current.version,
            });
        }

        let next = Item {
            item_id: current.item_id.clone(),
            seller_id: current.seller_id.clone(),
            created_at: current.created_at,
            version: current.version.next(),
            ..item.with_consistent_status()
        };
        *current = next.clone();
        Ok(next)
    }

    async fn delete(&self, item_id: &ItemId, seller_id: &UserId) -> Result<()> {
        let mut state = self.state.write().await;

        let current = state
            .items
            .get(item_id)
            .ok_or_else(|| StoreError::ItemNotFound(item_id.clone()))?;
        if &current.seller_id != seller_id {
            return Err(StoreError::Forbidden {
                item_id: item_id.clone(),
            });
        }

        state.items.remove(item_id);
        Ok(())
    }
}
