use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    CartAddition, CartEntry, CheckoutIntent, IntentState, Item, ItemId, PurchaseId,
    PurchaseRecord, RecordOutcome, Result, UserId, Version,
};

/// Durable store of items and their stock counters.
///
/// Every write is conditional: `guarded_decrement` on available stock,
/// `update` and `delete` on ownership (and, for `update`, on the version the
/// caller read). Implementations must never cache an item between calls.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Stores a new item. Fails if the id is already taken.
    async fn insert(&self, item: Item) -> Result<Item>;

    /// Reads the current state of an item.
    ///
    /// Fails with `ItemNotFound` if absent.
    async fn get(&self, item_id: &ItemId) -> Result<Item>;

    /// Atomically removes `requested` units from stock.
    ///
    /// Behaves as a linearizable compare-and-update on the item's quantity:
    /// fails with `InsufficientStock` (and changes nothing) when fewer than
    /// `requested` units remain, otherwise lowers the quantity, marks the
    /// item inactive iff it reached zero, and bumps its version, all as one
    /// write with no observable intermediate state.
    async fn guarded_decrement(&self, item_id: &ItemId, requested: u32) -> Result<Item>;

    /// Replaces a seller-editable item if `seller_id` owns it and its stored
    /// version still equals `expected`.
    ///
    /// Fails with `ItemNotFound`, `Forbidden`, or `VersionConflict`.
    async fn update(&self, seller_id: &UserId, item: Item, expected: Version) -> Result<Item>;

    /// Deletes an item owned by `seller_id`.
    async fn delete(&self, item_id: &ItemId, seller_id: &UserId) -> Result<()>;
}

/// Durable, per-buyer store of cart entries with passive expiry.
///
/// Entries whose `expires_at` has passed are treated as absent by every
/// read, whether or not they have been purged yet.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Creates the entry or adds to its quantity, refreshing its expiry.
    async fn add_or_increment(&self, addition: CartAddition) -> Result<CartEntry>;

    /// Returns the buyer's live entry for one item.
    async fn get(
        &self,
        buyer_id: &UserId,
        item_id: &ItemId,
        now: DateTime<Utc>,
    ) -> Result<Option<CartEntry>>;

    /// Returns all of the buyer's live entries, oldest first.
    async fn list_for_buyer(&self, buyer_id: &UserId, now: DateTime<Utc>)
    -> Result<Vec<CartEntry>>;

    /// Removes an entry. Absence is not an error.
    async fn remove(&self, buyer_id: &UserId, item_id: &ItemId) -> Result<()>;

    /// Removes the entry only if its quantity and `added_at` still match
    /// `expected`. Returns false, changing nothing, if the entry is gone or
    /// was added to since `expected` was read.
    async fn remove_if_unchanged(&self, expected: &CartEntry) -> Result<bool>;

    /// Physically drops entries that have expired. Returns how many.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Append-only store of completed purchases.
#[async_trait]
pub trait PurchaseLedger: Send + Sync {
    /// Appends a record. A second call with the same purchase id succeeds
    /// without storing a duplicate.
    async fn record(&self, record: PurchaseRecord) -> Result<RecordOutcome>;

    /// Reads one record.
    async fn get(&self, purchase_id: PurchaseId) -> Result<Option<PurchaseRecord>>;

    /// Returns a buyer's purchases, newest first.
    async fn list_for_buyer(&self, buyer_id: &UserId) -> Result<Vec<PurchaseRecord>>;
}

/// Store of checkout intents, used to detect and repair reconciliation gaps.
#[async_trait]
pub trait CheckoutJournal: Send + Sync {
    /// Persists a new pending intent.
    async fn open(&self, intent: CheckoutIntent) -> Result<()>;

    /// Moves an intent forward. Backward moves fail with `InvalidState`.
    async fn advance(
        &self,
        purchase_id: PurchaseId,
        state: IntentState,
        now: DateTime<Utc>,
    ) -> Result<CheckoutIntent>;

    /// Reads one intent.
    async fn get(&self, purchase_id: PurchaseId) -> Result<Option<CheckoutIntent>>;

    /// Returns non-terminal intents created at or before `older_than`,
    /// oldest first.
    async fn list_unfinished(&self, older_than: DateTime<Utc>) -> Result<Vec<CheckoutIntent>>;
}

// Shared handles forward to the store they point at, so services can be
// built over `Arc<dyn Catalog>` as easily as over a concrete store.

#[async_trait]
impl<T: Catalog + ?Sized> Catalog for Arc<T> {
    async fn insert(&self, item: Item) -> Result<Item> {
        (**self).insert(item).await
    }

    async fn get(&self, item_id: &ItemId) -> Result<Item> {
        (**self).get(item_id).await
    }

    async fn guarded_decrement(&self, item_id: &ItemId, requested: u32) -> Result<Item> {
        (**self).guarded_decrement(item_id, requested).await
    }

    async fn update(&self, seller_id: &UserId, item: Item, expected: Version) -> Result<Item> {
        (**self).update(seller_id, item, expected).await
    }

    async fn delete(&self, item_id: &ItemId, seller_id: &UserId) -> Result<()> {
        (**self).delete(item_id, seller_id).await
    }
}

#[async_trait]
impl<T: CartStore + ?Sized> CartStore for Arc<T> {
    async fn add_or_increment(&self, addition: CartAddition) -> Result<CartEntry> {
        (**self).add_or_increment(addition).await
    }

    async fn get(
        &self,
        buyer_id: &UserId,
        item_id: &ItemId,
        now: DateTime<Utc>,
    ) -> Result<Option<CartEntry>> {
        (**self).get(buyer_id, item_id, now).await
    }

    async fn list_for_buyer(
        &self,
        buyer_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<CartEntry>> {
        (**self).list_for_buyer(buyer_id, now).await
    }

    async fn remove(&self, buyer_id: &UserId, item_id: &ItemId) -> Result<()> {
        (**self).remove(buyer_id, item_id).await
    }

    async fn remove_if_unchanged(&self, expected: &CartEntry) -> Result<bool> {
        (**self).remove_if_unchanged(expected).await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        (**self).purge_expired(now).await
    }
}

#[async_trait]
impl<T: PurchaseLedger + ?Sized> PurchaseLedger for Arc<T> {
    async fn record(&self, record: PurchaseRecord) -> Result<RecordOutcome> {
        (**self).record(record).await
    }

    async fn get(&self, purchase_id: PurchaseId) -> Result<Option<PurchaseRecord>> {
        (**self).get(purchase_id).await
    }

    async fn list_for_buyer(&self, buyer_id: &UserId) -> Result<Vec<PurchaseRecord>> {
        (**self).list_for_buyer(buyer_id).await
    }
}

#[async_trait]
impl<T: CheckoutJournal + ?Sized> CheckoutJournal for Arc<T> {
    async fn open(&self, intent: CheckoutIntent) -> Result<()> {
        (**self).open(intent).await
    }

    async fn advance(
        &self,
        purchase_id: PurchaseId,
        state: IntentState,
        now: DateTime<Utc>,
    ) -> Result<CheckoutIntent> {
        (**self).advance(purchase_id, state, now).await
    }

    async fn get(&self, purchase_id: PurchaseId) -> Result<Option<CheckoutIntent>> {
        (**self).get(purchase_id).await
    }

    async fn list_unfinished(&self, older_than: DateTime<Utc>) -> Result<Vec<CheckoutIntent>> {
        (**self).list_unfinished(older_than).await
    }
}
