//! Cart entries and the denormalized item snapshot they carry.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::item::Coordinates;
use crate::{ItemId, UserId};

/// Default lifetime of a cart entry, counted from its last add/update.
pub const DEFAULT_CART_TTL_DAYS: i64 = 30;

/// Display fields copied from an item at add-to-cart time.
///
/// Snapshots are never re-synchronized with the catalog: a price or title
/// edit made after the add is not reflected here.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSnapshot {
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub categories: BTreeSet<String>,
    pub price: Decimal,
    pub seller_name: String,
    pub city: String,
    pub coordinates: Option<Coordinates>,
}

/// A buyer's pending request for some quantity of one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartEntry {
    pub buyer_id: UserId,
    pub item_id: ItemId,
    pub seller_id: UserId,
    pub quantity: u32,
    pub snapshot: ItemSnapshot,
    pub added_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CartEntry {
    /// Returns true once `now` has reached the entry's expiry.
    ///
    /// Expired entries are logically absent even before they are purged.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Input to [`CartStore::add_or_increment`](crate::CartStore::add_or_increment).
#[derive(Debug, Clone)]
pub struct CartAddition {
    pub buyer_id: UserId,
    pub item_id: ItemId,
    pub seller_id: UserId,
    pub quantity: u32,
    pub snapshot: ItemSnapshot,
    /// Time of the add; becomes `added_at` for new entries.
    pub at: DateTime<Utc>,
    /// Refreshed expiry applied to new and existing entries alike.
    pub expires_at: DateTime<Utc>,
}

impl CartAddition {
    /// Builds an addition whose expiry is `ttl` after `at`.
    pub fn new(
        buyer_id: UserId,
        item_id: ItemId,
        seller_id: UserId,
        quantity: u32,
        snapshot: ItemSnapshot,
        at: DateTime<Utc>,
        ttl: TimeDelta,
    ) -> Self {
        Self {
            buyer_id,
            item_id,
            seller_id,
            quantity,
            snapshot,
            at,
            expires_at: at + ttl,
        }
    }

    /// Materializes a brand-new entry from this addition.
    pub fn into_entry(self) -> CartEntry {
        CartEntry {
            buyer_id: self.buyer_id,
            item_id: self.item_id,
            seller_id: self.seller_id,
            quantity: self.quantity,
            snapshot: self.snapshot,
            added_at: self.at,
            expires_at: self.expires_at,
        }
    }

    /// Folds this addition into an existing entry.
    ///
    /// A live entry keeps its snapshot and `added_at` and gains quantity.
    /// An expired one is replaced outright.
    pub fn merge_into(self, existing: CartEntry) -> CartEntry {
        if existing.is_expired(self.at) {
            return self.into_entry();
        }
        CartEntry {
            quantity: existing.quantity.saturating_add(self.quantity),
            expires_at: self.expires_at,
            ..existing
        }
    }
}
