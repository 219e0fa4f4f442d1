use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::ItemSnapshot;
use crate::{ItemId, Result, StoreError, UserId};

/// Write counter for an item, used for conditional updates.
///
/// Every successful write to an item (seller edit or checkout decrement)
/// moves the version forward by one, so a writer that based its decision
/// on an older read can be detected and rejected.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version of a freshly inserted item.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether an item can currently be bought.
///
/// Invariant: an item with quantity 0 is always `Inactive`. An item with
/// stock may still be switched off by its seller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Active,
    Inactive,
}

impl ItemStatus {
    /// Returns the status name as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Active => "active",
            ItemStatus::Inactive => "inactive",
        }
    }

    /// Parses a stored status name.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "active" => Ok(ItemStatus::Active),
            "inactive" => Ok(ItemStatus::Inactive),
            other => Err(StoreError::InvalidState(format!(
                "unknown item status '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Geographic position of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A catalog item with a finite, shared stock counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub item_id: ItemId,
    pub seller_id: UserId,
    pub seller_name: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub categories: BTreeSet<String>,
    pub price: Decimal,
    pub city: String,
    pub coordinates: Option<Coordinates>,
    pub quantity: u32,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
    pub version: Version,
}

impl Item {
    /// Returns true if the item is active and has at least `requested` units.
    pub fn can_supply(&self, requested: u32) -> bool {
        self.status == ItemStatus::Active && self.quantity >= requested
    }

    /// Computes the state after removing `requested` units from stock.
    ///
    /// Fails with [`StoreError::InsufficientStock`] when fewer than
    /// `requested` units remain. On success the quantity drops, the status
    /// becomes `Inactive` iff the new quantity is zero, and the version
    /// advances. `self` is left untouched either way; stores apply the
    /// returned value as a single write.
    pub fn decremented(&self, requested: u32) -> Result<Item> {
        if requested == 0 {
            return Err(StoreError::InvalidState(
                "decrement quantity must be positive".to_string(),
            ));
        }

        let remaining = self
            .quantity
            .checked_sub(requested)
            .ok_or_else(|| StoreError::InsufficientStock {
                item_id: self.item_id.clone(),
                requested,
                available: self.quantity,
            })?;

        let mut next = self.clone();
        next.quantity = remaining;
        if remaining == 0 {
            next.status = ItemStatus::Inactive;
        }
        next.version = self.version.next();
        Ok(next)
    }

    /// Forces the sold-out invariant: zero stock means inactive.
    pub fn with_consistent_status(mut self) -> Self {
        if self.quantity == 0 {
            self.status = ItemStatus::Inactive;
        }
        self
    }

    /// Copies the display fields carried by cart entries and purchases.
    pub fn snapshot(&self) -> ItemSnapshot {
        ItemSnapshot {
            title: self.title.clone(),
            description: self.description.clone(),
            image_url: self.image_url.clone(),
            categories: self.categories.clone(),
            price: self.price,
            seller_name: self.seller_name.clone(),
            city: self.city.clone(),
            coordinates: self.coordinates,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn item_with_stock(id: &str, quantity: u32) -> Item {
        Item {
            item_id: ItemId::new(id),
            seller_id: UserId::new("seller-1"),
            seller_name: "Sam's Salvage".to_string(),
            title: "Cast iron pan".to_string(),
            description: "Seasoned, 10 inch".to_string(),
            image_url: "https://img.example/pan.jpg".to_string(),
            categories: BTreeSet::from(["kitchen".to_string()]),
            price: Decimal::new(1250, 2),
            city: "Pune".to_string(),
            coordinates: Some(Coordinates {
                latitude: 18.52,
                longitude: 73.85,
            }),
            quantity,
            status: ItemStatus::Active,
            created_at: Utc::now(),
            version: Version::first(),
        }
        .with_consistent_status()
    }

    #[test]
    fn decrement_keeps_item_active_while_stock_remains() {
        let item = item_with_stock("I1", 3);
        let next = item.decremented(2).unwrap();
        assert_eq!(next.quantity, 1);
        assert_eq!(next.status, ItemStatus::Active);
        assert_eq!(next.version, Version::new(2));
    }

    #[test]
    fn decrement_to_zero_deactivates() {
        let item = item_with_stock("I1", 2);
        let next = item.decremented(2).unwrap();
        assert_eq!(next.quantity, 0);
        assert_eq!(next.status, ItemStatus::Inactive);
    }

    #[test]
    fn decrement_past_stock_is_rejected() {
        let item = item_with_stock("I1", 1);
        let err = item.decremented(2).unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientStock {
                requested: 2,
                available: 1,
                ..
            }
        ));
    }

    #[test]
    fn decrement_of_zero_units_is_rejected() {
        let item = item_with_stock("I1", 1);
        assert!(matches!(
            item.decremented(0),
            Err(StoreError::InvalidState(_))
        ));
    }

    #[test]
    fn decrement_preserves_manual_deactivation() {
        let mut item = item_with_stock("I1", 5);
        item.status = ItemStatus::Inactive;
        let next = item.decremented(1).unwrap();
        assert_eq!(next.status, ItemStatus::Inactive);
    }

    #[test]
    fn sold_out_items_are_never_active() {
        let mut item = item_with_stock("I1", 0);
        assert_eq!(item.status, ItemStatus::Inactive);
        item.status = ItemStatus::Active;
        assert_eq!(item.with_consistent_status().status, ItemStatus::Inactive);
    }

    #[test]
    fn can_supply_requires_active_and_enough_stock() {
        let mut item = item_with_stock("I1", 2);
        assert!(item.can_supply(2));
        assert!(!item.can_supply(3));
        item.status = ItemStatus::Inactive;
        assert!(!item.can_supply(1));
    }

    #[test]
    fn status_round_trips_through_storage_names() {
        for status in [ItemStatus::Active, ItemStatus::Inactive] {
            assert_eq!(ItemStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(ItemStatus::parse("archived").is_err());
    }
}
