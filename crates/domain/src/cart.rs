//! Cart-add entry point and cart reads.

use std::sync::Arc;

use chrono::TimeDelta;
use common::Clock;
use serde::Deserialize;
use store::{
    CartAddition, CartEntry, CartStore, Catalog, DEFAULT_CART_TTL_DAYS, ItemId, ItemStatus,
    UserId,
};

use crate::error::{DomainError, Result};

fn default_quantity() -> u32 {
    1
}

/// Request to put some quantity of an item in a buyer's cart.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCart {
    pub item_id: ItemId,
    pub seller_id: UserId,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

impl AddToCart {
    /// Creates a request for `quantity` units.
    pub fn new(item_id: impl Into<ItemId>, seller_id: impl Into<UserId>, quantity: u32) -> Self {
        Self {
            item_id: item_id.into(),
            seller_id: seller_id.into(),
            quantity,
        }
    }
}

/// Service for managing buyer carts.
///
/// Availability is checked against the live catalog item, never against a
/// cart snapshot. The check is advisory: stock is only taken at checkout.
pub struct CartService<C: Catalog, K: CartStore> {
    catalog: C,
    carts: K,
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
}

impl<C: Catalog, K: CartStore> CartService<C, K> {
    /// Creates a cart service with the default 30-day entry lifetime.
    pub fn new(catalog: C, carts: K, clock: Arc<dyn Clock>) -> Self {
        Self {
            catalog,
            carts,
            clock,
            ttl: TimeDelta::days(DEFAULT_CART_TTL_DAYS),
        }
    }

    /// Overrides the cart entry lifetime.
    pub fn with_ttl(mut self, ttl: TimeDelta) -> Self {
        self.ttl = ttl;
        self
    }

    /// Adds an item to the buyer's cart, or raises the quantity already there.
    #[tracing::instrument(skip(self, request), fields(item_id = %request.item_id, quantity = request.quantity))]
    pub async fn add_to_cart(&self, buyer_id: &UserId, request: AddToCart) -> Result<CartEntry> {
        if request.quantity == 0 {
            return Err(DomainError::BadRequest(
                "quantity must be at least 1".to_string(),
            ));
        }
        if request.item_id.as_str().is_empty() || request.seller_id.as_str().is_empty() {
            return Err(DomainError::BadRequest(
                "itemId and sellerId are required".to_string(),
            ));
        }

        let item = self.catalog.get(&request.item_id).await?;

        if item.seller_id != request.seller_id {
            return Err(DomainError::BadRequest(format!(
                "item {} is not sold by {}",
                item.item_id, request.seller_id
            )));
        }
        if item.status != ItemStatus::Active {
            return Err(DomainError::ItemUnavailable(item.item_id));
        }
        if item.quantity < request.quantity {
            return Err(DomainError::InsufficientStock {
                item_id: item.item_id,
                requested: request.quantity,
                available: item.quantity,
            });
        }

        let addition = CartAddition::new(
            buyer_id.clone(),
            item.item_id.clone(),
            item.seller_id.clone(),
            request.quantity,
            item.snapshot(),
            self.clock.utc(),
            self.ttl,
        );
        let entry = self.carts.add_or_increment(addition).await?;

        metrics::counter!("cart_additions_total").increment(1);
        tracing::debug!(cart_quantity = entry.quantity, "Added item to cart");

        Ok(entry)
    }

    /// Returns the buyer's live cart entries, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_cart(&self, buyer_id: &UserId) -> Result<Vec<CartEntry>> {
        Ok(self.carts.list_for_buyer(buyer_id, self.clock.utc()).await?)
    }

    /// Removes an item from the buyer's cart. Absence is not an error.
    #[tracing::instrument(skip(self))]
    pub async fn remove_from_cart(&self, buyer_id: &UserId, item_id: &ItemId) -> Result<()> {
        Ok(self.carts.remove(buyer_id, item_id).await?)
    }

    /// Physically drops expired cart entries. Returns how many.
    #[tracing::instrument(skip(self))]
    pub async fn purge_expired(&self) -> Result<u64> {
        let purged = self.carts.purge_expired(self.clock.utc()).await?;
        if purged > 0 {
            tracing::info!(purged, "Purged expired cart entries");
        }
        Ok(purged)
    }
}
