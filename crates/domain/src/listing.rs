//! Seller-side catalog operations.
//!
//! Seller edits go through the same conditional-write discipline as checkout
//! decrements: every update is conditioned on the version the seller's
//! change was computed from, so neither path can overwrite the other.

use std::collections::BTreeSet;
use std::sync::Arc;

use common::Clock;
use rust_decimal::Decimal;
use serde::Deserialize;
use store::{Catalog, Coordinates, Item, ItemId, ItemStatus, StoreError, UserId, Version};

use crate::error::{DomainError, Result};

/// How many times an unpinned update is retried after losing a race.
pub const MAX_UPDATE_ATTEMPTS: usize = 3;

fn default_listing_quantity() -> u32 {
    1
}

fn default_seller_name() -> String {
    "Unknown Seller".to_string()
}

/// A new listing as submitted by a seller.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewListing {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub categories: BTreeSet<String>,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default = "default_listing_quantity")]
    pub quantity: u32,
    #[serde(default = "default_seller_name")]
    pub seller_name: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

impl Default for NewListing {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            image_url: String::new(),
            categories: BTreeSet::new(),
            price: Decimal::ZERO,
            quantity: default_listing_quantity(),
            seller_name: default_seller_name(),
            city: String::new(),
            coordinates: None,
        }
    }
}

/// A partial edit of a listing. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub categories: Option<BTreeSet<String>>,
    pub price: Option<Decimal>,
    pub quantity: Option<u32>,
    pub status: Option<ItemStatus>,
    /// Pins the edit to a version the seller has seen. A pinned edit is
    /// never retried.
    pub expected_version: Option<Version>,
}

impl ItemPatch {
    /// Returns true if the patch changes no field.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.image_url.is_none()
            && self.categories.is_none()
            && self.price.is_none()
            && self.quantity.is_none()
            && self.status.is_none()
    }

    /// Applies the patch to `item`, enforcing the listing invariants.
    pub fn apply(&self, item: &Item) -> Result<Item> {
        if let Some(price) = self.price
            && price.is_sign_negative()
        {
            return Err(DomainError::BadRequest(
                "price must not be negative".to_string(),
            ));
        }

        let mut next = item.clone();
        if let Some(title) = &self.title {
            next.title = title.clone();
        }
        if let Some(description) = &self.description {
            next.description = description.clone();
        }
        if let Some(image_url) = &self.image_url {
            next.image_url = image_url.clone();
        }
        if let Some(categories) = &self.categories {
            next.categories = categories.clone();
        }
        if let Some(price) = self.price {
            next.price = price;
        }
        if let Some(quantity) = self.quantity {
            next.quantity = quantity;
        }
        if let Some(status) = self.status {
            next.status = status;
        }

        if self.status == Some(ItemStatus::Active) && next.quantity == 0 {
            return Err(DomainError::BadRequest(format!(
                "item {} cannot be active with quantity 0",
                item.item_id
            )));
        }

        Ok(next.with_consistent_status())
    }
}

/// Service for seller-owned listings.
pub struct ListingService<C: Catalog> {
    catalog: C,
    clock: Arc<dyn Clock>,
}

impl<C: Catalog> ListingService<C> {
    /// Creates a new listing service over the given catalog.
    pub fn new(catalog: C, clock: Arc<dyn Clock>) -> Self {
        Self { catalog, clock }
    }

    /// Creates a listing owned by `seller_id`.
    #[tracing::instrument(skip(self, listing), fields(title = %listing.title))]
    pub async fn create_listing(&self, seller_id: &UserId, listing: NewListing) -> Result<Item> {
        if listing.price.is_sign_negative() {
            return Err(DomainError::BadRequest(
                "price must not be negative".to_string(),
            ));
        }

        let status = if listing.quantity > 0 {
            ItemStatus::Active
        } else {
            ItemStatus::Inactive
        };

        let item = Item {
            item_id: ItemId::generate(),
            seller_id: seller_id.clone(),
            seller_name: listing.seller_name,
            title: listing.title,
            description: listing.description,
            image_url: listing.image_url,
            categories: listing.categories,
            price: listing.price,
            city: listing.city,
            coordinates: listing.coordinates,
            quantity: listing.quantity,
            status,
            created_at: self.clock.utc(),
            version: Version::first(),
        };

        let item = self.catalog.insert(item).await?;
        tracing::info!(item_id = %item.item_id, "Listing created");
        Ok(item)
    }

    /// Reads a listing.
    #[tracing::instrument(skip(self))]
    pub async fn get_listing(&self, item_id: &ItemId) -> Result<Item> {
        Ok(self.catalog.get(item_id).await?)
    }

    /// Applies a seller's patch to a listing they own.
    ///
    /// Each attempt reads the current item, applies the patch and writes it
    /// back conditioned on the version that was read. An unpinned patch is
    /// re-applied to a fresh read when a concurrent write (for example a
    /// checkout decrement) got there first.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update_listing(
        &self,
        seller_id: &UserId,
        item_id: &ItemId,
        patch: ItemPatch,
    ) -> Result<Item> {
        if patch.is_empty() {
            return Err(DomainError::BadRequest(
                "No valid fields to update".to_string(),
            ));
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let current = self.catalog.get(item_id).await?;
            if &current.seller_id != seller_id {
                return Err(DomainError::Forbidden(item_id.clone()));
            }

            let expected = patch.expected_version.unwrap_or(current.version);
            let next = patch.apply(&current)?;

            match self.catalog.update(seller_id, next, expected).await {
                Ok(updated) => {
                    tracing::info!(version = %updated.version, "Listing updated");
                    return Ok(updated);
                }
                Err(StoreError::VersionConflict { .. })
                    if patch.expected_version.is_none() && attempt < MAX_UPDATE_ATTEMPTS =>
                {
                    tracing::debug!(attempt, "Listing changed underneath update, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Deletes a listing owned by `seller_id`.
    #[tracing::instrument(skip(self))]
    pub async fn delete_listing(&self, seller_id: &UserId, item_id: &ItemId) -> Result<()> {
        self.catalog.delete(item_id, seller_id).await?;
        tracing::info!("Listing deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use common::ManualClock;
    use store::InMemoryCatalog;

    use super::*;

    fn service() -> (ListingService<InMemoryCatalog>, InMemoryCatalog) {
        let catalog = InMemoryCatalog::new();
        let service = ListingService::new(catalog.clone(), Arc::new(ManualClock::starting_now()));
        (service, catalog)
    }

    fn listing(quantity: u32) -> NewListing {
        NewListing {
            title: "Bookshelf".to_string(),
            price: Decimal::new(3000, 2),
            quantity,
            seller_name: "Sam".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_sets_owner_and_status() {
        let (service, _) = service();
        let seller = UserId::new("seller-1");

        let stocked = service.create_listing(&seller, listing(2)).await.unwrap();
        assert_eq!(stocked.seller_id, seller);
        assert_eq!(stocked.status, ItemStatus::Active);
        assert_eq!(stocked.version, Version::first());

        let empty = service.create_listing(&seller, listing(0)).await.unwrap();
        assert_eq!(empty.status, ItemStatus::Inactive);
    }

    #[tokio::test]
    async fn create_rejects_negative_price() {
        let (service, _) = service();
        let mut bad = listing(1);
        bad.price = Decimal::new(-100, 2);
        let result = service.create_listing(&UserId::new("s"), bad).await;
        assert!(matches!(result, Err(DomainError::BadRequest(_))));
    }

    #[tokio::test]
    async fn update_applies_patch_for_owner() {
        let (service, _) = service();
        let seller = UserId::new("seller-1");
        let item = service.create_listing(&seller, listing(2)).await.unwrap();

        let patch = ItemPatch {
            title: Some("Oak bookshelf".to_string()),
            price: Some(Decimal::new(2500, 2)),
            ..Default::default()
        };
        let updated = service
            .update_listing(&seller, &item.item_id, patch)
            .await
            .unwrap();

        assert_eq!(updated.title, "Oak bookshelf");
        assert_eq!(updated.price, Decimal::new(2500, 2));
        assert_eq!(updated.quantity, 2);
        assert_eq!(updated.version, Version::new(2));
    }

    #[tokio::test]
    async fn update_by_non_owner_is_forbidden() {
        let (service, _) = service();
        let item = service
            .create_listing(&UserId::new("seller-1"), listing(2))
            .await
            .unwrap();

        let patch = ItemPatch {
            title: Some("Mine now".to_string()),
            ..Default::default()
        };
        let result = service
            .update_listing(&UserId::new("intruder"), &item.item_id, patch)
            .await;
        assert!(matches!(result, Err(DomainError::Forbidden(_))));
    }

    #[tokio::test]
    async fn empty_patch_is_rejected() {
        let (service, _) = service();
        let seller = UserId::new("seller-1");
        let item = service.create_listing(&seller, listing(2)).await.unwrap();

        let result = service
            .update_listing(&seller, &item.item_id, ItemPatch::default())
            .await;
        assert!(matches!(result, Err(DomainError::BadRequest(_))));
    }

    #[tokio::test]
    async fn zero_quantity_forces_inactive_and_active_is_rejected() {
        let (service, _) = service();
        let seller = UserId::new("seller-1");
        let item = service.create_listing(&seller, listing(2)).await.unwrap();

        let sold_out = service
            .update_listing(
                &seller,
                &item.item_id,
                ItemPatch {
                    quantity: Some(0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(sold_out.status, ItemStatus::Inactive);

        let result = service
            .update_listing(
                &seller,
                &item.item_id,
                ItemPatch {
                    status: Some(ItemStatus::Active),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(DomainError::BadRequest(_))));
    }

    #[tokio::test]
    async fn pinned_stale_version_conflicts_after_checkout_decrement() {
        let (service, catalog) = service();
        let seller = UserId::new("seller-1");
        let item = service.create_listing(&seller, listing(3)).await.unwrap();

        // A sale lands between the seller's read and their write.
        catalog.guarded_decrement(&item.item_id, 1).await.unwrap();

        let patch = ItemPatch {
            quantity: Some(10),
            expected_version: Some(item.version),
            ..Default::default()
        };
        let result = service.update_listing(&seller, &item.item_id, patch).await;
        assert!(matches!(result, Err(DomainError::Conflict(_))));

        let stored = catalog.get(&item.item_id).await.unwrap();
        assert_eq!(stored.quantity, 2);
    }

    #[tokio::test]
    async fn unpinned_update_applies_to_latest_state() {
        let (service, catalog) = service();
        let seller = UserId::new("seller-1");
        let item = service.create_listing(&seller, listing(3)).await.unwrap();
        catalog.guarded_decrement(&item.item_id, 1).await.unwrap();

        let patch = ItemPatch {
            title: Some("Renamed".to_string()),
            ..Default::default()
        };
        let updated = service
            .update_listing(&seller, &item.item_id, patch)
            .await
            .unwrap();
        assert_eq!(updated.quantity, 2);
        assert_eq!(updated.version, Version::new(3));
    }

    #[tokio::test]
    async fn delete_checks_ownership() {
        let (service, _) = service();
        let seller = UserId::new("seller-1");
        let item = service.create_listing(&seller, listing(1)).await.unwrap();

        let result = service
            .delete_listing(&UserId::new("intruder"), &item.item_id)
            .await;
        assert!(matches!(result, Err(DomainError::Forbidden(_))));

        service.delete_listing(&seller, &item.item_id).await.unwrap();
        assert!(matches!(
            service.get_listing(&item.item_id).await,
            Err(DomainError::ItemNotFound(_))
        ));
    }

    #[test]
    fn patch_deserializes_camel_case_fields() {
        let patch: ItemPatch =
            serde_json::from_str(r#"{"imageUrl": "x.png", "status": "inactive"}"#).unwrap();
        assert_eq!(patch.image_url.as_deref(), Some("x.png"));
        assert_eq!(patch.status, Some(ItemStatus::Inactive));
        assert!(!patch.is_empty());
    }
}
