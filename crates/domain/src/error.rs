//! Domain error types.

use store::{ItemId, StoreError};
use thiserror::Error;

/// Errors returned by the cart and listing services.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The request is missing fields or carries invalid values.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The item does not exist.
    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    /// The item exists but is not currently offered.
    #[error("Item {0} is not available")]
    ItemUnavailable(ItemId),

    /// The live item has fewer units than requested.
    #[error("Insufficient quantity available for item {item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: ItemId,
        requested: u32,
        available: u32,
    },

    /// The caller does not own the item.
    #[error("Not authorized to modify item {0}")]
    Forbidden(ItemId),

    /// A conditional write kept losing against concurrent writers.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An unclassified store failure.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ItemNotFound(item_id) => DomainError::ItemNotFound(item_id),
            StoreError::InsufficientStock {
                item_id,
                requested,
                available,
            } => DomainError::InsufficientStock {
                item_id,
                requested,
                available,
            },
            StoreError::Forbidden { item_id } => DomainError::Forbidden(item_id),
            conflict @ StoreError::VersionConflict { .. } => {
                DomainError::Conflict(conflict.to_string())
            }
            other => DomainError::Store(other),
        }
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
