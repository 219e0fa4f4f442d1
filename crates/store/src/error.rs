use thiserror::Error;

use crate::{ItemId, UserId, Version};

/// Errors that can occur when interacting with the stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The item does not exist in the catalog.
    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    /// A guarded decrement asked for more units than are in stock.
    /// No mutation took place.
    #[error("Insufficient stock for item {item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: ItemId,
        requested: u32,
        available: u32,
    },

    /// The caller does not own the item it tried to mutate.
    #[error("Not authorized to modify item {item_id}")]
    Forbidden { item_id: ItemId },

    /// A conditional write lost against a concurrent writer.
    #[error("Version conflict for item {item_id}: expected version {expected}, found {actual}")]
    VersionConflict {
        item_id: ItemId,
        expected: Version,
        actual: Version,
    },

    /// Another checkout already holds an unfinished intent for this cart
    /// entry.
    #[error("Checkout already in progress for item {item_id} (buyer {buyer_id})")]
    CheckoutInProgress { buyer_id: UserId, item_id: ItemId },

    /// The requested operation is not valid for the stored state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The backend could not serve the request.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
