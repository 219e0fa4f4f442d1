//! Checkout error types.

use store::{PurchaseId, StoreError};
use thiserror::Error;

/// Request-level checkout failures.
///
/// Per-item problems are reported as [`FailureReason`](crate::FailureReason)
/// inside a successful result, never through this type.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The request named no items.
    #[error("itemIds array is required")]
    EmptyRequest,

    /// No checkout intent has this purchase id.
    #[error("Checkout intent {0} not found")]
    IntentNotFound(PurchaseId),

    /// The intent is already completed or rejected.
    #[error("Checkout intent {0} is already finished")]
    AlreadyResolved(PurchaseId),

    /// The intent's stock decrement is known to have committed, so it can
    /// only be completed, never rejected.
    #[error("Checkout intent {0} has committed stock and can only be completed")]
    StockCommitted(PurchaseId),

    /// A store failed outside of any single item's processing.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
