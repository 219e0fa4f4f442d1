//! Per-item checkout outcomes.

use std::fmt;

use store::{ItemId, PurchaseId};

/// Why one requested item was not purchased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The buyer has no live cart entry for the item.
    NotInCart,
    /// The item no longer exists in the catalog.
    ItemNotFound,
    /// Stock could not cover the cart quantity. Nothing was changed and the
    /// cart entry is kept.
    InsufficientStock { requested: u32, available: u32 },
    /// Another checkout of the same cart entry is still unfinished.
    CheckoutInProgress,
    /// The request deadline passed before this item was started.
    DeadlineExceeded,
    /// An unclassified store failure.
    Internal(String),
}

impl FailureReason {
    /// Returns the label used for this reason in metrics.
    pub fn label(&self) -> &'static str {
        match self {
            FailureReason::NotInCart => "not_in_cart",
            FailureReason::ItemNotFound => "item_not_found",
            FailureReason::InsufficientStock { .. } => "insufficient_stock",
            FailureReason::CheckoutInProgress => "in_progress",
            FailureReason::DeadlineExceeded => "deadline_exceeded",
            FailureReason::Internal(_) => "internal",
        }
    }
}

/// A failed item together with its reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub item_id: ItemId,
    pub reason: FailureReason,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = &self.item_id;
        match &self.reason {
            FailureReason::NotInCart => write!(f, "Item {id} not in cart"),
            FailureReason::ItemNotFound => write!(f, "Item {id} not found"),
            FailureReason::InsufficientStock {
                requested,
                available,
            } => write!(
                f,
                "Item {id} has insufficient stock (requested {requested}, available {available})"
            ),
            FailureReason::CheckoutInProgress => {
                write!(f, "Item {id} is already being checked out")
            }
            FailureReason::DeadlineExceeded => {
                write!(f, "Item {id} skipped: checkout deadline exceeded")
            }
            FailureReason::Internal(msg) => write!(f, "Item {id} failed: {msg}"),
        }
    }
}

/// What a checkout call did, item by item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutResult {
    /// Purchase ids of the items that were bought, in request order.
    pub purchases: Vec<PurchaseId>,
    /// Items that were not bought, in request order.
    pub failures: Vec<ItemFailure>,
}

impl CheckoutResult {
    /// Returns the human-readable failure strings.
    pub fn error_messages(&self) -> Vec<String> {
        self.failures.iter().map(ToString::to_string).collect()
    }

    /// Returns the failure recorded for `item_id`, if any.
    pub fn failure_for(&self, item_id: &ItemId) -> Option<&FailureReason> {
        self.failures
            .iter()
            .find(|f| &f.item_id == item_id)
            .map(|f| &f.reason)
    }
}
