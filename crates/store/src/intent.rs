//! Checkout intents: the pending marker written before a stock decrement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cart::{CartEntry, ItemSnapshot};
use crate::purchase::{PurchaseRecord, PurchaseStatus};
use crate::{ItemId, PurchaseId, Result, StoreError, UserId};

/// Progress of one item through checkout.
///
/// State transitions:
/// ```text
/// Pending ──┬──► Decremented ──► Recorded ──► Completed
///           └──► Rejected
/// ```
/// Forward moves may skip states (a sweep that finds the purchase already
/// recorded can close a `Pending` intent directly), but never go back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IntentState {
    /// Marker written; the stock decrement has not been confirmed.
    #[default]
    Pending,

    /// Stock was decremented. This is the commit point of the item.
    Decremented,

    /// The purchase record is in the ledger.
    Recorded,

    /// The cart entry was removed (terminal state).
    Completed,

    /// The decrement was refused; no stock moved (terminal state).
    Rejected,
}

impl IntentState {
    fn rank(&self) -> u8 {
        match self {
            IntentState::Pending => 0,
            IntentState::Decremented => 1,
            IntentState::Recorded => 2,
            IntentState::Completed => 3,
            IntentState::Rejected => 3,
        }
    }

    /// Returns true if an intent in this state may move to `next`.
    pub fn can_advance_to(&self, next: IntentState) -> bool {
        match (self, next) {
            (IntentState::Pending, IntentState::Rejected) => true,
            (_, IntentState::Rejected) | (IntentState::Rejected, _) => false,
            _ => next.rank() > self.rank(),
        }
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, IntentState::Completed | IntentState::Rejected)
    }

    /// Returns true once the stock decrement is known to have committed.
    pub fn stock_committed(&self) -> bool {
        matches!(
            self,
            IntentState::Decremented | IntentState::Recorded | IntentState::Completed
        )
    }

    /// Returns the state name as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentState::Pending => "pending",
            IntentState::Decremented => "decremented",
            IntentState::Recorded => "recorded",
            IntentState::Completed => "completed",
            IntentState::Rejected => "rejected",
        }
    }

    /// Parses a stored state name.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "pending" => Ok(IntentState::Pending),
            "decremented" => Ok(IntentState::Decremented),
            "recorded" => Ok(IntentState::Recorded),
            "completed" => Ok(IntentState::Completed),
            "rejected" => Ok(IntentState::Rejected),
            other => Err(StoreError::InvalidState(format!(
                "unknown intent state '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for IntentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything needed to finish (or audit) one item's checkout.
///
/// Keyed by the purchase id generated before any write, so the ledger
/// append can be replayed by a reconciliation sweep without duplicating
/// the purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutIntent {
    pub purchase_id: PurchaseId,
    pub buyer_id: UserId,
    pub item_id: ItemId,
    pub seller_id: UserId,
    pub quantity: u32,
    pub snapshot: ItemSnapshot,
    pub state: IntentState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CheckoutIntent {
    /// Opens a pending intent for a cart entry.
    pub fn for_cart_entry(
        purchase_id: PurchaseId,
        entry: &CartEntry,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            purchase_id,
            buyer_id: entry.buyer_id.clone(),
            item_id: entry.item_id.clone(),
            seller_id: entry.seller_id.clone(),
            quantity: entry.quantity,
            snapshot: entry.snapshot.clone(),
            state: IntentState::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builds the purchase record this intent stands for.
    pub fn purchase_record(&self, timestamp: DateTime<Utc>) -> PurchaseRecord {
        PurchaseRecord {
            purchase_id: self.purchase_id,
            buyer_id: self.buyer_id.clone(),
            seller_id: self.seller_id.clone(),
            item_id: self.item_id.clone(),
            quantity: self.quantity,
            price: self.snapshot.price,
            timestamp,
            status: PurchaseStatus::Completed,
            snapshot: self.snapshot.clone(),
        }
    }

    /// Moves the intent to `next`, rejecting backward transitions.
    pub fn advance(&mut self, next: IntentState, now: DateTime<Utc>) -> Result<()> {
        if !self.state.can_advance_to(next) {
            return Err(StoreError::InvalidState(format!(
                "checkout intent {} cannot move from {} to {}",
                self.purchase_id, self.state, next
            )));
        }
        self.state = next;
        self.updated_at = now;
        Ok(())
    }
}
