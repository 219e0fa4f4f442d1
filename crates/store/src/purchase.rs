use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::ItemSnapshot;
use crate::{ItemId, PurchaseId, Result, StoreError, UserId};

/// Status of a purchase record. Checkout only ever produces `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    #[default]
    Completed,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "completed" => Ok(PurchaseStatus::Completed),
            other => Err(StoreError::InvalidState(format!(
                "unknown purchase status '{other}'"
            ))),
        }
    }
}

/// Immutable evidence that a sale occurred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRecord {
    pub purchase_id: PurchaseId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub item_id: ItemId,
    pub quantity: u32,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    pub status: PurchaseStatus,
    pub snapshot: ItemSnapshot,
}

/// What an append to the ledger actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A new record was stored.
    Inserted,
    /// A record with this purchase id already existed; nothing changed.
    AlreadyRecorded,
}
