//! Shared identifiers and time source used across the marketplace crates.

pub mod clock;
pub mod ids;

pub use clock::{Clock, DefaultClock, ManualClock};
pub use ids::{ItemId, PurchaseId, UserId};
