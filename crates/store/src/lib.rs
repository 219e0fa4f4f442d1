//! Durable stores behind the marketplace checkout subsystem.
//!
//! Four stores, each behind a trait with an in-memory and a PostgreSQL
//! implementation:
//! - [`Catalog`]: items and their shared stock counters
//! - [`CartStore`]: per-buyer cart entries with passive expiry
//! - [`PurchaseLedger`]: append-only, idempotent purchase records
//! - [`CheckoutJournal`]: pending markers written before each stock decrement

pub mod cart;
pub mod error;
pub mod intent;
pub mod item;
pub mod memory;
pub mod postgres;
pub mod purchase;
pub mod store;

pub use cart::{CartAddition, CartEntry, DEFAULT_CART_TTL_DAYS, ItemSnapshot};
pub use common::{ItemId, PurchaseId, UserId};
pub use error::{Result, StoreError};
pub use intent::{CheckoutIntent, IntentState};
pub use item::{Coordinates, Item, ItemStatus, Version};
pub use memory::{
    InMemoryCartStore, InMemoryCatalog, InMemoryCheckoutJournal, InMemoryPurchaseLedger,
};
pub use postgres::{
    PostgresCartStore, PostgresCatalog, PostgresCheckoutJournal, PostgresPurchaseLedger,
    run_migrations,
};
pub use purchase::{PurchaseRecord, PurchaseStatus, RecordOutcome};
pub use store::{CartStore, Catalog, CheckoutJournal, PurchaseLedger};
