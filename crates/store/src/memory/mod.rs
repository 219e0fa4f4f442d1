//! In-memory store implementations.
//!
//! Each store keeps its state behind one `tokio::sync::RwLock`; every
//! conditional write takes the write lock for its whole check-and-set, which
//! is what makes it linearizable. Failure-injection switches let tests
//! exercise partial-failure paths.

mod cart;
mod catalog;
mod journal;
mod ledger;

pub use cart::InMemoryCartStore;
pub use catalog::InMemoryCatalog;
pub use journal::InMemoryCheckoutJournal;
pub use ledger::InMemoryPurchaseLedger;
