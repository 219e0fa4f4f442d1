//! Checkout coordination for the marketplace.
//!
//! Checkout moves each requested cart entry through four steps:
//! 1. Open a checkout intent keyed by a fresh purchase id
//! 2. Decrement stock (the commit point)
//! 3. Record the purchase in the ledger
//! 4. Remove the cart entry
//!
//! Items are independent: one item's failure never aborts another. Nothing
//! is rolled back after step 2; an item whose later steps fail leaves a
//! reconciliation gap that [`ReconciliationSweep`] detects and repairs.

pub mod coordinator;
pub mod error;
pub mod outcome;
pub mod reconciliation;
pub mod steps;

pub use coordinator::{CheckoutCoordinator, CheckoutRequest};
pub use error::{CheckoutError, Result};
pub use outcome::{CheckoutResult, FailureReason, ItemFailure};
pub use reconciliation::{GapKind, ReconciliationGap, ReconciliationSweep, RepairReport};
