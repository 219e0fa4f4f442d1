//! Checkout step names, as used in logs and metric labels.

/// Step name: write the pending checkout intent.
pub const STEP_OPEN_INTENT: &str = "open_intent";

/// Step name: guarded stock decrement.
pub const STEP_DECREMENT_STOCK: &str = "decrement_stock";

/// Step name: mark the intent as past its decrement.
pub const STEP_MARK_DECREMENTED: &str = "mark_decremented";

/// Step name: append the purchase record.
pub const STEP_RECORD_PURCHASE: &str = "record_purchase";

/// Step name: remove the cart entry.
pub const STEP_CLEAR_CART: &str = "clear_cart";
