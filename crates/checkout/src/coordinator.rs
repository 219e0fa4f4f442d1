//! Checkout coordinator.

use std::collections::HashSet;
use std::sync::Arc;

use common::Clock;
use store::{
    CartStore, Catalog, CheckoutIntent, CheckoutJournal, IntentState, ItemId, PurchaseId,
    PurchaseLedger, StoreError, UserId,
};
use tokio::time::Instant;

use crate::error::{CheckoutError, Result};
use crate::outcome::{CheckoutResult, FailureReason, ItemFailure};
use crate::steps;

/// How many times a journal advance is attempted before giving up.
pub const MAX_ADVANCE_ATTEMPTS: usize = 3;

/// A buyer's request to check out some of their cart.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub buyer_id: UserId,
    pub item_ids: Vec<ItemId>,
    /// No item is started once this instant has passed.
    pub deadline: Option<Instant>,
}

impl CheckoutRequest {
    /// Creates a request with no deadline.
    pub fn new(buyer_id: UserId, item_ids: Vec<ItemId>) -> Self {
        Self {
            buyer_id,
            item_ids,
            deadline: None,
        }
    }

    /// Sets the request deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Drives each requested item from cart entry to purchase record.
///
/// The coordinator holds no state between calls; all coordination between
/// concurrent checkouts happens inside the stores. The journal admits one
/// unfinished intent per cart entry, and the catalog's guarded decrement
/// keeps stock from going negative.
pub struct CheckoutCoordinator<C, K, L, J>
where
    C: Catalog,
    K: CartStore,
    L: PurchaseLedger,
    J: CheckoutJournal,
{
    catalog: C,
    carts: K,
    ledger: L,
    journal: J,
    clock: Arc<dyn Clock>,
}

impl<C, K, L, J> CheckoutCoordinator<C, K, L, J>
where
    C: Catalog,
    K: CartStore,
    L: PurchaseLedger,
    J: CheckoutJournal,
{
    /// Creates a new checkout coordinator.
    pub fn new(catalog: C, carts: K, ledger: L, journal: J, clock: Arc<dyn Clock>) -> Self {
        Self {
            catalog,
            carts,
            ledger,
            journal,
            clock,
        }
    }

    /// Checks out the requested items, each one independently.
    ///
    /// Returns `Err` only for request-level problems. Items are processed in
    /// request order; a repeated id is processed once.
    #[tracing::instrument(skip(self, request), fields(buyer_id = %request.buyer_id, items = request.item_ids.len()))]
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutResult> {
        if request.item_ids.is_empty() {
            return Err(CheckoutError::EmptyRequest);
        }

        metrics::counter!("checkout_requests_total").increment(1);
        let started = std::time::Instant::now();

        let mut seen = HashSet::new();
        let mut result = CheckoutResult::default();

        for item_id in request.item_ids {
            if !seen.insert(item_id.clone()) {
                continue;
            }

            let outcome = if request.deadline.is_some_and(|d| Instant::now() >= d) {
                Err(FailureReason::DeadlineExceeded)
            } else {
                self.checkout_item(&request.buyer_id, &item_id).await
            };

            match outcome {
                Ok(purchase_id) => {
                    metrics::counter!("checkout_items_total", "outcome" => "purchased")
                        .increment(1);
                    result.purchases.push(purchase_id);
                }
                Err(reason) => {
                    metrics::counter!("checkout_items_total", "outcome" => reason.label())
                        .increment(1);
                    result.failures.push(ItemFailure { item_id, reason });
                }
            }
        }

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        tracing::info!(
            purchased = result.purchases.len(),
            failed = result.failures.len(),
            "Checkout completed"
        );

        Ok(result)
    }

    /// Runs the four checkout steps for one item.
    ///
    /// Once the decrement has committed the item counts as purchased, even
    /// if recording it or clearing the cart fails afterwards.
    #[tracing::instrument(skip(self))]
    async fn checkout_item(
        &self,
        buyer_id: &UserId,
        item_id: &ItemId,
    ) -> std::result::Result<PurchaseId, FailureReason> {
        let now = self.clock.utc();
        let entry = match self.carts.get(buyer_id, item_id, now).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return Err(FailureReason::NotInCart),
            Err(e) => return Err(FailureReason::Internal(e.to_string())),
        };

        let purchase_id = PurchaseId::new();
        let intent = CheckoutIntent::for_cart_entry(purchase_id, &entry, now);
        match self.journal.open(intent.clone()).await {
            Ok(()) => {}
            Err(StoreError::CheckoutInProgress { .. }) => {
                tracing::info!(
                    step = steps::STEP_OPEN_INTENT,
                    "Cart entry already claimed by another checkout"
                );
                return Err(FailureReason::CheckoutInProgress);
            }
            Err(e) => {
                tracing::warn!(
                    %purchase_id,
                    step = steps::STEP_OPEN_INTENT,
                    error = %e,
                    "Could not open checkout intent"
                );
                return Err(FailureReason::Internal(e.to_string()));
            }
        }

        // A checkout that finished between our read and our claim has
        // already consumed the entry.
        match self.carts.get(buyer_id, item_id, self.clock.utc()).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.reject(purchase_id).await;
                return Err(FailureReason::NotInCart);
            }
            Err(e) => {
                self.reject(purchase_id).await;
                return Err(FailureReason::Internal(e.to_string()));
            }
        }

        match self.catalog.guarded_decrement(item_id, entry.quantity).await {
            Ok(item) => {
                metrics::counter!("stock_decrements_total", "result" => "success").increment(1);
                tracing::debug!(remaining = item.quantity, status = %item.status, "Stock decremented");
            }
            Err(StoreError::ItemNotFound(_)) => {
                metrics::counter!("stock_decrements_total", "result" => "not_found").increment(1);
                self.reject(purchase_id).await;
                return Err(FailureReason::ItemNotFound);
            }
            Err(StoreError::InsufficientStock {
                requested,
                available,
                ..
            }) => {
                metrics::counter!("stock_decrements_total", "result" => "insufficient").increment(1);
                self.reject(purchase_id).await;
                return Err(FailureReason::InsufficientStock {
                    requested,
                    available,
                });
            }
            Err(e) => {
                // The write may or may not have landed; the intent stays
                // pending so the sweep reports it.
                metrics::counter!("stock_decrements_total", "result" => "error").increment(1);
                tracing::warn!(%purchase_id, step = steps::STEP_DECREMENT_STOCK, error = %e, "Stock decrement failed");
                return Err(FailureReason::Internal(e.to_string()));
            }
        }

        if let Err(e) = self.advance(purchase_id, IntentState::Decremented).await {
            // Unless the ledger write below lands, the sweep can only see a
            // pending intent and will report it as indeterminate.
            self.report_gap(&intent, steps::STEP_MARK_DECREMENTED, &e);
        }
        self.finish_committed(&intent).await;

        Ok(purchase_id)
    }

    /// Records the purchase and clears the cart for an item whose stock is
    /// already taken. Failures here are logged as reconciliation gaps.
    async fn finish_committed(&self, intent: &CheckoutIntent) {
        let record = intent.purchase_record(self.clock.utc());
        let recorded = match self.ledger.record(record).await {
            Ok(_) => {
                self.advance_or_warn(intent.purchase_id, IntentState::Recorded)
                    .await;
                true
            }
            Err(e) => {
                self.report_gap(intent, steps::STEP_RECORD_PURCHASE, &e);
                false
            }
        };

        match self.carts.remove(&intent.buyer_id, &intent.item_id).await {
            // An unrecorded purchase must stay visible to the sweep.
            Ok(()) if recorded => {
                self.advance_or_warn(intent.purchase_id, IntentState::Completed)
                    .await
            }
            Ok(()) => {}
            Err(e) => self.report_gap(intent, steps::STEP_CLEAR_CART, &e),
        }
    }

    fn report_gap(&self, intent: &CheckoutIntent, step: &'static str, error: &StoreError) {
        metrics::counter!("checkout_reconciliation_gaps_total", "step" => step).increment(1);
        tracing::error!(
            purchase_id = %intent.purchase_id,
            item_id = %intent.item_id,
            buyer_id = %intent.buyer_id,
            quantity = intent.quantity,
            step,
            error = %error,
            "Reconciliation gap: stock decremented but checkout step failed"
        );
    }

    async fn reject(&self, purchase_id: PurchaseId) {
        if let Err(e) = self.advance(purchase_id, IntentState::Rejected).await {
            // No stock moved, but the intent now looks indeterminate to the
            // sweep until an operator resolves it as not committed.
            tracing::error!(
                %purchase_id,
                committed = false,
                error = %e,
                "Could not reject checkout intent"
            );
        }
    }

    async fn advance_or_warn(&self, purchase_id: PurchaseId, state: IntentState) {
        if let Err(e) = self.advance(purchase_id, state).await {
            tracing::warn!(%purchase_id, state = %state, error = %e, "Could not advance checkout intent");
        }
    }

    /// Moves the intent forward, retrying transient journal failures.
    async fn advance(
        &self,
        purchase_id: PurchaseId,
        state: IntentState,
    ) -> std::result::Result<(), StoreError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .journal
                .advance(purchase_id, state, self.clock.utc())
                .await
            {
                Ok(_) => return Ok(()),
                Err(StoreError::InvalidState(msg)) => return Err(StoreError::InvalidState(msg)),
                Err(e) if attempt >= MAX_ADVANCE_ATTEMPTS => return Err(e),
                Err(e) => {
                    tracing::debug!(%purchase_id, attempt, error = %e, "Retrying intent advance");
                }
            }
        }
    }
}
