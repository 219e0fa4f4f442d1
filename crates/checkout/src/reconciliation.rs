//! Detection and forward repair of partially completed checkouts.
//!
//! Every checkout item opens an intent before touching stock. An intent
//! that is still unfinished after the reconciliation window marks a
//! reconciliation gap: the decrement committed (or may have) but a later
//! step never confirmed.
//!
//! Gaps whose decrement outcome is unknown cannot be repaired automatically;
//! an operator checks the stock and settles them with
//! [`ReconciliationSweep::resolve`].

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use common::Clock;
use serde::Serialize;
use store::{
    CartStore, CheckoutIntent, CheckoutJournal, IntentState, ItemId, PurchaseId, PurchaseLedger,
    UserId,
};

use crate::error::{CheckoutError, Result};
use crate::steps;

/// Default age after which an unfinished intent counts as a gap.
pub const DEFAULT_WINDOW_SECS: i64 = 300;

/// What is missing for an unfinished checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GapKind {
    /// Stock was taken but no purchase record exists.
    MissingPurchase,
    /// The purchase is recorded but the cart entry was never confirmed
    /// removed.
    CartNotCleared,
    /// The decrement was attempted but its result is unknown.
    Indeterminate,
}

impl GapKind {
    /// Returns true if the stock decrement is known to have committed.
    pub fn is_repairable(&self) -> bool {
        !matches!(self, GapKind::Indeterminate)
    }

    fn label(&self) -> &'static str {
        match self {
            GapKind::MissingPurchase => steps::STEP_RECORD_PURCHASE,
            GapKind::CartNotCleared => steps::STEP_CLEAR_CART,
            GapKind::Indeterminate => steps::STEP_DECREMENT_STOCK,
        }
    }
}

/// One unfinished checkout older than the window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationGap {
    pub purchase_id: PurchaseId,
    pub buyer_id: UserId,
    pub item_id: ItemId,
    pub quantity: u32,
    pub state: IntentState,
    pub kind: GapKind,
    pub opened_at: DateTime<Utc>,
}

impl ReconciliationGap {
    fn new(intent: &CheckoutIntent, kind: GapKind) -> Self {
        Self {
            purchase_id: intent.purchase_id,
            buyer_id: intent.buyer_id.clone(),
            item_id: intent.item_id.clone(),
            quantity: intent.quantity,
            state: intent.state,
            kind,
            opened_at: intent.created_at,
        }
    }
}

/// Result of one repair pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairReport {
    /// Gaps closed by this pass.
    pub repaired: Vec<ReconciliationGap>,
    /// Gaps that need an operator.
    pub unresolved: Vec<ReconciliationGap>,
}

/// Finds and repairs reconciliation gaps.
pub struct ReconciliationSweep<K, L, J>
where
    K: CartStore,
    L: PurchaseLedger,
    J: CheckoutJournal,
{
    carts: K,
    ledger: L,
    journal: J,
    clock: Arc<dyn Clock>,
    window: TimeDelta,
}

impl<K, L, J> ReconciliationSweep<K, L, J>
where
    K: CartStore,
    L: PurchaseLedger,
    J: CheckoutJournal,
{
    /// Creates a sweep with the default five-minute window.
    pub fn new(carts: K, ledger: L, journal: J, clock: Arc<dyn Clock>) -> Self {
        Self {
            carts,
            ledger,
            journal,
            clock,
            window: TimeDelta::seconds(DEFAULT_WINDOW_SECS),
        }
    }

    /// Overrides the age after which an unfinished intent counts as a gap.
    pub fn with_window(mut self, window: TimeDelta) -> Self {
        self.window = window;
        self
    }

    /// Lists the current gaps, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn scan(&self) -> Result<Vec<ReconciliationGap>> {
        let gaps = self
            .classified()
            .await?
            .iter()
            .map(|(intent, kind)| ReconciliationGap::new(intent, *kind))
            .collect::<Vec<_>>();

        metrics::counter!("reconciliation_sweeps_total").increment(1);
        if !gaps.is_empty() {
            tracing::warn!(gaps = gaps.len(), "Reconciliation gaps found");
        }
        Ok(gaps)
    }

    /// Completes every gap whose decrement is known to have committed.
    ///
    /// The purchase is re-recorded under its original id and the cart entry
    /// removed; both writes are idempotent, so a repair that fails halfway
    /// is simply retried on the next pass. Indeterminate gaps are reported
    /// but left alone.
    #[tracing::instrument(skip(self))]
    pub async fn repair(&self) -> Result<RepairReport> {
        metrics::counter!("reconciliation_sweeps_total").increment(1);
        let mut report = RepairReport::default();

        for (intent, kind) in self.classified().await? {
            let gap = ReconciliationGap::new(&intent, kind);
            if !kind.is_repairable() {
                tracing::warn!(purchase_id = %gap.purchase_id, item_id = %gap.item_id, "Indeterminate checkout needs manual review");
                report.unresolved.push(gap);
                continue;
            }

            match self.repair_one(&intent, kind).await {
                Ok(()) => {
                    metrics::counter!("reconciliation_repairs_total", "kind" => kind.label())
                        .increment(1);
                    tracing::info!(purchase_id = %gap.purchase_id, item_id = %gap.item_id, kind = ?kind, "Reconciliation gap repaired");
                    report.repaired.push(gap);
                }
                Err(e) => {
                    tracing::error!(purchase_id = %gap.purchase_id, item_id = %gap.item_id, error = %e, "Reconciliation repair failed");
                    report.unresolved.push(gap);
                }
            }
        }

        Ok(report)
    }

    /// Settles one unfinished intent by hand.
    ///
    /// With `committed` the checkout is completed exactly as a repair would
    /// complete it. Without it the intent is rejected, which is only allowed
    /// while nothing shows that its stock was taken.
    #[tracing::instrument(skip(self))]
    pub async fn resolve(
        &self,
        purchase_id: PurchaseId,
        committed: bool,
    ) -> Result<CheckoutIntent> {
        let intent = self
            .journal
            .get(purchase_id)
            .await?
            .ok_or(CheckoutError::IntentNotFound(purchase_id))?;
        if intent.state.is_terminal() {
            return Err(CheckoutError::AlreadyResolved(purchase_id));
        }
        let recorded = self.ledger.get(purchase_id).await?.is_some();

        if committed {
            let kind = if recorded || intent.state == IntentState::Recorded {
                GapKind::CartNotCleared
            } else {
                GapKind::MissingPurchase
            };
            self.repair_one(&intent, kind).await?;
        } else {
            if recorded || intent.state.stock_committed() {
                return Err(CheckoutError::StockCommitted(purchase_id));
            }
            self.journal
                .advance(purchase_id, IntentState::Rejected, self.clock.utc())
                .await?;
        }

        metrics::counter!("reconciliation_resolutions_total", "committed" => committed.to_string())
            .increment(1);
        tracing::info!(%purchase_id, item_id = %intent.item_id, committed, "Checkout intent resolved");

        self.journal
            .get(purchase_id)
            .await?
            .ok_or(CheckoutError::IntentNotFound(purchase_id))
    }

    async fn classified(&self) -> Result<Vec<(CheckoutIntent, GapKind)>> {
        let now = self.clock.utc();
        let intents = self.journal.list_unfinished(now - self.window).await?;

        let mut classified = Vec::with_capacity(intents.len());
        for intent in intents {
            let kind = match intent.state {
                IntentState::Recorded => GapKind::CartNotCleared,
                IntentState::Pending | IntentState::Decremented => {
                    let recorded = self.ledger.get(intent.purchase_id).await?.is_some();
                    match (recorded, intent.state) {
                        (true, _) => GapKind::CartNotCleared,
                        (false, IntentState::Decremented) => GapKind::MissingPurchase,
                        (false, _) => GapKind::Indeterminate,
                    }
                }
                IntentState::Completed | IntentState::Rejected => continue,
            };
            classified.push((intent, kind));
        }
        Ok(classified)
    }

    async fn repair_one(&self, intent: &CheckoutIntent, kind: GapKind) -> Result<()> {
        let now = self.clock.utc();

        if kind == GapKind::MissingPurchase {
            self.ledger.record(intent.purchase_record(now)).await?;
        }
        if intent.state != IntentState::Recorded {
            self.journal
                .advance(intent.purchase_id, IntentState::Recorded, now)
                .await?;
        }

        // Only the entry the checkout consumed is removed. One re-added or
        // topped up since then holds units the buyer has not paid for.
        let current = self
            .carts
            .get(&intent.buyer_id, &intent.item_id, now)
            .await?;
        if let Some(entry) = current {
            if entry.quantity == intent.quantity && entry.added_at <= intent.created_at {
                self.carts.remove_if_unchanged(&entry).await?;
            }
        }

        self.journal
            .advance(intent.purchase_id, IntentState::Completed, now)
            .await?;
        Ok(())
    }
}
