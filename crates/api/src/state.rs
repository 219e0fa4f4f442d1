//! Shared application state and store wiring.

use std::sync::Arc;
use std::time::Duration;

use checkout::{CheckoutCoordinator, ReconciliationSweep};
use common::Clock;
use domain::{CartService, ListingService};
use sqlx::PgPool;
use store::{
    CartStore, Catalog, CheckoutJournal, InMemoryCartStore, InMemoryCatalog,
    InMemoryCheckoutJournal, InMemoryPurchaseLedger, PostgresCartStore, PostgresCatalog,
    PostgresCheckoutJournal, PostgresPurchaseLedger, PurchaseLedger,
};

use crate::config::Config;

pub type SharedCatalog = Arc<dyn Catalog>;
pub type SharedCartStore = Arc<dyn CartStore>;
pub type SharedLedger = Arc<dyn PurchaseLedger>;
pub type SharedJournal = Arc<dyn CheckoutJournal>;

/// The four stores behind the API, type-erased so handlers are not generic
/// over the backend.
#[derive(Clone)]
pub struct Stores {
    /// Backend name reported by the health check.
    pub backend: &'static str,
    pub catalog: SharedCatalog,
    pub carts: SharedCartStore,
    pub ledger: SharedLedger,
    pub journal: SharedJournal,
}

impl Stores {
    /// Creates empty in-memory stores.
    pub fn in_memory() -> Self {
        Self {
            backend: "in-memory",
            catalog: Arc::new(InMemoryCatalog::new()),
            carts: Arc::new(InMemoryCartStore::new()),
            ledger: Arc::new(InMemoryPurchaseLedger::new()),
            journal: Arc::new(InMemoryCheckoutJournal::new()),
        }
    }

    /// Creates PostgreSQL stores sharing one pool.
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            backend: "postgres",
            catalog: Arc::new(PostgresCatalog::new(pool.clone())),
            carts: Arc::new(PostgresCartStore::new(pool.clone())),
            ledger: Arc::new(PostgresPurchaseLedger::new(pool.clone())),
            journal: Arc::new(PostgresCheckoutJournal::new(pool)),
        }
    }
}

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub listings: ListingService<SharedCatalog>,
    pub carts: CartService<SharedCatalog, SharedCartStore>,
    pub checkout: CheckoutCoordinator<SharedCatalog, SharedCartStore, SharedLedger, SharedJournal>,
    pub reconciliation: ReconciliationSweep<SharedCartStore, SharedLedger, SharedJournal>,
    pub ledger: SharedLedger,
    pub checkout_deadline: Duration,
    pub storage_backend: &'static str,
}

impl AppState {
    /// Wires the services over `stores`.
    pub fn new(stores: Stores, clock: Arc<dyn Clock>, config: &Config) -> Self {
        let storage_backend = stores.backend;
        Self {
            listings: ListingService::new(stores.catalog.clone(), clock.clone()),
            carts: CartService::new(stores.catalog.clone(), stores.carts.clone(), clock.clone())
                .with_ttl(config.cart_ttl()),
            checkout: CheckoutCoordinator::new(
                stores.catalog,
                stores.carts.clone(),
                stores.ledger.clone(),
                stores.journal.clone(),
                clock.clone(),
            ),
            reconciliation: ReconciliationSweep::new(
                stores.carts,
                stores.ledger.clone(),
                stores.journal,
                clock,
            )
            .with_window(config.reconciliation_window()),
            ledger: stores.ledger,
            checkout_deadline: config.checkout_deadline(),
            storage_backend,
        }
    }
}
