//! PostgreSQL-backed stores.
//!
//! All four stores share one connection pool and the schema in
//! `migrations/`. Conditional writes are expressed as single `UPDATE ...
//! WHERE` statements so the database, not the process, arbitrates races.

mod cart;
mod catalog;
mod journal;
mod ledger;

pub use cart::PostgresCartStore;
pub use catalog::PostgresCatalog;
pub use journal::PostgresCheckoutJournal;
pub use ledger::PostgresPurchaseLedger;

use sqlx::PgPool;

use crate::{Result, StoreError};

/// Runs the database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

/// Converts a stored BIGINT quantity back into a unit count.
fn quantity_from_db(value: i64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::InvalidState(format!("stored quantity {value} is out of range")))
}
