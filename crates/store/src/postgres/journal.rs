use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::quantity_from_db;
use crate::{
    CheckoutIntent, CheckoutJournal, IntentState, ItemId, ItemSnapshot, PurchaseId, Result,
    StoreError, UserId,
};

/// Partial unique index allowing one unfinished intent per cart entry.
const ACTIVE_ENTRY_INDEX: &str = "uq_checkout_intents_active_entry";

const INTENT_COLUMNS: &str = "purchase_id, buyer_id, item_id, seller_id, quantity, snapshot, \
     state, created_at, updated_at";

/// PostgreSQL-backed checkout journal.
#[derive(Clone)]
pub struct PostgresCheckoutJournal {
    pool: PgPool,
}

impl PostgresCheckoutJournal {
    /// Creates a new PostgreSQL checkout journal.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_intent(row: PgRow) -> Result<CheckoutIntent> {
        let snapshot: serde_json::Value = row.try_get("snapshot")?;
        let state: String = row.try_get("state")?;

        Ok(CheckoutIntent {
            purchase_id: PurchaseId::from_uuid(row.try_get::<Uuid, _>("purchase_id")?),
            buyer_id: UserId::new(row.try_get::<String, _>("buyer_id")?),
            item_id: ItemId::new(row.try_get::<String, _>("item_id")?),
            seller_id: UserId::new(row.try_get::<String, _>("seller_id")?),
            quantity: quantity_from_db(row.try_get("quantity")?)?,
            snapshot: serde_json::from_value::<ItemSnapshot>(snapshot)?,
            state: IntentState::parse(&state)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl CheckoutJournal for PostgresCheckoutJournal {
    async fn open(&self, intent: CheckoutIntent) -> Result<()> {
        let snapshot = serde_json::to_value(&intent.snapshot)?;

        let result = sqlx::query(
            r#"
            INSERT INTO checkout_intents (purchase_id, buyer_id, item_id, seller_id, quantity,
                                          snapshot, state, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (purchase_id) DO NOTHING
            "#,
        )
        .bind(intent.purchase_id.as_uuid())
        .bind(intent.buyer_id.as_str())
        .bind(intent.item_id.as_str())
        .bind(intent.seller_id.as_str())
        .bind(i64::from(intent.quantity))
        .bind(snapshot)
        .bind(intent.state.as_str())
        .bind(intent.created_at)
        .bind(intent.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.constraint() == Some(ACTIVE_ENTRY_INDEX) => {
                StoreError::CheckoutInProgress {
                    buyer_id: intent.buyer_id.clone(),
                    item_id: intent.item_id.clone(),
                }
            }
            other => StoreError::Database(other),
        })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::InvalidState(format!(
                "checkout intent {} already exists",
                intent.purchase_id
            )));
        }
        Ok(())
    }

    async fn advance(
        &self,
        purchase_id: PurchaseId,
        next: IntentState,
        now: DateTime<Utc>,
    ) -> Result<CheckoutIntent> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {INTENT_COLUMNS} FROM checkout_intents WHERE purchase_id = $1 FOR UPDATE"
        ))
        .bind(purchase_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            StoreError::InvalidState(format!("checkout intent {purchase_id} not found"))
        })?;

        let mut intent = Self::row_to_intent(row)?;
        intent.advance(next, now)?;

        sqlx::query("UPDATE checkout_intents SET state = $2, updated_at = $3 WHERE purchase_id = $1")
            .bind(purchase_id.as_uuid())
            .bind(intent.state.as_str())
            .bind(intent.updated_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(intent)
    }

    async fn get(&self, purchase_id: PurchaseId) -> Result<Option<CheckoutIntent>> {
        let row = sqlx::query(&format!(
            "SELECT {INTENT_COLUMNS} FROM checkout_intents WHERE purchase_id = $1"
        ))
        .bind(purchase_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_intent).transpose()
    }

    async fn list_unfinished(&self, older_than: DateTime<Utc>) -> Result<Vec<CheckoutIntent>> {
        let rows = sqlx::query(&format!(
            "SELECT {INTENT_COLUMNS} FROM checkout_intents \
             WHERE state NOT IN ('completed', 'rejected') AND created_at <= $1 \
             ORDER BY created_at ASC"
        ))
        .bind(older_than)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_intent).collect()
    }
}
