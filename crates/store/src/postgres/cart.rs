use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};

use super::quantity_from_db;
use crate::{CartAddition, CartEntry, CartStore, ItemId, ItemSnapshot, Result, UserId};

const ENTRY_COLUMNS: &str =
    "buyer_id, item_id, seller_id, quantity, snapshot, added_at, expires_at";

/// PostgreSQL-backed cart store.
#[derive(Clone)]
pub struct PostgresCartStore {
    pool: PgPool,
}

impl PostgresCartStore {
    /// Creates a new PostgreSQL cart store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_entry(row: PgRow) -> Result<CartEntry> {
        let snapshot: serde_json::Value = row.try_get("snapshot")?;
        let snapshot: ItemSnapshot = serde_json::from_value(snapshot)?;

        Ok(CartEntry {
            buyer_id: UserId::new(row.try_get::<String, _>("buyer_id")?),
            item_id: ItemId::new(row.try_get::<String, _>("item_id")?),
            seller_id: UserId::new(row.try_get::<String, _>("seller_id")?),
            quantity: quantity_from_db(row.try_get("quantity")?)?,
            snapshot,
            added_at: row.try_get("added_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }
}

#[async_trait]
impl CartStore for PostgresCartStore {
    async fn add_or_increment(&self, addition: CartAddition) -> Result<CartEntry> {
        let snapshot = serde_json::to_value(&addition.snapshot)?;

        // An expired row is replaced as if it were absent; a live one keeps
        // its snapshot and added_at and only gains quantity.
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO cart_entries (buyer_id, item_id, seller_id, quantity, snapshot,
                                      added_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (buyer_id, item_id) DO UPDATE SET
                quantity = CASE WHEN cart_entries.expires_at <= EXCLUDED.added_at
                                THEN EXCLUDED.quantity
                                ELSE LEAST(cart_entries.quantity + EXCLUDED.quantity, 4294967295)
                           END,
                seller_id = CASE WHEN cart_entries.expires_at <= EXCLUDED.added_at
                                 THEN EXCLUDED.seller_id ELSE cart_entries.seller_id END,
                snapshot = CASE WHEN cart_entries.expires_at <= EXCLUDED.added_at
                                THEN EXCLUDED.snapshot ELSE cart_entries.snapshot END,
                added_at = CASE WHEN cart_entries.expires_at <= EXCLUDED.added_at
                                THEN EXCLUDED.added_at ELSE cart_entries.added_at END,
                expires_at = EXCLUDED.expires_at
            RETURNING {ENTRY_COLUMNS}
            "#
        ))
        .bind(addition.buyer_id.as_str())
        .bind(addition.item_id.as_str())
        .bind(addition.seller_id.as_str())
        .bind(i64::from(addition.quantity))
        .bind(snapshot)
        .bind(addition.at)
        .bind(addition.expires_at)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_entry(row)
    }

    async fn get(
        &self,
        buyer_id: &UserId,
        item_id: &ItemId,
        now: DateTime<Utc>,
    ) -> Result<Option<CartEntry>> {
        let row = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM cart_entries \
             WHERE buyer_id = $1 AND item_id = $2 AND expires_at > $3"
        ))
        .bind(buyer_id.as_str())
        .bind(item_id.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_entry).transpose()
    }

    async fn list_for_buyer(
        &self,
        buyer_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<CartEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM cart_entries \
             WHERE buyer_id = $1 AND expires_at > $2 \
             ORDER BY added_at ASC"
        ))
        .bind(buyer_id.as_str())
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_entry).collect()
    }

    async fn remove(&self, buyer_id: &UserId, item_id: &ItemId) -> Result<()> {
        sqlx::query("DELETE FROM cart_entries WHERE buyer_id = $1 AND item_id = $2")
            .bind(buyer_id.as_str())
            .bind(item_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_if_unchanged(&self, expected: &CartEntry) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM cart_entries \
             WHERE buyer_id = $1 AND item_id = $2 AND quantity = $3 AND added_at = $4",
        )
        .bind(expected.buyer_id.as_str())
        .bind(expected.item_id.as_str())
        .bind(i64::from(expected.quantity))
        .bind(expected.added_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_entries WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
