use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::quantity_from_db;
use crate::{
    ItemId, ItemSnapshot, PurchaseId, PurchaseLedger, PurchaseRecord, PurchaseStatus,
    RecordOutcome, Result, UserId,
};

const RECORD_COLUMNS: &str =
    "purchase_id, buyer_id, seller_id, item_id, quantity, price, timestamp, status, snapshot";

/// PostgreSQL-backed purchase ledger.
#[derive(Clone)]
pub struct PostgresPurchaseLedger {
    pool: PgPool,
}

impl PostgresPurchaseLedger {
    /// Creates a new PostgreSQL purchase ledger.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: PgRow) -> Result<PurchaseRecord> {
        let snapshot: serde_json::Value = row.try_get("snapshot")?;
        let status: String = row.try_get("status")?;

        Ok(PurchaseRecord {
            purchase_id: PurchaseId::from_uuid(row.try_get::<Uuid, _>("purchase_id")?),
            buyer_id: UserId::new(row.try_get::<String, _>("buyer_id")?),
            seller_id: UserId::new(row.try_get::<String, _>("seller_id")?),
            item_id: ItemId::new(row.try_get::<String, _>("item_id")?),
            quantity: quantity_from_db(row.try_get("quantity")?)?,
            price: row.try_get("price")?,
            timestamp: row.try_get("timestamp")?,
            status: PurchaseStatus::parse(&status)?,
            snapshot: serde_json::from_value::<ItemSnapshot>(snapshot)?,
        })
    }
}

#[async_trait]
impl PurchaseLedger for PostgresPurchaseLedger {
    async fn record(&self, record: PurchaseRecord) -> Result<RecordOutcome> {
        let snapshot = serde_json::to_value(&record.snapshot)?;

        let result = sqlx::query(
            r#"
            INSERT INTO purchases (purchase_id, buyer_id, seller_id, item_id, quantity, price,
                                   timestamp, status, snapshot)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (purchase_id) DO NOTHING
            "#,
        )
        .bind(record.purchase_id.as_uuid())
        .bind(record.buyer_id.as_str())
        .bind(record.seller_id.as_str())
        .bind(record.item_id.as_str())
        .bind(i64::from(record.quantity))
        .bind(record.price)
        .bind(record.timestamp)
        .bind(record.status.as_str())
        .bind(snapshot)
        .execute(&self.pool)
        .await?;

        Ok(if result.rows_affected() == 0 {
            RecordOutcome::AlreadyRecorded
        } else {
            RecordOutcome::Inserted
        })
    }

    async fn get(&self, purchase_id: PurchaseId) -> Result<Option<PurchaseRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM purchases WHERE purchase_id = $1"
        ))
        .bind(purchase_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn list_for_buyer(&self, buyer_id: &UserId) -> Result<Vec<PurchaseRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM purchases WHERE buyer_id = $1 ORDER BY timestamp DESC"
        ))
        .bind(buyer_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }
}
