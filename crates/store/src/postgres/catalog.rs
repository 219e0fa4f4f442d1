use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use super::quantity_from_db;
use crate::{
    Catalog, Coordinates, Item, ItemId, ItemStatus, Result, StoreError, UserId, Version,
};

const ITEM_COLUMNS: &str = "item_id, seller_id, seller_name, title, description, image_url, \
     categories, price, city, coordinates, quantity, status, created_at, version";

/// PostgreSQL-backed catalog.
#[derive(Clone)]
pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    /// Creates a new PostgreSQL catalog.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_item(row: PgRow) -> Result<Item> {
        let coordinates: Option<serde_json::Value> = row.try_get("coordinates")?;
        let coordinates: Option<Coordinates> =
            coordinates.map(serde_json::from_value).transpose()?;
        let categories: Vec<String> = row.try_get("categories")?;
        let status: String = row.try_get("status")?;

        Ok(Item {
            item_id: ItemId::new(row.try_get::<String, _>("item_id")?),
            seller_id: UserId::new(row.try_get::<String, _>("seller_id")?),
            seller_name: row.try_get("seller_name")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            image_url: row.try_get("image_url")?,
            categories: categories.into_iter().collect::<BTreeSet<_>>(),
            price: row.try_get("price")?,
            city: row.try_get("city")?,
            coordinates,
            quantity: quantity_from_db(row.try_get("quantity")?)?,
            status: ItemStatus::parse(&status)?,
            created_at: row.try_get("created_at")?,
            version: Version::new(row.try_get("version")?),
        })
    }

    /// Reads the fields needed to explain why a conditional write matched
    /// no row.
    async fn current_owner_and_stock(
        &self,
        item_id: &ItemId,
    ) -> Result<Option<(String, i64, i64)>> {
        let row = sqlx::query("SELECT seller_id, quantity, version FROM items WHERE item_id = $1")
            .bind(item_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| -> Result<_> {
            Ok((
                row.try_get("seller_id")?,
                row.try_get("quantity")?,
                row.try_get("version")?,
            ))
        })
        .transpose()
    }
}

#[async_trait]
impl Catalog for PostgresCatalog {
    async fn insert(&self, item: Item) -> Result<Item> {
        let item = Item {
            version: Version::first(),
            ..item.with_consistent_status()
        };
        let coordinates = item.coordinates.map(serde_json::to_value).transpose()?;
        let categories: Vec<String> = item.categories.iter().cloned().collect();

        let result = sqlx::query(
            r#"
            INSERT INTO items (item_id, seller_id, seller_name, title, description, image_url,
                               categories, price, city, coordinates, quantity, status,
                               created_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (item_id) DO NOTHING
            "#,
        )
        .bind(item.item_id.as_str())
        .bind(item.seller_id.as_str())
        .bind(&item.seller_name)
        .bind(&item.title)
        .bind(&item.description)
        .bind(&item.image_url)
        .bind(&categories)
        .bind(item.price)
        .bind(&item.city)
        .bind(coordinates)
        .bind(i64::from(item.quantity))
        .bind(item.status.as_str())
        .bind(item.created_at)
        .bind(item.version.as_i64())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::InvalidState(format!(
                "item {} already exists",
                item.item_id
            )));
        }
        Ok(item)
    }

    async fn get(&self, item_id: &ItemId) -> Result<Item> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE item_id = $1"
        ))
        .bind(item_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_item(row),
            None => Err(StoreError::ItemNotFound(item_id.clone())),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn guarded_decrement(&self, item_id: &ItemId, requested: u32) -> Result<Item> {
        if requested == 0 {
            return Err(StoreError::InvalidState(
                "decrement quantity must be positive".to_string(),
            ));
        }

        // The WHERE clause is the guard; SET expressions see the old row.
        let row = sqlx::query(&format!(
            r#"
            UPDATE items
            SET quantity = quantity - $2,
                status = CASE WHEN quantity - $2 = 0 THEN 'inactive' ELSE status END,
                version = version + 1
            WHERE item_id = $1 AND quantity >= $2
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(item_id.as_str())
        .bind(i64::from(requested))
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Self::row_to_item(row);
        }

        match self.current_owner_and_stock(item_id).await? {
            None => Err(StoreError::ItemNotFound(item_id.clone())),
            Some((_, available, _)) => Err(StoreError::InsufficientStock {
                item_id: item_id.clone(),
                requested,
                available: quantity_from_db(available)?,
            }),
        }
    }

    async fn update(&self, seller_id: &UserId, item: Item, expected: Version) -> Result<Item> {
        let item = item.with_consistent_status();
        let coordinates = item.coordinates.map(serde_json::to_value).transpose()?;
        let categories: Vec<String> = item.categories.iter().cloned().collect();

        let row = sqlx::query(&format!(
            r#"
            UPDATE items
            SET seller_name = $4, title = $5, description = $6, image_url = $7,
                categories = $8, price = $9, city = $10, coordinates = $11,
                quantity = $12, status = $13, version = version + 1
            WHERE item_id = $1 AND seller_id = $2 AND version = $3
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(item.item_id.as_str())
        .bind(seller_id.as_str())
        .bind(expected.as_i64())
        .bind(&item.seller_name)
        .bind(&item.title)
        .bind(&item.description)
        .bind(&item.image_url)
        .bind(&categories)
        .bind(item.price)
        .bind(&item.city)
        .bind(coordinates)
        .bind(i64::from(item.quantity))
        .bind(item.status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Self::row_to_item(row);
        }

        match self.current_owner_and_stock(&item.item_id).await? {
            None => Err(StoreError::ItemNotFound(item.item_id)),
            Some((owner, _, _)) if owner != seller_id.as_str() => {
                Err(StoreError::Forbidden {
                    item_id: item.item_id,
                })
            }
            Some((_, _, actual)) => Err(StoreError::VersionConflict {
                item_id: item.item_id,
                expected,
                actual: Version::new(actual),
            }),
        }
    }

    async fn delete(&self, item_id: &ItemId, seller_id: &UserId) -> Result<()> {
        let result = sqlx::query("DELETE FROM items WHERE item_id = $1 AND seller_id = $2")
            .bind(item_id.as_str())
            .bind(seller_id.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        match self.current_owner_and_stock(item_id).await? {
            None => Err(StoreError::ItemNotFound(item_id.clone())),
            Some(_) => Err(StoreError::Forbidden {
                item_id: item_id.clone(),
            }),
        }
    }
}
