//! PostgreSQL-backed ledger.
//!
//! Rows keep a `BIGSERIAL` sequence so listing returns insertion order even
//! when callers reuse an `order_id`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};

use crate::{PurchaseLedger, PurchaseRecord};

pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(Self { pool })
    }

    /// Create the `purchases` table if it doesn't exist yet.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS purchases (
                seq           BIGSERIAL PRIMARY KEY,
                order_id      TEXT NOT NULL,
                amount        DOUBLE PRECISION NOT NULL,
                timestamp     TEXT NOT NULL,
                campaign_name TEXT NOT NULL,
                received      TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create purchases table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS purchases_order_id_idx ON purchases (order_id)")
            .execute(&self.pool)
            .await
            .context("Failed to create purchases index")?;

        Ok(())
    }
}

#[async_trait]
impl PurchaseLedger for PostgresLedger {
    async fn append(&self, record: PurchaseRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO purchases (order_id, amount, timestamp, campaign_name, received)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&record.order_id)
        .bind(record.amount)
        .bind(&record.timestamp)
        .bind(&record.campaign_name)
        .bind(record.received)
        .execute(&self.pool)
        .await
        .context("INSERT failed")?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<PurchaseRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, amount, timestamp, campaign_name, received
            FROM purchases
            ORDER BY seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("LIST query failed")?;

        rows.into_iter()
            .map(|r| -> Result<PurchaseRecord> {
                Ok(PurchaseRecord {
                    order_id: r.try_get("order_id")?,
                    amount: r.try_get("amount")?,
                    timestamp: r.try_get("timestamp")?,
                    campaign_name: r.try_get("campaign_name")?,
                    received: r.try_get::<DateTime<Utc>, _>("received")?,
                })
            })
            .collect()
    }

    async fn remove(&self, order_id: &str) -> Result<bool> {
        let affected = sqlx::query("DELETE FROM purchases WHERE order_id = $1")
            .bind(order_id)
            .execute(&self.pool)
            .await
            .context("DELETE failed")?
            .rows_affected();

        Ok(affected > 0)
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM purchases")
            .execute(&self.pool)
            .await
            .context("DELETE failed")?;
        Ok(())
    }
}
