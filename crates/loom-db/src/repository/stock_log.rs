//! # Stock Log Repository
//!
//! Append-only audit trail of every quantity change.
//!
//! ```text
//! id │ type │ delta │ prev → result │ reference
//! ───┼──────┼───────┼───────────────┼──────────────────────────
//!  1 │ in   │   +5  │   0  →  5     │ (opening stock)
//!  7 │ out  │   -3  │   5  →  2     │ ORD-20261019143005123-…
//!  9 │ in   │   +3  │   2  →  5     │ ORD-20261019143005123-… (cancelled)
//! ```
//!
//! Replaying the deltas from zero in `id` order must land on the ledger's
//! current quantity; [`StockLogRepository::verify_chain`] checks exactly that.
//! UPDATE and DELETE on `stock_logs` are rejected by triggers.

use chrono::Utc;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use loom_core::{NewStockLogEntry, StockLogEntry};

/// Result of replaying an item's log against the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainReport {
    pub item_id: String,
    pub ledger_quantity: i64,
    pub replayed_quantity: i64,
    pub entries: usize,
    /// First entry whose `previous_quantity` does not continue the chain.
    pub first_break: Option<i64>,
}

impl ChainReport {
    pub fn is_consistent(&self) -> bool {
        self.first_break.is_none() && self.ledger_quantity == self.replayed_quantity
    }
}

/// Repository for stock log operations.
#[derive(Debug, Clone)]
pub struct StockLogRepository {
    pool: SqlitePool,
}

impl StockLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockLogRepository { pool }
    }

    /// Appends one entry. Pure insert, always inside the transaction of the
    /// ledger change it documents.
    pub async fn append(conn: &mut SqliteConnection, entry: &NewStockLogEntry) -> DbResult<i64> {
        debug!(
            item_id = %entry.item_id,
            log_type = entry.log_type.as_str(),
            delta = entry.quantity_delta,
            reference = ?entry.reference,
            "Appending stock log"
        );

        let result = sqlx::query(
            r#"
            INSERT INTO stock_logs (
                item_id, log_type, quantity_delta,
                previous_quantity, resulting_quantity,
                note, reference, actor, created_at
            ) VALUES (
                ?1, ?2, ?3,
                ?4, ?5,
                ?6, ?7, ?8, ?9
            )
            "#,
        )
        .bind(&entry.item_id)
        .bind(entry.log_type)
        .bind(entry.quantity_delta)
        .bind(entry.previous_quantity)
        .bind(entry.resulting_quantity)
        .bind(&entry.note)
        .bind(&entry.reference)
        .bind(&entry.actor)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Newest-first history for one item.
    pub async fn history(&self, item_id: &str, limit: u32) -> DbResult<Vec<StockLogEntry>> {
        let entries = sqlx::query_as::<_, StockLogEntry>(
            r#"
            SELECT
                id, item_id, log_type, quantity_delta,
                previous_quantity, resulting_quantity,
                note, reference, actor, created_at
            FROM stock_logs
            WHERE item_id = ?1
            ORDER BY id DESC
            LIMIT ?2
            "#,
        )
        .bind(item_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// The full chain for one item, oldest first.
    pub async fn chain(&self, item_id: &str) -> DbResult<Vec<StockLogEntry>> {
        let mut conn = self.pool.acquire().await?;
        Self::chain_in(&mut conn, item_id).await
    }

    async fn chain_in(conn: &mut SqliteConnection, item_id: &str) -> DbResult<Vec<StockLogEntry>> {
        let entries = sqlx::query_as::<_, StockLogEntry>(
            r#"
            SELECT
                id, item_id, log_type, quantity_delta,
                previous_quantity, resulting_quantity,
                note, reference, actor, created_at
            FROM stock_logs
            WHERE item_id = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(item_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(entries)
    }

    /// All entries written under one order or transaction number.
    pub async fn for_reference(&self, reference: &str) -> DbResult<Vec<StockLogEntry>> {
        let entries = sqlx::query_as::<_, StockLogEntry>(
            r#"
            SELECT
                id, item_id, log_type, quantity_delta,
                previous_quantity, resulting_quantity,
                note, reference, actor, created_at
            FROM stock_logs
            WHERE reference = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(reference)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Replays an item's log from zero and compares it with the ledger.
    ///
    /// Both reads share one read transaction so they see the same snapshot.
    pub async fn verify_chain(&self, item_id: &str) -> DbResult<ChainReport> {
        let mut tx = self.pool.begin().await?;

        let ledger_quantity: i64 = sqlx::query_scalar("SELECT quantity FROM items WHERE id = ?1")
            .bind(item_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Item", item_id))?;

        let chain = Self::chain_in(&mut tx, item_id).await?;
        tx.rollback().await?;

        let mut replayed = 0i64;
        let mut first_break = None;
        for entry in &chain {
            if first_break.is_none()
                && (entry.previous_quantity != replayed || !entry.is_consistent())
            {
                first_break = Some(entry.id);
            }
            replayed = replayed.saturating_add(entry.quantity_delta);
        }

        Ok(ChainReport {
            item_id: item_id.to_string(),
            ledger_quantity,
            replayed_quantity: replayed,
            entries: chain.len(),
            first_break,
        })
    }
}
