//! # Item Repository (Stock Ledger)
//!
//! The authoritative per-item on-hand quantity.
//!
//! ## Guarded Change
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UNSAFE (read-then-write)            SAFE (one conditioned write)       │
//! │  ────────────────────────            ────────────────────────────       │
//! │  A: SELECT quantity → 5              A: UPDATE items                    │
//! │  B: SELECT quantity → 5                 SET quantity = quantity - 3     │
//! │  A: 5 >= 3, UPDATE → 2                  WHERE id = X AND quantity >= 3  │
//! │  B: 5 >= 3, UPDATE → -1  ✗              → 1 row, quantity = 2           │
//! │                                      B: same UPDATE                     │
//! │                                         → 0 rows → Insufficient         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock changes run inside a caller-owned transaction and return a
//! [`StockOutcome`]; the caller decides whether to roll back. Each change
//! reports the previous and resulting quantity so the caller can append
//! the matching stock log entry in the same transaction.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::error::DbResult;
use crate::repository::stock_log::StockLogRepository;
use loom_core::{Item, NewStockLogEntry, SalesChannel, StockLogType};

// =============================================================================
// Stock Change Results
// =============================================================================

/// An applied change to an item's quantity, as seen inside the transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockChange {
    pub item_id: String,
    pub code: String,
    pub name: String,
    pub previous_quantity: i64,
    pub resulting_quantity: i64,
    /// Live counter price at the time of the change.
    pub unit_price: i64,
    /// Live storefront price at the time of the change.
    pub online_price: Option<i64>,
}

impl StockChange {
    pub fn delta(&self) -> i64 {
        self.resulting_quantity - self.previous_quantity
    }

    /// Storefront price, falling back to the counter price.
    pub fn online_unit_price(&self) -> i64 {
        self.online_price.unwrap_or(self.unit_price)
    }

    /// Builds the audit entry documenting this change.
    pub fn log_entry(
        &self,
        log_type: StockLogType,
        note: impl Into<String>,
        reference: Option<&str>,
        actor: &str,
    ) -> NewStockLogEntry {
        NewStockLogEntry {
            item_id: self.item_id.clone(),
            log_type,
            quantity_delta: self.delta(),
            previous_quantity: self.previous_quantity,
            resulting_quantity: self.resulting_quantity,
            note: note.into(),
            reference: reference.map(str::to_string),
            actor: actor.to_string(),
        }
    }
}

/// Result of a guarded stock change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockOutcome {
    Applied(StockChange),
    /// The change would take the quantity below zero. Nothing was written.
    Insufficient { code: String, available: i64 },
    /// Online sale of an item that is not purchasable online.
    Inactive { code: String },
    NotFound,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for item (stock ledger) operations.
#[derive(Debug, Clone)]
pub struct ItemRepository {
    pool: SqlitePool,
}

impl ItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ItemRepository { pool }
    }

    /// Gets an item by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(
            r#"
            SELECT
                id, code, name, category,
                quantity, min_stock, max_stock,
                unit_price, online_price, is_active,
                created_at, updated_at
            FROM items
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    /// Gets an item by its business code.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(
            r#"
            SELECT
                id, code, name, category,
                quantity, min_stock, max_stock,
                unit_price, online_price, is_active,
                created_at, updated_at
            FROM items
            WHERE code = ?1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    /// Read-only quantity check, e.g. before an irrevocable side effect.
    ///
    /// Not a reservation: the guarded decrement re-checks at commit time.
    pub async fn current_quantity(&self, id: &str) -> DbResult<Option<i64>> {
        let quantity: Option<i64> = sqlx::query_scalar("SELECT quantity FROM items WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(quantity)
    }

    /// Inserts a catalog item together with its opening `in` log entry.
    ///
    /// The opening entry (0 → quantity) makes every item's log chain
    /// replayable from zero.
    pub async fn insert(&self, item: &Item, actor: &str) -> DbResult<Item> {
        debug!(id = %item.id, code = %item.code, quantity = item.quantity, "Inserting item");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO items (
                id, code, name, category,
                quantity, min_stock, max_stock,
                unit_price, online_price, is_active,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7,
                ?8, ?9, ?10,
                ?11, ?12
            )
            "#,
        )
        .bind(&item.id)
        .bind(&item.code)
        .bind(&item.name)
        .bind(&item.category)
        .bind(item.quantity)
        .bind(item.min_stock)
        .bind(item.max_stock)
        .bind(item.unit_price)
        .bind(item.online_price)
        .bind(item.is_active)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *tx)
        .await?;

        if item.quantity > 0 {
            let opening = NewStockLogEntry {
                item_id: item.id.clone(),
                log_type: StockLogType::In,
                quantity_delta: item.quantity,
                previous_quantity: 0,
                resulting_quantity: item.quantity,
                note: "Opening stock".to_string(),
                reference: None,
                actor: actor.to_string(),
            };
            StockLogRepository::append(&mut *tx, &opening).await?;
        }

        tx.commit().await?;

        Ok(item.clone())
    }

    /// Active items at or below their minimum stock, emptiest first.
    pub async fn list_low_stock(&self) -> DbResult<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT
                id, code, name, category,
                quantity, min_stock, max_stock,
                unit_price, online_price, is_active,
                created_at, updated_at
            FROM items
            WHERE is_active = 1 AND quantity <= min_stock
            ORDER BY quantity ASC, code ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Counts all items (for diagnostics and seeding).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // In-transaction stock changes
    // =========================================================================

    /// Takes `quantity` units if, and only if, that many are on hand.
    ///
    /// The online channel additionally requires the item to be active.
    pub async fn try_decrement(
        conn: &mut SqliteConnection,
        item_id: &str,
        quantity: i64,
        channel: SalesChannel,
    ) -> DbResult<StockOutcome> {
        debug!(item_id = %item_id, quantity, ?channel, "Decrementing stock");
        Self::guarded_change(conn, item_id, -quantity, channel.requires_active()).await
    }

    /// Returns `quantity` units to stock (receipts, cancellations).
    pub async fn increment(
        conn: &mut SqliteConnection,
        item_id: &str,
        quantity: i64,
    ) -> DbResult<StockOutcome> {
        debug!(item_id = %item_id, quantity, "Incrementing stock");
        Self::guarded_change(conn, item_id, quantity, false).await
    }

    /// Applies a signed correction; refused if it would go below zero.
    pub async fn adjust(
        conn: &mut SqliteConnection,
        item_id: &str,
        delta: i64,
    ) -> DbResult<StockOutcome> {
        debug!(item_id = %item_id, delta, "Adjusting stock");
        Self::guarded_change(conn, item_id, delta, false).await
    }

    /// `quantity + delta >= 0` is evaluated and applied by one UPDATE, so no
    /// concurrent writer can slip between check and write. When nothing
    /// matched, a follow-up read in the same transaction explains why.
    async fn guarded_change(
        conn: &mut SqliteConnection,
        item_id: &str,
        delta: i64,
        require_active: bool,
    ) -> DbResult<StockOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE items
            SET quantity = quantity + ?2, updated_at = ?3
            WHERE id = ?1
              AND quantity + ?2 >= 0
              AND (?4 = 0 OR is_active = 1)
            "#,
        )
        .bind(item_id)
        .bind(delta)
        .bind(Utc::now())
        .bind(require_active)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 1 {
            let (code, name, quantity, unit_price, online_price): (
                String,
                String,
                i64,
                i64,
                Option<i64>,
            ) = sqlx::query_as(
                "SELECT code, name, quantity, unit_price, online_price FROM items WHERE id = ?1",
            )
            .bind(item_id)
            .fetch_one(&mut *conn)
            .await?;

            return Ok(StockOutcome::Applied(StockChange {
                item_id: item_id.to_string(),
                code,
                name,
                previous_quantity: quantity - delta,
                resulting_quantity: quantity,
                unit_price,
                online_price,
            }));
        }

        let row: Option<(String, i64, bool)> =
            sqlx::query_as("SELECT code, quantity, is_active FROM items WHERE id = ?1")
                .bind(item_id)
                .fetch_optional(&mut *conn)
                .await?;

        let outcome = match row {
            None => StockOutcome::NotFound,
            Some((code, _, false)) if require_active => StockOutcome::Inactive { code },
            Some((code, available, _)) => StockOutcome::Insufficient { code, available },
        };

        warn!(item_id = %item_id, delta, ?outcome, "Stock change refused");
        Ok(outcome)
    }
}
