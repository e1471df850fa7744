//! # Cart Repository
//!
//! Per-customer staging of `(item, quantity)` lines.
//!
//! Every query is scoped by `customer_id`, so an entry owned by someone
//! else behaves exactly like a missing one. Cart quantities are a wish
//! list: checkout re-validates against the stock ledger.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use loom_core::CartEntry;

/// A cart entry joined with live item data (read model only).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartLine {
    pub entry_id: String,
    pub item_id: String,
    pub code: String,
    pub name: String,
    pub category: Option<String>,
    pub quantity: i64,
    pub price_snapshot: i64,
    /// Live on-hand quantity.
    pub available: i64,
    pub unit_price: i64,
    pub online_price: Option<i64>,
    pub is_active: bool,
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    /// Live storefront price.
    pub fn live_price(&self) -> i64 {
        self.online_price.unwrap_or(self.unit_price)
    }
}

/// Repository for cart entries.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Entry owned by `customer_id`, if any.
    pub async fn get(&self, customer_id: &str, entry_id: &str) -> DbResult<Option<CartEntry>> {
        let entry = sqlx::query_as::<_, CartEntry>(
            r#"
            SELECT id, customer_id, item_id, quantity, price_snapshot, created_at, updated_at
            FROM cart_entries
            WHERE id = ?1 AND customer_id = ?2
            "#,
        )
        .bind(entry_id)
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// The customer's entry for `item_id`, if any.
    pub async fn find_by_item(
        &self,
        customer_id: &str,
        item_id: &str,
    ) -> DbResult<Option<CartEntry>> {
        let entry = sqlx::query_as::<_, CartEntry>(
            r#"
            SELECT id, customer_id, item_id, quantity, price_snapshot, created_at, updated_at
            FROM cart_entries
            WHERE customer_id = ?1 AND item_id = ?2
            "#,
        )
        .bind(customer_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// All entries, in the order they were first added.
    pub async fn list(&self, customer_id: &str) -> DbResult<Vec<CartEntry>> {
        let entries = sqlx::query_as::<_, CartEntry>(
            r#"
            SELECT id, customer_id, item_id, quantity, price_snapshot, created_at, updated_at
            FROM cart_entries
            WHERE customer_id = ?1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Entries joined with live item data.
    pub async fn lines(&self, customer_id: &str) -> DbResult<Vec<CartLine>> {
        let lines = sqlx::query_as::<_, CartLine>(
            r#"
            SELECT
                c.id AS entry_id,
                c.item_id,
                i.code,
                i.name,
                i.category,
                c.quantity,
                c.price_snapshot,
                i.quantity AS available,
                i.unit_price,
                i.online_price,
                i.is_active,
                c.created_at AS added_at
            FROM cart_entries c
            JOIN items i ON i.id = c.item_id
            WHERE c.customer_id = ?1
            ORDER BY c.created_at ASC, c.id ASC
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    pub async fn count(&self, customer_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM cart_entries WHERE customer_id = ?1")
                .bind(customer_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Adds `quantity` to the customer's line for `item_id`, creating it
    /// when absent, and refreshes the price snapshot.
    ///
    /// The sum is computed by SQLite in the same statement that checks it
    /// against live stock and `max_quantity`, so concurrent adds cannot
    /// overwrite each other. Returns `None` when the item is missing or
    /// inactive, or when the new line total would exceed either bound.
    pub async fn add_quantity(
        &self,
        customer_id: &str,
        item_id: &str,
        quantity: i64,
        price_snapshot: i64,
        max_quantity: i64,
    ) -> DbResult<Option<CartEntry>> {
        debug!(customer_id = %customer_id, item_id = %item_id, quantity, "Adding to cart entry");

        let now = Utc::now();
        let entry = sqlx::query_as::<_, CartEntry>(
            r#"
            INSERT INTO cart_entries (
                id, customer_id, item_id, quantity, price_snapshot, created_at, updated_at
            )
            SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?6
            FROM items
            WHERE items.id = ?3 AND items.is_active = 1
              AND items.quantity >= ?4 AND ?4 <= ?7
            ON CONFLICT (customer_id, item_id) DO UPDATE SET
                quantity = cart_entries.quantity + excluded.quantity,
                price_snapshot = excluded.price_snapshot,
                updated_at = excluded.updated_at
            WHERE cart_entries.quantity + excluded.quantity <= ?7
              AND cart_entries.quantity + excluded.quantity <= (
                  SELECT items.quantity FROM items WHERE items.id = excluded.item_id
              )
            RETURNING id, customer_id, item_id, quantity, price_snapshot, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(customer_id)
        .bind(item_id)
        .bind(quantity)
        .bind(price_snapshot)
        .bind(now)
        .bind(max_quantity)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Sets a line's quantity. Returns false when the entry is not the customer's.
    pub async fn update_quantity(
        &self,
        customer_id: &str,
        entry_id: &str,
        quantity: i64,
    ) -> DbResult<bool> {
        debug!(entry_id = %entry_id, quantity, "Updating cart quantity");

        let result = sqlx::query(
            r#"
            UPDATE cart_entries
            SET quantity = ?3, updated_at = ?4
            WHERE id = ?1 AND customer_id = ?2
            "#,
        )
        .bind(entry_id)
        .bind(customer_id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Removes a line. Returns false when the entry is not the customer's.
    pub async fn remove(&self, customer_id: &str, entry_id: &str) -> DbResult<bool> {
        debug!(entry_id = %entry_id, "Removing cart entry");

        let result = sqlx::query("DELETE FROM cart_entries WHERE id = ?1 AND customer_id = ?2")
            .bind(entry_id)
            .bind(customer_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Empties the customer's cart, returning how many lines were removed.
    pub async fn clear(&self, customer_id: &str) -> DbResult<u64> {
        debug!(customer_id = %customer_id, "Clearing cart");

        let result = sqlx::query("DELETE FROM cart_entries WHERE customer_id = ?1")
            .bind(customer_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Deletes the checked-out entries inside the checkout transaction.
    ///
    /// Each entry must still exist with the quantity that was fulfilled.
    /// Returns false if any was removed or changed in the meantime.
    pub async fn consume(
        conn: &mut SqliteConnection,
        customer_id: &str,
        entries: &[CartEntry],
    ) -> DbResult<bool> {
        let mut consumed = 0usize;

        for entry in entries {
            let result = sqlx::query(
                "DELETE FROM cart_entries WHERE id = ?1 AND customer_id = ?2 AND quantity = ?3",
            )
            .bind(&entry.id)
            .bind(customer_id)
            .bind(entry.quantity)
            .execute(&mut *conn)
            .await?;

            consumed += result.rows_affected() as usize;
        }

        Ok(consumed == entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{memory_db, seeded_item};

    #[tokio::test]
    async fn test_add_quantity_sums_and_refreshes_snapshot() {
        let db = memory_db().await;
        let cotton = seeded_item(&db, "COT-100", 10, 15_000).await;
        let carts = db.carts();

        let first = carts.add_quantity("cust-1", &cotton.id, 2, 15_000, 999).await.unwrap().unwrap();
        let second = carts.add_quantity("cust-1", &cotton.id, 5, 14_000, 999).await.unwrap().unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 7);
        assert_eq!(second.price_snapshot, 14_000);
        assert_eq!(carts.count("cust-1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_add_quantity_refuses_past_stock_or_line_limit() {
        let db = memory_db().await;
        let cotton = seeded_item(&db, "COT-100", 10, 15_000).await;
        let carts = db.carts();

        assert!(carts.add_quantity("cust-1", &cotton.id, 11, 15_000, 999).await.unwrap().is_none());
        assert_eq!(carts.count("cust-1").await.unwrap(), 0);

        carts.add_quantity("cust-1", &cotton.id, 6, 15_000, 999).await.unwrap().unwrap();
        assert!(carts.add_quantity("cust-1", &cotton.id, 5, 14_000, 999).await.unwrap().is_none());
        assert!(carts.add_quantity("cust-1", &cotton.id, 3, 14_000, 8).await.unwrap().is_none());

        let lines = carts.list("cust-1").await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 6);
        assert_eq!(lines[0].price_snapshot, 15_000);

        assert!(carts.add_quantity("cust-1", "no-such-item", 1, 0, 999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_entries_are_scoped_to_their_owner() {
        let db = memory_db().await;
        let silk = seeded_item(&db, "SLK-100", 10, 90_000).await;
        let carts = db.carts();

        let entry = carts.add_quantity("cust-1", &silk.id, 1, 90_000, 999).await.unwrap().unwrap();

        assert!(carts.get("cust-2", &entry.id).await.unwrap().is_none());
        assert!(!carts.update_quantity("cust-2", &entry.id, 3).await.unwrap());
        assert!(!carts.remove("cust-2", &entry.id).await.unwrap());
        assert_eq!(carts.get("cust-1", &entry.id).await.unwrap().unwrap().quantity, 1);
    }

    #[tokio::test]
    async fn test_lines_join_live_item_data() {
        let db = memory_db().await;
        let linen = seeded_item(&db, "LIN-100", 7, 40_000).await;
        db.carts().add_quantity("cust-1", &linen.id, 2, 38_000, 999).await.unwrap();

        let lines = db.carts().lines("cust-1").await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].code, "LIN-100");
        assert_eq!(lines[0].available, 7);
        assert_eq!(lines[0].price_snapshot, 38_000);
        assert_eq!(lines[0].live_price(), 40_000);
    }

    #[tokio::test]
    async fn test_consume_detects_concurrent_edits() {
        let db = memory_db().await;
        let denim = seeded_item(&db, "DNM-100", 10, 55_000).await;
        let carts = db.carts();

        let entry = carts.add_quantity("cust-1", &denim.id, 2, 55_000, 999).await.unwrap().unwrap();
        carts.update_quantity("cust-1", &entry.id, 3).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        assert!(!CartRepository::consume(&mut conn, "cust-1", &[entry])
            .await
            .unwrap());
        drop(conn);

        let fresh = carts.list("cust-1").await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        assert!(CartRepository::consume(&mut conn, "cust-1", &fresh)
            .await
            .unwrap());
        drop(conn);

        assert_eq!(carts.count("cust-1").await.unwrap(), 0);
    }
}
