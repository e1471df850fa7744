//! # Order Repository
//!
//! Storefront orders and their lines.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. CHECKOUT (one transaction, owned by loom-api)                      │
//! │     └── insert()      → Order { status: pending, payment: pending }    │
//! │     └── insert_item() → OrderItem × n  (immutable)                     │
//! │                                                                         │
//! │  2. FULFILMENT                                                         │
//! │     └── transition_status(): pending → processing → shipped → delivered│
//! │                                                                         │
//! │  3. (OPTIONAL) CANCEL, pending only                                    │
//! │     └── mark_cancelled() + restock, same transaction                   │
//! │                                                                         │
//! │  PAYMENT: transition_payment_status(): pending → paid | failed        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Status updates are guarded on the expected current status, so two staff
//! members racing on the same order cannot both win.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use crate::repository::{limit_offset, REFERENCE_ATTEMPTS};
use loom_core::{generate_reference, Order, OrderItem, OrderStatus, Page, PaymentStatus, ReferenceKind};

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT
                id, order_number, customer_id,
                status, payment_status, payment_method,
                subtotal, shipping_cost, tax, total,
                recipient_name, phone, address, city, postal_code, special_instructions,
                created_at, updated_at
            FROM orders
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Gets all lines of an order.
    pub async fn get_items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let mut conn = self.pool.acquire().await?;
        Self::items_in(&mut conn, order_id).await
    }

    /// Order lines, read through the caller's transaction.
    pub async fn items_in(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT
                id, order_id, item_id,
                code_snapshot, name_snapshot,
                quantity, unit_price, line_total,
                created_at
            FROM order_items
            WHERE order_id = ?1
            ORDER BY item_id ASC, id ASC
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(items)
    }

    /// The customer's orders, newest first.
    pub async fn list_for_customer(
        &self,
        customer_id: &str,
        page: u32,
        limit: u32,
    ) -> DbResult<Page<Order>> {
        let (sql_limit, offset) = limit_offset(page, limit);

        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT
                id, order_number, customer_id,
                status, payment_status, payment_method,
                subtotal, shipping_cost, tax, total,
                recipient_name, phone, address, city, postal_code, special_instructions,
                created_at, updated_at
            FROM orders
            WHERE customer_id = ?1
            ORDER BY order_number DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(customer_id)
        .bind(sql_limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE customer_id = ?1")
            .bind(customer_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(Page {
            items: orders,
            page,
            limit,
            total,
        })
    }

    /// Inserts the order header inside the checkout transaction.
    ///
    /// On an `order_number` collision a fresh number is generated and the
    /// insert retried; `order.order_number` holds the number that stuck.
    pub async fn insert(conn: &mut SqliteConnection, order: &mut Order) -> DbResult<()> {
        let mut attempt = 1;
        loop {
            debug!(id = %order.id, order_number = %order.order_number, attempt, "Inserting order");

            match Self::insert_header(conn, order).await {
                Err(err)
                    if err.is_unique_violation_on("order_number")
                        && attempt < REFERENCE_ATTEMPTS =>
                {
                    warn!(order_number = %order.order_number, "Order number collision, regenerating");
                    order.order_number = generate_reference(ReferenceKind::Order);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn insert_header(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, customer_id,
                status, payment_status, payment_method,
                subtotal, shipping_cost, tax, total,
                recipient_name, phone, address, city, postal_code, special_instructions,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3,
                ?4, ?5, ?6,
                ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14, ?15, ?16,
                ?17, ?18
            )
            "#,
        )
        .bind(&order.id)
        .bind(&order.order_number)
        .bind(&order.customer_id)
        .bind(order.status)
        .bind(order.payment_status)
        .bind(order.payment_method)
        .bind(order.subtotal)
        .bind(order.shipping_cost)
        .bind(order.tax)
        .bind(order.total)
        .bind(&order.recipient_name)
        .bind(&order.phone)
        .bind(&order.address)
        .bind(&order.city)
        .bind(&order.postal_code)
        .bind(&order.special_instructions)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts one order line. Snapshot fields freeze the item's code and name.
    pub async fn insert_item(conn: &mut SqliteConnection, item: &OrderItem) -> DbResult<()> {
        debug!(order_id = %item.order_id, item_id = %item.item_id, "Inserting order item");

        sqlx::query(
            r#"
            INSERT INTO order_items (
                id, order_id, item_id,
                code_snapshot, name_snapshot,
                quantity, unit_price, line_total,
                created_at
            ) VALUES (
                ?1, ?2, ?3,
                ?4, ?5,
                ?6, ?7, ?8,
                ?9
            )
            "#,
        )
        .bind(&item.id)
        .bind(&item.order_id)
        .bind(&item.item_id)
        .bind(&item.code_snapshot)
        .bind(&item.name_snapshot)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.line_total)
        .bind(item.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Moves `status` from `from` to `to`. Returns false if the order was
    /// not in `from` (or does not exist).
    pub async fn transition_status(
        &self,
        id: &str,
        from: OrderStatus,
        to: OrderStatus,
    ) -> DbResult<bool> {
        let mut conn = self.pool.acquire().await?;
        Self::transition_status_in(&mut conn, id, from, to).await
    }

    /// [`OrderRepository::transition_status`] inside the caller's transaction.
    pub async fn transition_status_in(
        conn: &mut SqliteConnection,
        id: &str,
        from: OrderStatus,
        to: OrderStatus,
    ) -> DbResult<bool> {
        debug!(id = %id, %from, %to, "Updating order status");

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = ?3, updated_at = ?4
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Moves `payment_status` from `from` to `to`; false if it was not in `from`.
    pub async fn transition_payment_status(
        &self,
        id: &str,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> DbResult<bool> {
        debug!(id = %id, %from, %to, "Updating payment status");

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET payment_status = ?3, updated_at = ?4
            WHERE id = ?1 AND payment_status = ?2
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Current status, read through the caller's transaction.
    pub async fn status_in(conn: &mut SqliteConnection, id: &str) -> DbResult<OrderStatus> {
        sqlx::query_scalar::<_, OrderStatus>("SELECT status FROM orders WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))
    }

    /// Counts orders (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{memory_db, seeded_item};
    use crate::Database;
    use loom_core::PaymentMethod;
    use uuid::Uuid;

    fn order(number: &str, customer_id: &str, total: i64) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4().to_string(),
            order_number: number.to_string(),
            customer_id: customer_id.to_string(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: PaymentMethod::BankTransfer,
            subtotal: total,
            shipping_cost: 0,
            tax: 0,
            total,
            recipient_name: "Sari".to_string(),
            phone: "0812".to_string(),
            address: "Jl. Tenun 7".to_string(),
            city: "Pekalongan".to_string(),
            postal_code: None,
            special_instructions: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_colliding_order_number_is_regenerated() {
        let db = memory_db().await;

        let mut tx = db.begin().await.unwrap();
        let mut first = order("ORD-FIXED", "cust-1", 100);
        OrderRepository::insert(&mut tx, &mut first).await.unwrap();

        let mut second = order("ORD-FIXED", "cust-1", 200);
        OrderRepository::insert(&mut tx, &mut second).await.unwrap();
        Database::commit(tx).await.unwrap();

        assert_eq!(first.order_number, "ORD-FIXED");
        assert_ne!(second.order_number, "ORD-FIXED");
        assert!(second.order_number.starts_with("ORD-"));
        assert_eq!(db.orders().count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_status_transitions_are_guarded() {
        let db = memory_db().await;
        let mut tx = db.begin().await.unwrap();
        let mut o = order("ORD-1", "cust-1", 100);
        OrderRepository::insert(&mut tx, &mut o).await.unwrap();
        Database::commit(tx).await.unwrap();

        let orders = db.orders();
        assert!(orders
            .transition_status(&o.id, OrderStatus::Pending, OrderStatus::Processing)
            .await
            .unwrap());
        assert!(!orders
            .transition_status(&o.id, OrderStatus::Pending, OrderStatus::Cancelled)
            .await
            .unwrap());
        assert!(orders
            .transition_payment_status(&o.id, PaymentStatus::Pending, PaymentStatus::Paid)
            .await
            .unwrap());

        let stored = orders.get_by_id(&o.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Processing);
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_order_items_are_immutable() {
        let db = memory_db().await;
        let cotton = seeded_item(&db, "COT-200", 5, 100).await;

        let mut tx = db.begin().await.unwrap();
        let mut o = order("ORD-2", "cust-1", 200);
        OrderRepository::insert(&mut tx, &mut o).await.unwrap();
        let line = OrderItem {
            id: Uuid::new_v4().to_string(),
            order_id: o.id.clone(),
            item_id: cotton.id.clone(),
            code_snapshot: cotton.code.clone(),
            name_snapshot: cotton.name.clone(),
            quantity: 2,
            unit_price: 100,
            line_total: 200,
            created_at: Utc::now(),
        };
        OrderRepository::insert_item(&mut tx, &line).await.unwrap();
        Database::commit(tx).await.unwrap();

        let update = sqlx::query("UPDATE order_items SET quantity = 1 WHERE id = ?1")
            .bind(&line.id)
            .execute(db.pool())
            .await;
        assert!(update.is_err());
        assert_eq!(db.orders().get_items(&o.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_for_customer_pages_newest_first() {
        let db = memory_db().await;
        let mut tx = db.begin().await.unwrap();
        for n in 1..=3 {
            let mut o = order(&format!("ORD-{}", n), "cust-1", 100);
            OrderRepository::insert(&mut tx, &mut o).await.unwrap();
        }
        let mut other = order("ORD-9", "cust-2", 100);
        OrderRepository::insert(&mut tx, &mut other).await.unwrap();
        Database::commit(tx).await.unwrap();

        let page = db.orders().list_for_customer("cust-1", 1, 2).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].order_number, "ORD-3");

        let page2 = db.orders().list_for_customer("cust-1", 2, 2).await.unwrap();
        assert_eq!(page2.items.len(), 1);
        assert_eq!(page2.items[0].order_number, "ORD-1");
    }
}
