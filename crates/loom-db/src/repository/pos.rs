//! # POS Repository
//!
//! Counter transactions. They are written once, already `completed`, and
//! never change afterwards.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::error::DbResult;
use crate::repository::{limit_offset, REFERENCE_ATTEMPTS};
use loom_core::{generate_reference, Page, PosTransaction, PosTransactionItem, ReferenceKind};

/// Repository for POS transactions.
#[derive(Debug, Clone)]
pub struct PosRepository {
    pool: SqlitePool,
}

impl PosRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PosRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<PosTransaction>> {
        let txn = sqlx::query_as::<_, PosTransaction>(
            r#"
            SELECT
                id, transaction_number, customer_id, cashier_id,
                payment_method, status,
                subtotal, tax, total, paid_amount, change_amount,
                created_at
            FROM pos_transactions
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(txn)
    }

    pub async fn get_items(&self, transaction_id: &str) -> DbResult<Vec<PosTransactionItem>> {
        let items = sqlx::query_as::<_, PosTransactionItem>(
            r#"
            SELECT
                id, transaction_id, item_id,
                code_snapshot, name_snapshot,
                quantity, unit_price, line_total,
                created_at
            FROM pos_transaction_items
            WHERE transaction_id = ?1
            ORDER BY rowid ASC
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Transactions, newest first, with the overall count.
    pub async fn list(&self, page: u32, limit: u32) -> DbResult<Page<PosTransaction>> {
        let (sql_limit, offset) = limit_offset(page, limit);

        let items = sqlx::query_as::<_, PosTransaction>(
            r#"
            SELECT
                id, transaction_number, customer_id, cashier_id,
                payment_method, status,
                subtotal, tax, total, paid_amount, change_amount,
                created_at
            FROM pos_transactions
            ORDER BY transaction_number DESC
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(sql_limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pos_transactions")
            .fetch_one(&self.pool)
            .await?;

        Ok(Page {
            items,
            page,
            limit,
            total,
        })
    }

    /// Inserts the transaction header, regenerating the number on collision.
    pub async fn insert(conn: &mut SqliteConnection, txn: &mut PosTransaction) -> DbResult<()> {
        let mut attempt = 1;
        loop {
            debug!(
                id = %txn.id,
                transaction_number = %txn.transaction_number,
                attempt,
                "Inserting POS transaction"
            );

            match Self::insert_header(conn, txn).await {
                Err(err)
                    if err.is_unique_violation_on("transaction_number")
                        && attempt < REFERENCE_ATTEMPTS =>
                {
                    warn!(
                        transaction_number = %txn.transaction_number,
                        "Transaction number collision, regenerating"
                    );
                    txn.transaction_number = generate_reference(ReferenceKind::PosTransaction);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn insert_header(conn: &mut SqliteConnection, txn: &PosTransaction) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO pos_transactions (
                id, transaction_number, customer_id, cashier_id,
                payment_method, status,
                subtotal, tax, total, paid_amount, change_amount,
                created_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6,
                ?7, ?8, ?9, ?10, ?11,
                ?12
            )
            "#,
        )
        .bind(&txn.id)
        .bind(&txn.transaction_number)
        .bind(&txn.customer_id)
        .bind(&txn.cashier_id)
        .bind(txn.payment_method)
        .bind(txn.status)
        .bind(txn.subtotal)
        .bind(txn.tax)
        .bind(txn.total)
        .bind(txn.paid_amount)
        .bind(txn.change_amount)
        .bind(txn.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn insert_item(conn: &mut SqliteConnection, item: &PosTransactionItem) -> DbResult<()> {
        debug!(transaction_id = %item.transaction_id, item_id = %item.item_id, "Inserting POS line");

        sqlx::query(
            r#"
            INSERT INTO pos_transaction_items (
                id, transaction_id, item_id,
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
        .bind(&item.transaction_id)
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

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pos_transactions")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
