//! # Stock Commands
//!
//! Back-office operations on the ledger: goods received, corrections after
//! a count, history and the low-stock list.
//!
//! Each mutation writes the ledger and its stock log entry in one
//! transaction.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use ts_rs::TS;

use crate::auth::Principal;
use crate::commands::applied;
use crate::context::AppContext;
use crate::error::ApiResult;
use loom_core::validation::{validate_page, validate_stock_movement};
use loom_core::{CoreError, Item, StockLogEntry, StockLogType, ValidationError};
use loom_db::{ChainReport, Database, ItemRepository, StockChange, StockLogRepository};

/// Entries returned by [`stock_history`] when no limit is given.
const DEFAULT_HISTORY_LIMIT: u32 = 50;

/// An applied stock movement and the log entry recording it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub item_id: String,
    pub code: String,
    pub previous_quantity: i64,
    pub resulting_quantity: i64,
    pub delta: i64,
    pub log_id: i64,
}

impl StockMovement {
    fn new(change: &StockChange, log_id: i64) -> Self {
        StockMovement {
            item_id: change.item_id.clone(),
            code: change.code.clone(),
            previous_quantity: change.previous_quantity,
            resulting_quantity: change.resulting_quantity,
            delta: change.delta(),
            log_id,
        }
    }
}

fn required_note(note: &str) -> ApiResult<&str> {
    let note = note.trim();
    if note.is_empty() {
        return Err(ValidationError::required("note").into());
    }
    if note.len() > 500 {
        return Err(ValidationError::TooLong {
            field: "note".to_string(),
            max: 500,
        }
        .into());
    }
    Ok(note)
}

/// Books goods received (admin only).
pub async fn receive_stock(
    ctx: &AppContext,
    principal: &Principal,
    item_id: &str,
    quantity: i64,
    note: Option<&str>,
) -> ApiResult<StockMovement> {
    let staff_id = principal.require_admin()?;
    debug!(staff_id = %staff_id, item_id = %item_id, quantity, "receive_stock command");

    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        }
        .into());
    }
    validate_stock_movement("quantity", quantity)?;
    let note = required_note(note.unwrap_or("Stock received"))?;

    let mut tx = ctx.db.begin().await?;

    let outcome = ItemRepository::increment(&mut tx, item_id, quantity).await?;
    let change = applied(outcome, item_id, quantity)?;
    let log_id = StockLogRepository::append(
        &mut tx,
        &change.log_entry(StockLogType::In, note, None, staff_id),
    )
    .await?;

    Database::commit(tx).await?;

    info!(
        code = %change.code,
        quantity,
        resulting = change.resulting_quantity,
        "Stock received"
    );

    Ok(StockMovement::new(&change, log_id))
}

/// Applies a signed correction after a stock count (admin only).
///
/// Refused with `INSUFFICIENT_STOCK` if it would take the quantity below 0.
pub async fn adjust_stock(
    ctx: &AppContext,
    principal: &Principal,
    item_id: &str,
    delta: i64,
    note: &str,
) -> ApiResult<StockMovement> {
    let staff_id = principal.require_admin()?;
    debug!(staff_id = %staff_id, item_id = %item_id, delta, "adjust_stock command");

    validate_stock_movement("delta", delta)?;
    let note = required_note(note)?;

    let mut tx = ctx.db.begin().await?;

    let outcome = ItemRepository::adjust(&mut tx, item_id, delta).await?;
    let change = applied(outcome, item_id, delta.saturating_neg())?;
    let log_id = StockLogRepository::append(
        &mut tx,
        &change.log_entry(StockLogType::Adjustment, note, None, staff_id),
    )
    .await?;

    Database::commit(tx).await?;

    info!(
        code = %change.code,
        delta,
        resulting = change.resulting_quantity,
        "Stock adjusted"
    );

    Ok(StockMovement::new(&change, log_id))
}

async fn existing_item(ctx: &AppContext, item_id: &str) -> ApiResult<Item> {
    ctx.db
        .items()
        .get_by_id(item_id)
        .await?
        .ok_or_else(|| CoreError::ItemNotFound(item_id.to_string()).into())
}

/// An item's stock log, newest first (staff only).
pub async fn stock_history(
    ctx: &AppContext,
    principal: &Principal,
    item_id: &str,
    limit: Option<u32>,
) -> ApiResult<Vec<StockLogEntry>> {
    principal.require_staff()?;
    let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    debug!(item_id = %item_id, limit, "stock_history command");

    validate_page(1, limit)?;
    existing_item(ctx, item_id).await?;

    Ok(ctx.db.stock_logs().history(item_id, limit).await?)
}

/// Active items at or below their minimum (staff only).
pub async fn low_stock(ctx: &AppContext, principal: &Principal) -> ApiResult<Vec<Item>> {
    principal.require_staff()?;
    debug!("low_stock command");

    Ok(ctx.db.items().list_low_stock().await?)
}

/// Replays an item's stock log against the ledger (staff only).
pub async fn verify_log_chain(
    ctx: &AppContext,
    principal: &Principal,
    item_id: &str,
) -> ApiResult<ChainReport> {
    principal.require_staff()?;
    debug!(item_id = %item_id, "verify_log_chain command");

    existing_item(ctx, item_id).await?;
    let report = ctx.db.stock_logs().verify_chain(item_id).await?;

    if !report.is_consistent() {
        tracing::warn!(
            item_id = %item_id,
            ledger = report.ledger_quantity,
            replayed = report.replayed_quantity,
            first_break = ?report.first_break,
            "Stock log does not reconstruct ledger quantity"
        );
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::*;
    use crate::error::ErrorCode;

    #[tokio::test]
    async fn test_receive_and_adjust_are_logged() {
        let ctx = memory_context().await;
        let denim = stock_item(&ctx, "DNM-001", 3, 80_000).await;
        let boss = admin();

        let received = receive_stock(&ctx, &boss, &denim.id, 12, Some("PO-2291"))
            .await
            .unwrap();
        assert_eq!(received.previous_quantity, 3);
        assert_eq!(received.resulting_quantity, 15);

        let adjusted = adjust_stock(&ctx, &boss, &denim.id, -4, "Water damage")
            .await
            .unwrap();
        assert_eq!(adjusted.delta, -4);
        assert_eq!(quantity_of(&ctx, &denim.id).await, 11);

        let history = stock_history(&ctx, &cashier(), &denim.id, None).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].log_type, StockLogType::Adjustment);
        assert_eq!(history[0].note, "Water damage");
        assert_eq!(history[1].log_type, StockLogType::In);
        assert_eq!(history[1].actor, "admin-1");

        let report = verify_log_chain(&ctx, &cashier(), &denim.id).await.unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.entries, 3);
        assert_eq!(report.ledger_quantity, 11);
    }

    #[tokio::test]
    async fn test_adjustment_below_zero_is_refused() {
        let ctx = memory_context().await;
        let denim = stock_item(&ctx, "DNM-001", 3, 80_000).await;

        let err = adjust_stock(&ctx, &admin(), &denim.id, -4, "Recount")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientStock);
        assert_eq!(quantity_of(&ctx, &denim.id).await, 3);
        assert_eq!(
            stock_history(&ctx, &admin(), &denim.id, None).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_stock_operations_need_the_right_principal_and_input() {
        let ctx = memory_context().await;
        let denim = stock_item(&ctx, "DNM-001", 3, 80_000).await;

        let err = receive_stock(&ctx, &cashier(), &denim.id, 1, None)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthenticationError);

        let err = adjust_stock(&ctx, &admin(), &denim.id, 0, "noop")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = adjust_stock(&ctx, &admin(), &denim.id, 2, "  ")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = receive_stock(&ctx, &admin(), "missing", 1, None)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);

        let err = stock_history(&ctx, &customer("alice"), &denim.id, None)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthenticationError);
    }

    #[tokio::test]
    async fn test_movements_are_bounded() {
        let ctx = memory_context().await;
        let denim = stock_item(&ctx, "DNM-001", 3, 80_000).await;

        let err = receive_stock(&ctx, &admin(), &denim.id, i64::MAX, None)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = adjust_stock(&ctx, &admin(), &denim.id, loom_core::MAX_STOCK_MOVEMENT + 1, "Recount")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = adjust_stock(&ctx, &admin(), &denim.id, i64::MIN, "Recount")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        assert_eq!(quantity_of(&ctx, &denim.id).await, 3);

        receive_stock(&ctx, &admin(), &denim.id, loom_core::MAX_STOCK_MOVEMENT, None)
            .await
            .unwrap();
        assert_eq!(quantity_of(&ctx, &denim.id).await, 3 + loom_core::MAX_STOCK_MOVEMENT);
    }

    #[tokio::test]
    async fn test_low_stock_lists_active_items_at_threshold() {
        let ctx = memory_context().await;
        let low = stock_item(&ctx, "SLK-LOW", 2, 90_000).await;
        stock_item(&ctx, "SLK-OK", 20, 90_000).await;
        let mut hidden = item("SLK-HID", 0, 90_000);
        hidden.is_active = false;
        insert_item(&ctx, hidden).await;

        let items = low_stock(&ctx, &cashier()).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, low.id);
    }
}
