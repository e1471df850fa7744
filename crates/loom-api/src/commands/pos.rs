//! # POS Commands
//!
//! Counter sales: validated, priced and committed in one request.
//!
//! ## Sale Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    create_pos_transaction                               │
//! │                                                                         │
//! │  1. require_staff, lines present, counter payment method               │
//! │  2. pre-check: every item exists, requested ≤ on hand (pool read)      │
//! │  3. totals under the counter policy; cash: paid ≥ total                │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │   ├── INSERT pos_transactions (completed), number retried on collision  │
//! │   └── per line:                                                         │
//! │        ├── INSERT pos_transaction_items                                 │
//! │        ├── try_decrement(Counter) ── refused ──► rollback everything   │
//! │        └── append `out` stock log (reference = transaction number)      │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  change = paid - total (cash) | 0 (card, bank transfer)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The pre-check only gives the cashier an early answer; the guarded
//! decrement inside the transaction is what actually protects stock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};
use ts_rs::TS;
use uuid::Uuid;

use crate::auth::Principal;
use crate::commands::{applied, paging};
use crate::context::AppContext;
use crate::error::ApiResult;
use loom_core::validation::{validate_page, validate_payment_amount, validate_price, validate_quantity};
use loom_core::{
    calculate_totals, generate_reference, CoreError, Item, Money, Page, PaymentMethod,
    PosStatus, PosTransaction, PosTransactionItem, PricedLine, ReferenceKind, SalesChannel,
    StockLogType, ValidationError,
};
use loom_db::{Database, ItemRepository, PosRepository, StockLogRepository};

// =============================================================================
// Request / Response DTOs
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PosLineRequest {
    pub item_id: String,
    pub quantity: i64,
    /// Counter price override; the item's unit price when absent.
    pub unit_price: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CreatePosTransactionRequest {
    pub customer_id: Option<String>,
    pub payment_method: String,
    /// Required for cash; ignored otherwise.
    pub paid_amount: Option<i64>,
    pub lines: Vec<PosLineRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLine {
    pub code: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub line_total: i64,
}

/// Printable receipt for a counter sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PosReceipt {
    pub transaction_id: String,
    pub transaction_number: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub cashier_id: String,
    pub customer_id: Option<String>,
    pub payment_method: PaymentMethod,
    pub lines: Vec<ReceiptLine>,
    pub subtotal: i64,
    pub tax: i64,
    pub total: i64,
    pub paid_amount: i64,
    pub change: i64,
}

impl PosReceipt {
    fn new(txn: &PosTransaction, items: &[PosTransactionItem]) -> Self {
        PosReceipt {
            transaction_id: txn.id.clone(),
            transaction_number: txn.transaction_number.clone(),
            created_at: txn.created_at,
            cashier_id: txn.cashier_id.clone(),
            customer_id: txn.customer_id.clone(),
            payment_method: txn.payment_method,
            lines: items
                .iter()
                .map(|i| ReceiptLine {
                    code: i.code_snapshot.clone(),
                    name: i.name_snapshot.clone(),
                    quantity: i.quantity,
                    unit_price: i.unit_price,
                    line_total: i.line_total,
                })
                .collect(),
            subtotal: txn.subtotal,
            tax: txn.tax,
            total: txn.total,
            paid_amount: txn.paid_amount,
            change: txn.change_amount,
        }
    }
}

/// Result of a completed counter sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CreatePosTransactionResponse {
    pub transaction_id: String,
    pub transaction_number: String,
    pub total: i64,
    pub change: i64,
    pub receipt: PosReceipt,
}

/// Settlement of a sale: what was tendered and what goes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Settlement {
    paid: Money,
    change: Money,
}

/// Cash must cover the total; every other method settles the exact total.
fn settle(
    method: PaymentMethod,
    paid_amount: Option<i64>,
    total: Money,
) -> Result<Settlement, CoreError> {
    if method != PaymentMethod::Cash {
        return Ok(Settlement {
            paid: total,
            change: Money::zero(),
        });
    }

    let paid = paid_amount.ok_or_else(|| ValidationError::required("paid_amount"))?;
    validate_payment_amount(paid)?;

    let paid = Money::from_minor(paid);
    if paid < total {
        return Err(CoreError::InvalidPaymentAmount {
            reason: format!("paid {} does not cover total {}", paid, total),
        });
    }

    Ok(Settlement {
        paid,
        change: paid - total,
    })
}

// =============================================================================
// Commands
// =============================================================================

/// Records a completed counter sale (staff only).
///
/// ## Errors
/// - `EMPTY_ORDER`: no lines
/// - `VALIDATION_ERROR`: payment method, quantities, prices, cash tendered
/// - `NOT_FOUND`: unknown item
/// - `INSUFFICIENT_STOCK`: pre-check or guarded decrement refused a line
pub async fn create_pos_transaction(
    ctx: &AppContext,
    principal: &Principal,
    request: CreatePosTransactionRequest,
) -> ApiResult<CreatePosTransactionResponse> {
    let cashier_id = principal.require_staff()?;
    debug!(cashier_id = %cashier_id, lines = request.lines.len(), "create_pos_transaction command");

    if request.lines.is_empty() {
        return Err(CoreError::EmptyOrder.into());
    }

    let payment_method: PaymentMethod = request.payment_method.parse()?;
    if !payment_method.is_counter_method() {
        return Err(ValidationError::NotAllowed {
            field: "payment_method".to_string(),
            allowed: vec![
                PaymentMethod::Cash.to_string(),
                PaymentMethod::Card.to_string(),
                PaymentMethod::BankTransfer.to_string(),
            ],
        }
        .into());
    }

    for line in &request.lines {
        if line.item_id.trim().is_empty() {
            return Err(ValidationError::required("item_id").into());
        }
        validate_quantity(line.quantity)?;
        if let Some(price) = line.unit_price {
            validate_price(price)?;
        }
    }

    let mut lines = request.lines;
    lines.sort_by(|a, b| a.item_id.cmp(&b.item_id));

    let items = precheck_stock(ctx, &lines).await?;

    let mut sold = Vec::with_capacity(lines.len());
    for line in &lines {
        let item = items
            .get(&line.item_id)
            .ok_or_else(|| CoreError::ItemNotFound(line.item_id.clone()))?;
        let price = line
            .unit_price
            .map(Money::from_minor)
            .unwrap_or_else(|| item.counter_unit_price());
        sold.push((line.quantity, item, PricedLine::new(line.quantity, price)));
    }

    let priced: Vec<PricedLine> = sold.iter().map(|(_, _, p)| *p).collect();
    let totals = calculate_totals(&priced, ctx.counter_policy.as_ref())?;
    let settlement = settle(payment_method, request.paid_amount, totals.total)?;

    let now = Utc::now();
    let mut txn = PosTransaction {
        id: Uuid::new_v4().to_string(),
        transaction_number: generate_reference(ReferenceKind::PosTransaction),
        customer_id: request.customer_id.filter(|c| !c.trim().is_empty()),
        cashier_id: cashier_id.to_string(),
        payment_method,
        status: PosStatus::Completed,
        subtotal: totals.subtotal.minor(),
        tax: totals.tax.minor(),
        total: totals.total.minor(),
        paid_amount: settlement.paid.minor(),
        change_amount: settlement.change.minor(),
        created_at: now,
    };

    let mut tx = ctx.db.begin().await?;
    PosRepository::insert(&mut tx, &mut txn).await?;

    let mut recorded = Vec::with_capacity(sold.len());
    for (quantity, item, priced_line) in &sold {
        let txn_item = PosTransactionItem {
            id: Uuid::new_v4().to_string(),
            transaction_id: txn.id.clone(),
            item_id: item.id.clone(),
            code_snapshot: item.code.clone(),
            name_snapshot: item.name.clone(),
            quantity: *quantity,
            unit_price: priced_line.unit_price.minor(),
            line_total: priced_line.line_total().minor(),
            created_at: now,
        };
        PosRepository::insert_item(&mut tx, &txn_item).await?;

        let outcome =
            ItemRepository::try_decrement(&mut tx, &item.id, *quantity, SalesChannel::Counter)
                .await?;
        let change = applied(outcome, &item.id, *quantity)?;

        let entry = change.log_entry(
            StockLogType::Out,
            "Counter sale",
            Some(&txn.transaction_number),
            cashier_id,
        );
        StockLogRepository::append(&mut tx, &entry).await?;

        recorded.push(txn_item);
    }

    Database::commit(tx).await?;

    info!(
        transaction_number = %txn.transaction_number,
        cashier_id = %cashier_id,
        total = %totals.total,
        change = %settlement.change,
        "POS transaction completed"
    );

    Ok(CreatePosTransactionResponse {
        transaction_id: txn.id.clone(),
        transaction_number: txn.transaction_number.clone(),
        total: txn.total,
        change: txn.change_amount,
        receipt: PosReceipt::new(&txn, &recorded),
    })
}

/// Loads every item on the sale and checks the summed request per item
/// against current stock.
async fn precheck_stock(
    ctx: &AppContext,
    lines: &[PosLineRequest],
) -> ApiResult<HashMap<String, Item>> {
    let mut requested: HashMap<&str, i64> = HashMap::new();
    for line in lines {
        *requested.entry(line.item_id.as_str()).or_default() += line.quantity;
    }

    let repo = ctx.db.items();
    let mut items = HashMap::with_capacity(requested.len());
    for (item_id, quantity) in requested {
        let item = repo
            .get_by_id(item_id)
            .await?
            .ok_or_else(|| CoreError::ItemNotFound(item_id.to_string()))?;

        if !item.can_fulfil(quantity) {
            return Err(CoreError::InsufficientStock {
                code: item.code,
                available: item.quantity,
                requested: quantity,
            }
            .into());
        }

        items.insert(item_id.to_string(), item);
    }

    Ok(items)
}

/// Gets a counter sale with its receipt (staff only).
pub async fn get_pos_transaction(
    ctx: &AppContext,
    principal: &Principal,
    transaction_id: &str,
) -> ApiResult<PosReceipt> {
    principal.require_staff()?;
    debug!(transaction_id = %transaction_id, "get_pos_transaction command");

    let pos = ctx.db.pos();
    let txn = pos
        .get_by_id(transaction_id)
        .await?
        .ok_or_else(|| CoreError::TransactionNotFound(transaction_id.to_string()))?;
    let items = pos.get_items(&txn.id).await?;

    Ok(PosReceipt::new(&txn, &items))
}

/// Counter sales, newest first (staff only).
pub async fn list_pos_transactions(
    ctx: &AppContext,
    principal: &Principal,
    page: Option<u32>,
    limit: Option<u32>,
) -> ApiResult<Page<PosTransaction>> {
    principal.require_staff()?;
    let (page, limit) = paging(page, limit, ctx.page_size);
    debug!(page, limit, "list_pos_transactions command");

    validate_page(page, limit)?;

    Ok(ctx.db.pos().list(page, limit).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::*;
    use crate::error::ErrorCode;
    use std::sync::Arc;

    use loom_core::types::TaxRate;
    use loom_core::FlatCharges;

    fn sale(method: &str, paid: Option<i64>, lines: &[(&str, i64)]) -> CreatePosTransactionRequest {
        CreatePosTransactionRequest {
            customer_id: None,
            payment_method: method.to_string(),
            paid_amount: paid,
            lines: lines
                .iter()
                .map(|(item_id, quantity)| PosLineRequest {
                    item_id: item_id.to_string(),
                    quantity: *quantity,
                    unit_price: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_settlement() {
        let total = Money::from_minor(15_000);

        let cash = settle(PaymentMethod::Cash, Some(20_000), total).unwrap();
        assert_eq!(cash.change.minor(), 5_000);

        let card = settle(PaymentMethod::Card, Some(20_000), total).unwrap();
        assert_eq!(card.change, Money::zero());
        assert_eq!(card.paid, total);

        assert!(matches!(
            settle(PaymentMethod::Cash, Some(10_000), total),
            Err(CoreError::InvalidPaymentAmount { .. })
        ));
        assert!(settle(PaymentMethod::Cash, None, total).is_err());
    }

    #[tokio::test]
    async fn test_cash_sale_gives_change_and_logs_stock() {
        let ctx = memory_context().await;
        let cotton = stock_item(&ctx, "COT-001", 10, 5_000).await;

        let response = create_pos_transaction(
            &ctx,
            &cashier(),
            sale("cash", Some(20_000), &[(&cotton.id, 3)]),
        )
        .await
        .unwrap();

        assert_eq!(response.total, 15_000);
        assert_eq!(response.change, 5_000);
        assert_eq!(response.receipt.paid_amount, 20_000);
        assert_eq!(response.receipt.lines[0].code, "COT-001");
        assert!(response.transaction_number.starts_with("POS-"));
        assert_eq!(quantity_of(&ctx, &cotton.id).await, 7);

        let logs = ctx
            .db
            .stock_logs()
            .for_reference(&response.transaction_number)
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].quantity_delta, -3);
        assert_eq!(logs[0].actor, "cashier-1");
    }

    #[tokio::test]
    async fn test_card_sale_never_gives_change() {
        let ctx = memory_context().await;
        let cotton = stock_item(&ctx, "COT-001", 10, 5_000).await;

        let response = create_pos_transaction(
            &ctx,
            &cashier(),
            sale("card", Some(20_000), &[(&cotton.id, 3)]),
        )
        .await
        .unwrap();

        assert_eq!(response.total, 15_000);
        assert_eq!(response.change, 0);
        assert_eq!(response.receipt.paid_amount, 15_000);
    }

    #[tokio::test]
    async fn test_short_cash_is_rejected_without_side_effects() {
        let ctx = memory_context().await;
        let cotton = stock_item(&ctx, "COT-001", 10, 5_000).await;

        let err = create_pos_transaction(
            &ctx,
            &cashier(),
            sale("cash", Some(10_000), &[(&cotton.id, 3)]),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(quantity_of(&ctx, &cotton.id).await, 10);
        assert_eq!(ctx.db.pos().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_one_short_line_aborts_the_whole_sale() {
        let ctx = memory_context().await;
        let cotton = stock_item(&ctx, "COT-001", 10, 5_000).await;
        let silk = stock_item(&ctx, "SLK-001", 1, 9_000).await;

        let err = create_pos_transaction(
            &ctx,
            &cashier(),
            sale("card", None, &[(&cotton.id, 2), (&silk.id, 2)]),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientStock);
        assert!(err.message.contains("SLK-001"));

        assert_eq!(quantity_of(&ctx, &cotton.id).await, 10);
        assert_eq!(quantity_of(&ctx, &silk.id).await, 1);
        assert_eq!(ctx.db.pos().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_repeated_item_lines_are_checked_together() {
        let ctx = memory_context().await;
        let cotton = stock_item(&ctx, "COT-001", 4, 5_000).await;

        let err = create_pos_transaction(
            &ctx,
            &cashier(),
            sale("card", None, &[(&cotton.id, 3), (&cotton.id, 2)]),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientStock);
        assert_eq!(quantity_of(&ctx, &cotton.id).await, 4);
    }

    #[tokio::test]
    async fn test_counter_sells_inactive_items_at_override_price() {
        let ctx = memory_context().await;
        let mut remnant = item("LIN-REM", 2, 30_000);
        remnant.is_active = false;
        let remnant = insert_item(&ctx, remnant).await;

        let mut request = sale("bank_transfer", None, &[(&remnant.id, 2)]);
        request.lines[0].unit_price = Some(20_000);
        request.customer_id = Some("walk-in-42".to_string());

        let response = create_pos_transaction(&ctx, &cashier(), request)
            .await
            .unwrap();
        assert_eq!(response.total, 40_000);
        assert_eq!(response.receipt.customer_id.as_deref(), Some("walk-in-42"));
        assert_eq!(quantity_of(&ctx, &remnant.id).await, 0);
    }

    #[tokio::test]
    async fn test_price_overrides_are_bounded() {
        let ctx = memory_context().await;
        let cotton = stock_item(&ctx, "COT-001", 10, 5_000).await;
        let silk = stock_item(&ctx, "SLK-001", 10, 9_000).await;

        let mut huge_line = sale("card", None, &[(&cotton.id, 2)]);
        huge_line.lines[0].unit_price = Some(i64::MAX);
        let err = create_pos_transaction(&ctx, &cashier(), huge_line)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let mut huge_sum = sale("card", None, &[(&cotton.id, 1), (&silk.id, 1)]);
        huge_sum.lines[0].unit_price = Some(5_000_000_000_000_000_000);
        huge_sum.lines[1].unit_price = Some(5_000_000_000_000_000_000);
        let err = create_pos_transaction(&ctx, &cashier(), huge_sum)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        assert_eq!(quantity_of(&ctx, &cotton.id).await, 10);
        assert_eq!(quantity_of(&ctx, &silk.id).await, 10);
        assert_eq!(ctx.db.pos().count().await.unwrap(), 0);

        let bulk = stock_item(&ctx, "COT-BULK", 999, 5_000).await;
        let mut top_price = sale("card", None, &[(&bulk.id, 999)]);
        top_price.lines[0].unit_price = Some(loom_core::MAX_UNIT_PRICE);
        let response = create_pos_transaction(&ctx, &cashier(), top_price)
            .await
            .unwrap();
        assert_eq!(response.total, 999 * loom_core::MAX_UNIT_PRICE);
    }

    #[tokio::test]
    async fn test_failed_log_write_rolls_back_the_decrement() {
        let ctx = memory_context().await;
        let cotton = stock_item(&ctx, "COT-001", 10, 5_000).await;
        fail_stock_log_writes(&ctx).await;

        let err = create_pos_transaction(
            &ctx,
            &cashier(),
            sale("card", None, &[(&cotton.id, 3)]),
        )
        .await
        .unwrap_err();

        assert_eq!(err.code, ErrorCode::TransactionFailure);
        assert_eq!(quantity_of(&ctx, &cotton.id).await, 10);
        assert_eq!(ctx.db.pos().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_counter_policy_tax_applies() {
        let mut ctx = memory_context().await;
        ctx.counter_policy = Arc::new(FlatCharges::new(Money::zero(), TaxRate::from_bps(1000)));
        let cotton = stock_item(&ctx, "COT-001", 10, 10_000).await;

        let response = create_pos_transaction(
            &ctx,
            &cashier(),
            sale("cash", Some(50_000), &[(&cotton.id, 1)]),
        )
        .await
        .unwrap();
        assert_eq!(response.receipt.subtotal, 10_000);
        assert_eq!(response.receipt.tax, 1_000);
        assert_eq!(response.total, 11_000);
        assert_eq!(response.change, 39_000);
    }

    #[tokio::test]
    async fn test_request_validation() {
        let ctx = memory_context().await;
        let cotton = stock_item(&ctx, "COT-001", 10, 5_000).await;

        let err = create_pos_transaction(&ctx, &cashier(), sale("cash", Some(1), &[]))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EmptyOrder);

        let err = create_pos_transaction(
            &ctx,
            &cashier(),
            sale("cash_on_delivery", None, &[(&cotton.id, 1)]),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = create_pos_transaction(
            &ctx,
            &customer("alice"),
            sale("card", None, &[(&cotton.id, 1)]),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthenticationError);

        let err = create_pos_transaction(
            &ctx,
            &cashier(),
            sale("card", None, &[("missing-item", 1)]),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_receipt_lookup_and_listing() {
        let ctx = memory_context().await;
        let cotton = stock_item(&ctx, "COT-001", 10, 5_000).await;

        let first = create_pos_transaction(&ctx, &cashier(), sale("card", None, &[(&cotton.id, 1)]))
            .await
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = create_pos_transaction(&ctx, &cashier(), sale("card", None, &[(&cotton.id, 1)]))
            .await
            .unwrap();

        let receipt = get_pos_transaction(&ctx, &cashier(), &first.transaction_id)
            .await
            .unwrap();
        assert_eq!(receipt.transaction_number, first.transaction_number);
        assert_eq!(receipt.lines.len(), 1);

        let page = list_pos_transactions(&ctx, &admin(), Some(1), Some(1))
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].id, second.transaction_id);

        let err = list_pos_transactions(&ctx, &cashier(), Some(1), Some(101))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = get_pos_transaction(&ctx, &cashier(), "nope").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}
