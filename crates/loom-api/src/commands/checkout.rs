//! # Checkout (Order Fulfilment Engine)
//!
//! Turns a cart, a selection of cart lines or a single "buy now" item into
//! a pending order.
//!
//! ## One Path for Every Source
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CheckoutSource::Cart ────────┐                                         │
//! │  CheckoutSource::Selected ────┼──► resolve_lines() ──► Vec<RequestedLine>│
//! │  CheckoutSource::BuyNow ──────┘        (sorted by item_id)              │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │   ├── try_decrement(Online) per line ── refused ──► rollback + error   │
//! │   ├── totals at the live storefront price                               │
//! │   ├── INSERT order (pending / pending), number retried on collision     │
//! │   ├── INSERT order_items                                                │
//! │   ├── append `out` stock log per line (reference = order number)        │
//! │   └── consume cart entries (cart sources only) ── changed ──► rollback  │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing is written unless every step succeeds.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use ts_rs::TS;
use uuid::Uuid;

use crate::auth::Principal;
use crate::commands::applied;
use crate::context::AppContext;
use crate::error::ApiResult;
use loom_core::validation::{validate_quantity, validate_shipping};
use loom_core::{
    calculate_totals, generate_reference, CartEntry, CoreError, Money, Order, OrderItem,
    OrderStatus, PaymentMethod, PaymentStatus, PricedLine, ReferenceKind, SalesChannel,
    ShippingDetails, StockLogType, ValidationError,
};
use loom_db::{CartRepository, Database, ItemRepository, OrderRepository, StockLogRepository};

/// Where the lines of a checkout come from.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CheckoutSource {
    /// Everything in the customer's cart.
    Cart,
    /// A subset of the customer's cart entries.
    Selected {
        #[serde(rename = "entryIds")]
        entry_ids: Vec<String>,
    },
    /// One item straight from the product page; the cart is not touched.
    BuyNow {
        #[serde(rename = "itemId")]
        item_id: String,
        quantity: i64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub shipping: ShippingDetails,
    pub payment_method: String,
    pub source: CheckoutSource,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutReceipt {
    pub order_id: String,
    pub order_number: String,
    pub total: Money,
    pub status: OrderStatus,
}

/// A line to fulfil, before stock is taken.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RequestedLine {
    item_id: String,
    quantity: i64,
}

/// Lines to fulfil plus the cart entries they came from (if any).
#[derive(Debug, Default)]
struct ResolvedCheckout {
    lines: Vec<RequestedLine>,
    entries: Vec<CartEntry>,
}

/// Places an order.
///
/// ## Errors
/// - `VALIDATION_ERROR`: shipping fields, payment method, buy-now quantity
/// - `EMPTY_ORDER`: nothing to fulfil
/// - `NOT_FOUND`: a selected cart entry is not the customer's
/// - `INSUFFICIENT_STOCK` / `ITEM_INACTIVE`: refused at commit time
/// - `INVALID_STATE`: the cart changed while this checkout was running
pub async fn checkout(
    ctx: &AppContext,
    principal: &Principal,
    request: CheckoutRequest,
) -> ApiResult<CheckoutReceipt> {
    let customer_id = principal.require_customer()?;
    debug!(customer_id = %customer_id, source = ?request.source, "checkout command");

    let payment_method: PaymentMethod = request.payment_method.parse()?;
    if !payment_method.is_online_method() {
        return Err(ValidationError::NotAllowed {
            field: "payment_method".to_string(),
            allowed: vec![
                PaymentMethod::Card.to_string(),
                PaymentMethod::BankTransfer.to_string(),
                PaymentMethod::CashOnDelivery.to_string(),
            ],
        }
        .into());
    }
    validate_shipping(&request.shipping)?;

    let resolved = resolve_lines(&ctx.db, customer_id, &request.source).await?;
    if resolved.lines.is_empty() {
        return Err(CoreError::EmptyOrder.into());
    }

    let mut tx = ctx.db.begin().await?;

    let mut changes = Vec::with_capacity(resolved.lines.len());
    for line in &resolved.lines {
        let outcome = ItemRepository::try_decrement(
            &mut tx,
            &line.item_id,
            line.quantity,
            SalesChannel::Online,
        )
        .await?;
        changes.push((line.quantity, applied(outcome, &line.item_id, line.quantity)?));
    }

    let priced: Vec<PricedLine> = changes
        .iter()
        .map(|(qty, change)| PricedLine::new(*qty, Money::from_minor(change.online_unit_price())))
        .collect();
    let totals = calculate_totals(&priced, ctx.checkout_policy.as_ref())?;

    let now = Utc::now();
    let shipping = request.shipping;
    let mut order = Order {
        id: Uuid::new_v4().to_string(),
        order_number: generate_reference(ReferenceKind::Order),
        customer_id: customer_id.to_string(),
        status: OrderStatus::Pending,
        payment_status: PaymentStatus::Pending,
        payment_method,
        subtotal: totals.subtotal.minor(),
        shipping_cost: totals.shipping.minor(),
        tax: totals.tax.minor(),
        total: totals.total.minor(),
        recipient_name: shipping.recipient_name.trim().to_string(),
        phone: shipping.phone.trim().to_string(),
        address: shipping.address.trim().to_string(),
        city: shipping.city.trim().to_string(),
        postal_code: shipping.postal_code,
        special_instructions: shipping.special_instructions,
        created_at: now,
        updated_at: now,
    };
    OrderRepository::insert(&mut tx, &mut order).await?;

    for ((quantity, change), priced_line) in changes.iter().zip(&priced) {
        let order_item = OrderItem {
            id: Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            item_id: change.item_id.clone(),
            code_snapshot: change.code.clone(),
            name_snapshot: change.name.clone(),
            quantity: *quantity,
            unit_price: priced_line.unit_price.minor(),
            line_total: priced_line.line_total().minor(),
            created_at: now,
        };
        OrderRepository::insert_item(&mut tx, &order_item).await?;

        let entry = change.log_entry(
            StockLogType::Out,
            "Online order",
            Some(&order.order_number),
            customer_id,
        );
        StockLogRepository::append(&mut tx, &entry).await?;
    }

    if !resolved.entries.is_empty()
        && !CartRepository::consume(&mut tx, customer_id, &resolved.entries).await?
    {
        return Err(CoreError::StaleCart.into());
    }

    Database::commit(tx).await?;

    info!(
        order_number = %order.order_number,
        customer_id = %customer_id,
        lines = changes.len(),
        total = %totals.total,
        "Order placed"
    );

    Ok(CheckoutReceipt {
        order_id: order.id,
        order_number: order.order_number,
        total: totals.total,
        status: order.status,
    })
}

/// Converges the three sources on one sorted line list.
///
/// Sorting by item id keeps every sequence taking item rows in the same
/// order.
async fn resolve_lines(
    db: &Database,
    customer_id: &str,
    source: &CheckoutSource,
) -> ApiResult<ResolvedCheckout> {
    let mut resolved = match source {
        CheckoutSource::Cart => {
            let entries = db.carts().list(customer_id).await?;
            ResolvedCheckout {
                lines: entries.iter().map(RequestedLine::from).collect(),
                entries,
            }
        }
        CheckoutSource::Selected { entry_ids } => {
            let mut ids: Vec<&str> = entry_ids.iter().map(String::as_str).collect();
            ids.sort_unstable();
            ids.dedup();

            let carts = db.carts();
            let mut entries = Vec::with_capacity(ids.len());
            for id in ids {
                let entry = carts
                    .get(customer_id, id)
                    .await?
                    .ok_or_else(|| CoreError::CartEntryNotFound(id.to_string()))?;
                entries.push(entry);
            }
            ResolvedCheckout {
                lines: entries.iter().map(RequestedLine::from).collect(),
                entries,
            }
        }
        CheckoutSource::BuyNow { item_id, quantity } => {
            if item_id.trim().is_empty() {
                return Err(ValidationError::required("item_id").into());
            }
            validate_quantity(*quantity)?;
            ResolvedCheckout {
                lines: vec![RequestedLine {
                    item_id: item_id.clone(),
                    quantity: *quantity,
                }],
                entries: Vec::new(),
            }
        }
    };

    resolved.lines.sort_by(|a, b| a.item_id.cmp(&b.item_id));
    Ok(resolved)
}

impl From<&CartEntry> for RequestedLine {
    fn from(entry: &CartEntry) -> Self {
        RequestedLine {
            item_id: entry.item_id.clone(),
            quantity: entry.quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::cart::{add_to_cart, get_cart};
    use crate::context::test_support::*;
    use crate::error::ErrorCode;
    use std::sync::Arc;

    use loom_core::types::TaxRate;
    use loom_core::FlatCharges;

    fn shipping() -> ShippingDetails {
        ShippingDetails {
            recipient_name: "Siti Rahma".to_string(),
            phone: "+62 812 5555 0101".to_string(),
            address: "Jl. Malioboro 12".to_string(),
            city: "Yogyakarta".to_string(),
            postal_code: Some("55271".to_string()),
            special_instructions: None,
        }
    }

    fn request(source: CheckoutSource) -> CheckoutRequest {
        CheckoutRequest {
            shipping: shipping(),
            payment_method: "bank_transfer".to_string(),
            source,
        }
    }

    fn buy_now(item_id: &str, quantity: i64) -> CheckoutRequest {
        request(CheckoutSource::BuyNow {
            item_id: item_id.to_string(),
            quantity,
        })
    }

    #[tokio::test]
    async fn test_cart_checkout_places_order_and_empties_cart() {
        let ctx = memory_context().await;
        let cotton = stock_item(&ctx, "COT-001", 10, 100).await;
        let silk = stock_item(&ctx, "SLK-001", 10, 50).await;
        let alice = customer("alice");
        add_to_cart(&ctx, &alice, &cotton.id, 2).await.unwrap();
        add_to_cart(&ctx, &alice, &silk.id, 1).await.unwrap();

        let receipt = checkout(&ctx, &alice, request(CheckoutSource::Cart))
            .await
            .unwrap();
        assert_eq!(receipt.total.minor(), 250);
        assert_eq!(receipt.status, OrderStatus::Pending);
        assert!(receipt.order_number.starts_with("ORD-"));

        let order = ctx.db.orders().get_by_id(&receipt.order_id).await.unwrap().unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.subtotal, 250);
        assert!(order.totals_consistent());

        assert_eq!(quantity_of(&ctx, &cotton.id).await, 8);
        assert_eq!(quantity_of(&ctx, &silk.id).await, 9);
        assert!(get_cart(&ctx, &alice).await.unwrap().lines.is_empty());

        // Repeating the call finds nothing to fulfil
        let err = checkout(&ctx, &alice, request(CheckoutSource::Cart))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EmptyOrder);
        assert_eq!(ctx.db.orders().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_every_line_is_logged_against_the_order() {
        let ctx = memory_context().await;
        let cotton = stock_item(&ctx, "COT-001", 10, 100).await;
        let silk = stock_item(&ctx, "SLK-001", 7, 50).await;
        let alice = customer("alice");
        add_to_cart(&ctx, &alice, &cotton.id, 4).await.unwrap();
        add_to_cart(&ctx, &alice, &silk.id, 3).await.unwrap();

        let receipt = checkout(&ctx, &alice, request(CheckoutSource::Cart))
            .await
            .unwrap();

        let items = ctx.db.orders().get_items(&receipt.order_id).await.unwrap();
        let logs = ctx
            .db
            .stock_logs()
            .for_reference(&receipt.order_number)
            .await
            .unwrap();
        assert_eq!(logs.len(), items.len());

        let ordered: i64 = items.iter().map(|i| i.quantity).sum();
        let logged: i64 = logs.iter().map(|l| l.quantity_delta).sum();
        assert_eq!(logged, -ordered);

        for log in &logs {
            assert_eq!(log.log_type, StockLogType::Out);
            assert_eq!(log.actor, "alice");
            assert!(log.is_consistent());
            let item = items.iter().find(|i| i.item_id == log.item_id).unwrap();
            assert_eq!(log.resulting_quantity, log.previous_quantity - item.quantity);
        }

        assert!(ctx.db.stock_logs().verify_chain(&cotton.id).await.unwrap().is_consistent());
        assert!(ctx.db.stock_logs().verify_chain(&silk.id).await.unwrap().is_consistent());
    }

    #[tokio::test]
    async fn test_failing_line_rolls_back_every_line() {
        let ctx = memory_context().await;
        let plenty = stock_item(&ctx, "COT-001", 10, 100).await;
        let scarce = stock_item(&ctx, "SLK-001", 5, 50).await;
        let alice = customer("alice");
        add_to_cart(&ctx, &alice, &plenty.id, 2).await.unwrap();
        add_to_cart(&ctx, &alice, &scarce.id, 5).await.unwrap();

        // Counter sells some of the scarce item after it was staged
        let mut tx = ctx.db.begin().await.unwrap();
        ItemRepository::try_decrement(&mut tx, &scarce.id, 3, SalesChannel::Counter)
            .await
            .unwrap();
        Database::commit(tx).await.unwrap();

        let err = checkout(&ctx, &alice, request(CheckoutSource::Cart))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientStock);
        assert!(err.message.contains("SLK-001"));

        assert_eq!(quantity_of(&ctx, &plenty.id).await, 10);
        assert_eq!(quantity_of(&ctx, &scarce.id).await, 2);
        assert_eq!(ctx.db.orders().count().await.unwrap(), 0);
        assert_eq!(ctx.db.stock_logs().history(&plenty.id, 10).await.unwrap().len(), 1);
        assert_eq!(get_cart(&ctx, &alice).await.unwrap().lines.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_log_write_after_decrements_rolls_back_everything() {
        let ctx = memory_context().await;
        let cotton = stock_item(&ctx, "COT-001", 10, 100).await;
        let silk = stock_item(&ctx, "SLK-001", 10, 50).await;
        let alice = customer("alice");
        add_to_cart(&ctx, &alice, &cotton.id, 2).await.unwrap();
        add_to_cart(&ctx, &alice, &silk.id, 3).await.unwrap();
        fail_stock_log_writes(&ctx).await;

        let err = checkout(&ctx, &alice, request(CheckoutSource::Cart))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TransactionFailure);

        assert_eq!(quantity_of(&ctx, &cotton.id).await, 10);
        assert_eq!(quantity_of(&ctx, &silk.id).await, 10);
        assert_eq!(ctx.db.orders().count().await.unwrap(), 0);
        assert_eq!(get_cart(&ctx, &alice).await.unwrap().lines.len(), 2);

        let err = checkout(&ctx, &alice, buy_now(&silk.id, 1)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TransactionFailure);
        assert_eq!(quantity_of(&ctx, &silk.id).await, 10);
        assert_eq!(ctx.db.orders().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_selected_lines_leave_the_rest_of_the_cart() {
        let ctx = memory_context().await;
        let cotton = stock_item(&ctx, "COT-001", 10, 100).await;
        let silk = stock_item(&ctx, "SLK-001", 10, 50).await;
        let alice = customer("alice");
        let picked = add_to_cart(&ctx, &alice, &cotton.id, 1).await.unwrap();
        add_to_cart(&ctx, &alice, &silk.id, 1).await.unwrap();

        let receipt = checkout(
            &ctx,
            &alice,
            request(CheckoutSource::Selected {
                entry_ids: vec![picked.id.clone()],
            }),
        )
        .await
        .unwrap();
        assert_eq!(receipt.total.minor(), 100);

        let remaining = get_cart(&ctx, &alice).await.unwrap();
        assert_eq!(remaining.lines.len(), 1);
        assert_eq!(remaining.lines[0].item_id, silk.id);

        let err = checkout(
            &ctx,
            &customer("bob"),
            request(CheckoutSource::Selected {
                entry_ids: vec![remaining.lines[0].entry_id.clone()],
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);

        let err = checkout(
            &ctx,
            &alice,
            request(CheckoutSource::Selected { entry_ids: vec![] }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::EmptyOrder);
    }

    #[tokio::test]
    async fn test_buy_now_charges_live_online_price_and_skips_cart() {
        let ctx = memory_context().await;
        let mut batik = item("BTK-001", 3, 120_000);
        batik.online_price = Some(110_000);
        let batik = insert_item(&ctx, batik).await;
        let alice = customer("alice");
        add_to_cart(&ctx, &alice, &batik.id, 1).await.unwrap();

        let receipt = checkout(&ctx, &alice, buy_now(&batik.id, 2)).await.unwrap();
        assert_eq!(receipt.total.minor(), 220_000);

        let items = ctx.db.orders().get_items(&receipt.order_id).await.unwrap();
        assert_eq!(items[0].unit_price, 110_000);
        assert_eq!(items[0].code_snapshot, "BTK-001");
        assert_eq!(get_cart(&ctx, &alice).await.unwrap().lines.len(), 1);
        assert_eq!(quantity_of(&ctx, &batik.id).await, 1);
    }

    #[tokio::test]
    async fn test_inactive_item_is_refused_online() {
        let ctx = memory_context().await;
        let mut hidden = item("LIN-404", 10, 40_000);
        hidden.is_active = false;
        let hidden = insert_item(&ctx, hidden).await;

        let err = checkout(&ctx, &customer("alice"), buy_now(&hidden.id, 1))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ItemInactive);
        assert_eq!(quantity_of(&ctx, &hidden.id).await, 10);
    }

    #[tokio::test]
    async fn test_input_is_validated_before_anything_is_touched() {
        let ctx = memory_context().await;
        let cotton = stock_item(&ctx, "COT-001", 10, 100).await;
        let alice = customer("alice");

        let mut missing_city = buy_now(&cotton.id, 1);
        missing_city.shipping.city = "  ".to_string();
        let err = checkout(&ctx, &alice, missing_city).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let mut counter_only = buy_now(&cotton.id, 1);
        counter_only.payment_method = "cash".to_string();
        let err = checkout(&ctx, &alice, counter_only).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = checkout(&ctx, &alice, buy_now(&cotton.id, 0)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = checkout(&ctx, &cashier(), buy_now(&cotton.id, 1))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthenticationError);

        assert_eq!(quantity_of(&ctx, &cotton.id).await, 10);
    }

    #[tokio::test]
    async fn test_checkout_policy_adds_shipping_and_tax() {
        let mut ctx = memory_context().await;
        ctx.checkout_policy = Arc::new(FlatCharges::new(
            Money::from_minor(15_000),
            TaxRate::from_bps(1100),
        ));
        let cotton = stock_item(&ctx, "COT-001", 10, 100_000).await;

        let receipt = checkout(&ctx, &customer("alice"), buy_now(&cotton.id, 1))
            .await
            .unwrap();
        assert_eq!(receipt.total.minor(), 100_000 + 15_000 + 11_000);

        let order = ctx.db.orders().get_by_id(&receipt.order_id).await.unwrap().unwrap();
        assert_eq!(order.shipping_cost, 15_000);
        assert_eq!(order.tax, 11_000);
        assert!(order.totals_consistent());
    }

    #[tokio::test]
    async fn test_concurrent_checkouts_never_oversell() {
        let ctx = memory_context().await;
        let cotton = stock_item(&ctx, "COT-001", 5, 100).await;
        let alice = customer("alice");
        let bob = customer("bob");
        add_to_cart(&ctx, &alice, &cotton.id, 3).await.unwrap();
        add_to_cart(&ctx, &bob, &cotton.id, 3).await.unwrap();

        let (a, b) = tokio::join!(
            checkout(&ctx, &alice, request(CheckoutSource::Cart)),
            checkout(&ctx, &bob, request(CheckoutSource::Cart)),
        );

        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        let failure = results.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert_eq!(failure.code, ErrorCode::InsufficientStock);
        assert_eq!(quantity_of(&ctx, &cotton.id).await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_on_shared_file_database() {
        let (ctx, path) = file_context().await;
        let cotton = stock_item(&ctx, "COT-001", 5, 100).await;

        let mut handles = Vec::new();
        for buyer in ["alice", "bob"] {
            let ctx = ctx.clone();
            let item_id = cotton.id.clone();
            handles.push(tokio::spawn(async move {
                checkout(&ctx, &customer(buyer), buy_now(&item_id, 3)).await
            }));
        }

        let mut succeeded = 0;
        let mut refused = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(err) => {
                    assert_eq!(err.code, ErrorCode::InsufficientStock);
                    refused += 1;
                }
            }
        }

        assert_eq!((succeeded, refused), (1, 1));
        assert_eq!(quantity_of(&ctx, &cotton.id).await, 2);
        assert!(ctx.db.stock_logs().verify_chain(&cotton.id).await.unwrap().is_consistent());

        ctx.db.close().await;
        remove_db_files(&path);
    }
}
