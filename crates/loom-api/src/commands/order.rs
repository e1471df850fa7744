//! # Order Commands
//!
//! Reads and lifecycle transitions for storefront orders.
//!
//! ```text
//! pending ──► processing ──► shipped ──► delivered
//!    │
//!    └──────► cancelled   (stock returned, `in` log per line)
//!
//! payment: pending ──► paid | failed
//! ```
//!
//! Transitions are conditioned on the current state in the UPDATE itself,
//! so two staff members racing on the same order cannot both win.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use ts_rs::TS;

use crate::auth::Principal;
use crate::commands::{applied, paging};
use crate::context::AppContext;
use crate::error::ApiResult;
use loom_core::validation::{validate_page, validate_uuid};
use loom_core::{CoreError, Order, OrderItem, OrderStatus, Page, PaymentStatus, StockLogType};
use loom_db::{Database, ItemRepository, OrderRepository, StockLogRepository};

/// Order header with its lines.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Loads an order the principal may see.
///
/// Customers only see their own orders; someone else's order is reported
/// as not found.
async fn visible_order(ctx: &AppContext, principal: &Principal, order_id: &str) -> ApiResult<Order> {
    validate_uuid("order_id", order_id)?;

    let order = ctx
        .db
        .orders()
        .get_by_id(order_id)
        .await?
        .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;

    match principal {
        Principal::Customer { id } if *id != order.customer_id => {
            Err(CoreError::OrderNotFound(order_id.to_string()).into())
        }
        _ => Ok(order),
    }
}

/// Gets an order with its lines.
pub async fn get_order(
    ctx: &AppContext,
    principal: &Principal,
    order_id: &str,
) -> ApiResult<OrderDetail> {
    debug!(order_id = %order_id, "get_order command");

    let order = visible_order(ctx, principal, order_id).await?;
    let items = ctx.db.orders().get_items(&order.id).await?;

    Ok(OrderDetail { order, items })
}

/// The calling customer's orders, newest first.
pub async fn list_orders(
    ctx: &AppContext,
    principal: &Principal,
    page: Option<u32>,
    limit: Option<u32>,
) -> ApiResult<Page<Order>> {
    let customer_id = principal.require_customer()?;
    let (page, limit) = paging(page, limit, ctx.page_size);
    debug!(customer_id = %customer_id, page, limit, "list_orders command");

    validate_page(page, limit)?;

    Ok(ctx
        .db
        .orders()
        .list_for_customer(customer_id, page, limit)
        .await?)
}

/// Moves an order along the fulfilment state machine (staff only).
///
/// Moving to `cancelled` goes through [`cancel_order`] so stock is returned.
pub async fn update_order_status(
    ctx: &AppContext,
    principal: &Principal,
    order_id: &str,
    status: &str,
) -> ApiResult<Order> {
    let staff_id = principal.require_staff()?;
    debug!(staff_id = %staff_id, order_id = %order_id, status = %status, "update_order_status command");

    let next: OrderStatus = status.parse()?;
    if next == OrderStatus::Cancelled {
        return cancel_order(ctx, principal, order_id).await;
    }

    let order = visible_order(ctx, principal, order_id).await?;
    if !order.status.can_transition_to(next) {
        return Err(CoreError::invalid_transition("Order", order.status, next).into());
    }

    let orders = ctx.db.orders();
    if !orders.transition_status(&order.id, order.status, next).await? {
        // Someone else moved it first
        return Err(CoreError::invalid_transition("Order", order.status, next).into());
    }

    info!(order_number = %order.order_number, from = %order.status, to = %next, "Order status updated");

    orders
        .get_by_id(&order.id)
        .await?
        .ok_or_else(|| CoreError::OrderNotFound(order.id.clone()).into())
}

/// Cancels a pending order and returns its stock.
///
/// Allowed for the owning customer and for staff. In one transaction the
/// status moves to `cancelled`, every line's quantity goes back to the
/// ledger and an `in` log entry referencing the order number is appended
/// per line.
pub async fn cancel_order(
    ctx: &AppContext,
    principal: &Principal,
    order_id: &str,
) -> ApiResult<Order> {
    debug!(actor = %principal.id(), order_id = %order_id, "cancel_order command");

    let order = visible_order(ctx, principal, order_id).await?;
    if !order.status.can_transition_to(OrderStatus::Cancelled) {
        return Err(
            CoreError::invalid_transition("Order", order.status, OrderStatus::Cancelled).into(),
        );
    }

    let mut tx = ctx.db.begin().await?;

    let cancelled = OrderRepository::transition_status_in(
        &mut tx,
        &order.id,
        OrderStatus::Pending,
        OrderStatus::Cancelled,
    )
    .await?;
    if !cancelled {
        let current = OrderRepository::status_in(&mut tx, &order.id).await?;
        return Err(
            CoreError::invalid_transition("Order", current, OrderStatus::Cancelled).into(),
        );
    }

    let lines = OrderRepository::items_in(&mut tx, &order.id).await?;
    for line in &lines {
        let outcome = ItemRepository::increment(&mut tx, &line.item_id, line.quantity).await?;
        let change = applied(outcome, &line.item_id, line.quantity)?;

        let entry = change.log_entry(
            StockLogType::In,
            "Order cancelled",
            Some(&order.order_number),
            principal.id(),
        );
        StockLogRepository::append(&mut tx, &entry).await?;
    }

    Database::commit(tx).await?;

    info!(
        order_number = %order.order_number,
        lines = lines.len(),
        "Order cancelled, stock returned"
    );

    ctx.db
        .orders()
        .get_by_id(&order.id)
        .await?
        .ok_or_else(|| CoreError::OrderNotFound(order.id.clone()).into())
}

/// Settles or fails an order's payment (staff only).
pub async fn update_payment_status(
    ctx: &AppContext,
    principal: &Principal,
    order_id: &str,
    status: PaymentStatus,
) -> ApiResult<Order> {
    let staff_id = principal.require_staff()?;
    debug!(staff_id = %staff_id, order_id = %order_id, %status, "update_payment_status command");

    let order = visible_order(ctx, principal, order_id).await?;
    if !order.payment_status.can_transition_to(status) {
        return Err(CoreError::invalid_transition("Payment", order.payment_status, status).into());
    }

    let orders = ctx.db.orders();
    if !orders
        .transition_payment_status(&order.id, order.payment_status, status)
        .await?
    {
        return Err(CoreError::invalid_transition("Payment", order.payment_status, status).into());
    }

    info!(order_number = %order.order_number, to = %status, "Payment status updated");

    orders
        .get_by_id(&order.id)
        .await?
        .ok_or_else(|| CoreError::OrderNotFound(order.id.clone()).into())
}
