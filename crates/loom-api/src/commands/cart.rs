//! # Cart Commands
//!
//! Per-customer staging of items before checkout.
//!
//! ## Cart Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Lifecycle                                       │
//! │                                                                         │
//! │  ┌──────────┐     ┌──────────┐     ┌──────────┐     ┌──────────┐       │
//! │  │  Empty   │────►│ In Cart  │────►│ Checkout │────►│  Order   │       │
//! │  │  Cart    │     │          │     │          │     │ pending  │       │
//! │  └──────────┘     └──────────┘     └──────────┘     └──────────┘       │
//! │                        │                 │                              │
//! │                   add_to_cart       checkout                           │
//! │                   update_cart_qty   (checkout.rs, consumes entries)    │
//! │                   remove_from_cart                                     │
//! │                        │                                                │
//! │                        ▼                                                │
//! │                   clear_cart ──────────────────────►                   │
//! │                                                      (back to empty)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The cart is a read model. Quantities are checked against stock when
//! staged, but checkout re-checks everything against the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use ts_rs::TS;

use crate::auth::Principal;
use crate::context::AppContext;
use crate::error::ApiResult;
use loom_core::validation::{validate_cart_size, validate_quantity, validate_uuid};
use loom_core::{
    calculate_totals, CartEntry, CoreError, Item, Money, PricedLine, Totals, ValidationError,
    MAX_CART_ITEMS, MAX_ITEM_QUANTITY,
};
use loom_db::CartLine;

/// A staged cart entry.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartEntryDto {
    pub id: String,
    pub item_id: String,
    pub quantity: i64,
    pub price_snapshot: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl From<CartEntry> for CartEntryDto {
    fn from(entry: CartEntry) -> Self {
        CartEntryDto {
            id: entry.id,
            item_id: entry.item_id,
            quantity: entry.quantity,
            price_snapshot: entry.price_snapshot,
            updated_at: entry.updated_at,
        }
    }
}

/// A cart line joined with live item data.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartLineView {
    pub entry_id: String,
    pub item_id: String,
    pub code: String,
    pub name: String,
    pub category: Option<String>,
    pub quantity: i64,
    /// Live storefront price (what checkout will charge).
    pub unit_price: i64,
    pub price_snapshot: i64,
    /// The live price differs from the price seen when the line was added.
    pub price_changed: bool,
    /// Live on-hand quantity.
    pub available: i64,
    /// Enough stock right now for this line.
    pub in_stock: bool,
    pub is_active: bool,
    pub line_total: i64,
}

impl From<&CartLine> for CartLineView {
    fn from(line: &CartLine) -> Self {
        let unit_price = line.live_price();
        CartLineView {
            entry_id: line.entry_id.clone(),
            item_id: line.item_id.clone(),
            code: line.code.clone(),
            name: line.name.clone(),
            category: line.category.clone(),
            quantity: line.quantity,
            unit_price,
            price_snapshot: line.price_snapshot,
            price_changed: unit_price != line.price_snapshot,
            available: line.available,
            in_stock: line.quantity <= line.available,
            is_active: line.is_active,
            line_total: PricedLine::new(line.quantity, Money::from_minor(unit_price))
                .line_total()
                .minor(),
        }
    }
}

/// Cart snapshot including lines and totals.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub totals: Totals,
    /// Sum of line quantities.
    pub item_count: i64,
}

/// Gets the customer's cart joined with live item data.
///
/// Totals are computed at the live storefront price under the checkout
/// charge policy, so they match what checkout would charge right now.
pub async fn get_cart(ctx: &AppContext, principal: &Principal) -> ApiResult<CartView> {
    let customer_id = principal.require_customer()?;
    debug!(customer_id = %customer_id, "get_cart command");

    let lines = ctx.db.carts().lines(customer_id).await?;

    let priced: Vec<PricedLine> = lines
        .iter()
        .map(|l| PricedLine::new(l.quantity, Money::from_minor(l.live_price())))
        .collect();
    let totals = calculate_totals(&priced, ctx.checkout_policy.as_ref())?;

    Ok(CartView {
        item_count: lines.iter().map(|l| l.quantity).sum(),
        lines: lines.iter().map(CartLineView::from).collect(),
        totals,
    })
}

/// Adds an item to the customer's cart.
///
/// ## Behavior
/// - Item already in cart: quantities are summed in the same statement
///   that checks the SUM against stock, so concurrent adds both land
/// - Price snapshot refreshed to the current storefront price
/// - Inactive items are refused (`ITEM_INACTIVE`)
pub async fn add_to_cart(
    ctx: &AppContext,
    principal: &Principal,
    item_id: &str,
    quantity: i64,
) -> ApiResult<CartEntryDto> {
    let customer_id = principal.require_customer()?;
    debug!(customer_id = %customer_id, item_id = %item_id, quantity, "add_to_cart command");

    validate_uuid("item_id", item_id)?;
    validate_quantity(quantity)?;

    let item = ctx
        .db
        .items()
        .get_by_id(item_id)
        .await?
        .ok_or_else(|| CoreError::ItemNotFound(item_id.to_string()))?;

    let carts = ctx.db.carts();
    let existing = carts.find_by_item(customer_id, item_id).await?;
    let in_cart = existing.as_ref().map_or(0, |entry| entry.quantity);

    if existing.is_none() {
        let lines = carts.count(customer_id).await?;
        validate_cart_size(usize::try_from(lines).unwrap_or(usize::MAX))
            .map_err(|_| CoreError::CartTooLarge {
                max: MAX_CART_ITEMS,
            })?;
    }

    if let Some(err) = add_refusal(&item, in_cart, quantity) {
        return Err(err.into());
    }

    let added = carts
        .add_quantity(
            customer_id,
            item_id,
            quantity,
            item.online_unit_price().minor(),
            MAX_ITEM_QUANTITY,
        )
        .await?;

    let entry = match added {
        Some(entry) => entry,
        None => {
            // Stock or the line moved since the reads above.
            let item = ctx
                .db
                .items()
                .get_by_id(item_id)
                .await?
                .ok_or_else(|| CoreError::ItemNotFound(item_id.to_string()))?;
            let in_cart = carts
                .find_by_item(customer_id, item_id)
                .await?
                .map_or(0, |entry| entry.quantity);
            let err = add_refusal(&item, in_cart, quantity).unwrap_or_else(|| {
                CoreError::InsufficientStock {
                    code: item.code.clone(),
                    available: item.quantity,
                    requested: in_cart + quantity,
                }
            });
            return Err(err.into());
        }
    };

    info!(
        customer_id = %customer_id,
        code = %item.code,
        quantity = entry.quantity,
        "Item added to cart"
    );

    Ok(entry.into())
}

/// Why adding `quantity` to a line already holding `in_cart` is refused, if it is.
fn add_refusal(item: &Item, in_cart: i64, quantity: i64) -> Option<CoreError> {
    let total = in_cart + quantity;
    if !item.is_active {
        Some(CoreError::ItemInactive {
            code: item.code.clone(),
        })
    } else if total > MAX_ITEM_QUANTITY {
        Some(CoreError::QuantityTooLarge {
            requested: total,
            max: MAX_ITEM_QUANTITY,
        })
    } else if !item.can_fulfil(total) {
        Some(CoreError::InsufficientStock {
            code: item.code.clone(),
            available: item.quantity,
            requested: total,
        })
    } else {
        None
    }
}

/// Sets a cart line's quantity.
///
/// `0` removes the line (returns `None`). Anything above the item's current
/// stock is refused and the stored quantity stays as it was.
pub async fn update_cart_quantity(
    ctx: &AppContext,
    principal: &Principal,
    entry_id: &str,
    quantity: i64,
) -> ApiResult<Option<CartEntryDto>> {
    let customer_id = principal.require_customer()?;
    debug!(customer_id = %customer_id, entry_id = %entry_id, quantity, "update_cart_quantity command");

    if quantity == 0 {
        remove_from_cart(ctx, principal, entry_id).await?;
        return Ok(None);
    }

    validate_quantity(quantity)?;

    let carts = ctx.db.carts();
    let entry = carts
        .get(customer_id, entry_id)
        .await?
        .ok_or_else(|| CoreError::CartEntryNotFound(entry_id.to_string()))?;

    let item = ctx
        .db
        .items()
        .get_by_id(&entry.item_id)
        .await?
        .ok_or_else(|| CoreError::ItemNotFound(entry.item_id.clone()))?;

    if !item.can_fulfil(quantity) {
        return Err(CoreError::InsufficientStock {
            code: item.code,
            available: item.quantity,
            requested: quantity,
        }
        .into());
    }

    if !carts.update_quantity(customer_id, entry_id, quantity).await? {
        return Err(CoreError::CartEntryNotFound(entry_id.to_string()).into());
    }

    let updated = carts
        .get(customer_id, entry_id)
        .await?
        .ok_or_else(|| CoreError::CartEntryNotFound(entry_id.to_string()))?;

    Ok(Some(updated.into()))
}

/// Removes one line from the customer's cart.
pub async fn remove_from_cart(
    ctx: &AppContext,
    principal: &Principal,
    entry_id: &str,
) -> ApiResult<()> {
    let customer_id = principal.require_customer()?;
    debug!(customer_id = %customer_id, entry_id = %entry_id, "remove_from_cart command");

    if entry_id.trim().is_empty() {
        return Err(ValidationError::required("entry_id").into());
    }

    if !ctx.db.carts().remove(customer_id, entry_id).await? {
        return Err(CoreError::CartEntryNotFound(entry_id.to_string()).into());
    }

    Ok(())
}

/// Empties the customer's cart. Returns the number of lines removed.
pub async fn clear_cart(ctx: &AppContext, principal: &Principal) -> ApiResult<u64> {
    let customer_id = principal.require_customer()?;
    debug!(customer_id = %customer_id, "clear_cart command");

    Ok(ctx.db.carts().clear(customer_id).await?)
}
