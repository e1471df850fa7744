//! # Domain Types
//!
//! Records and enums shared by the ledger, storefront checkout and POS.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Item       │   │      Order      │   │ PosTransaction  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  order_number   │   │  txn number     │       │
//! │  │  code (unique)  │   │  status         │   │  cashier_id     │       │
//! │  │  quantity ≥ 0   │   │  payment_status │   │  paid / change  │       │
//! │  └────────┬────────┘   └────────┬────────┘   └────────┬────────┘       │
//! │           │                     │ 1..n                │ 1..n           │
//! │           │            ┌────────▼────────┐   ┌────────▼────────┐       │
//! │           │            │    OrderItem    │   │ PosTransaction  │       │
//! │           │            │  (immutable)    │   │      Item       │       │
//! │           │            └─────────────────┘   └─────────────────┘       │
//! │           │                                                             │
//! │  ┌────────▼────────┐   ┌─────────────────┐                             │
//! │  │  StockLogEntry  │   │    CartEntry    │                             │
//! │  │  (append-only)  │   │ (customer,item) │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has a UUID `id` used for relations, and the externally
//! quoted ones also carry a business key (`code`, `order_number`,
//! `transaction_number`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (825 = 8.25%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// Item
// =============================================================================

/// A stocked textile item (bolt, roll, piece goods).
///
/// `quantity` is the authoritative on-hand counter. It is only ever changed
/// by the stock ledger in loom-db.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Item {
    pub id: String,
    /// Business code, unique (e.g. `COT-PRM-001`).
    pub code: String,
    pub name: String,
    pub category: Option<String>,
    /// On-hand quantity, never negative.
    pub quantity: i64,
    /// Low-stock threshold shown on the dashboard.
    pub min_stock: i64,
    pub max_stock: Option<i64>,
    /// Counter price in minor units.
    pub unit_price: i64,
    /// Storefront price; falls back to `unit_price` when unset.
    pub online_price: Option<i64>,
    /// Purchasable online.
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Price charged on the storefront.
    #[inline]
    pub fn online_unit_price(&self) -> Money {
        Money::from_minor(self.online_price.unwrap_or(self.unit_price))
    }

    /// Price charged at the counter.
    #[inline]
    pub fn counter_unit_price(&self) -> Money {
        Money::from_minor(self.unit_price)
    }

    /// Checks whether `quantity` can be taken from current stock.
    pub fn can_fulfil(&self, quantity: i64) -> bool {
        quantity > 0 && self.quantity >= quantity
    }

    /// At or below the configured minimum.
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_stock
    }
}

// =============================================================================
// Sales Channel
// =============================================================================

/// Which entry point is taking stock.
///
/// The online channel refuses inactive items; the counter sells whatever is
/// physically on the shelf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SalesChannel {
    Online,
    Counter,
}

impl SalesChannel {
    #[inline]
    pub const fn requires_active(&self) -> bool {
        matches!(self, SalesChannel::Online)
    }
}

// =============================================================================
// Cart Entry
// =============================================================================

/// A staged (customer, item) line in a storefront cart.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CartEntry {
    pub id: String,
    pub customer_id: String,
    pub item_id: String,
    pub quantity: i64,
    /// Online price captured when the line was last added to.
    pub price_snapshot: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Order Status
// =============================================================================

/// Fulfilment status of a storefront order.
///
/// ```text
/// pending ──► processing ──► shipped ──► delivered
///    │
///    └──────► cancelled (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the state machine allows `self → next`.
    pub const fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Processing)
                | (OrderStatus::Processing, OrderStatus::Shipped)
                | (OrderStatus::Shipped, OrderStatus::Delivered)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
        )
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            _ => Err(ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: ["pending", "processing", "shipped", "delivered", "cancelled"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            }),
        }
    }
}

// =============================================================================
// Payment Status
// =============================================================================

/// Settlement status of a storefront order: `pending → paid | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }

    pub const fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Paid)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash at the counter.
    Cash,
    /// Card on an external terminal or payment page.
    Card,
    BankTransfer,
    /// Storefront only: paid to the courier.
    CashOnDelivery,
}

impl PaymentMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
        }
    }

    /// Methods a cashier can take.
    pub const fn is_counter_method(&self) -> bool {
        matches!(
            self,
            PaymentMethod::Cash | PaymentMethod::Card | PaymentMethod::BankTransfer
        )
    }

    /// Methods offered at storefront checkout.
    pub const fn is_online_method(&self) -> bool {
        matches!(
            self,
            PaymentMethod::Card | PaymentMethod::BankTransfer | PaymentMethod::CashOnDelivery
        )
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" | "credit" | "debit" => Ok(PaymentMethod::Card),
            "bank_transfer" | "transfer" => Ok(PaymentMethod::BankTransfer),
            "cash_on_delivery" | "cod" => Ok(PaymentMethod::CashOnDelivery),
            _ => Err(ValidationError::NotAllowed {
                field: "payment_method".to_string(),
                allowed: ["cash", "card", "bank_transfer", "cash_on_delivery"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            }),
        }
    }
}

// =============================================================================
// Shipping Details
// =============================================================================

/// Delivery details captured at checkout.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShippingDetails {
    pub recipient_name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub postal_code: Option<String>,
    pub special_instructions: Option<String>,
}

// =============================================================================
// Order
// =============================================================================

/// A committed storefront order.
///
/// Immutable except for `status` / `payment_status` transitions.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub order_number: String,
    pub customer_id: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub subtotal: i64,
    pub shipping_cost: i64,
    pub tax: i64,
    /// `subtotal + shipping_cost + tax`
    pub total: i64,
    pub recipient_name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub postal_code: Option<String>,
    pub special_instructions: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_minor(self.total)
    }

    /// Checks `total = subtotal + shipping + tax`.
    pub fn totals_consistent(&self) -> bool {
        self.subtotal
            .checked_add(self.shipping_cost)
            .and_then(|v| v.checked_add(self.tax))
            == Some(self.total)
    }
}

/// A line of a committed order. Financial record, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub item_id: String,
    /// Item code at time of sale (frozen).
    pub code_snapshot: String,
    /// Item name at time of sale (frozen).
    pub name_snapshot: String,
    pub quantity: i64,
    pub unit_price: i64,
    /// `quantity × unit_price`
    pub line_total: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// POS Transaction
// =============================================================================

/// POS transactions are born terminal; there is no draft state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PosStatus {
    #[default]
    Completed,
}

/// A completed counter sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PosTransaction {
    pub id: String,
    pub transaction_number: String,
    pub customer_id: Option<String>,
    pub cashier_id: String,
    pub payment_method: PaymentMethod,
    pub status: PosStatus,
    pub subtotal: i64,
    pub tax: i64,
    pub total: i64,
    pub paid_amount: i64,
    /// `paid_amount - total` for cash, 0 otherwise.
    pub change_amount: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A line of a counter sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PosTransactionItem {
    pub id: String,
    pub transaction_id: String,
    pub item_id: String,
    pub code_snapshot: String,
    pub name_snapshot: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub line_total: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Stock Log
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockLogType {
    /// Receipt of goods, initial stock, restock on cancellation.
    In,
    /// Sale (checkout or counter).
    Out,
    /// Manual correction after a stock count.
    Adjustment,
}

impl StockLogType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            StockLogType::In => "in",
            StockLogType::Out => "out",
            StockLogType::Adjustment => "adjustment",
        }
    }
}

/// One audited quantity change. Append-only.
///
/// `quantity_delta` is signed: `resulting_quantity = previous_quantity + quantity_delta`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockLogEntry {
    /// Monotonic sequence; orders the chain per item.
    pub id: i64,
    pub item_id: String,
    pub log_type: StockLogType,
    pub quantity_delta: i64,
    pub previous_quantity: i64,
    pub resulting_quantity: i64,
    pub note: String,
    /// Order or transaction number this change belongs to.
    pub reference: Option<String>,
    /// Staff or customer id that caused the change.
    pub actor: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl StockLogEntry {
    pub fn is_consistent(&self) -> bool {
        self.resulting_quantity >= 0
            && self.previous_quantity.checked_add(self.quantity_delta)
                == Some(self.resulting_quantity)
    }
}

/// A stock change before it is appended to the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStockLogEntry {
    pub item_id: String,
    pub log_type: StockLogType,
    pub quantity_delta: i64,
    pub previous_quantity: i64,
    pub resulting_quantity: i64,
    pub note: String,
    pub reference: Option<String>,
    pub actor: String,
}

// =============================================================================
// Paging
// =============================================================================

/// One page of a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_state_machine() {
        use OrderStatus::*;

        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(Pending.can_transition_to(Cancelled));

        assert!(!Pending.can_transition_to(Shipped));
        assert!(!Processing.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Delivered.can_transition_to(Processing));
        assert!(Cancelled.is_terminal());
    }

    #[test]
    fn test_payment_status_state_machine() {
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Paid));
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Failed));
        assert!(!PaymentStatus::Failed.can_transition_to(PaymentStatus::Paid));
        assert!(!PaymentStatus::Paid.can_transition_to(PaymentStatus::Pending));
    }

    #[test]
    fn test_payment_method_parsing_and_channels() {
        assert_eq!("cash".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert_eq!(
            "Bank_Transfer".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::BankTransfer
        );
        assert!("voucher".parse::<PaymentMethod>().is_err());

        assert!(PaymentMethod::Cash.is_counter_method());
        assert!(!PaymentMethod::CashOnDelivery.is_counter_method());
        assert!(!PaymentMethod::Cash.is_online_method());
    }

    #[test]
    fn test_stock_log_entry_consistency() {
        let entry = StockLogEntry {
            id: 1,
            item_id: "item".to_string(),
            log_type: StockLogType::Out,
            quantity_delta: -3,
            previous_quantity: 5,
            resulting_quantity: 2,
            note: "checkout".to_string(),
            reference: Some("ORD-1".to_string()),
            actor: "customer-1".to_string(),
            created_at: Utc::now(),
        };
        assert!(entry.is_consistent());

        let broken = StockLogEntry {
            resulting_quantity: 3,
            ..entry
        };
        assert!(!broken.is_consistent());
    }

    #[test]
    fn test_online_price_falls_back_to_unit_price() {
        let now = Utc::now();
        let mut item = Item {
            id: "i1".to_string(),
            code: "SLK-001".to_string(),
            name: "Silk Charmeuse".to_string(),
            category: Some("silk".to_string()),
            quantity: 4,
            min_stock: 5,
            max_stock: None,
            unit_price: 90_000,
            online_price: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(item.online_unit_price().minor(), 90_000);
        item.online_price = Some(85_000);
        assert_eq!(item.online_unit_price().minor(), 85_000);
        assert!(item.is_low_stock());
        assert!(item.can_fulfil(4));
        assert!(!item.can_fulfil(5));
    }
}
