//! # loom-core: Pure Business Logic for Loom
//!
//! Domain records, money arithmetic, totals calculation, status state
//! machines and validation for the textile stock ledger. Zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Loom Architecture                              │
//! │                                                                         │
//! │  ┌───────────────────────────┐        ┌───────────────────────────┐    │
//! │  │ Storefront (cart/checkout)│        │  POS counter (cashier)    │    │
//! │  └─────────────┬─────────────┘        └─────────────┬─────────────┘    │
//! │                │                                    │                  │
//! │  ┌─────────────▼────────────────────────────────────▼─────────────┐   │
//! │  │                    loom-api (commands)                         │   │
//! │  │   add_to_cart, checkout, create_pos_transaction, adjust_stock  │   │
//! │  └─────────────────────────────┬──────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ loom-core (THIS CRATE) ★                        │   │
//! │  │   types • money • pricing • reference • validation • error      │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │         loom-db (stock ledger, stock log, carts, orders)        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (Item, Order, PosTransaction, StockLogEntry, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`pricing`] - Totals calculator with pluggable shipping/tax policy
//! - [`reference`] - Order and transaction number formatting
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use loom_core::money::Money;
//! use loom_core::pricing::{calculate_totals, PricedLine, ZeroCharges};
//!
//! let lines = [
//!     PricedLine::new(2, Money::from_minor(100)),
//!     PricedLine::new(1, Money::from_minor(50)),
//! ];
//! let totals = calculate_totals(&lines, &ZeroCharges).unwrap();
//! assert_eq!(totals.subtotal.minor(), 250);
//! assert_eq!(totals.total.minor(), 250);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod pricing;
pub mod reference;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use pricing::{calculate_totals, ChargePolicy, FlatCharges, PricedLine, Totals, ZeroCharges};
pub use reference::{generate_reference, ReferenceKind};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct items allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single item on one line.
///
/// Guards against typing 10000 instead of 10 at the counter.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Upper bound for `limit` on paged listings.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Highest unit price accepted, in minor units.
///
/// `MAX_ITEM_QUANTITY × MAX_UNIT_PRICE × MAX_CART_ITEMS` stays well inside
/// an i64, so no accepted sale can overflow its totals.
pub const MAX_UNIT_PRICE: i64 = 10_000_000_000_000;

/// Largest single stock receipt or adjustment.
pub const MAX_STOCK_MOVEMENT: i64 = 1_000_000;
