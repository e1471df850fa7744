//! # Commands Module
//!
//! The logical operations exposed to the storefront, the POS counter and
//! the admin dashboard. Transport glue (HTTP, IPC) resolves the caller
//! into a [`Principal`](crate::auth::Principal) and calls these.
//!
//! ## Command Organization
//! ```text
//! commands/
//! ├── mod.rs       ◄─── You are here (shared stock outcome mapping)
//! ├── cart.rs      ◄─── Cart staging
//! ├── checkout.rs  ◄─── Order fulfilment engine
//! ├── order.rs     ◄─── Order reads and lifecycle
//! ├── pos.rs       ◄─── Counter sales
//! └── stock.rs     ◄─── Receipts, adjustments, audit
//! ```
//!
//! ## Shape of a Mutating Command
//! ```text
//! principal.require_*()          ── AUTHENTICATION_ERROR, nothing touched
//! validate input                 ── VALIDATION_ERROR, nothing touched
//! resolve records (pool reads)   ── NOT_FOUND / EMPTY_ORDER, nothing touched
//! let mut tx = db.begin()
//!   first statement is a write   ── takes the SQLite write lock up front
//!   ... guarded stock changes, records, stock log entries ...
//!   any `?`                      ── tx dropped, everything rolled back
//! Database::commit(tx)
//! ```

pub mod cart;
pub mod checkout;
pub mod order;
pub mod pos;
pub mod stock;

use loom_core::CoreError;
use loom_db::{StockChange, StockOutcome};

/// Unwraps an applied stock change or names why it was refused.
///
/// `requested` is the number of units the caller tried to take.
pub(crate) fn applied(
    outcome: StockOutcome,
    item_id: &str,
    requested: i64,
) -> Result<StockChange, CoreError> {
    match outcome {
        StockOutcome::Applied(change) => Ok(change),
        StockOutcome::Insufficient { code, available } => Err(CoreError::InsufficientStock {
            code,
            available,
            requested,
        }),
        StockOutcome::Inactive { code } => Err(CoreError::ItemInactive { code }),
        StockOutcome::NotFound => Err(CoreError::ItemNotFound(item_id.to_string())),
    }
}

/// Resolves optional paging input against the configured default.
pub(crate) fn paging(page: Option<u32>, limit: Option<u32>, default_limit: u32) -> (u32, u32) {
    (page.unwrap_or(1), limit.unwrap_or(default_limit))
}
