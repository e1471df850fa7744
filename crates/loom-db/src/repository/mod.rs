//! # Repository Module
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  loom-api command                                                       │
//! │       │                                                                 │
//! │       │  db.items().get_by_id(id)          (pool)                       │
//! │       │  ItemRepository::try_decrement(&mut tx, ...)   (transaction)    │
//! │       ▼                                                                 │
//! │  ItemRepository      ── stock ledger: guarded quantity changes          │
//! │  StockLogRepository  ── append-only audit of every change               │
//! │  CartRepository      ── per-customer staging                            │
//! │  OrderRepository     ── storefront orders + lines                       │
//! │  PosRepository       ── counter transactions + lines                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod cart;
pub mod item;
pub mod order;
pub mod pos;
pub mod stock_log;

/// Attempts made to insert a record whose generated reference collided.
pub(crate) const REFERENCE_ATTEMPTS: usize = 3;

/// Converts 1-based paging into SQL `LIMIT`/`OFFSET`.
pub(crate) fn limit_offset(page: u32, limit: u32) -> (i64, i64) {
    let limit = i64::from(limit.max(1));
    let offset = i64::from(page.max(1) - 1) * limit;
    (limit, offset)
}
