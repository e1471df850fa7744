//! # loom-db: Database Layer for Loom
//!
//! SQLite persistence for the stock ledger and everything that consumes it.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Loom Data Flow                                 │
//! │                                                                         │
//! │  loom-api command (checkout, create_pos_transaction, ...)              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     loom-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────────┐   ┌───────────┐ │   │
//! │  │   │   Database    │    │    Repositories    │   │ Migrations│ │   │
//! │  │   │   (pool.rs)   │    │                    │   │ (embedded)│ │   │
//! │  │   │               │    │ ItemRepository     │   │           │ │   │
//! │  │   │ SqlitePool    │◄───│ StockLogRepository │   │ 001_*.sql │ │   │
//! │  │   │ begin/commit  │    │ Cart / Order / Pos │   │           │ │   │
//! │  │   └───────────────┘    └────────────────────┘   └───────────┘ │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL)                                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Two Kinds of Repository Calls
//!
//! - `&self` methods run on the pool: reads and single-statement writes.
//! - Associated functions taking `&mut SqliteConnection` run inside a
//!   caller-owned transaction: stock changes, log appends, order/POS inserts.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use loom_db::{Database, DbConfig, ItemRepository};
//! use loom_core::SalesChannel;
//!
//! let db = Database::new(DbConfig::new("loom.db")).await?;
//! let mut tx = db.begin().await?;
//! let outcome = ItemRepository::try_decrement(&mut tx, &item_id, 3, SalesChannel::Online).await?;
//! Database::commit(tx).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::cart::{CartLine, CartRepository};
pub use repository::item::{ItemRepository, StockChange, StockOutcome};
pub use repository::order::OrderRepository;
pub use repository::pos::PosRepository;
pub use repository::stock_log::{ChainReport, StockLogRepository};
