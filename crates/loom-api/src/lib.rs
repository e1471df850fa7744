//! # loom-api: Logical Operations for Loom
//!
//! The commands behind the storefront, the POS counter and the admin
//! dashboard, over one shared stock ledger.
//!
//! ## Module Organization
//! ```text
//! loom-api/src/
//! ├── lib.rs        ◄─── You are here (exports, tracing bootstrap)
//! ├── main.rs       ◄─── `loom` operator CLI
//! ├── auth.rs       ◄─── Principal, PrincipalResolver, JWT
//! ├── config.rs     ◄─── AppConfig from environment
//! ├── context.rs    ◄─── AppContext (database + charge policies)
//! ├── error.rs      ◄─── ApiError { code, message }
//! └── commands/
//!     ├── cart.rs       add_to_cart, update_cart_quantity, remove_from_cart,
//!     │                 clear_cart, get_cart
//!     ├── checkout.rs   checkout (cart | selected | buy now)
//!     ├── order.rs      get_order, list_orders, update_order_status,
//!     │                 cancel_order, update_payment_status
//!     ├── pos.rs        create_pos_transaction, get_pos_transaction,
//!     │                 list_pos_transactions
//!     └── stock.rs      receive_stock, adjust_stock, stock_history,
//!                       low_stock, verify_log_chain
//! ```
//!
//! ## Calling a Command
//! ```rust,ignore
//! let principal = resolver.resolve(authorization_header)?;
//! let receipt = commands::checkout::checkout(&ctx, &principal, request).await?;
//! ```

pub mod auth;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;

pub use auth::{JwtPrincipalResolver, Principal, PrincipalResolver, StaffRole};
pub use config::{AppConfig, ConfigError};
pub use context::AppContext;
pub use error::{ApiError, ApiResult, ErrorCode};

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=loom=trace` - Trace level for loom crates only
/// - Default: `info,loom=debug,sqlx=warn`
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,loom=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::TRACE)
        .init();
}
