//! # Error Types
//!
//! Domain-specific error types for loom-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  loom-core errors (this file)                                          │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  loom-db errors (separate crate)                                       │
//! │  └── DbError          - Persistence failures                           │
//! │                                                                         │
//! │  loom-api errors                                                       │
//! │  └── ApiError         - What callers see (code + message)              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError ─┐                                  │
//! │                           DbError ──┴─► ApiError → storefront / POS    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant carries the context needed for a user-facing reason
//! (item code, available quantity, ids).

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Item cannot be found.
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// Item exists but is not purchasable online.
    #[error("Item {code} is not available for online purchase")]
    ItemInactive { code: String },

    /// Requested quantity exceeds on-hand stock at commit time.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout (COT-001 x 5)
    ///      │
    ///      ▼
    /// Guarded decrement: on hand = 3
    ///      │
    ///      ▼
    /// InsufficientStock { code: "COT-001", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Whole checkout rolled back, storefront shows "Only 3 COT-001 left"
    /// ```
    #[error("Insufficient stock for {code}: available {available}, requested {requested}")]
    InsufficientStock {
        code: String,
        available: i64,
        requested: i64,
    },

    /// Nothing to fulfil (empty cart, empty selection, empty basket).
    #[error("Order has no lines to fulfil")]
    EmptyOrder,

    /// Cart entry missing or owned by another customer.
    #[error("Cart entry not found: {0}")]
    CartEntryNotFound(String),

    /// Order missing or owned by another customer.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// POS transaction missing.
    #[error("POS transaction not found: {0}")]
    TransactionNotFound(String),

    /// Status change not allowed by the state machine.
    ///
    /// ## When This Occurs
    /// - Shipping an order that is still pending
    /// - Cancelling an order that is already processing
    /// - Marking a failed payment as paid
    #[error("{entity} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        entity: String,
        from: String,
        to: String,
    },

    /// The cart was modified while a checkout consuming it was in flight.
    #[error("Cart changed during checkout, please review it and retry")]
    StaleCart,

    /// Cart has exceeded maximum allowed distinct items.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Line quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Line or order totals do not fit in the money type.
    #[error("Order total is too large to record")]
    TotalOverflow,

    /// Paid amount does not settle the transaction.
    #[error("Invalid payment amount: {reason}")]
    InvalidPaymentAmount { reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Builds an `InvalidStatusTransition` from any two displayable states.
    pub fn invalid_transition(
        entity: impl Into<String>,
        from: impl std::fmt::Display,
        to: impl std::fmt::Display,
    ) -> Self {
        CoreError::InvalidStatusTransition {
            entity: entity.into(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any mutation begins; never leaves side effects.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Required`].
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
