//! # API Error Type
//!
//! Unified error type returned by every command.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Loom                                   │
//! │                                                                         │
//! │  Command (checkout, create_pos_transaction, ...)                       │
//! │  Result<T, ApiError>                                                   │
//! │         │                                                               │
//! │         ├── ValidationError ─────────────► VALIDATION_ERROR            │
//! │         ├── no / bad principal ──────────► AUTHENTICATION_ERROR        │
//! │         ├── CoreError::*NotFound ────────► NOT_FOUND                   │
//! │         ├── CoreError::InsufficientStock ► INSUFFICIENT_STOCK          │
//! │         ├── CoreError::ItemInactive ─────► ITEM_INACTIVE               │
//! │         ├── CoreError::EmptyOrder ───────► EMPTY_ORDER                 │
//! │         ├── invalid status change ───────► INVALID_STATE               │
//! │         └── DbError (anything else) ─────► TRANSACTION_FAILURE         │
//! │                                                                         │
//! │  Client sees: { "code": "INSUFFICIENT_STOCK",                          │
//! │                 "message": "Insufficient stock for COT-001: ..." }     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Persistence faults are logged in full and surfaced with a generic
//! message; the enclosing transaction has already rolled back by the time
//! the error reaches the caller.

use serde::Serialize;
use ts_rs::TS;

use loom_core::{CoreError, ValidationError};
use loom_db::DbError;

/// Error returned from commands.
///
/// ```json
/// { "code": "NOT_FOUND", "message": "Order not found: 3f2a..." }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Missing / malformed input (400)
    ValidationError,

    /// Missing or invalid principal (401)
    AuthenticationError,

    /// Entity missing or owned by someone else (404)
    NotFound,

    /// Not enough on hand at commit time (409)
    InsufficientStock,

    /// Not purchasable online (409)
    ItemInactive,

    /// Nothing to fulfil (422)
    EmptyOrder,

    /// Status change not allowed, or cart changed mid-checkout (409)
    InvalidState,

    /// Persistence failure; nothing was written (500)
    TransactionFailure,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::AuthenticationError, message)
    }

    pub fn transaction_failure() -> Self {
        ApiError::new(
            ErrorCode::TransactionFailure,
            "The operation could not be completed; no changes were made",
        )
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            other => {
                tracing::error!(error = %other, "Persistence failure");
                ApiError::transaction_failure()
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        let code = match err {
            CoreError::ItemNotFound(_)
            | CoreError::CartEntryNotFound(_)
            | CoreError::OrderNotFound(_)
            | CoreError::TransactionNotFound(_) => ErrorCode::NotFound,
            CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            CoreError::ItemInactive { .. } => ErrorCode::ItemInactive,
            CoreError::EmptyOrder => ErrorCode::EmptyOrder,
            CoreError::InvalidStatusTransition { .. } | CoreError::StaleCart => {
                ErrorCode::InvalidState
            }
            CoreError::CartTooLarge { .. }
            | CoreError::QuantityTooLarge { .. }
            | CoreError::TotalOverflow
            | CoreError::InvalidPaymentAmount { .. }
            | CoreError::Validation(_) => ErrorCode::ValidationError,
        };
        ApiError::new(code, message)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for commands.
pub type ApiResult<T> = Result<T, ApiError>;
