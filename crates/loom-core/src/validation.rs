//! # Validation Module
//!
//! Input validation run before any mutation begins.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Command (loom-api)                                           │
//! │  └── THIS MODULE: shapes, ranges, required fields                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Stock ledger (loom-db)                                       │
//! │  └── Guarded decrement: quantity >= requested, atomically              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (quantity >= 0), CHECK (resulting = previous + delta)       │
//! │  ├── UNIQUE order / transaction numbers                                │
//! │  └── Foreign keys, append-only triggers                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::ShippingDetails;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY, MAX_PAGE_SIZE, MAX_STOCK_MOVEMENT, MAX_UNIT_PRICE};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an item code.
///
/// ## Rules
/// - Must not be empty, at most 50 characters
/// - Letters, digits, hyphens and underscores only
///
/// ## Example
/// ```rust
/// use loom_core::validation::validate_item_code;
///
/// assert!(validate_item_code("COT-PRM-001").is_ok());
/// assert!(validate_item_code("").is_err());
/// assert!(validate_item_code("has space").is_err());
/// ```
pub fn validate_item_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::required("code"));
    }

    if code.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: 50,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates an item name (1..=200 characters).
pub fn validate_item_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required("name"));
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

fn require_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::required(field));
    }
    if value.len() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

/// Validates checkout shipping details.
///
/// Recipient, phone, address and city are required; postal code and
/// instructions are optional but length-bounded.
pub fn validate_shipping(details: &ShippingDetails) -> ValidationResult<()> {
    require_text("recipient_name", &details.recipient_name, 120)?;
    require_text("phone", &details.phone, 30)?;
    require_text("address", &details.address, 500)?;
    require_text("city", &details.city, 120)?;

    if let Some(postal_code) = &details.postal_code {
        if postal_code.trim().len() > 20 {
            return Err(ValidationError::TooLong {
                field: "postal_code".to_string(),
                max: 20,
            });
        }
    }

    if let Some(notes) = &details.special_instructions {
        if notes.len() > 1000 {
            return Err(ValidationError::TooLong {
                field: "special_instructions".to_string(),
                max: 1000,
            });
        }
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
///
/// ```text
/// add_to_cart(qty) ──► validate_quantity ──┬── qty <= 0  → "quantity must be positive"
///                                          ├── qty > 999 → out of range
///                                          └── OK → stock check
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in minor units. Zero is allowed (giveaways).
pub fn validate_price(amount: i64) -> ValidationResult<()> {
    if !(0..=MAX_UNIT_PRICE).contains(&amount) {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: MAX_UNIT_PRICE,
        });
    }

    Ok(())
}

/// Validates the size of a stock receipt or adjustment (non-zero, at most
/// `MAX_STOCK_MOVEMENT` either way).
pub fn validate_stock_movement(field: &str, delta: i64) -> ValidationResult<()> {
    if delta == 0 || delta.unsigned_abs() > MAX_STOCK_MOVEMENT.unsigned_abs() {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: -MAX_STOCK_MOVEMENT,
            max: MAX_STOCK_MOVEMENT,
        });
    }

    Ok(())
}

/// Validates a tendered payment amount (> 0).
pub fn validate_payment_amount(amount: i64) -> ValidationResult<()> {
    if amount <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "paid_amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a tax rate in basis points (0..=10000).
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

/// Validates paging parameters (page ≥ 1, 1 ≤ limit ≤ MAX_PAGE_SIZE).
pub fn validate_page(page: u32, limit: u32) -> ValidationResult<()> {
    if page == 0 {
        return Err(ValidationError::MustBePositive {
            field: "page".to_string(),
        });
    }

    if limit == 0 || limit > MAX_PAGE_SIZE {
        return Err(ValidationError::OutOfRange {
            field: "limit".to_string(),
            min: 1,
            max: MAX_PAGE_SIZE as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates that one more distinct item fits in the cart.
pub fn validate_cart_size(current_items: usize) -> ValidationResult<()> {
    if current_items >= MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string.
///
/// ## Example
/// ```rust
/// use loom_core::validation::validate_uuid;
///
/// assert!(validate_uuid("item_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("item_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required(field));
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shipping() -> ShippingDetails {
        ShippingDetails {
            recipient_name: "Sari Wulandari".to_string(),
            phone: "+62 812 0000 1111".to_string(),
            address: "Jl. Tenun No. 7".to_string(),
            city: "Pekalongan".to_string(),
            postal_code: Some("51111".to_string()),
            special_instructions: None,
        }
    }

    #[test]
    fn test_validate_item_code() {
        assert!(validate_item_code("COT-PRM-001").is_ok());
        assert!(validate_item_code("batik_01").is_ok());

        assert!(validate_item_code("").is_err());
        assert!(validate_item_code("   ").is_err());
        assert!(validate_item_code("has space").is_err());
        assert!(validate_item_code(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_shipping_requires_core_fields() {
        assert!(validate_shipping(&shipping()).is_ok());

        let mut missing_city = shipping();
        missing_city.city = "  ".to_string();
        let err = validate_shipping(&missing_city).unwrap_err();
        assert_eq!(err.to_string(), "city is required");

        let mut no_postal = shipping();
        no_postal.postal_code = None;
        assert!(validate_shipping(&no_postal).is_ok());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_page() {
        assert!(validate_page(1, 20).is_ok());
        assert!(validate_page(0, 20).is_err());
        assert!(validate_page(1, 0).is_err());
        assert!(validate_page(1, 101).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("id", "").is_err());
        assert!(validate_uuid("id", "123").is_err());
    }

    #[test]
    fn test_validate_amounts() {
        assert!(validate_price(0).is_ok());
        assert!(validate_price(MAX_UNIT_PRICE).is_ok());
        assert!(validate_price(-1).is_err());
        assert!(validate_price(MAX_UNIT_PRICE + 1).is_err());
        assert!(validate_price(i64::MAX).is_err());
        assert!(validate_payment_amount(20_000).is_ok());
        assert!(validate_payment_amount(0).is_err());
        assert!(validate_tax_rate_bps(10000).is_ok());
        assert!(validate_tax_rate_bps(10001).is_err());
    }

    #[test]
    fn test_validate_stock_movement() {
        assert!(validate_stock_movement("quantity", 1).is_ok());
        assert!(validate_stock_movement("delta", -MAX_STOCK_MOVEMENT).is_ok());

        assert!(validate_stock_movement("delta", 0).is_err());
        assert!(validate_stock_movement("quantity", MAX_STOCK_MOVEMENT + 1).is_err());
        assert!(validate_stock_movement("quantity", i64::MAX).is_err());
        assert!(validate_stock_movement("delta", i64::MIN).is_err());
    }

    #[test]
    fn test_largest_accepted_sale_fits_in_i64() {
        let largest =
            (MAX_UNIT_PRICE as i128) * (MAX_ITEM_QUANTITY as i128) * (MAX_CART_ITEMS as i128);
        assert!(largest < i64::MAX as i128);
    }
}
