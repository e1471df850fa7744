//! # Totals Calculator
//!
//! Turns priced lines into `subtotal / shipping / tax / total`.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lines ──► Σ quantity × unit_price ──► subtotal                         │
//! │                                           │                             │
//! │                         ChargePolicy ─────┼──► shipping                 │
//! │                                           └──► tax                      │
//! │                                                                         │
//! │  total = subtotal + shipping + tax                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Checkout and POS both persist what this module returns. Missing or
//! negative inputs contribute zero; a line or sum that does not fit in an
//! i64 is refused with [`CoreError::TotalOverflow`] rather than stored.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::TaxRate;

// =============================================================================
// Lines
// =============================================================================

/// A `(quantity, unit price)` pair feeding the calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub quantity: i64,
    pub unit_price: Money,
}

impl PricedLine {
    pub const fn new(quantity: i64, unit_price: Money) -> Self {
        PricedLine {
            quantity,
            unit_price,
        }
    }

    /// Builds a line from loosely-typed input; absent values become zero.
    pub fn from_raw(quantity: Option<i64>, unit_price: Option<i64>) -> Self {
        PricedLine {
            quantity: quantity.unwrap_or(0),
            unit_price: Money::from_minor(unit_price.unwrap_or(0)),
        }
    }

    /// `quantity × unit_price`; zero when either side is negative, `None`
    /// when the product does not fit in an i64.
    pub fn checked_line_total(&self) -> Option<Money> {
        if self.quantity < 0 || self.unit_price.is_negative() {
            return Some(Money::zero());
        }
        self.unit_price.checked_multiply_quantity(self.quantity)
    }

    /// [`checked_line_total`](Self::checked_line_total) for lines that
    /// already went through [`calculate_totals`].
    pub fn line_total(&self) -> Money {
        self.checked_line_total().unwrap_or_default()
    }
}

// =============================================================================
// Charge Policy
// =============================================================================

/// Shipping and tax policy injected into the calculator.
pub trait ChargePolicy: Send + Sync {
    fn shipping(&self, subtotal: Money) -> Money;

    fn tax(&self, subtotal: Money) -> Money;
}

/// No shipping, no tax. The storefront's current policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroCharges;

impl ChargePolicy for ZeroCharges {
    fn shipping(&self, _subtotal: Money) -> Money {
        Money::zero()
    }

    fn tax(&self, _subtotal: Money) -> Money {
        Money::zero()
    }
}

/// Flat shipping fee plus a percentage tax on the subtotal.
///
/// Shipping is waived for empty subtotals.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatCharges {
    pub shipping: Money,
    pub tax_rate: TaxRate,
}

impl FlatCharges {
    pub const fn new(shipping: Money, tax_rate: TaxRate) -> Self {
        FlatCharges { shipping, tax_rate }
    }
}

impl ChargePolicy for FlatCharges {
    fn shipping(&self, subtotal: Money) -> Money {
        if subtotal.is_zero() {
            Money::zero()
        } else {
            self.shipping
        }
    }

    fn tax(&self, subtotal: Money) -> Money {
        subtotal.calculate_tax(self.tax_rate)
    }
}

// =============================================================================
// Totals
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Totals {
    pub subtotal: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
}

/// Computes totals for `lines` under `policy`.
///
/// Policy outputs are clamped at zero. Fails with `TotalOverflow` when a
/// line or any sum does not fit, so a stored total always equals the sum
/// of its parts.
pub fn calculate_totals(lines: &[PricedLine], policy: &dyn ChargePolicy) -> CoreResult<Totals> {
    let mut subtotal = Money::zero();
    for line in lines {
        let line_total = line.checked_line_total().ok_or(CoreError::TotalOverflow)?;
        subtotal = subtotal
            .checked_add(line_total)
            .ok_or(CoreError::TotalOverflow)?;
    }

    let shipping = policy.shipping(subtotal).non_negative();
    let tax = policy.tax(subtotal).non_negative();
    let total = subtotal
        .checked_add(shipping)
        .and_then(|t| t.checked_add(tax))
        .ok_or(CoreError::TotalOverflow)?;

    Ok(Totals {
        subtotal,
        shipping,
        tax,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals_with_zero_charges() {
        let lines = [
            PricedLine::new(2, Money::from_minor(100)),
            PricedLine::new(1, Money::from_minor(50)),
        ];
        let totals = calculate_totals(&lines, &ZeroCharges).unwrap();

        assert_eq!(totals.subtotal.minor(), 250);
        assert!(totals.shipping.is_zero());
        assert!(totals.tax.is_zero());
        assert_eq!(totals.total.minor(), 250);
    }

    #[test]
    fn test_flat_charges_are_injected() {
        let lines = [PricedLine::new(3, Money::from_minor(10_000))];
        let policy = FlatCharges::new(Money::from_minor(9_000), TaxRate::from_bps(1100));
        let totals = calculate_totals(&lines, &policy).unwrap();

        assert_eq!(totals.subtotal.minor(), 30_000);
        assert_eq!(totals.shipping.minor(), 9_000);
        assert_eq!(totals.tax.minor(), 3_300);
        assert_eq!(totals.total.minor(), 42_300);
    }

    #[test]
    fn test_missing_and_invalid_inputs_count_as_zero() {
        let lines = [
            PricedLine::from_raw(None, Some(500)),
            PricedLine::from_raw(Some(2), None),
            PricedLine::new(-1, Money::from_minor(100)),
            PricedLine::new(1, Money::from_minor(75)),
        ];
        let totals = calculate_totals(&lines, &ZeroCharges).unwrap();

        assert_eq!(totals.subtotal.minor(), 75);
        assert_eq!(totals.total.minor(), 75);
    }

    #[test]
    fn test_overflow_is_refused_not_saturated() {
        let line = [PricedLine::new(2, Money::from_minor(i64::MAX))];
        assert!(matches!(
            calculate_totals(&line, &ZeroCharges),
            Err(CoreError::TotalOverflow)
        ));

        let sum = [
            PricedLine::new(1, Money::from_minor(5_000_000_000_000_000_000)),
            PricedLine::new(1, Money::from_minor(5_000_000_000_000_000_000)),
        ];
        assert!(matches!(
            calculate_totals(&sum, &ZeroCharges),
            Err(CoreError::TotalOverflow)
        ));

        let fits = [PricedLine::new(1, Money::from_minor(i64::MAX - 10))];
        let shipping = FlatCharges::new(Money::from_minor(100), TaxRate::zero());
        assert!(matches!(
            calculate_totals(&fits, &shipping),
            Err(CoreError::TotalOverflow)
        ));
    }

    #[test]
    fn test_empty_lines_waive_shipping() {
        let policy = FlatCharges::new(Money::from_minor(9_000), TaxRate::zero());
        let totals = calculate_totals(&[], &policy).unwrap();
        assert_eq!(totals, Totals::default());
    }

    struct RebatePolicy;

    impl ChargePolicy for RebatePolicy {
        fn shipping(&self, _subtotal: Money) -> Money {
            Money::from_minor(-500)
        }

        fn tax(&self, _subtotal: Money) -> Money {
            Money::from_minor(-1)
        }
    }

    #[test]
    fn test_negative_policy_output_is_clamped() {
        let lines = [PricedLine::new(1, Money::from_minor(1_000))];
        let totals = calculate_totals(&lines, &RebatePolicy).unwrap();
        assert_eq!(totals.total.minor(), 1_000);
    }
}
