//! Money calculation utilities using rust_decimal for precision
//!
//! All monetary arithmetic is done on `Decimal` internally and
//! converted to `f64` only for storage/serialization. Comparisons
//! against zero go through [`MONEY_TOLERANCE`].

use crate::orders::error::{OrderError, OrderResult};
use rust_decimal::prelude::*;
use shared::order::{LineInput, OrderLine};

/// Rounding strategy for monetary values (2 decimal places, half-up)
const DECIMAL_PLACES: u32 = 2;

/// Tolerance for monetary comparisons (0.01)
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Maximum allowed unit price (€1,000,000)
const MAX_PRICE: f64 = 1_000_000.0;
/// Maximum allowed quantity per line
const MAX_QUANTITY: i32 = 9999;
/// Maximum allowed payment amount (€1,000,000)
const MAX_AMOUNT: f64 = 1_000_000.0;

/// Validate that a f64 value is finite (not NaN, not Infinity)
#[inline]
fn require_finite(value: f64, field_name: &str) -> OrderResult<()> {
    if !value.is_finite() {
        return Err(OrderError::InvalidOperation(format!(
            "{} must be a finite number, got {}",
            field_name, value
        )));
    }
    Ok(())
}

/// Validate a product selection before it becomes a draft line
pub fn validate_line_input(input: &LineInput) -> OrderResult<()> {
    require_finite(input.price, "price")?;
    if input.price < 0.0 {
        return Err(OrderError::InvalidOperation(format!(
            "price must be non-negative, got {}",
            input.price
        )));
    }
    if input.price > MAX_PRICE {
        return Err(OrderError::InvalidOperation(format!(
            "price exceeds maximum allowed ({}), got {}",
            MAX_PRICE, input.price
        )));
    }
    Ok(())
}

/// Validate a payment amount is a usable number
///
/// Non-positive amounts are not an error here: callers treat them as
/// validation no-ops.
pub fn validate_amount(amount: f64) -> OrderResult<()> {
    require_finite(amount, "amount")?;
    if amount > MAX_AMOUNT {
        return Err(OrderError::InvalidOperation(format!(
            "amount exceeds maximum allowed ({}), got {}",
            MAX_AMOUNT, amount
        )));
    }
    Ok(())
}

/// Validate a discount percentage
pub fn validate_discount_percent(percent: f64) -> OrderResult<()> {
    require_finite(percent, "discount_percent")?;
    if !(0.0..=100.0).contains(&percent) {
        return Err(OrderError::InvalidOperation(format!(
            "discount_percent must be between 0 and 100, got {}",
            percent
        )));
    }
    Ok(())
}

/// Validate a quantity delta applied to a draft line
pub fn validate_quantity(quantity: i32) -> OrderResult<()> {
    if quantity.abs() > MAX_QUANTITY {
        return Err(OrderError::InvalidOperation(format!(
            "quantity exceeds maximum allowed ({}), got {}",
            MAX_QUANTITY, quantity
        )));
    }
    Ok(())
}

/// Convert f64 to Decimal for calculation
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Convert Decimal back to f64 for storage, rounded to 2 decimal places
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}

/// price × quantity of one line
pub fn line_total(line: &OrderLine) -> Decimal {
    to_decimal(line.price) * Decimal::from(line.quantity)
}

/// Net total of a set of lines (adjustments included with their sign)
pub fn lines_total(lines: &[OrderLine]) -> Decimal {
    lines.iter().map(line_total).sum()
}

/// Discount amount for a close
///
/// An invitation means the full total, regardless of percentage.
pub fn discount_amount(total: Decimal, percent: f64, is_invitation: bool) -> Decimal {
    if is_invitation {
        return total;
    }
    (total * to_decimal(percent) / Decimal::ONE_HUNDRED).round_dp(DECIMAL_PLACES)
}

/// Whether a net amount is zero within tolerance
pub fn is_settled(net: Decimal) -> bool {
    net <= MONEY_TOLERANCE
}
