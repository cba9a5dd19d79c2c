//! Fixed-point currency conversion.
//!
//! Amounts cross the API as [`Decimal`] and are stored as `i64` minor units
//! (two decimal places), so ledger arithmetic in SQL stays exact.

use crate::errors::{Error, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Number of decimal places carried by every stored amount.
pub const SCALE: u32 = 2;

/// Converts a decimal amount into minor units.
///
/// Rejects amounts with more than two decimal places and values outside the
/// `i64` range. Sign is preserved; callers decide whether negatives are legal.
pub fn to_minor_units(amount: Decimal) -> Result<i64> {
    let normalized = amount.normalize();
    if normalized.scale() > SCALE {
        return Err(Error::InvalidAmount { amount });
    }

    (normalized * Decimal::from(100))
        .to_i64()
        .ok_or(Error::InvalidAmount { amount })
}

/// Converts a strictly positive amount into minor units.
pub fn positive_minor_units(amount: Decimal) -> Result<i64> {
    let minor = to_minor_units(amount)?;
    if minor <= 0 {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(minor)
}

/// Converts minor units back into a decimal with two decimal places.
#[must_use]
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, SCALE)
}
