//! Money conversion between stored minor units and domain decimals.
//!
//! The store keeps every amount as an `i64` count of cents. The domain works
//! in [`Decimal`] with two decimal places, so sums are exact and no float
//! rounding drift can accumulate across buckets.

use crate::errors::{Error, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Number of decimal places of the currency
pub const CURRENCY_SCALE: u32 = 2;

/// Converts stored minor units into a decimal amount.
#[must_use]
pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, CURRENCY_SCALE)
}

/// Converts a decimal amount into minor units.
///
/// Amounts with more than two decimal places are rejected rather than
/// rounded, so a stored value always equals the value that was entered.
pub fn to_cents(amount: Decimal) -> Result<i64> {
    if amount.normalize().scale() > CURRENCY_SCALE {
        return Err(Error::InvalidAmount { amount });
    }
    (amount * Decimal::ONE_HUNDRED)
        .trunc()
        .to_i64()
        .ok_or(Error::InvalidAmount { amount })
}

/// Like [`to_cents`] but also rejects negative amounts.
pub fn non_negative_cents(amount: Decimal) -> Result<i64> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(Error::InvalidAmount { amount });
    }
    to_cents(amount)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_from_cents() {
        assert_eq!(from_cents(12_002), dec!(120.02));
        assert_eq!(from_cents(0), Decimal::ZERO);
        assert_eq!(from_cents(-5), dec!(-0.05));
    }

    #[test]
    fn test_to_cents() {
        assert_eq!(to_cents(dec!(120.02)).unwrap(), 12_002);
        assert_eq!(to_cents(dec!(7)).unwrap(), 700);
        assert_eq!(to_cents(dec!(0.50)).unwrap(), 50);
        assert_eq!(to_cents(dec!(1.2300)).unwrap(), 123);
    }

    #[test]
    fn test_to_cents_rejects_sub_cent_precision() {
        assert!(matches!(
            to_cents(dec!(0.005)),
            Err(Error::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_non_negative_cents() {
        assert_eq!(non_negative_cents(Decimal::ZERO).unwrap(), 0);
        assert!(matches!(
            non_negative_cents(dec!(-1.00)),
            Err(Error::InvalidAmount { .. })
        ));
    }
}
