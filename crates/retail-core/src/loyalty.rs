//! Loyalty point rules.
//!
//! One point per full 100 currency units spent. Reversals never take a
//! balance below zero; the ledger records the change actually applied.

use rust_decimal::Decimal;

use crate::money::Money;

/// Spend required to earn one point.
pub const SPEND_PER_POINT: Decimal = Decimal::ONE_HUNDRED;

/// Points earned (or reversed) for an amount: `floor(amount / 100)`.
///
/// ## Example
/// ```rust
/// use retail_core::loyalty::points_for;
/// use retail_core::money::Money;
///
/// assert_eq!(points_for(Money::from_major(220)), 2);
/// assert_eq!(points_for(Money::from_major(99)), 0);
/// ```
pub fn points_for(amount: Money) -> i64 {
    amount.whole_units_of(SPEND_PER_POINT)
}

/// Signed change applied when reversing `points` from `balance`.
///
/// Clamped so the resulting balance is never negative.
pub fn reversal_delta(balance: i64, points: i64) -> i64 {
    let applied = points.clamp(0, balance.max(0));
    -applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_points_floor() {
        assert_eq!(points_for(Money::new(dec!(110.00))), 1);
        assert_eq!(points_for(Money::new(dec!(199.99))), 1);
        assert_eq!(points_for(Money::new(dec!(200.00))), 2);
        assert_eq!(points_for(Money::zero()), 0);
    }

    #[test]
    fn test_reversal_clamps_at_zero() {
        assert_eq!(reversal_delta(5, 2), -2);
        assert_eq!(reversal_delta(1, 2), -1);
        assert_eq!(reversal_delta(0, 2), 0);
        assert_eq!(reversal_delta(3, 0), 0);
    }
}
