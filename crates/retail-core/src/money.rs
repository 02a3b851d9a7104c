//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Fixed-Point Decimal?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In binary floating point:                                              │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Tax on a line of 3 × 3.35 at 7.5%:                                    │
//! │    f64     → 0.7537499999999999                                        │
//! │    Decimal → 0.75375 (exact)                                           │
//! │                                                                         │
//! │  OUR SOLUTION: rust_decimal                                            │
//! │    Every intermediate value is exact. Rounding to cents happens        │
//! │    ONCE, when a value is persisted or returned (`rounded()`).          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use retail_core::money::Money;
//! use rust_decimal::Decimal;
//!
//! let price = Money::new(Decimal::new(1099, 2)); // 10.99
//!
//! let doubled = price * 2;                      // 21.98
//! let total = price + Money::from_major(5);     // 15.99
//! assert_eq!(total.to_string(), "15.99");
//! assert_eq!(doubled.to_string(), "21.98");
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::types::TaxRate;

/// Number of decimal places kept at output boundaries.
pub const CURRENCY_SCALE: u32 = 2;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary amount in the store's currency.
///
/// ## Design Decisions
/// - **Decimal (signed)**: Allows negative values for refunds and deltas
/// - **Single field tuple struct**: Zero-cost abstraction over `Decimal`
/// - **Serialized as a string**: `"220.00"`, never a JSON float
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  LineRequest.unit_price ──► PricedLine.line_total ──► SaleItem         │
/// │                                                                         │
/// │  PricedOrder.sub_total ─┬─► Sale.grand_total ──► payment status        │
/// │                         └─► loyalty points (floor(total / 100))        │
/// │                                                                         │
/// │  ReturnItemRequest.refund_per_item ──► Return.refund_amount            │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(#[ts(type = "string")] Decimal);

impl Money {
    /// Wraps a decimal amount.
    #[inline]
    pub const fn new(amount: Decimal) -> Self {
        Money(amount)
    }

    /// Creates a whole-unit amount.
    ///
    /// ## Example
    /// ```rust
    /// use retail_core::money::Money;
    ///
    /// assert_eq!(Money::from_major(220).to_string(), "220.00");
    /// ```
    #[inline]
    pub fn from_major(units: i64) -> Self {
        Money(Decimal::from(units))
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    /// Returns the underlying decimal.
    #[inline]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Checks if the value is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use retail_core::money::Money;
    /// use rust_decimal::Decimal;
    ///
    /// let unit_price = Money::new(Decimal::new(299, 2));
    /// assert_eq!(unit_price.multiply_quantity(3).to_string(), "8.97");
    /// ```
    #[inline]
    pub fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * Decimal::from(qty))
    }

    /// Splits an amount evenly across `qty` units, unrounded.
    ///
    /// Returns zero when `qty` is zero.
    pub fn divide_quantity(&self, qty: i64) -> Self {
        if qty == 0 {
            return Money::zero();
        }
        Money(self.0 / Decimal::from(qty))
    }

    /// Applies a percentage tax rate to this amount, unrounded.
    ///
    /// ## Example
    /// ```rust
    /// use retail_core::money::Money;
    /// use retail_core::types::TaxRate;
    /// use rust_decimal::Decimal;
    ///
    /// let taxable = Money::from_major(200);
    /// let tax = taxable.calculate_tax(TaxRate::from_percent(Decimal::from(10)));
    /// assert_eq!(tax, Money::from_major(20));
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        Money(self.0 * rate.percent() / Decimal::ONE_HUNDRED)
    }

    /// Rounds to cents, half away from zero.
    ///
    /// Call this only where a value leaves the calculator: persisting a row
    /// or building a response. Intermediate sums stay exact.
    pub fn rounded(&self) -> Money {
        let mut amount = self
            .0
            .round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero);
        amount.rescale(CURRENCY_SCALE);
        Money(amount)
    }

    /// Number of whole `unit`s contained in this amount, rounded down.
    ///
    /// Non-positive amounts yield zero.
    ///
    /// ## Example
    /// ```rust
    /// use retail_core::money::Money;
    /// use rust_decimal::Decimal;
    ///
    /// let total = Money::new(Decimal::new(21999, 2)); // 219.99
    /// assert_eq!(total.whole_units_of(Decimal::ONE_HUNDRED), 2);
    /// ```
    pub fn whole_units_of(&self, unit: Decimal) -> i64 {
        if self.0 <= Decimal::ZERO || unit <= Decimal::ZERO {
            return 0;
        }
        (self.0 / unit).floor().to_i64().unwrap_or(i64::MAX)
    }

    /// Returns the larger of two amounts.
    #[inline]
    pub fn max(self, other: Money) -> Money {
        if self >= other {
            self
        } else {
            other
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Always prints two decimal places: `220.00`, `-5.50`.
///
/// This is also the storage representation used by retail-db.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rounded().0)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim()).map(Money)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Money(amount)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

/// Multiplication by a quantity.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_display_always_two_places() {
        assert_eq!(Money::new(dec!(10.99)).to_string(), "10.99");
        assert_eq!(Money::from_major(5).to_string(), "5.00");
        assert_eq!(Money::new(dec!(-5.5)).to_string(), "-5.50");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_parse_storage_text() {
        let money: Money = "220.00".parse().unwrap();
        assert_eq!(money, Money::from_major(220));
        assert!("twelve".parse::<Money>().is_err());
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_major(10);
        let b = Money::new(dec!(5));

        assert_eq!(a + b, Money::from_major(15));
        assert_eq!(a - b, Money::from_major(5));
        assert_eq!(a * 3, Money::from_major(30));
        assert_eq!(-a, Money::from_major(-10));
    }

    #[test]
    fn test_rounding_is_half_away_from_zero() {
        assert_eq!(Money::new(dec!(0.825)).rounded().amount(), dec!(0.83));
        assert_eq!(Money::new(dec!(0.835)).rounded().amount(), dec!(0.84));
        assert_eq!(Money::new(dec!(-0.825)).rounded().amount(), dec!(-0.83));
        assert_eq!(Money::new(dec!(0.8249)).rounded().amount(), dec!(0.82));
    }

    #[test]
    fn test_tax_stays_exact_until_rounded() {
        let taxable = Money::new(dec!(10.05));
        let tax = taxable.calculate_tax(TaxRate::from_percent(dec!(7.5)));
        assert_eq!(tax.amount(), dec!(0.75375));
        assert_eq!(tax.rounded().amount(), dec!(0.75));
    }

    #[test]
    fn test_divide_quantity_handles_zero() {
        assert_eq!(Money::from_major(20).divide_quantity(0), Money::zero());
        assert_eq!(Money::from_major(20).divide_quantity(2), Money::from_major(10));
    }

    #[test]
    fn test_whole_units_floor() {
        assert_eq!(Money::from_major(220).whole_units_of(dec!(100)), 2);
        assert_eq!(Money::new(dec!(99.99)).whole_units_of(dec!(100)), 0);
        assert_eq!(Money::from_major(-300).whole_units_of(dec!(100)), 0);
    }

    #[test]
    fn test_sum() {
        let parts = [Money::new(dec!(0.10)), Money::new(dec!(0.20))];
        let total: Money = parts.iter().sum();
        assert_eq!(total, Money::new(dec!(0.30)));
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&Money::new(dec!(220.00))).unwrap();
        assert_eq!(json, "\"220.00\"");
    }
}
