//! # Money Module
//!
//! Fixed-point types for every number that touches a receipt.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    0.1 + 0.2 = 0.30000000000000004                                      │
//! │    23.5 / 10 * 1.25 may land on either side of an integer boundary      │
//! │                                                                         │
//! │  OUR SOLUTION: Integer cents and basis points                           │
//! │    Money       i64 cents           $23.50  → 2350                       │
//! │    TaxRate     u32 basis points    10%     → 1000                       │
//! │    Multiplier  u32 basis points    1.25x   → 12500                      │
//! │                                                                         │
//! │  Every result is exact; rounding happens in exactly one place per rule. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};
use ts_rs::TS;

/// Basis points in one whole unit (100%).
pub const BPS_SCALE: u32 = 10_000;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents for USD).
///
/// Signed so administrative corrections can be represented, although every
/// value produced by settlement is non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let price = Money::from_cents(2350); // $23.50
    /// assert_eq!(price.cents(), 2350);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units (dollars and cents).
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -$5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Converts a decimal amount in major units to cents without rounding.
    ///
    /// `None` when the amount has more than two fractional digits (after
    /// trailing zeros are dropped) or does not fit in i64 cents.
    ///
    /// ```rust
    /// use rust_decimal::Decimal;
    /// use tally_core::money::Money;
    ///
    /// assert_eq!(Money::from_decimal(Decimal::new(1999, 2)), Some(Money::from_cents(1999)));
    /// assert_eq!(Money::from_decimal(Decimal::new(20000, 3)), Some(Money::from_cents(2000)));
    /// assert_eq!(Money::from_decimal(Decimal::new(19999, 3)), None);
    /// ```
    pub fn from_decimal(amount: Decimal) -> Option<Self> {
        let amount = amount.normalize();
        if amount.scale() > 2 {
            return None;
        }
        amount
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|cents| cents.to_i64())
            .map(Money)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole-dollar portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the cents portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Calculates tax, rounding half up to the nearest cent.
    ///
    /// ## Implementation
    /// Integer math: `(amount * rate + 5000) / 10000`, widened to i128 so a
    /// large subtotal cannot overflow.
    ///
    /// ```rust
    /// use tally_core::money::{Money, TaxRate};
    ///
    /// let subtotal = Money::from_cents(10_000); // $100.00
    /// let tax = subtotal.calculate_tax(TaxRate::from_bps(1000)); // 10%
    /// assert_eq!(tax.cents(), 1_000); // $10.00
    ///
    /// // $10.00 × 8.25% = $0.825 → $0.83
    /// let tax = Money::from_cents(1000).calculate_tax(TaxRate::from_bps(825));
    /// assert_eq!(tax.cents(), 83);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        let tax_cents =
            (self.0 as i128 * rate.bps() as i128 + (BPS_SCALE / 2) as i128) / BPS_SCALE as i128;
        Money::from_cents(tax_cents as i64)
    }

    /// Multiplies money by a quantity.
    ///
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let line_total = Money::from_cents(299).multiply_quantity(3);
    /// assert_eq!(line_total.cents(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Adds two amounts, returning `None` on overflow.
    #[inline]
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Multiplies by a quantity, returning `None` on overflow.
    #[inline]
    pub fn checked_multiply_quantity(self, qty: i64) -> Option<Money> {
        self.0.checked_mul(qty).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
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

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate in basis points: 1000 bps = 10%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Multiplier
// =============================================================================

/// A loyalty points multiplier in basis points: 12500 = 1.25x.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Multiplier(u32);

impl Multiplier {
    /// The multiplier applied when a customer holds no tier.
    pub const ONE: Multiplier = Multiplier(BPS_SCALE);

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Multiplier(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Applies the multiplier to a whole number of points, truncating.
    ///
    /// ```rust
    /// use tally_core::money::Multiplier;
    ///
    /// assert_eq!(Multiplier::from_bps(12500).apply(2), 2);  // 2 × 1.25 = 2.5 → 2
    /// assert_eq!(Multiplier::from_bps(15000).apply(7), 10); // 7 × 1.5 = 10.5 → 10
    /// ```
    #[inline]
    pub fn apply(&self, points: i64) -> i64 {
        ((points as i128 * self.0 as i128) / BPS_SCALE as i128) as i64
    }

    /// Returns the multiplier as a decimal (for display only).
    #[inline]
    pub fn as_decimal(&self) -> f64 {
        self.0 as f64 / BPS_SCALE as f64
    }
}

impl Default for Multiplier {
    fn default() -> Self {
        Multiplier::ONE
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.dollars(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(23, 50).cents(), 2350);
        assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    }

    #[test]
    fn test_from_decimal_is_exact() {
        use std::str::FromStr;

        let cents = |s: &str| Money::from_decimal(Decimal::from_str(s).unwrap()).map(|m| m.cents());
        assert_eq!(cents("20.00"), Some(2000));
        assert_eq!(cents("19.99"), Some(1999));
        assert_eq!(cents("0.1"), Some(10));
        assert_eq!(cents("7"), Some(700));
        assert_eq!(cents("1.50000"), Some(150));
        assert_eq!(cents("19.999"), None);
        assert_eq!(cents("0.005"), None);
        assert_eq!(cents("99999999999999999999"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "$10.99");
        assert_eq!(format!("{}", Money::from_cents(500)), "$5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "$0.00");
    }

    #[test]
    fn test_arithmetic_and_sum() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);

        let total: Money = [a, b, b].into_iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_tax_ten_percent_of_one_hundred() {
        let subtotal = Money::from_cents(10_000);
        let tax = subtotal.calculate_tax(TaxRate::from_bps(1000));
        assert_eq!(tax.cents(), 1_000);
        assert_eq!((subtotal + tax).cents(), 11_000);
    }

    #[test]
    fn test_tax_rounds_half_up() {
        // $0.05 at 10% = 0.5 cent → 1 cent
        assert_eq!(Money::from_cents(5).calculate_tax(TaxRate::from_bps(1000)).cents(), 1);
        // $0.04 at 10% = 0.4 cent → 0 cents
        assert_eq!(Money::from_cents(4).calculate_tax(TaxRate::from_bps(1000)).cents(), 0);
    }

    #[test]
    fn test_checked_operations() {
        assert!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)).is_none());
        assert!(Money::from_cents(i64::MAX / 2).checked_multiply_quantity(3).is_none());
        assert_eq!(
            Money::from_cents(299).checked_multiply_quantity(3),
            Some(Money::from_cents(897))
        );
    }

    #[test]
    fn test_multiplier_truncates() {
        assert_eq!(Multiplier::ONE.apply(9), 9);
        assert_eq!(Multiplier::from_bps(12500).apply(2), 2);
        assert_eq!(Multiplier::from_bps(12500).apply(4), 5);
        assert_eq!(Multiplier::from_bps(15000).apply(0), 0);
    }

    #[test]
    fn test_multiplier_default_is_one() {
        assert_eq!(Multiplier::default(), Multiplier::ONE);
        assert!((Multiplier::ONE.as_decimal() - 1.0).abs() < f64::EPSILON);
    }
}
