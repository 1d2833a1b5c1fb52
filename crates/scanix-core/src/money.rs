//! # Money Module
//!
//! Provides the `Money` type for tier prices, line subtotals and ticket totals.
//!
//! ## Why Integer Cents?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ROUNDING TO 2 DECIMALS, FOR FREE                                       │
//! │                                                                         │
//! │  Floating point:                                                        │
//! │    6 × 93.10 = 558.5999999999999   → must round(·, 2) every time       │
//! │    Σ subtotals drifts by fractions of a cent across many lines         │
//! │                                                                         │
//! │  Integer cents:                                                         │
//! │    6 × 9310 = 55860 cents = $558.60 (exact)                            │
//! │    total = Σ subtotal is exact, so total == round(Σ subtotal, 2)       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use scanix_core::money::Money;
//!
//! let unit = Money::from_cents(9_300); // $93.00
//! let subtotal = unit.multiply_quantity(6);
//! assert_eq!(subtotal.cents(), 55_800); // $558.00
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Where Money Flows
/// ```text
/// Product.base_price ──┐
///                      ├──► resolve_price(qty) ──► CartLine.unit_price
/// Tier.unit_price ─────┘                                 │
///                                                        ▼
///                                   CartLine.subtotal = unit_price × qty
///                                                        │
///                                                        ▼
///                                        Ticket.total = Σ subtotal
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use scanix_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // $10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole currency units.
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major * 100)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole-unit portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the cents portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Multiplies a unit price by a quantity to get a line subtotal.
    ///
    /// ```rust
    /// use scanix_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Returns the value as a float with 2 decimals (display/export only).
    pub fn as_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Human-readable form, e.g. `$558.00`. Localised formatting lives in the UI.
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

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
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
        assert_eq!(Money::from_major(93).cents(), 9_300);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(55_800)), "$558.00");
        assert_eq!(format!("{}", Money::from_cents(5)), "$0.05");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
    }

    #[test]
    fn test_sum_is_exact() {
        // 0.10 + 0.20 in cents never drifts
        let total: Money = [Money::from_cents(10), Money::from_cents(20)].iter().sum();
        assert_eq!(total.cents(), 30);
        assert_eq!(total.as_decimal(), 0.3);
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);
        assert!(Money::zero().is_zero());
        assert!(a.is_positive());
    }

    #[test]
    fn test_serializes_as_plain_cents() {
        let json = serde_json::to_string(&Money::from_cents(9_300)).unwrap();
        assert_eq!(json, "9300");
    }
}
