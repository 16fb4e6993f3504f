use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};
use std::str::FromStr;

/// A monetary amount, exact to the cent.
///
/// Receipt math must balance byte-exactly, so amounts never pass through
/// floating point: parsing, summation, and tolerance checks all run on
/// `Decimal` rounded to two places.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::from(cents) / Decimal::from(100))
    }

    pub fn to_cents(self) -> i64 {
        (self.0 * Decimal::from(100)).round().to_i64().unwrap_or(0)
    }

    pub fn from_decimal(decimal: Decimal) -> Self {
        Money(decimal.round_dp(2))
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }

    pub fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Absolute difference — the quantity every tolerance check compares.
    pub fn abs_diff(self, other: Self) -> Self {
        Money((self.0 - other.0).abs())
    }

    /// Multiply by a quantity (e.g. `2.68` lb), rounding to the cent.
    pub fn mul_qty(self, qty: Decimal) -> Self {
        Money((self.0 * qty).round_dp(2))
    }

    /// `self / whole`, or `None` when `whole` is zero. Used for the
    /// tax-fraction sanity guard.
    pub fn ratio_of(self, whole: Self) -> Option<Decimal> {
        if whole.0.is_zero() {
            None
        } else {
            Some(self.0 / whole.0)
        }
    }

    /// Parse an amount as printed on a receipt: optional `$`, optional
    /// comma thousands separators, two decimal places.
    pub fn parse(s: &str) -> Option<Self> {
        let clean: String = s
            .trim()
            .trim_start_matches('$')
            .trim()
            .chars()
            .filter(|c| *c != ',')
            .collect();
        let dec = Decimal::from_str(&clean).ok()?;
        Some(Money(dec.round_dp(2)))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Money(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |a, b| a + b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cents_roundtrip() {
        assert_eq!(Money::from_cents(2049).to_cents(), 2049);
        assert_eq!(Money::from_cents(0).to_cents(), 0);
        assert_eq!(Money::from_cents(1).to_cents(), 1);
    }

    #[test]
    fn parse_plain_and_prefixed() {
        assert_eq!(Money::parse("4.99"), Some(Money::from_cents(499)));
        assert_eq!(Money::parse("$20.49"), Some(Money::from_cents(2049)));
        assert_eq!(Money::parse("$ 0.01"), Some(Money::from_cents(1)));
    }

    #[test]
    fn parse_comma_thousands() {
        assert_eq!(Money::parse("$1,234.56"), Some(Money::from_cents(123_456)));
    }

    #[test]
    fn parse_garbage_is_none() {
        assert_eq!(Money::parse("TOTAL"), None);
        assert_eq!(Money::parse(""), None);
    }

    #[test]
    fn abs_diff_is_symmetric() {
        let a = Money::from_cents(500);
        let b = Money::from_cents(503);
        assert_eq!(a.abs_diff(b), Money::from_cents(3));
        assert_eq!(b.abs_diff(a), Money::from_cents(3));
    }

    #[test]
    fn mul_qty_rounds_to_cent() {
        // 2.68 lb @ $2.88/lb = $7.7184 -> $7.72
        let unit = Money::from_cents(288);
        let qty = Decimal::from_str("2.68").unwrap();
        assert_eq!(unit.mul_qty(qty), Money::from_cents(772));
    }

    #[test]
    fn sum_over_iterator() {
        let total: Money = [499, 401, 100].iter().map(|c| Money::from_cents(*c)).sum();
        assert_eq!(total, Money::from_cents(1000));
    }

    #[test]
    fn display_two_places() {
        assert_eq!(Money::from_cents(550).to_string(), "$5.50");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
    }
}
