//! Money and rate types with precise decimal arithmetic
//!
//! This module provides a type-safe representation of monetary values
//! using rust_decimal for precise calculations without floating-point errors.
//! The platform bills in a single settlement currency, so `Money` carries no
//! currency code; amounts are kept at two decimal places with banker's
//! rounding, matching how consumption commission splits have historically
//! been computed.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Neg, Sub};
use thiserror::Error;

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Division by zero")]
    DivisionByZero,
}

/// A monetary amount in the platform settlement currency
///
/// Stored at two decimal places. Construction rounds with
/// `MidpointNearestEven` so that repeated splits stay stable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Number of decimal places carried by all amounts
    pub const SCALE: u32 = 2;

    /// Creates a new Money value, rounding to two decimal places
    pub fn new(amount: Decimal) -> Self {
        Self(amount.round_dp_with_strategy(
            Self::SCALE,
            rust_decimal::RoundingStrategy::MidpointNearestEven,
        ))
    }

    /// Creates Money from an integer amount in cents
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, Self::SCALE))
    }

    /// The zero amount
    pub fn zero() -> Self {
        Self(dec!(0))
    }

    /// Returns the underlying decimal amount
    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns true if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the amount is strictly positive
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Returns true if the amount is negative
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Returns the smaller of two amounts
    pub fn min(self, other: Money) -> Money {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    /// Multiplies by a scalar factor, rounding the result
    pub fn multiply(&self, factor: Decimal) -> Self {
        Self::new(self.0 * factor)
    }

    /// Returns `self / other` as a plain ratio (not an amount)
    ///
    /// Used for proportional payment restoration, where
    /// `ratio = payment / document total`.
    pub fn ratio_of(&self, total: Money) -> Result<Decimal, MoneyError> {
        if total.is_zero() {
            return Err(MoneyError::DivisionByZero);
        }
        Ok(self.0 / total.0)
    }

    /// Allocates this amount across weights, proportionally
    ///
    /// Each allocation is `self * weight / sum(weights)` rounded to the
    /// money scale; the final slot absorbs the rounding remainder so the
    /// parts always sum back to the original amount.
    pub fn allocate_by_weights(&self, weights: &[Decimal]) -> Result<Vec<Money>, MoneyError> {
        if weights.is_empty() {
            return Err(MoneyError::InvalidAmount("Empty weights".to_string()));
        }
        let total_weight: Decimal = weights.iter().sum();
        if total_weight.is_zero() {
            return Err(MoneyError::InvalidAmount("Total weight is zero".to_string()));
        }

        let mut allocated = Money::zero();
        let mut allocations = Vec::with_capacity(weights.len());
        for (i, weight) in weights.iter().enumerate() {
            if i == weights.len() - 1 {
                allocations.push(*self - allocated);
            } else {
                let part = Self::new(self.0 * *weight / total_weight);
                allocated = allocated + part;
                allocations.push(part);
            }
        }
        Ok(allocations)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self::new(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Decimal {
        money.0
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self(self.0 - other.0)
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// A percentage rate (e.g., a provider commission)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rate(Decimal);

impl Rate {
    /// Creates a rate from a percentage (e.g., `5.0` for 5%)
    pub fn from_percentage(percentage: Decimal) -> Self {
        Self(percentage)
    }

    /// The zero rate
    pub fn zero() -> Self {
        Self(dec!(0))
    }

    /// Returns the rate as a percentage
    pub fn as_percentage(&self) -> Decimal {
        self.0
    }

    /// Returns the rate as a decimal fraction (5% -> 0.05)
    pub fn as_fraction(&self) -> Decimal {
        self.0 / dec!(100)
    }

    /// Applies this rate to an amount, rounding to the money scale
    pub fn apply(&self, money: Money) -> Money {
        money.multiply(self.as_fraction())
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0.round_dp(4))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_rounds_to_two_places() {
        let m = Money::new(dec!(10.005));
        // banker's rounding: 10.005 -> 10.00
        assert_eq!(m.amount(), dec!(10.00));

        let m = Money::new(dec!(10.015));
        assert_eq!(m.amount(), dec!(10.02));
    }

    #[test]
    fn test_money_arithmetic() {
        let a = Money::new(dec!(100.00));
        let b = Money::new(dec!(50.25));

        assert_eq!((a + b).amount(), dec!(150.25));
        assert_eq!((a - b).amount(), dec!(49.75));
        assert_eq!((-b).amount(), dec!(-50.25));
    }

    #[test]
    fn test_ratio_of() {
        let payment = Money::new(dec!(500));
        let total = Money::new(dec!(1000));
        assert_eq!(payment.ratio_of(total).unwrap(), dec!(0.5));

        assert_eq!(
            payment.ratio_of(Money::zero()),
            Err(MoneyError::DivisionByZero)
        );
    }

    #[test]
    fn test_commission_split() {
        let rate = Rate::from_percentage(dec!(7.5));
        let gross = Money::new(dec!(133.33));

        let commission = rate.apply(gross);
        assert_eq!(commission.amount(), dec!(10.00));
        assert_eq!((gross - commission).amount(), dec!(123.33));
    }

    #[test]
    fn test_allocation_sums_to_original() {
        let m = Money::new(dec!(100.00));
        let parts = m
            .allocate_by_weights(&[dec!(1), dec!(1), dec!(1)])
            .unwrap();

        assert_eq!(parts.len(), 3);
        let total: Money = parts.into_iter().sum();
        assert_eq!(total, m);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn allocation_sum_equals_original(
            cents in 1i64..1_000_000_000i64,
            weights in proptest::collection::vec(1i64..10_000i64, 1..50)
        ) {
            let money = Money::from_cents(cents);
            let weights: Vec<Decimal> = weights.into_iter().map(Decimal::from).collect();
            let allocations = money.allocate_by_weights(&weights).unwrap();

            let total: Money = allocations.into_iter().sum();
            prop_assert_eq!(total, money);
        }

        #[test]
        fn commission_never_exceeds_gross(
            cents in 1i64..1_000_000_000i64,
            pct in 0i64..=100i64
        ) {
            let gross = Money::from_cents(cents);
            let rate = Rate::from_percentage(Decimal::from(pct));

            let commission = rate.apply(gross);
            prop_assert!(commission <= gross);
            prop_assert!(!commission.is_negative());
        }
    }
}
