//! # Money & Points
//!
//! The two pricing universes of the cart engine, as integer newtypes.
//!
//! A regular cart line is priced in currency minor units (cents); an
//! affiliate cart line is priced in loyalty points. The amounts are plain
//! `i64` under the hood - float arithmetic never touches a price - but they
//! get two distinct wrapper types on purpose: a line belongs to exactly one
//! universe, and handing a [`Points`] value to something expecting [`Money`]
//! should be a compile error, not a production incident.
//!
//! ## Usage
//! ```rust
//! use merx_core::money::{Money, Points};
//!
//! let price = Money::from_cents(1099);        // $10.99
//! assert_eq!((price * 3).cents(), 3297);      // line subtotal
//!
//! let cost = Points::new(250);
//! assert_eq!((cost * 2).amount(), 500);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

/// A monetary value in the smallest currency unit (cents).
///
/// Signed: deltas and refunds are negative amounts, not a separate type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Wraps an amount of cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// The raw amount in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Major-unit (dollar) portion, truncated toward zero.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Minor-unit (cent) portion, always 0-99.
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }
}

/// For logs and debugging; the frontend formats for locale.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, self.major().abs(), self.minor())
    }
}

/// A loyalty-point amount, the affiliate pricing universe.
///
/// Structurally a twin of [`Money`]; the separation is the point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Points(i64);

impl Points {
    /// Wraps a point amount.
    #[inline]
    pub const fn new(points: i64) -> Self {
        Points(points)
    }

    /// The raw point amount.
    #[inline]
    pub const fn amount(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Points {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} pts", self.0)
    }
}

/// The arithmetic surface both amount types share. Amounts of the same
/// universe add and subtract; multiplying by a quantity yields a subtotal.
/// Cross-universe arithmetic stays unrepresentable.
macro_rules! amount_ops {
    ($ty:ident) => {
        impl $ty {
            /// The zero amount.
            #[inline]
            pub const fn zero() -> Self {
                $ty(0)
            }

            /// True for the zero amount.
            #[inline]
            pub const fn is_zero(&self) -> bool {
                self.0 == 0
            }

            /// True for amounts below zero.
            #[inline]
            pub const fn is_negative(&self) -> bool {
                self.0 < 0
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                $ty::zero()
            }
        }

        impl Add for $ty {
            type Output = Self;

            #[inline]
            fn add(self, other: Self) -> Self {
                $ty(self.0 + other.0)
            }
        }

        impl AddAssign for $ty {
            #[inline]
            fn add_assign(&mut self, other: Self) {
                self.0 += other.0;
            }
        }

        impl Sub for $ty {
            type Output = Self;

            #[inline]
            fn sub(self, other: Self) -> Self {
                $ty(self.0 - other.0)
            }
        }

        impl SubAssign for $ty {
            #[inline]
            fn sub_assign(&mut self, other: Self) {
                self.0 -= other.0;
            }
        }

        impl Mul<i64> for $ty {
            type Output = Self;

            #[inline]
            fn mul(self, qty: i64) -> Self {
                $ty(self.0 * qty)
            }
        }
    };
}

amount_ops!(Money);
amount_ops!(Points);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.minor(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "$10.99");
        assert_eq!(format!("{}", Money::from_cents(500)), "$5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(format!("{}", Points::new(250)), "250 pts");
    }

    #[test]
    fn test_money_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);

        let mut running = Money::zero();
        running += a;
        running -= b;
        assert_eq!(running.cents(), 500);
    }

    #[test]
    fn test_points_arithmetic() {
        let a = Points::new(100);
        let b = Points::new(40);

        assert_eq!((a + b).amount(), 140);
        assert_eq!((a - b).amount(), 60);
        assert_eq!((b * 2).amount(), 80);
    }

    #[test]
    fn test_zero_and_sign_checks() {
        assert!(Money::zero().is_zero());
        assert!(!Money::from_cents(100).is_zero());
        assert!(Money::from_cents(-100).is_negative());
        assert!(Points::default().is_zero());
        assert!(Points::new(-5).is_negative());
    }
}
