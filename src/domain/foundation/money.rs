//! Money as integer minor units.
//!
//! All monetary values in the engine are [`Cents`] (fen for CNY). The
//! amount-equality check in the confirmation protocol is an exact integer
//! comparison; floating point never enters the core.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// An amount of money in minor units (cents / fen).
///
/// Negative amounts are representable for arithmetic convenience but are
/// rejected at the boundaries where amounts enter the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cents(i64);

impl Cents {
    pub const ZERO: Cents = Cents(0);

    /// Creates an amount from minor units.
    pub fn new(minor: i64) -> Self {
        Self(minor)
    }

    /// Creates an amount from a whole major-unit value, e.g. `from_major(258)`
    /// is ¥258.00.
    pub fn from_major(major: i64) -> Self {
        Self(major * 100)
    }

    /// Returns the raw minor-unit value.
    pub fn minor(&self) -> i64 {
        self.0
    }

    /// True for a zero amount (e.g. a wallet-funded free upgrade).
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Subtraction that floors at zero instead of going negative.
    ///
    /// Used for wallet proration: excess credit is forfeited, never
    /// refunded.
    pub fn saturating_sub(&self, other: Cents) -> Cents {
        Cents(self.0.saturating_sub(other.0).max(0))
    }

    /// Prorates this amount over `remaining` of `total` days, flooring
    /// toward zero.
    ///
    /// Computed in i128 so `amount * remaining` cannot overflow for any
    /// realistic order.
    pub fn prorate(&self, remaining: i64, total: i64) -> Cents {
        if total <= 0 || remaining <= 0 {
            return Cents::ZERO;
        }
        let exact = (self.0 as i128) * (remaining as i128) / (total as i128);
        Cents(exact as i64)
    }
}

impl Add for Cents {
    type Output = Cents;

    fn add(self, rhs: Cents) -> Cents {
        Cents(self.0 + rhs.0)
    }
}

impl AddAssign for Cents {
    fn add_assign(&mut self, rhs: Cents) {
        self.0 += rhs.0;
    }
}

impl Sub for Cents {
    type Output = Cents;

    fn sub(self, rhs: Cents) -> Cents {
        Cents(self.0 - rhs.0)
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_major_scales_by_hundred() {
        assert_eq!(Cents::from_major(258).minor(), 25800);
    }

    #[test]
    fn display_uses_two_decimal_places() {
        assert_eq!(Cents::new(25800).to_string(), "258.00");
        assert_eq!(Cents::new(5).to_string(), "0.05");
        assert_eq!(Cents::new(-130).to_string(), "-1.30");
    }

    #[test]
    fn saturating_sub_floors_at_zero() {
        let price = Cents::from_major(388);
        let credit = Cents::from_major(500);
        assert_eq!(price.saturating_sub(credit), Cents::ZERO);
    }

    #[test]
    fn prorate_matches_worked_example() {
        // ¥298 over 365 days with 200 days remaining: 29800 * 200 / 365 = 16328 (floored)
        let credit = Cents::from_major(298).prorate(200, 365);
        assert_eq!(credit, Cents::new(16328));
    }

    #[test]
    fn prorate_handles_degenerate_periods() {
        assert_eq!(Cents::from_major(298).prorate(0, 365), Cents::ZERO);
        assert_eq!(Cents::from_major(298).prorate(-3, 365), Cents::ZERO);
        assert_eq!(Cents::from_major(298).prorate(10, 0), Cents::ZERO);
    }
}
