//! Subscription editions: tier and billing cycle.

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Standard,
    Premium,
}

impl Tier {
    /// Numeric rank for upgrade comparison. Higher rank = higher tier.
    pub fn rank(&self) -> u8 {
        match self {
            Tier::Standard => 1,
            Tier::Premium => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Standard => "standard",
            Tier::Premium => "premium",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Billing cycle of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cycle {
    Month,
    Year,
}

impl Cycle {
    /// The day count a purchase of this cycle is worth in wallet and
    /// add-on arithmetic: a month is 31 days, a year 366 (the catalog
    /// grants the extra day).
    pub fn total_days(&self) -> i64 {
        match self {
            Cycle::Month => 31,
            Cycle::Year => 366,
        }
    }

    /// End date of a period of this cycle starting at `start`.
    ///
    /// Adds one calendar month or year plus one bonus day.
    pub fn period_end(&self, start: NaiveDate) -> NaiveDate {
        let base = match self {
            Cycle::Month => start + Months::new(1),
            Cycle::Year => start + Months::new(12),
        };
        base + Days::new(1)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Cycle::Month => "month",
            Cycle::Year => "year",
        }
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A purchasable plan edition: tier plus billing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edition {
    pub tier: Tier,
    pub cycle: Cycle,
}

impl Edition {
    pub fn new(tier: Tier, cycle: Cycle) -> Self {
        Self { tier, cycle }
    }

    pub fn standard_month() -> Self {
        Self::new(Tier::Standard, Cycle::Month)
    }

    pub fn standard_year() -> Self {
        Self::new(Tier::Standard, Cycle::Year)
    }

    pub fn premium_year() -> Self {
        Self::new(Tier::Premium, Cycle::Year)
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.tier, self.cycle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn premium_outranks_standard() {
        assert!(Tier::Premium.rank() > Tier::Standard.rank());
    }

    #[test]
    fn yearly_period_adds_a_year_and_a_day() {
        let start = date(2026, 8, 29);
        assert_eq!(Cycle::Year.period_end(start), date(2027, 8, 30));
    }

    #[test]
    fn monthly_period_adds_a_month_and_a_day() {
        let start = date(2026, 1, 31);
        // Chrono clamps Jan 31 + 1 month to Feb 28, then the bonus day.
        assert_eq!(Cycle::Month.period_end(start), date(2026, 3, 1));
    }

    #[test]
    fn edition_displays_as_tier_cycle() {
        assert_eq!(Edition::standard_year().to_string(), "standard_year");
        assert_eq!(Edition::premium_year().to_string(), "premium_year");
    }
}
