//! The upgrade wallet: proration of unconsumed one-time orders.
//!
//! When a one-time purchaser upgrades tier, the unused value of their
//! historical orders funds the new plan. Each balance source contributes
//! `daily rate x remaining days`; the aggregated credit is deducted from
//! the new plan's price. Credit beyond the price is forfeited, a
//! documented business rule.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{days_remaining, Cents, OrderId};
use crate::domain::membership::Tier;

/// A confirmed, not-yet-consumed order with remaining time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSource {
    pub order_id: OrderId,
    pub tier: Tier,
    /// What was actually paid for the order.
    pub payable: Cents,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl BalanceSource {
    /// Days the order originally bought, never below one so the daily
    /// rate is defined.
    pub fn total_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days().max(1)
    }

    /// Days not yet used up, floored at zero. A period that has not
    /// started yet is worth its full length.
    pub fn remaining_days(&self, today: NaiveDate) -> i64 {
        if self.start_date > today {
            self.total_days()
        } else {
            days_remaining(self.end_date, today)
        }
    }

    /// The unused value of this order, in cents, floored.
    pub fn balance(&self, today: NaiveDate) -> Cents {
        self.payable
            .prorate(self.remaining_days(today), self.total_days())
    }
}

/// Aggregated spendable credit at upgrade time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wallet {
    /// Total unused value across all sources.
    pub credit: Cents,
    /// The sources that contributed credit, to be flagged consumed when
    /// the upgrade confirms. A source with no remaining value is left
    /// out; it was not spent.
    pub source_ids: Vec<OrderId>,
    /// The date the credit was computed against.
    pub as_of: NaiveDate,
}

impl Wallet {
    /// Aggregates the given sources as of `today`.
    pub fn from_sources(sources: &[BalanceSource], today: NaiveDate) -> Self {
        let mut credit = Cents::ZERO;
        let mut source_ids = Vec::with_capacity(sources.len());
        for source in sources {
            let balance = source.balance(today);
            if balance.is_zero() {
                continue;
            }
            credit += balance;
            source_ids.push(source.order_id.clone());
        }
        Self {
            credit,
            source_ids,
            as_of: today,
        }
    }

    /// What remains to pay for a plan of the given price. Excess credit
    /// is forfeited, never refunded or carried forward.
    pub fn payable_for(&self, price: Cents) -> Cents {
        price.saturating_sub(self.credit)
    }

    /// True when the credit covers the whole plan price, so the upgrade
    /// confirms without a gateway round-trip.
    pub fn is_free_upgrade(&self, price: Cents) -> bool {
        self.payable_for(price).is_zero()
    }
}
