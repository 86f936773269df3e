//! Subscription status as reported by Stripe.
//!
//! Meaningful only for Stripe-backed memberships; one-time memberships
//! leave the field unset and derive validity from the expire date alone.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stripe subscription lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubsStatus {
    Active,
    Incomplete,
    IncompleteExpired,
    PastDue,
    Canceled,
    Unpaid,
    Trialing,
}

impl SubsStatus {
    /// True while the subscription still entitles the user to access.
    ///
    /// `Incomplete` counts: the first invoice is pending but the
    /// subscription object exists and will settle or expire within
    /// Stripe's 23-hour window.
    pub fn is_valid(&self) -> bool {
        matches!(
            self,
            SubsStatus::Active | SubsStatus::Trialing | SubsStatus::Incomplete
        )
    }

    /// True for the terminal states that can never carry access again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubsStatus::IncompleteExpired | SubsStatus::Canceled | SubsStatus::Unpaid
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubsStatus::Active => "active",
            SubsStatus::Incomplete => "incomplete",
            SubsStatus::IncompleteExpired => "incomplete_expired",
            SubsStatus::PastDue => "past_due",
            SubsStatus::Canceled => "canceled",
            SubsStatus::Unpaid => "unpaid",
            SubsStatus::Trialing => "trialing",
        }
    }
}

impl fmt::Display for SubsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SubsStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubsStatus::Active),
            "incomplete" => Ok(SubsStatus::Incomplete),
            "incomplete_expired" => Ok(SubsStatus::IncompleteExpired),
            "past_due" => Ok(SubsStatus::PastDue),
            "canceled" => Ok(SubsStatus::Canceled),
            "unpaid" => Ok(SubsStatus::Unpaid),
            "trialing" => Ok(SubsStatus::Trialing),
            other => Err(format!("unknown subscription status: {}", other)),
        }
    }
}
