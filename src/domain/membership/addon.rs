//! The add-on day ledger.
//!
//! Purchased time that cannot extend the active membership directly (for
//! example a one-time purchase while a Stripe subscription is running) is
//! banked here as whole days per tier, and claimed back once the
//! membership expires.

use serde::{Deserialize, Serialize};

use super::Tier;

/// Reserved subscription days per tier.
///
/// Summing onto the ledger never touches the membership's expire date;
/// only a claim converts days back into active time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOn {
    pub standard_days: i64,
    pub premium_days: i64,
}

impl AddOn {
    pub fn new(standard_days: i64, premium_days: i64) -> Self {
        Self {
            standard_days,
            premium_days,
        }
    }

    /// A ledger entry of `days` for a single tier.
    pub fn for_tier(tier: Tier, days: i64) -> Self {
        match tier {
            Tier::Standard => Self::new(days, 0),
            Tier::Premium => Self::new(0, days),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.standard_days == 0 && self.premium_days == 0
    }

    /// Component-wise sum.
    pub fn plus(&self, other: AddOn) -> AddOn {
        AddOn {
            standard_days: self.standard_days + other.standard_days,
            premium_days: self.premium_days + other.premium_days,
        }
    }

    pub fn days_for(&self, tier: Tier) -> i64 {
        match tier {
            Tier::Standard => self.standard_days,
            Tier::Premium => self.premium_days,
        }
    }

    /// Returns the ledger with one tier's days zeroed out (after a claim).
    pub fn cleared(&self, tier: Tier) -> AddOn {
        match tier {
            Tier::Standard => AddOn::new(0, self.premium_days),
            Tier::Premium => AddOn::new(self.standard_days, 0),
        }
    }

    /// The tier a claim would consume next: premium days first, because
    /// they are the higher-value entitlement.
    pub fn claimable_tier(&self) -> Option<Tier> {
        if self.premium_days > 0 {
            Some(Tier::Premium)
        } else if self.standard_days > 0 {
            Some(Tier::Standard)
        } else {
            None
        }
    }
}
