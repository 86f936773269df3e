//! The Stripe subscription payload the webhook layer hands in.
//!
//! Signature verification and raw-object parsing happen outside the
//! core; the engine receives this already-typed view.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::MemberId;
use crate::domain::membership::{AddOn, Edition, Membership, PaymentMethod, SubsStatus};

/// One Stripe subscription, as delivered by webhook or API fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripeSubs {
    /// Stripe subscription id (`sub_...`).
    pub id: String,
    /// Stripe customer id (`cus_...`), resolved to an FTC account by the
    /// caller.
    pub customer_id: String,
    pub status: SubsStatus,
    /// The plan's edition, mapped from the Stripe price.
    pub edition: Edition,
    /// End of the current billing period.
    pub current_period_end: NaiveDate,
    /// Set when the user asked Stripe to stop renewing.
    pub cancel_at_period_end: bool,
}

impl StripeSubs {
    /// A subscription that can no longer carry access: terminal status,
    /// or a lapsed period with renewal turned off.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        if !self.status.is_valid() {
            return true;
        }
        if self.auto_renewal() {
            return false;
        }
        self.current_period_end < today
    }

    pub fn auto_renewal(&self) -> bool {
        self.status.is_valid() && !self.cancel_at_period_end
    }

    /// The membership this subscription implies for `id`, carrying over
    /// an existing add-on ledger untouched.
    pub fn membership(&self, id: MemberId, addon: AddOn) -> Membership {
        Membership {
            id,
            edition: Some(self.edition),
            expire_date: Some(self.current_period_end),
            payment_method: Some(PaymentMethod::Stripe),
            stripe_subs_id: Some(self.id.clone()),
            apple_subs_id: None,
            b2b_licence_id: None,
            auto_renewal: self.auto_renewal(),
            status: Some(self.status),
            addon,
        }
    }
}
