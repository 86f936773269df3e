//! Membership aggregate entity.
//!
//! The Membership is the canonical per-user subscription record and the
//! single shared mutable resource of the engine. Each user has at most
//! one row, keyed by the compound member id.
//!
//! # Design Decisions
//!
//! - **Zero value = no subscription**: `Membership::default()` stands in
//!   for an absent row so callers never branch on `Option<Membership>`.
//! - **One channel id at a time**: the Stripe subscription id, Apple
//!   original-transaction id, and B2B licence id are mutually exclusive.
//! - **Mutated only by the engine**: the confirmation protocol, the
//!   add-on claim, and the Stripe webhook reconciler are the only
//!   legitimate writers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{days_remaining, today_utc, MemberId, ReconcileError};

use super::{AddOn, Edition, PaymentMethod, SubsStatus, Tier};

/// A user's current subscription record.
///
/// # Invariants
///
/// - A non-zero membership has a non-zero [`MemberId`] and an edition.
/// - `is_expired` is true only when the expire date is past **and**
///   auto-renewal is off.
/// - At most one of the channel-specific foreign keys is populated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// Compound member id; the primary lookup key.
    pub id: MemberId,

    /// Tier and billing cycle. `None` only for the zero value.
    pub edition: Option<Edition>,

    /// When the current entitlement lapses.
    pub expire_date: Option<NaiveDate>,

    /// Channel that funded the membership. `None` only for the zero value.
    pub payment_method: Option<PaymentMethod>,

    /// Stripe subscription id, when Stripe-backed.
    pub stripe_subs_id: Option<String>,

    /// Apple original transaction id, when IAP-backed.
    pub apple_subs_id: Option<String>,

    /// Licence id, when granted through a B2B contract.
    pub b2b_licence_id: Option<String>,

    /// Whether the backing subscription renews itself.
    pub auto_renewal: bool,

    /// Subscription state machine status; meaningful for Stripe only.
    pub status: Option<SubsStatus>,

    /// Deferred purchased time, kept across channel switches.
    pub addon: AddOn,
}

/// Result of claiming banked add-on days back into active time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOnClaim {
    /// The refreshed membership.
    pub membership: Membership,
    /// Which tier's days were consumed.
    pub tier: Tier,
    /// How many days were converted into active time.
    pub days: i64,
}

impl Membership {
    /// A one-time (Alipay/WeChat) membership for the given period.
    pub fn one_time(
        id: MemberId,
        edition: Edition,
        expire_date: NaiveDate,
        method: PaymentMethod,
    ) -> Self {
        Self {
            id,
            edition: Some(edition),
            expire_date: Some(expire_date),
            payment_method: Some(method),
            ..Self::default()
        }
    }

    /// True when this value stands in for "no subscription".
    pub fn is_zero(&self) -> bool {
        self.id.is_zero()
    }

    /// Expired means the expire date is in the past and nothing will
    /// renew it. A membership with auto-renewal on is never expired,
    /// whatever the date says: the provider owns the extension.
    pub fn is_expired(&self) -> bool {
        self.is_expired_on(today_utc())
    }

    /// Deterministic variant of [`is_expired`](Self::is_expired).
    pub fn is_expired_on(&self, today: NaiveDate) -> bool {
        if self.is_zero() {
            return true;
        }
        if self.auto_renewal {
            return false;
        }
        match self.expire_date {
            Some(expire) => expire < today,
            None => true,
        }
    }

    pub fn tier(&self) -> Option<Tier> {
        self.edition.map(|e| e.tier)
    }

    /// True for Alipay/WeChat one-time memberships.
    pub fn is_one_time(&self) -> bool {
        self.payment_method.map(|m| m.is_one_time()).unwrap_or(false)
    }

    pub fn is_stripe(&self) -> bool {
        matches!(self.payment_method, Some(PaymentMethod::Stripe))
    }

    /// A Stripe membership whose status no longer grants access. Such a
    /// membership is overwritable as if it did not exist.
    pub fn is_invalid_stripe(&self) -> bool {
        self.is_stripe() && !self.status.map(|s| s.is_valid()).unwrap_or(false)
    }

    /// Whole days left on the current period, floored at zero.
    pub fn remaining_days(&self, today: NaiveDate) -> i64 {
        match self.expire_date {
            Some(expire) => days_remaining(expire, today),
            None => 0,
        }
    }

    /// Converts the remaining one-time period into an add-on entry,
    /// banked when another channel takes over the membership.
    ///
    /// Returns a zero entry when nothing remains or the tier is unknown.
    pub fn carry_over(&self, today: NaiveDate) -> AddOn {
        match self.tier() {
            Some(tier) => AddOn::for_tier(tier, self.remaining_days(today)),
            None => AddOn::default(),
        }
    }

    /// Sums days onto the ledger. Never touches the expire date.
    pub fn plus_add_on(mut self, addon: AddOn) -> Self {
        self.addon = self.addon.plus(addon);
        self
    }

    pub fn has_add_ons(&self) -> bool {
        !self.addon.is_zero()
    }

    /// Converts banked days into a fresh active period.
    ///
    /// Only valid on an expired membership that actually has banked days;
    /// anything else is caller misuse, reported as a non-retryable error.
    /// Premium days are consumed before standard days; the untouched
    /// tier's days stay banked for a later claim.
    pub fn claim_add_on(self, today: NaiveDate) -> Result<AddOnClaim, ReconcileError> {
        if self.is_zero() {
            return Err(ReconcileError::InvalidClaim(
                "no membership to claim add-ons for".into(),
            ));
        }
        if !self.is_expired_on(today) {
            return Err(ReconcileError::InvalidClaim(
                "add-ons can only be claimed after the membership expires".into(),
            ));
        }
        let tier = self.addon.claimable_tier().ok_or_else(|| {
            ReconcileError::InvalidClaim("the add-on ledger is empty".into())
        })?;
        let days = self.addon.days_for(tier);
        let cycle = self.edition.map(|e| e.cycle).unwrap_or(super::Cycle::Year);

        let membership = Membership {
            edition: Some(Edition::new(tier, cycle)),
            expire_date: Some(today + chrono::Days::new(days as u64)),
            // Banked days were bought through one-time channels, so the
            // claimed period is one-time entitlement whatever channel
            // the lapsed membership came from.
            payment_method: Some(
                self.payment_method
                    .filter(|m| m.is_one_time())
                    .unwrap_or(PaymentMethod::Alipay),
            ),
            stripe_subs_id: None,
            apple_subs_id: None,
            b2b_licence_id: None,
            auto_renewal: false,
            status: None,
            addon: self.addon.cleared(tier),
            ..self
        };
        Ok(AddOnClaim {
            membership,
            tier,
            days,
        })
    }

    /// True when the two records differ in any field the engine persists.
    ///
    /// Used by the webhook reconciler to suppress no-op writes and the
    /// spurious audit rows they would generate.
    pub fn is_modified(&self, other: &Membership) -> bool {
        self != other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        date(2026, 8, 29)
    }

    fn standard_member(expire: NaiveDate) -> Membership {
        Membership::one_time(
            MemberId::from_ftc("ftc-1"),
            Edition::standard_year(),
            expire,
            PaymentMethod::Alipay,
        )
    }

    // Zero value and expiry

    #[test]
    fn default_membership_is_zero_and_expired() {
        let m = Membership::default();
        assert!(m.is_zero());
        assert!(m.is_expired_on(today()));
    }

    #[test]
    fn future_expire_date_is_not_expired() {
        assert!(!standard_member(date(2027, 1, 1)).is_expired_on(today()));
    }

    #[test]
    fn past_expire_date_is_expired() {
        assert!(standard_member(date(2026, 8, 28)).is_expired_on(today()));
    }

    #[test]
    fn auto_renewal_overrides_past_expire_date() {
        let mut m = standard_member(date(2026, 1, 1));
        m.payment_method = Some(PaymentMethod::Stripe);
        m.status = Some(SubsStatus::Active);
        m.auto_renewal = true;
        assert!(!m.is_expired_on(today()));
    }

    // Stripe validity

    #[test]
    fn stripe_with_terminal_status_is_invalid() {
        let mut m = standard_member(date(2027, 1, 1));
        m.payment_method = Some(PaymentMethod::Stripe);
        m.status = Some(SubsStatus::Canceled);
        assert!(m.is_invalid_stripe());
    }

    #[test]
    fn active_stripe_is_valid() {
        let mut m = standard_member(date(2027, 1, 1));
        m.payment_method = Some(PaymentMethod::Stripe);
        m.status = Some(SubsStatus::Active);
        assert!(!m.is_invalid_stripe());
    }

    #[test]
    fn one_time_membership_is_never_invalid_stripe() {
        assert!(!standard_member(date(2026, 1, 1)).is_invalid_stripe());
    }

    // Carry-over

    #[test]
    fn carry_over_banks_remaining_days_by_tier() {
        let m = standard_member(date(2026, 9, 8));
        assert_eq!(m.carry_over(today()), AddOn::new(10, 0));
    }

    #[test]
    fn carry_over_of_lapsed_membership_is_zero() {
        let m = standard_member(date(2026, 1, 1));
        assert_eq!(m.carry_over(today()), AddOn::default());
    }

    // Ledger

    #[test]
    fn plus_add_on_leaves_expire_date_alone() {
        let m = standard_member(date(2027, 1, 1));
        let before = m.expire_date;
        let m = m.plus_add_on(AddOn::new(31, 0));
        assert_eq!(m.expire_date, before);
        assert_eq!(m.addon, AddOn::new(31, 0));
    }

    // Claims

    #[test]
    fn claim_requires_expired_membership() {
        let m = standard_member(date(2027, 1, 1)).plus_add_on(AddOn::new(31, 0));
        let err = m.claim_add_on(today()).unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidClaim(_)));
    }

    #[test]
    fn claim_requires_banked_days() {
        let m = standard_member(date(2026, 1, 1));
        let err = m.claim_add_on(today()).unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidClaim(_)));
    }

    #[test]
    fn claim_on_zero_membership_is_misuse() {
        let err = Membership::default().claim_add_on(today()).unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidClaim(_)));
    }

    #[test]
    fn claim_consumes_premium_days_first() {
        let m = standard_member(date(2026, 1, 1)).plus_add_on(AddOn::new(31, 366));
        let claim = m.claim_add_on(today()).unwrap();
        assert_eq!(claim.tier, Tier::Premium);
        assert_eq!(claim.days, 366);
        assert_eq!(claim.membership.tier(), Some(Tier::Premium));
        assert_eq!(
            claim.membership.expire_date,
            Some(today() + chrono::Days::new(366))
        );
        // Standard days stay banked for a later claim.
        assert_eq!(claim.membership.addon, AddOn::new(31, 0));
    }

    #[test]
    fn claim_clears_foreign_subscription_ids() {
        let mut m = standard_member(date(2026, 1, 1));
        m.payment_method = Some(PaymentMethod::Stripe);
        m.status = Some(SubsStatus::Canceled);
        m.stripe_subs_id = Some("sub_1".into());
        let m = m.plus_add_on(AddOn::new(31, 0));

        let claim = m.claim_add_on(today()).unwrap();
        assert_eq!(claim.membership.stripe_subs_id, None);
        assert_eq!(claim.membership.status, None);
        assert!(!claim.membership.auto_renewal);
        // The claimed period is one-time entitlement, not a ghost of the
        // lapsed subscription.
        assert_eq!(claim.membership.payment_method, Some(PaymentMethod::Alipay));
        assert!(!claim.membership.is_invalid_stripe());
    }

    #[test]
    fn claim_preserves_the_one_time_channel() {
        let mut m = standard_member(date(2026, 1, 1));
        m.payment_method = Some(PaymentMethod::Wechat);
        let claim = m.plus_add_on(AddOn::new(31, 0)).claim_add_on(today()).unwrap();
        assert_eq!(claim.membership.payment_method, Some(PaymentMethod::Wechat));
    }

    #[test]
    fn claimed_membership_goes_back_through_the_purchase_matrix() {
        use crate::domain::order::{decide_kind, ForbiddenPurchase};

        let mut m = standard_member(date(2026, 1, 1));
        m.payment_method = Some(PaymentMethod::Stripe);
        m.status = Some(SubsStatus::Canceled);
        m.stripe_subs_id = Some("sub_1".into());
        let m = m.plus_add_on(AddOn::new(0, 1300));

        let claim = m.claim_add_on(today()).unwrap();
        assert_eq!(claim.days, 1300);

        // With ~3.5 years of claimed time, a same-tier purchase must hit
        // the renewal-window rule instead of starting a fresh membership.
        let kind = decide_kind(
            &claim.membership,
            Edition::premium_year(),
            PaymentMethod::Alipay,
            today(),
        );
        assert_eq!(kind, Err(ForbiddenPurchase::RenewalWindow));
    }

    // Modification check

    #[test]
    fn identical_memberships_are_not_modified() {
        let a = standard_member(date(2027, 1, 1));
        let b = a.clone();
        assert!(!a.is_modified(&b));
    }

    #[test]
    fn changed_expire_date_counts_as_modified() {
        let a = standard_member(date(2027, 1, 1));
        let b = standard_member(date(2027, 2, 1));
        assert!(a.is_modified(&b));
    }
}
