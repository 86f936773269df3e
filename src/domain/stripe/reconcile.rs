//! Pure decisions of the Stripe webhook reconciler.
//!
//! Stripe delivers webhooks at-least-once and out of order, so inbound
//! subscription data may only overwrite the FTC-side membership in the
//! safe cases decided here. The stateful part (locking, persistence)
//! lives in the application layer.

use chrono::NaiveDate;

use crate::domain::foundation::ReconcileError;
use crate::domain::membership::Membership;

use super::StripeSubs;

/// How an incoming subscription may take over a membership that is not
/// yet tied to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Takeover {
    /// FTC side is empty or lapsed: create or overwrite freely.
    Fresh,
    /// FTC side is a live one-time membership: bank its remaining days
    /// as a carry-over invoice, then let Stripe become authoritative.
    CarryOver,
}

/// Decides whether `subs` may take over the membership currently held on
/// the FTC side.
///
/// Refusals are integrity errors: they must not be retried automatically
/// and are persisted for manual review.
pub fn decide_takeover(
    ftc_side: &Membership,
    subs: &StripeSubs,
    today: NaiveDate,
) -> Result<Takeover, ReconcileError> {
    if ftc_side.is_zero() || ftc_side.is_expired_on(today) {
        return Ok(Takeover::Fresh);
    }
    if ftc_side.is_one_time() {
        if subs.is_expired(today) {
            // An expired subscription must not revive over a valid
            // one-time membership.
            return Err(ReconcileError::Integrity(format!(
                "expired stripe subscription {} cannot overwrite a valid one-time membership",
                subs.id
            )));
        }
        return Ok(Takeover::CarryOver);
    }
    Err(ReconcileError::Integrity(format!(
        "membership already backed by {}; refusing cross-source overwrite by stripe subscription {}",
        ftc_side
            .payment_method
            .map(|m| m.as_str())
            .unwrap_or("an unknown source"),
        subs.id
    )))
}

/// Outcome of refreshing a membership already tied to a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub membership: Membership,
    /// False for a duplicate/stale delivery that changed nothing; the
    /// caller must then skip the write and emit no audit row.
    pub modified: bool,
}

/// Refreshes `existing` from the subscription payload, preserving the
/// add-on ledger untouched.
pub fn refresh(existing: &Membership, subs: &StripeSubs) -> RefreshOutcome {
    let refreshed = subs.membership(existing.id.clone(), existing.addon);
    let modified = existing.is_modified(&refreshed);
    RefreshOutcome {
        membership: refreshed,
        modified,
    }
}
