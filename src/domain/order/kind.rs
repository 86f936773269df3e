//! The order-kind decision matrix.
//!
//! Classifies a one-time purchase attempt against the member's current
//! state. The same function runs twice in an order's life: once at
//! checkout to price the attempt, and again at confirmation time
//! ("calibration") against the row-locked membership, because a
//! concurrent purchase can make the checkout-time kind stale by the time
//! the payment clears.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::foundation::within_renewal_window;
use crate::domain::membership::{ArchiveAction, Edition, Membership, PaymentMethod, Tier};
use chrono::NaiveDate;

/// The classified purpose of a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    Create,
    Renew,
    Upgrade,
    Downgrade,
    AddOn,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Create => "create",
            OrderKind::Renew => "renew",
            OrderKind::Upgrade => "upgrade",
            OrderKind::Downgrade => "downgrade",
            OrderKind::AddOn => "addon",
        }
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<OrderKind> for ArchiveAction {
    fn from(kind: OrderKind) -> Self {
        match kind {
            OrderKind::Create => ArchiveAction::Create,
            OrderKind::Renew => ArchiveAction::Renew,
            OrderKind::Upgrade => ArchiveAction::Upgrade,
            OrderKind::Downgrade => ArchiveAction::Downgrade,
            OrderKind::AddOn => ArchiveAction::AddOn,
        }
    }
}

impl FromStr for OrderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(OrderKind::Create),
            "renew" => Ok(OrderKind::Renew),
            "upgrade" => Ok(OrderKind::Upgrade),
            "downgrade" => Ok(OrderKind::Downgrade),
            "addon" => Ok(OrderKind::AddOn),
            other => Err(format!("unknown order kind: {}", other)),
        }
    }
}

/// Why the matrix refused a purchase. Non-retryable; surfaced to the
/// user as a rejected request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForbiddenPurchase {
    #[error("exceeds the maximum three-year renewal window")]
    RenewalWindow,

    #[error("upgrade must be performed on the native {0} channel")]
    NativeChannelOnly(PaymentMethod),

    #[error("unknown payment method combination")]
    UnknownMethod,
}

/// Decides what a purchase of `edition` via `method` means for the
/// member currently holding `current`.
///
/// Total over its whole input space: every combination yields exactly
/// one kind or a [`ForbiddenPurchase`], never a panic.
pub fn decide_kind(
    current: &Membership,
    edition: Edition,
    method: PaymentMethod,
    today: NaiveDate,
) -> Result<OrderKind, ForbiddenPurchase> {
    // The matrix only classifies one-time purchases; subscription
    // channels manage their own lifecycle.
    if !method.is_one_time() {
        return Err(ForbiddenPurchase::UnknownMethod);
    }

    // No membership, a lapsed one, or a dead Stripe subscription: the
    // purchase starts fresh.
    if current.is_zero() || current.is_expired_on(today) || current.is_invalid_stripe() {
        return Ok(OrderKind::Create);
    }

    let current_tier = match current.tier() {
        Some(tier) => tier,
        // A live membership without a tier is corrupt data.
        None => return Err(ForbiddenPurchase::UnknownMethod),
    };

    match current.payment_method {
        Some(m) if m.is_one_time() => match (current_tier, edition.tier) {
            (a, b) if a == b => {
                let expire = current.expire_date.unwrap_or(today);
                if within_renewal_window(expire, today) {
                    Ok(OrderKind::Renew)
                } else {
                    Err(ForbiddenPurchase::RenewalWindow)
                }
            }
            (Tier::Standard, Tier::Premium) => Ok(OrderKind::Upgrade),
            // A one-time purchase cannot downgrade a live one-time
            // subscription in place; the time is banked instead.
            (Tier::Premium, Tier::Standard) => Ok(OrderKind::AddOn),
            _ => Err(ForbiddenPurchase::UnknownMethod),
        },
        Some(PaymentMethod::Stripe) => match (current_tier, edition.tier) {
            // Any one-time purchase on top of a live Stripe subscription
            // defers to the ledger, except a genuine tier upgrade.
            (a, b) if a == b => Ok(OrderKind::AddOn),
            (Tier::Standard, Tier::Premium) => Ok(OrderKind::Upgrade),
            (Tier::Premium, Tier::Standard) => Ok(OrderKind::AddOn),
            _ => Err(ForbiddenPurchase::UnknownMethod),
        },
        Some(method @ (PaymentMethod::Apple | PaymentMethod::B2b)) => {
            match (current_tier, edition.tier) {
                // The channel cannot express an in-place upgrade; direct
                // the user to the native channel.
                (Tier::Standard, Tier::Premium) => {
                    Err(ForbiddenPurchase::NativeChannelOnly(method))
                }
                _ => Ok(OrderKind::AddOn),
            }
        }
        _ => Err(ForbiddenPurchase::UnknownMethod),
    }
}
