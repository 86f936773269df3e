//! Add-on invoices: the backing records of the day ledger.
//!
//! One row per deferral event. Append-only; the `consumed` mark is
//! flipped exactly once, when the invoice's value is folded into a
//! membership by an upgrade or an add-on claim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{InvoiceId, MemberId, OrderId};
use crate::domain::membership::{AddOn, Tier};

/// Why the days were banked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceSource {
    /// A confirmed order whose time could not extend the membership.
    Purchase,
    /// Remaining one-time days preserved when Stripe took over.
    CarryOver,
}

/// A single deferral of purchased time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOnInvoice {
    pub id: InvoiceId,
    pub member_id: MemberId,
    /// The order that funded the days; absent for carry-overs.
    pub order_id: Option<OrderId>,
    pub source: InvoiceSource,
    pub tier: Tier,
    pub days: i64,
    pub created_at: DateTime<Utc>,
    /// When the value was folded into a membership. Set at most once.
    pub consumed_at: Option<DateTime<Utc>>,
    /// The order or claim that consumed the invoice.
    pub consumed_by: Option<OrderId>,
}

impl AddOnInvoice {
    /// An invoice for a confirmed purchase whose days defer.
    pub fn from_purchase(member_id: MemberId, order_id: OrderId, tier: Tier, days: i64) -> Self {
        Self {
            id: InvoiceId::new(),
            member_id,
            order_id: Some(order_id),
            source: InvoiceSource::Purchase,
            tier,
            days,
            created_at: Utc::now(),
            consumed_at: None,
            consumed_by: None,
        }
    }

    /// An invoice for one-time days preserved during a channel takeover.
    pub fn carry_over(member_id: MemberId, tier: Tier, days: i64) -> Self {
        Self {
            id: InvoiceId::new(),
            member_id,
            order_id: None,
            source: InvoiceSource::CarryOver,
            tier,
            days,
            created_at: Utc::now(),
            consumed_at: None,
            consumed_by: None,
        }
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }

    /// The ledger entry this invoice contributes.
    pub fn to_add_on(&self) -> AddOn {
        AddOn::for_tier(self.tier, self.days)
    }
}
