//! The Order entity: one purchase attempt via Alipay or WeChat.
//!
//! An order is created at checkout time and mutated exactly once, by the
//! confirmation protocol, which stamps `confirmed_at` and the membership
//! period it grants.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Cents, MemberId, OrderId, ReconcileError};
use crate::domain::membership::{AddOn, Edition, MemberSnapshot, Membership, PaymentMethod};

use super::{AddOnInvoice, BalanceSource, OrderKind, PaymentResult};

/// A single purchase attempt.
///
/// # Invariants
///
/// - `confirmed_at`, `start_date`, and `end_date` are set together,
///   exactly once.
/// - `kind` is recomputed at confirmation time; the checkout-time value
///   is provisional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub member_id: MemberId,
    pub edition: Edition,
    pub kind: OrderKind,
    pub payment_method: PaymentMethod,
    /// Catalog price before wallet credit.
    pub original_price: Cents,
    /// What the user actually owes.
    pub payable: Cents,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    /// First day of the granted period. `None` until confirmation.
    pub start_date: Option<NaiveDate>,
    /// Day the granted period lapses. `None` until confirmation.
    pub end_date: Option<NaiveDate>,
}

impl Order {
    /// A checkout-time order at full catalog price.
    pub fn new(
        member_id: MemberId,
        edition: Edition,
        kind: OrderKind,
        method: PaymentMethod,
        price: Cents,
    ) -> Self {
        Self {
            id: OrderId::generate(),
            member_id,
            edition,
            kind,
            payment_method: method,
            original_price: price,
            payable: price,
            created_at: Utc::now(),
            confirmed_at: None,
            start_date: None,
            end_date: None,
        }
    }

    /// A checkout-time order with wallet credit already deducted.
    pub fn with_wallet_credit(mut self, payable: Cents) -> Self {
        self.payable = payable;
        self
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed_at.is_some()
    }

    /// Day count this order is worth in the wallet and the ledger.
    pub fn total_days(&self) -> i64 {
        self.edition.cycle.total_days()
    }

    /// Stamps the confirmation timestamp and the granted period.
    ///
    /// For Create/Renew/Upgrade the period starts at
    /// `max(today, current expire)` so a renewal never eats remaining
    /// time. An add-on period is purely descriptive (it starts today);
    /// the membership's expire date is not touched by it.
    pub fn confirm(
        &mut self,
        payment: &PaymentResult,
        current_expire: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<(), ReconcileError> {
        if self.is_confirmed() {
            return Err(ReconcileError::Integrity(format!(
                "order {} is already confirmed",
                self.id
            )));
        }
        let start = match self.kind {
            OrderKind::AddOn => today,
            _ => current_expire.map_or(today, |expire| expire.max(today)),
        };
        self.confirmed_at = Some(payment.confirmed_at);
        self.start_date = Some(start);
        self.end_date = Some(self.edition.cycle.period_end(start));
        Ok(())
    }

    /// The ledger entry an add-on order contributes.
    pub fn to_add_on(&self) -> AddOn {
        AddOn::for_tier(self.edition.tier, self.total_days())
    }

    /// Computes the membership state after this (confirmed) order.
    ///
    /// Create/Renew/Upgrade replace the visible membership; AddOn leaves
    /// it untouched except for the ledger. The ledger itself always
    /// survives the mutation.
    pub fn new_membership(&self, current: &Membership) -> Result<Membership, ReconcileError> {
        let end = self.end_date.ok_or_else(|| {
            ReconcileError::Integrity(format!("order {} has no confirmed period", self.id))
        })?;
        match self.kind {
            OrderKind::AddOn => Ok(current.clone().plus_add_on(self.to_add_on())),
            _ => Ok(Membership {
                id: self.member_id.clone(),
                edition: Some(self.edition),
                expire_date: Some(end),
                payment_method: Some(self.payment_method),
                stripe_subs_id: None,
                apple_subs_id: None,
                b2b_licence_id: None,
                auto_renewal: false,
                status: None,
                addon: current.addon,
            }),
        }
    }

    /// This order's unused-value view, if its period is stamped.
    ///
    /// Only confirmed one-time orders with a live period can fund an
    /// upgrade wallet.
    pub fn to_balance_source(&self) -> Option<BalanceSource> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) if self.payment_method.is_one_time() => {
                Some(BalanceSource {
                    order_id: self.id.clone(),
                    tier: self.edition.tier,
                    payable: self.payable,
                    start_date: start,
                    end_date: end,
                })
            }
            _ => None,
        }
    }
}

/// Everything one confirmation produced, handed back to the caller.
///
/// `notify` tells the caller whether user-facing side effects (the
/// confirmation email) should fire; it is false for idempotent no-ops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationResult {
    pub order: Order,
    pub membership: Membership,
    pub snapshot: Option<MemberSnapshot>,
    pub invoice: Option<AddOnInvoice>,
    pub notify: bool,
}

impl ConfirmationResult {
    /// The result of re-delivering an already-settled confirmation:
    /// current state, no side effects.
    pub fn already_settled(order: Order, membership: Membership) -> Self {
        Self {
            order,
            membership,
            snapshot: None,
            invoice: None,
            notify: false,
        }
    }
}
