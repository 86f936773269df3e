//! Stripe webhook reconciliation.
//!
//! Stripe delivers subscription events at-least-once and out of order.
//! The handler resolves who the subscription belongs to, decides via the
//! pure takeover/refresh rules whether the FTC-side membership may be
//! overwritten, and suppresses writes (and their audit rows) for
//! deliveries that change nothing.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::foundation::{today_utc, ReconcileError};
use crate::domain::membership::{
    ArchiveAction, ArchiveSource, Archiver, MemberSnapshot, Membership,
};
use crate::domain::order::AddOnInvoice;
use crate::domain::stripe::{decide_takeover, refresh, StripeSubs, Takeover};
use crate::ports::{AccountReader, FtcAccount, ReconTxn, ReconciliationStore};

/// What one webhook delivery did to the membership.
#[derive(Debug, Clone)]
pub struct WebhookOutcome {
    pub membership: Membership,
    /// Pre-mutation audit row, absent for no-ops and first-time creates.
    pub snapshot: Option<MemberSnapshot>,
    /// False for a duplicate or stale delivery that changed nothing.
    pub modified: bool,
    /// The carry-over invoice banked when Stripe took over a live
    /// one-time membership.
    pub carried_over: Option<AddOnInvoice>,
}

pub struct StripeWebhookHandler {
    store: Arc<dyn ReconciliationStore>,
    accounts: Arc<dyn AccountReader>,
}

impl StripeWebhookHandler {
    pub fn new(store: Arc<dyn ReconciliationStore>, accounts: Arc<dyn AccountReader>) -> Self {
        Self { store, accounts }
    }

    /// Reconciles a subscription payload, resolving the account through
    /// its Stripe customer id.
    pub async fn reconcile_subs(&self, subs: &StripeSubs) -> Result<WebhookOutcome, ReconcileError> {
        let account = self
            .accounts
            .find_by_stripe_customer(&subs.customer_id)
            .await?
            .ok_or_else(|| {
                ReconcileError::Integrity(format!(
                    "no account for stripe customer {}",
                    subs.customer_id
                ))
            })?;
        self.reconcile(&account, subs).await
    }

    /// Reconciles a subscription payload for a resolved account.
    pub async fn reconcile(
        &self,
        account: &FtcAccount,
        subs: &StripeSubs,
    ) -> Result<WebhookOutcome, ReconcileError> {
        let mut txn = self.store.begin().await?;
        match reconcile_within(txn.as_mut(), account, subs, today_utc()).await {
            Ok(outcome) => {
                txn.commit().await?;
                if outcome.modified {
                    info!(subs = %subs.id, "membership reconciled from webhook");
                } else {
                    info!(subs = %subs.id, "stale or duplicate delivery; no-op");
                }
                Ok(outcome)
            }
            Err(err) => {
                txn.rollback().await?;
                if err.needs_review() {
                    warn!(subs = %subs.id, error = %err, "webhook reconciliation refused");
                    if let Err(log_err) = self.store.log_error(&subs.id, &err.to_string()).await {
                        warn!(error = %log_err, "failed to record reconciliation error");
                    }
                }
                Err(err)
            }
        }
    }
}

async fn reconcile_within(
    txn: &mut dyn ReconTxn,
    account: &FtcAccount,
    subs: &StripeSubs,
    today: chrono::NaiveDate,
) -> Result<WebhookOutcome, ReconcileError> {
    let member_id = account.member_id();

    // Already ours: just refresh the period and status.
    if let Some(existing) = txn.lock_membership_by_stripe_subs(&subs.id).await? {
        if !existing.id.same_account(&member_id) {
            return Err(ReconcileError::Integrity(format!(
                "stripe subscription {} belongs to {}, not {}",
                subs.id,
                existing.id,
                member_id
            )));
        }
        let refreshed = refresh(&existing, subs);
        if !refreshed.modified {
            return Ok(WebhookOutcome {
                membership: existing,
                snapshot: None,
                modified: false,
                carried_over: None,
            });
        }
        let snapshot = MemberSnapshot::of(
            &existing,
            Archiver::new(ArchiveSource::Stripe, ArchiveAction::Webhook),
        );
        txn.upsert_membership(&refreshed.membership).await?;
        txn.insert_snapshot(&snapshot).await?;
        return Ok(WebhookOutcome {
            membership: refreshed.membership,
            snapshot: Some(snapshot),
            modified: true,
            carried_over: None,
        });
    }

    // Not tied to this subscription yet: the takeover rules decide.
    let ftc_side = txn.lock_membership(&member_id).await?;
    let takeover = decide_takeover(&ftc_side, subs, today)?;

    let (addon, carried_over) = match takeover {
        Takeover::Fresh => (ftc_side.addon, None),
        Takeover::CarryOver => {
            let carry = ftc_side.carry_over(today);
            let invoice = ftc_side.tier().and_then(|tier| {
                let days = ftc_side.remaining_days(today);
                (days > 0).then(|| AddOnInvoice::carry_over(member_id.clone(), tier, days))
            });
            if let Some(invoice) = &invoice {
                txn.insert_invoice(invoice).await?;
                // The remaining value of the funding orders now lives on
                // the ledger; retire them so they cannot also fund an
                // upgrade wallet later.
                let sources = txn.lock_balance_sources(&member_id).await?;
                let banked: Vec<_> = sources.into_iter().map(|s| s.order_id).collect();
                if !banked.is_empty() {
                    txn.flag_sources_consumed(&banked, &subs.id).await?;
                }
            }
            (ftc_side.addon.plus(carry), invoice)
        }
    };

    let snapshot = if ftc_side.is_zero() {
        None
    } else {
        let action = match takeover {
            Takeover::Fresh => ArchiveAction::Webhook,
            Takeover::CarryOver => ArchiveAction::CarryOver,
        };
        let snapshot =
            MemberSnapshot::of(&ftc_side, Archiver::new(ArchiveSource::Stripe, action));
        txn.insert_snapshot(&snapshot).await?;
        Some(snapshot)
    };

    let membership = subs.membership(member_id, addon);
    txn.upsert_membership(&membership).await?;

    Ok(WebhookOutcome {
        membership,
        snapshot,
        modified: true,
        carried_over,
    })
}
