//! Converting banked add-on days into a fresh active period.
//!
//! Valid only once the membership has lapsed; a live membership keeps
//! its days banked. Premium days are claimed before standard days, and
//! the untouched tier's balance stays on the ledger for a later claim.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::foundation::{today_utc, MemberId, ReconcileError};
use crate::domain::membership::{
    ArchiveAction, ArchiveSource, Archiver, MemberSnapshot, Membership, Tier,
};
use crate::ports::ReconciliationStore;

/// What one claim produced.
#[derive(Debug, Clone)]
pub struct ClaimOutcome {
    pub membership: Membership,
    pub snapshot: MemberSnapshot,
    /// Which tier's days were converted.
    pub tier: Tier,
    pub days: i64,
}

pub struct ClaimAddOnHandler {
    store: Arc<dyn ReconciliationStore>,
}

impl ClaimAddOnHandler {
    pub fn new(store: Arc<dyn ReconciliationStore>) -> Self {
        Self { store }
    }

    /// Claims the member's banked days into active membership time.
    pub async fn claim(&self, member_id: &MemberId) -> Result<ClaimOutcome, ReconcileError> {
        let today = today_utc();
        let mut txn = self.store.begin().await?;

        let result: Result<ClaimOutcome, ReconcileError> = async {
            let current = txn.lock_membership(member_id).await?;
            let claim = current.clone().claim_add_on(today)?;

            // Mark the backing invoices of the claimed tier consumed so
            // the books match the ledger.
            let invoices = txn.lock_addon_invoices(member_id).await?;
            for invoice in invoices.iter().filter(|i| i.tier == claim.tier) {
                txn.flag_invoice_consumed(&invoice.id).await?;
            }

            // The claim converts one-time entitlement, so the audit row is
            // tagged with the one-time channel even when a subscription
            // lapsed in between.
            let source = claim
                .membership
                .payment_method
                .map(ArchiveSource::from)
                .unwrap_or(ArchiveSource::Manual);
            let snapshot =
                MemberSnapshot::of(&current, Archiver::new(source, ArchiveAction::Claim));

            txn.upsert_membership(&claim.membership).await?;
            txn.insert_snapshot(&snapshot).await?;

            Ok(ClaimOutcome {
                membership: claim.membership,
                snapshot,
                tier: claim.tier,
                days: claim.days,
            })
        }
        .await;

        match result {
            Ok(outcome) => {
                txn.commit().await?;
                info!(
                    member = ?member_id.compound_id(),
                    tier = %outcome.tier,
                    days = outcome.days,
                    "add-on days claimed"
                );
                Ok(outcome)
            }
            Err(err) => {
                txn.rollback().await?;
                if !err.retryable() {
                    warn!(member = ?member_id.compound_id(), error = %err, "add-on claim rejected");
                }
                Err(err)
            }
        }
    }
}
