//! The order confirmation protocol.
//!
//! One verified payment result comes in, one transaction runs the
//! eight-step protocol, and the caller gets back everything the
//! confirmation produced. Redelivered notifications are absorbed by the
//! lock-then-check idempotency at the top of the protocol.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::domain::foundation::{today_utc, OrderId, ReconcileError};
use crate::domain::membership::{Archiver, MemberSnapshot};
use crate::domain::order::{
    decide_kind, AddOnInvoice, ConfirmationResult, OrderKind, PaymentResult, Wallet,
};
use crate::ports::{ReconTxn, ReconciliationStore, VerifierRegistry};

pub struct ConfirmOrderHandler {
    store: Arc<dyn ReconciliationStore>,
    verifiers: Arc<VerifierRegistry>,
}

impl ConfirmOrderHandler {
    pub fn new(store: Arc<dyn ReconciliationStore>) -> Self {
        Self {
            store,
            verifiers: Arc::new(VerifierRegistry::new()),
        }
    }

    pub fn with_verifiers(mut self, verifiers: Arc<VerifierRegistry>) -> Self {
        self.verifiers = verifiers;
        self
    }

    /// Queries the order's gateway for its settlement state, then runs
    /// the confirmation protocol on the result.
    ///
    /// The gateway round-trip runs outside the confirmation transaction;
    /// row locks are never held across network calls.
    pub async fn verify_and_confirm(
        &self,
        order_id: &OrderId,
    ) -> Result<ConfirmationResult, ReconcileError> {
        let mut txn = self.store.begin().await?;
        let order = txn
            .lock_order(order_id)
            .await?
            .ok_or_else(|| ReconcileError::OrderNotFound(order_id.to_string()))?;
        txn.rollback().await?;

        let verifier = self.verifiers.get(order.payment_method)?;
        let payment = verifier.verify_payment(&order).await?;
        self.confirm(order_id, &payment).await
    }

    /// Confirms one order against a verified payment result.
    ///
    /// Runs the whole protocol in a single transaction. Non-retryable
    /// failures are appended to the error log after the rollback so they
    /// survive for manual review.
    pub async fn confirm(
        &self,
        order_id: &OrderId,
        payment: &PaymentResult,
    ) -> Result<ConfirmationResult, ReconcileError> {
        let mut txn = self.store.begin().await?;
        match confirm_within(txn.as_mut(), order_id, payment, today_utc()).await {
            Ok(result) => {
                txn.commit().await?;
                if result.notify {
                    info!(order = %result.order.id, kind = %result.order.kind, "order confirmed");
                } else {
                    info!(order = %result.order.id, "order already settled; no-op");
                }
                Ok(result)
            }
            Err(err) => {
                txn.rollback().await?;
                if !err.retryable() {
                    warn!(order = %order_id, error = %err, "confirmation rejected");
                    if let Err(log_err) = self
                        .store
                        .log_error(order_id.as_str(), &err.to_string())
                        .await
                    {
                        warn!(error = %log_err, "failed to record confirmation error");
                    }
                }
                Err(err)
            }
        }
    }
}

/// The confirmation protocol proper, run inside an open transaction.
///
/// Shared with the upgrade checkout, which settles zero-amount orders on
/// the same transaction that created them. The caller owns commit and
/// rollback.
pub(crate) async fn confirm_within(
    txn: &mut dyn ReconTxn,
    order_id: &OrderId,
    payment: &PaymentResult,
    today: NaiveDate,
) -> Result<ConfirmationResult, ReconcileError> {
    let mut order = txn
        .lock_order(order_id)
        .await?
        .ok_or_else(|| ReconcileError::OrderNotFound(order_id.to_string()))?;
    let current = txn.lock_membership(&order.member_id).await?;

    // Redelivery of a settled confirmation is a success with no side
    // effects, never an error.
    if order.is_confirmed() {
        return Ok(ConfirmationResult::already_settled(order, current));
    }

    if !payment.is_paid() {
        return Err(ReconcileError::NotSettled(format!(
            "transaction {} for order {}",
            payment.transaction_id, order.id
        )));
    }
    if payment.amount != order.payable {
        return Err(ReconcileError::AmountMismatch {
            expected: order.payable,
            paid: payment.amount,
        });
    }

    // Calibration: the checkout-time kind may be stale by now; the
    // row-locked membership decides what this payment actually means.
    let kind = decide_kind(&current, order.edition, order.payment_method, today)?;
    if kind != order.kind {
        info!(order = %order.id, from = %order.kind, to = %kind, "order kind recalibrated");
        order.kind = kind;
    }

    order.confirm(payment, current.expire_date, today)?;
    let membership = order.new_membership(&current)?;

    // An upgrade priced with wallet credit spends its funding orders;
    // mark them consumed so their value can never be spent twice. An
    // upgrade at full catalog price spent nothing and leaves the wallet
    // alone.
    if order.kind == OrderKind::Upgrade && order.payable < order.original_price {
        let sources = txn.lock_balance_sources(&order.member_id).await?;
        let wallet = Wallet::from_sources(&sources, today);
        if !wallet.source_ids.is_empty() {
            txn.flag_sources_consumed(&wallet.source_ids, order.id.as_str())
                .await?;
        }
    }

    let snapshot = if current.is_zero() {
        None
    } else {
        let archiver = Archiver::new(order.payment_method.into(), order.kind.into());
        Some(MemberSnapshot::of(&current, archiver))
    };

    // Deferred time goes on the ledger's books as its backing record.
    let invoice = match order.kind {
        OrderKind::AddOn => Some(AddOnInvoice::from_purchase(
            order.member_id.clone(),
            order.id.clone(),
            order.edition.tier,
            order.total_days(),
        )),
        _ => None,
    };

    txn.stamp_order_confirmed(&order).await?;
    txn.upsert_membership(&membership).await?;
    if let Some(snapshot) = &snapshot {
        txn.insert_snapshot(snapshot).await?;
    }
    if let Some(invoice) = &invoice {
        txn.insert_invoice(invoice).await?;
    }

    Ok(ConfirmationResult {
        order,
        membership,
        snapshot,
        invoice,
        notify: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::memory_store::MemoryStore;
    use crate::domain::foundation::{today_utc, Cents, MemberId};
    use crate::domain::membership::{Edition, Membership, PaymentMethod, Tier};
    use crate::domain::order::{Order, PaymentState};
    use chrono::{Days, Utc};

    fn member() -> MemberId {
        MemberId::from_ftc("ftc-1")
    }

    fn paid(amount: Cents) -> PaymentResult {
        PaymentResult {
            amount,
            transaction_id: "4200000000001".into(),
            confirmed_at: Utc::now(),
            state: PaymentState::Paid,
        }
    }

    fn standard_year_order() -> Order {
        Order::new(
            member(),
            Edition::standard_year(),
            OrderKind::Create,
            PaymentMethod::Alipay,
            Cents::from_major(258),
        )
    }

    fn handler(store: &Arc<MemoryStore>) -> ConfirmOrderHandler {
        ConfirmOrderHandler::new(Arc::clone(store) as Arc<dyn ReconciliationStore>)
    }

    #[tokio::test]
    async fn first_purchase_creates_the_membership() {
        let store = Arc::new(MemoryStore::new());
        let order = standard_year_order();
        store.seed_order(order.clone());

        let result = handler(&store)
            .confirm(&order.id, &paid(order.payable))
            .await
            .unwrap();

        assert!(result.notify);
        assert_eq!(result.order.kind, OrderKind::Create);
        assert_eq!(
            result.membership.expire_date,
            Some(Edition::standard_year().cycle.period_end(today_utc()))
        );
        // No pre-existing state, so no audit row.
        assert!(result.snapshot.is_none());
        assert_eq!(store.snapshot_count(), 0);

        let state = store.state();
        let stored = &state.orders[order.id.as_str()];
        assert!(stored.is_confirmed());
        assert!(state.memberships.contains_key("ftc-1"));
    }

    #[tokio::test]
    async fn second_delivery_is_a_silent_no_op() {
        let store = Arc::new(MemoryStore::new());
        let order = standard_year_order();
        store.seed_order(order.clone());
        let handler = handler(&store);

        let first = handler.confirm(&order.id, &paid(order.payable)).await.unwrap();
        let second = handler.confirm(&order.id, &paid(order.payable)).await.unwrap();

        assert!(first.notify);
        assert!(!second.notify);
        assert_eq!(second.membership, first.membership);
        assert_eq!(store.snapshot_count(), 0);
    }

    #[tokio::test]
    async fn amount_mismatch_is_rejected_and_logged() {
        let store = Arc::new(MemoryStore::new());
        let order = standard_year_order();
        store.seed_order(order.clone());

        let err = handler(&store)
            .confirm(&order.id, &paid(Cents::from_major(1)))
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::AmountMismatch { .. }));
        let state = store.state();
        assert!(!state.orders[order.id.as_str()].is_confirmed());
        assert!(!state.memberships.contains_key("ftc-1"));
        // The rejection survives the rollback for manual review.
        assert_eq!(state.errors.len(), 1);
        assert_eq!(state.errors[0].0, order.id.to_string());
    }

    #[tokio::test]
    async fn unknown_order_is_fatal() {
        let store = Arc::new(MemoryStore::new());
        let err = handler(&store)
            .confirm(&OrderId::from_string("FT404"), &paid(Cents::from_major(258)))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::OrderNotFound(_)));
    }

    #[tokio::test]
    async fn unsettled_payment_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let order = standard_year_order();
        store.seed_order(order.clone());

        let mut payment = paid(order.payable);
        payment.state = PaymentState::Pending;
        let err = handler(&store).confirm(&order.id, &payment).await.unwrap_err();
        assert!(matches!(err, ReconcileError::NotSettled(_)));
    }

    #[tokio::test]
    async fn renewal_extends_from_current_expire_and_snapshots() {
        let store = Arc::new(MemoryStore::new());
        let expire = today_utc() + Days::new(100);
        store.seed_membership(Membership::one_time(
            member(),
            Edition::standard_year(),
            expire,
            PaymentMethod::Alipay,
        ));
        let order = standard_year_order();
        store.seed_order(order.clone());

        let result = handler(&store)
            .confirm(&order.id, &paid(order.payable))
            .await
            .unwrap();

        // Calibrated from the provisional Create to a renewal.
        assert_eq!(result.order.kind, OrderKind::Renew);
        assert_eq!(
            result.membership.expire_date,
            Some(Edition::standard_year().cycle.period_end(expire))
        );
        let snapshot = result.snapshot.unwrap();
        assert_eq!(snapshot.archiver.to_string(), "alipay.renew");
        assert_eq!(snapshot.membership.expire_date, Some(expire));
        assert_eq!(store.snapshot_count(), 1);
    }

    #[tokio::test]
    async fn premium_buying_standard_defers_to_the_ledger() {
        let store = Arc::new(MemoryStore::new());
        let expire = today_utc() + Days::new(200);
        store.seed_membership(Membership::one_time(
            member(),
            Edition::premium_year(),
            expire,
            PaymentMethod::Wechat,
        ));
        let order = standard_year_order();
        store.seed_order(order.clone());

        let result = handler(&store)
            .confirm(&order.id, &paid(order.payable))
            .await
            .unwrap();

        assert_eq!(result.order.kind, OrderKind::AddOn);
        // Visible membership is untouched; the days are banked.
        assert_eq!(result.membership.edition, Some(Edition::premium_year()));
        assert_eq!(result.membership.expire_date, Some(expire));
        assert_eq!(result.membership.addon.standard_days, 366);

        let invoice = result.invoice.unwrap();
        assert_eq!(invoice.tier, Tier::Standard);
        assert_eq!(invoice.days, 366);
        assert_eq!(store.invoice_count(), 1);
    }

    #[tokio::test]
    async fn paid_upgrade_consumes_the_wallet_sources() {
        let store = Arc::new(MemoryStore::new());
        let today = today_utc();
        store.seed_membership(Membership::one_time(
            member(),
            Edition::standard_year(),
            today + Days::new(200),
            PaymentMethod::Alipay,
        ));

        // The standard-year order funding the wallet.
        let mut funding = standard_year_order();
        funding
            .confirm(&paid(funding.payable), None, today - Days::new(165))
            .unwrap();
        store.seed_order(funding.clone());
        store.seed_source(&member(), funding.to_balance_source().unwrap());

        let order = Order::new(
            member(),
            Edition::premium_year(),
            OrderKind::Upgrade,
            PaymentMethod::Alipay,
            Cents::from_major(1998),
        )
        .with_wallet_credit(Cents::new(185333));
        store.seed_order(order.clone());

        let result = handler(&store)
            .confirm(&order.id, &paid(Cents::new(185333)))
            .await
            .unwrap();

        assert_eq!(result.order.kind, OrderKind::Upgrade);
        assert_eq!(result.membership.edition, Some(Edition::premium_year()));

        let state = store.state();
        let row = state
            .sources
            .iter()
            .find(|r| r.source.order_id == funding.id)
            .unwrap();
        assert_eq!(row.consumed_by, Some(order.id.to_string()));
    }

    #[tokio::test]
    async fn full_price_upgrade_leaves_the_wallet_alone() {
        let store = Arc::new(MemoryStore::new());
        let today = today_utc();
        store.seed_membership(Membership::one_time(
            member(),
            Edition::standard_year(),
            today + Days::new(200),
            PaymentMethod::Alipay,
        ));

        let mut funding = standard_year_order();
        funding
            .confirm(&paid(funding.payable), None, today - Days::new(165))
            .unwrap();
        store.seed_order(funding.clone());
        store.seed_source(&member(), funding.to_balance_source().unwrap());

        // Checked out as Create at full catalog price; the calibration
        // turns it into an Upgrade, but no wallet credit was granted.
        let order = Order::new(
            member(),
            Edition::premium_year(),
            OrderKind::Create,
            PaymentMethod::Alipay,
            Cents::from_major(1998),
        );
        store.seed_order(order.clone());

        let result = handler(&store)
            .confirm(&order.id, &paid(Cents::from_major(1998)))
            .await
            .unwrap();

        assert_eq!(result.order.kind, OrderKind::Upgrade);
        // Nothing was spent from the wallet, so nothing is retired.
        let state = store.state();
        assert!(state.sources.iter().all(|row| row.consumed_by.is_none()));
    }

    #[tokio::test]
    async fn verify_and_confirm_dispatches_to_the_gateway_verifier() {
        use crate::ports::PaymentVerifier;

        struct SettledVerifier;

        #[async_trait::async_trait]
        impl PaymentVerifier for SettledVerifier {
            fn method(&self) -> PaymentMethod {
                PaymentMethod::Alipay
            }

            async fn verify_payment(
                &self,
                order: &Order,
            ) -> Result<PaymentResult, ReconcileError> {
                Ok(paid(order.payable))
            }
        }

        let store = Arc::new(MemoryStore::new());
        let order = standard_year_order();
        store.seed_order(order.clone());

        let registry = VerifierRegistry::new().register(Arc::new(SettledVerifier));
        let handler = ConfirmOrderHandler::new(Arc::clone(&store) as Arc<dyn ReconciliationStore>)
            .with_verifiers(Arc::new(registry));

        let result = handler.verify_and_confirm(&order.id).await.unwrap();
        assert!(result.notify);
        assert!(store.state().orders[order.id.as_str()].is_confirmed());

        // An order on a channel with no registered verifier is refused.
        let wechat = Order::new(
            member(),
            Edition::standard_year(),
            OrderKind::Create,
            PaymentMethod::Wechat,
            Cents::from_major(258),
        );
        store.seed_order(wechat.clone());
        let err = handler.verify_and_confirm(&wechat.id).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Forbidden(_)));
    }

    #[tokio::test]
    async fn commit_failure_is_retryable_and_not_logged() {
        let store = Arc::new(MemoryStore::new());
        let order = standard_year_order();
        store.seed_order(order.clone());
        store.poison_next_commit();

        let err = handler(&store)
            .confirm(&order.id, &paid(order.payable))
            .await
            .unwrap_err();

        assert!(err.retryable());
        let state = store.state();
        assert!(!state.orders[order.id.as_str()].is_confirmed());
        assert!(state.errors.is_empty());
    }
}
