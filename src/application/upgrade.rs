//! Upgrade checkout: standard to premium, funded by the wallet.
//!
//! The member's unused standard time is prorated into credit and
//! deducted from the premium price. When the credit covers the whole
//! price, no payment round trip makes sense; the handler synthesizes a
//! settled zero-amount payment and runs the confirmation protocol on the
//! same transaction that created the order.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::foundation::{today_utc, MemberId, ReconcileError};
use crate::domain::membership::PaymentMethod;
use crate::domain::order::{
    decide_kind, ConfirmationResult, Order, OrderKind, PaymentResult, Wallet,
};
use crate::domain::price::Price;
use crate::ports::ReconciliationStore;

use super::confirm_order::confirm_within;

/// What one upgrade checkout produced.
#[derive(Debug, Clone)]
pub struct UpgradeCheckout {
    pub order: Order,
    /// The credit computed at checkout time, for display.
    pub wallet: Wallet,
    /// Present when the wallet covered the full price and the order was
    /// settled on the spot.
    pub confirmation: Option<ConfirmationResult>,
}

impl UpgradeCheckout {
    pub fn is_free(&self) -> bool {
        self.confirmation.is_some()
    }
}

pub struct UpgradeCheckoutHandler {
    store: Arc<dyn ReconciliationStore>,
}

impl UpgradeCheckoutHandler {
    pub fn new(store: Arc<dyn ReconciliationStore>) -> Self {
        Self { store }
    }

    /// Prices an upgrade and creates its order.
    ///
    /// The membership is locked for the whole checkout so the wallet's
    /// funding set cannot change under it.
    pub async fn checkout(
        &self,
        member_id: &MemberId,
        price: &Price,
        method: PaymentMethod,
    ) -> Result<UpgradeCheckout, ReconcileError> {
        let today = today_utc();
        let mut txn = self.store.begin().await?;

        let result = async {
            let current = txn.lock_membership(member_id).await?;
            let kind = decide_kind(&current, price.edition, method, today)?;
            if kind != OrderKind::Upgrade {
                return Err(ReconcileError::Ineligible(format!(
                    "a {} purchase of {} is not an upgrade",
                    kind, price.edition
                )));
            }

            let sources = txn.lock_balance_sources(member_id).await?;
            let wallet = Wallet::from_sources(&sources, today);
            let payable = wallet.payable_for(price.amount);

            let order = Order::new(
                member_id.clone(),
                price.edition,
                OrderKind::Upgrade,
                method,
                price.amount,
            )
            .with_wallet_credit(payable);
            txn.insert_order(&order).await?;

            let confirmation = if wallet.is_free_upgrade(price.amount) {
                let payment = PaymentResult::free_of_charge(Utc::now());
                Some(confirm_within(txn.as_mut(), &order.id, &payment, today).await?)
            } else {
                None
            };

            Ok(UpgradeCheckout {
                order: confirmation
                    .as_ref()
                    .map(|c| c.order.clone())
                    .unwrap_or(order),
                wallet,
                confirmation,
            })
        }
        .await;

        match result {
            Ok(checkout) => {
                txn.commit().await?;
                info!(
                    order = %checkout.order.id,
                    payable = %checkout.order.payable,
                    free = checkout.is_free(),
                    "upgrade checkout created"
                );
                Ok(checkout)
            }
            Err(err) => {
                txn.rollback().await?;
                if !err.retryable() {
                    warn!(member = ?member_id.compound_id(), error = %err, "upgrade checkout rejected");
                }
                Err(err)
            }
        }
    }
}
