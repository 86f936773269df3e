//! Verified payment results handed in by the gateway layer.
//!
//! Produced outside the core by signature-verified Alipay/WeChat
//! callbacks or by polling the gateway; the engine only trusts the
//! amount and settlement state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::Cents;

/// Provider-reported settlement state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
    Paid,
    Pending,
    Failed,
    Refunded,
}

/// The outcome of one gateway transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    /// Amount actually paid, in minor units.
    pub amount: Cents,
    /// Provider transaction id, for the audit trail.
    pub transaction_id: String,
    /// When the provider settled the payment.
    pub confirmed_at: DateTime<Utc>,
    /// Settlement state as reported by the provider.
    pub state: PaymentState,
}

impl PaymentResult {
    pub fn is_paid(&self) -> bool {
        self.state == PaymentState::Paid
    }

    /// A synthesized result for a wallet-funded free upgrade: zero
    /// amount, settled immediately, no gateway round-trip.
    pub fn free_of_charge(now: DateTime<Utc>) -> Self {
        Self {
            amount: Cents::ZERO,
            transaction_id: String::new(),
            confirmed_at: now,
            state: PaymentState::Paid,
        }
    }
}
