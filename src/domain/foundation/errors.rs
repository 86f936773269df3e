//! Error types for the reconciliation core.
//!
//! Every engine operation returns a [`ReconcileError`] whose
//! [`retryable`](ReconcileError::retryable) predicate tells the caller
//! (webhook endpoint or polling reconciler) whether redelivery is safe.
//! Idempotent no-ops (an already-confirmed order, an unchanged Stripe
//! refresh) are modelled as successes, never as errors.

use thiserror::Error;

use super::Cents;
use crate::domain::order::ForbiddenPurchase;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("member id requires at least one of ftc id or union id")]
    EmptyMemberId,

    #[error("amount must not be negative, got {0}")]
    NegativeAmount(i64),

    #[error("period end {end} precedes start {start}")]
    InvertedPeriod { start: String, end: String },
}

/// Failure taxonomy of the reconciliation engine.
///
/// Variant choice encodes the retry contract:
/// - `Database` is the only transient class; everything else must not be
///   redelivered automatically.
/// - `Integrity` failures additionally require manual operator review and
///   are persisted to the error log table before being surfaced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// The order row does not exist. Fatal, nothing to retry against.
    #[error("order {0} not found")]
    OrderNotFound(String),

    /// Paid amount differs from the order's payable amount.
    /// Compared in integer minor units, never floating point.
    #[error("payment amount {paid} does not match order payable {expected}")]
    AmountMismatch { expected: Cents, paid: Cents },

    /// Provider reported a non-settled payment state.
    #[error("payment result is not settled: {0}")]
    NotSettled(String),

    /// The decision matrix refused the purchase.
    #[error("purchase forbidden: {0}")]
    Forbidden(#[from] ForbiddenPurchase),

    /// Cross-source overwrite attempt or mismatched identity between a
    /// Stripe subscription and the resolved account.
    #[error("data integrity conflict: {0}")]
    Integrity(String),

    /// Caller misuse of the add-on ledger (claim on a live or zero
    /// membership).
    #[error("invalid add-on claim: {0}")]
    InvalidClaim(String),

    /// The requested operation does not apply to the member's current
    /// state, e.g. an upgrade checkout for someone already on premium.
    #[error("not eligible: {0}")]
    Ineligible(String),

    /// Value object construction failed.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Transient store failure before commit. The only retryable class.
    #[error("database error: {0}")]
    Database(String),
}

impl ReconcileError {
    /// True when the caller may safely redeliver the triggering event.
    ///
    /// Safe because the confirmation protocol's lock-then-no-op check
    /// makes a retried confirmation idempotent.
    pub fn retryable(&self) -> bool {
        matches!(self, ReconcileError::Database(_))
    }

    /// True when the failure must be persisted for manual review.
    pub fn needs_review(&self) -> bool {
        matches!(self, ReconcileError::Integrity(_))
    }

    /// Wraps a low-level store error as a transient failure.
    pub fn database(err: impl std::fmt::Display) -> Self {
        ReconcileError::Database(err.to_string())
    }
}
