//! Transactional store port for the reconciliation engine.
//!
//! One confirmation runs inside one store transaction. The transaction
//! object exposes the row-locked primitives the protocol needs; the
//! implementation maps `lock_*` methods onto `SELECT ... FOR UPDATE`,
//! serializing concurrent confirmations for the same user or order while
//! leaving different users fully parallel.
//!
//! # Design
//!
//! - **Pessimistic locking**: every mutating read takes an exclusive row
//!   lock for the duration of the transaction.
//! - **Run to completion**: once begun, a transaction commits or rolls
//!   back; there is no mid-flight cancellation.
//! - **Error log survives rollback**: `log_error` lives on the store,
//!   not the transaction, so integrity conflicts are recorded even when
//!   the business writes roll back.

use async_trait::async_trait;

use crate::domain::foundation::{InvoiceId, MemberId, OrderId, ReconcileError};
use crate::domain::membership::{MemberSnapshot, Membership};
use crate::domain::order::{AddOnInvoice, BalanceSource, Order};

/// Entry point: opens transactions and records errors for manual review.
#[async_trait]
pub trait ReconciliationStore: Send + Sync {
    /// Begins one reconciliation transaction.
    async fn begin(&self) -> Result<Box<dyn ReconTxn>, ReconcileError>;

    /// Appends a row to the error log table. Called outside the failed
    /// transaction so the record survives its rollback; never silently
    /// dropped.
    async fn log_error(&self, context: &str, message: &str) -> Result<(), ReconcileError>;
}

/// The row-locked operations available inside one transaction.
///
/// All reads that precede a write lock their row exclusively. `commit`
/// and `rollback` consume the transaction.
#[async_trait]
pub trait ReconTxn: Send {
    /// Locks and returns the order, or `None` when the row is absent.
    async fn lock_order(&mut self, id: &OrderId) -> Result<Option<Order>, ReconcileError>;

    /// Locks and returns the membership for the compound id, or the zero
    /// value when no row exists.
    async fn lock_membership(&mut self, id: &MemberId) -> Result<Membership, ReconcileError>;

    /// Locks and returns the membership tied to a Stripe subscription id.
    async fn lock_membership_by_stripe_subs(
        &mut self,
        subs_id: &str,
    ) -> Result<Option<Membership>, ReconcileError>;

    /// Locks the member's confirmed, unconsumed orders with remaining
    /// time (the upgrade wallet's funding).
    async fn lock_balance_sources(
        &mut self,
        id: &MemberId,
    ) -> Result<Vec<BalanceSource>, ReconcileError>;

    /// Locks the member's unconsumed add-on invoices.
    async fn lock_addon_invoices(
        &mut self,
        id: &MemberId,
    ) -> Result<Vec<AddOnInvoice>, ReconcileError>;

    /// Inserts a checkout-time order (used when the engine synthesizes a
    /// zero-amount upgrade order).
    async fn insert_order(&mut self, order: &Order) -> Result<(), ReconcileError>;

    /// Stamps `confirmed_at`/`start_date`/`end_date` on an order that has
    /// none yet. Fails with an integrity error when the row was already
    /// stamped.
    async fn stamp_order_confirmed(&mut self, order: &Order) -> Result<(), ReconcileError>;

    /// Creates or replaces the membership row for its compound id.
    async fn upsert_membership(&mut self, membership: &Membership) -> Result<(), ReconcileError>;

    /// Appends a pre-mutation snapshot.
    async fn insert_snapshot(&mut self, snapshot: &MemberSnapshot) -> Result<(), ReconcileError>;

    /// Appends an add-on invoice.
    async fn insert_invoice(&mut self, invoice: &AddOnInvoice) -> Result<(), ReconcileError>;

    /// Flips the consumed flag on the given balance sources, linking the
    /// consumer: the upgrade order that spent them, or the Stripe
    /// subscription that banked their remainder. Each source is consumed
    /// at most once.
    async fn flag_sources_consumed(
        &mut self,
        source_ids: &[OrderId],
        consumed_by: &str,
    ) -> Result<(), ReconcileError>;

    /// Flips the consumed flag on one add-on invoice.
    async fn flag_invoice_consumed(&mut self, id: &InvoiceId) -> Result<(), ReconcileError>;

    async fn commit(self: Box<Self>) -> Result<(), ReconcileError>;

    async fn rollback(self: Box<Self>) -> Result<(), ReconcileError>;
}
