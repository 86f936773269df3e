//! In-memory `ReconciliationStore` for handler tests.
//!
//! Mirrors the transactional semantics of the Postgres adapter: a
//! transaction stages its writes on a copy of the state and publishes
//! them atomically on commit; rollback drops the copy. Single-process
//! only, test support only.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::foundation::{today_utc, InvoiceId, MemberId, OrderId, ReconcileError};
use crate::domain::membership::{MemberSnapshot, Membership};
use crate::domain::order::{AddOnInvoice, BalanceSource, Order};
use crate::ports::{ReconTxn, ReconciliationStore};

/// A wallet source row with its ownership and consumption bookkeeping.
#[derive(Debug, Clone)]
pub struct SourceRow {
    pub member: String,
    pub source: BalanceSource,
    /// Order id or Stripe subscription id that spent this source.
    pub consumed_by: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MemState {
    pub orders: HashMap<String, Order>,
    /// Keyed by compound member id.
    pub memberships: HashMap<String, Membership>,
    pub snapshots: Vec<MemberSnapshot>,
    pub invoices: Vec<AddOnInvoice>,
    pub sources: Vec<SourceRow>,
    /// (context, message) rows of the error log table.
    pub errors: Vec<(String, String)>,
}

pub struct MemoryStore {
    state: Arc<Mutex<MemState>>,
    fail_commit: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemState::default())),
            fail_commit: AtomicBool::new(false),
        }
    }

    /// Makes the next commit fail with a transient database error.
    pub fn poison_next_commit(&self) {
        self.fail_commit.store(true, Ordering::SeqCst);
    }

    pub fn seed_order(&self, order: Order) {
        let mut state = self.state.lock().unwrap();
        state.orders.insert(order.id.to_string(), order);
    }

    pub fn seed_membership(&self, membership: Membership) {
        let key = membership
            .id
            .compound_id()
            .expect("seeded membership needs a member id")
            .to_string();
        self.state.lock().unwrap().memberships.insert(key, membership);
    }

    pub fn seed_source(&self, member: &MemberId, source: BalanceSource) {
        self.state.lock().unwrap().sources.push(SourceRow {
            member: member.compound_id().unwrap().to_string(),
            source,
            consumed_by: None,
        });
    }

    pub fn seed_invoice(&self, invoice: AddOnInvoice) {
        self.state.lock().unwrap().invoices.push(invoice);
    }

    pub fn snapshot_count(&self) -> usize {
        self.state.lock().unwrap().snapshots.len()
    }

    pub fn invoice_count(&self) -> usize {
        self.state.lock().unwrap().invoices.len()
    }

    pub fn state(&self) -> MemState {
        self.state.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReconciliationStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn ReconTxn>, ReconcileError> {
        let staged = self.state.lock().unwrap().clone();
        Ok(Box::new(MemoryTxn {
            shared: Arc::clone(&self.state),
            staged,
            fail_commit: self.fail_commit.swap(false, Ordering::SeqCst),
        }))
    }

    async fn log_error(&self, context: &str, message: &str) -> Result<(), ReconcileError> {
        self.state
            .lock()
            .unwrap()
            .errors
            .push((context.to_string(), message.to_string()));
        Ok(())
    }
}

struct MemoryTxn {
    shared: Arc<Mutex<MemState>>,
    staged: MemState,
    fail_commit: bool,
}

#[async_trait]
impl ReconTxn for MemoryTxn {
    async fn lock_order(&mut self, id: &OrderId) -> Result<Option<Order>, ReconcileError> {
        Ok(self.staged.orders.get(id.as_str()).cloned())
    }

    async fn lock_membership(&mut self, id: &MemberId) -> Result<Membership, ReconcileError> {
        let key = match id.compound_id() {
            Some(key) => key,
            None => return Ok(Membership::default()),
        };
        Ok(self
            .staged
            .memberships
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn lock_membership_by_stripe_subs(
        &mut self,
        subs_id: &str,
    ) -> Result<Option<Membership>, ReconcileError> {
        Ok(self
            .staged
            .memberships
            .values()
            .find(|m| m.stripe_subs_id.as_deref() == Some(subs_id))
            .cloned())
    }

    async fn lock_balance_sources(
        &mut self,
        id: &MemberId,
    ) -> Result<Vec<BalanceSource>, ReconcileError> {
        let key = id.compound_id().unwrap_or_default();
        let today = today_utc();
        Ok(self
            .staged
            .sources
            .iter()
            .filter(|row| {
                row.member == key
                    && row.consumed_by.is_none()
                    && row.source.end_date > today
            })
            .map(|row| row.source.clone())
            .collect())
    }

    async fn lock_addon_invoices(
        &mut self,
        id: &MemberId,
    ) -> Result<Vec<AddOnInvoice>, ReconcileError> {
        let key = id.compound_id().unwrap_or_default();
        Ok(self
            .staged
            .invoices
            .iter()
            .filter(|inv| inv.member_id.compound_id() == Some(key) && !inv.is_consumed())
            .cloned()
            .collect())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), ReconcileError> {
        self.staged
            .orders
            .insert(order.id.to_string(), order.clone());
        Ok(())
    }

    async fn stamp_order_confirmed(&mut self, order: &Order) -> Result<(), ReconcileError> {
        match self.staged.orders.get(order.id.as_str()) {
            None => Err(ReconcileError::OrderNotFound(order.id.to_string())),
            Some(stored) if stored.is_confirmed() => Err(ReconcileError::Integrity(format!(
                "order {} already stamped",
                order.id
            ))),
            Some(_) => {
                self.staged
                    .orders
                    .insert(order.id.to_string(), order.clone());
                Ok(())
            }
        }
    }

    async fn upsert_membership(&mut self, membership: &Membership) -> Result<(), ReconcileError> {
        let key = membership.id.compound_id().ok_or_else(|| {
            ReconcileError::Integrity("cannot persist membership without a member id".into())
        })?;
        self.staged
            .memberships
            .insert(key.to_string(), membership.clone());
        Ok(())
    }

    async fn insert_snapshot(&mut self, snapshot: &MemberSnapshot) -> Result<(), ReconcileError> {
        self.staged.snapshots.push(snapshot.clone());
        Ok(())
    }

    async fn insert_invoice(&mut self, invoice: &AddOnInvoice) -> Result<(), ReconcileError> {
        self.staged.invoices.push(invoice.clone());
        Ok(())
    }

    async fn flag_sources_consumed(
        &mut self,
        source_ids: &[OrderId],
        consumed_by: &str,
    ) -> Result<(), ReconcileError> {
        for row in &mut self.staged.sources {
            if source_ids.contains(&row.source.order_id) {
                if row.consumed_by.is_some() {
                    return Err(ReconcileError::Integrity(format!(
                        "balance source {} already consumed",
                        row.source.order_id
                    )));
                }
                row.consumed_by = Some(consumed_by.to_string());
            }
        }
        Ok(())
    }

    async fn flag_invoice_consumed(&mut self, id: &InvoiceId) -> Result<(), ReconcileError> {
        for invoice in &mut self.staged.invoices {
            if invoice.id == *id {
                if invoice.is_consumed() {
                    return Err(ReconcileError::Integrity(format!(
                        "add-on invoice {} already consumed",
                        id
                    )));
                }
                invoice.consumed_at = Some(Utc::now());
                return Ok(());
            }
        }
        Err(ReconcileError::Integrity(format!(
            "add-on invoice {} not found",
            id
        )))
    }

    async fn commit(self: Box<Self>) -> Result<(), ReconcileError> {
        if self.fail_commit {
            return Err(ReconcileError::database("simulated commit failure"));
        }
        *self.shared.lock().unwrap() = self.staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), ReconcileError> {
        Ok(())
    }
}
