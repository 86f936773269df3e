//! PostgreSQL implementation of the reconciliation store.
//!
//! One `ReconTxn` wraps one sqlx transaction; every `lock_*` read is a
//! `SELECT ... FOR UPDATE` so concurrent confirmations for the same
//! member or order serialize while different members stay parallel.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::foundation::{Cents, InvoiceId, MemberId, OrderId, ReconcileError};
use crate::domain::membership::{
    Cycle, Edition, MemberSnapshot, Membership, PaymentMethod, SubsStatus, Tier,
};
use crate::domain::order::{
    AddOnInvoice, BalanceSource, InvoiceSource, Order, OrderKind,
};
use crate::ports::{ReconTxn, ReconciliationStore};

/// PostgreSQL implementation of the [`ReconciliationStore`] port.
pub struct PgReconciliationStore {
    pool: PgPool,
}

impl PgReconciliationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReconciliationStore for PgReconciliationStore {
    async fn begin(&self) -> Result<Box<dyn ReconTxn>, ReconcileError> {
        let tx = self.pool.begin().await.map_err(ReconcileError::database)?;
        Ok(Box::new(PgReconTxn { tx }))
    }

    async fn log_error(&self, context: &str, message: &str) -> Result<(), ReconcileError> {
        // Runs on the pool, not a transaction, so the record survives
        // the rollback of the writes that triggered it.
        sqlx::query(
            r#"
            INSERT INTO confirmation_error (context, message, created_utc)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(context)
        .bind(message)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(ReconcileError::database)?;
        Ok(())
    }
}

struct PgReconTxn {
    tx: Transaction<'static, Postgres>,
}

/// Database row of a subscription order.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    ftc_id: Option<String>,
    union_id: Option<String>,
    tier: String,
    cycle: String,
    kind: String,
    payment_method: String,
    original_price: i64,
    payable: i64,
    created_utc: DateTime<Utc>,
    confirmed_utc: Option<DateTime<Utc>>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

impl TryFrom<OrderRow> for Order {
    type Error = ReconcileError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: OrderId::from_string(row.id),
            member_id: parse_member_id(row.ftc_id, row.union_id)?,
            edition: Edition::new(parse_tier(&row.tier)?, parse_cycle(&row.cycle)?),
            kind: parse_kind(&row.kind)?,
            payment_method: parse_method(&row.payment_method)?,
            original_price: Cents::new(row.original_price),
            payable: Cents::new(row.payable),
            created_at: row.created_utc,
            confirmed_at: row.confirmed_utc,
            start_date: row.start_date,
            end_date: row.end_date,
        })
    }
}

/// Database row of a membership.
#[derive(Debug, sqlx::FromRow)]
struct MembershipRow {
    ftc_id: Option<String>,
    union_id: Option<String>,
    tier: Option<String>,
    cycle: Option<String>,
    expire_date: Option<NaiveDate>,
    payment_method: Option<String>,
    stripe_subs_id: Option<String>,
    apple_subs_id: Option<String>,
    b2b_licence_id: Option<String>,
    auto_renewal: bool,
    subs_status: Option<String>,
    standard_addon_days: i64,
    premium_addon_days: i64,
}

impl TryFrom<MembershipRow> for Membership {
    type Error = ReconcileError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        let edition = match (row.tier.as_deref(), row.cycle.as_deref()) {
            (Some(tier), Some(cycle)) => {
                Some(Edition::new(parse_tier(tier)?, parse_cycle(cycle)?))
            }
            _ => None,
        };
        Ok(Membership {
            id: parse_member_id(row.ftc_id, row.union_id)?,
            edition,
            expire_date: row.expire_date,
            payment_method: row
                .payment_method
                .as_deref()
                .map(parse_method)
                .transpose()?,
            stripe_subs_id: row.stripe_subs_id,
            apple_subs_id: row.apple_subs_id,
            b2b_licence_id: row.b2b_licence_id,
            auto_renewal: row.auto_renewal,
            status: row.subs_status.as_deref().map(parse_status).transpose()?,
            addon: crate::domain::membership::AddOn::new(
                row.standard_addon_days,
                row.premium_addon_days,
            ),
        })
    }
}

/// Database row of an upgrade-wallet funding source.
#[derive(Debug, sqlx::FromRow)]
struct SourceRow {
    id: String,
    tier: String,
    payable: i64,
    start_date: NaiveDate,
    end_date: NaiveDate,
}

impl TryFrom<SourceRow> for BalanceSource {
    type Error = ReconcileError;

    fn try_from(row: SourceRow) -> Result<Self, Self::Error> {
        Ok(BalanceSource {
            order_id: OrderId::from_string(row.id),
            tier: parse_tier(&row.tier)?,
            payable: Cents::new(row.payable),
            start_date: row.start_date,
            end_date: row.end_date,
        })
    }
}

/// Database row of an add-on invoice.
#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: Uuid,
    ftc_id: Option<String>,
    union_id: Option<String>,
    order_id: Option<String>,
    source: String,
    tier: String,
    days: i64,
    created_utc: DateTime<Utc>,
    consumed_utc: Option<DateTime<Utc>>,
    consumed_by: Option<String>,
}

impl TryFrom<InvoiceRow> for AddOnInvoice {
    type Error = ReconcileError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        Ok(AddOnInvoice {
            id: InvoiceId::from_uuid(row.id),
            member_id: parse_member_id(row.ftc_id, row.union_id)?,
            order_id: row.order_id.map(OrderId::from_string),
            source: parse_invoice_source(&row.source)?,
            tier: parse_tier(&row.tier)?,
            days: row.days,
            created_at: row.created_utc,
            consumed_at: row.consumed_utc,
            consumed_by: row.consumed_by.map(OrderId::from_string),
        })
    }
}

fn parse_member_id(
    ftc_id: Option<String>,
    union_id: Option<String>,
) -> Result<MemberId, ReconcileError> {
    MemberId::new(ftc_id, union_id)
        .map_err(|e| ReconcileError::database(format!("corrupt member id columns: {}", e)))
}

fn parse_tier(s: &str) -> Result<Tier, ReconcileError> {
    match s {
        "standard" => Ok(Tier::Standard),
        "premium" => Ok(Tier::Premium),
        _ => Err(ReconcileError::database(format!("invalid tier value: {}", s))),
    }
}

fn parse_cycle(s: &str) -> Result<Cycle, ReconcileError> {
    match s {
        "month" => Ok(Cycle::Month),
        "year" => Ok(Cycle::Year),
        _ => Err(ReconcileError::database(format!("invalid cycle value: {}", s))),
    }
}

fn parse_kind(s: &str) -> Result<OrderKind, ReconcileError> {
    s.parse()
        .map_err(|e: String| ReconcileError::database(e))
}

fn parse_method(s: &str) -> Result<PaymentMethod, ReconcileError> {
    s.parse()
        .map_err(|e: String| ReconcileError::database(e))
}

fn parse_status(s: &str) -> Result<SubsStatus, ReconcileError> {
    s.parse()
        .map_err(|e: String| ReconcileError::database(e))
}

fn parse_invoice_source(s: &str) -> Result<InvoiceSource, ReconcileError> {
    match s {
        "purchase" => Ok(InvoiceSource::Purchase),
        "carry_over" => Ok(InvoiceSource::CarryOver),
        _ => Err(ReconcileError::database(format!(
            "invalid invoice source: {}",
            s
        ))),
    }
}

fn invoice_source_str(source: InvoiceSource) -> &'static str {
    match source {
        InvoiceSource::Purchase => "purchase",
        InvoiceSource::CarryOver => "carry_over",
    }
}

#[async_trait]
impl ReconTxn for PgReconTxn {
    async fn lock_order(&mut self, id: &OrderId) -> Result<Option<Order>, ReconcileError> {
        let row: Option<OrderRow> = sqlx::query_as(
            r#"
            SELECT id, ftc_id, union_id, tier, cycle, kind, payment_method,
                   original_price, payable, created_utc, confirmed_utc,
                   start_date, end_date
            FROM subs_order
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(ReconcileError::database)?;

        row.map(Order::try_from).transpose()
    }

    async fn lock_membership(&mut self, id: &MemberId) -> Result<Membership, ReconcileError> {
        let compound = match id.compound_id() {
            Some(compound) => compound,
            None => return Ok(Membership::default()),
        };
        let row: Option<MembershipRow> = sqlx::query_as(
            r#"
            SELECT ftc_id, union_id, tier, cycle, expire_date, payment_method,
                   stripe_subs_id, apple_subs_id, b2b_licence_id, auto_renewal,
                   subs_status, standard_addon_days, premium_addon_days
            FROM membership
            WHERE compound_id = $1
            FOR UPDATE
            "#,
        )
        .bind(compound)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(ReconcileError::database)?;

        match row {
            Some(row) => Membership::try_from(row),
            None => Ok(Membership::default()),
        }
    }

    async fn lock_membership_by_stripe_subs(
        &mut self,
        subs_id: &str,
    ) -> Result<Option<Membership>, ReconcileError> {
        let row: Option<MembershipRow> = sqlx::query_as(
            r#"
            SELECT ftc_id, union_id, tier, cycle, expire_date, payment_method,
                   stripe_subs_id, apple_subs_id, b2b_licence_id, auto_renewal,
                   subs_status, standard_addon_days, premium_addon_days
            FROM membership
            WHERE stripe_subs_id = $1
            FOR UPDATE
            "#,
        )
        .bind(subs_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(ReconcileError::database)?;

        row.map(Membership::try_from).transpose()
    }

    async fn lock_balance_sources(
        &mut self,
        id: &MemberId,
    ) -> Result<Vec<BalanceSource>, ReconcileError> {
        let compound = match id.compound_id() {
            Some(compound) => compound,
            None => return Ok(Vec::new()),
        };
        let rows: Vec<SourceRow> = sqlx::query_as(
            r#"
            SELECT id, tier, payable, start_date, end_date
            FROM subs_order
            WHERE compound_id = $1
              AND confirmed_utc IS NOT NULL
              AND consumed_by IS NULL
              AND end_date > CURRENT_DATE
              AND payment_method IN ('alipay', 'wechat')
            ORDER BY created_utc
            FOR UPDATE
            "#,
        )
        .bind(compound)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(ReconcileError::database)?;

        rows.into_iter().map(BalanceSource::try_from).collect()
    }

    async fn lock_addon_invoices(
        &mut self,
        id: &MemberId,
    ) -> Result<Vec<AddOnInvoice>, ReconcileError> {
        let compound = match id.compound_id() {
            Some(compound) => compound,
            None => return Ok(Vec::new()),
        };
        let rows: Vec<InvoiceRow> = sqlx::query_as(
            r#"
            SELECT id, ftc_id, union_id, order_id, source, tier, days,
                   created_utc, consumed_utc, consumed_by
            FROM addon_invoice
            WHERE compound_id = $1
              AND consumed_utc IS NULL
            ORDER BY created_utc
            FOR UPDATE
            "#,
        )
        .bind(compound)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(ReconcileError::database)?;

        rows.into_iter().map(AddOnInvoice::try_from).collect()
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), ReconcileError> {
        sqlx::query(
            r#"
            INSERT INTO subs_order
                (id, compound_id, ftc_id, union_id, tier, cycle, kind,
                 payment_method, original_price, payable, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(order.id.as_str())
        .bind(order.member_id.compound_id())
        .bind(order.member_id.ftc_id())
        .bind(order.member_id.union_id())
        .bind(order.edition.tier.as_str())
        .bind(order.edition.cycle.as_str())
        .bind(order.kind.as_str())
        .bind(order.payment_method.as_str())
        .bind(order.original_price.minor())
        .bind(order.payable.minor())
        .bind(order.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(ReconcileError::database)?;
        Ok(())
    }

    async fn stamp_order_confirmed(&mut self, order: &Order) -> Result<(), ReconcileError> {
        // The WHERE clause gives a second, database-level idempotency
        // guard behind the row lock.
        let result = sqlx::query(
            r#"
            UPDATE subs_order
            SET kind = $2, confirmed_utc = $3, start_date = $4, end_date = $5
            WHERE id = $1 AND confirmed_utc IS NULL
            "#,
        )
        .bind(order.id.as_str())
        .bind(order.kind.as_str())
        .bind(order.confirmed_at)
        .bind(order.start_date)
        .bind(order.end_date)
        .execute(&mut *self.tx)
        .await
        .map_err(ReconcileError::database)?;

        if result.rows_affected() != 1 {
            return Err(ReconcileError::Integrity(format!(
                "order {} was already stamped",
                order.id
            )));
        }
        Ok(())
    }

    async fn upsert_membership(&mut self, membership: &Membership) -> Result<(), ReconcileError> {
        let compound = membership.id.compound_id().ok_or_else(|| {
            ReconcileError::Integrity("cannot persist membership without a member id".into())
        })?;
        sqlx::query(
            r#"
            INSERT INTO membership
                (compound_id, ftc_id, union_id, tier, cycle, expire_date,
                 payment_method, stripe_subs_id, apple_subs_id, b2b_licence_id,
                 auto_renewal, subs_status, standard_addon_days,
                 premium_addon_days, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (compound_id) DO UPDATE SET
                ftc_id = EXCLUDED.ftc_id,
                union_id = EXCLUDED.union_id,
                tier = EXCLUDED.tier,
                cycle = EXCLUDED.cycle,
                expire_date = EXCLUDED.expire_date,
                payment_method = EXCLUDED.payment_method,
                stripe_subs_id = EXCLUDED.stripe_subs_id,
                apple_subs_id = EXCLUDED.apple_subs_id,
                b2b_licence_id = EXCLUDED.b2b_licence_id,
                auto_renewal = EXCLUDED.auto_renewal,
                subs_status = EXCLUDED.subs_status,
                standard_addon_days = EXCLUDED.standard_addon_days,
                premium_addon_days = EXCLUDED.premium_addon_days,
                updated_utc = EXCLUDED.updated_utc
            "#,
        )
        .bind(compound)
        .bind(membership.id.ftc_id())
        .bind(membership.id.union_id())
        .bind(membership.edition.map(|e| e.tier.as_str()))
        .bind(membership.edition.map(|e| e.cycle.as_str()))
        .bind(membership.expire_date)
        .bind(membership.payment_method.map(|m| m.as_str()))
        .bind(membership.stripe_subs_id.as_deref())
        .bind(membership.apple_subs_id.as_deref())
        .bind(membership.b2b_licence_id.as_deref())
        .bind(membership.auto_renewal)
        .bind(membership.status.map(|s| s.as_str()))
        .bind(membership.addon.standard_days)
        .bind(membership.addon.premium_days)
        .bind(Utc::now())
        .execute(&mut *self.tx)
        .await
        .map_err(ReconcileError::database)?;
        Ok(())
    }

    async fn insert_snapshot(&mut self, snapshot: &MemberSnapshot) -> Result<(), ReconcileError> {
        let membership = &snapshot.membership;
        sqlx::query(
            r#"
            INSERT INTO member_snapshot
                (id, archived_by, compound_id, ftc_id, union_id, tier, cycle,
                 expire_date, payment_method, stripe_subs_id, apple_subs_id,
                 b2b_licence_id, auto_renewal, subs_status,
                 standard_addon_days, premium_addon_days, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17)
            "#,
        )
        .bind(snapshot.id.as_uuid())
        .bind(snapshot.archiver.to_string())
        .bind(membership.id.compound_id())
        .bind(membership.id.ftc_id())
        .bind(membership.id.union_id())
        .bind(membership.edition.map(|e| e.tier.as_str()))
        .bind(membership.edition.map(|e| e.cycle.as_str()))
        .bind(membership.expire_date)
        .bind(membership.payment_method.map(|m| m.as_str()))
        .bind(membership.stripe_subs_id.as_deref())
        .bind(membership.apple_subs_id.as_deref())
        .bind(membership.b2b_licence_id.as_deref())
        .bind(membership.auto_renewal)
        .bind(membership.status.map(|s| s.as_str()))
        .bind(membership.addon.standard_days)
        .bind(membership.addon.premium_days)
        .bind(snapshot.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(ReconcileError::database)?;
        Ok(())
    }

    async fn insert_invoice(&mut self, invoice: &AddOnInvoice) -> Result<(), ReconcileError> {
        sqlx::query(
            r#"
            INSERT INTO addon_invoice
                (id, compound_id, ftc_id, union_id, order_id, source, tier,
                 days, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(invoice.id.as_uuid())
        .bind(invoice.member_id.compound_id())
        .bind(invoice.member_id.ftc_id())
        .bind(invoice.member_id.union_id())
        .bind(invoice.order_id.as_ref().map(|id| id.as_str()))
        .bind(invoice_source_str(invoice.source))
        .bind(invoice.tier.as_str())
        .bind(invoice.days)
        .bind(invoice.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(ReconcileError::database)?;
        Ok(())
    }

    async fn flag_sources_consumed(
        &mut self,
        source_ids: &[OrderId],
        consumed_by: &str,
    ) -> Result<(), ReconcileError> {
        let ids: Vec<String> = source_ids.iter().map(|id| id.to_string()).collect();
        let result = sqlx::query(
            r#"
            UPDATE subs_order
            SET consumed_by = $2, consumed_utc = $3
            WHERE id = ANY($1) AND consumed_by IS NULL
            "#,
        )
        .bind(&ids)
        .bind(consumed_by)
        .bind(Utc::now())
        .execute(&mut *self.tx)
        .await
        .map_err(ReconcileError::database)?;

        if result.rows_affected() != source_ids.len() as u64 {
            return Err(ReconcileError::Integrity(format!(
                "expected to consume {} balance sources, consumed {}",
                source_ids.len(),
                result.rows_affected()
            )));
        }
        Ok(())
    }

    async fn flag_invoice_consumed(&mut self, id: &InvoiceId) -> Result<(), ReconcileError> {
        let result = sqlx::query(
            r#"
            UPDATE addon_invoice
            SET consumed_utc = $2
            WHERE id = $1 AND consumed_utc IS NULL
            "#,
        )
        .bind(id.as_uuid())
        .bind(Utc::now())
        .execute(&mut *self.tx)
        .await
        .map_err(ReconcileError::database)?;

        if result.rows_affected() != 1 {
            return Err(ReconcileError::Integrity(format!(
                "add-on invoice {} was already consumed or does not exist",
                id
            )));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), ReconcileError> {
        self.tx.commit().await.map_err(ReconcileError::database)
    }

    async fn rollback(self: Box<Self>) -> Result<(), ReconcileError> {
        self.tx.rollback().await.map_err(ReconcileError::database)
    }
}
