//! PostgreSQL implementation of the account reader.
//!
//! The `account` table is owned by the account service; this adapter
//! only reads it, and its schema is not part of this crate's
//! migrations.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::ReconcileError;
use crate::ports::{AccountReader, FtcAccount};

/// Read-only account lookups against the account table.
pub struct PgAccountReader {
    pool: PgPool,
}

impl PgAccountReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_by(
        &self,
        column: AccountColumn,
        value: &str,
    ) -> Result<Option<FtcAccount>, ReconcileError> {
        let query = match column {
            AccountColumn::FtcId => {
                "SELECT ftc_id, union_id, stripe_customer_id, email FROM account WHERE ftc_id = $1"
            }
            AccountColumn::UnionId => {
                "SELECT ftc_id, union_id, stripe_customer_id, email FROM account WHERE union_id = $1"
            }
            AccountColumn::StripeCustomer => {
                "SELECT ftc_id, union_id, stripe_customer_id, email FROM account WHERE stripe_customer_id = $1"
            }
        };
        let row: Option<(String, Option<String>, Option<String>, String)> = sqlx::query_as(query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(ReconcileError::database)?;

        Ok(row.map(|(ftc_id, union_id, stripe_customer_id, email)| FtcAccount {
            ftc_id,
            union_id,
            stripe_customer_id,
            email,
        }))
    }
}

#[derive(Clone, Copy)]
enum AccountColumn {
    FtcId,
    UnionId,
    StripeCustomer,
}

#[async_trait]
impl AccountReader for PgAccountReader {
    async fn find_by_ftc_id(&self, ftc_id: &str) -> Result<Option<FtcAccount>, ReconcileError> {
        self.find_by(AccountColumn::FtcId, ftc_id).await
    }

    async fn find_by_union_id(
        &self,
        union_id: &str,
    ) -> Result<Option<FtcAccount>, ReconcileError> {
        self.find_by(AccountColumn::UnionId, union_id).await
    }

    async fn find_by_stripe_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<FtcAccount>, ReconcileError> {
        self.find_by(AccountColumn::StripeCustomer, customer_id).await
    }
}
