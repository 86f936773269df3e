//! Account lookup port.
//!
//! The account repository is an external collaborator; the engine only
//! needs to resolve the member behind a Stripe customer or an id pair.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{MemberId, ReconcileError};

/// An FTC reader account, as the account repository returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FtcAccount {
    pub ftc_id: String,
    pub union_id: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub email: String,
}

impl FtcAccount {
    /// The compound member id this account maps to.
    pub fn member_id(&self) -> MemberId {
        // An account always has an FTC id, so construction cannot fail.
        MemberId::new(Some(self.ftc_id.clone()), self.union_id.clone())
            .unwrap_or_else(|_| MemberId::from_ftc(self.ftc_id.clone()))
    }
}

/// Read-side port for account resolution.
#[async_trait]
pub trait AccountReader: Send + Sync {
    async fn find_by_ftc_id(&self, ftc_id: &str) -> Result<Option<FtcAccount>, ReconcileError>;

    async fn find_by_union_id(&self, union_id: &str)
        -> Result<Option<FtcAccount>, ReconcileError>;

    /// Resolves the account behind a Stripe customer id, the lookup the
    /// webhook reconciler uses to verify identity.
    async fn find_by_stripe_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<FtcAccount>, ReconcileError>;
}
