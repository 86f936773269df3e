//! Immutable audit records of membership state.
//!
//! A snapshot captures the membership *before* a mutation, on the same
//! transaction as the mutation, and is never updated afterwards. The
//! archiver tag records who drove the change and what the change was.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::SnapshotId;

use super::{Membership, PaymentMethod};

/// Who drove a membership mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveSource {
    Alipay,
    Wechat,
    Stripe,
    Apple,
    B2b,
    Manual,
}

impl From<PaymentMethod> for ArchiveSource {
    fn from(method: PaymentMethod) -> Self {
        match method {
            PaymentMethod::Alipay => ArchiveSource::Alipay,
            PaymentMethod::Wechat => ArchiveSource::Wechat,
            PaymentMethod::Stripe => ArchiveSource::Stripe,
            PaymentMethod::Apple => ArchiveSource::Apple,
            PaymentMethod::B2b => ArchiveSource::B2b,
        }
    }
}

impl ArchiveSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveSource::Alipay => "alipay",
            ArchiveSource::Wechat => "wechat",
            ArchiveSource::Stripe => "stripe",
            ArchiveSource::Apple => "apple",
            ArchiveSource::B2b => "b2b",
            ArchiveSource::Manual => "manual",
        }
    }
}

/// What the mutation was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveAction {
    Create,
    Renew,
    Upgrade,
    Downgrade,
    AddOn,
    Claim,
    Webhook,
    CarryOver,
}

impl ArchiveAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveAction::Create => "create",
            ArchiveAction::Renew => "renew",
            ArchiveAction::Upgrade => "upgrade",
            ArchiveAction::Downgrade => "downgrade",
            ArchiveAction::AddOn => "addon",
            ArchiveAction::Claim => "claim",
            ArchiveAction::Webhook => "webhook",
            ArchiveAction::CarryOver => "carryover",
        }
    }
}

/// The (source, action) tag on an audit record, rendered `source.action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archiver {
    pub source: ArchiveSource,
    pub action: ArchiveAction,
}

impl Archiver {
    pub fn new(source: ArchiveSource, action: ArchiveAction) -> Self {
        Self { source, action }
    }
}

impl fmt::Display for Archiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.source.as_str(), self.action.as_str())
    }
}

/// Pre-mutation membership state, appended once per mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSnapshot {
    pub id: SnapshotId,
    pub archiver: Archiver,
    pub membership: Membership,
    pub created_at: DateTime<Utc>,
}

impl MemberSnapshot {
    /// Captures `membership` as it is right now, before the mutation.
    pub fn of(membership: &Membership, archiver: Archiver) -> Self {
        Self {
            id: SnapshotId::new(),
            archiver,
            membership: membership.clone(),
            created_at: Utc::now(),
        }
    }
}
