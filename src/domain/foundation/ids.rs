//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::ValidationError;

/// Compound key for a member: an FTC account id, a wechat union id, or
/// both.
///
/// # Invariants
///
/// - A [`MemberId`] built through [`MemberId::new`] carries at least one
///   of the two ids.
/// - The compound id used as the primary lookup key is the FTC id when
///   present, otherwise the union id.
///
/// The `Default` value (both ids absent) exists only so a zero-value
/// `Membership` ("no subscription") can be represented; it never reaches
/// storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberId {
    ftc_id: Option<String>,
    union_id: Option<String>,
}

impl MemberId {
    /// Creates a member id, requiring at least one non-empty component.
    pub fn new(
        ftc_id: Option<String>,
        union_id: Option<String>,
    ) -> Result<Self, ValidationError> {
        let ftc_id = ftc_id.filter(|s| !s.is_empty());
        let union_id = union_id.filter(|s| !s.is_empty());
        if ftc_id.is_none() && union_id.is_none() {
            return Err(ValidationError::EmptyMemberId);
        }
        Ok(Self { ftc_id, union_id })
    }

    /// Creates a member id from an FTC account id alone.
    pub fn from_ftc(id: impl Into<String>) -> Self {
        Self {
            ftc_id: Some(id.into()),
            union_id: None,
        }
    }

    /// Creates a member id from a wechat union id alone.
    pub fn from_union(id: impl Into<String>) -> Self {
        Self {
            ftc_id: None,
            union_id: Some(id.into()),
        }
    }

    /// The primary lookup key. FTC id takes precedence over union id.
    pub fn compound_id(&self) -> Option<&str> {
        self.ftc_id.as_deref().or(self.union_id.as_deref())
    }

    pub fn ftc_id(&self) -> Option<&str> {
        self.ftc_id.as_deref()
    }

    pub fn union_id(&self) -> Option<&str> {
        self.union_id.as_deref()
    }

    /// True when both components are absent (zero membership only).
    pub fn is_zero(&self) -> bool {
        self.ftc_id.is_none() && self.union_id.is_none()
    }

    /// True when two ids resolve to the same compound key.
    pub fn same_account(&self, other: &MemberId) -> bool {
        match (self.compound_id(), other.compound_id()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.compound_id().unwrap_or("<zero>"))
    }
}

/// Unique identifier for a purchase order.
///
/// Order ids are opaque strings issued at checkout time (`FT` followed by
/// an upper-case token), matching what the payment gateways echo back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Wraps an existing order id string.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh order id for a synthesized (zero-amount) order.
    pub fn generate() -> Self {
        let token = Uuid::new_v4().simple().to_string().to_uppercase();
        Self(format!("FT{}", &token[..18]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a membership snapshot row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(Uuid);

impl SnapshotId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an add-on invoice row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(Uuid);

impl InvoiceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for InvoiceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
