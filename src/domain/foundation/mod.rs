//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, money, calendar helpers, and error types that
//! form the vocabulary of the reconciliation engine.

mod dates;
mod errors;
mod ids;
mod money;

pub use dates::{days_remaining, today_utc, within_renewal_window};
pub use errors::{ReconcileError, ValidationError};
pub use ids::{InvoiceId, MemberId, OrderId, SnapshotId};
pub use money::Cents;
