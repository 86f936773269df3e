//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `postgres` - sqlx-backed reconciliation store and account lookups

pub mod postgres;

pub use postgres::{PgAccountReader, PgReconciliationStore};
