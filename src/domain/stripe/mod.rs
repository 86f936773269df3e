//! Stripe domain module.
//!
//! The typed subscription payload and the pure takeover/refresh
//! decisions the webhook reconciler applies.

mod reconcile;
mod subscription;

pub use reconcile::{decide_takeover, refresh, RefreshOutcome, Takeover};
pub use subscription::StripeSubs;
