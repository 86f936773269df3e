//! Application layer - the transactional use cases.
//!
//! Each handler owns one unit of work: it opens a store transaction,
//! runs the protocol against row-locked state, and commits or rolls
//! back. Handlers hold their ports as `Arc<dyn Port>` so adapters stay
//! swappable.

mod claim_addon;
mod confirm_order;
mod stripe_webhook;
mod upgrade;

#[cfg(test)]
pub(crate) mod memory_store;

pub use claim_addon::{ClaimAddOnHandler, ClaimOutcome};
pub use confirm_order::ConfirmOrderHandler;
pub use stripe_webhook::{StripeWebhookHandler, WebhookOutcome};
pub use upgrade::{UpgradeCheckout, UpgradeCheckoutHandler};
