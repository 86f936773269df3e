//! Ports - the engine's contracts with the outside world.
//!
//! Async traits implemented by the adapters; application handlers hold
//! them as `Arc<dyn Port>`.

mod account_reader;
mod payment_verifier;
mod reconciliation_store;

pub use account_reader::{AccountReader, FtcAccount};
pub use payment_verifier::{PaymentVerifier, VerifierRegistry};
pub use reconciliation_store::{ReconTxn, ReconciliationStore};
