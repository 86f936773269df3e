//! Payment verification strategy port.
//!
//! One implementation per gateway (Alipay, WeChat), selected once
//! through the registry, so the confirmation protocol depends on an
//! abstraction instead of a type switch scattered across call sites.
//! Signature verification and the raw SDK calls live inside the
//! implementations, outside the core.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::foundation::ReconcileError;
use crate::domain::membership::PaymentMethod;
use crate::domain::order::{ForbiddenPurchase, Order, PaymentResult};

/// Verifies an order's payment against its gateway.
#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    /// The channel this verifier speaks for.
    fn method(&self) -> PaymentMethod;

    /// Queries the gateway for the order's settlement state.
    async fn verify_payment(&self, order: &Order) -> Result<PaymentResult, ReconcileError>;
}

/// Registry of verifiers keyed by payment method.
#[derive(Default)]
pub struct VerifierRegistry {
    verifiers: HashMap<PaymentMethod, Arc<dyn PaymentVerifier>>,
}

impl VerifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a verifier under its own method, replacing any previous
    /// one.
    pub fn register(mut self, verifier: Arc<dyn PaymentVerifier>) -> Self {
        self.verifiers.insert(verifier.method(), verifier);
        self
    }

    /// Looks up the verifier for a method; an unregistered method is a
    /// forbidden purchase, not a panic.
    pub fn get(&self, method: PaymentMethod) -> Result<Arc<dyn PaymentVerifier>, ReconcileError> {
        self.verifiers
            .get(&method)
            .cloned()
            .ok_or(ReconcileError::Forbidden(ForbiddenPurchase::UnknownMethod))
    }
}
