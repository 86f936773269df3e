//! Plan prices.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Cents;
use crate::domain::membership::Edition;

/// One purchasable plan price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub id: String,
    pub edition: Edition,
    pub amount: Cents,
    /// Live prices are shown on the paywall; retired ones stay resolvable
    /// for orders that reference them.
    pub live: bool,
}

impl Price {
    pub fn new(id: impl Into<String>, edition: Edition, amount: Cents) -> Self {
        Self {
            id: id.into(),
            edition,
            amount,
            live: true,
        }
    }

    pub fn retired(mut self) -> Self {
        self.live = false;
        self
    }
}
