//! Concurrency-safe price cache.
//!
//! An explicit, injectable service rather than a package-level global,
//! so tests can isolate instances. Readers never block each other; the
//! write lock is held only for the duration of an upsert.

use std::collections::HashMap;
use std::sync::RwLock;

use super::Price;

#[derive(Debug, Default)]
struct CacheInner {
    by_id: HashMap<String, Price>,
    /// Insertion order, so `list` is stable across calls.
    order: Vec<String>,
}

/// Shared read-mostly cache of plan prices.
#[derive(Debug, Default)]
pub struct PriceCache {
    inner: RwLock<CacheInner>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated cache, typically from the catalog table at startup.
    pub fn with_prices(prices: impl IntoIterator<Item = Price>) -> Self {
        let cache = Self::new();
        for price in prices {
            cache.upsert(price);
        }
        cache
    }

    /// Inserts or replaces a price by id.
    pub fn upsert(&self, price: Price) {
        let mut inner = self.inner.write().expect("price cache lock poisoned");
        if !inner.by_id.contains_key(&price.id) {
            inner.order.push(price.id.clone());
        }
        inner.by_id.insert(price.id.clone(), price);
    }

    pub fn find(&self, id: &str) -> Option<Price> {
        let inner = self.inner.read().expect("price cache lock poisoned");
        inner.by_id.get(id).cloned()
    }

    /// All cached prices in insertion order; `live_only` filters out
    /// retired ones.
    pub fn list(&self, live_only: bool) -> Vec<Price> {
        let inner = self.inner.read().expect("price cache lock poisoned");
        inner
            .order
            .iter()
            .filter_map(|id| inner.by_id.get(id))
            .filter(|p| !live_only || p.live)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("price cache lock poisoned").by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
