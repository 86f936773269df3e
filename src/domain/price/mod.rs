//! Price catalog module.

mod cache;
#[allow(clippy::module_inception)]
mod price;

pub use cache::PriceCache;
pub use price::Price;
