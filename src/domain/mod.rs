//! Domain layer - pure business types and decisions.
//!
//! Nothing in here performs I/O; persistence and gateway access live
//! behind the port traits.

pub mod foundation;
pub mod membership;
pub mod order;
pub mod price;
pub mod stripe;
