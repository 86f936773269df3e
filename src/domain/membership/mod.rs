//! Membership domain module.
//!
//! The canonical subscription record, its editions and statuses, the
//! add-on day ledger, and the audit snapshots taken before every
//! mutation.
//!
//! # Module Structure
//!
//! - `membership` - Membership aggregate entity
//! - `edition` - Tier and billing cycle
//! - `payment_method` - funding channels
//! - `status` - Stripe subscription status
//! - `addon` - deferred-day ledger
//! - `snapshot` - pre-mutation audit records

mod addon;
mod edition;
#[allow(clippy::module_inception)]
mod membership;
mod payment_method;
mod snapshot;
mod status;

pub use addon::AddOn;
pub use edition::{Cycle, Edition, Tier};
pub use membership::{AddOnClaim, Membership};
pub use payment_method::PaymentMethod;
pub use snapshot::{ArchiveAction, ArchiveSource, Archiver, MemberSnapshot};
pub use status::SubsStatus;
