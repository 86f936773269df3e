//! Order domain module.
//!
//! Purchase attempts, the order-kind decision matrix, verified payment
//! results, the upgrade wallet, and add-on invoices.

mod invoice;
mod kind;
#[allow(clippy::module_inception)]
mod order;
mod payment_result;
mod wallet;

pub use invoice::{AddOnInvoice, InvoiceSource};
pub use kind::{decide_kind, ForbiddenPurchase, OrderKind};
pub use order::{ConfirmationResult, Order};
pub use payment_result::{PaymentResult, PaymentState};
pub use wallet::{BalanceSource, Wallet};
