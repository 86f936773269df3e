//! Payment channels a membership can originate from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The channel that funded a membership or order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Alipay,
    Wechat,
    Stripe,
    Apple,
    B2b,
}

impl PaymentMethod {
    /// One-time purchase channels. Only these create orders through the
    /// confirmation protocol and fund the upgrade wallet.
    pub fn is_one_time(&self) -> bool {
        matches!(self, PaymentMethod::Alipay | PaymentMethod::Wechat)
    }

    /// Channels that manage their own subscription lifecycle; in-place
    /// changes must happen on the native channel.
    pub fn is_subscription(&self) -> bool {
        matches!(
            self,
            PaymentMethod::Stripe | PaymentMethod::Apple | PaymentMethod::B2b
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Alipay => "alipay",
            PaymentMethod::Wechat => "wechat",
            PaymentMethod::Stripe => "stripe",
            PaymentMethod::Apple => "apple",
            PaymentMethod::B2b => "b2b",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alipay" => Ok(PaymentMethod::Alipay),
            "wechat" => Ok(PaymentMethod::Wechat),
            "stripe" => Ok(PaymentMethod::Stripe),
            "apple" => Ok(PaymentMethod::Apple),
            "b2b" => Ok(PaymentMethod::B2b),
            other => Err(format!("unknown payment method: {}", other)),
        }
    }
}
