//! # Payment Types
//!
//! Locally persisted payment records and their status lifecycle.

use crate::error::PaymentError;
use crate::product::Currency;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Status of a locally tracked payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Intent created, awaiting the gateway's verdict
    Pending,
    /// Gateway reported the payment succeeded
    Succeeded,
    /// Gateway reported the payment failed
    Failed,
    /// Intent was canceled on the gateway side
    Canceled,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Canceled => "canceled",
        }
    }

    /// Map a raw gateway intent status onto the local lifecycle.
    ///
    /// Anything the gateway still considers in flight
    /// (`requires_action`, `processing`, ...) is `Pending`.
    pub fn from_gateway(status: &str) -> Self {
        match status {
            "succeeded" => PaymentStatus::Succeeded,
            "canceled" => PaymentStatus::Canceled,
            _ => PaymentStatus::Pending,
        }
    }

    /// Only `pending -> succeeded` and `pending -> failed` are legal.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Succeeded)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
        )
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "succeeded" => Ok(PaymentStatus::Succeeded),
            "failed" => Ok(PaymentStatus::Failed),
            "canceled" => Ok(PaymentStatus::Canceled),
            other => Err(PaymentError::Serialization(format!(
                "unknown payment status: {}",
                other
            ))),
        }
    }
}

/// Payment method types accepted when creating an intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodType {
    /// Card via Stripe Elements
    Card,
    /// OXXO cash voucher (Mexico)
    Oxxo,
    /// Bank transfer funded customer balance (SPEI in Mexico)
    CustomerBalance,
}

impl Default for PaymentMethodType {
    fn default() -> Self {
        PaymentMethodType::Card
    }
}

impl PaymentMethodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethodType::Card => "card",
            PaymentMethodType::Oxxo => "oxxo",
            PaymentMethodType::CustomerBalance => "customer_balance",
        }
    }
}

impl FromStr for PaymentMethodType {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "card" => Ok(PaymentMethodType::Card),
            "oxxo" => Ok(PaymentMethodType::Oxxo),
            "customer_balance" | "bank_transfer" => Ok(PaymentMethodType::CustomerBalance),
            other => Err(PaymentError::InvalidRequest(format!(
                "unsupported payment method type: {}",
                other
            ))),
        }
    }
}

/// A payment tracked locally, keyed by the gateway intent id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,

    /// Owning user
    pub user_id: i64,

    /// Gateway payment intent id (unique, immutable)
    pub stripe_payment_intent_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_customer_id: Option<String>,

    /// Amount in smallest currency unit
    pub amount: i64,

    pub currency: Currency,

    pub status: PaymentStatus,

    pub payment_method_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Amount as a decimal value
    pub fn amount_decimal(&self) -> f64 {
        self.currency.from_smallest_unit(self.amount)
    }
}

/// Input for inserting a payment row
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: i64,
    pub stripe_payment_intent_id: String,
    pub stripe_customer_id: Option<String>,
    pub amount: i64,
    pub currency: Currency,
    pub status: PaymentStatus,
    pub payment_method_type: String,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Succeeded));
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Failed));
        assert!(!PaymentStatus::Pending.can_transition_to(PaymentStatus::Canceled));
        assert!(!PaymentStatus::Succeeded.can_transition_to(PaymentStatus::Failed));
        assert!(!PaymentStatus::Failed.can_transition_to(PaymentStatus::Succeeded));
        assert!(!PaymentStatus::Succeeded.can_transition_to(PaymentStatus::Succeeded));
    }

    #[test]
    fn test_status_from_gateway() {
        assert_eq!(PaymentStatus::from_gateway("succeeded"), PaymentStatus::Succeeded);
        assert_eq!(PaymentStatus::from_gateway("canceled"), PaymentStatus::Canceled);
        assert_eq!(
            PaymentStatus::from_gateway("requires_action"),
            PaymentStatus::Pending
        );
        assert_eq!(
            PaymentStatus::from_gateway("requires_payment_method"),
            PaymentStatus::Pending
        );
    }

    #[test]
    fn test_status_string_forms() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Succeeded,
            PaymentStatus::Failed,
            PaymentStatus::Canceled,
        ] {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Succeeded).unwrap(),
            "\"succeeded\""
        );
    }

    #[test]
    fn test_payment_method_parse() {
        assert_eq!("Card".parse::<PaymentMethodType>().unwrap(), PaymentMethodType::Card);
        assert_eq!(
            "bank_transfer".parse::<PaymentMethodType>().unwrap(),
            PaymentMethodType::CustomerBalance
        );
        assert!("paypal".parse::<PaymentMethodType>().is_err());
    }
}
