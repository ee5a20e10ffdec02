//! # Payment Gateway Trait
//!
//! The seam between the payment service and the external processor.
//! Stripe is the only implementation (`pay-stripe`); the service holds it
//! as a `BoxedPaymentGateway` so tests and future providers can swap in.

use crate::error::PaymentResult;
use crate::payment::PaymentMethodType;
use crate::product::Currency;
use crate::webhook::WebhookEvent;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Parameters for creating a gateway customer
#[derive(Debug, Clone)]
pub struct CustomerRequest {
    pub email: String,
    pub name: String,
    pub metadata: HashMap<String, String>,
}

/// Parameters for creating a payment intent
#[derive(Debug, Clone)]
pub struct PaymentIntentRequest {
    /// Amount in smallest currency unit
    pub amount: i64,
    pub currency: Currency,
    pub customer_id: String,
    pub description: Option<String>,
    pub payment_method_type: PaymentMethodType,
    /// Confirm server-side right away (bank transfer flow)
    pub confirm: bool,
    pub return_url: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// A payment intent as returned by the gateway
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    /// Raw gateway status (`requires_payment_method`, `succeeded`, ...)
    pub status: String,
    pub customer_id: Option<String>,
    pub next_action: Option<NextAction>,
}

/// Follow-up the customer must complete outside the card form
#[derive(Debug, Clone, PartialEq)]
pub enum NextAction {
    /// Printable OXXO voucher
    OxxoVoucher(OxxoVoucher),
    /// Bank transfer instructions for a customer balance payment
    BankTransfer(BankTransferInstructions),
    /// Any other next action type, by name
    Other(String),
}

impl NextAction {
    pub fn type_name(&self) -> &str {
        match self {
            NextAction::OxxoVoucher(_) => "oxxo_display_details",
            NextAction::BankTransfer(_) => "display_bank_transfer_instructions",
            NextAction::Other(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OxxoVoucher {
    pub hosted_voucher_url: Option<String>,
    pub number: Option<String>,
    pub expires_after: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransferInstructions {
    pub reference: Option<String>,
    pub amount_remaining: Option<i64>,
    pub hosted_instructions_url: Option<String>,
    #[serde(default)]
    pub financial_addresses: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spei: Option<SpeiDetails>,
}

/// SPEI account details (first financial address, Mexico)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeiDetails {
    pub clabe: Option<String>,
    pub bank_name: Option<String>,
    pub account_holder_name: Option<String>,
    pub reference: Option<String>,
}

/// Parameters for registering a catalog product with the gateway
#[derive(Debug, Clone)]
pub struct CatalogProductRequest {
    pub name: String,
    pub description: Option<String>,
    /// One-time unit price in smallest currency unit
    pub unit_amount: i64,
    pub currency: Currency,
}

/// Gateway identifiers for a created product and its price
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogProduct {
    pub product_id: String,
    pub price_id: String,
}

/// Core trait for payment provider implementations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a customer record and return its id.
    async fn create_customer(&self, request: &CustomerRequest) -> PaymentResult<String>;

    /// Create a payment intent.
    async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> PaymentResult<PaymentIntent>;

    /// Create a product and its one-time price.
    async fn create_product(&self, request: &CatalogProductRequest)
        -> PaymentResult<CatalogProduct>;

    /// Verify a webhook signature and parse the event.
    ///
    /// # Arguments
    /// * `payload` - Raw webhook body bytes
    /// * `signature` - Signature header from the request
    async fn verify_webhook(&self, payload: &[u8], signature: &str)
        -> PaymentResult<WebhookEvent>;

    /// Publishable key handed to frontends
    fn publishable_key(&self) -> &str;

    /// Get the provider name (for logging).
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a shared payment gateway (dynamic dispatch)
pub type BoxedPaymentGateway = Arc<dyn PaymentGateway>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_action_type_names() {
        let oxxo = NextAction::OxxoVoucher(OxxoVoucher {
            hosted_voucher_url: None,
            number: None,
            expires_after: None,
        });
        assert_eq!(oxxo.type_name(), "oxxo_display_details");
        assert_eq!(
            NextAction::Other("redirect_to_url".into()).type_name(),
            "redirect_to_url"
        );
    }
}
