//! # Stripe Gateway
//!
//! `PaymentGateway` implementation on top of the Stripe REST API.
//! Requests are form-encoded; every POST carries a fresh idempotency key.

use crate::config::StripeConfig;
use crate::webhook::{parse_event, verify_signature};
use async_trait::async_trait;
use chrono::Utc;
use pay_core::{
    BankTransferInstructions, CatalogProduct, CatalogProductRequest, CustomerRequest, NextAction,
    OxxoVoucher, PaymentError, PaymentGateway, PaymentIntent, PaymentIntentRequest,
    PaymentMethodType, PaymentResult, SpeiDetails, WebhookEvent,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error, info, instrument};

const PROVIDER: &str = "stripe";

/// Stripe implementation of [`PaymentGateway`]
pub struct StripeGateway {
    config: StripeConfig,
    client: Client,
}

impl StripeGateway {
    /// Create a new gateway with its own HTTP client
    pub fn new(config: StripeConfig) -> PaymentResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| PaymentError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> PaymentResult<Self> {
        Self::new(StripeConfig::from_env()?)
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form_params: &[(String, String)],
    ) -> PaymentResult<T> {
        let url = self.config.endpoint(path);
        let idempotency_key = uuid::Uuid::new_v4().to_string();

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .header("Idempotency-Key", &idempotency_key)
            .form(form_params)
            .send()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            error!("Stripe API error: path={}, status={}, body={}", path, status, body);

            // Parse Stripe error
            if let Ok(error_response) = serde_json::from_str::<StripeErrorResponse>(&body) {
                return Err(PaymentError::ProviderError {
                    provider: PROVIDER.to_string(),
                    message: error_response.error.describe(),
                });
            }

            return Err(PaymentError::ProviderError {
                provider: PROVIDER.to_string(),
                message: format!("HTTP {}: {}", status, body),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            PaymentError::Serialization(format!("Failed to parse Stripe response: {}", e))
        })
    }

    fn intent_form(request: &PaymentIntentRequest) -> Vec<(String, String)> {
        let mut form_params: Vec<(String, String)> = vec![
            ("amount".to_string(), request.amount.to_string()),
            ("currency".to_string(), request.currency.as_str().to_string()),
            ("customer".to_string(), request.customer_id.clone()),
            (
                "payment_method_types[0]".to_string(),
                request.payment_method_type.as_str().to_string(),
            ),
        ];

        if let Some(ref description) = request.description {
            form_params.push(("description".to_string(), description.clone()));
        }

        if request.payment_method_type == PaymentMethodType::CustomerBalance {
            form_params.extend([
                (
                    "payment_method_data[type]".to_string(),
                    "customer_balance".to_string(),
                ),
                (
                    "payment_method_options[customer_balance][funding_type]".to_string(),
                    "bank_transfer".to_string(),
                ),
                (
                    "payment_method_options[customer_balance][bank_transfer][type]".to_string(),
                    "mx_bank_transfer".to_string(),
                ),
            ]);
        }

        if request.confirm {
            form_params.push(("confirm".to_string(), "true".to_string()));
        }
        if let Some(ref return_url) = request.return_url {
            form_params.push(("return_url".to_string(), return_url.clone()));
        }

        let mut metadata: Vec<_> = request.metadata.iter().collect();
        metadata.sort();
        for (key, value) in metadata {
            form_params.push((format!("metadata[{}]", key), value.clone()));
        }

        form_params
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, request))]
    async fn create_customer(&self, request: &CustomerRequest) -> PaymentResult<String> {
        let mut form_params = vec![
            ("email".to_string(), request.email.clone()),
            ("name".to_string(), request.name.clone()),
        ];
        for (key, value) in &request.metadata {
            form_params.push((format!("metadata[{}]", key), value.clone()));
        }

        let customer: StripeObjectId = self.post_form("/v1/customers", &form_params).await?;
        info!("Created Stripe customer: id={}", customer.id);
        Ok(customer.id)
    }

    #[instrument(skip(self, request), fields(amount = request.amount, currency = %request.currency))]
    async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> PaymentResult<PaymentIntent> {
        let form_params = Self::intent_form(request);
        debug!(
            "Creating Stripe payment intent: method={}, confirm={}",
            request.payment_method_type.as_str(),
            request.confirm
        );

        let intent: StripePaymentIntentResponse =
            self.post_form("/v1/payment_intents", &form_params).await?;

        info!(
            "Created Stripe payment intent: id={}, status={}",
            intent.id, intent.status
        );

        Ok(PaymentIntent {
            next_action: intent.next_action.as_ref().map(StripeNextAction::to_next_action),
            id: intent.id,
            client_secret: intent.client_secret,
            status: intent.status,
            customer_id: intent.customer,
        })
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    async fn create_product(
        &self,
        request: &CatalogProductRequest,
    ) -> PaymentResult<CatalogProduct> {
        let mut form_params = vec![
            ("name".to_string(), request.name.clone()),
            ("metadata[created_from_api]".to_string(), "true".to_string()),
        ];
        if let Some(ref description) = request.description {
            form_params.push(("description".to_string(), description.clone()));
        }
        let product: StripeObjectId = self.post_form("/v1/products", &form_params).await?;

        let price_params = vec![
            ("product".to_string(), product.id.clone()),
            ("unit_amount".to_string(), request.unit_amount.to_string()),
            ("currency".to_string(), request.currency.as_str().to_string()),
        ];
        let price: StripeObjectId = self.post_form("/v1/prices", &price_params).await?;

        info!(
            "Created Stripe product: product={}, price={}",
            product.id, price.id
        );

        Ok(CatalogProduct {
            product_id: product.id,
            price_id: price.id,
        })
    }

    #[instrument(skip(self, payload, signature))]
    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> PaymentResult<WebhookEvent> {
        verify_signature(
            &self.config.webhook_secret,
            self.config.webhook_tolerance_secs,
            payload,
            signature,
            Utc::now(),
        )?;
        parse_event(payload)
    }

    fn publishable_key(&self) -> &str {
        &self.config.publishable_key
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeObjectId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripePaymentIntentResponse {
    id: String,
    status: String,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    customer: Option<String>,
    #[serde(default)]
    next_action: Option<StripeNextAction>,
}

#[derive(Debug, Deserialize)]
struct StripeNextAction {
    #[serde(rename = "type")]
    action_type: String,
    #[serde(default)]
    oxxo_display_details: Option<StripeOxxoDetails>,
    #[serde(default)]
    display_bank_transfer_instructions: Option<StripeBankInstructions>,
}

#[derive(Debug, Deserialize)]
struct StripeOxxoDetails {
    #[serde(default)]
    hosted_voucher_url: Option<String>,
    #[serde(default)]
    number: Option<String>,
    #[serde(default)]
    expires_after: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StripeBankInstructions {
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    amount_remaining: Option<i64>,
    #[serde(default)]
    hosted_instructions_url: Option<String>,
    #[serde(default)]
    financial_addresses: Vec<serde_json::Value>,
}

impl StripeNextAction {
    fn to_next_action(&self) -> NextAction {
        if let Some(ref oxxo) = self.oxxo_display_details {
            return NextAction::OxxoVoucher(OxxoVoucher {
                hosted_voucher_url: oxxo.hosted_voucher_url.clone(),
                number: oxxo.number.clone(),
                expires_after: oxxo.expires_after,
            });
        }

        if let Some(ref bank) = self.display_bank_transfer_instructions {
            let spei = bank
                .financial_addresses
                .first()
                .and_then(|address| address.get("spei"))
                .filter(|spei| spei.is_object())
                .map(|spei| {
                    let field = |name: &str| spei.get(name).and_then(|v| v.as_str()).map(String::from);
                    SpeiDetails {
                        clabe: field("clabe"),
                        bank_name: field("bank_name"),
                        account_holder_name: field("account_holder_name"),
                        reference: bank.reference.clone(),
                    }
                });

            return NextAction::BankTransfer(BankTransferInstructions {
                reference: bank.reference.clone(),
                amount_remaining: bank.amount_remaining,
                hosted_instructions_url: bank.hosted_instructions_url.clone(),
                financial_addresses: bank.financial_addresses.clone(),
                spei,
            });
        }

        NextAction::Other(self.action_type.clone())
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

impl StripeError {
    fn describe(&self) -> String {
        match self.code {
            Some(ref code) => format!("{} ({})", self.message, code),
            None => self.message.clone(),
        }
    }
}
