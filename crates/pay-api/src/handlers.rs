//! # Request Handlers
//!
//! Axum request handlers for the payment API.
//! Amounts cross the HTTP boundary as decimals and are stored in minor units.

use crate::auth::CurrentUser;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use pay_auth::AuthError;
use pay_core::{
    BankTransferInstructions, CreatePaymentIntent, CreateProduct, CreateTransferIntent, Currency,
    NextAction, Payment, PaymentError, PaymentIntentReceipt, PaymentMethodType, Product,
    ProductUpdate, ReconcileOutcome, SpeiDetails,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn status_from(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

pub(crate) fn payment_error_to_response(err: PaymentError) -> ApiError {
    let code = err.status_code();
    if code >= 500 {
        error!("Payment request failed: {}", err);
    }
    let response = match err {
        PaymentError::ProviderError { ref message, .. } => {
            ErrorResponse::new("Payment provider error", code).with_details(message.clone())
        }
        // internal details stay in the logs
        PaymentError::Storage(_) | PaymentError::Configuration(_) | PaymentError::Serialization(_) => {
            ErrorResponse::new("Internal server error", code)
        }
        PaymentError::Conflict(ref detail) => {
            warn!("Payment request conflicted: {}", detail);
            ErrorResponse::new("Resource already exists", code)
        }
        ref other => ErrorResponse::new(other.to_string(), code),
    };
    (status_from(code), Json(response))
}

pub(crate) fn auth_error_to_response(err: AuthError) -> ApiError {
    let code = err.status_code();
    let message = match err {
        AuthError::Crypto(_) | AuthError::Storage(_) | AuthError::Mail(_) => {
            error!("Auth request failed: {}", err);
            "Internal server error".to_string()
        }
        other => other.to_string(),
    };
    (status_from(code), Json(ErrorResponse::new(message, code)))
}

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new(message, 400)),
    )
}

/// Payment as returned to clients
#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: i64,
    pub stripe_payment_intent_id: String,
    /// Decimal amount
    pub amount: f64,
    pub currency: Currency,
    pub status: String,
    pub payment_method_type: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            amount: payment.amount_decimal(),
            stripe_payment_intent_id: payment.stripe_payment_intent_id,
            currency: payment.currency,
            status: payment.status.as_str().to_string(),
            payment_method_type: payment.payment_method_type,
            description: payment.description,
            created_at: payment.created_at,
        }
    }
}

/// Product as returned to clients
#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// Decimal price
    pub price: f64,
    pub currency: Currency,
    pub stripe_product_id: Option<String>,
    pub stripe_price_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            price: product.price_decimal(),
            name: product.name,
            description: product.description,
            currency: product.currency,
            stripe_product_id: product.stripe_product_id,
            stripe_price_id: product.stripe_price_id,
            is_active: product.is_active,
            created_at: product.created_at,
        }
    }
}

fn default_currency() -> String {
    Currency::default().as_str().to_string()
}

fn default_method() -> String {
    PaymentMethodType::Card.as_str().to_string()
}

/// Create payment intent request
#[derive(Debug, Deserialize)]
pub struct CreatePaymentIntentRequest {
    /// Decimal amount (e.g. 10.50)
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub description: Option<String>,
    /// `card`, `oxxo` or `customer_balance`
    #[serde(default = "default_method")]
    pub payment_method_types: String,
}

/// Create bank transfer payment intent request
#[derive(Debug, Deserialize)]
pub struct CreateTransferIntentRequest {
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub return_url: Option<String>,
    /// Must be `customer_balance` when given
    #[serde(default)]
    pub payment_method_types: Option<String>,
}

/// Payment intent creation response
#[derive(Debug, Serialize)]
pub struct PaymentIntentResponse {
    pub payment_intent_id: String,
    pub client_secret: Option<String>,
    pub status: String,
    pub amount: f64,
    pub currency: Currency,
    pub payment_method_types: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_action_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oxxo_voucher_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oxxo_barcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oxxo_expires_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_transfer_details: Option<BankTransferInstructions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spei_details: Option<SpeiDetails>,
}

impl From<PaymentIntentReceipt> for PaymentIntentResponse {
    fn from(receipt: PaymentIntentReceipt) -> Self {
        let mut response = Self {
            amount: receipt.payment.amount_decimal(),
            payment_intent_id: receipt.payment.stripe_payment_intent_id,
            client_secret: receipt.client_secret,
            status: receipt.gateway_status,
            currency: receipt.payment.currency,
            payment_method_types: receipt.payment.payment_method_type,
            next_action_type: receipt.next_action.as_ref().map(|a| a.type_name().to_string()),
            oxxo_voucher_url: None,
            oxxo_barcode: None,
            oxxo_expires_at: None,
            bank_transfer_details: None,
            spei_details: None,
        };

        match receipt.next_action {
            Some(NextAction::OxxoVoucher(voucher)) => {
                response.oxxo_voucher_url = voucher.hosted_voucher_url;
                response.oxxo_barcode = voucher.number;
                response.oxxo_expires_at = voucher.expires_after;
            }
            Some(NextAction::BankTransfer(mut instructions)) => {
                response.spei_details = instructions.spei.take();
                response.bank_transfer_details = Some(instructions);
            }
            Some(NextAction::Other(_)) | None => {}
        }
        response
    }
}

/// Create product request
#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Decimal price
    pub price: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "stripe-auth-backend",
        "version": env!("CARGO_PKG_VERSION"),
        "provider": state.payments.provider_name()
    }))
}

/// Publishable key for the frontend
pub async fn payment_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "publishable_key": state.payments.publishable_key()
    }))
}

/// Create a single-use payment intent (card or OXXO)
#[instrument(skip(state, user, request), fields(user_id = user.id))]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreatePaymentIntentRequest>,
) -> Result<Json<PaymentIntentResponse>, ApiError> {
    let currency: Currency = request.currency.parse().map_err(payment_error_to_response)?;
    let payment_method_type: PaymentMethodType = request
        .payment_method_types
        .parse()
        .map_err(payment_error_to_response)?;

    let receipt = state
        .payments
        .create_payment_intent(
            &user,
            CreatePaymentIntent {
                amount: request.amount,
                currency,
                description: request.description,
                payment_method_type,
            },
        )
        .await
        .map_err(|e| {
            warn!("Failed to create payment intent: {}", e);
            payment_error_to_response(e)
        })?;

    Ok(Json(receipt.into()))
}

/// Create and confirm a bank transfer (customer balance) payment intent
#[instrument(skip(state, user, request), fields(user_id = user.id))]
pub async fn create_transfer_payment_intent(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreateTransferIntentRequest>,
) -> Result<Json<PaymentIntentResponse>, ApiError> {
    if let Some(ref method) = request.payment_method_types {
        let method: PaymentMethodType = method.parse().map_err(payment_error_to_response)?;
        if method != PaymentMethodType::CustomerBalance {
            return Err(bad_request("This endpoint only accepts customer_balance payments"));
        }
    }
    let currency: Currency = request.currency.parse().map_err(payment_error_to_response)?;

    let receipt = state
        .payments
        .create_transfer_payment_intent(
            &user,
            CreateTransferIntent {
                amount: request.amount,
                currency,
                description: request.description,
                return_url: request.return_url,
            },
        )
        .await
        .map_err(|e| {
            warn!("Failed to create transfer payment intent: {}", e);
            payment_error_to_response(e)
        })?;

    Ok(Json(receipt.into()))
}

/// Payments of the current user
pub async fn payment_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<PaymentResponse>>, ApiError> {
    let payments = state
        .payments
        .payment_history(&user)
        .await
        .map_err(payment_error_to_response)?;

    Ok(Json(payments.into_iter().map(PaymentResponse::from).collect()))
}

/// One payment of the current user
pub async fn get_payment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(payment_intent_id): Path<String>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payment = state
        .payments
        .payment_for_user(&user, &payment_intent_id)
        .await
        .map_err(payment_error_to_response)?;

    Ok(Json(payment.into()))
}

/// Whether the current user has a succeeded payment
pub async fn has_paid(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let paid = state
        .payments
        .has_paid(&user)
        .await
        .map_err(payment_error_to_response)?;

    info!("User {} payment check: {}", user.id, paid);

    Ok(Json(serde_json::json!({
        "has_paid": paid,
        "user_id": user.id,
        "email": user.email
    })))
}

/// Product writes are gated by `X-Admin-Key` when an admin key is configured.
fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(ref expected) = state.config.admin_api_key else {
        return Ok(());
    };
    let provided = headers.get("x-admin-key").and_then(|v| v.to_str().ok());
    match provided {
        Some(key) if key == expected => Ok(()),
        Some(_) => Err((
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::new("Invalid admin key", 403)),
        )),
        None => Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("Missing X-Admin-Key header", 401)),
        )),
    }
}

/// Create a product in the gateway and the local catalog
#[instrument(skip(state, headers, request), fields(name = %request.name))]
pub async fn create_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateProductRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    require_admin(&state, &headers)?;
    let currency: Currency = request.currency.parse().map_err(payment_error_to_response)?;

    let product = state
        .payments
        .create_product(CreateProduct {
            name: request.name,
            description: request.description,
            price: request.price,
            currency,
        })
        .await
        .map_err(payment_error_to_response)?;

    Ok(Json(product.into()))
}

/// Active products
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let products = state
        .payments
        .list_products()
        .await
        .map_err(payment_error_to_response)?;

    Ok(Json(products.into_iter().map(ProductResponse::from).collect()))
}

/// Get single product
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state
        .payments
        .get_product(product_id)
        .await
        .map_err(payment_error_to_response)?;

    Ok(Json(product.into()))
}

/// Update local product fields
pub async fn update_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(product_id): Path<i64>,
    Json(update): Json<ProductUpdate>,
) -> Result<Json<ProductResponse>, ApiError> {
    require_admin(&state, &headers)?;

    let product = state
        .payments
        .update_product(product_id, update)
        .await
        .map_err(payment_error_to_response)?;

    Ok(Json(product.into()))
}

fn outcome_label(outcome: &ReconcileOutcome) -> &'static str {
    match outcome {
        ReconcileOutcome::Applied { .. } => "applied",
        ReconcileOutcome::Unchanged => "unchanged",
        ReconcileOutcome::UnknownPayment => "unknown_payment",
        ReconcileOutcome::Ignored => "ignored",
    }
}

/// Handle Stripe webhook (raw body; the signature covers the exact bytes)
#[instrument(skip(state, headers, body))]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    // Get signature header
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| bad_request("Missing Stripe-Signature header"))?;

    let outcome = state
        .payments
        .handle_webhook(&body, signature)
        .await
        .map_err(|e| {
            error!("Webhook rejected: {}", e);
            payment_error_to_response(e)
        })?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "outcome": outcome_label(&outcome)
    })))
}
