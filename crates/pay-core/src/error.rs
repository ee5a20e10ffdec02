//! # Payment Error Types
//!
//! Typed error handling for the payment service.
//! All payment operations return `Result<T, PaymentError>`.

use crate::store::StoreError;
use thiserror::Error;

/// Core error type for all payment operations
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Product not found in catalog
    #[error("Product not found: {product_id}")]
    ProductNotFound { product_id: i64 },

    /// Payment not found (or not owned by the caller)
    #[error("Payment not found: {payment_intent_id}")]
    PaymentNotFound { payment_intent_id: String },

    /// Price mismatch or invalid amount
    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },

    /// Currency not supported
    #[error("Unsupported currency: {currency}")]
    UnsupportedCurrency { currency: String },

    /// Payment provider API error
    #[error("Provider error [{provider}]: {message}")]
    ProviderError { provider: String, message: String },

    /// Network/HTTP error communicating with provider
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Webhook signature verification failed
    #[error("Webhook verification failed: {0}")]
    WebhookVerificationFailed(String),

    /// Webhook payload parsing error
    #[error("Webhook parse error: {0}")]
    WebhookParseError(String),

    /// Record already exists (duplicate gateway id, etc.)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Persistence layer failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PaymentError {
    /// Returns the HTTP status code appropriate for this error.
    ///
    /// Gateway failures surface as 400 with the vendor message attached.
    pub fn status_code(&self) -> u16 {
        match self {
            PaymentError::Configuration(_) => 500,
            PaymentError::InvalidRequest(_) => 400,
            PaymentError::ProductNotFound { .. } => 404,
            PaymentError::PaymentNotFound { .. } => 404,
            PaymentError::InvalidAmount { .. } => 400,
            PaymentError::UnsupportedCurrency { .. } => 400,
            PaymentError::ProviderError { .. } => 400,
            PaymentError::NetworkError(_) => 503,
            PaymentError::WebhookVerificationFailed(_) => 400,
            PaymentError::WebhookParseError(_) => 400,
            PaymentError::Conflict(_) => 400,
            PaymentError::Storage(_) => 500,
            PaymentError::Serialization(_) => 500,
        }
    }
}

impl From<StoreError> for PaymentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => PaymentError::Conflict(msg),
            StoreError::NotFound(msg) => PaymentError::InvalidRequest(msg),
            StoreError::Backend(msg) => PaymentError::Storage(msg),
        }
    }
}

/// Result type alias for payment operations
pub type PaymentResult<T> = Result<T, PaymentError>;
