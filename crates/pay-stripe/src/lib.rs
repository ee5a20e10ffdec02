//! # pay-stripe
//!
//! Stripe gateway for the payments backend.
//!
//! [`StripeGateway`] implements `pay_core::PaymentGateway`:
//!
//! - Customers, created once per user and reused
//! - Payment intents for card, OXXO and SPEI bank transfer (customer balance)
//! - Products with a single one-time price
//! - `Stripe-Signature` webhook verification
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pay_stripe::StripeGateway;
//! use pay_core::PaymentService;
//!
//! let gateway = Arc::new(StripeGateway::from_env()?);
//! let service = PaymentService::new(gateway, payments, products);
//! ```
//!
//! ## Webhook Handling
//!
//! ```rust,ignore
//! // In your webhook endpoint, with the raw body bytes:
//! let outcome = service.handle_webhook(&body, signature_header).await?;
//! ```

pub mod client;
pub mod config;
pub mod webhook;

// Re-exports
pub use client::StripeGateway;
pub use config::StripeConfig;
pub use webhook::{parse_event, signature_header, verify_signature};
