//! # pay-core
//!
//! Core types and traits for the payments backend.
//!
//! This crate provides:
//! - `PaymentGateway` trait for the external payment processor
//! - `Payment`, `Product` and `User` records with their store traits
//! - `PaymentStatusReconciler` for webhook-driven status updates
//! - `PaymentService`, the request-level orchestration
//! - `PaymentError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use pay_core::{CreatePaymentIntent, Currency, InMemoryStore, PaymentMethodType, PaymentService};
//!
//! let store = Arc::new(InMemoryStore::new());
//! let service = PaymentService::new(gateway, store.clone(), store);
//!
//! let receipt = service
//!     .create_payment_intent(&user, CreatePaymentIntent {
//!         amount: 10.50,
//!         currency: Currency::MXN,
//!         description: None,
//!         payment_method_type: PaymentMethodType::Card,
//!     })
//!     .await?;
//!
//! // Hand receipt.client_secret to the frontend
//! ```

pub mod error;
pub mod gateway;
pub mod memory;
pub mod payment;
pub mod product;
pub mod service;
pub mod store;
pub mod user;
pub mod webhook;

// Re-exports for convenience
pub use error::{PaymentError, PaymentResult};
pub use gateway::{
    BankTransferInstructions, BoxedPaymentGateway, CatalogProduct, CatalogProductRequest,
    CustomerRequest, NextAction, OxxoVoucher, PaymentGateway, PaymentIntent,
    PaymentIntentRequest, SpeiDetails,
};
pub use memory::InMemoryStore;
pub use payment::{NewPayment, Payment, PaymentMethodType, PaymentStatus};
pub use product::{
    amount_to_minor, Currency, NewProduct, Product, ProductChanges, ProductUpdate,
};
pub use service::{
    CreatePaymentIntent, CreateProduct, CreateTransferIntent, PaymentIntentReceipt,
    PaymentService,
};
pub use store::{
    PaymentStore, ProductStore, SharedPaymentStore, SharedProductStore, SharedUserStore,
    StoreError, StoreResult, UserStore,
};
pub use user::{NewUser, User};
pub use webhook::{
    dispatch_webhook_event, PaymentStatusReconciler, ReconcileOutcome, WebhookEvent,
    WebhookEventType, WebhookHandler,
};
