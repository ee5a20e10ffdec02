//! # Routes
//!
//! Axum router configuration for the payment API.

use crate::{auth, handlers};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Auth:
///   - POST /auth/register, /auth/login
///   - POST /auth/request-password-reset, /auth/reset-password
///   - GET  /auth/verify-token, /auth/me
///
/// - Payments:
///   - GET  /payments/config
///   - POST /payments/create-payment-intent
///   - POST /payments/create-payment-intent-transfer
///   - GET  /payments/payment-history, /payments/payment/{payment_intent_id}
///   - GET  /payments/has-paid
///   - POST /payments/products, GET /payments/products
///   - GET|PUT /payments/products/{product_id}
///   - POST /payments/stripe-webhook
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/request-password-reset", post(auth::request_password_reset))
        .route("/reset-password", post(auth::reset_password))
        .route("/verify-token", get(auth::verify_token))
        .route("/me", get(auth::me));

    let payment_routes = Router::new()
        .route("/config", get(handlers::payment_config))
        .route("/create-payment-intent", post(handlers::create_payment_intent))
        .route(
            "/create-payment-intent-transfer",
            post(handlers::create_transfer_payment_intent),
        )
        .route("/payment-history", get(handlers::payment_history))
        .route("/payment/{payment_intent_id}", get(handlers::get_payment))
        .route("/has-paid", get(handlers::has_paid))
        .route(
            "/products",
            get(handlers::list_products).post(handlers::create_product),
        )
        .route(
            "/products/{product_id}",
            get(handlers::get_product).put(handlers::update_product),
        )
        // Raw body; the signature covers the exact bytes
        .route("/stripe-webhook", post(handlers::stripe_webhook));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/auth", auth_routes)
        .nest("/payments", payment_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
