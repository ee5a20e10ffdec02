//! # pay-api
//!
//! HTTP API for the Stripe payments and auth backend.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Account, login and password reset endpoints
//! - Payment intent, history and product endpoints
//! - The Stripe webhook that reconciles payment status
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | POST | `/auth/register` | Create account |
//! | POST | `/auth/login` | Get access token |
//! | POST | `/auth/request-password-reset` | Mail reset link |
//! | POST | `/auth/reset-password` | Set new password |
//! | GET | `/auth/verify-token` | Validate bearer token |
//! | GET | `/payments/config` | Publishable key |
//! | POST | `/payments/create-payment-intent` | Card or OXXO intent |
//! | POST | `/payments/create-payment-intent-transfer` | Bank transfer intent |
//! | GET | `/payments/payment-history` | Own payments |
//! | GET | `/payments/payment/{id}` | One own payment |
//! | GET | `/payments/has-paid` | Any succeeded payment |
//! | GET/POST | `/payments/products` | List / create products |
//! | GET/PUT | `/payments/products/{id}` | Get / update product |
//! | POST | `/payments/stripe-webhook` | Stripe webhook |

pub mod auth;
pub mod handlers;
pub mod routes;
pub mod seed;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState};
