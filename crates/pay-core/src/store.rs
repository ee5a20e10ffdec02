//! # Store Traits
//!
//! Persistence seams for users, payments and products.
//! Implemented by the in-memory store (`crate::memory`) and the Postgres
//! store in `pay-db`.

use crate::payment::{NewPayment, Payment, PaymentStatus};
use crate::product::{NewProduct, Product, ProductChanges};
use crate::user::{NewUser, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique constraint violated
    #[error("conflict: {0}")]
    Conflict(String),

    /// Row addressed by an update does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Driver / connection failure
    #[error("backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user. Fails with `Conflict` if the email is taken.
    async fn create(&self, user: NewUser) -> StoreResult<User>;

    async fn get_by_id(&self, id: i64) -> StoreResult<Option<User>>;

    /// Lookup by (lowercase) email
    async fn get_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Store (or clear) the hash of a pending password-reset token.
    async fn set_reset_token(
        &self,
        user_id: i64,
        token_hash: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()>;

    /// Atomically swap the password of the user holding an unexpired reset
    /// token with this hash and clear the token. Returns `None` when no such
    /// user exists, which is also what a second use of the same token sees.
    async fn consume_reset_token(
        &self,
        token_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Insert a payment. Fails with `Conflict` on a duplicate intent id.
    async fn insert(&self, payment: NewPayment) -> StoreResult<Payment>;

    async fn find_by_intent_id(&self, payment_intent_id: &str) -> StoreResult<Option<Payment>>;

    /// All payments of a user, oldest first
    async fn list_for_user(&self, user_id: i64) -> StoreResult<Vec<Payment>>;

    /// Gateway customer id recorded on any earlier payment of the user
    async fn customer_id_for_user(&self, user_id: i64) -> StoreResult<Option<String>>;

    /// Move the payment with this intent id out of `pending`.
    /// Returns `None` when no such payment exists or it is no longer pending.
    async fn update_status(
        &self,
        payment_intent_id: &str,
        status: PaymentStatus,
    ) -> StoreResult<Option<Payment>>;

    /// Whether the user has at least one succeeded payment
    async fn has_succeeded_payment(&self, user_id: i64) -> StoreResult<bool>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn insert(&self, product: NewProduct) -> StoreResult<Product>;

    async fn get(&self, id: i64) -> StoreResult<Option<Product>>;

    /// Active products, ordered by id
    async fn list_active(&self) -> StoreResult<Vec<Product>>;

    /// Number of products, active or not
    async fn count(&self) -> StoreResult<i64>;

    /// Apply a partial update. Returns `None` when the product is missing.
    async fn update(&self, id: i64, changes: &ProductChanges) -> StoreResult<Option<Product>>;
}

pub type SharedUserStore = Arc<dyn UserStore>;
pub type SharedPaymentStore = Arc<dyn PaymentStore>;
pub type SharedProductStore = Arc<dyn ProductStore>;
