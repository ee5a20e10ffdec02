//! # In-Memory Store
//!
//! Process-local implementation of every store trait. Used for local
//! development when no database is configured, and throughout the tests.

use crate::payment::{NewPayment, Payment, PaymentStatus};
use crate::product::{NewProduct, Product, ProductChanges};
use crate::store::{PaymentStore, ProductStore, StoreError, StoreResult, UserStore};
use crate::user::{NewUser, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    payments: Vec<Payment>,
    products: Vec<Product>,
    next_user_id: i64,
    next_payment_id: i64,
    next_product_id: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

/// Store backed by vectors behind a single `RwLock`
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!(
                "email already registered: {}",
                user.email
            )));
        }

        let record = User {
            id: next_id(&mut tables.next_user_id),
            name: user.name,
            last_name: user.last_name,
            email: user.email,
            password_hash: user.password_hash,
            reset_token_hash: None,
            reset_token_expires_at: None,
            created_at: Utc::now(),
        };
        tables.users.push(record.clone());
        Ok(record)
    }

    async fn get_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn set_reset_token(
        &self,
        user_id: i64,
        token_hash: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))?;
        user.reset_token_hash = token_hash;
        user.reset_token_expires_at = expires_at;
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        let mut tables = self.tables.write().await;
        let Some(user) = tables
            .users
            .iter_mut()
            .find(|u| u.reset_token_valid(token_hash, now))
        else {
            return Ok(None);
        };

        user.password_hash = new_password_hash.to_string();
        user.reset_token_hash = None;
        user.reset_token_expires_at = None;
        Ok(Some(user.clone()))
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn insert(&self, payment: NewPayment) -> StoreResult<Payment> {
        let mut tables = self.tables.write().await;
        if tables
            .payments
            .iter()
            .any(|p| p.stripe_payment_intent_id == payment.stripe_payment_intent_id)
        {
            return Err(StoreError::Conflict(format!(
                "payment intent already recorded: {}",
                payment.stripe_payment_intent_id
            )));
        }

        let now = Utc::now();
        let record = Payment {
            id: next_id(&mut tables.next_payment_id),
            user_id: payment.user_id,
            stripe_payment_intent_id: payment.stripe_payment_intent_id,
            stripe_customer_id: payment.stripe_customer_id,
            amount: payment.amount,
            currency: payment.currency,
            status: payment.status,
            payment_method_type: payment.payment_method_type,
            description: payment.description,
            created_at: now,
            updated_at: now,
        };
        tables.payments.push(record.clone());
        Ok(record)
    }

    async fn find_by_intent_id(&self, payment_intent_id: &str) -> StoreResult<Option<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .iter()
            .find(|p| p.stripe_payment_intent_id == payment_intent_id)
            .cloned())
    }

    async fn list_for_user(&self, user_id: i64) -> StoreResult<Vec<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn customer_id_for_user(&self, user_id: i64) -> StoreResult<Option<String>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .iter()
            .filter(|p| p.user_id == user_id)
            .find_map(|p| p.stripe_customer_id.clone()))
    }

    async fn update_status(
        &self,
        payment_intent_id: &str,
        status: PaymentStatus,
    ) -> StoreResult<Option<Payment>> {
        let mut tables = self.tables.write().await;
        let Some(payment) = tables
            .payments
            .iter_mut()
            .find(|p| {
                p.stripe_payment_intent_id == payment_intent_id
                    && p.status == PaymentStatus::Pending
            })
        else {
            return Ok(None);
        };

        payment.status = status;
        payment.updated_at = Utc::now();
        Ok(Some(payment.clone()))
    }

    async fn has_succeeded_payment(&self, user_id: i64) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .iter()
            .any(|p| p.user_id == user_id && p.status == PaymentStatus::Succeeded))
    }
}

#[async_trait]
impl ProductStore for InMemoryStore {
    async fn insert(&self, product: NewProduct) -> StoreResult<Product> {
        let mut tables = self.tables.write().await;
        let record = Product {
            id: next_id(&mut tables.next_product_id),
            name: product.name,
            description: product.description,
            price: product.price,
            currency: product.currency,
            stripe_product_id: product.stripe_product_id,
            stripe_price_id: product.stripe_price_id,
            is_active: true,
            created_at: Utc::now(),
        };
        tables.products.push(record.clone());
        Ok(record)
    }

    async fn get(&self, id: i64) -> StoreResult<Option<Product>> {
        let tables = self.tables.read().await;
        Ok(tables.products.iter().find(|p| p.id == id).cloned())
    }

    async fn list_active(&self) -> StoreResult<Vec<Product>> {
        let tables = self.tables.read().await;
        Ok(tables
            .products
            .iter()
            .filter(|p| p.is_active)
            .cloned()
            .collect())
    }

    async fn count(&self) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables.products.len() as i64)
    }

    async fn update(&self, id: i64, changes: &ProductChanges) -> StoreResult<Option<Product>> {
        let mut tables = self.tables.write().await;
        let Some(product) = tables.products.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        changes.apply(product);
        Ok(Some(product.clone()))
    }
}
