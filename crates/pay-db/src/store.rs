//! Postgres implementation of the pay-core store traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pay_core::{
    Currency, NewPayment, NewProduct, NewUser, Payment, PaymentStatus, PaymentStore, Product,
    ProductChanges, ProductStore, StoreError, StoreResult, User, UserStore,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::error;

const USER_COLUMNS: &str = "id, name, last_name, email, password_hash, reset_token_hash, \
                            reset_token_expires_at, created_at";

const PAYMENT_COLUMNS: &str = "id, user_id, stripe_payment_intent_id, stripe_customer_id, amount, \
                               currency, status, payment_method_type, description, created_at, updated_at";

const PRODUCT_COLUMNS: &str = "id, name, description, price, currency, stripe_product_id, \
                               stripe_price_id, is_active, created_at";

#[derive(Clone)]
pub struct PgStore {
    pub pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db) = err {
        if db.is_unique_violation() {
            return StoreError::Conflict(db.message().to_string());
        }
    }
    error!("Database error: {}", err);
    StoreError::Backend(err.to_string())
}

fn decode_error(what: &str, err: impl std::fmt::Display) -> sqlx::Error {
    sqlx::Error::Decode(format!("{}: {}", what, err).into())
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        reset_token_hash: row.try_get("reset_token_hash")?,
        reset_token_expires_at: row.try_get("reset_token_expires_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn payment_from_row(row: &PgRow) -> Result<Payment, sqlx::Error> {
    let currency: String = row.try_get("currency")?;
    let status: String = row.try_get("status")?;
    Ok(Payment {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        stripe_payment_intent_id: row.try_get("stripe_payment_intent_id")?,
        stripe_customer_id: row.try_get("stripe_customer_id")?,
        amount: row.try_get("amount")?,
        currency: currency
            .parse::<Currency>()
            .map_err(|e| decode_error("currency", e))?,
        status: status
            .parse::<PaymentStatus>()
            .map_err(|e| decode_error("status", e))?,
        payment_method_type: row.try_get("payment_method_type")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn product_from_row(row: &PgRow) -> Result<Product, sqlx::Error> {
    let currency: String = row.try_get("currency")?;
    Ok(Product {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: row.try_get("price")?,
        currency: currency
            .parse::<Currency>()
            .map_err(|e| decode_error("currency", e))?,
        stripe_product_id: row.try_get("stripe_product_id")?,
        stripe_price_id: row.try_get("stripe_price_id")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl UserStore for PgStore {
    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let row = sqlx::query(&format!(
            "INSERT INTO users (name, last_name, email, password_hash) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        ))
        .bind(user.name)
        .bind(user.last_name)
        .bind(user.email)
        .bind(user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        user_from_row(&row).map_err(backend)
    }

    async fn get_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.as_ref().map(user_from_row).transpose().map_err(backend)
    }

    async fn get_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.as_ref().map(user_from_row).transpose().map_err(backend)
    }

    async fn set_reset_token(
        &self,
        user_id: i64,
        token_hash: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE users SET reset_token_hash = $2, reset_token_expires_at = $3 WHERE id = $1",
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {}", user_id)));
        }
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        // single statement: a token can only ever match one UPDATE
        let row = sqlx::query(&format!(
            "UPDATE users \
             SET password_hash = $2, reset_token_hash = NULL, reset_token_expires_at = NULL \
             WHERE reset_token_hash = $1 AND reset_token_expires_at > $3 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(token_hash)
        .bind(new_password_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.as_ref().map(user_from_row).transpose().map_err(backend)
    }
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn insert(&self, payment: NewPayment) -> StoreResult<Payment> {
        let row = sqlx::query(&format!(
            "INSERT INTO payments (user_id, stripe_payment_intent_id, stripe_customer_id, amount, \
             currency, status, payment_method_type, description) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(payment.user_id)
        .bind(payment.stripe_payment_intent_id)
        .bind(payment.stripe_customer_id)
        .bind(payment.amount)
        .bind(payment.currency.as_str())
        .bind(payment.status.as_str())
        .bind(payment.payment_method_type)
        .bind(payment.description)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        payment_from_row(&row).map_err(backend)
    }

    async fn find_by_intent_id(&self, payment_intent_id: &str) -> StoreResult<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE stripe_payment_intent_id = $1"
        ))
        .bind(payment_intent_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.as_ref().map(payment_from_row).transpose().map_err(backend)
    }

    async fn list_for_user(&self, user_id: i64) -> StoreResult<Vec<Payment>> {
        let rows = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE user_id = $1 ORDER BY id ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter()
            .map(payment_from_row)
            .collect::<Result<_, _>>()
            .map_err(backend)
    }

    async fn customer_id_for_user(&self, user_id: i64) -> StoreResult<Option<String>> {
        let row = sqlx::query(
            "SELECT stripe_customer_id FROM payments \
             WHERE user_id = $1 AND stripe_customer_id IS NOT NULL \
             ORDER BY id ASC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(|r| r.try_get("stripe_customer_id"))
            .transpose()
            .map_err(backend)
    }

    async fn update_status(
        &self,
        payment_intent_id: &str,
        status: PaymentStatus,
    ) -> StoreResult<Option<Payment>> {
        let row = sqlx::query(&format!(
            "UPDATE payments SET status = $2, updated_at = now() \
             WHERE stripe_payment_intent_id = $1 AND status = 'pending' \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(payment_intent_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.as_ref().map(payment_from_row).transpose().map_err(backend)
    }

    async fn has_succeeded_payment(&self, user_id: i64) -> StoreResult<bool> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM payments WHERE user_id = $1 AND status = 'succeeded') AS paid",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        row.try_get("paid").map_err(backend)
    }
}

#[async_trait]
impl ProductStore for PgStore {
    async fn insert(&self, product: NewProduct) -> StoreResult<Product> {
        let row = sqlx::query(&format!(
            "INSERT INTO products (name, description, price, currency, stripe_product_id, stripe_price_id) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(product.name)
        .bind(product.description)
        .bind(product.price)
        .bind(product.currency.as_str())
        .bind(product.stripe_product_id)
        .bind(product.stripe_price_id)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        product_from_row(&row).map_err(backend)
    }

    async fn get(&self, id: i64) -> StoreResult<Option<Product>> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.as_ref().map(product_from_row).transpose().map_err(backend)
    }

    async fn list_active(&self) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter()
            .map(product_from_row)
            .collect::<Result<_, _>>()
            .map_err(backend)
    }

    async fn count(&self) -> StoreResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM products")
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;

        row.try_get("n").map_err(backend)
    }

    async fn update(&self, id: i64, changes: &ProductChanges) -> StoreResult<Option<Product>> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut product = product_from_row(&row).map_err(backend)?;
        changes.apply(&mut product);

        let row = sqlx::query(&format!(
            "UPDATE products SET name = $2, description = $3, price = $4, is_active = $5 \
             WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.is_active)
        .fetch_one(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        product_from_row(&row).map(Some).map_err(backend)
    }
}
