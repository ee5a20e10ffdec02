//! # Application State
//!
//! Shared state for the Axum application.
//! Configuration is read and validated once at startup; services are built
//! from it explicitly and handed to the router.

use anyhow::{bail, Context};
use pay_auth::{AuthConfig, AuthService, HttpMailer, LogMailer, SharedMailer, MIN_JWT_SECRET_LEN};
use pay_core::{
    InMemoryStore, PaymentService, SharedPaymentStore, SharedProductStore, SharedUserStore,
};
use pay_stripe::{StripeConfig, StripeGateway};
use std::sync::Arc;
use tracing::{info, warn};

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Postgres URL; in-memory storage when absent outside production
    pub database_url: Option<String>,
    /// Frontend base URL for reset links
    pub frontend_url: String,
    pub jwt_secret: String,
    pub access_token_expire_minutes: u64,
    /// JSON mail relay endpoint; messages are only logged when absent
    pub mail_relay_url: Option<String>,
    pub mail_relay_api_key: Option<String>,
    pub mail_from: String,
    /// Required `X-Admin-Key` for product writes, when set
    pub admin_api_key: Option<String>,
    pub stripe: StripeConfig,
}

impl AppConfig {
    /// Load from environment variables (and `.env` when present)
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build and validate the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let stripe = StripeConfig::from_lookup(&lookup)?;

        let jwt_secret = optional("JWT_SECRET").context("JWT_SECRET not set")?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            bail!("JWT_SECRET must be at least {} bytes", MIN_JWT_SECRET_LEN);
        }

        let port = match optional("PORT") {
            Some(p) => p.parse().with_context(|| format!("invalid PORT: {}", p))?,
            None => 8000,
        };
        let access_token_expire_minutes = match optional("ACCESS_TOKEN_EXPIRE_MINUTES") {
            Some(m) => m
                .parse()
                .with_context(|| format!("invalid ACCESS_TOKEN_EXPIRE_MINUTES: {}", m))?,
            None => 30,
        };

        let config = Self {
            host: optional("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            environment: optional("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            database_url: optional("DATABASE_URL"),
            frontend_url: optional("FRONTEND_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            jwt_secret,
            access_token_expire_minutes,
            mail_relay_url: optional("MAIL_RELAY_URL"),
            mail_relay_api_key: optional("MAIL_RELAY_API_KEY"),
            mail_from: optional("MAIL_FROM").unwrap_or_else(|| "no-reply@localhost".to_string()),
            admin_api_key: optional("ADMIN_API_KEY"),
            stripe,
        };

        if config.is_production() && config.database_url.is_none() {
            bail!("DATABASE_URL is required when ENVIRONMENT=production");
        }

        Ok(config)
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<std::net::SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid socket address {}:{}", self.host, self.port))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            jwt_secret: self.jwt_secret.clone(),
            access_token_lifetime_secs: self.access_token_expire_minutes * 60,
            frontend_url: self.frontend_url.clone(),
            ..AuthConfig::default()
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub payments: Arc<PaymentService>,
    pub auth: Arc<AuthService>,
    /// Application config
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Wire gateway, storage and mailer from configuration.
    pub async fn build(config: AppConfig) -> anyhow::Result<Self> {
        let gateway = StripeGateway::new(config.stripe.clone())
            .map_err(|e| anyhow::anyhow!("Failed to initialize Stripe: {}", e))?;

        let (users, payments, products): (SharedUserStore, SharedPaymentStore, SharedProductStore) =
            match config.database_url {
                Some(ref url) => {
                    let store = Arc::new(
                        pay_db::connect(url, 10)
                            .await
                            .context("Failed to connect to database")?,
                    );
                    (
                        store.clone() as SharedUserStore,
                        store.clone() as SharedPaymentStore,
                        store as SharedProductStore,
                    )
                }
                None => {
                    warn!("DATABASE_URL not set, using in-memory storage (data is lost on restart)");
                    let store = Arc::new(InMemoryStore::new());
                    (
                        store.clone() as SharedUserStore,
                        store.clone() as SharedPaymentStore,
                        store as SharedProductStore,
                    )
                }
            };

        let mailer: SharedMailer = match config.mail_relay_url {
            Some(ref url) => Arc::new(
                HttpMailer::new(url.clone(), config.mail_relay_api_key.clone(), config.mail_from.clone())
                    .map_err(|e| anyhow::anyhow!("Failed to initialize mailer: {}", e))?,
            ),
            None => {
                info!("MAIL_RELAY_URL not set, reset emails will only be logged");
                Arc::new(LogMailer::new())
            }
        };

        let payment_service = PaymentService::new(Arc::new(gateway), payments, products);
        let auth_service = AuthService::new(users, mailer, config.auth_config());

        Ok(Self::from_parts(config, payment_service, auth_service))
    }

    /// Assemble state from already constructed services.
    pub fn from_parts(config: AppConfig, payments: PaymentService, auth: AuthService) -> Self {
        Self {
            payments: Arc::new(payments),
            auth: Arc::new(auth),
            config: Arc::new(config),
        }
    }
}
