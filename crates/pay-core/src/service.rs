//! # Payment Service
//!
//! Explicitly constructed service object injected into request handlers.
//! Maps requests onto gateway calls and keeps the local bookkeeping
//! (payment rows, product catalog) in step.

use crate::error::{PaymentError, PaymentResult};
use crate::gateway::{
    BoxedPaymentGateway, CatalogProductRequest, CustomerRequest, NextAction,
    PaymentIntentRequest,
};
use crate::payment::{NewPayment, Payment, PaymentMethodType, PaymentStatus};
use crate::product::{amount_to_minor, Currency, NewProduct, Product, ProductUpdate};
use crate::store::{SharedPaymentStore, SharedProductStore};
use crate::user::User;
use crate::webhook::{dispatch_webhook_event, PaymentStatusReconciler, ReconcileOutcome};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// Longest accepted product name
pub const MAX_PRODUCT_NAME_LEN: usize = 255;

/// Request for a single-use payment intent
#[derive(Debug, Clone)]
pub struct CreatePaymentIntent {
    /// Decimal amount in `currency`
    pub amount: f64,
    pub currency: Currency,
    pub description: Option<String>,
    pub payment_method_type: PaymentMethodType,
}

/// Request for a bank-transfer (customer balance) payment intent
#[derive(Debug, Clone)]
pub struct CreateTransferIntent {
    pub amount: f64,
    pub currency: Currency,
    pub description: Option<String>,
    pub return_url: Option<String>,
}

/// Result of creating an intent: the stored row plus what the frontend
/// needs to finish the payment.
#[derive(Debug, Clone)]
pub struct PaymentIntentReceipt {
    pub payment: Payment,
    pub client_secret: Option<String>,
    /// Raw gateway status at creation time
    pub gateway_status: String,
    pub next_action: Option<NextAction>,
}

/// Request for a new catalog product
#[derive(Debug, Clone)]
pub struct CreateProduct {
    pub name: String,
    pub description: Option<String>,
    /// Decimal price in `currency`
    pub price: f64,
    pub currency: Currency,
}

pub struct PaymentService {
    gateway: BoxedPaymentGateway,
    payments: SharedPaymentStore,
    products: SharedProductStore,
    reconciler: PaymentStatusReconciler,
}

impl PaymentService {
    pub fn new(
        gateway: BoxedPaymentGateway,
        payments: SharedPaymentStore,
        products: SharedProductStore,
    ) -> Self {
        let reconciler = PaymentStatusReconciler::new(payments.clone());
        Self {
            gateway,
            payments,
            products,
            reconciler,
        }
    }

    /// Publishable key for the frontend
    pub fn publishable_key(&self) -> &str {
        self.gateway.publishable_key()
    }

    pub fn provider_name(&self) -> &'static str {
        self.gateway.provider_name()
    }

    /// Reuse the gateway customer recorded on an earlier payment of this
    /// user, or create a new one.
    #[instrument(skip(self, user), fields(user_id = user.id))]
    pub async fn ensure_customer(&self, user: &User) -> PaymentResult<String> {
        if let Some(existing) = self.payments.customer_id_for_user(user.id).await? {
            debug!("Reusing customer {}", existing);
            return Ok(existing);
        }

        let request = CustomerRequest {
            email: user.email.clone(),
            name: user.full_name(),
            metadata: HashMap::from([("user_id".to_string(), user.id.to_string())]),
        };
        let customer_id = self.gateway.create_customer(&request).await?;
        info!("Created customer {} for user {}", customer_id, user.id);
        Ok(customer_id)
    }

    /// Create a single-use payment intent and record it as `pending`.
    #[instrument(skip(self, user, request), fields(user_id = user.id))]
    pub async fn create_payment_intent(
        &self,
        user: &User,
        request: CreatePaymentIntent,
    ) -> PaymentResult<PaymentIntentReceipt> {
        if request.payment_method_type == PaymentMethodType::CustomerBalance {
            return Err(PaymentError::InvalidRequest(
                "customer_balance payments use the transfer endpoint".to_string(),
            ));
        }

        let amount = amount_to_minor(request.amount, request.currency)?;
        let customer_id = self.ensure_customer(user).await?;

        let intent_request = PaymentIntentRequest {
            amount,
            currency: request.currency,
            customer_id: customer_id.clone(),
            description: request.description.clone(),
            payment_method_type: request.payment_method_type,
            confirm: false,
            return_url: None,
            metadata: HashMap::from([
                ("user_id".to_string(), user.id.to_string()),
                ("user_email".to_string(), user.email.clone()),
            ]),
        };
        let intent = self.gateway.create_payment_intent(&intent_request).await?;

        let payment = self
            .payments
            .insert(NewPayment {
                user_id: user.id,
                stripe_payment_intent_id: intent.id.clone(),
                stripe_customer_id: Some(customer_id),
                amount,
                currency: request.currency,
                status: PaymentStatus::Pending,
                payment_method_type: request.payment_method_type.as_str().to_string(),
                description: request.description,
            })
            .await?;

        info!(
            "Created payment intent {} ({} {})",
            payment.stripe_payment_intent_id, payment.amount, payment.currency
        );

        Ok(PaymentIntentReceipt {
            payment,
            client_secret: intent.client_secret,
            gateway_status: intent.status,
            next_action: intent.next_action,
        })
    }

    /// Create a bank-transfer intent, confirmed immediately so the gateway
    /// returns transfer instructions.
    #[instrument(skip(self, user, request), fields(user_id = user.id))]
    pub async fn create_transfer_payment_intent(
        &self,
        user: &User,
        request: CreateTransferIntent,
    ) -> PaymentResult<PaymentIntentReceipt> {
        let amount = amount_to_minor(request.amount, request.currency)?;
        let customer_id = self.ensure_customer(user).await?;

        let description = request
            .description
            .clone()
            .unwrap_or_else(|| "Bank transfer payment".to_string());

        let intent_request = PaymentIntentRequest {
            amount,
            currency: request.currency,
            customer_id: customer_id.clone(),
            description: request.description.clone(),
            payment_method_type: PaymentMethodType::CustomerBalance,
            confirm: true,
            return_url: request.return_url,
            metadata: HashMap::from([
                ("user_id".to_string(), user.id.to_string()),
                ("description".to_string(), description),
            ]),
        };
        let intent = self.gateway.create_payment_intent(&intent_request).await?;

        let payment = self
            .payments
            .insert(NewPayment {
                user_id: user.id,
                stripe_payment_intent_id: intent.id.clone(),
                stripe_customer_id: Some(customer_id),
                amount,
                currency: request.currency,
                status: PaymentStatus::from_gateway(&intent.status),
                payment_method_type: PaymentMethodType::CustomerBalance.as_str().to_string(),
                description: request.description,
            })
            .await?;

        info!(
            "Created transfer intent {} with gateway status {}",
            payment.stripe_payment_intent_id, intent.status
        );

        Ok(PaymentIntentReceipt {
            payment,
            client_secret: intent.client_secret,
            gateway_status: intent.status,
            next_action: intent.next_action,
        })
    }

    pub async fn payment_history(&self, user: &User) -> PaymentResult<Vec<Payment>> {
        Ok(self.payments.list_for_user(user.id).await?)
    }

    /// A single payment of this user, by gateway intent id
    pub async fn payment_for_user(
        &self,
        user: &User,
        payment_intent_id: &str,
    ) -> PaymentResult<Payment> {
        match self.payments.find_by_intent_id(payment_intent_id).await? {
            Some(payment) if payment.user_id == user.id => Ok(payment),
            _ => Err(PaymentError::PaymentNotFound {
                payment_intent_id: payment_intent_id.to_string(),
            }),
        }
    }

    /// Whether the user has at least one succeeded payment
    pub async fn has_paid(&self, user: &User) -> PaymentResult<bool> {
        Ok(self.payments.has_succeeded_payment(user.id).await?)
    }

    /// Register a product with the gateway, then store it locally.
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_product(&self, request: CreateProduct) -> PaymentResult<Product> {
        let name = request.name.trim();
        if name.is_empty() || name.len() > MAX_PRODUCT_NAME_LEN {
            return Err(PaymentError::InvalidRequest(format!(
                "product name must be 1..={} characters",
                MAX_PRODUCT_NAME_LEN
            )));
        }
        let price = amount_to_minor(request.price, request.currency)?;

        let catalog = self
            .gateway
            .create_product(&CatalogProductRequest {
                name: name.to_string(),
                description: request.description.clone(),
                unit_amount: price,
                currency: request.currency,
            })
            .await?;

        let product = self
            .products
            .insert(NewProduct {
                name: name.to_string(),
                description: request.description,
                price,
                currency: request.currency,
                stripe_product_id: Some(catalog.product_id),
                stripe_price_id: Some(catalog.price_id),
            })
            .await?;

        info!("Created product {} ({})", product.id, product.name);
        Ok(product)
    }

    /// Active products only
    pub async fn list_products(&self) -> PaymentResult<Vec<Product>> {
        Ok(self.products.list_active().await?)
    }

    pub async fn get_product(&self, id: i64) -> PaymentResult<Product> {
        self.products
            .get(id)
            .await?
            .ok_or(PaymentError::ProductNotFound { product_id: id })
    }

    /// Update local product fields. Gateway records are left untouched.
    ///
    /// A new price is validated in the product's own currency, with the
    /// same rules as creation.
    pub async fn update_product(&self, id: i64, update: ProductUpdate) -> PaymentResult<Product> {
        if let Some(name) = &update.name {
            if name.trim().is_empty() || name.len() > MAX_PRODUCT_NAME_LEN {
                return Err(PaymentError::InvalidRequest(format!(
                    "product name must be 1..={} characters",
                    MAX_PRODUCT_NAME_LEN
                )));
            }
        }

        let existing = self.get_product(id).await?;
        let changes = update.into_changes(existing.currency)?;

        self.products
            .update(id, &changes)
            .await?
            .ok_or(PaymentError::ProductNotFound { product_id: id })
    }

    /// Number of products in the catalog, active or not
    pub async fn product_count(&self) -> PaymentResult<i64> {
        Ok(self.products.count().await?)
    }

    /// Verify a webhook delivery and reconcile local payment status.
    ///
    /// Verification failures return an error before any state is read.
    #[instrument(skip(self, payload, signature), fields(bytes = payload.len()))]
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> PaymentResult<ReconcileOutcome> {
        let event = self.gateway.verify_webhook(payload, signature).await?;
        info!(
            "Received webhook: type={:?}, id={}",
            event.event_type, event.event_id
        );
        dispatch_webhook_event(&self.reconciler, &event).await
    }
}
