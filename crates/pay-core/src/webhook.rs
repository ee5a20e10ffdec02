//! # Webhook Events & Status Reconciliation
//!
//! Verified gateway events are dispatched to a [`WebhookHandler`]. The
//! production handler is [`PaymentStatusReconciler`], which mirrors
//! `payment_intent.succeeded` / `payment_intent.payment_failed` onto the
//! local payment row. Every other event is logged and ignored.

use crate::error::{PaymentError, PaymentResult};
use crate::payment::PaymentStatus;
use crate::store::SharedPaymentStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Webhook event types we act on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    /// Payment intent succeeded
    PaymentSucceeded,
    /// Payment intent failed
    PaymentFailed,
    /// Unknown event (passthrough, carries the raw type)
    Unknown(String),
}

/// A verified, parsed webhook event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Event ID from provider
    pub event_id: String,

    pub event_type: WebhookEventType,

    /// Provider name
    pub provider: String,

    /// Payment intent the event refers to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,

    /// Raw `data.object` (for debugging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<serde_json::Value>,

    pub timestamp: DateTime<Utc>,
}

impl WebhookEvent {
    fn require_intent_id(&self) -> PaymentResult<&str> {
        self.payment_intent_id.as_deref().ok_or_else(|| {
            PaymentError::WebhookParseError(format!(
                "event {} carries no payment intent id",
                self.event_id
            ))
        })
    }
}

/// What handling an event did to local state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Status was changed
    Applied {
        from: PaymentStatus,
        to: PaymentStatus,
    },
    /// Payment already had this status, or the transition is not allowed
    Unchanged,
    /// No local payment for the intent id
    UnknownPayment,
    /// Event type is not acted on
    Ignored,
}

/// Webhook event handler trait
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    async fn on_payment_succeeded(&self, event: &WebhookEvent) -> PaymentResult<ReconcileOutcome>;

    async fn on_payment_failed(&self, event: &WebhookEvent) -> PaymentResult<ReconcileOutcome>;

    /// Called for unknown/unhandled events
    async fn on_unknown_event(&self, event: &WebhookEvent) -> PaymentResult<ReconcileOutcome> {
        info!("Unhandled webhook event: {:?}", event.event_type);
        Ok(ReconcileOutcome::Ignored)
    }
}

/// Dispatch a webhook event to the appropriate handler method
pub async fn dispatch_webhook_event(
    handler: &dyn WebhookHandler,
    event: &WebhookEvent,
) -> PaymentResult<ReconcileOutcome> {
    match &event.event_type {
        WebhookEventType::PaymentSucceeded => handler.on_payment_succeeded(event).await,
        WebhookEventType::PaymentFailed => handler.on_payment_failed(event).await,
        WebhookEventType::Unknown(_) => handler.on_unknown_event(event).await,
    }
}

/// Mirrors gateway payment outcomes onto local payment rows.
///
/// The store only moves rows that are still pending, so redelivered or
/// concurrent events cannot overwrite a settled payment.
pub struct PaymentStatusReconciler {
    payments: SharedPaymentStore,
}

impl PaymentStatusReconciler {
    pub fn new(payments: SharedPaymentStore) -> Self {
        Self { payments }
    }

    #[instrument(skip(self))]
    async fn apply(
        &self,
        payment_intent_id: &str,
        target: PaymentStatus,
    ) -> PaymentResult<ReconcileOutcome> {
        let Some(payment) = self.payments.find_by_intent_id(payment_intent_id).await? else {
            info!("No local payment for intent {}, ignoring", payment_intent_id);
            return Ok(ReconcileOutcome::UnknownPayment);
        };

        if payment.status == target {
            debug!("Payment {} already {}", payment_intent_id, target);
            return Ok(ReconcileOutcome::Unchanged);
        }

        if !payment.status.can_transition_to(target) {
            warn!(
                "Refusing transition {} -> {} for payment {}",
                payment.status, target, payment_intent_id
            );
            return Ok(ReconcileOutcome::Unchanged);
        }

        match self.payments.update_status(payment_intent_id, target).await? {
            Some(_) => {
                info!(
                    "Payment {} status {} -> {}",
                    payment_intent_id, payment.status, target
                );
                Ok(ReconcileOutcome::Applied {
                    from: payment.status,
                    to: target,
                })
            }
            None => {
                warn!(
                    "Payment {} settled concurrently, {} not applied",
                    payment_intent_id, target
                );
                Ok(ReconcileOutcome::Unchanged)
            }
        }
    }
}

#[async_trait]
impl WebhookHandler for PaymentStatusReconciler {
    async fn on_payment_succeeded(&self, event: &WebhookEvent) -> PaymentResult<ReconcileOutcome> {
        let intent_id = event.require_intent_id()?;
        self.apply(intent_id, PaymentStatus::Succeeded).await
    }

    async fn on_payment_failed(&self, event: &WebhookEvent) -> PaymentResult<ReconcileOutcome> {
        let intent_id = event.require_intent_id()?;
        self.apply(intent_id, PaymentStatus::Failed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::payment::NewPayment;
    use crate::product::Currency;
    use crate::store::PaymentStore;
    use std::sync::Arc;

    fn event(event_type: WebhookEventType, intent: Option<&str>) -> WebhookEvent {
        WebhookEvent {
            event_id: "evt_test".to_string(),
            event_type,
            provider: "stripe".to_string(),
            payment_intent_id: intent.map(String::from),
            raw_data: None,
            timestamp: Utc::now(),
        }
    }

    async fn store_with_pending(intent: &str) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        PaymentStore::insert(
            store.as_ref(),
            NewPayment {
                user_id: 1,
                stripe_payment_intent_id: intent.to_string(),
                stripe_customer_id: Some("cus_1".into()),
                amount: 2999,
                currency: Currency::USD,
                status: PaymentStatus::Pending,
                payment_method_type: "card".into(),
                description: None,
            },
        )
        .await
        .unwrap();
        store
    }

    #[tokio::test]
    async fn test_succeeded_applies_once() {
        let store = store_with_pending("pi_1").await;
        let reconciler = PaymentStatusReconciler::new(store.clone());
        let evt = event(WebhookEventType::PaymentSucceeded, Some("pi_1"));

        let first = dispatch_webhook_event(&reconciler, &evt).await.unwrap();
        assert_eq!(
            first,
            ReconcileOutcome::Applied {
                from: PaymentStatus::Pending,
                to: PaymentStatus::Succeeded
            }
        );

        let second = dispatch_webhook_event(&reconciler, &evt).await.unwrap();
        assert_eq!(second, ReconcileOutcome::Unchanged);

        let payment = store.find_by_intent_id("pi_1").await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_failed_after_succeeded_is_refused() {
        let store = store_with_pending("pi_1").await;
        let reconciler = PaymentStatusReconciler::new(store.clone());

        dispatch_webhook_event(
            &reconciler,
            &event(WebhookEventType::PaymentSucceeded, Some("pi_1")),
        )
        .await
        .unwrap();
        let outcome = dispatch_webhook_event(
            &reconciler,
            &event(WebhookEventType::PaymentFailed, Some("pi_1")),
        )
        .await
        .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Unchanged);
        let payment = store.find_by_intent_id("pi_1").await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_concurrent_outcomes_settle_once() {
        let store = store_with_pending("pi_1").await;
        let reconciler = PaymentStatusReconciler::new(store.clone());
        let succeeded = event(WebhookEventType::PaymentSucceeded, Some("pi_1"));
        let failed = event(WebhookEventType::PaymentFailed, Some("pi_1"));

        let (a, b) = tokio::join!(
            dispatch_webhook_event(&reconciler, &succeeded),
            dispatch_webhook_event(&reconciler, &failed),
        );
        let outcomes = [a.unwrap(), b.unwrap()];

        let applied: Vec<_> = outcomes
            .iter()
            .filter_map(|o| match o {
                ReconcileOutcome::Applied { to, .. } => Some(*to),
                _ => None,
            })
            .collect();
        assert_eq!(applied.len(), 1);
        assert!(outcomes.contains(&ReconcileOutcome::Unchanged));
        let payment = store.find_by_intent_id("pi_1").await.unwrap().unwrap();
        assert_eq!(payment.status, applied[0]);
    }

    #[tokio::test]
    async fn test_unknown_intent_is_noop() {
        let store = store_with_pending("pi_1").await;
        let reconciler = PaymentStatusReconciler::new(store.clone());

        let outcome = dispatch_webhook_event(
            &reconciler,
            &event(WebhookEventType::PaymentFailed, Some("pi_other")),
        )
        .await
        .unwrap();

        assert_eq!(outcome, ReconcileOutcome::UnknownPayment);
        let payment = store.find_by_intent_id("pi_1").await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_other_events_ignored() {
        let store = store_with_pending("pi_1").await;
        let reconciler = PaymentStatusReconciler::new(store);

        let outcome = dispatch_webhook_event(
            &reconciler,
            &event(WebhookEventType::Unknown("charge.refunded".into()), Some("pi_1")),
        )
        .await
        .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_missing_intent_id_is_parse_error() {
        let store = store_with_pending("pi_1").await;
        let reconciler = PaymentStatusReconciler::new(store);

        let err = dispatch_webhook_event(
            &reconciler,
            &event(WebhookEventType::PaymentSucceeded, None),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PaymentError::WebhookParseError(_)));
    }
}
