//! # Stripe Webhook Handling
//!
//! Signature verification and event parsing for `Stripe-Signature`
//! deliveries. Nothing in an unverified body is ever parsed.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use pay_core::{PaymentError, PaymentResult, WebhookEvent, WebhookEventType};
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

fn parse_signature_header(header: &str) -> PaymentResult<SignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => signatures.push(value.to_string()),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        PaymentError::WebhookVerificationFailed("Missing timestamp in signature".to_string())
    })?;

    if signatures.is_empty() {
        return Err(PaymentError::WebhookVerificationFailed(
            "No v1 signature found".to_string(),
        ));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> PaymentResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::Configuration(format!("Invalid webhook secret: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Build a `Stripe-Signature` header value for `payload`.
///
/// Used to sign test deliveries and local replays.
pub fn signature_header(secret: &str, timestamp: i64, payload: &[u8]) -> PaymentResult<String> {
    let signature = compute_signature(secret, timestamp, payload)?;
    Ok(format!("t={},v1={}", timestamp, signature))
}

/// Check `header` against `payload` at time `now`.
pub fn verify_signature(
    secret: &str,
    tolerance_secs: i64,
    payload: &[u8],
    header: &str,
    now: DateTime<Utc>,
) -> PaymentResult<()> {
    let parts = parse_signature_header(header)?;

    if (now.timestamp() - parts.timestamp).abs() > tolerance_secs {
        return Err(PaymentError::WebhookVerificationFailed(
            "Timestamp outside tolerance".to_string(),
        ));
    }

    let expected = compute_signature(secret, parts.timestamp, payload)?;
    let valid = parts
        .signatures
        .iter()
        .any(|sig| constant_time_compare(sig, &expected));

    if !valid {
        return Err(PaymentError::WebhookVerificationFailed(
            "Signature mismatch".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct StripeWebhookEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    created: i64,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Map<String, serde_json::Value>,
}

/// Parse an already verified event body.
pub fn parse_event(payload: &[u8]) -> PaymentResult<WebhookEvent> {
    let event: StripeWebhookEvent = serde_json::from_slice(payload).map_err(|e| {
        PaymentError::WebhookParseError(format!("Failed to parse webhook: {}", e))
    })?;

    debug!("Parsed Stripe webhook: type={}", event.event_type);

    let event_type = match event.event_type.as_str() {
        "payment_intent.succeeded" => WebhookEventType::PaymentSucceeded,
        "payment_intent.payment_failed" => WebhookEventType::PaymentFailed,
        other => WebhookEventType::Unknown(other.to_string()),
    };

    // data.object is the payment intent itself for payment_intent.* events
    let payment_intent_id = match event_type {
        WebhookEventType::Unknown(_) => event
            .data
            .object
            .get("payment_intent")
            .and_then(|v| v.as_str())
            .map(String::from),
        _ => event
            .data
            .object
            .get("id")
            .and_then(|v| v.as_str())
            .map(String::from),
    };

    Ok(WebhookEvent {
        event_id: event.id,
        event_type,
        provider: "stripe".to_string(),
        payment_intent_id,
        raw_data: Some(serde_json::Value::Object(event.data.object)),
        timestamp: DateTime::from_timestamp(event.created, 0).unwrap_or_else(Utc::now),
    })
}
