//! End-to-end API tests: in-memory storage, logged mail and a mocked Stripe API.

use axum::body::Bytes;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use pay_api::{create_router, AppConfig, AppState};
use pay_auth::{AuthService, LogMailer};
use pay_core::{InMemoryStore, PaymentService};
use pay_stripe::{signature_header, StripeGateway};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WEBHOOK_SECRET: &str = "whsec_api_tests";

struct Harness {
    server: TestServer,
    stripe: MockServer,
    mailer: Arc<LogMailer>,
}

async fn harness(admin_key: Option<&str>) -> Harness {
    let stripe = MockServer::start().await;

    let mut vars: HashMap<String, String> = [
        ("STRIPE_SECRET_KEY", "sk_test_api"),
        ("STRIPE_PUBLISHABLE_KEY", "pk_test_api"),
        ("STRIPE_WEBHOOK_SECRET", WEBHOOK_SECRET),
        ("JWT_SECRET", "an-api-test-secret-of-32-bytes!!"),
        ("FRONTEND_URL", "https://app.example.com"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    vars.insert("STRIPE_API_BASE_URL".into(), stripe.uri());
    if let Some(key) = admin_key {
        vars.insert("ADMIN_API_KEY".into(), key.to_string());
    }
    let config = AppConfig::from_lookup(|key| vars.get(key).cloned()).unwrap();

    let store = Arc::new(InMemoryStore::new());
    let mailer = Arc::new(LogMailer::new());
    let gateway = StripeGateway::new(config.stripe.clone()).unwrap();

    let payments = PaymentService::new(Arc::new(gateway), store.clone(), store.clone());
    let auth = AuthService::new(store, mailer.clone(), config.auth_config());
    let state = AppState::from_parts(config, payments, auth);

    Harness {
        server: TestServer::new(create_router(state)).unwrap(),
        stripe,
        mailer,
    }
}

async fn mock_customer(stripe: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "cus_api" })))
        .mount(stripe)
        .await;
}

async fn mock_card_intent(stripe: &MockServer, intent_id: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": intent_id,
            "status": "requires_payment_method",
            "client_secret": format!("{}_secret", intent_id),
            "customer": "cus_api",
            "next_action": null
        })))
        .mount(stripe)
        .await;
}

async fn register_and_login(server: &TestServer, email: &str) -> String {
    server
        .post("/auth/register")
        .json(&json!({
            "name": "Ana",
            "last_name": "López",
            "email": email,
            "password": "correct-horse"
        }))
        .await
        .assert_status(StatusCode::CREATED);

    let login: Value = server
        .post("/auth/login")
        .json(&json!({ "email": email, "password": "correct-horse" }))
        .await
        .json();
    login["access_token"].as_str().unwrap().to_string()
}

fn event_payload(event_type: &str, intent_id: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": format!("evt_{}", intent_id),
        "type": event_type,
        "created": 1_700_000_000,
        "data": { "object": { "id": intent_id, "object": "payment_intent" } }
    }))
    .unwrap()
}

async fn post_webhook(server: &TestServer, payload: Vec<u8>, secret: &str) -> axum_test::TestResponse {
    let header = signature_header(secret, chrono::Utc::now().timestamp(), &payload).unwrap();
    server
        .post("/payments/stripe-webhook")
        .add_header(
            HeaderName::from_static("stripe-signature"),
            HeaderValue::from_str(&header).unwrap(),
        )
        .bytes(Bytes::from(payload))
        .await
}

#[tokio::test]
async fn register_login_and_verify_token() {
    let h = harness(None).await;
    let token = register_and_login(&h.server, "ana@example.com").await;

    let verified: Value = h
        .server
        .get("/auth/verify-token")
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(verified["valid"], true);
    assert_eq!(verified["user"]["email"], "ana@example.com");
    assert!(verified["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let h = harness(None).await;
    register_and_login(&h.server, "ana@example.com").await;

    let response = h
        .server
        .post("/auth/register")
        .json(&json!({
            "name": "Otra",
            "last_name": "Persona",
            "email": "ANA@example.com",
            "password": "another-pass"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let h = harness(None).await;
    register_and_login(&h.server, "ana@example.com").await;

    let response = h
        .server
        .post("/auth/login")
        .json(&json!({ "email": "ana@example.com", "password": "nope-nope" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_require_bearer_token() {
    let h = harness(None).await;

    let response = h.server.get("/payments/has-paid").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = h
        .server
        .get("/payments/payment-history")
        .authorization_bearer("not-a-jwt")
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn password_reset_token_is_single_use() {
    let h = harness(None).await;
    register_and_login(&h.server, "ana@example.com").await;

    // unknown email gets the same answer and no mail
    let unknown: Value = h
        .server
        .post("/auth/request-password-reset")
        .json(&json!({ "email": "nobody@example.com" }))
        .await
        .json();
    let known: Value = h
        .server
        .post("/auth/request-password-reset")
        .json(&json!({ "email": "ana@example.com" }))
        .await
        .json();
    assert_eq!(unknown["message"], known["message"]);

    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1);
    let start = sent[0].text.find("token=").unwrap() + "token=".len();
    let token = sent[0].text[start..].split_whitespace().next().unwrap().to_string();

    h.server
        .post("/auth/reset-password")
        .json(&json!({ "token": token, "new_password": "brand-new-pass" }))
        .await
        .assert_status_ok();

    let reused = h
        .server
        .post("/auth/reset-password")
        .json(&json!({ "token": token, "new_password": "third-password" }))
        .await;
    assert_eq!(reused.status_code(), StatusCode::BAD_REQUEST);

    h.server
        .post("/auth/login")
        .json(&json!({ "email": "ana@example.com", "password": "brand-new-pass" }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn config_exposes_publishable_key() {
    let h = harness(None).await;
    let body: Value = h.server.get("/payments/config").await.json();
    assert_eq!(body["publishable_key"], "pk_test_api");
}

#[tokio::test]
async fn succeeded_webhook_marks_payment_paid_once() {
    let h = harness(None).await;
    mock_customer(&h.stripe).await;
    mock_card_intent(&h.stripe, "pi_paid").await;
    let token = register_and_login(&h.server, "ana@example.com").await;

    let created: Value = h
        .server
        .post("/payments/create-payment-intent")
        .authorization_bearer(&token)
        .json(&json!({ "amount": 10.50, "currency": "mxn", "description": "Curso" }))
        .await
        .json();
    assert_eq!(created["payment_intent_id"], "pi_paid");
    assert_eq!(created["client_secret"], "pi_paid_secret");
    assert_eq!(created["amount"], 10.5);

    let history: Value = h
        .server
        .get("/payments/payment-history")
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(history[0]["status"], "pending");

    let paid: Value = h
        .server
        .get("/payments/has-paid")
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(paid["has_paid"], false);

    let first: Value = post_webhook(
        &h.server,
        event_payload("payment_intent.succeeded", "pi_paid"),
        WEBHOOK_SECRET,
    )
    .await
    .json();
    assert_eq!(first["status"], "success");
    assert_eq!(first["outcome"], "applied");

    // redelivery is a no-op
    let second: Value = post_webhook(
        &h.server,
        event_payload("payment_intent.succeeded", "pi_paid"),
        WEBHOOK_SECRET,
    )
    .await
    .json();
    assert_eq!(second["outcome"], "unchanged");

    let paid: Value = h
        .server
        .get("/payments/has-paid")
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(paid["has_paid"], true);

    let payment: Value = h
        .server
        .get("/payments/payment/pi_paid")
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(payment["status"], "succeeded");
}

#[tokio::test]
async fn forged_webhook_is_rejected_without_changes() {
    let h = harness(None).await;
    mock_customer(&h.stripe).await;
    mock_card_intent(&h.stripe, "pi_forged").await;
    let token = register_and_login(&h.server, "ana@example.com").await;

    h.server
        .post("/payments/create-payment-intent")
        .authorization_bearer(&token)
        .json(&json!({ "amount": 25.0 }))
        .await
        .assert_status_ok();

    let response = post_webhook(
        &h.server,
        event_payload("payment_intent.succeeded", "pi_forged"),
        "whsec_attacker",
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let missing = h
        .server
        .post("/payments/stripe-webhook")
        .bytes(Bytes::from(event_payload("payment_intent.succeeded", "pi_forged")))
        .await;
    assert_eq!(missing.status_code(), StatusCode::BAD_REQUEST);

    let payment: Value = h
        .server
        .get("/payments/payment/pi_forged")
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(payment["status"], "pending");
}

#[tokio::test]
async fn webhook_for_unknown_intent_is_acknowledged() {
    let h = harness(None).await;

    let body: Value = post_webhook(
        &h.server,
        event_payload("payment_intent.payment_failed", "pi_elsewhere"),
        WEBHOOK_SECRET,
    )
    .await
    .json();
    assert_eq!(body["status"], "success");
    assert_eq!(body["outcome"], "unknown_payment");
}

#[tokio::test]
async fn reused_intent_id_is_rejected() {
    let h = harness(None).await;
    mock_customer(&h.stripe).await;
    mock_card_intent(&h.stripe, "pi_same").await;
    let token = register_and_login(&h.server, "ana@example.com").await;

    h.server
        .post("/payments/create-payment-intent")
        .authorization_bearer(&token)
        .json(&json!({ "amount": 5.0 }))
        .await
        .assert_status_ok();

    let second = h
        .server
        .post("/payments/create-payment-intent")
        .authorization_bearer(&token)
        .json(&json!({ "amount": 5.0 }))
        .await;
    assert_eq!(second.status_code(), StatusCode::BAD_REQUEST);

    let history: Value = h
        .server
        .get("/payments/payment-history")
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(history.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn oxxo_intent_returns_voucher() {
    let h = harness(None).await;
    mock_customer(&h.stripe).await;
    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pi_oxxo",
            "status": "requires_action",
            "client_secret": "pi_oxxo_secret",
            "next_action": {
                "type": "oxxo_display_details",
                "oxxo_display_details": {
                    "hosted_voucher_url": "https://payments.stripe.com/oxxo/voucher",
                    "number": "1234567890",
                    "expires_after": 1_700_259_200
                }
            }
        })))
        .mount(&h.stripe)
        .await;
    let token = register_and_login(&h.server, "ana@example.com").await;

    let body: Value = h
        .server
        .post("/payments/create-payment-intent")
        .authorization_bearer(&token)
        .json(&json!({ "amount": 200.0, "currency": "mxn", "payment_method_types": "oxxo" }))
        .await
        .json();

    assert_eq!(body["payment_method_types"], "oxxo");
    assert_eq!(body["oxxo_voucher_url"], "https://payments.stripe.com/oxxo/voucher");
    assert_eq!(body["oxxo_barcode"], "1234567890");
    assert_eq!(body["oxxo_expires_at"], 1_700_259_200);
}

#[tokio::test]
async fn card_endpoint_rejects_invalid_input() {
    let h = harness(None).await;
    let token = register_and_login(&h.server, "ana@example.com").await;

    for body in [
        json!({ "amount": 0.0 }),
        json!({ "amount": 10.0, "currency": "xyz" }),
        json!({ "amount": 10.0, "payment_method_types": "customer_balance" }),
    ] {
        let response = h
            .server
            .post("/payments/create-payment-intent")
            .authorization_bearer(&token)
            .json(&body)
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST, "{}", body);
    }
}

#[tokio::test]
async fn transfer_endpoint_only_accepts_customer_balance() {
    let h = harness(None).await;
    let token = register_and_login(&h.server, "ana@example.com").await;

    let response = h
        .server
        .post("/payments/create-payment-intent-transfer")
        .authorization_bearer(&token)
        .json(&json!({ "amount": 100.0, "currency": "mxn", "payment_method_types": "card" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn transfer_intent_returns_bank_details() {
    let h = harness(None).await;
    mock_customer(&h.stripe).await;
    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pi_transfer",
            "status": "requires_action",
            "client_secret": "pi_transfer_secret",
            "next_action": {
                "type": "display_bank_transfer_instructions",
                "display_bank_transfer_instructions": {
                    "reference": "REF123",
                    "amount_remaining": 10000,
                    "hosted_instructions_url": "https://payments.stripe.com/instructions",
                    "financial_addresses": [{
                        "type": "spei",
                        "spei": {
                            "clabe": "002180000000000000",
                            "bank_name": "BBVA",
                            "account_holder_name": "Stripe"
                        }
                    }]
                }
            }
        })))
        .mount(&h.stripe)
        .await;
    let token = register_and_login(&h.server, "ana@example.com").await;

    let body: Value = h
        .server
        .post("/payments/create-payment-intent-transfer")
        .authorization_bearer(&token)
        .json(&json!({ "amount": 100.0, "currency": "mxn" }))
        .await
        .json();

    assert_eq!(body["payment_method_types"], "customer_balance");
    assert_eq!(body["next_action_type"], "display_bank_transfer_instructions");
    assert_eq!(body["bank_transfer_details"]["reference"], "REF123");
    assert_eq!(body["spei_details"]["clabe"], "002180000000000000");

    let history: Value = h
        .server
        .get("/payments/payment-history")
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(history[0]["status"], "pending");
}

#[tokio::test]
async fn product_writes_require_admin_key() {
    let h = harness(Some("admin-secret")).await;
    Mock::given(method("POST"))
        .and(path("/v1/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "prod_1" })))
        .mount(&h.stripe)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/prices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "price_1" })))
        .mount(&h.stripe)
        .await;
    let product = json!({ "name": "Curso Básico", "price": 29.99 });
    let admin_header = HeaderName::from_static("x-admin-key");

    let missing = h.server.post("/payments/products").json(&product).await;
    assert_eq!(missing.status_code(), StatusCode::UNAUTHORIZED);

    let wrong = h
        .server
        .post("/payments/products")
        .add_header(admin_header.clone(), HeaderValue::from_static("guess"))
        .json(&product)
        .await;
    assert_eq!(wrong.status_code(), StatusCode::FORBIDDEN);

    let created: Value = h
        .server
        .post("/payments/products")
        .add_header(admin_header.clone(), HeaderValue::from_static("admin-secret"))
        .json(&product)
        .await
        .json();
    assert_eq!(created["stripe_product_id"], "prod_1");
    assert_eq!(created["stripe_price_id"], "price_1");
    assert_eq!(created["price"], 29.99);
    let id = created["id"].as_i64().unwrap();

    let updated: Value = h
        .server
        .put(&format!("/payments/products/{}", id))
        .add_header(admin_header, HeaderValue::from_static("admin-secret"))
        .json(&json!({ "is_active": false }))
        .await
        .json();
    assert_eq!(updated["is_active"], false);

    let listed: Value = h.server.get("/payments/products").await.json();
    assert_eq!(listed.as_array().map(Vec::len), Some(0));

    h.server
        .get(&format!("/payments/products/{}", id))
        .await
        .assert_status_ok();
    let missing = h.server.get("/payments/products/9999").await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
}
