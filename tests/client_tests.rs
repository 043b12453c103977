//! DarajaClient tests against an in-process fake Daraja

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use mpesa_kit::correlation::{CorrelationStore, DisbursementKind, InMemoryCorrelationStore};
use mpesa_kit::request::{
    AccountBalanceQuery, B2cCommand, B2cPayment, CustomerPaymentType, IdentifierType,
    ReversalRequest, StkPush, TransactionRequest,
};
use mpesa_kit::{ConfiguredUrls, DarajaClient, Environment, Error, MpesaConfig};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey};
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio_test::{assert_err, assert_ok};

const TEST_KEY: &str = include_str!("fixtures/initiator_test_key.pem");

// ============================================================================
// Fake Daraja
// ============================================================================

#[derive(Debug, Clone)]
struct Recorded {
    path: String,
    authorization: Option<String>,
    body: Value,
}

#[derive(Default)]
struct FakeDaraja {
    token_requests: AtomicUsize,
    requests: Mutex<Vec<Recorded>>,
}

impl FakeDaraja {
    fn record(&self, path: &str, headers: &HeaderMap, body: Value) {
        self.requests.lock().push(Recorded {
            path: path.to_string(),
            authorization: headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body,
        });
    }

    fn last(&self) -> Recorded {
        self.requests.lock().last().cloned().unwrap()
    }
}

async fn token(
    State(fake): State<Arc<FakeDaraja>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let expected = format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode("key:secret")
    );
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);

    if !authorized || query.get("grant_type").map(String::as_str) != Some("client_credentials") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"errorCode": "400.008.01", "errorMessage": "Invalid Authentication passed"})),
        )
            .into_response();
    }

    let n = fake.token_requests.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({"access_token": format!("token-{n}"), "expires_in": "3599"})).into_response()
}

async fn b2c(
    State(fake): State<Arc<FakeDaraja>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let originator = body["OriginatorConversationID"].clone();
    fake.record("/mpesa/b2c/v3/paymentrequest", &headers, body);
    Json(json!({
        "ConversationID": "AG_20240101_0000b2c",
        "OriginatorConversationID": originator,
        "ResponseCode": "0",
        "ResponseDescription": "Accept the service request successfully."
    }))
}

async fn stk_push(
    State(fake): State<Arc<FakeDaraja>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    fake.record("/mpesa/stkpush/v1/processrequest", &headers, body);
    Json(json!({
        "MerchantRequestID": "29115-34620561-1",
        "CheckoutRequestID": "ws_CO_191220191020363925",
        "ResponseCode": "0",
        "ResponseDescription": "Success. Request accepted for processing",
        "CustomerMessage": "Success. Request accepted for processing"
    }))
}

async fn bad_request(
    State(fake): State<Arc<FakeDaraja>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    fake.record("/mpesa/accountbalance/v1/query", &headers, body);
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "requestId": "11728-2929992-1",
            "errorCode": "400.002.02",
            "errorMessage": "Bad Request - Invalid PartyA"
        })),
    )
        .into_response()
}

async fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"requestId": "1-2", "errorCode": "404.001.03"})),
    )
        .into_response()
}

async fn spawn_fake() -> (Arc<FakeDaraja>, String) {
    let fake = Arc::new(FakeDaraja::default());
    let app = Router::new()
        .route("/oauth/v1/generate", get(token))
        .route("/mpesa/b2c/v3/paymentrequest", post(b2c))
        .route("/mpesa/stkpush/v1/processrequest", post(stk_push))
        .route("/mpesa/accountbalance/v1/query", post(bad_request))
        .route("/mpesa/reversal/v1/request", post(unauthorized))
        .with_state(Arc::clone(&fake));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (fake, format!("http://{addr}"))
}

fn config(base_url: String) -> MpesaConfig {
    let mut config = MpesaConfig::new(Environment::Sandbox, "key", "secret");
    config.base_url = Some(base_url);
    config.initiator_name = Some("testapi".to_string());
    config.initiator_password = Some("Safaricom999!*!".to_string());
    config.sandbox_certificate = Some(
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/initiator_test.cer"),
    );
    config
}

fn b2c_request() -> TransactionRequest {
    TransactionRequest::b2c(B2cPayment {
        command: B2cCommand::BusinessPayment,
        amount: 250,
        party_a: "600999".to_string(),
        phone_number: "0708374149".to_string(),
        remarks: "Refund".to_string(),
        occasion: None,
        result_url: "https://example.com/mpesa/callback".to_string(),
        timeout_url: "https://example.com/mpesa/timeout".to_string(),
    })
    .unwrap()
}

fn decrypt(credential: &str) -> String {
    let key = RsaPrivateKey::from_pkcs8_pem(TEST_KEY).unwrap();
    let ciphertext = base64::engine::general_purpose::STANDARD
        .decode(credential)
        .unwrap();
    String::from_utf8(key.decrypt(Pkcs1v15Encrypt, &ciphertext).unwrap()).unwrap()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_token_is_cached() {
    let (fake, base_url) = spawn_fake().await;
    let client = DarajaClient::new(config(base_url)).unwrap();

    assert_eq!(client.access_token().await.unwrap(), "token-1");
    assert_eq!(client.access_token().await.unwrap(), "token-1");
    assert_eq!(fake.token_requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_wrong_consumer_secret() {
    let (_fake, base_url) = spawn_fake().await;
    let mut config = config(base_url);
    config.consumer_secret = "wrong".to_string();
    let client = DarajaClient::new(config).unwrap();

    let err = assert_err!(client.access_token().await);
    match err {
        Error::Api { status, code, .. } => {
            assert_eq!(status, 400);
            assert_eq!(code, "400.008.01");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_b2c_posts_body_and_records_conversation() {
    let (fake, base_url) = spawn_fake().await;
    let store = Arc::new(InMemoryCorrelationStore::new());
    let client = DarajaClient::new(config(base_url))
        .unwrap()
        .with_correlation_store(store.clone());

    let request = b2c_request();
    let response = assert_ok!(client.send(&request).await);
    assert!(response.is_accepted());
    assert_eq!(response.conversation_id.as_deref(), Some("AG_20240101_0000b2c"));

    let recorded = fake.last();
    assert_eq!(recorded.path, "/mpesa/b2c/v3/paymentrequest");
    assert_eq!(recorded.authorization.as_deref(), Some("Bearer token-1"));
    assert_eq!(recorded.body["InitiatorName"], "testapi");
    assert_eq!(recorded.body["CommandID"], "BusinessPayment");
    assert_eq!(recorded.body["Amount"], 250);
    assert_eq!(recorded.body["PartyB"], "254708374149");
    assert_eq!(
        recorded.body["OriginatorConversationID"],
        request.originator_conversation_id().unwrap()
    );

    let credential = recorded.body["SecurityCredential"].as_str().unwrap();
    assert_eq!(decrypt(credential), "Safaricom999!*!");

    assert_eq!(store.resolve("AG_20240101_0000b2c"), Some(DisbursementKind::B2c));
    assert_eq!(
        store.resolve(request.originator_conversation_id().unwrap()),
        Some(DisbursementKind::B2c)
    );
}

#[tokio::test]
async fn test_stk_push_password() {
    let (fake, base_url) = spawn_fake().await;
    let client = DarajaClient::new(config(base_url)).unwrap();

    let request = TransactionRequest::stk_push(StkPush {
        transaction_type: CustomerPaymentType::CustomerPayBillOnline,
        amount: 1,
        phone_number: "254708374149".to_string(),
        party_b: None,
        callback_url: "https://example.com/mpesa/callback".to_string(),
        account_reference: "Order-42".to_string(),
        description: "Payment".to_string(),
    })
    .unwrap();

    let response = assert_ok!(client.send(&request).await);
    assert_eq!(
        response.checkout_request_id.as_deref(),
        Some("ws_CO_191220191020363925")
    );

    let body = fake.last().body;
    let timestamp = body["Timestamp"].as_str().unwrap().to_string();
    assert_eq!(timestamp.len(), 14);

    let password = base64::engine::general_purpose::STANDARD
        .decode(body["Password"].as_str().unwrap())
        .unwrap();
    let expected = format!(
        "{}{}{}",
        mpesa_kit::config::SANDBOX_SHORTCODE,
        mpesa_kit::config::SANDBOX_PASSKEY,
        timestamp
    );
    assert_eq!(String::from_utf8(password).unwrap(), expected);
    assert!(body.get("SecurityCredential").is_none());
}

#[tokio::test]
async fn test_result_urls_from_config() {
    let (fake, base_url) = spawn_fake().await;
    let mut config = config(base_url);
    config.result_url = Some("https://hooks.example.com/mpesa/result".to_string());
    config.timeout_url = Some("https://hooks.example.com/mpesa/timeout".to_string());
    let client = DarajaClient::new(config).unwrap();

    let payment = B2cPayment {
        command: B2cCommand::PromotionPayment,
        amount: 75,
        party_a: "600999".to_string(),
        phone_number: "0708374149".to_string(),
        remarks: "Promo".to_string(),
        occasion: None,
        result_url: String::new(),
        timeout_url: String::new(),
    }
    .with_config_urls(client.config());
    let request = assert_ok!(TransactionRequest::b2c(payment));
    assert_ok!(client.send(&request).await);

    let recorded = fake.last();
    assert_eq!(recorded.body["ResultURL"], "https://hooks.example.com/mpesa/result");
    assert_eq!(
        recorded.body["QueueTimeOutURL"],
        "https://hooks.example.com/mpesa/timeout"
    );
}

#[tokio::test]
async fn test_error_body_maps_to_api_error() {
    let (_fake, base_url) = spawn_fake().await;
    let client = DarajaClient::new(config(base_url)).unwrap();

    let request = TransactionRequest::account_balance(AccountBalanceQuery {
        party_a: "600000".to_string(),
        identifier_type: IdentifierType::Shortcode,
        remarks: "balance".to_string(),
        result_url: "https://example.com/mpesa/callback".to_string(),
        timeout_url: "https://example.com/mpesa/timeout".to_string(),
    })
    .unwrap();

    match assert_err!(client.send(&request).await) {
        Error::Api {
            status,
            code,
            message,
        } => {
            assert_eq!(status, 400);
            assert_eq!(code, "400.002.02");
            assert_eq!(message, "Bad Request - Invalid PartyA");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_unauthorized_drops_cached_token() {
    let (fake, base_url) = spawn_fake().await;
    let client = DarajaClient::new(config(base_url)).unwrap();

    let request = TransactionRequest::reversal(ReversalRequest {
        transaction_id: "NLJ41HAY6Q".to_string(),
        amount: 10,
        receiver_party: "600610".to_string(),
        remarks: "Reverse".to_string(),
        occasion: None,
        result_url: "https://example.com/mpesa/callback".to_string(),
        timeout_url: "https://example.com/mpesa/timeout".to_string(),
    })
    .unwrap();

    match assert_err!(client.send(&request).await) {
        Error::Api { status, message, .. } => {
            assert_eq!(status, 401);
            // No errorMessage in the body, so the table description is used
            assert_eq!(message, "Invalid Access Token");
        }
        other => panic!("unexpected {other:?}"),
    }

    assert_eq!(client.access_token().await.unwrap(), "token-2");
    assert_eq!(fake.token_requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_missing_initiator_password() {
    let (_fake, base_url) = spawn_fake().await;
    let mut config = config(base_url);
    config.initiator_password = None;
    let client = DarajaClient::new(config).unwrap();

    let err = assert_err!(client.send(&b2c_request()).await);
    assert!(matches!(
        err,
        Error::Config(mpesa_kit::error::ConfigError::MissingVar("MPESA_INITIATOR_PASSWORD"))
    ));
}
