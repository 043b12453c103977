//! Webhook Server
//!
//! axum routes that receive Safaricom callbacks, normalize them, and hand the
//! result to an application-supplied [`CallbackHandler`].
//!
//! ```text
//! POST /mpesa/callback ──▶ classify ──▶ correlation ──▶ parse ──▶ on_callback
//! POST /mpesa/c2b/validation ──▶ parse C2B ──▶ on_validation ──▶ accept/reject
//! POST /mpesa/c2b/confirmation ──▶ parse C2B ──▶ on_callback
//! POST /mpesa/timeout ──▶ on_timeout
//! GET  /health
//! ```
//!
//! Every callback route answers HTTP 200. Safaricom reads the outcome from
//! the acknowledgement body, not the status code.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mpesa_kit::callback::NormalizedResult;
//! use mpesa_kit::server::{webhook_router, CallbackHandler, WebhookState};
//!
//! struct Ledger;
//!
//! #[async_trait::async_trait]
//! impl CallbackHandler for Ledger {
//!     async fn on_callback(&self, result: NormalizedResult) -> anyhow::Result<()> {
//!         println!("{} {:?}", result.family(), result.transaction_id());
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let state = Arc::new(WebhookState::new(Arc::new(Ledger)));
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, webhook_router(state)).await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::callback::{classify, parse_callback, CallbackFamily, NormalizedResult, ParsedCallback};
use crate::correlation::{attribute, resolve_family, CorrelationStore, InMemoryCorrelationStore};
use crate::response::{Acknowledgement, C2bRejection, ERROR_CODE};

/// Route receiving STK, B2C, B2B, balance, status and reversal results
pub const CALLBACK_PATH: &str = "/mpesa/callback";
/// C2B validation route
pub const VALIDATION_PATH: &str = "/mpesa/c2b/validation";
/// C2B confirmation route
pub const CONFIRMATION_PATH: &str = "/mpesa/c2b/confirmation";
/// Queue timeout route
pub const TIMEOUT_PATH: &str = "/mpesa/timeout";
/// Liveness route
pub const HEALTH_PATH: &str = "/health";

/// Answer to a C2B validation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationDecision {
    /// Let the payment through
    Accept,
    /// Refuse the payment
    Reject(C2bRejection),
}

/// Application hooks for incoming callbacks
#[async_trait::async_trait]
pub trait CallbackHandler: Send + Sync + 'static {
    /// A normalized callback or C2B confirmation arrived
    async fn on_callback(&self, result: NormalizedResult) -> anyhow::Result<()>;

    /// Decide a C2B validation request; accepts by default
    async fn on_validation(
        &self,
        _notification: &NormalizedResult,
    ) -> anyhow::Result<ValidationDecision> {
        Ok(ValidationDecision::Accept)
    }

    /// Daraja gave up waiting in its queue for a request
    async fn on_timeout(&self, _payload: ParsedCallback) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Handler that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

#[async_trait::async_trait]
impl CallbackHandler for LoggingHandler {
    async fn on_callback(&self, result: NormalizedResult) -> anyhow::Result<()> {
        info!(
            family = %result.family(),
            result_code = result.result_code().unwrap_or_default(),
            transaction_id = result.transaction_id().unwrap_or_default(),
            "Callback received"
        );
        Ok(())
    }

    async fn on_timeout(&self, payload: ParsedCallback) -> anyhow::Result<()> {
        warn!(payload = %payload.as_value(), "Queue timeout received");
        Ok(())
    }
}

/// Shared state of the webhook routes
pub struct WebhookState {
    /// Application hooks
    pub handler: Arc<dyn CallbackHandler>,
    /// Disbursement records used to tell B2C from B2B results
    pub correlations: Arc<dyn CorrelationStore>,
    started_at: Instant,
}

impl WebhookState {
    /// State with an empty in-memory correlation store
    pub fn new(handler: Arc<dyn CallbackHandler>) -> Self {
        Self::with_correlations(handler, Arc::new(InMemoryCorrelationStore::new()))
    }

    /// State sharing a correlation store, usually the client's
    pub fn with_correlations(
        handler: Arc<dyn CallbackHandler>,
        correlations: Arc<dyn CorrelationStore>,
    ) -> Self {
        Self {
            handler,
            correlations,
            started_at: Instant::now(),
        }
    }
}

/// Liveness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"healthy"` when answering
    pub status: String,
    /// Crate version
    pub version: String,
    /// Seconds since the router state was created
    pub uptime_seconds: u64,
}

/// Build the webhook router
pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(CALLBACK_PATH, post(callback_handler))
        .route(VALIDATION_PATH, post(validation_handler))
        .route(CONFIRMATION_PATH, post(confirmation_handler))
        .route(TIMEOUT_PATH, post(timeout_handler))
        .route(HEALTH_PATH, get(health_handler))
        .with_state(state)
}

type Ack = (StatusCode, Json<Acknowledgement>);

fn ack(acknowledgement: Acknowledgement) -> Ack {
    (StatusCode::OK, Json(acknowledgement))
}

fn failure(message: impl Into<String>) -> Ack {
    ack(Acknowledgement::error(message, ERROR_CODE))
}

#[instrument(skip_all)]
async fn callback_handler(State(state): State<Arc<WebhookState>>, body: String) -> Ack {
    let parsed = match ParsedCallback::decode(&body) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "Rejected callback body");
            return failure(e.to_string());
        }
    };

    let family = resolve_family(&parsed, classify(&parsed), state.correlations.as_ref());
    if !family.is_known() {
        warn!("Unrecognized callback shape");
        return failure(format!("Unsupported callback family: {family}"));
    }

    let result = match parse_callback(&parsed, family) {
        Ok(result) => attribute(result, state.correlations.as_ref()),
        Err(e) => {
            warn!(family = %family, error = %e, "Malformed callback");
            return failure(e.to_string());
        }
    };

    debug!(family = %result.family(), "Dispatching callback");
    match state.handler.on_callback(result).await {
        Ok(()) => ack(Acknowledgement::success("Callback received successfully")),
        Err(e) => {
            warn!(error = %e, "Callback handler failed");
            failure(e.to_string())
        }
    }
}

/// Decode a body that must be a C2B notification
fn c2b_notification(body: &str) -> Result<NormalizedResult, String> {
    let parsed = ParsedCallback::decode(body).map_err(|e| e.to_string())?;
    parse_callback(&parsed, CallbackFamily::C2b).map_err(|e| e.to_string())
}

#[instrument(skip_all)]
async fn validation_handler(State(state): State<Arc<WebhookState>>, body: String) -> Ack {
    let notification = match c2b_notification(&body) {
        Ok(notification) => notification,
        Err(e) => {
            warn!(error = %e, "Malformed validation request");
            return ack(Acknowledgement::reject(C2bRejection::OtherError));
        }
    };

    match state.handler.on_validation(&notification).await {
        Ok(ValidationDecision::Accept) => ack(Acknowledgement::success("Accepted")),
        Ok(ValidationDecision::Reject(reason)) => {
            info!(
                code = reason.code(),
                transaction_id = notification.transaction_id().unwrap_or_default(),
                "Validation rejected"
            );
            ack(Acknowledgement::reject(reason))
        }
        Err(e) => {
            warn!(error = %e, "Validation handler failed");
            ack(Acknowledgement::reject(C2bRejection::OtherError))
        }
    }
}

#[instrument(skip_all)]
async fn confirmation_handler(State(state): State<Arc<WebhookState>>, body: String) -> Ack {
    let notification = match c2b_notification(&body) {
        Ok(notification) => notification,
        Err(e) => {
            warn!(error = %e, "Malformed confirmation");
            return failure(e);
        }
    };

    match state.handler.on_callback(notification).await {
        Ok(()) => ack(Acknowledgement::success("Confirmation received successfully")),
        Err(e) => {
            warn!(error = %e, "Confirmation handler failed");
            failure(e.to_string())
        }
    }
}

#[instrument(skip_all)]
async fn timeout_handler(State(state): State<Arc<WebhookState>>, body: String) -> Ack {
    let parsed = match ParsedCallback::decode(&body) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "Malformed timeout notification");
            return failure(e.to_string());
        }
    };

    match state.handler.on_timeout(parsed).await {
        Ok(()) => ack(Acknowledgement::success("Timeout received")),
        Err(e) => {
            warn!(error = %e, "Timeout handler failed");
            failure(e.to_string())
        }
    }
}

async fn health_handler(State(state): State<Arc<WebhookState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}
