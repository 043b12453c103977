//! Daraja HTTP Client
//!
//! ```text
//! TransactionRequest ──▶ DarajaClient::send
//!                              │
//!             ┌────────────────┼──────────────────┐
//!             ▼                ▼                  ▼
//!        TokenCache    SecurityCredentialCodec   RequestAuth
//!             │                                   │
//!             └──────────▶ POST {base}{endpoint} ◀┘
//!                              │
//!                              ▼
//!                ApiResponse ──▶ CorrelationStore (B2C/B2B)
//! ```
//!
//! The client does not retry. Failed calls surface as [`Error::Api`] with a
//! description from the canonical code tables.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::api_error;
use crate::cache::{InMemoryTokenCache, TokenCache};
use crate::callback::params::value_to_string;
use crate::callback::timestamp::now_compact;
use crate::config::MpesaConfig;
use crate::correlation::{CorrelationStore, InMemoryCorrelationStore};
use crate::credential::SecurityCredentialCodec;
use crate::error::{ConfigError, Error, Result};
use crate::request::{RequestAuth, TransactionRequest, OAUTH_ENDPOINT};
use crate::response::SUCCESS_CODE;

/// Tokens are refreshed this long before Daraja expires them
pub const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Lifetime assumed when Daraja omits `expires_in`
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3599;

/// Synchronous acknowledgement of a Daraja request
///
/// The outcome of asynchronous operations arrives later as a callback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Daraja conversation id (B2C, B2B, balance, status, reversal)
    #[serde(rename = "ConversationID", default, deserialize_with = "lenient_string")]
    pub conversation_id: Option<String>,
    /// Originator conversation id
    #[serde(
        rename = "OriginatorConversationID",
        default,
        deserialize_with = "lenient_string"
    )]
    pub originator_conversation_id: Option<String>,
    /// STK push merchant request id
    #[serde(rename = "MerchantRequestID", default, deserialize_with = "lenient_string")]
    pub merchant_request_id: Option<String>,
    /// STK push checkout request id
    #[serde(rename = "CheckoutRequestID", default, deserialize_with = "lenient_string")]
    pub checkout_request_id: Option<String>,
    /// `"0"` when Daraja accepted the request
    #[serde(rename = "ResponseCode", default, deserialize_with = "lenient_string")]
    pub response_code: Option<String>,
    /// Description of `response_code`
    #[serde(rename = "ResponseDescription", default, deserialize_with = "lenient_string")]
    pub response_description: Option<String>,
    /// Message meant for the paying customer
    #[serde(rename = "CustomerMessage", default, deserialize_with = "lenient_string")]
    pub customer_message: Option<String>,
    /// STK query outcome
    #[serde(rename = "ResultCode", default, deserialize_with = "lenient_string")]
    pub result_code: Option<String>,
    /// STK query outcome description
    #[serde(rename = "ResultDesc", default, deserialize_with = "lenient_string")]
    pub result_desc: Option<String>,
}

impl ApiResponse {
    /// Whether Daraja accepted the request
    pub fn is_accepted(&self) -> bool {
        self.response_code.as_deref() == Some(SUCCESS_CODE)
    }
}

/// Accept strings and numbers alike
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_string))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    error_code: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

/// Daraja API client
pub struct DarajaClient {
    config: MpesaConfig,
    http: reqwest::Client,
    codec: SecurityCredentialCodec,
    tokens: Arc<dyn TokenCache>,
    correlations: Arc<dyn CorrelationStore>,
}

impl std::fmt::Debug for DarajaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DarajaClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DarajaClient {
    /// Client with in-memory token and correlation stores
    ///
    /// # Errors
    ///
    /// Returns `Error::Http` if the HTTP client cannot be built.
    pub fn new(config: MpesaConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            codec: SecurityCredentialCodec::from_config(&config),
            config,
            http,
            tokens: Arc::new(InMemoryTokenCache::new()),
            correlations: Arc::new(InMemoryCorrelationStore::new()),
        })
    }

    /// Replace the token cache
    pub fn with_token_cache(mut self, tokens: Arc<dyn TokenCache>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Replace the correlation store
    pub fn with_correlation_store(mut self, correlations: Arc<dyn CorrelationStore>) -> Self {
        self.correlations = correlations;
        self
    }

    /// Store that disbursement conversation ids are recorded in
    pub fn correlation_store(&self) -> Arc<dyn CorrelationStore> {
        Arc::clone(&self.correlations)
    }

    /// Active configuration
    pub fn config(&self) -> &MpesaConfig {
        &self.config
    }

    fn token_cache_key(&self) -> String {
        format!("mpesa:token:{}:{}", self.config.environment, self.config.consumer_key)
    }

    /// OAuth access token, from cache when still valid
    #[instrument(skip(self), fields(environment = %self.config.environment))]
    pub async fn access_token(&self) -> Result<String> {
        let key = self.token_cache_key();
        if let Some(token) = self.tokens.get(&key) {
            debug!("Using cached access token");
            return Ok(token);
        }

        let url = format!("{}{}", self.config.api_base_url(), OAUTH_ENDPOINT);
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error_from_body(status.as_u16(), &body));
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = token
            .expires_in
            .as_ref()
            .and_then(value_to_string)
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        let ttl = Duration::from_secs(lifetime).saturating_sub(TOKEN_EXPIRY_MARGIN);

        if ttl.is_zero() {
            warn!(lifetime, "Access token lifetime too short to cache");
        } else {
            self.tokens.put(&key, token.access_token.clone(), ttl);
        }
        info!(ttl_secs = ttl.as_secs(), "Obtained access token");

        Ok(token.access_token)
    }

    /// Credentials for one request
    fn request_auth(&self, request: &TransactionRequest) -> Result<RequestAuth> {
        let mut auth = RequestAuth {
            initiator_name: self.config.initiator_name.clone(),
            security_credential: None,
            business_short_code: self.config.shortcode.clone(),
            passkey: self.config.passkey.clone(),
            timestamp: now_compact(),
        };

        if request.requires_security_credential() {
            if auth.initiator_name.is_none() {
                return Err(ConfigError::MissingVar("MPESA_INITIATOR_NAME").into());
            }
            let password = self
                .config
                .initiator_password
                .as_deref()
                .ok_or(ConfigError::MissingVar("MPESA_INITIATOR_PASSWORD"))?;
            auth.security_credential = Some(self.codec.encrypt(password, self.config.environment)?);
        }

        Ok(auth)
    }

    /// Send a request to Daraja
    ///
    /// B2C and B2B conversation ids from the response are recorded in the
    /// correlation store so their result callbacks can be attributed.
    ///
    /// # Errors
    ///
    /// - `Error::Config` / `Error::Encryption` when credentials are missing
    /// - `Error::Http` on transport failures
    /// - `Error::Api` for non-2xx answers
    #[instrument(skip(self, request), fields(operation = request.name()))]
    pub async fn send(&self, request: &TransactionRequest) -> Result<ApiResponse> {
        let auth = self.request_auth(request)?;
        let body = request.body(&auth);
        let token = self.access_token().await?;

        let url = format!("{}{}", self.config.api_base_url(), request.endpoint());
        debug!(url = %url, "Sending Daraja request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            if status == reqwest::StatusCode::UNAUTHORIZED {
                self.tokens.invalidate(&self.token_cache_key());
            }
            let err = api_error_from_body(status.as_u16(), &text);
            warn!(status = status.as_u16(), error = %err, "Daraja request failed");
            return Err(err);
        }

        let parsed: ApiResponse = serde_json::from_str(&text)?;

        if let Some(kind) = request.disbursement_kind() {
            let ids = [
                parsed.conversation_id.as_deref(),
                parsed.originator_conversation_id.as_deref(),
                request.originator_conversation_id(),
            ];
            for id in ids.into_iter().flatten() {
                self.correlations.record(id, kind);
            }
        }

        info!(
            response_code = parsed.response_code.as_deref().unwrap_or_default(),
            conversation_id = parsed.conversation_id.as_deref().unwrap_or_default(),
            "Daraja request accepted"
        );

        Ok(parsed)
    }
}

/// Map a non-2xx answer to `Error::Api`
fn api_error_from_body(status: u16, body: &str) -> Error {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    if let Some(request_id) = &parsed.request_id {
        debug!(request_id = %request_id, "Daraja error request id");
    }

    let code = parsed.error_code.unwrap_or_default();
    let message = parsed
        .error_message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            let code = (!code.is_empty()).then_some(code.as_str());
            api_error::describe(status, code).to_string()
        });

    Error::Api {
        status,
        code,
        message,
    }
}
