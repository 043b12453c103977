//! Daraja configuration
//!
//! All settings come from environment variables. Secrets are never given
//! defaults; sandbox identifiers are, so a sandbox app only needs its
//! consumer key pair.
//!
//! - `MPESA_ENVIRONMENT`: `sandbox` (default) or `production`
//! - `MPESA_CONSUMER_KEY` / `MPESA_CONSUMER_SECRET` (required)
//! - `MPESA_SHORTCODE` (default `174379`) and `MPESA_PASSKEY` (sandbox passkey by default)
//! - `MPESA_INITIATOR_NAME` / `MPESA_INITIATOR_PASSWORD`
//! - `MPESA_CALLBACK_URL`, `MPESA_RESULT_URL`, `MPESA_TIMEOUT_URL`
//! - `MPESA_SANDBOX_CERT` / `MPESA_PRODUCTION_CERT`: certificate paths
//! - `MPESA_BASE_URL`: override the API host (tests, proxies)
//! - `MPESA_HTTP_TIMEOUT_SECS` (default 30)

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Sandbox Lipa na M-Pesa shortcode published by Safaricom
pub const SANDBOX_SHORTCODE: &str = "174379";

/// Sandbox Lipa na M-Pesa passkey published by Safaricom
pub const SANDBOX_PASSKEY: &str =
    "bfb279f9aa9bdbcf158e97dd71a467cd2e0c893059b10f78e6b72ada1ed2c919";

/// Default HTTP timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Daraja environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// `sandbox.safaricom.co.ke`
    #[default]
    Sandbox,
    /// `api.safaricom.co.ke`
    Production,
}

impl Environment {
    /// Base URL of the Daraja API
    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Sandbox => "https://sandbox.safaricom.co.ke",
            Self::Production => "https://api.safaricom.co.ke",
        }
    }

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" | "test" | "" => Ok(Self::Sandbox),
            "production" | "live" | "prod" => Ok(Self::Production),
            other => Err(ConfigError::InvalidVar {
                name: "MPESA_ENVIRONMENT",
                reason: format!("expected sandbox or production, got {other:?}"),
            }),
        }
    }
}

/// Daraja client configuration
#[derive(Clone)]
pub struct MpesaConfig {
    /// Which Daraja deployment to talk to
    pub environment: Environment,
    /// OAuth consumer key
    pub consumer_key: String,
    /// OAuth consumer secret
    pub consumer_secret: String,
    /// Business shortcode used for STK push and as default PartyA
    pub shortcode: String,
    /// Lipa na M-Pesa Online passkey
    pub passkey: String,
    /// API operator username for B2C/B2B/balance/status/reversal calls
    pub initiator_name: Option<String>,
    /// API operator password, encrypted into the security credential
    pub initiator_password: Option<String>,
    /// Default STK push callback URL
    pub callback_url: Option<String>,
    /// Default `ResultURL`
    pub result_url: Option<String>,
    /// Default `QueueTimeOutURL`
    pub timeout_url: Option<String>,
    /// Sandbox certificate path
    pub sandbox_certificate: Option<PathBuf>,
    /// Production certificate path
    pub production_certificate: Option<PathBuf>,
    /// API host override
    pub base_url: Option<String>,
    /// Per-request HTTP timeout
    pub http_timeout: Duration,
}

impl fmt::Debug for MpesaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpesaConfig")
            .field("environment", &self.environment)
            .field("consumer_key", &"<redacted>")
            .field("consumer_secret", &"<redacted>")
            .field("shortcode", &self.shortcode)
            .field("passkey", &"<redacted>")
            .field("initiator_name", &self.initiator_name)
            .field("initiator_password", &self.initiator_password.as_ref().map(|_| "<redacted>"))
            .field("callback_url", &self.callback_url)
            .field("result_url", &self.result_url)
            .field("timeout_url", &self.timeout_url)
            .field("base_url", &self.api_base_url())
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl MpesaConfig {
    /// Minimal configuration for an environment; everything else defaults
    pub fn new<K: Into<String>, S: Into<String>>(
        environment: Environment,
        consumer_key: K,
        consumer_secret: S,
    ) -> Self {
        Self {
            environment,
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            shortcode: SANDBOX_SHORTCODE.to_string(),
            passkey: SANDBOX_PASSKEY.to_string(),
            initiator_name: None,
            initiator_password: None,
            callback_url: None,
            result_url: None,
            timeout_url: None,
            sandbox_certificate: None,
            production_certificate: None,
            base_url: None,
            http_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingVar` if the consumer key pair is not set
    /// and `ConfigError::InvalidVar` for unparseable values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let environment = var("MPESA_ENVIRONMENT")
            .map(|v| v.parse::<Environment>())
            .transpose()?
            .unwrap_or_default();

        let consumer_key =
            var("MPESA_CONSUMER_KEY").ok_or(ConfigError::MissingVar("MPESA_CONSUMER_KEY"))?;
        let consumer_secret = var("MPESA_CONSUMER_SECRET")
            .ok_or(ConfigError::MissingVar("MPESA_CONSUMER_SECRET"))?;

        let http_timeout = match var("MPESA_HTTP_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw.trim().parse::<u64>().map_err(|e| ConfigError::InvalidVar {
                    name: "MPESA_HTTP_TIMEOUT_SECS",
                    reason: e.to_string(),
                })?;
                if secs == 0 {
                    return Err(ConfigError::InvalidVar {
                        name: "MPESA_HTTP_TIMEOUT_SECS",
                        reason: "timeout cannot be 0".to_string(),
                    });
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let config = Self {
            environment,
            consumer_key,
            consumer_secret,
            shortcode: var("MPESA_SHORTCODE").unwrap_or_else(|| SANDBOX_SHORTCODE.to_string()),
            passkey: var("MPESA_PASSKEY").unwrap_or_else(|| SANDBOX_PASSKEY.to_string()),
            initiator_name: var("MPESA_INITIATOR_NAME"),
            initiator_password: var("MPESA_INITIATOR_PASSWORD"),
            callback_url: var("MPESA_CALLBACK_URL"),
            result_url: var("MPESA_RESULT_URL"),
            timeout_url: var("MPESA_TIMEOUT_URL"),
            sandbox_certificate: var("MPESA_SANDBOX_CERT").map(PathBuf::from),
            production_certificate: var("MPESA_PRODUCTION_CERT").map(PathBuf::from),
            base_url: var("MPESA_BASE_URL").map(|u| u.trim_end_matches('/').to_string()),
            http_timeout,
        };

        if config.environment == Environment::Production && config.passkey == SANDBOX_PASSKEY {
            tracing::warn!("Production environment is using the sandbox passkey");
        }

        Ok(config)
    }

    /// Effective API base URL
    pub fn api_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
    }

    /// Certificate path configured for an environment
    pub fn certificate_path(&self, environment: Environment) -> Option<&PathBuf> {
        match environment {
            Environment::Sandbox => self.sandbox_certificate.as_ref(),
            Environment::Production => self.production_certificate.as_ref(),
        }
    }
}
