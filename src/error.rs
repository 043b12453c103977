//! Error types for mpesa-kit
//!
//! This module provides the error hierarchy using `thiserror`. Each concern
//! (callbacks, credentials, requests, configuration) owns a focused enum and
//! the crate-level [`Error`] aggregates them.

use thiserror::Error;

use crate::callback::CallbackFamily;

/// The main error type for mpesa-kit operations
#[derive(Error, Debug)]
pub enum Error {
    /// Callback decoding/normalization errors
    #[error("Callback error: {0}")]
    Callback(#[from] CallbackError),

    /// Security credential errors
    #[error("Encryption error: {0}")]
    Encryption(#[from] EncryptionError),

    /// Outbound request validation errors
    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Daraja answered with a non-success HTTP status
    #[error("Daraja API error {status} ({code}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Daraja error code, e.g. `404.001.03`
        code: String,
        /// Error message from the body, or the canonical description
        message: String,
    },

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while turning a raw callback into a normalized result
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallbackError {
    /// The raw body is not valid JSON
    #[error("Invalid callback JSON: {0}")]
    InvalidJson(String),

    /// A structurally required path is missing
    #[error("Malformed callback: missing required path `{path}`")]
    MalformedCallback {
        /// Dotted path of the missing element, e.g. `Body.stkCallback`
        path: String,
    },

    /// Parsing was requested for a family that has no extraction rule
    #[error("Unsupported callback family: {0}")]
    UnsupportedFamily(CallbackFamily),
}

impl CallbackError {
    /// Create a malformed-callback error for a dotted path
    pub fn missing<S: Into<String>>(path: S) -> Self {
        CallbackError::MalformedCallback { path: path.into() }
    }
}

/// Security credential generation errors
#[derive(Error, Debug)]
pub enum EncryptionError {
    /// Initiator password was empty
    #[error("Initiator password cannot be empty")]
    EmptyPassword,

    /// The certificate could not be read or decoded
    #[error("Failed to load certificate {source_name}: {reason}")]
    CertificateUnavailable {
        /// Path or bundle name the certificate came from
        source_name: String,
        /// What went wrong
        reason: String,
    },

    /// The RSA operation itself failed
    #[error("RSA encryption failed: {0}")]
    Rsa(#[from] rsa::Error),
}

/// Outbound request validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// A required field was empty
    #[error("Field `{0}` cannot be empty")]
    EmptyField(&'static str),

    /// Amount must be a positive value
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Phone number could not be normalized to 2547XXXXXXXX/2541XXXXXXXX
    #[error("Invalid phone number: {0}")]
    InvalidPhoneNumber(String),

    /// URL is not an absolute http(s) URL
    #[error("Invalid URL for `{field}`: {reason}")]
    InvalidUrl {
        /// Field name
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Required environment variable is missing
    #[error("{0} environment variable not set")]
    MissingVar(&'static str),

    /// Environment variable has an unusable value
    #[error("Invalid value for {name}: {reason}")]
    InvalidVar {
        /// Variable name
        name: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Result type alias for mpesa-kit operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_callback_names_path() {
        let err = CallbackError::missing("Result.ResultParameters");
        assert_eq!(
            err.to_string(),
            "Malformed callback: missing required path `Result.ResultParameters`"
        );
    }

    #[test]
    fn test_error_wraps_callback_error() {
        let err: Error = CallbackError::InvalidJson("eof".to_string()).into();
        assert!(err.to_string().starts_with("Callback error:"));
        assert!(err.to_string().contains("eof"));
    }

    #[test]
    fn test_api_error_display() {
        let err = Error::Api {
            status: 404,
            code: "404.001.03".to_string(),
            message: "Invalid Access Token".to_string(),
        };
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains("404.001.03"));
        assert!(err.to_string().contains("Invalid Access Token"));
    }

    #[test]
    fn test_config_error() {
        let err = ConfigError::MissingVar("MPESA_CONSUMER_KEY");
        assert_eq!(
            err.to_string(),
            "MPESA_CONSUMER_KEY environment variable not set"
        );
    }
}
