//! mpesa-kit - M-Pesa Daraja Integration Toolkit
//!
//! This crate handles the fiddly parts of integrating with Safaricom's
//! Daraja API: normalizing webhook callbacks, generating security
//! credentials, and sending validated requests.
//!
//! # Features
//!
//! - **Callback normalization**: classify any Daraja callback and flatten it
//!   into a typed [`NormalizedResult`]
//! - **Security credentials**: RSA-encrypt initiator passwords against the
//!   environment certificate
//! - **Typed requests**: one validated [`TransactionRequest`] per operation
//! - **Client**: OAuth token caching, request signing, error mapping
//! - **Webhook server**: axum routes that acknowledge Safaricom correctly
//!
//! # Architecture
//!
//! ```text
//!  Application ──▶ DarajaClient ──▶ Daraja API
//!                       │                │
//!                       ▼                ▼ (async result)
//!               CorrelationStore ◀── webhook_router ──▶ CallbackHandler
//!                                        │
//!                                        ▼
//!                               classify + parse
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use mpesa_kit::{classify_raw, format_success, parse, CallbackFamily};
//!
//! let raw = r#"{"Result":{
//!     "ResultType":0,"ResultCode":0,"ResultDesc":"ok",
//!     "OriginatorConversationID":"10571-7910404-1",
//!     "ConversationID":"AG_20191219_00004e48cf7e3533f581",
//!     "TransactionID":"NLJ41HAY6Q",
//!     "ResultParameters":{"ResultParameter":[
//!         {"Key":"TransactionAmount","Value":10},
//!         {"Key":"TransactionReceipt","Value":"NLJ41HAY6Q"}]}}}"#;
//!
//! let family = classify_raw(raw);
//! assert_eq!(family, CallbackFamily::B2bOrB2c);
//!
//! let result = parse(raw, family).unwrap();
//! assert!(result.is_success());
//! assert_eq!(format_success("ok"), r#"{"ResultDesc":"ok","ResultCode":"0"}"#);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod api_error;
pub mod cache;
pub mod callback;
pub mod client;
pub mod config;
pub mod correlation;
pub mod credential;
pub mod error;
pub mod request;
pub mod response;
pub mod server;

// Re-exports for convenience
pub use callback::{classify, classify_raw, parse, CallbackFamily, NormalizedResult, ParsedCallback};
pub use client::{ApiResponse, DarajaClient};
pub use config::{Environment, MpesaConfig};
pub use credential::{encrypt_credential, SecurityCredentialCodec};
pub use error::{Error, Result};
pub use request::{ConfiguredUrls, TransactionRequest};
pub use response::{format_error, format_success, Acknowledgement};
pub use server::{webhook_router, CallbackHandler, WebhookState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
