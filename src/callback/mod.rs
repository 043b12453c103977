//! M-Pesa Callback Normalization
//!
//! Safaricom delivers webhook callbacks in several unrelated JSON shapes.
//! This module decodes them, decides which family a payload belongs to, and
//! flattens it into a stable, typed [`NormalizedResult`].
//!
//! # Pipeline
//!
//! ```text
//! raw JSON ──▶ ParsedCallback ──▶ classify() ──▶ CallbackFamily
//!                    │                                 │
//!                    └──────────────▶ parse_callback() ◀┘
//!                                           │
//!                                           ▼
//!                                    NormalizedResult
//! ```
//!
//! Several families encode their variable data as an ordered
//! `[{Key, Value}]` list whose order differs between sandbox and production,
//! so every lookup in here goes by key name, never by position.
//!
//! # Example
//!
//! ```rust
//! use mpesa_kit::callback::{classify_raw, parse, CallbackFamily};
//!
//! let raw = r#"{"Body":{"stkCallback":{
//!     "MerchantRequestID":"29115-34620561-1",
//!     "CheckoutRequestID":"ws_CO_191220191020363925",
//!     "ResultCode":1032,
//!     "ResultDesc":"Request cancelled by user"}}}"#;
//!
//! assert_eq!(classify_raw(raw), CallbackFamily::Express);
//! let result = parse(raw, CallbackFamily::Express).unwrap();
//! assert_eq!(result.result_code(), Some("1032"));
//! ```

pub mod balance;
pub mod classify;
pub mod params;
pub mod parse;
pub mod result;
pub mod timestamp;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CallbackError;

pub use balance::{parse_account, parse_account_balances, AccountBalance};
pub use classify::{classify, classify_raw};
pub use params::KeyedValues;
pub use parse::{parse, parse_callback};
pub use result::{
    AccountBalanceResult, C2bNotification, DisbursementResult, ExpressResult, NormalizedResult,
    ResultHeader, ReversalResult, TransactionStatusResult,
};

/// Callback families Safaricom can deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallbackFamily {
    /// Customer-to-Business confirmation/validation
    #[serde(rename = "C2B")]
    C2b,
    /// Business-to-Customer disbursement result
    #[serde(rename = "B2C")]
    B2c,
    /// Business-to-Business disbursement result
    #[serde(rename = "B2B")]
    B2b,
    /// Disbursement result whose direction is not known from the body
    #[serde(rename = "B2B_or_B2C")]
    B2bOrB2c,
    /// STK push ("Lipa na M-Pesa Online") result
    Express,
    /// Account balance query result
    AccountBalance,
    /// Transaction status query result
    TransactionStatus,
    /// Reversal result
    Reversal,
    /// Nothing recognizable
    Unknown,
}

impl CallbackFamily {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::C2b => "C2B",
            Self::B2c => "B2C",
            Self::B2b => "B2B",
            Self::B2bOrB2c => "B2B_or_B2C",
            Self::Express => "Express",
            Self::AccountBalance => "AccountBalance",
            Self::TransactionStatus => "TransactionStatus",
            Self::Reversal => "Reversal",
            Self::Unknown => "Unknown",
        }
    }

    /// Check if this is a known family
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for CallbackFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallbackFamily {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        Ok(match normalized.as_str() {
            "c2b" => Self::C2b,
            "b2c" => Self::B2c,
            "b2b" => Self::B2b,
            "b2borb2c" | "b2corb2b" | "disbursement" => Self::B2bOrB2c,
            "express" | "stk" | "stkpush" => Self::Express,
            "accountbalance" | "balance" => Self::AccountBalance,
            "transactionstatus" | "status" => Self::TransactionStatus,
            "reversal" => Self::Reversal,
            _ => Self::Unknown,
        })
    }
}

/// A decoded callback body
///
/// Immutable once created; all accessors borrow from it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCallback {
    root: Value,
}

impl ParsedCallback {
    /// Decode raw callback text
    pub fn decode(raw: &str) -> Result<Self, CallbackError> {
        serde_json::from_str(raw)
            .map(Self::from_value)
            .map_err(|e| CallbackError::InvalidJson(e.to_string()))
    }

    /// Decode raw callback bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CallbackError> {
        serde_json::from_slice(bytes)
            .map(Self::from_value)
            .map_err(|e| CallbackError::InvalidJson(e.to_string()))
    }

    /// Wrap an already decoded value
    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    /// The decoded document
    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Walk nested objects. `null` counts as absent.
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        lookup(&self.root, path)
    }

    /// Like [`get`](Self::get) but reports the dotted path when absent
    pub fn require(&self, path: &[&str]) -> Result<&Value, CallbackError> {
        self.get(path)
            .ok_or_else(|| CallbackError::missing(path.join(".")))
    }
}

impl FromStr for ParsedCallback {
    type Err = CallbackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

pub(crate) fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for segment in path {
        current = current.as_object()?.get(*segment)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}
