//! Callback acknowledgement bodies
//!
//! Safaricom expects every webhook to be answered with
//! `{"ResultDesc": ..., "ResultCode": ...}`. `"0"` acknowledges; anything else
//! reports an error (or, on the C2B validation endpoint, rejects the payment).

use serde::{Deserialize, Serialize};

/// Result code for an accepted callback
pub const SUCCESS_CODE: &str = "0";

/// Result code returned when a callback could not be processed
pub const ERROR_CODE: &str = "1";

/// Acknowledgement body returned to Safaricom
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    /// Human readable description
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
    /// `"0"` for success, an error code otherwise
    #[serde(rename = "ResultCode")]
    pub result_code: String,
}

impl Acknowledgement {
    /// Success acknowledgement
    pub fn success<S: Into<String>>(message: S) -> Self {
        Self {
            result_desc: message.into(),
            result_code: SUCCESS_CODE.to_string(),
        }
    }

    /// Error acknowledgement with a caller-chosen code
    pub fn error<M: Into<String>, C: Into<String>>(message: M, code: C) -> Self {
        Self {
            result_desc: message.into(),
            result_code: code.into(),
        }
    }

    /// C2B validation rejection
    pub fn reject(reason: C2bRejection) -> Self {
        Self::error(reason.description(), reason.code())
    }

    /// Whether this acknowledges success
    pub fn is_success(&self) -> bool {
        self.result_code == SUCCESS_CODE
    }

    /// Render as JSON text
    pub fn to_json(&self) -> String {
        // Two string fields cannot fail to serialize
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// `{"ResultDesc": message, "ResultCode": "0"}` as JSON text
pub fn format_success(message: &str) -> String {
    Acknowledgement::success(message).to_json()
}

/// `{"ResultDesc": message, "ResultCode": code}` as JSON text
pub fn format_error(message: &str, code: &str) -> String {
    Acknowledgement::error(message, code).to_json()
}

/// Reasons a C2B validation request can be rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum C2bRejection {
    /// `C2B00011`
    InvalidMsisdn,
    /// `C2B00012`
    InvalidAccountNumber,
    /// `C2B00013`
    InvalidAmount,
    /// `C2B00014`
    InvalidKycDetails,
    /// `C2B00015`
    InvalidShortcode,
    /// `C2B00016`
    OtherError,
}

impl C2bRejection {
    /// Safaricom's rejection code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidMsisdn => "C2B00011",
            Self::InvalidAccountNumber => "C2B00012",
            Self::InvalidAmount => "C2B00013",
            Self::InvalidKycDetails => "C2B00014",
            Self::InvalidShortcode => "C2B00015",
            Self::OtherError => "C2B00016",
        }
    }

    /// Description sent alongside the code
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidMsisdn => "Invalid MSISDN",
            Self::InvalidAccountNumber => "Invalid Account Number",
            Self::InvalidAmount => "Invalid Amount",
            Self::InvalidKycDetails => "Invalid KYC Details",
            Self::InvalidShortcode => "Invalid Shortcode",
            Self::OtherError => "Other Error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_success_shape() {
        let body: Value = serde_json::from_str(&format_success("Confirmation received")).unwrap();
        assert_eq!(
            body,
            json!({"ResultDesc": "Confirmation received", "ResultCode": "0"})
        );
    }

    #[test]
    fn test_error_shape() {
        let body: Value = serde_json::from_str(&format_error("Malformed", "1")).unwrap();
        assert_eq!(body, json!({"ResultDesc": "Malformed", "ResultCode": "1"}));
    }

    #[test]
    fn test_field_order() {
        assert_eq!(
            format_success("ok"),
            r#"{"ResultDesc":"ok","ResultCode":"0"}"#
        );
    }

    #[test]
    fn test_rejection() {
        let ack = Acknowledgement::reject(C2bRejection::InvalidAccountNumber);
        assert!(!ack.is_success());
        assert_eq!(ack.result_code, "C2B00012");
        assert_eq!(ack.result_desc, "Invalid Account Number");
    }
}
