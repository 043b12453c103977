//! Outbound Daraja Requests
//!
//! Every Daraja operation is one variant of [`TransactionRequest`]. Payloads
//! are plain structs; the `TransactionRequest` constructors validate and
//! normalize them, and the resulting value is never mutated afterwards.
//! Credentials are not part of the payload: they are supplied as a
//! [`RequestAuth`] when the JSON body is rendered, so a request can be built
//! and inspected without secrets in hand.
//!
//! # Example
//!
//! ```rust
//! use mpesa_kit::request::{B2cCommand, B2cPayment, TransactionRequest};
//!
//! let request = TransactionRequest::b2c(B2cPayment {
//!     command: B2cCommand::BusinessPayment,
//!     amount: 1500,
//!     party_a: "600999".to_string(),
//!     phone_number: "0712345678".to_string(),
//!     remarks: "Refund".to_string(),
//!     occasion: None,
//!     result_url: "https://example.com/mpesa/callback".to_string(),
//!     timeout_url: "https://example.com/mpesa/timeout".to_string(),
//! })
//! .unwrap();
//!
//! assert_eq!(request.endpoint(), "/mpesa/b2c/v3/paymentrequest");
//! ```

use std::sync::OnceLock;

use base64::Engine;
use regex::Regex;
use serde_json::{json, Value};
use url::Url;
use uuid::Uuid;

use crate::config::MpesaConfig;
use crate::correlation::DisbursementKind;
use crate::error::RequestError;

/// Path of the OAuth token endpoint
pub const OAUTH_ENDPOINT: &str = "/oauth/v1/generate?grant_type=client_credentials";

/// `IdentifierType` values Daraja accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierType {
    /// Phone number
    Msisdn,
    /// Buy Goods till number
    TillNumber,
    /// PayBill / organization shortcode
    Shortcode,
    /// Organization shortcode, as reversal receivers use it
    OrganizationShortcode,
}

impl IdentifierType {
    /// Wire value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Msisdn => "1",
            Self::TillNumber => "2",
            Self::Shortcode => "4",
            Self::OrganizationShortcode => "11",
        }
    }
}

/// B2C `CommandID`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum B2cCommand {
    /// Unsecured business payment
    BusinessPayment,
    /// Salary payment
    SalaryPayment,
    /// Promotion payment
    PromotionPayment,
}

impl B2cCommand {
    /// Wire value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BusinessPayment => "BusinessPayment",
            Self::SalaryPayment => "SalaryPayment",
            Self::PromotionPayment => "PromotionPayment",
        }
    }
}

/// B2B `CommandID`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum B2bCommand {
    /// Pay a PayBill
    BusinessPayBill,
    /// Pay a till
    BusinessBuyGoods,
    /// Utility to MMF account transfer
    DisburseFundsToBusiness,
    /// Transfer between businesses
    BusinessToBusinessTransfer,
    /// Merchant to merchant transfer
    MerchantToMerchantTransfer,
}

impl B2bCommand {
    /// Wire value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BusinessPayBill => "BusinessPayBill",
            Self::BusinessBuyGoods => "BusinessBuyGoods",
            Self::DisburseFundsToBusiness => "DisburseFundsToBusiness",
            Self::BusinessToBusinessTransfer => "BusinessToBusinessTransfer",
            Self::MerchantToMerchantTransfer => "MerchantToMerchantTransfer",
        }
    }

    /// Identifier type of the receiving party
    pub fn receiver_identifier(&self) -> IdentifierType {
        match self {
            Self::BusinessBuyGoods => IdentifierType::TillNumber,
            _ => IdentifierType::Shortcode,
        }
    }
}

/// Customer payment flavour, shared by C2B simulation and STK push
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CustomerPaymentType {
    /// PayBill
    CustomerPayBillOnline,
    /// Till
    CustomerBuyGoodsOnline,
}

impl CustomerPaymentType {
    /// Wire value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CustomerPayBillOnline => "CustomerPayBillOnline",
            Self::CustomerBuyGoodsOnline => "CustomerBuyGoodsOnline",
        }
    }
}

/// What Safaricom does when the validation URL is unreachable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationFallback {
    /// Complete the payment anyway
    Completed,
    /// Cancel the payment
    Cancelled,
}

impl ValidationFallback {
    /// Wire value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }
}

/// Business to customer payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct B2cPayment {
    /// Daraja `CommandID`
    pub command: B2cCommand,
    /// Whole shillings
    pub amount: u64,
    /// Paying shortcode
    pub party_a: String,
    /// Receiving phone number
    pub phone_number: String,
    /// Free-text remarks
    pub remarks: String,
    /// Optional occasion text
    pub occasion: Option<String>,
    /// `ResultURL` for the asynchronous result
    pub result_url: String,
    /// `QueueTimeOutURL` for queue timeouts
    pub timeout_url: String,
}

/// Business to business payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct B2bPayment {
    /// Daraja `CommandID`
    pub command: B2bCommand,
    /// Whole shillings
    pub amount: u64,
    /// Paying shortcode
    pub party_a: String,
    /// Receiving shortcode or till
    pub party_b: String,
    /// Account reference shown to the receiver
    pub account_reference: String,
    /// Phone number of the customer on whose behalf the business pays
    pub requester: Option<String>,
    /// Free-text remarks
    pub remarks: String,
    /// `ResultURL` for the asynchronous result
    pub result_url: String,
    /// `QueueTimeOutURL` for queue timeouts
    pub timeout_url: String,
}

/// C2B confirmation/validation URL registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct C2bRegisterUrls {
    /// Organization shortcode
    pub short_code: String,
    /// Behaviour when validation is unreachable
    pub response_type: ValidationFallback,
    /// Confirmation URL
    pub confirmation_url: String,
    /// Validation URL
    pub validation_url: String,
}

/// Sandbox-only simulated C2B payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct C2bSimulation {
    /// Organization shortcode
    pub short_code: String,
    /// Daraja `CommandID`
    pub command: CustomerPaymentType,
    /// Whole shillings
    pub amount: u64,
    /// Phone number
    pub phone_number: String,
    /// Account number for PayBill payments
    pub bill_ref_number: Option<String>,
}

/// Account balance query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountBalanceQuery {
    /// Organization shortcode
    pub party_a: String,
    /// Identifier type of `party_a`
    pub identifier_type: IdentifierType,
    /// Free-text remarks
    pub remarks: String,
    /// `ResultURL` for the asynchronous result
    pub result_url: String,
    /// `QueueTimeOutURL` for queue timeouts
    pub timeout_url: String,
}

/// Transaction status query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionStatusQuery {
    /// M-Pesa receipt of the transaction
    pub transaction_id: String,
    /// Organization shortcode
    pub party_a: String,
    /// Identifier type of `party_a`
    pub identifier_type: IdentifierType,
    /// Free-text remarks
    pub remarks: String,
    /// Optional occasion text
    pub occasion: Option<String>,
    /// `ResultURL` for the asynchronous result
    pub result_url: String,
    /// `QueueTimeOutURL` for queue timeouts
    pub timeout_url: String,
}

/// Transaction reversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReversalRequest {
    /// M-Pesa receipt of the transaction
    pub transaction_id: String,
    /// Whole shillings
    pub amount: u64,
    /// Shortcode that received the original payment
    pub receiver_party: String,
    /// Free-text remarks
    pub remarks: String,
    /// Optional occasion text
    pub occasion: Option<String>,
    /// `ResultURL` for the asynchronous result
    pub result_url: String,
    /// `QueueTimeOutURL` for queue timeouts
    pub timeout_url: String,
}

/// STK push ("Lipa na M-Pesa Online") prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StkPush {
    /// PayBill or Buy Goods
    pub transaction_type: CustomerPaymentType,
    /// Whole shillings
    pub amount: u64,
    /// Phone number prompted to pay
    pub phone_number: String,
    /// Till number for Buy Goods; defaults to the business shortcode
    pub party_b: Option<String>,
    /// `CallBackURL` for the STK result
    pub callback_url: String,
    /// Account reference shown to the receiver
    pub account_reference: String,
    /// `TransactionDesc`
    pub description: String,
}

/// STK push status query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StkQuery {
    /// `CheckoutRequestID` returned by the push
    pub checkout_request_id: String,
}

/// Payloads that name the URLs Daraja answers on
///
/// `with_config_urls` fills blank URL fields from `MPESA_RESULT_URL`,
/// `MPESA_TIMEOUT_URL` and `MPESA_CALLBACK_URL`. URLs set on the payload
/// win. Validation still happens in the `TransactionRequest` constructor.
pub trait ConfiguredUrls: Sized {
    /// Fill blank URL fields from `config`
    fn with_config_urls(self, config: &MpesaConfig) -> Self;
}

fn fill_blank(field: &mut String, default: Option<&String>) {
    if field.trim().is_empty() {
        if let Some(default) = default {
            field.clone_from(default);
        }
    }
}

macro_rules! result_urls_from_config {
    ($($payload:ty),+ $(,)?) => {
        $(
            impl ConfiguredUrls for $payload {
                fn with_config_urls(mut self, config: &MpesaConfig) -> Self {
                    fill_blank(&mut self.result_url, config.result_url.as_ref());
                    fill_blank(&mut self.timeout_url, config.timeout_url.as_ref());
                    self
                }
            }
        )+
    };
}

result_urls_from_config!(
    B2cPayment,
    B2bPayment,
    AccountBalanceQuery,
    TransactionStatusQuery,
    ReversalRequest,
);

impl ConfiguredUrls for StkPush {
    fn with_config_urls(mut self, config: &MpesaConfig) -> Self {
        fill_blank(&mut self.callback_url, config.callback_url.as_ref());
        self
    }
}

/// Credentials merged into a request body when it is sent
#[derive(Clone, Default)]
pub struct RequestAuth {
    /// API operator username
    pub initiator_name: Option<String>,
    /// Encrypted initiator password
    pub security_credential: Option<String>,
    /// Lipa na M-Pesa shortcode
    pub business_short_code: String,
    /// Lipa na M-Pesa passkey
    pub passkey: String,
    /// `yyyyMMddHHmmss` in East Africa Time
    pub timestamp: String,
}

impl std::fmt::Debug for RequestAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestAuth")
            .field("initiator_name", &self.initiator_name)
            .field("security_credential", &self.security_credential.as_ref().map(|_| "<redacted>"))
            .field("business_short_code", &self.business_short_code)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

impl RequestAuth {
    /// `base64(shortcode + passkey + timestamp)`, the STK push password
    pub fn stk_password(&self) -> String {
        let raw = format!("{}{}{}", self.business_short_code, self.passkey, self.timestamp);
        base64::engine::general_purpose::STANDARD.encode(raw)
    }
}

/// One Daraja API call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionRequest {
    /// Business to customer payment
    B2c {
        /// Our id for the request, echoed in the result callback
        originator_conversation_id: String,
        /// Validated payload
        payment: B2cPayment,
    },
    /// Business to business payment
    B2b(B2bPayment),
    /// C2B URL registration
    C2bRegisterUrls(C2bRegisterUrls),
    /// C2B simulation (sandbox)
    C2bSimulate(C2bSimulation),
    /// Account balance query
    AccountBalance(AccountBalanceQuery),
    /// Transaction status query
    TransactionStatus(TransactionStatusQuery),
    /// Reversal
    Reversal(ReversalRequest),
    /// STK push prompt
    StkPush(StkPush),
    /// STK push status query
    StkQuery(StkQuery),
}

impl TransactionRequest {
    /// Validated B2C payment with a fresh `OriginatorConversationID`
    pub fn b2c(mut payment: B2cPayment) -> Result<Self, RequestError> {
        payment.phone_number = normalize_msisdn(&payment.phone_number)?;
        require_amount(payment.amount)?;
        require("PartyA", &payment.party_a)?;
        require("Remarks", &payment.remarks)?;
        require_url("ResultURL", &payment.result_url)?;
        require_url("QueueTimeOutURL", &payment.timeout_url)?;

        Ok(Self::B2c {
            originator_conversation_id: Uuid::new_v4().to_string(),
            payment,
        })
    }

    /// Validated B2B payment
    pub fn b2b(mut payment: B2bPayment) -> Result<Self, RequestError> {
        require_amount(payment.amount)?;
        require("PartyA", &payment.party_a)?;
        require("PartyB", &payment.party_b)?;
        require("AccountReference", &payment.account_reference)?;
        require("Remarks", &payment.remarks)?;
        require_url("ResultURL", &payment.result_url)?;
        require_url("QueueTimeOutURL", &payment.timeout_url)?;
        payment.requester = payment
            .requester
            .as_deref()
            .map(normalize_msisdn)
            .transpose()?;

        Ok(Self::B2b(payment))
    }

    /// Validated C2B URL registration
    pub fn c2b_register_urls(registration: C2bRegisterUrls) -> Result<Self, RequestError> {
        require("ShortCode", &registration.short_code)?;
        require_url("ConfirmationURL", &registration.confirmation_url)?;
        require_url("ValidationURL", &registration.validation_url)?;
        Ok(Self::C2bRegisterUrls(registration))
    }

    /// Validated C2B simulation
    pub fn c2b_simulate(mut simulation: C2bSimulation) -> Result<Self, RequestError> {
        require("ShortCode", &simulation.short_code)?;
        require_amount(simulation.amount)?;
        simulation.phone_number = normalize_msisdn(&simulation.phone_number)?;
        Ok(Self::C2bSimulate(simulation))
    }

    /// Validated account balance query
    pub fn account_balance(query: AccountBalanceQuery) -> Result<Self, RequestError> {
        require("PartyA", &query.party_a)?;
        require("Remarks", &query.remarks)?;
        require_url("ResultURL", &query.result_url)?;
        require_url("QueueTimeOutURL", &query.timeout_url)?;
        Ok(Self::AccountBalance(query))
    }

    /// Validated transaction status query
    pub fn transaction_status(query: TransactionStatusQuery) -> Result<Self, RequestError> {
        require("TransactionID", &query.transaction_id)?;
        require("PartyA", &query.party_a)?;
        require("Remarks", &query.remarks)?;
        require_url("ResultURL", &query.result_url)?;
        require_url("QueueTimeOutURL", &query.timeout_url)?;
        Ok(Self::TransactionStatus(query))
    }

    /// Validated reversal
    pub fn reversal(reversal: ReversalRequest) -> Result<Self, RequestError> {
        require("TransactionID", &reversal.transaction_id)?;
        require_amount(reversal.amount)?;
        require("ReceiverParty", &reversal.receiver_party)?;
        require("Remarks", &reversal.remarks)?;
        require_url("ResultURL", &reversal.result_url)?;
        require_url("QueueTimeOutURL", &reversal.timeout_url)?;
        Ok(Self::Reversal(reversal))
    }

    /// Validated STK push
    pub fn stk_push(mut push: StkPush) -> Result<Self, RequestError> {
        require_amount(push.amount)?;
        push.phone_number = normalize_msisdn(&push.phone_number)?;
        require_url("CallBackURL", &push.callback_url)?;
        require("AccountReference", &push.account_reference)?;
        require("TransactionDesc", &push.description)?;
        Ok(Self::StkPush(push))
    }

    /// Validated STK status query
    pub fn stk_query(query: StkQuery) -> Result<Self, RequestError> {
        require("CheckoutRequestID", &query.checkout_request_id)?;
        Ok(Self::StkQuery(query))
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::B2c { .. } => "b2c",
            Self::B2b(_) => "b2b",
            Self::C2bRegisterUrls(_) => "c2b_register_urls",
            Self::C2bSimulate(_) => "c2b_simulate",
            Self::AccountBalance(_) => "account_balance",
            Self::TransactionStatus(_) => "transaction_status",
            Self::Reversal(_) => "reversal",
            Self::StkPush(_) => "stk_push",
            Self::StkQuery(_) => "stk_query",
        }
    }

    /// API path, relative to the environment's base URL
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::B2c { .. } => "/mpesa/b2c/v3/paymentrequest",
            Self::B2b(_) => "/mpesa/b2b/v1/paymentrequest",
            Self::C2bRegisterUrls(_) => "/mpesa/c2b/v1/registerurl",
            Self::C2bSimulate(_) => "/mpesa/c2b/v1/simulate",
            Self::AccountBalance(_) => "/mpesa/accountbalance/v1/query",
            Self::TransactionStatus(_) => "/mpesa/transactionstatus/v1/query",
            Self::Reversal(_) => "/mpesa/reversal/v1/request",
            Self::StkPush(_) => "/mpesa/stkpush/v1/processrequest",
            Self::StkQuery(_) => "/mpesa/stkpushquery/v1/query",
        }
    }

    /// Whether the body carries `Initiator` and `SecurityCredential`
    pub fn requires_security_credential(&self) -> bool {
        matches!(
            self,
            Self::B2c { .. }
                | Self::B2b(_)
                | Self::AccountBalance(_)
                | Self::TransactionStatus(_)
                | Self::Reversal(_)
        )
    }

    /// Disbursement direction, for result attribution
    pub fn disbursement_kind(&self) -> Option<DisbursementKind> {
        match self {
            Self::B2c { .. } => Some(DisbursementKind::B2c),
            Self::B2b(_) => Some(DisbursementKind::B2b),
            _ => None,
        }
    }

    /// Locally generated `OriginatorConversationID`, if any
    pub fn originator_conversation_id(&self) -> Option<&str> {
        match self {
            Self::B2c {
                originator_conversation_id,
                ..
            } => Some(originator_conversation_id),
            _ => None,
        }
    }

    /// Render the Daraja JSON body
    pub fn body(&self, auth: &RequestAuth) -> Value {
        let initiator = auth.initiator_name.as_deref().unwrap_or_default();
        let credential = auth.security_credential.as_deref().unwrap_or_default();

        match self {
            Self::B2c {
                originator_conversation_id,
                payment,
            } => json!({
                "OriginatorConversationID": originator_conversation_id,
                "InitiatorName": initiator,
                "SecurityCredential": credential,
                "CommandID": payment.command.as_str(),
                "Amount": payment.amount,
                "PartyA": payment.party_a,
                "PartyB": payment.phone_number,
                "Remarks": payment.remarks,
                "QueueTimeOutURL": payment.timeout_url,
                "ResultURL": payment.result_url,
                "Occasion": payment.occasion.as_deref().unwrap_or_default(),
            }),
            Self::B2b(payment) => {
                let mut body = json!({
                    "Initiator": initiator,
                    "SecurityCredential": credential,
                    "CommandID": payment.command.as_str(),
                    "SenderIdentifierType": IdentifierType::Shortcode.as_str(),
                    "RecieverIdentifierType": payment.command.receiver_identifier().as_str(),
                    "Amount": payment.amount,
                    "PartyA": payment.party_a,
                    "PartyB": payment.party_b,
                    "AccountReference": payment.account_reference,
                    "Remarks": payment.remarks,
                    "QueueTimeOutURL": payment.timeout_url,
                    "ResultURL": payment.result_url,
                });
                if let (Some(requester), Some(map)) = (&payment.requester, body.as_object_mut()) {
                    map.insert("Requester".to_string(), Value::String(requester.clone()));
                }
                body
            }
            Self::C2bRegisterUrls(registration) => json!({
                "ShortCode": registration.short_code,
                "ResponseType": registration.response_type.as_str(),
                "ConfirmationURL": registration.confirmation_url,
                "ValidationURL": registration.validation_url,
            }),
            Self::C2bSimulate(simulation) => json!({
                "ShortCode": simulation.short_code,
                "CommandID": simulation.command.as_str(),
                "Amount": simulation.amount,
                "Msisdn": simulation.phone_number,
                "BillRefNumber": simulation.bill_ref_number.as_deref().unwrap_or_default(),
            }),
            Self::AccountBalance(query) => json!({
                "Initiator": initiator,
                "SecurityCredential": credential,
                "CommandID": "AccountBalance",
                "PartyA": query.party_a,
                "IdentifierType": query.identifier_type.as_str(),
                "Remarks": query.remarks,
                "QueueTimeOutURL": query.timeout_url,
                "ResultURL": query.result_url,
            }),
            Self::TransactionStatus(query) => json!({
                "Initiator": initiator,
                "SecurityCredential": credential,
                "CommandID": "TransactionStatusQuery",
                "TransactionID": query.transaction_id,
                "PartyA": query.party_a,
                "IdentifierType": query.identifier_type.as_str(),
                "ResultURL": query.result_url,
                "QueueTimeOutURL": query.timeout_url,
                "Remarks": query.remarks,
                "Occasion": query.occasion.as_deref().unwrap_or_default(),
            }),
            Self::Reversal(reversal) => json!({
                "Initiator": initiator,
                "SecurityCredential": credential,
                "CommandID": "TransactionReversal",
                "TransactionID": reversal.transaction_id,
                "Amount": reversal.amount,
                "ReceiverParty": reversal.receiver_party,
                "RecieverIdentifierType": IdentifierType::OrganizationShortcode.as_str(),
                "ResultURL": reversal.result_url,
                "QueueTimeOutURL": reversal.timeout_url,
                "Remarks": reversal.remarks,
                "Occasion": reversal.occasion.as_deref().unwrap_or_default(),
            }),
            Self::StkPush(push) => json!({
                "BusinessShortCode": auth.business_short_code,
                "Password": auth.stk_password(),
                "Timestamp": auth.timestamp,
                "TransactionType": push.transaction_type.as_str(),
                "Amount": push.amount,
                "PartyA": push.phone_number,
                "PartyB": push.party_b.as_deref().unwrap_or(&auth.business_short_code),
                "PhoneNumber": push.phone_number,
                "CallBackURL": push.callback_url,
                "AccountReference": push.account_reference,
                "TransactionDesc": push.description,
            }),
            Self::StkQuery(query) => json!({
                "BusinessShortCode": auth.business_short_code,
                "Password": auth.stk_password(),
                "Timestamp": auth.timestamp,
                "CheckoutRequestID": query.checkout_request_id,
            }),
        }
    }
}

fn msisdn_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^254[17]\d{8}$").ok())
        .as_ref()
}

/// Normalize a Kenyan phone number to `2547XXXXXXXX` / `2541XXXXXXXX`
///
/// Accepts `07…`, `01…`, `+254…`, `254…` and bare `7…`/`1…` forms, with
/// spaces or dashes.
pub fn normalize_msisdn(raw: &str) -> Result<String, RequestError> {
    let digits: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    let digits = digits.strip_prefix('+').unwrap_or(&digits);

    let candidate = if digits.len() == 10 && digits.starts_with('0') {
        format!("254{}", &digits[1..])
    } else if digits.len() == 9 && (digits.starts_with('7') || digits.starts_with('1')) {
        format!("254{digits}")
    } else {
        digits.to_string()
    };

    if msisdn_pattern().is_some_and(|re| re.is_match(&candidate)) {
        Ok(candidate)
    } else {
        Err(RequestError::InvalidPhoneNumber(raw.to_string()))
    }
}

fn require(field: &'static str, value: &str) -> Result<(), RequestError> {
    if value.trim().is_empty() {
        Err(RequestError::EmptyField(field))
    } else {
        Ok(())
    }
}

fn require_amount(amount: u64) -> Result<(), RequestError> {
    if amount == 0 {
        Err(RequestError::InvalidAmount("amount must be at least 1".to_string()))
    } else {
        Ok(())
    }
}

fn require_url(field: &'static str, value: &str) -> Result<(), RequestError> {
    let url = Url::parse(value.trim()).map_err(|e| RequestError::InvalidUrl {
        field,
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(RequestError::InvalidUrl {
            field,
            reason: format!("unsupported scheme {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn auth() -> RequestAuth {
        RequestAuth {
            initiator_name: Some("testapi".to_string()),
            security_credential: Some("ENCRYPTED".to_string()),
            business_short_code: "174379".to_string(),
            passkey: "passkey".to_string(),
            timestamp: "20240101120000".to_string(),
        }
    }

    fn b2c_payment() -> B2cPayment {
        B2cPayment {
            command: B2cCommand::SalaryPayment,
            amount: 100,
            party_a: "600999".to_string(),
            phone_number: "+254 712 345 678".to_string(),
            remarks: "Salary".to_string(),
            occasion: Some("June".to_string()),
            result_url: "https://example.com/result".to_string(),
            timeout_url: "https://example.com/timeout".to_string(),
        }
    }

    #[test]
    fn test_normalize_msisdn() {
        assert_eq!(normalize_msisdn("0712345678").unwrap(), "254712345678");
        assert_eq!(normalize_msisdn("0112345678").unwrap(), "254112345678");
        assert_eq!(normalize_msisdn("+254712345678").unwrap(), "254712345678");
        assert_eq!(normalize_msisdn("712345678").unwrap(), "254712345678");
        assert_eq!(normalize_msisdn("254 712-345-678").unwrap(), "254712345678");
        assert!(normalize_msisdn("12345").is_err());
        assert!(normalize_msisdn("255712345678").is_err());
    }

    #[test]
    fn test_b2c_body() {
        let request = TransactionRequest::b2c(b2c_payment()).unwrap();
        let body = request.body(&auth());

        assert_eq!(body["InitiatorName"], "testapi");
        assert_eq!(body["SecurityCredential"], "ENCRYPTED");
        assert_eq!(body["CommandID"], "SalaryPayment");
        assert_eq!(body["Amount"], 100);
        assert_eq!(body["PartyB"], "254712345678");
        assert_eq!(body["Occasion"], "June");
        assert_eq!(
            body["OriginatorConversationID"],
            request.originator_conversation_id().unwrap()
        );
        assert_eq!(request.disbursement_kind(), Some(DisbursementKind::B2c));
        assert!(request.requires_security_credential());
    }

    #[test]
    fn test_b2c_rejects_zero_amount() {
        let mut payment = b2c_payment();
        payment.amount = 0;
        assert!(matches!(
            TransactionRequest::b2c(payment),
            Err(RequestError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_rejects_non_http_url() {
        let mut payment = b2c_payment();
        payment.result_url = "ftp://example.com/result".to_string();
        assert!(matches!(
            TransactionRequest::b2c(payment),
            Err(RequestError::InvalidUrl { field: "ResultURL", .. })
        ));
    }

    #[test]
    fn test_b2b_buy_goods_receiver_type() {
        let request = TransactionRequest::b2b(B2bPayment {
            command: B2bCommand::BusinessBuyGoods,
            amount: 10,
            party_a: "600000".to_string(),
            party_b: "000000".to_string(),
            account_reference: "353353".to_string(),
            requester: Some("0712345678".to_string()),
            remarks: "ok".to_string(),
            result_url: "https://example.com/result".to_string(),
            timeout_url: "https://example.com/timeout".to_string(),
        })
        .unwrap();

        let body = request.body(&auth());
        assert_eq!(body["RecieverIdentifierType"], "2");
        assert_eq!(body["SenderIdentifierType"], "4");
        assert_eq!(body["Requester"], "254712345678");
        assert_eq!(request.disbursement_kind(), Some(DisbursementKind::B2b));
    }

    #[test]
    fn test_stk_push_password() {
        let request = TransactionRequest::stk_push(StkPush {
            transaction_type: CustomerPaymentType::CustomerPayBillOnline,
            amount: 1,
            phone_number: "0708374149".to_string(),
            party_b: None,
            callback_url: "https://example.com/mpesa/callback".to_string(),
            account_reference: "Order-1".to_string(),
            description: "Payment".to_string(),
        })
        .unwrap();

        let body = request.body(&auth());
        let expected = base64::engine::general_purpose::STANDARD
            .encode("174379passkey20240101120000");
        assert_eq!(body["Password"], expected);
        assert_eq!(body["PartyA"], "254708374149");
        assert_eq!(body["PartyB"], "174379");
        assert_eq!(body["Timestamp"], "20240101120000");
        assert!(!request.requires_security_credential());
    }

    #[test]
    fn test_reversal_body() {
        let request = TransactionRequest::reversal(ReversalRequest {
            transaction_id: "NLJ11HAY8Z".to_string(),
            amount: 100,
            receiver_party: "600610".to_string(),
            remarks: "Wrong recipient".to_string(),
            occasion: None,
            result_url: "https://example.com/result".to_string(),
            timeout_url: "https://example.com/timeout".to_string(),
        })
        .unwrap();

        let body = request.body(&auth());
        assert_eq!(body["CommandID"], "TransactionReversal");
        assert_eq!(body["RecieverIdentifierType"], "11");
        assert_eq!(body["Occasion"], "");
        assert_eq!(request.endpoint(), "/mpesa/reversal/v1/request");
    }

    #[test]
    fn test_empty_field_named() {
        let err = TransactionRequest::stk_query(StkQuery {
            checkout_request_id: " ".to_string(),
        })
        .unwrap_err();
        assert_eq!(err, RequestError::EmptyField("CheckoutRequestID"));
    }

    fn config_with_urls() -> MpesaConfig {
        let mut config = MpesaConfig::new(crate::config::Environment::Sandbox, "key", "secret");
        config.result_url = Some("https://hooks.example.com/result".to_string());
        config.timeout_url = Some("https://hooks.example.com/timeout".to_string());
        config.callback_url = Some("https://hooks.example.com/stk".to_string());
        config
    }

    #[test]
    fn test_blank_urls_filled_from_config() {
        let payment = B2cPayment {
            result_url: String::new(),
            timeout_url: " ".to_string(),
            ..b2c_payment()
        }
        .with_config_urls(&config_with_urls());

        assert_eq!(payment.result_url, "https://hooks.example.com/result");
        assert_eq!(payment.timeout_url, "https://hooks.example.com/timeout");
        assert!(TransactionRequest::b2c(payment).is_ok());
    }

    #[test]
    fn test_explicit_urls_kept() {
        let payment = b2c_payment().with_config_urls(&config_with_urls());
        assert_eq!(payment.result_url, "https://example.com/result");
        assert_eq!(payment.timeout_url, "https://example.com/timeout");
    }

    #[test]
    fn test_stk_callback_url_from_config() {
        let push = StkPush {
            transaction_type: CustomerPaymentType::CustomerPayBillOnline,
            amount: 1,
            phone_number: "0708374149".to_string(),
            party_b: None,
            callback_url: String::new(),
            account_reference: "Order-1".to_string(),
            description: "Payment".to_string(),
        };

        let filled = push.clone().with_config_urls(&config_with_urls());
        assert_eq!(filled.callback_url, "https://hooks.example.com/stk");

        let unconfigured = MpesaConfig::new(crate::config::Environment::Sandbox, "key", "secret");
        let err = TransactionRequest::stk_push(push.with_config_urls(&unconfigured)).unwrap_err();
        assert!(matches!(err, RequestError::InvalidUrl { field: "CallBackURL", .. }));
    }

    #[test]
    fn test_auth_debug_redacts_credential() {
        let debug = format!("{:?}", auth());
        assert!(!debug.contains("ENCRYPTED"));
        assert!(!debug.contains("passkey\""));
    }
}
