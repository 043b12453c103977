//! Normalized callback results
//!
//! One struct per callback family. Each serializes to a flat camelCase JSON
//! object; [`NormalizedResult`] adds a `family` tag.

// Field names mirror Safaricom's payload keys
#![allow(missing_docs)]

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};

use super::balance::AccountBalance;
use super::CallbackFamily;

/// A callback flattened into named fields
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "family")]
pub enum NormalizedResult {
    /// C2B confirmation/validation
    #[serde(rename = "C2B")]
    C2b(C2bNotification),
    /// STK push result
    Express(ExpressResult),
    /// B2C result
    #[serde(rename = "B2C")]
    B2c(DisbursementResult),
    /// B2B result
    #[serde(rename = "B2B")]
    B2b(DisbursementResult),
    /// Disbursement result not yet attributed to B2C or B2B
    #[serde(rename = "B2B_or_B2C")]
    B2bOrB2c(DisbursementResult),
    /// Account balance result
    AccountBalance(AccountBalanceResult),
    /// Transaction status result
    TransactionStatus(TransactionStatusResult),
    /// Reversal result
    Reversal(ReversalResult),
}

impl NormalizedResult {
    /// Family of this result
    pub fn family(&self) -> CallbackFamily {
        match self {
            Self::C2b(_) => CallbackFamily::C2b,
            Self::Express(_) => CallbackFamily::Express,
            Self::B2c(_) => CallbackFamily::B2c,
            Self::B2b(_) => CallbackFamily::B2b,
            Self::B2bOrB2c(_) => CallbackFamily::B2bOrB2c,
            Self::AccountBalance(_) => CallbackFamily::AccountBalance,
            Self::TransactionStatus(_) => CallbackFamily::TransactionStatus,
            Self::Reversal(_) => CallbackFamily::Reversal,
        }
    }

    /// Common `Result` header, for the families that have one
    pub fn header(&self) -> Option<&ResultHeader> {
        match self {
            Self::B2c(r) | Self::B2b(r) | Self::B2bOrB2c(r) => Some(&r.header),
            Self::AccountBalance(r) => Some(&r.header),
            Self::TransactionStatus(r) => Some(&r.header),
            Self::Reversal(r) => Some(&r.header),
            Self::C2b(_) | Self::Express(_) => None,
        }
    }

    /// Result code; C2B notifications carry none
    pub fn result_code(&self) -> Option<&str> {
        match self {
            Self::Express(r) => Some(r.result_code.as_str()),
            Self::C2b(_) => None,
            _ => self.header().map(|h| h.result_code.as_str()),
        }
    }

    /// Result description
    pub fn result_desc(&self) -> Option<&str> {
        match self {
            Self::Express(r) => r.result_desc.as_deref(),
            Self::C2b(_) => None,
            _ => self.header().and_then(|h| h.result_desc.as_deref()),
        }
    }

    /// Whether Safaricom reported success. C2B notifications always are.
    pub fn is_success(&self) -> bool {
        self.result_code().map_or(true, |code| code == "0")
    }

    /// The M-Pesa transaction id, where the family reports one
    pub fn transaction_id(&self) -> Option<&str> {
        match self {
            Self::C2b(r) => Some(r.transaction_id.as_str()),
            Self::Express(r) => r.mpesa_receipt_number.as_deref(),
            Self::TransactionStatus(r) => r
                .receipt_no
                .as_deref()
                .or(r.header.transaction_id.as_deref()),
            _ => self.header().and_then(|h| h.transaction_id.as_deref()),
        }
    }

    /// Conversation id that ties a result to the request that caused it
    pub fn conversation_id(&self) -> Option<&str> {
        self.header().and_then(|h| h.conversation_id.as_deref())
    }

    /// Re-label a disbursement result once its direction is known
    pub fn with_disbursement_family(self, family: CallbackFamily) -> Self {
        match (self, family) {
            (Self::B2bOrB2c(r) | Self::B2c(r) | Self::B2b(r), CallbackFamily::B2c) => Self::B2c(r),
            (Self::B2bOrB2c(r) | Self::B2c(r) | Self::B2b(r), CallbackFamily::B2b) => Self::B2b(r),
            (other, _) => other,
        }
    }

    /// The flat field map, including the `family` tag
    pub fn to_flat_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Fields shared by every `Result` envelope
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultHeader {
    /// `ResultType`
    pub result_type: Option<String>,
    /// `ResultCode`, rendered as a string (`"0"` on success)
    pub result_code: String,
    /// `ResultDesc`
    pub result_desc: Option<String>,
    /// `OriginatorConversationID`
    pub originator_conversation_id: Option<String>,
    /// `ConversationID`
    pub conversation_id: Option<String>,
    /// `TransactionID`
    pub transaction_id: Option<String>,
    /// `ReferenceData.ReferenceItem` entries
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub reference_data: BTreeMap<String, String>,
}

/// C2B confirmation or validation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct C2bNotification {
    pub transaction_type: String,
    pub transaction_id: String,
    pub transaction_time: Option<DateTime<FixedOffset>>,
    pub amount: Option<Decimal>,
    pub business_short_code: Option<String>,
    pub bill_ref_number: Option<String>,
    pub invoice_number: Option<String>,
    pub org_account_balance: Option<Decimal>,
    pub third_party_trans_id: Option<String>,
    pub msisdn: String,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
}

/// STK push result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressResult {
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    pub result_code: String,
    pub result_desc: Option<String>,
    pub amount: Option<Decimal>,
    pub mpesa_receipt_number: Option<String>,
    pub transaction_date: Option<DateTime<FixedOffset>>,
    pub phone_number: Option<String>,
    pub balance: Option<Decimal>,
}

/// B2C or B2B payment result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisbursementResult {
    #[serde(flatten)]
    pub header: ResultHeader,
    pub amount: Option<Decimal>,
    pub transaction_receipt: Option<String>,
    pub receiver_party_public_name: Option<String>,
    pub completed_at: Option<DateTime<FixedOffset>>,
    pub recipient_is_registered_customer: Option<bool>,
    pub utility_account_available_funds: Option<Decimal>,
    pub working_account_available_funds: Option<Decimal>,
    pub charges_paid_account_available_funds: Option<Decimal>,
    pub debit_party_charges: Option<String>,
    pub currency: Option<String>,
    pub debit_account_current_balance: Option<String>,
    pub debit_party_affected_account_balance: Option<AccountBalance>,
    pub debit_party_affected_account_balance_raw: Option<String>,
    pub initiator_account_current_balance: Option<String>,
}

/// Account balance query result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalanceResult {
    #[serde(flatten)]
    pub header: ResultHeader,
    pub accounts: Vec<AccountBalance>,
    pub completed_at: Option<DateTime<FixedOffset>>,
}

impl AccountBalanceResult {
    /// Find an account by name, ignoring case
    pub fn account(&self, name: &str) -> Option<&AccountBalance> {
        self.accounts
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }
}

/// Transaction status query result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatusResult {
    #[serde(flatten)]
    pub header: ResultHeader,
    /// `OriginatorConversationID` of the queried transaction, not of the query
    pub queried_originator_conversation_id: Option<String>,
    /// `ConversationID` of the queried transaction
    pub queried_conversation_id: Option<String>,
    pub receipt_no: Option<String>,
    pub transaction_status: Option<String>,
    pub amount: Option<Decimal>,
    pub debit_party_name: Option<String>,
    pub credit_party_name: Option<String>,
    pub debit_account_type: Option<String>,
    pub debit_party_charges: Option<String>,
    pub transaction_reason: Option<String>,
    pub reason_type: Option<String>,
    pub initiated_at: Option<DateTime<FixedOffset>>,
    pub finalised_at: Option<DateTime<FixedOffset>>,
}

/// Reversal result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReversalResult {
    #[serde(flatten)]
    pub header: ResultHeader,
    pub debit_account_balance: Option<AccountBalance>,
    pub debit_account_balance_raw: Option<String>,
    pub amount: Option<Decimal>,
    pub original_transaction_id: Option<String>,
    pub charge: Option<Decimal>,
    pub credit_party_public_name: Option<String>,
    pub debit_party_public_name: Option<String>,
    pub completed_at: Option<DateTime<FixedOffset>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disbursement() -> DisbursementResult {
        DisbursementResult {
            header: ResultHeader {
                result_code: "0".to_string(),
                conversation_id: Some("AG_20191219_00005797af5d7d75f652".to_string()),
                ..ResultHeader::default()
            },
            amount: Some(Decimal::new(1000, 2)),
            transaction_receipt: Some("NLJ41HAY6Q".to_string()),
            receiver_party_public_name: None,
            completed_at: None,
            recipient_is_registered_customer: None,
            utility_account_available_funds: None,
            working_account_available_funds: None,
            charges_paid_account_available_funds: None,
            debit_party_charges: None,
            currency: None,
            debit_account_current_balance: None,
            debit_party_affected_account_balance: None,
            debit_party_affected_account_balance_raw: None,
            initiator_account_current_balance: None,
        }
    }

    #[test]
    fn test_flat_map_is_flat_and_tagged() {
        let result = NormalizedResult::B2bOrB2c(disbursement());
        let map = result.to_flat_map();

        assert_eq!(map["family"], "B2B_or_B2C");
        assert_eq!(map["resultCode"], "0");
        assert_eq!(map["amount"], "10.00");
        assert_eq!(map["conversationId"], "AG_20191219_00005797af5d7d75f652");
        assert!(!map.contains_key("header"));
        assert!(!map.contains_key("referenceData"));
    }

    #[test]
    fn test_relabel_disbursement() {
        let result = NormalizedResult::B2bOrB2c(disbursement())
            .with_disbursement_family(CallbackFamily::B2c);
        assert_eq!(result.family(), CallbackFamily::B2c);

        let unchanged = result.with_disbursement_family(CallbackFamily::Unknown);
        assert_eq!(unchanged.family(), CallbackFamily::B2c);
    }

    #[test]
    fn test_success_from_header() {
        let result = NormalizedResult::B2c(disbursement());
        assert!(result.is_success());
        assert_eq!(result.conversation_id(), Some("AG_20191219_00005797af5d7d75f652"));
    }
}
