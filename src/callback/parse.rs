//! Per-family extraction rules
//!
//! Every rule first checks the family's required structural paths and fails
//! with [`CallbackError::MalformedCallback`] naming the first one missing.
//! Anything inside a `[{Key, Value}]` list is optional and comes back as
//! `None` when absent.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use super::balance::{parse_account, parse_account_balances, AccountBalance};
use super::params::{value_to_decimal, value_to_flag, value_to_string, KeyedValues};
use super::result::{
    AccountBalanceResult, C2bNotification, DisbursementResult, ExpressResult, NormalizedResult,
    ResultHeader, ReversalResult, TransactionStatusResult,
};
use super::timestamp::parse_timestamp_value;
use super::{lookup, CallbackFamily, ParsedCallback};
use crate::error::CallbackError;

/// Decode raw callback text and extract the fields of `family`
pub fn parse(raw: &str, family: CallbackFamily) -> Result<NormalizedResult, CallbackError> {
    let parsed = ParsedCallback::decode(raw)?;
    parse_callback(&parsed, family)
}

/// Extract the fields of `family` from an already decoded callback
pub fn parse_callback(
    parsed: &ParsedCallback,
    family: CallbackFamily,
) -> Result<NormalizedResult, CallbackError> {
    let result = match family {
        CallbackFamily::C2b => NormalizedResult::C2b(parse_c2b(parsed)?),
        CallbackFamily::Express => NormalizedResult::Express(parse_express(parsed)?),
        CallbackFamily::B2c => NormalizedResult::B2c(parse_disbursement(parsed)?),
        CallbackFamily::B2b => NormalizedResult::B2b(parse_disbursement(parsed)?),
        CallbackFamily::B2bOrB2c => NormalizedResult::B2bOrB2c(parse_disbursement(parsed)?),
        CallbackFamily::AccountBalance => {
            NormalizedResult::AccountBalance(parse_account_balance(parsed)?)
        }
        CallbackFamily::TransactionStatus => {
            NormalizedResult::TransactionStatus(parse_transaction_status(parsed)?)
        }
        CallbackFamily::Reversal => NormalizedResult::Reversal(parse_reversal(parsed)?),
        CallbackFamily::Unknown => return Err(CallbackError::UnsupportedFamily(family)),
    };

    debug!(family = %family, "Callback normalized");
    Ok(result)
}

fn required_string(parsed: &ParsedCallback, path: &[&str]) -> Result<String, CallbackError> {
    parsed
        .require(path)
        .ok()
        .and_then(value_to_string)
        .ok_or_else(|| CallbackError::missing(path.join(".")))
}

fn optional<'a>(parsed: &'a ParsedCallback, key: &str) -> Option<&'a Value> {
    parsed.get(&[key])
}

fn parse_c2b(parsed: &ParsedCallback) -> Result<C2bNotification, CallbackError> {
    let transaction_type = required_string(parsed, &["TransactionType"])?;
    let transaction_id = required_string(parsed, &["TransID"])?;
    let msisdn = required_string(parsed, &["MSISDN"])?;

    let string = |key: &str| optional(parsed, key).and_then(value_to_string);
    let decimal = |key: &str| optional(parsed, key).and_then(value_to_decimal);

    Ok(C2bNotification {
        transaction_type,
        transaction_id,
        transaction_time: optional(parsed, "TransTime").and_then(parse_timestamp_value),
        amount: decimal("TransAmount"),
        business_short_code: string("BusinessShortCode"),
        bill_ref_number: string("BillRefNumber"),
        invoice_number: string("InvoiceNumber"),
        org_account_balance: decimal("OrgAccountBalance"),
        third_party_trans_id: string("ThirdPartyTransID"),
        msisdn,
        first_name: string("FirstName"),
        middle_name: string("MiddleName"),
        last_name: string("LastName"),
    })
}

const STK_CALLBACK: [&str; 2] = ["Body", "stkCallback"];

fn parse_express(parsed: &ParsedCallback) -> Result<ExpressResult, CallbackError> {
    let callback = parsed.require(&STK_CALLBACK)?;
    let field = |key: &'static str| -> Result<String, CallbackError> {
        lookup(callback, &[key])
            .and_then(value_to_string)
            .ok_or_else(|| CallbackError::missing(format!("Body.stkCallback.{key}")))
    };

    let merchant_request_id = field("MerchantRequestID")?;
    let checkout_request_id = field("CheckoutRequestID")?;
    let result_code = field("ResultCode")?;
    let result_desc = lookup(callback, &["ResultDesc"]).and_then(value_to_string);

    // Safaricom only attaches CallbackMetadata to successful payments
    let metadata = if result_code == "0" {
        KeyedValues::callback_metadata(callback)
    } else {
        KeyedValues::default()
    };

    Ok(ExpressResult {
        merchant_request_id,
        checkout_request_id,
        result_code,
        result_desc,
        amount: metadata.decimal("Amount"),
        mpesa_receipt_number: metadata.string("MpesaReceiptNumber"),
        transaction_date: metadata.timestamp("TransactionDate"),
        phone_number: metadata.string("PhoneNumber"),
        balance: metadata.decimal("Balance"),
    })
}

/// Envelope shared by the `Result.ResultParameters` families
struct ResultEnvelope<'a> {
    header: ResultHeader,
    params: KeyedValues<'a>,
}

fn parse_envelope(parsed: &ParsedCallback) -> Result<ResultEnvelope<'_>, CallbackError> {
    let result = parsed.require(&["Result"])?;
    if !result.is_object() {
        return Err(CallbackError::missing("Result"));
    }

    let result_code = lookup(result, &["ResultCode"])
        .and_then(value_to_string)
        .ok_or_else(|| CallbackError::missing("Result.ResultCode"))?;

    let params = KeyedValues::result_parameters(result);
    if result_code == "0" && lookup(result, &["ResultParameters", "ResultParameter"]).is_none() {
        return Err(CallbackError::missing(
            "Result.ResultParameters.ResultParameter",
        ));
    }

    let string = |key: &str| lookup(result, &[key]).and_then(value_to_string);
    let reference_data: BTreeMap<String, String> = KeyedValues::reference_items(result)
        .to_string_map()
        .into_iter()
        .collect();

    let header = ResultHeader {
        result_type: string("ResultType"),
        result_code,
        result_desc: string("ResultDesc"),
        originator_conversation_id: string("OriginatorConversationID"),
        conversation_id: string("ConversationID"),
        transaction_id: string("TransactionID"),
        reference_data,
    };

    Ok(ResultEnvelope { header, params })
}

fn parse_disbursement(parsed: &ParsedCallback) -> Result<DisbursementResult, CallbackError> {
    let ResultEnvelope { header, params } = parse_envelope(parsed)?;

    let (debit_party_affected_account_balance, debit_party_affected_account_balance_raw) =
        delimited_account(params.string("DebitPartyAffectedAccountBalance"));

    Ok(DisbursementResult {
        header,
        amount: params
            .first_of(&["TransactionAmount", "Amount"])
            .and_then(value_to_decimal),
        transaction_receipt: params.string("TransactionReceipt"),
        receiver_party_public_name: params.string("ReceiverPartyPublicName"),
        completed_at: params
            .first_of(&["TransactionCompletedDateTime", "TransCompletedTime"])
            .and_then(parse_timestamp_value),
        recipient_is_registered_customer: params
            .get("B2CRecipientIsRegisteredCustomer")
            .and_then(value_to_flag),
        utility_account_available_funds: params.decimal("B2CUtilityAccountAvailableFunds"),
        working_account_available_funds: params.decimal("B2CWorkingAccountAvailableFunds"),
        charges_paid_account_available_funds: params
            .decimal("B2CChargesPaidAccountAvailableFunds"),
        debit_party_charges: params.string("DebitPartyCharges"),
        currency: params.string("Currency"),
        debit_account_current_balance: params.string("DebitAccountCurrentBalance"),
        debit_party_affected_account_balance,
        debit_party_affected_account_balance_raw,
        initiator_account_current_balance: params.string("InitiatorAccountCurrentBalance"),
    })
}

fn parse_account_balance(parsed: &ParsedCallback) -> Result<AccountBalanceResult, CallbackError> {
    let ResultEnvelope { header, params } = parse_envelope(parsed)?;

    let accounts = params
        .string("AccountBalance")
        .map(|raw| parse_account_balances(&raw))
        .unwrap_or_default();

    Ok(AccountBalanceResult {
        header,
        accounts,
        completed_at: params.timestamp("BOCompletedTime"),
    })
}

fn parse_transaction_status(
    parsed: &ParsedCallback,
) -> Result<TransactionStatusResult, CallbackError> {
    let ResultEnvelope { header, params } = parse_envelope(parsed)?;

    Ok(TransactionStatusResult {
        header,
        queried_originator_conversation_id: params.string("OriginatorConversationID"),
        queried_conversation_id: params.string("ConversationID"),
        receipt_no: params.string("ReceiptNo"),
        transaction_status: params.string("TransactionStatus"),
        amount: params.decimal("Amount"),
        debit_party_name: params.string("DebitPartyName"),
        credit_party_name: params.string("CreditPartyName"),
        debit_account_type: params.string("DebitAccountType"),
        debit_party_charges: params.string("DebitPartyCharges"),
        transaction_reason: params.string("TransactionReason"),
        reason_type: params.string("ReasonType"),
        initiated_at: params.timestamp("InitiatedTime"),
        finalised_at: params.timestamp("FinalisedTime"),
    })
}

fn parse_reversal(parsed: &ParsedCallback) -> Result<ReversalResult, CallbackError> {
    let ResultEnvelope { header, params } = parse_envelope(parsed)?;

    let (debit_account_balance, debit_account_balance_raw) =
        delimited_account(params.string("DebitAccountBalance"));

    Ok(ReversalResult {
        header,
        debit_account_balance,
        debit_account_balance_raw,
        amount: params.decimal("Amount"),
        original_transaction_id: params.string("OriginalTransactionID"),
        charge: params.decimal("Charge"),
        credit_party_public_name: params.string("CreditPartyPublicName"),
        debit_party_public_name: params.string("DebitPartyPublicName"),
        completed_at: params.timestamp("TransCompletedTime"),
    })
}

/// Parse a `Name|Currency|...` account string, keeping the raw text
fn delimited_account(raw: Option<String>) -> (Option<AccountBalance>, Option<String>) {
    let account = raw
        .as_deref()
        .filter(|raw| raw.contains('|'))
        .and_then(parse_account);
    (account, raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_unknown_family_is_unsupported() {
        let err = parse("{}", CallbackFamily::Unknown).unwrap_err();
        assert_eq!(err, CallbackError::UnsupportedFamily(CallbackFamily::Unknown));
    }

    #[test]
    fn test_c2b_requires_trans_id() {
        let raw = r#"{"TransactionType":"Pay Bill","MSISDN":"254708374149"}"#;
        let err = parse(raw, CallbackFamily::C2b).unwrap_err();
        assert_eq!(err, CallbackError::missing("TransID"));
    }

    #[test]
    fn test_express_requires_stk_callback() {
        let err = parse(r#"{"Body":{}}"#, CallbackFamily::Express).unwrap_err();
        assert_eq!(err, CallbackError::missing("Body.stkCallback"));
    }

    #[test]
    fn test_express_requires_result_code() {
        let raw = r#"{"Body":{"stkCallback":{"MerchantRequestID":"1","CheckoutRequestID":"2"}}}"#;
        let err = parse(raw, CallbackFamily::Express).unwrap_err();
        assert_eq!(err, CallbackError::missing("Body.stkCallback.ResultCode"));
    }

    #[test]
    fn test_result_must_be_object() {
        let err = parse(r#"{"Result":"nope"}"#, CallbackFamily::B2c).unwrap_err();
        assert_eq!(err, CallbackError::missing("Result"));
    }

    #[test]
    fn test_successful_result_requires_parameters() {
        let raw = r#"{"Result":{"ResultCode":0,"ResultDesc":"ok"}}"#;
        let err = parse(raw, CallbackFamily::B2bOrB2c).unwrap_err();
        assert_eq!(
            err,
            CallbackError::missing("Result.ResultParameters.ResultParameter")
        );
    }

    #[test]
    fn test_failed_result_without_parameters() {
        let raw = r#"{"Result":{
            "ResultType":0,
            "ResultCode":2001,
            "ResultDesc":"The initiator information is invalid.",
            "OriginatorConversationID":"29112-34801843-1",
            "ConversationID":"AG_20191219_00006c6fddb15123addf",
            "TransactionID":"NLJ0000000",
            "ReferenceData":{"ReferenceItem":{"Key":"QueueTimeoutURL","Value":"https://example.com/timeout"}}
        }}"#;
        let result = parse(raw, CallbackFamily::B2c).unwrap();

        assert!(!result.is_success());
        assert_eq!(result.result_code(), Some("2001"));
        let header = result.header().unwrap();
        assert_eq!(
            header.reference_data.get("QueueTimeoutURL").map(String::as_str),
            Some("https://example.com/timeout")
        );
        match result {
            NormalizedResult::B2c(r) => assert!(r.amount.is_none()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_b2b_affected_balance_without_columns_keeps_raw() {
        let raw = r#"{"Result":{"ResultCode":0,"ResultParameters":{"ResultParameter":[
            {"Key":"DebitPartyAffectedAccountBalance","Value":"Working Account"},
            {"Key":"DebitAccountCurrentBalance","Value":"{Amount={BasicAmount=10.00}}"}
        ]}}}"#;
        match parse(raw, CallbackFamily::B2b).unwrap() {
            NormalizedResult::B2b(r) => {
                assert!(r.debit_party_affected_account_balance.is_none());
                assert_eq!(
                    r.debit_party_affected_account_balance_raw.as_deref(),
                    Some("Working Account")
                );
                assert!(r.debit_account_current_balance.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_reversal_with_non_delimited_balance_keeps_raw() {
        let raw = r#"{"Result":{"ResultCode":0,"ResultParameters":{"ResultParameter":[
            {"Key":"DebitAccountBalance","Value":"{Amount={BasicAmount=46713.00, CurrencyCode=KES}}"},
            {"Key":"Amount","Value":"100.00"}
        ]}}}"#;
        let result = parse(raw, CallbackFamily::Reversal).unwrap();
        match result {
            NormalizedResult::Reversal(r) => {
                assert!(r.debit_account_balance.is_none());
                assert!(r.debit_account_balance_raw.is_some());
                assert_eq!(r.amount, Some(Decimal::new(10000, 2)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
