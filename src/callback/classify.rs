//! Callback family detection
//!
//! Each family has one signature path or parameter key that no other family
//! shares, so the checks below never tie. Anything that matches none of
//! them is [`CallbackFamily::Unknown`]; classification never fails.

use super::params::KeyedValues;
use super::{CallbackFamily, ParsedCallback};

/// Decide which family a decoded callback belongs to
///
/// B2C and B2B results are indistinguishable from their bodies alone and
/// come back as [`CallbackFamily::B2bOrB2c`]; see
/// [`crate::correlation`] for attributing them.
pub fn classify(parsed: &ParsedCallback) -> CallbackFamily {
    let family = detect(parsed);
    tracing::debug!(family = %family, "Callback classified");
    family
}

/// Decode and classify raw text; undecodable input is `Unknown`
pub fn classify_raw(raw: &str) -> CallbackFamily {
    match ParsedCallback::decode(raw) {
        Ok(parsed) => classify(&parsed),
        Err(e) => {
            tracing::debug!(error = %e, "Callback is not JSON");
            CallbackFamily::Unknown
        }
    }
}

fn detect(parsed: &ParsedCallback) -> CallbackFamily {
    if parsed.get(&["TransactionType"]).is_some() {
        return CallbackFamily::C2b;
    }
    if parsed.get(&["Body", "stkCallback"]).is_some() {
        return CallbackFamily::Express;
    }

    let Some(result) = parsed.get(&["Result"]) else {
        return CallbackFamily::Unknown;
    };
    let params = KeyedValues::result_parameters(result);

    if params.contains("DebitAccountBalance") {
        CallbackFamily::Reversal
    } else if params.contains("AccountBalance") {
        CallbackFamily::AccountBalance
    } else if params.contains("OriginatorConversationID") {
        CallbackFamily::TransactionStatus
    } else if params.contains("TransactionID") || params.contains("TransactionReceipt") {
        CallbackFamily::B2bOrB2c
    } else {
        CallbackFamily::Unknown
    }
}
