//! Canonical Daraja code tables
//!
//! Daraja reports failures three ways: HTTP status codes, dotted API error
//! codes in error bodies (`404.001.03`), and numeric `ResultCode`s inside
//! callbacks. Each has exactly one table here. Any code that is not listed
//! describes as [`UNKNOWN_ERROR`].

/// Description for codes missing from every table
pub const UNKNOWN_ERROR: &str = "Unknown Error";

const HTTP_STATUS_DESCRIPTIONS: &[(u16, &str)] = &[
    (400, "Bad Request"),
    (401, "Unauthorized"),
    (403, "Forbidden"),
    (404, "Not Found"),
    (405, "Method Not Allowed"),
    (406, "Not Acceptable - You requested a format that isn't json"),
    (429, "Too Many Requests"),
    (500, "Internal Server Error"),
    (503, "Service Unavailable"),
];

const API_ERROR_DESCRIPTIONS: &[(&str, &str)] = &[
    ("400.002.01", "Invalid Access Token"),
    ("400.002.02", "Bad Request - Invalid request payload"),
    ("400.002.05", "Invalid Request Payload"),
    ("400.003.01", "Invalid Access Token"),
    ("401.002.01", "Error Occurred - Invalid Access Token"),
    ("404.001.01", "Resource not found"),
    ("404.001.03", "Invalid Access Token"),
    ("404.001.04", "Invalid Authentication Header"),
    ("500.001.1001", "Server Error - wrong credentials or merchant does not exist"),
    ("500.002.1001", "Service is currently unreachable"),
    ("500.003.02", "System is busy, please try again in a few minutes"),
    ("500.003.03", "Quota violation - too many requests"),
    ("500.003.1001", "Internal Server Error"),
];

const RESULT_CODE_DESCRIPTIONS: &[(&str, &str)] = &[
    ("0", "The service request is processed successfully"),
    ("1", "The balance is insufficient for the transaction"),
    ("2", "Declined due to limit rule: less than the minimum transaction amount"),
    ("3", "Declined due to limit rule: greater than the maximum transaction amount"),
    ("4", "Declined due to limit rule: would exceed the daily transfer limit"),
    ("8", "Declined due to limit rule: would exceed the maximum balance"),
    ("11", "The DebitParty is in an invalid state"),
    ("12", "The CreditParty is in an invalid state"),
    ("13", "The initiator is not allowed to initiate this request"),
    ("14", "The initiator is not allowed to initiate this request"),
    ("15", "Duplicate OriginatorConversationID"),
    ("17", "Internal failure"),
    ("20", "Unresolved initiator"),
    ("26", "Traffic blocking condition in place"),
    ("1001", "Unable to lock subscriber, a transaction is already in process"),
    ("1019", "Transaction has expired"),
    ("1025", "An error occurred while sending the push request"),
    ("1032", "Request cancelled by user"),
    ("1037", "DS timeout, user cannot be reached"),
    ("2001", "The initiator information is invalid"),
    ("9999", "An error occurred while sending the push request"),
];

/// Description of an HTTP status as Daraja uses it
pub fn describe_http_status(status: u16) -> &'static str {
    HTTP_STATUS_DESCRIPTIONS
        .iter()
        .find(|(code, _)| *code == status)
        .map_or(UNKNOWN_ERROR, |(_, description)| *description)
}

/// Description of a dotted Daraja API error code
pub fn describe_api_error(code: &str) -> &'static str {
    find(API_ERROR_DESCRIPTIONS, code.trim())
}

/// Description of a callback `ResultCode`
pub fn describe_result_code(code: &str) -> &'static str {
    find(RESULT_CODE_DESCRIPTIONS, code.trim())
}

/// Best description for an error reported with `status` and optional `code`
pub fn describe(status: u16, code: Option<&str>) -> &'static str {
    match code.map(describe_api_error) {
        Some(description) if description != UNKNOWN_ERROR => description,
        _ => describe_http_status(status),
    }
}

fn find(table: &[(&'static str, &'static str)], code: &str) -> &'static str {
    table
        .iter()
        .find(|(known, _)| *known == code)
        .map_or(UNKNOWN_ERROR, |(_, description)| *description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status() {
        assert_eq!(describe_http_status(401), "Unauthorized");
        assert_eq!(describe_http_status(418), UNKNOWN_ERROR);
    }

    #[test]
    fn test_api_error_codes() {
        assert_eq!(describe_api_error("404.001.03"), "Invalid Access Token");
        assert_eq!(describe_api_error(" 400.002.02 "), "Bad Request - Invalid request payload");
        assert_eq!(describe_api_error("999.999.99"), UNKNOWN_ERROR);
    }

    #[test]
    fn test_result_codes() {
        assert_eq!(describe_result_code("1032"), "Request cancelled by user");
        assert_eq!(describe_result_code("424242"), UNKNOWN_ERROR);
    }

    #[test]
    fn test_describe_prefers_api_code() {
        assert_eq!(describe(404, Some("404.001.03")), "Invalid Access Token");
        assert_eq!(describe(404, Some("nope")), "Not Found");
        assert_eq!(describe(599, None), UNKNOWN_ERROR);
    }
}
