//! Callback timestamp normalization
//!
//! Safaricom stamps callbacks in two formats: `yyyyMMddHHmmss` (sometimes as
//! a JSON number) and `dd.MM.yyyy HH:mm:ss`. Both are wall-clock East Africa
//! Time and carry no offset, so they are pinned to `+03:00` here and emitted
//! as RFC 3339.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// East Africa Time offset in seconds
pub const EAT_OFFSET_SECS: i32 = 3 * 3600;

const COMPACT_FORMAT: &str = "%Y%m%d%H%M%S";
const DOTTED_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// The fixed East Africa Time offset
pub fn eat() -> Option<FixedOffset> {
    FixedOffset::east_opt(EAT_OFFSET_SECS)
}

/// Parse either Safaricom timestamp format into an EAT-anchored instant
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    let naive = NaiveDateTime::parse_from_str(raw, COMPACT_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, DOTTED_FORMAT))
        .ok()?;
    eat()?.from_local_datetime(&naive).single()
}

/// Parse a JSON string or number timestamp
pub fn parse_timestamp_value(value: &Value) -> Option<DateTime<FixedOffset>> {
    let parsed = match value {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => parse_timestamp(&n.to_string()),
        _ => None,
    };
    if parsed.is_none() {
        tracing::debug!(value = %value, "Unrecognized callback timestamp");
    }
    parsed
}

/// Render an instant in Safaricom's request timestamp format
pub fn to_compact(instant: &DateTime<FixedOffset>) -> String {
    instant.format(COMPACT_FORMAT).to_string()
}

/// Current East Africa Time in Safaricom's request timestamp format
pub fn now_compact() -> String {
    let now = Utc::now();
    match eat() {
        Some(offset) => to_compact(&now.with_timezone(&offset)),
        None => now.format(COMPACT_FORMAT).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_now_compact_shape() {
        let now = now_compact();
        assert_eq!(now.len(), 14);
        assert!(parse_timestamp(&now).is_some());
    }

    #[test]
    fn test_compact_format() {
        let ts = parse_timestamp("20191219102115").unwrap();
        assert_eq!(ts.to_rfc3339(), "2019-12-19T10:21:15+03:00");
    }

    #[test]
    fn test_dotted_format() {
        let ts = parse_timestamp("19.12.2019 11:45:50").unwrap();
        assert_eq!(ts.to_rfc3339(), "2019-12-19T11:45:50+03:00");
    }

    #[test]
    fn test_both_formats_agree() {
        assert_eq!(
            parse_timestamp("20200109125710"),
            parse_timestamp("09.01.2020 12:57:10")
        );
    }

    #[test]
    fn test_numeric_value() {
        let ts = parse_timestamp_value(&json!(20191219102115u64)).unwrap();
        assert_eq!(to_compact(&ts), "20191219102115");
    }

    #[test]
    fn test_garbage_is_none() {
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("20191332102115").is_none());
        assert!(parse_timestamp_value(&json!(true)).is_none());
    }
}
