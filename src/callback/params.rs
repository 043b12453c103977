//! Keyed access over Safaricom's `[{Key, Value}]` lists
//!
//! `Result.ResultParameters.ResultParameter`, `ReferenceData.ReferenceItem`
//! and the STK `CallbackMetadata.Item` list all carry named values as an
//! ordered array. The order is not stable between environments, so the list
//! is indexed once by name and every read goes through that index.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde_json::Value;

use super::lookup;
use super::timestamp::parse_timestamp_value;

static NULL: Value = Value::Null;

/// Name-indexed view over a `[{Key, Value}]` style list
#[derive(Debug, Clone, Default)]
pub struct KeyedValues<'a> {
    entries: HashMap<&'a str, &'a Value>,
    order: Vec<&'a str>,
}

impl<'a> KeyedValues<'a> {
    /// Index a list whose entries name themselves with `key_field` and carry
    /// `value_field`.
    ///
    /// A single object in place of an array is treated as a one-element list.
    /// Entries without a string name are skipped; entries without a value are
    /// kept so that [`contains`](Self::contains) still sees them. When a name
    /// repeats, the first occurrence wins.
    pub fn from_list(list: &'a Value, key_field: &str, value_field: &str) -> Self {
        let items: Vec<&'a Value> = match list {
            Value::Array(items) => items.iter().collect(),
            Value::Object(_) => vec![list],
            _ => Vec::new(),
        };

        let mut keyed = Self::default();
        for item in items {
            let Some(name) = item.get(key_field).and_then(Value::as_str) else {
                continue;
            };
            if keyed.entries.contains_key(name) {
                continue;
            }
            let value = item.get(value_field).unwrap_or(&NULL);
            keyed.entries.insert(name, value);
            keyed.order.push(name);
        }
        keyed
    }

    /// Index `ResultParameters.ResultParameter` of a `Result` object
    pub fn result_parameters(result: &'a Value) -> Self {
        lookup(result, &["ResultParameters", "ResultParameter"])
            .map(|list| Self::from_list(list, "Key", "Value"))
            .unwrap_or_default()
    }

    /// Index `ReferenceData.ReferenceItem` of a `Result` object
    pub fn reference_items(result: &'a Value) -> Self {
        lookup(result, &["ReferenceData", "ReferenceItem"])
            .map(|list| Self::from_list(list, "Key", "Value"))
            .unwrap_or_default()
    }

    /// Index `CallbackMetadata.Item` of an `stkCallback` object
    pub fn callback_metadata(stk_callback: &'a Value) -> Self {
        lookup(stk_callback, &["CallbackMetadata", "Item"])
            .map(|list| Self::from_list(list, "Name", "Value"))
            .unwrap_or_default()
    }

    /// Whether an entry with this name exists (with or without a value)
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Names in their original order
    pub fn keys(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.order.iter().copied()
    }

    /// Number of named entries
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the list had no named entries
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Raw value for a name; `null` counts as absent
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.entries.get(key).copied().filter(|v| !v.is_null())
    }

    /// First present value among several candidate names
    pub fn first_of(&self, keys: &[&str]) -> Option<&'a Value> {
        keys.iter().find_map(|key| self.get(key))
    }

    /// Value rendered as a string
    pub fn string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(value_to_string)
    }

    /// Value as a decimal amount
    pub fn decimal(&self, key: &str) -> Option<Decimal> {
        self.get(key).and_then(value_to_decimal)
    }

    /// Value as a normalized timestamp
    pub fn timestamp(&self, key: &str) -> Option<DateTime<FixedOffset>> {
        self.get(key).and_then(parse_timestamp_value)
    }

    /// All entries rendered as strings, in original order
    pub fn to_string_map(&self) -> Vec<(String, String)> {
        self.order
            .iter()
            .filter_map(|key| self.string(key).map(|value| ((*key).to_string(), value)))
            .collect()
    }
}

/// Render a scalar as a string; objects, arrays and null give `None`
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Read a monetary value without going through floating point where possible
pub fn value_to_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::String(s) => s.trim().replace(',', ""),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Interpret Safaricom's `Y`/`N` style flags
pub fn value_to_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_uppercase().as_str() {
            "Y" | "YES" | "TRUE" | "1" => Some(true),
            "N" | "NO" | "FALSE" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        _ => None,
    }
}
