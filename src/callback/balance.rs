//! Account balance strings
//!
//! Balance-bearing results pack accounts into one string: accounts are
//! separated by `&` and the fields of an account by `|`, in the order
//! `name|currency|current|available|reserved|uncleared`.

use rust_decimal::Decimal;
use serde::Serialize;

use super::params::value_to_decimal;

/// One account from a balance string
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    /// Account name, e.g. `Working Account`
    pub name: String,
    /// ISO currency code
    pub currency: Option<String>,
    /// First balance column
    pub current_balance: Option<Decimal>,
    /// Second balance column
    pub available_balance: Option<Decimal>,
    /// Third balance column
    pub reserved_balance: Option<Decimal>,
    /// Fourth balance column
    pub uncleared_balance: Option<Decimal>,
}

/// Split a `&`-separated multi-account balance string
///
/// Empty segments are skipped; a segment without a name is dropped.
pub fn parse_account_balances(raw: &str) -> Vec<AccountBalance> {
    raw.split('&').filter_map(parse_account).collect()
}

/// Parse a single `|`-separated account
pub fn parse_account(raw: &str) -> Option<AccountBalance> {
    let mut fields = raw.split('|').map(str::trim);

    let name = fields.next().filter(|n| !n.is_empty())?.to_string();
    let currency = fields
        .next()
        .filter(|c| !c.is_empty())
        .map(str::to_string);

    let mut balances = [None; 4];
    for slot in balances.iter_mut() {
        *slot = fields.next().and_then(parse_amount);
    }
    let [current_balance, available_balance, reserved_balance, uncleared_balance] = balances;

    Some(AccountBalance {
        name,
        currency,
        current_balance,
        available_balance,
        reserved_balance,
        uncleared_balance,
    })
}

fn parse_amount(raw: &str) -> Option<Decimal> {
    if raw.is_empty() {
        return None;
    }
    let parsed = value_to_decimal(&serde_json::Value::String(raw.to_string()));
    if parsed.is_none() {
        tracing::debug!(raw, "Unparseable balance column");
    }
    parsed
}
