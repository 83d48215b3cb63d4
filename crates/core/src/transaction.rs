//! Transaction rows as returned by the list endpoint, and their summary.

use core::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Direction of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Credit,
    Debit,
}

/// One row of the transactions list.
///
/// The list endpoint is not strict about types (ids may be numbers, accounts may
/// be nested objects, amounts may be strings), so every field deserialises leniently.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Transaction {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub time: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub account: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub transaction_type: String,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub amount: Decimal,
    #[serde(default, deserialize_with = "lenient_string")]
    pub purpose: String,
}

impl Transaction {
    /// `Credit`/`Debit`, case-insensitive. Any other type does not count toward totals.
    pub fn kind(&self) -> Option<EntryKind> {
        let ty = self.transaction_type.trim();
        if ty.eq_ignore_ascii_case("credit") {
            Some(EntryKind::Credit)
        } else if ty.eq_ignore_ascii_case("debit") {
            Some(EntryKind::Debit)
        } else {
            None
        }
    }

    /// Parsed timestamp, accepting RFC 3339, naive ISO datetimes and bare dates.
    pub fn occurred_at(&self) -> Option<NaiveDateTime> {
        let raw = self.time.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.naive_utc());
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
                return Some(dt);
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    }

    /// Timestamp as shown in generated files; falls back to the raw value.
    pub fn display_time(&self) -> String {
        match self.occurred_at() {
            Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
            None => self.time.clone(),
        }
    }
}

/// Aggregate over an exact set of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionSummary {
    pub total_count: usize,
    pub credit_total: Decimal,
    pub debit_total: Decimal,
    pub net_amount: Decimal,
}

impl TransactionSummary {
    pub fn from_rows(rows: &[Transaction]) -> Self {
        let mut credit_total = Decimal::ZERO;
        let mut debit_total = Decimal::ZERO;

        for row in rows {
            match row.kind() {
                Some(EntryKind::Credit) => credit_total += row.amount,
                Some(EntryKind::Debit) => debit_total += row.amount,
                None => {}
            }
        }

        Self {
            total_count: rows.len(),
            credit_total,
            debit_total,
            net_amount: credit_total - debit_total,
        }
    }
}

/// Render an amount with exactly two decimals, rounding half away from zero.
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_string(&value))
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        // Nested relations (e.g. `account: {id, name}`) are shown by name.
        Value::Object(map) => map
            .get("name")
            .or_else(|| map.get("id"))
            .map(value_to_string)
            .unwrap_or_default(),
        Value::Array(_) => value.to_string(),
    }
}

fn lenient_amount<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let raw = match &value {
        Value::Null => return Ok(Decimal::ZERO),
        Value::Number(n) => n.to_string(),
        Value::String(s) if s.trim().is_empty() => return Ok(Decimal::ZERO),
        Value::String(s) => s.trim().to_string(),
        other => {
            return Err(serde::de::Error::custom(format!(
                "amount must be a number or numeric string, got {other}"
            )));
        }
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|e| serde::de::Error::custom(format!("invalid amount '{raw}': {e}")))
}
