use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::domain::common::MerchantId;

/// Raw transaction as written by the upstream payment system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(rename = "merchantId")]
    pub merchant_id: MerchantId,
    pub amount: Decimal,
    #[serde(rename = "createdAt")]
    pub created_at: RawTimestamp,
}

impl TransactionRecord {
    pub fn new(merchant_id: MerchantId, amount: Decimal, created_at: DateTime<Utc>) -> Self {
        Self {
            merchant_id,
            amount,
            created_at: RawTimestamp::Instant(created_at),
        }
    }
}

/// Timestamp field as found in storage. Older writers stored strings or
/// epoch milliseconds instead of a native date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Instant(DateTime<Utc>),
    Extended {
        #[serde(rename = "$date")]
        date: Box<RawTimestamp>,
    },
    EpochMillis(i64),
    Text(String),
}

impl RawTimestamp {
    /// Coerces the stored representation into a UTC instant.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            RawTimestamp::Instant(instant) => Some(*instant),
            RawTimestamp::Extended { date } => date.to_utc(),
            RawTimestamp::EpochMillis(millis) => Utc.timestamp_millis_opt(*millis).single(),
            RawTimestamp::Text(text) => parse_text_timestamp(text),
        }
    }
}

fn parse_text_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Reads a stored amount the way a `$sum` accumulator would: numeric values
/// contribute, anything else is ignored.
pub fn amount_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => Decimal::from_str(&number.to_string())
            .or_else(|_| Decimal::from_scientific(&number.to_string()))
            .ok(),
        Value::String(text) => Decimal::from_str(text.trim()).ok(),
        Value::Object(map) => map.get("$numberDecimal").and_then(amount_from_value),
        _ => None,
    }
}
