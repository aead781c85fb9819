use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Storage datatype of an attribute. Each variant owns one value table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    Varchar,
    Text,
    Int,
    Decimal,
    Datetime,
}

impl BackendType {
    pub const ALL: [BackendType; 5] = [
        BackendType::Varchar,
        BackendType::Text,
        BackendType::Int,
        BackendType::Decimal,
        BackendType::Datetime,
    ];

    /// Suffix of the value table holding this datatype.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendType::Varchar => "varchar",
            BackendType::Text => "text",
            BackendType::Int => "int",
            BackendType::Decimal => "decimal",
            BackendType::Datetime => "datetime",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        BackendType::ALL
            .into_iter()
            .find(|backend_type| backend_type.as_str() == raw)
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single attribute value, tagged with the datatype it is stored as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum AttributeValue {
    Varchar(String),
    Text(String),
    Int(i64),
    Decimal(f64),
    Datetime(String),
}

/// Storage format of datetime values.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Attribute code -> value of one record.
pub type AttributeValues = BTreeMap<String, AttributeValue>;

impl AttributeValue {
    pub fn backend_type(&self) -> BackendType {
        match self {
            AttributeValue::Varchar(_) => BackendType::Varchar,
            AttributeValue::Text(_) => BackendType::Text,
            AttributeValue::Int(_) => BackendType::Int,
            AttributeValue::Decimal(_) => BackendType::Decimal,
            AttributeValue::Datetime(_) => BackendType::Datetime,
        }
    }

    /// Converts a loosely typed submitted value into the variant expected by
    /// `backend_type`. Returns `None` when the value cannot be represented.
    pub fn from_json(backend_type: BackendType, value: &Value) -> Option<Self> {
        match (backend_type, value) {
            (BackendType::Varchar, Value::String(s)) => Some(AttributeValue::Varchar(s.clone())),
            (BackendType::Varchar, Value::Number(n)) => Some(AttributeValue::Varchar(n.to_string())),
            (BackendType::Text, Value::String(s)) => Some(AttributeValue::Text(s.clone())),
            (BackendType::Int, Value::Number(n)) => n.as_i64().map(AttributeValue::Int),
            (BackendType::Int, Value::Bool(b)) => Some(AttributeValue::Int(i64::from(*b))),
            (BackendType::Int, Value::String(s)) => s.trim().parse().ok().map(AttributeValue::Int),
            (BackendType::Decimal, Value::Number(n)) => n.as_f64().map(AttributeValue::Decimal),
            (BackendType::Decimal, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|d| d.is_finite())
                .map(AttributeValue::Decimal),
            (BackendType::Datetime, Value::String(s)) => {
                normalize_datetime(s).map(AttributeValue::Datetime)
            }
            _ => None,
        }
    }

    /// Whether the value can be stored and read back unchanged: decimals
    /// must be finite, datetimes must be in [`DATETIME_FORMAT`].
    pub fn is_storable(&self) -> bool {
        match self {
            AttributeValue::Decimal(d) => d.is_finite(),
            AttributeValue::Datetime(s) => {
                NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).is_ok()
            }
            _ => true,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            AttributeValue::Varchar(s) | AttributeValue::Text(s) | AttributeValue::Datetime(s) => {
                Value::String(s.clone())
            }
            AttributeValue::Int(i) => Value::from(*i),
            AttributeValue::Decimal(d) => Value::from(*d),
        }
    }
}

/// Parses a submitted datetime and renders it in [`DATETIME_FORMAT`].
/// Accepts RFC 3339 (converted to UTC), `YYYY-MM-DD HH:MM:SS`,
/// `YYYY-MM-DDTHH:MM:SS` and a bare `YYYY-MM-DD` (midnight).
pub fn normalize_datetime(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;
    Some(parsed.format(DATETIME_FORMAT).to_string())
}
