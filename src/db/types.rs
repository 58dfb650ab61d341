//! Dynamically typed result rows.
//!
//! Firebird results are decoded into [`Row`]s: ordered lists of named
//! [`SqlValue`] cells. Rows serialize to JSON objects that keep the column
//! order of the statement, which is what the tools print back to the agent.

use chrono::NaiveDateTime;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value as JsonValue;

/// A single database value, also used for statement parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
    Binary(Vec<u8>),
}

impl SqlValue {
    /// Text content, trimmed of the padding Firebird adds to CHAR fields.
    ///
    /// Text BLOBs may arrive as bytes; those are read as UTF-8 when valid.
    pub fn as_trimmed_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.trim()),
            Self::Binary(bytes) => std::str::from_utf8(bytes).ok().map(str::trim),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Convert to a JSON value.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int(v) => JsonValue::Number((*v).into()),
            Self::Float(v) => serde_json::Number::from_f64(*v)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Self::Text(s) => JsonValue::String(s.clone()),
            Self::Timestamp(ts) => JsonValue::String(ts.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()),
            Self::Binary(bytes) => decode_binary_value(bytes),
        }
    }
}

impl Serialize for SqlValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Decode binary data to JSON value.
///
/// Valid UTF-8 (text BLOBs, CHAR OCTETS holding text) is returned as a string,
/// anything else as base64.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match std::str::from_utf8(bytes) {
        Ok(s) => JsonValue::String(s.to_string()),
        Err(_) => JsonValue::String(STANDARD.encode(bytes)),
    }
}

/// One result row: column names paired with values, in statement order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column (builder style).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<SqlValue>) {
        self.columns.push((name.into(), value.into()));
    }

    /// Look up a column by name, ignoring ASCII case.
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(col, _)| col.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Lower-case every column name.
    pub fn into_lowercase_keys(self) -> Self {
        Self {
            columns: self
                .columns
                .into_iter()
                .map(|(name, value)| (name.to_lowercase(), value))
                .collect(),
        }
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Pretty-print rows as a JSON array.
pub fn rows_to_pretty_json(rows: &[Row]) -> String {
    serde_json::to_string_pretty(rows).unwrap_or_else(|_| "[]".to_string())
}
