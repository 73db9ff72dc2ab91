//! Statement arguments, results, and rows.
//!
//! These are the owned types that cross the boundary to the driver: statement
//! arguments go in as [`QueryParam`], results come back as [`ExecResult`] and
//! [`Row`].

use crate::error::SqlError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A parameter value for parameterized statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    Null,
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    Float(f64),
    String(String),
    /// Binary data (base64 encoded in JSON)
    #[serde(with = "base64_bytes")]
    Bytes(Vec<u8>),
}

impl QueryParam {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
        }
    }
}

impl From<bool> for QueryParam {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for QueryParam {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for QueryParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for QueryParam {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for QueryParam {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for QueryParam {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for QueryParam {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<QueryParam>> From<Option<T>> for QueryParam {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Custom serialization for binary data as base64.
mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// Outcome of a statement that does not return rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ExecResult {
    pub rows_affected: u64,
    /// `LAST_INSERT_ID()` for the statement, when the driver reports one.
    pub last_insert_id: Option<u64>,
}

/// A decoded result row: column name to JSON value, in column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row {
    columns: serde_json::Map<String, JsonValue>,
}

impl Row {
    pub fn new(columns: serde_json::Map<String, JsonValue>) -> Self {
        Self { columns }
    }

    /// Value of the named column; `None` if the row has no such column.
    pub fn get(&self, column: &str) -> Option<&JsonValue> {
        self.columns.get(column)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn into_map(self) -> serde_json::Map<String, JsonValue> {
        self.columns
    }

    /// Deserialize the row into `T`, renaming each column through `mapper`
    /// first so column names line up with the struct's field names.
    pub fn decode<T: DeserializeOwned>(self, mapper: fn(&str) -> String) -> Result<T, SqlError> {
        let mapped: serde_json::Map<String, JsonValue> = self
            .columns
            .into_iter()
            .map(|(name, value)| (mapper(&name), value))
            .collect();
        serde_json::from_value(JsonValue::Object(mapped))
            .map_err(|e| SqlError::decode(e.to_string()))
    }
}

impl FromIterator<(String, JsonValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, JsonValue)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}
