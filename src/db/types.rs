//! MySQL row decoding.
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Per-category decoders handle the actual value extraction
//!
//! Values that cannot be decoded become JSON `null` and are logged; a single
//! odd column never fails the whole row.

use crate::models::Row;
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::{Column, Decode, Row as _, Type, TypeInfo};

/// Logical category for MySQL column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Binary,
    Json,
    DateTime,
    Timestamp,
    Date,
    Time,
    Text,
}

/// Classify a MySQL type name into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal - check first as "decimal" never overlaps integer names
    if lower.contains("decimal") || lower.contains("numeric") {
        return TypeCategory::Decimal;
    }

    if lower == "boolean" || lower == "bool" {
        return TypeCategory::Boolean;
    }

    if lower.contains("int") || lower == "year" {
        return TypeCategory::Integer;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    if lower == "json" {
        return TypeCategory::Json;
    }

    if lower.contains("blob") || lower.contains("binary") || lower == "bit" {
        return TypeCategory::Binary;
    }

    match lower.as_str() {
        "datetime" => TypeCategory::DateTime,
        "timestamp" => TypeCategory::Timestamp,
        "date" => TypeCategory::Date,
        "time" => TypeCategory::Time,
        _ => TypeCategory::Text,
    }
}

/// Wrapper type for raw DECIMAL values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

/// Binary columns: UTF-8 text when valid, base64 otherwise.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match std::str::from_utf8(bytes) {
        Ok(s) => JsonValue::String(s.to_string()),
        Err(_) => JsonValue::String(STANDARD.encode(bytes)),
    }
}

/// Convert a driver row into an owned [`Row`].
pub(crate) fn row_to_json(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            let category = categorize_type(col.type_info().name());
            (col.name().to_string(), decode_column(row, idx, category))
        })
        .collect()
}

fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> JsonValue {
    match category {
        TypeCategory::Decimal => match row.try_get::<Option<RawDecimal>, _>(idx) {
            Ok(Some(v)) => JsonValue::String(v.0),
            Ok(None) => JsonValue::Null,
            Err(e) => {
                tracing::error!("Failed to decode DECIMAL: {:?}", e);
                JsonValue::Null
            }
        },
        TypeCategory::Integer => decode_integer(row, idx),
        TypeCategory::Boolean => {
            decode_as::<bool>(row, idx).map_or(JsonValue::Null, JsonValue::Bool)
        }
        TypeCategory::Float => decode_float(row, idx),
        TypeCategory::Binary => decode_as::<Vec<u8>>(row, idx)
            .map_or(JsonValue::Null, |v| decode_binary_value(&v)),
        TypeCategory::Json => decode_as::<JsonValue>(row, idx).unwrap_or(JsonValue::Null),
        TypeCategory::DateTime => decode_as::<chrono::NaiveDateTime>(row, idx)
            .map_or(JsonValue::Null, |v| JsonValue::String(v.to_string())),
        TypeCategory::Timestamp => decode_as::<chrono::DateTime<chrono::Utc>>(row, idx)
            .map_or(JsonValue::Null, |v| JsonValue::String(v.to_rfc3339())),
        TypeCategory::Date => decode_as::<chrono::NaiveDate>(row, idx)
            .map_or(JsonValue::Null, |v| JsonValue::String(v.to_string())),
        TypeCategory::Time => decode_as::<chrono::NaiveTime>(row, idx)
            .map_or(JsonValue::Null, |v| JsonValue::String(v.to_string())),
        TypeCategory::Text => decode_text(row, idx),
    }
}

fn decode_as<'r, T>(row: &'r MySqlRow, idx: usize) -> Option<T>
where
    T: Decode<'r, sqlx::MySql> + Type<sqlx::MySql>,
{
    row.try_get::<Option<T>, _>(idx).ok().flatten()
}

fn decode_integer(row: &MySqlRow, idx: usize) -> JsonValue {
    // Signed first, then unsigned for BIGINT UNSIGNED values beyond i64.
    if let Some(v) = decode_as::<i64>(row, idx) {
        return JsonValue::Number(v.into());
    }
    if let Some(v) = decode_as::<u64>(row, idx) {
        return JsonValue::Number(v.into());
    }
    if let Some(v) = decode_as::<i32>(row, idx) {
        return JsonValue::Number(v.into());
    }
    if let Some(v) = decode_as::<i16>(row, idx) {
        return JsonValue::Number(v.into());
    }
    if let Some(v) = decode_as::<i8>(row, idx) {
        return JsonValue::Number(v.into());
    }
    JsonValue::Null
}

fn decode_float(row: &MySqlRow, idx: usize) -> JsonValue {
    let value = decode_as::<f64>(row, idx).or_else(|| decode_as::<f32>(row, idx).map(f64::from));
    match value {
        Some(v) => serde_json::Number::from_f64(v)
            .map(JsonValue::Number)
            .unwrap_or_else(|| JsonValue::String(v.to_string())),
        None => JsonValue::Null,
    }
}

fn decode_text(row: &MySqlRow, idx: usize) -> JsonValue {
    decode_as::<String>(row, idx).map_or(JsonValue::Null, JsonValue::String)
}
