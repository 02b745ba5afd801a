//! Row decoding into JSON maps.
//!
//! This module turns native driver rows into the dialect-independent
//! [`Row`](crate::models::Row) shape.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders handle the actual value extraction
//!
//! SQLite is dynamically typed, so its decoder looks at the storage class of
//! each value and only consults the declared type for booleans. SQL Server
//! cells arrive as tagged `ColumnData` and are decoded by variant.

use crate::models::{DatabaseType, Row};
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row as _, Type, TypeInfo, ValueRef};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Unknown,
}

/// Classify a driver-reported type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") || lower.contains("money") {
        // SQLite's NUMERIC is actually a float
        if db == DatabaseType::SQLite {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    if lower == "bool" || lower == "boolean" || lower == "bit" {
        return TypeCategory::Boolean;
    }

    if lower.contains("int") || lower.contains("serial") {
        return TypeCategory::Integer;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    if lower == "uuid" || lower == "uniqueidentifier" {
        return TypeCategory::Uuid;
    }

    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    match lower.as_str() {
        "date" => TypeCategory::Date,
        "time" => TypeCategory::Time,
        "timestamp" | "datetime" | "datetime2" | "smalldatetime" => TypeCategory::Timestamp,
        "timestamptz" | "datetimeoffset" => TypeCategory::TimestampTz,
        "text" | "varchar" | "char" | "bpchar" | "name" | "nvarchar" | "nchar" => {
            TypeCategory::Text
        }
        _ => TypeCategory::Unknown,
    }
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw NUMERIC values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

// =============================================================================
// Value Encoding
// =============================================================================

/// Encode binary data as a base64 JSON string.
pub fn encode_binary(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    JsonValue::String(STANDARD.encode(bytes))
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

// =============================================================================
// Row to JSON Trait
// =============================================================================

/// Trait for converting native driver rows to JSON maps.
pub trait RowToJson {
    fn to_json_map(&self) -> Row;
}

impl RowToJson for PgRow {
    fn to_json_map(&self) -> Row {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let type_name = col.type_info().name();
                let category = categorize_type(type_name, DatabaseType::PostgreSQL);
                let value = postgres::decode_column(self, idx, category);
                (col.name().to_string(), value)
            })
            .collect()
    }
}

impl RowToJson for SqliteRow {
    fn to_json_map(&self) -> Row {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let declared = categorize_type(col.type_info().name(), DatabaseType::SQLite);
                let value = sqlite::decode_column(self, idx, declared);
                (col.name().to_string(), value)
            })
            .collect()
    }
}

impl RowToJson for tiberius::Row {
    fn to_json_map(&self) -> Row {
        self.cells()
            .map(|(col, data)| (col.name().to_string(), mssql::decode_cell(data)))
            .collect()
    }
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod postgres {
    use super::*;

    pub fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> JsonValue {
        match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => decode_binary_col(row, idx),
            TypeCategory::Json => decode_json(row, idx),
            TypeCategory::Uuid => decode_uuid(row, idx),
            TypeCategory::Date => decode_date(row, idx),
            TypeCategory::Time => decode_time(row, idx),
            TypeCategory::Timestamp => decode_timestamp(row, idx),
            TypeCategory::TimestampTz => decode_timestamptz(row, idx),
            TypeCategory::Text | TypeCategory::Unknown => decode_text(row, idx),
        }
    }

    fn decode_decimal(row: &PgRow, idx: usize) -> JsonValue {
        match row.try_get::<Option<RawDecimal>, _>(idx) {
            Ok(Some(v)) => JsonValue::String(v.0),
            Ok(None) => JsonValue::Null,
            Err(e) => {
                tracing::error!("Failed to decode NUMERIC: {:?}", e);
                JsonValue::Null
            }
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        JsonValue::Null
    }

    fn decode_boolean(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(JsonValue::Bool)
            .unwrap_or(JsonValue::Null)
    }

    fn decode_float(row: &PgRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return float_value(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
            return float_value(v as f64);
        }
        JsonValue::Null
    }

    fn decode_binary_col(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(|v| encode_binary(&v))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_json(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<serde_json::Value>, _>(idx)
            .ok()
            .flatten()
            .unwrap_or(JsonValue::Null)
    }

    fn decode_uuid(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<uuid::Uuid>, _>(idx)
            .ok()
            .flatten()
            .map(|u| JsonValue::String(u.hyphenated().to_string()))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_date(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<chrono::NaiveDate>, _>(idx)
            .ok()
            .flatten()
            .map(|d| JsonValue::String(d.format(DATE_FORMAT).to_string()))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_time(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<chrono::NaiveTime>, _>(idx)
            .ok()
            .flatten()
            .map(|t| JsonValue::String(t.format(TIME_FORMAT).to_string()))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_timestamp(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<chrono::NaiveDateTime>, _>(idx)
            .ok()
            .flatten()
            .map(|ts| JsonValue::String(ts.format(TIMESTAMP_FORMAT).to_string()))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_timestamptz(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)
            .ok()
            .flatten()
            .map(|ts| JsonValue::String(ts.to_rfc3339()))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_text(row: &PgRow, idx: usize) -> JsonValue {
        if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
            return v.map(JsonValue::String).unwrap_or(JsonValue::Null);
        }
        // xml, citext, enums and other text-encoded types
        row.try_get_unchecked::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(JsonValue::String)
            .unwrap_or(JsonValue::Null)
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(row: &SqliteRow, idx: usize, declared: TypeCategory) -> JsonValue {
        let storage = match row.try_get_raw(idx) {
            Ok(raw) if raw.is_null() => return JsonValue::Null,
            Ok(raw) => raw.type_info().name().to_string(),
            Err(e) => {
                tracing::error!("Failed to read SQLite value: {:?}", e);
                return JsonValue::Null;
            }
        };

        match storage.as_str() {
            "INTEGER" | "BOOLEAN" if declared == TypeCategory::Boolean => decode_boolean(row, idx),
            "INTEGER" | "BOOLEAN" => decode_integer(row, idx),
            "REAL" | "NUMERIC" => decode_float(row, idx),
            "BLOB" => decode_binary_col(row, idx),
            _ => decode_text(row, idx, declared),
        }
    }

    fn decode_integer(row: &SqliteRow, idx: usize) -> JsonValue {
        row.try_get_unchecked::<Option<i64>, _>(idx)
            .ok()
            .flatten()
            .map(|v| JsonValue::Number(v.into()))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_boolean(row: &SqliteRow, idx: usize) -> JsonValue {
        row.try_get_unchecked::<Option<i64>, _>(idx)
            .ok()
            .flatten()
            .map(|v| JsonValue::Bool(v != 0))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_float(row: &SqliteRow, idx: usize) -> JsonValue {
        row.try_get_unchecked::<Option<f64>, _>(idx)
            .ok()
            .flatten()
            .map(float_value)
            .unwrap_or(JsonValue::Null)
    }

    fn decode_binary_col(row: &SqliteRow, idx: usize) -> JsonValue {
        row.try_get_unchecked::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(|v| encode_binary(&v))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_text(row: &SqliteRow, idx: usize, declared: TypeCategory) -> JsonValue {
        if let Ok(Some(v)) = row.try_get_unchecked::<Option<String>, _>(idx) {
            if declared == TypeCategory::Json {
                if let Ok(json) = serde_json::from_str::<JsonValue>(&v) {
                    return json;
                }
            }
            return JsonValue::String(v);
        }
        JsonValue::Null
    }
}

mod mssql {
    use super::*;
    use tiberius::{ColumnData, FromSql};

    pub fn decode_cell<'a>(data: &'a ColumnData<'static>) -> JsonValue {
        match data {
            ColumnData::U8(v) => v.map(|v| JsonValue::Number(v.into())).unwrap_or_default(),
            ColumnData::I16(v) => v.map(|v| JsonValue::Number(v.into())).unwrap_or_default(),
            ColumnData::I32(v) => v.map(|v| JsonValue::Number(v.into())).unwrap_or_default(),
            ColumnData::I64(v) => v.map(|v| JsonValue::Number(v.into())).unwrap_or_default(),
            ColumnData::F32(v) => v.map(|v| float_value(v as f64)).unwrap_or_default(),
            ColumnData::F64(v) => v.map(float_value).unwrap_or_default(),
            ColumnData::Bit(v) => v.map(JsonValue::Bool).unwrap_or_default(),
            ColumnData::String(v) => v
                .as_ref()
                .map(|s| JsonValue::String(s.to_string()))
                .unwrap_or_default(),
            ColumnData::Guid(v) => v
                .map(|u| JsonValue::String(u.hyphenated().to_string()))
                .unwrap_or_default(),
            ColumnData::Binary(v) => v.as_ref().map(|b| encode_binary(b)).unwrap_or_default(),
            ColumnData::Numeric(v) => v
                .as_ref()
                .map(|n| JsonValue::String(n.to_string()))
                .unwrap_or_default(),
            ColumnData::Xml(v) => v
                .as_ref()
                .map(|x| JsonValue::String(x.to_string()))
                .unwrap_or_default(),
            ColumnData::Date(_) => temporal::<chrono::NaiveDate>(data, |d| {
                d.format(DATE_FORMAT).to_string()
            }),
            ColumnData::Time(_) => temporal::<chrono::NaiveTime>(data, |t| {
                t.format(TIME_FORMAT).to_string()
            }),
            ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
                temporal::<chrono::NaiveDateTime>(data, |ts| {
                    ts.format(TIMESTAMP_FORMAT).to_string()
                })
            }
            ColumnData::DateTimeOffset(_) => {
                temporal::<chrono::DateTime<chrono::FixedOffset>>(data, |ts| ts.to_rfc3339())
            }
            #[allow(unreachable_patterns)]
            _ => JsonValue::Null,
        }
    }

    fn temporal<'a, T>(data: &'a ColumnData<'static>, render: impl Fn(T) -> String) -> JsonValue
    where
        T: FromSql<'a>,
    {
        match T::from_sql(data) {
            Ok(Some(v)) => JsonValue::String(render(v)),
            Ok(None) => JsonValue::Null,
            Err(e) => {
                tracing::error!("Failed to decode SQL Server temporal value: {:?}", e);
                JsonValue::Null
            }
        }
    }
}

// =============================================================================
// Typed access to decoded rows
// =============================================================================

/// Typed accessors over a decoded JSON row, used when reading catalog queries.
pub trait RowExt {
    fn get_str(&self, key: &str) -> Option<String>;
    fn get_i64(&self, key: &str) -> Option<i64>;
    /// Accepts booleans, 0/1 and the `YES`/`NO` strings catalogs emit.
    fn get_bool(&self, key: &str) -> bool;
}

impl RowExt for Row {
    fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            JsonValue::Null => None,
            JsonValue::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    fn get_i64(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            JsonValue::String(s) => s.trim().parse().ok(),
            JsonValue::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    fn get_bool(&self, key: &str) -> bool {
        match self.get(key) {
            Some(JsonValue::Bool(b)) => *b,
            Some(JsonValue::Number(n)) => n.as_i64().is_some_and(|v| v != 0),
            Some(JsonValue::String(s)) => {
                matches!(s.to_ascii_uppercase().as_str(), "YES" | "TRUE" | "1" | "Y")
            }
            _ => false,
        }
    }
}
