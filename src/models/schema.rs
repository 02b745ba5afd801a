//! Schema-related data models.
//!
//! Normalized descriptors produced by metadata introspection. Every dialect
//! maps its catalog rows into these same shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::query::Row;

/// Engine-independent classification of a column's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalType {
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    /// Bounded-length character data
    String,
    /// Unbounded character data
    Text,
    Binary,
    Float,
    Double,
    Decimal,
    Boolean,
    Date,
    Time,
    DateTime,
    DateTime2,
    DateTimeOffset,
    Guid,
    Xml,
    /// Catalog type with no logical counterpart
    Other,
}

impl LogicalType {
    pub const ALL: [LogicalType; 19] = [
        Self::TinyInt,
        Self::SmallInt,
        Self::Int,
        Self::BigInt,
        Self::String,
        Self::Text,
        Self::Binary,
        Self::Float,
        Self::Double,
        Self::Decimal,
        Self::Boolean,
        Self::Date,
        Self::Time,
        Self::DateTime,
        Self::DateTime2,
        Self::DateTimeOffset,
        Self::Guid,
        Self::Xml,
        Self::Other,
    ];

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::TinyInt | Self::SmallInt | Self::Int | Self::BigInt
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, Self::Float | Self::Double | Self::Decimal)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Self::String | Self::Text)
    }

    /// Full timestamp kinds (date plus time of day).
    pub fn is_timestamp(&self) -> bool {
        matches!(
            self,
            Self::DateTime | Self::DateTime2 | Self::DateTimeOffset
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::TinyInt => "tiny_int",
            Self::SmallInt => "small_int",
            Self::Int => "int",
            Self::BigInt => "big_int",
            Self::String => "string",
            Self::Text => "text",
            Self::Binary => "binary",
            Self::Float => "float",
            Self::Double => "double",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Time => "time",
            Self::DateTime => "date_time",
            Self::DateTime2 => "date_time2",
            Self::DateTimeOffset => "date_time_offset",
            Self::Guid => "guid",
            Self::Xml => "xml",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for LogicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A table as listed by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub name: String,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// `schema.name`, or just `name` when no schema is known.
    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.qualified_name())
    }
}

/// One column of a table, normalized across dialects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub logical_type: LogicalType,
    /// Dialect DDL type (e.g., "nvarchar(50)", "numeric(10, 2)"). For
    /// `LogicalType::Other` this is the raw catalog type name.
    pub native_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub char_max_length: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_precision: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_scale: Option<i32>,
    /// Dialect literal, or the raw expression when not a plain literal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    pub is_primary_key: bool,
    pub is_nullable: bool,
}

/// Referential constraint from a column of this table to another table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyDescriptor {
    pub id: i64,
    pub constraint_name: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    pub sql_definition: String,
    /// Not every engine records this
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_created: Option<DateTime<Utc>>,
}

/// Per-table result of a Foreach materialization.
///
/// A field is `None` until a batch requests it. `Some(vec![])` means it was
/// requested and the table had nothing to report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub table_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Row>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<ColumnDescriptor>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_keys: Option<Vec<ForeignKeyDescriptor>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triggers: Option<Vec<TriggerDescriptor>>,
    /// Outer `None`: not requested. Inner `None`: requested, no DDL found.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "double_option"
    )]
    pub sql_definition: Option<Option<String>>,
}

impl TableMetadata {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Default::default()
        }
    }
}

/// Keyed Foreach output, ordered by table name.
pub type MetadataMap = BTreeMap<String, TableMetadata>;

/// Serializes `Some(None)` as an explicit JSON null so it survives a round trip.
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<Option<String>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer).map(Some)
    }
}
