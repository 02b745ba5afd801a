//! Logical-to-native type mapping and default-value literals.
//!
//! Each dialect supplies a [`TypeMapper`]. The mapping tables live in
//! `rendering`, and everything else (parameter rendering, literal formatting)
//! is shared through default trait methods so the three dialects only differ
//! where their SQL actually differs.

use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, LogicalType};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How a native type name takes its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rendering {
    /// Fixed name, no parameters
    Plain(&'static str),
    /// `name(n)` for a positive length, otherwise the unbounded form
    Length {
        name: &'static str,
        unbounded: &'static str,
    },
    /// `name`, `name(p)` or `name(p, s)`
    Precision(&'static str),
}

/// A typed default value, before rendering into a dialect literal.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlLiteral {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Exact decimal text, e.g. "12.50"
    Decimal(String),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Guid(Uuid),
    Bytes(Vec<u8>),
    /// Raw SQL passed through unchanged, e.g. `CURRENT_TIMESTAMP`
    Expression(String),
}

/// Logical column type to native type string, per dialect.
pub trait TypeMapper: Send + Sync + std::fmt::Debug {
    fn dialect(&self) -> DatabaseType;

    /// The mapping table. `None` means the pair is unsupported.
    fn rendering(&self, logical: LogicalType) -> Option<Rendering>;

    /// Reverse mapping of a catalog type name. Unknown names give `Other`.
    fn logical_type(&self, catalog_type: &str) -> LogicalType;

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value { "1" } else { "0" }
    }

    /// Quoted text literal. Every embedded `'` is doubled.
    fn string_literal(&self, text: &str) -> String {
        quote_string(text)
    }

    /// Appended to XML string literals.
    fn xml_suffix(&self) -> &'static str {
        ""
    }

    fn binary_literal(&self, bytes: &[u8]) -> String;

    /// Unwrap a raw catalog default (`((0))`, `'x'::text`, `N'x'`) into a literal.
    fn parse_catalog_default(&self, raw: &str) -> Option<SqlLiteral>;

    fn native_type(
        &self,
        logical: LogicalType,
        char_max_length: Option<i64>,
        precision: Option<i32>,
        scale: Option<i32>,
    ) -> DbResult<String> {
        let rendering = self
            .rendering(logical)
            .ok_or_else(|| DbError::unsupported_type(logical, self.dialect()))?;

        Ok(match rendering {
            Rendering::Plain(name) => name.to_string(),
            Rendering::Length { name, unbounded } => match char_max_length {
                Some(n) if n > 0 => format!("{}({})", name, n),
                _ => unbounded.to_string(),
            },
            Rendering::Precision(name) => match (precision, scale) {
                (Some(p), Some(s)) if p > 0 && s > 0 => format!("{}({}, {})", name, p, s),
                (Some(p), _) if p > 0 => format!("{}({})", name, p),
                _ => name.to_string(),
            },
        })
    }

    /// Render a default value as a literal of this dialect.
    fn format_default_value(
        &self,
        logical: LogicalType,
        value: Option<&SqlLiteral>,
    ) -> DbResult<String> {
        let value = match value {
            None | Some(SqlLiteral::Null) => return Ok("NULL".to_string()),
            Some(SqlLiteral::Expression(expr)) => return Ok(expr.clone()),
            Some(v) => v,
        };

        match logical {
            l if l.is_integer() => format_integer(value),
            LogicalType::Float | LogicalType::Double => format_float(value),
            LogicalType::Decimal => format_decimal(value),
            LogicalType::Boolean => match as_bool(value) {
                Some(b) => Ok(self.boolean_literal(b).to_string()),
                None => Err(invalid(logical, value)),
            },
            LogicalType::String | LogicalType::Text | LogicalType::Other => {
                Ok(self.string_literal(&as_text(value)))
            }
            LogicalType::Xml => Ok(format!(
                "{}{}",
                self.string_literal(&as_text(value)),
                self.xml_suffix()
            )),
            LogicalType::Date => as_datetime(value)
                .map(|ts| quote_string(&ts.format(DATE_FORMAT).to_string()))
                .ok_or_else(|| invalid(logical, value)),
            LogicalType::Time => as_time(value)
                .map(|t| quote_string(&t.format(TIME_FORMAT).to_string()))
                .ok_or_else(|| invalid(logical, value)),
            l if l.is_timestamp() => as_datetime(value)
                .map(|ts| quote_string(&ts.format(TIMESTAMP_FORMAT).to_string()))
                .ok_or_else(|| invalid(logical, value)),
            LogicalType::Guid => as_guid(value)
                .map(|u| quote_string(&u.hyphenated().to_string()))
                .ok_or_else(|| invalid(logical, value)),
            LogicalType::Binary => match value {
                SqlLiteral::Bytes(b) => Ok(self.binary_literal(b)),
                _ => Err(invalid(logical, value)),
            },
            _ => Err(invalid(logical, value)),
        }
    }
}

fn invalid(logical: LogicalType, value: &SqlLiteral) -> DbError {
    DbError::invalid_input(format!(
        "cannot render {:?} as a {} default",
        value, logical
    ))
}

fn format_integer(value: &SqlLiteral) -> DbResult<String> {
    match value {
        SqlLiteral::Int(i) => Ok(i.to_string()),
        SqlLiteral::Bool(b) => Ok(i64::from(*b).to_string()),
        SqlLiteral::Float(f) if f.is_finite() && f.fract() == 0.0 => Ok(format!("{}", f)),
        SqlLiteral::Decimal(s) | SqlLiteral::Text(s) => s
            .trim()
            .parse::<i64>()
            .map(|i| i.to_string())
            .map_err(|_| invalid(LogicalType::BigInt, value)),
        _ => Err(invalid(LogicalType::BigInt, value)),
    }
}

fn format_float(value: &SqlLiteral) -> DbResult<String> {
    match value {
        SqlLiteral::Float(f) if f.is_finite() => Ok(format!("{}", f)),
        SqlLiteral::Float(f) => Err(DbError::invalid_input(format!(
            "non-finite value {} has no SQL literal",
            f
        ))),
        SqlLiteral::Int(i) => Ok(i.to_string()),
        SqlLiteral::Decimal(s) | SqlLiteral::Text(s) if is_decimal_text(s.trim()) => {
            Ok(s.trim().to_string())
        }
        _ => Err(invalid(LogicalType::Double, value)),
    }
}

fn format_decimal(value: &SqlLiteral) -> DbResult<String> {
    match value {
        SqlLiteral::Decimal(s) | SqlLiteral::Text(s) if is_decimal_text(s.trim()) => {
            Ok(s.trim().to_string())
        }
        _ => format_float(value),
    }
}

/// Optional sign, digits, at most one dot. No grouping separators, no exponent.
fn is_decimal_text(s: &str) -> bool {
    let body = s.strip_prefix(['-', '+']).unwrap_or(s);
    let mut dots = 0;
    let mut digits = 0;
    for c in body.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => return false,
        }
    }
    digits > 0 && dots <= 1
}

fn as_bool(value: &SqlLiteral) -> Option<bool> {
    match value {
        SqlLiteral::Bool(b) => Some(*b),
        SqlLiteral::Int(0) => Some(false),
        SqlLiteral::Int(1) => Some(true),
        SqlLiteral::Text(s) | SqlLiteral::Decimal(s) => {
            match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "t" | "yes" => Some(true),
                "false" | "0" | "f" | "no" => Some(false),
                _ => None,
            }
        }
        _ => None,
    }
}

fn as_text(value: &SqlLiteral) -> String {
    match value {
        SqlLiteral::Text(s) | SqlLiteral::Decimal(s) | SqlLiteral::Expression(s) => s.clone(),
        SqlLiteral::Bool(b) => b.to_string(),
        SqlLiteral::Int(i) => i.to_string(),
        SqlLiteral::Float(f) => format!("{}", f),
        SqlLiteral::Date(d) => d.format(DATE_FORMAT).to_string(),
        SqlLiteral::Time(t) => t.format(TIME_FORMAT).to_string(),
        SqlLiteral::DateTime(ts) => ts.format(TIMESTAMP_FORMAT).to_string(),
        SqlLiteral::Guid(u) => u.hyphenated().to_string(),
        SqlLiteral::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        SqlLiteral::Null => String::new(),
    }
}

fn as_datetime(value: &SqlLiteral) -> Option<NaiveDateTime> {
    match value {
        SqlLiteral::DateTime(ts) => Some(*ts),
        SqlLiteral::Date(d) => Some(d.and_time(NaiveTime::MIN)),
        SqlLiteral::Text(s) => parse_datetime(s.trim()),
        _ => None,
    }
}

fn as_time(value: &SqlLiteral) -> Option<NaiveTime> {
    match value {
        SqlLiteral::Time(t) => Some(*t),
        SqlLiteral::DateTime(ts) => Some(ts.time()),
        SqlLiteral::Text(s) => {
            let s = s.trim();
            NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .ok()
        }
        _ => None,
    }
}

fn as_guid(value: &SqlLiteral) -> Option<Uuid> {
    match value {
        SqlLiteral::Guid(u) => Some(*u),
        SqlLiteral::Text(s) => Uuid::parse_str(s.trim()).ok(),
        _ => None,
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// Single-quote a string, doubling every embedded quote.
pub fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Inverse of [`quote_string`]. Rejects text that is not exactly one literal.
pub fn unquote_string(literal: &str) -> Option<String> {
    let inner = literal.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' {
            if chars.next_if_eq(&'\'').is_none() {
                return None;
            }
        }
        out.push(c);
    }
    Some(out)
}

/// Strip redundant outer parentheses: `((0))` becomes `0`.
fn strip_parens(raw: &str) -> &str {
    let mut s = raw.trim();
    while s.starts_with('(') && s.ends_with(')') && encloses(s) {
        s = s[1..s.len() - 1].trim();
    }
    s
}

/// True when the first `(` of `s` is closed by its last `)`.
fn encloses(s: &str) -> bool {
    let mut depth = 0i32;
    let mut in_quote = false;
    for (i, c) in s.char_indices() {
        match c {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                depth -= 1;
                if depth == 0 && i != s.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Byte offset of the first `::` outside quotes and parentheses.
fn top_level_cast(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 0i32;
    let mut in_quote = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => in_quote = !in_quote,
            b'(' if !in_quote => depth += 1,
            b')' if !in_quote => depth -= 1,
            b':' if !in_quote && depth == 0 && bytes.get(i + 1) == Some(&b':') => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Dialect-independent tail of default parsing.
fn parse_plain_literal(s: &str) -> Option<SqlLiteral> {
    if s.is_empty() {
        return None;
    }
    if s.eq_ignore_ascii_case("null") {
        return Some(SqlLiteral::Null);
    }
    if let Some(text) = unquote_string(s) {
        return Some(SqlLiteral::Text(text));
    }
    if s.eq_ignore_ascii_case("true") {
        return Some(SqlLiteral::Bool(true));
    }
    if s.eq_ignore_ascii_case("false") {
        return Some(SqlLiteral::Bool(false));
    }
    if let Ok(i) = s.parse::<i64>() {
        return Some(SqlLiteral::Int(i));
    }
    if is_decimal_text(s) {
        return Some(SqlLiteral::Decimal(s.to_string()));
    }
    Some(SqlLiteral::Expression(s.to_string()))
}

// =============================================================================
// SQLite
// =============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteTypeMapper;

impl TypeMapper for SqliteTypeMapper {
    fn dialect(&self) -> DatabaseType {
        DatabaseType::SQLite
    }

    fn rendering(&self, logical: LogicalType) -> Option<Rendering> {
        use LogicalType::*;
        Some(match logical {
            TinyInt => Rendering::Plain("tinyint"),
            SmallInt => Rendering::Plain("smallint"),
            Int => Rendering::Plain("integer"),
            BigInt => Rendering::Plain("bigint"),
            String => Rendering::Length {
                name: "varchar",
                unbounded: "text",
            },
            Text => Rendering::Plain("text"),
            Binary => Rendering::Plain("blob"),
            Float | Double => Rendering::Plain("double precision"),
            Decimal => Rendering::Precision("numeric"),
            Boolean => Rendering::Plain("boolean"),
            Date => Rendering::Plain("date"),
            Time => Rendering::Plain("time"),
            DateTime | DateTime2 | DateTimeOffset => Rendering::Plain("datetime"),
            Guid | Xml | Other => return None,
        })
    }

    fn logical_type(&self, catalog_type: &str) -> LogicalType {
        let base = base_type_name(catalog_type);
        match base.as_str() {
            "tinyint" => LogicalType::TinyInt,
            "smallint" => LogicalType::SmallInt,
            "int" | "integer" | "mediumint" => LogicalType::Int,
            "bigint" => LogicalType::BigInt,
            "varchar" | "nvarchar" | "char" | "nchar" | "character" | "varying character" => {
                LogicalType::String
            }
            "text" | "clob" => LogicalType::Text,
            "blob" => LogicalType::Binary,
            "real" | "float" => LogicalType::Float,
            "double" | "double precision" => LogicalType::Double,
            "numeric" | "decimal" => LogicalType::Decimal,
            "boolean" | "bool" | "bit" => LogicalType::Boolean,
            "date" => LogicalType::Date,
            "time" => LogicalType::Time,
            "datetime" | "timestamp" => LogicalType::DateTime,
            _ => LogicalType::Other,
        }
    }

    fn binary_literal(&self, bytes: &[u8]) -> String {
        format!("X'{}'", hex::encode_upper(bytes))
    }

    fn parse_catalog_default(&self, raw: &str) -> Option<SqlLiteral> {
        let s = strip_parens(raw);
        if let Some(hex_body) = s
            .strip_prefix(['X', 'x'])
            .and_then(|rest| unquote_string(rest))
        {
            if let Ok(bytes) = hex::decode(&hex_body) {
                return Some(SqlLiteral::Bytes(bytes));
            }
        }
        // SQLite keeps a double-quoted default as a string when it names no column
        if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
            return Some(SqlLiteral::Text(s[1..s.len() - 1].replace("\"\"", "\"")));
        }
        parse_plain_literal(s)
    }
}

// =============================================================================
// PostgreSQL
// =============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresTypeMapper;

impl TypeMapper for PostgresTypeMapper {
    fn dialect(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }

    fn rendering(&self, logical: LogicalType) -> Option<Rendering> {
        use LogicalType::*;
        Some(match logical {
            TinyInt | SmallInt => Rendering::Plain("smallint"),
            Int => Rendering::Plain("integer"),
            BigInt => Rendering::Plain("bigint"),
            String => Rendering::Length {
                name: "varchar",
                unbounded: "text",
            },
            Text => Rendering::Plain("text"),
            Binary => Rendering::Plain("bytea"),
            Float | Double => Rendering::Plain("double precision"),
            Decimal => Rendering::Precision("numeric"),
            Boolean => Rendering::Plain("boolean"),
            Date => Rendering::Plain("date"),
            Time => Rendering::Plain("time"),
            DateTime | DateTime2 => Rendering::Plain("timestamp"),
            DateTimeOffset => Rendering::Plain("timestamp with time zone"),
            Guid => Rendering::Plain("uuid"),
            Xml => Rendering::Plain("xml"),
            Other => return None,
        })
    }

    fn logical_type(&self, catalog_type: &str) -> LogicalType {
        let base = base_type_name(catalog_type);
        match base.as_str() {
            "smallint" | "int2" | "smallserial" => LogicalType::SmallInt,
            "integer" | "int" | "int4" | "serial" => LogicalType::Int,
            "bigint" | "int8" | "bigserial" => LogicalType::BigInt,
            "character varying" | "varchar" | "character" | "char" | "bpchar" => {
                LogicalType::String
            }
            "text" | "citext" | "name" => LogicalType::Text,
            "bytea" => LogicalType::Binary,
            "real" | "float4" => LogicalType::Float,
            "double precision" | "float8" => LogicalType::Double,
            "numeric" | "decimal" => LogicalType::Decimal,
            "boolean" | "bool" => LogicalType::Boolean,
            "date" => LogicalType::Date,
            "time" | "time without time zone" => LogicalType::Time,
            "timestamp" | "timestamp without time zone" => LogicalType::DateTime,
            "timestamp with time zone" | "timestamptz" => LogicalType::DateTimeOffset,
            "uuid" => LogicalType::Guid,
            "xml" => LogicalType::Xml,
            _ => LogicalType::Other,
        }
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value { "true" } else { "false" }
    }

    fn xml_suffix(&self) -> &'static str {
        "::xml"
    }

    fn binary_literal(&self, bytes: &[u8]) -> String {
        format!("'\\x{}'::bytea", hex::encode_upper(bytes))
    }

    fn parse_catalog_default(&self, raw: &str) -> Option<SqlLiteral> {
        let s = strip_parens(raw);
        // 'abc'::character varying, NULL::text, '5'::integer
        if let Some(pos) = top_level_cast(s) {
            let head = strip_parens(&s[..pos]);
            let cast = s[pos + 2..].trim().to_ascii_lowercase();
            if cast == "bytea" {
                if let Some(bytes) = unquote_string(head)
                    .and_then(|t| t.strip_prefix("\\x").map(str::to_string))
                    .and_then(|h| hex::decode(&h).ok())
                {
                    return Some(SqlLiteral::Bytes(bytes));
                }
            }
            return match parse_plain_literal(head) {
                Some(SqlLiteral::Expression(_)) | None => {
                    Some(SqlLiteral::Expression(s.to_string()))
                }
                literal => literal,
            };
        }
        parse_plain_literal(s)
    }
}

// =============================================================================
// SQL Server
// =============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct SqlServerTypeMapper;

impl TypeMapper for SqlServerTypeMapper {
    fn dialect(&self) -> DatabaseType {
        DatabaseType::SqlServer
    }

    fn rendering(&self, logical: LogicalType) -> Option<Rendering> {
        use LogicalType::*;
        Some(match logical {
            TinyInt => Rendering::Plain("tinyint"),
            SmallInt => Rendering::Plain("smallint"),
            Int => Rendering::Plain("int"),
            BigInt => Rendering::Plain("bigint"),
            String => Rendering::Length {
                name: "nvarchar",
                unbounded: "nvarchar(max)",
            },
            Text => Rendering::Plain("nvarchar(max)"),
            Binary => Rendering::Length {
                name: "varbinary",
                unbounded: "varbinary(max)",
            },
            Float | Double => Rendering::Plain("double precision"),
            Decimal => Rendering::Precision("decimal"),
            Boolean => Rendering::Plain("bit"),
            Date => Rendering::Plain("date"),
            Time => Rendering::Plain("time"),
            DateTime => Rendering::Plain("datetime"),
            DateTime2 => Rendering::Plain("datetime2"),
            DateTimeOffset => Rendering::Plain("datetimeoffset"),
            Guid => Rendering::Plain("uniqueidentifier"),
            Xml => Rendering::Plain("xml"),
            Other => return None,
        })
    }

    fn logical_type(&self, catalog_type: &str) -> LogicalType {
        let base = base_type_name(catalog_type);
        match base.as_str() {
            "tinyint" => LogicalType::TinyInt,
            "smallint" => LogicalType::SmallInt,
            "int" => LogicalType::Int,
            "bigint" => LogicalType::BigInt,
            "varchar" | "nvarchar" | "char" | "nchar" => LogicalType::String,
            "text" | "ntext" => LogicalType::Text,
            "binary" | "varbinary" | "image" => LogicalType::Binary,
            "real" => LogicalType::Float,
            "float" => LogicalType::Double,
            "decimal" | "numeric" | "money" | "smallmoney" => LogicalType::Decimal,
            "bit" => LogicalType::Boolean,
            "date" => LogicalType::Date,
            "time" => LogicalType::Time,
            "datetime" | "smalldatetime" => LogicalType::DateTime,
            "datetime2" => LogicalType::DateTime2,
            "datetimeoffset" => LogicalType::DateTimeOffset,
            "uniqueidentifier" => LogicalType::Guid,
            "xml" => LogicalType::Xml,
            _ => LogicalType::Other,
        }
    }

    /// nvarchar defaults keep non-ASCII text only as `N'..'`
    fn string_literal(&self, text: &str) -> String {
        format!("N{}", quote_string(text))
    }

    fn binary_literal(&self, bytes: &[u8]) -> String {
        format!("0x{}", hex::encode_upper(bytes))
    }

    fn parse_catalog_default(&self, raw: &str) -> Option<SqlLiteral> {
        let s = strip_parens(raw);
        if let Some(hex_body) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            if let Ok(bytes) = hex::decode(hex_body) {
                return Some(SqlLiteral::Bytes(bytes));
            }
        }
        // N'unicode'
        if let Some(text) = s
            .strip_prefix(['N', 'n'])
            .and_then(|rest| unquote_string(rest))
        {
            return Some(SqlLiteral::Text(text));
        }
        parse_plain_literal(s)
    }
}

/// Lowercased type name without its parameter list: `NVARCHAR(50)` is `nvarchar`.
fn base_type_name(catalog_type: &str) -> String {
    let lower = catalog_type.trim().to_lowercase();
    match lower.find('(') {
        Some(open) => {
            let close = lower.rfind(')').map(|c| c + 1).unwrap_or(lower.len());
            let mut base = lower[..open].trim_end().to_string();
            let rest = lower[close..].trim();
            if !rest.is_empty() {
                base.push(' ');
                base.push_str(rest);
            }
            base
        }
        None => lower,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mappers() -> Vec<Box<dyn TypeMapper>> {
        vec![
            Box::new(SqliteTypeMapper),
            Box::new(PostgresTypeMapper),
            Box::new(SqlServerTypeMapper),
        ]
    }

    #[test]
    fn test_native_type_table() {
        let pg = PostgresTypeMapper;
        let ms = SqlServerTypeMapper;
        let lite = SqliteTypeMapper;

        assert_eq!(pg.native_type(LogicalType::TinyInt, None, None, None).unwrap(), "smallint");
        assert_eq!(ms.native_type(LogicalType::TinyInt, None, None, None).unwrap(), "tinyint");
        assert_eq!(lite.native_type(LogicalType::Int, None, None, None).unwrap(), "integer");
        assert_eq!(ms.native_type(LogicalType::Int, None, None, None).unwrap(), "int");
        assert_eq!(
            ms.native_type(LogicalType::String, Some(50), None, None).unwrap(),
            "nvarchar(50)"
        );
        assert_eq!(
            ms.native_type(LogicalType::String, None, None, None).unwrap(),
            "nvarchar(max)"
        );
        assert_eq!(
            pg.native_type(LogicalType::String, Some(-1), None, None).unwrap(),
            "text"
        );
        assert_eq!(
            ms.native_type(LogicalType::Binary, Some(16), None, None).unwrap(),
            "varbinary(16)"
        );
        assert_eq!(
            pg.native_type(LogicalType::DateTimeOffset, None, None, None).unwrap(),
            "timestamp with time zone"
        );
        assert_eq!(
            ms.native_type(LogicalType::Boolean, None, None, None).unwrap(),
            "bit"
        );
        for mapper in mappers() {
            assert_eq!(
                mapper.native_type(LogicalType::Float, None, None, None).unwrap(),
                "double precision"
            );
            assert_eq!(
                mapper.native_type(LogicalType::Double, None, None, None).unwrap(),
                "double precision"
            );
        }
    }

    #[test]
    fn test_decimal_precision_and_scale() {
        let pg = PostgresTypeMapper;
        let ms = SqlServerTypeMapper;
        assert_eq!(
            pg.native_type(LogicalType::Decimal, None, Some(10), Some(2)).unwrap(),
            "numeric(10, 2)"
        );
        assert_eq!(
            pg.native_type(LogicalType::Decimal, None, Some(10), None).unwrap(),
            "numeric(10)"
        );
        assert_eq!(
            pg.native_type(LogicalType::Decimal, None, Some(10), Some(0)).unwrap(),
            "numeric(10)"
        );
        assert_eq!(
            pg.native_type(LogicalType::Decimal, None, Some(0), Some(2)).unwrap(),
            "numeric"
        );
        assert_eq!(
            ms.native_type(LogicalType::Decimal, None, None, None).unwrap(),
            "decimal"
        );
    }

    #[test]
    fn test_unsupported_pairs() {
        let lite = SqliteTypeMapper;
        for logical in [LogicalType::Guid, LogicalType::Xml, LogicalType::Other] {
            let err = lite.native_type(logical, None, None, None).unwrap_err();
            assert!(matches!(err, DbError::UnsupportedType { .. }));
        }
        let err = PostgresTypeMapper
            .native_type(LogicalType::Other, None, None, None)
            .unwrap_err();
        assert!(matches!(err, DbError::UnsupportedType { .. }));
    }

    #[test]
    fn test_native_type_total_and_deterministic() {
        for mapper in mappers() {
            for logical in LogicalType::ALL {
                if mapper.rendering(logical).is_none() {
                    continue;
                }
                for (len, p, s) in [(None, None, None), (Some(20), Some(8), Some(3))] {
                    let first = mapper.native_type(logical, len, p, s).unwrap();
                    let second = mapper.native_type(logical, len, p, s).unwrap();
                    assert_eq!(first, second);
                }
            }
        }
    }

    #[test]
    fn test_format_null_and_expression() {
        for mapper in mappers() {
            assert_eq!(mapper.format_default_value(LogicalType::Int, None).unwrap(), "NULL");
            assert_eq!(
                mapper
                    .format_default_value(LogicalType::Text, Some(&SqlLiteral::Null))
                    .unwrap(),
                "NULL"
            );
            assert_eq!(
                mapper
                    .format_default_value(
                        LogicalType::DateTime,
                        Some(&SqlLiteral::Expression("CURRENT_TIMESTAMP".into()))
                    )
                    .unwrap(),
                "CURRENT_TIMESTAMP"
            );
        }
    }

    #[test]
    fn test_format_numeric() {
        let pg = PostgresTypeMapper;
        assert_eq!(
            pg.format_default_value(LogicalType::BigInt, Some(&SqlLiteral::Int(1234567)))
                .unwrap(),
            "1234567"
        );
        assert_eq!(
            pg.format_default_value(LogicalType::Double, Some(&SqlLiteral::Float(1234.5)))
                .unwrap(),
            "1234.5"
        );
        assert_eq!(
            pg.format_default_value(
                LogicalType::Decimal,
                Some(&SqlLiteral::Decimal("12.50".into()))
            )
            .unwrap(),
            "12.50"
        );
        let err = pg
            .format_default_value(LogicalType::Double, Some(&SqlLiteral::Float(f64::NAN)))
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
        let err = pg
            .format_default_value(
                LogicalType::Decimal,
                Some(&SqlLiteral::Decimal("1,000".into())),
            )
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }

    #[test]
    fn test_format_boolean_per_dialect() {
        let t = Some(&SqlLiteral::Bool(true));
        let f = Some(&SqlLiteral::Bool(false));
        assert_eq!(PostgresTypeMapper.format_default_value(LogicalType::Boolean, t).unwrap(), "true");
        assert_eq!(PostgresTypeMapper.format_default_value(LogicalType::Boolean, f).unwrap(), "false");
        assert_eq!(SqlServerTypeMapper.format_default_value(LogicalType::Boolean, t).unwrap(), "1");
        assert_eq!(SqliteTypeMapper.format_default_value(LogicalType::Boolean, f).unwrap(), "0");
    }

    #[test]
    fn test_format_temporal() {
        let ms = SqlServerTypeMapper;
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let ts = date.and_hms_opt(14, 5, 7).unwrap();

        assert_eq!(
            ms.format_default_value(LogicalType::DateTime2, Some(&SqlLiteral::DateTime(ts)))
                .unwrap(),
            "'2024-03-09 14:05:07'"
        );
        // a date-only value gets midnight
        assert_eq!(
            ms.format_default_value(LogicalType::DateTime, Some(&SqlLiteral::Date(date)))
                .unwrap(),
            "'2024-03-09 00:00:00'"
        );
        assert_eq!(
            ms.format_default_value(LogicalType::Time, Some(&SqlLiteral::DateTime(ts)))
                .unwrap(),
            "'14:05:07'"
        );
        assert_eq!(
            ms.format_default_value(LogicalType::Date, Some(&SqlLiteral::Date(date)))
                .unwrap(),
            "'2024-03-09'"
        );
    }

    #[test]
    fn test_format_guid_and_xml() {
        let id = Uuid::parse_str("6f9619ff-8b86-d011-b42d-00c04fc964ff").unwrap();
        assert_eq!(
            SqlServerTypeMapper
                .format_default_value(LogicalType::Guid, Some(&SqlLiteral::Guid(id)))
                .unwrap(),
            "'6f9619ff-8b86-d011-b42d-00c04fc964ff'"
        );
        let xml = Some(SqlLiteral::Text("<a>it's</a>".into()));
        assert_eq!(
            PostgresTypeMapper
                .format_default_value(LogicalType::Xml, xml.as_ref())
                .unwrap(),
            "'<a>it''s</a>'::xml"
        );
        assert_eq!(
            SqlServerTypeMapper
                .format_default_value(LogicalType::Xml, xml.as_ref())
                .unwrap(),
            "N'<a>it''s</a>'"
        );
    }

    #[test]
    fn test_sqlserver_text_defaults_are_unicode() {
        let text = Some(SqlLiteral::Text("café ünïcode".into()));
        for logical in [LogicalType::String, LogicalType::Text] {
            assert_eq!(
                SqlServerTypeMapper.format_default_value(logical, text.as_ref()).unwrap(),
                "N'café ünïcode'"
            );
        }
        assert_eq!(
            PostgresTypeMapper
                .format_default_value(LogicalType::String, text.as_ref())
                .unwrap(),
            "'café ünïcode'"
        );
        assert_eq!(
            SqliteTypeMapper
                .format_default_value(LogicalType::Text, text.as_ref())
                .unwrap(),
            "'café ünïcode'"
        );
    }

    #[test]
    fn test_format_binary() {
        let bytes = Some(SqlLiteral::Bytes(vec![0xDE, 0xAD]));
        assert_eq!(
            SqliteTypeMapper
                .format_default_value(LogicalType::Binary, bytes.as_ref())
                .unwrap(),
            "X'DEAD'"
        );
        assert_eq!(
            SqlServerTypeMapper
                .format_default_value(LogicalType::Binary, bytes.as_ref())
                .unwrap(),
            "0xDEAD"
        );
        assert_eq!(
            PostgresTypeMapper
                .format_default_value(LogicalType::Binary, bytes.as_ref())
                .unwrap(),
            "'\\xDEAD'::bytea"
        );
    }

    #[test]
    fn test_string_literal_round_trip() {
        let samples = [
            "plain", "'", "''", "'start", "end'", "mid'dle", "two'quo'tes", "'both'",
            "a''b", "",
        ];
        for mapper in mappers() {
            for sample in samples {
                let literal = mapper
                    .format_default_value(LogicalType::String, Some(&SqlLiteral::Text(sample.into())))
                    .unwrap();
                assert_eq!(
                    mapper.parse_catalog_default(&literal),
                    Some(SqlLiteral::Text(sample.to_string())),
                    "{:?} via {}",
                    sample,
                    literal
                );
            }
        }
    }

    #[test]
    fn test_parse_catalog_default_sqlserver() {
        let ms = SqlServerTypeMapper;
        assert_eq!(ms.parse_catalog_default("((0))"), Some(SqlLiteral::Int(0)));
        assert_eq!(ms.parse_catalog_default("((-12))"), Some(SqlLiteral::Int(-12)));
        assert_eq!(
            ms.parse_catalog_default("(N'it''s')"),
            Some(SqlLiteral::Text("it's".into()))
        );
        assert_eq!(
            ms.parse_catalog_default("(getdate())"),
            Some(SqlLiteral::Expression("getdate()".into()))
        );
        assert_eq!(ms.parse_catalog_default("((1.50))"), Some(SqlLiteral::Decimal("1.50".into())));
        assert_eq!(ms.parse_catalog_default("(NULL)"), Some(SqlLiteral::Null));
        assert_eq!(
            ms.parse_catalog_default("(0xdeAD)"),
            Some(SqlLiteral::Bytes(vec![0xDE, 0xAD]))
        );
        // Odd digit count is not a byte literal
        assert!(!matches!(
            ms.parse_catalog_default("(0xABC)"),
            Some(SqlLiteral::Bytes(_))
        ));
    }

    #[test]
    fn test_parse_catalog_default_postgres() {
        let pg = PostgresTypeMapper;
        assert_eq!(
            pg.parse_catalog_default("'abc'::character varying"),
            Some(SqlLiteral::Text("abc".into()))
        );
        assert_eq!(pg.parse_catalog_default("NULL::text"), Some(SqlLiteral::Null));
        assert_eq!(pg.parse_catalog_default("true"), Some(SqlLiteral::Bool(true)));
        assert_eq!(pg.parse_catalog_default("42"), Some(SqlLiteral::Int(42)));
        assert_eq!(
            pg.parse_catalog_default("nextval('users_id_seq'::regclass)"),
            Some(SqlLiteral::Expression("nextval('users_id_seq'::regclass)".into()))
        );
        assert_eq!(
            pg.parse_catalog_default("'\\xDEAD'::bytea"),
            Some(SqlLiteral::Bytes(vec![0xDE, 0xAD]))
        );
        assert_eq!(
            pg.parse_catalog_default("'<a/>'::xml"),
            Some(SqlLiteral::Text("<a/>".into()))
        );
    }

    #[test]
    fn test_parse_catalog_default_sqlite() {
        let lite = SqliteTypeMapper;
        assert_eq!(
            lite.parse_catalog_default("CURRENT_TIMESTAMP"),
            Some(SqlLiteral::Expression("CURRENT_TIMESTAMP".into()))
        );
        assert_eq!(lite.parse_catalog_default("X'00FF'"), Some(SqlLiteral::Bytes(vec![0, 255])));
        assert_eq!(
            lite.parse_catalog_default("\"x\""),
            Some(SqlLiteral::Text("x".into()))
        );
        assert_eq!(lite.parse_catalog_default(""), None);
    }

    #[test]
    fn test_logical_type_reverse_mapping() {
        assert_eq!(PostgresTypeMapper.logical_type("character varying(50)"), LogicalType::String);
        assert_eq!(PostgresTypeMapper.logical_type("int4"), LogicalType::Int);
        assert_eq!(
            PostgresTypeMapper.logical_type("timestamp(6) with time zone"),
            LogicalType::DateTimeOffset
        );
        assert_eq!(SqlServerTypeMapper.logical_type("NVARCHAR"), LogicalType::String);
        assert_eq!(SqlServerTypeMapper.logical_type("float"), LogicalType::Double);
        assert_eq!(SqliteTypeMapper.logical_type("INTEGER"), LogicalType::Int);
        assert_eq!(SqliteTypeMapper.logical_type("VARCHAR(100)"), LogicalType::String);
        assert_eq!(SqliteTypeMapper.logical_type("geometry"), LogicalType::Other);
        assert_eq!(PostgresTypeMapper.logical_type("jsonb"), LogicalType::Other);
    }

    #[test]
    fn test_unquote_rejects_malformed() {
        assert_eq!(unquote_string("'a'b'"), None);
        assert_eq!(unquote_string("abc"), None);
        assert_eq!(unquote_string("'a''b'"), Some("a'b".to_string()));
    }
}
