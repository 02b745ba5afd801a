//! Schema introspection module.
//!
//! Each dialect implements [`MetadataProvider`] over a
//! [`PhysicalConnection`], turning its catalog into normalized column,
//! foreign key, trigger and DDL descriptors.
//!
//! # Architecture
//!
//! SQL queries are organized in the `queries` submodule with constants for each
//! database type. The trait's provided methods own table-name resolution, so a
//! dialect only supplies the catalog lookups for an already resolved table.
//!
//! # Name resolution
//!
//! One layer of quoting (`"x"`, `[x]`, `` `x` ``) is stripped, then the catalog
//! table list is scanned for an exact match and, failing that, a
//! case-insensitive one. A table that cannot be resolved yields empty results,
//! never an error.

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

use crate::db::driver::PhysicalConnection;
use crate::db::types::RowExt;
use crate::dialect::{PostgresTypeMapper, SqlServerTypeMapper, SqliteTypeMapper, TypeMapper};
use crate::error::{DbError, DbResult};
use crate::models::{
    ColumnDescriptor, DatabaseType, ForeignKeyDescriptor, LogicalType, QueryParam, Row, TableRef,
    TriggerDescriptor,
};

// =============================================================================
// SQL Query Templates
// =============================================================================

mod queries {
    pub mod sqlite {
        pub const LIST_TABLES: &str = r#"
            SELECT name FROM sqlite_master
            WHERE type = 'table'
            AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#;

        pub const TABLE_INFO: &str = r#"
            SELECT name, type, "notnull" AS not_null, dflt_value, pk
            FROM pragma_table_info(?1)
            ORDER BY cid
            "#;

        pub const FOREIGN_KEYS: &str = r#"
            SELECT id, seq, "table" AS to_table, "from" AS from_column, "to" AS to_column
            FROM pragma_foreign_key_list(?1)
            ORDER BY id, seq
            "#;

        pub const PRIMARY_KEY: &str = r#"
            SELECT name FROM pragma_table_info(?1)
            WHERE pk > 0
            ORDER BY pk
            "#;

        pub const TRIGGERS: &str = r#"
            SELECT name, sql FROM sqlite_master
            WHERE type = 'trigger' AND tbl_name = ?1
            ORDER BY name
            "#;

        pub const TABLE_DDL: &str =
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1";
    }

    pub mod postgres {
        pub const LIST_TABLES: &str = r#"
            SELECT table_schema::text AS table_schema, table_name::text AS table_name
            FROM information_schema.tables
            WHERE table_type = 'BASE TABLE'
            AND table_schema NOT IN ('pg_catalog', 'information_schema')
            ORDER BY table_schema, table_name
            "#;

        pub const COLUMNS: &str = r#"
            SELECT
                c.column_name::text AS column_name,
                c.data_type::text AS data_type,
                c.udt_name::text AS udt_name,
                c.character_maximum_length::bigint AS char_max_length,
                c.numeric_precision::int AS numeric_precision,
                c.numeric_scale::int AS numeric_scale,
                c.column_default::text AS column_default,
                c.is_nullable::text AS is_nullable,
                CASE WHEN pk.column_name IS NOT NULL THEN true ELSE false END AS is_primary_key
            FROM information_schema.columns c
            LEFT JOIN (
                SELECT kcu.column_name
                FROM information_schema.table_constraints tc
                JOIN information_schema.key_column_usage kcu
                    ON tc.constraint_name = kcu.constraint_name
                    AND tc.table_schema = kcu.table_schema
                WHERE tc.table_name = $1
                AND tc.table_schema = $2
                AND tc.constraint_type = 'PRIMARY KEY'
            ) pk ON c.column_name = pk.column_name
            WHERE c.table_name = $1 AND c.table_schema = $2
            ORDER BY c.ordinal_position
            "#;

        pub const FOREIGN_KEYS: &str = r#"
            SELECT
                con.oid::bigint AS id,
                con.conname::text AS constraint_name,
                src.attname::text AS from_column,
                ref.relname::text AS to_table,
                dst.attname::text AS to_column
            FROM pg_constraint con
            JOIN pg_class rel ON rel.oid = con.conrelid
            JOIN pg_namespace nsp ON nsp.oid = rel.relnamespace
            JOIN pg_class ref ON ref.oid = con.confrelid
            CROSS JOIN LATERAL unnest(con.conkey, con.confkey) AS k(src_attnum, dst_attnum)
            JOIN pg_attribute src ON src.attrelid = con.conrelid AND src.attnum = k.src_attnum
            JOIN pg_attribute dst ON dst.attrelid = con.confrelid AND dst.attnum = k.dst_attnum
            WHERE con.contype = 'f'
            AND rel.relname = $1
            AND nsp.nspname = $2
            ORDER BY con.conname, src.attnum
            "#;

        pub const TRIGGERS: &str = r#"
            SELECT
                t.tgname::text AS name,
                nsp.nspname::text AS schema_name,
                current_database()::text AS catalog_name,
                pg_get_triggerdef(t.oid)::text AS sql_definition
            FROM pg_trigger t
            JOIN pg_class rel ON rel.oid = t.tgrelid
            JOIN pg_namespace nsp ON nsp.oid = rel.relnamespace
            WHERE NOT t.tgisinternal
            AND rel.relname = $1
            AND nsp.nspname = $2
            ORDER BY t.tgname
            "#;
    }

    pub mod mssql {
        pub const LIST_TABLES: &str = r#"
            SELECT TABLE_SCHEMA AS table_schema, TABLE_NAME AS table_name
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_SCHEMA, TABLE_NAME
            "#;

        pub const COLUMNS: &str = r#"
            SELECT
                c.COLUMN_NAME AS column_name,
                c.DATA_TYPE AS data_type,
                CAST(c.CHARACTER_MAXIMUM_LENGTH AS bigint) AS char_max_length,
                CAST(c.NUMERIC_PRECISION AS int) AS numeric_precision,
                CAST(c.NUMERIC_SCALE AS int) AS numeric_scale,
                c.COLUMN_DEFAULT AS column_default,
                c.IS_NULLABLE AS is_nullable,
                CASE WHEN pk.COLUMN_NAME IS NULL THEN 0 ELSE 1 END AS is_primary_key
            FROM INFORMATION_SCHEMA.COLUMNS c
            LEFT JOIN (
                SELECT kcu.COLUMN_NAME
                FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc
                JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu
                    ON tc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME
                    AND tc.TABLE_SCHEMA = kcu.TABLE_SCHEMA
                WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY'
                AND tc.TABLE_NAME = @P1
                AND tc.TABLE_SCHEMA = @P2
            ) pk ON pk.COLUMN_NAME = c.COLUMN_NAME
            WHERE c.TABLE_NAME = @P1 AND c.TABLE_SCHEMA = @P2
            ORDER BY c.ORDINAL_POSITION
            "#;

        pub const FOREIGN_KEYS: &str = r#"
            SELECT
                CAST(fk.object_id AS bigint) AS id,
                fk.name AS constraint_name,
                pc.name AS from_column,
                rt.name AS to_table,
                rc.name AS to_column
            FROM sys.foreign_keys fk
            JOIN sys.foreign_key_columns fkc ON fkc.constraint_object_id = fk.object_id
            JOIN sys.tables pt ON pt.object_id = fk.parent_object_id
            JOIN sys.columns pc
                ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id
            JOIN sys.tables rt ON rt.object_id = fkc.referenced_object_id
            JOIN sys.columns rc
                ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id
            WHERE pt.name = @P1 AND SCHEMA_NAME(pt.schema_id) = @P2
            ORDER BY fk.name, fkc.constraint_column_id
            "#;

        pub const TRIGGERS: &str = r#"
            SELECT
                tr.name AS name,
                SCHEMA_NAME(t.schema_id) AS schema_name,
                DB_NAME() AS catalog_name,
                OBJECT_DEFINITION(tr.object_id) AS sql_definition,
                tr.create_date AS date_created
            FROM sys.triggers tr
            JOIN sys.tables t ON t.object_id = tr.parent_id
            WHERE t.name = @P1 AND SCHEMA_NAME(t.schema_id) = @P2
            ORDER BY tr.name
            "#;
    }
}

// =============================================================================
// Provider trait
// =============================================================================

/// Catalog access for one dialect.
#[async_trait]
pub trait MetadataProvider: Send + Sync + Debug {
    fn dialect(&self) -> DatabaseType;

    fn type_mapper(&self) -> &dyn TypeMapper;

    /// Schema assumed for an unqualified name when several schemas match.
    fn default_schema(&self) -> Option<&'static str> {
        None
    }

    /// Every user table, ordered by schema then name.
    async fn list_tables(&self, conn: &mut dyn PhysicalConnection) -> DbResult<Vec<TableRef>>;

    async fn fetch_columns(
        &self,
        conn: &mut dyn PhysicalConnection,
        table: &TableRef,
    ) -> DbResult<Vec<ColumnDescriptor>>;

    async fn fetch_foreign_keys(
        &self,
        conn: &mut dyn PhysicalConnection,
        table: &TableRef,
    ) -> DbResult<Vec<ForeignKeyDescriptor>>;

    async fn fetch_triggers(
        &self,
        conn: &mut dyn PhysicalConnection,
        table: &TableRef,
    ) -> DbResult<Vec<TriggerDescriptor>>;

    async fn fetch_table_definition(
        &self,
        conn: &mut dyn PhysicalConnection,
        table: &TableRef,
    ) -> DbResult<Option<String>>;

    /// Map a user-supplied, possibly quoted or qualified name onto a catalog table.
    async fn resolve_table(
        &self,
        conn: &mut dyn PhysicalConnection,
        name: &str,
    ) -> DbResult<Option<TableRef>> {
        let requested = parse_table_name(name)?;
        let tables = self.list_tables(conn).await?;
        let resolved = match_table(&tables, &requested, self.default_schema());
        debug!(
            dialect = %self.dialect(),
            requested = %name,
            resolved = ?resolved.as_ref().map(TableRef::qualified_name),
            "Resolved table name"
        );
        Ok(resolved)
    }

    async fn columns(
        &self,
        conn: &mut dyn PhysicalConnection,
        table_name: &str,
    ) -> DbResult<Vec<ColumnDescriptor>> {
        match self.resolve_table(conn, table_name).await? {
            Some(table) => self.fetch_columns(conn, &table).await,
            None => Ok(Vec::new()),
        }
    }

    async fn foreign_keys(
        &self,
        conn: &mut dyn PhysicalConnection,
        table_name: &str,
    ) -> DbResult<Vec<ForeignKeyDescriptor>> {
        match self.resolve_table(conn, table_name).await? {
            Some(table) => self.fetch_foreign_keys(conn, &table).await,
            None => Ok(Vec::new()),
        }
    }

    async fn triggers(
        &self,
        conn: &mut dyn PhysicalConnection,
        table_name: &str,
    ) -> DbResult<Vec<TriggerDescriptor>> {
        match self.resolve_table(conn, table_name).await? {
            Some(table) => self.fetch_triggers(conn, &table).await,
            None => Ok(Vec::new()),
        }
    }

    async fn table_definition(
        &self,
        conn: &mut dyn PhysicalConnection,
        table_name: &str,
    ) -> DbResult<Option<String>> {
        match self.resolve_table(conn, table_name).await? {
            Some(table) => self.fetch_table_definition(conn, &table).await,
            None => Ok(None),
        }
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Fail fast on a blank table name, before any connection is touched.
pub(crate) fn require_table_name(name: &str) -> DbResult<()> {
    if name.trim().is_empty() {
        return Err(DbError::configuration("table name must not be empty"));
    }
    Ok(())
}

/// Strip one layer of `"x"`, `[x]` or `` `x` `` quoting.
pub(crate) fn unquote_identifier(part: &str) -> String {
    let part = part.trim();
    let mut chars = part.chars();
    let (Some(first), Some(last)) = (chars.next(), chars.next_back()) else {
        return part.to_string();
    };
    let inner = &part[first.len_utf8()..part.len() - last.len_utf8()];
    match (first, last) {
        ('"', '"') => inner.replace("\"\"", "\""),
        ('[', ']') => inner.replace("]]", "]"),
        ('`', '`') => inner.replace("``", "`"),
        _ => part.to_string(),
    }
}

/// Split `schema.table` on dots outside quotes, then unquote each part.
pub(crate) fn parse_table_name(name: &str) -> DbResult<TableRef> {
    require_table_name(name)?;

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut closing: Option<char> = None;
    for c in name.trim().chars() {
        match closing {
            Some(close) if c == close => closing = None,
            Some(_) => {}
            None => match c {
                '"' => closing = Some('"'),
                '[' => closing = Some(']'),
                '`' => closing = Some('`'),
                '.' => {
                    parts.push(std::mem::take(&mut current));
                    continue;
                }
                _ => {}
            },
        }
        current.push(c);
    }
    parts.push(current);

    let mut parts: Vec<String> = parts.iter().map(|p| unquote_identifier(p)).collect();
    let table = parts.pop().unwrap_or_default();
    if table.trim().is_empty() {
        return Err(DbError::configuration(format!(
            "'{}' does not name a table",
            name
        )));
    }
    Ok(match parts.pop() {
        Some(schema) if !schema.is_empty() => TableRef::new(table).with_schema(schema),
        _ => TableRef::new(table),
    })
}

/// Exact match first, then case-insensitive. A catalog entry without a
/// schema matches any requested schema.
fn match_table(
    tables: &[TableRef],
    requested: &TableRef,
    default_schema: Option<&str>,
) -> Option<TableRef> {
    let schema_ok = |t: &TableRef, exact: bool| match (&requested.schema, &t.schema) {
        (Some(want), Some(have)) => {
            if exact {
                want == have
            } else {
                want.to_lowercase() == have.to_lowercase()
            }
        }
        _ => true,
    };

    let pick = |candidates: Vec<&TableRef>| -> Option<TableRef> {
        candidates
            .iter()
            .find(|t| requested.schema.is_none() && t.schema.as_deref() == default_schema)
            .or_else(|| candidates.first())
            .map(|t| (*t).clone())
    };

    let exact: Vec<&TableRef> = tables
        .iter()
        .filter(|t| t.name == requested.name && schema_ok(t, true))
        .collect();
    if !exact.is_empty() {
        return pick(exact);
    }

    let wanted = requested.name.to_lowercase();
    let folded: Vec<&TableRef> = tables
        .iter()
        .filter(|t| t.name.to_lowercase() == wanted && schema_ok(t, false))
        .collect();
    pick(folded)
}

/// Schema bound as `$2`/`@P2` in catalog queries.
fn schema_param(table: &TableRef, fallback: &str) -> QueryParam {
    QueryParam::String(table.schema.clone().unwrap_or_else(|| fallback.to_string()))
}

/// Raw catalog facts for one column, before type mapping.
struct RawColumn {
    name: String,
    catalog_type: String,
    char_max_length: Option<i64>,
    numeric_precision: Option<i32>,
    numeric_scale: Option<i32>,
    default: Option<String>,
    is_primary_key: bool,
    is_nullable: bool,
}

impl RawColumn {
    fn describe(self, mapper: &dyn TypeMapper) -> ColumnDescriptor {
        let mut logical = mapper.logical_type(&self.catalog_type);
        let mut char_max_length = self.char_max_length;
        // -1 is how SQL Server reports (max)
        if char_max_length == Some(-1) {
            char_max_length = None;
            if logical == LogicalType::String {
                logical = LogicalType::Text;
            }
        }

        let native_type = if logical == LogicalType::Other {
            self.catalog_type.clone()
        } else {
            mapper
                .native_type(
                    logical,
                    char_max_length,
                    self.numeric_precision,
                    self.numeric_scale,
                )
                .unwrap_or_else(|_| self.catalog_type.clone())
        };

        let default_value = self.default.map(|raw| {
            if logical == LogicalType::Other {
                return raw;
            }
            match mapper.parse_catalog_default(&raw) {
                Some(literal) => mapper
                    .format_default_value(logical, Some(&literal))
                    .unwrap_or(raw),
                None => raw,
            }
        });

        ColumnDescriptor {
            name: self.name,
            logical_type: logical,
            native_type,
            char_max_length,
            numeric_precision: self.numeric_precision,
            numeric_scale: self.numeric_scale,
            default_value,
            is_primary_key: self.is_primary_key,
            is_nullable: self.is_nullable,
        }
    }
}

fn get_i32(row: &Row, key: &str) -> Option<i32> {
    row.get_i64(key).and_then(|v| i32::try_from(v).ok())
}

/// Rebuild a `CREATE TABLE` statement for engines that keep no table DDL.
pub(crate) fn reconstruct_ddl(
    dialect: DatabaseType,
    table: &TableRef,
    columns: &[ColumnDescriptor],
) -> Option<String> {
    if columns.is_empty() {
        return None;
    }

    let mut lines: Vec<String> = columns
        .iter()
        .map(|c| {
            let mut line = format!("    {} {}", dialect.quote_identifier(&c.name), c.native_type);
            if let Some(default) = &c.default_value {
                line.push_str(" DEFAULT ");
                line.push_str(default);
            }
            if !c.is_nullable {
                line.push_str(" NOT NULL");
            }
            line
        })
        .collect();

    let keys: Vec<String> = columns
        .iter()
        .filter(|c| c.is_primary_key)
        .map(|c| dialect.quote_identifier(&c.name))
        .collect();
    if !keys.is_empty() {
        lines.push(format!("    PRIMARY KEY ({})", keys.join(", ")));
    }

    Some(format!(
        "CREATE TABLE {} (\n{}\n)",
        dialect.quote_table(table),
        lines.join(",\n")
    ))
}

/// Parse the `(n)` or `(p, s)` suffix of a declared type.
fn declared_parameters(declared: &str) -> (Option<i64>, Option<i64>) {
    let Some(open) = declared.find('(') else {
        return (None, None);
    };
    let close = declared.rfind(')').unwrap_or(declared.len());
    if close <= open {
        return (None, None);
    }
    let mut args = declared[open + 1..close]
        .split(',')
        .map(|a| a.trim().parse::<i64>().ok());
    (args.next().flatten(), args.next().flatten())
}

fn parse_created(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|ts| ts.and_utc())
}

// =============================================================================
// SQLite
// =============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteMetadataProvider {
    mapper: SqliteTypeMapper,
}

impl SqliteMetadataProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataProvider for SqliteMetadataProvider {
    fn dialect(&self) -> DatabaseType {
        DatabaseType::SQLite
    }

    fn type_mapper(&self) -> &dyn TypeMapper {
        &self.mapper
    }

    async fn list_tables(&self, conn: &mut dyn PhysicalConnection) -> DbResult<Vec<TableRef>> {
        let rows = conn.query(queries::sqlite::LIST_TABLES, &[]).await?;
        let tables: Vec<TableRef> = rows
            .iter()
            .filter_map(|row| row.get_str("name"))
            .map(TableRef::new)
            .collect();
        debug!(count = tables.len(), "Listed SQLite tables");
        Ok(tables)
    }

    async fn fetch_columns(
        &self,
        conn: &mut dyn PhysicalConnection,
        table: &TableRef,
    ) -> DbResult<Vec<ColumnDescriptor>> {
        let rows = conn
            .query(queries::sqlite::TABLE_INFO, &[QueryParam::from(table.name.as_str())])
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let declared = row.get_str("type").unwrap_or_default();
                let logical = self.mapper.logical_type(&declared);
                let (first, second) = declared_parameters(&declared);
                let (char_max_length, numeric_precision, numeric_scale) = match logical {
                    LogicalType::Decimal => (
                        None,
                        first.and_then(|v| i32::try_from(v).ok()),
                        second.and_then(|v| i32::try_from(v).ok()),
                    ),
                    l if l.is_string() => (first, None, None),
                    _ => (None, None, None),
                };

                RawColumn {
                    name: row.get_str("name").unwrap_or_default(),
                    catalog_type: declared,
                    char_max_length,
                    numeric_precision,
                    numeric_scale,
                    default: row.get_str("dflt_value"),
                    is_primary_key: row.get_i64("pk").unwrap_or(0) > 0,
                    is_nullable: !row.get_bool("not_null"),
                }
                .describe(&self.mapper)
            })
            .collect())
    }

    async fn fetch_foreign_keys(
        &self,
        conn: &mut dyn PhysicalConnection,
        table: &TableRef,
    ) -> DbResult<Vec<ForeignKeyDescriptor>> {
        let rows = conn
            .query(queries::sqlite::FOREIGN_KEYS, &[QueryParam::from(table.name.as_str())])
            .await?;

        let mut keys = Vec::with_capacity(rows.len());
        for row in &rows {
            let id = row.get_i64("id").unwrap_or_default();
            let seq = row.get_i64("seq").unwrap_or_default();
            let to_table = row.get_str("to_table").unwrap_or_default();
            // An omitted target column means the referenced primary key
            let to_column = match row.get_str("to_column") {
                Some(column) => column,
                None => {
                    let pk = conn
                        .query(queries::sqlite::PRIMARY_KEY, &[QueryParam::from(to_table.as_str())])
                        .await?;
                    pk.get(seq as usize)
                        .and_then(|r| r.get_str("name"))
                        .unwrap_or_default()
                }
            };
            keys.push(ForeignKeyDescriptor {
                id,
                constraint_name: format!("fk_{}_{}", table.name, id),
                from_column: row.get_str("from_column").unwrap_or_default(),
                to_table,
                to_column,
            });
        }
        Ok(keys)
    }

    async fn fetch_triggers(
        &self,
        conn: &mut dyn PhysicalConnection,
        table: &TableRef,
    ) -> DbResult<Vec<TriggerDescriptor>> {
        let rows = conn
            .query(queries::sqlite::TRIGGERS, &[QueryParam::from(table.name.as_str())])
            .await?;

        Ok(rows
            .iter()
            .map(|row| TriggerDescriptor {
                name: row.get_str("name").unwrap_or_default(),
                schema: Some("main".to_string()),
                catalog: None,
                sql_definition: row.get_str("sql").unwrap_or_default(),
                date_created: None,
            })
            .collect())
    }

    async fn fetch_table_definition(
        &self,
        conn: &mut dyn PhysicalConnection,
        table: &TableRef,
    ) -> DbResult<Option<String>> {
        let rows = conn
            .query(queries::sqlite::TABLE_DDL, &[QueryParam::from(table.name.as_str())])
            .await?;
        Ok(rows.first().and_then(|row| row.get_str("sql")))
    }
}

// =============================================================================
// PostgreSQL
// =============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresMetadataProvider {
    mapper: PostgresTypeMapper,
}

impl PostgresMetadataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn table_params(table: &TableRef) -> [QueryParam; 2] {
        [
            QueryParam::String(table.name.clone()),
            schema_param(table, "public"),
        ]
    }
}

#[async_trait]
impl MetadataProvider for PostgresMetadataProvider {
    fn dialect(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }

    fn type_mapper(&self) -> &dyn TypeMapper {
        &self.mapper
    }

    fn default_schema(&self) -> Option<&'static str> {
        Some("public")
    }

    async fn list_tables(&self, conn: &mut dyn PhysicalConnection) -> DbResult<Vec<TableRef>> {
        let rows = conn.query(queries::postgres::LIST_TABLES, &[]).await?;
        let tables: Vec<TableRef> = rows
            .iter()
            .filter_map(|row| {
                let name = row.get_str("table_name")?;
                Some(match row.get_str("table_schema") {
                    Some(schema) => TableRef::new(name).with_schema(schema),
                    None => TableRef::new(name),
                })
            })
            .collect();
        debug!(count = tables.len(), "Listed PostgreSQL tables");
        Ok(tables)
    }

    async fn fetch_columns(
        &self,
        conn: &mut dyn PhysicalConnection,
        table: &TableRef,
    ) -> DbResult<Vec<ColumnDescriptor>> {
        let rows = conn
            .query(queries::postgres::COLUMNS, &Self::table_params(table))
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let data_type = row.get_str("data_type").unwrap_or_default();
                // Arrays and user-defined types are only named by udt_name
                let catalog_type = match data_type.as_str() {
                    "ARRAY" | "USER-DEFINED" => row.get_str("udt_name").unwrap_or(data_type),
                    _ => data_type,
                };
                RawColumn {
                    name: row.get_str("column_name").unwrap_or_default(),
                    catalog_type,
                    char_max_length: row.get_i64("char_max_length"),
                    numeric_precision: get_i32(row, "numeric_precision"),
                    numeric_scale: get_i32(row, "numeric_scale"),
                    default: row.get_str("column_default"),
                    is_primary_key: row.get_bool("is_primary_key"),
                    is_nullable: row.get_bool("is_nullable"),
                }
                .describe(&self.mapper)
            })
            .collect())
    }

    async fn fetch_foreign_keys(
        &self,
        conn: &mut dyn PhysicalConnection,
        table: &TableRef,
    ) -> DbResult<Vec<ForeignKeyDescriptor>> {
        let rows = conn
            .query(queries::postgres::FOREIGN_KEYS, &Self::table_params(table))
            .await?;
        Ok(rows.iter().map(foreign_key_from_row).collect())
    }

    async fn fetch_triggers(
        &self,
        conn: &mut dyn PhysicalConnection,
        table: &TableRef,
    ) -> DbResult<Vec<TriggerDescriptor>> {
        let rows = conn
            .query(queries::postgres::TRIGGERS, &Self::table_params(table))
            .await?;
        Ok(rows.iter().map(trigger_from_row).collect())
    }

    async fn fetch_table_definition(
        &self,
        conn: &mut dyn PhysicalConnection,
        table: &TableRef,
    ) -> DbResult<Option<String>> {
        let columns = self.fetch_columns(conn, table).await?;
        Ok(reconstruct_ddl(DatabaseType::PostgreSQL, table, &columns))
    }
}

// =============================================================================
// SQL Server
// =============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct SqlServerMetadataProvider {
    mapper: SqlServerTypeMapper,
}

impl SqlServerMetadataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn table_params(table: &TableRef) -> [QueryParam; 2] {
        [
            QueryParam::String(table.name.clone()),
            schema_param(table, "dbo"),
        ]
    }
}

#[async_trait]
impl MetadataProvider for SqlServerMetadataProvider {
    fn dialect(&self) -> DatabaseType {
        DatabaseType::SqlServer
    }

    fn type_mapper(&self) -> &dyn TypeMapper {
        &self.mapper
    }

    fn default_schema(&self) -> Option<&'static str> {
        Some("dbo")
    }

    async fn list_tables(&self, conn: &mut dyn PhysicalConnection) -> DbResult<Vec<TableRef>> {
        let rows = conn.query(queries::mssql::LIST_TABLES, &[]).await?;
        let tables: Vec<TableRef> = rows
            .iter()
            .filter_map(|row| {
                let name = row.get_str("table_name")?;
                Some(match row.get_str("table_schema") {
                    Some(schema) => TableRef::new(name).with_schema(schema),
                    None => TableRef::new(name),
                })
            })
            .collect();
        debug!(count = tables.len(), "Listed SQL Server tables");
        Ok(tables)
    }

    async fn fetch_columns(
        &self,
        conn: &mut dyn PhysicalConnection,
        table: &TableRef,
    ) -> DbResult<Vec<ColumnDescriptor>> {
        let rows = conn
            .query(queries::mssql::COLUMNS, &Self::table_params(table))
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                RawColumn {
                    name: row.get_str("column_name").unwrap_or_default(),
                    catalog_type: row.get_str("data_type").unwrap_or_default(),
                    char_max_length: row.get_i64("char_max_length"),
                    numeric_precision: get_i32(row, "numeric_precision"),
                    numeric_scale: get_i32(row, "numeric_scale"),
                    default: row.get_str("column_default"),
                    is_primary_key: row.get_bool("is_primary_key"),
                    is_nullable: row.get_bool("is_nullable"),
                }
                .describe(&self.mapper)
            })
            .collect())
    }

    async fn fetch_foreign_keys(
        &self,
        conn: &mut dyn PhysicalConnection,
        table: &TableRef,
    ) -> DbResult<Vec<ForeignKeyDescriptor>> {
        let rows = conn
            .query(queries::mssql::FOREIGN_KEYS, &Self::table_params(table))
            .await?;
        Ok(rows.iter().map(foreign_key_from_row).collect())
    }

    async fn fetch_triggers(
        &self,
        conn: &mut dyn PhysicalConnection,
        table: &TableRef,
    ) -> DbResult<Vec<TriggerDescriptor>> {
        let rows = conn
            .query(queries::mssql::TRIGGERS, &Self::table_params(table))
            .await?;
        Ok(rows.iter().map(trigger_from_row).collect())
    }

    /// Tables have no `OBJECT_DEFINITION`, so the DDL is rebuilt from columns.
    async fn fetch_table_definition(
        &self,
        conn: &mut dyn PhysicalConnection,
        table: &TableRef,
    ) -> DbResult<Option<String>> {
        let columns = self.fetch_columns(conn, table).await?;
        Ok(reconstruct_ddl(DatabaseType::SqlServer, table, &columns))
    }
}

fn foreign_key_from_row(row: &Row) -> ForeignKeyDescriptor {
    ForeignKeyDescriptor {
        id: row.get_i64("id").unwrap_or_default(),
        constraint_name: row.get_str("constraint_name").unwrap_or_default(),
        from_column: row.get_str("from_column").unwrap_or_default(),
        to_table: row.get_str("to_table").unwrap_or_default(),
        to_column: row.get_str("to_column").unwrap_or_default(),
    }
}

fn trigger_from_row(row: &Row) -> TriggerDescriptor {
    TriggerDescriptor {
        name: row.get_str("name").unwrap_or_default(),
        schema: row.get_str("schema_name"),
        catalog: row.get_str("catalog_name"),
        sql_definition: row.get_str("sql_definition").unwrap_or_default(),
        date_created: row
            .get_str("date_created")
            .and_then(|raw| parse_created(&raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unquote_identifier() {
        assert_eq!(unquote_identifier("\"TestModels\""), "TestModels");
        assert_eq!(unquote_identifier("[TestModels]"), "TestModels");
        assert_eq!(unquote_identifier("`TestModels`"), "TestModels");
        assert_eq!(unquote_identifier("\"a\"\"b\""), "a\"b");
        assert_eq!(unquote_identifier("[a]]b]"), "a]b");
        assert_eq!(unquote_identifier("plain"), "plain");
        assert_eq!(unquote_identifier("\"unbalanced"), "\"unbalanced");
        assert_eq!(unquote_identifier("x"), "x");
    }

    #[test]
    fn test_parse_table_name() {
        assert_eq!(parse_table_name("orders").unwrap(), TableRef::new("orders"));
        assert_eq!(
            parse_table_name("dbo.orders").unwrap(),
            TableRef::new("orders").with_schema("dbo")
        );
        assert_eq!(
            parse_table_name("[my.schema].[odd.name]").unwrap(),
            TableRef::new("odd.name").with_schema("my.schema")
        );
        assert!(matches!(
            parse_table_name("   ").unwrap_err(),
            DbError::Configuration { .. }
        ));
        assert!(matches!(
            parse_table_name("dbo.").unwrap_err(),
            DbError::Configuration { .. }
        ));
    }

    #[test]
    fn test_match_table_exact_then_case_insensitive() {
        let tables = vec![TableRef::new("TestModels"), TableRef::new("testmodels_audit")];
        for spelling in ["TestModels", "\"TestModels\"", "testmodels", "TESTMODELS"] {
            let requested = parse_table_name(spelling).unwrap();
            assert_eq!(
                match_table(&tables, &requested, None),
                Some(TableRef::new("TestModels")),
                "spelling {}",
                spelling
            );
        }
        let requested = parse_table_name("missing").unwrap();
        assert_eq!(match_table(&tables, &requested, None), None);
    }

    #[test]
    fn test_match_table_prefers_exact_case() {
        let tables = vec![TableRef::new("Item"), TableRef::new("item")];
        let requested = parse_table_name("item").unwrap();
        assert_eq!(
            match_table(&tables, &requested, None),
            Some(TableRef::new("item"))
        );
    }

    #[test]
    fn test_match_table_default_schema() {
        let tables = vec![
            TableRef::new("orders").with_schema("archive"),
            TableRef::new("orders").with_schema("public"),
        ];
        let requested = parse_table_name("Orders").unwrap();
        assert_eq!(
            match_table(&tables, &requested, Some("public")),
            Some(TableRef::new("orders").with_schema("public"))
        );
        let requested = parse_table_name("ARCHIVE.orders").unwrap();
        assert_eq!(
            match_table(&tables, &requested, Some("public")),
            Some(TableRef::new("orders").with_schema("archive"))
        );
    }

    #[test]
    fn test_declared_parameters() {
        assert_eq!(declared_parameters("varchar(50)"), (Some(50), None));
        assert_eq!(declared_parameters("NUMERIC(10, 2)"), (Some(10), Some(2)));
        assert_eq!(declared_parameters("integer"), (None, None));
    }

    #[test]
    fn test_describe_maps_types_and_defaults() {
        let column = RawColumn {
            name: "Title".to_string(),
            catalog_type: "nvarchar".to_string(),
            char_max_length: Some(-1),
            numeric_precision: None,
            numeric_scale: None,
            default: Some("(N'it''s')".to_string()),
            is_primary_key: false,
            is_nullable: true,
        }
        .describe(&SqlServerTypeMapper);
        assert_eq!(column.logical_type, LogicalType::Text);
        assert_eq!(column.native_type, "nvarchar(max)");
        assert_eq!(column.char_max_length, None);
        assert_eq!(column.default_value.as_deref(), Some("N'it''s'"));

        let column = RawColumn {
            name: "Tags".to_string(),
            catalog_type: "_text".to_string(),
            char_max_length: None,
            numeric_precision: None,
            numeric_scale: None,
            default: Some("'{}'::text[]".to_string()),
            is_primary_key: false,
            is_nullable: true,
        }
        .describe(&PostgresTypeMapper);
        assert_eq!(column.logical_type, LogicalType::Other);
        assert_eq!(column.native_type, "_text");
        assert_eq!(column.default_value.as_deref(), Some("'{}'::text[]"));
    }

    #[test]
    fn test_reconstruct_ddl() {
        let columns = vec![
            ColumnDescriptor {
                name: "Id".to_string(),
                logical_type: LogicalType::Int,
                native_type: "int".to_string(),
                char_max_length: None,
                numeric_precision: Some(10),
                numeric_scale: Some(0),
                default_value: None,
                is_primary_key: true,
                is_nullable: false,
            },
            ColumnDescriptor {
                name: "Active".to_string(),
                logical_type: LogicalType::Boolean,
                native_type: "bit".to_string(),
                char_max_length: None,
                numeric_precision: None,
                numeric_scale: None,
                default_value: Some("1".to_string()),
                is_primary_key: false,
                is_nullable: true,
            },
        ];
        let table = TableRef::new("Flags").with_schema("dbo");
        assert_eq!(
            reconstruct_ddl(DatabaseType::SqlServer, &table, &columns).unwrap(),
            "CREATE TABLE [dbo].[Flags] (\n    [Id] int NOT NULL,\n    [Active] bit DEFAULT 1,\n    PRIMARY KEY ([Id])\n)"
        );
        assert_eq!(reconstruct_ddl(DatabaseType::SqlServer, &table, &[]), None);
    }

    #[test]
    fn test_parse_created() {
        assert!(parse_created("2024-05-01 10:20:30.123").is_some());
        assert!(parse_created("2024-05-01T10:20:30Z").is_some());
        assert!(parse_created("yesterday").is_none());
    }
}
