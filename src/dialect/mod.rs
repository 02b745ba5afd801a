//! Per-dialect SQL shaping.
//!
//! Everything here is pure: identifier quoting, placeholders, the type mapper
//! and the pagination planner. The capability pair a handle needs is picked
//! once from the [`DatabaseType`] tag.

pub mod pagination;
pub mod types;

use std::sync::Arc;

use crate::db::schema::{
    MetadataProvider, PostgresMetadataProvider, SqlServerMetadataProvider, SqliteMetadataProvider,
};
use crate::models::{DatabaseType, TableRef};

pub use pagination::{PagePlan, PagePosition, PaginationMode, PaginationPlanner, PaginationRequest};
pub use types::{
    PostgresTypeMapper, Rendering, SqlLiteral, SqlServerTypeMapper, SqliteTypeMapper, TypeMapper,
};

impl DatabaseType {
    /// Quote an identifier, doubling the closing quote character inside it.
    pub fn quote_identifier(&self, name: &str) -> String {
        match self {
            Self::SqlServer => format!("[{}]", name.replace(']', "]]")),
            Self::SQLite | Self::PostgreSQL => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    /// Quote a possibly schema-qualified table.
    pub fn quote_table(&self, table: &TableRef) -> String {
        match &table.schema {
            Some(schema) => format!(
                "{}.{}",
                self.quote_identifier(schema),
                self.quote_identifier(&table.name)
            ),
            None => self.quote_identifier(&table.name),
        }
    }

    /// Bind placeholder for the 1-based parameter `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Self::SQLite => format!("?{}", index),
            Self::PostgreSQL => format!("${}", index),
            Self::SqlServer => format!("@P{}", index),
        }
    }

    pub fn type_mapper(&self) -> Arc<dyn TypeMapper> {
        match self {
            Self::SQLite => Arc::new(SqliteTypeMapper),
            Self::PostgreSQL => Arc::new(PostgresTypeMapper),
            Self::SqlServer => Arc::new(SqlServerTypeMapper),
        }
    }

    pub fn metadata_provider(&self) -> Arc<dyn MetadataProvider> {
        match self {
            Self::SQLite => Arc::new(SqliteMetadataProvider::new()),
            Self::PostgreSQL => Arc::new(PostgresMetadataProvider::new()),
            Self::SqlServer => Arc::new(SqlServerMetadataProvider::new()),
        }
    }

    pub fn pagination_planner(&self) -> PaginationPlanner {
        PaginationPlanner::new(*self)
    }
}
