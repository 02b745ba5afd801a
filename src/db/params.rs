//! Parameter binding utilities for database queries.
//!
//! This module provides functions to bind `QueryParam` values to
//! dialect-specific query objects. Placeholders in the SQL text are the
//! caller's responsibility (`?` for SQLite, `$n` for PostgreSQL, `@Pn` for
//! SQL Server); see [`DatabaseType::placeholder`](crate::models::DatabaseType::placeholder).

use crate::models::QueryParam;
use sqlx::postgres::PgArguments;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Postgres, Sqlite};

/// Bind a parameter to a PostgreSQL query.
pub(crate) fn bind_postgres_param<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Bytes(v) => query.bind(v.as_slice()),
    }
}

/// Bind a parameter to a SQLite query.
pub(crate) fn bind_sqlite_param<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Bytes(v) => query.bind(v.as_slice()),
    }
}

/// Bind a parameter to a SQL Server query.
pub(crate) fn bind_mssql_param<'q>(query: &mut tiberius::Query<'q>, param: &'q QueryParam) {
    match param {
        QueryParam::Null => query.bind(None::<&str>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Bytes(v) => query.bind(v.as_slice()),
    }
}

/// Render parameters for debug logging without dumping binary payloads.
pub(crate) fn describe_params(params: &[QueryParam]) -> String {
    let parts: Vec<String> = params
        .iter()
        .map(|p| match p {
            QueryParam::Bytes(b) => format!("bytes[{}]", b.len()),
            QueryParam::String(s) if s.len() > 64 => format!("string[{}]", s.len()),
            other => format!("{:?}", other),
        })
        .collect();
    format!("[{}]", parts.join(", "))
}
