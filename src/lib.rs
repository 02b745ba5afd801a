//! crossdb library
//!
//! One connection, query and introspection API over SQLite, PostgreSQL and
//! SQL Server. The async [`ConnectionHandle`] is the entry point;
//! [`blocking`] wraps it for synchronous callers.

pub mod blocking;
pub mod config;
pub mod connection_string;
pub mod db;
pub mod dialect;
pub mod error;
pub mod models;

pub use db::{AsyncForeachIterator, ConnectionHandle};
pub use dialect::{PaginationRequest, TypeMapper};
pub use error::{DbError, DbResult};
pub use models::DatabaseType;
