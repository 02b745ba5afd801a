//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - The connection handle and its transaction state machine
//! - The native driver contract and its sqlx / tiberius implementations
//! - Schema introspection through per-dialect metadata providers
//! - Batched metadata iteration over several tables
//! - Parameter binding and row decoding

pub mod connection;
pub mod driver;
pub mod foreach;
mod macros;
pub mod params;
pub mod schema;
pub mod types;

pub use connection::ConnectionHandle;
pub use driver::{NativeDriver, PhysicalConnection, open_driver};
pub use foreach::{AsyncForeachIterator, ForeachOperation, ForeachPhase};
pub use schema::{
    MetadataProvider, PostgresMetadataProvider, SqlServerMetadataProvider, SqliteMetadataProvider,
};
pub use types::RowToJson;
