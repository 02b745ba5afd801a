//! Data models for crossdb.
//!
//! This module re-exports all model types used throughout the library.

pub mod connection;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use connection::{ConnectionInfo, ConnectionState, DatabaseType, TransactionInfo};
pub use query::{QueryParam, Row};
pub use schema::{
    ColumnDescriptor, ForeignKeyDescriptor, LogicalType, MetadataMap, TableMetadata, TableRef,
    TriggerDescriptor,
};
