//! Connection-related data models.
//!
//! This module defines the dialect tag and the observable handle state.

use serde::{Deserialize, Serialize};

/// Supported database dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// File-embedded
    SQLite,
    PostgreSQL,
    /// Microsoft SQL Server, reached over TDS
    SqlServer,
}

impl DatabaseType {
    /// Infer the dialect from a connection string.
    ///
    /// URL schemes are checked first. ADO-style strings (`Server=...;Database=...`)
    /// are treated as SQL Server.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.trim().to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if lower.starts_with("sqlite://") || lower.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else if lower.starts_with("mssql://") || lower.starts_with("sqlserver://") {
            Some(Self::SqlServer)
        } else if lower.starts_with("server=")
            || lower.starts_with("data source=")
            || lower.contains(";server=")
            || lower.contains(";data source=")
        {
            Some(Self::SqlServer)
        } else if lower.ends_with(".db") || lower.ends_with(".sqlite") || lower == ":memory:" {
            Some(Self::SQLite)
        } else {
            None
        }
    }

    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::SQLite => "SQLite",
            Self::PostgreSQL => "PostgreSQL",
            Self::SqlServer => "SQL Server",
        }
    }

    /// Get the default port for this database type.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::SQLite => None,
            Self::PostgreSQL => Some(5432),
            Self::SqlServer => Some(1433),
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Observable state of a connection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Closed,
    Open,
    InTransaction,
}

impl ConnectionState {
    /// Check if a physical connection is held.
    pub fn is_connected(&self) -> bool {
        !matches!(self, Self::Closed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::InTransaction => "in_transaction",
        };
        f.write_str(s)
    }
}

/// Marker for the transaction currently open on a handle.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionInfo {
    pub id: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl TransactionInfo {
    pub(crate) fn start() -> Self {
        Self {
            id: format!("tx_{}", uuid::Uuid::new_v4().simple()),
            started_at: chrono::Utc::now(),
        }
    }

    /// Seconds elapsed since the transaction began.
    pub fn elapsed_secs(&self) -> i64 {
        chrono::Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
    }
}

/// Summary of a handle, returned by the CLI `inspect` command.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub database_type: DatabaseType,
    /// Credentials masked
    pub connection_string: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
    pub state: ConnectionState,
}
