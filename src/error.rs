//! Error types for crossdb.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Validation errors (`Configuration`, `DatabaseName`, `TransactionState`,
//! `InvalidState`, `UnsupportedType`) are raised before any native driver is
//! touched. Driver-originated failures keep a stable outer message and carry the
//! native error as `source()`, so callers can match on the variant or walk down to
//! the root cause.

use std::error::Error as StdError;
use thiserror::Error;

/// Boxed native driver error kept as the cause of a wrapped failure.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid connection parameters: {message}")]
    ConnectParams {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Invalid database name '{name}': {reason}")]
    DatabaseName { name: String, reason: String },

    #[error("Transaction state error: {message}")]
    TransactionState { message: String },

    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    #[error("Unsupported type: {logical_type} has no mapping for {dialect}")]
    UnsupportedType {
        logical_type: String,
        dialect: String,
    },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl DbError {
    /// Create a configuration error (empty connection string, table or column name).
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a connection parameter error wrapping the native driver error.
    pub fn connect_params(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::ConnectParams {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a connection parameter error with no underlying cause.
    pub fn connect_params_msg(message: impl Into<String>) -> Self {
        Self::ConnectParams {
            message: message.into(),
            source: None,
        }
    }

    /// Create a database name error.
    pub fn database_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DatabaseName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a transaction state error.
    pub fn transaction_state(message: impl Into<String>) -> Self {
        Self::TransactionState {
            message: message.into(),
        }
    }

    /// Create an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create an unsupported type error.
    pub fn unsupported_type(logical_type: impl ToString, dialect: impl ToString) -> Self {
        Self::UnsupportedType {
            logical_type: logical_type.to_string(),
            dialect: dialect.to_string(),
        }
    }

    /// Create a database error wrapping a driver failure.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            source: Some(Box::new(source)),
        }
    }

    /// Create a database error with no underlying cause.
    pub fn database_msg(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            sql_state: None,
            source: None,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// The SQLSTATE (or native error number) reported by the driver, if any.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Database { sql_state, .. } => sql_state.as_deref(),
            _ => None,
        }
    }

    /// Check if this error is transient. Nothing in crossdb retries on its own;
    /// this only informs the caller's retry policy.
    ///
    /// Only connection failures with a native cause qualify, and not when that
    /// cause is a malformed connection string.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectParams {
                source: Some(source),
                ..
            } => !is_malformed_config(source.as_ref()),
            _ => false,
        }
    }

    /// Check if this error was raised by validation before reaching the driver.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. }
                | Self::DatabaseName { .. }
                | Self::TransactionState { .. }
                | Self::InvalidState { .. }
                | Self::UnsupportedType { .. }
                | Self::InvalidInput { .. }
        )
    }
}

/// A cause that fails the same way on every attempt.
fn is_malformed_config(source: &(dyn StdError + Send + Sync + 'static)) -> bool {
    if let Some(err) = source.downcast_ref::<sqlx::Error>() {
        return matches!(err, sqlx::Error::Configuration(_));
    }
    if let Some(err) = source.downcast_ref::<tiberius::error::Error>() {
        return !matches!(
            err,
            tiberius::error::Error::Io { .. }
                | tiberius::error::Error::Tls(_)
                | tiberius::error::Error::Routing { .. }
        );
    }
    source.is::<url::ParseError>()
}

/// Convert sqlx errors to DbError.
///
/// Connection-level failures become `ConnectParams`, everything else becomes
/// `Database`. The sqlx error is kept as the source in both cases.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(_) => {
                DbError::connect_params("Malformed connection string", err)
            }
            sqlx::Error::Io(_) => DbError::connect_params("Database endpoint unreachable", err),
            sqlx::Error::Tls(_) => DbError::connect_params("TLS negotiation failed", err),
            sqlx::Error::Protocol(_) => DbError::connect_params("Protocol error", err),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                DbError::connect_params("Connection unavailable", err)
            }
            sqlx::Error::Database(ref db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                let message = db_err.message().to_string();
                DbError::database(message, code, err)
            }
            sqlx::Error::RowNotFound => DbError::database("No rows returned", None, err),
            sqlx::Error::ColumnNotFound(_) | sqlx::Error::ColumnIndexOutOfBounds { .. } => {
                DbError::database("Column lookup failed", None, err)
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DbError::database("Failed to decode value", None, err)
            }
            _ => DbError::database("Driver error", None, err),
        }
    }
}

/// Convert tiberius (SQL Server) errors to DbError.
impl From<tiberius::error::Error> for DbError {
    fn from(err: tiberius::error::Error) -> Self {
        match err {
            tiberius::error::Error::Io { .. } => {
                DbError::connect_params("Database endpoint unreachable", err)
            }
            tiberius::error::Error::Tls(_) => DbError::connect_params("TLS negotiation failed", err),
            tiberius::error::Error::Routing { .. } => {
                DbError::connect_params("Server requested connection routing", err)
            }
            tiberius::error::Error::Server(ref token) => {
                let code = Some(token.code().to_string());
                let message = token.message().to_string();
                DbError::database(message, code, err)
            }
            tiberius::error::Error::Conversion(_) => {
                DbError::database("Failed to convert value", None, err)
            }
            _ => DbError::database("Driver error", None, err),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
