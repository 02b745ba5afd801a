//! Connection handle and its transaction state machine.
//!
//! A [`ConnectionHandle`] owns at most one physical connection and at most
//! one open transaction on it:
//!
//! ```text
//! Closed --open--> Open --begin_transaction--> InTransaction
//!   ^               |  ^                            |
//!   +----close------+  +-------commit/rollback------+
//! ```
//!
//! Data and metadata operations also work on a closed handle. They open an
//! ephemeral connection, run, and close it again without changing the
//! handle's declared state.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::connection_string::{self, mask_connection_string, validate_database_name};
use crate::db::driver::{NativeDriver, PhysicalConnection, close_quietly, open_driver};
use crate::db::foreach::AsyncForeachIterator;
use crate::db::macros::with_connection;
use crate::db::schema::{MetadataProvider, require_table_name};
use crate::dialect::{PaginationRequest, TypeMapper};
use crate::error::{DbError, DbResult};
use crate::models::{
    ColumnDescriptor, ConnectionInfo, ConnectionState, DatabaseType, ForeignKeyDescriptor,
    QueryParam, Row, TableRef, TransactionInfo, TriggerDescriptor,
};

/// One logical connection to a database of a fixed dialect.
pub struct ConnectionHandle {
    connection_string: String,
    dialect: DatabaseType,
    driver: Arc<dyn NativeDriver>,
    connection: Option<Box<dyn PhysicalConnection>>,
    transaction: Option<TransactionInfo>,
    type_mapper: Arc<dyn TypeMapper>,
    metadata: Arc<dyn MetadataProvider>,
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("dialect", &self.dialect)
            .field(
                "connection_string",
                &mask_connection_string(&self.connection_string),
            )
            .field("state", &self.state())
            .field("transaction", &self.transaction)
            .finish()
    }
}

impl ConnectionHandle {
    /// Create a closed handle using the stock driver for `dialect`.
    pub fn new(dialect: DatabaseType, connection_string: impl Into<String>) -> Self {
        Self::with_driver(open_driver(dialect), connection_string)
    }

    /// Create a closed handle over a caller-supplied driver.
    pub fn with_driver(driver: Arc<dyn NativeDriver>, connection_string: impl Into<String>) -> Self {
        let dialect = driver.dialect();
        Self {
            connection_string: connection_string.into(),
            dialect,
            driver,
            connection: None,
            transaction: None,
            type_mapper: dialect.type_mapper(),
            metadata: dialect.metadata_provider(),
        }
    }

    /// Create a closed handle, inferring the dialect from the string.
    pub fn from_connection_string(connection_string: impl Into<String>) -> DbResult<Self> {
        let connection_string = connection_string.into();
        let dialect = DatabaseType::from_connection_string(&connection_string).ok_or_else(|| {
            DbError::configuration(format!(
                "Cannot determine database type from '{}'",
                mask_connection_string(&connection_string)
            ))
        })?;
        Ok(Self::new(dialect, connection_string))
    }

    pub fn dialect(&self) -> DatabaseType {
        self.dialect
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    pub fn type_mapper(&self) -> &dyn TypeMapper {
        self.type_mapper.as_ref()
    }

    pub fn metadata_provider(&self) -> &dyn MetadataProvider {
        self.metadata.as_ref()
    }

    pub fn state(&self) -> ConnectionState {
        match (&self.connection, &self.transaction) {
            (None, _) => ConnectionState::Closed,
            (Some(_), None) => ConnectionState::Open,
            (Some(_), Some(_)) => ConnectionState::InTransaction,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    pub fn transaction(&self) -> Option<&TransactionInfo> {
        self.transaction.as_ref()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Acquire the physical connection. A no-op when already open.
    pub async fn open(&mut self) -> DbResult<&mut Self> {
        if self.connection.is_some() {
            debug!(dialect = %self.dialect, "Connection already open");
            return Ok(self);
        }
        if self.connection_string.trim().is_empty() {
            return Err(DbError::configuration("connection string must not be empty"));
        }

        let conn = self.driver.open(&self.connection_string).await?;
        self.connection = Some(conn);

        info!(
            dialect = %self.dialect,
            connection = %mask_connection_string(&self.connection_string),
            "Connection opened"
        );
        Ok(self)
    }

    /// Roll back any open transaction and release the connection. Never fails.
    pub async fn close(&mut self) -> &mut Self {
        let Some(mut conn) = self.connection.take() else {
            self.transaction = None;
            return self;
        };

        if let Some(tx) = self.transaction.take() {
            if let Err(e) = conn.rollback().await {
                warn!(
                    transaction_id = %tx.id,
                    error = %e,
                    "Failed to roll back transaction while closing"
                );
            } else {
                info!(transaction_id = %tx.id, "Transaction rolled back on close");
            }
        }

        close_quietly(conn).await;
        info!(dialect = %self.dialect, "Connection closed");
        self
    }

    pub async fn begin_transaction(&mut self) -> DbResult<&mut Self> {
        if self.transaction.is_some() {
            return Err(DbError::transaction_state("a transaction is already open"));
        }
        let conn = self.connection.as_deref_mut().ok_or_else(|| {
            DbError::transaction_state("cannot begin a transaction on a closed connection")
        })?;

        conn.begin().await?;
        let tx = TransactionInfo::start();
        info!(transaction_id = %tx.id, dialect = %self.dialect, "Transaction started");
        self.transaction = Some(tx);
        Ok(self)
    }

    /// Commit the open transaction. The marker is cleared even when the
    /// engine rejects the commit, since the engine ends the transaction too.
    pub async fn commit(&mut self) -> DbResult<&mut Self> {
        let (conn, tx) = self.active_transaction("commit")?;
        let result = conn.commit().await;
        self.transaction = None;
        result?;
        info!(transaction_id = %tx.id, elapsed_secs = tx.elapsed_secs(), "Transaction committed");
        Ok(self)
    }

    pub async fn rollback(&mut self) -> DbResult<&mut Self> {
        let (conn, tx) = self.active_transaction("roll back")?;
        let result = conn.rollback().await;
        self.transaction = None;
        result?;
        info!(transaction_id = %tx.id, "Transaction rolled back");
        Ok(self)
    }

    fn active_transaction(
        &mut self,
        action: &str,
    ) -> DbResult<(&mut dyn PhysicalConnection, TransactionInfo)> {
        match (self.connection.as_deref_mut(), &self.transaction) {
            (Some(conn), Some(tx)) => Ok((conn, tx.clone())),
            _ => Err(DbError::transaction_state(format!(
                "cannot {} without an open transaction",
                action
            ))),
        }
    }

    // =========================================================================
    // Data
    // =========================================================================

    /// Run a statement, returning the affected row count.
    pub async fn execute(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<u64> {
        with_connection!(self, |conn| conn.execute(sql, params).await)
    }

    pub async fn query(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<Vec<Row>> {
        with_connection!(self, |conn| conn.query(sql, params).await)
    }

    pub async fn query_first(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<Option<Row>> {
        Ok(self.query(sql, params).await?.into_iter().next())
    }

    /// First column of the first row.
    pub async fn query_scalar(
        &mut self,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<Option<JsonValue>> {
        Ok(self
            .query_first(sql, params)
            .await?
            .and_then(|row| row.into_iter().next().map(|(_, value)| value)))
    }

    /// One page of `SELECT *` from a table. A missing table gives no rows.
    pub async fn query_page(
        &mut self,
        table: &str,
        request: &PaginationRequest,
    ) -> DbResult<Vec<Row>> {
        require_table_name(table)?;
        let metadata = Arc::clone(&self.metadata);
        with_connection!(self, |conn| select_page(metadata.as_ref(), conn, table, request).await)
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    pub async fn tables(&mut self) -> DbResult<Vec<TableRef>> {
        let metadata = Arc::clone(&self.metadata);
        with_connection!(self, |conn| metadata.list_tables(conn).await)
    }

    pub async fn columns(&mut self, table: &str) -> DbResult<Vec<ColumnDescriptor>> {
        require_table_name(table)?;
        let metadata = Arc::clone(&self.metadata);
        with_connection!(self, |conn| metadata.columns(conn, table).await)
    }

    pub async fn foreign_keys(&mut self, table: &str) -> DbResult<Vec<ForeignKeyDescriptor>> {
        require_table_name(table)?;
        let metadata = Arc::clone(&self.metadata);
        with_connection!(self, |conn| metadata.foreign_keys(conn, table).await)
    }

    pub async fn triggers(&mut self, table: &str) -> DbResult<Vec<TriggerDescriptor>> {
        require_table_name(table)?;
        let metadata = Arc::clone(&self.metadata);
        with_connection!(self, |conn| metadata.triggers(conn, table).await)
    }

    /// DDL of the table, or `None` when it does not exist.
    pub async fn table_definition(&mut self, table: &str) -> DbResult<Option<String>> {
        require_table_name(table)?;
        let metadata = Arc::clone(&self.metadata);
        with_connection!(self, |conn| metadata.table_definition(conn, table).await)
    }

    /// Batch metadata and data calls over several tables. Requires an open handle.
    pub fn foreach<I, S>(&mut self, tables: I) -> DbResult<AsyncForeachIterator<'_>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AsyncForeachIterator::new(self, tables)
    }

    // =========================================================================
    // Database
    // =========================================================================

    /// Database named by the connection string.
    pub fn database_name(&self) -> Option<String> {
        connection_string::database_name(self.dialect, &self.connection_string)
    }

    /// Point the handle at another database, reopening if it was open.
    pub async fn change_database(&mut self, name: &str) -> DbResult<&mut Self> {
        if self.transaction.is_some() {
            return Err(DbError::transaction_state(
                "cannot change database while a transaction is open",
            ));
        }
        let rewritten = connection_string::with_database(self.dialect, &self.connection_string, name)?;

        let was_open = self.is_connected();
        if was_open {
            self.close().await;
        }
        self.connection_string = rewritten;
        info!(dialect = %self.dialect, database = %name, "Database changed");

        if was_open {
            self.open().await?;
        }
        Ok(self)
    }

    /// Create a database on the same server (or a sibling SQLite file).
    pub async fn create_database(&mut self, name: &str) -> DbResult<()> {
        validate_database_name(name)?;
        match self.dialect {
            DatabaseType::SQLite => {
                let target =
                    connection_string::with_database(self.dialect, &self.connection_string, name)?;
                let conn = self.driver.open(&target).await?;
                close_quietly(conn).await;
            }
            DatabaseType::PostgreSQL | DatabaseType::SqlServer => {
                if self.transaction.is_some() {
                    return Err(DbError::transaction_state(
                        "CREATE DATABASE cannot run inside a transaction",
                    ));
                }
                let sql = format!("CREATE DATABASE {}", self.dialect.quote_identifier(name));
                self.execute(&sql, &[]).await?;
            }
        }
        info!(dialect = %self.dialect, database = %name, "Database created");
        Ok(())
    }

    pub async fn server_version(&mut self) -> DbResult<Option<String>> {
        with_connection!(self, |conn| conn.server_version().await)
    }

    /// Summary for display, with credentials masked.
    pub async fn info(&mut self) -> DbResult<ConnectionInfo> {
        let server_version = self.server_version().await?;
        Ok(ConnectionInfo {
            database_type: self.dialect,
            connection_string: mask_connection_string(&self.connection_string),
            database: self.database_name(),
            server_version,
            state: self.state(),
        })
    }
}

async fn select_page(
    metadata: &dyn MetadataProvider,
    conn: &mut dyn PhysicalConnection,
    table: &str,
    request: &PaginationRequest,
) -> DbResult<Vec<Row>> {
    let Some(resolved) = metadata.resolve_table(conn, table).await? else {
        return Ok(Vec::new());
    };
    let dialect = metadata.dialect();
    let quoted = dialect.quote_table(&resolved);
    let plan = dialect.pagination_planner().plan(request, &quoted)?;
    let sql = format!("SELECT * FROM {}{}", quoted, plan.fragment());
    conn.query(&sql, &plan.params).await
}
