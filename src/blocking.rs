//! Synchronous facade over the async API.
//!
//! Each [`ConnectionHandle`] owns a current-thread tokio runtime and drives
//! the async handle on it. Values come back directly instead of as futures.
//!
//! Do not use these types from inside an async context: blocking on the
//! owned runtime from a runtime worker panics.

use serde_json::Value as JsonValue;
use tokio::runtime::{Builder, Runtime};

use crate::db::connection::ConnectionHandle as AsyncConnectionHandle;
use crate::db::driver::NativeDriver;
use crate::db::foreach::{AsyncForeachIterator, ForeachOperation, ForeachPhase};
use crate::dialect::{PaginationRequest, TypeMapper};
use crate::error::{DbError, DbResult};
use crate::models::{
    ColumnDescriptor, ConnectionInfo, ConnectionState, DatabaseType, ForeignKeyDescriptor,
    MetadataMap, QueryParam, Row, TableRef, TriggerDescriptor,
};
use std::sync::Arc;

fn build_runtime() -> DbResult<Runtime> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| DbError::configuration(format!("Failed to start runtime: {}", e)))
}

pub struct ConnectionHandle {
    inner: AsyncConnectionHandle,
    runtime: Runtime,
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.inner, f)
    }
}

impl ConnectionHandle {
    pub fn new(dialect: DatabaseType, connection_string: impl Into<String>) -> DbResult<Self> {
        Self::wrap(AsyncConnectionHandle::new(dialect, connection_string))
    }

    pub fn with_driver(
        driver: Arc<dyn NativeDriver>,
        connection_string: impl Into<String>,
    ) -> DbResult<Self> {
        Self::wrap(AsyncConnectionHandle::with_driver(driver, connection_string))
    }

    pub fn from_connection_string(connection_string: impl Into<String>) -> DbResult<Self> {
        Self::wrap(AsyncConnectionHandle::from_connection_string(
            connection_string,
        )?)
    }

    /// Take over an async handle.
    pub fn wrap(inner: AsyncConnectionHandle) -> DbResult<Self> {
        Ok(Self {
            inner,
            runtime: build_runtime()?,
        })
    }

    pub fn into_inner(self) -> AsyncConnectionHandle {
        self.inner
    }

    pub fn dialect(&self) -> DatabaseType {
        self.inner.dialect()
    }

    pub fn connection_string(&self) -> &str {
        self.inner.connection_string()
    }

    pub fn type_mapper(&self) -> &dyn TypeMapper {
        self.inner.type_mapper()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    pub fn in_transaction(&self) -> bool {
        self.inner.in_transaction()
    }

    pub fn open(&mut self) -> DbResult<&mut Self> {
        self.runtime.block_on(self.inner.open())?;
        Ok(self)
    }

    pub fn close(&mut self) -> &mut Self {
        self.runtime.block_on(self.inner.close());
        self
    }

    pub fn begin_transaction(&mut self) -> DbResult<&mut Self> {
        self.runtime.block_on(self.inner.begin_transaction())?;
        Ok(self)
    }

    pub fn commit(&mut self) -> DbResult<&mut Self> {
        self.runtime.block_on(self.inner.commit())?;
        Ok(self)
    }

    pub fn rollback(&mut self) -> DbResult<&mut Self> {
        self.runtime.block_on(self.inner.rollback())?;
        Ok(self)
    }

    pub fn execute(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<u64> {
        self.runtime.block_on(self.inner.execute(sql, params))
    }

    pub fn query(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<Vec<Row>> {
        self.runtime.block_on(self.inner.query(sql, params))
    }

    pub fn query_first(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<Option<Row>> {
        self.runtime.block_on(self.inner.query_first(sql, params))
    }

    pub fn query_scalar(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<Option<JsonValue>> {
        self.runtime.block_on(self.inner.query_scalar(sql, params))
    }

    pub fn query_page(&mut self, table: &str, request: &PaginationRequest) -> DbResult<Vec<Row>> {
        self.runtime.block_on(self.inner.query_page(table, request))
    }

    pub fn tables(&mut self) -> DbResult<Vec<TableRef>> {
        self.runtime.block_on(self.inner.tables())
    }

    pub fn columns(&mut self, table: &str) -> DbResult<Vec<ColumnDescriptor>> {
        self.runtime.block_on(self.inner.columns(table))
    }

    pub fn foreign_keys(&mut self, table: &str) -> DbResult<Vec<ForeignKeyDescriptor>> {
        self.runtime.block_on(self.inner.foreign_keys(table))
    }

    pub fn triggers(&mut self, table: &str) -> DbResult<Vec<TriggerDescriptor>> {
        self.runtime.block_on(self.inner.triggers(table))
    }

    pub fn table_definition(&mut self, table: &str) -> DbResult<Option<String>> {
        self.runtime.block_on(self.inner.table_definition(table))
    }

    pub fn database_name(&self) -> Option<String> {
        self.inner.database_name()
    }

    pub fn change_database(&mut self, name: &str) -> DbResult<&mut Self> {
        self.runtime.block_on(self.inner.change_database(name))?;
        Ok(self)
    }

    pub fn create_database(&mut self, name: &str) -> DbResult<()> {
        self.runtime.block_on(self.inner.create_database(name))
    }

    pub fn server_version(&mut self) -> DbResult<Option<String>> {
        self.runtime.block_on(self.inner.server_version())
    }

    pub fn info(&mut self) -> DbResult<ConnectionInfo> {
        self.runtime.block_on(self.inner.info())
    }

    pub fn foreach<I, S>(&mut self, tables: I) -> DbResult<ForeachIterator<'_>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(ForeachIterator {
            inner: AsyncForeachIterator::new(&mut self.inner, tables)?,
            runtime: &self.runtime,
        })
    }
}

/// Blocking form of [`AsyncForeachIterator`].
pub struct ForeachIterator<'h> {
    inner: AsyncForeachIterator<'h>,
    runtime: &'h Runtime,
}

impl ForeachIterator<'_> {
    pub fn phase(&self) -> ForeachPhase {
        self.inner.phase()
    }

    pub fn tables(&self) -> &[String] {
        self.inner.tables()
    }

    pub fn begin(&mut self) -> DbResult<&mut Self> {
        self.inner.begin()?;
        Ok(self)
    }

    pub fn end(&mut self) -> DbResult<&mut Self> {
        self.inner.end()?;
        Ok(self)
    }

    pub fn data(&mut self) -> DbResult<&mut Self> {
        self.inner.data()?;
        Ok(self)
    }

    pub fn data_page(&mut self, request: PaginationRequest) -> DbResult<&mut Self> {
        self.inner.data_page(request)?;
        Ok(self)
    }

    pub fn columns(&mut self) -> DbResult<&mut Self> {
        self.inner.columns()?;
        Ok(self)
    }

    pub fn foreign_keys(&mut self) -> DbResult<&mut Self> {
        self.inner.foreign_keys()?;
        Ok(self)
    }

    pub fn triggers(&mut self) -> DbResult<&mut Self> {
        self.inner.triggers()?;
        Ok(self)
    }

    pub fn sql_definition(&mut self) -> DbResult<&mut Self> {
        self.inner.sql_definition()?;
        Ok(self)
    }

    pub fn push(&mut self, operation: ForeachOperation) -> DbResult<&mut Self> {
        self.inner.push(operation)?;
        Ok(self)
    }

    pub fn materialize(&mut self) -> DbResult<Option<&MetadataMap>> {
        self.runtime.block_on(self.inner.materialize())
    }

    pub fn results(&self) -> &MetadataMap {
        self.inner.results()
    }

    pub fn into_results(self) -> MetadataMap {
        self.inner.into_results()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocking_lifecycle() {
        let mut handle = ConnectionHandle::new(DatabaseType::SQLite, "sqlite::memory:").unwrap();
        handle.open().unwrap().begin_transaction().unwrap().commit().unwrap();
        assert_eq!(handle.state(), ConnectionState::Open);

        handle.execute("CREATE TABLE t (id INTEGER PRIMARY KEY)", &[]).unwrap();
        assert_eq!(handle.tables().unwrap(), vec![TableRef::new("t")]);
        assert_eq!(handle.columns("T").unwrap().len(), 1);

        handle.close().close();
        assert_eq!(handle.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_blocking_commit_without_begin() {
        let mut handle = ConnectionHandle::new(DatabaseType::SQLite, "sqlite::memory:").unwrap();
        handle.open().unwrap();
        assert!(matches!(
            handle.commit().unwrap_err(),
            DbError::TransactionState { .. }
        ));
    }
}
