//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use crossdb::db::{NativeDriver, PhysicalConnection};
use crossdb::error::{DbError, DbResult};
use crossdb::models::{DatabaseType, QueryParam, Row};
use serde_json::json;
use tempfile::TempDir;

/// A temp directory holding one SQLite database file.
pub struct SqliteFixture {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl SqliteFixture {
    pub fn new(file_name: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(file_name);
        Self { dir, path }
    }

    pub fn url(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }
}

/// Shared call log of a [`RecordingDriver`].
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|c| *c == call).count()
    }
}

/// Catalog served by a [`RecordingDriver`]: the table list, and one table
/// whose lookups fail while set.
#[derive(Debug, Clone, Default)]
pub struct FakeCatalog {
    tables: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<Option<String>>>,
}

impl FakeCatalog {
    pub fn fail_table(&self, table: Option<&str>) {
        *self.failing.lock().unwrap() = table.map(str::to_string);
    }

    fn list(&self) -> Vec<Row> {
        self.tables
            .lock()
            .unwrap()
            .iter()
            .filter_map(|name| json!({ "name": name }).as_object().cloned())
            .collect()
    }

    fn fails_for(&self, params: &[QueryParam]) -> bool {
        let failing = self.failing.lock().unwrap();
        let Some(table) = failing.as_deref() else {
            return false;
        };
        params
            .iter()
            .any(|p| matches!(p, QueryParam::String(s) if s == table))
    }
}

/// Driver whose connections only record what they are asked to do.
///
/// As a SQLite driver it answers the table-list query from its
/// [`FakeCatalog`]; every other query returns no rows.
#[derive(Debug, Clone)]
pub struct RecordingDriver {
    pub dialect: DatabaseType,
    pub log: CallLog,
    pub catalog: FakeCatalog,
    pub fail_commit: bool,
}

impl RecordingDriver {
    pub fn new(dialect: DatabaseType) -> Self {
        Self {
            dialect,
            log: CallLog::default(),
            catalog: FakeCatalog::default(),
            fail_commit: false,
        }
    }

    pub fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub fn with_tables(self, tables: &[&str]) -> Self {
        *self.catalog.tables.lock().unwrap() = tables.iter().map(|t| t.to_string()).collect();
        self
    }
}

#[async_trait]
impl NativeDriver for RecordingDriver {
    fn dialect(&self) -> DatabaseType {
        self.dialect
    }

    async fn open(&self, connection_string: &str) -> DbResult<Box<dyn PhysicalConnection>> {
        if connection_string.contains("unreachable") {
            return Err(DbError::connect_params_msg("host unreachable"));
        }
        self.log.push("open");
        Ok(Box::new(RecordingConnection {
            dialect: self.dialect,
            log: self.log.clone(),
            catalog: self.catalog.clone(),
            fail_commit: self.fail_commit,
        }))
    }
}

struct RecordingConnection {
    dialect: DatabaseType,
    log: CallLog,
    catalog: FakeCatalog,
    fail_commit: bool,
}

#[async_trait]
impl PhysicalConnection for RecordingConnection {
    fn dialect(&self) -> DatabaseType {
        self.dialect
    }

    async fn execute(&mut self, sql: &str, _params: &[QueryParam]) -> DbResult<u64> {
        self.log.push(format!("execute {}", sql));
        Ok(1)
    }

    async fn query(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<Vec<Row>> {
        self.log.push(format!("query {}", sql));
        if self.catalog.fails_for(params) {
            return Err(DbError::database_msg("catalog lookup failed"));
        }
        if params.is_empty() && sql.contains("sqlite_master") {
            return Ok(self.catalog.list());
        }
        Ok(Vec::new())
    }

    async fn begin(&mut self) -> DbResult<()> {
        self.log.push("begin");
        Ok(())
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.log.push("commit");
        if self.fail_commit {
            return Err(DbError::database_msg("commit rejected"));
        }
        Ok(())
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.log.push("rollback");
        Ok(())
    }

    async fn server_version(&mut self) -> DbResult<Option<String>> {
        Ok(Some("recording 1.0".to_string()))
    }

    async fn close(&mut self) -> DbResult<()> {
        self.log.push("close");
        Ok(())
    }
}
