//! Batched metadata iteration over a fixed set of tables.
//!
//! Operations are queued between [`begin`](AsyncForeachIterator::begin) and
//! [`end`](AsyncForeachIterator::end), then
//! [`materialize`](AsyncForeachIterator::materialize) runs every queued
//! operation against every table and merges the output into one map. The
//! iterator can be reopened with another `begin`; later cycles only
//! overwrite the fields they request.
//!
//! ```text
//! NotStarted --begin--> Collecting --end--> Closed --begin--> Collecting ...
//! ```

use tracing::debug;

use crate::db::connection::ConnectionHandle;
use crate::dialect::PaginationRequest;
use crate::error::{DbError, DbResult};
use crate::models::{MetadataMap, TableMetadata};

/// One queued unit of work, applied to every table.
#[derive(Debug, Clone, PartialEq)]
pub enum ForeachOperation {
    /// Table rows, optionally paged
    Data(PaginationRequest),
    Columns,
    ForeignKeys,
    Triggers,
    SqlDefinition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeachPhase {
    NotStarted,
    Collecting,
    Closed,
}

impl std::fmt::Display for ForeachPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotStarted => "not started",
            Self::Collecting => "collecting",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Collect the table names, rejecting an empty list or a blank name.
pub(crate) fn table_list<I, S>(tables: I) -> DbResult<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let tables: Vec<String> = tables.into_iter().map(Into::into).collect();
    if tables.is_empty() {
        return Err(DbError::configuration("table list must not be empty"));
    }
    if tables.iter().any(|t| t.trim().is_empty()) {
        return Err(DbError::configuration("table names must not be empty"));
    }
    Ok(tables)
}

#[derive(Debug)]
pub struct AsyncForeachIterator<'h> {
    handle: &'h mut ConnectionHandle,
    tables: Vec<String>,
    phase: ForeachPhase,
    queued: Vec<ForeachOperation>,
    /// Batch sealed by the last `end`, consumed by the next materialization
    sealed: Option<Vec<ForeachOperation>>,
    last_cycle_empty: bool,
    results: MetadataMap,
}

impl<'h> AsyncForeachIterator<'h> {
    pub fn new<I, S>(handle: &'h mut ConnectionHandle, tables: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tables = table_list(tables)?;
        if !handle.is_connected() {
            return Err(DbError::configuration("foreach requires an open connection"));
        }
        Ok(Self {
            handle,
            tables,
            phase: ForeachPhase::NotStarted,
            queued: Vec::new(),
            sealed: None,
            last_cycle_empty: false,
            results: MetadataMap::new(),
        })
    }

    pub fn phase(&self) -> ForeachPhase {
        self.phase
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    /// Start collecting a new batch.
    pub fn begin(&mut self) -> DbResult<&mut Self> {
        if self.phase == ForeachPhase::Collecting {
            return Err(DbError::invalid_state("foreach batch already started"));
        }
        self.phase = ForeachPhase::Collecting;
        self.queued.clear();
        Ok(self)
    }

    /// Seal the batch for materialization.
    pub fn end(&mut self) -> DbResult<&mut Self> {
        if self.phase != ForeachPhase::Collecting {
            return Err(DbError::invalid_state(format!(
                "cannot end a foreach batch that is {}",
                self.phase
            )));
        }
        self.phase = ForeachPhase::Closed;
        self.sealed = Some(std::mem::take(&mut self.queued));
        Ok(self)
    }

    pub fn data(&mut self) -> DbResult<&mut Self> {
        self.push(ForeachOperation::Data(PaginationRequest::none()))
    }

    pub fn data_page(&mut self, request: PaginationRequest) -> DbResult<&mut Self> {
        self.push(ForeachOperation::Data(request))
    }

    pub fn columns(&mut self) -> DbResult<&mut Self> {
        self.push(ForeachOperation::Columns)
    }

    pub fn foreign_keys(&mut self) -> DbResult<&mut Self> {
        self.push(ForeachOperation::ForeignKeys)
    }

    pub fn triggers(&mut self) -> DbResult<&mut Self> {
        self.push(ForeachOperation::Triggers)
    }

    pub fn sql_definition(&mut self) -> DbResult<&mut Self> {
        self.push(ForeachOperation::SqlDefinition)
    }

    pub fn push(&mut self, operation: ForeachOperation) -> DbResult<&mut Self> {
        if self.phase != ForeachPhase::Collecting {
            return Err(DbError::invalid_state(format!(
                "cannot queue {:?} while the foreach batch is {}",
                operation, self.phase
            )));
        }
        self.queued.push(operation);
        Ok(self)
    }

    /// Run the sealed batch and return the merged results.
    ///
    /// Returns `None` when the last batch queued nothing. Calling again
    /// without a new batch returns the current results without rerunning.
    /// A batch that fails leaves the results untouched and runs again on
    /// the next call.
    pub async fn materialize(&mut self) -> DbResult<Option<&MetadataMap>> {
        if self.phase != ForeachPhase::Closed {
            return Err(DbError::invalid_state(format!(
                "foreach results are not available while the batch is {}",
                self.phase
            )));
        }

        if let Some(operations) = self.sealed.take() {
            // A failed batch stays sealed so the next call reruns it
            let batch = match self.run(&operations).await {
                Ok(batch) => batch,
                Err(e) => {
                    self.sealed = Some(operations);
                    return Err(e);
                }
            };
            self.last_cycle_empty = operations.is_empty();
            merge(&mut self.results, batch);
        }

        if self.last_cycle_empty {
            return Ok(None);
        }
        Ok(Some(&self.results))
    }

    /// Merged results so far.
    pub fn results(&self) -> &MetadataMap {
        &self.results
    }

    pub fn into_results(self) -> MetadataMap {
        self.results
    }

    /// Run every operation against every table into a fresh map.
    async fn run(&mut self, operations: &[ForeachOperation]) -> DbResult<MetadataMap> {
        let mut batch = MetadataMap::new();
        if operations.is_empty() {
            return Ok(batch);
        }
        debug!(
            tables = self.tables.len(),
            operations = operations.len(),
            "Materializing foreach batch"
        );

        for table in &self.tables {
            let entry = batch
                .entry(table.clone())
                .or_insert_with(|| TableMetadata::new(table.clone()));

            for operation in operations {
                match operation {
                    ForeachOperation::Data(request) => {
                        entry.data = Some(self.handle.query_page(table, request).await?);
                    }
                    ForeachOperation::Columns => {
                        entry.columns = Some(self.handle.columns(table).await?);
                    }
                    ForeachOperation::ForeignKeys => {
                        entry.foreign_keys = Some(self.handle.foreign_keys(table).await?);
                    }
                    ForeachOperation::Triggers => {
                        entry.triggers = Some(self.handle.triggers(table).await?);
                    }
                    ForeachOperation::SqlDefinition => {
                        entry.sql_definition = Some(self.handle.table_definition(table).await?);
                    }
                }
            }
        }
        Ok(batch)
    }
}

/// Overlay the fields a batch fetched onto the accumulated results.
fn merge(results: &mut MetadataMap, batch: MetadataMap) {
    for (table, fetched) in batch {
        let entry = results
            .entry(table)
            .or_insert_with_key(|table| TableMetadata::new(table.clone()));
        if fetched.data.is_some() {
            entry.data = fetched.data;
        }
        if fetched.columns.is_some() {
            entry.columns = fetched.columns;
        }
        if fetched.foreign_keys.is_some() {
            entry.foreign_keys = fetched.foreign_keys;
        }
        if fetched.triggers.is_some() {
            entry.triggers = fetched.triggers;
        }
        if fetched.sql_definition.is_some() {
            entry.sql_definition = fetched.sql_definition;
        }
    }
}
