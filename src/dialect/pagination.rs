//! Pagination query generation.
//!
//! A [`PaginationRequest`] becomes a [`PagePlan`]: an optional boundary
//! predicate, an ORDER BY and the dialect's limit clause, plus the parameters
//! the predicate binds. Offset paging and keyset paging return the same rows
//! when paging forward over a strictly increasing key.

use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, QueryParam};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationMode {
    #[default]
    None,
    LimitOffset,
    KeysetById,
}

/// Where a page starts. Both forms are 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PagePosition {
    /// Rows to skip
    Offset(u64),
    /// Page number; skips `index * limit` rows
    Index(u64),
}

impl Default for PagePosition {
    fn default() -> Self {
        Self::Offset(0)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PaginationRequest {
    pub mode: PaginationMode,
    pub limit: u64,
    #[serde(default)]
    pub position: PagePosition,
    #[serde(default)]
    pub ordering_field: String,
    /// Last key seen on the previous page. Keyset mode only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<QueryParam>,
}

impl PaginationRequest {
    /// No pagination: all rows, unordered.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn limit_offset(ordering_field: impl Into<String>, limit: u64) -> Self {
        Self {
            mode: PaginationMode::LimitOffset,
            limit,
            ordering_field: ordering_field.into(),
            ..Default::default()
        }
    }

    pub fn keyset(ordering_field: impl Into<String>, limit: u64) -> Self {
        Self {
            mode: PaginationMode::KeysetById,
            limit,
            ordering_field: ordering_field.into(),
            ..Default::default()
        }
    }

    pub fn at_offset(mut self, offset: u64) -> Self {
        self.position = PagePosition::Offset(offset);
        self
    }

    pub fn at_index(mut self, index: u64) -> Self {
        self.position = PagePosition::Index(index);
        self
    }

    pub fn after(mut self, last_key: impl Into<QueryParam>) -> Self {
        self.after = Some(last_key.into());
        self
    }

    /// Rows skipped before the page, after validation.
    pub fn offset(&self) -> DbResult<u64> {
        match self.position {
            PagePosition::Offset(offset) => Ok(offset),
            PagePosition::Index(index) => index.checked_mul(self.limit).ok_or_else(|| {
                DbError::invalid_state(format!(
                    "page index {} with limit {} overflows the row offset",
                    index, self.limit
                ))
            }),
        }
    }

    fn validate(&self) -> DbResult<()> {
        if self.mode == PaginationMode::None {
            return Ok(());
        }
        if self.ordering_field.trim().is_empty() {
            return Err(DbError::invalid_state(format!(
                "{:?} pagination requires an ordering field",
                self.mode
            )));
        }
        if self.limit == 0 {
            return Err(DbError::invalid_state("pagination limit must be positive"));
        }
        if self.offset()? > i64::MAX as u64 {
            return Err(DbError::invalid_state("pagination offset out of range"));
        }
        Ok(())
    }
}

/// SQL pieces appended after `SELECT ... FROM <table>`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PagePlan {
    pub where_clause: Option<String>,
    pub order_by: Option<String>,
    pub limit_clause: Option<String>,
    pub params: Vec<QueryParam>,
}

impl PagePlan {
    /// The clauses joined in statement order, each with a leading space.
    pub fn fragment(&self) -> String {
        [&self.where_clause, &self.order_by, &self.limit_clause]
            .into_iter()
            .flatten()
            .fold(String::new(), |mut acc, clause| {
                acc.push(' ');
                acc.push_str(clause);
                acc
            })
    }

    pub fn is_empty(&self) -> bool {
        self.where_clause.is_none() && self.order_by.is_none() && self.limit_clause.is_none()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PaginationPlanner {
    dialect: DatabaseType,
}

impl PaginationPlanner {
    pub fn new(dialect: DatabaseType) -> Self {
        Self { dialect }
    }

    /// Plan one page over `table`, an already quoted table reference.
    pub fn plan(&self, request: &PaginationRequest, table: &str) -> DbResult<PagePlan> {
        request.validate()?;

        let key = self.dialect.quote_identifier(request.ordering_field.trim());
        match request.mode {
            PaginationMode::None => Ok(PagePlan::default()),
            PaginationMode::LimitOffset => Ok(PagePlan {
                where_clause: None,
                order_by: Some(format!("ORDER BY {}", key)),
                limit_clause: Some(self.limit_clause(request.limit, request.offset()?)),
                params: Vec::new(),
            }),
            PaginationMode::KeysetById => {
                let offset = request.offset()?;
                let (where_clause, params) = match &request.after {
                    Some(last_key) => (
                        Some(format!("WHERE {} > {}", key, self.dialect.placeholder(1))),
                        vec![last_key.clone()],
                    ),
                    None if offset == 0 => (None, Vec::new()),
                    None => (
                        Some(format!(
                            "WHERE {} > {}",
                            key,
                            self.boundary_subquery(&key, table, offset)
                        )),
                        Vec::new(),
                    ),
                };
                Ok(PagePlan {
                    where_clause,
                    order_by: Some(format!("ORDER BY {}", key)),
                    limit_clause: Some(self.limit_clause(request.limit, 0)),
                    params,
                })
            }
        }
    }

    fn limit_clause(&self, limit: u64, offset: u64) -> String {
        match self.dialect {
            DatabaseType::SqlServer => {
                format!("OFFSET {} ROWS FETCH NEXT {} ROWS ONLY", offset, limit)
            }
            DatabaseType::SQLite | DatabaseType::PostgreSQL => {
                format!("LIMIT {} OFFSET {}", limit, offset)
            }
        }
    }

    /// Largest key among the first `offset` rows in key order.
    fn boundary_subquery(&self, key: &str, table: &str, offset: u64) -> String {
        match self.dialect {
            DatabaseType::SqlServer => format!(
                "(SELECT MAX(__page_key) FROM (SELECT TOP ({}) {} AS __page_key FROM {} ORDER BY {}) AS __page_boundary)",
                offset, key, table, key
            ),
            DatabaseType::SQLite | DatabaseType::PostgreSQL => format!(
                "(SELECT MAX(__page_key) FROM (SELECT {} AS __page_key FROM {} ORDER BY {} LIMIT {}) AS __page_boundary)",
                key, table, key, offset
            ),
        }
    }
}
