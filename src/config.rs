//! Configuration handling for the crossdb CLI.
//!
//! This module provides configuration management via CLI arguments and environment variables.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::time::Duration;

use crate::dialect::PaginationRequest;
use crate::models::{DatabaseType, QueryParam};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PAGE_LIMIT: u64 = 50;

/// Dialect override for connection strings whose type cannot be inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DialectArg {
    Sqlite,
    Postgres,
    Mssql,
}

impl From<DialectArg> for DatabaseType {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Sqlite => DatabaseType::SQLite,
            DialectArg::Postgres => DatabaseType::PostgreSQL,
            DialectArg::Mssql => DatabaseType::SqlServer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PageMode {
    #[default]
    LimitOffset,
    Keyset,
}

impl std::fmt::Display for PageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LimitOffset => write!(f, "limit-offset"),
            Self::Keyset => write!(f, "keyset"),
        }
    }
}

/// Arguments of the `page` command.
#[derive(Debug, Clone, Args)]
pub struct PageArgs {
    /// Table to read
    pub table: String,

    /// Column the pages are ordered by
    #[arg(long, default_value = "id")]
    pub order_by: String,

    #[arg(long, value_enum, default_value_t = PageMode::LimitOffset)]
    pub mode: PageMode,

    #[arg(long, default_value_t = DEFAULT_PAGE_LIMIT)]
    pub limit: u64,

    /// Rows to skip
    #[arg(long, conflicts_with = "index")]
    pub offset: Option<u64>,

    /// 0-based page number
    #[arg(long)]
    pub index: Option<u64>,

    /// Last key of the previous page (keyset mode)
    #[arg(long)]
    pub after: Option<String>,
}

impl PageArgs {
    pub fn to_request(&self) -> PaginationRequest {
        let mut request = match self.mode {
            PageMode::LimitOffset => PaginationRequest::limit_offset(&self.order_by, self.limit),
            PageMode::Keyset => PaginationRequest::keyset(&self.order_by, self.limit),
        };
        if let Some(index) = self.index {
            request = request.at_index(index);
        } else if let Some(offset) = self.offset {
            request = request.at_offset(offset);
        }
        if let (PageMode::Keyset, Some(after)) = (self.mode, &self.after) {
            // Numeric keys compare numerically
            request = match after.parse::<i64>() {
                Ok(n) => request.after(n),
                Err(_) => request.after(QueryParam::String(after.clone())),
            };
        }
        request
    }
}

/// Arguments of the `inspect` command.
#[derive(Debug, Clone, Args)]
pub struct InspectArgs {
    /// Tables to inspect
    #[arg(required = true, value_delimiter = ',')]
    pub tables: Vec<String>,

    #[arg(long)]
    pub data: bool,

    #[arg(long)]
    pub columns: bool,

    #[arg(long)]
    pub foreign_keys: bool,

    #[arg(long)]
    pub triggers: bool,

    #[arg(long)]
    pub ddl: bool,
}

impl InspectArgs {
    /// With no flag set, every metadata kind is collected (rows excluded).
    pub fn wants_all_metadata(&self) -> bool {
        !(self.data || self.columns || self.foreign_keys || self.triggers || self.ddl)
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Show the dialect, masked connection string and server version
    Info,
    /// List tables
    Tables,
    /// Describe the columns of a table
    Columns { table: String },
    /// List the foreign keys of a table
    ForeignKeys { table: String },
    /// List the triggers of a table
    Triggers { table: String },
    /// Print the CREATE TABLE statement of a table
    Ddl { table: String },
    /// Read one page of rows from a table
    Page(PageArgs),
    /// Collect metadata for several tables in one batch
    Inspect(InspectArgs),
}

/// Configuration for the crossdb CLI.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "crossdb",
    about = "Inspect SQLite, PostgreSQL and SQL Server databases through one API",
    version,
    author
)]
pub struct Config {
    /// Connection string: sqlite:path.db, postgres://.., mssql://.. or an
    /// ADO string such as "Server=host,1433;Database=db;User Id=..;Password=.."
    #[arg(short = 'd', long = "database", value_name = "URL", env = "CROSSDB_DATABASE")]
    pub database: Option<String>,

    /// Dialect, when it cannot be inferred from the connection string
    #[arg(long, value_enum, env = "CROSSDB_DIALECT")]
    pub dialect: Option<DialectArg>,

    /// Timeout for the whole command in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, env = "CROSSDB_TIMEOUT")]
    pub timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "CROSSDB_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "CROSSDB_JSON_LOGS")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The explicit dialect, or the one inferred from the connection string.
    pub fn resolve_dialect(&self) -> Result<DatabaseType, String> {
        if let Some(dialect) = self.dialect {
            return Ok(dialect.into());
        }
        let database = self
            .database
            .as_deref()
            .ok_or_else(|| "no database configured".to_string())?;
        DatabaseType::from_connection_string(database).ok_or_else(|| {
            "cannot infer the database type; pass --dialect sqlite|postgres|mssql".to_string()
        })
    }

    /// Get the command timeout as a Duration.
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}
