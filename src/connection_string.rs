//! Connection string helpers.
//!
//! Only the database-name token is understood: it can be read, swapped for
//! another name, and credentials can be masked for logging. Everything else
//! in the string is passed to the native driver untouched.
//!
//! Two shapes are recognized: URLs (`sqlite:`, `postgres://`, `mssql://`) and
//! SQL Server ADO strings (`Server=..;Database=..`).

use crate::error::{DbError, DbResult};
use crate::models::DatabaseType;

const MAX_DATABASE_NAME_LEN: usize = 128;

/// Check that `name` is usable as a database identifier on every dialect.
pub fn validate_database_name(name: &str) -> DbResult<()> {
    if name.is_empty() {
        return Err(DbError::database_name(name, "must not be empty"));
    }
    if name.chars().count() > MAX_DATABASE_NAME_LEN {
        return Err(DbError::database_name(
            name,
            format!("must be at most {} characters", MAX_DATABASE_NAME_LEN),
        ));
    }
    let mut chars = name.chars();
    if let Some(first) = chars.next() {
        if !(first.is_alphabetic() || first == '_') {
            return Err(DbError::database_name(
                name,
                "must start with a letter or underscore",
            ));
        }
    }
    if let Some(bad) = chars.find(|c| !(c.is_alphanumeric() || matches!(*c, '_' | '$' | '-'))) {
        return Err(DbError::database_name(
            name,
            format!("contains invalid character '{}'", bad),
        ));
    }
    Ok(())
}

/// The database the connection string points at, if it names one.
pub fn database_name(dialect: DatabaseType, connection_string: &str) -> Option<String> {
    let trimmed = connection_string.trim();
    match dialect {
        DatabaseType::SQLite => {
            let path = SqlitePath::parse(trimmed);
            let stem = path.stem();
            (!stem.is_empty()).then(|| stem.to_string())
        }
        _ if is_url(trimmed) => {
            let url = url::Url::parse(trimmed).ok()?;
            let name = url.path().trim_start_matches('/');
            if name.is_empty() {
                return url
                    .query_pairs()
                    .find(|(k, _)| k.eq_ignore_ascii_case("dbname"))
                    .map(|(_, v)| v.into_owned());
            }
            Some(percent_decode(name))
        }
        _ => ado_pairs(trimmed)
            .into_iter()
            .find(|(key, _)| is_ado_database_key(key))
            .map(|(_, value)| value)
            .filter(|value| !value.is_empty()),
    }
}

/// Rewrite the database token to `name`, validating it first.
pub fn with_database(
    dialect: DatabaseType,
    connection_string: &str,
    name: &str,
) -> DbResult<String> {
    validate_database_name(name)?;
    let trimmed = connection_string.trim();
    if trimmed.is_empty() {
        return Err(DbError::configuration("connection string must not be empty"));
    }

    match dialect {
        DatabaseType::SQLite => {
            let path = SqlitePath::parse(trimmed);
            if path.is_memory() {
                return Err(DbError::database_name(
                    name,
                    "an in-memory SQLite database has no file to switch",
                ));
            }
            Ok(path.with_stem(name))
        }
        _ if is_url(trimmed) => {
            let mut url = url::Url::parse(trimmed).map_err(|e| {
                DbError::configuration(format!("Invalid connection URL: {}", e))
            })?;
            // Strip existing path and set only the new database
            url.set_path(&format!("/{}", name));
            Ok(url.to_string())
        }
        _ => {
            let mut replaced = false;
            let mut parts: Vec<String> = Vec::new();
            for segment in trimmed.split(';').filter(|s| !s.trim().is_empty()) {
                match segment.split_once('=') {
                    Some((key, _)) if is_ado_database_key(key.trim()) => {
                        if !replaced {
                            parts.push(format!("{}={}", key.trim(), name));
                            replaced = true;
                        }
                    }
                    _ => parts.push(segment.trim().to_string()),
                }
            }
            if !replaced {
                parts.push(format!("Database={}", name));
            }
            Ok(parts.join(";"))
        }
    }
}

/// Display-safe form of a connection string (credentials masked).
pub fn mask_connection_string(connection_string: &str) -> String {
    let trimmed = connection_string.trim();
    if is_url(trimmed) {
        // Replace the password between the user's ':' and the '@'
        if let Some(at_pos) = trimmed.find('@') {
            let scheme_end = trimmed.find("://").map(|p| p + 3).unwrap_or(0);
            if let Some(colon_pos) = trimmed[scheme_end..at_pos].rfind(':') {
                let colon_pos = scheme_end + colon_pos;
                return format!("{}****{}", &trimmed[..colon_pos + 1], &trimmed[at_pos..]);
            }
        }
        return trimmed.to_string();
    }
    if !trimmed.contains('=') {
        return trimmed.to_string();
    }

    trimmed
        .split(';')
        .map(|segment| match segment.split_once('=') {
            Some((key, _))
                if matches!(
                    key.trim().to_ascii_lowercase().as_str(),
                    "password" | "pwd"
                ) =>
            {
                format!("{}=****", key)
            }
            _ => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join(";")
}

fn is_url(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    ["postgres://", "postgresql://", "mssql://", "sqlserver://"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}

fn is_ado_database_key(key: &str) -> bool {
    matches!(
        key.trim().to_ascii_lowercase().as_str(),
        "database" | "initial catalog"
    )
}

fn ado_pairs(s: &str) -> Vec<(String, String)> {
    s.split(';')
        .filter_map(|segment| segment.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

fn percent_decode(s: &str) -> String {
    url::form_urlencoded::parse(format!("x={}", s).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| s.to_string())
}

/// A SQLite connection string split into scheme prefix, file path and query.
struct SqlitePath<'a> {
    prefix: &'a str,
    path: &'a str,
    query: &'a str,
}

impl<'a> SqlitePath<'a> {
    fn parse(s: &'a str) -> Self {
        let prefix_len = ["sqlite://", "sqlite:"]
            .iter()
            .find(|p| s.get(..p.len()).is_some_and(|head| head.eq_ignore_ascii_case(p)))
            .map(|p| p.len())
            .unwrap_or(0);
        let (prefix, rest) = s.split_at(prefix_len);
        let (path, query) = match rest.find('?') {
            Some(q) => rest.split_at(q),
            None => (rest, ""),
        };
        Self {
            prefix,
            path,
            query,
        }
    }

    fn is_memory(&self) -> bool {
        self.path.is_empty() || self.path == ":memory:" || self.query.contains("mode=memory")
    }

    fn file_name(&self) -> &'a str {
        let start = self.path.rfind(['/', '\\']).map(|p| p + 1).unwrap_or(0);
        &self.path[start..]
    }

    fn stem(&self) -> &'a str {
        if self.is_memory() {
            return "";
        }
        let file = self.file_name();
        match file.rfind('.') {
            Some(dot) if dot > 0 => &file[..dot],
            _ => file,
        }
    }

    fn with_stem(&self, stem: &str) -> String {
        let file = self.file_name();
        let dir = &self.path[..self.path.len() - file.len()];
        let extension = match file.rfind('.') {
            Some(dot) if dot > 0 => &file[dot..],
            _ => "",
        };
        format!("{}{}{}{}{}", self.prefix, dir, stem, extension, self.query)
    }
}
