//! Database Engine Traits and Core Types
//!
//! This module defines the core abstractions for database engines.
//! Each engine (`MySQL`, `PostgreSQL`, `SQLite`) implements [`DatabaseEngine`]
//! and hands out a [`CatalogSession`] bound to one open connection.
//!
//! # Connection Lifecycle
//! A session is opened per request, used for every step of that request, and
//! closed before the request returns. Nothing is pooled or kept between
//! requests.
//!
//! # Engine Isolation
//! Each engine implementation is completely independent, including its
//! identifier quoting and value stringification.
//! No shared SQL helpers or cross-engine abstractions.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, TabulaError};
use crate::viewer::TableIdentifier;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "mysql")]
pub mod mysql;

/// Supported database engine types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// `PostgreSQL` database
    Postgres,
    /// `MySQL` database (includes `MariaDB`)
    MySQL,
    /// `SQLite` database
    SQLite,
}

impl DatabaseType {
    /// Get the engine name as a string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySQL => "mysql",
            Self::SQLite => "sqlite",
        }
    }

    /// Conventional TCP port for client-server engines
    #[must_use]
    pub const fn default_port(&self) -> Option<u16> {
        match self {
            Self::Postgres => Some(5432),
            Self::MySQL => Some(3306),
            Self::SQLite => None,
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DatabaseType {
    type Err = TabulaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::MySQL),
            "sqlite" => Ok(Self::SQLite),
            other => Err(TabulaError::config_error(format!(
                "Unknown engine '{other}' (expected mysql, postgres or sqlite)"
            ))),
        }
    }
}

/// Connection configuration for database engines
///
/// Fields are engine-specific (e.g., `file` only applies to `SQLite`).
/// `Debug` masks the password; use [`ConnectionConfig::redacted`] in logs.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database engine type
    pub engine: DatabaseType,

    /// Hostname (for postgres/mysql)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Port number (for postgres/mysql)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Username (for postgres/mysql)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Password (for postgres/mysql)
    /// WARNING: Sensitive data, do not log or include in error messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Database name (for postgres/mysql)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// Schema to list tables from (postgres only, defaults to the session's current schema)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Database file path (for sqlite)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl ConnectionConfig {
    /// Create a new `PostgreSQL` connection config
    #[must_use]
    pub const fn postgres(
        host: String,
        port: u16,
        user: String,
        password: String,
        database: String,
    ) -> Self {
        Self {
            engine: DatabaseType::Postgres,
            host: Some(host),
            port: Some(port),
            user: Some(user),
            password: Some(password),
            database: Some(database),
            schema: None,
            file: None,
        }
    }

    /// Create a new `MySQL` connection config
    #[must_use]
    pub const fn mysql(
        host: String,
        port: u16,
        user: String,
        password: String,
        database: String,
    ) -> Self {
        Self {
            engine: DatabaseType::MySQL,
            host: Some(host),
            port: Some(port),
            user: Some(user),
            password: Some(password),
            database: Some(database),
            schema: None,
            file: None,
        }
    }

    /// Create a new `SQLite` connection config
    #[must_use]
    pub const fn sqlite(file: PathBuf) -> Self {
        Self {
            engine: DatabaseType::SQLite,
            host: None,
            port: None,
            user: None,
            password: None,
            database: None,
            schema: None,
            file: Some(file),
        }
    }

    /// Credential-free description of the target, e.g. `mysql://vr@db:3306/vr_stats`
    #[must_use]
    pub fn redacted(&self) -> String {
        match self.engine {
            DatabaseType::SQLite => format!(
                "sqlite://{}",
                self.file.as_deref().map(|p| p.display().to_string()).unwrap_or_default()
            ),
            engine => format!(
                "{}://{}@{}:{}/{}",
                engine,
                self.user.as_deref().unwrap_or(""),
                self.host.as_deref().unwrap_or(""),
                self.port.or_else(|| engine.default_port()).unwrap_or_default(),
                self.database.as_deref().unwrap_or("")
            ),
        }
    }

    /// Check that every field the engine needs is present
    pub fn validate(&self) -> Result<()> {
        let engine = match self.engine {
            DatabaseType::Postgres => "PostgreSQL",
            DatabaseType::MySQL => "MySQL",
            DatabaseType::SQLite => {
                if self.file.is_none() {
                    return Err(TabulaError::config_error("SQLite requires 'file' parameter"));
                }
                return Ok(());
            }
        };

        let required = [
            ("host", self.host.is_some()),
            ("user", self.user.is_some()),
            ("password", self.password.is_some()),
            ("database", self.database.is_some()),
        ];
        for (field, present) in required {
            if !present {
                return Err(TabulaError::config_error(format!(
                    "{engine} requires '{field}' parameter"
                )));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("file", &self.file)
            .finish()
    }
}

/// Resource bounds applied to every table request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Maximum number of rows returned per table
    /// None means no limit
    #[serde(default = "default_max_rows")]
    pub max_rows: Option<usize>,

    /// Deadline for connect plus all queries of one request, in milliseconds
    /// None means no timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: Option<u64>,
}

fn default_max_rows() -> Option<usize> {
    Some(10_000)
}

fn default_timeout_ms() -> Option<u64> {
    Some(10_000)
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_rows: default_max_rows(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Limits {
    /// No row limit and no timeout
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            max_rows: None,
            timeout_ms: None,
        }
    }

    /// Deadline as a `Duration`
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Rows fetched for one table, each cell already stringified
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowBatch {
    /// Rows in engine order
    pub rows: Vec<Vec<String>>,

    /// True when more rows existed than the requested maximum
    pub truncated: bool,
}

impl RowBatch {
    /// Build a batch from up to `max_rows + 1` fetched rows
    ///
    /// Engines over-fetch by one row so truncation can be detected without a
    /// separate `COUNT(*)`.
    #[must_use]
    pub fn from_fetched(mut rows: Vec<Vec<String>>, max_rows: Option<usize>) -> Self {
        let truncated = match max_rows {
            Some(max) if rows.len() > max => {
                rows.truncate(max);
                true
            }
            _ => false,
        };
        Self { rows, truncated }
    }
}

/// `LIMIT` clause for a row query, over-fetching by one to detect truncation
#[must_use]
pub fn limit_clause(max_rows: Option<usize>) -> String {
    max_rows.map(|max| format!(" LIMIT {}", max.saturating_add(1))).unwrap_or_default()
}

/// Catalog access over one open connection
///
/// Only [`TableIdentifier`] values reach the per-table methods, so no
/// unvalidated text can be spliced into SQL.
pub trait CatalogSession: Send {
    /// Names of all tables and views in the configured database, sorted by name
    fn list_tables(&mut self) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Column names of `table` in catalog (ordinal) order
    fn table_columns(
        &mut self,
        table: &TableIdentifier,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// All rows of `table` in engine scan order, stringified
    ///
    /// `columns` is the catalog column list for `table`; `max_rows` bounds the
    /// result.
    fn table_rows(
        &mut self,
        table: &TableIdentifier,
        columns: &[String],
        max_rows: Option<usize>,
    ) -> impl Future<Output = Result<RowBatch>> + Send;

    /// Release the connection
    ///
    /// Failures are logged, never returned: the request outcome is already known.
    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Database engine trait
///
/// All database engines implement this trait.
pub trait DatabaseEngine {
    /// Session type produced by [`DatabaseEngine::connect`]
    type Session: CatalogSession;

    /// Open a connection using the provided config
    fn connect(config: &ConnectionConfig) -> impl Future<Output = Result<Self::Session>> + Send;
}

/// Session for whichever engine the configuration names
pub enum Session {
    #[cfg(feature = "sqlite")]
    SQLite(sqlite::SqliteSession),
    #[cfg(feature = "postgres")]
    Postgres(postgres::PostgresSession),
    #[cfg(feature = "mysql")]
    MySQL(mysql::MySqlSession),
}

impl Session {
    /// Open a session for `config.engine`
    pub async fn open(config: &ConnectionConfig) -> Result<Self> {
        match config.engine {
            #[cfg(feature = "sqlite")]
            DatabaseType::SQLite => sqlite::SqliteEngine::connect(config).await.map(Self::SQLite),
            #[cfg(not(feature = "sqlite"))]
            DatabaseType::SQLite => Err(TabulaError::config_error(
                "SQLite engine not enabled. Build with --features sqlite",
            )),

            #[cfg(feature = "postgres")]
            DatabaseType::Postgres => {
                postgres::PostgresEngine::connect(config).await.map(Self::Postgres)
            }
            #[cfg(not(feature = "postgres"))]
            DatabaseType::Postgres => Err(TabulaError::config_error(
                "PostgreSQL engine not enabled. Build with --features postgres",
            )),

            #[cfg(feature = "mysql")]
            DatabaseType::MySQL => mysql::MySqlEngine::connect(config).await.map(Self::MySQL),
            #[cfg(not(feature = "mysql"))]
            DatabaseType::MySQL => Err(TabulaError::config_error(
                "MySQL engine not enabled. Build with --features mysql",
            )),
        }
    }
}

impl CatalogSession for Session {
    async fn list_tables(&mut self) -> Result<Vec<String>> {
        match self {
            #[cfg(feature = "sqlite")]
            Self::SQLite(s) => s.list_tables().await,
            #[cfg(feature = "postgres")]
            Self::Postgres(s) => s.list_tables().await,
            #[cfg(feature = "mysql")]
            Self::MySQL(s) => s.list_tables().await,
        }
    }

    async fn table_columns(&mut self, table: &TableIdentifier) -> Result<Vec<String>> {
        match self {
            #[cfg(feature = "sqlite")]
            Self::SQLite(s) => s.table_columns(table).await,
            #[cfg(feature = "postgres")]
            Self::Postgres(s) => s.table_columns(table).await,
            #[cfg(feature = "mysql")]
            Self::MySQL(s) => s.table_columns(table).await,
        }
    }

    async fn table_rows(
        &mut self,
        table: &TableIdentifier,
        columns: &[String],
        max_rows: Option<usize>,
    ) -> Result<RowBatch> {
        match self {
            #[cfg(feature = "sqlite")]
            Self::SQLite(s) => s.table_rows(table, columns, max_rows).await,
            #[cfg(feature = "postgres")]
            Self::Postgres(s) => s.table_rows(table, columns, max_rows).await,
            #[cfg(feature = "mysql")]
            Self::MySQL(s) => s.table_rows(table, columns, max_rows).await,
        }
    }

    async fn close(self) {
        match self {
            #[cfg(feature = "sqlite")]
            Self::SQLite(s) => s.close().await,
            #[cfg(feature = "postgres")]
            Self::Postgres(s) => s.close().await,
            #[cfg(feature = "mysql")]
            Self::MySQL(s) => s.close().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_type_serialization() {
        assert_eq!(serde_json::to_string(&DatabaseType::Postgres).unwrap(), r#""postgres""#);
        assert_eq!(serde_json::to_string(&DatabaseType::MySQL).unwrap(), r#""mysql""#);
        assert_eq!(serde_json::to_string(&DatabaseType::SQLite).unwrap(), r#""sqlite""#);
    }

    #[test]
    fn test_database_type_from_str() {
        assert_eq!("MariaDB".parse::<DatabaseType>().unwrap(), DatabaseType::MySQL);
        assert_eq!("postgresql".parse::<DatabaseType>().unwrap(), DatabaseType::Postgres);
        assert_eq!("sqlite".parse::<DatabaseType>().unwrap(), DatabaseType::SQLite);
        assert!("oracle".parse::<DatabaseType>().is_err());
    }

    #[test]
    fn test_connection_config_constructors() {
        let pg_config = ConnectionConfig::postgres(
            "localhost".to_string(),
            5432,
            "user".to_string(),
            "pass".to_string(),
            "db".to_string(),
        );
        assert_eq!(pg_config.engine, DatabaseType::Postgres);
        assert_eq!(pg_config.port, Some(5432));

        let sqlite_config = ConnectionConfig::sqlite(PathBuf::from("/tmp/test.db"));
        assert_eq!(sqlite_config.engine, DatabaseType::SQLite);
        assert!(sqlite_config.file.is_some());
    }

    #[test]
    fn test_debug_and_redacted_hide_password() {
        let config = ConnectionConfig::mysql(
            "db.internal".to_string(),
            3306,
            "vradmin".to_string(),
            "hunter2".to_string(),
            "vr_stats".to_string(),
        );

        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("********"));

        assert_eq!(config.redacted(), "mysql://vradmin@db.internal:3306/vr_stats");
    }

    #[test]
    fn test_validate_requires_engine_fields() {
        let mut config = ConnectionConfig::mysql(
            "localhost".to_string(),
            3306,
            "root".to_string(),
            "password".to_string(),
            "test".to_string(),
        );
        assert!(config.validate().is_ok());

        config.host = None;
        let err = config.validate().unwrap_err();
        assert!(err.message().contains("MySQL requires 'host' parameter"));

        let mut sqlite = ConnectionConfig::sqlite(PathBuf::from("x.db"));
        assert!(sqlite.validate().is_ok());
        sqlite.file = None;
        assert!(sqlite.validate().is_err());
    }

    #[test]
    fn test_limits_defaults() {
        let limits = Limits::default();
        assert_eq!(limits.max_rows, Some(10_000));
        assert_eq!(limits.timeout(), Some(Duration::from_millis(10_000)));

        let unbounded = Limits::unbounded();
        assert!(unbounded.max_rows.is_none());
        assert!(unbounded.timeout().is_none());
    }

    #[test]
    fn test_limits_deserialize_explicit_null_means_unbounded() {
        let limits: Limits = serde_json::from_str(r#"{"max_rows": null}"#).unwrap();
        assert_eq!(limits.max_rows, None);
        assert_eq!(limits.timeout_ms, Some(10_000));
    }

    #[test]
    fn test_row_batch_truncation() {
        let fetched = vec![vec!["1".to_string()], vec!["2".to_string()], vec!["3".to_string()]];

        let batch = RowBatch::from_fetched(fetched.clone(), Some(2));
        assert_eq!(batch.rows.len(), 2);
        assert!(batch.truncated);

        let batch = RowBatch::from_fetched(fetched.clone(), Some(3));
        assert_eq!(batch.rows.len(), 3);
        assert!(!batch.truncated);

        let batch = RowBatch::from_fetched(fetched, None);
        assert_eq!(batch.rows.len(), 3);
        assert!(!batch.truncated);
    }

    #[test]
    fn test_limit_clause() {
        assert_eq!(limit_clause(Some(15)), " LIMIT 16");
        assert_eq!(limit_clause(None), "");
        assert_eq!(limit_clause(Some(usize::MAX)), format!(" LIMIT {}", usize::MAX));
    }
}
