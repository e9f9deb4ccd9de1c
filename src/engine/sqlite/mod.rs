//! `SQLite` Database Engine Implementation
//!
//! This module implements the `DatabaseEngine` trait for `SQLite` databases.
//!
//! # Features
//! - File-based connections, opened read-only
//! - Table and view listing via `sqlite_master`
//! - Column catalog via the `pragma_table_info` table-valued function
//!
//! # Implementation Notes
//! - Uses `rusqlite` (synchronous driver)
//! - Every call runs on tokio's blocking pool, so request deadlines can fire
//!   while a statement is executing
//! - A statement still running when its caller gives up is interrupted
//! - BLOB data is Base64-encoded for display
//! - Lock waits bounded via `busy_timeout`
//! - Row limits pushed into the query as `LIMIT max_rows + 1`
//! - No explicit schema support (`SQLite` uses catalogs)

use rusqlite::types::ValueRef;
use rusqlite::{Connection, InterruptHandle, OpenFlags, Row};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::engine::{
    limit_clause, CatalogSession, ConnectionConfig, DatabaseEngine, DatabaseType, RowBatch,
};
use crate::error::{Result, TabulaError};
use crate::viewer::TableIdentifier;

/// How long a reader waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// `SQLite` database engine implementation
pub struct SqliteEngine;

impl DatabaseEngine for SqliteEngine {
    type Session = SqliteSession;

    async fn connect(config: &ConnectionConfig) -> Result<SqliteSession> {
        // Validate config is for SQLite
        if config.engine != DatabaseType::SQLite {
            return Err(TabulaError::invalid_input(format!(
                "Expected SQLite engine, got {}",
                config.engine
            )));
        }

        let file_path = config.file.clone().ok_or_else(|| {
            TabulaError::invalid_input("SQLite requires 'file' parameter")
        })?;

        let conn = tokio::task::spawn_blocking(move || open_read_only(file_path))
            .await
            .map_err(|e| {
                TabulaError::connection_failed(format!("spawn_blocking join error: {e}"))
            })??;

        Ok(SqliteSession { conn: Some(conn) })
    }
}

fn open_read_only(file_path: PathBuf) -> Result<Connection> {
    let conn = Connection::open_with_flags(&file_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| {
            TabulaError::connection_failed(format!("Failed to open SQLite database: {e}"))
        })?;

    conn.busy_timeout(BUSY_TIMEOUT).map_err(|e| {
        TabulaError::connection_failed(format!("Failed to set busy timeout: {e}"))
    })?;

    Ok(conn)
}

/// Read-only connection to one `SQLite` file
///
/// The connection travels to the blocking pool for each call and comes back
/// when the call finishes. It is `None` only while a call is in flight or
/// after a call was abandoned.
pub struct SqliteSession {
    conn: Option<Connection>,
}

impl SqliteSession {
    /// Run `op` against the connection on the blocking pool
    ///
    /// If the returned future is dropped before `op` finishes, the running
    /// statement is interrupted and the connection is closed by the worker.
    async fn run<T, F>(&mut self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.take().ok_or_else(|| {
            TabulaError::query_failed("SQLite session was abandoned by an earlier call")
        })?;

        let guard = InterruptOnDrop::arm(conn.get_interrupt_handle());
        let (conn, result) = tokio::task::spawn_blocking(move || {
            let result = op(&conn);
            (conn, result)
        })
        .await
        .map_err(|e| {
            TabulaError::query_failed(format!("spawn_blocking join error: {e}"))
        })?;
        guard.disarm();

        self.conn = Some(conn);
        result
    }
}

/// Interrupts the connection's running statement unless disarmed
struct InterruptOnDrop {
    handle: Option<InterruptHandle>,
}

impl InterruptOnDrop {
    fn arm(handle: InterruptHandle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    fn disarm(mut self) {
        self.handle = None;
    }
}

impl Drop for InterruptOnDrop {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("interrupting abandoned sqlite statement");
            handle.interrupt();
        }
    }
}

impl CatalogSession for SqliteSession {
    async fn list_tables(&mut self) -> Result<Vec<String>> {
        self.run(query_tables).await
    }

    async fn table_columns(&mut self, table: &TableIdentifier) -> Result<Vec<String>> {
        let table = table.clone();
        self.run(move |conn| query_columns(conn, &table)).await
    }

    async fn table_rows(
        &mut self,
        table: &TableIdentifier,
        _columns: &[String],
        max_rows: Option<usize>,
    ) -> Result<RowBatch> {
        let table = table.clone();
        self.run(move |conn| query_rows(conn, &table, max_rows))
            .await
    }

    async fn close(self) {
        if let Some(conn) = self.conn {
            if let Err((_, e)) = conn.close() {
                debug!(error = %e, "sqlite close failed");
            }
        }
    }
}

fn query_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type IN ('table', 'view')
             AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )
        .map_err(|e| {
            TabulaError::query_failed(format!("Failed to query tables: {e}"))
        })?;

    let tables = stmt
        .query_map([], |row| row.get(0))
        .map_err(|e| {
            TabulaError::query_failed(format!("Failed to fetch table names: {e}"))
        })?
        .collect::<std::result::Result<Vec<String>, _>>()
        .map_err(|e| {
            TabulaError::query_failed(format!("Failed to collect table names: {e}"))
        })?;

    Ok(tables)
}

fn query_columns(conn: &Connection, table: &TableIdentifier) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
        .map_err(|e| {
            TabulaError::query_failed(format!("Failed to prepare table_info for {table}: {e}"))
        })?;

    let columns = stmt
        .query_map([table.as_str()], |row| row.get(0))
        .map_err(|e| {
            TabulaError::query_failed(format!("Failed to query columns for {table}: {e}"))
        })?
        .collect::<std::result::Result<Vec<String>, _>>()
        .map_err(|e| {
            TabulaError::query_failed(format!("Failed to collect columns for {table}: {e}"))
        })?;

    Ok(columns)
}

fn query_rows(
    conn: &Connection,
    table: &TableIdentifier,
    max_rows: Option<usize>,
) -> Result<RowBatch> {
    let sql = format!(
        "SELECT * FROM {}{}",
        quote_identifier(table.as_str()),
        limit_clause(max_rows)
    );
    debug!(sql = %sql, "sqlite row query");

    let mut stmt = conn.prepare(&sql).map_err(|e| {
        TabulaError::query_failed(format!("Failed to prepare row query: {e}"))
    })?;
    let width = stmt.column_count();

    let mut rows = stmt.query([]).map_err(|e| {
        TabulaError::query_failed(format!("Failed to execute row query: {e}"))
    })?;

    let mut fetched = Vec::new();
    while let Some(row) = rows.next().map_err(|e| {
        TabulaError::query_failed(format!("Failed to fetch row: {e}"))
    })? {
        fetched.push(row_to_text(row, width)?);
    }

    Ok(RowBatch::from_fetched(fetched, max_rows))
}

/// Quote an identifier for `SQLite` (double quotes, embedded quotes doubled)
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Stringify every cell of a `SQLite` row
fn row_to_text(row: &Row, width: usize) -> Result<Vec<String>> {
    (0..width)
        .map(|idx| {
            row.get_ref(idx).map(sqlite_value_to_text).map_err(|e| {
                TabulaError::query_failed(format!("Failed to read column {idx}: {e}"))
            })
        })
        .collect()
}

/// Convert `SQLite` value to its display string
fn sqlite_value_to_text(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(s) => String::from_utf8_lossy(s).into_owned(),
        ValueRef::Blob(b) => {
            // Encode BLOB as Base64 for display
            use base64::Engine;
            base64::engine::general_purpose::STANDARD.encode(b)
        }
    }
}
