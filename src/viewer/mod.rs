//! Schema Listing and Table Rendering
//!
//! The two operations the application exists for:
//! - [`list_tables`]: every table and view the configured credential can see
//! - [`render_table`]: columns and stringified rows for one listed table
//!
//! Both are generic over [`CatalogSession`] so they run unchanged against any
//! engine. [`Viewer`] binds them to a configuration: it opens one session per
//! call, applies the request deadline, and closes the session on every path.
//!
//! # Identifier Safety
//! `render_table` re-lists the schema and requires an exact, case-sensitive
//! match before any per-table SQL is built. Engines only ever receive a
//! [`TableIdentifier`], never caller text.

mod identifier;

pub use identifier::TableIdentifier;

use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::engine::{CatalogSession, ConnectionConfig, DatabaseType, Limits, RowBatch, Session};
use crate::error::{Result, TabulaError};

/// Columns and rows produced for one rendering request
///
/// Built fresh per request and never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSnapshot {
    /// Table the snapshot was taken from
    pub identifier: TableIdentifier,

    /// Column names in catalog order
    pub columns: Vec<String>,

    /// Rows in engine scan order; NULL cells are empty strings
    pub rows: Vec<Vec<String>>,

    /// True when the row limit cut the table short
    pub truncated: bool,
}

impl TableSnapshot {
    /// Number of rows in the snapshot
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// List every table and view visible in the configured database
pub async fn list_tables<S: CatalogSession>(session: &mut S) -> Result<Vec<TableIdentifier>> {
    let names = session.list_tables().await?;
    debug!(tables = names.len(), "listed tables");
    Ok(names.into_iter().map(TableIdentifier::from_catalog).collect())
}

/// Snapshot the table named by `identifier`
///
/// Fails with [`TabulaError::InvalidIdentifier`] before touching any table
/// data when `identifier` is not in the live listing.
pub async fn render_table<S: CatalogSession>(
    session: &mut S,
    identifier: &str,
    max_rows: Option<usize>,
) -> Result<TableSnapshot> {
    let known = list_tables(session).await?;
    let table = TableIdentifier::validate(identifier, &known).map_err(|e| {
        warn!(requested = %identifier.escape_debug(), "rejected unknown table");
        e
    })?;

    let columns = session.table_columns(&table).await?;
    let batch = if columns.is_empty() {
        RowBatch::default()
    } else {
        session.table_rows(&table, &columns, max_rows).await?
    };

    if let Some(row) = batch.rows.iter().find(|row| row.len() != columns.len()) {
        return Err(TabulaError::query_failed(format!(
            "Row width {} does not match {} catalog columns for '{table}'",
            row.len(),
            columns.len()
        )));
    }

    debug!(table = %table, columns = columns.len(), rows = batch.rows.len(), "rendered table");

    Ok(TableSnapshot {
        identifier: table,
        columns,
        rows: batch.rows,
        truncated: batch.truncated,
    })
}

/// Configured entry point used by the HTTP server and the CLI
#[derive(Debug, Clone)]
pub struct Viewer {
    connection: ConnectionConfig,
    limits: Limits,
}

impl Viewer {
    /// Create a viewer over `connection` with the given resource bounds
    #[must_use]
    pub const fn new(connection: ConnectionConfig, limits: Limits) -> Self {
        Self { connection, limits }
    }

    /// Engine this viewer talks to
    #[must_use]
    pub const fn engine(&self) -> DatabaseType {
        self.connection.engine
    }

    /// [`list_tables`] over a fresh session
    pub async fn list_tables(&self) -> Result<Vec<TableIdentifier>> {
        let work = async {
            let mut session = Session::open(&self.connection).await?;
            let tables = list_tables(&mut session).await;
            session.close().await;
            tables
        };
        within_deadline(self.limits.timeout(), work).await
    }

    /// [`render_table`] over a fresh session
    pub async fn render_table(&self, identifier: &str) -> Result<TableSnapshot> {
        let work = async {
            let mut session = Session::open(&self.connection).await?;
            let snapshot = render_table(&mut session, identifier, self.limits.max_rows).await;
            session.close().await;
            snapshot
        };
        within_deadline(self.limits.timeout(), work).await
    }
}

/// Run `work`, failing with [`TabulaError::Timeout`] once `deadline` elapses
///
/// On timeout `work` is dropped, which drops any session it holds.
async fn within_deadline<T>(
    deadline: Option<Duration>,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    match deadline {
        Some(limit) => tokio::time::timeout(limit, work)
            .await
            .map_err(|_| TabulaError::Timeout(limit.as_millis() as u64))?,
        None => work.await,
    }
}
