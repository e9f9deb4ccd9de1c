//! `PostgreSQL` Database Engine Implementation
//!
//! This module implements the `DatabaseEngine` trait for `PostgreSQL` databases.
//!
//! # Features
//! - Client-server connections via TCP
//! - Table and view listing via `information_schema` for one schema
//! - Column catalog via `information_schema.columns` in ordinal order
//!
//! # Implementation Notes
//! - Uses `tokio-postgres` (async driver, requires tokio runtime)
//! - Catalog queries bind schema and table as parameters
//! - Row queries use the simple query protocol, so every cell arrives as the
//!   server's text representation regardless of its type
//! - Row limits pushed into the query as `LIMIT max_rows + 1`
//! - Schema defaults to the session's `current_schema()`

use tokio_postgres::{Client, Config, NoTls, SimpleQueryMessage, SimpleQueryRow};
use tracing::debug;

use crate::engine::{
    limit_clause, CatalogSession, ConnectionConfig, DatabaseEngine, DatabaseType, RowBatch,
};
use crate::error::{Result, TabulaError};
use crate::viewer::TableIdentifier;

/// `PostgreSQL` database engine implementation
pub struct PostgresEngine;

impl DatabaseEngine for PostgresEngine {
    type Session = PostgresSession;

    async fn connect(config: &ConnectionConfig) -> Result<PostgresSession> {
        // Validate config is for PostgreSQL
        if config.engine != DatabaseType::Postgres {
            return Err(TabulaError::invalid_input(format!(
                "Expected PostgreSQL engine, got {}",
                config.engine
            )));
        }

        let pg_config = build_pg_config(config)?;

        let (client, connection) = pg_config.connect(NoTls).await.map_err(|e| {
            TabulaError::connection_failed(format!("Failed to connect to PostgreSQL: {e}"))
        })?;

        // Spawn connection handler; it exits once the client is dropped
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!(error = %e, "postgres connection closed with error");
            }
        });

        let schema = determine_target_schema(&client, config.schema.as_deref()).await?;

        Ok(PostgresSession { client, schema })
    }
}

/// One `PostgreSQL` connection scoped to a schema
pub struct PostgresSession {
    client: Client,
    schema: String,
}

impl CatalogSession for PostgresSession {
    async fn list_tables(&mut self) -> Result<Vec<String>> {
        let query = "
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = $1
            AND table_type IN ('BASE TABLE', 'VIEW')
            ORDER BY table_name";

        let rows = self.client.query(query, &[&self.schema]).await.map_err(|e| {
            TabulaError::query_failed(format!(
                "Failed to list tables in schema '{}': {e}",
                self.schema
            ))
        })?;

        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    async fn table_columns(&mut self, table: &TableIdentifier) -> Result<Vec<String>> {
        let query = "
            SELECT column_name::text
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position";

        let rows =
            self.client.query(query, &[&self.schema, &table.as_str()]).await.map_err(|e| {
                TabulaError::query_failed(format!(
                    "Failed to query columns for {}.{table}: {e}",
                    self.schema
                ))
            })?;

        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    async fn table_rows(
        &mut self,
        table: &TableIdentifier,
        _columns: &[String],
        max_rows: Option<usize>,
    ) -> Result<RowBatch> {
        let sql = format!(
            "SELECT * FROM {}.{}{}",
            quote_identifier(&self.schema),
            quote_identifier(table.as_str()),
            limit_clause(max_rows)
        );
        debug!(sql = %sql, "postgres row query");

        let messages = self.client.simple_query(&sql).await.map_err(|e| {
            TabulaError::query_failed(format!("Failed to execute row query: {e}"))
        })?;

        let fetched = messages
            .iter()
            .filter_map(|message| match message {
                SimpleQueryMessage::Row(row) => Some(row),
                _ => None,
            })
            .map(|row| {
                (0..row.len())
                    .map(|idx| read_cell(row, idx))
                    .collect::<Result<Vec<String>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RowBatch::from_fetched(fetched, max_rows))
    }

    async fn close(self) {
        // Dropping the client ends the spawned connection task
        drop(self.client);
    }
}

/// Text of one cell from the simple-query protocol; NULL reads as empty
fn read_cell(row: &SimpleQueryRow, idx: usize) -> Result<String> {
    let cell = row.try_get(idx).map_err(|e| {
        TabulaError::query_failed(format!("Failed to read column {idx}: {e}"))
    })?;
    Ok(cell.unwrap_or_default().to_string())
}

/// Build `tokio_postgres::Config` from `ConnectionConfig`
fn build_pg_config(config: &ConnectionConfig) -> Result<Config> {
    let host = config
        .host
        .as_ref()
        .ok_or_else(|| TabulaError::invalid_input("PostgreSQL requires 'host' parameter"))?;

    let port = config.port.unwrap_or(5432);

    let user = config
        .user
        .as_ref()
        .ok_or_else(|| TabulaError::invalid_input("PostgreSQL requires 'user' parameter"))?;

    let password = config
        .password
        .as_ref()
        .ok_or_else(|| TabulaError::invalid_input("PostgreSQL requires 'password' parameter"))?;

    let database = config
        .database
        .as_ref()
        .ok_or_else(|| TabulaError::invalid_input("PostgreSQL requires 'database' parameter"))?;

    let mut pg_config = Config::new();
    pg_config.host(host).port(port).user(user).password(password).dbname(database);

    Ok(pg_config)
}

/// Determine target schema from configuration or the session's current schema
async fn determine_target_schema(client: &Client, configured: Option<&str>) -> Result<String> {
    if let Some(schema) = configured {
        return Ok(schema.to_string());
    }

    let row = client.query_one("SELECT current_schema()::text", &[]).await.map_err(|e| {
        TabulaError::query_failed(format!("Failed to query current schema: {e}"))
    })?;

    row.try_get::<_, Option<String>>(0)
        .map_err(|e| TabulaError::query_failed(format!("Failed to read current schema: {e}")))?
        .ok_or_else(|| TabulaError::config_error("No current schema; set 'schema' explicitly"))
}

/// Quote an identifier for `PostgreSQL` (double quotes, embedded quotes doubled)
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
