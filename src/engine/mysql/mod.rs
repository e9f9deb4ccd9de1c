//! MySQL Database Engine Implementation
//!
//! This module implements the `DatabaseEngine` trait for MySQL databases (including MariaDB).
//!
//! # Features
//! - Client-server connections via TCP
//! - Table and view listing via information_schema (same set as `SHOW FULL TABLES`)
//! - Column catalog via information_schema.columns in ordinal order
//!
//! # Implementation Notes
//! - Uses `mysql_async` (async driver, requires tokio runtime)
//! - Catalog queries bind the schema and table name as parameters
//! - Row queries use the text protocol, so cells arrive as the server formats them
//! - BLOB data that is not valid UTF-8 is Base64-encoded for display
//! - Row limits pushed into the query as `LIMIT max_rows + 1`

use mysql_async::{prelude::*, Conn, OptsBuilder, Row, Value};
use tracing::debug;

use crate::engine::{
    limit_clause, CatalogSession, ConnectionConfig, DatabaseEngine, DatabaseType, RowBatch,
};
use crate::error::{Result, TabulaError};
use crate::viewer::TableIdentifier;

/// MySQL database engine implementation
pub struct MySqlEngine;

impl DatabaseEngine for MySqlEngine {
    type Session = MySqlSession;

    async fn connect(config: &ConnectionConfig) -> Result<MySqlSession> {
        // Validate config is for MySQL
        if config.engine != DatabaseType::MySQL {
            return Err(TabulaError::invalid_input(format!(
                "Expected MySQL engine, got {}",
                config.engine
            )));
        }

        let (opts, schema) = build_mysql_opts(config)?;

        let conn = Conn::new(opts).await.map_err(|e| {
            TabulaError::connection_failed(format!("Failed to connect to MySQL: {e}"))
        })?;

        Ok(MySqlSession { conn, schema })
    }
}

/// One MySQL connection scoped to the configured database
pub struct MySqlSession {
    conn: Conn,
    schema: String,
}

impl CatalogSession for MySqlSession {
    async fn list_tables(&mut self) -> Result<Vec<String>> {
        let query = "SELECT table_name
                     FROM information_schema.tables
                     WHERE table_schema = ?
                     AND table_type IN ('BASE TABLE', 'VIEW', 'SYSTEM VIEW')
                     ORDER BY table_name";

        let rows: Vec<Row> = self.conn.exec(query, (self.schema.as_str(),)).await.map_err(|e| {
            TabulaError::query_failed(format!("Failed to query tables: {e}"))
        })?;

        rows.into_iter()
            .map(|row| {
                row.get::<String, _>(0).ok_or_else(|| {
                    TabulaError::query_failed("Failed to extract table name".to_string())
                })
            })
            .collect()
    }

    async fn table_columns(&mut self, table: &TableIdentifier) -> Result<Vec<String>> {
        let query = "SELECT column_name
                     FROM information_schema.columns
                     WHERE table_schema = ? AND table_name = ?
                     ORDER BY ordinal_position";

        let rows: Vec<Row> =
            self.conn.exec(query, (self.schema.as_str(), table.as_str())).await.map_err(|e| {
                TabulaError::query_failed(format!(
                    "Failed to query columns for {}.{}: {e}",
                    self.schema, table
                ))
            })?;

        rows.into_iter()
            .map(|row| {
                row.get::<String, _>(0).ok_or_else(|| {
                    TabulaError::query_failed("Failed to extract column name".to_string())
                })
            })
            .collect()
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
        debug!(sql = %sql, "mysql row query");

        let rows: Vec<Row> = self.conn.query(sql.as_str()).await.map_err(|e| {
            TabulaError::query_failed(format!("Failed to execute row query: {e}"))
        })?;

        let fetched = rows.iter().map(row_to_text).collect::<Result<Vec<_>>>()?;
        Ok(RowBatch::from_fetched(fetched, max_rows))
    }

    async fn close(self) {
        if let Err(e) = self.conn.disconnect().await {
            debug!(error = %e, "mysql disconnect failed");
        }
    }
}

/// Build MySQL connection options from `ConnectionConfig`
///
/// Returns the options and the database name the session is scoped to.
fn build_mysql_opts(config: &ConnectionConfig) -> Result<(OptsBuilder, String)> {
    let host = config
        .host
        .as_ref()
        .ok_or_else(|| TabulaError::invalid_input("MySQL requires 'host' parameter"))?;

    let port = config.port.unwrap_or(3306);

    let user = config
        .user
        .as_ref()
        .ok_or_else(|| TabulaError::invalid_input("MySQL requires 'user' parameter"))?;

    let password = config
        .password
        .as_ref()
        .ok_or_else(|| TabulaError::invalid_input("MySQL requires 'password' parameter"))?;

    let database = config
        .database
        .as_ref()
        .ok_or_else(|| TabulaError::invalid_input("MySQL requires 'database' parameter"))?;

    let opts = OptsBuilder::default()
        .ip_or_hostname(host)
        .tcp_port(port)
        .user(Some(user))
        .pass(Some(password))
        .db_name(Some(database));

    Ok((opts, database.clone()))
}

/// Quote an identifier for MySQL (backticks, embedded backticks doubled)
fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Stringify every cell of a MySQL row
fn row_to_text(row: &Row) -> Result<Vec<String>> {
    (0..row.len())
        .map(|idx| {
            row.as_ref(idx).map(mysql_value_to_text).ok_or_else(|| {
                TabulaError::query_failed(format!("Failed to get value at index {idx}"))
            })
        })
        .collect()
}

/// Convert MySQL value to its display string
fn mysql_value_to_text(value: &Value) -> String {
    match value {
        Value::NULL => String::new(),

        Value::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => {
                // Binary data - encode as Base64
                use base64::Engine;
                base64::engine::general_purpose::STANDARD.encode(bytes)
            }
        },

        Value::Int(i) => i.to_string(),

        Value::UInt(u) => u.to_string(),

        Value::Float(f) => f.to_string(),

        Value::Double(d) => d.to_string(),

        Value::Date(year, month, day, hour, minute, second, micro) => {
            if (*hour, *minute, *second, *micro) == (0, 0, 0, 0) {
                format!("{year:04}-{month:02}-{day:02}")
            } else if *micro == 0 {
                format!("{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}")
            } else {
                format!(
                    "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}.{micro:06}"
                )
            }
        }

        Value::Time(is_negative, days, hours, minutes, seconds, microseconds) => {
            let sign = if *is_negative { "-" } else { "" };
            let total_hours = days * 24 + u32::from(*hours);
            if *microseconds == 0 {
                format!("{sign}{total_hours:02}:{minutes:02}:{seconds:02}")
            } else {
                format!("{sign}{total_hours:02}:{minutes:02}:{seconds:02}.{microseconds:06}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_config() -> Option<ConnectionConfig> {
        let host = std::env::var("TABULA_TEST_MYSQL_HOST").ok()?;
        Some(ConnectionConfig::mysql(
            host,
            3306,
            std::env::var("TABULA_TEST_MYSQL_USER").unwrap_or_else(|_| "root".to_string()),
            std::env::var("TABULA_TEST_MYSQL_PASSWORD").unwrap_or_default(),
            std::env::var("TABULA_TEST_MYSQL_DATABASE").unwrap_or_else(|_| "test".to_string()),
        ))
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("events"), "`events`");
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
        assert_eq!(quote_identifier("users; DROP TABLE users;--"), "`users; DROP TABLE users;--`");
    }

    #[test]
    fn test_value_to_text() {
        assert_eq!(mysql_value_to_text(&Value::NULL), "");
        assert_eq!(mysql_value_to_text(&Value::Bytes(b"2024-01-01".to_vec())), "2024-01-01");
        assert_eq!(mysql_value_to_text(&Value::Bytes(vec![0xff, 0xfe])), "//4=");
        assert_eq!(mysql_value_to_text(&Value::Int(-7)), "-7");
        assert_eq!(mysql_value_to_text(&Value::UInt(u64::MAX)), "18446744073709551615");
        assert_eq!(mysql_value_to_text(&Value::Double(0.25)), "0.25");
    }

    #[test]
    fn test_temporal_values() {
        assert_eq!(mysql_value_to_text(&Value::Date(2024, 1, 2, 0, 0, 0, 0)), "2024-01-02");
        assert_eq!(
            mysql_value_to_text(&Value::Date(2024, 1, 2, 3, 4, 5, 0)),
            "2024-01-02 03:04:05"
        );
        assert_eq!(
            mysql_value_to_text(&Value::Date(2024, 1, 2, 3, 4, 5, 60)),
            "2024-01-02 03:04:05.000060"
        );
        assert_eq!(mysql_value_to_text(&Value::Time(true, 1, 2, 3, 4, 0)), "-26:03:04");
    }

    #[test]
    fn test_build_opts_missing_host() {
        let mut config = ConnectionConfig::mysql(
            "localhost".to_string(),
            3306,
            "root".to_string(),
            "password".to_string(),
            "test".to_string(),
        );
        config.host = None;

        let err = build_mysql_opts(&config).unwrap_err();
        assert!(err.message().contains("MySQL requires 'host' parameter"));
    }

    #[test]
    fn test_build_opts_scopes_session_to_database() {
        let config = ConnectionConfig::mysql(
            "localhost".to_string(),
            3306,
            "root".to_string(),
            "password".to_string(),
            "vr_stats".to_string(),
        );
        let (_, schema) = build_mysql_opts(&config).unwrap();
        assert_eq!(schema, "vr_stats");
    }

    #[tokio::test]
    async fn test_connect_wrong_engine() {
        let mut config = ConnectionConfig::mysql(
            "localhost".to_string(),
            3306,
            "root".to_string(),
            "password".to_string(),
            "test".to_string(),
        );
        config.engine = DatabaseType::Postgres;

        let result = MySqlEngine::connect(&config).await;
        assert!(matches!(
            result,
            Err(TabulaError::InvalidInput(ref m)) if m.contains("Expected MySQL engine")
        ));
    }

    // Live tests need a reachable server:
    // TABULA_TEST_MYSQL_HOST=127.0.0.1 cargo test --features mysql -- --ignored
    #[tokio::test]
    #[ignore]
    async fn test_live_listing_and_rows() {
        let Some(config) = live_config() else { return };
        let mut session = MySqlEngine::connect(&config).await.expect("connect");

        session.conn.query_drop("DROP TABLE IF EXISTS tabula_events").await.unwrap();
        session
            .conn
            .query_drop("CREATE TABLE tabula_events (id INT, ts DATE, payload VARCHAR(8))")
            .await
            .unwrap();
        session
            .conn
            .query_drop(
                "INSERT INTO tabula_events VALUES (1, '2024-01-01', 'a'), (2, '2024-01-02', NULL)",
            )
            .await
            .unwrap();

        let tables = session.list_tables().await.unwrap();
        assert!(tables.iter().any(|t| t == "tabula_events"));

        let table = TableIdentifier::from_catalog("tabula_events".to_string());
        let columns = session.table_columns(&table).await.unwrap();
        assert_eq!(columns, vec!["id", "ts", "payload"]);

        let batch = session.table_rows(&table, &columns, None).await.unwrap();
        assert_eq!(batch.rows, vec![vec!["1", "2024-01-01", "a"], vec!["2", "2024-01-02", ""]]);

        session.conn.query_drop("DROP TABLE tabula_events").await.unwrap();
        session.close().await;
    }
}
