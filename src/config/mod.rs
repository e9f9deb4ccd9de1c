//! Configuration Management
//!
//! This module loads the database connection, server and limit settings once
//! at process start.
//!
//! # Configuration Locations
//! - Explicit: `--config <path>` (must exist)
//! - Local: `.tabula/config.json` (per-deployment directory)
//! - Global: `~/.config/tabula/config.json` (per-user)
//!
//! The first file found wins; files are not merged.
//!
//! # Environment Overrides
//! Applied after the file, field by field:
//! `TABULA_DB_ENGINE`, `TABULA_DB_HOST`, `TABULA_DB_PORT`, `TABULA_DB_USER`,
//! `TABULA_DB_PASSWORD`, `TABULA_DB_NAME`, `TABULA_DB_SCHEMA`,
//! `TABULA_DB_FILE`, `TABULA_BIND`, `TABULA_STATIC_DIR`, `TABULA_MAX_ROWS`,
//! `TABULA_TIMEOUT_MS`.
//!
//! # Secrets
//! Passwords may be stored indirectly through `password_env`, naming an
//! environment variable that holds the secret.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::engine::{ConnectionConfig, DatabaseType, Limits};
use crate::error::{Result, TabulaError};

/// Fully resolved configuration
#[derive(Debug, Clone)]
pub struct TabulaConfig {
    /// Database to browse, password resolved
    pub connection: ConnectionConfig,

    /// HTTP listener settings
    pub server: ServerConfig,

    /// Row and time bounds per request
    pub limits: Limits,
}

/// Configuration file contents (`config.json`)
///
/// Example:
/// ```json
/// {
///   "database": {
///     "engine": "mysql",
///     "host": "localhost",
///     "user": "vrstats",
///     "password_env": "VRSTATS_DB_PASSWORD",
///     "database": "vr_stats"
///   },
///   "server": { "bind": "0.0.0.0:8080" },
///   "limits": { "max_rows": 5000, "timeout_ms": 10000 }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Database connection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<StoredConnection>,

    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Row and time bounds per request
    #[serde(default)]
    pub limits: Limits,
}

/// Stored connection configuration
///
/// Similar to `ConnectionConfig` but supports environment variable references
/// for sensitive fields like passwords.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredConnection {
    /// Connection configuration
    #[serde(flatten)]
    pub config: ConnectionConfig,

    /// Environment variable name for password (if not storing password directly)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,
}

impl StoredConnection {
    /// Resolve environment variables and return a `ConnectionConfig`
    pub fn resolve(&self, env: impl Fn(&str) -> Option<String>) -> Result<ConnectionConfig> {
        let mut config = self.config.clone();

        // If password_env is set, resolve the environment variable
        if let Some(env_var) = &self.password_env {
            match env(env_var) {
                Some(password) => config.password = Some(password),
                None => {
                    return Err(TabulaError::config_error(format!(
                        "Environment variable {env_var} not found for password"
                    )));
                }
            }
        }

        Ok(config)
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Directory served under `/static`
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            static_dir: default_static_dir(),
        }
    }
}

impl ConfigFile {
    /// Apply `TABULA_*` overrides read through `env`
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(engine) = env("TABULA_DB_ENGINE") {
            let engine = DatabaseType::from_str(&engine)?;
            match &mut self.database {
                Some(stored) => stored.config.engine = engine,
                None => {
                    self.database = Some(StoredConnection {
                        config: empty_connection(engine),
                        password_env: None,
                    });
                }
            }
        }

        if let Some(stored) = &mut self.database {
            let config = &mut stored.config;
            if let Some(host) = env("TABULA_DB_HOST") {
                config.host = Some(host);
            }
            if let Some(port) = env("TABULA_DB_PORT") {
                config.port = Some(parse_env("TABULA_DB_PORT", &port)?);
            }
            if let Some(user) = env("TABULA_DB_USER") {
                config.user = Some(user);
            }
            if let Some(password) = env("TABULA_DB_PASSWORD") {
                config.password = Some(password);
                stored.password_env = None;
            }
            if let Some(database) = env("TABULA_DB_NAME") {
                config.database = Some(database);
            }
            if let Some(schema) = env("TABULA_DB_SCHEMA") {
                config.schema = Some(schema);
            }
            if let Some(file) = env("TABULA_DB_FILE") {
                config.file = Some(PathBuf::from(file));
            }
        }

        if let Some(bind) = env("TABULA_BIND") {
            self.server.bind = parse_env("TABULA_BIND", &bind)?;
        }
        if let Some(dir) = env("TABULA_STATIC_DIR") {
            self.server.static_dir = PathBuf::from(dir);
        }
        if let Some(max_rows) = env("TABULA_MAX_ROWS") {
            self.limits.max_rows = parse_optional_env("TABULA_MAX_ROWS", &max_rows)?;
        }
        if let Some(timeout) = env("TABULA_TIMEOUT_MS") {
            self.limits.timeout_ms = parse_optional_env("TABULA_TIMEOUT_MS", &timeout)?;
        }

        Ok(())
    }

    /// Resolve secrets, fill default ports and validate
    pub fn resolve(self, env: impl Fn(&str) -> Option<String>) -> Result<TabulaConfig> {
        let stored = self.database.ok_or_else(|| {
            TabulaError::config_error(
                "No database configured: add a \"database\" section or set TABULA_DB_ENGINE",
            )
        })?;

        let mut connection = stored.resolve(env)?;
        if connection.port.is_none() {
            connection.port = connection.engine.default_port();
        }
        connection.validate()?;

        Ok(TabulaConfig {
            connection,
            server: self.server,
            limits: self.limits,
        })
    }
}

fn empty_connection(engine: DatabaseType) -> ConnectionConfig {
    ConnectionConfig {
        engine,
        host: None,
        port: None,
        user: None,
        password: None,
        database: None,
        schema: None,
        file: None,
    }
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| TabulaError::config_error(format!("Invalid value for {name}: '{value}'")))
}

/// `none`, `off` or `0` disable the bound
fn parse_optional_env<T: FromStr>(name: &str, value: &str) -> Result<Option<T>> {
    match value.trim().to_ascii_lowercase().as_str() {
        "none" | "off" | "0" => Ok(None),
        _ => parse_env(name, value).map(Some),
    }
}

/// Get path to local config file (`.tabula/config.json`)
pub fn local_config_path() -> Result<PathBuf> {
    let current_dir = std::env::current_dir().map_err(|e| {
        TabulaError::config_error(format!("Could not determine current directory: {e}"))
    })?;

    Ok(current_dir.join(".tabula").join("config.json"))
}

/// Get path to global config file (`~/.config/tabula/config.json`)
pub fn global_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| TabulaError::config_error("Could not determine user config directory"))?;

    Ok(config_dir.join("tabula").join("config.json"))
}

/// Pick the config file to read
///
/// An explicit path must exist. Otherwise the local file is preferred over the
/// global one, and `None` means neither exists.
pub fn locate_config(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(TabulaError::config_error(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        return Ok(Some(path.to_path_buf()));
    }

    for candidate in [local_config_path()?, global_config_path()?] {
        if candidate.exists() {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

/// Load a config file
pub fn load_file(path: &Path) -> Result<ConfigFile> {
    let contents = fs::read_to_string(path)
        .map_err(|e| TabulaError::config_error(format!("Could not read config file: {e}")))?;

    serde_json::from_str(&contents)
        .map_err(|e| TabulaError::config_error(format!("Invalid config file format: {e}")))
}

/// Load the process configuration: file, then environment, then validation
pub fn load(explicit: Option<&Path>) -> Result<TabulaConfig> {
    let mut file = match locate_config(explicit)? {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading configuration");
            load_file(&path)?
        }
        None => ConfigFile::default(),
    };

    file.apply_env(|name| std::env::var(name).ok())?;
    file.resolve(|name| std::env::var(name).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    fn no_env() -> impl Fn(&str) -> Option<String> {
        |_| None
    }

    #[test]
    fn test_config_file_parsing() {
        let json = r#"{
            "database": {
                "engine": "mysql",
                "host": "localhost",
                "user": "vrstats",
                "password": "secret",
                "database": "vr_stats"
            },
            "limits": { "max_rows": 500 }
        }"#;

        let file: ConfigFile = serde_json::from_str(json).unwrap();
        let config = file.resolve(no_env()).unwrap();

        assert_eq!(config.connection.engine, DatabaseType::MySQL);
        assert_eq!(config.connection.port, Some(3306));
        assert_eq!(config.server.bind, default_bind());
        assert_eq!(config.limits.max_rows, Some(500));
        assert_eq!(config.limits.timeout_ms, Some(10_000));
    }

    #[test]
    fn test_stored_connection_resolve_direct_password() {
        let stored = StoredConnection {
            config: ConnectionConfig::postgres(
                "localhost".to_string(),
                5432,
                "user".to_string(),
                "direct_password".to_string(),
                "db".to_string(),
            ),
            password_env: None,
        };

        let config = stored.resolve(no_env()).unwrap();
        assert_eq!(config.password, Some("direct_password".to_string()));
    }

    #[test]
    fn test_stored_connection_resolve_env_var() {
        let mut base = empty_connection(DatabaseType::MySQL);
        base.host = Some("localhost".to_string());
        let stored = StoredConnection {
            config: base,
            password_env: Some("VR_DB_PASS".to_string()),
        };

        let config = stored.resolve(env_from(&[("VR_DB_PASS", "from_env")])).unwrap();
        assert_eq!(config.password, Some("from_env".to_string()));
    }

    #[test]
    fn test_stored_connection_resolve_missing_env_var() {
        let stored = StoredConnection {
            config: empty_connection(DatabaseType::MySQL),
            password_env: Some("MISSING_PASSWORD_VAR".to_string()),
        };

        let err = stored.resolve(no_env()).unwrap_err();
        assert!(err.message().contains("MISSING_PASSWORD_VAR"));
    }

    #[test]
    fn test_env_only_configuration() {
        let env = env_from(&[
            ("TABULA_DB_ENGINE", "sqlite"),
            ("TABULA_DB_FILE", "/var/lib/vr/stats.db"),
            ("TABULA_BIND", "0.0.0.0:9000"),
            ("TABULA_MAX_ROWS", "off"),
            ("TABULA_TIMEOUT_MS", "2500"),
        ]);

        let mut file = ConfigFile::default();
        file.apply_env(&env).unwrap();
        let config = file.resolve(&env).unwrap();

        assert_eq!(config.connection.engine, DatabaseType::SQLite);
        assert_eq!(config.connection.file, Some(PathBuf::from("/var/lib/vr/stats.db")));
        assert_eq!(config.server.bind, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.limits.max_rows, None);
        assert_eq!(config.limits.timeout_ms, Some(2500));
    }

    #[test]
    fn test_env_overrides_file_and_drops_password_env() {
        let json = r#"{
            "database": {
                "engine": "mysql",
                "host": "db-a",
                "user": "vrstats",
                "password_env": "NOT_SET_ANYWHERE",
                "database": "vr_stats"
            }
        }"#;
        let env = env_from(&[("TABULA_DB_HOST", "db-b"), ("TABULA_DB_PASSWORD", "pw")]);

        let mut file: ConfigFile = serde_json::from_str(json).unwrap();
        file.apply_env(&env).unwrap();
        let config = file.resolve(&env).unwrap();

        assert_eq!(config.connection.host.as_deref(), Some("db-b"));
        assert_eq!(config.connection.password.as_deref(), Some("pw"));
    }

    #[test]
    fn test_invalid_env_values_are_config_errors() {
        let mut file = ConfigFile::default();
        let err = file.apply_env(env_from(&[("TABULA_BIND", "not-an-address")])).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");

        let err = file.apply_env(env_from(&[("TABULA_DB_ENGINE", "oracle")])).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_missing_database_section() {
        let err = ConfigFile::default().resolve(no_env()).unwrap_err();
        assert!(err.message().contains("No database configured"));
    }

    #[test]
    fn test_incomplete_connection_rejected() {
        let env = env_from(&[("TABULA_DB_ENGINE", "postgres"), ("TABULA_DB_HOST", "pg")]);
        let mut file = ConfigFile::default();
        file.apply_env(&env).unwrap();

        let err = file.resolve(&env).unwrap_err();
        assert!(err.message().contains("PostgreSQL requires 'user' parameter"));
    }

    #[test]
    fn test_locate_explicit_missing_file() {
        let path = std::env::temp_dir().join("tabula_no_such_config.json");
        let _ = fs::remove_file(&path);
        assert!(locate_config(Some(path.as_path())).is_err());
    }

    #[test]
    fn test_load_file_round_trip() {
        let name = format!("tabula_cfg_{}.json", std::process::id());
        let path = std::env::temp_dir().join(name);
        let body = r#"{
            "database": {"engine": "sqlite", "file": "stats.db"},
            "server": {"static_dir": "assets"}
        }"#;
        fs::write(&path, body).unwrap();

        let file = load_file(&path).unwrap();
        assert_eq!(file.server.static_dir, PathBuf::from("assets"));
        assert_eq!(file.server.bind, default_bind());
        assert_eq!(locate_config(Some(path.as_path())).unwrap(), Some(path.clone()));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_file_invalid_json() {
        let path = std::env::temp_dir().join(format!("tabula_bad_{}.json", std::process::id()));
        fs::write(&path, "{ not json").unwrap();

        let err = load_file(&path).unwrap_err();
        assert!(err.message().contains("Invalid config file format"));

        let _ = fs::remove_file(&path);
    }
}
