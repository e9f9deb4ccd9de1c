//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout Tabula.
//! All errors are structured and map to specific error codes for JSON output
//! and to HTTP status codes in the server.
//!
//! # Error Categories
//! - `Connection`: The database could not be reached
//! - `Query`: A catalog or row query failed after validation
//! - `InvalidIdentifier`: A requested table is not in the live schema listing
//! - `Timeout`: A database operation exceeded its deadline
//! - `InvalidInput`: Malformed input or missing required parameters
//! - `Config`: Configuration file or environment errors

use thiserror::Error;

/// Main error type for Tabula operations
#[derive(Error, Debug)]
pub enum TabulaError {
    /// Database connection failed
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Query execution failed
    #[error("Query execution failed: {0}")]
    Query(String),

    /// Requested table is not one of the listed tables
    #[error("Unknown table: '{0}'")]
    InvalidIdentifier(String),

    /// Operation exceeded its deadline
    #[error("Database operation exceeded timeout of {0}ms")]
    Timeout(u64),

    /// Invalid input or missing required parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error (file not found, invalid JSON, missing env var, etc.)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TabulaError {
    /// Convert error to error code string for JSON output
    ///
    /// Error codes are stable and suitable for programmatic handling.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Connection(_) => "CONNECTION_FAILED",
            Self::Query(_) => "QUERY_FAILED",
            Self::InvalidIdentifier(_) => "INVALID_IDENTIFIER",
            Self::Timeout(_) => "TIMEOUT",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Full error message, including driver detail
    ///
    /// Suitable for logs only. Use [`TabulaError::public_message`] for anything
    /// that reaches a client.
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Client-safe message
    ///
    /// Client errors keep their message. Server-side failures collapse to a
    /// generic sentence so driver text never leaves the process.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidIdentifier(_) | Self::InvalidInput(_) => self.to_string(),
            Self::Connection(_) => "The database is currently unreachable".to_string(),
            Self::Timeout(_) => "The database did not respond in time".to_string(),
            Self::Query(_) | Self::Config(_) => {
                "The table could not be loaded due to a server error".to_string()
            }
        }
    }

    /// Whether the caller (not the server) is at fault
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidIdentifier(_) | Self::InvalidInput(_))
    }

    /// Create a connection failed error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a query failed error
    pub fn query_failed(message: impl Into<String>) -> Self {
        Self::Query(message.into())
    }

    /// Create an invalid identifier error
    pub fn invalid_identifier(identifier: impl Into<String>) -> Self {
        Self::InvalidIdentifier(identifier.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Result type alias for Tabula operations
pub type Result<T> = std::result::Result<T, TabulaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(TabulaError::connection_failed("test").error_code(), "CONNECTION_FAILED");
        assert_eq!(TabulaError::query_failed("test").error_code(), "QUERY_FAILED");
        assert_eq!(TabulaError::invalid_identifier("t").error_code(), "INVALID_IDENTIFIER");
        assert_eq!(TabulaError::Timeout(10).error_code(), "TIMEOUT");
        assert_eq!(TabulaError::invalid_input("test").error_code(), "INVALID_INPUT");
        assert_eq!(TabulaError::config_error("test").error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_public_message_hides_driver_detail() {
        let err = TabulaError::query_failed("Table 'vr.secret' doesn't exist at 10.0.0.5");
        assert!(err.message().contains("10.0.0.5"));
        assert!(!err.public_message().contains("10.0.0.5"));

        let err = TabulaError::connection_failed("Access denied for user 'root'@'localhost'");
        assert!(!err.public_message().contains("root"));

        let err = TabulaError::Timeout(2500);
        assert!(err.message().contains("2500ms"));
        assert!(!err.public_message().contains("2500"));
    }

    #[test]
    fn test_public_message_keeps_client_errors() {
        let err = TabulaError::invalid_identifier("users; DROP TABLE users;--");
        assert!(err.public_message().contains("Unknown table"));
        assert!(err.public_message().contains("users; DROP TABLE users;--"));
    }

    #[test]
    fn test_client_error_classification() {
        assert!(TabulaError::invalid_identifier("x").is_client_error());
        assert!(TabulaError::invalid_input("x").is_client_error());
        assert!(!TabulaError::connection_failed("x").is_client_error());
        assert!(!TabulaError::query_failed("x").is_client_error());
        assert!(!TabulaError::Timeout(1).is_client_error());
        assert!(!TabulaError::config_error("x").is_client_error());
    }
}
