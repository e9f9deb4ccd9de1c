//! Tabula - Database Table Viewer
//!
//! Tabula serves a small web page for browsing the tables of one configured
//! database: a selector populated from the live schema listing, and an HTML
//! table for whichever entry is picked.
//!
//! # Core Principles
//! - Only names the schema reports can be rendered (exact, case-sensitive match)
//! - Unvalidated text never reaches SQL
//! - One connection per request, released on every path
//! - Every request bounded by a row limit and a deadline
//! - Driver errors are logged, never shown to clients
//!
//! # Module Organization
//! - [`error`] - Error types and handling
//! - [`output`] - JSON output envelope types
//! - [`config`] - Configuration management
//! - [`engine`] - Database engine traits and implementations
//! - [`viewer`] - Schema listing and table rendering
//! - [`server`] - HTTP routes, handlers and templates

pub mod config; // Configuration file and environment overrides
pub mod engine; // Database engine traits and implementations
pub mod error; // Error handling infrastructure
pub mod output; // JSON output envelopes
pub mod server; // axum router and askama templates
pub mod viewer; // Listing, validation and rendering

// Re-export commonly used types for convenience
pub use config::{ConfigFile, ServerConfig, StoredConnection, TabulaConfig};
pub use engine::{ConnectionConfig, DatabaseType, Limits};
pub use error::{Result, TabulaError};
pub use output::{ErrorEnvelope, ErrorInfo, Metadata, SuccessEnvelope};
pub use viewer::{TableIdentifier, TableSnapshot, Viewer};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_exports() {
        let limits = Limits::default();
        assert_eq!(limits.max_rows, Some(10_000));
        assert_eq!(DatabaseType::MySQL.as_str(), "mysql");
    }
}
