//! Page and fragment templates
//!
//! Rendered by askama from `templates/`. Every interpolated value is
//! HTML-escaped by askama, including table names and cell text.

use askama::Template;

use crate::viewer::TableSnapshot;

/// Landing page with the table selector
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate<'a> {
    pub title: &'a str,
    pub tables: Vec<String>,
    pub notice: Option<String>,
}

/// `<table>` fragment for one snapshot
#[derive(Template)]
#[template(path = "table.html")]
pub struct TableTemplate<'a> {
    pub columns: &'a [String],
    pub rows: &'a [Vec<String>],
    pub truncated: bool,
}

impl<'a> TableTemplate<'a> {
    pub fn new(snapshot: &'a TableSnapshot) -> Self {
        Self {
            columns: &snapshot.columns,
            rows: &snapshot.rows,
            truncated: snapshot.truncated,
        }
    }
}

/// Error state shown in place of a table
#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub message: String,
}
