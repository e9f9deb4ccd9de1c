//! Validated table names

use serde::{Serialize, Serializer};

use crate::error::{Result, TabulaError};

/// Name of a table that the live schema listing reported
///
/// There is no public way to build one from arbitrary text: values come
/// either from the catalog itself or from [`TableIdentifier::validate`], which
/// requires an exact, case-sensitive match against the listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableIdentifier(String);

impl TableIdentifier {
    /// Wrap a name reported by the engine catalog
    pub(crate) fn from_catalog(name: String) -> Self {
        Self(name)
    }

    /// Accept `candidate` only if it is one of `known`
    pub fn validate(candidate: &str, known: &[TableIdentifier]) -> Result<Self> {
        known
            .iter()
            .find(|table| table.0 == candidate)
            .cloned()
            .ok_or_else(|| TabulaError::invalid_identifier(candidate))
    }

    /// The raw table name
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TableIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TableIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for TableIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> Vec<TableIdentifier> {
        ["events", "logs", "Events2"]
            .into_iter()
            .map(|name| TableIdentifier::from_catalog(name.to_string()))
            .collect()
    }

    #[test]
    fn test_validate_exact_match() {
        let table = TableIdentifier::validate("logs", &known()).unwrap();
        assert_eq!(table.as_str(), "logs");
    }

    #[test]
    fn test_validate_is_case_sensitive() {
        let err = TableIdentifier::validate("EVENTS", &known()).unwrap_err();
        assert!(matches!(err, TabulaError::InvalidIdentifier(ref name) if name == "EVENTS"));

        assert!(TableIdentifier::validate("events2", &known()).is_err());
        assert!(TableIdentifier::validate("Events2", &known()).is_ok());
    }

    #[test]
    fn test_validate_rejects_near_misses() {
        for candidate in ["", " events", "events ", "logs;", "`logs`", "\"logs\"", "events\0"] {
            assert!(
                TableIdentifier::validate(candidate, &known()).is_err(),
                "{candidate:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_against_empty_listing() {
        assert!(TableIdentifier::validate("events", &[]).is_err());
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let table = TableIdentifier::from_catalog("events".to_string());
        assert_eq!(serde_json::to_string(&table).unwrap(), r#""events""#);
    }
}
