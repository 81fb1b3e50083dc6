//! Configuration rows and load status types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Free-form backend options attached to a library row.
pub type LibraryOptions = BTreeMap<String, String>;

/// Which cache a library lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryScope {
    /// Shared by every manager in the process.
    Global,
    /// Local to one manager instance.
    Project,
}

impl LibraryScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            LibraryScope::Global => "global",
            LibraryScope::Project => "project",
        }
    }
}

impl fmt::Display for LibraryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One configured library, as supplied by the table loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryRow {
    /// Unique within its scope.
    pub nickname: String,
    pub type_tag: String,
    pub uri: String,
    pub scope: LibraryScope,
    #[serde(default)]
    pub options: LibraryOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl LibraryRow {
    pub fn new(
        nickname: impl Into<String>,
        type_tag: impl Into<String>,
        uri: impl Into<String>,
        scope: LibraryScope,
    ) -> Self {
        Self {
            nickname: nickname.into(),
            type_tag: type_tag.into(),
            uri: uri.into(),
            scope,
            options: LibraryOptions::new(),
            description: None,
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// True when both rows load the same content the same way.
    ///
    /// The description is display-only and does not count.
    pub fn same_source(&self, other: &LibraryRow) -> bool {
        self.type_tag.eq_ignore_ascii_case(&other.type_tag)
            && self.uri == other.uri
            && self.scope == other.scope
            && self.options == other.options
    }
}

/// Load state of one cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Unloaded,
    Loading,
    Loaded,
    LoadError,
}

impl LoadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadStatus::Unloaded => "unloaded",
            LoadStatus::Loading => "loading",
            LoadStatus::Loaded => "loaded",
            LoadStatus::LoadError => "load_error",
        }
    }

    /// A load attempt has finished, successfully or not.
    pub fn is_settled(&self) -> bool {
        matches!(self, LoadStatus::Loaded | LoadStatus::LoadError)
    }
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_from_table_json() {
        let json = r#"{
            "nickname": "Connectors",
            "typeTag": "dir",
            "uri": "/libs/connectors",
            "scope": "global",
            "options": { "extension": "sym" }
        }"#;

        let row: LibraryRow = serde_json::from_str(json).unwrap();
        assert_eq!(row.nickname, "Connectors");
        assert_eq!(row.scope, LibraryScope::Global);
        assert_eq!(row.options.get("extension").map(String::as_str), Some("sym"));
        assert!(row.description.is_none());
    }

    #[test]
    fn test_options_default_to_empty() {
        let json = r#"{"nickname":"B","typeTag":"dir","uri":"/b","scope":"project"}"#;
        let row: LibraryRow = serde_json::from_str(json).unwrap();
        assert!(row.options.is_empty());
    }

    #[test]
    fn test_same_source_ignores_description() {
        let a = LibraryRow::new("A", "dir", "/a", LibraryScope::Global);
        let mut described = a.clone();
        described.description = Some("Analog parts".into());
        assert!(a.same_source(&described));

        let moved = LibraryRow::new("A", "dir", "/elsewhere", LibraryScope::Global);
        assert!(!a.same_source(&moved));

        let filtered = a.clone().with_option("extension", "sym");
        assert!(!a.same_source(&filtered));
    }

    #[test]
    fn test_settled_statuses() {
        assert!(LoadStatus::Loaded.is_settled());
        assert!(LoadStatus::LoadError.is_settled());
        assert!(!LoadStatus::Loading.is_settled());
        assert!(!LoadStatus::Unloaded.is_settled());
        assert_eq!(LoadStatus::LoadError.to_string(), "load_error");
    }
}
