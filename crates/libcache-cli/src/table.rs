//! Library table file loading.
//!
//! A table is JSON: either a bare array of rows or an object with a
//! `libraries` array.

use anyhow::{bail, Context, Result};
use libcache::{LibraryRow, LibraryScope};
use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize)]
#[serde(untagged)]
enum TableFile {
    Rows(Vec<LibraryRow>),
    Wrapped { libraries: Vec<LibraryRow> },
}

/// Parse a table and check it for empty fields.
pub fn parse_table(content: &str) -> Result<Vec<LibraryRow>> {
    let rows = match serde_json::from_str::<TableFile>(content)
        .context("Library table is not a JSON array of rows or a {\"libraries\": [...]} object")?
    {
        TableFile::Rows(rows) => rows,
        TableFile::Wrapped { libraries } => libraries,
    };

    for (index, row) in rows.iter().enumerate() {
        if row.nickname.trim().is_empty() {
            bail!("Row {} has an empty nickname", index);
        }
        if row.type_tag.trim().is_empty() {
            bail!("Library '{}' has an empty typeTag", row.nickname);
        }
    }
    Ok(rows)
}

pub fn read_table(path: &Path) -> Result<Vec<LibraryRow>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read library table {}", path.display()))?;
    parse_table(&content).with_context(|| format!("Invalid library table {}", path.display()))
}

/// Override the scope of every row, e.g. to load a global table as a project one.
pub fn force_scope(rows: &mut [LibraryRow], scope: LibraryScope) {
    for row in rows {
        row.scope = scope;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_array() {
        let rows = parse_table(
            r#"[{"nickname":"A","typeTag":"dir","uri":"/a","scope":"global"}]"#,
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].scope, LibraryScope::Global);
    }

    #[test]
    fn test_parse_wrapped_table() {
        let rows = parse_table(
            r#"{"libraries":[
                {"nickname":"A","typeTag":"dir","uri":"/a","scope":"global"},
                {"nickname":"B","typeTag":"zzz","uri":"/b","scope":"project","options":{"k":"v"}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].options.get("k").map(String::as_str), Some("v"));
    }

    #[test]
    fn test_rejects_empty_nickname() {
        let err = parse_table(r#"[{"nickname":" ","typeTag":"dir","uri":"/a","scope":"global"}]"#)
            .unwrap_err();
        assert!(err.to_string().contains("empty nickname"));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_table("{ not json }").is_err());
    }

    #[test]
    fn test_read_table_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("libs.json");
        std::fs::write(
            &path,
            r#"[{"nickname":"A","typeTag":"dir","uri":"/a","scope":"project"}]"#,
        )
        .unwrap();

        let mut rows = read_table(&path).unwrap();
        force_scope(&mut rows, LibraryScope::Global);
        assert_eq!(rows[0].scope, LibraryScope::Global);
        assert!(read_table(&dir.path().join("missing.json")).is_err());
    }
}
