//! Built-in backend that treats a directory as a library of files.
//!
//! Each regular file directly inside the directory is one item. With the
//! `extension` option set, only files carrying that extension are items and
//! the item name is the file stem.

use super::backend::{LibraryBackend, LibraryItem};
use crate::config::DirectoryBackendConfig;
use crate::error::{LibraryError, Result};
use crate::models::LibraryOptions;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Directory-backed library format (type tag `dir`).
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryBackend;

impl DirectoryBackend {
    fn library_dir(uri: &str) -> Result<PathBuf> {
        let dir = PathBuf::from(uri);
        if !dir.is_dir() {
            return Err(LibraryError::backend(format!(
                "Library directory not found: {}",
                dir.display()
            )));
        }
        Ok(dir)
    }

    fn extension(options: &LibraryOptions) -> Option<&str> {
        options
            .get(DirectoryBackendConfig::OPTION_EXTENSION)
            .map(|ext| ext.trim_start_matches('.'))
            .filter(|ext| !ext.is_empty())
    }

    fn is_read_only(options: &LibraryOptions) -> bool {
        options
            .get(DirectoryBackendConfig::OPTION_READ_ONLY)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    fn validate_name(name: &str) -> Result<()> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
        {
            return Err(LibraryError::backend(format!(
                "Invalid item name: '{}'",
                name
            )));
        }
        Ok(())
    }

    fn item_path(dir: &Path, name: &str, options: &LibraryOptions) -> Result<PathBuf> {
        Self::validate_name(name)?;
        Ok(match Self::extension(options) {
            Some(ext) => dir.join(format!("{}.{}", name, ext)),
            None => dir.join(name),
        })
    }

    fn item_name(path: &Path, options: &LibraryOptions) -> Option<String> {
        let file_name = path.file_name()?.to_str()?;
        if file_name.starts_with(DirectoryBackendConfig::TEMP_PREFIX) {
            return None;
        }

        match Self::extension(options) {
            Some(ext) => {
                if path.extension()?.to_str()? != ext {
                    return None;
                }
                path.file_stem()?.to_str().map(str::to_string)
            }
            None => Some(file_name.to_string()),
        }
    }

    fn ensure_writable(uri: &str, options: &LibraryOptions) -> Result<()> {
        if Self::is_read_only(options) {
            return Err(LibraryError::backend(format!(
                "Library at {} is read-only",
                uri
            )));
        }
        Ok(())
    }
}

impl LibraryBackend for DirectoryBackend {
    fn enumerate(&self, uri: &str, options: &LibraryOptions) -> Result<Vec<String>> {
        let dir = Self::library_dir(uri)?;
        let mut names = Vec::new();

        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                LibraryError::backend(format!(
                    "Failed to read library directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(name) = Self::item_name(entry.path(), options) {
                names.push(name);
            }
        }

        names.sort();
        debug!("Enumerated {} items in {}", names.len(), dir.display());
        Ok(names)
    }

    fn load_item(&self, uri: &str, name: &str, options: &LibraryOptions) -> Result<LibraryItem> {
        let dir = Self::library_dir(uri)?;
        let path = Self::item_path(&dir, name, options)?;
        if !path.is_file() {
            return Err(LibraryError::backend(format!(
                "Item '{}' not found in {}",
                name,
                dir.display()
            )));
        }

        let content = fs::read(&path).map_err(|e| {
            LibraryError::backend(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(LibraryItem::new(name, content))
    }

    fn save_item(&self, uri: &str, item: &LibraryItem, options: &LibraryOptions) -> Result<()> {
        Self::ensure_writable(uri, options)?;
        let dir = Self::library_dir(uri)?;
        let path = Self::item_path(&dir, &item.name, options)?;

        // Write next to the target and rename so readers never see a partial item.
        let mut temp = tempfile::Builder::new()
            .prefix(DirectoryBackendConfig::TEMP_PREFIX)
            .tempfile_in(&dir)
            .map_err(|e| {
                LibraryError::backend(format!(
                    "Failed to create temp file in {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        temp.write_all(&item.content)?;
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| {
            LibraryError::backend(format!("Failed to write {}: {}", path.display(), e.error))
        })?;

        debug!("Saved item '{}' to {}", item.name, path.display());
        Ok(())
    }

    fn delete_item(&self, uri: &str, name: &str, options: &LibraryOptions) -> Result<()> {
        Self::ensure_writable(uri, options)?;
        let dir = Self::library_dir(uri)?;
        let path = Self::item_path(&dir, name, options)?;

        fs::remove_file(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LibraryError::backend(format!(
                "Item '{}' not found in {}",
                name,
                dir.display()
            )),
            _ => LibraryError::backend(format!("Failed to delete {}: {}", path.display(), e)),
        })
    }

    fn item_exists(&self, uri: &str, name: &str, options: &LibraryOptions) -> Result<bool> {
        let dir = Self::library_dir(uri)?;
        let path = Self::item_path(&dir, name, options)?;
        Ok(path.is_file())
    }

    fn is_writable(&self, uri: &str, options: &LibraryOptions) -> bool {
        if Self::is_read_only(options) {
            return false;
        }
        fs::metadata(uri)
            .map(|meta| meta.is_dir() && !meta.permissions().readonly())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn uri(dir: &TempDir) -> String {
        dir.path().to_string_lossy().to_string()
    }

    fn sym_options() -> LibraryOptions {
        let mut options = LibraryOptions::new();
        options.insert("extension".into(), "sym".into());
        options
    }

    #[test]
    fn test_enumerate_filters_by_extension() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("R.sym"), "resistor").unwrap();
        fs::write(dir.path().join("C.sym"), "capacitor").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let names = DirectoryBackend.enumerate(&uri(&dir), &sym_options()).unwrap();
        assert_eq!(names, vec!["C".to_string(), "R".to_string()]);

        let all = DirectoryBackend
            .enumerate(&uri(&dir), &LibraryOptions::new())
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_missing_directory_is_backend_failure() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope").to_string_lossy().to_string();

        let err = DirectoryBackend
            .enumerate(&missing, &LibraryOptions::new())
            .unwrap_err();
        assert!(matches!(err, LibraryError::BackendFailure { .. }));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_save_load_delete_item() {
        let dir = TempDir::new().unwrap();
        let options = sym_options();
        let item = LibraryItem::new("L", "inductor");

        DirectoryBackend.save_item(&uri(&dir), &item, &options).unwrap();
        assert!(dir.path().join("L.sym").is_file());
        assert!(DirectoryBackend.item_exists(&uri(&dir), "L", &options).unwrap());

        let loaded = DirectoryBackend.load_item(&uri(&dir), "L", &options).unwrap();
        assert_eq!(loaded, item);

        DirectoryBackend.delete_item(&uri(&dir), "L", &options).unwrap();
        assert!(!DirectoryBackend.item_exists(&uri(&dir), "L", &options).unwrap());
        assert!(DirectoryBackend.delete_item(&uri(&dir), "L", &options).is_err());
    }

    #[test]
    fn test_rejects_path_like_names() {
        let dir = TempDir::new().unwrap();
        let options = LibraryOptions::new();

        assert!(DirectoryBackend.load_item(&uri(&dir), "../etc", &options).is_err());
        assert!(DirectoryBackend.item_exists(&uri(&dir), "..", &options).is_err());
        assert!(DirectoryBackend
            .save_item(&uri(&dir), &LibraryItem::new("a/b", "x"), &options)
            .is_err());
    }

    #[test]
    fn test_read_only_option() {
        let dir = TempDir::new().unwrap();
        let mut options = LibraryOptions::new();
        assert!(DirectoryBackend.is_writable(&uri(&dir), &options));

        options.insert("read_only".into(), "true".into());
        assert!(!DirectoryBackend.is_writable(&uri(&dir), &options));
        assert!(DirectoryBackend
            .save_item(&uri(&dir), &LibraryItem::new("x", "y"), &options)
            .is_err());
    }
}
