//! Library cache manager.
//!
//! The manager routes each configured library to the cache matching its
//! scope, loads libraries in bounded background waves, and falls back to
//! loading inline when a caller needs a library the wave has not reached.
//!
//! # Architecture
//!
//! ```text
//! LibraryCacheManager
//!     │
//!     ├── PluginRegistry   - type tag -> backend
//!     │
//!     ├── CacheStore (global, shared by all managers)
//!     ├── CacheStore (project, private)
//!     │       └── LibraryEntry - status, error, backend, own mutex
//!     │
//!     └── LoadExecutor     - bounded worker pool for load waves
//! ```

mod builder;
mod load;
mod wave;

pub use builder::LibraryCacheManagerBuilder;

use crate::cache::{CacheStore, EntryRef, EntrySnapshot};
use crate::cancel::CancellationToken;
use crate::error::{LibraryError, Result};
use crate::executor::LoadExecutor;
use crate::models::{LibraryRow, LibraryScope, LoadStatus};
use crate::plugins::{LibraryBackend, LibraryItem, PluginRegistry};
use load::LoadMode;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;
use wave::PendingWave;

/// State shared between a manager and its in-flight wave tasks.
struct ManagerShared {
    registry: Arc<PluginRegistry>,
    global: Arc<CacheStore>,
    project: Arc<CacheStore>,
    /// Effective rows of the last committed configuration, by nickname.
    configured: RwLock<HashMap<String, Arc<LibraryRow>>>,
    abort: CancellationToken,
}

impl ManagerShared {
    fn store_for(&self, scope: LibraryScope) -> &Arc<CacheStore> {
        match scope {
            LibraryScope::Global => &self.global,
            LibraryScope::Project => &self.project,
        }
    }

    fn configured_row(&self, nickname: &str) -> Option<Arc<LibraryRow>> {
        self.configured
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(nickname)
            .cloned()
    }

    /// Find the cached entry for a nickname without creating one.
    ///
    /// Uses the last known scope; an unconfigured nickname is looked up in the
    /// project cache first, then the global cache.
    fn locate(&self, nickname: &str) -> Option<EntryRef> {
        match self.configured_row(nickname) {
            Some(row) => self.store_for(row.scope).lookup(nickname),
            None => self
                .project
                .lookup(nickname)
                .or_else(|| self.global.lookup(nickname)),
        }
    }

    /// Entry for a nickname, created from its configured row if needed.
    fn entry_for(&self, nickname: &str) -> Result<(EntryRef, Option<Arc<LibraryRow>>)> {
        if let Some(row) = self.configured_row(nickname) {
            let entry = self.store_for(row.scope).get_or_create(&row);
            return Ok((entry, Some(row)));
        }

        self.locate(nickname)
            .map(|entry| (entry, None))
            .ok_or_else(|| LibraryError::LibraryNotFound {
                nickname: nickname.to_string(),
            })
    }
}

/// Tracks configured libraries and loads them on demand or in waves.
///
/// `Global` libraries live in a process-wide cache shared by every manager;
/// `Project` libraries live in a cache owned by this manager and are dropped
/// with it.
pub struct LibraryCacheManager {
    shared: Arc<ManagerShared>,
    executor: Arc<LoadExecutor>,
    pending: Mutex<PendingWave>,
}

impl LibraryCacheManager {
    /// Create a manager with a private executor and the process global cache.
    pub fn new(registry: Arc<PluginRegistry>) -> Result<Self> {
        Self::builder(registry).build()
    }

    pub fn builder(registry: Arc<PluginRegistry>) -> LibraryCacheManagerBuilder {
        LibraryCacheManagerBuilder::new(registry)
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.shared.registry
    }

    pub fn executor(&self) -> &Arc<LoadExecutor> {
        &self.executor
    }

    /// The cache holding `Global` libraries.
    pub fn global_cache(&self) -> &Arc<CacheStore> {
        &self.shared.global
    }

    /// This manager's cache of `Project` libraries.
    pub fn project_cache(&self) -> &Arc<CacheStore> {
        &self.shared.project
    }

    /// Load (or reload) one library on the calling thread.
    ///
    /// Load failures are recorded on the entry and reported through the
    /// returned status; the only error is `LibraryNotFound` for a nickname
    /// that is neither configured nor cached.
    pub fn load_one(&self, nickname: &str) -> Result<LoadStatus> {
        let (entry, row) = self.shared.entry_for(nickname)?;
        let outcome = load::load_entry(
            &entry,
            &self.shared.registry,
            LoadMode::Reload,
            row.as_ref(),
        );
        Ok(outcome.status)
    }

    /// Return the library's entry, loading it inline if it is not `Loaded`.
    ///
    /// Never waits for a background wave to reach the library. If another
    /// thread is loading it right now, this waits for that load and reports
    /// its result instead of loading twice.
    pub fn load_if_needed(&self, nickname: &str) -> Result<EntryRef> {
        let (entry, row) = self.shared.entry_for(nickname)?;
        let outcome = load::load_entry(
            &entry,
            &self.shared.registry,
            LoadMode::IfNeeded,
            row.as_ref(),
        );

        match outcome.status {
            LoadStatus::Loaded => Ok(entry),
            _ => Err(outcome
                .error
                .unwrap_or_else(|| LibraryError::LibraryNotLoaded {
                    nickname: nickname.to_string(),
                })),
        }
    }

    /// Return the library's entry if it is `Loaded`, loading it inline first
    /// if necessary. `None` if it cannot be loaded.
    pub fn fetch_if_loaded(&self, nickname: &str) -> Option<EntryRef> {
        if let Some(entry) = self.shared.locate(nickname) {
            if entry.status() == LoadStatus::Loaded {
                return Some(entry);
            }
        }

        match self.load_if_needed(nickname) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Library '{}' unavailable: {}", nickname, e);
                None
            }
        }
    }

    /// Current status of a cached library. Does not trigger a load.
    pub fn status(&self, nickname: &str) -> Option<LoadStatus> {
        self.shared.locate(nickname).map(|entry| entry.status())
    }

    /// Error captured by the library's last failed load.
    pub fn error(&self, nickname: &str) -> Option<LibraryError> {
        self.shared.locate(nickname).and_then(|entry| entry.error())
    }

    pub fn is_loaded(&self, nickname: &str) -> bool {
        self.status(nickname) == Some(LoadStatus::Loaded)
    }

    /// Snapshot of every entry in both caches, sorted by nickname.
    pub fn library_statuses(&self) -> Vec<EntrySnapshot> {
        let mut snapshots = self.shared.project.snapshot();
        snapshots.extend(self.shared.global.snapshot());
        snapshots.sort_by(|a, b| {
            a.nickname
                .cmp(&b.nickname)
                .then_with(|| a.row.scope.as_str().cmp(b.row.scope.as_str()))
        });
        snapshots
    }

    fn loaded_library(
        &self,
        nickname: &str,
    ) -> Result<(EntryRef, Arc<LibraryRow>, Arc<dyn LibraryBackend>)> {
        let entry = self
            .fetch_if_loaded(nickname)
            .ok_or_else(|| self.unavailable(nickname))?;
        let (row, backend) = entry.loaded_backend()?;
        Ok((entry, row, backend))
    }

    fn unavailable(&self, nickname: &str) -> LibraryError {
        match self.shared.locate(nickname) {
            Some(entry) => entry
                .error()
                .unwrap_or_else(|| LibraryError::LibraryNotLoaded {
                    nickname: nickname.to_string(),
                }),
            None => LibraryError::LibraryNotFound {
                nickname: nickname.to_string(),
            },
        }
    }

    /// Item names in a library.
    pub fn enumerate_items(&self, nickname: &str) -> Result<Vec<String>> {
        let (_, row, backend) = self.loaded_library(nickname)?;
        backend.enumerate(&row.uri, &row.options)
    }

    /// Read one item. The caller owns the returned item.
    pub fn load_item(&self, nickname: &str, name: &str) -> Result<LibraryItem> {
        let (_, row, backend) = self.loaded_library(nickname)?;
        backend.load_item(&row.uri, name, &row.options)
    }

    pub fn item_exists(&self, nickname: &str, name: &str) -> Result<bool> {
        let (_, row, backend) = self.loaded_library(nickname)?;
        backend.item_exists(&row.uri, name, &row.options)
    }

    pub fn is_writable(&self, nickname: &str) -> Result<bool> {
        let (_, row, backend) = self.loaded_library(nickname)?;
        Ok(backend.is_writable(&row.uri, &row.options))
    }

    /// Create or replace an item.
    ///
    /// Writes run under the entry mutex, so they never overlap a reload of
    /// the same library.
    pub fn save_item(&self, nickname: &str, item: &LibraryItem) -> Result<()> {
        let (entry, _, _) = self.loaded_library(nickname)?;
        let guard = entry.lock();
        let (row, backend) = guard.loaded_backend()?;
        if !backend.is_writable(&row.uri, &row.options) {
            return Err(LibraryError::ReadOnly {
                nickname: nickname.to_string(),
            });
        }
        backend.save_item(&row.uri, item, &row.options)
    }

    pub fn delete_item(&self, nickname: &str, name: &str) -> Result<()> {
        let (entry, _, _) = self.loaded_library(nickname)?;
        let guard = entry.lock();
        let (row, backend) = guard.loaded_backend()?;
        if !backend.is_writable(&row.uri, &row.options) {
            return Err(LibraryError::ReadOnly {
                nickname: nickname.to_string(),
            });
        }
        backend.delete_item(&row.uri, name, &row.options)
    }
}

impl Drop for LibraryCacheManager {
    fn drop(&mut self) {
        // Queued tasks of an unfinished wave are skipped; running loads complete.
        self.shared.abort.cancel();
    }
}

impl std::fmt::Debug for LibraryCacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryCacheManager")
            .field("project_libraries", &self.shared.project.len())
            .field("global_libraries", &self.shared.global.len())
            .field("executor", &self.executor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager() -> LibraryCacheManager {
        LibraryCacheManager::builder(Arc::new(PluginRegistry::with_builtin_backends()))
            .worker_threads(2)
            .global_store(Arc::new(CacheStore::new(LibraryScope::Global)))
            .build()
            .unwrap()
    }

    fn dir_row(nickname: &str, dir: &TempDir, scope: LibraryScope) -> LibraryRow {
        LibraryRow::new(nickname, "dir", dir.path().to_string_lossy(), scope)
    }

    #[test]
    fn test_unconfigured_nickname() {
        let manager = manager();
        assert!(matches!(
            manager.load_if_needed("nope"),
            Err(LibraryError::LibraryNotFound { .. })
        ));
        assert!(matches!(
            manager.load_one("nope"),
            Err(LibraryError::LibraryNotFound { .. })
        ));
        assert!(manager.fetch_if_loaded("nope").is_none());
        assert!(manager.status("nope").is_none());
    }

    #[test]
    fn test_load_one_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let manager = manager();
        manager.async_load_all(&[dir_row("A", &dir, LibraryScope::Project)]);
        manager.block_until_loaded();

        assert_eq!(manager.load_one("A").unwrap(), LoadStatus::Loaded);
        assert_eq!(manager.load_one("A").unwrap(), LoadStatus::Loaded);
        assert!(manager.is_loaded("A"));
    }

    #[test]
    fn test_load_if_needed_reports_captured_error() {
        let dir = TempDir::new().unwrap();
        let manager = manager();
        let mut row = dir_row("Gone", &dir, LibraryScope::Project);
        row.uri = dir.path().join("missing").to_string_lossy().to_string();
        manager.async_load_all(&[row]);
        manager.block_until_loaded();

        let err = manager.load_if_needed("Gone").unwrap_err();
        assert!(matches!(err, LibraryError::BackendFailure { .. }));
        assert_eq!(manager.error("Gone"), Some(err));
        assert!(manager.fetch_if_loaded("Gone").is_none());
    }

    #[test]
    fn test_item_pass_through() {
        let dir = TempDir::new().unwrap();
        let manager = manager();
        let row = dir_row("Parts", &dir, LibraryScope::Project).with_option("extension", "sym");
        manager.async_load_all(&[row]);
        manager.block_until_loaded();

        assert!(manager.is_writable("Parts").unwrap());
        manager
            .save_item("Parts", &LibraryItem::new("R", "resistor"))
            .unwrap();
        assert!(manager.item_exists("Parts", "R").unwrap());
        assert_eq!(manager.enumerate_items("Parts").unwrap(), vec!["R".to_string()]);
        assert_eq!(
            manager.load_item("Parts", "R").unwrap().content.as_ref(),
            b"resistor"
        );

        manager.delete_item("Parts", "R").unwrap();
        assert!(!manager.item_exists("Parts", "R").unwrap());
    }

    #[test]
    fn test_read_only_library_rejects_writes() {
        let dir = TempDir::new().unwrap();
        let manager = manager();
        let row = dir_row("Vendor", &dir, LibraryScope::Project).with_option("read_only", "true");
        manager.async_load_all(&[row]);
        manager.block_until_loaded();

        assert!(!manager.is_writable("Vendor").unwrap());
        assert!(matches!(
            manager.save_item("Vendor", &LibraryItem::new("R", "x")),
            Err(LibraryError::ReadOnly { .. })
        ));
        assert!(matches!(
            manager.delete_item("Vendor", "R"),
            Err(LibraryError::ReadOnly { .. })
        ));
    }

    #[test]
    fn test_pass_through_on_failed_library() {
        let manager = manager();
        let row = LibraryRow::new("B", "zzz", "/nowhere", LibraryScope::Project);
        manager.async_load_all(&[row]);

        match manager.enumerate_items("B") {
            Err(LibraryError::UnknownLibraryType { type_tag }) => assert_eq!(type_tag, "zzz"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
