//! Per-library cache entry.

use crate::error::{LibraryError, Result};
use crate::models::{LibraryRow, LoadStatus};
use crate::plugins::LibraryBackend;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};
use tracing::{debug, warn};

/// Shared handle to a cache entry.
pub type EntryRef = Arc<LibraryEntry>;

/// Mutable state of one configured library.
///
/// Status, error, backend handle and row are only changed while holding the
/// entry's own mutex. A load holds that mutex for its whole duration, so a
/// second loader (or a reader) of the same library waits and then observes
/// the finished result.
pub struct LibraryEntry {
    nickname: String,
    /// Mirrors the status so eviction and wave planning never take the mutex.
    phase: AtomicU8,
    /// Written only under the entry mutex.
    row: RwLock<Arc<LibraryRow>>,
    state: Mutex<EntryState>,
}

struct EntryState {
    status: LoadStatus,
    error: Option<LibraryError>,
    backend: Option<Arc<dyn LibraryBackend>>,
}

/// Point-in-time copy of an entry, taken under its mutex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySnapshot {
    pub nickname: String,
    pub row: LibraryRow,
    pub status: LoadStatus,
    pub error: Option<LibraryError>,
}

impl LibraryEntry {
    /// Create an `Unloaded` entry for a row.
    pub fn new(row: Arc<LibraryRow>) -> Self {
        Self {
            nickname: row.nickname.clone(),
            phase: AtomicU8::new(encode_status(LoadStatus::Unloaded)),
            row: RwLock::new(row),
            state: Mutex::new(EntryState {
                status: LoadStatus::Unloaded,
                error: None,
                backend: None,
            }),
        }
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// True while a load of this entry is in flight. Never blocks.
    pub fn is_loading(&self) -> bool {
        self.phase.load(Ordering::Acquire) == encode_status(LoadStatus::Loading)
    }

    /// True if the entry is `Loaded` from a row with the same source as `row`.
    ///
    /// Never blocks on the entry mutex, so a reader or an in-flight write on
    /// the entry does not make a loaded library look stale.
    pub fn is_loaded_from(&self, row: &LibraryRow) -> bool {
        self.phase.load(Ordering::Acquire) == encode_status(LoadStatus::Loaded)
            && self.row().same_source(row)
    }

    pub fn status(&self) -> LoadStatus {
        self.lock_state().status
    }

    pub fn error(&self) -> Option<LibraryError> {
        self.lock_state().error.clone()
    }

    pub fn row(&self) -> Arc<LibraryRow> {
        Arc::clone(&self.row.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn snapshot(&self) -> EntrySnapshot {
        let state = self.lock_state();
        EntrySnapshot {
            nickname: self.nickname.clone(),
            row: self.row().as_ref().clone(),
            status: state.status,
            error: state.error.clone(),
        }
    }

    /// Row and backend of a `Loaded` entry.
    ///
    /// Fails with the captured load error, or `LibraryNotLoaded` if no load
    /// has finished yet.
    pub fn loaded_backend(&self) -> Result<(Arc<LibraryRow>, Arc<dyn LibraryBackend>)> {
        self.lock().loaded_backend()
    }

    fn lock_state(&self) -> MutexGuard<'_, EntryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the entry mutex, blocking until any in-flight load finishes.
    pub(crate) fn lock(&self) -> EntryGuard<'_> {
        EntryGuard {
            entry: self,
            state: self.lock_state(),
        }
    }

    /// Take the entry mutex only if nobody holds it.
    pub(crate) fn try_lock(&self) -> Option<EntryGuard<'_>> {
        let state = match self.state.try_lock() {
            Ok(state) => state,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return None,
        };
        Some(EntryGuard { entry: self, state })
    }
}

impl std::fmt::Debug for LibraryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryEntry")
            .field("nickname", &self.nickname)
            .field("loading", &self.is_loading())
            .finish()
    }
}

/// Held entry mutex. All status transitions go through here.
pub(crate) struct EntryGuard<'a> {
    entry: &'a LibraryEntry,
    state: MutexGuard<'a, EntryState>,
}

impl EntryGuard<'_> {
    pub(crate) fn status(&self) -> LoadStatus {
        self.state.status
    }

    pub(crate) fn error(&self) -> Option<LibraryError> {
        self.state.error.clone()
    }

    pub(crate) fn nickname(&self) -> &str {
        &self.entry.nickname
    }

    pub(crate) fn row(&self) -> Arc<LibraryRow> {
        self.entry.row()
    }

    pub(crate) fn has_backend(&self) -> bool {
        self.state.backend.is_some()
    }

    /// Point the entry at a reconfigured row. The caller reloads it.
    pub(crate) fn adopt_row(&mut self, row: Arc<LibraryRow>) {
        let mut current = self
            .entry
            .row
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        debug!(
            "Library '{}' reconfigured: {} {} -> {} {}",
            self.entry.nickname, current.type_tag, current.uri, row.type_tag, row.uri
        );
        *current = row;
    }

    fn set_status(&mut self, status: LoadStatus) {
        self.state.status = status;
        self.entry.phase.store(encode_status(status), Ordering::Release);
    }

    pub(crate) fn begin_load(&mut self) {
        self.set_status(LoadStatus::Loading);
        debug!("Library '{}' status: {}", self.entry.nickname, LoadStatus::Loading);
    }

    pub(crate) fn mark_loaded(&mut self, backend: Arc<dyn LibraryBackend>, item_count: usize) {
        self.state.error = None;
        self.state.backend = Some(backend);
        self.set_status(LoadStatus::Loaded);
        debug!(
            "Library '{}' status: {} ({} items)",
            self.entry.nickname,
            LoadStatus::Loaded,
            item_count
        );
    }

    pub(crate) fn mark_failed(&mut self, error: LibraryError) {
        warn!(
            "Library '{}' status: {}: {}",
            self.entry.nickname,
            LoadStatus::LoadError,
            error
        );
        self.state.error = Some(error);
        self.state.backend = None;
        self.set_status(LoadStatus::LoadError);
    }

    pub(crate) fn loaded_backend(&self) -> Result<(Arc<LibraryRow>, Arc<dyn LibraryBackend>)> {
        match (self.state.status, &self.state.backend) {
            (LoadStatus::Loaded, Some(backend)) => Ok((self.row(), Arc::clone(backend))),
            (LoadStatus::Loaded, None) => {
                debug_assert!(false, "loaded library '{}' has no backend", self.entry.nickname);
                Err(LibraryError::internal(format!(
                    "Library '{}' is loaded but has no backend",
                    self.entry.nickname
                )))
            }
            _ => Err(self
                .state
                .error
                .clone()
                .unwrap_or_else(|| LibraryError::LibraryNotLoaded {
                    nickname: self.entry.nickname.clone(),
                })),
        }
    }
}

fn encode_status(status: LoadStatus) -> u8 {
    match status {
        LoadStatus::Unloaded => 0,
        LoadStatus::Loading => 1,
        LoadStatus::Loaded => 2,
        LoadStatus::LoadError => 3,
    }
}

impl Drop for EntryGuard<'_> {
    fn drop(&mut self) {
        // A load must never leave the mutex with the entry still `Loading`.
        if self.state.status == LoadStatus::Loading {
            self.mark_failed(LibraryError::internal(format!(
                "Load of library '{}' was interrupted",
                self.entry.nickname
            )));
        }
    }
}
