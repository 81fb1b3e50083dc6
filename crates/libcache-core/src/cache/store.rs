//! Nickname to entry map, one per scope.

use super::entry::{EntryRef, EntrySnapshot, LibraryEntry};
use crate::models::{LibraryRow, LibraryScope};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// The process-wide cache for `Global` libraries, shared by every manager.
static GLOBAL_CACHE: LazyLock<Arc<CacheStore>> =
    LazyLock::new(|| Arc::new(CacheStore::new(LibraryScope::Global)));

/// A nickname to entry map guarded by one mutex.
///
/// The store mutex only covers the map itself. It is held for inserts and
/// evictions, never across a load; when an entry mutex is needed as well it
/// is taken after the store mutex.
#[derive(Debug)]
pub struct CacheStore {
    scope: LibraryScope,
    entries: Mutex<HashMap<String, EntryRef>>,
}

impl CacheStore {
    pub fn new(scope: LibraryScope) -> Self {
        Self {
            scope,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide global cache, created on first use.
    pub fn global() -> Arc<CacheStore> {
        Arc::clone(&GLOBAL_CACHE)
    }

    pub fn scope(&self) -> LibraryScope {
        self.scope
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, EntryRef>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Find an entry without triggering a load.
    pub fn lookup(&self, nickname: &str) -> Option<EntryRef> {
        self.lock_entries().get(nickname).cloned()
    }

    /// Return the entry for `row.nickname`, creating an `Unloaded` one if absent.
    ///
    /// An existing entry is returned as is, even if `row` differs from the
    /// row it was created with.
    pub fn get_or_create(&self, row: &Arc<LibraryRow>) -> EntryRef {
        let mut entries = self.lock_entries();
        if let Some(entry) = entries.get(&row.nickname) {
            return Arc::clone(entry);
        }

        debug!("Creating {} cache entry for '{}'", self.scope, row.nickname);
        let entry = Arc::new(LibraryEntry::new(Arc::clone(row)));
        entries.insert(row.nickname.clone(), Arc::clone(&entry));
        entry
    }

    /// True if `entry` is still the entry this store holds for its nickname.
    pub fn holds(&self, entry: &EntryRef) -> bool {
        self.lock_entries()
            .get(entry.nickname())
            .map(|current| Arc::ptr_eq(current, entry))
            .unwrap_or(false)
    }

    /// Remove every entry whose nickname fails `keep`.
    ///
    /// Entries that are mid-load are skipped and left for the next pass, since
    /// their backend may be in use on another thread. Returns the evicted
    /// nicknames, sorted.
    pub fn evict_if(&self, keep: impl Fn(&str) -> bool) -> Vec<String> {
        let mut entries = self.lock_entries();
        let mut evicted = Vec::new();

        entries.retain(|nickname, entry| {
            if keep(nickname) {
                return true;
            }
            if entry.is_loading() {
                debug!(
                    "Deferring eviction of '{}' from {} cache: load in progress",
                    nickname, self.scope
                );
                return true;
            }
            evicted.push(nickname.clone());
            false
        });

        if !evicted.is_empty() {
            debug!("Evicted {:?} from {} cache", evicted, self.scope);
        }
        evicted.sort();
        evicted
    }

    /// All cached nicknames, sorted.
    pub fn nicknames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock_entries().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot every entry, sorted by nickname.
    ///
    /// Entry mutexes are taken after the store mutex is released, so this
    /// waits on in-flight loads without blocking inserts or evictions.
    pub fn snapshot(&self) -> Vec<EntrySnapshot> {
        let entries: Vec<EntryRef> = self.lock_entries().values().cloned().collect();
        let mut snapshots: Vec<EntrySnapshot> = entries.iter().map(|e| e.snapshot()).collect();
        snapshots.sort_by(|a, b| a.nickname.cmp(&b.nickname));
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LoadStatus;

    fn row(nickname: &str) -> Arc<LibraryRow> {
        Arc::new(LibraryRow::new(nickname, "dir", "/tmp", LibraryScope::Project))
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let store = CacheStore::new(LibraryScope::Project);
        assert!(store.lookup("A").is_none());

        let first = store.get_or_create(&row("A"));
        let second = store.get_or_create(&row("A"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.status(), LoadStatus::Unloaded);
        assert_eq!(store.len(), 1);
        assert!(store.holds(&first));
    }

    #[test]
    fn test_evict_if_removes_unconfigured() {
        let store = CacheStore::new(LibraryScope::Project);
        store.get_or_create(&row("A"));
        let b = store.get_or_create(&row("B"));
        store.get_or_create(&row("C"));

        let evicted = store.evict_if(|nickname| nickname == "A");
        assert_eq!(evicted, vec!["B".to_string(), "C".to_string()]);
        assert_eq!(store.nicknames(), vec!["A".to_string()]);
        assert!(!store.holds(&b));
    }

    #[test]
    fn test_eviction_deferred_while_loading() {
        let store = CacheStore::new(LibraryScope::Project);
        let entry = store.get_or_create(&row("A"));

        let mut guard = entry.lock();
        guard.begin_load();
        assert!(store.evict_if(|_| false).is_empty());
        assert_eq!(store.len(), 1);

        guard.mark_failed(crate::error::LibraryError::backend("gone"));
        drop(guard);
        assert_eq!(store.evict_if(|_| false), vec!["A".to_string()]);
        assert!(store.is_empty());
    }

    #[test]
    fn test_global_is_a_singleton() {
        let a = CacheStore::global();
        let b = CacheStore::global();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.scope(), LibraryScope::Global);
    }

    #[test]
    fn test_snapshot_sorted() {
        let store = CacheStore::new(LibraryScope::Project);
        store.get_or_create(&row("b"));
        store.get_or_create(&row("a"));

        let names: Vec<String> = store.snapshot().into_iter().map(|s| s.nickname).collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }
}
