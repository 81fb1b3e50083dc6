//! Batch asynchronous loading.
//!
//! A wave is the set of load tasks submitted by one `async_load_all` call.
//! Each manager has at most one wave in flight; asking for another while it
//! runs is a no-op, so callers may poll freely.

use super::load::{self, LoadMode};
use super::{LibraryCacheManager, ManagerShared};
use crate::cache::EntryRef;
use crate::executor::{TaskHandle, TaskPriority, TaskWatcher};
use crate::models::{LibraryRow, LibraryScope, LoadStatus};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Outstanding tasks of the current wave.
#[derive(Debug, Default)]
pub(super) struct PendingWave {
    tasks: Vec<TaskHandle<LoadStatus>>,
    /// Tasks whose handles were handed to a waiter. They stay outstanding
    /// until they finish, even if the waiter gives up first.
    awaited: Vec<TaskWatcher>,
    /// Size of the current wave.
    submitted: usize,
}

impl PendingWave {
    fn compact(&mut self) {
        self.tasks.retain(|task| !task.is_finished());
        self.awaited.retain(|task| !task.is_finished());
    }

    fn outstanding(&self) -> usize {
        self.tasks.len() + self.awaited.len()
    }
}

impl ManagerShared {
    /// Record `rows` as the current configuration and return the effective
    /// rows in input order.
    ///
    /// A `Project` row shadows a `Global` row with the same nickname; a
    /// repeated nickname within one scope keeps the first row.
    fn commit_configuration(&self, rows: &[LibraryRow]) -> Vec<Arc<LibraryRow>> {
        let mut order: Vec<&str> = Vec::with_capacity(rows.len());
        let mut by_nickname: HashMap<String, Arc<LibraryRow>> = HashMap::with_capacity(rows.len());

        for row in rows {
            if let Some(existing) = by_nickname.get(&row.nickname) {
                if existing.scope == row.scope {
                    warn!(
                        "Duplicate {} library nickname '{}'; keeping {}",
                        row.scope, row.nickname, existing.uri
                    );
                    continue;
                }
                warn!(
                    "Project library '{}' shadows the global library of the same name",
                    row.nickname
                );
                if row.scope == LibraryScope::Global {
                    continue;
                }
            } else {
                order.push(&row.nickname);
            }
            by_nickname.insert(row.nickname.clone(), Arc::new(row.clone()));
        }

        let effective = order
            .iter()
            .filter_map(|nickname| by_nickname.get(*nickname).cloned())
            .collect();

        *self
            .configured
            .write()
            .unwrap_or_else(PoisonError::into_inner) = by_nickname;
        effective
    }

    /// Body of one wave task.
    fn run_wave_task(&self, entry: &EntryRef, row: &Arc<LibraryRow>) -> LoadStatus {
        if self.abort.is_cancelled() {
            debug!("Skipping load of '{}': wave aborted", row.nickname);
            return entry.status();
        }

        let outcome = load::load_entry(entry, &self.registry, LoadMode::IfNeeded, Some(row));

        if !self.store_for(row.scope).holds(entry) {
            debug!(
                "Library '{}' was evicted while loading; discarding {} result",
                row.nickname, outcome.status
            );
        }
        outcome.status
    }
}

/// Nicknames declared in `scope`, shadowed rows included.
fn scope_nicknames(rows: &[LibraryRow], scope: LibraryScope) -> HashSet<&str> {
    rows.iter()
        .filter(|row| row.scope == scope)
        .map(|row| row.nickname.as_str())
        .collect()
}

impl LibraryCacheManager {
    fn lock_pending(&self) -> MutexGuard<'_, PendingWave> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a background load wave for `rows` and return immediately.
    ///
    /// Rows already `Loaded` are skipped, rows with an unregistered type are
    /// marked `LoadError` on the spot (or through a task if their entry is
    /// busy), and every other row gets one low-priority task. Never waits on
    /// an entry mutex. Cached libraries missing from `rows` are evicted
    /// (a library that is mid-load goes on the next call). Returns the number
    /// of tasks submitted; 0 if the previous wave is still running.
    pub fn async_load_all(&self, rows: &[LibraryRow]) -> usize {
        let mut pending = self.lock_pending();
        pending.compact();
        if pending.outstanding() > 0 {
            debug!(
                "Load wave still in flight ({} tasks); not starting another",
                pending.outstanding()
            );
            return 0;
        }
        self.shared.abort.reset();

        let effective = self.shared.commit_configuration(rows);
        let mut tasks = Vec::new();

        for row in &effective {
            let entry = self.shared.store_for(row.scope).get_or_create(row);
            if entry.is_loaded_from(row) {
                continue;
            }

            if !self.shared.registry.is_registered(&row.type_tag) {
                if let Some(mut guard) = entry.try_lock() {
                    load::load_locked(
                        &mut guard,
                        &self.shared.registry,
                        LoadMode::IfNeeded,
                        Some(row),
                    );
                    continue;
                }
                debug!(
                    "Library '{}' is busy; resolving its unknown type on a worker",
                    row.nickname
                );
            }

            let shared = Arc::clone(&self.shared);
            let row = Arc::clone(row);
            tasks.push(self.executor.submit(TaskPriority::Low, move || {
                shared.run_wave_task(&entry, &row)
            }));
        }

        let global_keep = scope_nicknames(rows, LibraryScope::Global);
        let project_keep = scope_nicknames(rows, LibraryScope::Project);
        self.shared.global.evict_if(|nickname| global_keep.contains(nickname));
        self.shared.project.evict_if(|nickname| project_keep.contains(nickname));

        let submitted = tasks.len();
        info!(
            "Started load wave: {} tasks for {} configured libraries",
            submitted,
            effective.len()
        );
        pending.tasks = tasks;
        pending.submitted = submitted;
        submitted
    }

    /// True while tasks of the current wave are outstanding.
    pub fn has_pending_load(&self) -> bool {
        self.pending_task_count() > 0
    }

    /// Outstanding tasks of the current wave, after dropping finished ones.
    pub fn pending_task_count(&self) -> usize {
        let mut pending = self.lock_pending();
        pending.compact();
        pending.outstanding()
    }

    /// Fraction of the current wave's tasks that have finished (1.0 when idle).
    pub fn load_progress(&self) -> f32 {
        let mut pending = self.lock_pending();
        pending.compact();
        if pending.submitted == 0 {
            return 1.0;
        }
        let done = pending.submitted.saturating_sub(pending.outstanding());
        done as f32 / pending.submitted as f32
    }

    /// Skip every task of the current wave that has not started yet.
    ///
    /// Loads already running finish normally. The next `async_load_all`
    /// clears the flag.
    pub fn abort_async_load(&self) {
        info!("Aborting library load wave");
        self.shared.abort.cancel();
    }

    /// Block until every task of the current wave has finished.
    ///
    /// Must not be called from an async context; use
    /// [`Self::wait_for_pending`] there.
    pub fn block_until_loaded(&self) {
        for task in self.take_pending() {
            task.wait();
        }
    }

    /// Async counterpart of [`Self::block_until_loaded`].
    pub async fn wait_for_pending(&self) {
        let tasks = self.take_pending();
        join_all(tasks.into_iter().map(TaskHandle::join)).await;
    }

    /// Move the wave's tasks out for waiting. A watcher per task stays
    /// behind, so the tasks count as outstanding until they finish whether
    /// or not the waiter sees them through.
    fn take_pending(&self) -> Vec<TaskHandle<LoadStatus>> {
        let mut pending = self.lock_pending();
        let tasks = std::mem::take(&mut pending.tasks);
        pending.awaited.extend(tasks.iter().map(TaskHandle::watcher));
        tasks
    }
}
