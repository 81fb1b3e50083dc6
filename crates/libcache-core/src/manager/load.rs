//! The one load routine shared by wave tasks and synchronous callers.

use crate::cache::{EntryGuard, LibraryEntry};
use crate::error::LibraryError;
use crate::models::{LibraryRow, LoadStatus};
use crate::plugins::PluginRegistry;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoadMode {
    /// Return a `Loaded` entry as is; load anything else.
    IfNeeded,
    /// Load even if the entry is already `Loaded`.
    Reload,
}

/// Status and error copied under the entry mutex at the end of a load.
#[derive(Debug, Clone)]
pub(crate) struct LoadOutcome {
    pub status: LoadStatus,
    pub error: Option<LibraryError>,
}

impl LoadOutcome {
    fn of(guard: &EntryGuard<'_>) -> Self {
        Self {
            status: guard.status(),
            error: guard.error(),
        }
    }
}

/// Load `entry` while holding its mutex.
///
/// If `row` is given and no longer matches the entry's row, the entry adopts
/// it and is reloaded regardless of `mode`. Backend failures, including
/// panics, end up on the entry as `LoadError`; nothing is propagated.
pub(crate) fn load_entry(
    entry: &LibraryEntry,
    registry: &PluginRegistry,
    mode: LoadMode,
    row: Option<&Arc<LibraryRow>>,
) -> LoadOutcome {
    let mut guard = entry.lock();
    load_locked(&mut guard, registry, mode, row)
}

/// [`load_entry`] for a caller that already holds the entry mutex.
pub(crate) fn load_locked(
    guard: &mut EntryGuard<'_>,
    registry: &PluginRegistry,
    mode: LoadMode,
    row: Option<&Arc<LibraryRow>>,
) -> LoadOutcome {
    let mut mode = mode;

    if let Some(row) = row {
        if !guard.row().same_source(row) {
            guard.adopt_row(Arc::clone(row));
            mode = LoadMode::Reload;
        }
    }

    if mode == LoadMode::IfNeeded && guard.status() == LoadStatus::Loaded {
        if !guard.has_backend() {
            debug_assert!(false, "loaded library '{}' has no backend", guard.nickname());
            let error = LibraryError::internal(format!(
                "Library '{}' is loaded but has no backend",
                guard.nickname()
            ));
            guard.mark_failed(error);
        }
        return LoadOutcome::of(guard);
    }

    run_load(guard, registry);
    LoadOutcome::of(guard)
}

fn run_load(guard: &mut EntryGuard<'_>, registry: &PluginRegistry) {
    guard.begin_load();
    let row = guard.row();

    let backend = match registry.resolve(&row.type_tag) {
        Ok(backend) => backend,
        Err(e) => {
            guard.mark_failed(e);
            return;
        }
    };

    let probe = panic::catch_unwind(AssertUnwindSafe(|| {
        backend.enumerate(&row.uri, &row.options)
    }));

    match probe {
        Ok(Ok(items)) => guard.mark_loaded(backend, items.len()),
        Ok(Err(e)) => guard.mark_failed(e),
        Err(payload) => {
            let error = LibraryError::backend(format!(
                "Backend panicked while loading '{}': {}",
                guard.nickname(),
                panic_message(payload.as_ref())
            ));
            guard.mark_failed(error);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
