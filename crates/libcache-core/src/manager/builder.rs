//! Builder for configuring a [`LibraryCacheManager`].

use super::{LibraryCacheManager, ManagerShared, PendingWave};
use crate::cache::CacheStore;
use crate::cancel::CancellationToken;
use crate::config::LoaderConfig;
use crate::error::{LibraryError, Result};
use crate::executor::LoadExecutor;
use crate::models::LibraryScope;
use crate::plugins::PluginRegistry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// Builder for [`LibraryCacheManager`].
///
/// # Example
///
/// ```rust,ignore
/// use libcache::{LibraryCacheManager, PluginRegistry};
/// use std::sync::Arc;
///
/// let manager = LibraryCacheManager::builder(Arc::new(PluginRegistry::with_builtin_backends()))
///     .worker_threads(2)
///     .build()?;
/// ```
pub struct LibraryCacheManagerBuilder {
    registry: Arc<PluginRegistry>,
    worker_threads: Option<usize>,
    executor: Option<Arc<LoadExecutor>>,
    global_store: Option<Arc<CacheStore>>,
}

impl LibraryCacheManagerBuilder {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self {
            registry,
            worker_threads: None,
            executor: None,
            global_store: None,
        }
    }

    /// Size of the manager's own executor.
    ///
    /// Ignored when an executor is supplied with [`Self::executor`].
    ///
    /// Default: [`LoaderConfig::default_worker_threads`]
    pub fn worker_threads(mut self, count: usize) -> Self {
        self.worker_threads = Some(count);
        self
    }

    /// Run load waves on a shared executor instead of a private one.
    pub fn executor(mut self, executor: Arc<LoadExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Use `store` as the global cache instead of the process singleton.
    ///
    /// Managers built with the same store share their `Global` libraries.
    pub fn global_store(mut self, store: Arc<CacheStore>) -> Self {
        self.global_store = Some(store);
        self
    }

    pub fn build(self) -> Result<LibraryCacheManager> {
        let global = self.global_store.unwrap_or_else(CacheStore::global);
        if global.scope() != LibraryScope::Global {
            return Err(LibraryError::Config {
                message: format!("Global store has {} scope", global.scope()),
            });
        }

        let executor = match self.executor {
            Some(executor) => executor,
            None => Arc::new(LoadExecutor::new(
                self.worker_threads
                    .unwrap_or_else(LoaderConfig::default_worker_threads),
            )?),
        };

        Ok(LibraryCacheManager {
            shared: Arc::new(ManagerShared {
                registry: self.registry,
                global,
                project: Arc::new(CacheStore::new(LibraryScope::Project)),
                configured: RwLock::new(HashMap::new()),
                abort: CancellationToken::new(),
            }),
            executor,
            pending: Mutex::new(PendingWave::default()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_with_defaults() {
        let manager = LibraryCacheManagerBuilder::new(Arc::new(PluginRegistry::new()))
            .worker_threads(1)
            .build()
            .unwrap();
        assert!(Arc::ptr_eq(manager.global_cache(), &CacheStore::global()));
        assert!(manager.project_cache().is_empty());
    }

    #[test]
    fn test_rejects_project_store_as_global() {
        let result = LibraryCacheManagerBuilder::new(Arc::new(PluginRegistry::new()))
            .worker_threads(1)
            .global_store(Arc::new(CacheStore::new(LibraryScope::Project)))
            .build();
        assert!(matches!(result, Err(LibraryError::Config { .. })));
    }

    #[test]
    fn test_rejects_zero_workers() {
        let result = LibraryCacheManagerBuilder::new(Arc::new(PluginRegistry::new()))
            .worker_threads(0)
            .build();
        assert!(matches!(result, Err(LibraryError::Config { .. })));
    }

    #[test]
    fn test_shared_executor() {
        let executor = Arc::new(LoadExecutor::new(1).unwrap());
        let registry = Arc::new(PluginRegistry::new());
        let a = LibraryCacheManagerBuilder::new(Arc::clone(&registry))
            .executor(Arc::clone(&executor))
            .build()
            .unwrap();
        let b = LibraryCacheManagerBuilder::new(registry)
            .executor(Arc::clone(&executor))
            .build()
            .unwrap();
        assert_eq!(a.executor().worker_threads(), 1);
        assert!(Arc::ptr_eq(a.executor(), b.executor()));
    }
}
