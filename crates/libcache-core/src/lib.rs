//! libcache - scoped, concurrently loaded cache of pluggable content libraries.
//!
//! A host supplies a snapshot of configured libraries ([`LibraryRow`]) and a
//! [`PluginRegistry`] mapping each library type to a backend. The
//! [`LibraryCacheManager`] loads the libraries in bounded background waves,
//! keeps each load outcome in the cache matching the library's scope, and
//! loads inline whenever a caller needs a library before its wave gets there.
//!
//! # Example
//!
//! ```rust,ignore
//! use libcache::{LibraryCacheManager, LibraryRow, LibraryScope, PluginRegistry};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(PluginRegistry::with_builtin_backends());
//! let manager = LibraryCacheManager::new(registry)?;
//!
//! let rows = vec![LibraryRow::new("Passives", "dir", "/libs/passives", LibraryScope::Global)];
//! manager.async_load_all(&rows);
//! manager.block_until_loaded();
//!
//! for name in manager.enumerate_items("Passives")? {
//!     println!("{}", name);
//! }
//! ```

pub mod cache;
pub mod cancel;
pub mod config;
pub mod error;
pub mod executor;
pub mod manager;
pub mod models;
pub mod plugins;

// Re-export commonly used types
pub use cache::{CacheStore, EntryRef, EntrySnapshot, LibraryEntry};
pub use cancel::CancellationToken;
pub use config::{DirectoryBackendConfig, LoaderConfig};
pub use error::{LibraryError, Result};
pub use executor::{LoadExecutor, TaskHandle, TaskPriority, TaskWatcher};
pub use manager::{LibraryCacheManager, LibraryCacheManagerBuilder};
pub use models::{LibraryOptions, LibraryRow, LibraryScope, LoadStatus};
pub use plugins::{DirectoryBackend, LibraryBackend, LibraryItem, PluginRegistry};
