//! Type tag to backend lookup table.

use super::backend::LibraryBackend;
use super::directory::DirectoryBackend;
use crate::config::DirectoryBackendConfig;
use crate::error::{LibraryError, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Maps type tags to backend implementations.
///
/// Populated by the host before libraries are loaded. Tags are matched
/// case-insensitively.
#[derive(Default)]
pub struct PluginRegistry {
    backends: RwLock<HashMap<String, Arc<dyn LibraryBackend>>>,
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in backends registered.
    pub fn with_builtin_backends() -> Self {
        let registry = Self::new();
        registry.register(DirectoryBackendConfig::TYPE_TAG, Arc::new(DirectoryBackend));
        registry
    }

    fn normalize(type_tag: &str) -> String {
        type_tag.trim().to_ascii_lowercase()
    }

    /// Register a backend for a type tag.
    ///
    /// Returns `true` if an earlier registration for the tag was replaced.
    pub fn register(&self, type_tag: &str, backend: Arc<dyn LibraryBackend>) -> bool {
        let tag = Self::normalize(type_tag);
        let mut backends = self
            .backends
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let replaced = backends.insert(tag.clone(), backend).is_some();
        debug!("Registered library backend '{}' (replaced={})", tag, replaced);
        replaced
    }

    /// Resolve the backend for a type tag.
    pub fn resolve(&self, type_tag: &str) -> Result<Arc<dyn LibraryBackend>> {
        let backends = self.backends.read().map_err(|e| {
            LibraryError::internal(format!("Failed to acquire plugin registry lock: {}", e))
        })?;

        backends
            .get(&Self::normalize(type_tag))
            .cloned()
            .ok_or_else(|| LibraryError::UnknownLibraryType {
                type_tag: type_tag.to_string(),
            })
    }

    pub fn is_registered(&self, type_tag: &str) -> bool {
        self.backends
            .read()
            .map(|backends| backends.contains_key(&Self::normalize(type_tag)))
            .unwrap_or(false)
    }

    /// All registered type tags, sorted.
    pub fn type_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .backends
            .read()
            .map(|backends| backends.keys().cloned().collect())
            .unwrap_or_default();
        tags.sort();
        tags
    }

    pub fn len(&self) -> usize {
        self.backends.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("type_tags", &self.type_tags())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_backends() {
        let registry = PluginRegistry::with_builtin_backends();
        assert!(registry.is_registered("dir"));
        assert_eq!(registry.type_tags(), vec!["dir".to_string()]);
        assert!(registry.resolve("dir").is_ok());
    }

    #[test]
    fn test_resolve_unknown_tag() {
        let registry = PluginRegistry::new();
        assert!(registry.is_empty());

        match registry.resolve("zzz") {
            Err(LibraryError::UnknownLibraryType { type_tag }) => assert_eq!(type_tag, "zzz"),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("unregistered tag resolved"),
        }
    }

    #[test]
    fn test_tags_are_case_insensitive() {
        let registry = PluginRegistry::new();
        assert!(!registry.register("Dir", Arc::new(DirectoryBackend)));
        assert!(registry.is_registered("DIR"));
        assert!(registry.resolve(" dir ").is_ok());
    }

    #[test]
    fn test_register_replaces() {
        let registry = PluginRegistry::new();
        assert!(!registry.register("dir", Arc::new(DirectoryBackend)));
        assert!(registry.register("dir", Arc::new(DirectoryBackend)));
        assert_eq!(registry.len(), 1);
    }
}
