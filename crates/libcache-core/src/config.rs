//! Centralized configuration constants for the library cache.

/// Load executor configuration.
pub struct LoaderConfig;

impl LoaderConfig {
    /// Worker count used when the host cannot report its parallelism.
    pub const DEFAULT_WORKER_THREADS: usize = 4;
    /// Upper bound for the automatically chosen worker count.
    pub const MAX_WORKER_THREADS: usize = 16;
    pub const WORKER_THREAD_NAME: &'static str = "libcache-loader";

    /// Worker count for a new executor: one per available core, capped.
    pub fn default_worker_threads() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(Self::DEFAULT_WORKER_THREADS)
            .min(Self::MAX_WORKER_THREADS)
    }
}

/// Option keys and defaults for the built-in directory backend.
pub struct DirectoryBackendConfig;

impl DirectoryBackendConfig {
    pub const TYPE_TAG: &'static str = "dir";
    /// Only files with this extension are library items.
    pub const OPTION_EXTENSION: &'static str = "extension";
    /// `"true"` marks the library read-only.
    pub const OPTION_READ_ONLY: &'static str = "read_only";
    pub const TEMP_PREFIX: &'static str = ".libcache-";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_worker_threads_is_bounded() {
        let workers = LoaderConfig::default_worker_threads();
        assert!(workers >= 1);
        assert!(workers <= LoaderConfig::MAX_WORKER_THREADS);
    }
}
