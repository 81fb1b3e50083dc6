//! Error types for the library cache.
//!
//! Load failures are never thrown out of a batch load. They are captured on the
//! failing library's cache entry as a [`LibraryError`] and surfaced only through
//! the synchronous lookup paths, so the type is `Clone` and carries plain
//! message strings instead of source errors.

use thiserror::Error;

/// Main error type for the library cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LibraryError {
    /// No backend is registered for the row's type tag.
    #[error("Unknown library type: '{type_tag}'")]
    UnknownLibraryType { type_tag: String },

    /// A backend call reported an I/O or format error.
    #[error("Backend failure: {message}")]
    BackendFailure { message: String },

    /// Cache state that should be unreachable, e.g. a loaded entry with no backend.
    #[error("Internal inconsistency: {message}")]
    InternalInconsistency { message: String },

    #[error("Library not found: {nickname}")]
    LibraryNotFound { nickname: String },

    #[error("Library not loaded: {nickname}")]
    LibraryNotLoaded { nickname: String },

    #[error("Library is read-only: {nickname}")]
    ReadOnly { nickname: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for library cache operations.
pub type Result<T> = std::result::Result<T, LibraryError>;

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        LibraryError::BackendFailure {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for LibraryError {
    fn from(err: serde_json::Error) -> Self {
        LibraryError::BackendFailure {
            message: format!("JSON error: {}", err),
        }
    }
}

impl LibraryError {
    /// Create a backend failure with a message.
    pub fn backend(message: impl Into<String>) -> Self {
        LibraryError::BackendFailure {
            message: message.into(),
        }
    }

    /// Create an internal inconsistency error.
    pub fn internal(message: impl Into<String>) -> Self {
        LibraryError::InternalInconsistency {
            message: message.into(),
        }
    }

    /// Check if retrying the same request could succeed.
    ///
    /// Only backend failures are transient; an unregistered type tag or a
    /// missing nickname stays wrong until the configuration changes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LibraryError::BackendFailure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LibraryError::UnknownLibraryType {
            type_tag: "zzz".into(),
        };
        assert_eq!(err.to_string(), "Unknown library type: 'zzz'");

        let err = LibraryError::backend("disk on fire");
        assert_eq!(err.to_string(), "Backend failure: disk on fire");
    }

    #[test]
    fn test_io_error_becomes_backend_failure() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: LibraryError = io.into();
        assert!(matches!(err, LibraryError::BackendFailure { .. }));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(LibraryError::backend("timeout").is_retryable());
        assert!(!LibraryError::UnknownLibraryType {
            type_tag: "zzz".into()
        }
        .is_retryable());
        assert!(!LibraryError::LibraryNotFound {
            nickname: "A".into()
        }
        .is_retryable());
    }
}
