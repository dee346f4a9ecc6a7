//! Error types for the storage subsystem.
//!
//! [`StoreError`] is the primary error type returned by all storage
//! operations. Absence (missing document, missing tag) is routine and
//! surfaces as `Option`/empty values instead; these variants cover genuine
//! faults: I/O failures with the original cause attached, corruption
//! (present but unparseable — never auto-repaired), and lock timeouts.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed; the original cause is preserved.
    #[error("io error at {path}: {source}")]
    Io {
        /// The path being operated on.
        path: PathBuf,
        /// The underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// The document exists but does not parse. Never auto-repaired —
    /// guessing at corrupted content risks silent data loss.
    #[error("corrupt document at {path}: {source}")]
    Corrupt {
        /// The unreadable document.
        path: PathBuf,
        /// What the parser rejected.
        #[source]
        source: serde_json::Error,
    },

    /// The staged copy did not read back as an equivalent value; the
    /// destination was not touched.
    #[error("staged write for {path} failed verification")]
    StageVerify {
        /// The intended destination.
        path: PathBuf,
    },

    /// The exclusive lock marker could not be claimed within the bound.
    #[error("could not acquire lock on {path} within {waited_ms}ms")]
    LockTimeout {
        /// The locked document.
        path: PathBuf,
        /// How long acquisition was attempted.
        waited_ms: u64,
    },

    /// JSON serialization error outside a document-parse context.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The change watch could not be established.
    #[error("watch error at {path}: {source}")]
    Watch {
        /// The watched path.
        path: PathBuf,
        /// The backend failure.
        #[source]
        source: notify::Error,
    },
}

impl StoreError {
    /// Attach a path to an I/O failure.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience type alias for storage results.
pub type Result<T> = std::result::Result<T, StoreError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display() {
        let err = StoreError::io(
            "/tmp/tasks.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/tmp/tasks.json"));
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn corrupt_display_names_path() {
        let source = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let err = StoreError::Corrupt {
            path: "/tmp/tasks.json".into(),
            source,
        };
        assert!(err.to_string().starts_with("corrupt document at /tmp/tasks.json"));
    }

    #[test]
    fn lock_timeout_display() {
        let err = StoreError::LockTimeout {
            path: "/tmp/tasks.json".into(),
            waited_ms: 30_000,
        };
        assert_eq!(
            err.to_string(),
            "could not acquire lock on /tmp/tasks.json within 30000ms"
        );
    }

    #[test]
    fn stage_verify_display() {
        let err = StoreError::StageVerify {
            path: "/tmp/tasks.json".into(),
        };
        assert!(err.to_string().contains("failed verification"));
    }

    #[test]
    fn from_serde_error() {
        let source = serde_json::from_str::<String>("not json").unwrap_err();
        let err: StoreError = source.into();
        assert!(matches!(err, StoreError::Json(_)));
    }
}
