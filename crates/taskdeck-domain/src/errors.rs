//! Error types for domain operations.

use thiserror::Error;

use taskdeck_core::GraphError;
use taskdeck_store::StoreError;

/// Errors returned by [`crate::TasksDomain`] operations.
///
/// Rule violations keep their exact names (self vs. circular, via
/// [`GraphError`]) so a caller can correct the request; routine absence is
/// an `Ok` value, not an error, except where an operation needs its target
/// to exist.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Storage-layer fault.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Dependency rule violation.
    #[error("dependency error: {0}")]
    Graph(#[from] GraphError),

    /// The operation's target does not exist.
    #[error("task not found: {id} (tag {tag})")]
    NotFound {
        /// The id that resolved to nothing.
        id: String,
        /// The tag searched.
        tag: String,
    },

    /// The id is not a well-formed plain or dotted id.
    #[error("invalid task id: {id}")]
    InvalidId {
        /// The malformed id.
        id: String,
    },

    /// The draft or update payload is unusable as given.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An explicit id collides with an existing task.
    #[error("duplicate task id: {id}")]
    DuplicateId {
        /// The colliding id.
        id: String,
    },
}

/// Convenience type alias for domain results.
pub type Result<T> = std::result::Result<T, DomainError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
