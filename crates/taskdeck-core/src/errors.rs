//! Error types for dependency-graph operations.
//!
//! Each variant names the exact violated rule so a caller can correct the
//! request rather than retry blindly. Graph checks run before any mutation,
//! so a returned error always means the task list is unchanged.

use thiserror::Error;

/// Errors raised by dependency-graph mutations.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A task or subtask may not depend on itself.
    #[error("task {id} cannot depend on itself")]
    SelfDependency {
        /// The offending id.
        id: String,
    },

    /// Adding the edge would close a dependency cycle.
    #[error("dependency {from} -> {to} would create a cycle")]
    CircularDependency {
        /// Edge source.
        from: String,
        /// Edge target.
        to: String,
    },

    /// An endpoint does not resolve to any task or subtask.
    #[error("unknown task id: {id}")]
    UnknownId {
        /// The unresolvable id.
        id: String,
    },
}

/// Convenience type alias for graph results.
pub type Result<T> = std::result::Result<T, GraphError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
