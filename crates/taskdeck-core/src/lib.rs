//! # taskdeck-core
//!
//! Foundation types and pure algorithms for the taskdeck task tracker.
//!
//! This crate provides the shared vocabulary the storage and domain crates
//! depend on:
//!
//! - **Document types**: `Task`, `Subtask`, `TagCollection`, `TagMetadata` —
//!   the wire shapes of the tag-partitioned JSON document
//! - **Ids**: `TaskRef` for plain (`"3"`) and dotted (`"3.2"`) identifiers
//! - **Dependency graph**: validate / cycle-check / repair / reverse lookup
//!   over task and subtask dependency edges
//! - **Errors**: `GraphError` hierarchy via `thiserror`
//!
//! Nothing in this crate touches the filesystem or the async runtime; the
//! graph algorithms operate on plain slices of tasks so they can be exercised
//! both against a checked-out tag and against in-memory fixtures.

#![deny(unsafe_code)]

pub mod errors;
pub mod graph;
pub mod ids;
pub mod types;

pub use errors::{GraphError, Result};
pub use graph::{DependencyGraph, DependencyIssue, FixReport, ValidationReport};
pub use ids::TaskRef;
pub use types::{
    Document, Subtask, TagCollection, TagMetadata, Task, TaskPriority, TaskStatus,
    DOCUMENT_VERSION,
};
