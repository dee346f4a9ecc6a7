//! # taskdeck-domain
//!
//! The operation surface external collaborators consume: task lifecycle
//! (create / update / delete / status), combinable list filters, the
//! dependency-editing API, and next-task selection.
//!
//! [`TasksDomain`] composes the store and the pure graph algorithms:
//! every algorithmic decision is delegated to
//! [`taskdeck_core::DependencyGraph`], every durable effect to
//! [`taskdeck_store::TaskStore`]. Command-line front ends, HTTP route
//! handlers, and automation-tool adapters sit on top of this crate and
//! never open the document or lock file directly.

#![deny(unsafe_code)]

pub mod errors;
pub mod filter;
pub mod service;

pub use errors::{DomainError, Result};
pub use filter::TaskFilter;
pub use service::{StatusChange, SubtaskDraft, TaskDraft, TaskUpdate, TasksDomain};
