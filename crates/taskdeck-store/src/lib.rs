//! # taskdeck-store
//!
//! Durable, multi-process-safe storage for the tag-partitioned task
//! document.
//!
//! Layering, leaves first:
//!
//! - [`AtomicFileWriter`] — crash-safe JSON read/write (stage → verify →
//!   snapshot → atomic rename) plus cross-process mutual exclusion via a
//!   `.lock` marker file and a same-process arrival-order queue
//! - [`FileWatcher`] — a single debounced "changed" notification for
//!   externally-made edits, ignoring the writer's own staging artifacts
//! - [`TaskStore`] — tag-partitioned load/save built on both; the only
//!   component that touches the document path directly
//!
//! The on-disk document is the single source of truth. Everything here is
//! cooperative async: every disk read, disk write, and lock acquisition is
//! an `.await` point, and no worker threads are spawned (the `notify`
//! backend manages its own).

#![deny(unsafe_code)]

pub mod atomic;
pub mod config;
pub mod errors;
pub mod store;
pub mod watcher;

pub use atomic::{AtomicFileWriter, PathLock};
pub use config::StoreConfig;
pub use errors::{Result, StoreError};
pub use store::{ResolvedTask, TagEdit, TaskStore};
pub use watcher::{FileWatcher, WatchEvent};
