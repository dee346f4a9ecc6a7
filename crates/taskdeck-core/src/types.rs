//! Task, subtask, and tag-collection document types.
//!
//! These are the wire shapes of the on-disk document: a single JSON file
//! whose top-level keys are tag names, each holding `{ tasks, metadata }`.
//! Field names are camelCase on disk. Parsing is strict at the type level —
//! an unknown status string or a mis-shaped collection fails deserialization
//! rather than being coerced into something that "mostly fits".

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Document format version stamped into fresh tag metadata.
pub const DOCUMENT_VERSION: &str = "1.0.0";

/// The physical unit of durability: tag name → collection.
///
/// `BTreeMap` keeps serialization order deterministic, so repeated saves of
/// an unchanged document are byte-identical.
pub type Document = BTreeMap<String, TagCollection>;

/// Task status. Wire strings are kebab-case (`"in-progress"`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// Not started.
    #[default]
    Pending,
    /// Actively being worked.
    InProgress,
    /// Finished.
    Done,
    /// Blocked on something outside the dependency graph.
    Blocked,
    /// Intentionally postponed.
    Deferred,
    /// Abandoned.
    Cancelled,
    /// Awaiting review.
    Review,
}

impl TaskStatus {
    /// The wire string for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Done => "done",
            Self::Blocked => "blocked",
            Self::Deferred => "deferred",
            Self::Cancelled => "cancelled",
            Self::Review => "review",
        }
    }

    /// Whether this status counts as completed work.
    pub fn is_done(self) -> bool {
        self == Self::Done
    }

    /// Terminal statuses: no further work will happen on this item.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Nice to have.
    Low,
    /// Normal.
    #[default]
    Medium,
    /// Important.
    High,
    /// Drop everything.
    Critical,
}

impl TaskPriority {
    /// Numeric rank for ordering; higher is more urgent.
    pub fn rank(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Critical => 3,
        }
    }
}

/// A top-level task.
///
/// Top-level tasks use simple string ids (e.g. `"3"`); new ids are assigned
/// sequentially by the domain layer. `dependencies` holds ids of other tasks
/// or subtasks (dotted form) that must complete before this one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique id within the tag.
    pub id: String,
    /// Short human-readable title.
    pub title: String,
    /// Longer description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Current status.
    #[serde(default)]
    pub status: TaskStatus,
    /// Priority level.
    #[serde(default)]
    pub priority: TaskPriority,
    /// Ordered, duplicate-free list of dependency ids.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Nested subtasks.
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    /// Free-form labels (set semantics, order preserved).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Who is working on this.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    /// Implementation notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// How to verify the task is done.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_strategy: Option<String>,
}

impl Task {
    /// Create a pending, medium-priority task with the given id and title.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            status: TaskStatus::default(),
            priority: TaskPriority::default(),
            dependencies: Vec::new(),
            subtasks: Vec::new(),
            tags: Vec::new(),
            assignee: None,
            details: None,
            test_strategy: None,
        }
    }
}

/// A subtask nested inside a [`Task`].
///
/// Subtask ids are integers unique within their parent only; the
/// externally-visible identity is the dotted id `"<parent>.<id>"`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    /// Id unique within the parent task.
    pub id: u64,
    /// Short human-readable title.
    pub title: String,
    /// Longer description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Current status.
    #[serde(default)]
    pub status: TaskStatus,
    /// Dependency ids: dotted, or bare (sibling subtask if one exists,
    /// otherwise a top-level task).
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Who is working on this.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    /// Implementation notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// How to verify the subtask is done.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_strategy: Option<String>,
}

impl Subtask {
    /// Create a pending subtask with the given id and title.
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: None,
            status: TaskStatus::default(),
            dependencies: Vec::new(),
            assignee: None,
            details: None,
            test_strategy: None,
        }
    }
}

/// One tag's worth of tasks plus bookkeeping metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagCollection {
    /// The tasks in this tag.
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Recomputed on every save.
    pub metadata: TagMetadata,
}

/// Bookkeeping metadata for a [`TagCollection`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagMetadata {
    /// Document format version; preserved across rewrites.
    pub version: String,
    /// Timestamp of the last successful save.
    pub last_modified: DateTime<Utc>,
    /// Number of top-level tasks.
    pub task_count: usize,
    /// Number of top-level tasks with status `done`.
    pub completed_count: usize,
    /// Sorted union of the member tasks' labels.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TagMetadata {
    /// Recompute metadata for a task list.
    ///
    /// `version` carries the existing collection's version forward; fresh
    /// collections start at [`DOCUMENT_VERSION`].
    pub fn recompute(tasks: &[Task], version: Option<String>) -> Self {
        let labels: BTreeSet<&str> = tasks
            .iter()
            .flat_map(|t| t.tags.iter().map(String::as_str))
            .collect();
        Self {
            version: version.unwrap_or_else(|| DOCUMENT_VERSION.to_string()),
            last_modified: Utc::now(),
            task_count: tasks.len(),
            completed_count: tasks.iter().filter(|t| t.status.is_done()).count(),
            tags: labels.into_iter().map(str::to_owned).collect(),
        }
    }
}

impl Default for TagMetadata {
    fn default() -> Self {
        Self::recompute(&[], None)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
