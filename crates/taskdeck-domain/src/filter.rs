//! Combinable task-list filters.

use taskdeck_core::types::{Task, TaskPriority, TaskStatus};

/// Filters for [`crate::TasksDomain::list`]. Every set field must match —
/// fields combine with logical AND, unset fields match everything.
#[derive(Clone, Debug, Default)]
pub struct TaskFilter {
    /// Match this status exactly.
    pub status: Option<TaskStatus>,
    /// Match this priority exactly.
    pub priority: Option<TaskPriority>,
    /// Task must carry this label.
    pub label: Option<String>,
    /// Match this assignee exactly.
    pub assignee: Option<String>,
    /// Case-insensitive substring over title, description, and details.
    pub search: Option<String>,
    /// Require (or forbid) the presence of subtasks.
    pub has_subtasks: Option<bool>,
}

impl TaskFilter {
    /// Whether `task` satisfies every set field.
    pub fn matches(&self, task: &Task) -> bool {
        if self.status.is_some_and(|s| task.status != s) {
            return false;
        }
        if self.priority.is_some_and(|p| task.priority != p) {
            return false;
        }
        if let Some(label) = &self.label {
            if !task.tags.iter().any(|t| t == label) {
                return false;
            }
        }
        if let Some(assignee) = &self.assignee {
            if task.assignee.as_deref() != Some(assignee.as_str()) {
                return false;
            }
        }
        if let Some(needle) = &self.search {
            let needle = needle.to_lowercase();
            let hit = [Some(task.title.as_str()), task.description.as_deref(), task.details.as_deref()]
                .into_iter()
                .flatten()
                .any(|text| text.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        if self
            .has_subtasks
            .is_some_and(|want| want != !task.subtasks.is_empty())
        {
            return false;
        }
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
