//! Business logic layer for task management.
//!
//! Wraps the store with validation and the dependency rules. Key points:
//!
//! - **Fail fast, then persist**: every rule check (empty title, duplicate
//!   id, self/circular/unknown dependency) runs against the checked-out
//!   task list *before* anything is written; a rejected operation leaves
//!   the document byte-identical.
//! - **Whole-tag saves**: each mutation commits the tag's full task list
//!   through a [`TagEdit`] checkout, which holds the document lock across
//!   the read-modify-write so concurrent same-process calls serialize in
//!   arrival order.
//! - **Explicit injection**: change notification is an optional
//!   [`FileWatcher`] passed in by the composition root — no process-wide
//!   singleton bus.

use std::cmp::Ordering;

use serde::Serialize;
use tracing::{debug, warn};

use taskdeck_core::graph::{DependencyGraph, FixReport, ValidationReport};
use taskdeck_core::ids::TaskRef;
use taskdeck_core::types::{Subtask, Task, TaskPriority, TaskStatus};
use taskdeck_store::{FileWatcher, ResolvedTask, TaskStore, WatchEvent};

use crate::errors::{DomainError, Result};
use crate::filter::TaskFilter;

/// Input for [`TasksDomain::create`].
#[derive(Clone, Debug, Default)]
pub struct TaskDraft {
    /// Explicit id; assigned sequentially when absent.
    pub id: Option<String>,
    /// Required, non-empty.
    pub title: String,
    /// Longer description.
    pub description: Option<String>,
    /// Defaults to `pending`.
    pub status: Option<TaskStatus>,
    /// Defaults to `medium`.
    pub priority: Option<TaskPriority>,
    /// Dependency ids; validated before the task is persisted.
    pub dependencies: Vec<String>,
    /// Free-form labels.
    pub tags: Vec<String>,
    /// Who is working on this.
    pub assignee: Option<String>,
    /// Implementation notes.
    pub details: Option<String>,
    /// How to verify the task is done.
    pub test_strategy: Option<String>,
}

/// Partial update for [`TasksDomain::update`]; unset fields are untouched.
#[derive(Clone, Debug, Default)]
pub struct TaskUpdate {
    /// New title (non-empty).
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New status.
    pub status: Option<TaskStatus>,
    /// New priority (top-level tasks only).
    pub priority: Option<TaskPriority>,
    /// Replacement dependency list; validated edge by edge.
    pub dependencies: Option<Vec<String>>,
    /// Replacement labels (top-level tasks only).
    pub tags: Option<Vec<String>>,
    /// New assignee.
    pub assignee: Option<String>,
    /// New implementation notes.
    pub details: Option<String>,
    /// New test strategy.
    pub test_strategy: Option<String>,
}

/// Input for [`TasksDomain::add_subtask`].
#[derive(Clone, Debug, Default)]
pub struct SubtaskDraft {
    /// Required, non-empty.
    pub title: String,
    /// Longer description.
    pub description: Option<String>,
    /// Defaults to `pending`.
    pub status: Option<TaskStatus>,
    /// Dependency ids: dotted, or bare (sibling first, then task).
    pub dependencies: Vec<String>,
    /// Who is working on this.
    pub assignee: Option<String>,
    /// Implementation notes.
    pub details: Option<String>,
    /// How to verify the subtask is done.
    pub test_strategy: Option<String>,
}

/// Outcome of [`TasksDomain::set_status`]: enough to render a diff without
/// a second read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    /// The id whose status changed (dotted for subtasks).
    pub task_id: String,
    /// Status before the change.
    pub old_status: TaskStatus,
    /// Status after the change.
    pub new_status: TaskStatus,
    /// Whether the change was persisted.
    pub success: bool,
}

/// The task lifecycle and dependency-editing API consumed by external
/// collaborators (CLI, HTTP routes, tool adapters).
pub struct TasksDomain {
    store: TaskStore,
    watcher: Option<FileWatcher>,
}

impl TasksDomain {
    /// A domain over `store`, without change notification.
    pub fn new(store: TaskStore) -> Self {
        Self {
            store,
            watcher: None,
        }
    }

    /// A domain over `store` with an injected change watcher.
    pub fn with_watcher(store: TaskStore, watcher: FileWatcher) -> Self {
        Self {
            store,
            watcher: Some(watcher),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────
    // Change notification
    // ─────────────────────────────────────────────────────────────────────

    /// Start the injected watcher, if any. Failure to establish the watch
    /// is logged and non-fatal — notification is a latency optimization,
    /// and consumers can always re-read through [`TasksDomain::list`].
    /// Returns whether the watch is running.
    pub fn watch(&self) -> bool {
        let Some(watcher) = &self.watcher else {
            return false;
        };
        match watcher.start() {
            Ok(()) => true,
            Err(error) => {
                warn!(%error, "change notification unavailable; consumers must re-read on demand");
                false
            }
        }
    }

    /// Stop the injected watcher, if any.
    pub fn unwatch(&self) {
        if let Some(watcher) = &self.watcher {
            watcher.stop();
        }
    }

    /// Subscribe to change notifications; `None` without an injected
    /// watcher.
    pub fn subscribe_changes(&self) -> Option<tokio::sync::broadcast::Receiver<WatchEvent>> {
        self.watcher.as_ref().map(FileWatcher::subscribe)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Task lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// The tasks of `tag` satisfying every set filter field.
    pub async fn list(&self, tag: &str, filter: &TaskFilter) -> Result<Vec<Task>> {
        let tasks = self.store.load(tag).await?;
        Ok(tasks.into_iter().filter(|t| filter.matches(t)).collect())
    }

    /// Resolve a plain or dotted id; `Ok(None)` when absent.
    pub async fn get(&self, tag: &str, id: &str) -> Result<Option<ResolvedTask>> {
        if TaskRef::parse(id).is_none() {
            return Err(DomainError::InvalidId { id: id.to_string() });
        }
        Ok(self.store.resolve(tag, id).await?)
    }

    /// Create a task. Ids are assigned sequentially unless the draft names
    /// one; declared dependencies are validated before anything persists.
    pub async fn create(&self, tag: &str, draft: TaskDraft) -> Result<Task> {
        if draft.title.trim().is_empty() {
            return Err(DomainError::InvalidInput(
                "task title must not be empty".to_string(),
            ));
        }
        let mut edit = self.store.edit(tag).await?;

        let id = match draft.id {
            Some(id) => {
                if !matches!(TaskRef::parse(&id), Some(TaskRef::Top(_))) {
                    return Err(DomainError::InvalidId { id });
                }
                if edit.tasks.iter().any(|t| t.id == id) {
                    return Err(DomainError::DuplicateId { id });
                }
                id
            }
            None => next_numeric_id(&edit.tasks),
        };

        // A fresh node has no dependents yet, so its edges cannot close a
        // cycle; existence and self-reference are the rules to enforce.
        let mut dependencies = Vec::new();
        for dep in &draft.dependencies {
            if *dep == id {
                return Err(taskdeck_core::GraphError::SelfDependency { id }.into());
            }
            let resolved = DependencyGraph::resolve_dependency(dep, None, &edit.tasks)
                .ok_or_else(|| taskdeck_core::GraphError::UnknownId { id: dep.clone() })?;
            if !dependencies.contains(&resolved) {
                dependencies.push(resolved);
            }
        }

        let task = Task {
            id,
            title: draft.title,
            description: draft.description,
            status: draft.status.unwrap_or_default(),
            priority: draft.priority.unwrap_or_default(),
            dependencies,
            subtasks: Vec::new(),
            tags: draft.tags,
            assignee: draft.assignee,
            details: draft.details,
            test_strategy: draft.test_strategy,
        };
        edit.tasks.push(task.clone());
        edit.commit().await?;
        debug!(tag, id = %task.id, "task created");
        Ok(task)
    }

    /// Apply a partial update to a task or (via a dotted id) a subtask.
    /// Returns the updated item.
    pub async fn update(&self, tag: &str, id: &str, update: TaskUpdate) -> Result<ResolvedTask> {
        let task_ref = TaskRef::parse(id).ok_or_else(|| DomainError::InvalidId {
            id: id.to_string(),
        })?;
        if let Some(title) = &update.title {
            if title.trim().is_empty() {
                return Err(DomainError::InvalidInput(
                    "task title must not be empty".to_string(),
                ));
            }
        }

        let mut edit = self.store.edit(tag).await?;
        let not_found = || DomainError::NotFound {
            id: id.to_string(),
            tag: tag.to_string(),
        };

        match &task_ref {
            TaskRef::Top(task_id) => {
                let idx = edit
                    .tasks
                    .iter()
                    .position(|t| t.id == *task_id)
                    .ok_or_else(not_found)?;
                let task = &mut edit.tasks[idx];
                if let Some(title) = update.title {
                    task.title = title;
                }
                if let Some(description) = update.description {
                    task.description = Some(description);
                }
                if let Some(status) = update.status {
                    task.status = status;
                }
                if let Some(priority) = update.priority {
                    task.priority = priority;
                }
                if let Some(tags) = update.tags {
                    task.tags = tags;
                }
                if let Some(assignee) = update.assignee {
                    task.assignee = Some(assignee);
                }
                if let Some(details) = update.details {
                    task.details = Some(details);
                }
                if let Some(test_strategy) = update.test_strategy {
                    task.test_strategy = Some(test_strategy);
                }
                if let Some(deps) = update.dependencies {
                    edit.tasks[idx].dependencies.clear();
                    replace_dependencies(task_id, None, &deps, &mut edit.tasks)?;
                }
            }
            TaskRef::Sub(parent_id, sub_id) => {
                if update.priority.is_some() || update.tags.is_some() {
                    return Err(DomainError::InvalidInput(
                        "subtasks carry no priority or tags".to_string(),
                    ));
                }
                let pidx = edit
                    .tasks
                    .iter()
                    .position(|t| t.id == *parent_id)
                    .ok_or_else(not_found)?;
                let sidx = edit.tasks[pidx]
                    .subtasks
                    .iter()
                    .position(|st| st.id == *sub_id)
                    .ok_or_else(not_found)?;
                let sub = &mut edit.tasks[pidx].subtasks[sidx];
                if let Some(title) = update.title {
                    sub.title = title;
                }
                if let Some(description) = update.description {
                    sub.description = Some(description);
                }
                if let Some(status) = update.status {
                    sub.status = status;
                }
                if let Some(assignee) = update.assignee {
                    sub.assignee = Some(assignee);
                }
                if let Some(details) = update.details {
                    sub.details = Some(details);
                }
                if let Some(test_strategy) = update.test_strategy {
                    sub.test_strategy = Some(test_strategy);
                }
                if let Some(deps) = update.dependencies {
                    let own = TaskRef::dotted(parent_id, *sub_id);
                    edit.tasks[pidx].subtasks[sidx].dependencies.clear();
                    replace_dependencies(&own, Some(parent_id), &deps, &mut edit.tasks)?;
                }
            }
        }

        let updated = TaskStore::resolve_in(&edit.tasks, id).ok_or_else(not_found)?;
        edit.commit().await?;
        debug!(tag, id, "task updated");
        Ok(updated)
    }

    /// Remove a task (or, via a dotted id, a subtask). Returns whether
    /// anything was removed. Former dependents keep their references; those
    /// become `missing` issues for [`TasksDomain::validate`] until repaired.
    pub async fn delete(&self, tag: &str, id: &str) -> Result<bool> {
        let task_ref = TaskRef::parse(id).ok_or_else(|| DomainError::InvalidId {
            id: id.to_string(),
        })?;
        let mut edit = self.store.edit(tag).await?;
        let removed = match task_ref {
            TaskRef::Top(task_id) => {
                let before = edit.tasks.len();
                edit.tasks.retain(|t| t.id != task_id);
                edit.tasks.len() != before
            }
            TaskRef::Sub(parent_id, sub_id) => {
                match edit.tasks.iter_mut().find(|t| t.id == parent_id) {
                    None => false,
                    Some(parent) => {
                        let before = parent.subtasks.len();
                        parent.subtasks.retain(|st| st.id != sub_id);
                        parent.subtasks.len() != before
                    }
                }
            }
        };
        if removed {
            edit.commit().await?;
            debug!(tag, id, "task deleted");
        }
        Ok(removed)
    }

    /// Change an item's status, returning both sides of the transition.
    pub async fn set_status(
        &self,
        tag: &str,
        id: &str,
        new_status: TaskStatus,
    ) -> Result<StatusChange> {
        let task_ref = TaskRef::parse(id).ok_or_else(|| DomainError::InvalidId {
            id: id.to_string(),
        })?;
        let mut edit = self.store.edit(tag).await?;
        let not_found = || DomainError::NotFound {
            id: id.to_string(),
            tag: tag.to_string(),
        };

        let old_status = match task_ref {
            TaskRef::Top(task_id) => {
                let task = edit
                    .tasks
                    .iter_mut()
                    .find(|t| t.id == task_id)
                    .ok_or_else(not_found)?;
                std::mem::replace(&mut task.status, new_status)
            }
            TaskRef::Sub(parent_id, sub_id) => {
                let sub = edit
                    .tasks
                    .iter_mut()
                    .find(|t| t.id == parent_id)
                    .and_then(|t| t.subtasks.iter_mut().find(|st| st.id == sub_id))
                    .ok_or_else(not_found)?;
                std::mem::replace(&mut sub.status, new_status)
            }
        };
        edit.commit().await?;
        debug!(tag, id, from = %old_status, to = %new_status, "status changed");
        Ok(StatusChange {
            task_id: id.to_string(),
            old_status,
            new_status,
            success: true,
        })
    }

    /// An `in-progress` task if one exists (lowest id first); otherwise the
    /// highest-priority `pending` task whose every dependency is done;
    /// otherwise `None`.
    pub async fn next_task(&self, tag: &str) -> Result<Option<Task>> {
        let tasks = self.store.load(tag).await?;

        if let Some(active) = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress)
            .min_by(|a, b| id_order(&a.id, &b.id))
        {
            return Ok(Some(active.clone()));
        }

        let mut candidates: Vec<&Task> = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending && dependencies_done(t, &tasks))
            .collect();
        candidates.sort_by(|a, b| {
            b.priority
                .rank()
                .cmp(&a.priority.rank())
                .then_with(|| id_order(&a.id, &b.id))
        });
        Ok(candidates.first().map(|t| (*t).clone()))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Dependency surface
    // ─────────────────────────────────────────────────────────────────────

    /// Add the edge `from -> to`, persisting on success. A rejection (self,
    /// circular, unknown id) leaves the document untouched.
    pub async fn add_dependency(&self, tag: &str, from: &str, to: &str) -> Result<()> {
        let mut edit = self.store.edit(tag).await?;
        DependencyGraph::add_dependency(from, to, &mut edit.tasks)?;
        edit.commit().await?;
        debug!(tag, from, to, "dependency added");
        Ok(())
    }

    /// Remove the edge `from -> to`; removing an absent edge is a no-op.
    pub async fn remove_dependency(&self, tag: &str, from: &str, to: &str) -> Result<bool> {
        let mut edit = self.store.edit(tag).await?;
        let removed = DependencyGraph::remove_dependency(from, to, &mut edit.tasks);
        if removed {
            edit.commit().await?;
            debug!(tag, from, to, "dependency removed");
        }
        Ok(removed)
    }

    /// Check the tag's dependency relation without mutating anything.
    pub async fn validate(&self, tag: &str) -> Result<ValidationReport> {
        let tasks = self.store.load(tag).await?;
        Ok(DependencyGraph::validate(&tasks))
    }

    /// Repair self edges, dangling edges, and duplicates, persisting when
    /// anything changed. Cycles are left for the caller to resolve.
    pub async fn fix(&self, tag: &str) -> Result<FixReport> {
        let mut edit = self.store.edit(tag).await?;
        let report = DependencyGraph::fix(&mut edit.tasks);
        if !report.is_noop() {
            edit.commit().await?;
            debug!(
                tag,
                removed = report.removed_count,
                duplicates = report.duplicates_removed,
                "dependencies repaired"
            );
        }
        Ok(report)
    }

    /// Forward dependency lookup; `None` when the id resolves to nothing.
    pub async fn dependencies_of(&self, tag: &str, id: &str) -> Result<Option<Vec<String>>> {
        let tasks = self.store.load(tag).await?;
        Ok(DependencyGraph::dependencies_of(id, &tasks))
    }

    /// Reverse dependency lookup across tasks and subtasks.
    pub async fn dependents_of(&self, tag: &str, id: &str) -> Result<Vec<String>> {
        let tasks = self.store.load(tag).await?;
        Ok(DependencyGraph::dependents_of(id, &tasks))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Subtasks
    // ─────────────────────────────────────────────────────────────────────

    /// Append a subtask under `parent`, assigning the next integer id.
    pub async fn add_subtask(
        &self,
        tag: &str,
        parent: &str,
        draft: SubtaskDraft,
    ) -> Result<Subtask> {
        if draft.title.trim().is_empty() {
            return Err(DomainError::InvalidInput(
                "subtask title must not be empty".to_string(),
            ));
        }
        if !matches!(TaskRef::parse(parent), Some(TaskRef::Top(_))) {
            return Err(DomainError::InvalidId {
                id: parent.to_string(),
            });
        }
        let mut edit = self.store.edit(tag).await?;
        let pidx = edit
            .tasks
            .iter()
            .position(|t| t.id == parent)
            .ok_or_else(|| DomainError::NotFound {
                id: parent.to_string(),
                tag: tag.to_string(),
            })?;

        for dep in &draft.dependencies {
            if DependencyGraph::resolve_dependency(dep, Some(parent), &edit.tasks).is_none() {
                return Err(taskdeck_core::GraphError::UnknownId { id: dep.clone() }.into());
            }
        }

        let next_id = edit.tasks[pidx]
            .subtasks
            .iter()
            .map(|st| st.id)
            .max()
            .map_or(1, |m| m + 1);
        let subtask = Subtask {
            id: next_id,
            title: draft.title,
            description: draft.description,
            status: draft.status.unwrap_or_default(),
            dependencies: draft.dependencies,
            assignee: draft.assignee,
            details: draft.details,
            test_strategy: draft.test_strategy,
        };
        edit.tasks[pidx].subtasks.push(subtask.clone());
        edit.commit().await?;
        debug!(tag, parent, id = subtask.id, "subtask added");
        Ok(subtask)
    }

    /// Remove every subtask under `parent`, returning how many went away.
    pub async fn clear_subtasks(&self, tag: &str, parent: &str) -> Result<usize> {
        let mut edit = self.store.edit(tag).await?;
        let task = edit
            .tasks
            .iter_mut()
            .find(|t| t.id == parent)
            .ok_or_else(|| DomainError::NotFound {
                id: parent.to_string(),
                tag: tag.to_string(),
            })?;
        let cleared = task.subtasks.len();
        task.subtasks.clear();
        if cleared > 0 {
            edit.commit().await?;
        }
        Ok(cleared)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Tags
    // ─────────────────────────────────────────────────────────────────────

    /// All tag names in the document.
    pub async fn tags(&self) -> Result<Vec<String>> {
        Ok(self.store.tags().await?)
    }

    /// Remove a tag and everything in it.
    pub async fn delete_tag(&self, tag: &str) -> Result<bool> {
        Ok(self.store.delete_tag(tag).await?)
    }

    /// Rename a tag; no-op unless `from` exists and `to` does not.
    pub async fn rename_tag(&self, from: &str, to: &str) -> Result<bool> {
        Ok(self.store.rename_tag(from, to).await?)
    }
}

/// Rebuild a node's dependency list edge by edge so each addition passes
/// the full rule set (existence, self, cycle) against the current state.
fn replace_dependencies(
    own: &str,
    parent: Option<&str>,
    deps: &[String],
    tasks: &mut [Task],
) -> Result<()> {
    for dep in deps {
        let resolved = DependencyGraph::resolve_dependency(dep, parent, tasks)
            .ok_or_else(|| taskdeck_core::GraphError::UnknownId { id: dep.clone() })?;
        DependencyGraph::add_dependency(own, &resolved, tasks)?;
    }
    Ok(())
}

/// Numeric ids order numerically; anything else sorts after, lexically.
fn id_order(a: &str, b: &str) -> Ordering {
    let key = |id: &str| (id.parse::<u64>().unwrap_or(u64::MAX), id.to_string());
    key(a).cmp(&key(b))
}

/// Next sequential top-level id: one past the highest numeric id in use.
fn next_numeric_id(tasks: &[Task]) -> String {
    tasks
        .iter()
        .filter_map(|t| t.id.parse::<u64>().ok())
        .max()
        .map_or(1, |m| m + 1)
        .to_string()
}

/// Every dependency resolves to an item whose status is `done`.
fn dependencies_done(task: &Task, tasks: &[Task]) -> bool {
    task.dependencies
        .iter()
        .all(|dep| TaskStore::resolve_in(tasks, dep).is_some_and(|r| r.status().is_done()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use taskdeck_core::graph::DependencyIssue;
    use taskdeck_core::GraphError;
    use taskdeck_store::{StoreConfig, StoreError};

    fn domain_at(dir: &tempfile::TempDir) -> TasksDomain {
        TasksDomain::new(TaskStore::new(
            dir.path().join("tasks.json"),
            &StoreConfig::default(),
        ))
    }

    fn draft(title: &str) -> TaskDraft {
        TaskDraft {
            title: title.to_string(),
            ..TaskDraft::default()
        }
    }

    // ── create ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn create_assigns_sequential_ids() {
        let dir = tempfile::tempdir().unwrap();
        let domain = domain_at(&dir);
        let first = domain.create("main", draft("first")).await.unwrap();
        let second = domain.create("main", draft("second")).await.unwrap();
        assert_eq!(first.id, "1");
        assert_eq!(second.id, "2");

        // Explicit ids shift the sequence forward
        let explicit = TaskDraft {
            id: Some("10".to_string()),
            ..draft("tenth")
        };
        let _ = domain.create("main", explicit).await.unwrap();
        let next = domain.create("main", draft("next")).await.unwrap();
        assert_eq!(next.id, "11");
    }

    #[tokio::test]
    async fn create_rejects_bad_drafts() {
        let dir = tempfile::tempdir().unwrap();
        let domain = domain_at(&dir);
        let _ = domain.create("main", draft("existing")).await.unwrap();

        let err = domain.create("main", draft("  ")).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));

        let err = domain
            .create(
                "main",
                TaskDraft {
                    id: Some("1".to_string()),
                    ..draft("collides")
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::DuplicateId { .. }));

        let err = domain
            .create(
                "main",
                TaskDraft {
                    id: Some("2.1".to_string()),
                    ..draft("dotted id")
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidId { .. }));

        let err = domain
            .create(
                "main",
                TaskDraft {
                    dependencies: vec!["99".to_string()],
                    ..draft("dangling")
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Graph(GraphError::UnknownId { .. })
        ));
    }

    #[tokio::test]
    async fn create_with_dependencies_persists_them() {
        let dir = tempfile::tempdir().unwrap();
        let domain = domain_at(&dir);
        let _ = domain.create("main", draft("base")).await.unwrap();
        let task = domain
            .create(
                "main",
                TaskDraft {
                    dependencies: vec!["1".to_string(), "1".to_string()],
                    ..draft("dependent")
                },
            )
            .await
            .unwrap();
        // Duplicates collapse on the way in
        assert_eq!(task.dependencies, vec!["1".to_string()]);
        assert_eq!(
            domain.dependencies_of("main", "2").await.unwrap(),
            Some(vec!["1".to_string()])
        );
    }

    // ── list / get ──────────────────────────────────────────────────

    #[tokio::test]
    async fn list_applies_combined_filters() {
        let dir = tempfile::tempdir().unwrap();
        let domain = domain_at(&dir);
        let _ = domain
            .create(
                "main",
                TaskDraft {
                    priority: Some(TaskPriority::High),
                    tags: vec!["backend".to_string()],
                    ..draft("fix the indexer")
                },
            )
            .await
            .unwrap();
        let _ = domain
            .create(
                "main",
                TaskDraft {
                    priority: Some(TaskPriority::High),
                    ..draft("polish the docs")
                },
            )
            .await
            .unwrap();

        let hits = domain
            .list(
                "main",
                &TaskFilter {
                    priority: Some(TaskPriority::High),
                    label: Some("backend".to_string()),
                    search: Some("indexer".to_string()),
                    ..TaskFilter::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "1");

        let all = domain.list("main", &TaskFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn get_resolves_plain_and_dotted() {
        let dir = tempfile::tempdir().unwrap();
        let domain = domain_at(&dir);
        let _ = domain.create("main", draft("parent")).await.unwrap();
        let _ = domain
            .add_subtask(
                "main",
                "1",
                SubtaskDraft {
                    title: "child".to_string(),
                    ..SubtaskDraft::default()
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            domain.get("main", "1").await.unwrap(),
            Some(ResolvedTask::Task(_))
        ));
        assert!(matches!(
            domain.get("main", "1.1").await.unwrap(),
            Some(ResolvedTask::Subtask { .. })
        ));
        assert!(domain.get("main", "7").await.unwrap().is_none());
        assert!(matches!(
            domain.get("main", "1.2.3").await.unwrap_err(),
            DomainError::InvalidId { .. }
        ));
    }

    // ── update ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn update_touches_only_set_fields() {
        let dir = tempfile::tempdir().unwrap();
        let domain = domain_at(&dir);
        let _ = domain
            .create(
                "main",
                TaskDraft {
                    description: Some("original".to_string()),
                    ..draft("original title")
                },
            )
            .await
            .unwrap();

        let updated = domain
            .update(
                "main",
                "1",
                TaskUpdate {
                    title: Some("new title".to_string()),
                    priority: Some(TaskPriority::Critical),
                    ..TaskUpdate::default()
                },
            )
            .await
            .unwrap();
        match updated {
            ResolvedTask::Task(task) => {
                assert_eq!(task.title, "new title");
                assert_eq!(task.priority, TaskPriority::Critical);
                assert_eq!(task.description.as_deref(), Some("original"));
            }
            other => panic!("expected task, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn update_replaces_dependencies_with_validation() {
        let dir = tempfile::tempdir().unwrap();
        let domain = domain_at(&dir);
        let _ = domain.create("main", draft("one")).await.unwrap();
        let _ = domain
            .create(
                "main",
                TaskDraft {
                    dependencies: vec!["1".to_string()],
                    ..draft("two")
                },
            )
            .await
            .unwrap();

        // Replacing task 1's deps with ["2"] would close 1 -> 2 -> 1
        let err = domain
            .update(
                "main",
                "1",
                TaskUpdate {
                    dependencies: Some(vec!["2".to_string()]),
                    ..TaskUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Graph(GraphError::CircularDependency { .. })
        ));
        // Rejected update persisted nothing
        assert_eq!(
            domain.dependencies_of("main", "1").await.unwrap(),
            Some(vec![])
        );
    }

    #[tokio::test]
    async fn update_subtask_fields() {
        let dir = tempfile::tempdir().unwrap();
        let domain = domain_at(&dir);
        let _ = domain.create("main", draft("parent")).await.unwrap();
        let _ = domain
            .add_subtask(
                "main",
                "1",
                SubtaskDraft {
                    title: "child".to_string(),
                    ..SubtaskDraft::default()
                },
            )
            .await
            .unwrap();

        let updated = domain
            .update(
                "main",
                "1.1",
                TaskUpdate {
                    title: Some("renamed child".to_string()),
                    status: Some(TaskStatus::Review),
                    ..TaskUpdate::default()
                },
            )
            .await
            .unwrap();
        match updated {
            ResolvedTask::Subtask { subtask, .. } => {
                assert_eq!(subtask.title, "renamed child");
                assert_eq!(subtask.status, TaskStatus::Review);
            }
            other => panic!("expected subtask, got {other:?}"),
        }

        let err = domain
            .update(
                "main",
                "1.1",
                TaskUpdate {
                    priority: Some(TaskPriority::High),
                    ..TaskUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));
    }

    // ── delete ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn delete_leaves_missing_dependency_until_repaired() {
        let dir = tempfile::tempdir().unwrap();
        let domain = domain_at(&dir);
        let _ = domain.create("main", draft("base")).await.unwrap();
        let _ = domain
            .create(
                "main",
                TaskDraft {
                    dependencies: vec!["1".to_string()],
                    ..draft("dependent")
                },
            )
            .await
            .unwrap();

        assert!(domain.delete("main", "1").await.unwrap());
        assert!(!domain.delete("main", "1").await.unwrap());

        let report = domain.validate("main").await.unwrap();
        assert_eq!(
            report.issues,
            vec![DependencyIssue::Missing {
                id: "2".to_string(),
                dependency: "1".to_string()
            }]
        );

        let fixed = domain.fix("main").await.unwrap();
        assert_eq!(fixed.removed_count, 1);
        assert!(domain.validate("main").await.unwrap().valid);
    }

    #[tokio::test]
    async fn delete_subtask_via_dotted_id() {
        let dir = tempfile::tempdir().unwrap();
        let domain = domain_at(&dir);
        let _ = domain.create("main", draft("parent")).await.unwrap();
        let _ = domain
            .add_subtask(
                "main",
                "1",
                SubtaskDraft {
                    title: "child".to_string(),
                    ..SubtaskDraft::default()
                },
            )
            .await
            .unwrap();

        assert!(domain.delete("main", "1.1").await.unwrap());
        assert!(domain.get("main", "1.1").await.unwrap().is_none());
        assert!(domain.get("main", "1").await.unwrap().is_some());
    }

    // ── set_status ──────────────────────────────────────────────────

    #[tokio::test]
    async fn set_status_reports_both_sides() {
        let dir = tempfile::tempdir().unwrap();
        let domain = domain_at(&dir);
        let _ = domain.create("main", draft("work")).await.unwrap();

        let change = domain
            .set_status("main", "1", TaskStatus::InProgress)
            .await
            .unwrap();
        assert_eq!(
            change,
            StatusChange {
                task_id: "1".to_string(),
                old_status: TaskStatus::Pending,
                new_status: TaskStatus::InProgress,
                success: true,
            }
        );

        match domain.get("main", "1").await.unwrap().unwrap() {
            ResolvedTask::Task(task) => assert_eq!(task.status, TaskStatus::InProgress),
            other => panic!("expected task, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn set_status_on_subtask_and_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let domain = domain_at(&dir);
        let _ = domain.create("main", draft("parent")).await.unwrap();
        let _ = domain
            .add_subtask(
                "main",
                "1",
                SubtaskDraft {
                    title: "child".to_string(),
                    ..SubtaskDraft::default()
                },
            )
            .await
            .unwrap();

        let change = domain
            .set_status("main", "1.1", TaskStatus::Done)
            .await
            .unwrap();
        assert_eq!(change.task_id, "1.1");
        assert_eq!(change.old_status, TaskStatus::Pending);

        let err = domain
            .set_status("main", "9", TaskStatus::Done)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    // ── dependency surface ──────────────────────────────────────────

    #[tokio::test]
    async fn add_dependency_rejection_changes_nothing() {
        // tasks [1, 2] with 2 -> 1; adding 1 -> 2 is circular and the
        // document stays untouched
        let dir = tempfile::tempdir().unwrap();
        let domain = domain_at(&dir);
        let _ = domain.create("main", draft("one")).await.unwrap();
        let _ = domain
            .create(
                "main",
                TaskDraft {
                    dependencies: vec!["1".to_string()],
                    ..draft("two")
                },
            )
            .await
            .unwrap();

        let err = domain.add_dependency("main", "1", "2").await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Graph(GraphError::CircularDependency { .. })
        ));
        assert_eq!(
            domain.dependencies_of("main", "1").await.unwrap(),
            Some(vec![])
        );
    }

    #[tokio::test]
    async fn add_and_remove_dependency_persist() {
        let dir = tempfile::tempdir().unwrap();
        let domain = domain_at(&dir);
        let _ = domain.create("main", draft("one")).await.unwrap();
        let _ = domain.create("main", draft("two")).await.unwrap();

        domain.add_dependency("main", "2", "1").await.unwrap();
        assert_eq!(
            domain.dependents_of("main", "1").await.unwrap(),
            vec!["2".to_string()]
        );

        assert!(domain.remove_dependency("main", "2", "1").await.unwrap());
        assert!(!domain.remove_dependency("main", "2", "1").await.unwrap());
        assert_eq!(
            domain.dependencies_of("main", "2").await.unwrap(),
            Some(vec![])
        );
    }

    #[tokio::test]
    async fn fix_persists_repairs() {
        let dir = tempfile::tempdir().unwrap();
        let domain = domain_at(&dir);
        // Seed a defective document through the store, bypassing the
        // domain's fail-fast checks — this is what an external writer
        // could leave behind
        let mut broken = Task::new("2", "broken");
        broken.dependencies = vec!["1".to_string(), "1".to_string(), "7".to_string()];
        domain
            .store()
            .save("main", vec![Task::new("1", "base"), broken])
            .await
            .unwrap();

        let report = domain.fix("main").await.unwrap();
        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(report.removed_count, 1);

        // Fixed state persisted; a second pass is a no-op
        let again = domain.fix("main").await.unwrap();
        assert!(again.is_noop());
        assert_eq!(
            domain.dependencies_of("main", "2").await.unwrap(),
            Some(vec!["1".to_string()])
        );
    }

    // ── next_task ───────────────────────────────────────────────────

    #[tokio::test]
    async fn next_task_prefers_in_progress() {
        let dir = tempfile::tempdir().unwrap();
        let domain = domain_at(&dir);
        let _ = domain.create("main", draft("pending work")).await.unwrap();
        let _ = domain
            .create(
                "main",
                TaskDraft {
                    status: Some(TaskStatus::InProgress),
                    ..draft("active work")
                },
            )
            .await
            .unwrap();

        let next = domain.next_task("main").await.unwrap().unwrap();
        assert_eq!(next.id, "2");
    }

    #[tokio::test]
    async fn next_task_orders_by_priority_then_id() {
        let dir = tempfile::tempdir().unwrap();
        let domain = domain_at(&dir);
        let _ = domain.create("main", draft("medium a")).await.unwrap();
        let _ = domain
            .create(
                "main",
                TaskDraft {
                    priority: Some(TaskPriority::Critical),
                    ..draft("critical late")
                },
            )
            .await
            .unwrap();
        let _ = domain
            .create(
                "main",
                TaskDraft {
                    priority: Some(TaskPriority::Critical),
                    ..draft("critical later")
                },
            )
            .await
            .unwrap();

        let next = domain.next_task("main").await.unwrap().unwrap();
        assert_eq!(next.id, "2", "highest priority, lowest id wins");
    }

    #[tokio::test]
    async fn next_task_requires_done_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let domain = domain_at(&dir);
        let _ = domain.create("main", draft("blocker")).await.unwrap();
        let _ = domain
            .create(
                "main",
                TaskDraft {
                    priority: Some(TaskPriority::Critical),
                    dependencies: vec!["1".to_string()],
                    ..draft("gated")
                },
            )
            .await
            .unwrap();

        // Task 2 outranks 1 but its dependency is not done
        let next = domain.next_task("main").await.unwrap().unwrap();
        assert_eq!(next.id, "1");

        let _ = domain.set_status("main", "1", TaskStatus::Done).await.unwrap();
        let next = domain.next_task("main").await.unwrap().unwrap();
        assert_eq!(next.id, "2");

        let _ = domain.set_status("main", "2", TaskStatus::Done).await.unwrap();
        assert!(domain.next_task("main").await.unwrap().is_none());
    }

    // ── subtasks ────────────────────────────────────────────────────

    #[tokio::test]
    async fn add_subtask_assigns_sibling_ids() {
        let dir = tempfile::tempdir().unwrap();
        let domain = domain_at(&dir);
        let _ = domain.create("main", draft("parent")).await.unwrap();

        let first = domain
            .add_subtask(
                "main",
                "1",
                SubtaskDraft {
                    title: "a".to_string(),
                    ..SubtaskDraft::default()
                },
            )
            .await
            .unwrap();
        let second = domain
            .add_subtask(
                "main",
                "1",
                SubtaskDraft {
                    title: "b".to_string(),
                    dependencies: vec!["1".to_string()],
                    ..SubtaskDraft::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);

        // The bare "1" dependency resolves to sibling 1.1
        assert_eq!(
            domain.dependents_of("main", "1.1").await.unwrap(),
            vec!["1.2".to_string()]
        );

        assert_eq!(domain.clear_subtasks("main", "1").await.unwrap(), 2);
        assert_eq!(domain.clear_subtasks("main", "1").await.unwrap(), 0);
    }

    // ── tags ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn tag_management_passthroughs() {
        let dir = tempfile::tempdir().unwrap();
        let domain = domain_at(&dir);
        let _ = domain.create("main", draft("a")).await.unwrap();
        let _ = domain.create("feature", draft("b")).await.unwrap();

        assert_eq!(
            domain.tags().await.unwrap(),
            vec!["feature".to_string(), "main".to_string()]
        );
        assert!(domain.rename_tag("feature", "release").await.unwrap());
        assert!(domain.delete_tag("release").await.unwrap());
        assert_eq!(domain.tags().await.unwrap(), vec!["main".to_string()]);
    }

    #[tokio::test]
    async fn corrupt_document_surfaces_as_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let domain = domain_at(&dir);
        std::fs::write(dir.path().join("tasks.json"), "{oops").unwrap();
        let err = domain.list("main", &TaskFilter::default()).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Store(StoreError::Corrupt { .. })
        ));
    }

    // ── change notification ─────────────────────────────────────────

    #[tokio::test]
    async fn watcher_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let domain = domain_at(&dir);
        assert!(!domain.watch());
        assert!(domain.subscribe_changes().is_none());
    }

    #[tokio::test]
    async fn domain_writes_notify_subscribers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        let config = StoreConfig {
            debounce_ms: 50,
            min_notify_spacing_ms: 10,
            ..StoreConfig::default()
        };
        let domain = TasksDomain::with_watcher(
            TaskStore::new(&path, &config),
            FileWatcher::new(&path, &config),
        );
        let mut rx = domain.subscribe_changes().unwrap();
        assert!(domain.watch());
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let _ = domain.create("main", draft("observable")).await.unwrap();

        let event = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .expect("notification within timeout")
            .unwrap();
        assert!(matches!(event, WatchEvent::Changed { .. }));
        domain.unwatch();
    }
}
