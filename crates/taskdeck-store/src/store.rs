//! Tag-partitioned task storage over the atomic writer.
//!
//! The unit of atomicity is the single physical document, not a per-tag
//! slice, so every save is a read-modify-write of the *whole* document held
//! under the document-level lock. Absence (no document yet, unknown tag) is
//! routine and yields empty collections; only genuine faults (corruption,
//! I/O, lock timeout) surface as errors.

use std::path::{Path, PathBuf};

use tracing::debug;

use taskdeck_core::ids::TaskRef;
use taskdeck_core::types::{Document, Subtask, TagCollection, TagMetadata, Task, TaskStatus};

use crate::atomic::{AtomicFileWriter, PathLock};
use crate::config::StoreConfig;
use crate::errors::Result;

/// Outcome of resolving a plain or dotted id within a tag.
#[derive(Clone, Debug, PartialEq)]
pub enum ResolvedTask {
    /// A top-level task.
    Task(Task),
    /// A subtask, with the parent it nests under.
    Subtask {
        /// Id of the enclosing task.
        parent_id: String,
        /// The subtask itself.
        subtask: Subtask,
    },
}

impl ResolvedTask {
    /// The externally-visible id (dotted for subtasks).
    pub fn id(&self) -> String {
        match self {
            Self::Task(task) => task.id.clone(),
            Self::Subtask { parent_id, subtask } => TaskRef::dotted(parent_id, subtask.id),
        }
    }

    /// Current status of the resolved item.
    pub fn status(&self) -> TaskStatus {
        match self {
            Self::Task(task) => task.status,
            Self::Subtask { subtask, .. } => subtask.status,
        }
    }

    /// Title of the resolved item.
    pub fn title(&self) -> &str {
        match self {
            Self::Task(task) => &task.title,
            Self::Subtask { subtask, .. } => &subtask.title,
        }
    }
}

/// Tag-partitioned load/save for the task document.
///
/// The only component that touches the document path directly; everything
/// above it goes through [`TaskStore::load`], [`TaskStore::save`], or a
/// [`TagEdit`] checkout.
pub struct TaskStore {
    path: PathBuf,
    writer: AtomicFileWriter,
}

impl TaskStore {
    /// Create a store for the document at `path`.
    pub fn new(path: impl Into<PathBuf>, config: &StoreConfig) -> Self {
        Self {
            path: path.into(),
            writer: AtomicFileWriter::new(config),
        }
    }

    /// The document path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the whole document; a missing file is an empty document.
    pub async fn load_document(&self) -> Result<Document> {
        Ok(self
            .writer
            .read_json::<Document>(&self.path)
            .await?
            .unwrap_or_default())
    }

    /// The tasks for `tag`; a missing document or tag is an empty list.
    pub async fn load(&self, tag: &str) -> Result<Vec<Task>> {
        let mut doc = self.load_document().await?;
        Ok(doc.remove(tag).map(|c| c.tasks).unwrap_or_default())
    }

    /// Replace `tag`'s task list, recomputing its metadata, holding the
    /// document lock for the full read-modify-write.
    pub async fn save(&self, tag: &str, tasks: Vec<Task>) -> Result<()> {
        let lock = self.writer.acquire(&self.path).await?;
        let result = self.save_locked(tag, tasks).await;
        lock.release().await;
        result
    }

    /// Check out `tag` for mutation. The returned [`TagEdit`] holds the
    /// document lock until committed or dropped, so concurrent callers in
    /// this process serialize in arrival order and no update is lost.
    pub async fn edit(&self, tag: &str) -> Result<TagEdit<'_>> {
        let lock = self.writer.acquire(&self.path).await?;
        let mut doc = match self.load_document().await {
            Ok(doc) => doc,
            Err(err) => {
                lock.release().await;
                return Err(err);
            }
        };
        let tasks = doc.remove(tag).map(|c| c.tasks).unwrap_or_default();
        Ok(TagEdit {
            store: self,
            tag: tag.to_string(),
            tasks,
            lock,
        })
    }

    /// Resolve a plain or dotted id within `tag`.
    pub async fn resolve(&self, tag: &str, id: &str) -> Result<Option<ResolvedTask>> {
        let tasks = self.load(tag).await?;
        Ok(Self::resolve_in(&tasks, id))
    }

    /// Resolve a plain or dotted id within an already-loaded task list.
    pub fn resolve_in(tasks: &[Task], id: &str) -> Option<ResolvedTask> {
        match TaskRef::parse(id)? {
            TaskRef::Top(i) => tasks
                .iter()
                .find(|t| t.id == i)
                .cloned()
                .map(ResolvedTask::Task),
            TaskRef::Sub(parent, sub) => tasks
                .iter()
                .find(|t| t.id == parent)?
                .subtasks
                .iter()
                .find(|st| st.id == sub)
                .map(|st| ResolvedTask::Subtask {
                    parent_id: parent.clone(),
                    subtask: st.clone(),
                }),
        }
    }

    /// All tag names present in the document.
    pub async fn tags(&self) -> Result<Vec<String>> {
        Ok(self.load_document().await?.into_keys().collect())
    }

    /// Remove a tag and everything in it. Returns whether it existed.
    pub async fn delete_tag(&self, tag: &str) -> Result<bool> {
        let lock = self.writer.acquire(&self.path).await?;
        let result = self.delete_tag_locked(tag).await;
        lock.release().await;
        result
    }

    async fn delete_tag_locked(&self, tag: &str) -> Result<bool> {
        let mut doc = self.load_document().await?;
        if doc.remove(tag).is_none() {
            return Ok(false);
        }
        self.writer.write_json(&self.path, &doc).await?;
        debug!(tag, "tag deleted");
        Ok(true)
    }

    /// Rename a tag. Succeeds only when `from` exists and `to` does not;
    /// returns whether the rename happened.
    pub async fn rename_tag(&self, from: &str, to: &str) -> Result<bool> {
        let lock = self.writer.acquire(&self.path).await?;
        let result = self.rename_tag_locked(from, to).await;
        lock.release().await;
        result
    }

    async fn rename_tag_locked(&self, from: &str, to: &str) -> Result<bool> {
        let mut doc = self.load_document().await?;
        if doc.contains_key(to) {
            return Ok(false);
        }
        let Some(collection) = doc.remove(from) else {
            return Ok(false);
        };
        let _ = doc.insert(to.to_string(), collection);
        self.writer.write_json(&self.path, &doc).await?;
        debug!(from, to, "tag renamed");
        Ok(true)
    }

    /// Read-modify-write of the whole document; the caller holds the lock.
    async fn save_locked(&self, tag: &str, tasks: Vec<Task>) -> Result<()> {
        let mut doc = self.load_document().await?;
        let version = doc.get(tag).map(|c| c.metadata.version.clone());
        let metadata = TagMetadata::recompute(&tasks, version);
        debug!(tag, count = tasks.len(), "saving tag");
        let _ = doc.insert(tag.to_string(), TagCollection { tasks, metadata });
        self.writer.write_json(&self.path, &doc).await
    }
}

/// A checked-out tag: the task list plus the held document lock.
///
/// Mutate [`TagEdit::tasks`] freely, then [`TagEdit::commit`]. Dropping
/// without committing abandons the changes and releases the lock.
pub struct TagEdit<'a> {
    store: &'a TaskStore,
    tag: String,
    /// The tag's tasks, free to mutate until commit.
    pub tasks: Vec<Task>,
    lock: PathLock,
}

impl TagEdit<'_> {
    /// The tag this checkout belongs to.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Persist the (possibly mutated) task list and release the lock.
    pub async fn commit(self) -> Result<()> {
        let Self {
            store,
            tag,
            tasks,
            lock,
        } = self;
        let result = store.save_locked(&tag, tasks).await;
        lock.release().await;
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
