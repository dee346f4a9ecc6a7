//! Debounced change notification for a single document path.
//!
//! The commit rename in [`crate::atomic`] replaces the file's inode, so the
//! watch is registered on the parent directory and filtered to the one file
//! name. Staging artifacts (`.tmp`, `.lock`, `.bak`, leading-dot names)
//! never trigger a notification.
//!
//! Notification is a latency optimization for caches, not a correctness
//! dependency: a consumer that misses an event (or a platform where the
//! watch cannot be established) can always re-read the document. The
//! watcher therefore reports setup failures as an event plus a returned
//! error and leaves the host process running.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use notify::{RecursiveMode, Watcher};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::errors::{Result, StoreError};

/// A change notification, or a watch-level failure.
///
/// `Changed` carries no diff payload; subscribers re-query the domain to
/// learn what changed.
#[derive(Clone, Debug)]
pub enum WatchEvent {
    /// The watched document changed (possibly from another process).
    Changed {
        /// The watched path.
        path: PathBuf,
        /// When the notification was delivered.
        at: DateTime<Utc>,
    },
    /// The underlying watch failed; change notification is unavailable.
    Error {
        /// Human-readable description of the failure.
        message: String,
    },
}

/// Watches exactly one file and emits debounced [`WatchEvent`]s.
pub struct FileWatcher {
    path: PathBuf,
    debounce: Duration,
    min_spacing: Duration,
    events: broadcast::Sender<WatchEvent>,
    inner: parking_lot::Mutex<Option<WatcherInner>>,
}

struct WatcherInner {
    // Held for its side effect: dropping it tears down the OS watch.
    _watcher: notify::RecommendedWatcher,
    task: tokio::task::JoinHandle<()>,
}

impl FileWatcher {
    /// Create a watcher for `path` using the configured debounce figures.
    /// No watch is established until [`FileWatcher::start`].
    pub fn new(path: impl Into<PathBuf>, config: &StoreConfig) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            path: path.into(),
            debounce: config.debounce(),
            min_spacing: config.min_notify_spacing(),
            events,
            inner: parking_lot::Mutex::new(None),
        }
    }

    /// The watched path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Subscribe to change notifications. Valid before or after `start`.
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }

    /// Whether the underlying watch is currently established.
    pub fn is_watching(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// Establish the watch and start the debounce loop.
    ///
    /// Must be called from within a tokio runtime. On failure the error is
    /// also emitted as [`WatchEvent::Error`] so subscribers learn that
    /// notifications will not arrive; the caller decides whether that is
    /// fatal (for this core it never is).
    pub fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.is_some() {
            return Ok(());
        }

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let mut watcher = match notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    let _ = tx.send(event);
                }
                Err(error) => warn!(%error, "watch backend error"),
            }
        }) {
            Ok(w) => w,
            Err(source) => return Err(self.watch_failed(source)),
        };
        if let Err(source) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
            return Err(self.watch_failed(source));
        }

        let task = tokio::spawn(debounce_loop(
            rx,
            self.path.clone(),
            self.events.clone(),
            self.debounce,
            self.min_spacing,
        ));
        *inner = Some(WatcherInner {
            _watcher: watcher,
            task,
        });
        debug!(path = ?self.path, "file watcher started");
        Ok(())
    }

    /// Tear down the watch. Subscribers stay subscribed and see events
    /// again after a future `start`.
    pub fn stop(&self) {
        if let Some(inner) = self.inner.lock().take() {
            inner.task.abort();
            debug!(path = ?self.path, "file watcher stopped");
        }
    }

    fn watch_failed(&self, source: notify::Error) -> StoreError {
        let _ = self.events.send(WatchEvent::Error {
            message: source.to_string(),
        });
        warn!(path = ?self.path, error = %source, "could not establish watch");
        StoreError::Watch {
            path: self.path.clone(),
            source,
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Collapse bursts of raw notifications into single `Changed` events:
/// each relevant notification restarts the debounce timer, and delivered
/// events are additionally spaced at least `min_spacing` apart.
async fn debounce_loop(
    mut rx: tokio::sync::mpsc::UnboundedReceiver<notify::Event>,
    path: PathBuf,
    events: broadcast::Sender<WatchEvent>,
    debounce: Duration,
    min_spacing: Duration,
) {
    let watched_name = path.file_name().map(OsStr::to_os_string);
    let Some(watched_name) = watched_name else {
        return;
    };
    let mut deadline: Option<tokio::time::Instant> = None;
    let mut last_emit: Option<tokio::time::Instant> = None;

    loop {
        tokio::select! {
            maybe = rx.recv() => match maybe {
                None => break,
                Some(event) => {
                    if event.paths.iter().any(|p| is_relevant(p, &watched_name)) {
                        deadline = Some(tokio::time::Instant::now() + debounce);
                    }
                }
            },
            () = tokio::time::sleep_until(deadline.unwrap_or_else(tokio::time::Instant::now)),
                if deadline.is_some() =>
            {
                let now = tokio::time::Instant::now();
                let earliest = last_emit.map(|l| l + min_spacing);
                if earliest.is_some_and(|e| now < e) {
                    deadline = earliest;
                } else {
                    let _ = events.send(WatchEvent::Changed {
                        path: path.clone(),
                        at: Utc::now(),
                    });
                    last_emit = Some(now);
                    deadline = None;
                }
            }
        }
    }
}

/// A raw notification path matters only if it names the watched file and
/// carries no transient-artifact marker.
fn is_relevant(candidate: &Path, watched_name: &OsStr) -> bool {
    let Some(name) = candidate.file_name() else {
        return false;
    };
    if let Some(s) = name.to_str() {
        if s.starts_with('.')
            || s.ends_with(".tmp")
            || s.ends_with(".lock")
            || s.ends_with(".bak")
        {
            return false;
        }
    }
    name == watched_name
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
