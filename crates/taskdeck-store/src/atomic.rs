//! Crash-safe JSON file writes and cross-process mutual exclusion.
//!
//! Write protocol: serialize → stage to `<path>.tmp` → read the staging file
//! back and require an equivalent value → snapshot an existing destination
//! to `<path>.bak` → atomically rename the staging file onto the destination
//! → drop the snapshot. The rename is the only step that mutates the visible
//! file, and it is atomic at the OS level, so no reader ever observes a
//! half-written document. Any failure at or after the rename restores the
//! destination from the snapshot before re-raising the original cause.
//!
//! Locking is two-layered: a fair async mutex per path serializes callers
//! within this process in arrival order, and a `<path>.lock` marker file
//! (exclusive create) excludes other processes. Only the marker's presence
//! matters, not its contents.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::errors::{Result, StoreError};

/// Build a sibling path carrying a transient-artifact marker
/// (`tasks.json` → `tasks.json.tmp`).
fn with_marker(path: &Path, marker: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(marker);
    PathBuf::from(name)
}

/// Safe reader/writer for a single JSON document per path.
///
/// Cheap to share behind an [`Arc`]; all methods take `&self`.
pub struct AtomicFileWriter {
    lock_timeout: Duration,
    lock_retry_interval: Duration,
    /// One fair queue per path: callers within this process enter their
    /// critical sections strictly in arrival order instead of racing for
    /// the OS-level marker independently.
    queues: parking_lot::Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
    /// Forces the next commit rename to fail. Test hook.
    #[cfg(test)]
    fail_next_commit: std::sync::atomic::AtomicBool,
}

impl AtomicFileWriter {
    /// Create a writer with the given timing configuration.
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            lock_timeout: config.lock_timeout(),
            lock_retry_interval: config.lock_retry_interval(),
            queues: parking_lot::Mutex::new(HashMap::new()),
            #[cfg(test)]
            fail_next_commit: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Read and parse the document at `path`.
    ///
    /// A missing file is routine and yields `Ok(None)`; a file that exists
    /// but does not parse is a fault and yields [`StoreError::Corrupt`].
    pub async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        match tokio::fs::read(path).await {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| StoreError::Corrupt {
                    path: path.to_path_buf(),
                    source,
                }),
        }
    }

    /// Atomically replace the document at `path` with `value`.
    ///
    /// The destination is never observed in a partially-written state, even
    /// if the process dies mid-operation: until the final rename lands, the
    /// old contents remain; after it, the new contents are complete.
    pub async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let payload = serde_json::to_vec_pretty(value)?;
        let expected: serde_json::Value = serde_json::to_value(value)?;
        let tmp = with_marker(path, "tmp");
        let bak = with_marker(path, "bak");

        if let Err(e) = tokio::fs::write(&tmp, &payload).await {
            return Err(StoreError::io(&tmp, e));
        }

        // Confirm the staged bytes parse back to an equivalent value before
        // the destination is touched at all.
        let staged = match tokio::fs::read(&tmp).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(StoreError::io(&tmp, e));
            }
        };
        let verified = serde_json::from_slice::<serde_json::Value>(&staged)
            .map(|v| v == expected)
            .unwrap_or(false);
        if !verified {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StoreError::StageVerify {
                path: path.to_path_buf(),
            });
        }

        let had_previous = tokio::fs::metadata(path).await.is_ok();
        if had_previous {
            if let Err(e) = tokio::fs::copy(path, &bak).await {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(StoreError::io(&bak, e));
            }
        }

        if let Err(err) = self.commit(&tmp, path).await {
            // Best-effort recovery; a failed restore is reported but never
            // masks the original cause.
            if had_previous {
                match tokio::fs::copy(&bak, path).await {
                    Ok(_) => {
                        let _ = tokio::fs::remove_file(&bak).await;
                        debug!(?path, "restored destination from backup after failed commit");
                    }
                    Err(restore_err) => {
                        warn!(?path, error = %restore_err, "failed to restore backup after failed commit");
                    }
                }
            }
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err);
        }

        if had_previous {
            let _ = tokio::fs::remove_file(&bak).await;
        }
        debug!(?path, bytes = payload.len(), "document written");
        Ok(())
    }

    /// The rename that makes the staged document visible.
    async fn commit(&self, tmp: &Path, path: &Path) -> Result<()> {
        #[cfg(test)]
        {
            if self
                .fail_next_commit
                .swap(false, std::sync::atomic::Ordering::SeqCst)
            {
                return Err(StoreError::io(
                    path,
                    std::io::Error::other("injected rename failure"),
                ));
            }
        }
        tokio::fs::rename(tmp, path)
            .await
            .map_err(|e| StoreError::io(path, e))
    }

    /// Acquire the exclusive lock for `path`.
    ///
    /// Waits first in the same-process queue (arrival order), then claims
    /// the cross-process `<path>.lock` marker, retrying every
    /// `lock_retry_interval` until `lock_timeout` elapses.
    pub async fn acquire(&self, path: &Path) -> Result<PathLock> {
        let queue = {
            let mut queues = self.queues.lock();
            Arc::clone(
                queues
                    .entry(path.to_path_buf())
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
            )
        };
        let permit = queue.lock_owned().await;

        let lock_path = with_marker(path, "lock");
        let started = tokio::time::Instant::now();
        loop {
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
                .await
            {
                Ok(file) => {
                    drop(file);
                    debug!(?path, "lock acquired");
                    return Ok(PathLock {
                        lock_path,
                        _permit: permit,
                        released: false,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    let waited = started.elapsed();
                    if waited >= self.lock_timeout {
                        return Err(StoreError::LockTimeout {
                            path: path.to_path_buf(),
                            waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                        });
                    }
                    tokio::time::sleep(self.lock_retry_interval).await;
                }
                Err(e) => return Err(StoreError::io(&lock_path, e)),
            }
        }
    }
}

/// Held exclusive lock for one document path.
///
/// Releasing removes the marker file, tolerating "already removed"; the
/// same-process queue slot is freed when the guard drops. Dropping without
/// an explicit [`PathLock::release`] also removes the marker.
#[derive(Debug)]
pub struct PathLock {
    lock_path: PathBuf,
    _permit: tokio::sync::OwnedMutexGuard<()>,
    released: bool,
}

impl PathLock {
    /// Release the lock, removing the marker file.
    pub async fn release(mut self) {
        let _ = tokio::fs::remove_file(&self.lock_path).await;
        self.released = true;
    }
}

impl Drop for PathLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
