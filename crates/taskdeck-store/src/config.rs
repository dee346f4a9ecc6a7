//! Storage configuration with environment variable overrides.
//!
//! The timing figures here are reference defaults, not fixed constants:
//! every one can be overridden via a `TASKDECK_*` environment variable.
//! Override parsing is strict — integers must be valid and within range —
//! and invalid values are logged and ignored, falling back to the default.

use std::time::Duration;

/// Timing knobs for the storage layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    /// Upper bound on exclusive-lock acquisition before `LockTimeout`.
    pub lock_timeout_ms: u64,
    /// Pause between lock-marker creation attempts.
    pub lock_retry_interval_ms: u64,
    /// Quiet period before a change notification is delivered.
    pub debounce_ms: u64,
    /// Minimum spacing between delivered change notifications.
    pub min_notify_spacing_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 30_000,
            lock_retry_interval_ms: 50,
            debounce_ms: 300,
            min_notify_spacing_ms: 100,
        }
    }
}

impl StoreConfig {
    /// Defaults with `TASKDECK_*` environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides in place.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = read_env_u64("TASKDECK_LOCK_TIMEOUT_MS", 100, 600_000) {
            self.lock_timeout_ms = v;
        }
        if let Some(v) = read_env_u64("TASKDECK_LOCK_RETRY_MS", 5, 5_000) {
            self.lock_retry_interval_ms = v;
        }
        if let Some(v) = read_env_u64("TASKDECK_DEBOUNCE_MS", 10, 60_000) {
            self.debounce_ms = v;
        }
        if let Some(v) = read_env_u64("TASKDECK_NOTIFY_SPACING_MS", 0, 60_000) {
            self.min_notify_spacing_ms = v;
        }
    }

    /// Lock acquisition bound as a [`Duration`].
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Lock retry pause as a [`Duration`].
    pub fn lock_retry_interval(&self) -> Duration {
        Duration::from_millis(self.lock_retry_interval_ms)
    }

    /// Debounce window as a [`Duration`].
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Notification spacing as a [`Duration`].
    pub fn min_notify_spacing(&self) -> Duration {
        Duration::from_millis(self.min_notify_spacing_ms)
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
