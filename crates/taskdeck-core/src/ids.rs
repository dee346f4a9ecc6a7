//! Plain and dotted task identifiers.
//!
//! Top-level tasks use simple string ids (`"3"`). Subtasks are addressed by
//! the dotted composite `"<parent>.<subtask>"` (`"3.2"`). [`TaskRef`] parses
//! either form and is the hierarchy's only depth marker — there is no
//! `"1.2.3"`, subtasks do not nest.

use std::fmt;
use std::str::FromStr;

/// A parsed task identifier: either a top-level task or a nested subtask.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TaskRef {
    /// A top-level task id.
    Top(String),
    /// A subtask addressed as `parent.sub`.
    Sub(String, u64),
}

impl TaskRef {
    /// Parse a plain or dotted id. Returns `None` for ids that address
    /// nothing: empty strings, empty segments, non-numeric subtask parts,
    /// or more than one level of nesting.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        match raw.split_once('.') {
            None => Some(Self::Top(raw.to_string())),
            Some((parent, sub)) => {
                if parent.is_empty() || sub.contains('.') {
                    return None;
                }
                sub.parse::<u64>()
                    .ok()
                    .map(|n| Self::Sub(parent.to_string(), n))
            }
        }
    }

    /// The top-level task id this reference belongs to.
    pub fn parent(&self) -> &str {
        match self {
            Self::Top(id) | Self::Sub(id, _) => id,
        }
    }

    /// Whether this reference addresses a subtask.
    pub fn is_sub(&self) -> bool {
        matches!(self, Self::Sub(..))
    }

    /// Build the dotted id string for a subtask.
    pub fn dotted(parent: &str, sub: u64) -> String {
        format!("{parent}.{sub}")
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Top(id) => f.write_str(id),
            Self::Sub(parent, sub) => write!(f, "{parent}.{sub}"),
        }
    }
}

impl FromStr for TaskRef {
    type Err = crate::errors::GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| crate::errors::GraphError::UnknownId { id: s.to_string() })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
