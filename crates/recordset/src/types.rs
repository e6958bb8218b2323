use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// ClientId
// ============================================================================

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-local record identity. Assigned once at construction and never
/// reused, independent of any backend id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(u64);

impl ClientId {
    /// Allocate the next unused client id.
    pub fn next() -> Self {
        Self(NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rec-{}", self.0)
    }
}

// ============================================================================
// RecordId
// ============================================================================

/// Backend identity of a record: an integer or a string key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Str(String),
}

impl RecordId {
    /// Interpret a JSON value as an id. `null` and non-scalar values are not ids.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Int),
            Value::String(s) => Some(Self::Str(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(n) => Value::from(*n),
            Self::Str(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for RecordId {
    fn from(n: i32) -> Self {
        Self::Int(n.into())
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

// ============================================================================
// Per-call options
// ============================================================================

/// Options for [`RecordSet::add`](crate::record_set::RecordSet::add).
#[derive(Debug, Clone, Copy, Default)]
pub struct AddOptions {
    /// 0-based insertion index. `None` appends; negative values clamp to 0
    /// and values past the end clamp to the length.
    pub at: Option<i64>,
}

impl AddOptions {
    pub fn at(index: i64) -> Self {
        Self { at: Some(index) }
    }
}

/// Options for `commit` on records and record sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitOptions {
    /// Only clear the set's own flag; leave contained records untouched.
    pub shallow: bool,
}

/// Options for `is_modified` on records and record sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModifiedOptions {
    /// Only consider fields that are sent to the backend.
    pub persisted_only: bool,
    /// Only consider the set's own structural flag.
    pub shallow: bool,
}
