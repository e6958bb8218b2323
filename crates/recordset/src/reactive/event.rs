//! Events emitted by records and record sets.

use serde_json::Value;

use crate::{proxy::Batch, record::RecordRef, types::RecordId};

/// Notification emitted by a single [`Record`](crate::record::Record).
#[derive(Debug, Clone, PartialEq)]
pub enum RecordEvent {
    /// A field value changed through `set`.
    Changed {
        field: String,
        old: Option<Value>,
        new: Value,
    },
    /// The value of the id attribute changed.
    IdChanged {
        old: Option<RecordId>,
        new: Option<RecordId>,
    },
    Committed,
    RolledBack,
    /// The backend accepted a create or update.
    Saved,
    /// Terminal: the record was destroyed. No events follow.
    Destroyed,
}

impl RecordEvent {
    /// Short stable name, used in log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Changed { .. } => "changed",
            Self::IdChanged { .. } => "idchanged",
            Self::Committed => "committed",
            Self::RolledBack => "rolledback",
            Self::Saved => "saved",
            Self::Destroyed => "destroyed",
        }
    }
}

/// Notification emitted by a [`RecordSet`](crate::record_set::RecordSet).
#[derive(Debug, Clone)]
pub enum SetEvent {
    /// A record joined the set at `index`.
    Added { record: RecordRef, index: usize },
    /// A record left the set; `index` is its position before removal.
    Removed { record: RecordRef, index: usize },
    /// An already-present record moved from `old_index` to `new_index`.
    Reordered {
        record: RecordRef,
        new_index: usize,
        old_index: usize,
    },
    /// Fired once per `add` call that added at least one record.
    AddedBatch(Vec<RecordRef>),
    /// Fired once per `remove` call that removed at least one record.
    RemovedBatch(Vec<RecordRef>),
    /// A load settled, successfully or not. Inspect the batch to tell.
    Loaded { batch: Batch },
    /// Relay of an event emitted by a record currently in the set.
    Record { record: RecordRef, event: RecordEvent },
}

impl SetEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Added { .. } => "add",
            Self::Removed { .. } => "remove",
            Self::Reordered { .. } => "reorder",
            Self::AddedBatch(_) => "addset",
            Self::RemovedBatch(_) => "removeset",
            Self::Loaded { .. } => "load",
            Self::Record { .. } => "record",
        }
    }
}
