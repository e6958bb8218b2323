//! Positional and indexed lookups. All reads take a consistent snapshot under
//! the set's lock and return owned `RecordRef`s.

use serde_json::Value;

use crate::{
    record::{Record, RecordRef},
    types::{ClientId, RecordId},
};

use super::RecordSet;

impl RecordSet {
    pub fn count(&self) -> usize {
        self.inner.state.lock().list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().list.is_empty()
    }

    /// Snapshot of the records in order.
    pub fn records(&self) -> Vec<RecordRef> {
        self.inner.state.lock().list.clone()
    }

    pub fn get_at(&self, index: usize) -> Option<RecordRef> {
        self.inner.state.lock().list.get(index).cloned()
    }

    pub fn first(&self) -> Option<RecordRef> {
        self.inner.state.lock().list.first().cloned()
    }

    pub fn last(&self) -> Option<RecordRef> {
        self.inner.state.lock().list.last().cloned()
    }

    /// Records from `start` through `end`, inclusive. Bounds default to the
    /// whole list and clamp to it; an inverted range is empty.
    pub fn get_range(&self, start: Option<usize>, end: Option<usize>) -> Vec<RecordRef> {
        let st = self.inner.state.lock();
        let Some(last) = st.list.len().checked_sub(1) else {
            return Vec::new();
        };
        let start = start.unwrap_or(0).min(last);
        let end = end.unwrap_or(last).min(last);
        if start > end {
            return Vec::new();
        }
        st.list[start..=end].to_vec()
    }

    /// Whether records are held up through `end`.
    ///
    /// Only the upper bound is checked: pages are assumed to load in order,
    /// so `start` is not verified.
    pub fn has_range(&self, _start: usize, end: usize) -> bool {
        end < self.inner.state.lock().list.len()
    }

    pub fn get_by_client_id(&self, client_id: ClientId) -> Option<RecordRef> {
        self.inner.state.lock().by_client_id.get(&client_id).cloned()
    }

    pub fn get_by_id(&self, id: &RecordId) -> Option<RecordRef> {
        self.inner.state.lock().by_id.get(id).cloned()
    }

    /// Membership by client id only, never by value.
    pub fn has(&self, record: &Record) -> bool {
        self.inner
            .state
            .lock()
            .by_client_id
            .contains_key(&record.client_id())
    }

    pub fn index_of(&self, record: &Record) -> Option<usize> {
        let st = self.inner.state.lock();
        let client_id = record.client_id();
        if !st.by_client_id.contains_key(&client_id) {
            return None;
        }
        st.position(client_id)
    }

    pub fn index_of_id(&self, id: &RecordId) -> Option<usize> {
        let record = self.get_by_id(id)?;
        self.index_of(&record)
    }

    /// First record at or after `start_index` whose `field` equals `value`.
    pub fn find(&self, field: &str, value: &Value, start_index: usize) -> Option<RecordRef> {
        self.records()
            .into_iter()
            .skip(start_index)
            .find(|r| r.get(field).as_ref() == Some(value))
    }

    /// First record at or after `start_index` for which `predicate(record,
    /// index)` returns true.
    pub fn find_by<F>(&self, mut predicate: F, start_index: usize) -> Option<RecordRef>
    where
        F: FnMut(&Record, usize) -> bool,
    {
        self.records()
            .into_iter()
            .enumerate()
            .skip(start_index)
            .find(|(index, record)| predicate(record, *index))
            .map(|(_, record)| record)
    }

    /// Records removed since the last successful destroy of each.
    pub fn removed_records(&self) -> Vec<RecordRef> {
        self.inner.state.lock().pending_removals.clone()
    }

    /// Remote collection size from the most recent load that reported one.
    pub fn total_count(&self) -> Option<usize> {
        self.inner.state.lock().total_count
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.lock().loads_in_flight > 0
    }

    /// Iterate over a snapshot; the set may be mutated from inside `f`.
    pub fn each(&self, mut f: impl FnMut(&RecordRef, usize)) {
        for (index, record) in self.records().iter().enumerate() {
            f(record, index);
        }
    }
}
