//! Ordered mutation: add, reorder, remove, and the per-record event relay.

use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    error::ConfigError,
    reactive::{ListenerId, RecordEvent, SetEvent},
    record::RecordRef,
    types::{AddOptions, ClientId},
};

use super::{RecordInput, RecordSet};

impl RecordSet {
    /// Insert records at `options.at` (default: append).
    ///
    /// Raw data goes through [`create_record`](RecordSet::create_record);
    /// every input is converted before the set is touched, so a factory
    /// error leaves the set unchanged. A record already in the set is moved
    /// when `at` is given (`Reordered`) and ignored otherwise.
    ///
    /// Returns the newly added records in their final order.
    pub fn add<I>(&self, records: I, options: AddOptions) -> Result<Vec<RecordRef>, ConfigError>
    where
        I: IntoIterator,
        I::Item: Into<RecordInput>,
    {
        let records = records
            .into_iter()
            .map(|input| match input.into() {
                RecordInput::Record(record) => Ok(record),
                RecordInput::Data(data) => self.create_record(data),
            })
            .collect::<Result<Vec<_>, _>>()?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut events = Vec::new();
        let added = {
            let mut st = self.inner.state.lock();
            let len = st.list.len();
            let mut index = match options.at {
                None => len,
                Some(at) => at.clamp(0, len as i64) as usize,
            };
            let mut added_ids: HashSet<ClientId> = HashSet::new();

            for record in records {
                let client_id = record.client_id();
                if !st.by_client_id.contains_key(&client_id) {
                    st.modified = true;
                    st.list.insert(index, Arc::clone(&record));
                    st.by_client_id.insert(client_id, Arc::clone(&record));
                    if let Some(id) = record.id() {
                        st.by_id.insert(id, Arc::clone(&record));
                    }
                    st.strike_pending(client_id);
                    let listener = self.subscribe(&record);
                    st.listeners.insert(client_id, listener);
                    added_ids.insert(client_id);
                    events.push(SetEvent::Added { record, index });
                    index += 1;
                } else if options.at.is_some() {
                    let Some(old_index) = st.position(client_id) else {
                        continue;
                    };
                    let moved = st.list.remove(old_index);
                    let new_index = index.min(st.list.len());
                    st.list.insert(new_index, moved);
                    st.modified = true;
                    events.push(SetEvent::Reordered {
                        record,
                        new_index,
                        old_index,
                    });
                    index = new_index + 1;
                }
            }

            if let Some(sorter) = &self.inner.sorter {
                st.list.sort_by(|a, b| sorter(a, b));
            }

            st.list
                .iter()
                .filter(|r| added_ids.contains(&r.client_id()))
                .cloned()
                .collect::<Vec<_>>()
        };

        if !added.is_empty() {
            events.push(SetEvent::AddedBatch(added.clone()));
        }
        self.emit_all(events);
        Ok(added)
    }

    /// Remove the given records. Records not in the set are skipped.
    /// Removed records are queued for backend deletion on the next `sync`.
    ///
    /// Returns the records actually removed, in encounter order.
    pub fn remove<'a, I>(&self, records: I) -> Vec<RecordRef>
    where
        I: IntoIterator<Item = &'a RecordRef>,
    {
        let mut events = Vec::new();
        let mut removed = Vec::new();
        let mut unsubscribe: Vec<(RecordRef, ListenerId)> = Vec::new();
        {
            let mut st = self.inner.state.lock();
            for record in records {
                let client_id = record.client_id();
                let Some(record) = st.by_client_id.remove(&client_id) else {
                    continue;
                };
                st.modified = true;
                if let Some(id) = record.id() {
                    st.unindex_id(&id, client_id);
                }
                if let Some(listener) = st.listeners.remove(&client_id) {
                    unsubscribe.push((Arc::clone(&record), listener));
                }
                let Some(index) = st.position(client_id) else {
                    continue;
                };
                st.list.remove(index);
                if !st.pending_removals.iter().any(|r| r.client_id() == client_id) {
                    st.pending_removals.push(Arc::clone(&record));
                }
                removed.push(Arc::clone(&record));
                events.push(SetEvent::Removed { record, index });
            }
        }

        for (record, listener) in unsubscribe {
            record.events().off(listener);
        }
        if !removed.is_empty() {
            events.push(SetEvent::RemovedBatch(removed.clone()));
        }
        self.emit_all(events);
        removed
    }

    /// Remove every record, iterating over a snapshot of the list.
    pub fn remove_all(&self) -> Vec<RecordRef> {
        let snapshot = self.inner.state.lock().list.clone();
        self.remove(snapshot.iter())
    }

    // -----------------------------------------------------------------------
    // Record event relay
    // -----------------------------------------------------------------------

    /// One listener per record handles identity changes, destruction, and
    /// the generic relay. Neither side keeps the other alive: the set is
    /// held through `on_weak`, the record through its own weak handle.
    fn subscribe(&self, record: &RecordRef) -> ListenerId {
        let weak_record = Arc::downgrade(record);
        record.events().on_weak(&self.inner, move |inner, event| {
            if let Some(record) = weak_record.upgrade() {
                RecordSet { inner }.on_record_event(&record, event);
            }
        })
    }

    fn on_record_event(&self, record: &RecordRef, event: &RecordEvent) {
        let client_id = record.client_id();
        if let RecordEvent::IdChanged { old, new } = event {
            let mut st = self.inner.state.lock();
            if st.by_client_id.contains_key(&client_id) {
                if let Some(old) = old {
                    st.unindex_id(old, client_id);
                }
                if let Some(new) = new {
                    st.by_id.insert(new.clone(), Arc::clone(record));
                }
            }
        }

        self.inner.events.emit(&SetEvent::Record {
            record: Arc::clone(record),
            event: event.clone(),
        });

        if matches!(event, RecordEvent::Destroyed) {
            self.remove([record]);
            self.inner.state.lock().strike_pending(client_id);
        }
    }
}
