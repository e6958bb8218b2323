//! EventEmitter<T>: typed synchronous pub/sub shared by records and sets.
//!
//! Emission works on a snapshot of the listener list:
//!   - A listener removed *during* emission is still called in that round.
//!   - A listener added *during* emission is first called on the next emit.
//!
//! The internal lock is never held while a listener runs, so listeners may
//! subscribe, unsubscribe, or trigger further emissions (a record set
//! removing a record from inside that record's `Destroyed` notification
//! relies on this).
//!
//! Record sets listen to their records through [`EventEmitter::on_weak`]:
//! the listener holds the set weakly and drops out on the first emit after
//! the set is gone.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Handle returned by [`EventEmitter::on`], accepted by [`EventEmitter::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Stored form of a listener. Returns false once it should be dropped.
type Slot<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

pub struct EventEmitter<T> {
    listeners: Mutex<Vec<(ListenerId, Slot<T>)>>,
    next_id: AtomicU64,
}

impl<T> EventEmitter<T> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `callback`; listeners are called in registration order.
    pub fn on(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> ListenerId
    where
        T: 'static,
    {
        self.push(Arc::new(move |event: &T| {
            callback(event);
            true
        }))
    }

    /// Register `callback` against a weakly held `owner`. The callback gets
    /// the upgraded owner; once the owner is dropped the listener is
    /// skipped and removed.
    pub fn on_weak<O>(
        &self,
        owner: &Arc<O>,
        callback: impl Fn(Arc<O>, &T) + Send + Sync + 'static,
    ) -> ListenerId
    where
        O: Send + Sync + 'static,
        T: 'static,
    {
        let owner: Weak<O> = Arc::downgrade(owner);
        self.push(Arc::new(move |event: &T| match owner.upgrade() {
            Some(owner) => {
                callback(owner, event);
                true
            }
            None => false,
        }))
    }

    fn push(&self, slot: Slot<T>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, slot));
        id
    }

    /// Remove a listener. Returns false for unknown or already-removed ids.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub fn emit(&self, event: &T) {
        let snapshot: Vec<(ListenerId, Slot<T>)> = self
            .listeners
            .lock()
            .iter()
            .map(|(id, slot)| (*id, Arc::clone(slot)))
            .collect();
        let orphaned: Vec<ListenerId> = snapshot
            .into_iter()
            .filter_map(|(id, slot)| (!slot(event)).then_some(id))
            .collect();
        if !orphaned.is_empty() {
            self.listeners
                .lock()
                .retain(|(id, _)| !orphaned.contains(id));
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }
}

impl<T> Default for EventEmitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for EventEmitter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.len())
            .finish()
    }
}
