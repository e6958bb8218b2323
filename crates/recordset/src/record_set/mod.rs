//! RecordSet: an ordered, indexed, observable set of records with load and
//! sync orchestration against a [`Proxy`].
//!
//! # Threading model
//!
//! `RecordSet` is a cheap-clone handle around shared state. All list and
//! index state sits behind one `parking_lot::Mutex`, which is **never held
//! while events are emitted or while record methods that emit run**. That
//! keeps listeners free to call back into the set (and records free to
//! destroy themselves from inside a set listener).
//!
//! In-memory mutation (`add`, `remove`, `commit`, ...) is synchronous.
//! `load*` and `sync` issue their requests on the tokio runtime at call time
//! and return a [`Pending`] for the outcome.
//!
//! # Modules
//!
//! - [`mutation`]: add/remove/reorder and the record event relay.
//! - [`query`]: positional and indexed lookups.
//! - [`tracking`]: commit/rollback/is_modified.
//! - [`load`]: single, ranged, paged loads.
//! - [`sync`]: save/destroy coordination.

pub mod load;
pub mod mutation;
pub mod pending;
pub mod query;
pub mod sync;
pub mod tracking;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::{
    error::ConfigError,
    proxy::Proxy,
    reactive::{EventEmitter, ListenerId, SetEvent},
    record::{Record, RecordRef, RecordSchema},
    types::{AddOptions, ClientId, RecordId},
};

pub use load::LoadOptions;
pub use pending::Pending;
pub use sync::{SyncFailure, SyncOptions, SyncReport};

/// Comparator used to keep the list sorted after every `add`.
pub type SorterFn = dyn Fn(&Record, &Record) -> Ordering + Send + Sync;

/// Factory turning raw data into a record.
pub type FactoryFn = dyn Fn(Value) -> Result<RecordRef, ConfigError> + Send + Sync;

/// Anything `add` accepts: an existing record or raw data for the factory.
#[derive(Debug, Clone)]
pub enum RecordInput {
    Record(RecordRef),
    Data(Value),
}

impl From<RecordRef> for RecordInput {
    fn from(record: RecordRef) -> Self {
        Self::Record(record)
    }
}

impl From<&RecordRef> for RecordInput {
    fn from(record: &RecordRef) -> Self {
        Self::Record(Arc::clone(record))
    }
}

impl From<Value> for RecordInput {
    fn from(data: Value) -> Self {
        Self::Data(data)
    }
}

// ============================================================================
// Options
// ============================================================================

/// Configuration for [`RecordSet::new`].
#[derive(Default)]
pub struct RecordSetOptions {
    /// Record type used by the default factory.
    pub schema: Option<Arc<RecordSchema>>,
    /// Backend for loads. Falls back to the schema's proxy.
    pub proxy: Option<Arc<dyn Proxy>>,
    /// Enables paged loading. `load()` then loads page 1.
    pub page_size: Option<usize>,
    /// Paged loads replace the contents instead of accumulating
    /// (default: false).
    pub clear_on_page_load: bool,
    pub sorter: Option<Arc<SorterFn>>,
    /// Overrides the default factory (`Record::from_value` with `schema`).
    pub factory: Option<Arc<FactoryFn>>,
    /// Initial contents. Added through `add`, after which the modified flag
    /// is reset: hydration is not a modification.
    pub records: Vec<RecordInput>,
}

// ============================================================================
// State
// ============================================================================

pub(crate) struct SetState {
    pub(crate) list: Vec<RecordRef>,
    pub(crate) by_client_id: HashMap<ClientId, RecordRef>,
    pub(crate) by_id: HashMap<RecordId, RecordRef>,
    /// Relay subscription per contained record.
    pub(crate) listeners: HashMap<ClientId, ListenerId>,
    pub(crate) modified: bool,
    pub(crate) pending_removals: Vec<RecordRef>,
    pub(crate) total_count: Option<usize>,
    pub(crate) loads_in_flight: usize,
}

impl SetState {
    fn new() -> Self {
        Self {
            list: Vec::new(),
            by_client_id: HashMap::new(),
            by_id: HashMap::new(),
            listeners: HashMap::new(),
            modified: false,
            pending_removals: Vec::new(),
            total_count: None,
            loads_in_flight: 0,
        }
    }

    pub(crate) fn position(&self, client_id: ClientId) -> Option<usize> {
        self.list.iter().position(|r| r.client_id() == client_id)
    }

    /// Drop the `by_id` entry for `id` if it belongs to `client_id`.
    pub(crate) fn unindex_id(&mut self, id: &RecordId, client_id: ClientId) {
        if self
            .by_id
            .get(id)
            .is_some_and(|r| r.client_id() == client_id)
        {
            self.by_id.remove(id);
        }
    }

    pub(crate) fn strike_pending(&mut self, client_id: ClientId) -> bool {
        let before = self.pending_removals.len();
        self.pending_removals.retain(|r| r.client_id() != client_id);
        self.pending_removals.len() != before
    }
}

pub(crate) struct Inner {
    pub(crate) schema: Option<Arc<RecordSchema>>,
    pub(crate) proxy: Option<Arc<dyn Proxy>>,
    pub(crate) page_size: Option<usize>,
    pub(crate) clear_on_page_load: bool,
    pub(crate) sorter: Option<Arc<SorterFn>>,
    pub(crate) factory: Option<Arc<FactoryFn>>,
    pub(crate) state: Mutex<SetState>,
    /// Held for the whole apply step of a settled load, so a replacing load
    /// clears and refills the set without another load landing in between.
    pub(crate) apply: Mutex<()>,
    pub(crate) events: EventEmitter<SetEvent>,
}

// ============================================================================
// RecordSet
// ============================================================================

#[derive(Clone)]
pub struct RecordSet {
    pub(crate) inner: Arc<Inner>,
}

impl RecordSet {
    pub fn new(options: RecordSetOptions) -> Result<Self, ConfigError> {
        let RecordSetOptions {
            schema,
            proxy,
            page_size,
            clear_on_page_load,
            sorter,
            factory,
            records,
        } = options;

        let set = Self {
            inner: Arc::new(Inner {
                schema,
                proxy,
                page_size: page_size.filter(|&n| n > 0),
                clear_on_page_load,
                sorter,
                factory,
                state: Mutex::new(SetState::new()),
                apply: Mutex::new(()),
                events: EventEmitter::new(),
            }),
        };

        if !records.is_empty() {
            set.add(records, AddOptions::default())?;
            set.inner.state.lock().modified = false;
        }
        Ok(set)
    }

    /// An empty set creating records of `schema`.
    pub fn with_schema(schema: Arc<RecordSchema>) -> Self {
        Self {
            inner: Arc::new(Inner {
                schema: Some(schema),
                proxy: None,
                page_size: None,
                clear_on_page_load: false,
                sorter: None,
                factory: None,
                state: Mutex::new(SetState::new()),
                apply: Mutex::new(()),
                events: EventEmitter::new(),
            }),
        }
    }

    /// Subscribe to set events. Listeners run synchronously, after the set
    /// has released its internal lock.
    pub fn on(&self, callback: impl Fn(&SetEvent) + Send + Sync + 'static) -> ListenerId {
        self.inner.events.on(callback)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.events.off(id)
    }

    pub fn schema(&self) -> Option<&Arc<RecordSchema>> {
        self.inner.schema.as_ref()
    }

    /// The set's own proxy, else its schema's.
    pub fn proxy(&self) -> Option<Arc<dyn Proxy>> {
        self.inner
            .proxy
            .clone()
            .or_else(|| self.inner.schema.as_ref().and_then(|s| s.proxy()))
    }

    pub fn page_size(&self) -> Option<usize> {
        self.inner.page_size
    }

    /// Factory hook: build a record from raw data with the configured
    /// factory, else with the configured schema.
    pub fn create_record(&self, data: Value) -> Result<RecordRef, ConfigError> {
        if let Some(factory) = &self.inner.factory {
            return factory(data);
        }
        match &self.inner.schema {
            Some(schema) => Record::from_value(Arc::clone(schema), data),
            None => Err(ConfigError::MissingSchema(data.to_string())),
        }
    }

    pub(crate) fn emit_all(&self, events: Vec<SetEvent>) {
        for event in &events {
            self.inner.events.emit(event);
        }
    }
}

impl std::fmt::Debug for RecordSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.inner.state.lock();
        f.debug_struct("RecordSet")
            .field("schema", &self.inner.schema.as_ref().map(|s| s.name.as_str()))
            .field("count", &st.list.len())
            .field("modified", &st.modified)
            .field("pending_removals", &st.pending_removals.len())
            .field("loading", &(st.loads_in_flight > 0))
            .finish()
    }
}
