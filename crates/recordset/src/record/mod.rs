//! Records: identifiable, observable, persistable units of data.
//!
//! A [`Record`] is a flat JSON object with a committed snapshot for dirty
//! tracking. Every record carries a [`ClientId`] for its whole lifetime and
//! an optional backend [`RecordId`] read from its schema's id attribute.
//! Records are shared as [`RecordRef`] (`Arc<Record>`); all mutation goes
//! through `&self`.

pub mod schema;

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::{
    error::{ConfigError, RecordError},
    proxy::{Action, Operation, Proxy},
    reactive::{EventEmitter, RecordEvent},
    types::{ClientId, ModifiedOptions, RecordId},
};

pub use schema::{ConvertFn, FieldDef, RecordSchema, RecordSchemaBuilder};

pub type RecordRef = Arc<Record>;

struct RecordState {
    data: Map<String, Value>,
    committed: Map<String, Value>,
    destroyed: bool,
    proxy: Option<Arc<dyn Proxy>>,
}

pub struct Record {
    client_id: ClientId,
    schema: Arc<RecordSchema>,
    state: Mutex<RecordState>,
    events: EventEmitter<RecordEvent>,
}

impl Record {
    /// Build a record from `data`, applying field defaults and conversions.
    /// The initial values form the committed snapshot.
    pub fn new(schema: Arc<RecordSchema>, data: Map<String, Value>) -> RecordRef {
        let mut values = Map::new();
        for field in &schema.fields {
            if !data.contains_key(&field.name) {
                if let Some(default) = &field.default {
                    values.insert(field.name.clone(), default.clone());
                }
            }
        }
        for (key, value) in data {
            let converted = schema.convert(&key, value);
            values.insert(key, converted);
        }

        Arc::new(Self {
            client_id: ClientId::next(),
            schema,
            state: Mutex::new(RecordState {
                committed: values.clone(),
                data: values,
                destroyed: false,
                proxy: None,
            }),
            events: EventEmitter::new(),
        })
    }

    /// Like [`Record::new`] but accepts any JSON value; only objects are
    /// valid record data.
    pub fn from_value(schema: Arc<RecordSchema>, data: Value) -> Result<RecordRef, ConfigError> {
        match data {
            Value::Object(obj) => Ok(Self::new(schema, obj)),
            other => Err(ConfigError::InvalidRecordData(other.to_string())),
        }
    }

    // -----------------------------------------------------------------------
    // Identity
    // -----------------------------------------------------------------------

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    pub fn has_id_attribute(&self) -> bool {
        self.schema.has_id_attribute()
    }

    /// Backend id, if the schema has an id attribute and it holds a scalar.
    pub fn id(&self) -> Option<RecordId> {
        let attr = self.schema.id_attribute()?;
        let st = self.state.lock();
        st.data.get(attr).and_then(RecordId::from_value)
    }

    /// A record without a backend id has never been persisted.
    pub fn is_new(&self) -> bool {
        self.id().is_none()
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    pub fn events(&self) -> &EventEmitter<RecordEvent> {
        &self.events
    }

    // -----------------------------------------------------------------------
    // Values
    // -----------------------------------------------------------------------

    pub fn get(&self, field: &str) -> Option<Value> {
        self.state.lock().data.get(field).cloned()
    }

    pub fn data(&self) -> Map<String, Value> {
        self.state.lock().data.clone()
    }

    /// Set `field`, running its conversion hook. Emits `Changed`, and
    /// `IdChanged` when the id attribute's value changes. Setting an equal
    /// value is silent.
    pub fn set(&self, field: &str, value: Value) {
        let value = self.schema.convert(field, value);
        let old_id = self.id();
        let old = {
            let mut st = self.state.lock();
            if st.data.get(field) == Some(&value) {
                return;
            }
            st.data.insert(field.to_string(), value.clone())
        };

        self.events.emit(&RecordEvent::Changed {
            field: field.to_string(),
            old,
            new: value,
        });

        if self.schema.id_attribute() == Some(field) {
            let new_id = self.id();
            if new_id != old_id {
                self.events.emit(&RecordEvent::IdChanged {
                    old: old_id,
                    new: new_id,
                });
            }
        }
    }

    /// Fields whose value differs from the committed snapshot. Fields
    /// removed since the commit are reported as `null`.
    pub fn get_changes(&self, persisted_only: bool) -> Map<String, Value> {
        let st = self.state.lock();
        let mut changes = Map::new();
        for (key, value) in &st.data {
            if persisted_only && !self.schema.is_persisted(key) {
                continue;
            }
            if st.committed.get(key) != Some(value) {
                changes.insert(key.clone(), value.clone());
            }
        }
        for key in st.committed.keys() {
            if persisted_only && !self.schema.is_persisted(key) {
                continue;
            }
            if !st.data.contains_key(key) {
                changes.insert(key.clone(), Value::Null);
            }
        }
        changes
    }

    pub fn is_modified(&self, options: ModifiedOptions) -> bool {
        !self.get_changes(options.persisted_only).is_empty()
    }

    /// Values that are sent to the backend on save.
    pub fn persisted_data(&self) -> Map<String, Value> {
        let st = self.state.lock();
        st.data
            .iter()
            .filter(|(key, _)| self.schema.is_persisted(key))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn commit(&self) {
        {
            let mut st = self.state.lock();
            st.committed = st.data.clone();
        }
        self.events.emit(&RecordEvent::Committed);
    }

    /// Restore the committed snapshot.
    pub fn rollback(&self) {
        let old_id = self.id();
        {
            let mut st = self.state.lock();
            st.data = st.committed.clone();
        }
        let new_id = self.id();
        if new_id != old_id {
            self.events.emit(&RecordEvent::IdChanged {
                old: old_id,
                new: new_id,
            });
        }
        self.events.emit(&RecordEvent::RolledBack);
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Override the schema's proxy for this record.
    pub fn set_proxy(&self, proxy: Arc<dyn Proxy>) {
        self.state.lock().proxy = Some(proxy);
    }

    pub fn proxy(&self) -> Option<Arc<dyn Proxy>> {
        self.state
            .lock()
            .proxy
            .clone()
            .or_else(|| self.schema.proxy())
    }

    /// Create (when new) or update the record on the backend. Values echoed
    /// by the backend, including an assigned id, are applied before the
    /// record commits and emits `Saved`.
    pub async fn save(&self) -> Result<(), RecordError> {
        if self.is_destroyed() {
            return Err(RecordError::Destroyed(self.client_id.get()));
        }
        let proxy = self.proxy().ok_or(ConfigError::MissingProxy)?;
        let action = if self.is_new() {
            Action::Create
        } else {
            Action::Update
        };
        let sent = self.data();
        let operation = Operation::write(action, vec![Value::Object(self.persisted_data())]);

        let completed = proxy
            .execute(operation)
            .await
            .map_err(|source| RecordError::Proxy {
                client_id: self.client_id.get(),
                source,
            })?;

        let echoed = completed
            .result_set()
            .and_then(|rs| rs.records.first())
            .and_then(Value::as_object)
            .cloned();
        // The backend now holds what was sent plus its echo. Fields edited
        // while the request was in flight keep their local value and stay
        // modified against that snapshot.
        let mut snapshot = sent;
        for (key, value) in echoed.unwrap_or_default() {
            let value = self.schema.convert(&key, value);
            let untouched = self.get(&key).as_ref() == snapshot.get(&key);
            snapshot.insert(key.clone(), value.clone());
            if untouched {
                self.set(&key, value);
            }
        }

        self.state.lock().committed = snapshot;
        self.events.emit(&RecordEvent::Committed);
        self.events.emit(&RecordEvent::Saved);
        Ok(())
    }

    /// Delete the record on the backend (skipped for new records), then
    /// emit the terminal `Destroyed` event. Destroying twice is a no-op.
    pub async fn destroy(&self) -> Result<(), RecordError> {
        if self.is_destroyed() {
            return Ok(());
        }
        if !self.is_new() {
            let proxy = self.proxy().ok_or(ConfigError::MissingProxy)?;
            let operation =
                Operation::write(Action::Destroy, vec![Value::Object(self.persisted_data())]);
            proxy
                .execute(operation)
                .await
                .map_err(|source| RecordError::Proxy {
                    client_id: self.client_id.get(),
                    source,
                })?;
        }

        {
            let mut st = self.state.lock();
            if st.destroyed {
                return Ok(());
            }
            st.destroyed = true;
        }
        self.events.emit(&RecordEvent::Destroyed);
        Ok(())
    }
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("client_id", &self.client_id)
            .field("schema", &self.schema.name)
            .field("id", &self.id())
            .finish()
    }
}

impl PartialEq for Record {
    /// Records are the same iff their client ids match.
    fn eq(&self, other: &Self) -> bool {
        self.client_id == other.client_id
    }
}

impl Eq for Record {}
