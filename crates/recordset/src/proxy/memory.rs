//! MemoryProxy: an in-process backend over a vector of JSON objects.
//!
//! Reads honour `start`/`limit` and report the unpaged match count as the
//! total. Params are treated as equality filters on top-level fields.
//! Creates assign increasing integer ids when the payload has none.

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::error::{ProxyError, ProxyErrorKind};

use super::{Action, Operation, Proxy, ResultSet};

struct MemoryState {
    records: Vec<Map<String, Value>>,
    next_id: i64,
    failing: HashSet<Action>,
    calls: Vec<Action>,
}

pub struct MemoryProxy {
    id_attribute: String,
    state: Mutex<MemoryState>,
}

impl MemoryProxy {
    pub fn new() -> Self {
        Self::with_id_attribute("id")
    }

    pub fn with_id_attribute(id_attribute: impl Into<String>) -> Self {
        Self {
            id_attribute: id_attribute.into(),
            state: Mutex::new(MemoryState {
                records: Vec::new(),
                next_id: 1,
                failing: HashSet::new(),
                calls: Vec::new(),
            }),
        }
    }

    /// Seed the store. Non-object values are ignored. Integer ids bump the
    /// id counter so later creates never collide.
    pub fn with_records(self, records: impl IntoIterator<Item = Value>) -> Self {
        {
            let mut st = self.state.lock();
            for record in records {
                if let Value::Object(obj) = record {
                    if let Some(n) = obj.get(&self.id_attribute).and_then(Value::as_i64) {
                        st.next_id = st.next_id.max(n + 1);
                    }
                    st.records.push(obj);
                }
            }
        }
        self
    }

    /// Make every subsequent `action` fail until [`clear_failures`] is called.
    ///
    /// [`clear_failures`]: MemoryProxy::clear_failures
    pub fn fail(&self, action: Action) {
        self.state.lock().failing.insert(action);
    }

    pub fn clear_failures(&self) {
        self.state.lock().failing.clear();
    }

    /// Actions received so far, in arrival order.
    pub fn calls(&self) -> Vec<Action> {
        self.state.lock().calls.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> Vec<Value> {
        self.state
            .lock()
            .records
            .iter()
            .cloned()
            .map(Value::Object)
            .collect()
    }

    fn enter(&self, action: Action) -> Result<parking_lot::MutexGuard<'_, MemoryState>, ProxyError> {
        let mut st = self.state.lock();
        st.calls.push(action);
        if st.failing.contains(&action) {
            return Err(ProxyError::new(format!(
                "memory proxy configured to fail {}",
                action.as_str()
            )));
        }
        Ok(st)
    }

    fn position(&self, st: &MemoryState, id: &Value) -> Option<usize> {
        st.records
            .iter()
            .position(|r| r.get(&self.id_attribute) == Some(id))
    }

    fn payload_id(&self, record: &Value) -> Result<Value, ProxyError> {
        match record.get(&self.id_attribute) {
            Some(id) if !id.is_null() => Ok(id.clone()),
            _ => Err(ProxyError::with_kind(
                format!("payload has no \"{}\" attribute", self.id_attribute),
                ProxyErrorKind::Permanent,
            )),
        }
    }
}

impl Default for MemoryProxy {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_params(record: &Map<String, Value>, params: &Map<String, Value>) -> bool {
    params
        .iter()
        .all(|(key, expected)| record.get(key) == Some(expected))
}

#[async_trait]
impl Proxy for MemoryProxy {
    async fn read(&self, operation: Operation) -> Result<Operation, ProxyError> {
        let st = self.enter(Action::Read)?;
        let matching: Vec<&Map<String, Value>> = st
            .records
            .iter()
            .filter(|r| matches_params(r, &operation.params))
            .collect();
        let total = matching.len();
        let start = operation.start.unwrap_or(0);
        let limit = operation.limit.unwrap_or(usize::MAX);
        let page: Vec<Value> = matching
            .into_iter()
            .skip(start)
            .take(limit)
            .cloned()
            .map(Value::Object)
            .collect();
        drop(st);
        Ok(operation.complete(ResultSet::new(page).with_total_count(total)))
    }

    async fn create(&self, operation: Operation) -> Result<Operation, ProxyError> {
        let mut st = self.enter(Action::Create)?;
        let mut stored = Vec::with_capacity(operation.records.len());
        for record in &operation.records {
            let Value::Object(obj) = record else {
                return Err(ProxyError::with_kind(
                    "create payload must be a JSON object",
                    ProxyErrorKind::Permanent,
                ));
            };
            let mut obj = obj.clone();
            let has_id = obj
                .get(&self.id_attribute)
                .is_some_and(|id| !id.is_null());
            if !has_id {
                let id = st.next_id;
                st.next_id += 1;
                obj.insert(self.id_attribute.clone(), Value::from(id));
            }
            st.records.push(obj.clone());
            stored.push(Value::Object(obj));
        }
        drop(st);
        Ok(operation.complete(ResultSet::new(stored)))
    }

    async fn update(&self, operation: Operation) -> Result<Operation, ProxyError> {
        let mut st = self.enter(Action::Update)?;
        let mut stored = Vec::with_capacity(operation.records.len());
        for record in &operation.records {
            let id = self.payload_id(record)?;
            let Some(pos) = self.position(&st, &id) else {
                return Err(ProxyError::with_kind(
                    format!("no record with id {id}"),
                    ProxyErrorKind::NotFound,
                ));
            };
            if let Value::Object(obj) = record {
                for (key, value) in obj {
                    st.records[pos].insert(key.clone(), value.clone());
                }
            }
            stored.push(Value::Object(st.records[pos].clone()));
        }
        drop(st);
        Ok(operation.complete(ResultSet::new(stored)))
    }

    async fn destroy(&self, operation: Operation) -> Result<Operation, ProxyError> {
        let mut st = self.enter(Action::Destroy)?;
        for record in &operation.records {
            let id = self.payload_id(record)?;
            let Some(pos) = self.position(&st, &id) else {
                return Err(ProxyError::with_kind(
                    format!("no record with id {id}"),
                    ProxyErrorKind::NotFound,
                ));
            };
            st.records.remove(pos);
        }
        drop(st);
        Ok(operation.complete(ResultSet::default()))
    }
}
