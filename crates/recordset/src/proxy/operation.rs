//! Operations and batches: value objects describing backend requests.

use serde_json::{Map, Value};

use crate::error::ProxyError;

/// What an [`Operation`] asks the backend to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Create,
    Update,
    Destroy,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Destroy => "destroy",
        }
    }
}

/// Records returned by the backend for one operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub records: Vec<Value>,
    /// Size of the full remote collection, when the backend reports it.
    pub total_count: Option<usize>,
}

impl ResultSet {
    pub fn new(records: Vec<Value>) -> Self {
        Self {
            records,
            total_count: None,
        }
    }

    pub fn with_total_count(mut self, total: usize) -> Self {
        self.total_count = Some(total);
        self
    }

    pub fn records(&self) -> &[Value] {
        &self.records
    }

    pub fn total_count(&self) -> Option<usize> {
        self.total_count
    }
}

/// One request to a persistence backend.
///
/// A proxy receives the operation by value and hands it back completed
/// (with a result set) or reports a [`ProxyError`].
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub action: Action,
    /// Caller-supplied parameters, passed through to the proxy untouched.
    pub params: Map<String, Value>,
    pub start: Option<usize>,
    pub limit: Option<usize>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    /// Write payload (create/update/destroy).
    pub records: Vec<Value>,
    result_set: Option<ResultSet>,
    error: Option<ProxyError>,
}

impl Operation {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            params: Map::new(),
            start: None,
            limit: None,
            page: None,
            page_size: None,
            records: Vec::new(),
            result_set: None,
            error: None,
        }
    }

    pub fn read() -> Self {
        Self::new(Action::Read)
    }

    /// A write operation carrying `records` as its payload.
    pub fn write(action: Action, records: Vec<Value>) -> Self {
        Self {
            records,
            ..Self::new(action)
        }
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    pub fn with_range(mut self, start: usize, limit: usize) -> Self {
        self.start = Some(start);
        self.limit = Some(limit);
        self
    }

    /// Request page `page` (1-based). Also sets the equivalent start/limit.
    pub fn with_page(mut self, page: usize, page_size: usize) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self.start = Some(page.saturating_sub(1).saturating_mul(page_size));
        self.limit = Some(page_size);
        self
    }

    /// Mark the operation complete with the backend's result.
    pub fn complete(mut self, result_set: ResultSet) -> Self {
        self.result_set = Some(result_set);
        self.error = None;
        self
    }

    pub fn fail(mut self, error: ProxyError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn result_set(&self) -> Option<&ResultSet> {
        self.result_set.as_ref()
    }

    pub fn error(&self) -> Option<&ProxyError> {
        self.error.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.result_set.is_some() || self.error.is_some()
    }

    pub fn has_exception(&self) -> bool {
        self.error.is_some()
    }

    pub fn was_successful(&self) -> bool {
        self.result_set.is_some() && self.error.is_none()
    }
}

/// A group of operations issued together and judged jointly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    operations: Vec<Operation>,
}

impl Batch {
    pub fn new(operations: Vec<Operation>) -> Self {
        Self { operations }
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.operations.iter().all(Operation::is_complete)
    }

    /// True when every operation completed without an exception.
    pub fn was_successful(&self) -> bool {
        self.operations.iter().all(Operation::was_successful)
    }

    pub fn has_exception(&self) -> bool {
        self.operations.iter().any(Operation::has_exception)
    }

    pub fn exceptions(&self) -> Vec<&ProxyError> {
        self.operations.iter().filter_map(Operation::error).collect()
    }

    /// Total count reported by the *first* operation only.
    pub fn total_count(&self) -> Option<usize> {
        self.operations
            .first()
            .and_then(Operation::result_set)
            .and_then(ResultSet::total_count)
    }

    /// Returned records of all operations, flattened in operation order.
    pub fn records(&self) -> Vec<Value> {
        self.operations
            .iter()
            .filter_map(Operation::result_set)
            .flat_map(|rs| rs.records.iter().cloned())
            .collect()
    }
}
