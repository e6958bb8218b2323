//! Record schemas: field definitions with defaults, conversion hooks, and
//! persistence flags, built with a small fluent builder.

use std::sync::Arc;

use serde_json::Value;

use crate::proxy::Proxy;

/// Closure type for field conversion, applied to every incoming value.
pub type ConvertFn = dyn Fn(Value) -> Value + Send + Sync;

/// A single declared field.
#[derive(Clone)]
pub struct FieldDef {
    pub name: String,
    /// Applied at construction when the field is absent from the data.
    pub default: Option<Value>,
    /// Whether the field is sent to the backend and counted by
    /// `persisted_only` dirty checks.
    pub persist: bool,
    convert: Option<Arc<ConvertFn>>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            persist: true,
            convert: None,
        }
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Mark the field as client-only.
    pub fn transient(mut self) -> Self {
        self.persist = false;
        self
    }

    pub fn convert(mut self, f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.convert = Some(Arc::new(f));
        self
    }

    pub(crate) fn apply(&self, value: Value) -> Value {
        match &self.convert {
            Some(f) => f(value),
            None => value,
        }
    }
}

impl std::fmt::Debug for FieldDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDef")
            .field("name", &self.name)
            .field("default", &self.default)
            .field("persist", &self.persist)
            .field("convert", &self.convert.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// A record type: its declared fields, id attribute, and default proxy.
///
/// Keys present in record data but not declared here are kept and treated
/// as persisted fields without conversion.
pub struct RecordSchema {
    pub name: String,
    pub fields: Vec<FieldDef>,
    id_attribute: Option<String>,
    proxy: Option<Arc<dyn Proxy>>,
}

impl RecordSchema {
    pub fn builder(name: impl Into<String>) -> RecordSchemaBuilder {
        RecordSchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
            id_attribute: Some("id".to_string()),
            proxy: None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_persisted(&self, name: &str) -> bool {
        self.field(name).map_or(true, |f| f.persist)
    }

    pub fn id_attribute(&self) -> Option<&str> {
        self.id_attribute.as_deref()
    }

    pub fn has_id_attribute(&self) -> bool {
        self.id_attribute.is_some()
    }

    pub fn proxy(&self) -> Option<Arc<dyn Proxy>> {
        self.proxy.clone()
    }

    pub(crate) fn convert(&self, name: &str, value: Value) -> Value {
        match self.field(name) {
            Some(def) => def.apply(value),
            None => value,
        }
    }
}

impl std::fmt::Debug for RecordSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSchema")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("id_attribute", &self.id_attribute)
            .field("proxy", &self.proxy.as_ref().map(|_| "<proxy>"))
            .finish()
    }
}

pub struct RecordSchemaBuilder {
    name: String,
    fields: Vec<FieldDef>,
    id_attribute: Option<String>,
    proxy: Option<Arc<dyn Proxy>>,
}

impl RecordSchemaBuilder {
    /// Declare a field. Redeclaring a name replaces the earlier definition.
    pub fn field(mut self, def: FieldDef) -> Self {
        self.fields.retain(|f| f.name != def.name);
        self.fields.push(def);
        self
    }

    /// Rename the id attribute (default: `"id"`).
    pub fn id_attribute(mut self, name: impl Into<String>) -> Self {
        self.id_attribute = Some(name.into());
        self
    }

    /// Records of this type never carry a backend id.
    pub fn without_id_attribute(mut self) -> Self {
        self.id_attribute = None;
        self
    }

    pub fn proxy(mut self, proxy: Arc<dyn Proxy>) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn build(self) -> Arc<RecordSchema> {
        Arc::new(RecordSchema {
            name: self.name,
            fields: self.fields,
            id_attribute: self.id_attribute,
            proxy: self.proxy,
        })
    }
}
