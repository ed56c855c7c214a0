//! # Value Model — The In-Memory Object Graph
//!
//! Defines [`ModelValue`], the single representation of values inside the
//! object graph that the engine serializes and deserializes, together with
//! the two identity-bearing containers: [`Instance`] (a domain object) and
//! [`KeyedMap`] (a keyed container with `keys`/`clear` capabilities).
//!
//! ## Identity vs. Equality
//!
//! Instances and keyed maps are shared through `Rc<RefCell<_>>`. Structural
//! equality (`PartialEq`) compares contents; pointer identity — the thing
//! reference resolution guarantees — is exposed separately through
//! [`ModelValue::same_instance`].
//!
//! ## Scheduling Model
//!
//! The engine is single-threaded cooperative; nothing here is `Send` or
//! `Sync`, and shared mutation happens only through the deserialization
//! context's continuations.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, TimeZone, Utc};
use indexmap::IndexMap;
use serde_json::Value;

use crate::error::SerializeError;
use crate::tag::ClassTag;

/// A domain instance shared across the graph.
pub type SharedInstance = Rc<RefCell<Instance>>;

/// A keyed container shared across the graph.
pub type SharedKeyedMap = Rc<RefCell<KeyedMap>>;

// ---------------------------------------------------------------------------
// ModelValue
// ---------------------------------------------------------------------------

/// A value in the in-memory object graph.
#[derive(Debug, Clone)]
pub enum ModelValue {
    /// A JSON primitive: null, boolean, number, or string.
    Primitive(Value),
    /// A date, encoded on the wire as integer epoch milliseconds.
    Date(DateTime<Utc>),
    /// An ordered list of values.
    List(Vec<ModelValue>),
    /// A plain string-keyed record (no identity).
    Record(IndexMap<String, ModelValue>),
    /// A keyed container with identity and `keys`/`clear` capabilities.
    Map(SharedKeyedMap),
    /// A domain instance with identity.
    Instance(SharedInstance),
}

impl ModelValue {
    /// The null primitive.
    pub fn null() -> Self {
        ModelValue::Primitive(Value::Null)
    }

    /// Whether this is the null primitive.
    pub fn is_null(&self) -> bool {
        matches!(self, ModelValue::Primitive(Value::Null))
    }

    /// Whether this is a JSON primitive (null included).
    pub fn is_primitive(&self) -> bool {
        matches!(self, ModelValue::Primitive(_))
    }

    /// A short name for the value class, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ModelValue::Primitive(v) => json_kind(v),
            ModelValue::Date(_) => "date",
            ModelValue::List(_) => "list",
            ModelValue::Record(_) => "record",
            ModelValue::Map(_) => "map",
            ModelValue::Instance(_) => "instance",
        }
    }

    /// The shared instance behind this value, if it is one.
    pub fn as_instance(&self) -> Option<&SharedInstance> {
        match self {
            ModelValue::Instance(inst) => Some(inst),
            _ => None,
        }
    }

    /// The primitive JSON value behind this value, if it is one.
    pub fn as_primitive(&self) -> Option<&Value> {
        match self {
            ModelValue::Primitive(v) => Some(v),
            _ => None,
        }
    }

    /// Whether two values are the same instance (pointer identity).
    pub fn same_instance(a: &ModelValue, b: &ModelValue) -> bool {
        match (a, b) {
            (ModelValue::Instance(x), ModelValue::Instance(y)) => Rc::ptr_eq(x, y),
            (ModelValue::Map(x), ModelValue::Map(y)) => Rc::ptr_eq(x, y),
            _ => false,
        }
    }

    /// Convert a plain JSON tree into the structural subset of the model:
    /// primitives, lists, and records. Never produces dates, maps, or
    /// instances.
    pub fn from_json(value: &Value) -> ModelValue {
        match value {
            Value::Array(items) => {
                ModelValue::List(items.iter().map(ModelValue::from_json).collect())
            }
            Value::Object(map) => ModelValue::Record(
                map.iter()
                    .map(|(k, v)| (k.clone(), ModelValue::from_json(v)))
                    .collect(),
            ),
            primitive => ModelValue::Primitive(primitive.clone()),
        }
    }

    /// Convert the JSON-compatible subset of the model back into a plain
    /// JSON tree.
    ///
    /// # Errors
    ///
    /// Returns an error for dates, keyed maps, and instances — values that
    /// carry semantics a raw passthrough cannot represent.
    pub fn to_json_raw(&self) -> Result<Value, SerializeError> {
        match self {
            ModelValue::Primitive(v) => Ok(v.clone()),
            ModelValue::List(items) => Ok(Value::Array(
                items
                    .iter()
                    .map(ModelValue::to_json_raw)
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            ModelValue::Record(map) => {
                let mut out = serde_json::Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), v.to_json_raw()?);
                }
                Ok(Value::Object(out))
            }
            other => Err(SerializeError::NotJsonRepresentable { kind: other.kind() }),
        }
    }
}

impl PartialEq for ModelValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ModelValue::Primitive(a), ModelValue::Primitive(b)) => a == b,
            (ModelValue::Date(a), ModelValue::Date(b)) => a == b,
            (ModelValue::List(a), ModelValue::List(b)) => a == b,
            (ModelValue::Record(a), ModelValue::Record(b)) => a == b,
            (ModelValue::Map(a), ModelValue::Map(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (ModelValue::Instance(a), ModelValue::Instance(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            _ => false,
        }
    }
}

impl From<bool> for ModelValue {
    fn from(b: bool) -> Self {
        ModelValue::Primitive(Value::Bool(b))
    }
}

impl From<i64> for ModelValue {
    fn from(n: i64) -> Self {
        ModelValue::Primitive(Value::Number(n.into()))
    }
}

impl From<&str> for ModelValue {
    fn from(s: &str) -> Self {
        ModelValue::Primitive(Value::String(s.to_string()))
    }
}

impl From<String> for ModelValue {
    fn from(s: String) -> Self {
        ModelValue::Primitive(Value::String(s))
    }
}

impl From<Value> for ModelValue {
    fn from(v: Value) -> Self {
        ModelValue::from_json(&v)
    }
}

impl From<DateTime<Utc>> for ModelValue {
    fn from(dt: DateTime<Utc>) -> Self {
        ModelValue::Date(dt)
    }
}

impl From<SharedInstance> for ModelValue {
    fn from(inst: SharedInstance) -> Self {
        ModelValue::Instance(inst)
    }
}

// ---------------------------------------------------------------------------
// Instance
// ---------------------------------------------------------------------------

/// A domain instance: an optional class tag plus insertion-ordered fields.
///
/// Instances are what schema factories produce and what property
/// continuations assign into. They are always handled as [`SharedInstance`]
/// so that references observe the same object, not a copy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Instance {
    class: Option<ClassTag>,
    fields: IndexMap<String, ModelValue>,
}

impl Instance {
    /// A fresh instance with no class tag (plain object).
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh instance carrying a class tag.
    pub fn with_class(class: ClassTag) -> Self {
        Self {
            class: Some(class),
            fields: IndexMap::new(),
        }
    }

    /// Wrap the instance for shared ownership.
    pub fn shared(self) -> SharedInstance {
        Rc::new(RefCell::new(self))
    }

    /// The class tag, if any.
    pub fn class(&self) -> Option<&ClassTag> {
        self.class.as_ref()
    }

    /// Read a field.
    pub fn get(&self, name: &str) -> Option<&ModelValue> {
        self.fields.get(name)
    }

    /// Assign a field, preserving first-insertion order.
    pub fn set(&mut self, name: impl Into<String>, value: ModelValue) {
        self.fields.insert(name.into(), value);
    }

    /// Whether the field is present.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Iterate fields in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &ModelValue)> {
        self.fields.iter()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the instance has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ---------------------------------------------------------------------------
// KeyedMap
// ---------------------------------------------------------------------------

/// A keyed container with identity.
///
/// This is the map-like counterpart of a plain record: it supports key
/// enumeration and clearing, and deserialization repopulates an existing
/// keyed map in place instead of replacing it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyedMap {
    entries: IndexMap<String, ModelValue>,
}

impl KeyedMap {
    /// A fresh, empty keyed map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap the map for shared ownership.
    pub fn shared(self) -> SharedKeyedMap {
        Rc::new(RefCell::new(self))
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Remove all entries, keeping the container itself alive.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Read an entry.
    pub fn get(&self, key: &str) -> Option<&ModelValue> {
        self.entries.get(key)
    }

    /// Insert an entry, preserving first-insertion order.
    pub fn insert(&mut self, key: impl Into<String>, value: ModelValue) {
        self.entries.insert(key.into(), value);
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ModelValue)> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// JSON helpers
// ---------------------------------------------------------------------------

/// Whether a JSON value is a primitive: null, boolean, number, or string.
pub fn is_primitive(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

/// A short name for the JSON value class, used in error messages.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Reconstruct a date from integer epoch milliseconds.
///
/// Returns `None` when the value falls outside chrono's representable
/// range.
pub fn date_from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Encode a date as integer epoch milliseconds.
pub fn date_to_millis(date: &DateTime<Utc>) -> i64 {
    date.timestamp_millis()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
