//! # PropSchema — Composable Value-Level (De)Serialization Strategies
//!
//! A [`PropSchema`] describes how a single value position maps to and from
//! its JSON counterpart. Prop schemas are plain immutable values built from
//! a pair of functions, so they compose arbitrarily: an object inside a
//! list inside a map inside an alias is just nested construction.
//!
//! The built-in constructors live in the submodules:
//!
//! - [`basic`] — `primitive`, `raw`, `optional`, `custom`, `custom_async`,
//!   `date`, `alias`
//! - [`containers`] — `list`, `map`, `map_as_array`
//! - [`relations`] — `object`, `identifier`, `reference`
//!
//! ## Immutability
//!
//! A prop schema never changes after construction. The function fields are
//! reference-counted, so cloning a prop schema (or embedding it in several
//! model schemas) is cheap and shares behavior.

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use serigraph_core::{ModelValue, SerializeError};

use crate::context::{Callback, Context};

pub mod basic;
pub mod containers;
pub mod relations;

/// What a prop serializer produced: a JSON value for the key, or an
/// instruction to leave the key out entirely.
#[derive(Debug, Clone, PartialEq)]
pub enum Emit {
    /// Store this JSON value under the prop's key.
    Value(Value),
    /// Omit the key from the output object.
    Skip,
}

/// Serializer half of a prop schema.
pub type SerializerFn = Rc<dyn Fn(&ModelValue) -> Result<Emit, SerializeError>>;

/// Deserializer half of a prop schema. `done` is a single-shot
/// continuation; the current value on the target (if any) is passed for
/// in-place container updates.
pub type DeserializerFn = Rc<dyn Fn(&Value, Callback, &Rc<Context>, Option<&ModelValue>)>;

/// A reference lookup: receives the identifier value, a single-shot
/// continuation, and the deserialization context.
pub type LookupFn = Rc<dyn Fn(&Value, Callback, &Rc<Context>)>;

/// A composable (de)serialization strategy for one property position.
#[derive(Clone)]
pub struct PropSchema {
    serializer: SerializerFn,
    deserializer: DeserializerFn,
    json_name: Option<String>,
    identifier: bool,
}

impl PropSchema {
    /// Build a prop schema from a serializer/deserializer pair.
    pub fn new<S, D>(serializer: S, deserializer: D) -> Self
    where
        S: Fn(&ModelValue) -> Result<Emit, SerializeError> + 'static,
        D: Fn(&Value, Callback, &Rc<Context>, Option<&ModelValue>) + 'static,
    {
        Self {
            serializer: Rc::new(serializer),
            deserializer: Rc::new(deserializer),
            json_name: None,
            identifier: false,
        }
    }

    pub(crate) fn parts(
        serializer: SerializerFn,
        deserializer: DeserializerFn,
        json_name: Option<String>,
        identifier: bool,
    ) -> Self {
        Self {
            serializer,
            deserializer,
            json_name,
            identifier,
        }
    }

    pub(crate) fn serializer_fn(&self) -> SerializerFn {
        Rc::clone(&self.serializer)
    }

    pub(crate) fn deserializer_fn(&self) -> DeserializerFn {
        Rc::clone(&self.deserializer)
    }

    /// The JSON key override, if this prop is aliased.
    pub fn json_name(&self) -> Option<&str> {
        self.json_name.as_deref()
    }

    /// Whether this prop carries the instance identity.
    pub fn is_identifier(&self) -> bool {
        self.identifier
    }

    /// Serialize one value.
    pub fn serialize(&self, value: &ModelValue) -> Result<Emit, SerializeError> {
        (self.serializer)(value)
    }

    /// Deserialize one JSON value, delivering the result through `done`.
    pub fn deserialize(
        &self,
        json: &Value,
        done: Callback,
        context: &Rc<Context>,
        current: Option<&ModelValue>,
    ) {
        (self.deserializer)(json, done, context, current)
    }
}

impl fmt::Debug for PropSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropSchema")
            .field("json_name", &self.json_name)
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}
