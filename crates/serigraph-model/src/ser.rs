//! # Serializer — Walking a Model Schema Into a JSON Tree
//!
//! Serialization is synchronous: errors propagate to the caller
//! immediately. The walk starts at the outermost parent of the `extends`
//! chain, so child props overwrite parent props for any shared key, and
//! emits props in declaration order.

use std::rc::Rc;

use serde_json::Value;
use tracing::trace;

use serigraph_core::{ModelValue, SerializeError, SharedInstance};

use crate::props::basic::primitive;
use crate::props::Emit;
use crate::registry;
use crate::schema::{ModelSchema, Prop, STAR};

/// Serialize a value with its inferred schema: an instance resolves its
/// class's default schema; an array resolves from its first element and
/// serializes element-wise (an empty array needs no schema).
///
/// # Errors
///
/// Fails when no schema can be inferred or a prop value does not match its
/// strategy.
pub fn serialize(value: &ModelValue) -> Result<Value, SerializeError> {
    match value {
        ModelValue::List(items) => {
            let Some(first) = items.first() else {
                return Ok(Value::Array(Vec::new()));
            };
            let schema =
                registry::get_default_model_schema(first).ok_or(SerializeError::NoSchema)?;
            serialize_with(&schema, value)
        }
        other => {
            let schema =
                registry::get_default_model_schema(other).ok_or(SerializeError::NoSchema)?;
            serialize_with(&schema, other)
        }
    }
}

/// Serialize a value with an explicit schema. Arrays serialize
/// element-wise with the same schema.
///
/// # Errors
///
/// Fails when the value is not an instance (or array of instances) or a
/// prop value does not match its strategy.
pub fn serialize_with(schema: &Rc<ModelSchema>, value: &ModelValue) -> Result<Value, SerializeError> {
    match value {
        ModelValue::List(items) => {
            let serialized: Result<Vec<Value>, SerializeError> = items
                .iter()
                .map(|item| serialize_with(schema, item))
                .collect();
            Ok(Value::Array(serialized?))
        }
        ModelValue::Instance(instance) => {
            trace!(schema = schema.name(), "serialize instance");
            let mut out = serde_json::Map::new();
            serialize_into(schema, instance, &mut out)?;
            Ok(Value::Object(out))
        }
        other => Err(SerializeError::ExpectedInstance { kind: other.kind() }),
    }
}

/// Walk one schema level (parents first) into the output object.
fn serialize_into(
    schema: &Rc<ModelSchema>,
    instance: &SharedInstance,
    out: &mut serde_json::Map<String, Value>,
) -> Result<(), SerializeError> {
    if let Some(parent) = schema.extends() {
        serialize_into(parent, instance, out)?;
    }
    for (name, prop) in schema.props_snapshot() {
        if name == STAR {
            serialize_star_props(schema, instance, out)?;
            continue;
        }
        let prop_schema = match prop {
            Prop::Skip => continue,
            Prop::Primitive => primitive(),
            Prop::Schema(prop_schema) => prop_schema,
        };
        let Some(field) = instance.borrow().get(&name).cloned() else {
            // A field absent from the instance leaves its key out, the
            // same way the host JSON emitter drops undefined values.
            continue;
        };
        match prop_schema.serialize(&field)? {
            Emit::Skip => {}
            Emit::Value(json) => {
                let key = prop_schema.json_name().unwrap_or(&name);
                out.insert(key.to_string(), json);
            }
        }
    }
    Ok(())
}

/// Copy every own primitive field not otherwise declared at this schema
/// level. A non-primitive field under `*` is an error.
fn serialize_star_props(
    schema: &Rc<ModelSchema>,
    instance: &SharedInstance,
    out: &mut serde_json::Map<String, Value>,
) -> Result<(), SerializeError> {
    for (name, field) in instance.borrow().fields() {
        if schema.declares_prop(name) {
            continue;
        }
        match field {
            ModelValue::Primitive(json) => {
                out.insert(name.clone(), json.clone());
            }
            _ => {
                return Err(SerializeError::StarNonPrimitive { prop: name.clone() });
            }
        }
    }
    Ok(())
}
