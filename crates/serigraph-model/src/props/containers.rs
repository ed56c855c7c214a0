//! Container prop schemas: lists, maps, and maps serialized as arrays.
//!
//! Element deserialization is "parallel" in the cooperative sense: every
//! element continuation is issued up front, results land in input order
//! regardless of completion order, and the first element error settles the
//! aggregate (later element callbacks are absorbed).

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;

use serigraph_core::{
    json_kind, DeserializeError, ModelValue, SchemaError, SerializeError, SharedKeyedMap,
};

use crate::context::Callback;
use crate::props::{Emit, PropSchema};

// ---------------------------------------------------------------------------
// Parallel aggregation
// ---------------------------------------------------------------------------

struct Aggregate {
    left: usize,
    results: Vec<Option<ModelValue>>,
    failed: bool,
    done: Option<Callback>,
}

/// Issue a continuation per item and deliver a `ModelValue::List` of the
/// results, in input order, once every item completed. The first error is
/// forwarded and every later item callback is absorbed. An empty input
/// completes immediately.
pub(crate) fn parallel<P>(items: &[Value], process: P, done: Callback)
where
    P: Fn(&Value, Callback, usize),
{
    if items.is_empty() {
        done.ok(ModelValue::List(Vec::new()));
        return;
    }
    let aggregate = Rc::new(RefCell::new(Aggregate {
        left: items.len(),
        results: vec![None; items.len()],
        failed: false,
        done: Some(done),
    }));
    for (index, item) in items.iter().enumerate() {
        let aggregate = Rc::clone(&aggregate);
        let item_done = Callback::from_fn(move |result| {
            let mut agg = aggregate.borrow_mut();
            match result {
                Err(err) => {
                    if agg.failed {
                        return;
                    }
                    agg.failed = true;
                    let done = agg.done.take();
                    drop(agg);
                    if let Some(done) = done {
                        done.fail(err);
                    }
                }
                Ok(value) => {
                    if agg.failed {
                        return;
                    }
                    agg.results[index] = Some(value);
                    agg.left -= 1;
                    if agg.left == 0 {
                        let done = agg.done.take();
                        let values = agg
                            .results
                            .drain(..)
                            .map(|slot| slot.unwrap_or(ModelValue::null()))
                            .collect();
                        drop(agg);
                        if let Some(done) = done {
                            done.ok(ModelValue::List(values));
                        }
                    }
                }
            }
        });
        process(item, item_done, index);
    }
}

// ---------------------------------------------------------------------------
// list
// ---------------------------------------------------------------------------

/// A list of values handled element-wise by `inner`.
///
/// # Errors
///
/// Fails at construction if `inner` is aliased — the alias belongs on the
/// containing property.
pub fn list(inner: PropSchema) -> Result<PropSchema, SchemaError> {
    if inner.json_name().is_some() {
        return Err(SchemaError::AliasedElement);
    }
    let serialize_item = inner.serializer_fn();
    let element = inner;
    Ok(PropSchema::new(
        move |value| match value {
            ModelValue::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    if let Emit::Value(json) = serialize_item(item)? {
                        out.push(json);
                    }
                }
                Ok(Emit::Value(Value::Array(out)))
            }
            other => Err(SerializeError::ExpectedList { kind: other.kind() }),
        },
        move |json, done, context, _current| {
            let Value::Array(items) = json else {
                done.fail(DeserializeError::ExpectedArray {
                    kind: json_kind(json),
                });
                return;
            };
            let element = element.clone();
            let context = Rc::clone(context);
            parallel(
                items,
                move |item, item_done, _index| element.deserialize(item, item_done, &context, None),
                done,
            );
        },
    ))
}

// ---------------------------------------------------------------------------
// map
// ---------------------------------------------------------------------------

/// A string-keyed collection of values handled by `inner`. Serializes both
/// plain records and keyed maps to a JSON object; deserialization
/// repopulates an existing keyed map in place, otherwise produces a fresh
/// record. Key order follows the input.
///
/// # Errors
///
/// Fails at construction if `inner` is aliased.
pub fn map(inner: PropSchema) -> Result<PropSchema, SchemaError> {
    if inner.json_name().is_some() {
        return Err(SchemaError::AliasedElement);
    }
    let serialize_value = inner.serializer_fn();
    let element = inner;
    Ok(PropSchema::new(
        move |value| {
            let entries = map_entries(value)?;
            let mut out = serde_json::Map::new();
            for (key, entry) in entries {
                if let Emit::Value(json) = serialize_value(&entry)? {
                    out.insert(key, json);
                }
            }
            Ok(Emit::Value(Value::Object(out)))
        },
        move |json, done, context, current| {
            let Value::Object(object) = json else {
                done.fail(DeserializeError::ExpectedObject {
                    kind: json_kind(json),
                });
                return;
            };
            let keys: Vec<String> = object.keys().cloned().collect();
            let values: Vec<Value> = object.values().cloned().collect();
            let existing = current_keyed_map(current);
            let element = element.clone();
            let context = Rc::clone(context);
            let reassemble = Callback::from_fn(move |result| match result {
                Err(err) => done.fail(err),
                Ok(values) => done.ok(rekey(keys, values, existing)),
            });
            parallel(
                &values,
                move |item, item_done, _index| element.deserialize(item, item_done, &context, None),
                reassemble,
            );
        },
    ))
}

// ---------------------------------------------------------------------------
// map_as_array
// ---------------------------------------------------------------------------

/// A keyed collection serialized as a JSON array of its element objects.
/// On the way back in, each element is re-keyed by its `key_prop` field.
///
/// # Errors
///
/// Fails at construction if `inner` is aliased.
pub fn map_as_array(
    inner: PropSchema,
    key_prop: impl Into<String>,
) -> Result<PropSchema, SchemaError> {
    if inner.json_name().is_some() {
        return Err(SchemaError::AliasedElement);
    }
    let key_prop = key_prop.into();
    let serialize_value = inner.serializer_fn();
    let element = inner;
    Ok(PropSchema::new(
        move |value| {
            let entries = map_entries(value)?;
            let mut out = Vec::with_capacity(entries.len());
            for (_key, entry) in entries {
                if let Emit::Value(json) = serialize_value(&entry)? {
                    out.push(json);
                }
            }
            Ok(Emit::Value(Value::Array(out)))
        },
        move |json, done, context, current| {
            let Value::Array(items) = json else {
                done.fail(DeserializeError::ExpectedArray {
                    kind: json_kind(json),
                });
                return;
            };
            let existing = current_keyed_map(current);
            let element = element.clone();
            let context = Rc::clone(context);
            let key_prop = key_prop.clone();
            let reassemble = Callback::from_fn(move |result| match result {
                Err(err) => done.fail(err),
                Ok(values) => match element_keys(&values, &key_prop) {
                    Ok(keys) => done.ok(rekey(keys, values, existing)),
                    Err(err) => done.fail(err),
                },
            });
            parallel(
                items,
                move |item, item_done, _index| element.deserialize(item, item_done, &context, None),
                reassemble,
            );
        },
    ))
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Snapshot the entries of a record or keyed map.
fn map_entries(value: &ModelValue) -> Result<Vec<(String, ModelValue)>, SerializeError> {
    match value {
        ModelValue::Record(map) => Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        ModelValue::Map(shared) => Ok(shared
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()),
        other => Err(SerializeError::ExpectedMap { kind: other.kind() }),
    }
}

/// The current target value, when it is a keyed container.
fn current_keyed_map(current: Option<&ModelValue>) -> Option<SharedKeyedMap> {
    match current {
        Some(ModelValue::Map(shared)) => Some(Rc::clone(shared)),
        _ => None,
    }
}

/// Zip keys with deserialized values. An existing keyed container is
/// cleared and repopulated in place; otherwise a fresh record is produced.
fn rekey(keys: Vec<String>, values: ModelValue, existing: Option<SharedKeyedMap>) -> ModelValue {
    let ModelValue::List(values) = values else {
        return values;
    };
    match existing {
        Some(shared) => {
            {
                let mut inner = shared.borrow_mut();
                inner.clear();
                for (key, value) in keys.into_iter().zip(values) {
                    inner.insert(key, value);
                }
            }
            ModelValue::Map(shared)
        }
        None => ModelValue::Record(keys.into_iter().zip(values).collect()),
    }
}

/// Extract the key field from each deserialized element.
fn element_keys(values: &ModelValue, key_prop: &str) -> Result<Vec<String>, DeserializeError> {
    let ModelValue::List(values) = values else {
        return Ok(Vec::new());
    };
    let missing = || DeserializeError::MissingMapKey {
        key_prop: key_prop.to_string(),
    };
    values
        .iter()
        .map(|value| {
            let instance = value.as_instance().ok_or_else(missing)?;
            let field = instance.borrow().get(key_prop).cloned().ok_or_else(missing)?;
            match field {
                ModelValue::Primitive(Value::String(s)) => Ok(s),
                ModelValue::Primitive(Value::Null) => Err(missing()),
                ModelValue::Primitive(other) => Ok(other.to_string()),
                _ => Err(missing()),
            }
        })
        .collect()
}
