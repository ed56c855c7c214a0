//! # Deserializer — Walking a JSON Tree Into an Object Graph
//!
//! Deserialization is continuation-based. Targets are created
//! synchronously by the schema factories and returned immediately; property
//! values may land later, and the completion fires only once every issued
//! continuation has fired and every reference has resolved.
//!
//! ## Callback Accounting
//!
//! Property continuations are issued by the *root* context, not the
//! immediate one. A nested object can therefore complete (its aggregate
//! callback fires) while its internal references still await publication —
//! which is exactly what intra-document reference resolution needs. A lock
//! callback holds the root open during the synchronous walk of each object
//! so the completion cannot fire early.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use serigraph_core::{
    is_primitive, json_kind, DeserializeError, ModelValue, SchemaError, SharedInstance,
};

use crate::context::{Callback, Context};
use crate::props::basic::primitive;
use crate::registry;
use crate::schema::{ModelSchema, Prop, SchemaRef, STAR};

/// Deserialize a JSON tree with the given schema.
///
/// The returned value is the synchronously created instance — or, for a
/// JSON array, the list of synchronously created instances in input order —
/// with properties possibly still unpopulated. `on_done` fires exactly once
/// when the whole graph (references included) has settled.
///
/// # Errors
///
/// Returns an error when the schema reference does not resolve. Everything
/// else is reported through `on_done`.
pub fn deserialize<F>(
    schema: impl Into<SchemaRef>,
    json: &Value,
    on_done: F,
) -> Result<ModelValue, SchemaError>
where
    F: FnOnce(Result<ModelValue, DeserializeError>) + 'static,
{
    deserialize_with(schema, json, on_done, None)
}

/// [`deserialize`] with custom args, exposed to every context of the call
/// through [`Context::args`].
pub fn deserialize_with<F>(
    schema: impl Into<SchemaRef>,
    json: &Value,
    on_done: F,
    args: Option<Rc<dyn Any>>,
) -> Result<ModelValue, SchemaError>
where
    F: FnOnce(Result<ModelValue, DeserializeError>) + 'static,
{
    let schema = schema.into().resolve()?;
    debug!(schema = schema.name(), "deserialize");
    let completion = Callback::from_fn(on_done);
    match json {
        Value::Array(elements) => {
            // One root context for the whole array: elements share the
            // reference tables, so cross-element references resolve
            // regardless of element order.
            let root = Context::new(None, Rc::clone(&schema), json.clone(), completion, args);
            let lock = root.create_callback(|_| {});
            let mut items = Vec::with_capacity(elements.len());
            for element in elements {
                let element_done = root.create_callback(|_| {});
                let item = deserialize_object_with_schema(
                    Some(Rc::clone(&root)),
                    Rc::clone(&schema),
                    element,
                    element_done,
                    None,
                );
                items.push(item);
            }
            let result = ModelValue::List(items);
            root.set_target(result.clone());
            lock.ok(ModelValue::null());
            Ok(result)
        }
        single => Ok(deserialize_object_with_schema(
            None, schema, single, completion, args,
        )),
    }
}

/// Deserialize a schema that completes synchronously, returning the result
/// directly.
///
/// # Errors
///
/// Besides ordinary deserialization errors, fails with
/// [`DeserializeError::Pending`] when asynchronous work (a reference
/// lookup that has not called back) is still outstanding.
pub fn deserialize_sync(
    schema: impl Into<SchemaRef>,
    json: &Value,
) -> Result<ModelValue, DeserializeError> {
    let slot = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&slot);
    deserialize(schema, json, move |result| {
        *sink.borrow_mut() = Some(result);
    })?;
    let settled = slot.borrow_mut().take();
    settled.unwrap_or(Err(DeserializeError::Pending))
}

/// Re-run the property walk against an existing instance, leaving
/// properties absent from `json` untouched. The schema is inferred from
/// the target's class tag.
///
/// # Errors
///
/// Returns an error when no schema can be inferred. Everything else is
/// reported through `on_done`.
pub fn update<F>(target: &SharedInstance, json: &Value, on_done: F) -> Result<(), SchemaError>
where
    F: FnOnce(Result<ModelValue, DeserializeError>) + 'static,
{
    let value = ModelValue::Instance(Rc::clone(target));
    let schema = registry::get_default_model_schema(&value).ok_or_else(|| {
        match target.borrow().class() {
            Some(tag) => SchemaError::UnknownClass(tag.as_str().to_string()),
            None => SchemaError::UntaggedInstance,
        }
    })?;
    update_with(&schema, target, json, on_done, None)
}

/// [`update`] with an explicit schema and custom args.
///
/// # Errors
///
/// Returns an error when the schema reference does not resolve.
pub fn update_with<F>(
    schema: impl Into<SchemaRef>,
    target: &SharedInstance,
    json: &Value,
    on_done: F,
    args: Option<Rc<dyn Any>>,
) -> Result<(), SchemaError>
where
    F: FnOnce(Result<ModelValue, DeserializeError>) + 'static,
{
    let schema = schema.into().resolve()?;
    debug!(schema = schema.name(), "update");
    let context = Context::new(
        None,
        Rc::clone(&schema),
        json.clone(),
        Callback::from_fn(on_done),
        args,
    );
    context.set_target(ModelValue::Instance(Rc::clone(target)));
    let Value::Object(object) = json else {
        context.fail(DeserializeError::ExpectedObject {
            kind: json_kind(json),
        });
        return Ok(());
    };
    let lock = context.create_callback(|_| {});
    deserialize_props_with_schema(&context, &schema, object, target);
    lock.ok(ModelValue::null());
    Ok(())
}

/// The per-instance procedure: create a context and a factory-produced
/// target, walk the props under a lock callback, and return the target
/// synchronously. Null (and any non-object) JSON short-circuits to null.
pub(crate) fn deserialize_object_with_schema(
    parent: Option<Rc<Context>>,
    schema: Rc<ModelSchema>,
    json: &Value,
    done: Callback,
    args: Option<Rc<dyn Any>>,
) -> ModelValue {
    let Value::Object(object) = json else {
        done.ok(ModelValue::null());
        return ModelValue::null();
    };
    let context = Context::new(parent, Rc::clone(&schema), json.clone(), done, args);
    let Some(target) = schema.create_target(&context) else {
        context.fail(DeserializeError::FactoryProducedNothing {
            schema: schema.name().to_string(),
        });
        return ModelValue::null();
    };
    context.set_target(ModelValue::Instance(Rc::clone(&target)));
    // Hold the context open until every prop invocation is registered.
    let lock = context.create_callback(|_| {});
    deserialize_props_with_schema(&context, &schema, object, &target);
    lock.ok(ModelValue::null());
    ModelValue::Instance(target)
}

/// Walk the props of a schema chain, parents first, issuing one
/// root-context continuation per present property.
fn deserialize_props_with_schema(
    context: &Rc<Context>,
    schema: &Rc<ModelSchema>,
    json: &serde_json::Map<String, Value>,
    target: &SharedInstance,
) {
    if let Some(parent) = schema.extends() {
        deserialize_props_with_schema(context, parent, json, target);
    }
    for (name, prop) in schema.props_snapshot() {
        if name == STAR {
            deserialize_star_props(context, schema, json, target);
            continue;
        }
        let prop_schema = match prop {
            Prop::Skip => continue,
            Prop::Primitive => primitive(),
            Prop::Schema(prop_schema) => prop_schema,
        };
        let json_key = prop_schema.json_name().unwrap_or(&name);
        let Some(child_json) = json.get(json_key) else {
            continue;
        };
        let assign_target = Rc::clone(target);
        let prop_name = name.clone();
        let assign = context.root().create_callback(move |value| {
            assign_target.borrow_mut().set(prop_name, value);
        });
        let current = target.borrow().get(&name).cloned();
        prop_schema.deserialize(child_json, assign, context, current.as_ref());
    }
}

/// Assign every primitive JSON key not declared at this schema level (and
/// not shadowed by a declared JSON name) directly onto the target. A
/// non-primitive value is an error.
fn deserialize_star_props(
    context: &Rc<Context>,
    schema: &Rc<ModelSchema>,
    json: &serde_json::Map<String, Value>,
    target: &SharedInstance,
) {
    for (key, value) in json {
        if schema.declares_prop(key) || schema.declares_json_name(key) {
            continue;
        }
        if !is_primitive(value) {
            context.root().fail(DeserializeError::StarNonPrimitive {
                prop: key.clone(),
            });
            return;
        }
        target
            .borrow_mut()
            .set(key.clone(), ModelValue::Primitive(value.clone()));
    }
}
