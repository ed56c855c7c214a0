//! Graph prop schemas: nested objects, identifiers, and references.
//!
//! `identifier` publishes the enclosing instance to the root context's
//! resolved-reference table *before* signaling its own completion, so a
//! sibling reference processed later in the same pass resolves immediately.
//! `reference` awaits that publication (or runs a user lookup), which is
//! what makes resolution independent of document order.

use std::rc::Rc;

use serde_json::Value;

use serigraph_core::{is_primitive, json_kind, DeserializeError, ModelValue, RefId, SerializeError};

use crate::context::{Callback, Context};
use crate::de;
use crate::props::{Emit, PropSchema};
use crate::schema::SchemaRef;
use crate::ser;

// ---------------------------------------------------------------------------
// object
// ---------------------------------------------------------------------------

/// A nested object serialized with the referenced schema. The schema
/// reference resolves at the moment of use, so two schemas may reference
/// each other cyclically. Null passes through unchanged in both directions.
pub fn object(schema: impl Into<SchemaRef>) -> PropSchema {
    let schema_ref = schema.into();
    let ser_ref = schema_ref.clone();
    PropSchema::new(
        move |value| {
            if value.is_null() {
                return Ok(Emit::Value(Value::Null));
            }
            let schema = ser_ref.resolve()?;
            Ok(Emit::Value(ser::serialize_with(&schema, value)?))
        },
        move |json, done, context, _current| {
            if json.is_null() {
                done.ok(ModelValue::null());
                return;
            }
            let schema = match schema_ref.resolve() {
                Ok(schema) => schema,
                Err(err) => {
                    done.fail(DeserializeError::Schema(err));
                    return;
                }
            };
            de::deserialize_object_with_schema(Some(Rc::clone(context)), schema, json, done, None);
        },
    )
}

// ---------------------------------------------------------------------------
// identifier
// ---------------------------------------------------------------------------

/// The identity prop: a primitive whose deserialized value publishes the
/// enclosing instance for reference awaiters.
pub fn identifier() -> PropSchema {
    build_identifier(None)
}

/// An identity prop with an additional registration hook, invoked with the
/// identifier value, the enclosing instance, and the context — after the
/// default publication, before the prop's own completion.
pub fn identifier_with<F>(register: F) -> PropSchema
where
    F: Fn(&Value, &ModelValue, &Rc<Context>) + 'static,
{
    build_identifier(Some(Rc::new(register)))
}

type RegisterFn = Rc<dyn Fn(&Value, &ModelValue, &Rc<Context>)>;

fn build_identifier(register: Option<RegisterFn>) -> PropSchema {
    // Identifier props always serialize and deserialize as primitives.
    let prop = PropSchema::new(
        |value| match value {
            ModelValue::Primitive(v) => Ok(Emit::Value(v.clone())),
            other => Err(SerializeError::ExpectedPrimitive { kind: other.kind() }),
        },
        move |json, done, context, _current| {
            if !is_primitive(json) {
                done.fail(DeserializeError::ExpectedPrimitive {
                    kind: json_kind(json),
                });
                return;
            }
            let id = match RefId::from_value(json) {
                Ok(id) => id,
                Err(err) => {
                    done.fail(err);
                    return;
                }
            };
            // Publish before completing, so sibling references processed
            // later in the same pass resolve immediately.
            let target = context.target().unwrap_or(ModelValue::null());
            context
                .root()
                .resolve_ref(context.model_schema(), id, target.clone());
            if let Some(register) = &register {
                register(json, &target, context);
            }
            done.ok(ModelValue::Primitive(json.clone()));
        },
    );
    PropSchema::parts(prop.serializer_fn(), prop.deserializer_fn(), None, true)
}

// ---------------------------------------------------------------------------
// reference
// ---------------------------------------------------------------------------

/// A reference to another instance, serialized as the target's identifier
/// value. Deserialization awaits the identifier's publication inside the
/// current document.
///
/// The target schema must declare an `identifier()` prop somewhere in its
/// chain; that is checked at the moment of use (late binding).
pub fn reference(target: impl Into<SchemaRef>) -> PropSchema {
    build_reference(RefTarget::Schema(target.into()), None)
}

/// A reference resolved by a user lookup instead of intra-document
/// awaiting. The serializer still reads the target schema's identifier
/// attribute.
pub fn reference_with_lookup<F>(target: impl Into<SchemaRef>, lookup: F) -> PropSchema
where
    F: Fn(&Value, Callback, &Rc<Context>) + 'static,
{
    build_reference(RefTarget::Schema(target.into()), Some(Rc::new(lookup)))
}

/// A reference whose serialized form reads the named attribute of the
/// child instance directly. A lookup is required: with no schema to await
/// on, the engine cannot resolve the identifier itself.
pub fn reference_by_attribute<F>(attribute: impl Into<String>, lookup: F) -> PropSchema
where
    F: Fn(&Value, Callback, &Rc<Context>) + 'static,
{
    build_reference(RefTarget::Attribute(attribute.into()), Some(Rc::new(lookup)))
}

#[derive(Clone)]
enum RefTarget {
    Schema(SchemaRef),
    Attribute(String),
}

impl RefTarget {
    /// The in-memory attribute carrying the child's identity.
    fn identifier_attribute(&self) -> Result<String, serigraph_core::SchemaError> {
        match self {
            RefTarget::Attribute(name) => Ok(name.clone()),
            RefTarget::Schema(schema_ref) => {
                let schema = schema_ref.resolve()?;
                schema
                    .identifier_prop_name()
                    .ok_or_else(|| serigraph_core::SchemaError::NoIdentifier(schema.name().into()))
            }
        }
    }
}

type LookupRc = Rc<dyn Fn(&Value, Callback, &Rc<Context>)>;

fn build_reference(target: RefTarget, lookup: Option<LookupRc>) -> PropSchema {
    let ser_target = target.clone();
    PropSchema::new(
        move |value| {
            if value.is_null() {
                return Ok(Emit::Value(Value::Null));
            }
            let attribute = ser_target.identifier_attribute()?;
            let instance = match value.as_instance() {
                Some(instance) => instance,
                None => {
                    return Err(SerializeError::ExpectedInstance { kind: value.kind() });
                }
            };
            match instance.borrow().get(&attribute) {
                Some(ModelValue::Primitive(id)) => Ok(Emit::Value(id.clone())),
                Some(other) => Err(SerializeError::ExpectedPrimitive { kind: other.kind() }),
                None => Ok(Emit::Value(Value::Null)),
            }
        },
        move |json, done, context, _current| {
            if json.is_null() {
                done.ok(ModelValue::null());
                return;
            }
            if let Some(lookup) = &lookup {
                lookup(json, done, context);
                return;
            }
            // Default lookup: await the identifier inside the root context.
            let RefTarget::Schema(schema_ref) = &target else {
                // reference_by_attribute always carries a lookup.
                done.fail(DeserializeError::Schema(
                    serigraph_core::SchemaError::NoIdentifier("(attribute reference)".into()),
                ));
                return;
            };
            let awaiter = match schema_ref.resolve() {
                Ok(schema) => schema,
                Err(err) => {
                    done.fail(DeserializeError::Schema(err));
                    return;
                }
            };
            if awaiter.identifier_prop_name().is_none() {
                done.fail(DeserializeError::Schema(
                    serigraph_core::SchemaError::NoIdentifier(awaiter.name().into()),
                ));
                return;
            }
            let id = match RefId::from_value(json) {
                Ok(id) => id,
                Err(err) => {
                    done.fail(err);
                    return;
                }
            };
            context.root().await_ref(&awaiter, id, done);
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props::basic::primitive;
    use crate::registry::{create_model_schema, create_simple_schema};
    use crate::schema::{ModelSchema, Props};
    use serigraph_core::ClassTag;
    use std::cell::RefCell;

    fn user_schema(tag: &str) -> Rc<ModelSchema> {
        create_model_schema(
            ClassTag::new(tag).unwrap(),
            Props::new().with("uuid", identifier()).with("name", true),
        )
        .unwrap()
    }

    #[test]
    fn test_identifier_flag_set() {
        assert!(identifier().is_identifier());
        assert!(!primitive().is_identifier());
    }

    #[test]
    fn test_reference_serializes_identifier_attribute() {
        let schema = user_schema("relations.user1");
        let prop = reference(&schema);
        let instance = serigraph_core::Instance::new();
        let shared = instance.shared();
        shared.borrow_mut().set("uuid", 7i64.into());
        shared.borrow_mut().set("name", "x".into());
        assert_eq!(
            prop.serialize(&ModelValue::Instance(shared)).unwrap(),
            Emit::Value(serde_json::json!(7))
        );
    }

    #[test]
    fn test_reference_serializes_null_for_null() {
        let schema = user_schema("relations.user2");
        let prop = reference(&schema);
        assert_eq!(
            prop.serialize(&ModelValue::null()).unwrap(),
            Emit::Value(Value::Null)
        );
    }

    #[test]
    fn test_reference_without_identifier_fails_late() {
        let schema = create_simple_schema(Props::new().with("name", true)).unwrap();
        let prop = reference(&schema);
        let instance = serigraph_core::Instance::new().shared();
        let err = prop
            .serialize(&ModelValue::Instance(instance))
            .unwrap_err();
        assert!(matches!(
            err,
            SerializeError::Schema(serigraph_core::SchemaError::NoIdentifier(_))
        ));
    }

    #[test]
    fn test_reference_by_attribute_serializer_reads_field() {
        let looked_up = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&looked_up);
        let prop = reference_by_attribute("key", move |id, done, _ctx| {
            sink.borrow_mut().push(id.clone());
            done.ok(ModelValue::from("resolved"));
        });
        let shared = serigraph_core::Instance::new().shared();
        shared.borrow_mut().set("key", "k-1".into());
        assert_eq!(
            prop.serialize(&ModelValue::Instance(shared)).unwrap(),
            Emit::Value(serde_json::json!("k-1"))
        );
    }
}
