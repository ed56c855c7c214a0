//! Scalar prop schemas: primitives, raw JSON passthrough, optionality,
//! custom function pairs, dates, and aliasing.

use std::rc::Rc;

use serde_json::Value;

use serigraph_core::{
    date_from_millis, date_to_millis, is_primitive, json_kind, DeserializeError, ModelValue,
    SchemaError, SerializeError,
};

use crate::context::{Callback, Context};
use crate::props::{Emit, PropSchema};

/// The identity strategy for JSON primitives. The serializer rejects
/// anything that is not a primitive value; the deserializer symmetrically
/// rejects non-primitive JSON and hands the value through unchanged.
pub fn primitive() -> PropSchema {
    PropSchema::new(
        |value| match value {
            ModelValue::Primitive(v) => Ok(Emit::Value(v.clone())),
            other => Err(SerializeError::ExpectedPrimitive { kind: other.kind() }),
        },
        |json, done, _context, _current| {
            if is_primitive(json) {
                done.ok(ModelValue::Primitive(json.clone()));
            } else {
                done.fail(DeserializeError::ExpectedPrimitive {
                    kind: json_kind(json),
                });
            }
        },
    )
}

/// Pass any JSON value through unchanged in both directions. The untyped
/// escape hatch for subtrees no schema describes.
pub fn raw() -> PropSchema {
    PropSchema::new(
        |value| Ok(Emit::Value(value.to_json_raw()?)),
        |json, done, _context, _current| {
            done.ok(ModelValue::from_json(json));
        },
    )
}

/// Suppress the JSON key entirely when the field value is null; delegate
/// everything else to `inner`. The JSON name and identifier flag of the
/// inner prop are preserved.
pub fn optional(inner: PropSchema) -> PropSchema {
    let ser = inner.serializer_fn();
    PropSchema::parts(
        Rc::new(move |value: &ModelValue| {
            if value.is_null() {
                return Ok(Emit::Skip);
            }
            ser(value)
        }),
        inner.deserializer_fn(),
        inner.json_name().map(str::to_string),
        inner.is_identifier(),
    )
}

/// Wrap a pure serializer/deserializer function pair.
pub fn custom<S, D>(serializer: S, deserializer: D) -> PropSchema
where
    S: Fn(&ModelValue) -> Result<Value, SerializeError> + 'static,
    D: Fn(&Value) -> Result<ModelValue, DeserializeError> + 'static,
{
    PropSchema::new(
        move |value| Ok(Emit::Value(serializer(value)?)),
        move |json, done, _context, _current| done.done(deserializer(json)),
    )
}

/// Wrap a serializer plus a continuation-style deserializer. The
/// deserializer receives the full context and may complete later (a remote
/// lookup, a reference await).
pub fn custom_async<S, D>(serializer: S, deserializer: D) -> PropSchema
where
    S: Fn(&ModelValue) -> Result<Value, SerializeError> + 'static,
    D: Fn(&Value, Callback, &Rc<Context>, Option<&ModelValue>) + 'static,
{
    PropSchema::new(move |value| Ok(Emit::Value(serializer(value)?)), deserializer)
}

/// Dates as integer epoch milliseconds. Null passes through unchanged in
/// both directions.
pub fn date() -> PropSchema {
    PropSchema::new(
        |value| match value {
            ModelValue::Primitive(Value::Null) => Ok(Emit::Value(Value::Null)),
            ModelValue::Date(dt) => Ok(Emit::Value(Value::Number(date_to_millis(dt).into()))),
            other => Err(SerializeError::ExpectedDate { kind: other.kind() }),
        },
        |json, done, _context, _current| match json {
            Value::Null => done.ok(ModelValue::null()),
            Value::Number(n) => match n.as_i64() {
                Some(millis) => match date_from_millis(millis) {
                    Some(dt) => done.ok(ModelValue::Date(dt)),
                    None => done.fail(DeserializeError::DateOutOfRange(millis)),
                },
                None => done.fail(DeserializeError::ExpectedDateMillis {
                    kind: json_kind(json),
                }),
            },
            other => done.fail(DeserializeError::ExpectedDateMillis {
                kind: json_kind(other),
            }),
        },
    )
}

/// Store the prop under a different JSON key, delegating behavior to
/// `inner`. The identifier flag propagates from the inner prop.
///
/// # Errors
///
/// Fails if `inner` already carries a JSON name — `alias` must be the
/// outermost wrapper.
pub fn alias(name: impl Into<String>, inner: PropSchema) -> Result<PropSchema, SchemaError> {
    let name = name.into();
    if let Some(existing) = inner.json_name() {
        return Err(SchemaError::AlreadyAliased {
            name,
            existing: existing.to_string(),
        });
    }
    Ok(PropSchema::parts(
        inner.serializer_fn(),
        inner.deserializer_fn(),
        Some(name),
        inner.is_identifier(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::create_simple_schema;
    use crate::schema::Props;
    use serde_json::json;
    use std::cell::RefCell;

    /// Run a prop deserializer against a throwaway root context and return
    /// the delivered result.
    fn run_deserializer(
        prop: &PropSchema,
        json: &Value,
    ) -> Option<Result<ModelValue, DeserializeError>> {
        let schema = create_simple_schema(Props::new()).unwrap();
        let ctx = Context::new(
            None,
            schema,
            json.clone(),
            Callback::from_fn(|_| {}),
            None,
        );
        let slot = Rc::new(RefCell::new(None));
        let slot2 = Rc::clone(&slot);
        prop.deserialize(
            json,
            Callback::from_fn(move |result| *slot2.borrow_mut() = Some(result)),
            &ctx,
            None,
        );
        Rc::try_unwrap(slot).ok()?.into_inner()
    }

    // ---- primitive ----

    #[test]
    fn test_primitive_passes_scalars() {
        let prop = primitive();
        assert_eq!(
            prop.serialize(&ModelValue::from("x")).unwrap(),
            Emit::Value(json!("x"))
        );
        assert_eq!(
            run_deserializer(&prop, &json!(3)).unwrap().unwrap(),
            ModelValue::from(3i64)
        );
    }

    #[test]
    fn test_primitive_rejects_composites_both_ways() {
        let prop = primitive();
        assert!(prop.serialize(&ModelValue::List(vec![])).is_err());
        assert!(matches!(
            run_deserializer(&prop, &json!([1])).unwrap(),
            Err(DeserializeError::ExpectedPrimitive { kind: "array" })
        ));
    }

    #[test]
    fn test_primitive_null_passes() {
        let prop = primitive();
        assert_eq!(
            prop.serialize(&ModelValue::null()).unwrap(),
            Emit::Value(json!(null))
        );
    }

    // ---- raw ----

    #[test]
    fn test_raw_passes_trees() {
        let prop = raw();
        let tree = json!({"a": [1, {"b": null}]});
        let value = run_deserializer(&prop, &tree).unwrap().unwrap();
        assert_eq!(prop.serialize(&value).unwrap(), Emit::Value(tree));
    }

    // ---- optional ----

    #[test]
    fn test_optional_skips_null() {
        let prop = optional(primitive());
        assert_eq!(prop.serialize(&ModelValue::null()).unwrap(), Emit::Skip);
        assert_eq!(
            prop.serialize(&ModelValue::from(1i64)).unwrap(),
            Emit::Value(json!(1))
        );
    }

    #[test]
    fn test_optional_preserves_alias() {
        let prop = optional(alias("renamed", primitive()).unwrap());
        assert_eq!(prop.json_name(), Some("renamed"));
    }

    // ---- custom ----

    #[test]
    fn test_custom_symmetric_pair() {
        let prop = custom(
            |value| match value.as_primitive().and_then(Value::as_i64) {
                Some(n) => Ok(json!(n * 2)),
                None => Err(SerializeError::ExpectedPrimitive {
                    kind: value.kind(),
                }),
            },
            |json| match json.as_i64() {
                Some(n) => Ok(ModelValue::from(n / 2)),
                None => Err(DeserializeError::ExpectedPrimitive {
                    kind: json_kind(json),
                }),
            },
        );
        assert_eq!(
            prop.serialize(&ModelValue::from(21i64)).unwrap(),
            Emit::Value(json!(42))
        );
        assert_eq!(
            run_deserializer(&prop, &json!(42)).unwrap().unwrap(),
            ModelValue::from(21i64)
        );
    }

    // ---- date ----

    #[test]
    fn test_date_epoch_millis_roundtrip() {
        let prop = date();
        let dt = date_from_millis(1_700_000_000_000).unwrap();
        assert_eq!(
            prop.serialize(&ModelValue::Date(dt)).unwrap(),
            Emit::Value(json!(1_700_000_000_000i64))
        );
        let back = run_deserializer(&prop, &json!(1_700_000_000_000i64))
            .unwrap()
            .unwrap();
        assert_eq!(back, ModelValue::Date(dt));
    }

    #[test]
    fn test_date_null_passes_through() {
        let prop = date();
        assert_eq!(
            prop.serialize(&ModelValue::null()).unwrap(),
            Emit::Value(json!(null))
        );
        assert_eq!(
            run_deserializer(&prop, &json!(null)).unwrap().unwrap(),
            ModelValue::null()
        );
    }

    #[test]
    fn test_date_rejects_non_integer() {
        let prop = date();
        assert!(prop.serialize(&ModelValue::from("now")).is_err());
        assert!(matches!(
            run_deserializer(&prop, &json!("2026-01-01")).unwrap(),
            Err(DeserializeError::ExpectedDateMillis { kind: "string" })
        ));
    }

    // ---- alias ----

    #[test]
    fn test_alias_sets_json_name() {
        let prop = alias("task", primitive()).unwrap();
        assert_eq!(prop.json_name(), Some("task"));
        assert!(!prop.is_identifier());
    }

    #[test]
    fn test_alias_of_alias_rejected() {
        let once = alias("a", primitive()).unwrap();
        let err = alias("b", once).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::AlreadyAliased { ref existing, .. } if existing == "a"
        ));
    }

    #[test]
    fn test_alias_propagates_identifier_flag() {
        let id = crate::props::relations::identifier();
        let aliased = alias("key", id).unwrap();
        assert!(aliased.is_identifier());
    }
}
