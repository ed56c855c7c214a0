//! Round-trip properties of the serializer/deserializer pair on schemas
//! without references: structural equality after a full cycle, idempotent
//! re-serialization, aliasing, dates, containers, and the supplementary
//! prop schemas.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{json, Value};
use serigraph_model::{
    alias, create_simple_schema, custom, date, deserialize_sync, list, map, map_as_array, object,
    optional, primitive, props, raw, serialize_with, DeserializeError, Instance, KeyedMap,
    ModelValue, SerializeError,
};

fn field(value: &ModelValue, name: &str) -> Option<ModelValue> {
    value.as_instance()?.borrow().get(name).cloned()
}

#[test]
fn simple_schema_roundtrip_is_structural_identity() {
    let schema = create_simple_schema(props! {
        "title" => true,
        "done" => true,
    })
    .unwrap();
    let tree = json!({"title": "A", "done": false});
    let value = deserialize_sync(&schema, &tree).unwrap();
    assert_eq!(field(&value, "title"), Some("A".into()));
    assert_eq!(field(&value, "done"), Some(false.into()));
    assert_eq!(serialize_with(&schema, &value).unwrap(), tree);
}

#[test]
fn serialize_after_deserialize_is_idempotent() {
    let schema = create_simple_schema(props! {
        "a" => true,
        "b" => primitive(),
        "c" => true,
    })
    .unwrap();
    let tree = json!({"a": 1, "b": "two", "c": null});
    let once = serialize_with(&schema, &deserialize_sync(&schema, &tree).unwrap()).unwrap();
    assert_eq!(once, tree);
    let twice = serialize_with(&schema, &deserialize_sync(&schema, &once).unwrap()).unwrap();
    assert_eq!(twice, tree);
}

#[test]
fn alias_renames_key_but_preserves_prop_name() {
    let schema = create_simple_schema(props! {
        "title" => alias("task", primitive()).unwrap(),
    })
    .unwrap();

    let value = deserialize_sync(&schema, &json!({"task": "x"})).unwrap();
    assert_eq!(field(&value, "title"), Some("x".into()));
    assert_eq!(field(&value, "task"), None);
    assert_eq!(serialize_with(&schema, &value).unwrap(), json!({"task": "x"}));
}

#[test]
fn date_encodes_as_epoch_millis() {
    let schema = create_simple_schema(props! { "at" => date() }).unwrap();
    let value = deserialize_sync(&schema, &json!({"at": 1_700_000_000_000i64})).unwrap();
    match field(&value, "at") {
        Some(ModelValue::Date(dt)) => assert_eq!(dt.timestamp_millis(), 1_700_000_000_000),
        other => panic!("expected a date, got {other:?}"),
    }
    assert_eq!(
        serialize_with(&schema, &value).unwrap(),
        json!({"at": 1_700_000_000_000i64})
    );
}

#[test]
fn list_of_objects_lands_in_input_order() {
    let sub = create_simple_schema(props! { "title" => true }).unwrap();
    let todo = create_simple_schema(props! {
        "title" => true,
        "subs" => list(object(&sub)).unwrap(),
    })
    .unwrap();

    let value = deserialize_sync(
        &todo,
        &json!({"title": "T", "subs": [{"title": "a"}, {"title": "b"}]}),
    )
    .unwrap();
    let Some(ModelValue::List(subs)) = field(&value, "subs") else {
        panic!("expected subs list");
    };
    assert_eq!(field(&subs[0], "title"), Some("a".into()));
    assert_eq!(field(&subs[1], "title"), Some("b".into()));

    assert_eq!(
        serialize_with(&todo, &value).unwrap(),
        json!({"title": "T", "subs": [{"title": "a"}, {"title": "b"}]})
    );
}

#[test]
fn nested_null_object_passes_through() {
    let sub = create_simple_schema(props! { "title" => true }).unwrap();
    let todo = create_simple_schema(props! { "sub" => object(&sub) }).unwrap();
    let value = deserialize_sync(&todo, &json!({"sub": null})).unwrap();
    assert_eq!(field(&value, "sub"), Some(ModelValue::null()));
    assert_eq!(
        serialize_with(&todo, &value).unwrap(),
        json!({"sub": null})
    );
}

#[test]
fn map_roundtrip_preserves_key_order() {
    let schema = create_simple_schema(props! { "scores" => map(primitive()).unwrap() }).unwrap();
    let tree = json!({"scores": {"zed": 3, "abe": 1}});
    let value = deserialize_sync(&schema, &tree).unwrap();
    assert_eq!(serialize_with(&schema, &value).unwrap(), tree);
}

#[test]
fn map_repopulates_keyed_container_in_place_on_update() {
    let schema = create_simple_schema(props! { "scores" => map(primitive()).unwrap() }).unwrap();
    let target = Instance::new().shared();
    let keyed = KeyedMap::new().shared();
    keyed.borrow_mut().insert("old", 0i64.into());
    target
        .borrow_mut()
        .set("scores", ModelValue::Map(Rc::clone(&keyed)));

    serigraph_model::update_with(
        &schema,
        &target,
        &json!({"scores": {"new": 9}}),
        |result| {
            result.unwrap();
        },
        None,
    )
    .unwrap();

    // Same container object, fresh contents.
    match target.borrow().get("scores") {
        Some(ModelValue::Map(current)) => assert!(Rc::ptr_eq(current, &keyed)),
        other => panic!("expected keyed map, got {other:?}"),
    }
    assert!(keyed.borrow().get("old").is_none());
    assert_eq!(keyed.borrow().get("new"), Some(&9i64.into()));
}

#[test]
fn custom_symmetric_pair_roundtrips() {
    let double = custom(
        |value| match value.as_primitive().and_then(Value::as_i64) {
            Some(n) => Ok(json!(n * 2)),
            None => Err(SerializeError::ExpectedPrimitive { kind: value.kind() }),
        },
        |json| match json.as_i64() {
            Some(n) => Ok(ModelValue::from(n / 2)),
            None => Err(DeserializeError::ExpectedPrimitive { kind: "string" }),
        },
    );
    let schema = create_simple_schema(props! { "n" => double }).unwrap();
    let value = deserialize_sync(&schema, &json!({"n": 10})).unwrap();
    assert_eq!(field(&value, "n"), Some(5i64.into()));
    assert_eq!(serialize_with(&schema, &value).unwrap(), json!({"n": 10}));
}

#[test]
fn raw_passes_untyped_subtrees() {
    let schema = create_simple_schema(props! { "meta" => raw() }).unwrap();
    let tree = json!({"meta": {"tags": ["a", "b"], "depth": 2}});
    let value = deserialize_sync(&schema, &tree).unwrap();
    assert_eq!(serialize_with(&schema, &value).unwrap(), tree);
}

#[test]
fn optional_omits_null_fields_from_output() {
    let schema = create_simple_schema(props! {
        "title" => true,
        "note" => optional(primitive()),
    })
    .unwrap();
    let value = deserialize_sync(&schema, &json!({"title": "A", "note": null})).unwrap();
    assert_eq!(field(&value, "note"), Some(ModelValue::null()));
    assert_eq!(
        serialize_with(&schema, &value).unwrap(),
        json!({"title": "A"})
    );
}

#[test]
fn map_as_array_rekeys_elements_by_field() {
    let entry = create_simple_schema(props! {
        "id" => true,
        "label" => true,
    })
    .unwrap();
    let schema =
        create_simple_schema(props! { "entries" => map_as_array(object(&entry), "id").unwrap() })
            .unwrap();

    let value = deserialize_sync(
        &schema,
        &json!({"entries": [{"id": "a", "label": "first"}, {"id": "b", "label": "second"}]}),
    )
    .unwrap();
    let Some(ModelValue::Record(entries)) = field(&value, "entries") else {
        panic!("expected a record of entries");
    };
    let keys: Vec<&str> = entries.keys().map(String::as_str).collect();
    assert_eq!(keys, ["a", "b"]);
    assert_eq!(field(&entries["b"], "label"), Some("second".into()));

    assert_eq!(
        serialize_with(&schema, &value).unwrap(),
        json!({"entries": [{"id": "a", "label": "first"}, {"id": "b", "label": "second"}]})
    );
}

#[test]
fn star_props_roundtrip_unlisted_primitives() {
    let schema = create_simple_schema(props! {
        "title" => true,
        "*" => true,
    })
    .unwrap();
    let tree = json!({"title": "A", "extra": 5, "flag": true});
    let value = deserialize_sync(&schema, &tree).unwrap();
    assert_eq!(serialize_with(&schema, &value).unwrap(), tree);
}

#[test]
fn completion_fires_exactly_once_on_success() {
    let schema = create_simple_schema(props! { "n" => true }).unwrap();
    let count = Rc::new(RefCell::new(0usize));
    let seen = Rc::clone(&count);
    serigraph_model::deserialize(&schema, &json!({"n": 1}), move |result| {
        result.unwrap();
        *seen.borrow_mut() += 1;
    })
    .unwrap();
    assert_eq!(*count.borrow(), 1);
}

#[test]
fn completion_fires_exactly_once_with_first_error_only() {
    let schema = create_simple_schema(props! {
        "xs" => list(primitive()).unwrap(),
    })
    .unwrap();
    let outcomes = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&outcomes);
    // Two bad elements; only the first error may surface.
    serigraph_model::deserialize(&schema, &json!({"xs": [[1], [2]]}), move |result| {
        sink.borrow_mut().push(result.map(|_| ()));
    })
    .unwrap();
    let outcomes = outcomes.borrow();
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].is_err());
}

#[test]
fn empty_array_serializes_without_a_schema() {
    assert_eq!(
        serigraph_model::serialize(&ModelValue::List(vec![])).unwrap(),
        json!([])
    );
}
