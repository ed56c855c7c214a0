//! # Default-Schema Registry
//!
//! Associates a class tag with its default model schema. The registry is a
//! side table: a thread-local map from tag to schema. The engine is
//! single-threaded (schemas hold `Rc`-backed functions), so thread-local
//! storage is the registry's natural scope — each test thread, for
//! instance, gets an isolated registry.
//!
//! ## Resolution
//!
//! `get_default_model_schema` accepts anything that can name a schema: an
//! instance whose class tag is registered, or a tag directly
//! (`default_schema_for`). Schema values themselves resolve through
//! [`SchemaRef::resolve`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use serigraph_core::{ClassTag, Instance, ModelValue, SchemaError};

use crate::schema::{Factory, ModelSchema, Prop, Props, SchemaRef};

thread_local! {
    static DEFAULT_SCHEMAS: RefCell<HashMap<String, Rc<ModelSchema>>> =
        RefCell::new(HashMap::new());
}

/// Associate a schema with a class tag, replacing any prior default.
pub fn set_default_model_schema(tag: &ClassTag, schema: Rc<ModelSchema>) {
    debug!(class = %tag, schema = schema.name(), "set default model schema");
    DEFAULT_SCHEMAS.with(|table| {
        table
            .borrow_mut()
            .insert(tag.as_str().to_string(), schema);
    });
}

/// The registered default schema for a class tag, if any.
pub fn default_schema_for(tag: &ClassTag) -> Option<Rc<ModelSchema>> {
    DEFAULT_SCHEMAS.with(|table| table.borrow().get(tag.as_str()).cloned())
}

/// Resolve the default schema of a value: an instance resolves through its
/// class tag; every other value class has no default.
pub fn get_default_model_schema(value: &ModelValue) -> Option<Rc<ModelSchema>> {
    let instance = value.as_instance()?;
    let tag = instance.borrow().class()?.clone();
    default_schema_for(&tag)
}

/// Build an anonymous schema over plain objects: the factory produces a
/// fresh untagged instance.
pub fn create_simple_schema(props: Props) -> Result<Rc<ModelSchema>, SchemaError> {
    let factory: Factory = Rc::new(|_ctx| Some(Instance::new().shared()));
    ModelSchema::build("(simple)".into(), None, factory, props, None)
}

/// Build a schema for a class tag and register it as the tag's default.
/// The factory produces a fresh instance carrying the tag.
///
/// # Errors
///
/// Fails on the reserved root-object tag.
pub fn create_model_schema(tag: ClassTag, props: Props) -> Result<Rc<ModelSchema>, SchemaError> {
    create_model_schema_with(tag, props, None, None)
}

/// Build and register a schema with an explicit parent and/or factory.
///
/// The parent reference is resolved immediately; it becomes `extends`
/// unless it is the default schema of this same tag (re-registration).
///
/// # Errors
///
/// Fails on the reserved root-object tag, an unresolvable parent, or
/// invalid props.
pub fn create_model_schema_with(
    tag: ClassTag,
    props: Props,
    parent: Option<SchemaRef>,
    factory: Option<Factory>,
) -> Result<Rc<ModelSchema>, SchemaError> {
    if tag.is_root_object() {
        return Err(SchemaError::ReservedTag(tag.as_str().to_string()));
    }
    let extends = match parent {
        Some(parent_ref) => {
            let parent_schema = parent_ref.resolve()?;
            if parent_schema.target_class() == Some(&tag) {
                None
            } else {
                Some(parent_schema)
            }
        }
        None => None,
    };
    let factory = factory.unwrap_or_else(|| {
        let class = tag.clone();
        Rc::new(move |_ctx| Some(Instance::with_class(class.clone()).shared()))
    });
    let schema = ModelSchema::build(
        tag.as_str().to_string(),
        Some(tag.clone()),
        factory,
        props,
        extends,
    )?;
    set_default_model_schema(&tag, Rc::clone(&schema));
    Ok(schema)
}

/// The decorator-hook analog: register a single prop on the default schema
/// of a class, creating an empty default schema first if the class has
/// none.
///
/// # Errors
///
/// Fails on the reserved root-object tag or when the prop violates schema
/// invariants (second identifier, malformed `*`).
pub fn serializable(
    tag: &ClassTag,
    prop_name: &str,
    prop: impl Into<Prop>,
) -> Result<(), SchemaError> {
    let schema = match default_schema_for(tag) {
        Some(schema) => schema,
        None => create_model_schema(tag.clone(), Props::new())?,
    };
    schema.add_prop(prop_name, prop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props::basic::primitive;

    fn tag(name: &str) -> ClassTag {
        ClassTag::new(name).unwrap()
    }

    #[test]
    fn test_create_model_schema_registers_default() {
        let t = tag("registry.todo");
        let schema = create_model_schema(t.clone(), Props::new().with("title", true)).unwrap();
        let found = default_schema_for(&t).unwrap();
        assert!(Rc::ptr_eq(&schema, &found));
        assert_eq!(found.target_class(), Some(&t));
    }

    #[test]
    fn test_root_object_tag_rejected() {
        let err = create_model_schema(tag(ClassTag::OBJECT), Props::new()).unwrap_err();
        assert!(matches!(err, SchemaError::ReservedTag(_)));
    }

    #[test]
    fn test_default_schema_resolves_from_instance() {
        let t = tag("registry.user");
        let schema = create_model_schema(t.clone(), Props::new()).unwrap();
        let instance = Instance::with_class(t).shared();
        let found = get_default_model_schema(&ModelValue::Instance(instance)).unwrap();
        assert!(Rc::ptr_eq(&schema, &found));
    }

    #[test]
    fn test_untagged_instance_has_no_default() {
        let instance = Instance::new().shared();
        assert!(get_default_model_schema(&ModelValue::Instance(instance)).is_none());
    }

    #[test]
    fn test_extending_parent_by_tag() {
        let parent_tag = tag("registry.animal");
        let parent = create_model_schema(parent_tag.clone(), Props::new().with("name", true))
            .unwrap();
        let child = create_model_schema_with(
            tag("registry.dog"),
            Props::new().with("breed", true),
            Some(SchemaRef::from(&parent_tag)),
            None,
        )
        .unwrap();
        assert!(child.is_assignable_to(&parent));
    }

    #[test]
    fn test_reregistration_does_not_self_extend() {
        let t = tag("registry.versioned");
        create_model_schema(t.clone(), Props::new()).unwrap();
        let replacement = create_model_schema_with(
            t.clone(),
            Props::new().with("v2", true),
            Some(SchemaRef::from(&t)),
            None,
        )
        .unwrap();
        assert!(replacement.extends().is_none());
    }

    #[test]
    fn test_serializable_creates_schema_on_demand() {
        let t = tag("registry.note");
        assert!(default_schema_for(&t).is_none());
        serializable(&t, "body", primitive()).unwrap();
        serializable(&t, "stars", true).unwrap();
        let schema = default_schema_for(&t).unwrap();
        assert!(schema.declares_prop("body"));
        assert!(schema.declares_prop("stars"));
    }

    #[test]
    fn test_unknown_class_ref_fails_resolution() {
        let missing = SchemaRef::from(&tag("registry.ghost"));
        assert!(matches!(
            missing.resolve(),
            Err(SchemaError::UnknownClass(_))
        ));
    }
}
