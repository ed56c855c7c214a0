//! # ModelSchema — Describing How a Type Maps To and From JSON
//!
//! A [`ModelSchema`] enumerates the properties of a domain type and the
//! (de)serialization strategy for each. Schemas form inheritance chains via
//! `extends`; serialization and deserialization walk the chain outer-first
//! so a child's assignment to a shared name lands last and wins.
//!
//! ## Late Binding
//!
//! Schema graphs may be cyclic (`object`/`reference` between two types that
//! point at each other). [`SchemaRef`] defers resolution to the moment of
//! use: a `Class` reference is looked up in the default-schema registry
//! when a prop actually serializes or deserializes, not when the prop is
//! constructed.
//!
//! ## Validation
//!
//! Construction rejects malformed shapes: the `*` entry must carry the
//! primitive sentinel, and at most one prop per `extends` chain may be
//! flagged as the identifier.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use serigraph_core::{ClassTag, SchemaError, SharedInstance};

use crate::context::Context;
use crate::props::PropSchema;
use crate::registry;

/// Produces a fresh target instance for one deserialization. A `None`
/// return is reported as a deserialization error.
pub type Factory = Rc<dyn Fn(&Rc<Context>) -> Option<SharedInstance>>;

// ---------------------------------------------------------------------------
// Prop and Props
// ---------------------------------------------------------------------------

/// One entry in a schema's props map.
#[derive(Debug, Clone)]
pub enum Prop {
    /// The `true` sentinel: (de)serialize as a primitive, by identity.
    Primitive,
    /// The `false` sentinel: leave this property alone.
    Skip,
    /// A full prop schema.
    Schema(PropSchema),
}

impl From<bool> for Prop {
    fn from(sentinel: bool) -> Self {
        if sentinel {
            Prop::Primitive
        } else {
            Prop::Skip
        }
    }
}

impl From<PropSchema> for Prop {
    fn from(schema: PropSchema) -> Self {
        Prop::Schema(schema)
    }
}

/// The special props key meaning "all remaining own primitive fields".
pub const STAR: &str = "*";

/// An insertion-ordered props map. Iteration order is the declaration
/// order, which is observable in the serialized output.
#[derive(Debug, Clone, Default)]
pub struct Props {
    entries: IndexMap<String, Prop>,
}

impl Props {
    /// An empty props map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion.
    pub fn with(mut self, name: impl Into<String>, prop: impl Into<Prop>) -> Self {
        self.insert(name, prop);
        self
    }

    /// Insert a prop, preserving first-insertion order.
    pub fn insert(&mut self, name: impl Into<String>, prop: impl Into<Prop>) {
        self.entries.insert(name.into(), prop.into());
    }

    /// Read a prop entry by name.
    pub fn get(&self, name: &str) -> Option<&Prop> {
        self.entries.get(name)
    }

    /// Whether a prop with this name is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterate entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Prop)> {
        self.entries.iter()
    }

    /// Number of declared props.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no props are declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ModelSchema
// ---------------------------------------------------------------------------

/// Describes how an instance type maps to and from a JSON object.
pub struct ModelSchema {
    name: String,
    target_class: Option<ClassTag>,
    factory: Factory,
    props: RefCell<Props>,
    extends: Option<Rc<ModelSchema>>,
}

impl ModelSchema {
    /// Assemble and validate a schema. Used by the registry constructors;
    /// hosts normally go through `create_simple_schema` /
    /// `create_model_schema`.
    pub(crate) fn build(
        name: String,
        target_class: Option<ClassTag>,
        factory: Factory,
        props: Props,
        extends: Option<Rc<ModelSchema>>,
    ) -> Result<Rc<Self>, SchemaError> {
        let schema = Rc::new(Self {
            name,
            target_class,
            factory,
            props: RefCell::new(Props::new()),
            extends,
        });
        // Route every entry through add_prop so construction and the
        // decorator hook share one validation path.
        for (prop_name, prop) in props.entries {
            schema.add_prop(prop_name, prop)?;
        }
        Ok(schema)
    }

    /// Diagnostic name of the schema.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The class tag this schema is the default for, if any.
    pub fn target_class(&self) -> Option<&ClassTag> {
        self.target_class.as_ref()
    }

    /// The parent schema, if this schema extends one.
    pub fn extends(&self) -> Option<&Rc<ModelSchema>> {
        self.extends.as_ref()
    }

    /// Run the factory to obtain a fresh target instance.
    pub fn create_target(&self, context: &Rc<Context>) -> Option<SharedInstance> {
        (self.factory)(context)
    }

    /// Register an additional prop after construction (the decorator-hook
    /// path). Identifier uniqueness and `*` pairing are re-validated.
    pub(crate) fn add_prop(
        self: &Rc<Self>,
        name: impl Into<String>,
        prop: impl Into<Prop>,
    ) -> Result<(), SchemaError> {
        let name = name.into();
        let prop = prop.into();
        if name == STAR && !matches!(prop, Prop::Primitive) {
            return Err(SchemaError::InvalidStarProp {
                schema: self.name.clone(),
            });
        }
        if let Prop::Schema(ps) = &prop {
            if ps.is_identifier() {
                if let Some(existing) = self.identifier_prop_name() {
                    if existing != name {
                        return Err(SchemaError::MultipleIdentifiers {
                            schema: self.name.clone(),
                            first: existing,
                            second: name,
                        });
                    }
                }
            }
        }
        self.props.borrow_mut().insert(name, prop);
        Ok(())
    }

    /// A snapshot of the props in declaration order. The walk operates on a
    /// snapshot so a prop (de)serializer may register further props on the
    /// same schema without invalidating the iteration.
    pub fn props_snapshot(&self) -> Vec<(String, Prop)> {
        self.props
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Whether this schema level declares the prop (any sentinel counts).
    pub fn declares_prop(&self, name: &str) -> bool {
        self.props.borrow().contains(name)
    }

    /// Whether any prop at this schema level is aliased to the JSON key.
    pub fn declares_json_name(&self, json_key: &str) -> bool {
        self.props.borrow().iter().any(|(_, prop)| match prop {
            Prop::Schema(ps) => ps.json_name() == Some(json_key),
            _ => false,
        })
    }

    /// The name of the identifier prop, searching the `extends` chain.
    pub fn identifier_prop_name(self: &Rc<Self>) -> Option<String> {
        let mut current = Some(Rc::clone(self));
        while let Some(schema) = current {
            for (name, prop) in schema.props.borrow().iter() {
                if let Prop::Schema(ps) = prop {
                    if ps.is_identifier() {
                        return Some(name.clone());
                    }
                }
            }
            current = schema.extends.clone();
        }
        None
    }

    /// Schema assignability: `self` is assignable to `other` iff `other`
    /// is reachable by walking `extends` from `self`. References do not
    /// narrow on subclassing — a resolver accepts any descendant of the
    /// requested schema.
    pub fn is_assignable_to(self: &Rc<Self>, other: &Rc<ModelSchema>) -> bool {
        let mut current = Some(Rc::clone(self));
        while let Some(schema) = current {
            if Rc::ptr_eq(&schema, other) {
                return true;
            }
            current = schema.extends.clone();
        }
        false
    }
}

impl std::fmt::Debug for ModelSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSchema")
            .field("name", &self.name)
            .field("target_class", &self.target_class)
            .field("props", &self.props.borrow().len())
            .field("extends", &self.extends.as_ref().map(|p| p.name.clone()))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// SchemaRef
// ---------------------------------------------------------------------------

/// A late-binding reference to a model schema.
///
/// `Class` references resolve through the default-schema registry at the
/// moment of use, which is what lets two schemas reference each other
/// cyclically: declare the prop against the tag before the other schema
/// exists.
#[derive(Debug, Clone)]
pub enum SchemaRef {
    /// A direct schema reference.
    Schema(Rc<ModelSchema>),
    /// A class tag, resolved through the registry on use.
    Class(ClassTag),
}

impl SchemaRef {
    /// Resolve to a concrete schema.
    ///
    /// # Errors
    ///
    /// Returns an error for a `Class` reference whose tag has no registered
    /// default schema.
    pub fn resolve(&self) -> Result<Rc<ModelSchema>, SchemaError> {
        match self {
            SchemaRef::Schema(schema) => Ok(Rc::clone(schema)),
            SchemaRef::Class(tag) => registry::default_schema_for(tag)
                .ok_or_else(|| SchemaError::UnknownClass(tag.as_str().to_string())),
        }
    }
}

impl From<Rc<ModelSchema>> for SchemaRef {
    fn from(schema: Rc<ModelSchema>) -> Self {
        SchemaRef::Schema(schema)
    }
}

impl From<&Rc<ModelSchema>> for SchemaRef {
    fn from(schema: &Rc<ModelSchema>) -> Self {
        SchemaRef::Schema(Rc::clone(schema))
    }
}

impl From<ClassTag> for SchemaRef {
    fn from(tag: ClassTag) -> Self {
        SchemaRef::Class(tag)
    }
}

impl From<&ClassTag> for SchemaRef {
    fn from(tag: &ClassTag) -> Self {
        SchemaRef::Class(tag.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
