//! # Error Types — Structured Error Hierarchy
//!
//! Defines the error types used throughout the serigraph workspace. All
//! errors use `thiserror` for derive-based `Display` and `Error`
//! implementations.
//!
//! ## Design
//!
//! The three error channels match the three failure surfaces of the engine:
//!
//! - [`SchemaError`] — malformed schemas and invalid constructor arguments,
//!   caught when a schema or prop schema is built.
//! - [`SerializeError`] — value/schema mismatches, raised synchronously by
//!   the serializer.
//! - [`DeserializeError`] — JSON shape mismatches and unresolvable
//!   references, delivered through the deserialization continuation. The
//!   first error latches the context; later callbacks are absorbed so a
//!   caller sees exactly one error.
//!
//! Programming errors (a continuation invoked twice, reference-table access
//! from a non-root context) are not represented here: the first is
//! unrepresentable by construction and the second is a fatal invariant.

use thiserror::Error;

/// Shape errors: malformed schemas or invalid arguments to schema and
/// prop-schema constructors. These are fatal at construction time.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// A class tag was empty.
    #[error("class tag must not be empty")]
    EmptyTag,

    /// A class tag contained characters outside the permitted set.
    #[error("class tag contains invalid characters: {0:?} (only ASCII alphanumeric, '-', '_' and '.' allowed)")]
    InvalidTag(String),

    /// The reserved root tag cannot carry its own model schema.
    #[error("the reserved root tag {0:?} cannot carry a model schema")]
    ReservedTag(String),

    /// `alias` must be the outermost wrapper; the inner prop already has a
    /// JSON name.
    #[error("prop is already aliased to {existing:?}; alias({name:?}, ..) must be the outermost wrapper")]
    AlreadyAliased {
        /// The alias that was being applied.
        name: String,
        /// The JSON name the inner prop already carries.
        existing: String,
    },

    /// Container prop schemas take unaliased elements; the alias belongs on
    /// the containing property.
    #[error("container elements cannot be aliased; put alias() outermost")]
    AliasedElement,

    /// More than one prop in a schema chain is flagged as the identifier.
    #[error("schema {schema:?} declares more than one identifier prop: {first:?} and {second:?}")]
    MultipleIdentifiers {
        /// Diagnostic name of the offending schema.
        schema: String,
        /// The identifier prop that was seen first.
        first: String,
        /// The conflicting identifier prop.
        second: String,
    },

    /// The `*` props entry only supports the primitive sentinel `true`.
    #[error("schema {schema:?}: the '*' prop key must be paired with the primitive sentinel `true`")]
    InvalidStarProp {
        /// Diagnostic name of the offending schema.
        schema: String,
    },

    /// A reference() target schema declares no identifier prop.
    #[error("model schema {0:?} does not declare an identifier() prop and cannot be used by reference()")]
    NoIdentifier(String),

    /// No default model schema is registered for the class tag.
    #[error("no default model schema registered for class {0:?}")]
    UnknownClass(String),

    /// A schema cannot be inferred for an instance without a class tag.
    #[error("cannot infer a model schema for an untagged instance; pass one explicitly")]
    UntaggedInstance,
}

/// Errors raised synchronously while serializing a value graph to JSON.
#[derive(Error, Debug)]
pub enum SerializeError {
    /// A primitive prop held a non-primitive value.
    #[error("expected a primitive value, got {kind}")]
    ExpectedPrimitive {
        /// Kind of the offending value.
        kind: &'static str,
    },

    /// A date prop held something other than a date.
    #[error("expected a date value, got {kind}")]
    ExpectedDate {
        /// Kind of the offending value.
        kind: &'static str,
    },

    /// A list prop held something other than a list.
    #[error("expected a list value, got {kind}")]
    ExpectedList {
        /// Kind of the offending value.
        kind: &'static str,
    },

    /// A map prop held something other than a record or keyed map.
    #[error("expected a record or keyed map, got {kind}")]
    ExpectedMap {
        /// Kind of the offending value.
        kind: &'static str,
    },

    /// Schema-driven serialization needs an instance at this position.
    #[error("expected an instance, got {kind}")]
    ExpectedInstance {
        /// Kind of the offending value.
        kind: &'static str,
    },

    /// The value carried in a JSON-passthrough position cannot be
    /// represented as plain JSON.
    #[error("value of kind {kind} has no plain JSON representation")]
    NotJsonRepresentable {
        /// Kind of the offending value.
        kind: &'static str,
    },

    /// No schema was passed and none could be inferred from the value.
    #[error("no default model schema could be inferred for the value; pass a schema explicitly")]
    NoSchema,

    /// A `*` prop encountered a non-primitive field value.
    #[error("field {prop:?} holds a non-primitive value and cannot be serialized by the '*' prop")]
    StarNonPrimitive {
        /// Name of the offending field.
        prop: String,
    },

    /// Late schema resolution failed (unknown class, missing identifier).
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Errors delivered through the deserialization continuation.
#[derive(Error, Debug)]
pub enum DeserializeError {
    /// A primitive prop received a non-primitive JSON value.
    #[error("expected a JSON primitive, got {kind}")]
    ExpectedPrimitive {
        /// Kind of the offending JSON value.
        kind: &'static str,
    },

    /// A date prop received something other than integer epoch millis.
    #[error("expected integer epoch milliseconds, got {kind}")]
    ExpectedDateMillis {
        /// Kind of the offending JSON value.
        kind: &'static str,
    },

    /// The epoch-millisecond value does not map to a representable date.
    #[error("epoch milliseconds out of range: {0}")]
    DateOutOfRange(i64),

    /// A list prop received a non-array JSON value.
    #[error("expected a JSON array, got {kind}")]
    ExpectedArray {
        /// Kind of the offending JSON value.
        kind: &'static str,
    },

    /// A map prop (or `update`) received a non-object JSON value.
    #[error("expected a JSON object, got {kind}")]
    ExpectedObject {
        /// Kind of the offending JSON value.
        kind: &'static str,
    },

    /// The schema factory produced no instance.
    #[error("factory produced no instance for schema {schema:?}")]
    FactoryProducedNothing {
        /// Diagnostic name of the schema whose factory failed.
        schema: String,
    },

    /// Identifier values must be non-null JSON primitives.
    #[error("identifier values must be non-null JSON primitives, got {kind}")]
    InvalidIdentifier {
        /// Kind of the offending JSON value.
        kind: &'static str,
    },

    /// An element of a map-as-array payload carried no usable key field.
    #[error("map element has no primitive key field {key_prop:?}")]
    MissingMapKey {
        /// The field expected to carry the key.
        key_prop: String,
    },

    /// A `*` prop encountered a non-primitive JSON value.
    #[error("key {prop:?} holds a non-primitive JSON value and cannot be deserialized by the '*' prop")]
    StarNonPrimitive {
        /// Name of the offending JSON key.
        prop: String,
    },

    /// The context settled while references were still awaiting an
    /// identifier that no object in the document published.
    #[error("unresolvable references in json: {}", .ids.join(", "))]
    UnresolvableReferences {
        /// Canonical JSON text of each identifier still awaited.
        ids: Vec<String>,
    },

    /// `deserialize_sync` was used with a schema that suspends.
    #[error("deserialization did not complete synchronously; asynchronous work is still pending")]
    Pending,

    /// Late schema resolution failed (unknown class, missing identifier).
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Top-level error type for the serigraph workspace.
#[derive(Error, Debug)]
pub enum SerigraphError {
    /// Schema shape error.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Serialization error.
    #[error("serialize error: {0}")]
    Serialize(#[from] SerializeError),

    /// Deserialization error.
    #[error("deserialize error: {0}")]
    Deserialize(#[from] DeserializeError),
}
