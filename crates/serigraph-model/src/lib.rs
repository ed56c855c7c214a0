//! # serigraph-model — Schema-Driven JSON Graph (De)Serialization
//!
//! Converts between an in-memory object graph and a plain
//! `serde_json::Value` tree, driven by model schemas. Three mechanisms do
//! the heavy lifting:
//!
//! 1. **A composable prop-schema algebra.** Every property position is
//!    handled by a [`PropSchema`] — a serializer/deserializer pair carried
//!    as a plain value — and the built-ins nest arbitrarily:
//!    object-in-list-in-map-in-alias is just nested construction.
//!
//! 2. **An asynchronous deserialization context.** Targets are created
//!    synchronously and returned immediately; property values may arrive
//!    through continuations later. The [`Context`] counts every issued
//!    continuation and fires the completion exactly once, when all of them
//!    (references included) have settled.
//!
//! 3. **Identifier/reference resolution.** An [`identifier`] prop
//!    publishes its instance under the decoded id; a [`reference`] prop
//!    awaits that publication, matching by schema assignability, in either
//!    document order. References that no publication can ever satisfy
//!    terminate the call with an error naming the missing identifiers.
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//! use serigraph_model::{create_simple_schema, deserialize_sync, props, serialize_with};
//!
//! let schema = create_simple_schema(props! {
//!     "title" => true,
//!     "done" => true,
//! })
//! .unwrap();
//!
//! let todo = deserialize_sync(&schema, &json!({"title": "A", "done": false})).unwrap();
//! let back = serialize_with(&schema, &todo).unwrap();
//! assert_eq!(back, json!({"title": "A", "done": false}));
//! ```
//!
//! ## Crate Policy
//!
//! - Single-threaded cooperative: the engine hands out continuations and
//!   assumes the host event loop eventually fires them; it never blocks,
//!   spawns, or times out.
//! - No `unsafe` code; no `panic!()` outside invariant violations that the
//!   specification declares fatal.

pub mod context;
pub mod de;
mod macros;
pub mod props;
pub mod registry;
pub mod schema;
pub mod ser;

pub use context::{Callback, Context};
pub use de::{deserialize, deserialize_sync, deserialize_with, update, update_with};
pub use props::basic::{alias, custom, custom_async, date, optional, primitive, raw};
pub use props::containers::{list, map, map_as_array};
pub use props::relations::{
    identifier, identifier_with, object, reference, reference_by_attribute, reference_with_lookup,
};
pub use props::{Emit, PropSchema};
pub use registry::{
    create_model_schema, create_model_schema_with, create_simple_schema, default_schema_for,
    get_default_model_schema, serializable, set_default_model_schema,
};
pub use schema::{Factory, ModelSchema, Prop, Props, SchemaRef, STAR};
pub use ser::{serialize, serialize_with};

// Re-export the foundational types so hosts depend on one crate.
pub use serigraph_core::{
    ClassTag, DeserializeError, Instance, KeyedMap, ModelValue, RefId, SchemaError,
    SerializeError, SerigraphError, SharedInstance, SharedKeyedMap,
};
