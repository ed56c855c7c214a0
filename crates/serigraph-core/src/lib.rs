//! # serigraph-core — Foundational Types for the serigraph Engine
//!
//! This crate is the leaf of the workspace DAG. It defines the in-memory
//! value model and the error hierarchy that every other crate depends on;
//! it depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **One value union.** [`ModelValue`] is the only representation of
//!    in-memory graph values: JSON primitives, dates, lists, plain records,
//!    keyed containers, and identity-bearing instances.
//!
//! 2. **Identity where it matters.** [`Instance`] and [`KeyedMap`] are held
//!    behind `Rc<RefCell<_>>`; pointer identity is what makes resolved
//!    references observable ("the same instance", not "an equal copy").
//!
//! 3. **Newtype identifiers.** [`ClassTag`] and [`RefId`] are validated
//!    newtypes with private inners — no bare strings for identity.
//!
//! 4. **Single-threaded by construction.** The engine is cooperative and
//!    continuation-based; nothing here is `Send` or `Sync`, and nothing
//!    needs to be.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `serigraph-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod tag;
pub mod value;

pub use error::{DeserializeError, SchemaError, SerializeError, SerigraphError};
pub use tag::{ClassTag, RefId};
pub use value::{
    date_from_millis, date_to_millis, is_primitive, json_kind, Instance, KeyedMap, ModelValue,
    SharedInstance, SharedKeyedMap,
};
