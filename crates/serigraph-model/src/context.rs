//! # Context — Per-Deserialization Bookkeeping and Reference Resolution
//!
//! A [`Context`] exists for the duration of one top-level deserialize (or
//! update) call. It tracks every continuation the engine hands out, latches
//! the first error, and — on the root context only — owns the reference
//! tables that let an object refer to another object by identifier
//! regardless of document order.
//!
//! ## Completion Criterion
//!
//! Every continuation is counted. When the outstanding-callback count drops
//! to the pending-reference count, all remaining work is known to be
//! reference awaits with no possible producer:
//!
//! - pending references remain → the computation is stuck; settle with an
//!   error enumerating the awaited identifiers;
//! - none remain → settle successfully with the target.
//!
//! ## States
//!
//! A root context is *open* while callbacks are outstanding, then settles
//! exactly once: *ok* (completion fired with the target), or *error*
//! (completion fired with the first error; every later continuation is
//! absorbed silently).

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, trace};

use serigraph_core::{DeserializeError, ModelValue, RefId};

use crate::schema::ModelSchema;

/// A single-shot continuation. Delivery consumes the callback, so invoking
/// it twice is unrepresentable.
pub struct Callback {
    inner: Box<dyn FnOnce(Result<ModelValue, DeserializeError>)>,
}

impl Callback {
    /// Wrap a plain function as a continuation (no context accounting).
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce(Result<ModelValue, DeserializeError>) + 'static,
    {
        Self { inner: Box::new(f) }
    }

    /// Deliver a result.
    pub fn done(self, result: Result<ModelValue, DeserializeError>) {
        (self.inner)(result);
    }

    /// Deliver a success.
    pub fn ok(self, value: ModelValue) {
        self.done(Ok(value));
    }

    /// Deliver an error.
    pub fn fail(self, err: DeserializeError) {
        self.done(Err(err));
    }
}

impl std::fmt::Debug for Callback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Callback")
    }
}

struct PendingRef {
    awaiter: Rc<ModelSchema>,
    callback: Callback,
}

struct ResolvedRef {
    published: Rc<ModelSchema>,
    value: ModelValue,
}

/// Per-deserialization bookkeeping record. Held as `Rc<Context>`; nested
/// object deserializations form a parent chain up to the root.
pub struct Context {
    parent: Option<Rc<Context>>,
    model_schema: Rc<ModelSchema>,
    json: Value,
    args: Option<Rc<dyn Any>>,
    target: RefCell<Option<ModelValue>>,
    on_ready: RefCell<Option<Callback>>,
    pending_callbacks: Cell<usize>,
    pending_refs_count: Cell<usize>,
    has_error: Cell<bool>,
    settled: Cell<bool>,
    // Reference tables; populated on the root context only.
    pending_refs: RefCell<IndexMap<RefId, Vec<PendingRef>>>,
    resolved_refs: RefCell<IndexMap<RefId, Vec<ResolvedRef>>>,
}

impl Context {
    /// Create a context. `parent` is `None` for the root of a top-level
    /// call; custom args are inherited from the parent when nested.
    pub(crate) fn new(
        parent: Option<Rc<Context>>,
        model_schema: Rc<ModelSchema>,
        json: Value,
        on_ready: Callback,
        args: Option<Rc<dyn Any>>,
    ) -> Rc<Self> {
        let args = match &parent {
            Some(parent) => parent.args.clone(),
            None => args,
        };
        Rc::new(Self {
            parent,
            model_schema,
            json,
            args,
            target: RefCell::new(None),
            on_ready: RefCell::new(Some(on_ready)),
            pending_callbacks: Cell::new(0),
            pending_refs_count: Cell::new(0),
            has_error: Cell::new(false),
            settled: Cell::new(false),
            pending_refs: RefCell::new(IndexMap::new()),
            resolved_refs: RefCell::new(IndexMap::new()),
        })
    }

    /// Whether this is the root context of the call.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// The root context of the call (possibly `self`).
    pub fn root(self: &Rc<Self>) -> Rc<Context> {
        let mut current = Rc::clone(self);
        while let Some(parent) = current.parent.clone() {
            current = parent;
        }
        current
    }

    /// The user-supplied custom args, shared by every context in the call.
    pub fn args(&self) -> Option<&Rc<dyn Any>> {
        self.args.as_ref()
    }

    /// The JSON subtree driving this context.
    pub fn json(&self) -> &Value {
        &self.json
    }

    /// The schema driving this context.
    pub fn model_schema(&self) -> &Rc<ModelSchema> {
        &self.model_schema
    }

    /// The in-construction target of this context, if already published.
    pub fn target(&self) -> Option<ModelValue> {
        self.target.borrow().clone()
    }

    pub(crate) fn set_target(&self, target: ModelValue) {
        *self.target.borrow_mut() = Some(target);
    }

    /// Issue an accounted continuation. On success the action runs with the
    /// delivered value before the settlement check; on error the context
    /// latches and fires its completion with the first error only.
    pub fn create_callback<F>(self: &Rc<Self>, action: F) -> Callback
    where
        F: FnOnce(ModelValue) + 'static,
    {
        self.pending_callbacks.set(self.pending_callbacks.get() + 1);
        let ctx = Rc::clone(self);
        Callback::from_fn(move |result| match result {
            Err(err) => ctx.fail(err),
            Ok(value) => {
                if ctx.has_error.get() || ctx.settled.get() {
                    return;
                }
                action(value);
                let pending = ctx.pending_callbacks.get() - 1;
                ctx.pending_callbacks.set(pending);
                ctx.maybe_settle(pending);
            }
        })
    }

    /// Latch the first error and fire the completion with it; absorb
    /// everything after.
    pub(crate) fn fail(&self, err: DeserializeError) {
        if self.has_error.get() {
            return;
        }
        self.has_error.set(true);
        self.settled.set(true);
        self.clear_ref_tables();
        debug!(schema = self.model_schema.name(), error = %err, "context settled with error");
        if let Some(on_ready) = self.on_ready.borrow_mut().take() {
            on_ready.fail(err);
        }
    }

    fn maybe_settle(&self, pending: usize) {
        let pending_refs = self.pending_refs_count.get();
        if pending != pending_refs {
            return;
        }
        if pending_refs > 0 {
            // Every outstanding callback is a reference await, and the
            // only thing that could still resolve one is another callback.
            // Dead end.
            let ids: Vec<String> = self
                .pending_refs
                .borrow()
                .iter()
                .filter(|(_, waiters)| !waiters.is_empty())
                .map(|(id, _)| id.to_string())
                .collect();
            self.fail(DeserializeError::UnresolvableReferences { ids });
            return;
        }
        self.settled.set(true);
        self.clear_ref_tables();
        let target = self.target.borrow().clone().unwrap_or(ModelValue::null());
        debug!(schema = self.model_schema.name(), "context settled");
        if let Some(on_ready) = self.on_ready.borrow_mut().take() {
            on_ready.ok(target);
        }
    }

    fn clear_ref_tables(&self) {
        // Dropping pending entries also drops their callbacks, breaking
        // the Context <-> Callback reference cycle.
        self.pending_refs.borrow_mut().clear();
        self.resolved_refs.borrow_mut().clear();
    }

    /// Await the publication of an identifier. If a value assignable to
    /// `awaiter` is already resolved under `id`, the callback fires
    /// immediately; otherwise it is parked until a matching `resolve_ref`.
    ///
    /// Root-only: reference tables live on the root context.
    pub fn await_ref(self: &Rc<Self>, awaiter: &Rc<ModelSchema>, id: RefId, callback: Callback) {
        assert!(
            self.is_root(),
            "await_ref must be called on the root context"
        );
        let already = self.resolved_refs.borrow().get(&id).and_then(|entries| {
            entries
                .iter()
                .find(|entry| entry.published.is_assignable_to(awaiter))
                .map(|entry| entry.value.clone())
        });
        if let Some(value) = already {
            trace!(%id, "reference already resolved");
            callback.ok(value);
            return;
        }
        trace!(%id, awaiter = awaiter.name(), "reference pending");
        self.pending_refs_count.set(self.pending_refs_count.get() + 1);
        self.pending_refs
            .borrow_mut()
            .entry(id)
            .or_default()
            .push(PendingRef {
                awaiter: Rc::clone(awaiter),
                callback,
            });
    }

    /// Publish a value under an identifier and release every pending await
    /// whose requested schema the published schema is assignable to.
    ///
    /// Root-only: reference tables live on the root context.
    pub fn resolve_ref(self: &Rc<Self>, published: &Rc<ModelSchema>, id: RefId, value: ModelValue) {
        assert!(
            self.is_root(),
            "resolve_ref must be called on the root context"
        );
        if self.settled.get() {
            return;
        }
        trace!(%id, published = published.name(), "reference resolved");
        self.resolved_refs
            .borrow_mut()
            .entry(id.clone())
            .or_default()
            .push(ResolvedRef {
                published: Rc::clone(published),
                value: value.clone(),
            });
        // Collect matching awaiters first: their callbacks may re-enter
        // the context (settlement clears these tables).
        let mut released = Vec::new();
        if let Some(waiters) = self.pending_refs.borrow_mut().get_mut(&id) {
            let mut index = waiters.len();
            while index > 0 {
                index -= 1;
                if published.is_assignable_to(&waiters[index].awaiter) {
                    let entry = waiters.remove(index);
                    self.pending_refs_count
                        .set(self.pending_refs_count.get() - 1);
                    released.push(entry.callback);
                }
            }
        }
        for callback in released {
            callback.ok(value.clone());
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_callbacks(&self) -> usize {
        self.pending_callbacks.get()
    }

    #[cfg(test)]
    pub(crate) fn pending_refs_count(&self) -> usize {
        self.pending_refs_count.get()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("is_root", &self.is_root())
            .field("schema", &self.model_schema.name())
            .field("pending_callbacks", &self.pending_callbacks.get())
            .field("pending_refs", &self.pending_refs_count.get())
            .field("has_error", &self.has_error.get())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
