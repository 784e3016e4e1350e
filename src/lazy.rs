//! Lazy attribute group - batched, at-most-once metadata loading.
//!
//! Derived attributes of one object (size, binary classification) all need
//! the same trip into the backing store, so they are loaded together: the
//! first access to any attribute in a group runs every registered loader in
//! one pass and caches all results. Objects are content-addressed and
//! therefore immutable, so a cached value never goes stale and the group is
//! never invalidated.

use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Condvar, Mutex};

use tracing::{debug, trace};

use crate::{Error, Oid, Result};

/// A cached attribute value, type-erased.
pub type AttributeValue = Arc<dyn Any + Send + Sync>;

type LoaderFn = Box<dyn Fn(&Oid) -> Result<AttributeValue> + Send + Sync>;

struct Loader {
    name: &'static str,
    load: LoaderFn,
}

enum Phase {
    Unevaluated,
    Evaluating,
    Evaluated(HashMap<&'static str, AttributeValue>),
}

/// Coordinates at-most-once, all-or-nothing evaluation of a set of named
/// loaders against one object id, and serves cached results thereafter.
///
/// Loaders are registered while the group is exclusively owned; once it is
/// shared (`Arc`), only reads remain. Evaluation runs every loader in
/// registration order and either caches all results or none: the first
/// loader failure aborts the pass and returns the group to the unevaluated
/// state, so a later access retries instead of observing a partial set.
///
/// Concurrent callers converge on a single evaluation: whichever thread
/// finds the group unevaluated runs the loaders while the others wait on
/// the gate and then read the cached values.
pub struct AttributeGroup {
    oid: Oid,
    loaders: Vec<Loader>,
    state: Mutex<Phase>,
    gate: Condvar,
}

impl AttributeGroup {
    /// Create an empty group bound to an object id.
    pub fn new(oid: Oid) -> Self {
        AttributeGroup {
            oid,
            loaders: Vec::new(),
            state: Mutex::new(Phase::Unevaluated),
            gate: Condvar::new(),
        }
    }

    /// The object id this group's loaders run against.
    pub fn oid(&self) -> &Oid {
        &self.oid
    }

    /// Register a named loader.
    ///
    /// Fails with [`Error::Configuration`] if the name is already taken or
    /// the group has started evaluating.
    pub fn register<T, F>(&mut self, name: &'static str, loader: F) -> Result<()>
    where
        T: Send + Sync + 'static,
        F: Fn(&Oid) -> Result<T> + Send + Sync + 'static,
    {
        let state = self.state.lock().expect("attribute group lock poisoned");
        if !matches!(*state, Phase::Unevaluated) {
            return Err(Error::Configuration(format!(
                "attribute {} registered after evaluation",
                name
            )));
        }
        drop(state);

        if self.loaders.iter().any(|l| l.name == name) {
            return Err(Error::Configuration(format!(
                "attribute {} registered twice",
                name
            )));
        }

        self.loaders.push(Loader {
            name,
            load: Box::new(move |oid| loader(oid).map(|v| Arc::new(v) as AttributeValue)),
        });
        Ok(())
    }

    /// Whether the group has been evaluated.
    pub fn is_evaluated(&self) -> bool {
        matches!(
            *self.state.lock().expect("attribute group lock poisoned"),
            Phase::Evaluated(_)
        )
    }

    /// Get the cached value for `name`, evaluating the group first if no
    /// evaluation has succeeded yet.
    ///
    /// Fails with [`Error::UnknownAttribute`] for a name that was never
    /// registered (checked before any evaluation is triggered), or
    /// [`Error::Load`] if a loader fails during the pass.
    pub fn get(&self, name: &str) -> Result<AttributeValue> {
        if !self.loaders.iter().any(|l| l.name == name) {
            return Err(Error::UnknownAttribute(name.to_string()));
        }

        let mut state = self.state.lock().expect("attribute group lock poisoned");
        loop {
            match &*state {
                Phase::Evaluated(values) => {
                    return values
                        .get(name)
                        .cloned()
                        .ok_or_else(|| Error::UnknownAttribute(name.to_string()));
                }
                Phase::Evaluating => {
                    state = self.gate.wait(state).expect("attribute group lock poisoned");
                }
                Phase::Unevaluated => {
                    *state = Phase::Evaluating;
                    drop(state);

                    // A loader panic must not leave waiters parked on the gate.
                    let reset = ResetOnUnwind { group: self, armed: true };
                    let outcome = self.run_loaders();

                    state = self.state.lock().expect("attribute group lock poisoned");
                    match outcome {
                        Ok(values) => {
                            let requested = values.get(name).cloned();
                            *state = Phase::Evaluated(values);
                            reset.disarm();
                            self.gate.notify_all();
                            return requested
                                .ok_or_else(|| Error::UnknownAttribute(name.to_string()));
                        }
                        Err(e) => {
                            *state = Phase::Unevaluated;
                            reset.disarm();
                            self.gate.notify_all();
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    /// Run every loader in registration order, short-circuiting on the
    /// first failure.
    fn run_loaders(&self) -> Result<HashMap<&'static str, AttributeValue>> {
        trace!(oid = %self.oid.short(), "evaluating attribute group");
        let mut values = HashMap::with_capacity(self.loaders.len());
        for loader in &self.loaders {
            match (loader.load)(&self.oid) {
                Ok(value) => {
                    values.insert(loader.name, value);
                }
                Err(cause) => {
                    debug!(
                        oid = %self.oid.short(),
                        attribute = loader.name,
                        "attribute load failed"
                    );
                    return Err(Error::load(loader.name, cause));
                }
            }
        }
        debug!(
            oid = %self.oid.short(),
            attributes = values.len(),
            "attribute group evaluated"
        );
        Ok(values)
    }
}

impl std::fmt::Debug for AttributeGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeGroup")
            .field("oid", &self.oid)
            .field("attributes", &self.loaders.len())
            .field("evaluated", &self.is_evaluated())
            .finish()
    }
}

/// Puts the group back to `Unevaluated` if the evaluating thread unwinds.
struct ResetOnUnwind<'a> {
    group: &'a AttributeGroup,
    armed: bool,
}

impl ResetOnUnwind<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ResetOnUnwind<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut state) = self.group.state.lock() {
            *state = Phase::Unevaluated;
            self.group.gate.notify_all();
        }
    }
}

/// Typed, read-only view onto one attribute of a shared group.
///
/// Handles hold no storage of their own; once the group has evaluated,
/// every handle bound to it observes the same cached value.
pub struct LazyHandle<T> {
    group: Arc<AttributeGroup>,
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for LazyHandle<T> {
    fn clone(&self) -> Self {
        LazyHandle {
            group: Arc::clone(&self.group),
            name: self.name,
            _marker: PhantomData,
        }
    }
}

impl<T: Clone + Send + Sync + 'static> LazyHandle<T> {
    /// Bind a handle to an attribute of `group`.
    pub fn new(group: Arc<AttributeGroup>, name: &'static str) -> Self {
        LazyHandle {
            group,
            name,
            _marker: PhantomData,
        }
    }

    /// The cached value, evaluating the group on first demand.
    ///
    /// Fails with [`Error::TypeMismatch`] if the stored value's shape
    /// disagrees with `T`.
    pub fn value(&self) -> Result<T> {
        let slot = self.group.get(self.name)?;
        slot.downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| Error::TypeMismatch {
                attribute: self.name.to_string(),
            })
    }
}

impl<T> std::fmt::Debug for LazyHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyHandle")
            .field("attribute", &self.name)
            .field("oid", self.group.oid())
            .finish()
    }
}
