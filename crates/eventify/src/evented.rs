//! Equipping arbitrary values with the emitter operation set.
//!
//! [`enable`] attaches an emitter to a shared value without touching the
//! value's type: the association lives in a process-wide side table keyed by
//! the value's identity, so enabling the same value again hands back the same
//! emitter (with the new options merged in). An entry whose value has been
//! dropped is replaced when its slot is reused, and the whole table is swept
//! each time it has doubled in size since the last sweep.
//!
//! ```rust
//! use std::sync::Arc;
//! use eventify::{enable, Callback, EmitterOptions, Events};
//! use serde_json::json;
//!
//! struct Door {
//!     name: &'static str,
//! }
//!
//! let door = enable(Arc::new(Door { name: "front" }), EmitterOptions::default());
//! door.on("open", Some(&Callback::new(|_| Ok(()))), None)
//!     .trigger("open", vec![json!(door.name)])?;
//! # Ok::<(), eventify::EmitterError>(())
//! ```

use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde_json::Value;
use tracing::trace;

use crate::config::EmitterOptions;
use crate::emitter::{Emitter, EventStream, IterateOptions};
use crate::error::EmitterError;
use crate::listener::{Callback, Context};
use crate::names::Names;

/// The emitter operation set, chainable on the implementing value.
///
/// Implementors only provide [`emitter`](Events::emitter); every operation
/// delegates to it and returns `self`.
pub trait Events {
    /// The emitter backing this value.
    fn emitter(&self) -> &Emitter;

    fn on(
        &self,
        names: impl Into<Names<Callback>>,
        callback: Option<&Callback>,
        context: Option<&Context>,
    ) -> &Self {
        self.emitter().on(names, callback, context);
        self
    }

    fn once(
        &self,
        names: impl Into<Names<Callback>>,
        callback: Option<&Callback>,
        context: Option<&Context>,
    ) -> &Self {
        self.emitter().once(names, callback, context);
        self
    }

    fn off(
        &self,
        names: impl Into<Names<Callback>>,
        callback: Option<&Callback>,
        context: Option<&Context>,
    ) -> &Self {
        self.emitter().off(names, callback, context);
        self
    }

    fn trigger(
        &self,
        names: impl Into<Names<Value>>,
        args: Vec<Value>,
    ) -> Result<&Self, EmitterError> {
        self.emitter().trigger(names, args)?;
        Ok(self)
    }

    fn emit(
        &self,
        names: impl Into<Names<Value>>,
        args: Vec<Value>,
    ) -> Result<&Self, EmitterError> {
        self.trigger(names, args)
    }

    fn produce(
        &self,
        names: impl Into<Names<Value>>,
        args: Vec<Value>,
    ) -> Result<&Self, EmitterError> {
        self.trigger(names, args)
    }

    fn listen_to(
        &self,
        other: &impl Events,
        names: impl Into<Names<Callback>>,
        callback: Option<&Callback>,
    ) -> &Self {
        self.emitter().listen_to(other.emitter(), names, callback);
        self
    }

    fn listen_to_once(
        &self,
        other: &impl Events,
        names: impl Into<Names<Callback>>,
        callback: Option<&Callback>,
    ) -> &Self {
        self.emitter().listen_to_once(other.emitter(), names, callback);
        self
    }

    fn stop_listening(
        &self,
        other: Option<&Emitter>,
        names: impl Into<Names<Callback>>,
        callback: Option<&Callback>,
    ) -> &Self {
        self.emitter().stop_listening(other, names, callback);
        self
    }

    fn iterate(&self, event: &str, options: IterateOptions) -> EventStream {
        self.emitter().iterate(event, options)
    }
}

impl Events for Emitter {
    fn emitter(&self) -> &Emitter {
        self
    }
}

/// A shared value together with the emitter attached to it.
pub struct Evented<T> {
    target: Arc<T>,
    emitter: Emitter,
}

impl<T> Evented<T> {
    /// The enabled value.
    pub fn target(&self) -> &Arc<T> {
        &self.target
    }

    /// Context naming this value's emitter, for use with `on`/`off`.
    pub fn context(&self) -> Context {
        Context::of(&self.emitter)
    }

    pub fn into_parts(self) -> (Arc<T>, Emitter) {
        (self.target, self.emitter)
    }
}

impl<T> Events for Evented<T> {
    fn emitter(&self) -> &Emitter {
        &self.emitter
    }
}

impl<T> Deref for Evented<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.target
    }
}

impl<T> Clone for Evented<T> {
    fn clone(&self) -> Self {
        Self {
            target: Arc::clone(&self.target),
            emitter: self.emitter.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Evented<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evented")
            .field("target", &self.target)
            .field("emitter", &self.emitter.id())
            .finish()
    }
}

struct Binding {
    target: Weak<dyn Any + Send + Sync>,
    emitter: Emitter,
}

impl Binding {
    fn is_alive(&self) -> bool {
        self.target.strong_count() > 0
    }
}

static BINDINGS: Lazy<DashMap<usize, Binding>> = Lazy::new(DashMap::new);
static NEXT_SWEEP: AtomicUsize = AtomicUsize::new(MIN_SWEEP);

const MIN_SWEEP: usize = 64;

/// Drops dead bindings once `table` has reached `next_sweep` entries, then
/// moves the mark to twice the surviving size.
fn sweep_if_due(table: &DashMap<usize, Binding>, next_sweep: &AtomicUsize) {
    if table.len() < next_sweep.load(Ordering::Relaxed) {
        return;
    }
    table.retain(|_, binding| binding.is_alive());
    next_sweep.store((table.len() * 2).max(MIN_SWEEP), Ordering::Relaxed);
    trace!("🧹 Swept event bindings, {} left", table.len());
}

fn identity<T>(target: &Arc<T>) -> usize {
    Arc::as_ptr(target) as *const () as usize
}

/// Attaches an emitter to `target`, or merges `options` into the one it
/// already has.
pub fn enable<T: Any + Send + Sync>(target: Arc<T>, options: EmitterOptions) -> Evented<T> {
    let emitter = match BINDINGS.entry(identity(&target)) {
        Entry::Occupied(slot) if slot.get().is_alive() => slot.get().emitter.clone(),
        entry => {
            let erased: Arc<dyn Any + Send + Sync> = target.clone();
            let emitter = Emitter::new();
            entry.insert(Binding {
                target: Arc::downgrade(&erased),
                emitter: emitter.clone(),
            });
            trace!("🔌 Enabled events for value at {:p}", Arc::as_ptr(&target));
            emitter
        }
    };
    sweep_if_due(&BINDINGS, &NEXT_SWEEP);
    emitter.configure(options);

    Evented { target, emitter }
}

/// [`enable`] on a freshly created `T::default()`.
pub fn enable_default<T: Default + Any + Send + Sync>(options: EmitterOptions) -> Evented<T> {
    enable(Arc::new(T::default()), options)
}

/// The emitter attached to `target`, if it was enabled.
pub fn emitter_of<T: Any + Send + Sync>(target: &Arc<T>) -> Option<Emitter> {
    BINDINGS
        .get(&identity(target))
        .filter(|binding| binding.is_alive())
        .map(|binding| binding.emitter.clone())
}
