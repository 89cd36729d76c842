//! Listener records: callbacks, contexts and registry entries.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;

use crate::emitter::{Emitter, EmitterId, WeakEmitter};
use crate::pattern::Pattern;

static NEXT_CALLBACK_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a [`Callback`]. Clones of a callback share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

impl CallbackId {
    pub(crate) fn next() -> Self {
        Self(NEXT_CALLBACK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// What a listener hands back to the dispatcher.
pub enum Reply {
    /// The listener finished synchronously
    Done,
    /// The listener started asynchronous work; a failure of this future is
    /// reported to the error handler once it resolves
    Pending(BoxFuture<'static, anyhow::Result<()>>),
}

type InvokeFn = dyn Fn(&Call<'_>) -> anyhow::Result<Reply> + Send + Sync;

/// A registered user function together with its identity.
///
/// Wrappers created by `once` keep the identity of the callback they wrap in
/// `original`, so removing the original also removes the wrapper.
#[derive(Clone)]
pub struct Callback {
    id: CallbackId,
    original: Option<CallbackId>,
    invoke: Arc<InvokeFn>,
}

impl Callback {
    /// Creates a synchronous callback.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use eventify::{create, Callback, EmitterOptions};
    /// use serde_json::json;
    ///
    /// let emitter = create(EmitterOptions::default());
    /// let greet = Callback::new(|call| {
    ///     println!("hello {}", call.args()[0]);
    ///     Ok(())
    /// });
    /// emitter.on("greet", Some(&greet), None);
    /// emitter.trigger("greet", vec![json!("world")])?;
    /// # Ok::<(), eventify::EmitterError>(())
    /// ```
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Call<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::from_fn(move |call| f(call).map(|()| Reply::Done))
    }

    /// Creates a callback that starts asynchronous work.
    ///
    /// The dispatcher never awaits the returned future; it is driven on the
    /// ambient Tokio runtime and only its failure is observed.
    pub fn new_async<F, Fut>(f: F) -> Self
    where
        F: Fn(&Call<'_>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::from_fn(move |call| Ok(Reply::Pending(f(call).boxed())))
    }

    pub(crate) fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Call<'_>) -> anyhow::Result<Reply> + Send + Sync + 'static,
    {
        Self::with_id(CallbackId::next(), f)
    }

    /// A plain callback under a pre-allocated identity, for listeners that
    /// need to know their own id.
    pub(crate) fn with_id<F>(id: CallbackId, f: F) -> Self
    where
        F: Fn(&Call<'_>) -> anyhow::Result<Reply> + Send + Sync + 'static,
    {
        Self {
            id,
            original: None,
            invoke: Arc::new(f),
        }
    }

    /// Builds a wrapper around `original` under a pre-allocated identity.
    pub(crate) fn wrapping<F>(id: CallbackId, original: &Callback, f: F) -> Self
    where
        F: Fn(&Call<'_>) -> anyhow::Result<Reply> + Send + Sync + 'static,
    {
        Self {
            id,
            original: Some(original.id),
            invoke: Arc::new(f),
        }
    }

    /// Identity of this callback.
    pub fn id(&self) -> CallbackId {
        self.id
    }

    /// Identity of the wrapped callback, for wrappers.
    pub fn original(&self) -> Option<CallbackId> {
        self.original
    }

    pub(crate) fn invoke(&self, call: &Call<'_>) -> anyhow::Result<Reply> {
        (self.invoke)(call)
    }

    /// True if `id` names this callback or the callback it wraps.
    pub(crate) fn answers_to(&self, id: CallbackId) -> bool {
        self.id == id || self.original == Some(id)
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Callback {}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("id", &self.id)
            .field("original", &self.original)
            .finish()
    }
}

#[derive(Clone)]
enum Binding {
    Value(Arc<dyn Any + Send + Sync>),
    Emitter { id: EmitterId, handle: WeakEmitter },
}

/// Identity value attached to a registration.
///
/// Contexts are compared by identity, never by content: two contexts are
/// equal when they wrap the same allocation or the same emitter. A context
/// naming an emitter holds it weakly.
#[derive(Clone)]
pub struct Context(Binding);

impl Context {
    /// Wraps `value` in a fresh identity.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Binding::Value(Arc::new(value)))
    }

    /// Uses an existing allocation as identity.
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self(Binding::Value(value))
    }

    /// Uses an emitter as identity.
    pub fn of(emitter: &Emitter) -> Self {
        Self(Binding::Emitter {
            id: emitter.id(),
            handle: emitter.downgrade(),
        })
    }

    /// Borrows the wrapped value if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match &self.0 {
            Binding::Value(value) => value.downcast_ref::<T>(),
            Binding::Emitter { .. } => None,
        }
    }

    /// The emitter this context names, while it is alive.
    pub fn emitter(&self) -> Option<Emitter> {
        match &self.0 {
            Binding::Emitter { handle, .. } => handle.upgrade(),
            Binding::Value(_) => None,
        }
    }

    /// Whether this context names `emitter`.
    pub fn is_emitter(&self, emitter: &Emitter) -> bool {
        matches!(&self.0, Binding::Emitter { id, .. } if *id == emitter.id())
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Binding::Value(a), Binding::Value(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            (Binding::Emitter { id: a, .. }, Binding::Emitter { id: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for Context {}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Binding::Value(value) => write!(f, "Context({:p})", Arc::as_ptr(value)),
            Binding::Emitter { id, .. } => write!(f, "Context(emitter {id})"),
        }
    }
}

/// View of one listener invocation.
pub struct Call<'a> {
    pub(crate) event: &'a str,
    pub(crate) args: &'a [Value],
    pub(crate) this: &'a Context,
    pub(crate) emitter: &'a Emitter,
}

impl<'a> Call<'a> {
    /// Name of the triggered event.
    pub fn event(&self) -> &'a str {
        self.event
    }

    /// Arguments of this delivery. Listeners on the `all` channel receive the
    /// event name as first argument.
    pub fn args(&self) -> &'a [Value] {
        self.args
    }

    /// Argument at `index`, if present.
    pub fn arg(&self, index: usize) -> Option<&'a Value> {
        self.args.get(index)
    }

    /// The receiver bound at registration: the registration context, or the
    /// emitter itself when none was given.
    pub fn this(&self) -> &'a Context {
        self.this
    }

    /// The emitter dispatching this event.
    pub fn emitter(&self) -> &'a Emitter {
        self.emitter
    }
}

/// One registered callback.
#[derive(Debug)]
pub(crate) struct ListenerEntry {
    pub callback: Callback,
    pub context: Option<Context>,
    pub bound: Context,
}

impl ListenerEntry {
    /// Removal predicate: an absent filter matches everything.
    pub fn matches(&self, callback: Option<CallbackId>, context: Option<&Context>) -> bool {
        let callback_matches = callback.map_or(true, |id| self.callback.answers_to(id));
        let context_matches = context.map_or(true, |ctx| self.context.as_ref() == Some(ctx));
        callback_matches && context_matches
    }
}

/// A listener registered under a wildcard pattern.
#[derive(Debug)]
pub(crate) struct PatternEntry {
    pub listener: ListenerEntry,
    pub pattern: Pattern,
}
