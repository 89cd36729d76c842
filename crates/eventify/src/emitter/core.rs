/// Core Emitter implementation: identity, registry state and configuration
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use compact_str::CompactString;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::debug;
use uuid::Uuid;

use crate::config::{EmitterOptions, Settings};
use crate::listener::{CallbackId, Context, ListenerEntry, PatternEntry};
use crate::names::{is_pattern, ALL};
use crate::pattern::Pattern;

/// Unique identifier of an emitter.
///
/// Used to compare emitters by identity and to key the subscriptions an
/// emitter holds on others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmitterId(pub Uuid);

impl EmitterId {
    /// Creates a new random emitter ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EmitterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EmitterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) type ListenerList = SmallVec<[Arc<ListenerEntry>; 4]>;

/// Listener entries taken out of the registry.
///
/// Dropped only after the registry lock is released, since a dropped callback
/// may own values that reach back into an emitter.
#[derive(Default)]
pub(crate) struct Removed {
    listeners: Vec<Arc<ListenerEntry>>,
    patterns: Vec<Arc<PatternEntry>>,
}

impl Removed {
    pub fn len(&self) -> usize {
        self.listeners.len() + self.patterns.len()
    }
}

/// Point-in-time copy of the listeners one trigger pass will invoke.
pub(crate) struct Snapshot {
    pub exact: ListenerList,
    pub patterns: Vec<Arc<PatternEntry>>,
    pub all: ListenerList,
    pub namespace_delimiter: String,
    pub wildcard: String,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.exact.len() + self.patterns.len() + self.all.len()
    }
}

/// Per-emitter listener registry.
pub(crate) struct Registry {
    /// Exact-name listeners; keys never map to an empty list
    pub events: HashMap<CompactString, ListenerList>,
    /// Pattern listeners in registration order
    pub patterns: Vec<Arc<PatternEntry>>,
    /// Listeners on the `all` channel
    pub all: ListenerList,
    /// Emitters this one subscribed to through `listen_to`
    pub listening_to: Vec<(EmitterId, WeakEmitter)>,
    pub settings: Settings,
}

impl Registry {
    fn new(settings: Settings) -> Self {
        Self {
            events: HashMap::new(),
            patterns: Vec::new(),
            all: ListenerList::new(),
            listening_to: Vec::new(),
            settings,
        }
    }

    fn is_pattern(&self, name: &str) -> bool {
        is_pattern(name, &self.settings.wildcard, &self.settings.namespace_delimiter)
    }

    /// Appends `entry` to the collection `name` belongs to.
    pub fn add(&mut self, name: &str, entry: ListenerEntry) {
        if name == ALL {
            self.all.push(Arc::new(entry));
        } else if self.is_pattern(name) {
            let pattern = Pattern::compile(
                name,
                &self.settings.namespace_delimiter,
                &self.settings.wildcard,
            );
            self.patterns.push(Arc::new(PatternEntry {
                listener: entry,
                pattern,
            }));
        } else {
            self.events
                .entry(CompactString::new(name))
                .or_default()
                .push(Arc::new(entry));
        }
    }

    /// Removes the entries of `name` accepted by the removal predicate.
    pub fn remove_named(
        &mut self,
        name: &str,
        callback: Option<CallbackId>,
        context: Option<&Context>,
        removed: &mut Removed,
    ) {
        if name == ALL {
            retain_listeners(&mut self.all, callback, context, &mut removed.listeners);
        } else if self.is_pattern(name) {
            let mut kept = Vec::with_capacity(self.patterns.len());
            for entry in self.patterns.drain(..) {
                if entry.pattern.source() == name && entry.listener.matches(callback, context) {
                    removed.patterns.push(entry);
                } else {
                    kept.push(entry);
                }
            }
            self.patterns = kept;
        } else if let Some(list) = self.events.get_mut(name) {
            retain_listeners(list, callback, context, &mut removed.listeners);
            if list.is_empty() {
                self.events.remove(name);
            }
        }
    }

    /// Removes matching entries under `name`, or under every registered name
    /// when `name` is absent. With no filter at all this is a full reset.
    pub fn remove(
        &mut self,
        name: Option<&str>,
        callback: Option<CallbackId>,
        context: Option<&Context>,
    ) -> Removed {
        let mut removed = Removed::default();
        match name {
            Some(name) => self.remove_named(name, callback, context, &mut removed),
            None if callback.is_none() && context.is_none() => {
                for (_, list) in self.events.drain() {
                    removed.listeners.extend(list);
                }
                removed.listeners.extend(self.all.drain(..));
                removed.patterns.append(&mut self.patterns);
            }
            None => {
                for name in self.registered_names() {
                    self.remove_named(&name, callback, context, &mut removed);
                }
            }
        }
        removed
    }

    /// Exact names, distinct pattern strings, then `all` if it has listeners.
    pub fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.events.keys().map(|name| name.to_string()).collect();
        for entry in &self.patterns {
            let source = entry.pattern.source();
            if !names.iter().any(|name| name == source) {
                names.push(source.to_string());
            }
        }
        if !self.all.is_empty() {
            names.push(ALL.to_string());
        }
        names
    }

    /// Whether any listener was registered with `context`.
    pub fn holds_context(&self, context: &Context) -> bool {
        let registered_with = |entry: &ListenerEntry| entry.context.as_ref() == Some(context);
        self.events
            .values()
            .flat_map(|list| list.iter())
            .any(|entry| registered_with(&**entry))
            || self.patterns.iter().any(|entry| registered_with(&entry.listener))
            || self.all.iter().any(|entry| registered_with(&**entry))
    }

    pub fn snapshot(&self, event: &str) -> Snapshot {
        Snapshot {
            exact: self.events.get(event).cloned().unwrap_or_default(),
            patterns: self.patterns.clone(),
            all: self.all.clone(),
            namespace_delimiter: self.settings.namespace_delimiter.clone(),
            wildcard: self.settings.wildcard.clone(),
        }
    }

    pub fn listener_count(&self, name: &str) -> usize {
        if name == ALL {
            self.all.len()
        } else if self.is_pattern(name) {
            self.patterns
                .iter()
                .filter(|entry| entry.pattern.source() == name)
                .count()
        } else {
            self.events.get(name).map_or(0, |list| list.len())
        }
    }
}

fn retain_listeners(
    list: &mut ListenerList,
    callback: Option<CallbackId>,
    context: Option<&Context>,
    removed: &mut Vec<Arc<ListenerEntry>>,
) {
    let mut kept = ListenerList::new();
    for entry in list.drain(..) {
        if entry.matches(callback, context) {
            removed.push(entry);
        } else {
            kept.push(entry);
        }
    }
    *list = kept;
}

pub(crate) struct Shared {
    id: EmitterId,
    registry: Mutex<Registry>,
}

/// An event emitter.
///
/// Cloning an `Emitter` yields another handle to the same registry. The
/// registry lock is never held while listeners, validators or error handlers
/// run, so every operation may be called re-entrantly from inside a listener.
#[derive(Clone)]
pub struct Emitter {
    shared: Arc<Shared>,
}

impl Emitter {
    /// Creates an emitter with default options.
    pub fn new() -> Self {
        Self::with_options(EmitterOptions::default())
    }

    /// Creates an emitter with the given options.
    pub fn with_options(options: EmitterOptions) -> Self {
        let id = EmitterId::new();
        debug!("🆕 Created emitter {}", id);
        Self {
            shared: Arc::new(Shared {
                id,
                registry: Mutex::new(Registry::new(Settings::new(options))),
            }),
        }
    }

    /// Identity of this emitter.
    pub fn id(&self) -> EmitterId {
        self.shared.id
    }

    /// A handle that does not keep the emitter alive.
    pub fn downgrade(&self) -> WeakEmitter {
        WeakEmitter {
            id: self.shared.id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Merges `options` into the current settings. Options left unset keep
    /// their current value.
    pub fn configure(&self, options: EmitterOptions) -> &Self {
        debug!("⚙️ Reconfiguring emitter {}: {:?}", self.shared.id, options);
        self.registry().settings.merge(options);
        self
    }

    /// Number of listeners registered under `name` (an exact name, a pattern
    /// string or `all`).
    pub fn listener_count(&self, name: &str) -> usize {
        self.registry().listener_count(name)
    }

    /// Names that currently have listeners.
    pub fn event_names(&self) -> Vec<String> {
        self.registry().registered_names()
    }

    /// Whether this emitter tracks a subscription on `other`.
    pub fn is_listening_to(&self, other: &Emitter) -> bool {
        let other_id = other.id();
        self.registry()
            .listening_to
            .iter()
            .any(|(id, _)| *id == other_id)
    }

    /// Whether any listener here was registered with `context`.
    pub(crate) fn holds_context(&self, context: &Context) -> bool {
        self.registry().holds_context(context)
    }

    pub(crate) fn registry(&self) -> MutexGuard<'_, Registry> {
        self.shared.registry.lock()
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Emitter {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for Emitter {}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("id", &self.shared.id)
            .field("registry", &"[listeners]")
            .finish()
    }
}

/// Non-owning handle to an [`Emitter`].
#[derive(Clone)]
pub struct WeakEmitter {
    id: EmitterId,
    shared: Weak<Shared>,
}

impl WeakEmitter {
    /// The emitter, while it is still alive.
    pub fn upgrade(&self) -> Option<Emitter> {
        self.shared.upgrade().map(|shared| Emitter { shared })
    }

    pub fn id(&self) -> EmitterId {
        self.id
    }

    /// Whether the emitter still exists, without upgrading.
    pub fn is_alive(&self) -> bool {
        self.shared.strong_count() > 0
    }
}

impl fmt::Debug for WeakEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakEmitter({})", self.id)
    }
}

/// Returns a fresh, independent emitter.
pub fn create(options: EmitterOptions) -> Emitter {
    Emitter::with_options(options)
}

static DEFAULT_EMITTER: Lazy<Emitter> = Lazy::new(|| {
    let emitter = Emitter::new();
    debug!("🌐 Created process-wide default emitter {}", emitter.id());
    emitter
});

/// The process-wide default emitter, created on first use.
///
/// Every call returns a handle to the same emitter, so code that shares no
/// other state can still meet on it. It is configured like any other emitter
/// through [`Emitter::configure`].
pub fn default_emitter() -> &'static Emitter {
    &DEFAULT_EMITTER
}
