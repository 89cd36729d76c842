/// Listener registration and removal: `on`, `once`, `off`
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, trace};

use super::core::Emitter;
use crate::listener::{Callback, CallbackId, Context, ListenerEntry, Reply};
use crate::names::{expand, Expanded, Names};

impl Emitter {
    /// Registers `callback` for the given name(s).
    ///
    /// `names` may be a single event name, a pattern such as `/chat/*`, the
    /// `all` channel, several whitespace-separated names, or a list of
    /// name/callback pairs (in which case each pair's callback is used).
    /// An empty name (including the empty ends of a list such as `" a b"`)
    /// or a missing callback is ignored.
    ///
    /// `context` only identifies the registration for later removal; it is
    /// also what the listener sees as [`Call::this`](crate::Call::this).
    /// Without one the listener is bound to this emitter.
    pub fn on(
        &self,
        names: impl Into<Names<Callback>>,
        callback: Option<&Callback>,
        context: Option<&Context>,
    ) -> &Self {
        match expand(names.into()) {
            Expanded::Empty => {}
            Expanded::Single(name) => {
                if let Some(callback) = callback {
                    self.add_listener(&name, callback.clone(), context);
                }
            }
            Expanded::Many(entries) => {
                for (name, mapped) in entries.into_iter().filter(|(name, _)| !name.is_empty()) {
                    if let Some(callback) = mapped.as_ref().or(callback) {
                        self.add_listener(&name, callback.clone(), context);
                    }
                }
            }
        }
        self
    }

    /// Like [`on`](Self::on), but the listener fires at most once.
    ///
    /// The one-shot wrapper remembers the callback it wraps, so
    /// `off(name, Some(&callback), None)` removes it before it fires.
    pub fn once(
        &self,
        names: impl Into<Names<Callback>>,
        callback: Option<&Callback>,
        context: Option<&Context>,
    ) -> &Self {
        match expand(names.into()) {
            Expanded::Empty => {}
            Expanded::Single(name) => {
                if let Some(callback) = callback {
                    self.add_once(&name, callback, context);
                }
            }
            Expanded::Many(entries) => {
                for (name, mapped) in entries.into_iter().filter(|(name, _)| !name.is_empty()) {
                    if let Some(callback) = mapped.as_ref().or(callback) {
                        self.add_once(&name, callback, context);
                    }
                }
            }
        }
        self
    }

    /// Removes listeners.
    ///
    /// * no name, callback or context: every listener is removed
    /// * a name: only that name's listeners are considered
    /// * no name but a callback and/or context: every registered name is swept
    ///
    /// A listener goes when the callback is absent or is (or wraps) the given
    /// callback, and the context is absent or equal to its registration
    /// context. Removing something never registered is a no-op.
    pub fn off(
        &self,
        names: impl Into<Names<Callback>>,
        callback: Option<&Callback>,
        context: Option<&Context>,
    ) -> &Self {
        let callback_id = callback.map(Callback::id);
        match expand(names.into()) {
            Expanded::Empty => {
                self.remove_listeners(None, callback_id, context);
            }
            Expanded::Single(name) => {
                self.remove_listeners(Some(name.as_str()), callback_id, context);
            }
            Expanded::Many(entries) => {
                for (name, mapped) in entries.into_iter().filter(|(name, _)| !name.is_empty()) {
                    let id = mapped.as_ref().map(Callback::id).or(callback_id);
                    self.remove_listeners(Some(name.as_str()), id, context);
                }
            }
        }
        self
    }

    fn add_listener(&self, name: &str, callback: Callback, context: Option<&Context>) {
        let bound = context.cloned().unwrap_or_else(|| Context::of(self));
        let callback_id = callback.id();
        self.registry().add(
            name,
            ListenerEntry {
                callback,
                context: context.cloned(),
                bound,
            },
        );
        trace!("➕ Registered listener {:?} for '{}' on emitter {}", callback_id, name, self.id());
    }

    fn add_once(&self, name: &str, callback: &Callback, context: Option<&Context>) {
        let id = CallbackId::next();
        let fired = AtomicBool::new(false);
        let event = name.to_string();
        let owner_context = context.cloned();
        let original = callback.clone();

        let wrapper = Callback::wrapping(id, callback, move |call| {
            if fired.swap(true, Ordering::AcqRel) {
                return Ok(Reply::Done);
            }
            call.emitter()
                .remove_listeners(Some(event.as_str()), Some(id), owner_context.as_ref());
            original.invoke(call)
        });
        self.add_listener(name, wrapper, context);
    }

    /// Removes matching listeners and returns how many went.
    pub(crate) fn remove_listeners(
        &self,
        name: Option<&str>,
        callback: Option<CallbackId>,
        context: Option<&Context>,
    ) -> usize {
        let removed = self.registry().remove(name, callback, context);
        let count = removed.len();
        if count > 0 {
            debug!(
                "➖ Removed {} listener(s) for '{}' on emitter {}",
                count,
                name.unwrap_or("*any*"),
                self.id()
            );
        }
        drop(removed);
        count
    }
}
