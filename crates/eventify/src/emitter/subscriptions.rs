/// Inversion-of-control subscriptions: `listen_to`, `listen_to_once`, `stop_listening`
use tracing::debug;

use super::core::{Emitter, EmitterId};
use crate::listener::{Callback, Context};
use crate::names::Names;

impl Emitter {
    /// Subscribes to `other` on behalf of this emitter.
    ///
    /// The listener is registered on `other` with this emitter as context, and
    /// `other` is remembered so [`stop_listening`](Self::stop_listening) can
    /// tear the subscription down later without knowing the details.
    pub fn listen_to(
        &self,
        other: &Emitter,
        names: impl Into<Names<Callback>>,
        callback: Option<&Callback>,
    ) -> &Self {
        self.track(other);
        other.on(names, callback, Some(&Context::of(self)));
        self
    }

    /// Like [`listen_to`](Self::listen_to), but the listener fires at most once.
    pub fn listen_to_once(
        &self,
        other: &Emitter,
        names: impl Into<Names<Callback>>,
        callback: Option<&Callback>,
    ) -> &Self {
        self.track(other);
        other.once(names, callback, Some(&Context::of(self)));
        self
    }

    /// Removes subscriptions made through `listen_to`.
    ///
    /// Without `other` every tracked emitter is targeted. Without a name or
    /// callback every subscription on the targets goes and they are no longer
    /// tracked; otherwise only the matching ones go, and a target stays
    /// tracked only while it still holds listeners registered by this emitter.
    pub fn stop_listening(
        &self,
        other: Option<&Emitter>,
        names: impl Into<Names<Callback>>,
        callback: Option<&Callback>,
    ) -> &Self {
        let names = names.into();
        let detach = names.is_empty() && callback.is_none();
        let targets: Vec<Emitter> = match other {
            Some(other) => vec![other.clone()],
            None => self
                .registry()
                .listening_to
                .iter()
                .filter_map(|(_, handle)| handle.upgrade())
                .collect(),
        };

        let context = Context::of(self);
        for target in &targets {
            target.off(names.clone(), callback, Some(&context));
            if detach || !target.holds_context(&context) {
                self.untrack(target.id());
            }
        }

        if other.is_none() {
            // Drop entries whose emitter is gone
            self.registry()
                .listening_to
                .retain(|(_, handle)| handle.is_alive());
        }
        self
    }

    fn track(&self, other: &Emitter) {
        let other_id = other.id();
        let mut registry = self.registry();
        if !registry.listening_to.iter().any(|(id, _)| *id == other_id) {
            registry.listening_to.push((other_id, other.downgrade()));
            debug!("🔗 Emitter {} now listening to {}", self.id(), other_id);
        }
    }

    fn untrack(&self, other_id: EmitterId) {
        let mut registry = self.registry();
        let before = registry.listening_to.len();
        registry.listening_to.retain(|(id, _)| *id != other_id);
        if registry.listening_to.len() != before {
            debug!("🔓 Emitter {} stopped listening to {}", self.id(), other_id);
        }
    }
}
