/// Event dispatch: `trigger`, `emit`, `produce` and listener error isolation
use std::panic::{self, AssertUnwindSafe};

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tracing::{debug, trace};

use super::core::Emitter;
use crate::error::{panic_message, EmitterError, ListenerError};
use crate::listener::{Call, Callback, Context, Reply};
use crate::names::{expand, split_name, Expanded, Names};
use crate::schema::normalize_args;

/// Context handed to the error handler alongside a [`ListenerError`].
#[derive(Debug, Clone)]
pub struct ErrorMeta {
    /// Name of the event being delivered
    pub event: String,
    /// Arguments after validation, without the event name prepended for `all`
    pub args: Vec<Value>,
    /// The failing listener
    pub listener: Option<Callback>,
    /// The emitter that dispatched the event
    pub emitter: Emitter,
}

impl Emitter {
    /// Triggers an event.
    ///
    /// Listeners run synchronously in a fixed order: exact-name listeners,
    /// then matching pattern listeners, then `all` listeners (which receive the
    /// event name as first argument). Each group fires in registration order,
    /// from a snapshot taken before the first listener runs, so listeners
    /// added or removed during delivery only affect later triggers.
    ///
    /// A listener failure (error, panic, failed async result) is routed to the
    /// error handler and never stops delivery. The only error returned here is
    /// a schema rejecting the payload, in which case no listener runs.
    ///
    /// With a list of name/value pairs each value is prepended to `args` for
    /// its own name.
    pub fn trigger(
        &self,
        names: impl Into<Names<Value>>,
        args: Vec<Value>,
    ) -> Result<&Self, EmitterError> {
        match expand(names.into()) {
            Expanded::Empty => self.dispatch("", args)?,
            Expanded::Single(name) => self.dispatch(&name, args)?,
            Expanded::Many(entries) => {
                for (name, mapped) in entries {
                    let mut event_args = Vec::with_capacity(args.len() + 1);
                    event_args.extend(mapped);
                    event_args.extend(args.iter().cloned());
                    self.dispatch(&name, event_args)?;
                }
            }
        }
        Ok(self)
    }

    /// Alias of [`trigger`](Self::trigger).
    pub fn emit(
        &self,
        names: impl Into<Names<Value>>,
        args: Vec<Value>,
    ) -> Result<&Self, EmitterError> {
        self.trigger(names, args)
    }

    /// Alias of [`trigger`](Self::trigger).
    pub fn produce(
        &self,
        names: impl Into<Names<Value>>,
        args: Vec<Value>,
    ) -> Result<&Self, EmitterError> {
        self.trigger(names, args)
    }

    fn dispatch(&self, event: &str, args: Vec<Value>) -> Result<(), EmitterError> {
        let validation = self.registry().settings.validation_for(event);
        let args = match validation {
            Some((schema, validator)) => normalize_args(&schema, &validator, event, args)?,
            None => args,
        };

        let snapshot = self.registry().snapshot(event);
        if snapshot.len() == 0 {
            trace!("📭 No listeners for '{}' on emitter {}", event, self.id());
            return Ok(());
        }
        trace!("📤 Emitting '{}' to up to {} listeners", event, snapshot.len());

        for entry in &snapshot.exact {
            self.deliver(event, &args, &args, &entry.callback, &entry.bound);
        }

        if !snapshot.patterns.is_empty() {
            let segments = split_name(event, &snapshot.namespace_delimiter);
            for entry in &snapshot.patterns {
                if entry.pattern.matches(&segments, &snapshot.wildcard) {
                    let listener = &entry.listener;
                    self.deliver(event, &args, &args, &listener.callback, &listener.bound);
                }
            }
        }

        if !snapshot.all.is_empty() {
            let mut all_args = Vec::with_capacity(args.len() + 1);
            all_args.push(Value::String(event.to_string()));
            all_args.extend(args.iter().cloned());
            for entry in &snapshot.all {
                self.deliver(event, &all_args, &args, &entry.callback, &entry.bound);
            }
        }

        Ok(())
    }

    /// Invokes one listener in isolation. `reported` are the arguments
    /// handed to the error handler on failure.
    fn deliver(
        &self,
        event: &str,
        args: &[Value],
        reported: &[Value],
        listener: &Callback,
        bound: &Context,
    ) {
        let call = Call {
            event,
            args,
            this: bound,
            emitter: self,
        };
        match panic::catch_unwind(AssertUnwindSafe(|| listener.invoke(&call))) {
            Ok(Ok(Reply::Done)) => {}
            Ok(Ok(Reply::Pending(pending))) => self.observe(pending, event, reported, listener),
            Ok(Err(e)) => self.report(ListenerError::Failed(e), event, reported, Some(listener)),
            Err(panic_info) => self.report(
                ListenerError::Panicked(panic_message(panic_info)),
                event,
                reported,
                Some(listener),
            ),
        }
    }

    /// Watches a pending listener result on the ambient runtime; only its
    /// failure is of interest.
    fn observe(
        &self,
        pending: BoxFuture<'static, anyhow::Result<()>>,
        event: &str,
        args: &[Value],
        listener: &Callback,
    ) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                drop(pending);
                self.report(ListenerError::Detached, event, args, Some(listener));
                return;
            }
        };

        let emitter = self.clone();
        let event = event.to_string();
        let args = args.to_vec();
        let listener = listener.clone();
        handle.spawn(async move {
            let error = match AssertUnwindSafe(pending).catch_unwind().await {
                Ok(Ok(())) => return,
                Ok(Err(e)) => ListenerError::Rejected(e),
                Err(panic_info) => ListenerError::Panicked(panic_message(panic_info)),
            };
            emitter.report(error, &event, &args, Some(&listener));
        });
    }

    /// Routes a listener failure to the error handler. A failing handler is
    /// silenced.
    pub(crate) fn report(
        &self,
        error: ListenerError,
        event: &str,
        args: &[Value],
        listener: Option<&Callback>,
    ) {
        debug!("❌ Listener for '{}' on emitter {} failed: {}", event, self.id(), error);

        let handler = self.registry().settings.on_error.clone();
        let Some(handler) = handler else {
            return;
        };
        let meta = ErrorMeta {
            event: event.to_string(),
            args: args.to_vec(),
            listener: listener.cloned(),
            emitter: self.clone(),
        };
        let _ = panic::catch_unwind(AssertUnwindSafe(|| handler(&error, &meta)));
    }
}
