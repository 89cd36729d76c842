/// Pull-style consumption of events as an asynchronous stream
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll, Waker};

use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::trace;

use super::core::{Emitter, WeakEmitter};
use crate::listener::{Callback, CallbackId, Reply};
use crate::names::ALL;

/// Options for [`Emitter::iterate`].
#[derive(Debug, Clone, Default)]
pub struct IterateOptions {
    /// Closes the stream when cancelled
    pub signal: Option<CancellationToken>,
}

impl IterateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }
}

#[derive(Default)]
struct Inbox {
    queue: VecDeque<Value>,
    waker: Option<Waker>,
    done: bool,
}

impl Inbox {
    /// Marks the stream finished, discarding anything still queued.
    fn finish(&mut self) -> Option<Waker> {
        self.done = true;
        self.queue.clear();
        self.waker.take()
    }
}

fn finish(inbox: &Mutex<Inbox>) {
    let waker = inbox.lock().finish();
    if let Some(waker) = waker {
        waker.wake();
    }
}

struct Subscription {
    emitter: WeakEmitter,
    event: String,
    callback: CallbackId,
}

/// Events of one name (or of the `all` channel) as an unbounded stream.
///
/// Each delivery yields one value: the single argument if exactly one was
/// passed, otherwise the argument array. On the `all` channel the value is
/// always the array `[name, ...args]`. Values triggered before they are
/// consumed are buffered without limit.
///
/// The stream ends when [`close`](Self::close) is called, when the
/// cancellation signal fires, or when it is dropped. Values still buffered
/// at that point are discarded. A fired signal unregisters the listener even
/// if the stream is never polled again: right away when a Tokio runtime is
/// running, otherwise on the next delivery.
pub struct EventStream {
    inbox: Arc<Mutex<Inbox>>,
    subscription: Option<Subscription>,
    cancelled: Option<Pin<Box<WaitForCancellationFutureOwned>>>,
    watcher: Option<JoinHandle<()>>,
}

impl EventStream {
    /// Next value, or `None` once the stream is closed.
    pub async fn recv(&mut self) -> Option<Value> {
        self.next().await
    }

    /// Closes the stream and unregisters its listener. Idempotent.
    pub fn close(&mut self) {
        finish(&self.inbox);
        self.cancelled = None;
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
        if let Some(subscription) = self.subscription.take() {
            if let Some(emitter) = subscription.emitter.upgrade() {
                emitter.remove_listeners(None, Some(subscription.callback), None);
            }
            trace!("🛑 Closed event stream for '{}'", subscription.event);
        }
    }

    /// Whether the stream has ended.
    pub fn is_closed(&self) -> bool {
        self.inbox.lock().done
    }
}

impl Stream for EventStream {
    type Item = Value;

    fn poll_next(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Value>> {
        let this = self.get_mut();

        let signalled = this
            .cancelled
            .as_mut()
            .is_some_and(|cancelled| cancelled.as_mut().poll(cx).is_ready());
        if signalled {
            this.close();
            return Poll::Ready(None);
        }

        let mut inbox = this.inbox.lock();
        if let Some(value) = inbox.queue.pop_front() {
            return Poll::Ready(Some(value));
        }
        if inbox.done {
            return Poll::Ready(None);
        }
        inbox.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inbox = self.inbox.lock();
        f.debug_struct("EventStream")
            .field("event", &self.subscription.as_ref().map(|s| s.event.as_str()))
            .field("queued", &inbox.queue.len())
            .field("done", &inbox.done)
            .finish()
    }
}

impl Emitter {
    /// Consumes `event` (or `all`) as an asynchronous stream.
    ///
    /// ```rust
    /// use eventify::{Emitter, IterateOptions};
    /// use serde_json::json;
    ///
    /// # async fn example() -> Result<(), eventify::EmitterError> {
    /// let emitter = Emitter::new();
    /// let mut ticks = emitter.iterate("tick", IterateOptions::default());
    /// emitter.trigger("tick", vec![json!(1)])?;
    /// assert_eq!(ticks.recv().await, Some(json!(1)));
    /// # Ok(())
    /// # }
    /// ```
    pub fn iterate(&self, event: &str, options: IterateOptions) -> EventStream {
        let inbox = Arc::new(Mutex::new(Inbox::default()));

        if options.signal.as_ref().is_some_and(CancellationToken::is_cancelled) {
            inbox.lock().done = true;
            return EventStream {
                inbox,
                subscription: None,
                cancelled: None,
                watcher: None,
            };
        }

        let all = event == ALL;
        let id = CallbackId::next();
        let sink = Arc::clone(&inbox);
        let signal = options.signal.clone();
        let callback = Callback::with_id(id, move |call| {
            if signal.as_ref().is_some_and(CancellationToken::is_cancelled) {
                finish(&sink);
                call.emitter().remove_listeners(None, Some(id), None);
                return Ok(Reply::Done);
            }
            let args = call.args();
            let value = if !all && args.len() == 1 {
                args[0].clone()
            } else {
                Value::Array(args.to_vec())
            };

            let waker = {
                let mut inbox = sink.lock();
                if inbox.done {
                    return Ok(Reply::Done);
                }
                inbox.queue.push_back(value);
                inbox.waker.take()
            };
            if let Some(waker) = waker {
                waker.wake();
            }
            Ok(Reply::Done)
        });

        self.on(event, Some(&callback), None);
        trace!("🔁 Iterating '{}' on emitter {}", event, self.id());

        let watcher = options
            .signal
            .as_ref()
            .and_then(|signal| self.unsubscribe_on_cancel(signal.clone(), &inbox, id));

        EventStream {
            inbox,
            subscription: Some(Subscription {
                emitter: self.downgrade(),
                event: event.to_string(),
                callback: id,
            }),
            cancelled: options
                .signal
                .map(|signal| Box::pin(signal.cancelled_owned())),
            watcher,
        }
    }

    /// Closes the inbox and drops listener `id` as soon as `signal` fires.
    /// Needs an ambient Tokio runtime; without one the listener cleans up
    /// after itself on its next delivery.
    fn unsubscribe_on_cancel(
        &self,
        signal: CancellationToken,
        inbox: &Arc<Mutex<Inbox>>,
        id: CallbackId,
    ) -> Option<JoinHandle<()>> {
        let handle = tokio::runtime::Handle::try_current().ok()?;
        let emitter = self.downgrade();
        let inbox = Arc::clone(inbox);
        Some(handle.spawn(async move {
            signal.cancelled_owned().await;
            finish(&inbox);
            if let Some(emitter) = emitter.upgrade() {
                emitter.remove_listeners(None, Some(id), None);
            }
        }))
    }
}
