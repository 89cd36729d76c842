//! # Eventify
//!
//! An in-process publish/subscribe event emitter with hierarchical wildcard
//! topics, cross-emitter subscription tracking, optional payload schemas and
//! pull-style consumption as an async stream.
//!
//! ## Core Features
//!
//! - **Registration**: `on`, `once` and `off` with single names, whitespace
//!   separated name lists or name/callback mappings
//! - **Wildcard Topics**: patterns such as `/chat/*/message` or `/chat/*`
//!   where the wildcard stands for whole segments only
//! - **The `all` Channel**: receives every event with its name prepended
//! - **Snapshot Dispatch**: listeners added or removed during a trigger only
//!   affect later triggers
//! - **Error Isolation**: failing, panicking or rejected listeners are routed
//!   to an error handler and never stop delivery
//! - **Subscriptions**: `listen_to` / `stop_listening` let one emitter tear
//!   down everything it registered on others
//! - **Schemas**: per-event validation that can also transform payloads
//! - **Async Iteration**: `iterate` turns an event into a [`futures::Stream`]
//!
//! ## Quick Start Example
//!
//! ```rust
//! use eventify::*;
//! use serde_json::json;
//!
//! # fn main() -> Result<(), EmitterError> {
//! let chat = create(EmitterOptions::default());
//!
//! let log = Callback::new(|call| {
//!     println!("{} -> {:?}", call.event(), call.args());
//!     Ok(())
//! });
//!
//! chat.on("/chat/*/message", Some(&log), None)
//!     .on("all", Some(&log), None);
//!
//! chat.trigger("/chat/general/message", vec![json!({ "text": "hi" })])?;
//! # Ok(())
//! # }
//! ```
//!
//! Arbitrary shared values can carry an emitter as well, see [`enable`].
//! A process-wide emitter is always available through [`default_emitter`].

pub mod config;
pub mod emitter;
pub mod error;
pub mod evented;
pub mod listener;
pub mod names;
pub mod pattern;
pub mod schema;

pub use config::{EmitterConfig, EmitterOptions, ErrorHandler};
pub use emitter::{
    create, create as create_emitter, default_emitter, Emitter, EmitterId, ErrorMeta,
    EventStream, IterateOptions, WeakEmitter,
};
pub use error::{ConfigError, EmitterError, ListenerError};
pub use evented::{
    emitter_of, enable, enable as mixin, enable as decorate_with_events, enable_default,
    Evented, Events,
};
pub use listener::{Call, Callback, CallbackId, Context, Reply};
pub use names::{is_pattern, split_name, Names, ALL};
pub use pattern::Pattern;
pub use schema::{default_schema_validator, SafeParse, Schema, SchemaMap, ValidationMeta, Validator};

// Re-exported for listener signatures and cancellation signals
pub use serde_json::Value;
pub use tokio_util::sync::CancellationToken;

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
