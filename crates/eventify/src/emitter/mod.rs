/// Emitter module - registry, registration, dispatch, subscriptions and iteration
mod core;
mod dispatch;
mod handlers;
mod iterate;
mod subscriptions;

pub use self::core::{create, default_emitter, Emitter, EmitterId, WeakEmitter};
pub use dispatch::ErrorMeta;
pub use iterate::{EventStream, IterateOptions};
