//! Error types for the event emitter

/// Errors that abort a `trigger` call before any listener runs.
///
/// Listener failures never surface here; they are routed to the emitter's
/// error handler as a [`ListenerError`].
#[derive(Debug, thiserror::Error)]
pub enum EmitterError {
    /// The schema registered for the event rejected the payload
    #[error("Validation failed for event \"{event}\": {reason}")]
    Validation {
        event: String,
        reason: anyhow::Error,
    },

    /// A multi-argument event whose schema did not hand back an array
    #[error("Schema for event \"{event}\" must return an array/tuple for multi-arg events")]
    ShapeMismatch { event: String },
}

/// Failures of a single listener invocation, reported to the error handler.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// The listener returned an error
    #[error("Listener failed: {0}")]
    Failed(anyhow::Error),

    /// The listener panicked
    #[error("Listener panicked: {0}")]
    Panicked(String),

    /// The pending result returned by an async listener resolved to an error
    #[error("Listener rejected: {0}")]
    Rejected(anyhow::Error),

    /// An async listener was triggered outside a Tokio runtime, so its
    /// pending result could not be observed
    #[error("Listener returned a pending result outside of a Tokio runtime")]
    Detached,
}

/// Errors raised while loading emitter configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The TOML document could not be parsed
    #[error("Invalid emitter configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Converts a caught panic payload into a readable message.
pub(crate) fn panic_message(panic_info: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "listener panicked with unknown payload".to_string()
    }
}
