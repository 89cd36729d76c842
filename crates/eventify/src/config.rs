//! Emitter configuration.
//!
//! [`EmitterOptions`] is what `create`, `enable` and [`Emitter::configure`]
//! accept. Options can be supplied once at creation or merged in later: every
//! field that is set overrides the current value, fields left unset never
//! reset anything.
//!
//! The serialisable part of the configuration lives in [`EmitterConfig`],
//! which can be loaded from TOML:
//!
//! ```toml
//! namespace_delimiter = "."
//! wildcard = "#"
//! ```
//!
//! [`Emitter::configure`]: crate::Emitter::configure

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::emitter::ErrorMeta;
use crate::error::{ConfigError, ListenerError};
use crate::names::{DEFAULT_NAMESPACE_DELIMITER, DEFAULT_WILDCARD};
use crate::schema::{default_schema_validator, Schema, SchemaMap, ValidationMeta, Validator};

/// Receives listener failures. Must not rely on being able to fail: a
/// panicking handler is silenced.
pub type ErrorHandler = Arc<dyn Fn(&ListenerError, &ErrorMeta) + Send + Sync>;

fn default_namespace_delimiter() -> String {
    DEFAULT_NAMESPACE_DELIMITER.to_string()
}

fn default_wildcard() -> String {
    DEFAULT_WILDCARD.to_string()
}

/// Serialisable emitter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitterConfig {
    /// Separator between hierarchical name segments; empty disables splitting
    #[serde(default = "default_namespace_delimiter")]
    pub namespace_delimiter: String,
    /// Whole-segment wildcard token; empty disables pattern subscriptions
    #[serde(default = "default_wildcard")]
    pub wildcard: String,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            namespace_delimiter: default_namespace_delimiter(),
            wildcard: default_wildcard(),
        }
    }
}

impl EmitterConfig {
    /// Parses settings from a TOML document. Missing keys take defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }
}

/// Options for creating or reconfiguring an emitter.
#[derive(Clone, Default)]
pub struct EmitterOptions {
    pub schemas: Option<SchemaMap>,
    pub validate: Option<Validator>,
    pub on_error: Option<ErrorHandler>,
    pub namespace_delimiter: Option<String>,
    pub wildcard: Option<String>,
}

impl EmitterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a schema for one event name.
    pub fn schema(mut self, event: impl Into<String>, schema: Schema) -> Self {
        self.schemas
            .get_or_insert_with(SchemaMap::new)
            .insert(event.into(), schema);
        self
    }

    /// Replaces the whole schema map.
    pub fn schemas(mut self, schemas: SchemaMap) -> Self {
        self.schemas = Some(schemas);
        self
    }

    /// Installs a custom validator.
    pub fn validate<F>(mut self, validate: F) -> Self
    where
        F: Fn(&Schema, serde_json::Value, &ValidationMeta<'_>) -> anyhow::Result<serde_json::Value>
            + Send
            + Sync
            + 'static,
    {
        self.validate = Some(Arc::new(validate));
        self
    }

    /// Installs the listener error handler.
    pub fn on_error<F>(mut self, on_error: F) -> Self
    where
        F: Fn(&ListenerError, &ErrorMeta) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(on_error));
        self
    }

    pub fn namespace_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.namespace_delimiter = Some(delimiter.into());
        self
    }

    pub fn wildcard(mut self, wildcard: impl Into<String>) -> Self {
        self.wildcard = Some(wildcard.into());
        self
    }
}

impl From<EmitterConfig> for EmitterOptions {
    fn from(config: EmitterConfig) -> Self {
        Self::new()
            .namespace_delimiter(config.namespace_delimiter)
            .wildcard(config.wildcard)
    }
}

impl fmt::Debug for EmitterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmitterOptions")
            .field("schemas", &self.schemas.as_ref().map(|s| s.len()))
            .field("validate", &self.validate.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("namespace_delimiter", &self.namespace_delimiter)
            .field("wildcard", &self.wildcard)
            .finish()
    }
}

/// Effective settings of one emitter.
pub(crate) struct Settings {
    pub namespace_delimiter: String,
    pub wildcard: String,
    pub schemas: Option<SchemaMap>,
    pub validate: Option<Validator>,
    pub on_error: Option<ErrorHandler>,
}

impl Settings {
    pub fn new(options: EmitterOptions) -> Self {
        let mut settings = Self {
            namespace_delimiter: default_namespace_delimiter(),
            wildcard: default_wildcard(),
            schemas: None,
            validate: None,
            on_error: None,
        };
        settings.merge(options);
        settings
    }

    /// Field-by-field override with every option that is set.
    pub fn merge(&mut self, options: EmitterOptions) {
        if let Some(schemas) = options.schemas {
            self.schemas = Some(schemas);
        }
        if let Some(validate) = options.validate {
            self.validate = Some(validate);
        }
        if let Some(on_error) = options.on_error {
            self.on_error = Some(on_error);
        }
        if let Some(delimiter) = options.namespace_delimiter {
            self.namespace_delimiter = delimiter;
        }
        if let Some(wildcard) = options.wildcard {
            self.wildcard = wildcard;
        }
    }

    /// Schema and validator applying to `event`, if any.
    pub fn validation_for(&self, event: &str) -> Option<(Schema, Validator)> {
        let schema = self.schemas.as_ref()?.get(event)?.clone();
        let validator = self
            .validate
            .clone()
            .unwrap_or_else(|| Arc::new(default_schema_validator));
        Some((schema, validator))
    }
}
