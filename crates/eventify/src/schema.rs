//! Optional payload schemas.
//!
//! A schema is a pluggable capability: given a payload it either hands back
//! a (possibly transformed) payload or fails. Two calling conventions are
//! understood by the default validator, a throwing `parse` and a
//! result-returning `safe_parse`. Custom validators receive the schema and
//! may interpret it however they like.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::EmitterError;

/// Outcome of a `safe_parse` style schema.
#[derive(Debug)]
pub enum SafeParse {
    /// The payload is valid; carries the parsed payload
    Success(Value),
    /// The payload is invalid; carries the reason if the schema gave one
    Failure(Option<anyhow::Error>),
}

type ParseFn = dyn Fn(Value) -> anyhow::Result<Value> + Send + Sync;
type SafeParseFn = dyn Fn(Value) -> SafeParse + Send + Sync;

/// A schema attached to one event name.
#[derive(Clone)]
pub enum Schema {
    /// Returns the parsed payload or an error
    Parse(Arc<ParseFn>),
    /// Returns a [`SafeParse`] outcome
    SafeParse(Arc<SafeParseFn>),
}

impl Schema {
    /// Builds a `parse` style schema.
    pub fn parse<F>(f: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Schema::Parse(Arc::new(f))
    }

    /// Builds a `safe_parse` style schema.
    pub fn safe_parse<F>(f: F) -> Self
    where
        F: Fn(Value) -> SafeParse + Send + Sync + 'static,
    {
        Schema::SafeParse(Arc::new(f))
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schema::Parse(_) => f.write_str("Schema::Parse"),
            Schema::SafeParse(_) => f.write_str("Schema::SafeParse"),
        }
    }
}

/// Schemas keyed by exact event name.
pub type SchemaMap = HashMap<String, Schema>;

/// Information handed to a validator alongside the payload.
#[derive(Debug, Clone, Copy)]
pub struct ValidationMeta<'a> {
    pub event: &'a str,
}

/// Validator contract: returns the transformed payload or fails.
pub type Validator =
    Arc<dyn Fn(&Schema, Value, &ValidationMeta<'_>) -> anyhow::Result<Value> + Send + Sync>;

/// Validator used when schemas are configured without a custom one.
pub fn default_schema_validator(
    schema: &Schema,
    payload: Value,
    _meta: &ValidationMeta<'_>,
) -> anyhow::Result<Value> {
    match schema {
        Schema::Parse(parse) => parse(payload),
        Schema::SafeParse(safe_parse) => match safe_parse(payload) {
            SafeParse::Success(data) => Ok(data),
            SafeParse::Failure(Some(error)) => Err(error),
            SafeParse::Failure(None) => Err(anyhow::anyhow!("Schema validation failed")),
        },
    }
}

/// Runs `args` through `schema` and returns the arguments to deliver.
///
/// Zero arguments validate `null` and deliver nothing; one argument is
/// validated on its own; several are validated as one array, and the schema
/// must hand back an array to be spread again.
pub(crate) fn normalize_args(
    schema: &Schema,
    validator: &Validator,
    event: &str,
    args: Vec<Value>,
) -> Result<Vec<Value>, EmitterError> {
    let meta = ValidationMeta { event };
    let validation_error = |reason| EmitterError::Validation {
        event: event.to_string(),
        reason,
    };

    match args.len() {
        0 => {
            validator(schema, Value::Null, &meta).map_err(validation_error)?;
            Ok(Vec::new())
        }
        1 => {
            let payload = args.into_iter().next().unwrap_or(Value::Null);
            let parsed = validator(schema, payload, &meta).map_err(validation_error)?;
            Ok(vec![parsed])
        }
        _ => match validator(schema, Value::Array(args), &meta).map_err(validation_error)? {
            Value::Array(parsed) => Ok(parsed),
            _ => Err(EmitterError::ShapeMismatch {
                event: event.to_string(),
            }),
        },
    }
}
