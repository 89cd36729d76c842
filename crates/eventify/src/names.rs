//! Event name handling.
//!
//! Every public operation accepts its event name as [`Names`]: a single name,
//! a whitespace-separated list of names, or a name-to-value mapping. The
//! boundary form is normalized by [`expand`] into single names before any
//! registry logic runs, and each single name is then classified as exact or
//! pattern by [`is_pattern`].

/// Pseudo-event that receives every triggered event.
pub const ALL: &str = "all";

/// Default delimiter between hierarchical name segments.
pub const DEFAULT_NAMESPACE_DELIMITER: &str = "/";

/// Default token standing for one (or, in last position, several) segments.
pub const DEFAULT_WILDCARD: &str = "*";

/// Event name(s) as accepted at the public boundary.
///
/// `V` is what a mapping entry carries: a [`Callback`](crate::Callback) for
/// registration and removal, a [`serde_json::Value`] for triggering (the
/// value is prepended to the trigger arguments).
#[derive(Debug, Clone)]
pub enum Names<V> {
    /// One name, or several separated by whitespace. Empty means "no name".
    Text(String),
    /// Name-to-value pairs, each handled as its own call
    Map(Vec<(String, V)>),
}

impl<V> Names<V> {
    /// True when no name was given at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Names::Text(text) => text.is_empty(),
            Names::Map(_) => false,
        }
    }
}

impl<V> From<&str> for Names<V> {
    fn from(name: &str) -> Self {
        Names::Text(name.to_string())
    }
}

impl<V> From<&String> for Names<V> {
    fn from(name: &String) -> Self {
        Names::Text(name.clone())
    }
}

impl<V> From<String> for Names<V> {
    fn from(name: String) -> Self {
        Names::Text(name)
    }
}

impl<K: Into<String>, V> From<Vec<(K, V)>> for Names<V> {
    fn from(entries: Vec<(K, V)>) -> Self {
        Names::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl<K: Into<String>, V, const N: usize> From<[(K, V); N]> for Names<V> {
    fn from(entries: [(K, V); N]) -> Self {
        Names::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Result of normalizing a [`Names`] value.
#[derive(Debug)]
pub(crate) enum Expanded<V> {
    /// No name was given
    Empty,
    /// Exactly one plain name, no mapped value
    Single(String),
    /// Several names, each with the mapped value if it came from a mapping
    Many(Vec<(String, Option<V>)>),
}

/// Normalizes the boundary form into single names.
///
/// Whitespace splitting takes precedence over pattern classification, and a
/// mapping key that itself holds several names expands the same way.
pub(crate) fn expand<V: Clone>(names: Names<V>) -> Expanded<V> {
    match names {
        Names::Text(text) => {
            if text.is_empty() {
                Expanded::Empty
            } else if text.contains(char::is_whitespace) {
                Expanded::Many(
                    split_names(&text)
                        .into_iter()
                        .map(|name| (name.to_string(), None))
                        .collect(),
                )
            } else {
                Expanded::Single(text)
            }
        }
        Names::Map(entries) => {
            let mut expanded = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                for name in split_names(&key) {
                    expanded.push((name.to_string(), Some(value.clone())));
                }
            }
            Expanded::Many(expanded)
        }
    }
}

/// Splits a whitespace-separated name list.
///
/// A run of whitespace is one separator. Leading or trailing whitespace
/// leaves an empty name at that end, which `trigger` dispatches and
/// registration skips.
fn split_names(text: &str) -> Vec<&str> {
    let mut names = Vec::new();
    if text.starts_with(char::is_whitespace) {
        names.push("");
    }
    names.extend(text.split_whitespace());
    if text.ends_with(char::is_whitespace) {
        names.push("");
    }
    if names.is_empty() {
        names.push(text);
    }
    names
}

/// Splits an event name into its hierarchical segments.
///
/// An empty delimiter disables splitting: the whole name is one segment.
pub fn split_name<'a>(name: &'a str, delimiter: &str) -> Vec<&'a str> {
    if delimiter.is_empty() {
        vec![name]
    } else {
        name.split(delimiter).collect()
    }
}

/// Whether `name` is a pattern subscription rather than an exact one.
///
/// An empty wildcard token disables patterns entirely; otherwise a name is a
/// pattern iff at least one of its segments is exactly the token.
pub fn is_pattern(name: &str, wildcard: &str, delimiter: &str) -> bool {
    if wildcard.is_empty() || !name.contains(wildcard) {
        return false;
    }
    split_name(name, delimiter)
        .into_iter()
        .any(|segment| segment == wildcard)
}
