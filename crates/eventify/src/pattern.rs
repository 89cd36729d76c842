//! Compiled wildcard patterns and segment matching.
//!
//! A pattern such as `/chat/*/message` or `/chat/*` is split once at
//! registration. Wildcards only ever replace whole segments: a wildcard in
//! the middle stands for exactly one segment, and a wildcard in last position
//! stands for one or more trailing segments.

use compact_str::CompactString;

use crate::names::split_name;

/// A pattern name split into segments at registration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: CompactString,
    segments: Vec<CompactString>,
    trailing_wildcard: bool,
}

impl Pattern {
    /// Compiles `name` with the emitter's current delimiter and wildcard.
    pub fn compile(name: &str, delimiter: &str, wildcard: &str) -> Self {
        let segments: Vec<CompactString> = split_name(name, delimiter)
            .into_iter()
            .map(CompactString::new)
            .collect();
        let trailing_wildcard = segments
            .last()
            .is_some_and(|segment| segment.as_str() == wildcard);
        Self {
            source: CompactString::new(name),
            segments,
            trailing_wildcard,
        }
    }

    /// The pattern as it was registered.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the last segment is the wildcard token.
    pub fn has_trailing_wildcard(&self) -> bool {
        self.trailing_wildcard
    }

    /// Matches the segments of a triggered event.
    ///
    /// With a trailing wildcard the event needs at least one segment beyond
    /// the literal prefix: `/a/b/*` matches `/a/b/c` and `/a/b/c/d` but not
    /// `/a/b`. Without one the segment counts must be equal.
    pub fn matches(&self, event_segments: &[&str], wildcard: &str) -> bool {
        let pattern_len = self.segments.len();
        let event_len = event_segments.len();

        if self.trailing_wildcard {
            if event_len < pattern_len {
                return false;
            }
        } else if event_len != pattern_len {
            return false;
        }

        let checked = if self.trailing_wildcard {
            pattern_len - 1
        } else {
            pattern_len
        };

        self.segments[..checked]
            .iter()
            .zip(event_segments)
            .all(|(segment, event_segment)| {
                segment.as_str() == wildcard || segment.as_str() == *event_segment
            })
    }
}
