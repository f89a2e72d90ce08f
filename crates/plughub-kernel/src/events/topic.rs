//! Topic patterns with single-segment wildcards.
//!
//! Topics are `.`-separated segments (`user.login`, `build.module.done`). A
//! `*` segment matches exactly one arbitrary segment. Patterns are compiled
//! once at subscription time.

use std::fmt;

/// A compiled topic pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicPattern {
    /// Matches one topic verbatim.
    Exact(String),
    /// Segment list where `None` is a `*` wildcard.
    Wildcard {
        /// Original pattern text.
        source: String,
        /// Compiled segments.
        segments: Vec<Option<String>>,
    },
}

impl TopicPattern {
    /// Compiles a topic or pattern.
    pub fn compile(topic: &str) -> Self {
        if !topic.split('.').any(|segment| segment == "*") {
            return Self::Exact(topic.to_string());
        }

        let segments = topic
            .split('.')
            .map(|segment| (segment != "*").then(|| segment.to_string()))
            .collect();

        Self::Wildcard {
            source: topic.to_string(),
            segments,
        }
    }

    /// Whether this pattern contains a wildcard.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard { .. })
    }

    /// The pattern text as registered.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Exact(topic) => topic,
            Self::Wildcard { source, .. } => source,
        }
    }

    /// Whether `topic` matches this pattern.
    pub fn matches(&self, topic: &str) -> bool {
        match self {
            Self::Exact(exact) => exact == topic,
            Self::Wildcard { segments, .. } => {
                let mut parts = topic.split('.');
                for expected in segments {
                    match (expected, parts.next()) {
                        (_, None) => return false,
                        (None, Some(part)) if part.is_empty() => return false,
                        (None, Some(_)) => {}
                        (Some(expected), Some(part)) if expected != part => return false,
                        (Some(_), Some(_)) => {}
                    }
                }
                parts.next().is_none()
            }
        }
    }
}

impl fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
