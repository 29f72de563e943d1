//! Hierarchical graph paths.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A hierarchical store key, e.g. `topic/{id}/interest/{writer}`.
///
/// Segments are joined by `/`. A path never has empty segments, so prefix
/// checks are segment-aware: `topic/a` is a prefix of `topic/a/interest`
/// but not of `topic/ab`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphPath(String);

impl GraphPath {
    /// Parse a path, rejecting empty or malformed input.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(Error::InvalidPath("empty path".into()));
        }
        if raw.split('/').any(|seg| seg.is_empty()) {
            return Err(Error::InvalidPath(format!("empty segment in '{raw}'")));
        }
        Ok(Self(raw))
    }

    /// Build a path from segments.
    ///
    /// Panics on empty segments; use only with literal or id-shaped input.
    pub fn from_segments(segments: &[&str]) -> Self {
        assert!(!segments.is_empty() && segments.iter().all(|s| !s.is_empty()));
        Self(segments.join("/"))
    }

    /// The raw path string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append a segment, returning a new path.
    pub fn child(&self, segment: &str) -> Self {
        Self(format!("{}/{}", self.0, segment))
    }

    /// Segment-aware prefix test.
    pub fn starts_with(&self, prefix: &GraphPath) -> bool {
        match self.0.strip_prefix(&prefix.0) {
            Some("") => true,
            Some(rest) => rest.starts_with('/'),
            None => false,
        }
    }

    /// The final segment (record key within its parent).
    pub fn last_segment(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl std::fmt::Display for GraphPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_empty() {
        assert!(GraphPath::parse("").is_err());
        assert!(GraphPath::parse("topic//x").is_err());
        assert!(GraphPath::parse("topic/x/").is_err());
    }

    #[test]
    fn prefix_is_segment_aware() {
        let prefix = GraphPath::parse("topic/a").unwrap();
        let deep = GraphPath::parse("topic/a/interest/bob").unwrap();
        let sibling = GraphPath::parse("topic/ab").unwrap();

        assert!(deep.starts_with(&prefix));
        assert!(prefix.starts_with(&prefix));
        assert!(!sibling.starts_with(&prefix));
    }

    #[test]
    fn child_and_last_segment() {
        let path = GraphPath::parse("topic/a").unwrap().child("interest");
        assert_eq!(path.as_str(), "topic/a/interest");
        assert_eq!(path.last_segment(), "interest");
    }
}
