//! Graph entry types.

use crate::path::GraphPath;
use serde::{Deserialize, Serialize};

/// Stable identifier of a writer, attached to every write.
///
/// Opaque to the core - supplied by the identity provider and stable across
/// sessions so that interest and vote records de-duplicate per human.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WriterId(String);

impl WriterId {
    /// Wrap a raw identity token.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WriterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WriterId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A signed-in user as seen by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable writer id
    pub id: WriterId,
    /// Display name
    pub name: String,
    /// Contact email
    pub email: String,
}

impl Identity {
    /// Create an identity.
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: WriterId::new(id),
            name: name.into(),
            email: email.into(),
        }
    }
}

/// A write payload: a JSON value or an explicit tombstone.
///
/// A tombstone is a logical delete that still occupies the path, so that
/// "deleted" and "never written" stay distinguishable to every observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphWrite {
    /// A live value
    Value(serde_json::Value),
    /// Logical delete marker
    Tombstone,
}

impl GraphWrite {
    /// Whether this write is a tombstone.
    pub fn is_tombstone(&self) -> bool {
        matches!(self, GraphWrite::Tombstone)
    }

    /// The live value, if any.
    pub fn value(&self) -> Option<&serde_json::Value> {
        match self {
            GraphWrite::Value(v) => Some(v),
            GraphWrite::Tombstone => None,
        }
    }
}

impl From<serde_json::Value> for GraphWrite {
    fn from(v: serde_json::Value) -> Self {
        GraphWrite::Value(v)
    }
}

/// A timestamped write observed at a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEntry {
    /// The path written
    pub path: GraphPath,
    /// Value or tombstone
    pub write: GraphWrite,
    /// Store-assigned unix timestamp in milliseconds (for last-writer-wins)
    pub timestamp_ms: u64,
    /// Identity of the writer
    pub writer: WriterId,
}

impl GraphEntry {
    /// Create an entry.
    pub fn new(path: GraphPath, write: GraphWrite, timestamp_ms: u64, writer: WriterId) -> Self {
        Self {
            path,
            write,
            timestamp_ms,
            writer,
        }
    }

    /// The live value, if this entry is not a tombstone.
    pub fn live_value(&self) -> Option<&serde_json::Value> {
        self.write.value()
    }

    /// Whether this entry is newer than another.
    pub fn is_newer_than(&self, other: &Self) -> bool {
        self.timestamp_ms > other.timestamp_ms
    }

    /// Last-writer-wins merge: adopt `incoming` iff it is newer.
    /// Returns true if self was replaced.
    pub fn merge(&mut self, incoming: Self) -> bool {
        if incoming.is_newer_than(self) {
            *self = incoming;
            true
        } else {
            false
        }
    }
}
