//! Interest record - one per (topic, identity).

use crate::models::Topic;
use chrono::{DateTime, Utc};
use rostrum_store::{GraphPath, Identity, WriterId};
use serde::{Deserialize, Serialize};

/// An expression of interest in a topic.
///
/// Presence of a live record means "interested"; a tombstone at the same
/// path means "not interested". The writer id in the path is what
/// de-duplicates; name and email are display metadata only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interest {
    /// Display name at the time of the toggle
    pub name: String,
    /// Contact email
    pub email: String,
    /// When the interest was recorded
    pub recorded_at: DateTime<Utc>,
}

impl Interest {
    /// Build a record for an identity.
    pub fn for_identity(who: &Identity, recorded_at: DateTime<Utc>) -> Self {
        Self {
            name: who.name.clone(),
            email: who.email.clone(),
            recorded_at,
        }
    }

    /// Graph prefix of a topic's interest set.
    pub fn prefix(topic_id: &str) -> GraphPath {
        Topic::store_path(topic_id).child("interest")
    }

    /// Graph path of one identity's interest record.
    pub fn store_path(topic_id: &str, writer: &WriterId) -> GraphPath {
        Self::prefix(topic_id).child(writer.as_str())
    }
}
