//! Notification record.

use chrono::{DateTime, Utc};
use rostrum_store::{GraphPath, WriterId};
use serde::{Deserialize, Serialize};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A published slot was found to conflict with fresh calendar data
    SlotInvalidated,
    /// Enough voters agreed on one slot
    ConsensusReached,
    /// A meeting time was confirmed
    Scheduled,
    /// The recipient has not voted on slots yet
    PreferenceNeeded,
    /// No calendar data is available for the recipient
    AvailabilityNeeded,
}

/// A message for one recipient about one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique id
    pub id: String,

    /// Recipient identity
    pub recipient: WriterId,

    /// Event type
    pub kind: NotificationKind,

    /// Topic the event belongs to
    pub topic_id: String,

    /// Topic title at dispatch time
    pub topic_title: String,

    /// Human-readable message
    pub message: String,

    /// Whether the recipient has seen it
    #[serde(default)]
    pub read: bool,

    /// Dispatch time
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Graph key prefix for per-user records.
    pub const STORE_PREFIX: &'static str = "user";

    /// Build a notification, deriving its id from the dispatch facts.
    pub fn new(
        recipient: WriterId,
        kind: NotificationKind,
        topic_id: impl Into<String>,
        topic_title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let topic_id = topic_id.into();
        let created_at = Utc::now();
        let id = Self::generate_id(&recipient, &topic_id, kind, created_at);
        Self {
            id,
            recipient,
            kind,
            topic_id,
            topic_title: topic_title.into(),
            message: message.into(),
            read: false,
            created_at,
        }
    }

    /// Derive an id from recipient, topic, kind, and time.
    pub fn generate_id(
        recipient: &WriterId,
        topic_id: &str,
        kind: NotificationKind,
        created_at: DateTime<Utc>,
    ) -> String {
        let seed = format!(
            "{}:{}:{:?}:{}",
            recipient,
            topic_id,
            kind,
            created_at.timestamp_millis()
        );
        let hash = blake3::hash(seed.as_bytes());
        hex::encode(&hash.as_bytes()[..16])
    }

    /// Graph prefix of a recipient's inbox.
    pub fn prefix(recipient: &WriterId) -> GraphPath {
        GraphPath::from_segments(&[Self::STORE_PREFIX, recipient.as_str(), "notification"])
    }

    /// Graph path of one notification record.
    pub fn store_path(recipient: &WriterId, id: &str) -> GraphPath {
        Self::prefix(recipient).child(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_compose() {
        let bob = WriterId::new("bob");
        assert_eq!(Notification::prefix(&bob).as_str(), "user/bob/notification");
        assert_eq!(
            Notification::store_path(&bob, "n1").as_str(),
            "user/bob/notification/n1"
        );
    }

    #[test]
    fn new_notification_is_unread() {
        let n = Notification::new(
            WriterId::new("bob"),
            NotificationKind::Scheduled,
            "t1",
            "Ownership in Rust",
            "Scheduled for Tuesday 14:00",
        );
        assert!(!n.read);
        assert!(!n.id.is_empty());
    }

    #[test]
    fn serialize_roundtrip() {
        let n = Notification::new(
            WriterId::new("bob"),
            NotificationKind::PreferenceNeeded,
            "t1",
            "Ownership in Rust",
            "Pick your slots",
        );
        let json = serde_json::to_string(&n).unwrap();
        let parsed: Notification = serde_json::from_str(&json).unwrap();
        assert_eq!(n, parsed);
        assert!(json.contains("preference_needed"));
    }
}
