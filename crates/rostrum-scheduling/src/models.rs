//! Scheduling data model.

use chrono::{DateTime, Utc};
use rostrum_store::{GraphPath, WriterId};
use rostrum_topics::Topic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Half-open overlap test: `[a, b)` meets `[c, d)` iff `a < d && c < b`.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Where a declared availability window came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AvailabilitySource {
    ExternalCalendar,
    Manual,
}

/// A window in which a participant declares themselves free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub source: AvailabilitySource,
}

impl AvailabilityWindow {
    /// The window as a plain interval.
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.end)
    }
}

/// One participant's busy intervals, assembled by the caller from calendar
/// data and inverted manual availability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantSchedule {
    pub writer: WriterId,
    pub busy: Vec<TimeWindow>,
}

impl ParticipantSchedule {
    /// A participant with no busy data (fully open).
    pub fn open(writer: WriterId) -> Self {
        Self {
            writer,
            busy: Vec::new(),
        }
    }

    /// Whether the participant is free for the whole of `[start, end)`.
    pub fn is_free(&self, window: &TimeWindow) -> bool {
        !self.busy.iter().any(|busy| busy.overlaps(window))
    }
}

/// A candidate meeting slot published for voting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    /// Deterministic id derived from the start timestamp
    pub id: String,

    /// Slot start
    pub start: DateTime<Utc>,

    /// Slot end (`start + duration`)
    pub end: DateTime<Utc>,

    /// Percent of the participant pool estimated available, 0-100
    pub score: u8,

    /// Set when a later calendar check found a conflict
    #[serde(default)]
    pub invalidated_at: Option<DateTime<Utc>>,
}

impl TimeSlot {
    /// Create a slot; the id is derived from the start timestamp.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, score: u8) -> Self {
        Self {
            id: Self::id_for(start),
            start,
            end,
            score,
            invalidated_at: None,
        }
    }

    /// The deterministic id of a slot starting at `start`.
    pub fn id_for(start: DateTime<Utc>) -> String {
        format!("slot-{}", start.timestamp())
    }

    /// The slot as a plain interval.
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.end)
    }

    /// Graph prefix of a topic's published slots.
    pub fn prefix(topic_id: &str) -> GraphPath {
        Topic::store_path(topic_id).child("scheduling").child("slots")
    }

    /// Graph path of one slot record.
    pub fn store_path(topic_id: &str, slot_id: &str) -> GraphPath {
        Self::prefix(topic_id).child(slot_id)
    }
}

/// One identity's current slot selection and availability.
///
/// A new write replaces the previous record wholesale: selection sets are
/// never merged element-wise, so last-writer-wins resolves concurrent votes
/// from two devices of the same identity to one coherent set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingPreference {
    /// Display name at vote time
    pub name: String,
    /// Contact email
    pub email: String,
    /// Selected slot ids; empty means "voted availability only"
    #[serde(default)]
    pub selected_slot_ids: BTreeSet<String>,
    /// Declared availability windows
    #[serde(default)]
    pub availability: Vec<AvailabilityWindow>,
    /// When this preference was recorded
    pub recorded_at: DateTime<Utc>,
}

impl SchedulingPreference {
    /// Graph prefix of a topic's preferences.
    pub fn prefix(topic_id: &str) -> GraphPath {
        Topic::store_path(topic_id)
            .child("scheduling")
            .child("preferences")
    }

    /// Graph path of one identity's preference record.
    pub fn store_path(topic_id: &str, writer: &WriterId) -> GraphPath {
        Self::prefix(topic_id).child(writer.as_str())
    }

    /// Whether this preference carries at least one selected slot.
    pub fn has_selection(&self) -> bool {
        !self.selected_slot_ids.is_empty()
    }
}

/// Persisted record of the slot-generation lock decision.
///
/// Written the first time enough voters have committed and never removed:
/// the lock must not be re-derived from a live count that can shrink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingLock {
    /// When the lock tripped
    pub locked_at: DateTime<Utc>,
    /// Voter count observed at that moment
    pub selections: u32,
}

impl SchedulingLock {
    /// Graph path of a topic's lock record.
    pub fn store_path(topic_id: &str) -> GraphPath {
        Topic::store_path(topic_id)
            .child("scheduling")
            .child("locked")
    }
}
