//! Topic record - a proposed presentation and its lifecycle state.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use rostrum_store::{GraphPath, WriterId};
use serde::{Deserialize, Serialize};

/// Lifecycle stage of a topic. Monotonic non-decreasing per topic id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Stage {
    /// Stage 1: collecting expressions of interest
    Gathering,
    /// Stage 2: interest threshold met, negotiating a time
    ReadyToSchedule,
    /// Stage 3: a time is confirmed
    Scheduled,
}

impl Stage {
    /// Numeric stage as stored in the graph.
    pub fn as_u8(self) -> u8 {
        self.into()
    }

    /// The next stage, if any.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Gathering => Some(Stage::ReadyToSchedule),
            Stage::ReadyToSchedule => Some(Stage::Scheduled),
            Stage::Scheduled => None,
        }
    }
}

impl From<Stage> for u8 {
    fn from(stage: Stage) -> u8 {
        match stage {
            Stage::Gathering => 1,
            Stage::ReadyToSchedule => 2,
            Stage::Scheduled => 3,
        }
    }
}

impl TryFrom<u8> for Stage {
    type Error = String;

    fn try_from(raw: u8) -> std::result::Result<Self, String> {
        match raw {
            1 => Ok(Stage::Gathering),
            2 => Ok(Stage::ReadyToSchedule),
            3 => Ok(Stage::Scheduled),
            other => Err(format!("unknown stage {other}")),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Whether a topic is a single session or a repeating one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionType {
    OneTime,
    Recurring,
}

/// Cadence for recurring sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    Weekly,
    Biweekly,
    Monthly,
}

fn default_window_days() -> u32 {
    14
}

fn default_consensus_threshold() -> u8 {
    75
}

fn default_lock_after() -> u32 {
    3
}

fn default_count_owner_votes() -> bool {
    true
}

/// Per-topic scheduling knobs, owner-controlled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Look-ahead window for candidate slots, in days.
    #[serde(default = "default_window_days")]
    pub window_days: u32,

    /// Minimum percentage of voters selecting the same slot for automatic
    /// confirmation. Valid range 50-100.
    #[serde(default = "default_consensus_threshold")]
    pub consensus_threshold_percent: u8,

    /// Number of voters with at least one selection after which slot
    /// regeneration locks. At least 1.
    #[serde(default = "default_lock_after")]
    pub lock_after_selections: u32,

    /// Whether the topic owner's own preference counts toward consensus
    /// totals. The owner is always excluded from interest counting; this
    /// knob only affects the scheduling pool.
    #[serde(default = "default_count_owner_votes")]
    pub count_owner_votes: bool,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            consensus_threshold_percent: default_consensus_threshold(),
            lock_after_selections: default_lock_after(),
            count_owner_votes: default_count_owner_votes(),
        }
    }
}

/// A community presentation topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    /// Opaque globally-unique id, generated at creation
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// Longer description
    pub description: Option<String>,

    /// Presenter display name
    pub presenter_name: String,

    /// Presenter contact email
    pub presenter_email: Option<String>,

    /// Writer identity of the creator; owner-only fields require this writer
    pub owner: WriterId,

    /// Non-creator interest count required to reach stage 2
    pub min_participants: u32,

    /// Optional attendance cap
    pub max_participants: Option<u32>,

    /// Session length in minutes
    pub duration_minutes: u32,

    /// One-time or recurring
    pub session_type: SessionType,

    /// Cadence, present iff recurring
    pub recurrence: Option<Recurrence>,

    /// Lifecycle stage, monotonic
    pub stage: Stage,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Confirmed meeting time, present iff stage 3
    pub scheduled_time: Option<DateTime<Utc>>,

    /// Scheduling knobs
    #[serde(default)]
    pub scheduling: SchedulingConfig,
}

impl Topic {
    /// Graph key prefix for topic records.
    pub const STORE_PREFIX: &'static str = "topic";

    /// Graph path of a topic record.
    pub fn store_path(id: &str) -> GraphPath {
        GraphPath::from_segments(&[Self::STORE_PREFIX, id])
    }

    /// Generate a topic id from its title and creation time.
    pub fn generate_id(title: &str, created_at: DateTime<Utc>) -> String {
        let seed = format!("{}:{}", title, created_at.timestamp_millis());
        let hash = blake3::hash(seed.as_bytes());
        hex::encode(&hash.as_bytes()[..16])
    }

    /// Validate field invariants.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::Validation("title must not be empty".into()));
        }
        if self.min_participants < 1 {
            return Err(Error::Validation("min_participants must be at least 1".into()));
        }
        if let Some(max) = self.max_participants {
            if max < self.min_participants {
                return Err(Error::Validation(
                    "max_participants must be at least min_participants".into(),
                ));
            }
        }
        if self.duration_minutes == 0 {
            return Err(Error::Validation("duration_minutes must be positive".into()));
        }
        match (self.session_type, self.recurrence) {
            (SessionType::Recurring, None) => {
                return Err(Error::Validation(
                    "recurring topics require a recurrence".into(),
                ));
            }
            (SessionType::OneTime, Some(_)) => {
                return Err(Error::Validation(
                    "one-time topics must not set a recurrence".into(),
                ));
            }
            _ => {}
        }
        if !(50..=100).contains(&self.scheduling.consensus_threshold_percent) {
            return Err(Error::Validation(
                "consensus_threshold_percent must be within 50-100".into(),
            ));
        }
        if self.scheduling.lock_after_selections < 1 {
            return Err(Error::Validation(
                "lock_after_selections must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Request body for creating a topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTopic {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub presenter_name: String,
    #[serde(default)]
    pub presenter_email: Option<String>,
    pub min_participants: u32,
    #[serde(default)]
    pub max_participants: Option<u32>,
    pub duration_minutes: u32,
    pub session_type: SessionType,
    #[serde(default)]
    pub recurrence: Option<Recurrence>,
    #[serde(default)]
    pub scheduling: Option<SchedulingConfig>,
}

/// Partial update of owner-controlled fields.
///
/// `None` leaves a field untouched; stage, owner, and the interest/vote
/// sub-records are never writable through a patch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopicPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub presenter_name: Option<String>,
    #[serde(default)]
    pub presenter_email: Option<String>,
    #[serde(default)]
    pub min_participants: Option<u32>,
    #[serde(default)]
    pub max_participants: Option<u32>,
    #[serde(default)]
    pub scheduling: Option<SchedulingConfig>,
}
