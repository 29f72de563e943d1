//! External collaborator boundaries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rostrum_scheduling::TimeWindow;
use rostrum_store::{Identity, WriterId};
use thiserror::Error;

/// Supplies the signed-in user. The id must be stable across sessions for
/// the same human, or interest and vote de-duplication breaks.
pub trait IdentityProvider: Send + Sync {
    /// The current identity.
    fn current_identity(&self) -> Identity;
}

/// Fixed identity, for tests and single-user deployments.
pub struct StaticIdentity(Identity);

impl StaticIdentity {
    /// Wrap an identity.
    pub fn new(identity: Identity) -> Self {
        Self(identity)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_identity(&self) -> Identity {
        self.0.clone()
    }
}

/// Calendar failures. All of them degrade to "no calendar data" at the
/// call sites - an expired credential must never abort scheduling.
#[derive(Debug, Error)]
pub enum CalendarError {
    /// The stored credential is no longer valid
    #[error("calendar credential expired")]
    CredentialExpired,

    /// The calendar backend could not be reached
    #[error("calendar unavailable: {0}")]
    Unavailable(String),
}

/// An event to create on confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub summary: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Attendee email addresses
    pub attendees: Vec<String>,
}

/// External calendar lookup and event creation.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Busy intervals for an identity within a range.
    async fn busy_windows(
        &self,
        identity: &WriterId,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> std::result::Result<Vec<TimeWindow>, CalendarError>;

    /// Create a calendar event for a confirmed session.
    async fn create_event(&self, event: CalendarEvent) -> std::result::Result<(), CalendarError>;
}

/// Calendar that knows nothing - every identity is fully open and event
/// creation is a no-op. The degraded-mode stand-in.
pub struct NullCalendar;

#[async_trait]
impl CalendarProvider for NullCalendar {
    async fn busy_windows(
        &self,
        _identity: &WriterId,
        _time_min: DateTime<Utc>,
        _time_max: DateTime<Utc>,
    ) -> std::result::Result<Vec<TimeWindow>, CalendarError> {
        Ok(Vec::new())
    }

    async fn create_event(&self, _event: CalendarEvent) -> std::result::Result<(), CalendarError> {
        Ok(())
    }
}
