//! Subscription-driven watchers.
//!
//! Each watcher subscribes to one subtree and re-derives its decision on
//! every observed write - own-origin, remote, or re-delivered. Handlers are
//! idempotent recomputations over snapshots, so delivery order and
//! duplication never change the outcome.

use crate::context::Context;
use crate::providers::CalendarEvent;
use chrono::Duration;
use rostrum_notify::{Notification, NotificationKind};
use rostrum_scheduling::SchedulingPreference;
use rostrum_topics::{live_interests, Interest, Topic};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Watches a topic's interest subtree and drives the 1→2 transition.
pub struct InterestWatcher {
    ctx: Context,
    topic_id: String,
}

impl InterestWatcher {
    /// Create a watcher for one topic.
    pub fn new(ctx: Context, topic_id: impl Into<String>) -> Self {
        Self {
            ctx,
            topic_id: topic_id.into(),
        }
    }

    /// Spawn the watch loop.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Consume interest events until the subscription closes.
    pub async fn run(self) {
        let mut sub = self.ctx.store.subscribe_tree(&Interest::prefix(&self.topic_id));
        while let Some(entry) = sub.recv().await {
            let _ = entry; // wake-up only; state is recomputed from a snapshot
            if let Err(err) = self.evaluate().await {
                error!(topic = %self.topic_id, %err, "interest evaluation failed");
            }
        }
    }

    /// One idempotent evaluation pass.
    pub async fn evaluate(&self) -> crate::error::Result<()> {
        let aggregator = self.ctx.aggregator();
        if aggregator.evaluate_threshold(&self.topic_id).await?.is_some() {
            let topic = self.ctx.machine().load_topic(&self.topic_id).await?;
            info!(topic = %self.topic_id, "interest threshold met");
            self.nudge_voters(&topic).await?;
        }
        Ok(())
    }

    /// Ask everyone interested to pick slots, now that voting is open.
    async fn nudge_voters(&self, topic: &Topic) -> crate::error::Result<()> {
        let entries = self
            .ctx
            .store
            .get_tree(&Interest::prefix(&self.topic_id))
            .await?;
        for (writer, _) in live_interests(&entries) {
            self.ctx
                .dispatcher
                .notify(Notification::new(
                    writer,
                    NotificationKind::PreferenceNeeded,
                    topic.id.clone(),
                    topic.title.clone(),
                    format!("\"{}\" is ready to schedule - pick your slots", topic.title),
                ))
                .await;
        }
        Ok(())
    }
}

/// Watches a topic's preference subtree: persists the lock high-water mark
/// and auto-confirms once consensus is reached.
pub struct ConsensusWatcher {
    ctx: Context,
    topic_id: String,
}

impl ConsensusWatcher {
    /// Create a watcher for one topic.
    pub fn new(ctx: Context, topic_id: impl Into<String>) -> Self {
        Self {
            ctx,
            topic_id: topic_id.into(),
        }
    }

    /// Spawn the watch loop.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Consume preference events until the subscription closes.
    pub async fn run(self) {
        let mut sub = self
            .ctx
            .store
            .subscribe_tree(&SchedulingPreference::prefix(&self.topic_id));
        while let Some(entry) = sub.recv().await {
            let _ = entry;
            if let Err(err) = self.evaluate().await {
                error!(topic = %self.topic_id, %err, "consensus evaluation failed");
            }
        }
    }

    /// One idempotent evaluation pass.
    pub async fn evaluate(&self) -> crate::error::Result<()> {
        let engine = self.ctx.engine();

        // Remote votes arrive without going through record_vote here, so
        // the high-water mark is refreshed on every observed change.
        engine.refresh_lock(&self.topic_id).await?;

        if let Some(topic) = engine.evaluate_consensus(&self.topic_id).await? {
            self.create_calendar_event(&topic).await;
        }
        Ok(())
    }

    /// Best-effort calendar event for the confirmed session.
    async fn create_calendar_event(&self, topic: &Topic) {
        let Some(start) = topic.scheduled_time else {
            return;
        };
        let attendees = match self.ctx.engine().load_preferences(&topic.id).await {
            Ok(preferences) => preferences
                .into_iter()
                .map(|(_, p): (_, SchedulingPreference)| p.email)
                .filter(|email| !email.is_empty())
                .collect(),
            Err(err) => {
                warn!(topic = %topic.id, %err, "could not load attendees for calendar event");
                Vec::new()
            }
        };
        let event = CalendarEvent {
            summary: topic.title.clone(),
            description: topic.description.clone().unwrap_or_default(),
            start,
            end: start + Duration::minutes(topic.duration_minutes as i64),
            attendees,
        };
        if let Err(err) = self.ctx.calendar.create_event(event).await {
            // Degraded mode: the session is scheduled either way.
            warn!(topic = %topic.id, %err, "calendar event creation failed");
        }
    }
}
