//! Dependency-injection context.

use crate::config::NodeConfig;
use crate::error::Result;
use crate::providers::{CalendarProvider, IdentityProvider};
use chrono::{Duration, Utc};
use rostrum_notify::{Notification, NotificationDispatcher, NotificationKind};
use rostrum_scheduling::{
    invert_availability, ConsensusEngine, ParticipantSchedule, TimeSlot, TimeWindow,
};
use rostrum_store::{GraphStore, WriterId};
use rostrum_topics::{live_interests, Interest, InterestAggregator, Topic, TopicStateMachine};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::warn;

/// Everything a Rostrum client needs, passed explicitly.
///
/// One context per signed-in identity; components built from it write as
/// that identity. All collaborators sit behind traits so tests can inject
/// doubles.
#[derive(Clone)]
pub struct Context {
    pub store: Arc<dyn GraphStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub calendar: Arc<dyn CalendarProvider>,
    pub dispatcher: Arc<dyn NotificationDispatcher>,
    pub config: NodeConfig,
}

impl Context {
    /// Assemble a context.
    pub fn new(
        store: Arc<dyn GraphStore>,
        identity: Arc<dyn IdentityProvider>,
        calendar: Arc<dyn CalendarProvider>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        config: NodeConfig,
    ) -> Self {
        Self {
            store,
            identity,
            calendar,
            dispatcher,
            config,
        }
    }

    /// The local writer id.
    pub fn local_writer(&self) -> WriterId {
        self.identity.current_identity().id
    }

    /// A state machine writing as the local identity.
    pub fn machine(&self) -> TopicStateMachine {
        TopicStateMachine::new(self.store.clone(), self.local_writer())
    }

    /// An interest aggregator for this context.
    pub fn aggregator(&self) -> InterestAggregator {
        InterestAggregator::new(self.store.clone(), self.machine())
            .with_settle(self.config.settle)
    }

    /// A consensus engine for this context.
    pub fn engine(&self) -> ConsensusEngine {
        ConsensusEngine::new(
            self.store.clone(),
            self.machine(),
            self.dispatcher.clone(),
            self.local_writer(),
        )
        .with_settle(self.config.settle)
    }

    /// The scheduling pool for a topic: everyone with a live interest
    /// record plus everyone who already submitted a preference.
    pub async fn participant_pool(&self, topic_id: &str) -> Result<BTreeSet<WriterId>> {
        let interests = self.store.get_tree(&Interest::prefix(topic_id)).await?;
        let mut pool: BTreeSet<WriterId> = live_interests(&interests)
            .into_iter()
            .map(|(writer, _)| writer)
            .collect();
        for (writer, _) in self.engine().load_preferences(topic_id).await? {
            pool.insert(writer);
        }
        Ok(pool)
    }

    /// Assemble per-participant busy schedules for a topic.
    ///
    /// Busy data comes from the external calendar, degraded to empty on
    /// failure (with an availability nudge to the affected participant),
    /// combined with the inversion of any manually declared availability.
    pub async fn participant_schedules(&self, topic: &Topic) -> Result<Vec<ParticipantSchedule>> {
        let horizon_start = Utc::now();
        let horizon_end = horizon_start + Duration::days(topic.scheduling.window_days as i64);
        let horizon = TimeWindow::new(horizon_start, horizon_end);

        let preferences: std::collections::BTreeMap<_, _> = self
            .engine()
            .load_preferences(&topic.id)
            .await?
            .into_iter()
            .collect();

        let mut schedules = Vec::new();
        for writer in self.participant_pool(&topic.id).await? {
            let mut busy = match self
                .calendar
                .busy_windows(&writer, horizon_start, horizon_end)
                .await
            {
                Ok(windows) => windows,
                Err(err) => {
                    // Calendar failures degrade to "no data" - scheduling
                    // proceeds, the participant is nudged to declare
                    // availability by hand.
                    warn!(participant = %writer, %err, "calendar lookup failed, assuming open");
                    self.dispatcher
                        .notify(Notification::new(
                            writer.clone(),
                            NotificationKind::AvailabilityNeeded,
                            topic.id.clone(),
                            topic.title.clone(),
                            "Calendar data is unavailable; please declare your availability"
                                .to_string(),
                        ))
                        .await;
                    Vec::new()
                }
            };
            if let Some(preference) = preferences.get(&writer) {
                busy.extend(invert_availability(&preference.availability, horizon));
            }
            schedules.push(ParticipantSchedule { writer, busy });
        }
        Ok(schedules)
    }

    /// Generate and publish slots for a topic from fresh busy data.
    pub async fn regenerate_slots(&self, topic_id: &str) -> Result<Vec<TimeSlot>> {
        let topic = self.machine().load_topic(topic_id).await?;
        let schedules = self.participant_schedules(&topic).await?;
        Ok(self
            .engine()
            .regenerate_slots(topic_id, Utc::now(), &schedules)
            .await?)
    }

    /// Re-check published slots against fresh calendar data.
    ///
    /// A slot conflicts when a voter who selected it is no longer free for
    /// it. Conflicting slots get `invalidated_at` set and their voters a
    /// [`NotificationKind::SlotInvalidated`] message.
    pub async fn revalidate_slots(&self, topic_id: &str) -> Result<Vec<TimeSlot>> {
        let topic = self.machine().load_topic(topic_id).await?;
        let engine = self.engine();
        let schedules = self.participant_schedules(&topic).await?;
        let preferences = engine.load_preferences(topic_id).await?;

        let mut invalidated = Vec::new();
        for slot in engine.load_slots(topic_id).await? {
            if slot.invalidated_at.is_some() {
                continue;
            }
            let voters: Vec<&WriterId> = preferences
                .iter()
                .filter(|(_, p)| p.selected_slot_ids.contains(&slot.id))
                .map(|(writer, _)| writer)
                .collect();
            let conflicted = voters.iter().any(|voter| {
                schedules
                    .iter()
                    .find(|s| s.writer == **voter)
                    .map(|s| !s.is_free(&slot.window()))
                    .unwrap_or(false)
            });
            if !conflicted {
                continue;
            }

            let slot = engine.invalidate_slot(topic_id, &slot.id).await?;
            let message = format!(
                "The {} slot for \"{}\" now conflicts with a calendar entry",
                slot.start.format("%Y-%m-%d %H:%M UTC"),
                topic.title
            );
            for voter in voters {
                self.dispatcher
                    .notify(Notification::new(
                        voter.clone(),
                        NotificationKind::SlotInvalidated,
                        topic_id,
                        topic.title.clone(),
                        message.clone(),
                    ))
                    .await;
            }
            invalidated.push(slot);
        }
        Ok(invalidated)
    }
}
