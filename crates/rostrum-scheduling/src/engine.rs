//! Store-driven consensus engine.

use crate::consensus::{consensus_progress, is_generation_locked, live_preferences, ConsensusProgress};
use crate::error::{Error, Result};
use crate::models::{
    AvailabilityWindow, ParticipantSchedule, SchedulingLock, SchedulingPreference, TimeSlot,
};
use crate::slots::generate_slots;
use chrono::{DateTime, Utc};
use rostrum_notify::{Notification, NotificationDispatcher, NotificationKind};
use rostrum_store::{
    collect_tree, GraphStore, GraphWrite, Identity, SettleConfig, WriterId,
};
use rostrum_topics::{Stage, StageTransition, Topic, TopicStateMachine};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Tallies votes, enforces the generation lock, and confirms slots.
///
/// Stateless between invocations: every decision is recomputed from a fresh
/// store snapshot, with the lock high-water mark persisted in the graph
/// rather than held in memory.
#[derive(Clone)]
pub struct ConsensusEngine {
    store: Arc<dyn GraphStore>,
    machine: TopicStateMachine,
    dispatcher: Arc<dyn NotificationDispatcher>,
    settle: SettleConfig,
    local: WriterId,
}

impl ConsensusEngine {
    /// Create an engine writing as the given local identity.
    pub fn new(
        store: Arc<dyn GraphStore>,
        machine: TopicStateMachine,
        dispatcher: Arc<dyn NotificationDispatcher>,
        local: WriterId,
    ) -> Self {
        Self {
            store,
            machine,
            dispatcher,
            settle: SettleConfig::default(),
            local,
        }
    }

    /// Override the snapshot settle window.
    pub fn with_settle(mut self, settle: SettleConfig) -> Self {
        self.settle = settle;
        self
    }

    /// Replace one identity's vote wholesale.
    ///
    /// The previous selection set is not merged with: the record is the
    /// voter's entire current intent, so last-writer-wins across the
    /// voter's devices yields one coherent set.
    pub async fn record_vote(
        &self,
        topic_id: &str,
        voter: &Identity,
        selected_slot_ids: BTreeSet<String>,
        availability: Vec<AvailabilityWindow>,
    ) -> Result<SchedulingPreference> {
        let preference = SchedulingPreference {
            name: voter.name.clone(),
            email: voter.email.clone(),
            selected_slot_ids,
            availability,
            recorded_at: Utc::now(),
        };
        self.store
            .put(
                SchedulingPreference::store_path(topic_id, &voter.id),
                serde_json::to_value(&preference)?.into(),
                &voter.id,
            )
            .await?;
        debug!(topic = %topic_id, voter = %voter.id, picks = preference.selected_slot_ids.len(), "vote recorded");

        // Persist the lock high-water mark as soon as it trips.
        self.refresh_lock(topic_id).await?;
        Ok(preference)
    }

    /// Published slots in generation order (score descending, start
    /// ascending), the order vote ties resolve by.
    pub async fn load_slots(&self, topic_id: &str) -> Result<Vec<TimeSlot>> {
        let entries = self.store.get_tree(&TimeSlot::prefix(topic_id)).await?;
        let mut slots: Vec<TimeSlot> = entries
            .iter()
            .filter_map(|entry| {
                let value = entry.live_value()?;
                serde_json::from_value(value.clone()).ok()
            })
            .collect();
        slots.sort_by(|a, b| b.score.cmp(&a.score).then(a.start.cmp(&b.start)));
        Ok(slots)
    }

    /// Current live preferences, collected with the settle window.
    pub async fn load_preferences(
        &self,
        topic_id: &str,
    ) -> Result<Vec<(WriterId, SchedulingPreference)>> {
        let entries = collect_tree(
            self.store.as_ref(),
            &SchedulingPreference::prefix(topic_id),
            &self.settle,
        )
        .await?;
        Ok(live_preferences(&entries))
    }

    /// Generate and publish candidate slots for a topic.
    ///
    /// Rejected with [`Error::Locked`] once enough voters have committed:
    /// published slot ids are referenced by existing votes. Replaced slots
    /// are tombstoned so stale ids cannot linger in the graph.
    pub async fn regenerate_slots(
        &self,
        topic_id: &str,
        from: DateTime<Utc>,
        schedules: &[ParticipantSchedule],
    ) -> Result<Vec<TimeSlot>> {
        let topic = self.machine.load_topic(topic_id).await?;
        if self.is_locked(topic_id).await? {
            return Err(Error::Locked(topic_id.to_string()));
        }

        let slots = generate_slots(
            from,
            topic.duration_minutes,
            topic.scheduling.window_days,
            schedules,
        );

        let fresh: BTreeSet<&str> = slots.iter().map(|s| s.id.as_str()).collect();
        for stale in self.load_slots(topic_id).await? {
            if !fresh.contains(stale.id.as_str()) {
                self.store
                    .put(
                        TimeSlot::store_path(topic_id, &stale.id),
                        GraphWrite::Tombstone,
                        &self.local,
                    )
                    .await?;
            }
        }
        for slot in &slots {
            self.store
                .put(
                    TimeSlot::store_path(topic_id, &slot.id),
                    serde_json::to_value(slot)?.into(),
                    &self.local,
                )
                .await?;
        }
        info!(topic = %topic_id, count = slots.len(), "slots published");
        Ok(slots)
    }

    /// Current consensus tally for a topic.
    pub async fn progress(&self, topic_id: &str) -> Result<ConsensusProgress> {
        let topic = self.machine.load_topic(topic_id).await?;
        let preferences = self.load_preferences(topic_id).await?;
        let slots = self.load_slots(topic_id).await?;
        Ok(consensus_progress(&topic, &preferences, &slots))
    }

    /// Whether slot generation is locked for a topic. Monotonic.
    pub async fn is_locked(&self, topic_id: &str) -> Result<bool> {
        let topic = self.machine.load_topic(topic_id).await?;
        let preferences = self.load_preferences(topic_id).await?;
        let stored = self.load_lock(topic_id).await?;
        Ok(is_generation_locked(&topic, &preferences, stored.as_ref()))
    }

    /// Mark a published slot as invalidated by a later calendar check.
    pub async fn invalidate_slot(&self, topic_id: &str, slot_id: &str) -> Result<TimeSlot> {
        let mut slot = self
            .find_slot(topic_id, slot_id)
            .await?
            .ok_or_else(|| Error::UnknownSlot {
                topic: topic_id.to_string(),
                slot: slot_id.to_string(),
            })?;
        if slot.invalidated_at.is_none() {
            slot.invalidated_at = Some(Utc::now());
            self.store
                .put(
                    TimeSlot::store_path(topic_id, &slot.id),
                    serde_json::to_value(&slot)?.into(),
                    &self.local,
                )
                .await?;
        }
        Ok(slot)
    }

    /// Confirm a slot: record the scheduled time, advance to stage 3, and
    /// notify every voter except the confirmer.
    ///
    /// `confirmer` is the owner on the explicit path and `None` on the
    /// automatic consensus path. Confirming an already-scheduled topic is
    /// an idempotent no-op.
    pub async fn confirm_slot(
        &self,
        topic_id: &str,
        slot_id: &str,
        confirmer: Option<&Identity>,
    ) -> Result<Topic> {
        let topic = self.machine.load_topic(topic_id).await?;
        if topic.stage == Stage::Scheduled {
            debug!(topic = %topic_id, "already scheduled, confirm is a no-op");
            return Ok(topic);
        }
        if let Some(identity) = confirmer {
            if identity.id != topic.owner {
                return Err(Error::Authorization(format!(
                    "only the owner may confirm a slot for topic {topic_id}"
                )));
            }
        }

        let slot = self
            .find_slot(topic_id, slot_id)
            .await?
            .ok_or_else(|| Error::UnknownSlot {
                topic: topic_id.to_string(),
                slot: slot_id.to_string(),
            })?;

        self.machine.set_scheduled_time(topic_id, slot.start).await?;
        let cause = if confirmer.is_some() {
            "owner-confirmed"
        } else {
            "consensus-reached"
        };
        let transition = self
            .machine
            .advance_stage(topic_id, Stage::Scheduled, cause)
            .await?;
        let topic = match transition {
            StageTransition::Advanced(topic) => topic,
            StageTransition::AlreadyAt(_) => self.machine.load_topic(topic_id).await?,
        };

        let message = format!(
            "\"{}\" is scheduled for {}",
            topic.title,
            slot.start.format("%Y-%m-%d %H:%M UTC")
        );
        let skip = confirmer.map(|identity| identity.id.clone());
        for (writer, _) in self.load_preferences(topic_id).await? {
            if Some(&writer) == skip.as_ref() {
                continue;
            }
            self.dispatcher
                .notify(Notification::new(
                    writer,
                    NotificationKind::Scheduled,
                    topic_id,
                    topic.title.clone(),
                    message.clone(),
                ))
                .await;
        }
        Ok(topic)
    }

    /// Re-derive consensus from the current snapshot and auto-confirm the
    /// top slot when the threshold is met.
    ///
    /// Safe to call on every observed preference change; re-delivery is a
    /// no-op once the topic is scheduled.
    pub async fn evaluate_consensus(&self, topic_id: &str) -> Result<Option<Topic>> {
        let topic = self.machine.load_topic(topic_id).await?;
        if topic.stage != Stage::ReadyToSchedule {
            return Ok(None);
        }

        let progress = self.progress(topic_id).await?;
        let Some(top_slot) = progress.top_slot.as_ref().filter(|_| progress.consensus_reached)
        else {
            debug!(
                topic = %topic_id,
                percentage = progress.top_slot_percentage,
                needed = topic.scheduling.consensus_threshold_percent,
                "consensus not reached"
            );
            return Ok(None);
        };

        info!(
            topic = %topic_id,
            slot = %top_slot.id,
            votes = progress.top_slot_votes,
            percentage = progress.top_slot_percentage,
            "consensus reached, confirming"
        );
        self.dispatcher
            .notify(Notification::new(
                topic.owner.clone(),
                NotificationKind::ConsensusReached,
                topic_id,
                topic.title.clone(),
                format!(
                    "{} of {} participants agreed on {}",
                    progress.top_slot_votes,
                    progress.total_participants,
                    top_slot.start.format("%Y-%m-%d %H:%M UTC")
                ),
            ))
            .await;
        let confirmed = self.confirm_slot(topic_id, &top_slot.id, None).await?;
        Ok(Some(confirmed))
    }

    async fn find_slot(&self, topic_id: &str, slot_id: &str) -> Result<Option<TimeSlot>> {
        let entry = self
            .store
            .get(&TimeSlot::store_path(topic_id, slot_id))
            .await?;
        Ok(entry
            .and_then(|entry| entry.live_value().cloned())
            .and_then(|value| serde_json::from_value(value).ok()))
    }

    async fn load_lock(&self, topic_id: &str) -> Result<Option<SchedulingLock>> {
        let entry = self.store.get(&SchedulingLock::store_path(topic_id)).await?;
        Ok(entry
            .and_then(|entry| entry.live_value().cloned())
            .and_then(|value| serde_json::from_value(value).ok()))
    }

    /// Persist the lock record the first time the live count trips the
    /// threshold. Never removes it. Called after local votes and by
    /// subscription watchers observing remote ones.
    pub async fn refresh_lock(&self, topic_id: &str) -> Result<bool> {
        if self.load_lock(topic_id).await?.is_some() {
            return Ok(true);
        }
        let topic = self.machine.load_topic(topic_id).await?;
        let preferences = self.load_preferences(topic_id).await?;
        let count = crate::consensus::selection_count(&preferences) as u32;
        if count >= topic.scheduling.lock_after_selections {
            let lock = SchedulingLock {
                locked_at: Utc::now(),
                selections: count,
            };
            self.store
                .put(
                    SchedulingLock::store_path(topic_id),
                    serde_json::to_value(&lock)?.into(),
                    &self.local,
                )
                .await?;
            info!(topic = %topic_id, selections = count, "slot generation locked");
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rostrum_notify::MemoryDispatcher;
    use rostrum_store::MemoryGraphStore;
    use rostrum_topics::{NewTopic, SchedulingConfig, SessionType};

    struct Fixture {
        engine: ConsensusEngine,
        machine: TopicStateMachine,
        dispatcher: Arc<MemoryDispatcher>,
        owner: Identity,
    }

    fn sunday_noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 2, 12, 0, 0).unwrap()
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryGraphStore::new());
        let owner = Identity::new("alice", "Alice", "alice@example.org");
        let machine = TopicStateMachine::new(store.clone(), owner.id.clone());
        let dispatcher = Arc::new(MemoryDispatcher::new());
        let engine = ConsensusEngine::new(
            store.clone(),
            machine.clone(),
            dispatcher.clone(),
            owner.id.clone(),
        )
        .with_settle(SettleConfig::immediate());
        Fixture {
            engine,
            machine,
            dispatcher,
            owner,
        }
    }

    async fn ready_topic(fx: &Fixture, threshold: u8, lock_after: u32) -> Topic {
        let topic = fx
            .machine
            .create_topic(
                &fx.owner,
                NewTopic {
                    title: "Ownership in Rust".into(),
                    description: None,
                    presenter_name: "Alice".into(),
                    presenter_email: None,
                    min_participants: 1,
                    max_participants: None,
                    duration_minutes: 60,
                    session_type: SessionType::OneTime,
                    recurrence: None,
                    scheduling: Some(SchedulingConfig {
                        consensus_threshold_percent: threshold,
                        lock_after_selections: lock_after,
                        ..SchedulingConfig::default()
                    }),
                },
            )
            .await
            .unwrap();
        fx.machine
            .advance_stage(&topic.id, Stage::ReadyToSchedule, "test")
            .await
            .unwrap();
        topic
    }

    fn voter(name: &str) -> Identity {
        Identity::new(name, name, format!("{name}@example.org"))
    }

    fn picks(slots: &[TimeSlot], indices: &[usize]) -> BTreeSet<String> {
        indices.iter().map(|i| slots[*i].id.clone()).collect()
    }

    #[tokio::test]
    async fn regenerate_publishes_and_reloads_in_generation_order() {
        let fx = fixture();
        let topic = ready_topic(&fx, 75, 3).await;

        let published = fx
            .engine
            .regenerate_slots(&topic.id, sunday_noon(), &[])
            .await
            .unwrap();
        let loaded = fx.engine.load_slots(&topic.id).await.unwrap();
        assert_eq!(published, loaded);
    }

    #[tokio::test]
    async fn vote_replaces_wholesale() {
        let fx = fixture();
        let topic = ready_topic(&fx, 75, 3).await;
        let slots = fx
            .engine
            .regenerate_slots(&topic.id, sunday_noon(), &[])
            .await
            .unwrap();
        let bob = voter("bob");

        fx.engine
            .record_vote(&topic.id, &bob, picks(&slots, &[0, 1]), Vec::new())
            .await
            .unwrap();
        fx.engine
            .record_vote(&topic.id, &bob, picks(&slots, &[2]), Vec::new())
            .await
            .unwrap();

        let preferences = fx.engine.load_preferences(&topic.id).await.unwrap();
        assert_eq!(preferences.len(), 1);
        assert_eq!(preferences[0].1.selected_slot_ids, picks(&slots, &[2]));
    }

    #[tokio::test]
    async fn lock_is_a_persisted_high_water_mark() {
        let fx = fixture();
        let topic = ready_topic(&fx, 75, 3).await;
        let slots = fx
            .engine
            .regenerate_slots(&topic.id, sunday_noon(), &[])
            .await
            .unwrap();

        for name in ["bob", "carol", "dave"] {
            fx.engine
                .record_vote(&topic.id, &voter(name), picks(&slots, &[0]), Vec::new())
                .await
                .unwrap();
        }
        assert!(fx.engine.is_locked(&topic.id).await.unwrap());

        // Dave clears his selection; the live count shrinks below the
        // threshold but the persisted record keeps the lock.
        fx.engine
            .record_vote(&topic.id, &voter("dave"), BTreeSet::new(), Vec::new())
            .await
            .unwrap();
        assert!(fx.engine.is_locked(&topic.id).await.unwrap());

        assert!(matches!(
            fx.engine
                .regenerate_slots(&topic.id, sunday_noon(), &[])
                .await,
            Err(Error::Locked(_))
        ));
    }

    #[tokio::test]
    async fn consensus_auto_confirms_and_notifies() {
        let fx = fixture();
        let topic = ready_topic(&fx, 75, 3).await;
        let slots = fx
            .engine
            .regenerate_slots(&topic.id, sunday_noon(), &[])
            .await
            .unwrap();

        // 3 of 4 voters pick the same slot: exactly 75%.
        for name in ["bob", "carol", "dave"] {
            fx.engine
                .record_vote(&topic.id, &voter(name), picks(&slots, &[0]), Vec::new())
                .await
                .unwrap();
        }
        fx.engine
            .record_vote(&topic.id, &voter("erin"), picks(&slots, &[1]), Vec::new())
            .await
            .unwrap();

        let confirmed = fx
            .engine
            .evaluate_consensus(&topic.id)
            .await
            .unwrap()
            .expect("consensus should confirm");
        assert_eq!(confirmed.stage, Stage::Scheduled);
        assert_eq!(confirmed.scheduled_time, Some(slots[0].start));

        // Every voter is notified on the auto path, plus the owner's
        // consensus-reached note.
        let sent = fx.dispatcher.sent().await;
        let scheduled: Vec<_> = sent
            .iter()
            .filter(|n| n.kind == NotificationKind::Scheduled)
            .collect();
        assert_eq!(scheduled.len(), 4);
        assert!(sent
            .iter()
            .any(|n| n.kind == NotificationKind::ConsensusReached
                && n.recipient == fx.owner.id));

        // Re-evaluation after confirmation is a no-op.
        assert!(fx.engine.evaluate_consensus(&topic.id).await.unwrap().is_none());
        assert_eq!(fx.dispatcher.sent().await.len(), sent.len());
    }

    #[tokio::test]
    async fn below_threshold_does_not_confirm() {
        let fx = fixture();
        let topic = ready_topic(&fx, 75, 10).await;
        let slots = fx
            .engine
            .regenerate_slots(&topic.id, sunday_noon(), &[])
            .await
            .unwrap();

        // 2 of 4 = 50% < 75%.
        for name in ["bob", "carol"] {
            fx.engine
                .record_vote(&topic.id, &voter(name), picks(&slots, &[0]), Vec::new())
                .await
                .unwrap();
        }
        for name in ["dave", "erin"] {
            fx.engine
                .record_vote(&topic.id, &voter(name), picks(&slots, &[1]), Vec::new())
                .await
                .unwrap();
        }

        assert!(fx.engine.evaluate_consensus(&topic.id).await.unwrap().is_none());
        assert_eq!(
            fx.machine.load_topic(&topic.id).await.unwrap().stage,
            Stage::ReadyToSchedule
        );
    }

    #[tokio::test]
    async fn owner_confirms_explicitly_and_confirmer_is_skipped() {
        let fx = fixture();
        let topic = ready_topic(&fx, 100, 10).await;
        let slots = fx
            .engine
            .regenerate_slots(&topic.id, sunday_noon(), &[])
            .await
            .unwrap();

        fx.engine
            .record_vote(&topic.id, &fx.owner, picks(&slots, &[0]), Vec::new())
            .await
            .unwrap();
        fx.engine
            .record_vote(&topic.id, &voter("bob"), picks(&slots, &[1]), Vec::new())
            .await
            .unwrap();

        // Non-owner cannot confirm.
        assert!(matches!(
            fx.engine
                .confirm_slot(&topic.id, &slots[0].id, Some(&voter("bob")))
                .await,
            Err(Error::Authorization(_))
        ));

        let confirmed = fx
            .engine
            .confirm_slot(&topic.id, &slots[0].id, Some(&fx.owner))
            .await
            .unwrap();
        assert_eq!(confirmed.stage, Stage::Scheduled);

        let sent = fx.dispatcher.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, WriterId::new("bob"));
        assert_eq!(sent[0].kind, NotificationKind::Scheduled);
    }

    #[tokio::test]
    async fn confirm_unknown_slot_is_rejected() {
        let fx = fixture();
        let topic = ready_topic(&fx, 75, 3).await;

        assert!(matches!(
            fx.engine
                .confirm_slot(&topic.id, "slot-999", Some(&fx.owner))
                .await,
            Err(Error::UnknownSlot { .. })
        ));
    }

    #[tokio::test]
    async fn invalidated_slot_is_skipped_by_consensus() {
        let fx = fixture();
        let topic = ready_topic(&fx, 50, 10).await;
        let slots = fx
            .engine
            .regenerate_slots(&topic.id, sunday_noon(), &[])
            .await
            .unwrap();

        for name in ["bob", "carol"] {
            fx.engine
                .record_vote(&topic.id, &voter(name), picks(&slots, &[0]), Vec::new())
                .await
                .unwrap();
        }
        fx.engine
            .invalidate_slot(&topic.id, &slots[0].id)
            .await
            .unwrap();

        let progress = fx.engine.progress(&topic.id).await.unwrap();
        assert!(progress.top_slot.is_none());
        assert!(!progress.consensus_reached);
    }
}
