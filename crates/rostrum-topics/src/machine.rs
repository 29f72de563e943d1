//! Topic lifecycle state machine.

use crate::error::{Error, Result};
use crate::models::{NewTopic, Stage, Topic, TopicPatch};
use chrono::Utc;
use rostrum_store::{GraphPath, GraphStore, Identity, WriterId};
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of a stage advance.
#[derive(Debug, Clone, PartialEq)]
pub enum StageTransition {
    /// The topic moved to the target stage.
    Advanced(Topic),
    /// The topic was already at the target stage; re-firing is a no-op.
    AlreadyAt(Stage),
}

/// Owns topic validation and stage transitions.
///
/// Transitions are idempotent and monotonic: the current stage is always
/// re-read from the store before deciding, so a stale writer cannot
/// re-assert an old stage after another writer advanced it.
#[derive(Clone)]
pub struct TopicStateMachine {
    store: Arc<dyn GraphStore>,
    local: WriterId,
}

impl TopicStateMachine {
    /// Create a state machine writing as the given local identity.
    pub fn new(store: Arc<dyn GraphStore>, local: WriterId) -> Self {
        Self { store, local }
    }

    /// Create a topic at stage 1, owned by `owner`.
    pub async fn create_topic(&self, owner: &Identity, fields: NewTopic) -> Result<Topic> {
        let created_at = Utc::now();
        let topic = Topic {
            id: Topic::generate_id(&fields.title, created_at),
            title: fields.title,
            description: fields.description,
            presenter_name: fields.presenter_name,
            presenter_email: fields.presenter_email,
            owner: owner.id.clone(),
            min_participants: fields.min_participants,
            max_participants: fields.max_participants,
            duration_minutes: fields.duration_minutes,
            session_type: fields.session_type,
            recurrence: fields.recurrence,
            stage: Stage::Gathering,
            created_at,
            scheduled_time: None,
            scheduling: fields.scheduling.unwrap_or_default(),
        };
        topic.validate()?;
        self.write_topic(&topic, &owner.id).await?;
        info!(topic = %topic.id, owner = %topic.owner, "topic created");
        Ok(topic)
    }

    /// Load the current topic record from the store.
    pub async fn load_topic(&self, topic_id: &str) -> Result<Topic> {
        let entry = self
            .store
            .get(&Topic::store_path(topic_id))
            .await?
            .ok_or_else(|| Error::NotFound(topic_id.to_string()))?;
        let value = entry
            .live_value()
            .ok_or_else(|| Error::NotFound(topic_id.to_string()))?;
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Apply owner-controlled field updates.
    pub async fn update_topic(
        &self,
        caller: &Identity,
        topic_id: &str,
        patch: TopicPatch,
    ) -> Result<Topic> {
        let mut topic = self.load_topic(topic_id).await?;
        if topic.owner != caller.id {
            return Err(Error::Authorization(format!(
                "topic {topic_id} is owned by {}",
                topic.owner
            )));
        }

        if let Some(title) = patch.title {
            topic.title = title;
        }
        if let Some(description) = patch.description {
            topic.description = Some(description);
        }
        if let Some(name) = patch.presenter_name {
            topic.presenter_name = name;
        }
        if let Some(email) = patch.presenter_email {
            topic.presenter_email = Some(email);
        }
        if let Some(min) = patch.min_participants {
            topic.min_participants = min;
        }
        if let Some(max) = patch.max_participants {
            topic.max_participants = Some(max);
        }
        if let Some(scheduling) = patch.scheduling {
            topic.scheduling = scheduling;
        }

        topic.validate()?;
        self.write_topic(&topic, &caller.id).await?;
        Ok(topic)
    }

    /// Advance a topic to `target`.
    ///
    /// Decides against the store's current value, never a local cache.
    /// Regressions and skips are rejected; re-firing at the current stage is
    /// an idempotent no-op so concurrent writers crossing a threshold
    /// "simultaneously" all converge.
    pub async fn advance_stage(
        &self,
        topic_id: &str,
        target: Stage,
        cause: &str,
    ) -> Result<StageTransition> {
        let mut topic = self.load_topic(topic_id).await?;

        if target == topic.stage {
            debug!(topic = %topic_id, stage = %target, cause, "stage advance re-fired, no-op");
            return Ok(StageTransition::AlreadyAt(target));
        }
        if target < topic.stage || Some(target) != topic.stage.next() {
            return Err(Error::InvalidTransition {
                from: topic.stage,
                to: target,
            });
        }
        if target == Stage::Scheduled && topic.scheduled_time.is_none() {
            return Err(Error::Validation(
                "cannot reach stage 3 without a scheduled time".into(),
            ));
        }

        topic.stage = target;
        self.write_topic(&topic, &self.local).await?;
        info!(topic = %topic_id, stage = %target, cause, "stage advanced");
        Ok(StageTransition::Advanced(topic))
    }

    /// Record a confirmed meeting time on the topic.
    ///
    /// Written before the 2→3 advance so the store's current value carries
    /// the scheduled time when the transition is validated.
    pub async fn set_scheduled_time(
        &self,
        topic_id: &str,
        scheduled_time: chrono::DateTime<Utc>,
    ) -> Result<Topic> {
        let mut topic = self.load_topic(topic_id).await?;
        topic.scheduled_time = Some(scheduled_time);
        self.write_topic(&topic, &self.local).await?;
        Ok(topic)
    }

    /// Path of a topic record (convenience for subscribers).
    pub fn topic_path(topic_id: &str) -> GraphPath {
        Topic::store_path(topic_id)
    }

    async fn write_topic(&self, topic: &Topic, writer: &WriterId) -> Result<()> {
        let value = serde_json::to_value(topic)?;
        self.store
            .put(Topic::store_path(&topic.id), value.into(), writer)
            .await?;
        Ok(())
    }
}
