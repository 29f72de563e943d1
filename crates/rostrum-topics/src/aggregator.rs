//! Interest aggregation and threshold evaluation.

use crate::error::{Error, Result};
use crate::machine::{StageTransition, TopicStateMachine};
use crate::models::{Interest, Stage};
use chrono::Utc;
use rostrum_store::{
    collect_tree, GraphEntry, GraphStore, GraphWrite, Identity, SettleConfig, WriterId,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of an interest toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterestToggle {
    /// A live record was written.
    Expressed,
    /// The existing record was tombstoned.
    Withdrawn,
}

/// Parse the live interest records out of a snapshot.
///
/// The writer id comes from the path key. A malformed record body is logged
/// and skipped so one corrupt entry never blocks the rest of the count.
pub fn live_interests(entries: &[GraphEntry]) -> Vec<(WriterId, Interest)> {
    entries
        .iter()
        .filter_map(|entry| {
            let value = entry.live_value()?;
            let writer = WriterId::new(entry.path.last_segment());
            match serde_json::from_value::<Interest>(value.clone()) {
                Ok(interest) => Some((writer, interest)),
                Err(err) => {
                    warn!(path = %entry.path, %err, "skipping malformed interest record");
                    None
                }
            }
        })
        .collect()
}

/// Distinct non-owner identities with a live interest record.
///
/// Pure over the snapshot: no independent counter is kept, so any two
/// observers agree for every order of record delivery.
pub fn distinct_interest_count(entries: &[GraphEntry], owner: &WriterId) -> usize {
    live_interests(entries)
        .into_iter()
        .map(|(writer, _)| writer)
        .filter(|writer| writer != owner)
        .collect::<BTreeSet<_>>()
        .len()
}

/// Watches interest records and drives the 1→2 transition.
#[derive(Clone)]
pub struct InterestAggregator {
    store: Arc<dyn GraphStore>,
    machine: TopicStateMachine,
    settle: SettleConfig,
}

impl InterestAggregator {
    /// Create an aggregator over the given store.
    pub fn new(store: Arc<dyn GraphStore>, machine: TopicStateMachine) -> Self {
        Self {
            store,
            machine,
            settle: SettleConfig::default(),
        }
    }

    /// Override the snapshot settle window.
    pub fn with_settle(mut self, settle: SettleConfig) -> Self {
        self.settle = settle;
        self
    }

    /// Flip one identity's interest in a topic.
    ///
    /// Live record → tombstone; tombstoned or absent → fresh record.
    /// Rapid toggles from several devices of the same identity converge by
    /// last-writer-wins; a double-toggle race resolves to whichever write
    /// the store timestamps latest, which is the accepted outcome since a
    /// human only intends their final state.
    pub async fn toggle_interest(&self, topic_id: &str, voter: &Identity) -> Result<InterestToggle> {
        let path = Interest::store_path(topic_id, &voter.id);
        let current = self.store.get(&path).await?;
        let is_live = current
            .as_ref()
            .map(|entry| !entry.write.is_tombstone())
            .unwrap_or(false);

        if is_live {
            self.store
                .put(path, GraphWrite::Tombstone, &voter.id)
                .await?;
            debug!(topic = %topic_id, voter = %voter.id, "interest withdrawn");
            Ok(InterestToggle::Withdrawn)
        } else {
            let record = Interest::for_identity(voter, Utc::now());
            self.store
                .put(path, serde_json::to_value(&record)?.into(), &voter.id)
                .await?;
            debug!(topic = %topic_id, voter = %voter.id, "interest expressed");
            Ok(InterestToggle::Expressed)
        }
    }

    /// Current distinct non-owner interest count for a topic.
    pub async fn interest_count(&self, topic_id: &str) -> Result<usize> {
        let topic = self.machine.load_topic(topic_id).await?;
        let entries = self.store.get_tree(&Interest::prefix(topic_id)).await?;
        Ok(distinct_interest_count(&entries, &topic.owner))
    }

    /// Re-derive the threshold decision from the current snapshot and
    /// advance the topic to stage 2 when met.
    ///
    /// Safe to call on every observed interest change, from any number of
    /// concurrent observers: the advance is idempotent, and a concurrent
    /// advance past stage 2 surfaces as a benign no-op here.
    pub async fn evaluate_threshold(&self, topic_id: &str) -> Result<Option<Stage>> {
        let topic = self.machine.load_topic(topic_id).await?;
        if topic.stage != Stage::Gathering {
            return Ok(None);
        }

        let entries = collect_tree(self.store.as_ref(), &Interest::prefix(topic_id), &self.settle)
            .await?;
        let count = distinct_interest_count(&entries, &topic.owner);
        if (count as u32) < topic.min_participants {
            debug!(topic = %topic_id, count, needed = topic.min_participants, "threshold not met");
            return Ok(None);
        }

        match self
            .machine
            .advance_stage(topic_id, Stage::ReadyToSchedule, "threshold-met")
            .await
        {
            Ok(StageTransition::Advanced(_)) => Ok(Some(Stage::ReadyToSchedule)),
            Ok(StageTransition::AlreadyAt(_)) => Ok(None),
            // A concurrent writer advanced the topic past stage 2 between
            // our load and the advance; the threshold decision stands.
            Err(Error::InvalidTransition { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
