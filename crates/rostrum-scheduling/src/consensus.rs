//! Pure consensus predicates.
//!
//! Everything here is a function of a snapshot - no counters, no memory -
//! so any two observers tallying the same records reach the same verdict
//! regardless of the order the records arrived in. The one deliberate
//! exception is the generation lock, which feeds a *persisted* high-water
//! mark through [`is_generation_locked`] precisely because the live count
//! can shrink.

use crate::models::{SchedulingLock, SchedulingPreference, TimeSlot};
use rostrum_store::{GraphEntry, WriterId};
use rostrum_topics::Topic;
use tracing::warn;

/// Tally of one topic's scheduling votes.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusProgress {
    /// The slot with the most votes, ties broken by generation order
    pub top_slot: Option<TimeSlot>,
    /// Votes on the top slot
    pub top_slot_votes: usize,
    /// round(100 × top votes / total), 0 when nobody voted
    pub top_slot_percentage: u8,
    /// Whether the configured threshold is met
    pub consensus_reached: bool,
    /// Voters with at least one selected slot
    pub participants_voted: usize,
    /// Distinct voters with any live preference
    pub total_participants: usize,
}

/// Parse the live preference records out of a snapshot.
///
/// The writer id comes from the path key; a malformed body is logged and
/// skipped so one corrupt record never blocks the tally.
pub fn live_preferences(entries: &[GraphEntry]) -> Vec<(WriterId, SchedulingPreference)> {
    entries
        .iter()
        .filter_map(|entry| {
            let value = entry.live_value()?;
            let writer = WriterId::new(entry.path.last_segment());
            match serde_json::from_value::<SchedulingPreference>(value.clone()) {
                Ok(pref) => Some((writer, pref)),
                Err(err) => {
                    warn!(path = %entry.path, %err, "skipping malformed preference record");
                    None
                }
            }
        })
        .collect()
}

/// Tally votes against the published slot list.
///
/// `slots` must be in generation order (score descending, start ascending):
/// a vote-count tie resolves to the first slot encountered, i.e. the one
/// the generator ranked higher. Invalidated slots are skipped as top-slot
/// candidates. The owner's preference is dropped from the pool when the
/// topic's `count_owner_votes` knob is off.
pub fn consensus_progress(
    topic: &Topic,
    preferences: &[(WriterId, SchedulingPreference)],
    slots: &[TimeSlot],
) -> ConsensusProgress {
    let pool: Vec<&(WriterId, SchedulingPreference)> = preferences
        .iter()
        .filter(|(writer, _)| topic.scheduling.count_owner_votes || *writer != topic.owner)
        .collect();

    let total_participants = pool.len();
    let participants_voted = pool.iter().filter(|(_, p)| p.has_selection()).count();

    let mut top_slot: Option<&TimeSlot> = None;
    let mut top_slot_votes = 0usize;
    for slot in slots.iter().filter(|s| s.invalidated_at.is_none()) {
        let votes = pool
            .iter()
            .filter(|(_, p)| p.selected_slot_ids.contains(&slot.id))
            .count();
        // Strictly-greater keeps the first slot on ties; with no votes at
        // all there is no leader.
        if votes > top_slot_votes {
            top_slot = Some(slot);
            top_slot_votes = votes;
        }
    }

    let top_slot_percentage = percentage(top_slot_votes, total_participants);
    let consensus_reached =
        top_slot.is_some() && top_slot_percentage >= topic.scheduling.consensus_threshold_percent;

    ConsensusProgress {
        top_slot: top_slot.cloned(),
        top_slot_votes,
        top_slot_percentage,
        consensus_reached,
        participants_voted,
        total_participants,
    }
}

/// Voters with at least one selected slot.
pub fn selection_count(preferences: &[(WriterId, SchedulingPreference)]) -> usize {
    preferences.iter().filter(|(_, p)| p.has_selection()).count()
}

/// Whether slot regeneration is locked.
///
/// The live count alone must never decide this: voters clearing their
/// selections would shrink it below the threshold and silently unlock.
/// The persisted lock record is the high-water mark - once present, the
/// answer stays true forever.
pub fn is_generation_locked(
    topic: &Topic,
    preferences: &[(WriterId, SchedulingPreference)],
    stored: Option<&SchedulingLock>,
) -> bool {
    stored.is_some()
        || selection_count(preferences) as u32 >= topic.scheduling.lock_after_selections
}

fn percentage(part: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    (100.0 * part as f64 / total as f64).round() as u8
}
