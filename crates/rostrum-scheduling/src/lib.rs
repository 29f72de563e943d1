//! Scheduling consensus for Rostrum.
//!
//! Once a topic reaches stage 2, candidate meeting slots are generated on a
//! fixed business-hours grid, scored against participant busy data, and put
//! to a vote. Voting is per-identity with wholesale replacement; consensus
//! and the regeneration lock are recomputed from the full preference
//! snapshot, so every observer converges on the same decision regardless of
//! delivery order. The lock is a persisted high-water mark - once enough
//! voters have committed it never releases, even if selections are later
//! cleared.
//!
//! # Core Types
//!
//! - [`TimeSlot`], [`SchedulingPreference`], [`AvailabilityWindow`]
//! - [`slots::generate_slots`] - deterministic candidate generation
//! - [`consensus`] - pure tally and lock predicates
//! - [`ConsensusEngine`] - store-driven voting, locking, confirmation

pub mod consensus;
pub mod engine;
pub mod error;
pub mod models;
pub mod slots;

pub use consensus::{consensus_progress, is_generation_locked, live_preferences, ConsensusProgress};
pub use engine::ConsensusEngine;
pub use error::{Error, Result};
pub use models::{
    AvailabilitySource, AvailabilityWindow, ParticipantSchedule, SchedulingLock,
    SchedulingPreference, TimeSlot, TimeWindow,
};
pub use slots::{generate_slots, invert_availability};
