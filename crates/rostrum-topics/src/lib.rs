//! Topic lifecycle for Rostrum.
//!
//! A topic moves through three stages: gathering interest (1), ready to
//! schedule (2), scheduled (3). Stage never decreases. The transition from
//! 1 to 2 is driven by interest aggregation: a pure recomputation over the
//! current snapshot of interest records, so every observer reaches the same
//! decision regardless of delivery order.
//!
//! # Core Types
//!
//! - [`Topic`], [`Stage`], [`SchedulingConfig`] - the topic record
//! - [`Interest`] - a per-identity expression of interest
//! - [`TopicStateMachine`] - validation, owner-only mutation, stage advance
//! - [`InterestAggregator`] - toggle + threshold evaluation

pub mod aggregator;
pub mod error;
pub mod machine;
pub mod models;

pub use aggregator::{distinct_interest_count, live_interests, InterestAggregator, InterestToggle};
pub use error::{Error, Result};
pub use machine::{StageTransition, TopicStateMachine};
pub use models::{
    Interest, NewTopic, Recurrence, SchedulingConfig, SessionType, Stage, Topic, TopicPatch,
};
