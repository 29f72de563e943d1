//! Topic data model.
//!
//! Records are stored as JSON values in the replicated graph, keyed by
//! explicit composite paths:
//!
//! - `topic/{id}` - the [`Topic`] record
//! - `topic/{id}/interest/{writer}` - one [`Interest`] per identity
//!
//! The path key, not the record body, is authoritative for identity:
//! de-duplication and ownership checks always go through the key.

mod interest;
mod topic;

pub use interest::Interest;
pub use topic::{
    NewTopic, Recurrence, SchedulingConfig, SessionType, Stage, Topic, TopicPatch,
};
