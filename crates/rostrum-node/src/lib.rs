//! Rostrum client node.
//!
//! Wires the core components to their external collaborators through an
//! explicit [`Context`] object - store, identity, calendar, notification
//! dispatcher - so every dependency can be swapped for a test double.
//! There is no module-level global state.
//!
//! # Architecture
//!
//! - **Providers**: [`IdentityProvider`] and [`CalendarProvider`] boundary
//!   traits; calendar failures degrade to "no data", never abort scheduling
//! - **Watchers**: subscription-driven loops that re-derive interest
//!   thresholds and scheduling consensus on every observed write
//! - **Optimistic projection**: [`OptimisticCell`] applies local writes
//!   immediately and reconciles with the authoritative store echo

pub mod config;
pub mod context;
pub mod error;
pub mod optimistic;
pub mod providers;
pub mod watchers;

pub use config::NodeConfig;
pub use context::Context;
pub use error::{Error, Result};
pub use optimistic::OptimisticCell;
pub use providers::{
    CalendarError, CalendarEvent, CalendarProvider, IdentityProvider, NullCalendar,
    StaticIdentity,
};
pub use watchers::{ConsensusWatcher, InterestWatcher};
