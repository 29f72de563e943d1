//! Notifications for Rostrum.
//!
//! The core hands finished [`Notification`] records to a
//! [`NotificationDispatcher`] and moves on - dispatch is fire-and-forget,
//! delivery mechanics live behind the trait. Three sinks are provided: a
//! tracing logger, an in-memory test double, and a store-backed inbox that
//! persists records with a read flag.

pub mod dispatch;
pub mod error;
pub mod model;

pub use dispatch::{MemoryDispatcher, NotificationDispatcher, StoreDispatcher, TracingDispatcher};
pub use error::{Error, Result};
pub use model::{Notification, NotificationKind};
