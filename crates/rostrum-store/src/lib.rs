//! Rostrum graph store - eventually-consistent key/value graph.
//!
//! The store is the only shared mutable resource in a Rostrum deployment.
//! Any number of clients read and write the same topic sub-graph with no
//! coordinator; conflicts resolve field-level by last-writer-wins on the
//! store-assigned timestamp. Deletion is a tombstone write, distinct from
//! a path that was never written.
//!
//! # Core Types
//!
//! - [`GraphPath`] - hierarchical `/`-separated key
//! - [`GraphWrite`] - a value or an explicit tombstone
//! - [`GraphEntry`] - a timestamped write with its writer identity
//! - [`GraphStore`] - the async store interface consumed by the core
//! - [`MemoryGraphStore`] - in-memory reference store and test double
//!
//! # Snapshot Collection
//!
//! [`collect_tree`] waits for a subtree to go quiet before snapshotting it.
//! The quiet window is a heuristic for replication latency, not a protocol
//! guarantee - see [`SettleConfig`].

pub mod entry;
pub mod error;
pub mod memory;
pub mod path;
pub mod settle;
pub mod store;

pub use entry::{GraphEntry, GraphWrite, Identity, WriterId};
pub use error::{Error, Result};
pub use memory::MemoryGraphStore;
pub use path::GraphPath;
pub use settle::{collect_tree, SettleConfig};
pub use store::{GraphStore, GraphSubscription};
