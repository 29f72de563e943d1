//! The async store interface consumed by the core.

use crate::entry::{GraphEntry, GraphWrite, WriterId};
use crate::error::Result;
use crate::path::GraphPath;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::warn;

/// The eventually-consistent graph the core reads and writes through.
///
/// Implementations assign the timestamp used for last-writer-wins and
/// deliver every observed write - own-origin and remote, live and tombstone -
/// to subscribers. No ordering is guaranteed across writers; within one
/// writer's causal chain the writer's own order is preserved.
///
/// Consumers must treat re-delivery of already-seen data as a no-op and
/// recompute derived state from snapshots rather than folding event values.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Write a value or tombstone at a path.
    async fn put(&self, path: GraphPath, write: GraphWrite, writer: &WriterId) -> Result<()>;

    /// Read the current entry at a path. `None` means never written;
    /// a tombstoned entry is returned with its tombstone.
    async fn get(&self, path: &GraphPath) -> Result<Option<GraphEntry>>;

    /// Read all current entries under a prefix, sorted by path.
    async fn get_tree(&self, prefix: &GraphPath) -> Result<Vec<GraphEntry>>;

    /// Subscribe to every write observed under a prefix.
    fn subscribe_tree(&self, prefix: &GraphPath) -> GraphSubscription;
}

/// A live subscription to a subtree of the graph.
pub struct GraphSubscription {
    prefix: GraphPath,
    rx: broadcast::Receiver<GraphEntry>,
}

impl GraphSubscription {
    /// Wrap a broadcast receiver, filtering to the given prefix.
    pub fn new(prefix: GraphPath, rx: broadcast::Receiver<GraphEntry>) -> Self {
        Self { prefix, rx }
    }

    /// The subscribed prefix.
    pub fn prefix(&self) -> &GraphPath {
        &self.prefix
    }

    /// Receive the next write under the prefix.
    ///
    /// Returns `None` once the store side is gone. A lagged receiver skips
    /// the missed events and keeps going: handlers recompute from snapshots,
    /// so a dropped wake-up is recoverable and a later event re-triggers it.
    pub async fn recv(&mut self) -> Option<GraphEntry> {
        loop {
            match self.rx.recv().await {
                Ok(entry) => {
                    if entry.path.starts_with(&self.prefix) {
                        return Some(entry);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(prefix = %self.prefix, missed, "subscription lagged, resyncing from snapshot");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
