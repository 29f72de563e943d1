//! In-memory reference store.

use crate::entry::{GraphEntry, GraphWrite, WriterId};
use crate::error::Result;
use crate::path::GraphPath;
use crate::store::{GraphStore, GraphSubscription};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

const EVENT_CAPACITY: usize = 256;

/// In-memory [`GraphStore`] with last-writer-wins merge and broadcast
/// subscriptions.
///
/// Serves as the reference implementation and as the test double injected
/// into components in place of a real replicated backend. The store clock is
/// monotonic, so writes from one process never tie on timestamp; replicated
/// entries arriving via [`MemoryGraphStore::apply_remote`] keep their origin
/// timestamp.
pub struct MemoryGraphStore {
    entries: RwLock<HashMap<GraphPath, GraphEntry>>,
    events: broadcast::Sender<GraphEntry>,
    clock: AtomicU64,
}

impl MemoryGraphStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            entries: RwLock::new(HashMap::new()),
            events,
            clock: AtomicU64::new(0),
        }
    }

    fn next_timestamp(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.clock
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .map(|last| now.max(last + 1))
            .unwrap_or(now)
    }

    /// Write with an explicit timestamp. Used by tests to script
    /// last-writer-wins races, and by [`Self::apply_remote`].
    pub async fn put_with_timestamp(
        &self,
        path: GraphPath,
        write: GraphWrite,
        writer: &WriterId,
        timestamp_ms: u64,
    ) -> Result<()> {
        let incoming = GraphEntry::new(path, write, timestamp_ms, writer.clone());
        {
            let mut entries = self.entries.write().await;
            match entries.get_mut(&incoming.path) {
                Some(existing) => {
                    if !existing.merge(incoming.clone()) {
                        // Superseded by a later timestamp: last-writer-wins
                        // already resolved it, so log and move on.
                        debug!(
                            path = %incoming.path,
                            incoming = incoming.timestamp_ms,
                            current = existing.timestamp_ms,
                            "stale write dropped"
                        );
                    }
                }
                None => {
                    entries.insert(incoming.path.clone(), incoming.clone());
                }
            }
        }
        // Every observed write fans out, stale ones included; subscribers
        // recompute from snapshots, not from event payloads.
        let _ = self.events.send(incoming);
        Ok(())
    }

    /// Merge an entry received from a remote replica, keeping its origin
    /// timestamp.
    pub async fn apply_remote(&self, entry: GraphEntry) -> Result<()> {
        let writer = entry.writer.clone();
        self.put_with_timestamp(entry.path, entry.write, &writer, entry.timestamp_ms)
            .await
    }

    /// Number of paths ever written (tombstones included).
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store has no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for MemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn put(&self, path: GraphPath, write: GraphWrite, writer: &WriterId) -> Result<()> {
        let ts = self.next_timestamp();
        self.put_with_timestamp(path, write, writer, ts).await
    }

    async fn get(&self, path: &GraphPath) -> Result<Option<GraphEntry>> {
        Ok(self.entries.read().await.get(path).cloned())
    }

    async fn get_tree(&self, prefix: &GraphPath) -> Result<Vec<GraphEntry>> {
        let entries = self.entries.read().await;
        let mut matched: Vec<GraphEntry> = entries
            .values()
            .filter(|e| e.path.starts_with(prefix))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(matched)
    }

    fn subscribe_tree(&self, prefix: &GraphPath) -> GraphSubscription {
        GraphSubscription::new(prefix.clone(), self.events.subscribe())
    }
}
