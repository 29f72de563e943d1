//! Bounded snapshot collection.

use crate::entry::GraphEntry;
use crate::error::Result;
use crate::path::GraphPath;
use crate::store::GraphStore;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::debug;

/// Tuning for [`collect_tree`].
///
/// Replication gives no "all replicas reported" signal, so snapshot
/// completeness is approximated: the subtree is considered settled once no
/// write arrives for `quiet`, bounded overall by `deadline`. Both are
/// heuristics for propagation latency, not guarantees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleConfig {
    /// How long the subtree must stay write-free to count as settled.
    pub quiet: Duration,
    /// Hard cap on total collection time.
    pub deadline: Duration,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            quiet: Duration::from_millis(200),
            deadline: Duration::from_secs(2),
        }
    }
}

impl SettleConfig {
    /// A config that snapshots immediately, for tests and for callers that
    /// already know the subtree is quiescent.
    pub fn immediate() -> Self {
        Self {
            quiet: Duration::ZERO,
            deadline: Duration::ZERO,
        }
    }
}

/// Snapshot a subtree once it has gone quiet.
///
/// Subscribes before reading so no write slips between the wait and the
/// snapshot, waits until `cfg.quiet` passes without a write under `prefix`
/// (or `cfg.deadline` elapses), then returns the current entries.
pub async fn collect_tree(
    store: &dyn GraphStore,
    prefix: &GraphPath,
    cfg: &SettleConfig,
) -> Result<Vec<GraphEntry>> {
    let mut sub = store.subscribe_tree(prefix);
    let started = Instant::now();

    loop {
        let elapsed = started.elapsed();
        if elapsed >= cfg.deadline {
            break;
        }
        let window = cfg.quiet.min(cfg.deadline - elapsed);
        match timeout(window, sub.recv()).await {
            Ok(Some(entry)) => {
                debug!(path = %entry.path, "write during settle window, extending");
            }
            // Subscription closed: nothing more can arrive.
            Ok(None) => break,
            // Quiet window elapsed without a write.
            Err(_) => break,
        }
    }

    store.get_tree(prefix).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{GraphWrite, WriterId};
    use crate::memory::MemoryGraphStore;
    use serde_json::json;
    use std::sync::Arc;

    fn path(raw: &str) -> GraphPath {
        GraphPath::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn snapshot_after_quiet() {
        let store = Arc::new(MemoryGraphStore::new());
        let writer = WriterId::new("alice");
        store
            .put(path("topic/t1/interest/alice"), json!({}).into(), &writer)
            .await
            .unwrap();

        let cfg = SettleConfig {
            quiet: Duration::from_millis(10),
            deadline: Duration::from_millis(500),
        };
        let tree = collect_tree(store.as_ref(), &path("topic/t1/interest"), &cfg)
            .await
            .unwrap();
        assert_eq!(tree.len(), 1);
    }

    #[tokio::test]
    async fn collects_writes_racing_the_snapshot() {
        let store = Arc::new(MemoryGraphStore::new());
        let writer = WriterId::new("bob");

        let background = Arc::clone(&store);
        let writer2 = writer.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            background
                .put(path("topic/t1/interest/bob"), json!({}).into(), &writer2)
                .await
                .unwrap();
        });

        let cfg = SettleConfig {
            quiet: Duration::from_millis(50),
            deadline: Duration::from_secs(1),
        };
        let tree = collect_tree(store.as_ref(), &path("topic/t1/interest"), &cfg)
            .await
            .unwrap();
        assert_eq!(tree.len(), 1);
    }

    #[tokio::test]
    async fn deadline_caps_a_noisy_subtree() {
        let store = Arc::new(MemoryGraphStore::new());
        let writer = WriterId::new("carol");

        let background = Arc::clone(&store);
        let writer2 = writer.clone();
        let noise = tokio::spawn(async move {
            for i in 0..200u32 {
                background
                    .put(path("topic/t1/interest/carol"), json!(i).into(), &writer2)
                    .await
                    .unwrap();
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        let cfg = SettleConfig {
            quiet: Duration::from_millis(50),
            deadline: Duration::from_millis(150),
        };
        let started = Instant::now();
        let tree = collect_tree(store.as_ref(), &path("topic/t1/interest"), &cfg)
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(tree.len(), 1);
        noise.abort();
    }
}
