//! Dispatch boundary and sinks.

use crate::error::Result;
use crate::model::Notification;
use async_trait::async_trait;
use rostrum_store::{GraphStore, GraphWrite, WriterId};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

/// External sink the core hands notifications to.
///
/// Fire-and-forget: the core never blocks on delivery confirmation, so
/// implementations swallow failures and log them instead of returning
/// errors.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Dispatch one notification.
    async fn notify(&self, notification: Notification);
}

/// Sink that logs dispatches. The default in deployments without a
/// delivery channel wired up.
pub struct TracingDispatcher;

#[async_trait]
impl NotificationDispatcher for TracingDispatcher {
    async fn notify(&self, notification: Notification) {
        info!(
            recipient = %notification.recipient,
            kind = ?notification.kind,
            topic = %notification.topic_id,
            message = %notification.message,
            "notification dispatched"
        );
    }
}

/// Test double that records every dispatch.
#[derive(Default)]
pub struct MemoryDispatcher {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryDispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything dispatched so far.
    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl NotificationDispatcher for MemoryDispatcher {
    async fn notify(&self, notification: Notification) {
        self.sent.lock().await.push(notification);
    }
}

/// Sink that persists notifications into the graph as a per-user inbox.
pub struct StoreDispatcher {
    store: Arc<dyn GraphStore>,
    writer: WriterId,
}

impl StoreDispatcher {
    /// Create a dispatcher writing as the given local identity.
    pub fn new(store: Arc<dyn GraphStore>, writer: WriterId) -> Self {
        Self { store, writer }
    }

    /// Read a recipient's current inbox, newest first. Tombstoned and
    /// malformed records are skipped.
    pub async fn inbox(&self, recipient: &WriterId) -> Result<Vec<Notification>> {
        let entries = self.store.get_tree(&Notification::prefix(recipient)).await?;
        let mut inbox: Vec<Notification> = entries
            .iter()
            .filter_map(|entry| {
                let value = entry.live_value()?;
                serde_json::from_value(value.clone()).ok()
            })
            .collect();
        inbox.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(inbox)
    }

    /// Flip a notification's read flag.
    pub async fn mark_read(&self, recipient: &WriterId, id: &str) -> Result<()> {
        let path = Notification::store_path(recipient, id);
        if let Some(entry) = self.store.get(&path).await? {
            if let Some(value) = entry.live_value() {
                let mut record: Notification = serde_json::from_value(value.clone())?;
                record.read = true;
                self.store
                    .put(path, serde_json::to_value(&record)?.into(), &self.writer)
                    .await?;
            }
        }
        Ok(())
    }

    /// Remove a notification from the inbox.
    pub async fn dismiss(&self, recipient: &WriterId, id: &str) -> Result<()> {
        self.store
            .put(
                Notification::store_path(recipient, id),
                GraphWrite::Tombstone,
                &self.writer,
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl NotificationDispatcher for StoreDispatcher {
    async fn notify(&self, notification: Notification) {
        let path = Notification::store_path(&notification.recipient, &notification.id);
        let value = match serde_json::to_value(&notification) {
            Ok(value) => value,
            Err(err) => {
                error!(%err, "notification not serializable, dropped");
                return;
            }
        };
        if let Err(err) = self.store.put(path, value.into(), &self.writer).await {
            // Fire-and-forget: delivery failures are logged, never retried
            // or surfaced to the caller.
            error!(%err, recipient = %notification.recipient, "notification write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NotificationKind;
    use rostrum_store::MemoryGraphStore;

    fn notification(recipient: &str) -> Notification {
        Notification::new(
            WriterId::new(recipient),
            NotificationKind::ConsensusReached,
            "t1",
            "Ownership in Rust",
            "3 of 4 picked Tuesday 14:00",
        )
    }

    #[tokio::test]
    async fn memory_dispatcher_records() {
        let dispatcher = MemoryDispatcher::new();
        dispatcher.notify(notification("bob")).await;
        dispatcher.notify(notification("carol")).await;

        let sent = dispatcher.sent().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].recipient, WriterId::new("bob"));
    }

    #[tokio::test]
    async fn store_dispatcher_persists_inbox() {
        let store = Arc::new(MemoryGraphStore::new());
        let dispatcher = StoreDispatcher::new(store.clone(), WriterId::new("system"));
        let bob = WriterId::new("bob");

        dispatcher.notify(notification("bob")).await;
        let inbox = dispatcher.inbox(&bob).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert!(!inbox[0].read);

        dispatcher.mark_read(&bob, &inbox[0].id).await.unwrap();
        let inbox = dispatcher.inbox(&bob).await.unwrap();
        assert!(inbox[0].read);

        dispatcher.dismiss(&bob, &inbox[0].id).await.unwrap();
        assert!(dispatcher.inbox(&bob).await.unwrap().is_empty());
    }
}
