//! Broadcast of document writes.
//!
//! Every successful insert, update or delete publishes a [`Change`]. Live
//! queries subscribe and re-evaluate when their collection changes. A slow
//! receiver that falls more than the channel capacity behind observes
//! `RecvError::Lagged` and must re-read its whole result set.

use tokio::sync::broadcast;

use crate::models::{Change, ChangeKind};

#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<Change>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, collection: &str, id: &str, kind: ChangeKind) {
        let change = Change {
            collection: collection.to_string(),
            id: id.to_string(),
            kind,
        };
        tracing::trace!(collection, id, ?kind, "document changed");
        // No receivers simply means nobody is listening.
        let _ = self.tx.send(change);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
