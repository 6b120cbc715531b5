//! In-process change notifications.

use serde::Serialize;
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::trace;
use uuid::Uuid;

/// A notification that consumers should re-read state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StoreChange {
    /// Published immediately before a single-entity delete.
    WillChange,
    /// Pending changes were committed.
    Saved { changes: usize },
    /// Entities were removed by a bulk delete.
    Deleted { ids: Vec<Uuid> },
    /// The selected filter or selected issue changed.
    SelectionChanged,
    /// Another session committed to the same store.
    RemoteChange,
}

/// Fan-out of [`StoreChange`] values to any number of subscribers.
#[derive(Debug, Default)]
pub struct ChangeFeed {
    subscribers: Vec<Sender<StoreChange>>,
}

impl ChangeFeed {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber.
    pub fn subscribe(&mut self) -> Receiver<StoreChange> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Send `change` to every live subscriber, dropping the ones whose
    /// receiver is gone. Never blocks.
    pub fn publish(&mut self, change: &StoreChange) {
        self.subscribers
            .retain(|tx| tx.send(change.clone()).is_ok());
        trace!(?change, subscribers = self.subscribers.len(), "Published change");
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
