//! Session hierarchy bookkeeping: merge and persist-event fan-out.
//!
//! The hierarchy owns the subscriber edges between the committing side and
//! every live descendant session. Delivery is at-least-once per live
//! subscriber, unordered, and only after the corresponding commit outcome.
//! Disconnected subscribers are pruned during broadcast.

use std::sync::Mutex;
use std::sync::mpsc;

use crate::core::lock_unpoisoned;
use crate::notify::{MergeNotification, PersistEvent};

#[derive(Default)]
pub(crate) struct SessionHierarchy {
    merge_subscribers: Mutex<Vec<mpsc::Sender<MergeNotification>>>,
    persist_subscribers: Mutex<Vec<mpsc::Sender<PersistEvent>>>,
}

impl SessionHierarchy {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a background session as a merge recipient.
    pub(crate) fn register_merge_subscriber(&self) -> mpsc::Receiver<MergeNotification> {
        let (tx, rx) = mpsc::channel();
        lock_unpoisoned(&self.merge_subscribers).push(tx);
        rx
    }

    /// Register an observer for root-commit outcomes.
    pub(crate) fn register_persist_subscriber(&self) -> mpsc::Receiver<PersistEvent> {
        let (tx, rx) = mpsc::channel();
        lock_unpoisoned(&self.persist_subscribers).push(tx);
        rx
    }

    pub(crate) fn broadcast_merge(&self, notification: &MergeNotification) {
        lock_unpoisoned(&self.merge_subscribers)
            .retain(|subscriber| subscriber.send(notification.clone()).is_ok());
    }

    pub(crate) fn broadcast_persist(&self, event: &PersistEvent) {
        lock_unpoisoned(&self.persist_subscribers)
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    #[cfg(test)]
    pub(crate) fn merge_subscriber_count(&self) -> usize {
        lock_unpoisoned(&self.merge_subscribers).len()
    }
}
