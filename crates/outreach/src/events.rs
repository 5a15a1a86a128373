//! In-process "emails updated" broadcast
//!
//! Backend calls made by one component can change emails shown by another
//! (enabling contact sharing marks drafts as sent by a friend, for
//! example). The component that made the call publishes the changed
//! records here; every stage view subscribed picks up the ones for its
//! stage.

use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::models::{EmailRecord, Stage};

/// A batch of records changed on the server as a side effect
#[derive(Debug, Clone, PartialEq)]
pub struct EmailsUpdated {
    pub records: Vec<EmailRecord>,
}

impl EmailsUpdated {
    pub fn new(records: Vec<EmailRecord>) -> Self {
        Self { records }
    }

    /// Records tagged with `stage`
    pub fn for_stage(&self, stage: Stage) -> impl Iterator<Item = &EmailRecord> {
        self.records.iter().filter(move |r| r.stage == stage)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

type Handler = Arc<dyn Fn(&EmailsUpdated) + Send + Sync>;

struct Handlers {
    next_id: AtomicU64,
    list: RwLock<Vec<(u64, Handler)>>,
}

/// Broadcast channel for [`EmailsUpdated`].
///
/// Handlers run synchronously on the publishing thread, in registration
/// order. Clones share the same subscriber list.
#[derive(Clone)]
pub struct EmailBus {
    handlers: Arc<Handlers>,
}

impl EmailBus {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Handlers {
                next_id: AtomicU64::new(0),
                list: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Register a handler. It stays registered until the returned
    /// [`Subscription`] is dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&EmailsUpdated) + Send + Sync + 'static,
    {
        let id = self.handlers.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .list
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(handler)));
        Subscription {
            id,
            handlers: Arc::downgrade(&self.handlers),
        }
    }

    /// Deliver a batch to every current subscriber. Empty batches are dropped.
    pub fn publish(&self, event: &EmailsUpdated) {
        if event.is_empty() {
            return;
        }

        // Snapshot so handlers may subscribe or unsubscribe while running
        let handlers: Vec<Handler> = self
            .handlers
            .list
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        debug!(
            "Broadcasting {} updated emails to {} subscribers",
            event.records.len(),
            handlers.len()
        );
        for handler in handlers {
            handler(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers
            .list
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for EmailBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Registration handle returned by [`EmailBus::subscribe`]
pub struct Subscription {
    id: u64,
    handlers: Weak<Handlers>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(handlers) = self.handlers.upgrade() {
            handlers
                .list
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn record(id: i64, stage: Stage) -> EmailRecord {
        EmailRecord::new(id, format!("{}@x.com", id), stage)
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let bus = EmailBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = seen.clone();
        let _a = bus.subscribe(move |_| first.lock().unwrap().push("a"));
        let second = seen.clone();
        let _b = bus.subscribe(move |_| second.lock().unwrap().push("b"));

        bus.publish(&EmailsUpdated::new(vec![record(1, Stage::Outreach)]));
        bus.publish(&EmailsUpdated::new(vec![record(2, Stage::Outreach)]));
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "a", "b"]);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let bus = EmailBus::new();
        let hits = Arc::new(Mutex::new(0));
        let counter = hits.clone();
        let subscription = bus.subscribe(move |_| *counter.lock().unwrap() += 1);
        assert_eq!(bus.subscriber_count(), 1);

        drop(subscription);
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(&EmailsUpdated::new(vec![record(1, Stage::Outreach)]));
        assert_eq!(*hits.lock().unwrap(), 0);
    }

    #[test]
    fn test_for_stage_filters() {
        let event = EmailsUpdated::new(vec![
            record(1, Stage::Outreach),
            record(2, Stage::Followup),
            record(3, Stage::Outreach),
        ]);
        let ids: Vec<i64> = event.for_stage(Stage::Outreach).map(|r| r.id.0).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_subscription_outlives_bus() {
        let bus = EmailBus::new();
        let subscription = bus.subscribe(|_| {});
        drop(bus);
        drop(subscription);
    }
}
