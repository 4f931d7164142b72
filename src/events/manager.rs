//! Event manager trait and the channel-backed event bus.

use crate::error::{Result, SyncError};
use crossbeam_channel::{bounded, SendTimeoutError, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::types::{
    EventBusConfig, SubscriptionConfig, SubscriptionHandle, SubscriptionId, SyncEvent,
};

/// Dispatches sync events to whoever listens.
pub trait EventManager: Send + Sync {
    /// Deliver an event and wait until every listener has accepted it.
    fn publish(&self, event: SyncEvent) -> Result<()>;

    /// Hand an event off without waiting. Delivery failures are logged and
    /// discarded; they never reach the caller.
    fn background_publish(&self, event: SyncEvent);
}

impl<E: EventManager + ?Sized> EventManager for std::sync::Arc<E> {
    fn publish(&self, event: SyncEvent) -> Result<()> {
        (**self).publish(event)
    }

    fn background_publish(&self, event: SyncEvent) {
        (**self).background_publish(event)
    }
}

/// Internal subscription state.
struct Subscription {
    config: SubscriptionConfig,
    sender: Sender<SyncEvent>,
}

/// Broadcasts sync events to filtered, bounded subscriptions.
pub struct EventBus {
    /// Active subscriptions by ID.
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
    config: EventBusConfig,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    pub fn with_config(config: EventBusConfig) -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Create a new subscription.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size);

        self.subscriptions
            .write()
            .insert(id, Subscription { config, sender });

        SubscriptionHandle { id, receiver }
    }

    /// Unsubscribe and clean up.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.write().remove(&id);
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Senders of the subscriptions interested in an event.
    fn recipients(&self, event: &SyncEvent) -> Vec<(SubscriptionId, Sender<SyncEvent>)> {
        self.subscriptions
            .read()
            .iter()
            .filter(|(_, sub)| sub.config.filter.matches(event))
            .map(|(id, sub)| (*id, sub.sender.clone()))
            .collect()
    }

    fn remove_all(&self, ids: &[SubscriptionId]) {
        if ids.is_empty() {
            return;
        }
        let mut subs = self.subscriptions.write();
        for id in ids {
            subs.remove(id);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventManager for EventBus {
    fn publish(&self, event: SyncEvent) -> Result<()> {
        let name = event.name();
        let mut failed = Vec::new();
        let mut reason = None;

        for (id, sender) in self.recipients(&event) {
            let cause = match sender.send_timeout(event.clone(), self.config.delivery_timeout) {
                Ok(()) => continue,
                Err(SendTimeoutError::Timeout(_)) => "timed out",
                Err(SendTimeoutError::Disconnected(_)) => "disconnected",
            };
            failed.push(id);
            if reason.is_none() {
                reason = Some(format!("subscriber {} {}", id.0, cause));
            }
        }

        self.remove_all(&failed);

        match reason {
            Some(reason) => Err(SyncError::EventDelivery {
                event: name,
                reason,
            }),
            None => Ok(()),
        }
    }

    fn background_publish(&self, event: SyncEvent) {
        let mut to_remove = Vec::new();

        for (id, sender) in self.recipients(&event) {
            match sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    debug!(subscription = id.0, event = event.name(), "dropping slow subscriber");
                    to_remove.push(id);
                }
                Err(TrySendError::Disconnected(_)) => {
                    debug!(subscription = id.0, event = event.name(), "dropping disconnected subscriber");
                    to_remove.push(id);
                }
            }
        }

        self.remove_all(&to_remove);
    }
}
