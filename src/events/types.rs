//! Event payloads and subscription types.

use crate::tracking::OperationsBatch;
use crate::types::StoreOperation;
use serde::Serialize;
use std::time::Duration;

/// Notifications raised by the sync engine.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "name")]
pub enum SyncEvent {
    /// A single row mutation was applied to the local store.
    StoreOperationCompleted { operation: StoreOperation },

    /// Every mutation of a pull or push batch has been applied.
    StoreOperationsBatchCompleted { batch: OperationsBatch },

    /// A table (or part of it) was purged from the local store.
    PurgeCompleted { table_name: String },
}

impl SyncEvent {
    pub const STORE_OPERATION_COMPLETED: &'static str = "StoreOperationCompleted";
    pub const STORE_OPERATIONS_BATCH_COMPLETED: &'static str = "StoreOperationsBatchCompleted";
    pub const PURGE_COMPLETED: &'static str = "PurgeCompleted";

    /// Stable routing name.
    pub fn name(&self) -> &'static str {
        match self {
            SyncEvent::StoreOperationCompleted { .. } => Self::STORE_OPERATION_COMPLETED,
            SyncEvent::StoreOperationsBatchCompleted { .. } => {
                Self::STORE_OPERATIONS_BATCH_COMPLETED
            }
            SyncEvent::PurgeCompleted { .. } => Self::PURGE_COMPLETED,
        }
    }

    /// Table the event concerns, if it concerns exactly one.
    pub fn table_name(&self) -> Option<&str> {
        match self {
            SyncEvent::StoreOperationCompleted { operation } => Some(operation.table_name()),
            SyncEvent::StoreOperationsBatchCompleted { .. } => None,
            SyncEvent::PurgeCompleted { table_name } => Some(table_name),
        }
    }
}

/// Configuration for the event bus.
#[derive(Clone, Debug)]
pub struct EventBusConfig {
    /// How long an awaited publish waits for a full subscriber buffer.
    /// Default: 5s
    pub delivery_timeout: Duration,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            delivery_timeout: Duration::from_secs(5),
        }
    }
}

/// Configuration for a subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max buffered events before a background publish drops the subscriber.
    /// Default: 1000
    pub buffer_size: usize,

    /// Filter criteria.
    pub filter: SubscriptionFilter,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1000,
            filter: SubscriptionFilter::all(),
        }
    }
}

/// Filter criteria for subscriptions.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionFilter {
    /// Restrict table-scoped events to these tables (None = all tables).
    pub tables: Option<Vec<String>>,

    /// Include row-level operation events.
    pub include_operations: bool,

    /// Include batch completion events.
    pub include_batches: bool,

    /// Include purge events.
    pub include_purges: bool,
}

impl SubscriptionFilter {
    /// Subscribe to row-level operations.
    pub fn operations() -> Self {
        Self {
            include_operations: true,
            ..Default::default()
        }
    }

    /// Subscribe to batch completions.
    pub fn batches() -> Self {
        Self {
            include_batches: true,
            ..Default::default()
        }
    }

    /// Subscribe to purges.
    pub fn purges() -> Self {
        Self {
            include_purges: true,
            ..Default::default()
        }
    }

    /// Subscribe to operations and purges on specific tables.
    pub fn tables(tables: Vec<String>) -> Self {
        Self {
            tables: Some(tables),
            include_operations: true,
            include_purges: true,
            ..Default::default()
        }
    }

    /// Subscribe to everything.
    pub fn all() -> Self {
        Self {
            tables: None,
            include_operations: true,
            include_batches: true,
            include_purges: true,
        }
    }

    pub(crate) fn matches(&self, event: &SyncEvent) -> bool {
        let wanted = match event {
            SyncEvent::StoreOperationCompleted { .. } => self.include_operations,
            SyncEvent::StoreOperationsBatchCompleted { .. } => self.include_batches,
            SyncEvent::PurgeCompleted { .. } => self.include_purges,
        };
        if !wanted {
            return false;
        }

        match (&self.tables, event.table_name()) {
            (Some(tables), Some(table)) => tables.iter().any(|t| t == table),
            _ => true,
        }
    }
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle to manage a subscription.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<SyncEvent>,
}

impl SubscriptionHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<SyncEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<SyncEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> Result<SyncEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Take every event buffered so far.
    pub fn drain(&self) -> Vec<SyncEvent> {
        self.receiver.try_iter().collect()
    }
}
