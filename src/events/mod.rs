//! Sync event notifications.
//!
//! The change tracker reports through the [`EventManager`] trait:
//! - Row-level operations, published in the background
//! - Batch completions, published and awaited
//! - Purge completions
//!
//! [`EventBus`] is an in-process implementation with filtered, bounded
//! subscriptions.
//!
//! # Example
//!
//! ```ignore
//! let bus = EventBus::new();
//! let handle = bus.subscribe(SubscriptionConfig {
//!     filter: SubscriptionFilter::batches(),
//!     ..Default::default()
//! });
//!
//! while let Ok(SyncEvent::StoreOperationsBatchCompleted { batch }) = handle.recv() {
//!     println!("{} operations in {}", batch.operation_count(), batch.batch_id());
//! }
//! ```

mod manager;
mod types;

pub use manager::{EventBus, EventManager};
pub use types::{
    EventBusConfig, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle, SubscriptionId,
    SyncEvent,
};
