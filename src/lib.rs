//! # Offline Sync
//!
//! Change tracking and synchronization bookkeeping for an offline-capable
//! client that works against a local store and reconciles with a server.
//!
//! ## Core Concepts
//!
//! - **Local store**: any [`LocalStore`]; [`MemoryStore`] is built in
//! - **Change tracker**: decorates a store for one logical operation and
//!   reports every row mutation as a [`SyncEvent`]
//! - **Batches**: pull and push operations are counted per kind and reported
//!   exactly once when the tracker is disposed
//! - **Delta tokens**: per-(table, query) watermarks for incremental pulls
//!
//! ## Example
//!
//! ```ignore
//! use offline_sync::{
//!     ChangeTrackerFactory, EventBus, LocalStore, MemoryStore, StoreOperationSource,
//!     StoreSettings, TrackingOptions,
//! };
//!
//! let store = MemoryStore::new();
//! let events = EventBus::new();
//! let settings = StoreSettings::new(&store);
//! let factory = ChangeTrackerFactory::new(&events, &settings);
//!
//! let front = factory.create_tracked_store(
//!     &store,
//!     StoreOperationSource::ServerPull,
//!     TrackingOptions::default(),
//! )?;
//! front.upsert("movies", &[json!({"id": "1", "version": "AAA"})], false)?;
//! front.dispose()?; // publishes StoreOperationsBatchCompleted
//! ```

pub mod error;
pub mod events;
pub mod query;
pub mod settings;
pub mod store;
pub mod tracking;
pub mod types;

// Re-exports
pub use error::{Result, SyncError};
pub use events::{
    EventBus, EventBusConfig, EventManager, SubscriptionConfig, SubscriptionFilter,
    SubscriptionHandle, SubscriptionId, SyncEvent,
};
pub use query::{Filter, QueryDescription, SortDirection};
pub use settings::{
    delta_token_key, DeltaTokenStore, DeltaTokenStoreConfig, SettingsProvider, StoreSettings,
};
pub use store::{item_id, LocalStore, MemoryStore};
pub use tracking::{
    ChangeTracker, ChangeTrackerFactory, LocalStoreProxy, OperationsBatch, TrackedStore,
};
pub use types::*;
