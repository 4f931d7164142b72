//! Chooses between a change tracker and a pass-through store front.

use super::tracker::ChangeTracker;
use crate::error::Result;
use crate::events::{EventManager, SyncEvent};
use crate::query::QueryDescription;
use crate::settings::SettingsProvider;
use crate::store::LocalStore;
use crate::types::{StoreOperationSource, TrackingContext, TrackingOptions};
use serde_json::Value;
use tracing::debug;

/// Forwards every call to the wrapped store and observes nothing.
pub struct LocalStoreProxy<'a, S: LocalStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: LocalStore + ?Sized> LocalStoreProxy<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }
}

impl<S: LocalStore + ?Sized> LocalStore for LocalStoreProxy<'_, S> {
    fn initialize(&self) -> Result<()> {
        self.store.initialize()
    }

    fn lookup(&self, table_name: &str, id: &str) -> Result<Option<Value>> {
        self.store.lookup(table_name, id)
    }

    fn read(&self, query: &QueryDescription) -> Result<Vec<Value>> {
        self.store.read(query)
    }

    fn delete_by_query(&self, query: &QueryDescription) -> Result<()> {
        self.store.delete_by_query(query)
    }

    fn delete(&self, table_name: &str, ids: &[String]) -> Result<()> {
        self.store.delete(table_name, ids)
    }

    fn upsert(
        &self,
        table_name: &str,
        items: &[Value],
        ignore_missing_columns: bool,
    ) -> Result<()> {
        self.store.upsert(table_name, items, ignore_missing_columns)
    }
}

/// Store front for one logical operation: tracking or not, callers use it
/// the same way and dispose it when done.
pub enum TrackedStore<'a, S: LocalStore + ?Sized> {
    Tracking(ChangeTracker<'a, S>),
    PassThrough(LocalStoreProxy<'a, S>),
}

impl<S: LocalStore + ?Sized> TrackedStore<'_, S> {
    pub fn is_tracking(&self) -> bool {
        matches!(self, TrackedStore::Tracking(_))
    }

    /// End the logical operation. For a tracker this publishes the batch
    /// completion event and reports its failure.
    pub fn dispose(self) -> Result<()> {
        match self {
            TrackedStore::Tracking(tracker) => tracker.dispose(),
            TrackedStore::PassThrough(_) => Ok(()),
        }
    }

    fn inner(&self) -> &dyn LocalStore {
        match self {
            TrackedStore::Tracking(tracker) => tracker,
            TrackedStore::PassThrough(proxy) => proxy,
        }
    }
}

impl<S: LocalStore + ?Sized> LocalStore for TrackedStore<'_, S> {
    fn initialize(&self) -> Result<()> {
        self.inner().initialize()
    }

    fn lookup(&self, table_name: &str, id: &str) -> Result<Option<Value>> {
        self.inner().lookup(table_name, id)
    }

    fn read(&self, query: &QueryDescription) -> Result<Vec<Value>> {
        self.inner().read(query)
    }

    fn delete_by_query(&self, query: &QueryDescription) -> Result<()> {
        self.inner().delete_by_query(query)
    }

    fn delete(&self, table_name: &str, ids: &[String]) -> Result<()> {
        self.inner().delete(table_name, ids)
    }

    fn upsert(
        &self,
        table_name: &str,
        items: &[Value],
        ignore_missing_columns: bool,
    ) -> Result<()> {
        self.inner().upsert(table_name, items, ignore_missing_columns)
    }
}

/// Builds store fronts bound to one event manager and settings provider.
pub struct ChangeTrackerFactory<'a> {
    events: &'a dyn EventManager,
    settings: &'a dyn SettingsProvider,
}

impl<'a> ChangeTrackerFactory<'a> {
    pub fn new(events: &'a dyn EventManager, settings: &'a dyn SettingsProvider) -> Self {
        Self { events, settings }
    }

    /// Wrap `store` in a change tracker when `options` enable any
    /// notification for `source`, otherwise in a pass-through proxy.
    pub fn create_tracked_store<S: LocalStore + ?Sized>(
        &self,
        store: &'a S,
        source: StoreOperationSource,
        options: TrackingOptions,
    ) -> Result<TrackedStore<'a, S>> {
        let context = TrackingContext::for_source(source, options);

        if !context.is_tracking_enabled() {
            debug!(%source, "tracking disabled, using pass-through store");
            return Ok(TrackedStore::PassThrough(LocalStoreProxy::new(store)));
        }

        let tracker = ChangeTracker::new(store, context, self.events, self.settings)?;
        Ok(TrackedStore::Tracking(tracker))
    }

    /// Delete the items matched by `query` without row-level notifications,
    /// then publish [`SyncEvent::PurgeCompleted`] for its table.
    pub fn purge<S: LocalStore + ?Sized>(
        &self,
        store: &'a S,
        query: &QueryDescription,
        options: TrackingOptions,
    ) -> Result<()> {
        let front = self.create_tracked_store(store, StoreOperationSource::LocalPurge, options)?;
        front.delete_by_query(query)?;
        front.dispose()?;

        debug!(table = %query.table_name, "purge completed");
        self.events.publish(SyncEvent::PurgeCompleted {
            table_name: query.table_name.clone(),
        })
    }
}
