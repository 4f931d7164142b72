//! Shared doubles for the integration tests.

#![allow(dead_code)]

use offline_sync::{
    EventManager, LocalStore, MemoryStore, QueryDescription, Result, StoreOperation, SyncError,
    SyncEvent,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Memory store that counts calls and can be told to fail mutations.
#[derive(Default)]
pub struct RecordingStore {
    pub inner: MemoryStore,
    pub reads: AtomicUsize,
    pub lookups: AtomicUsize,
    pub mutations: AtomicUsize,
    pub fail_mutations: AtomicBool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn mutate(&self) -> Result<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(SyncError::Store("disk full".to_string()));
        }
        Ok(())
    }
}

impl LocalStore for RecordingStore {
    fn initialize(&self) -> Result<()> {
        self.inner.initialize()
    }

    fn lookup(&self, table_name: &str, id: &str) -> Result<Option<Value>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.lookup(table_name, id)
    }

    fn read(&self, query: &QueryDescription) -> Result<Vec<Value>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(query)
    }

    fn delete_by_query(&self, query: &QueryDescription) -> Result<()> {
        self.mutate()?;
        self.inner.delete_by_query(query)
    }

    fn delete(&self, table_name: &str, ids: &[String]) -> Result<()> {
        self.mutate()?;
        self.inner.delete(table_name, ids)
    }

    fn upsert(
        &self,
        table_name: &str,
        items: &[Value],
        ignore_missing_columns: bool,
    ) -> Result<()> {
        self.mutate()?;
        self.inner.upsert(table_name, items, ignore_missing_columns)
    }
}

/// Event manager that keeps everything it is given.
#[derive(Default)]
pub struct RecordingEvents {
    pub background: Mutex<Vec<SyncEvent>>,
    pub published: Mutex<Vec<SyncEvent>>,
    pub fail_publish: AtomicBool,
}

impl RecordingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations received through background publishing, in order.
    pub fn operations(&self) -> Vec<StoreOperation> {
        self.background
            .lock()
            .iter()
            .filter_map(|e| match e {
                SyncEvent::StoreOperationCompleted { operation } => Some(operation.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn published(&self) -> Vec<SyncEvent> {
        self.published.lock().clone()
    }
}

impl EventManager for RecordingEvents {
    fn publish(&self, event: SyncEvent) -> Result<()> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(SyncError::EventDelivery {
                event: event.name(),
                reason: "listener unavailable".to_string(),
            });
        }
        self.published.lock().push(event);
        Ok(())
    }

    fn background_publish(&self, event: SyncEvent) {
        self.background.lock().push(event);
    }
}

/// Install a test-friendly tracing subscriber once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
