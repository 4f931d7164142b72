//! Change-tracking decorator over a local store.

use super::batch::PendingBatch;
use crate::error::{Result, SyncError};
use crate::events::{EventManager, SyncEvent};
use crate::query::{Filter, QueryDescription};
use crate::settings::SettingsProvider;
use crate::store::{item_id, LocalStore};
use crate::types::{
    columns, is_system_table, OperationKind, StoreOperation, StoreOperationSource,
    SystemProperties, TrackingContext, TrackingOptions,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace, warn};

/// Wraps a [`LocalStore`] and reports every row mutation made through it.
///
/// Results and errors of the wrapped store are returned unchanged. Row-level
/// notifications go out through [`EventManager::background_publish`]; the
/// batch completion event is published (and awaited) once, when the tracker
/// is disposed or dropped.
pub struct ChangeTracker<'a, S: LocalStore + ?Sized> {
    store: &'a S,
    context: TrackingContext,
    events: &'a dyn EventManager,
    settings: &'a dyn SettingsProvider,
    batch: Option<PendingBatch>,
    track_records: bool,
    batch_completed: AtomicBool,
}

impl<'a, S: LocalStore + ?Sized> ChangeTracker<'a, S> {
    /// Create a tracker for a context.
    ///
    /// Fails with [`SyncError::InvalidConfiguration`] when the context enables
    /// neither record nor batch notifications.
    pub fn new(
        store: &'a S,
        context: TrackingContext,
        events: &'a dyn EventManager,
        settings: &'a dyn SettingsProvider,
    ) -> Result<Self> {
        let track_records = context.is_record_tracking_enabled();
        let track_batches = context.is_batch_tracking_enabled();

        if !track_records && !track_batches {
            return Err(SyncError::InvalidConfiguration(format!(
                "tracking notifications are not enabled for the source {}; enable record \
                 operation notifications, batch notifications or both",
                context.source()
            )));
        }

        let batch = track_batches.then(|| PendingBatch::new(context.batch_id(), context.source()));

        debug!(
            source = %context.source(),
            batch_id = context.batch_id(),
            track_records,
            track_batches,
            "change tracker created"
        );

        Ok(Self {
            store,
            context,
            events,
            settings,
            batch,
            track_records,
            batch_completed: AtomicBool::new(false),
        })
    }

    pub fn context(&self) -> &TrackingContext {
        &self.context
    }

    fn has_option(&self, option: TrackingOptions) -> bool {
        self.context.options().contains(option)
    }

    /// Publish the batch completion event. Runs at most once per tracker;
    /// later calls return `Ok(())` without publishing.
    pub fn complete_batch(&self) -> Result<()> {
        if self.batch_completed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        if let Some(batch) = self.batch.as_ref().and_then(PendingBatch::finish) {
            debug!(
                batch_id = batch.batch_id(),
                operations = batch.operation_count(),
                "batch completed"
            );
            self.events
                .publish(SyncEvent::StoreOperationsBatchCompleted { batch })?;
        }
        Ok(())
    }

    /// Finish the logical operation, reporting a failed batch publication.
    pub fn dispose(self) -> Result<()> {
        self.complete_batch()
    }

    /// Ids (and versions, if asked) of the given ids that currently exist.
    fn existing_items(
        &self,
        table_name: &str,
        ids: &[String],
        include_version: bool,
    ) -> Result<HashMap<String, Option<String>>> {
        let filter = match Filter::id_in(ids.iter().cloned()) {
            Some(f) => f,
            None => return Ok(HashMap::new()),
        };

        let mut query = QueryDescription::new(table_name)
            .with_filter(filter)
            .select(columns::ID);
        if include_version {
            query = query.select(columns::VERSION);
        }

        let mut existing = HashMap::new();
        for row in self.store.read(&query)? {
            let id = item_id(&row)?.to_string();
            let version = if include_version {
                version_string(row.get(columns::VERSION))
            } else {
                None
            };
            existing.insert(id, version);
        }
        Ok(existing)
    }

    fn track(&self, table_name: &str, item_id: &str, kind: OperationKind) {
        let operation = StoreOperation::new(
            table_name,
            item_id,
            kind,
            self.context.source(),
            self.context.batch_id(),
        );
        trace!(table = table_name, id = item_id, ?kind, "tracked operation");

        if let Some(ref batch) = self.batch {
            if let Err(e) = batch.increment(kind) {
                debug!(error = %e, "discarding batch counter failure");
            }
        }

        if self.track_records {
            self.events
                .background_publish(SyncEvent::StoreOperationCompleted { operation });
        }
    }
}

/// A version member rendered for comparison.
fn version_string(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

impl<S: LocalStore + ?Sized> LocalStore for ChangeTracker<'_, S> {
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
        // Ids matched by a predicate cannot be recovered after the delete.
        let deleted_ids = if !is_system_table(&query.table_name)
            && self.context.source() != StoreOperationSource::LocalPurge
        {
            let ids = self
                .store
                .read(query)?
                .iter()
                .map(|row| item_id(row).map(str::to_string))
                .collect::<Result<Vec<_>>>()?;
            Some(ids)
        } else {
            None
        };

        self.store.delete_by_query(query)?;

        for id in deleted_ids.iter().flatten() {
            self.track(&query.table_name, id, OperationKind::Delete);
        }
        Ok(())
    }

    fn delete(&self, table_name: &str, ids: &[String]) -> Result<()> {
        if is_system_table(table_name) {
            return self.store.delete(table_name, ids);
        }

        let notify_ids: Vec<String> = if self.has_option(TrackingOptions::DETECT_RECORD_CHANGES) {
            let existing = self.existing_items(table_name, ids, false)?;
            let mut seen = HashSet::new();
            ids.iter()
                .filter(|id| existing.contains_key(*id) && seen.insert(*id))
                .cloned()
                .collect()
        } else {
            ids.to_vec()
        };

        self.store.delete(table_name, ids)?;

        for id in &notify_ids {
            self.track(table_name, id, OperationKind::Delete);
        }
        Ok(())
    }

    fn upsert(
        &self,
        table_name: &str,
        items: &[Value],
        ignore_missing_columns: bool,
    ) -> Result<()> {
        if is_system_table(table_name) {
            return self
                .store
                .upsert(table_name, items, ignore_missing_columns);
        }

        let detect = self.has_option(TrackingOptions::DETECT_INSERTS_AND_UPDATES);
        let mut supports_version = false;
        let mut existing = HashMap::new();

        if detect {
            supports_version = self
                .settings
                .system_properties(table_name)?
                .contains(SystemProperties::VERSION);

            // Items without a usable id are left for the store to reject.
            let ids: Vec<String> = items
                .iter()
                .filter_map(|item| item_id(item).ok().map(str::to_string))
                .collect();
            existing = self.existing_items(table_name, &ids, supports_version)?;
        }

        self.store
            .upsert(table_name, items, ignore_missing_columns)?;

        let source = self.context.source();
        for item in items {
            let id = match item_id(item) {
                Ok(id) => id,
                Err(_) => continue,
            };

            let kind = if !detect {
                OperationKind::Upsert
            } else {
                match existing.get(id) {
                    None => OperationKind::Insert,
                    Some(stored_version) => {
                        // A server round-trip that left the version untouched is not a change.
                        // Local writes are always reported.
                        if source != StoreOperationSource::Local
                            && supports_version
                            && *stored_version == version_string(item.get(columns::VERSION))
                        {
                            trace!(table = table_name, id, "unchanged version, skipping");
                            continue;
                        }
                        OperationKind::Update
                    }
                }
            };

            self.track(table_name, id, kind);
        }
        Ok(())
    }
}

impl<S: LocalStore + ?Sized> Drop for ChangeTracker<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.complete_batch() {
            warn!(
                batch_id = self.context.batch_id(),
                error = %e,
                "batch completion failed during drop"
            );
        }
    }
}
