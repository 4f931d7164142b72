//! Per-batch operation counters.

use crate::error::{Result, SyncError};
use crate::types::{OperationKind, StoreOperationSource};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;

/// Operation counts for one pull or push batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OperationsBatch {
    batch_id: String,
    source: StoreOperationSource,
    counts: BTreeMap<OperationKind, u64>,
}

impl OperationsBatch {
    pub fn new(batch_id: impl Into<String>, source: StoreOperationSource) -> Self {
        Self {
            batch_id: batch_id.into(),
            source,
            counts: BTreeMap::new(),
        }
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn source(&self) -> StoreOperationSource {
        self.source
    }

    /// Total number of operations across all kinds.
    pub fn operation_count(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn operation_count_by_kind(&self, kind: OperationKind) -> u64 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    fn increment(&mut self, kind: OperationKind) {
        *self.counts.entry(kind).or_insert(0) += 1;
    }
}

/// A batch still being counted. Once finished it rejects further increments.
pub(crate) struct PendingBatch {
    batch: Mutex<Option<OperationsBatch>>,
    batch_id: String,
}

impl PendingBatch {
    pub(crate) fn new(batch_id: &str, source: StoreOperationSource) -> Self {
        Self {
            batch: Mutex::new(Some(OperationsBatch::new(batch_id, source))),
            batch_id: batch_id.to_string(),
        }
    }

    pub(crate) fn increment(&self, kind: OperationKind) -> Result<()> {
        match self.batch.lock().as_mut() {
            Some(batch) => {
                batch.increment(kind);
                Ok(())
            }
            None => Err(SyncError::BatchCompleted(self.batch_id.clone())),
        }
    }

    /// Freeze the counters and hand out the final batch. `None` once taken.
    pub(crate) fn finish(&self) -> Option<OperationsBatch> {
        self.batch.lock().take()
    }
}
