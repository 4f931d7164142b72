//! Core value types for change tracking.

use crate::error::{Result, SyncError};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix shared by every reserved system table.
pub const SYSTEM_TABLE_PREFIX: &str = "__";

/// Reserved system tables.
pub mod system_tables {
    /// Configuration rows (delta tokens, table settings).
    pub const CONFIG: &str = "__config";
    /// Pending outbound operations.
    pub const OPERATIONS: &str = "__operations";
    /// Push errors awaiting resolution.
    pub const SYNC_ERRORS: &str = "__errors";

    /// All reserved tables, in definition order.
    pub const ALL: [&str; 3] = [CONFIG, OPERATIONS, SYNC_ERRORS];
}

/// Well-known item columns.
pub mod columns {
    pub const ID: &str = "id";
    pub const VERSION: &str = "version";
    pub const UPDATED_AT: &str = "updatedAt";
    pub const CREATED_AT: &str = "createdAt";
    pub const DELETED: &str = "deleted";
}

/// Whether a table is reserved for internal bookkeeping.
///
/// System tables are never subject to change notifications.
pub fn is_system_table(table_name: &str) -> bool {
    table_name.starts_with(SYSTEM_TABLE_PREFIX)
}

/// Why a mutation happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreOperationSource {
    Local,
    LocalPurge,
    LocalConflictResolution,
    ServerPull,
    ServerPush,
}

impl StoreOperationSource {
    pub const ALL: [StoreOperationSource; 5] = [
        StoreOperationSource::Local,
        StoreOperationSource::LocalPurge,
        StoreOperationSource::LocalConflictResolution,
        StoreOperationSource::ServerPull,
        StoreOperationSource::ServerPush,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreOperationSource::Local => "Local",
            StoreOperationSource::LocalPurge => "LocalPurge",
            StoreOperationSource::LocalConflictResolution => "LocalConflictResolution",
            StoreOperationSource::ServerPull => "ServerPull",
            StoreOperationSource::ServerPush => "ServerPush",
        }
    }
}

impl fmt::Display for StoreOperationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreOperationSource {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        StoreOperationSource::ALL
            .into_iter()
            .find(|source| source.as_str() == s)
            .ok_or_else(|| SyncError::UnknownSource(s.to_string()))
    }
}

/// Kind of a single row mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Insert,
    Update,
    Delete,
    /// Inserted or updated; existence was not checked.
    Upsert,
}

bitflags! {
    /// What a change tracker observes and how precisely it classifies mutations.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct TrackingOptions: u32 {
        const NOTIFY_LOCAL_OPERATIONS = 1;
        const NOTIFY_LOCAL_CONFLICT_RESOLUTION_OPERATIONS = 1 << 1;
        const NOTIFY_SERVER_PULL_OPERATIONS = 1 << 2;
        const NOTIFY_SERVER_PULL_BATCH = 1 << 3;
        const NOTIFY_SERVER_PUSH_OPERATIONS = 1 << 4;
        const NOTIFY_SERVER_PUSH_BATCH = 1 << 5;
        /// Pre-query existing rows so upserts are classified as inserts or updates.
        const DETECT_INSERTS_AND_UPDATES = 1 << 6;
        /// Pre-query existing rows so deletes of missing ids are not reported.
        const DETECT_RECORD_CHANGES = 1 << 7;

        const NOTIFY_LOCAL_AND_SERVER_OPERATIONS = Self::NOTIFY_LOCAL_OPERATIONS.bits()
            | Self::NOTIFY_LOCAL_CONFLICT_RESOLUTION_OPERATIONS.bits()
            | Self::NOTIFY_SERVER_PULL_OPERATIONS.bits()
            | Self::NOTIFY_SERVER_PUSH_OPERATIONS.bits();
        const ALL_NOTIFICATIONS = Self::NOTIFY_LOCAL_AND_SERVER_OPERATIONS.bits()
            | Self::NOTIFY_SERVER_PULL_BATCH.bits()
            | Self::NOTIFY_SERVER_PUSH_BATCH.bits();
        const ALL_NOTIFICATIONS_AND_CHANGE_DETECTION = Self::ALL_NOTIFICATIONS.bits()
            | Self::DETECT_INSERTS_AND_UPDATES.bits()
            | Self::DETECT_RECORD_CHANGES.bits();
    }
}

impl TrackingOptions {
    pub const NONE: TrackingOptions = TrackingOptions::empty();
}

impl Default for TrackingOptions {
    fn default() -> Self {
        TrackingOptions::ALL_NOTIFICATIONS_AND_CHANGE_DETECTION
    }
}

bitflags! {
    /// System columns a table carries, as recorded in the table settings.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct SystemProperties: u32 {
        const CREATED_AT = 1;
        const UPDATED_AT = 1 << 1;
        const VERSION = 1 << 2;
        const DELETED = 1 << 3;
    }
}

/// Source, batch identity and options for one logical operation group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TrackingContext {
    source: StoreOperationSource,
    batch_id: String,
    options: TrackingOptions,
}

impl TrackingContext {
    pub fn new(
        source: StoreOperationSource,
        batch_id: impl Into<String>,
        options: TrackingOptions,
    ) -> Self {
        Self {
            source,
            batch_id: batch_id.into(),
            options,
        }
    }

    /// Context with a batch id derived from the source: empty for `Local`,
    /// a fresh UUID otherwise.
    pub fn for_source(source: StoreOperationSource, options: TrackingOptions) -> Self {
        let batch_id = match source {
            StoreOperationSource::Local => String::new(),
            _ => uuid::Uuid::new_v4().to_string(),
        };
        Self::new(source, batch_id, options)
    }

    pub fn source(&self) -> StoreOperationSource {
        self.source
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn options(&self) -> TrackingOptions {
        self.options
    }

    /// Whether row-level notifications are wanted for this context.
    pub fn is_record_tracking_enabled(&self) -> bool {
        let flag = match self.source {
            StoreOperationSource::Local | StoreOperationSource::LocalPurge => {
                TrackingOptions::NOTIFY_LOCAL_OPERATIONS
            }
            StoreOperationSource::LocalConflictResolution => {
                TrackingOptions::NOTIFY_LOCAL_CONFLICT_RESOLUTION_OPERATIONS
            }
            StoreOperationSource::ServerPull => TrackingOptions::NOTIFY_SERVER_PULL_OPERATIONS,
            StoreOperationSource::ServerPush => TrackingOptions::NOTIFY_SERVER_PUSH_OPERATIONS,
        };
        self.options.contains(flag)
    }

    /// Whether a batch completion event is wanted for this context.
    pub fn is_batch_tracking_enabled(&self) -> bool {
        match self.source {
            StoreOperationSource::Local
            | StoreOperationSource::LocalPurge
            | StoreOperationSource::LocalConflictResolution => false,
            StoreOperationSource::ServerPull => self
                .options
                .contains(TrackingOptions::NOTIFY_SERVER_PULL_BATCH),
            StoreOperationSource::ServerPush => self
                .options
                .contains(TrackingOptions::NOTIFY_SERVER_PUSH_BATCH),
        }
    }

    /// Whether anything at all would be observed.
    pub fn is_tracking_enabled(&self) -> bool {
        self.is_record_tracking_enabled() || self.is_batch_tracking_enabled()
    }
}

/// One tracked row mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StoreOperation {
    table_name: String,
    item_id: String,
    kind: OperationKind,
    source: StoreOperationSource,
    batch_id: String,
}

impl StoreOperation {
    pub fn new(
        table_name: impl Into<String>,
        item_id: impl Into<String>,
        kind: OperationKind,
        source: StoreOperationSource,
        batch_id: impl Into<String>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            item_id: item_id.into(),
            kind,
            source,
            batch_id: batch_id.into(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn source(&self) -> StoreOperationSource {
        self.source
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_table_prefix() {
        assert!(is_system_table(system_tables::CONFIG));
        assert!(is_system_table("__anything"));
        assert!(!is_system_table("movies"));
        assert!(!is_system_table("_movies"));
    }

    #[test]
    fn test_source_parse_roundtrip() {
        for source in StoreOperationSource::ALL {
            assert_eq!(source.as_str().parse::<StoreOperationSource>().unwrap(), source);
        }
        let err = "ServerSideMagic".parse::<StoreOperationSource>().unwrap_err();
        assert!(matches!(err, SyncError::UnknownSource(_)));
    }

    #[test]
    fn test_local_context_has_empty_batch_id() {
        let ctx = TrackingContext::for_source(StoreOperationSource::Local, TrackingOptions::default());
        assert!(ctx.batch_id().is_empty());

        let pull = TrackingContext::for_source(StoreOperationSource::ServerPull, TrackingOptions::default());
        let other = TrackingContext::for_source(StoreOperationSource::ServerPull, TrackingOptions::default());
        assert!(!pull.batch_id().is_empty());
        assert_ne!(pull.batch_id(), other.batch_id());
    }

    #[test]
    fn test_enablement_tables() {
        let ctx = |source, options| TrackingContext::new(source, "b", options);

        let local = ctx(StoreOperationSource::Local, TrackingOptions::NOTIFY_LOCAL_OPERATIONS);
        assert!(local.is_record_tracking_enabled());
        assert!(!local.is_batch_tracking_enabled());

        let purge = ctx(StoreOperationSource::LocalPurge, TrackingOptions::NOTIFY_LOCAL_OPERATIONS);
        assert!(purge.is_record_tracking_enabled());

        let conflict = ctx(
            StoreOperationSource::LocalConflictResolution,
            TrackingOptions::NOTIFY_LOCAL_OPERATIONS,
        );
        assert!(!conflict.is_tracking_enabled());

        let pull_batch = ctx(StoreOperationSource::ServerPull, TrackingOptions::NOTIFY_SERVER_PULL_BATCH);
        assert!(!pull_batch.is_record_tracking_enabled());
        assert!(pull_batch.is_batch_tracking_enabled());

        let push = ctx(StoreOperationSource::ServerPush, TrackingOptions::NOTIFY_SERVER_PULL_BATCH);
        assert!(!push.is_tracking_enabled());

        // Batches never apply to local sources, whatever the options say.
        let local_all = ctx(StoreOperationSource::Local, TrackingOptions::all());
        assert!(!local_all.is_batch_tracking_enabled());
    }

    #[test]
    fn test_default_options_include_detection() {
        let options = TrackingOptions::default();
        assert!(options.contains(TrackingOptions::DETECT_INSERTS_AND_UPDATES));
        assert!(options.contains(TrackingOptions::DETECT_RECORD_CHANGES));
        assert!(options.contains(TrackingOptions::NOTIFY_SERVER_PUSH_BATCH));
    }
}
