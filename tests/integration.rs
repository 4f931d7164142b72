//! End-to-end sync flows over the event bus.

mod common;

use chrono::{DateTime, Utc};
use common::init_tracing;
use offline_sync::{
    ChangeTrackerFactory, DeltaTokenStore, EventBus, Filter, LocalStore, MemoryStore,
    OperationKind, QueryDescription, StoreOperationSource, StoreSettings, SubscriptionConfig,
    SubscriptionFilter, SyncEvent, SystemProperties, TrackingOptions,
};
use serde_json::{json, Value};

const TABLE: &str = "todoitem";
const QUERY: &str = "all-items";

fn page(start: usize, count: usize, updated_at: i64) -> Vec<Value> {
    (start..start + count)
        .map(|i| {
            json!({
                "id": format!("item-{:03}", i),
                "text": format!("task {}", i),
                "version": "1",
                "updatedAt": updated_at,
            })
        })
        .collect()
}

// --- Realistic Workflow Tests ---

#[test]
fn test_incremental_pull_workflow() {
    init_tracing();
    let store = MemoryStore::new();
    let bus = EventBus::new();
    let operations = bus.subscribe(SubscriptionConfig {
        filter: SubscriptionFilter::operations(),
        ..Default::default()
    });
    let batches = bus.subscribe(SubscriptionConfig {
        filter: SubscriptionFilter::batches(),
        ..Default::default()
    });

    let settings = StoreSettings::new(&store);
    settings
        .set_system_properties(TABLE, SystemProperties::VERSION | SystemProperties::UPDATED_AT)
        .unwrap();
    let tokens = DeltaTokenStore::new(&store);
    let factory = ChangeTrackerFactory::new(&bus, &settings);

    // First pull starts from the epoch and brings everything.
    assert_eq!(tokens.get(TABLE, QUERY).unwrap(), DateTime::<Utc>::UNIX_EPOCH);
    {
        let front = factory
            .create_tracked_store(&store, StoreOperationSource::ServerPull, TrackingOptions::default())
            .unwrap();
        front.upsert(TABLE, &page(0, 10, 1_000), false).unwrap();
        front.dispose().unwrap();
    }
    tokens
        .set(TABLE, QUERY, DateTime::from_timestamp_millis(1_000).unwrap())
        .unwrap();

    let first = operations.drain();
    assert_eq!(first.len(), 10);
    assert!(first.iter().all(|e| matches!(
        e,
        SyncEvent::StoreOperationCompleted { operation } if operation.kind() == OperationKind::Insert
    )));

    // Second pull re-delivers the last five unchanged plus three new items.
    {
        let front = factory
            .create_tracked_store(&store, StoreOperationSource::ServerPull, TrackingOptions::default())
            .unwrap();
        front.upsert(TABLE, &page(5, 8, 2_000), false).unwrap();
        front.dispose().unwrap();
    }
    tokens
        .set(TABLE, QUERY, DateTime::from_timestamp_millis(2_000).unwrap())
        .unwrap();

    let second = operations.drain();
    let ids: Vec<&str> = second
        .iter()
        .filter_map(|e| match e {
            SyncEvent::StoreOperationCompleted { operation } => Some(operation.item_id()),
            _ => None,
        })
        .collect();
    assert_eq!(ids, vec!["item-010", "item-011", "item-012"]);

    let counts: Vec<u64> = batches
        .drain()
        .iter()
        .map(|e| match e {
            SyncEvent::StoreOperationsBatchCompleted { batch } => batch.operation_count(),
            other => panic!("Expected batch event, got {:?}", other),
        })
        .collect();
    assert_eq!(counts, vec![10, 3]);

    assert_eq!(store.row_count(TABLE), 13);
    assert_eq!(
        tokens.get(TABLE, QUERY).unwrap().timestamp_millis(),
        2_000
    );
}

#[test]
fn test_local_edits_then_push() {
    let store = MemoryStore::new();
    let bus = EventBus::new();
    let handle = bus.subscribe(SubscriptionConfig::default());
    let settings = StoreSettings::new(&store);
    settings
        .set_system_properties(TABLE, SystemProperties::VERSION)
        .unwrap();
    let factory = ChangeTrackerFactory::new(&bus, &settings);

    // Local edits report every write, even with the version unchanged.
    {
        let local = factory
            .create_tracked_store(&store, StoreOperationSource::Local, TrackingOptions::default())
            .unwrap();
        local.upsert(TABLE, &page(0, 2, 0), false).unwrap();
        local
            .upsert(TABLE, &[json!({"id": "item-000", "text": "edited", "version": "1"})], false)
            .unwrap();
        local.delete(TABLE, &["item-001".to_string()]).unwrap();
        local.dispose().unwrap();
    }

    let kinds: Vec<OperationKind> = handle
        .drain()
        .iter()
        .map(|e| match e {
            SyncEvent::StoreOperationCompleted { operation } => {
                assert_eq!(operation.batch_id(), "");
                operation.kind()
            }
            other => panic!("Local sources have no batches, got {:?}", other),
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            OperationKind::Insert,
            OperationKind::Insert,
            OperationKind::Update,
            OperationKind::Delete,
        ]
    );

    // The server accepts the edit and returns a new version.
    {
        let push = factory
            .create_tracked_store(&store, StoreOperationSource::ServerPush, TrackingOptions::default())
            .unwrap();
        push.upsert(TABLE, &[json!({"id": "item-000", "text": "edited", "version": "2"})], false)
            .unwrap();
        push.dispose().unwrap();
    }

    let events = handle.drain();
    assert_eq!(events.len(), 2);
    let batch_id = match &events[0] {
        SyncEvent::StoreOperationCompleted { operation } => {
            assert_eq!(operation.kind(), OperationKind::Update);
            assert_eq!(operation.source(), StoreOperationSource::ServerPush);
            operation.batch_id().to_string()
        }
        other => panic!("Expected operation event, got {:?}", other),
    };
    match &events[1] {
        SyncEvent::StoreOperationsBatchCompleted { batch } => {
            assert_eq!(batch.batch_id(), batch_id);
            assert_eq!(batch.source(), StoreOperationSource::ServerPush);
            assert_eq!(batch.operation_count_by_kind(OperationKind::Update), 1);
        }
        other => panic!("Expected batch event, got {:?}", other),
    }
}

#[test]
fn test_purge_and_reset_token() {
    let store = MemoryStore::new();
    let bus = EventBus::new();
    let handle = bus.subscribe(SubscriptionConfig::default());
    let settings = StoreSettings::new(&store);
    let tokens = DeltaTokenStore::new(&store);
    let factory = ChangeTrackerFactory::new(&bus, &settings);

    store.upsert(TABLE, &page(0, 4, 500), false).unwrap();
    tokens
        .set(TABLE, QUERY, DateTime::from_timestamp_millis(500).unwrap())
        .unwrap();

    let query = QueryDescription::new(TABLE)
        .with_filter(Filter::eq("id", "item-000").or(Filter::eq("id", "item-001")));
    factory
        .purge(&store, &query, TrackingOptions::default())
        .unwrap();
    tokens.reset(TABLE, QUERY).unwrap();

    assert_eq!(store.row_count(TABLE), 2);
    assert_eq!(tokens.get(TABLE, QUERY).unwrap(), DateTime::<Utc>::UNIX_EPOCH);
    assert_eq!(
        handle.drain(),
        vec![SyncEvent::PurgeCompleted {
            table_name: TABLE.to_string()
        }]
    );
}

// --- Edge Case Tests ---

#[test]
fn test_slow_subscriber_does_not_block_tracking() {
    let store = MemoryStore::new();
    let bus = EventBus::new();
    let _slow = bus.subscribe(SubscriptionConfig {
        buffer_size: 1,
        filter: SubscriptionFilter::operations(),
    });
    let settings = StoreSettings::new(&store);
    let factory = ChangeTrackerFactory::new(&bus, &settings);

    let front = factory
        .create_tracked_store(&store, StoreOperationSource::Local, TrackingOptions::default())
        .unwrap();
    front.upsert(TABLE, &page(0, 20, 0), false).unwrap();
    front.dispose().unwrap();

    assert_eq!(store.row_count(TABLE), 20);
    assert_eq!(bus.subscription_count(), 0);
}

#[test]
fn test_events_serialize_with_name_tag() {
    let store = MemoryStore::new();
    let bus = EventBus::new();
    let handle = bus.subscribe(SubscriptionConfig::default());
    let settings = StoreSettings::new(&store);
    let factory = ChangeTrackerFactory::new(&bus, &settings);

    let front = factory
        .create_tracked_store(&store, StoreOperationSource::ServerPull, TrackingOptions::default())
        .unwrap();
    front.upsert(TABLE, &page(0, 1, 0), false).unwrap();
    front.dispose().unwrap();

    let names: Vec<String> = handle
        .drain()
        .iter()
        .map(|e| serde_json::to_value(e).unwrap()["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        names,
        vec![
            SyncEvent::STORE_OPERATION_COMPLETED,
            SyncEvent::STORE_OPERATIONS_BATCH_COMPLETED,
        ]
    );
}
