//! Delta tokens: how far each (table, query) pair has been pulled.
//!
//! A token is the `updatedAt` high-water mark of the last incremental pull.
//! It is persisted as Unix milliseconds under `dt.<table>.<queryId>` in the
//! `__config` table. A missing row means the Unix epoch, i.e. pull everything.

use super::{
    delete_config_value, integer_value, read_config_value, validate_query_id,
    validate_table_name, write_config_value,
};
use crate::error::{Result, SyncError};
use crate::store::LocalStore;
use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;
use std::num::NonZeroUsize;
use tracing::debug;

const DEFAULT_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(256) {
    Some(n) => n,
    None => unreachable!(),
};

/// Configuration for a [`DeltaTokenStore`].
#[derive(Clone, Debug)]
pub struct DeltaTokenStoreConfig {
    /// Number of (table, query) tokens kept in memory.
    /// Default: 256
    pub cache_capacity: NonZeroUsize,
}

impl Default for DeltaTokenStoreConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Configuration key of a delta token. Fails on an invalid table name or
/// query id.
pub fn delta_token_key(table_name: &str, query_id: &str) -> Result<String> {
    validate_table_name(table_name)?;
    validate_query_id(query_id)?;
    Ok(format!("dt.{}.{}", table_name, query_id))
}

fn from_millis(key: &str, millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        SyncError::Corruption(format!("delta token '{}' is out of range: {}", key, millis))
    })
}

/// Cached, persistent delta tokens.
pub struct DeltaTokenStore<S: LocalStore> {
    store: S,
    cache: Mutex<LruCache<(String, String), DateTime<Utc>>>,
}

impl<S: LocalStore> DeltaTokenStore<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, DeltaTokenStoreConfig::default())
    }

    pub fn with_config(store: S, config: DeltaTokenStoreConfig) -> Self {
        Self {
            store,
            cache: Mutex::new(LruCache::new(config.cache_capacity)),
        }
    }

    /// Current token, or the Unix epoch if none was ever set.
    pub fn get(&self, table_name: &str, query_id: &str) -> Result<DateTime<Utc>> {
        let key = delta_token_key(table_name, query_id)?;
        let cache_key = (table_name.to_string(), query_id.to_string());

        let mut cache = self.cache.lock();
        if let Some(token) = cache.get(&cache_key) {
            return Ok(*token);
        }

        let token = match read_config_value(&self.store, &key)? {
            None => DateTime::<Utc>::UNIX_EPOCH,
            Some(Value::Null) => {
                return Err(SyncError::Corruption(format!(
                    "delta token '{}' has no value",
                    key
                )))
            }
            Some(value) => from_millis(&key, integer_value(&key, &value)?)?,
        };

        cache.put(cache_key, token);
        Ok(token)
    }

    /// Persist a new token. Sub-millisecond precision is dropped.
    pub fn set(&self, table_name: &str, query_id: &str, token: DateTime<Utc>) -> Result<()> {
        let key = delta_token_key(table_name, query_id)?;
        let millis = token.timestamp_millis();

        let mut cache = self.cache.lock();
        write_config_value(&self.store, &key, Value::from(millis))?;
        cache.put(
            (table_name.to_string(), query_id.to_string()),
            from_millis(&key, millis)?,
        );

        debug!(key = %key, millis, "delta token set");
        Ok(())
    }

    /// Forget the token so the next pull starts from the epoch.
    pub fn reset(&self, table_name: &str, query_id: &str) -> Result<()> {
        let key = delta_token_key(table_name, query_id)?;

        let mut cache = self.cache.lock();
        cache.pop(&(table_name.to_string(), query_id.to_string()));
        delete_config_value(&self.store, &key)?;

        debug!(key = %key, "delta token reset");
        Ok(())
    }

    /// Drop the cached token only; the persisted row is kept.
    pub fn invalidate_cache(&self, table_name: &str, query_id: &str) -> Result<()> {
        delta_token_key(table_name, query_id)?;
        self.cache
            .lock()
            .pop(&(table_name.to_string(), query_id.to_string()));
        Ok(())
    }
}
