//! Per-table settings persisted in the config table.

use super::{integer_value, read_config_value, write_config_value, SettingsProvider};
use crate::error::{Result, SyncError};
use crate::store::LocalStore;
use crate::types::SystemProperties;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

const SYSTEM_PROPERTIES_PREFIX: &str = "systemProperties|";

fn system_properties_key(table_name: &str) -> Result<String> {
    if table_name.trim().is_empty() {
        return Err(SyncError::invalid_argument(
            "table_name",
            "table name cannot be empty",
        ));
    }
    Ok(format!("{}{}", SYSTEM_PROPERTIES_PREFIX, table_name))
}

/// [`SettingsProvider`] backed by rows of the `__config` table.
///
/// Tables with no recorded settings carry no system properties.
pub struct StoreSettings<S: LocalStore> {
    store: S,
    cache: Mutex<HashMap<String, SystemProperties>>,
}

impl<S: LocalStore> StoreSettings<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Record which system columns a table carries.
    pub fn set_system_properties(
        &self,
        table_name: &str,
        properties: SystemProperties,
    ) -> Result<()> {
        let key = system_properties_key(table_name)?;
        let mut cache = self.cache.lock();
        write_config_value(&self.store, &key, Value::from(properties.bits()))?;
        cache.insert(table_name.to_string(), properties);
        Ok(())
    }
}

impl<S: LocalStore + Send + Sync> SettingsProvider for StoreSettings<S> {
    fn system_properties(&self, table_name: &str) -> Result<SystemProperties> {
        let key = system_properties_key(table_name)?;
        let mut cache = self.cache.lock();
        if let Some(properties) = cache.get(table_name) {
            return Ok(*properties);
        }

        let properties = match read_config_value(&self.store, &key)? {
            None => SystemProperties::empty(),
            Some(value) => {
                let bits = u32::try_from(integer_value(&key, &value)?).map_err(|_| {
                    SyncError::Corruption(format!("'{}' is not a system property set", key))
                })?;
                SystemProperties::from_bits_truncate(bits)
            }
        };

        cache.insert(table_name.to_string(), properties);
        Ok(properties)
    }
}
