//! Sync bookkeeping kept in the `__config` system table.
//!
//! - [`DeltaTokenStore`]: per-(table, query) pull watermarks
//! - [`StoreSettings`]: per-table system properties
//!
//! Both persist one row per key (`{"id": key, "value": ...}`) and keep a
//! read cache in front of the store. Neither touches keys it does not own.

mod delta_token;
mod table;

pub use delta_token::{delta_token_key, DeltaTokenStore, DeltaTokenStoreConfig};
pub use table::StoreSettings;

use crate::error::{Result, SyncError};
use crate::store::LocalStore;
use crate::types::{columns, system_tables, SystemProperties};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Per-table settings consulted by the change tracker.
pub trait SettingsProvider: Send + Sync {
    /// System columns the table carries.
    fn system_properties(&self, table_name: &str) -> Result<SystemProperties>;
}

/// Member holding a configuration row's value.
const VALUE_MEMBER: &str = "value";

/// Lowest common denominator of path-segment and table-name rules.
static TABLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]{0,63}$").expect("table name pattern is valid"));

pub(crate) fn validate_table_name(table_name: &str) -> Result<()> {
    if TABLE_NAME.is_match(table_name) {
        Ok(())
    } else {
        Err(SyncError::invalid_argument(
            "table_name",
            format!("'{}' is an invalid table name", table_name),
        ))
    }
}

pub(crate) fn validate_query_id(query_id: &str) -> Result<()> {
    if query_id.trim().is_empty() {
        Err(SyncError::invalid_argument(
            "query_id",
            "query id cannot be empty or white space",
        ))
    } else {
        Ok(())
    }
}

/// The `value` member of a configuration row, if the row exists.
fn read_config_value<S: LocalStore + ?Sized>(store: &S, key: &str) -> Result<Option<Value>> {
    let row = store.lookup(system_tables::CONFIG, key)?;
    Ok(row.map(|r| r.get(VALUE_MEMBER).cloned().unwrap_or(Value::Null)))
}

fn write_config_value<S: LocalStore + ?Sized>(store: &S, key: &str, value: Value) -> Result<()> {
    let mut row = Map::new();
    row.insert(columns::ID.to_string(), Value::String(key.to_string()));
    row.insert(VALUE_MEMBER.to_string(), value);
    store.upsert(system_tables::CONFIG, &[Value::Object(row)], false)
}

fn delete_config_value<S: LocalStore + ?Sized>(store: &S, key: &str) -> Result<()> {
    store.delete(system_tables::CONFIG, &[key.to_string()])
}

/// An integer stored either as a JSON number or as numeric text.
fn integer_value(key: &str, value: &Value) -> Result<i64> {
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        SyncError::Corruption(format!("config value for '{}' is not an integer: {}", key, value))
    })
}
