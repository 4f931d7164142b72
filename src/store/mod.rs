//! The local store abstraction the sync engine is layered on.
//!
//! A local store holds synchronized items as JSON objects keyed by their
//! string `id` member. The change tracker, the delta-token store and the
//! table settings all talk to a store only through [`LocalStore`].

mod memory;

pub use memory::MemoryStore;

use crate::error::{Result, SyncError};
use crate::query::QueryDescription;
use crate::types::columns;
use serde_json::Value;
use std::sync::Arc;

/// CRUD surface of a persistent local store.
pub trait LocalStore {
    /// Prepare the store for use (create tables, open files).
    fn initialize(&self) -> Result<()>;

    /// Fetch a single item by id.
    fn lookup(&self, table_name: &str, id: &str) -> Result<Option<Value>>;

    /// Run a query and return the matching (projected) items.
    fn read(&self, query: &QueryDescription) -> Result<Vec<Value>>;

    /// Delete every item matching the query.
    fn delete_by_query(&self, query: &QueryDescription) -> Result<()>;

    /// Delete items by id. Unknown ids are ignored.
    fn delete(&self, table_name: &str, ids: &[String]) -> Result<()>;

    /// Insert or update items.
    fn upsert(&self, table_name: &str, items: &[Value], ignore_missing_columns: bool)
        -> Result<()>;
}

impl<S: LocalStore + ?Sized> LocalStore for &S {
    fn initialize(&self) -> Result<()> {
        (**self).initialize()
    }

    fn lookup(&self, table_name: &str, id: &str) -> Result<Option<Value>> {
        (**self).lookup(table_name, id)
    }

    fn read(&self, query: &QueryDescription) -> Result<Vec<Value>> {
        (**self).read(query)
    }

    fn delete_by_query(&self, query: &QueryDescription) -> Result<()> {
        (**self).delete_by_query(query)
    }

    fn delete(&self, table_name: &str, ids: &[String]) -> Result<()> {
        (**self).delete(table_name, ids)
    }

    fn upsert(
        &self,
        table_name: &str,
        items: &[Value],
        ignore_missing_columns: bool,
    ) -> Result<()> {
        (**self).upsert(table_name, items, ignore_missing_columns)
    }
}

impl<S: LocalStore + ?Sized> LocalStore for Arc<S> {
    fn initialize(&self) -> Result<()> {
        (**self).initialize()
    }

    fn lookup(&self, table_name: &str, id: &str) -> Result<Option<Value>> {
        (**self).lookup(table_name, id)
    }

    fn read(&self, query: &QueryDescription) -> Result<Vec<Value>> {
        (**self).read(query)
    }

    fn delete_by_query(&self, query: &QueryDescription) -> Result<()> {
        (**self).delete_by_query(query)
    }

    fn delete(&self, table_name: &str, ids: &[String]) -> Result<()> {
        (**self).delete(table_name, ids)
    }

    fn upsert(
        &self,
        table_name: &str,
        items: &[Value],
        ignore_missing_columns: bool,
    ) -> Result<()> {
        (**self).upsert(table_name, items, ignore_missing_columns)
    }
}

/// The `id` member of an item.
pub fn item_id(item: &Value) -> Result<&str> {
    match item.get(columns::ID) {
        Some(Value::String(id)) if !id.is_empty() => Ok(id),
        Some(other) => Err(SyncError::InvalidItem(format!(
            "`{}` must be a non-empty string, got {}",
            columns::ID,
            other
        ))),
        None => Err(SyncError::InvalidItem(format!(
            "missing `{}` member",
            columns::ID
        ))),
    }
}
