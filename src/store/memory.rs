//! In-memory local store.

use super::{item_id, LocalStore};
use crate::error::{Result, SyncError};
use crate::query::QueryDescription;
use crate::types::{columns, system_tables};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};

/// One table: rows keyed by id, and an optional fixed column set.
#[derive(Default)]
struct Table {
    /// `None` accepts any member.
    columns: Option<HashSet<String>>,
    rows: BTreeMap<String, Map<String, Value>>,
}

impl Table {
    fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set: HashSet<String> = columns.into_iter().map(Into::into).collect();
        set.insert(columns::ID.to_string());
        Self {
            columns: Some(set),
            rows: BTreeMap::new(),
        }
    }

    /// Merge an item into its row, enforcing the column set.
    fn upsert(&mut self, table_name: &str, item: &Value, ignore_missing_columns: bool) -> Result<()> {
        let id = item_id(item)?.to_string();
        let members = item
            .as_object()
            .ok_or_else(|| SyncError::InvalidItem(format!("item in {} is not an object", table_name)))?;

        let mut row = self.rows.get(&id).cloned().unwrap_or_default();
        for (name, value) in members {
            if let Some(ref columns) = self.columns {
                if !columns.contains(name) {
                    if ignore_missing_columns {
                        continue;
                    }
                    return Err(SyncError::Store(format!(
                        "column `{}` is not defined on table {}",
                        name, table_name
                    )));
                }
            }
            row.insert(name.clone(), value.clone());
        }
        self.rows.insert(id, row);
        Ok(())
    }
}

/// A [`LocalStore`] holding every table in memory.
///
/// System tables are defined at construction. Other tables are created on
/// first upsert unless defined explicitly with [`MemoryStore::define_table`],
/// which also fixes their column set.
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let tables = system_tables::ALL
            .iter()
            .map(|name| (name.to_string(), Table::default()))
            .collect();
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Define a table with a fixed column set. The `id` column is implied.
    pub fn define_table(&self, table_name: &str, columns: &[&str]) {
        self.tables
            .write()
            .insert(table_name.to_string(), Table::with_columns(columns.iter().copied()));
    }

    /// Number of rows in a table (zero for unknown tables).
    pub fn row_count(&self, table_name: &str) -> usize {
        self.tables
            .read()
            .get(table_name)
            .map_or(0, |t| t.rows.len())
    }

    /// All rows of a table, ordered by id.
    pub fn rows(&self, table_name: &str) -> Vec<Value> {
        self.tables
            .read()
            .get(table_name)
            .map(|t| t.rows.values().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }

    /// Ids of the rows a query selects, after ordering and paging.
    fn matching_ids(table: &Table, query: &QueryDescription) -> Vec<String> {
        let matched = table
            .rows
            .values()
            .map(|row| Value::Object(row.clone()))
            .filter(|item| query.matches(item))
            .collect();

        let mut ids_only = query.clone();
        ids_only.selection = vec![columns::ID.to_string()];
        ids_only
            .shape(matched)
            .iter()
            .filter_map(|item| item_id(item).ok().map(str::to_string))
            .collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStore for MemoryStore {
    fn initialize(&self) -> Result<()> {
        let mut tables = self.tables.write();
        for name in system_tables::ALL {
            tables.entry(name.to_string()).or_default();
        }
        Ok(())
    }

    fn lookup(&self, table_name: &str, id: &str) -> Result<Option<Value>> {
        Ok(self
            .tables
            .read()
            .get(table_name)
            .and_then(|t| t.rows.get(id))
            .cloned()
            .map(Value::Object))
    }

    fn read(&self, query: &QueryDescription) -> Result<Vec<Value>> {
        let tables = self.tables.read();
        let table = match tables.get(&query.table_name) {
            Some(t) => t,
            None => return Ok(Vec::new()),
        };

        let matched = table
            .rows
            .values()
            .map(|row| Value::Object(row.clone()))
            .filter(|item| query.matches(item))
            .collect();

        Ok(query.shape(matched))
    }

    fn delete_by_query(&self, query: &QueryDescription) -> Result<()> {
        let mut tables = self.tables.write();
        if let Some(table) = tables.get_mut(&query.table_name) {
            for id in Self::matching_ids(table, query) {
                table.rows.remove(&id);
            }
        }
        Ok(())
    }

    fn delete(&self, table_name: &str, ids: &[String]) -> Result<()> {
        let mut tables = self.tables.write();
        if let Some(table) = tables.get_mut(table_name) {
            for id in ids {
                table.rows.remove(id);
            }
        }
        Ok(())
    }

    fn upsert(
        &self,
        table_name: &str,
        items: &[Value],
        ignore_missing_columns: bool,
    ) -> Result<()> {
        // Validate every id first so a bad item leaves the table untouched.
        for item in items {
            item_id(item)?;
        }

        let mut tables = self.tables.write();
        let table = tables.entry(table_name.to_string()).or_default();
        for item in items {
            table.upsert(table_name, item, ignore_missing_columns)?;
        }
        Ok(())
    }
}
