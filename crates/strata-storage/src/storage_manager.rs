//! Process-wide table registry.

use dashmap::DashMap;
use strata_common::prelude::*;

use crate::table::SharedTable;

/// Registry of tables by name. Case-sensitive; duplicate adds are an error.
///
/// The registry itself is read-only during query execution; DML operators
/// mutate individual tables under their own write locks.
#[derive(Debug, Default)]
pub struct StorageManager {
    tables: DashMap<String, SharedTable>,
}

impl StorageManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&self, name: impl Into<String>, table: SharedTable) -> Result<()> {
        let name = name.into();
        if self.tables.contains_key(&name) {
            return Err(Error::already_exists("Table", name));
        }
        info!(table = %name, "registered table");
        self.tables.insert(name, table);
        Ok(())
    }

    pub fn get_table(&self, name: &str) -> Result<SharedTable> {
        self.tables
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::Sql(SqlError::TableNotFound(name.to_string())))
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn drop_table(&self, name: &str) -> Result<()> {
        self.tables
            .remove(name)
            .map(|_| info!(table = %name, "dropped table"))
            .ok_or_else(|| Error::Sql(SqlError::TableNotFound(name.to_string())))
    }

    /// All registered table names, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
