use std::collections::{HashMap, HashSet};
use std::fmt::Write;

use chrono::Utc;
use log::{debug, warn};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::table::{Table, TableSchema, row_id};
use crate::config::{CrudConfig, DEFAULT_TIMESTAMP_FORMAT};
use crate::core::{CrudError, Result, Row, Value};
use crate::data::Filter;
use crate::definition::EntityDefinition;

/// Process-local tables shared by every memory data access built on it.
///
/// All tables sit behind a single lock so a cascading delete can stage and
/// apply changes to several tables as one step.
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
    config: CrudConfig,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_config(CrudConfig::default())
    }

    pub fn with_config(config: CrudConfig) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &CrudConfig {
        &self.config
    }

    /// Creates the table of `definition`, or extends an existing one with
    /// any columns it lacks.
    pub async fn register(&self, definition: &EntityDefinition) {
        let columns = definition.field_names();
        let mut tables = self.tables.write().await;
        match tables.get_mut(definition.table()) {
            Some(table) => table.add_columns(&columns),
            None => {
                debug!("Creating memory table '{}'", definition.table());
                let schema = TableSchema::new(definition.table(), columns);
                tables.insert(definition.table().to_string(), Table::new(schema));
            }
        }
    }

    pub async fn table_exists(&self, table: &str) -> bool {
        self.tables.read().await.contains_key(table)
    }

    pub async fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Every stored row of `table` in id order, soft-deleted ones included.
    pub async fn raw_rows(&self, table: &str) -> Result<Vec<(i64, Row)>> {
        let tables = self.tables.read().await;
        let table = table_of(&tables, table)?;
        Ok(table.scan(false).map(|(id, row)| (id, row.clone())).collect())
    }

    pub async fn count(&self, table: &str, filter: &Filter, exclude_deleted: bool) -> Result<usize> {
        let tables = self.tables.read().await;
        let table = table_of(&tables, table)?;
        let case_sensitive = self.config.like_case_sensitive;
        Ok(table
            .scan(exclude_deleted)
            .filter(|(_, row)| filter.matches(row, case_sensitive))
            .count())
    }

    /// Id to `name_field` for every live row of `table`.
    pub async fn references(&self, table: &str, name_field: &str) -> Result<HashMap<Value, Value>> {
        let tables = self.tables.read().await;
        let table = table_of(&tables, table)?;
        ensure_column(table, name_field)?;
        Ok(table
            .scan(true)
            .map(|(id, row)| {
                let name = row.get(name_field).cloned().unwrap_or_default();
                (Value::Integer(id), name)
            })
            .collect())
    }

    /// Names of the live rows among `ids`, keyed by the id value as given.
    /// Ids without a live row are left out.
    pub async fn names_for(&self, table: &str, name_field: &str, ids: &HashSet<Value>) -> Result<HashMap<Value, Value>> {
        let tables = self.tables.read().await;
        let table = table_of(&tables, table)?;
        ensure_column(table, name_field)?;
        Ok(ids
            .iter()
            .filter_map(|id| {
                let row = table.get_live(row_id(id)?)?;
                let name = row.get(name_field).cloned().unwrap_or_default();
                Some((id.clone(), name))
            })
            .collect())
    }

    pub(crate) async fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Table>> {
        self.tables.read().await
    }

    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Table>> {
        self.tables.write().await
    }

    /// The current UTC time in the configured timestamp format, or the
    /// default format when the configured one does not render.
    pub(crate) fn timestamp(&self) -> Value {
        let now = Utc::now();
        let mut text = String::new();
        if write!(text, "{}", now.format(&self.config.timestamp_format)).is_err() {
            warn!("Invalid timestamp format '{}'", self.config.timestamp_format);
            text = now.format(DEFAULT_TIMESTAMP_FORMAT).to_string();
        }
        Value::Text(text)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn table_of<'a>(tables: &'a HashMap<String, Table>, name: &str) -> Result<&'a Table> {
    tables
        .get(name)
        .ok_or_else(|| CrudError::Backend(format!("Table '{}' not found", name)))
}

fn ensure_column(table: &Table, column: &str) -> Result<()> {
    if table.schema().has_column(column) {
        Ok(())
    } else {
        Err(CrudError::Backend(format!(
            "Column '{}' not found in table '{}'",
            column,
            table.schema().name()
        )))
    }
}
