use std::collections::BTreeMap;

use crate::core::{CrudError, DELETED_AT, Result, Row, Value};

/// Memory tables key rows by integer id; numeric text ids are accepted too.
pub fn row_id(value: &Value) -> Option<i64> {
    match value.raw_id() {
        Value::Integer(i) => Some(*i),
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A row counts as live until its `deleted_at` is set.
pub fn is_live(row: &Row) -> bool {
    row.get(DELETED_AT).is_none_or(Value::is_null)
}

#[derive(Debug, Clone)]
pub struct TableSchema {
    name: String,
    columns: Vec<String>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    schema: TableSchema,
    rows: BTreeMap<i64, Row>,
}

impl Table {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Adds columns a newer definition declares; existing rows read them as null.
    pub fn add_columns(&mut self, columns: &[String]) {
        for column in columns {
            if self.schema.has_column(column) {
                continue;
            }
            self.schema.columns.push(column.clone());
            for row in self.rows.values_mut() {
                row.insert(column.clone(), Value::Null);
            }
        }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.rows.contains_key(&id)
    }

    pub fn get(&self, id: i64) -> Option<&Row> {
        self.rows.get(&id)
    }

    pub fn get_live(&self, id: i64) -> Option<&Row> {
        self.get(id).filter(|row| is_live(row))
    }

    /// Rows in id order, soft-deleted ones only when asked for.
    pub fn scan(&self, exclude_deleted: bool) -> impl Iterator<Item = (i64, &Row)> {
        self.rows
            .iter()
            .filter(move |(_, row)| !exclude_deleted || is_live(row))
            .map(|(id, row)| (*id, row))
    }

    /// One past the highest stored id, soft-deleted rows included.
    pub fn next_id(&self) -> Result<i64> {
        match self.rows.keys().next_back() {
            None => Ok(1),
            Some(last) => last.checked_add(1).ok_or_else(|| {
                CrudError::Backend(format!("Table '{}' has no id left after {}", self.schema.name, last))
            }),
        }
    }

    /// Fails when another live row already holds `value` in `column`.
    /// Null never collides.
    pub fn check_uniqueness(&self, column: &str, value: &Value, ignore_id: Option<i64>) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        let collision = self
            .scan(true)
            .filter(|(id, _)| Some(*id) != ignore_id)
            .any(|(_, row)| row.get(column) == Some(value));
        if collision {
            return Err(CrudError::UniqueViolation {
                field: column.to_string(),
                value: value.clone(),
            });
        }
        Ok(())
    }

    pub(crate) fn insert(&mut self, id: i64, row: Row) {
        let row = self.complete(row);
        self.rows.insert(id, row);
    }

    pub(crate) fn replace(&mut self, id: i64, row: Row) {
        self.insert(id, row);
    }

    pub(crate) fn set_value(&mut self, id: i64, column: &str, value: Value) {
        if let Some(row) = self.rows.get_mut(&id) {
            row.insert(column.to_string(), value);
        }
    }

    /// Restricts a row to the table's columns, filling the missing ones with null.
    fn complete(&self, mut row: Row) -> Row {
        row.retain(|column, _| self.schema.has_column(column));
        for column in &self.schema.columns {
            row.entry(column.clone()).or_insert(Value::Null);
        }
        row
    }
}
