// ============================================================================
// Staged Changes
// ============================================================================
//
// Writes against the memory store are recorded as commands first and applied
// in one step. Applying checks every command before touching any table, so a
// change set lands completely or not at all.
//
// ============================================================================

use std::collections::{HashMap, HashSet};

use super::table::Table;
use crate::core::{CrudError, DELETED_AT, Result, Row, Value};

/// A single staged write.
#[derive(Debug, Clone)]
pub enum Change {
    /// Store a new row under a free id
    InsertRow { table: String, id: i64, row: Row },

    /// Replace an existing row
    UpdateRow { table: String, id: i64, row: Row },

    /// Mark an existing row as deleted
    SoftDelete {
        table: String,
        id: i64,
        deleted_at: Value,
    },
}

impl Change {
    /// Get the table name affected by this change
    pub fn table_name(&self) -> &str {
        match self {
            Change::InsertRow { table, .. } => table,
            Change::UpdateRow { table, .. } => table,
            Change::SoftDelete { table, .. } => table,
        }
    }

    pub fn row_id(&self) -> i64 {
        match self {
            Change::InsertRow { id, .. } | Change::UpdateRow { id, .. } | Change::SoftDelete { id, .. } => *id,
        }
    }

    fn check(&self, tables: &HashMap<String, Table>) -> Result<()> {
        let table = tables
            .get(self.table_name())
            .ok_or_else(|| CrudError::Backend(format!("Table '{}' not found", self.table_name())))?;
        let id = self.row_id();
        match self {
            Change::InsertRow { .. } if table.contains(id) => Err(CrudError::Backend(format!(
                "Row {} already exists in '{}'",
                id,
                self.table_name()
            ))),
            Change::UpdateRow { .. } | Change::SoftDelete { .. } if !table.contains(id) => {
                Err(CrudError::Backend(format!(
                    "Row {} vanished from '{}'",
                    id,
                    self.table_name()
                )))
            }
            _ => Ok(()),
        }
    }

    fn apply(self, tables: &mut HashMap<String, Table>) {
        let Some(table) = tables.get_mut(self.table_name()) else {
            return;
        };
        match self {
            Change::InsertRow { id, row, .. } => table.insert(id, row),
            Change::UpdateRow { id, row, .. } => table.replace(id, row),
            Change::SoftDelete { id, deleted_at, .. } => table.set_value(id, DELETED_AT, deleted_at),
        }
    }
}

/// Ordered changes applied together.
#[derive(Debug, Default)]
pub struct ChangeSet {
    changes: Vec<Change>,
    deleted: HashSet<(String, i64)>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: Change) {
        if let Change::SoftDelete { table, id, .. } = &change {
            self.deleted.insert((table.clone(), *id));
        }
        self.changes.push(change);
    }

    /// Whether a soft delete of this row is already staged.
    pub fn deletes(&self, table: &str, id: i64) -> bool {
        self.deleted.contains(&(table.to_string(), id))
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Applies every change, or none of them if any cannot be applied.
    /// Returns the number of changes applied.
    pub fn apply(self, tables: &mut HashMap<String, Table>) -> Result<usize> {
        for change in &self.changes {
            change.check(tables)?;
        }
        let count = self.changes.len();
        for change in self.changes {
            change.apply(tables);
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::table::TableSchema;

    fn tables() -> HashMap<String, Table> {
        let mut table = Table::new(TableSchema::new(
            "post",
            vec!["id".into(), "deleted_at".into(), "title".into()],
        ));
        table.insert(1, Row::from([("title".to_string(), Value::from("a"))]));
        HashMap::from([("post".to_string(), table)])
    }

    #[test]
    fn test_change_table_name() {
        let change = Change::SoftDelete {
            table: "post".into(),
            id: 1,
            deleted_at: Value::from("now"),
        };
        assert_eq!(change.table_name(), "post");
        assert_eq!(change.row_id(), 1);
    }

    #[test]
    fn test_apply_all() {
        let mut tables = tables();
        let mut changes = ChangeSet::new();
        changes.push(Change::InsertRow {
            table: "post".into(),
            id: 2,
            row: Row::new(),
        });
        changes.push(Change::SoftDelete {
            table: "post".into(),
            id: 1,
            deleted_at: Value::from("now"),
        });
        assert!(changes.deletes("post", 1));
        assert_eq!(changes.apply(&mut tables).unwrap(), 2);
        assert!(tables["post"].get_live(1).is_none());
        assert!(tables["post"].get_live(2).is_some());
    }

    #[test]
    fn test_nothing_applied_when_one_change_fails() {
        let mut tables = tables();
        let mut changes = ChangeSet::new();
        changes.push(Change::SoftDelete {
            table: "post".into(),
            id: 1,
            deleted_at: Value::from("now"),
        });
        changes.push(Change::SoftDelete {
            table: "comment".into(),
            id: 1,
            deleted_at: Value::from("now"),
        });
        assert!(changes.apply(&mut tables).is_err());
        assert!(tables["post"].get_live(1).is_some());
    }
}
