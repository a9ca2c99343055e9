use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use log::{debug, info, warn};

use super::change::{Change, ChangeSet};
use super::store::{MemoryStore, table_of};
use super::table::{Table, row_id};
use crate::core::{CREATED_AT, CrudError, DELETED_AT, ID, Result, Row, UPDATED_AT, VERSION, Value};
use crate::data::filter::ensure_known_fields;
use crate::data::validation::normalize;
use crate::data::{DataAccess, FileProcessor, Filter};
use crate::definition::{DefinitionSet, EntityDefinition, ReferenceTarget};
use crate::entity::Entity;

/// `DataAccess` over a [`MemoryStore`].
///
/// Ids are integers handed out as one past the highest stored id. Cascading
/// deletes need the definition set to follow children into their own
/// definitions; without it children are deleted without recursing further.
pub struct MemoryDataAccess {
    definition: Arc<EntityDefinition>,
    definitions: Option<Arc<DefinitionSet>>,
    store: Arc<MemoryStore>,
    file_processor: Arc<dyn FileProcessor>,
}

impl MemoryDataAccess {
    /// Binds `definition` to `store`, creating its table if needed.
    pub async fn new(
        definition: Arc<EntityDefinition>,
        store: Arc<MemoryStore>,
        file_processor: Arc<dyn FileProcessor>,
    ) -> Self {
        store.register(&definition).await;
        Self {
            definition,
            definitions: None,
            store,
            file_processor,
        }
    }

    pub fn with_definitions(mut self, definitions: Arc<DefinitionSet>) -> Self {
        self.definitions = Some(definitions);
        self
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    fn table(&self) -> &str {
        self.definition.table()
    }

    fn check_unique(&self, table: &Table, values: &Row, ignore_id: Option<i64>) -> Result<()> {
        for (name, value) in values {
            if self.definition.is_unique(name) {
                table.check_uniqueness(name, value, ignore_id)?;
            }
        }
        Ok(())
    }
}

/// Copies a stored row into the entity, keeping only defined fields.
fn write_back(entity: &mut Entity, row: Row) {
    for (name, value) in row {
        if entity.definition().has_field(&name) {
            entity.insert_known(name, value);
        }
    }
}

/// Stages the soft delete of a live row and, for cascading definitions,
/// of every live child row below it. Returns false when the row is not live.
fn stage_delete(
    tables: &HashMap<String, Table>,
    definitions: Option<&DefinitionSet>,
    definition: &EntityDefinition,
    id: i64,
    now: &Value,
    changes: &mut ChangeSet,
) -> Result<bool> {
    let table = table_of(tables, definition.table())?;
    if table.get_live(id).is_none() || changes.deletes(definition.table(), id) {
        return Ok(false);
    }
    changes.push(Change::SoftDelete {
        table: definition.table().to_string(),
        id,
        deleted_at: now.clone(),
    });
    if !definition.is_delete_cascade() {
        return Ok(true);
    }

    for child in definition.children() {
        let child_table = table_of(tables, &child.table)?;
        let child_ids: Vec<i64> = child_table
            .scan(true)
            .filter(|(_, row)| row.get(&child.field).and_then(row_id) == Some(id))
            .map(|(child_id, _)| child_id)
            .collect();
        let child_definition = definitions.and_then(|set| set.get(&child.entity));

        for child_id in child_ids {
            match child_definition {
                Some(child_definition) => {
                    stage_delete(tables, definitions, child_definition, child_id, now, changes)?;
                }
                None if !changes.deletes(&child.table, child_id) => {
                    changes.push(Change::SoftDelete {
                        table: child.table.clone(),
                        id: child_id,
                        deleted_at: now.clone(),
                    });
                }
                None => {}
            }
        }
    }
    Ok(true)
}

#[async_trait]
impl DataAccess for MemoryDataAccess {
    fn definition(&self) -> &Arc<EntityDefinition> {
        &self.definition
    }

    fn file_processor(&self) -> &Arc<dyn FileProcessor> {
        &self.file_processor
    }

    async fn get(&self, id: &Value) -> Result<Option<Entity>> {
        let Some(id) = row_id(id) else {
            return Ok(None);
        };
        let row = {
            let tables = self.store.read().await;
            table_of(&tables, self.table())?.get_live(id).cloned()
        };
        row.map(|row| self.hydrate(&row)).transpose()
    }

    async fn list_entries(&self, filter: &Filter, skip: Option<usize>, amount: Option<usize>) -> Result<Vec<Entity>> {
        ensure_known_fields(filter, self.table(), &self.definition.field_names())?;
        let case_sensitive = self.store.config().like_case_sensitive;
        let rows: Vec<Row> = {
            let tables = self.store.read().await;
            table_of(&tables, self.table())?
                .scan(true)
                .filter(|(_, row)| filter.matches(row, case_sensitive))
                .skip(skip.unwrap_or(0))
                .take(amount.unwrap_or(usize::MAX))
                .map(|(_, row)| row.clone())
                .collect()
        };
        rows.iter().map(|row| self.hydrate(row)).collect()
    }

    async fn create(&self, entity: &mut Entity) -> Result<()> {
        let mut row = normalize(&self.definition, entity)?;
        let now = self.store.timestamp();
        let mut tables = self.store.write().await;
        let table = table_of(&tables, self.table())?;

        let id = match entity.id() {
            Some(requested) => {
                let id = row_id(requested).ok_or_else(|| {
                    CrudError::Backend(format!("Memory tables use integer ids, got {}", requested))
                })?;
                if table.contains(id) {
                    return Err(CrudError::UniqueViolation {
                        field: ID.to_string(),
                        value: Value::Integer(id),
                    });
                }
                id
            }
            None => table.next_id()?,
        };
        self.check_unique(table, &row, None)?;

        row.insert(ID.to_string(), Value::Integer(id));
        row.insert(CREATED_AT.to_string(), now.clone());
        row.insert(UPDATED_AT.to_string(), now);
        row.insert(VERSION.to_string(), Value::Integer(1));
        row.insert(DELETED_AT.to_string(), Value::Null);

        let mut changes = ChangeSet::new();
        changes.push(Change::InsertRow {
            table: self.table().to_string(),
            id,
            row: row.clone(),
        });
        changes.apply(&mut tables)?;
        drop(tables);

        debug!("Created {} {}", self.table(), id);
        write_back(entity, row);
        Ok(())
    }

    async fn update(&self, entity: &mut Entity) -> Result<()> {
        let id_value = entity.get_or_null(ID).clone();
        let not_found = || CrudError::NotFound {
            entity: self.table().to_string(),
            id: id_value.clone(),
        };
        let id = row_id(&id_value).ok_or_else(not_found)?;
        let values = normalize(&self.definition, entity)?;
        let now = self.store.timestamp();

        let mut tables = self.store.write().await;
        let table = table_of(&tables, self.table())?;
        let stored = table.get_live(id).ok_or_else(not_found)?;

        let actual = stored.get(VERSION).cloned().unwrap_or_default();
        let expected = entity.get_or_null(VERSION).clone();
        if actual != expected {
            warn!(
                "Rejected stale update of {} {}: version {} is stored, {} was read",
                self.table(),
                id,
                actual,
                expected
            );
            return Err(CrudError::ConcurrencyConflict {
                table: self.table().to_string(),
                id: Value::Integer(id),
                expected,
                actual,
            });
        }
        self.check_unique(table, &values, Some(id))?;

        let mut row = stored.clone();
        row.extend(values);
        row.insert(VERSION.to_string(), Value::Integer(actual.as_i64().unwrap_or(0) + 1));
        row.insert(UPDATED_AT.to_string(), now);

        let mut changes = ChangeSet::new();
        changes.push(Change::UpdateRow {
            table: self.table().to_string(),
            id,
            row: row.clone(),
        });
        changes.apply(&mut tables)?;
        drop(tables);

        debug!("Updated {} {}", self.table(), id);
        write_back(entity, row);
        Ok(())
    }

    async fn delete(&self, id: &Value) -> Result<bool> {
        let Some(id) = row_id(id) else {
            return Ok(false);
        };
        let now = self.store.timestamp();
        let mut tables = self.store.write().await;

        let mut changes = ChangeSet::new();
        let deleted = stage_delete(
            &tables,
            self.definitions.as_deref(),
            &self.definition,
            id,
            &now,
            &mut changes,
        )?;
        if !deleted {
            return Ok(false);
        }
        let applied = changes.apply(&mut tables)?;
        drop(tables);

        if applied > 1 {
            info!(
                "Deleted {} {} with {} dependent rows",
                self.table(),
                id,
                applied - 1
            );
        } else {
            debug!("Deleted {} {}", self.table(), id);
        }
        Ok(true)
    }

    async fn get_references(&self, table: &str, name_field: &str) -> Result<HashMap<Value, Value>> {
        self.store.references(table, name_field).await
    }

    async fn count_by(&self, table: &str, params: &Filter, exclude_deleted: bool) -> Result<usize> {
        self.store.count(table, params, exclude_deleted).await
    }

    async fn fetch_references(&self, entities: &mut [Entity]) -> Result<()> {
        let lookups: Vec<(String, ReferenceTarget, HashSet<Value>)> = self
            .definition
            .reference_fields()
            .map(|(field, target)| {
                let ids: HashSet<Value> = entities
                    .iter()
                    .filter_map(|entity| entity.get(field))
                    .filter(|value| !value.is_blank() && value.as_reference().is_none())
                    .cloned()
                    .collect();
                (field.to_string(), target.clone(), ids)
            })
            .filter(|(_, _, ids)| !ids.is_empty())
            .collect();
        if lookups.is_empty() {
            return Ok(());
        }

        let names = try_join_all(
            lookups
                .iter()
                .map(|(_, target, ids)| self.store.names_for(&target.table, &target.name_field, ids)),
        )
        .await?;

        for ((field, _, _), names) in lookups.iter().zip(names) {
            for entity in entities.iter_mut() {
                let resolved = entity.get(field).and_then(|raw| {
                    names
                        .get(raw)
                        .map(|name| Value::reference(raw.clone(), name.clone()))
                });
                if let Some(resolved) = resolved {
                    entity.insert_known(field.clone(), resolved);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StandardLabels;
    use crate::data::NullFileProcessor;
    use crate::definition::{FieldKind, FieldSpec};

    async fn tags() -> MemoryDataAccess {
        let definition = EntityDefinition::new(
            "tag",
            vec![("name".to_string(), FieldSpec::new(FieldKind::Text).required().unique())],
            "Tag",
            StandardLabels::default(),
        );
        MemoryDataAccess::new(
            Arc::new(definition),
            Arc::new(MemoryStore::new()),
            Arc::new(NullFileProcessor),
        )
        .await
    }

    #[tokio::test]
    async fn test_create_assigns_implicit_fields() {
        let data = tags().await;
        let mut tag = data.create_empty();
        tag.set("name", "rust").unwrap();
        data.create(&mut tag).await.unwrap();

        assert_eq!(tag.id(), Some(&Value::Integer(1)));
        assert_eq!(tag.get(VERSION), Some(&Value::Integer(1)));
        assert_eq!(tag.get(DELETED_AT), Some(&Value::Null));
        assert_eq!(tag.get(CREATED_AT), tag.get(UPDATED_AT));
    }

    #[tokio::test]
    async fn test_explicit_id_is_kept() {
        let data = tags().await;
        let mut tag = data.create_empty();
        tag.set("id", 10).unwrap();
        tag.set("name", "a").unwrap();
        data.create(&mut tag).await.unwrap();

        let mut next = data.create_empty();
        next.set("name", "b").unwrap();
        data.create(&mut next).await.unwrap();
        assert_eq!(next.id(), Some(&Value::Integer(11)));

        let mut clash = data.create_empty();
        clash.set("id", 10).unwrap();
        clash.set("name", "c").unwrap();
        let err = data.create(&mut clash).await.unwrap_err();
        assert!(matches!(err, CrudError::UniqueViolation { ref field, .. } if field == "id"));
    }

    #[tokio::test]
    async fn test_non_numeric_id_reads_as_absent() {
        let data = tags().await;
        assert!(data.get(&Value::from("abc")).await.unwrap().is_none());
        assert!(!data.delete(&Value::from("abc")).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_of_deleted_row_is_not_found() {
        let data = tags().await;
        let mut tag = data.create_empty();
        tag.set("name", "gone").unwrap();
        data.create(&mut tag).await.unwrap();
        assert!(data.delete(&Value::Integer(1)).await.unwrap());
        assert!(!data.delete(&Value::Integer(1)).await.unwrap());

        let err = data.update(&mut tag).await.unwrap_err();
        assert!(matches!(err, CrudError::NotFound { .. }));
    }
}
