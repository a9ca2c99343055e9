use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::file::{FileProcessor, FileRequest, FileResponse};
use super::filter::{Filter, FilterOperator};
use super::validation;
use crate::core::{CrudError, FieldError, ID, Result, Row, Value, ValidationErrors};
use crate::definition::{EntityDefinition, FieldType};
use crate::entity::Entity;

/// Persistence operations over the entities of one definition.
///
/// Backends implement the storage primitives (`get` through
/// `fetch_references`). Entity construction, validation and the file field
/// delegation are provided on top of them and shared by every backend.
///
/// Absent rows are not errors: `get` yields `None` and `list_entries` an
/// empty list. Soft-deleted rows (non-null `deleted_at`) are invisible to
/// every operation except `count_by` with `exclude_deleted == false`.
#[async_trait]
pub trait DataAccess: Send + Sync {
    /// The definition this data access is bound to.
    fn definition(&self) -> &Arc<EntityDefinition>;

    fn file_processor(&self) -> &Arc<dyn FileProcessor>;

    /// The live entity with the given id.
    async fn get(&self, id: &Value) -> Result<Option<Entity>>;

    /// Live entities matching every condition of `filter`, in a stable order,
    /// skipping `skip` matches and returning at most `amount`.
    async fn list_entries(&self, filter: &Filter, skip: Option<usize>, amount: Option<usize>) -> Result<Vec<Entity>>;

    /// Stores a new row. The backend fills `id` (unless one is given),
    /// `created_at`, `updated_at`, `version` and `deleted_at` and writes them,
    /// with the normalised field values, back into `entity`.
    async fn create(&self, entity: &mut Entity) -> Result<()>;

    /// Stores the new values of the row with the entity's id, provided the
    /// stored version still equals the entity's `version`. Bumps the version
    /// and `updated_at` in storage and in `entity`.
    async fn update(&self, entity: &mut Entity) -> Result<()>;

    /// Soft-deletes the row, cascading to registered children when the
    /// definition asks for it. Returns whether a live row was deleted.
    async fn delete(&self, id: &Value) -> Result<bool>;

    /// Id to display name of every live row in `table`.
    async fn get_references(&self, table: &str, name_field: &str) -> Result<HashMap<Value, Value>>;

    /// Number of rows in `table` matching `params`, soft-deleted rows
    /// included only when `exclude_deleted` is false.
    async fn count_by(&self, table: &str, params: &Filter, exclude_deleted: bool) -> Result<usize>;

    /// Replaces raw ids in reference fields with `{id, name}` records.
    /// Null values and ids without a live row are left as they are.
    async fn fetch_references(&self, entities: &mut [Entity]) -> Result<()>;

    /// A fresh entity: editable fields null except fixed ones, `id` null,
    /// the other implicit fields unset.
    fn create_empty(&self) -> Entity {
        let definition = self.definition();
        let mut entity = Entity::new(definition.clone());
        for name in definition.editable_field_names() {
            let value = definition.fixed_value(&name).cloned().unwrap_or_default();
            entity.insert_known(name, value);
        }
        entity.insert_known(ID.to_string(), Value::Null);
        entity
    }

    /// Builds an entity from a raw row holding every field of the definition.
    fn hydrate(&self, row: &Row) -> Result<Entity> {
        let definition = self.definition();
        let mut entity = Entity::new(definition.clone());
        for name in definition.field_names() {
            let value = row.get(&name).cloned().ok_or_else(|| CrudError::MalformedRow {
                table: definition.table().to_string(),
                field: name.clone(),
            })?;
            entity.insert_known(name, value);
        }
        Ok(entity)
    }

    /// Number of live entities of this definition matching `filter`.
    async fn count(&self, filter: &Filter) -> Result<usize> {
        self.count_by(self.definition().table(), filter, true).await
    }

    /// Checks `entity` the way a form would before saving it: field types,
    /// required fields and that referenced rows exist (all reported per
    /// field), then unique fields against other live rows.
    async fn validate(&self, entity: &Entity) -> Result<()> {
        let definition = self.definition().clone();
        let mut errors = match validation::normalize(&definition, entity) {
            Ok(_) => ValidationErrors::new(),
            Err(CrudError::Validation(errors)) => errors,
            Err(other) => return Err(other),
        };

        for (field, target) in definition.reference_fields() {
            let id = entity.get_or_null(field).raw_id();
            if id.is_blank() || errors.get(field).is_some() {
                continue;
            }
            let exists = Filter::new().eq(ID, id.clone());
            if self.count_by(&target.table, &exists, true).await? == 0 {
                errors.add(
                    field,
                    FieldError::MissingReference {
                        table: target.table.clone(),
                        id: id.clone(),
                    },
                );
            }
        }
        errors.into_result()?;

        for name in definition.editable_field_names() {
            if !definition.is_unique(&name) {
                continue;
            }
            let value = entity.get_or_null(&name);
            if value.is_blank() {
                continue;
            }
            let mut others = Filter::new().eq(name.clone(), value.clone());
            if let Some(id) = entity.id() {
                others = others.with(ID, FilterOperator::NotEq, id.clone());
            }
            if self.count_by(definition.table(), &others, true).await? > 0 {
                return Err(CrudError::UniqueViolation {
                    field: name,
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    async fn create_files(&self, request: &FileRequest, entity: &Entity, entity_name: &str) -> Result<()> {
        for field in self.definition().editable_fields_of_type(FieldType::File) {
            self.file_processor()
                .create_file(request, entity, entity_name, &field)
                .await?;
        }
        Ok(())
    }

    async fn update_files(&self, request: &FileRequest, entity: &Entity, entity_name: &str) -> Result<()> {
        for field in self.definition().editable_fields_of_type(FieldType::File) {
            self.file_processor()
                .update_file(request, entity, entity_name, &field)
                .await?;
        }
        Ok(())
    }

    async fn delete_file(&self, entity: &Entity, entity_name: &str, field: &str) -> Result<()> {
        self.file_processor().delete_file(entity, entity_name, field).await
    }

    async fn delete_files(&self, entity: &Entity, entity_name: &str) -> Result<()> {
        for field in self.definition().editable_fields_of_type(FieldType::File) {
            self.file_processor()
                .delete_file(entity, entity_name, &field)
                .await?;
        }
        Ok(())
    }

    async fn render_file(&self, entity: &Entity, entity_name: &str, field: &str) -> Result<FileResponse> {
        self.file_processor().render_file(entity, entity_name, field).await
    }
}
