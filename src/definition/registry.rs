use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;

use super::entity_definition::EntityDefinition;
use super::schema::SchemaDocument;
use crate::config::CrudConfig;
use crate::core::{CrudError, Result};

/// First phase of building a [`DefinitionSet`]: definitions are collected
/// under their entity names, children are not known yet.
///
/// Adding returns a new builder, so a half-built set is never observable.
#[derive(Debug, Default)]
pub struct DefinitionSetBuilder {
    definitions: Vec<(String, EntityDefinition)>,
}

impl DefinitionSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_definition(mut self, name: impl Into<String>, definition: EntityDefinition) -> Result<Self> {
        let name = name.into();
        if self.definitions.iter().any(|(existing, _)| existing == &name) {
            return Err(CrudError::Schema(format!("Entity '{}' is defined twice", name)));
        }
        self.definitions.push((name, definition));
        Ok(self)
    }

    pub fn from_document(document: SchemaDocument, config: &CrudConfig) -> Result<Self> {
        let mut builder = Self::new();
        for (name, schema) in document.entities.0 {
            let definition = EntityDefinition::from_schema(&name, schema, config)?;
            builder = builder.with_definition(name, definition)?;
        }
        Ok(builder)
    }

    /// Second phase: registers every reference field as a child of the
    /// definition it points at and freezes the result.
    pub fn link(mut self) -> Result<DefinitionSet> {
        let mut links = Vec::new();
        for (entity, definition) in &self.definitions {
            for (field, target) in definition.reference_fields() {
                let parent = self
                    .definitions
                    .iter()
                    .position(|(name, _)| name == &target.entity)
                    .ok_or_else(|| {
                        CrudError::Schema(format!(
                            "Field '{}' of '{}' references unknown entity '{}'",
                            field, entity, target.entity
                        ))
                    })?;
                links.push((parent, definition.table().to_string(), field.to_string(), entity.clone()));
            }
        }

        for (parent, table, field, entity) in links {
            debug!("Linking child {}.{} to '{}'", table, field, self.definitions[parent].0);
            self.definitions[parent].1.add_child(table, field, entity);
        }

        let definitions = self
            .definitions
            .into_iter()
            .map(|(name, definition)| (name, Arc::new(definition)))
            .collect();
        Ok(DefinitionSet { definitions })
    }
}

/// Every linked definition, shared read-only by name.
#[derive(Debug, Clone, Default)]
pub struct DefinitionSet {
    definitions: BTreeMap<String, Arc<EntityDefinition>>,
}

impl DefinitionSet {
    /// Parses a JSON schema document and runs both build phases.
    ///
    /// # Examples
    ///
    /// ```
    /// use crudkit::{CrudConfig, DefinitionSet};
    ///
    /// let set = DefinitionSet::from_json_str(r#"{
    ///     "author": {"table": "author", "fields": {"name": {"type": "text"}}},
    ///     "book": {"table": "book", "fields": {
    ///         "author": {"type": "reference",
    ///                    "reference": {"table": "author", "nameField": "name", "entity": "author"}}
    ///     }}
    /// }"#, &CrudConfig::default()).unwrap();
    ///
    /// let author = set.get("author").unwrap();
    /// assert_eq!(author.children()[0].table, "book");
    /// ```
    pub fn from_json_str(json: &str, config: &CrudConfig) -> Result<Self> {
        let document = SchemaDocument::from_json_str(json)?;
        DefinitionSetBuilder::from_document(document, config)?.link()
    }

    pub fn from_document(document: SchemaDocument, config: &CrudConfig) -> Result<Self> {
        DefinitionSetBuilder::from_document(document, config)?.link()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<EntityDefinition>> {
        self.definitions.get(name)
    }

    /// Like [`get`](Self::get) but an unknown name is an error.
    pub fn require(&self, name: &str) -> Result<&Arc<EntityDefinition>> {
        self.get(name)
            .ok_or_else(|| CrudError::Schema(format!("Unknown entity '{}'", name)))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<EntityDefinition>)> {
        self.definitions.iter().map(|(name, def)| (name.as_str(), def))
    }

    /// The entity name whose definition stores its rows in `table`.
    pub fn entity_name_for_table(&self, table: &str) -> Option<&str> {
        self.iter()
            .find(|(_, def)| def.table() == table)
            .map(|(name, _)| name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn library() -> SchemaDocument {
        SchemaDocument::from_json_value(json!({
            "library": {
                "table": "lib",
                "label": "Library",
                "deleteCascade": true,
                "fields": {"name": {"type": "text", "required": true}}
            },
            "book": {
                "table": "book",
                "fields": {
                    "title": {"type": "text"},
                    "library": {"type": "reference",
                                "reference": {"table": "lib", "nameField": "name", "entity": "library"}}
                }
            },
            "shelf": {
                "table": "shelf",
                "pageSize": 10,
                "fields": {
                    "library": {"type": "reference",
                                "reference": {"table": "lib", "nameField": "name", "entity": "library"}}
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_linking_registers_children() {
        let set = DefinitionSet::from_document(library(), &CrudConfig::default()).unwrap();
        let library = set.get("library").unwrap();
        let children: Vec<(&str, &str, &str)> = library
            .children()
            .iter()
            .map(|c| (c.table.as_str(), c.field.as_str(), c.entity.as_str()))
            .collect();
        assert_eq!(children, vec![("book", "library", "book"), ("shelf", "library", "shelf")]);
        assert!(set.get("book").unwrap().children().is_empty());
    }

    #[test]
    fn test_schema_defaults() {
        let set = DefinitionSet::from_document(library(), &CrudConfig::default().page_size(40)).unwrap();
        assert_eq!(set.get("library").unwrap().label(), "Library");
        assert_eq!(set.get("book").unwrap().label(), "book");
        assert_eq!(set.get("book").unwrap().page_size(), 40);
        assert_eq!(set.get("shelf").unwrap().page_size(), 10);
        assert!(set.get("library").unwrap().is_delete_cascade());
        assert_eq!(set.entity_name_for_table("lib"), Some("library"));
    }

    #[test]
    fn test_unknown_reference_target() {
        let document = SchemaDocument::from_json_value(json!({
            "book": {
                "table": "book",
                "fields": {
                    "author": {"type": "reference",
                               "reference": {"table": "author", "nameField": "name", "entity": "author"}}
                }
            }
        }))
        .unwrap();
        let err = DefinitionSet::from_document(document, &CrudConfig::default()).unwrap_err();
        assert!(err.to_string().contains("unknown entity 'author'"));
    }

    #[test]
    fn test_implicit_field_declaration_rejected() {
        let document = SchemaDocument::from_json_value(json!({
            "book": {"table": "book", "fields": {"id": {"type": "int"}}}
        }))
        .unwrap();
        assert!(DefinitionSet::from_document(document, &CrudConfig::default()).is_err());
    }
}
