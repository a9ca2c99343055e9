use std::collections::HashMap;
use std::sync::Arc;

use crate::core::value::NULL;
use crate::core::{CrudError, ID, Result, Row, Value};
use crate::definition::EntityDefinition;

/// One record of a defined entity type: field name to value, bound to the
/// definition it was built from.
///
/// Only names known to the definition can be set. Values are stored as given;
/// type checks happen when a data access writes the entity.
#[derive(Debug, Clone)]
pub struct Entity {
    definition: Arc<EntityDefinition>,
    values: HashMap<String, Value>,
}

impl Entity {
    /// An entity with no field set at all.
    pub fn new(definition: Arc<EntityDefinition>) -> Self {
        Self {
            definition,
            values: HashMap::new(),
        }
    }

    pub fn definition(&self) -> &Arc<EntityDefinition> {
        &self.definition
    }

    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<()> {
        if !self.definition.has_field(field) {
            return Err(CrudError::UnknownField {
                table: self.definition.table().to_string(),
                field: field.to_string(),
            });
        }
        self.values.insert(field.to_string(), value.into());
        Ok(())
    }

    /// Sets a field the caller already knows to be defined.
    pub(crate) fn insert_known(&mut self, field: String, value: Value) {
        debug_assert!(self.definition.has_field(&field), "unknown field {}", field);
        self.values.insert(field, value);
    }

    /// The value of `field`, `None` if it was never set.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// The value of `field` with unset fields reading as null.
    pub fn get_or_null(&self, field: &str) -> &Value {
        self.values.get(field).unwrap_or(&NULL)
    }

    pub fn is_set(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    /// The id, unless it is unset or null.
    pub fn id(&self) -> Option<&Value> {
        self.get(ID).filter(|id| !id.is_null())
    }

    /// Every field of the definition, unset ones as null.
    pub fn to_row(&self) -> Row {
        self.definition
            .field_names()
            .into_iter()
            .map(|name| {
                let value = self.get_or_null(&name).clone();
                (name, value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StandardLabels;
    use crate::definition::{FieldKind, FieldSpec};

    fn definition() -> Arc<EntityDefinition> {
        Arc::new(EntityDefinition::new(
            "note",
            vec![("body".to_string(), FieldSpec::new(FieldKind::Text))],
            "Note",
            StandardLabels::default(),
        ))
    }

    #[test]
    fn test_set_and_get() {
        let mut entity = Entity::new(definition());
        assert_eq!(entity.get("body"), None);
        entity.set("body", "hello").unwrap();
        entity.set("version", 3).unwrap();
        assert_eq!(entity.get("body"), Some(&Value::from("hello")));
        assert_eq!(entity.get("version"), Some(&Value::Integer(3)));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut entity = Entity::new(definition());
        let err = entity.set("title", "x").unwrap_err();
        assert!(matches!(err, CrudError::UnknownField { ref field, .. } if field == "title"));
        assert!(!entity.is_set("title"));
    }

    #[test]
    fn test_no_coercion_on_set() {
        let mut entity = Entity::new(definition());
        entity.set("body", 42).unwrap();
        assert_eq!(entity.get("body"), Some(&Value::Integer(42)));
    }

    #[test]
    fn test_null_id_is_no_id() {
        let mut entity = Entity::new(definition());
        entity.set("id", Value::Null).unwrap();
        assert!(entity.is_set("id"));
        assert_eq!(entity.id(), None);
        assert_eq!(entity.to_row().len(), 6);
    }
}
