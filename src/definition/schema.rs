//! Parsed schema documents handed to the definition constructors.
//!
//! The shapes mirror the CRUD schema format: one object per entity, keyed by
//! entity name, each with a table, a label and a `fields` object whose key
//! order is the declaration order.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;

use super::field::{FieldKind, FieldSpec, FieldType, ReferenceTarget};
use crate::core::{CrudError, Result, Value};

/// A JSON object deserialized into `(key, value)` pairs in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V>(pub Vec<(String, V)>);

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, V>()? {
                    entries.push((key, value));
                }
                Ok(OrderedMap(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

/// Metadata of one field as written in a schema document.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldSchema {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub filepath: Option<String>,
    #[serde(default)]
    pub fixedvalue: Option<Value>,
    #[serde(default)]
    pub setitems: Option<Vec<String>>,
    #[serde(default, rename = "floatStep")]
    pub float_step: Option<f64>,
    #[serde(default)]
    pub reference: Option<ReferenceTarget>,
}

impl FieldSchema {
    /// Folds the flat key bag into a typed [`FieldSpec`]. Keys that do not
    /// belong to the declared type are dropped.
    pub fn into_spec(self, name: &str) -> Result<FieldSpec> {
        let kind = match self.field_type {
            FieldType::Text => FieldKind::Text,
            FieldType::Bool => FieldKind::Bool,
            FieldType::Int => FieldKind::Int,
            FieldType::Float => FieldKind::Float { step: self.float_step },
            FieldType::Date => FieldKind::Date,
            FieldType::DateTime => FieldKind::DateTime,
            FieldType::Set => FieldKind::Set {
                items: self.setitems.unwrap_or_default(),
            },
            FieldType::Reference => FieldKind::Reference(self.reference.ok_or_else(|| {
                CrudError::Schema(format!(
                    "Reference field '{}' needs a 'reference' block with table, nameField and entity",
                    name
                ))
            })?),
            FieldType::File => FieldKind::File { path: self.filepath },
            FieldType::Fixed => FieldKind::Fixed {
                value: self.fixedvalue.unwrap_or_default(),
            },
        };
        Ok(FieldSpec {
            kind,
            required: self.required,
            unique: self.unique,
            label: self.label,
        })
    }
}

/// One entity of a schema document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySchema {
    pub table: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub fields: OrderedMap<FieldSchema>,
    #[serde(default)]
    pub list_fields: Vec<String>,
    #[serde(default)]
    pub children_label_fields: HashMap<String, String>,
    #[serde(default)]
    pub delete_cascade: bool,
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub filter: Vec<String>,
}

/// A whole schema document: entity name to entity schema, in document order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct SchemaDocument {
    pub entities: OrderedMap<EntitySchema>,
}

impl SchemaDocument {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_value(json: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fields_keep_document_order() {
        let schema: EntitySchema = serde_json::from_value(json!({
            "table": "book",
            "fields": {
                "title": {"type": "text"},
                "author": {"type": "text"},
                "pages": {"type": "int"}
            }
        }))
        .unwrap();
        let names: Vec<&str> = schema.fields.0.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["title", "author", "pages"]);
    }

    #[test]
    fn test_payload_follows_type() {
        let field: FieldSchema = serde_json::from_value(json!({
            "type": "float",
            "floatStep": 0.5,
            "setitems": ["ignored"]
        }))
        .unwrap();
        assert_eq!(
            field.into_spec("price").unwrap().kind,
            FieldKind::Float { step: Some(0.5) }
        );
    }

    #[test]
    fn test_reference_without_target_is_rejected() {
        let field: FieldSchema = serde_json::from_value(json!({"type": "reference"})).unwrap();
        let err = field.into_spec("author").unwrap_err();
        assert!(err.to_string().contains("author"));
    }
}
