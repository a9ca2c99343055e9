use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::{CrudError, Value};

/// The declared type of a field, without its type-specific payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Bool,
    Int,
    Float,
    Date,
    #[serde(rename = "datetime")]
    DateTime,
    Set,
    Reference,
    File,
    Fixed,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Set => "set",
            Self::Reference => "reference",
            Self::File => "file",
            Self::Fixed => "fixed",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = CrudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "bool" => Ok(Self::Bool),
            "int" => Ok(Self::Int),
            "float" => Ok(Self::Float),
            "date" => Ok(Self::Date),
            "datetime" => Ok(Self::DateTime),
            "set" => Ok(Self::Set),
            "reference" => Ok(Self::Reference),
            "file" => Ok(Self::File),
            "fixed" => Ok(Self::Fixed),
            other => Err(CrudError::Schema(format!("Unknown field type '{}'", other))),
        }
    }
}

/// Where a reference field points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceTarget {
    /// Table of the referenced entity.
    pub table: String,
    /// Field of the referenced entity used as its display name.
    #[serde(rename = "nameField")]
    pub name_field: String,
    /// Entity name of the referenced definition.
    pub entity: String,
}

impl ReferenceTarget {
    pub fn new(
        table: impl Into<String>,
        name_field: impl Into<String>,
        entity: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            name_field: name_field.into(),
            entity: entity.into(),
        }
    }
}

/// A field type together with the payload only that type carries.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Text,
    Bool,
    Int,
    Float { step: Option<f64> },
    Date,
    DateTime,
    Set { items: Vec<String> },
    Reference(ReferenceTarget),
    File { path: Option<String> },
    Fixed { value: Value },
}

impl FieldKind {
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Text => FieldType::Text,
            Self::Bool => FieldType::Bool,
            Self::Int => FieldType::Int,
            Self::Float { .. } => FieldType::Float,
            Self::Date => FieldType::Date,
            Self::DateTime => FieldType::DateTime,
            Self::Set { .. } => FieldType::Set,
            Self::Reference(_) => FieldType::Reference,
            Self::File { .. } => FieldType::File,
            Self::Fixed { .. } => FieldType::Fixed,
        }
    }
}

/// Metadata of one declared field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub kind: FieldKind,
    pub required: bool,
    pub unique: bool,
    pub label: Option<String>,
}

impl FieldSpec {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            required: false,
            unique: false,
            label: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn field_type(&self) -> FieldType {
        self.kind.field_type()
    }
}

impl Default for FieldSpec {
    /// A plain optional text field; what a field becomes when a construction
    /// mutator touches a name that was never declared.
    fn default() -> Self {
        Self::new(FieldKind::Text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_names_round_trip() {
        for name in ["text", "bool", "int", "float", "date", "datetime", "set", "reference", "file", "fixed"] {
            let parsed: FieldType = name.parse().unwrap();
            assert_eq!(parsed.as_str(), name);
        }
        assert!("varchar".parse::<FieldType>().is_err());
    }

    #[test]
    fn test_spec_builder() {
        let spec = FieldSpec::new(FieldKind::Int).required().unique().label("Count");
        assert!(spec.required);
        assert!(spec.unique);
        assert_eq!(spec.label.as_deref(), Some("Count"));
        assert_eq!(spec.field_type(), FieldType::Int);
    }
}
