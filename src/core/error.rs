use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use super::Value;

/// Why a single field failed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldError {
    /// A required field was null or an empty string.
    Required,
    /// The value does not fit the declared field type.
    InvalidType { expected: &'static str, found: &'static str },
    /// A `set` field received a value outside its items.
    NotInSet { value: String },
    /// A filter used an operator this layer does not understand.
    UnknownOperator { operator: String },
    /// A reference field points at a row that does not exist.
    MissingReference { table: String, id: Value },
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "value is required"),
            Self::InvalidType { expected, found } => {
                write!(f, "expected {}, got {}", expected, found)
            }
            Self::NotInSet { value } => write!(f, "'{}' is not an allowed item", value),
            Self::UnknownOperator { operator } => write!(f, "unknown operator '{}'", operator),
            Self::MissingReference { table, id } => {
                write!(f, "no row with id {} in '{}'", id, table)
            }
        }
    }
}

/// Per-field validation failures, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors {
    fields: BTreeMap<String, FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error for `field`. The first error reported for a field wins.
    pub fn add(&mut self, field: impl Into<String>, error: FieldError) {
        self.fields.entry(field.into()).or_insert(error);
    }

    pub fn get(&self, field: &str) -> Option<&FieldError> {
        self.fields.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldError)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// `Ok(())` when nothing was recorded, otherwise a `CrudError::Validation`.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CrudError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, error) in &self.fields {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", field, error)?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum CrudError {
    #[error("{entity} with id {id} not found")]
    NotFound { entity: String, id: Value },

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Unique constraint violation: field '{field}' already contains value {value}")]
    UniqueViolation { field: String, value: Value },

    #[error("Concurrency conflict on '{table}' id {id}: expected version {expected}, stored version is {actual}")]
    ConcurrencyConflict {
        table: String,
        id: Value,
        expected: Value,
        actual: Value,
    },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Field '{field}' is not defined for table '{table}'")]
    UnknownField { table: String, field: String },

    #[error("Row from '{table}' is missing field '{field}'")]
    MalformedRow { table: String, field: String },

    #[error("Schema error: {0}")]
    Schema(String),
}

/// The category a [`CrudError`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    UniqueViolation,
    ConcurrencyConflict,
    Backend,
    /// Caller broke the contract (unknown field, malformed row, bad schema).
    Contract,
}

impl CrudError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
            Self::UniqueViolation { .. } => ErrorKind::UniqueViolation,
            Self::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyConflict,
            Self::Backend(_) => ErrorKind::Backend,
            Self::UnknownField { .. } | Self::MalformedRow { .. } | Self::Schema(_) => {
                ErrorKind::Contract
            }
        }
    }

    /// Shorthand for a single-field validation failure.
    pub fn field(field: impl Into<String>, error: FieldError) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, error);
        Self::Validation(errors)
    }
}

pub type Result<T> = std::result::Result<T, CrudError>;

impl<T> From<std::sync::PoisonError<T>> for CrudError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for CrudError {
    fn from(err: serde_json::Error) -> Self {
        Self::Schema(err.to_string())
    }
}
