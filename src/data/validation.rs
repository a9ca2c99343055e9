//! Write-time normalisation of entity values against their field types.
//!
//! Every backend runs [`normalize`] before it writes, so all of them accept
//! and reject exactly the same values.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::core::{FieldError, Result, Row, Value, ValidationErrors};
use crate::definition::{EntityDefinition, FieldKind};
use crate::entity::Entity;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATETIME_INPUT_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

fn invalid(expected: &'static str, value: &Value) -> FieldError {
    FieldError::InvalidType {
        expected,
        found: value.type_name(),
    }
}

/// Checks one non-blank value against a field kind and returns the value
/// as it should be stored.
pub fn coerce(kind: &FieldKind, value: &Value) -> std::result::Result<Value, FieldError> {
    match kind {
        FieldKind::Text => match value {
            Value::Text(_) => Ok(value.clone()),
            Value::Integer(_) | Value::Float(_) | Value::Boolean(_) => Ok(Value::Text(value.to_string())),
            _ => Err(invalid("TEXT", value)),
        },
        FieldKind::Bool => match value {
            Value::Boolean(_) => Ok(value.clone()),
            Value::Integer(0) => Ok(Value::Boolean(false)),
            Value::Integer(1) => Ok(Value::Boolean(true)),
            Value::Text(s) => match s.trim() {
                "1" | "true" | "on" => Ok(Value::Boolean(true)),
                "0" | "false" | "off" => Ok(Value::Boolean(false)),
                _ => Err(invalid("BOOLEAN", value)),
            },
            _ => Err(invalid("BOOLEAN", value)),
        },
        FieldKind::Int => match value {
            Value::Integer(_) => Ok(value.clone()),
            Value::Text(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| invalid("INTEGER", value)),
            _ => Err(invalid("INTEGER", value)),
        },
        FieldKind::Float { .. } => match value {
            Value::Float(_) => Ok(value.clone()),
            Value::Integer(i) => Ok(Value::Float(*i as f64)),
            Value::Text(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| invalid("FLOAT", value)),
            _ => Err(invalid("FLOAT", value)),
        },
        FieldKind::Date => {
            let text = value.as_str().ok_or_else(|| invalid("DATE", value))?;
            let date = NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
                .map_err(|_| invalid("DATE", value))?;
            Ok(Value::Text(date.format(DATE_FORMAT).to_string()))
        }
        FieldKind::DateTime => {
            let text = value.as_str().ok_or_else(|| invalid("DATETIME", value))?;
            let datetime = parse_datetime(text.trim()).ok_or_else(|| invalid("DATETIME", value))?;
            Ok(Value::Text(datetime.format(DATETIME_FORMAT).to_string()))
        }
        FieldKind::Set { items } => {
            let text = value.as_str().ok_or_else(|| invalid("TEXT", value))?;
            if items.iter().any(|item| item == text) {
                Ok(value.clone())
            } else {
                Err(FieldError::NotInSet {
                    value: text.to_string(),
                })
            }
        }
        // Numeric text ids, as posted by forms, are stored as integers.
        FieldKind::Reference(_) => match value.raw_id() {
            Value::Integer(id) => Ok(Value::Integer(*id)),
            Value::Text(s) => Ok(s
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .unwrap_or_else(|_| Value::Text(s.clone()))),
            _ => Err(invalid("REFERENCE", value)),
        },
        FieldKind::File { .. } => match value {
            Value::Text(_) => Ok(value.clone()),
            _ => Err(invalid("TEXT", value)),
        },
        FieldKind::Fixed { value: fixed } => Ok(fixed.clone()),
    }
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    DATETIME_INPUT_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.naive_utc()))
}

/// Normalises every editable field of `entity`.
///
/// Returns the editable values as they should be stored, or every failing
/// field at once. Blank values become null; fixed fields always carry their
/// fixed value; unset fields read as null.
pub fn normalize(definition: &EntityDefinition, entity: &Entity) -> Result<Row> {
    let mut errors = ValidationErrors::new();
    let mut row = Row::new();

    for name in definition.editable_field_names() {
        let Some(kind) = definition.field_kind(&name) else {
            continue;
        };
        let raw = entity.get_or_null(&name);

        let value = if let FieldKind::Fixed { value } = kind {
            value.clone()
        } else if raw.is_blank() {
            Value::Null
        } else {
            match coerce(kind, raw) {
                Ok(value) => value,
                Err(error) => {
                    errors.add(name, error);
                    continue;
                }
            }
        };

        if value.is_null() && definition.is_required(&name) {
            errors.add(name, FieldError::Required);
            continue;
        }
        row.insert(name, value);
    }

    errors.into_result()?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StandardLabels;
    use crate::core::CrudError;
    use crate::definition::{FieldSpec, ReferenceTarget};
    use std::sync::Arc;

    fn definition() -> Arc<EntityDefinition> {
        Arc::new(EntityDefinition::new(
            "book",
            vec![
                ("title".into(), FieldSpec::new(FieldKind::Text).required()),
                ("pages".into(), FieldSpec::new(FieldKind::Int)),
                ("price".into(), FieldSpec::new(FieldKind::Float { step: None })),
                ("released".into(), FieldSpec::new(FieldKind::Date)),
                ("state".into(), FieldSpec::new(FieldKind::Set { items: vec!["new".into(), "used".into()] })),
                ("author".into(), FieldSpec::new(FieldKind::Reference(ReferenceTarget::new("author", "name", "author")))),
                ("kind".into(), FieldSpec::new(FieldKind::Fixed { value: Value::from("paper") })),
                ("lent".into(), FieldSpec::new(FieldKind::Bool)),
            ],
            "Book",
            StandardLabels::default(),
        ))
    }

    #[test]
    fn test_normalize_coerces_values() {
        let def = definition();
        let mut entity = Entity::new(def.clone());
        entity.set("title", "Dune").unwrap();
        entity.set("pages", "412").unwrap();
        entity.set("price", 9).unwrap();
        entity.set("released", "1965-08-01").unwrap();
        entity.set("state", "used").unwrap();
        entity.set("author", Value::reference(3, "Frank Herbert")).unwrap();
        entity.set("kind", "ebook").unwrap();
        entity.set("lent", "").unwrap();

        let row = normalize(&def, &entity).unwrap();
        assert_eq!(row["pages"], Value::Integer(412));
        assert_eq!(row["price"], Value::Float(9.0));
        assert_eq!(row["author"], Value::Integer(3));
        assert_eq!(row["kind"], Value::from("paper"));
        assert_eq!(row["lent"], Value::Null);
        assert!(!row.contains_key("id"));
    }

    #[test]
    fn test_normalize_reports_every_field() {
        let def = definition();
        let mut entity = Entity::new(def.clone());
        entity.set("pages", "many").unwrap();
        entity.set("state", "lost").unwrap();
        entity.set("released", "yesterday").unwrap();

        match normalize(&def, &entity).unwrap_err() {
            CrudError::Validation(errors) => {
                assert_eq!(errors.len(), 4);
                assert_eq!(errors.get("title"), Some(&FieldError::Required));
                assert_eq!(errors.get("state"), Some(&FieldError::NotInSet { value: "lost".into() }));
                assert!(matches!(errors.get("pages"), Some(FieldError::InvalidType { expected: "INTEGER", .. })));
                assert!(matches!(errors.get("released"), Some(FieldError::InvalidType { expected: "DATE", .. })));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_datetime_formats() {
        let kind = FieldKind::DateTime;
        for input in ["2024-02-29 13:45", "2024-02-29T13:45:00", "2024-02-29T13:45:00+00:00"] {
            assert_eq!(
                coerce(&kind, &Value::from(input)).unwrap(),
                Value::from("2024-02-29 13:45:00")
            );
        }
        assert!(coerce(&kind, &Value::from(5)).is_err());
    }
}
