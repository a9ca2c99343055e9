use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::core::value::NULL;
use crate::core::{CrudError, FieldError, Result, Row, Value, ValidationErrors};
use crate::expression::eval_like;

/// Comparison applied between a row value and a filter value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    #[default]
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Like => "LIKE",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = FieldError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "=" | "==" => Ok(Self::Eq),
            "!=" | "<>" => Ok(Self::NotEq),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::LtEq),
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::GtEq),
            op if op.eq_ignore_ascii_case("like") => Ok(Self::Like),
            op => Err(FieldError::UnknownOperator {
                operator: op.to_string(),
            }),
        }
    }
}

/// One `field <operator> value` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub operator: FilterOperator,
    pub value: Value,
}

impl Condition {
    /// Whether `candidate` (a row value, null when the row lacks the field)
    /// satisfies this condition. Incomparable types never match.
    pub fn matches(&self, candidate: &Value, like_case_sensitive: bool) -> bool {
        let candidate = candidate.raw_id();
        let value = self.value.raw_id();
        match self.operator {
            FilterOperator::Eq => loosely_equal(candidate, value),
            FilterOperator::NotEq => !loosely_equal(candidate, value),
            FilterOperator::Like => match (candidate, value) {
                (Value::Text(text), Value::Text(pattern)) => {
                    eval_like(text, pattern, like_case_sensitive).unwrap_or(false)
                }
                _ => false,
            },
            op => {
                if candidate.is_null() || value.is_null() {
                    return false;
                }
                let ordering = match candidate.compare(value) {
                    Ok(ordering) => ordering,
                    Err(_) => return false,
                };
                match op {
                    FilterOperator::Lt => ordering == Ordering::Less,
                    FilterOperator::LtEq => ordering != Ordering::Greater,
                    FilterOperator::Gt => ordering == Ordering::Greater,
                    FilterOperator::GtEq => ordering != Ordering::Less,
                    _ => unreachable!("equality and LIKE handled above"),
                }
            }
        }
    }
}

/// Equality that also lets numeric text meet a number, since filter values
/// often arrive as query-string text.
fn loosely_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Value::Text(text), other) | (other, Value::Text(text)) if other.is_numeric() => {
            text.trim().parse::<f64>().ok().zip(other.as_f64()).is_some_and(|(x, y)| x == y)
        }
        _ => false,
    }
}

/// A conjunction of conditions; a row matches when every condition holds.
///
/// # Examples
///
/// ```
/// use crudkit::data::{Filter, FilterOperator};
///
/// let filter = Filter::new()
///     .eq("status", "active")
///     .with("pages", FilterOperator::Gt, 100);
/// assert_eq!(filter.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a filter from a field → value map and a parallel field →
    /// operator map. Fields without an operator compare with `=`.
    pub fn from_maps<I, K>(values: I, operators: &HashMap<String, String>) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut errors = ValidationErrors::new();
        let mut filter = Self::new();
        for (field, value) in values {
            let field = field.into();
            let operator = match operators.get(&field) {
                Some(op) => match op.parse() {
                    Ok(operator) => operator,
                    Err(error) => {
                        errors.add(field.clone(), error);
                        continue;
                    }
                },
                None => FilterOperator::Eq,
            };
            filter = filter.with(field, operator, value);
        }
        errors.into_result()?;
        Ok(filter)
    }

    pub fn with(mut self, field: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            operator,
            value: value.into(),
        });
        self
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, FilterOperator::Eq, value)
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.conditions.iter().map(|c| c.field.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn matches(&self, row: &Row, like_case_sensitive: bool) -> bool {
        self.conditions.iter().all(|condition| {
            let candidate = row.get(&condition.field).unwrap_or(&NULL);
            condition.matches(candidate, like_case_sensitive)
        })
    }
}

impl From<Condition> for Filter {
    fn from(condition: Condition) -> Self {
        Self {
            conditions: vec![condition],
        }
    }
}

/// Rejects conditions on fields outside `known`.
pub fn ensure_known_fields(filter: &Filter, table: &str, known: &[String]) -> Result<()> {
    for field in filter.fields() {
        if !known.iter().any(|k| k == field) {
            return Err(CrudError::UnknownField {
                table: table.to_string(),
                field: field.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_default_operator_is_eq() {
        let filter = Filter::from_maps(
            vec![("status", Value::from("active")), ("pages", Value::from(100))],
            &HashMap::from([("pages".to_string(), ">=".to_string())]),
        )
        .unwrap();
        assert_eq!(filter.conditions()[0].operator, FilterOperator::Eq);
        assert_eq!(filter.conditions()[1].operator, FilterOperator::GtEq);
    }

    #[test]
    fn test_unknown_operator_reported_per_field() {
        let err = Filter::from_maps(
            vec![("pages", Value::from(1))],
            &HashMap::from([("pages".to_string(), "~=".to_string())]),
        )
        .unwrap_err();
        match err {
            CrudError::Validation(errors) => assert_eq!(
                errors.get("pages"),
                Some(&FieldError::UnknownOperator { operator: "~=".into() })
            ),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_null_comparisons() {
        let r = row(&[("deleted_at", Value::Null), ("name", Value::from("x"))]);
        assert!(Filter::new().eq("deleted_at", Value::Null).matches(&r, false));
        assert!(!Filter::new().with("name", FilterOperator::NotEq, Value::from("x")).matches(&r, false));
        assert!(Filter::new().with("deleted_at", FilterOperator::NotEq, "x").matches(&r, false));
        assert!(!Filter::new().with("deleted_at", FilterOperator::Lt, 3).matches(&r, false));
    }

    #[test]
    fn test_ordering_and_like() {
        let r = row(&[("pages", Value::from(120)), ("title", Value::from("Dune Messiah"))]);
        assert!(Filter::new().with("pages", FilterOperator::Gt, 100).matches(&r, false));
        assert!(!Filter::new().with("pages", FilterOperator::Lt, 100).matches(&r, false));
        assert!(Filter::new().with("title", FilterOperator::Like, "dune%").matches(&r, false));
        assert!(!Filter::new().with("title", FilterOperator::Like, "dune%").matches(&r, true));
        // incomparable types simply do not match
        assert!(!Filter::new().with("title", FilterOperator::Gt, 1).matches(&r, false));
    }

    #[test]
    fn test_numeric_text_equality() {
        let r = row(&[("author", Value::from(5))]);
        assert!(Filter::new().eq("author", "5").matches(&r, false));
        assert!(Filter::new().eq("author", Value::reference(5, "Frank")).matches(&r, false));
        assert!(!Filter::new().eq("author", "five").matches(&r, false));
    }

    #[test]
    fn test_missing_field_reads_as_null() {
        let r = row(&[]);
        assert!(Filter::new().eq("anything", Value::Null).matches(&r, false));
    }
}
