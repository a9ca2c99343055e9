use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{CREATED_AT, CrudError, ID, Result, UPDATED_AT};

/// Format of the implicit timestamps unless configured otherwise.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Labels for the implicit `id`, `created_at` and `updated_at` fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardLabels {
    pub id: String,
    pub created_at: String,
    pub updated_at: String,
}

impl StandardLabels {
    /// Label for an implicit field name, if it has one.
    pub fn get(&self, field: &str) -> Option<&str> {
        match field {
            ID => Some(&self.id),
            CREATED_AT => Some(&self.created_at),
            UPDATED_AT => Some(&self.updated_at),
            _ => None,
        }
    }
}

impl Default for StandardLabels {
    fn default() -> Self {
        Self {
            id: "Id".to_string(),
            created_at: "Created at".to_string(),
            updated_at: "Updated at".to_string(),
        }
    }
}

/// Settings shared by every definition and backend.
///
/// # Examples
///
/// ```
/// use crudkit::CrudConfig;
///
/// let config = CrudConfig::new()
///     .page_size(50)
///     .id_label("#");
/// assert_eq!(config.page_size, 50);
/// assert_eq!(config.standard_labels.id, "#");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrudConfig {
    /// Labels for the implicit fields
    pub standard_labels: StandardLabels,

    /// Page size for definitions whose schema does not set one
    pub page_size: usize,

    /// `chrono` format used for `created_at`, `updated_at` and `deleted_at`
    pub timestamp_format: String,

    /// Whether the `LIKE` filter operator respects case
    pub like_case_sensitive: bool,
}

impl CrudConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn id_label(mut self, label: &str) -> Self {
        self.standard_labels.id = label.to_string();
        self
    }

    pub fn created_at_label(mut self, label: &str) -> Self {
        self.standard_labels.created_at = label.to_string();
        self
    }

    pub fn updated_at_label(mut self, label: &str) -> Self {
        self.standard_labels.updated_at = label.to_string();
        self
    }

    pub fn timestamp_format(mut self, format: &str) -> Self {
        self.timestamp_format = format.to_string();
        self
    }

    pub fn like_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.like_case_sensitive = case_sensitive;
        self
    }

    /// Parse a JSON config document; missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        if config.page_size == 0 {
            return Err(CrudError::Schema("page_size must be greater than zero".into()));
        }
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            CrudError::Schema(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }
}

impl Default for CrudConfig {
    fn default() -> Self {
        Self {
            standard_labels: StandardLabels::default(),
            page_size: 25,
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            like_case_sensitive: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CrudConfig::default();
        assert_eq!(config.page_size, 25);
        assert_eq!(config.standard_labels.get("id"), Some("Id"));
        assert_eq!(config.standard_labels.get("version"), None);
        assert!(!config.like_case_sensitive);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = CrudConfig::from_json_str(
            r#"{"page_size": 10, "standard_labels": {"id": "Nr."}}"#,
        )
        .unwrap();
        assert_eq!(config.page_size, 10);
        assert_eq!(config.standard_labels.id, "Nr.");
        assert_eq!(config.standard_labels.created_at, "Created at");
        assert_eq!(config.timestamp_format, "%Y-%m-%d %H:%M:%S");
    }

    #[test]
    fn test_zero_page_size_rejected() {
        assert!(CrudConfig::from_json_str(r#"{"page_size": 0}"#).is_err());
    }
}
