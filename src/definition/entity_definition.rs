use std::collections::HashMap;

use super::field::{FieldKind, FieldSpec, FieldType, ReferenceTarget};
use super::schema::EntitySchema;
use crate::config::{CrudConfig, StandardLabels};
use crate::core::{CrudError, HIDDEN_FIELDS, READ_ONLY_FIELDS, Result, Value, is_read_only};

/// A back reference: `field` of rows in `table` (entity `entity`) holds ids
/// of the definition this child is registered on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildReference {
    pub table: String,
    pub field: String,
    pub entity: String,
}

/// Schema descriptor of one entity type.
///
/// Field getters are total: asking about a field that does not exist yields
/// `None` (or `false` for flags), never a panic. The reference getters also
/// yield `None` for fields that exist but are not references.
#[derive(Debug, Clone)]
pub struct EntityDefinition {
    table: String,
    /// Declared fields in declaration order
    fields: Vec<(String, FieldSpec)>,
    label: String,
    standard_labels: StandardLabels,
    /// Back-reference registry, filled by the linking pass only
    children: Vec<ChildReference>,
    list_fields: Vec<String>,
    children_label_fields: HashMap<String, String>,
    delete_cascade: bool,
    page_size: usize,
    filter: Vec<String>,
}

impl EntityDefinition {
    pub fn new(
        table: impl Into<String>,
        fields: Vec<(String, FieldSpec)>,
        label: impl Into<String>,
        standard_labels: StandardLabels,
    ) -> Self {
        Self {
            table: table.into(),
            fields,
            label: label.into(),
            standard_labels,
            children: Vec::new(),
            list_fields: Vec::new(),
            children_label_fields: HashMap::new(),
            delete_cascade: false,
            page_size: 25,
            filter: Vec::new(),
        }
    }

    /// Builds a definition from a parsed schema. Without an explicit label the
    /// entity name is used; without a page size the configured default.
    pub fn from_schema(name: &str, schema: EntitySchema, config: &CrudConfig) -> Result<Self> {
        let mut fields = Vec::with_capacity(schema.fields.0.len());
        for (field_name, field) in schema.fields.0 {
            if is_read_only(&field_name) {
                return Err(CrudError::Schema(format!(
                    "Entity '{}' declares implicit field '{}'",
                    name, field_name
                )));
            }
            if fields.iter().any(|(existing, _)| existing == &field_name) {
                return Err(CrudError::Schema(format!(
                    "Entity '{}' declares field '{}' twice",
                    name, field_name
                )));
            }
            let spec = field.into_spec(&field_name)?;
            fields.push((field_name, spec));
        }

        let label = schema.label.unwrap_or_else(|| name.to_string());
        let mut definition = Self::new(schema.table, fields, label, config.standard_labels.clone());
        definition.set_list_field_names(schema.list_fields);
        definition.set_children_label_fields(schema.children_label_fields);
        definition.set_delete_cascade(schema.delete_cascade);
        definition.set_page_size(schema.page_size.unwrap_or(config.page_size));
        definition.set_filter(schema.filter);
        Ok(definition)
    }

    fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, spec)| spec)
    }

    /// Mutable access, creating a default record for a name never seen before.
    fn field_mut(&mut self, name: &str) -> &mut FieldSpec {
        let index = match self.fields.iter().position(|(n, _)| n == name) {
            Some(index) => index,
            None => {
                self.fields.push((name.to_string(), FieldSpec::default()));
                self.fields.len() - 1
            }
        };
        &mut self.fields[index].1
    }

    fn filtered_field_names(&self, exclude: &[&str]) -> Vec<String> {
        self.field_names()
            .into_iter()
            .filter(|name| !exclude.contains(&name.as_str()))
            .collect()
    }

    /// Every field name: the implicit ones first, then the declared ones.
    pub fn field_names(&self) -> Vec<String> {
        READ_ONLY_FIELDS
            .iter()
            .map(|name| name.to_string())
            .chain(
                self.fields
                    .iter()
                    .map(|(name, _)| name.clone())
                    .filter(|name| !is_read_only(name)),
            )
            .collect()
    }

    /// Field names meant for display: everything but `version` and `deleted_at`.
    pub fn public_field_names(&self) -> Vec<String> {
        self.filtered_field_names(&HIDDEN_FIELDS)
    }

    /// Field names a user may edit: everything but the implicit fields.
    pub fn editable_field_names(&self) -> Vec<String> {
        self.filtered_field_names(&READ_ONLY_FIELDS)
    }

    pub fn read_only_field_names(&self) -> &'static [&'static str] {
        &READ_ONLY_FIELDS
    }

    pub fn has_field(&self, name: &str) -> bool {
        is_read_only(name) || self.field(name).is_some()
    }

    pub fn set_list_field_names(&mut self, list_fields: Vec<String>) {
        self.list_fields = list_fields;
    }

    /// The explicit list columns, or the public field names when none are set.
    pub fn list_field_names(&self) -> Vec<String> {
        if self.list_fields.is_empty() {
            self.public_field_names()
        } else {
            self.list_fields.clone()
        }
    }

    pub fn children_label_fields(&self) -> &HashMap<String, String> {
        &self.children_label_fields
    }

    pub fn set_children_label_fields(&mut self, children_label_fields: HashMap<String, String>) {
        self.children_label_fields = children_label_fields;
    }

    pub fn is_delete_cascade(&self) -> bool {
        self.delete_cascade
    }

    pub fn set_delete_cascade(&mut self, delete_cascade: bool) {
        self.delete_cascade = delete_cascade;
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size;
    }

    pub fn filter(&self) -> &[String] {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: Vec<String>) {
        self.filter = filter;
    }

    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.field(name).map(FieldSpec::field_type)
    }

    pub fn field_kind(&self, name: &str) -> Option<&FieldKind> {
        self.field(name).map(|spec| &spec.kind)
    }

    /// Replaces the type of `name`, creating the field if needed.
    /// Only meant for schema construction.
    pub fn set_type(&mut self, name: &str, kind: FieldKind) {
        self.field_mut(name).kind = kind;
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.field(name).is_some_and(|spec| spec.required)
    }

    pub fn set_required(&mut self, name: &str, required: bool) {
        self.field_mut(name).required = required;
    }

    pub fn is_unique(&self, name: &str) -> bool {
        self.field(name).is_some_and(|spec| spec.unique)
    }

    pub fn reference(&self, name: &str) -> Option<&ReferenceTarget> {
        match self.field_kind(name)? {
            FieldKind::Reference(target) => Some(target),
            _ => None,
        }
    }

    pub fn reference_table(&self, name: &str) -> Option<&str> {
        self.reference(name).map(|target| target.table.as_str())
    }

    pub fn reference_name_field(&self, name: &str) -> Option<&str> {
        self.reference(name).map(|target| target.name_field.as_str())
    }

    pub fn reference_entity(&self, name: &str) -> Option<&str> {
        self.reference(name).map(|target| target.entity.as_str())
    }

    pub fn file_path(&self, name: &str) -> Option<&str> {
        match self.field_kind(name)? {
            FieldKind::File { path } => path.as_deref(),
            _ => None,
        }
    }

    pub fn fixed_value(&self, name: &str) -> Option<&Value> {
        match self.field_kind(name)? {
            FieldKind::Fixed { value } => Some(value),
            _ => None,
        }
    }

    /// Sets the fixed value of `name`. A fixed value only exists on fixed
    /// fields, so this turns the field into one.
    pub fn set_fixed_value(&mut self, name: &str, value: Value) {
        self.field_mut(name).kind = FieldKind::Fixed { value };
    }

    pub fn set_items(&self, name: &str) -> Option<&[String]> {
        match self.field_kind(name)? {
            FieldKind::Set { items } => Some(items),
            _ => None,
        }
    }

    pub fn float_step(&self, name: &str) -> Option<f64> {
        match self.field_kind(name)? {
            FieldKind::Float { step } => *step,
            _ => None,
        }
    }

    /// Explicit label, then the standard label of an implicit field, then
    /// the field name itself.
    pub fn field_label<'a>(&'a self, name: &'a str) -> &'a str {
        self.field(name)
            .and_then(|spec| spec.label.as_deref())
            .or_else(|| self.standard_labels.get(name))
            .unwrap_or(name)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    /// Declared reference fields with their targets, in declaration order.
    pub fn reference_fields(&self) -> impl Iterator<Item = (&str, &ReferenceTarget)> {
        self.fields.iter().filter_map(|(name, spec)| match &spec.kind {
            FieldKind::Reference(target) => Some((name.as_str(), target)),
            _ => None,
        })
    }

    /// Editable fields of the given type, in declaration order.
    pub fn editable_fields_of_type(&self, field_type: FieldType) -> Vec<String> {
        self.editable_field_names()
            .into_iter()
            .filter(|name| self.field_type(name) == Some(field_type))
            .collect()
    }

    pub fn add_child(&mut self, table: impl Into<String>, field: impl Into<String>, entity: impl Into<String>) {
        self.children.push(ChildReference {
            table: table.into(),
            field: field.into(),
            entity: entity.into(),
        });
    }

    pub fn children(&self) -> &[ChildReference] {
        &self.children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> EntityDefinition {
        EntityDefinition::new(
            "book",
            vec![
                ("title".to_string(), FieldSpec::new(FieldKind::Text).required().label("Title")),
                (
                    "author".to_string(),
                    FieldSpec::new(FieldKind::Reference(ReferenceTarget::new("author", "name", "author"))),
                ),
                ("isbn".to_string(), FieldSpec::new(FieldKind::Text).unique()),
                ("cover".to_string(), FieldSpec::new(FieldKind::File { path: Some("uploads".into()) })),
                ("state".to_string(), FieldSpec::new(FieldKind::Set { items: vec!["new".into(), "used".into()] })),
                ("price".to_string(), FieldSpec::new(FieldKind::Float { step: Some(0.01) })),
            ],
            "Book",
            StandardLabels::default(),
        )
    }

    #[test]
    fn test_field_name_views() {
        let def = book();
        assert_eq!(
            def.field_names(),
            vec!["id", "created_at", "updated_at", "version", "deleted_at", "title", "author", "isbn", "cover", "state", "price"]
        );
        assert_eq!(
            def.public_field_names(),
            vec!["id", "created_at", "updated_at", "title", "author", "isbn", "cover", "state", "price"]
        );
        assert_eq!(def.editable_field_names(), vec!["title", "author", "isbn", "cover", "state", "price"]);
    }

    #[test]
    fn test_list_field_override() {
        let mut def = book();
        assert_eq!(def.list_field_names(), def.public_field_names());
        def.set_list_field_names(vec!["title".into(), "id".into()]);
        assert_eq!(def.list_field_names(), vec!["title", "id"]);
        def.set_list_field_names(Vec::new());
        assert_eq!(def.list_field_names(), def.public_field_names());
    }

    #[test]
    fn test_accessors_are_total() {
        let def = book();
        assert_eq!(def.field_type("missing"), None);
        assert!(!def.is_required("missing"));
        assert!(!def.is_unique("missing"));
        assert_eq!(def.file_path("missing"), None);
        assert_eq!(def.set_items("missing"), None);

        // reference getters on a non-reference field
        assert_eq!(def.reference_table("title"), None);
        assert_eq!(def.reference_name_field("title"), None);
        assert_eq!(def.reference_entity("title"), None);

        assert_eq!(def.reference_table("author"), Some("author"));
        assert_eq!(def.reference_name_field("author"), Some("name"));
        assert_eq!(def.file_path("cover"), Some("uploads"));
        assert_eq!(def.float_step("price"), Some(0.01));
        assert_eq!(def.set_items("state").map(|s| s.len()), Some(2));
        assert!(def.is_required("title"));
        assert!(def.is_unique("isbn"));
    }

    #[test]
    fn test_label_resolution() {
        let mut def = book();
        def.set_label("Books");
        assert_eq!(def.label(), "Books");
        assert_eq!(def.field_label("title"), "Title");
        assert_eq!(def.field_label("id"), "Id");
        assert_eq!(def.field_label("created_at"), "Created at");
        assert_eq!(def.field_label("version"), "version");
        assert_eq!(def.field_label("isbn"), "isbn");
        assert_eq!(def.field_label("nowhere"), "nowhere");
    }

    #[test]
    fn test_mutators_create_fields() {
        let mut def = book();
        def.set_required("subtitle", true);
        assert_eq!(def.field_type("subtitle"), Some(FieldType::Text));
        assert!(def.is_required("subtitle"));

        def.set_fixed_value("status", Value::from("active"));
        assert_eq!(def.field_type("status"), Some(FieldType::Fixed));
        assert_eq!(def.fixed_value("status"), Some(&Value::from("active")));

        def.set_type("pages", FieldKind::Int);
        assert_eq!(def.field_type("pages"), Some(FieldType::Int));
        assert_eq!(def.field_names().last().map(String::as_str), Some("pages"));
    }

    #[test]
    fn test_children_keep_insertion_order() {
        let mut def = book();
        def.add_child("review", "book", "review");
        def.add_child("loan", "book_id", "loan");
        let tables: Vec<&str> = def.children().iter().map(|c| c.table.as_str()).collect();
        assert_eq!(tables, vec!["review", "loan"]);
        assert_eq!(def.children()[1].field, "book_id");
    }

    #[test]
    fn test_reference_and_file_helpers() {
        let def = book();
        let refs: Vec<&str> = def.reference_fields().map(|(name, _)| name).collect();
        assert_eq!(refs, vec!["author"]);
        assert_eq!(def.editable_fields_of_type(FieldType::File), vec!["cover"]);
    }
}
