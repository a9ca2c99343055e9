use std::collections::HashMap;

use super::Value;

/// A raw storage row: field name to value, covering exactly the field names
/// of the owning definition.
pub type Row = HashMap<String, Value>;

pub const ID: &str = "id";
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";
pub const VERSION: &str = "version";
pub const DELETED_AT: &str = "deleted_at";

/// Implicit fields every entity carries, in their fixed order.
pub const READ_ONLY_FIELDS: [&str; 5] = [ID, CREATED_AT, UPDATED_AT, VERSION, DELETED_AT];

/// Implicit fields hidden from public listings.
pub const HIDDEN_FIELDS: [&str; 2] = [VERSION, DELETED_AT];

pub fn is_read_only(field: &str) -> bool {
    READ_ONLY_FIELDS.contains(&field)
}
