//! Entity definitions: typed field metadata, labels, list configuration and
//! the back-reference registry filled by the linking pass.

pub mod entity_definition;
pub mod field;
pub mod registry;
pub mod schema;

pub use entity_definition::{ChildReference, EntityDefinition};
pub use field::{FieldKind, FieldSpec, FieldType, ReferenceTarget};
pub use registry::{DefinitionSet, DefinitionSetBuilder};
pub use schema::{EntitySchema, FieldSchema, OrderedMap, SchemaDocument};
