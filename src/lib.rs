// ============================================================================
// crudkit Library
// ============================================================================

pub mod backend;
pub mod config;
pub mod core;
pub mod data;
pub mod definition;
pub mod entity;
mod expression;

// Re-export main types for convenience
pub use backend::{MemoryDataAccess, MemoryDataFactory, MemoryStore};
pub use config::{CrudConfig, StandardLabels};
pub use core::{CrudError, ErrorKind, FieldError, ReferenceValue, Result, Row, ValidationErrors, Value};
pub use data::{
    Condition, DataAccess, DataFactory, FileProcessor, FileRequest, FileResponse, Filter, FilterOperator,
    NullFileProcessor, UploadedFile,
};
pub use definition::{
    DefinitionSet, DefinitionSetBuilder, EntityDefinition, FieldKind, FieldSpec, FieldType, ReferenceTarget,
};
pub use entity::Entity;

/// Builds the definitions described by a JSON schema and a memory-backed
/// factory over them.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use crudkit::{CrudConfig, DataAccess, NullFileProcessor, open_memory};
///
/// # #[tokio::main]
/// # async fn main() -> crudkit::Result<()> {
/// let schema = r#"{
///     "author": {
///         "table": "author",
///         "fields": { "name": { "type": "text", "required": true } }
///     }
/// }"#;
/// let factory = open_memory(schema, CrudConfig::default()).await?;
/// let authors = factory.data("author", Arc::new(NullFileProcessor)).await?;
///
/// let mut author = authors.create_empty();
/// author.set("name", "Ursula")?;
/// authors.create(&mut author).await?;
/// assert_eq!(authors.count(&Default::default()).await?, 1);
/// # Ok(())
/// # }
/// ```
pub async fn open_memory(schema_json: &str, config: CrudConfig) -> Result<MemoryDataFactory> {
    let definitions = DefinitionSet::from_json_str(schema_json, &config)?;
    let store = MemoryStore::with_config(config);
    Ok(MemoryDataFactory::new(std::sync::Arc::new(store), std::sync::Arc::new(definitions)).await)
}
