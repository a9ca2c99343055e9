use std::sync::Arc;

use async_trait::async_trait;

use super::access::DataAccess;
use super::file::FileProcessor;
use crate::core::Result;
use crate::definition::EntityDefinition;

/// Creates the data access of a storage backend for one definition.
///
/// This is the seam a CRUD front end is configured with: it knows the
/// definitions and the file processor, the factory knows the storage.
#[async_trait]
pub trait DataFactory: Send + Sync {
    async fn create_data(
        &self,
        definition: Arc<EntityDefinition>,
        file_processor: Arc<dyn FileProcessor>,
    ) -> Result<Arc<dyn DataAccess>>;
}
