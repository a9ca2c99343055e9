use std::sync::Arc;

use async_trait::async_trait;

use super::access::MemoryDataAccess;
use super::store::MemoryStore;
use crate::core::Result;
use crate::data::{DataAccess, DataFactory, FileProcessor};
use crate::definition::{DefinitionSet, EntityDefinition};

/// Hands out memory data accesses that share one store and one definition set.
pub struct MemoryDataFactory {
    store: Arc<MemoryStore>,
    definitions: Arc<DefinitionSet>,
}

impl MemoryDataFactory {
    /// Creates the table of every definition up front, so references and
    /// cascades find their tables before the first write.
    pub async fn new(store: Arc<MemoryStore>, definitions: Arc<DefinitionSet>) -> Self {
        for (_, definition) in definitions.iter() {
            store.register(definition).await;
        }
        Self { store, definitions }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn definitions(&self) -> &Arc<DefinitionSet> {
        &self.definitions
    }

    /// The data access for the entity registered under `entity_name`.
    pub async fn data(&self, entity_name: &str, file_processor: Arc<dyn FileProcessor>) -> Result<Arc<dyn DataAccess>> {
        let definition = self.definitions.require(entity_name)?.clone();
        self.create_data(definition, file_processor).await
    }
}

#[async_trait]
impl DataFactory for MemoryDataFactory {
    async fn create_data(
        &self,
        definition: Arc<EntityDefinition>,
        file_processor: Arc<dyn FileProcessor>,
    ) -> Result<Arc<dyn DataAccess>> {
        let data = MemoryDataAccess::new(definition, self.store.clone(), file_processor)
            .await
            .with_definitions(self.definitions.clone());
        Ok(Arc::new(data))
    }
}
