use std::collections::HashMap;

use async_trait::async_trait;

use crate::core::Result;
use crate::entity::Entity;

/// A file uploaded alongside a create or update, as handed over by the
/// request layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// The upload parts of a request, keyed by form field name.
#[derive(Debug, Clone, Default)]
pub struct FileRequest {
    files: HashMap<String, UploadedFile>,
}

impl FileRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, field: impl Into<String>, file: UploadedFile) -> Self {
        self.files.insert(field.into(), file);
        self
    }

    pub fn file(&self, field: &str) -> Option<&UploadedFile> {
        self.files.get(field)
    }
}

/// What rendering a file produces; streaming and headers belong to the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResponse {
    pub status: u16,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FileResponse {
    pub fn not_found() -> Self {
        Self {
            status: 404,
            file_name: None,
            content_type: None,
            body: Vec::new(),
        }
    }

    pub fn ok(file_name: impl Into<String>, content_type: Option<String>, body: Vec<u8>) -> Self {
        Self {
            status: 200,
            file_name: Some(file_name.into()),
            content_type,
            body,
        }
    }
}

/// Stores, replaces, removes and renders the file attached to one field of
/// one entity. The data access layer only tells it which entity and field.
#[async_trait]
pub trait FileProcessor: Send + Sync {
    async fn create_file(&self, request: &FileRequest, entity: &Entity, entity_name: &str, field: &str) -> Result<()>;

    async fn update_file(&self, request: &FileRequest, entity: &Entity, entity_name: &str, field: &str) -> Result<()>;

    async fn delete_file(&self, entity: &Entity, entity_name: &str, field: &str) -> Result<()>;

    async fn render_file(&self, entity: &Entity, entity_name: &str, field: &str) -> Result<FileResponse>;
}

/// A processor that keeps nothing and has nothing to render.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullFileProcessor;

#[async_trait]
impl FileProcessor for NullFileProcessor {
    async fn create_file(&self, _request: &FileRequest, _entity: &Entity, _entity_name: &str, _field: &str) -> Result<()> {
        Ok(())
    }

    async fn update_file(&self, _request: &FileRequest, _entity: &Entity, _entity_name: &str, _field: &str) -> Result<()> {
        Ok(())
    }

    async fn delete_file(&self, _entity: &Entity, _entity_name: &str, _field: &str) -> Result<()> {
        Ok(())
    }

    async fn render_file(&self, _entity: &Entity, _entity_name: &str, _field: &str) -> Result<FileResponse> {
        Ok(FileResponse::not_found())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StandardLabels;
    use crate::definition::{EntityDefinition, FieldKind, FieldSpec};
    use std::sync::Arc;

    #[test]
    fn test_null_processor_renders_nothing() {
        let definition = EntityDefinition::new(
            "album",
            vec![("cover".to_string(), FieldSpec::new(FieldKind::File { path: None }))],
            "Album",
            StandardLabels::default(),
        );
        let entity = Entity::new(Arc::new(definition));
        let request = FileRequest::new();

        tokio_test::block_on(async {
            NullFileProcessor.create_file(&request, &entity, "album", "cover").await.unwrap();
            let response = NullFileProcessor.render_file(&entity, "album", "cover").await.unwrap();
            assert_eq!(response, FileResponse::not_found());
        });
    }

    #[test]
    fn test_request_lookup() {
        let file = UploadedFile {
            file_name: "a.txt".into(),
            content_type: None,
            bytes: b"a".to_vec(),
        };
        let request = FileRequest::new().with_file("attachment", file.clone());
        assert_eq!(request.file("attachment"), Some(&file));
        assert_eq!(request.file("other"), None);
        assert_eq!(FileResponse::ok("a.txt", None, vec![1]).status, 200);
    }
}
