//! Document and artifact CRUD surfaced next to the compiler.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::{
    application::stores::{ArtifactStore, DocumentStore, StorageError},
    domain::{
        documents::{ArtifactRef, DEFAULT_DOCUMENT_NAME, DocumentRef},
        error::DomainError,
    },
};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error("`{0}` not found")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub struct DocumentService {
    documents: Arc<dyn DocumentStore>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl DocumentService {
    pub fn new(documents: Arc<dyn DocumentStore>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self {
            documents,
            artifacts,
        }
    }

    pub async fn list(&self) -> Result<Vec<String>, DocumentError> {
        Ok(self.documents.list().await?)
    }

    pub async fn read(&self, filename: &str) -> Result<String, DocumentError> {
        let document = DocumentRef::parse(filename)?;
        self.documents
            .read(&document)
            .await?
            .ok_or_else(|| DocumentError::NotFound(document.to_string()))
    }

    /// Create or overwrite a document; a missing name saves to `document.tex`.
    pub async fn save(
        &self,
        filename: Option<&str>,
        content: &str,
    ) -> Result<DocumentRef, DocumentError> {
        let document = DocumentRef::parse(filename.unwrap_or(DEFAULT_DOCUMENT_NAME))?;
        self.documents.write(&document, content).await?;
        info!(
            target = "application::documents",
            op = "documents::save",
            result = "ok",
            document = %document,
            bytes = content.len(),
            "Document saved"
        );
        Ok(document)
    }

    pub async fn delete(&self, filename: &str) -> Result<(), DocumentError> {
        let document = DocumentRef::parse(filename)?;
        if !self.documents.delete(&document).await? {
            return Err(DocumentError::NotFound(document.to_string()));
        }
        info!(
            target = "application::documents",
            op = "documents::delete",
            result = "ok",
            document = %document,
            "Document deleted"
        );
        Ok(())
    }

    pub async fn read_artifact(
        &self,
        filename: &str,
    ) -> Result<(ArtifactRef, Vec<u8>), DocumentError> {
        let artifact = ArtifactRef::parse(filename)?;
        match self.artifacts.read(&artifact).await? {
            Some(bytes) => Ok((artifact, bytes)),
            None => Err(DocumentError::NotFound(artifact.to_string())),
        }
    }
}
