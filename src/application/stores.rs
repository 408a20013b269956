//! Collaborator seams the compile pipeline and document service depend on.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::documents::{ArtifactRef, DocumentRef};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid stored path `{0}`")]
    InvalidPath(String),
    #[error("stored document `{0}` is not valid UTF-8")]
    InvalidEncoding(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Directory of editable source documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn exists(&self, document: &DocumentRef) -> Result<bool, StorageError>;

    /// Absolute path of the document; always strictly inside the store directory.
    fn resolve_path(&self, document: &DocumentRef) -> Result<PathBuf, StorageError>;

    /// File names of all stored `.tex` documents, sorted.
    async fn list(&self) -> Result<Vec<String>, StorageError>;

    async fn read(&self, document: &DocumentRef) -> Result<Option<String>, StorageError>;

    async fn write(&self, document: &DocumentRef, content: &str) -> Result<(), StorageError>;

    /// Returns `false` when there was nothing to delete.
    async fn delete(&self, document: &DocumentRef) -> Result<bool, StorageError>;
}

/// Directory of compiled output documents.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn exists(&self, artifact: &ArtifactRef) -> Result<bool, StorageError>;

    fn resolve_path(&self, artifact: &ArtifactRef) -> Result<PathBuf, StorageError>;

    async fn read(&self, artifact: &ArtifactRef) -> Result<Option<Vec<u8>>, StorageError>;
}
