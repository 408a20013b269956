//! Filesystem-backed document and artifact stores.

use std::{
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};

use async_trait::async_trait;
use tokio::fs;

use crate::{
    application::stores::{ArtifactStore, DocumentStore, StorageError},
    domain::documents::{ArtifactRef, DocumentRef, SOURCE_EXTENSION},
};

/// A pre-created, canonicalized store directory.
#[derive(Debug, Clone)]
struct StoreRoot {
    root: PathBuf,
}

impl StoreRoot {
    fn open(root: &Path) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(root)?;
        let root = std::fs::canonicalize(root)?;
        Ok(Self { root })
    }

    /// Join a bare file name onto the root, refusing anything but one normal component.
    fn resolve(&self, name: &str) -> Result<PathBuf, StorageError> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root.join(name)),
            _ => Err(StorageError::InvalidPath(name.to_string())),
        }
    }

    async fn is_file(&self, name: &str) -> Result<bool, StorageError> {
        let path = self.resolve(name)?;
        match fs::metadata(&path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    async fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.resolve(name)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::Io(err)),
        }
    }
}

/// Source documents stored as `<name>.tex` files in a single directory.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: StoreRoot,
}

impl FsDocumentStore {
    /// Open the store, creating the directory if necessary.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        Ok(Self {
            root: StoreRoot::open(root.as_ref())?,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.root.root
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn exists(&self, document: &DocumentRef) -> Result<bool, StorageError> {
        self.root.is_file(document.as_str()).await
    }

    fn resolve_path(&self, document: &DocumentRef) -> Result<PathBuf, StorageError> {
        self.root.resolve(document.as_str())
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = fs::read_dir(&self.root.root).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let is_source = Path::new(&name)
                .extension()
                .is_some_and(|ext| ext == SOURCE_EXTENSION);
            // Skip files no request could address by the listed name.
            let addressable = DocumentRef::parse(&name).is_ok_and(|doc| doc.as_str() == name);
            if is_source && addressable {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    async fn read(&self, document: &DocumentRef) -> Result<Option<String>, StorageError> {
        match self.root.read(document.as_str()).await? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| StorageError::InvalidEncoding(document.to_string())),
            None => Ok(None),
        }
    }

    async fn write(&self, document: &DocumentRef, content: &str) -> Result<(), StorageError> {
        let path = self.root.resolve(document.as_str())?;
        fs::write(&path, content).await?;
        Ok(())
    }

    async fn delete(&self, document: &DocumentRef) -> Result<bool, StorageError> {
        let path = self.root.resolve(document.as_str())?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StorageError::Io(err)),
        }
    }
}

/// Compiled artifacts written by the engine into a single output directory.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: StoreRoot,
}

impl FsArtifactStore {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        Ok(Self {
            root: StoreRoot::open(root.as_ref())?,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.root.root
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn exists(&self, artifact: &ArtifactRef) -> Result<bool, StorageError> {
        self.root.is_file(artifact.as_str()).await
    }

    fn resolve_path(&self, artifact: &ArtifactRef) -> Result<PathBuf, StorageError> {
        self.root.resolve(artifact.as_str())
    }

    async fn read(&self, artifact: &ArtifactRef) -> Result<Option<Vec<u8>>, StorageError> {
        self.root.read(artifact.as_str()).await
    }
}
