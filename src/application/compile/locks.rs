use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::documents::DocumentRef;

/// Per-document mutual exclusion for compilations sharing auxiliary files.
///
/// Entries are created on demand and dropped once no compilation holds or awaits them.
#[derive(Debug, Default, Clone)]
pub struct DocumentLocks {
    inner: Arc<DashMap<DocumentRef, Arc<Mutex<()>>>>,
}

impl DocumentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, document: &DocumentRef) -> DocumentLockGuard {
        let lock = Arc::clone(&self.inner.entry(document.clone()).or_default());
        let guard = lock.lock_owned().await;
        DocumentLockGuard {
            guard: Some(guard),
            document: document.clone(),
            locks: Arc::clone(&self.inner),
        }
    }

    /// Number of documents with a held or awaited lock.
    pub fn active(&self) -> usize {
        self.inner.len()
    }
}

pub struct DocumentLockGuard {
    guard: Option<OwnedMutexGuard<()>>,
    document: DocumentRef,
    locks: Arc<DashMap<DocumentRef, Arc<Mutex<()>>>>,
}

impl Drop for DocumentLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own reference left: nobody holds or waits on this lock.
        self.locks
            .remove_if(&self.document, |_, lock| Arc::strong_count(lock) == 1);
    }
}
