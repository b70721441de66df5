//! Per-document mutual exclusion.
//!
//! Finalization is a check-then-act sequence: read signer statuses,
//! decide, mutate the document, maybe invoke the compositor. Two workers
//! racing through it must not both conclude "all signed". The engine
//! serializes that sequence per document with an async mutex from this
//! map; operations on different documents never contend.

use signflow_types::{DocumentId, SigningError, SigningResult};
use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Lazily-populated map of per-document async mutexes.
#[derive(Default)]
pub(crate) struct DocumentLocks {
    inner: StdMutex<HashMap<DocumentId, Arc<Mutex<()>>>>,
}

impl DocumentLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The mutex guarding one document. The handle is cloned out so the
    /// registry lock is never held across an await point.
    pub(crate) fn for_document(&self, id: DocumentId) -> SigningResult<Arc<Mutex<()>>> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| SigningError::Storage("document lock registry poisoned".to_string()))?;
        Ok(guard.entry(id).or_default().clone())
    }
}
