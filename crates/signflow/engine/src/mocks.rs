//! Mock collaborators for testing.
//!
//! Deterministic stand-ins for the external contracts: a compositor that
//! counts invocations and can be told to fail, a notifier that records
//! every intent, and a blob store backed by a map.

use crate::external::{
    BlobError, BlobStore, Compositor, CompositorError, NotificationIntent, Notifier,
};
use async_trait::async_trait;
use signflow_types::{FileRef, Placement};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Mock compositor.
///
/// Succeeding mode returns the source bytes with a one-byte-per-placement
/// suffix so tests can tell composites apart from sources.
#[derive(Default)]
pub struct MockCompositor {
    invocations: AtomicUsize,
    fail: AtomicBool,
}

impl MockCompositor {
    /// A compositor that composes everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// A compositor that fails every invocation.
    pub fn failing() -> Self {
        Self {
            invocations: AtomicUsize::new(0),
            fail: AtomicBool::new(true),
        }
    }

    /// How many times `compose` ran (successfully or not).
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Flip failure mode at runtime.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Compositor for MockCompositor {
    async fn compose(
        &self,
        source: &[u8],
        placements: &[Placement],
    ) -> Result<Vec<u8>, CompositorError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(CompositorError("mock compositor: forced failure".into()));
        }

        let mut composite = source.to_vec();
        composite.extend(std::iter::repeat(COMPOSITE_MARK).take(placements.len()));
        Ok(composite)
    }
}

/// Byte appended per composited placement by the mock.
const COMPOSITE_MARK: u8 = 0xA5;

/// Mock notifier recording every intent it was asked to deliver.
#[derive(Default)]
pub struct MockNotifier {
    intents: Mutex<Vec<NotificationIntent>>,
    undeliverable: AtomicBool,
}

impl MockNotifier {
    /// A notifier that reports every delivery as successful.
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier that reports every delivery as failed. Intents are
    /// still recorded, mirroring a downstream bounce.
    pub fn undeliverable() -> Self {
        Self {
            intents: Mutex::new(Vec::new()),
            undeliverable: AtomicBool::new(true),
        }
    }

    /// Every intent seen so far, in order.
    pub fn intents(&self) -> Vec<NotificationIntent> {
        self.intents
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, intent: NotificationIntent) -> bool {
        if let Ok(mut guard) = self.intents.lock() {
            guard.push(intent);
        }
        !self.undeliverable.load(Ordering::SeqCst)
    }
}

/// Blob store backed by an in-memory map.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, prefix: &str, bytes: Vec<u8>) -> Result<FileRef, BlobError> {
        let file = FileRef::generate(prefix);
        let mut guard = self
            .blobs
            .lock()
            .map_err(|_| BlobError("blob map poisoned".into()))?;
        guard.insert(file.0.clone(), bytes);
        Ok(file)
    }

    async fn get(&self, file: &FileRef) -> Result<Option<Vec<u8>>, BlobError> {
        let guard = self
            .blobs
            .lock()
            .map_err(|_| BlobError("blob map poisoned".into()))?;
        Ok(guard.get(&file.0).cloned())
    }
}
