//! Object store test doubles.

use async_trait::async_trait;
use bytes::Bytes;
use easel_storage::{ObjectStore, StorageError, StorageResult, StreamingUpload};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Shared state behind a [`RecordingBackend`] and its uploads.
#[derive(Debug, Default)]
struct RecordingState {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    uploads_started: AtomicUsize,
    uploads_aborted: AtomicUsize,
}

/// In-memory backend recording exactly what reaches the store, for
/// asserting gating behavior from the outside.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[derive(Clone, Debug, Default)]
pub struct RecordingBackend {
    state: Arc<RecordingState>,
}

#[allow(dead_code)]
impl RecordingBackend {
    /// Bytes stored under `key`, if the upload finished.
    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.state.objects.lock().expect("poisoned").get(key).cloned()
    }

    /// All stored keys.
    pub fn keys(&self) -> Vec<String> {
        self.state
            .objects
            .lock()
            .expect("poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Number of streaming uploads opened against the store.
    pub fn uploads_started(&self) -> usize {
        self.state.uploads_started.load(Ordering::SeqCst)
    }

    /// Number of streaming uploads aborted.
    pub fn uploads_aborted(&self) -> usize {
        self.state.uploads_aborted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for RecordingBackend {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.state.objects.lock().expect("poisoned").contains_key(key))
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.state
            .objects
            .lock()
            .expect("poisoned")
            .get(key)
            .map(|data| Bytes::from(data.clone()))
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.state
            .objects
            .lock()
            .expect("poisoned")
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn put_stream(&self, key: &str) -> StorageResult<Box<dyn StreamingUpload>> {
        self.state.uploads_started.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingUpload {
            state: self.state.clone(),
            key: key.to_string(),
            data: Vec::new(),
        }))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.state
            .objects
            .lock()
            .expect("poisoned")
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

struct RecordingUpload {
    state: Arc<RecordingState>,
    key: String,
    data: Vec<u8>,
}

#[async_trait]
impl StreamingUpload for RecordingUpload {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        self.data.extend_from_slice(&data);
        Ok(())
    }

    async fn finish(self: Box<Self>) -> StorageResult<u64> {
        let len = self.data.len() as u64;
        self.state
            .objects
            .lock()
            .expect("poisoned")
            .insert(self.key, self.data);
        Ok(len)
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        self.state.uploads_aborted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Backend whose streaming uploads fail on the first write, simulating an
/// unreachable object store.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[derive(Clone, Debug, Default)]
pub struct FailingBackend {
    aborted: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl FailingBackend {
    pub fn uploads_aborted(&self) -> usize {
        self.aborted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for FailingBackend {
    async fn exists(&self, _key: &str) -> StorageResult<bool> {
        Ok(false)
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        Err(StorageError::NotFound(key.to_string()))
    }

    async fn put(&self, _key: &str, _data: Bytes) -> StorageResult<()> {
        Err(StorageError::Io(std::io::Error::other("store unavailable")))
    }

    async fn put_stream(&self, _key: &str) -> StorageResult<Box<dyn StreamingUpload>> {
        Ok(Box::new(FailingUpload {
            aborted: self.aborted.clone(),
        }))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        Err(StorageError::NotFound(key.to_string()))
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

struct FailingUpload {
    aborted: Arc<AtomicUsize>,
}

#[async_trait]
impl StreamingUpload for FailingUpload {
    async fn write(&mut self, _data: Bytes) -> StorageResult<()> {
        Err(StorageError::Io(std::io::Error::other("store unavailable")))
    }

    async fn finish(self: Box<Self>) -> StorageResult<u64> {
        Err(StorageError::Io(std::io::Error::other("store unavailable")))
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        self.aborted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
