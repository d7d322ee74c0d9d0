use crate::bucket::{self, BucketClients};
use crate::{ObjectLocation, ObjectStore, Result};
use async_trait::async_trait;
use bytes::Bytes;
use object_store::memory::InMemory;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Process-local object store, used for local runs and tests. Each bucket is
/// its own `object_store` in-memory store.
pub struct MemoryStore {
    buckets: BucketClients<InMemory>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            buckets: BucketClients::new(),
            writes: AtomicUsize::new(0),
        }
    }

    fn bucket(&self, name: &str) -> Result<Arc<InMemory>> {
        self.buckets.get_or_build(name, |_| Ok(InMemory::new()))
    }

    pub async fn get(&self, location: &ObjectLocation) -> Option<Bytes> {
        self.read(location).await.ok()
    }

    /// Number of `write` calls served so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn exists(&self, location: &ObjectLocation) -> Result<bool> {
        let bucket = self.bucket(&location.bucket)?;
        bucket::exists(bucket.as_ref(), location).await
    }

    async fn read(&self, location: &ObjectLocation) -> Result<Bytes> {
        let bucket = self.bucket(&location.bucket)?;
        bucket::read(bucket.as_ref(), location).await
    }

    async fn write(&self, location: &ObjectLocation, data: Bytes) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let bucket = self.bucket(&location.bucket)?;
        bucket::write(bucket.as_ref(), location, data).await
    }
}
