use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;

/// Bucket + key address of one object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Whole-object storage backend (S3, MinIO, memory).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exists(&self, location: &ObjectLocation) -> Result<bool>;

    async fn read(&self, location: &ObjectLocation) -> Result<Bytes>;

    async fn write(&self, location: &ObjectLocation, data: Bytes) -> Result<()>;
}
