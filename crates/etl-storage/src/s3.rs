use crate::bucket::{self, BucketClients};
use crate::{ObjectLocation, ObjectStore, Result};
use async_trait::async_trait;
use bytes::Bytes;
use etl_core::ObjectStoreSettings;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use std::sync::Arc;

/// S3-compatible backend (AWS S3 or MinIO).
///
/// `object_store` clients are bound to a single bucket, so one client is
/// built lazily per bucket and reused for the lifetime of the store.
pub struct S3Store {
    settings: ObjectStoreSettings,
    clients: BucketClients<AmazonS3>,
}

impl S3Store {
    pub fn new(settings: ObjectStoreSettings) -> Self {
        Self {
            settings,
            clients: BucketClients::new(),
        }
    }

    fn client(&self, bucket: &str) -> Result<Arc<AmazonS3>> {
        self.clients
            .get_or_build(bucket, |bucket| Ok(self.builder(bucket).build()?))
    }

    fn builder(&self, bucket: &str) -> AmazonS3Builder {
        let settings = &self.settings;
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(bucket)
            .with_region(&settings.region)
            .with_allow_http(settings.allow_http)
            // MinIO only serves path-style requests
            .with_virtual_hosted_style_request(false);

        if let Some(endpoint) = settings.endpoint() {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(access_key) = &settings.access_key {
            builder = builder.with_access_key_id(access_key);
        }
        if let Some(secret_key) = &settings.secret_key {
            builder = builder.with_secret_access_key(secret_key);
        }
        builder
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn exists(&self, location: &ObjectLocation) -> Result<bool> {
        let client = self.client(&location.bucket)?;
        bucket::exists(client.as_ref(), location).await
    }

    async fn read(&self, location: &ObjectLocation) -> Result<Bytes> {
        let client = self.client(&location.bucket)?;
        bucket::read(client.as_ref(), location).await
    }

    async fn write(&self, location: &ObjectLocation, data: Bytes) -> Result<()> {
        let client = self.client(&location.bucket)?;
        bucket::write(client.as_ref(), location, data).await
    }
}
