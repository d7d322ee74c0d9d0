use crate::{Error, ObjectLocation, Result};
use bytes::Bytes;
use object_store::path::Path;
use object_store::ObjectStore as RemoteStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Lazily built `object_store` clients, one per bucket.
pub(crate) struct BucketClients<S> {
    clients: Mutex<HashMap<String, Arc<S>>>,
}

impl<S> BucketClients<S> {
    pub(crate) fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn get_or_build<B>(&self, bucket: &str, build: B) -> Result<Arc<S>>
    where
        B: FnOnce(&str) -> Result<S>,
    {
        if bucket.is_empty() {
            return Err(Error::Config("bucket name is empty".to_string()));
        }

        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(client) = clients.get(bucket) {
            return Ok(client.clone());
        }

        let client = Arc::new(build(bucket)?);
        tracing::debug!("Created object store client for bucket {}", bucket);
        clients.insert(bucket.to_string(), client.clone());
        Ok(client)
    }
}

pub(crate) async fn exists<S: RemoteStore>(client: &S, location: &ObjectLocation) -> Result<bool> {
    match client.head(&Path::from(location.key.as_str())).await {
        Ok(_) => Ok(true),
        Err(object_store::Error::NotFound { .. }) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

pub(crate) async fn read<S: RemoteStore>(client: &S, location: &ObjectLocation) -> Result<Bytes> {
    let result = match client.get(&Path::from(location.key.as_str())).await {
        Ok(result) => result,
        Err(object_store::Error::NotFound { .. }) => {
            return Err(Error::NotFound(location.to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    let data = result.bytes().await?;
    tracing::debug!("Read {} bytes from {}", data.len(), location);
    Ok(data)
}

pub(crate) async fn write<S: RemoteStore>(
    client: &S,
    location: &ObjectLocation,
    data: Bytes,
) -> Result<()> {
    let size = data.len();
    client
        .put(&Path::from(location.key.as_str()), data.into())
        .await?;

    tracing::debug!("Wrote {} bytes to {}", size, location);
    Ok(())
}
