//! Object storage reads and writes keyed by bucket and key

use super::{Reader, Writer};
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutOptions, PutPayload, TagSet};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error};

/// Object tags, written as an S3 tag set
pub type Tags = BTreeMap<String, String>;

/// Build the tag set attached to an uploaded object
pub fn tag_set(tags: &Tags) -> TagSet {
    let mut set = TagSet::default();
    for (key, value) in tags {
        set.push(key, value);
    }
    set
}

/// Hands out the object store backing a bucket
pub trait StoreProvider: Send + Sync + fmt::Debug {
    fn store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>>;
}

type StoreCache = Mutex<HashMap<String, Arc<dyn ObjectStore>>>;

fn cached_store(
    cache: &StoreCache,
    bucket: &str,
    build: impl FnOnce() -> Result<Arc<dyn ObjectStore>>,
) -> Result<Arc<dyn ObjectStore>> {
    let mut stores = cache.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(store) = stores.get(bucket) {
        return Ok(store.clone());
    }
    let store = build()?;
    stores.insert(bucket.to_string(), store.clone());
    Ok(store)
}

/// S3 stores configured from the `AWS_*` environment
#[derive(Debug, Default)]
pub struct S3StoreProvider {
    endpoint_url: Option<String>,
    stores: StoreCache,
}

impl S3StoreProvider {
    /// Use the default AWS endpoint (or `AWS_ENDPOINT` if set)
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom S3-compatible endpoint such as MinIO or localstack
    pub fn with_endpoint(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: Some(endpoint_url.into()),
            ..Self::default()
        }
    }

    fn build(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);

        if let Some(endpoint) = &self.endpoint_url {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"))
                .with_virtual_hosted_style_request(false);
        }

        let store = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to create S3 client for {bucket}: {e}")))?;
        Ok(Arc::new(store))
    }
}

impl StoreProvider for S3StoreProvider {
    fn store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        cached_store(&self.stores, bucket, || self.build(bucket))
    }
}

/// Process-local stores, one per bucket, created on first use
#[derive(Debug, Default)]
pub struct InMemoryStoreProvider {
    stores: StoreCache,
}

impl InMemoryStoreProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreProvider for InMemoryStoreProvider {
    fn store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        cached_store(&self.stores, bucket, || Ok(Arc::new(InMemory::new())))
    }
}

/// Reads and writes whole objects by bucket and key
#[derive(Debug, Clone)]
pub struct ObjectStorage {
    provider: Arc<dyn StoreProvider>,
}

impl ObjectStorage {
    /// Create storage over any store provider
    pub fn new(provider: impl StoreProvider + 'static) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }

    /// S3 storage, optionally against a custom endpoint
    pub fn s3(endpoint_url: Option<String>) -> Self {
        match endpoint_url {
            Some(endpoint) => Self::new(S3StoreProvider::with_endpoint(endpoint)),
            None => Self::new(S3StoreProvider::new()),
        }
    }

    /// Storage that lives only as long as this process
    pub fn in_memory() -> Self {
        Self::new(InMemoryStoreProvider::new())
    }
}

#[async_trait]
impl Reader for ObjectStorage {
    async fn read(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let store = self.provider.store(bucket)?;
        let path = ObjectPath::from(key);

        let result = match store.get(&path).await {
            Ok(result) => result.bytes().await,
            Err(e) => Err(e),
        };

        result.map_err(|e| {
            error!("Failed to get {} from {}: {}", key, bucket, e);
            match e {
                object_store::Error::NotFound { .. } => Error::ObjectNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                },
                other => Error::ObjectStore(other),
            }
        })
    }
}

#[async_trait]
impl Writer for ObjectStorage {
    async fn write(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        tags: Option<&Tags>,
    ) -> Result<()> {
        let store = self.provider.store(bucket)?;
        let path = ObjectPath::from(key);
        let size = body.len();

        let options = PutOptions {
            tags: tags.map(tag_set).unwrap_or_default(),
            ..PutOptions::default()
        };

        store
            .put_opts(&path, PutPayload::from(body), options)
            .await
            .map_err(|e| {
                error!("Failed to put {} to {}: {}", key, bucket, e);
                Error::ObjectStore(e)
            })?;

        debug!("Wrote {} bytes to {}/{}", size, bucket, key);
        Ok(())
    }
}
