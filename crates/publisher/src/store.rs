//! Object storage client for tile publication (S3 compatible).

use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

use tiles_common::{PipelineError, PipelineResult};

/// Destination for published tiles: constant across all layers, varying
/// only in the per-layer key prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicationTarget {
    /// S3 endpoint URL (empty for AWS default)
    #[serde(default)]
    pub endpoint: String,
    /// Bucket name
    pub bucket: String,
    /// AWS region
    pub region: String,
    /// Access key ID (empty to use the ambient credential chain)
    #[serde(default)]
    pub access_key_id: String,
    /// Secret access key
    #[serde(default)]
    pub secret_access_key: String,
    /// Allow HTTP (for local MinIO)
    #[serde(default)]
    pub allow_http: bool,
}

/// Object storage client for published tiles.
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectStorage {
    /// Create a client from a publication target.
    pub fn new(target: &PublicationTarget) -> PipelineResult<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&target.bucket)
            .with_region(&target.region);

        if !target.endpoint.is_empty() {
            builder = builder.with_endpoint(&target.endpoint);
        }
        if !target.access_key_id.is_empty() {
            builder = builder
                .with_access_key_id(&target.access_key_id)
                .with_secret_access_key(&target.secret_access_key);
        }
        if target.allow_http {
            builder = builder.with_allow_http(true);
        }

        let store = builder
            .build()
            .map_err(|e| PipelineError::Transport(format!("Failed to create S3 client: {}", e)))?;

        Ok(Self {
            store: Arc::new(store),
            bucket: target.bucket.clone(),
        })
    }

    /// Wrap an existing store. Tests use this with the in-memory backend.
    pub fn with_store(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Write bytes to a path, carrying an explicit content type.
    #[instrument(skip(self, data), fields(bucket = %self.bucket, path = %path))]
    pub async fn put(&self, path: &str, data: Bytes, content_type: &str) -> PipelineResult<()> {
        let location = Path::from(path);
        debug!(size = data.len(), content_type = content_type, "Writing object");

        let mut attributes = Attributes::new();
        attributes.insert(
            Attribute::ContentType,
            content_type.to_string().into(),
        );

        self.store
            .put_opts(&location, data.into(), PutOptions::from(attributes))
            .await
            .map_err(|e| PipelineError::Transport(format!("Failed to write {}: {}", path, e)))?;

        Ok(())
    }

    /// Read bytes from a path.
    pub async fn get(&self, path: &str) -> PipelineResult<Bytes> {
        let location = Path::from(path);

        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| PipelineError::Transport(format!("Failed to read {}: {}", path, e)))?;

        result
            .bytes()
            .await
            .map_err(|e| PipelineError::Transport(format!("Failed to read bytes: {}", e)))
    }

    /// Check if an object exists.
    pub async fn exists(&self, path: &str) -> PipelineResult<bool> {
        let location = Path::from(path);

        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(PipelineError::Transport(format!(
                "Failed to check {}: {}",
                path, e
            ))),
        }
    }

    /// List objects under a prefix with their sizes.
    pub async fn list_with_sizes(&self, prefix: &str) -> PipelineResult<Vec<(String, u64)>> {
        use futures::TryStreamExt;

        let prefix_path = Path::from(prefix);
        let mut objects = Vec::new();

        let mut stream = self.store.list(Some(&prefix_path));
        while let Some(meta) = stream
            .try_next()
            .await
            .map_err(|e| PipelineError::Transport(format!("List failed: {}", e)))?
        {
            objects.push((meta.location.to_string(), meta.size as u64));
        }

        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    #[tokio::test]
    async fn test_put_get_exists_roundtrip() {
        let storage = ObjectStorage::with_store(Arc::new(InMemory::new()), "test");

        assert!(!storage.exists("tiles/a/0/0/0.pbf").await.unwrap());

        storage
            .put(
                "tiles/a/0/0/0.pbf",
                Bytes::from_static(b"tile-bytes"),
                crate::TILE_CONTENT_TYPE,
            )
            .await
            .unwrap();

        assert!(storage.exists("tiles/a/0/0/0.pbf").await.unwrap());
        assert_eq!(
            storage.get("tiles/a/0/0/0.pbf").await.unwrap(),
            Bytes::from_static(b"tile-bytes")
        );
    }

    #[tokio::test]
    async fn test_list_with_sizes_scoped_to_prefix() {
        let storage = ObjectStorage::with_store(Arc::new(InMemory::new()), "test");

        storage
            .put("tiles/a/0/0/0.pbf", Bytes::from_static(b"abc"), crate::TILE_CONTENT_TYPE)
            .await
            .unwrap();
        storage
            .put("tiles/b/0/0/0.pbf", Bytes::from_static(b"defgh"), crate::TILE_CONTENT_TYPE)
            .await
            .unwrap();

        let listed = storage.list_with_sizes("tiles/a").await.unwrap();
        assert_eq!(listed, vec![("tiles/a/0/0/0.pbf".to_string(), 3)]);
    }
}
