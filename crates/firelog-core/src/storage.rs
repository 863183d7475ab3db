//! Storage backend abstraction for object storage (S3, local filesystem, memory).
//!
//! This module defines the object storage contract used by every firelog stage:
//! - Unconditional whole-object writes (last writer wins per path)
//! - Content type carried with each write
//! - Directory-prefix listing
//!
//! ## Backends
//!
//! - [`MemoryBackend`]: thread-safe in-process map for tests and dry runs
//! - [`ObjectStoreBackend`]: any `object_store` implementation, selected by URL
//! - [`TimeoutBackend`]: wraps another backend and bounds every call by a deadline

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use object_store::path::Path as StorePath;
use object_store::{Attribute, Attributes, ObjectStore, PutPayload};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{Error, Result};

/// Content type used for JSON documents.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Options attached to a write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// MIME type recorded with the object, if any.
    pub content_type: Option<String>,
}

impl PutOptions {
    /// Options for a JSON document.
    #[must_use]
    pub fn json() -> Self {
        Self {
            content_type: Some(CONTENT_TYPE_JSON.to_string()),
        }
    }
}

/// Metadata about a stored object.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Object path (key).
    pub path: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last modification timestamp.
    pub last_modified: Option<DateTime<Utc>>,
    /// Content type recorded at write time, when the backend keeps it.
    pub content_type: Option<String>,
}

/// Storage backend trait for object storage.
///
/// All storage backends (S3, local, memory) implement this trait.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Reads entire object.
    ///
    /// Returns `Error::NotFound` if object doesn't exist.
    async fn get(&self, path: &str) -> Result<Bytes>;

    /// Writes the whole object, replacing any previous content.
    async fn put(&self, path: &str, data: Bytes, options: PutOptions) -> Result<()>;

    /// Deletes an object.
    ///
    /// Succeeds even if object doesn't exist (idempotent).
    async fn delete(&self, path: &str) -> Result<()>;

    /// Lists objects under a directory prefix (e.g. `aggregates/date=2025-04-28/`).
    ///
    /// **Ordering**: arbitrary. Callers requiring deterministic order must sort.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>>;

    /// Gets object metadata without reading content.
    ///
    /// Returns `None` if object doesn't exist.
    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>>;
}

#[async_trait]
impl<T: StorageBackend + ?Sized> StorageBackend for Arc<T> {
    async fn get(&self, path: &str) -> Result<Bytes> {
        (**self).get(path).await
    }

    async fn put(&self, path: &str, data: Bytes, options: PutOptions) -> Result<()> {
        (**self).put(path, data, options).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        (**self).delete(path).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        (**self).list(prefix).await
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        (**self).head(path).await
    }
}

// ============================================================================
// MemoryBackend
// ============================================================================

/// In-memory storage backend for testing.
///
/// Thread-safe via `RwLock`. Not suitable for production. Clones share state.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
    last_modified: DateTime<Utc>,
}

impl StoredObject {
    fn meta(&self, path: &str) -> ObjectMeta {
        ObjectMeta {
            path: path.to_string(),
            size: self.data.len() as u64,
            last_modified: Some(self.last_modified),
            content_type: self.content_type.clone(),
        }
    }
}

fn poisoned() -> Error {
    Error::Internal {
        message: "lock poisoned".into(),
    }
}

impl MemoryBackend {
    /// Creates a new empty memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every stored path, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn paths(&self) -> Result<Vec<String>> {
        let objects = self.objects.read().map_err(|_| poisoned())?;
        let mut paths: Vec<String> = objects.keys().cloned().collect();
        paths.sort();
        Ok(paths)
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let objects = self.objects.read().map_err(|_| poisoned())?;

        objects
            .get(path)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NotFound(format!("object not found: {path}")))
    }

    async fn put(&self, path: &str, data: Bytes, options: PutOptions) -> Result<()> {
        self.objects.write().map_err(|_| poisoned())?.insert(
            path.to_string(),
            StoredObject {
                data,
                content_type: options.content_type,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.objects.write().map_err(|_| poisoned())?.remove(path);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let objects = self.objects.read().map_err(|_| poisoned())?;

        Ok(objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(path, obj)| obj.meta(path))
            .collect())
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let objects = self.objects.read().map_err(|_| poisoned())?;
        Ok(objects.get(path).map(|obj| obj.meta(path)))
    }
}

// ============================================================================
// ObjectStoreBackend
// ============================================================================

/// Storage backend over any [`object_store::ObjectStore`].
///
/// Construct from a URL with [`ObjectStoreBackend::from_url`]:
///
/// | URL | Store |
/// |-----|-------|
/// | `memory://` | `object_store::memory::InMemory` |
/// | `s3://bucket` | `AmazonS3`, credentials from the environment |
/// | `file:///dir` or `/dir` | `LocalFileSystem` rooted at `dir` (created if missing) |
///
/// `LocalFileSystem` rejects object attributes, so local backends write
/// without a content type.
#[derive(Debug, Clone)]
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    description: String,
    supports_attributes: bool,
}

impl ObjectStoreBackend {
    /// Wraps an existing object store.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, description: impl Into<String>) -> Self {
        Self {
            store,
            description: description.into(),
            supports_attributes: true,
        }
    }

    /// Drops put attributes (content type) for stores that reject them.
    #[must_use]
    pub fn without_attributes(mut self) -> Self {
        self.supports_attributes = false;
        self
    }

    /// Returns true if puts carry the content type to the store.
    #[must_use]
    pub fn supports_attributes(&self) -> bool {
        self.supports_attributes
    }

    /// Creates a backend from a storage URL.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for unsupported schemes and
    /// `Error::Storage` if the store cannot be built.
    pub fn from_url(url: &str) -> Result<Self> {
        if url == "memory://" || url == "memory" {
            return Ok(Self::new(
                Arc::new(object_store::memory::InMemory::new()),
                "memory://",
            ));
        }

        if let Some(bucket) = url.strip_prefix("s3://") {
            let bucket = bucket.trim_end_matches('/');
            if bucket.is_empty() || bucket.contains('/') {
                return Err(Error::InvalidInput(format!(
                    "expected s3://<bucket>, got '{url}'"
                )));
            }
            let store = object_store::aws::AmazonS3Builder::from_env()
                .with_bucket_name(bucket)
                .build()
                .map_err(|e| Error::storage_with_source(format!("failed to build {url}"), e))?;
            return Ok(Self::new(Arc::new(store), url));
        }

        let dir = url.strip_prefix("file://").unwrap_or(url);
        if dir.is_empty() || dir.contains("://") {
            return Err(Error::InvalidInput(format!(
                "unsupported storage url '{url}'"
            )));
        }
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::storage_with_source(format!("failed to create {dir}"), e))?;
        let store = object_store::local::LocalFileSystem::new_with_prefix(dir)
            .map_err(|e| Error::storage_with_source(format!("failed to open {dir}"), e))?;
        Ok(Self::new(Arc::new(store), format!("file://{dir}")).without_attributes())
    }

    /// Creates a backend for one named container below a base URL.
    ///
    /// How the container maps onto the base depends on the scheme:
    ///
    /// - `s3:` resolves the container as the bucket name.
    /// - `s3://bucket` ignores the container and always uses `bucket`.
    /// - `memory://` builds a fresh, empty `InMemory` store per call, so
    ///   containers never share objects.
    /// - local URLs resolve it as a subdirectory of the base directory.
    ///
    /// # Errors
    ///
    /// See [`ObjectStoreBackend::from_url`].
    pub fn for_container(base_url: &str, container: &str) -> Result<Self> {
        if container.is_empty() || container.contains("..") {
            return Err(Error::InvalidInput(format!(
                "invalid container name '{container}'"
            )));
        }
        if base_url.trim_end_matches('/') == "s3:" {
            return Self::from_url(&format!("s3://{container}"));
        }
        if base_url.starts_with("memory") || base_url.starts_with("s3://") {
            return Self::from_url(base_url);
        }
        let base = base_url.trim_end_matches('/');
        Self::from_url(&format!("{base}/{container}"))
    }

    /// Returns the URL-like description this backend was built from.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

fn map_store_error(op: &str, path: &str, err: object_store::Error) -> Error {
    match err {
        object_store::Error::NotFound { .. } => {
            Error::NotFound(format!("object not found: {path}"))
        }
        other => Error::storage_with_source(format!("{op} {path} failed"), other),
    }
}

fn convert_meta(meta: object_store::ObjectMeta) -> ObjectMeta {
    ObjectMeta {
        path: meta.location.to_string(),
        size: meta.size as u64,
        last_modified: Some(meta.last_modified),
        content_type: None,
    }
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let location = StorePath::from(path);
        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| map_store_error("get", path, e))?;
        result
            .bytes()
            .await
            .map_err(|e| map_store_error("get", path, e))
    }

    async fn put(&self, path: &str, data: Bytes, options: PutOptions) -> Result<()> {
        let location = StorePath::from(path);
        let mut attributes = Attributes::new();
        if let Some(content_type) = options.content_type.filter(|_| self.supports_attributes) {
            attributes.insert(Attribute::ContentType, content_type.into());
        }
        let opts = object_store::PutOptions {
            attributes,
            ..Default::default()
        };
        self.store
            .put_opts(&location, PutPayload::from(data), opts)
            .await
            .map_err(|e| map_store_error("put", path, e))?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let location = StorePath::from(path);
        match self.store.delete(&location).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(map_store_error("delete", path, e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let location = StorePath::from(prefix);
        let metas: Vec<object_store::ObjectMeta> = self
            .store
            .list(Some(&location))
            .try_collect()
            .await
            .map_err(|e| map_store_error("list", prefix, e))?;
        Ok(metas.into_iter().map(convert_meta).collect())
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let location = StorePath::from(path);
        match self.store.head(&location).await {
            Ok(meta) => Ok(Some(convert_meta(meta))),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(map_store_error("head", path, e)),
        }
    }
}

// ============================================================================
// TimeoutBackend
// ============================================================================

/// Bounds every call on the wrapped backend by a fixed deadline.
///
/// Elapsed deadlines surface as [`Error::Timeout`]; the call is abandoned.
#[derive(Debug, Clone)]
pub struct TimeoutBackend<B> {
    inner: B,
    timeout: Duration,
}

impl<B: StorageBackend> TimeoutBackend<B> {
    /// Wraps `inner` with a per-call deadline.
    #[must_use]
    pub fn new(inner: B, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(
        &self,
        operation: impl FnOnce() -> String,
        fut: impl std::future::Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| Error::Timeout {
                operation: operation(),
                elapsed_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            })?
    }
}

#[async_trait]
impl<B: StorageBackend> StorageBackend for TimeoutBackend<B> {
    async fn get(&self, path: &str) -> Result<Bytes> {
        self.bounded(|| format!("get {path}"), self.inner.get(path))
            .await
    }

    async fn put(&self, path: &str, data: Bytes, options: PutOptions) -> Result<()> {
        self.bounded(|| format!("put {path}"), self.inner.put(path, data, options))
            .await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.bounded(|| format!("delete {path}"), self.inner.delete(path))
            .await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        self.bounded(|| format!("list {prefix}"), self.inner.list(prefix))
            .await
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        self.bounded(|| format!("head {path}"), self.inner.head(path))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_roundtrip() {
        let backend = MemoryBackend::new();
        let data = Bytes::from("hello world");

        backend
            .put("test/file.txt", data.clone(), PutOptions::default())
            .await
            .expect("put should succeed");

        let retrieved = backend
            .get("test/file.txt")
            .await
            .expect("get should succeed");
        assert_eq!(retrieved, data);
    }

    #[tokio::test]
    async fn test_put_overwrites_and_keeps_content_type() {
        let backend = MemoryBackend::new();
        backend
            .put("data/d.json", Bytes::from("{}"), PutOptions::json())
            .await
            .unwrap();
        backend
            .put("data/d.json", Bytes::from("{\"a\":1}"), PutOptions::json())
            .await
            .unwrap();

        let meta = backend.head("data/d.json").await.unwrap().expect("exists");
        assert_eq!(meta.size, 7);
        assert_eq!(meta.content_type.as_deref(), Some(CONTENT_TYPE_JSON));
        assert_eq!(backend.paths().unwrap(), vec!["data/d.json".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend.get("raw/missing.zip").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_with_prefix() {
        let backend = MemoryBackend::new();

        for path in ["a/1.txt", "a/2.txt", "b/1.txt"] {
            backend
                .put(path, Bytes::from("x"), PutOptions::default())
                .await
                .unwrap();
        }

        assert_eq!(backend.list("a/").await.unwrap().len(), 2);
        assert_eq!(backend.list("b/").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let backend = MemoryBackend::new();
        backend
            .put("del.txt", Bytes::from("data"), PutOptions::default())
            .await
            .unwrap();

        backend.delete("del.txt").await.expect("should succeed");
        backend.delete("del.txt").await.expect("should succeed");
        assert!(backend.head("del.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_object_store_backend_memory_url() {
        let backend = ObjectStoreBackend::from_url("memory://").expect("memory store");
        backend
            .put(
                "aggregates/date=2025-04-28/hour=10.json",
                Bytes::from("{}"),
                PutOptions::json(),
            )
            .await
            .unwrap();

        let listed = backend.list("aggregates/date=2025-04-28/").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path, "aggregates/date=2025-04-28/hour=10.json");

        let err = backend.get("aggregates/none.json").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(backend.head("aggregates/none.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_local_backend_accepts_json_puts() {
        let dir = std::env::temp_dir().join(format!("firelog-core-local-{}", std::process::id()));
        let backend =
            ObjectStoreBackend::from_url(&format!("file://{}", dir.display())).expect("local store");
        assert!(!backend.supports_attributes());

        backend
            .put("data/2025-04-28.json", Bytes::from("{}"), PutOptions::json())
            .await
            .expect("local put with content type");
        backend
            .put("data/2025-04-28.json", Bytes::from("{\"a\":1}"), PutOptions::json())
            .await
            .expect("local overwrite");

        assert_eq!(
            backend.get("data/2025-04-28.json").await.unwrap(),
            Bytes::from("{\"a\":1}")
        );
        assert_eq!(backend.list("data/").await.unwrap().len(), 1);
        assert!(ObjectStoreBackend::from_url("memory://").unwrap().supports_attributes());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_unsupported_url_rejected() {
        assert!(matches!(
            ObjectStoreBackend::from_url("gs://bucket"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            ObjectStoreBackend::from_url("s3://bucket/nested"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            ObjectStoreBackend::for_container("memory://", "../escape"),
            Err(Error::InvalidInput(_))
        ));
    }

    struct SlowBackend;

    #[async_trait]
    impl StorageBackend for SlowBackend {
        async fn get(&self, _path: &str) -> Result<Bytes> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Bytes::new())
        }
        async fn put(&self, _path: &str, _data: Bytes, _options: PutOptions) -> Result<()> {
            Ok(())
        }
        async fn delete(&self, _path: &str) -> Result<()> {
            Ok(())
        }
        async fn list(&self, _prefix: &str) -> Result<Vec<ObjectMeta>> {
            Ok(Vec::new())
        }
        async fn head(&self, _path: &str) -> Result<Option<ObjectMeta>> {
            Ok(None)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_backend_bounds_slow_calls() {
        let backend = TimeoutBackend::new(SlowBackend, Duration::from_millis(250));
        let err = backend.get("raw/slow.zip").await.unwrap_err();
        match err {
            Error::Timeout {
                operation,
                elapsed_ms,
            } => {
                assert_eq!(operation, "get raw/slow.zip");
                assert_eq!(elapsed_ms, 250);
            }
            other => panic!("expected timeout, got {other:?}"),
        }

        // Fast calls pass through untouched.
        backend
            .put("x", Bytes::new(), PutOptions::default())
            .await
            .expect("put should pass through");
    }
}
