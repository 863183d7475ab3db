//! Archive fetch: resolves a trigger's container to a storage backend.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use firelog_core::{ObjectStoreBackend, StorageBackend, TimeoutBackend};

use crate::error::{Error, Result};
use crate::notification::ArchiveRef;

/// Reads archive bytes by `(container, key)`.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Fetches the whole archive.
    ///
    /// A missing object surfaces as [`Error::Fetch`] with a `NotFound` cause.
    async fn fetch(&self, archive: &ArchiveRef) -> Result<Bytes>;
}

/// Container name → backend map.
///
/// Containers can be registered up front, or resolved on first use below a
/// base URL (see [`ObjectStoreBackend::for_container`]). Resolved backends are
/// cached for the life of the map.
#[derive(Default)]
pub struct Containers {
    backends: RwLock<HashMap<String, Arc<dyn StorageBackend>>>,
    base_url: Option<String>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for Containers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Containers")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn lock_err<T>(_: PoisonError<T>) -> Error {
    Error::Configuration {
        message: "container map lock poisoned".into(),
    }
}

impl Containers {
    /// Creates an empty map that only serves registered containers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a map that resolves unknown containers below `base_url`.
    pub fn from_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Self::default()
        }
    }

    /// Bounds every call on lazily resolved backends by `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Registers a backend for `name`.
    #[must_use]
    pub fn with_container(mut self, name: impl Into<String>, backend: impl StorageBackend) -> Self {
        self.backends
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Arc::new(backend));
        self
    }

    fn resolve(&self, container: &str) -> Result<Arc<dyn StorageBackend>> {
        if let Some(backend) = self.backends.read().map_err(lock_err)?.get(container) {
            return Ok(Arc::clone(backend));
        }

        let Some(base_url) = &self.base_url else {
            return Err(Error::Configuration {
                message: format!("unknown container '{container}'"),
            });
        };
        let resolved =
            ObjectStoreBackend::for_container(base_url, container).map_err(|e| {
                Error::Configuration {
                    message: format!("cannot resolve container '{container}': {e}"),
                }
            })?;
        tracing::debug!(container, backend = resolved.description(), "container resolved");

        let backend: Arc<dyn StorageBackend> = match self.timeout {
            Some(timeout) => Arc::new(TimeoutBackend::new(resolved, timeout)),
            None => Arc::new(resolved),
        };
        let mut backends = self.backends.write().map_err(lock_err)?;
        Ok(Arc::clone(
            backends.entry(container.to_string()).or_insert(backend),
        ))
    }
}

#[async_trait]
impl ArchiveSource for Containers {
    async fn fetch(&self, archive: &ArchiveRef) -> Result<Bytes> {
        let backend = self.resolve(&archive.container)?;
        backend
            .get(&archive.key)
            .await
            .map_err(|source| Error::Fetch {
                container: archive.container.clone(),
                key: archive.key.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use firelog_core::{MemoryBackend, PutOptions};

    use super::*;

    #[tokio::test]
    async fn fetches_from_registered_container() {
        let backend = MemoryBackend::new();
        backend
            .put("raw/a.zip", Bytes::from_static(b"PK"), PutOptions::default())
            .await
            .unwrap();
        let source = Containers::new().with_container("input", backend);

        let bytes = source.fetch(&ArchiveRef::new("input", "raw/a.zip")).await.unwrap();
        assert_eq!(&bytes[..], b"PK");
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let source = Containers::new().with_container("input", MemoryBackend::new());
        let err = source
            .fetch(&ArchiveRef::new("input", "raw/missing.zip"))
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "{err}");
    }

    #[tokio::test]
    async fn unknown_container_without_base_is_configuration_error() {
        let source = Containers::new();
        let err = source.fetch(&ArchiveRef::new("other", "k")).await.unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[tokio::test]
    async fn resolves_local_subdirectory_once() {
        let dir = std::env::temp_dir().join(format!("firelog-source-{}", std::process::id()));
        let base = format!("file://{}", dir.display());
        std::fs::create_dir_all(dir.join("input/raw")).unwrap();
        std::fs::write(dir.join("input/raw/a.zip"), b"zip").unwrap();

        let source = Containers::from_base_url(base).with_timeout(Duration::from_secs(5));
        let bytes = source.fetch(&ArchiveRef::new("input", "raw/a.zip")).await.unwrap();
        assert_eq!(&bytes[..], b"zip");
        assert_eq!(source.backends.read().unwrap().len(), 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
