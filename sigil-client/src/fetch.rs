//! Fetching raw log objects.

use async_trait::async_trait;

use sigil_storage::ObjectStore;

/// Read-only access to log objects by path.
///
/// Implementations fetch from wherever the log is served: an object-store
/// backend directly, or an HTTP frontend exposing the same paths.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the raw bytes of the object at `path`.
    ///
    /// Absent objects surface as `NotExist`.
    async fn fetch(&self, path: &str) -> sigil_core::Result<Vec<u8>>;
}

/// Adapter exposing any [`ObjectStore`] as a [`Fetcher`].
pub struct ObjectFetcher<B> {
    backend: B,
}

impl<B: ObjectStore> ObjectFetcher<B> {
    /// Wrap a backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl<B: ObjectStore> Fetcher for ObjectFetcher<B> {
    async fn fetch(&self, path: &str) -> sigil_core::Result<Vec<u8>> {
        let (data, _) = self.backend.read(path).await?;
        Ok(data)
    }
}
