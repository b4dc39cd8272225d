//! In-memory object store, for tests and single-process tooling.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use parking_lot::Mutex;

use sigil_core::error::{Error, Result};

use crate::traits::{KeyStream, ObjectStore, WriteAttrs};

#[derive(Debug, Clone)]
struct Object {
    data: Vec<u8>,
    generation: i64,
    cache_control: Option<String>,
}

/// In-memory [`ObjectStore`] backed by a mutex-guarded map.
///
/// Clones share the same underlying store, so a test can hand one clone to
/// a writer and read back through another.
#[derive(Clone, Default)]
pub struct MemBackend {
    objects: Arc<Mutex<HashMap<String, Object>>>,
}

impl MemBackend {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    /// True if no objects are stored.
    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    /// The cache-control value recorded for a key, if any.
    pub fn cache_control(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .get(key)
            .and_then(|o| o.cache_control.clone())
    }
}

#[async_trait]
impl ObjectStore for MemBackend {
    async fn read(&self, key: &str) -> Result<(Vec<u8>, i64)> {
        let objects = self.objects.lock();
        match objects.get(key) {
            Some(o) => Ok((o.data.clone(), o.generation)),
            None => Err(Error::not_exist(key)),
        }
    }

    async fn write(&self, key: &str, data: &[u8], attrs: &WriteAttrs) -> Result<()> {
        let mut objects = self.objects.lock();
        let generation = objects.get(key).map(|o| o.generation).unwrap_or(0) + 1;
        objects.insert(
            key.to_string(),
            Object {
                data: data.to_vec(),
                generation,
                cache_control: attrs.cache_control.clone(),
            },
        );
        Ok(())
    }

    async fn write_if_absent(&self, key: &str, data: &[u8], attrs: &WriteAttrs) -> Result<()> {
        let mut objects = self.objects.lock();
        if objects.contains_key(key) {
            return Err(Error::precondition(key));
        }
        objects.insert(
            key.to_string(),
            Object {
                data: data.to_vec(),
                generation: 1,
                cache_control: attrs.cache_control.clone(),
            },
        );
        Ok(())
    }

    async fn write_if_generation(
        &self,
        key: &str,
        generation: i64,
        data: &[u8],
        attrs: &WriteAttrs,
    ) -> Result<()> {
        let mut objects = self.objects.lock();
        let current = objects.get(key).map(|o| o.generation).unwrap_or(0);
        if current != generation {
            return Err(Error::precondition(key));
        }
        objects.insert(
            key.to_string(),
            Object {
                data: data.to_vec(),
                generation: current + 1,
                cache_control: attrs.cache_control.clone(),
            },
        );
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<KeyStream> {
        let mut keys: Vec<String> = {
            let objects = self.objects.lock();
            objects
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect()
        };
        keys.sort();
        Ok(stream::iter(keys.into_iter().map(Ok)).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn test_read_write_roundtrip() {
        let store = MemBackend::new();
        store
            .write("a/b", b"hello", &WriteAttrs::default())
            .await
            .unwrap();
        let (data, generation) = store.read("a/b").await.unwrap();
        assert_eq!(data, b"hello");
        assert_eq!(generation, 1);
    }

    #[tokio::test]
    async fn test_read_missing() {
        let store = MemBackend::new();
        assert!(store.read("nope").await.unwrap_err().is_not_exist());
    }

    #[tokio::test]
    async fn test_generation_increases() {
        let store = MemBackend::new();
        let attrs = WriteAttrs::default();
        store.write("k", b"v1", &attrs).await.unwrap();
        store.write("k", b"v2", &attrs).await.unwrap();
        let (data, generation) = store.read("k").await.unwrap();
        assert_eq!(data, b"v2");
        assert_eq!(generation, 2);
    }

    #[tokio::test]
    async fn test_write_if_absent_conflict() {
        let store = MemBackend::new();
        let attrs = WriteAttrs::default();
        store.write_if_absent("k", b"first", &attrs).await.unwrap();
        let err = store.write_if_absent("k", b"second", &attrs).await.unwrap_err();
        assert!(err.is_precondition());
        let (data, _) = store.read("k").await.unwrap();
        assert_eq!(data, b"first");
    }

    #[tokio::test]
    async fn test_write_if_generation() {
        let store = MemBackend::new();
        let attrs = WriteAttrs::default();

        // Generation 0 means "create".
        store.write_if_generation("k", 0, b"v1", &attrs).await.unwrap();
        let (_, generation) = store.read("k").await.unwrap();

        store
            .write_if_generation("k", generation, b"v2", &attrs)
            .await
            .unwrap();

        // The stale generation no longer matches.
        let err = store
            .write_if_generation("k", generation, b"v3", &attrs)
            .await
            .unwrap_err();
        assert!(err.is_precondition());
    }

    #[tokio::test]
    async fn test_list_ordered_prefix() {
        let store = MemBackend::new();
        let attrs = WriteAttrs::default();
        for key in ["seq/00/00/00/02", "seq/00/00/00/00", "seq/00/00/00/01", "tile/x"] {
            store.write(key, b"", &attrs).await.unwrap();
        }
        let keys: Vec<String> = store
            .list("seq/")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(
            keys,
            vec!["seq/00/00/00/00", "seq/00/00/00/01", "seq/00/00/00/02"]
        );
    }

    #[tokio::test]
    async fn test_cache_control_recorded() {
        let store = MemBackend::new();
        store
            .write("k", b"v", &WriteAttrs::cache_control("no-cache"))
            .await
            .unwrap();
        assert_eq!(store.cache_control("k"), Some("no-cache".to_string()));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemBackend::new();
        let other = store.clone();
        store.write("k", b"v", &WriteAttrs::default()).await.unwrap();
        assert_eq!(other.read("k").await.unwrap().0, b"v");
    }
}
