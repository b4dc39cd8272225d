//! Local-filesystem object store.
//!
//! Keys map directly onto paths below a root directory. Conditional
//! creates use `O_EXCL` and are atomic against concurrent writers;
//! generation-guarded replaces derive generations from file modification
//! times and are only race-free within a single process. Production
//! deployments put a real object store behind [`ObjectStore`] instead;
//! this backend exists for local logs, tooling, and tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use sigil_core::error::{Error, Result};

use crate::traits::{KeyStream, ObjectStore, WriteAttrs};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Filesystem-backed [`ObjectStore`] rooted at a directory.
///
/// Write attributes (cache-control) have no filesystem equivalent and are
/// ignored.
#[derive(Debug, Clone)]
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    /// Open a backend over an existing root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the root directory for a new log and open a backend over it.
    ///
    /// Fails if the directory already exists.
    pub async fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if tokio::fs::metadata(&root).await.is_ok() {
            return Err(Error::malformed(format!(
                "log root {} already exists",
                root.display()
            )));
        }
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| Error::transport(root.display().to_string(), e))?;
        Ok(Self { root })
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty()
            || key.starts_with('/')
            || key.split('/').any(|c| c.is_empty() || c == "." || c == "..")
        {
            return Err(Error::malformed(format!("invalid object key {key:?}")));
        }
        Ok(self.root.join(key))
    }

    async fn generation_of(&self, path: &Path) -> Result<i64> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => {
                let modified = meta
                    .modified()
                    .map_err(|e| Error::transport(path.display().to_string(), e))?;
                let nanos = modified
                    .duration_since(UNIX_EPOCH)
                    .map_err(|e| Error::transport(path.display().to_string(), e))?
                    .as_nanos();
                Ok(nanos as i64)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(Error::transport(path.display().to_string(), e)),
        }
    }

    async fn ensure_parent(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::transport(parent.display().to_string(), e))?;
        }
        Ok(())
    }

    /// Write via a temporary file and rename, so readers never observe a
    /// torn object.
    async fn replace(&self, path: &Path, data: &[u8]) -> Result<()> {
        let tmp_name = format!(
            ".sigil-tmp-{}-{}",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        let tmp = match path.parent() {
            Some(parent) => parent.join(tmp_name),
            None => PathBuf::from(tmp_name),
        };
        tokio::fs::write(&tmp, data)
            .await
            .map_err(|e| Error::transport(tmp.display().to_string(), e))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| Error::transport(path.display().to_string(), e))?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FsBackend {
    async fn read(&self, key: &str) -> Result<(Vec<u8>, i64)> {
        let path = self.key_path(key)?;
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::not_exist(key))
            }
            Err(e) => return Err(Error::transport(key, e)),
        };
        let generation = self.generation_of(&path).await?;
        Ok((data, generation))
    }

    async fn write(&self, key: &str, data: &[u8], _attrs: &WriteAttrs) -> Result<()> {
        let path = self.key_path(key)?;
        self.ensure_parent(&path).await?;
        self.replace(&path, data).await
    }

    async fn write_if_absent(&self, key: &str, data: &[u8], _attrs: &WriteAttrs) -> Result<()> {
        let path = self.key_path(key)?;
        self.ensure_parent(&path).await?;
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(Error::precondition(key))
            }
            Err(e) => return Err(Error::transport(key, e)),
        };
        file.write_all(data)
            .await
            .map_err(|e| Error::transport(key, e))?;
        file.flush().await.map_err(|e| Error::transport(key, e))?;
        Ok(())
    }

    async fn write_if_generation(
        &self,
        key: &str,
        generation: i64,
        data: &[u8],
        attrs: &WriteAttrs,
    ) -> Result<()> {
        let path = self.key_path(key)?;
        let current = self.generation_of(&path).await?;
        if current != generation {
            return Err(Error::precondition(key));
        }
        if current == 0 {
            return self.write_if_absent(key, data, attrs).await;
        }
        self.replace(&path, data).await
    }

    async fn list(&self, prefix: &str) -> Result<KeyStream> {
        // Walk from the deepest directory named by the prefix.
        let dir_part = match prefix.rfind('/') {
            Some(i) => &prefix[..i],
            None => "",
        };
        let start = if dir_part.is_empty() {
            self.root.clone()
        } else {
            self.root.join(dir_part)
        };

        let mut keys = Vec::new();
        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::transport(dir.display().to_string(), e)),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Error::transport(dir.display().to_string(), e))?
            {
                let name = entry.file_name();
                let name = match name.to_str() {
                    Some(name) => name,
                    None => continue,
                };
                // Skip in-flight temporary files and other dotfiles.
                if name.starts_with('.') {
                    continue;
                }
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| Error::transport(path.display().to_string(), e))?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if let Ok(rel) = path.strip_prefix(&self.root) {
                    let key = rel
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    if key.starts_with(prefix) {
                        keys.push(key);
                    }
                }
            }
        }
        keys.sort();
        Ok(stream::iter(keys.into_iter().map(Ok)).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use tempfile::TempDir;

    fn backend() -> (TempDir, FsBackend) {
        let dir = TempDir::new().unwrap();
        let backend = FsBackend::new(dir.path());
        (dir, backend)
    }

    #[tokio::test]
    async fn test_read_write_roundtrip() {
        let (_dir, store) = backend();
        store
            .write("seq/00/00/00/00", b"entry", &WriteAttrs::default())
            .await
            .unwrap();
        let (data, generation) = store.read("seq/00/00/00/00").await.unwrap();
        assert_eq!(data, b"entry");
        assert!(generation > 0);
    }

    #[tokio::test]
    async fn test_read_missing() {
        let (_dir, store) = backend();
        assert!(store.read("missing").await.unwrap_err().is_not_exist());
    }

    #[tokio::test]
    async fn test_write_if_absent_conflict() {
        let (_dir, store) = backend();
        let attrs = WriteAttrs::default();
        store.write_if_absent("k", b"first", &attrs).await.unwrap();
        let err = store.write_if_absent("k", b"second", &attrs).await.unwrap_err();
        assert!(err.is_precondition());
        assert_eq!(store.read("k").await.unwrap().0, b"first");
    }

    #[tokio::test]
    async fn test_write_if_generation_flow() {
        let (_dir, store) = backend();
        let attrs = WriteAttrs::default();

        store.write_if_generation("cp", 0, b"v1", &attrs).await.unwrap();
        let (_, generation) = store.read("cp").await.unwrap();

        // Keep the modification times of successive writes distinct even on
        // filesystems with coarse timestamp granularity.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        store
            .write_if_generation("cp", generation, b"v2", &attrs)
            .await
            .unwrap();
        assert_eq!(store.read("cp").await.unwrap().0, b"v2");

        let err = store
            .write_if_generation("cp", generation, b"v3", &attrs)
            .await
            .unwrap_err();
        assert!(err.is_precondition());
    }

    #[tokio::test]
    async fn test_list_prefix_ordered() {
        let (_dir, store) = backend();
        let attrs = WriteAttrs::default();
        for key in [
            "entries/b",
            "entries/a",
            "entries/sub/c",
            "other/x",
        ] {
            store.write(key, b"", &attrs).await.unwrap();
        }
        let keys: Vec<String> = store
            .list("entries/")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(keys, vec!["entries/a", "entries/b", "entries/sub/c"]);
    }

    #[tokio::test]
    async fn test_rejects_traversal_keys() {
        let (_dir, store) = backend();
        assert!(store.read("../escape").await.is_err());
        assert!(store.read("/absolute").await.is_err());
        assert!(store
            .write("a//b", b"", &WriteAttrs::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_create_refuses_existing_root() {
        let dir = TempDir::new().unwrap();
        assert!(FsBackend::create(dir.path()).await.is_err());
        let fresh = dir.path().join("new-log");
        let store = FsBackend::create(&fresh).await.unwrap();
        store.write("k", b"v", &WriteAttrs::default()).await.unwrap();
    }
}
