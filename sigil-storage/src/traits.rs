//! Storage traits.

use async_trait::async_trait;
use futures::stream::BoxStream;

use sigil_core::error::Result;
use sigil_core::hash::Hash;
use sigil_core::tile::Tile;

/// Ordered stream of object keys.
pub type KeyStream = BoxStream<'static, Result<String>>;

/// Attributes applied when writing an object.
#[derive(Debug, Clone, Default)]
pub struct WriteAttrs {
    /// Cache-control header to associate with the object, if the backend
    /// supports one.
    pub cache_control: Option<String>,
}

impl WriteAttrs {
    /// Attributes carrying the given cache-control value.
    pub fn cache_control(value: impl Into<String>) -> Self {
        Self {
            cache_control: Some(value.into()),
        }
    }

    /// Attributes from an optional cache-control value.
    pub fn from_cache_control(value: Option<&str>) -> Self {
        Self {
            cache_control: value.map(str::to_string),
        }
    }
}

/// A flat key to byte-blob namespace with per-object generations.
///
/// The conditional writes are the atomicity foundation that sequencer and
/// checkpoint correctness rest on: they must be atomic against concurrent
/// writers.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read an object, returning its content and current generation.
    ///
    /// Generations increase monotonically with each write of the key.
    /// Fails with `NotExist` if the key has no current version.
    async fn read(&self, key: &str) -> Result<(Vec<u8>, i64)>;

    /// Write an object unconditionally.
    async fn write(&self, key: &str, data: &[u8], attrs: &WriteAttrs) -> Result<()>;

    /// Write an object only if the key has no current version.
    ///
    /// Fails with `Precondition` otherwise.
    async fn write_if_absent(&self, key: &str, data: &[u8], attrs: &WriteAttrs) -> Result<()>;

    /// Write an object only if its current generation equals `generation`.
    ///
    /// Fails with `Precondition` otherwise.
    async fn write_if_generation(
        &self,
        key: &str,
        generation: i64,
        data: &[u8],
        attrs: &WriteAttrs,
    ) -> Result<()>;

    /// Stream the keys under `prefix` in lexicographic order.
    async fn list(&self, prefix: &str) -> Result<KeyStream>;
}

/// Log storage operations consumed by the sequencer, integrator, and the
/// write-side runners.
#[async_trait]
pub trait LogStorage: Send {
    /// Assign the next available sequence number to the given leaf.
    ///
    /// Duplicate leaves are silently squashed where possible: if the leaf
    /// hash has been sequenced before, the `DupeLeaf` sentinel carries the
    /// originally assigned number. Dedupe is best-effort; see the module
    /// documentation of the implementation for the crash window.
    async fn sequence(&mut self, leaf_hash: Hash, entry: &[u8]) -> Result<u64>;

    /// Call `f` once per contiguous sequenced entry starting at `begin`,
    /// stopping at the first missing index or on the first error from `f`.
    ///
    /// Returns the number of entries scanned.
    async fn scan_sequenced(
        &self,
        begin: u64,
        f: &mut (dyn FnMut(u64, Vec<u8>) -> Result<()> + Send),
    ) -> Result<u64>;

    /// Fetch the tile at `(level, index)` as expected for a tree of
    /// `log_size` leaves, falling back to the full tile if the exact
    /// partial is absent. `Ok(None)` if neither exists.
    async fn get_tile(&self, level: u64, index: u64, log_size: u64) -> Result<Option<Tile>>;

    /// Store a tile at `(level, index)`.
    ///
    /// Tiles are written once: a repeat write must carry byte-identical
    /// content, anything else is a fatal inconsistency.
    async fn store_tile(&self, level: u64, index: u64, tile: &Tile) -> Result<()>;

    /// Read the raw signed checkpoint, remembering its generation for a
    /// later conditional write.
    async fn read_checkpoint(&mut self) -> Result<Vec<u8>>;

    /// Write the raw signed checkpoint.
    ///
    /// Uses create-if-absent when no checkpoint has been read yet,
    /// otherwise a generation-guarded replace. A `Precondition` failure
    /// means another writer got there first; re-read and re-integrate.
    async fn write_checkpoint(&mut self, raw: &[u8]) -> Result<()>;
}
