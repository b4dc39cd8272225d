//! The object-backed log client.
//!
//! `ObjectLog` layers the log storage operations over any [`ObjectStore`]:
//!
//! ```text
//! checkpoint                      signed log head, replaced via CAS
//! seq/aa/bb/cc/dd                 entry bytes by sequence number
//! leaves/aa/bb/cc/dd...           leaf hash -> assigned sequence number
//! tile/ll/aaaa/bb/cc/dd[.xx]      tree tiles, partial suffix in hex
//! ```
//!
//! Dedupe is best-effort: the leaf mapping is written after the sequence
//! claim, so a crash between the two writes lets a resubmission of the
//! same entry claim a second index. Both indices end up integrated and
//! provable.

use async_trait::async_trait;
use tracing::debug;

use sigil_core::error::{Error, Result};
use sigil_core::hash::Hash;
use sigil_core::layout;
use sigil_core::tile::{Tile, TILE_WIDTH};

use crate::traits::{LogStorage, ObjectStore, WriteAttrs};

/// Log storage client over an object store.
///
/// Not thread-safe: the sequence-number hint and stashed checkpoint
/// generation are per-client state. Run concurrent sequencers with one
/// client each; the store's conditional writes arbitrate between them.
pub struct ObjectLog<B> {
    backend: B,
    /// Hint for the next free sequence number. May trail the actual next
    /// free number, never exceed it.
    next_seq: u64,
    /// Generation of the last checkpoint read, 0 if none.
    checkpoint_gen: i64,
    checkpoint_cache_control: Option<String>,
    other_cache_control: Option<String>,
}

impl<B: ObjectStore> ObjectLog<B> {
    /// Create a client over the given backend.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            next_seq: 0,
            checkpoint_gen: 0,
            checkpoint_cache_control: None,
            other_cache_control: None,
        }
    }

    /// Set cache-control values applied to checkpoint writes and to all
    /// other object writes respectively.
    pub fn with_cache_control(
        mut self,
        checkpoint: Option<String>,
        other: Option<String>,
    ) -> Self {
        self.checkpoint_cache_control = checkpoint;
        self.other_cache_control = other;
        self
    }

    /// Seed the next-sequence hint, typically from the checkpoint size.
    pub fn set_next_seq(&mut self, next: u64) {
        self.next_seq = next;
    }

    /// The underlying backend, for raw object access.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn other_attrs(&self) -> WriteAttrs {
        WriteAttrs {
            cache_control: self.other_cache_control.clone(),
        }
    }

    async fn read_tile_at(&self, path: &str) -> Result<Option<Tile>> {
        match self.backend.read(path).await {
            Ok((raw, _)) => Ok(Some(Tile::unmarshal(&raw)?)),
            Err(e) if e.is_not_exist() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl<B: ObjectStore> LogStorage for ObjectLog<B> {
    async fn sequence(&mut self, leaf_hash: Hash, entry: &[u8]) -> Result<u64> {
        let leaf_key = layout::leaf_path(&leaf_hash);

        // Check for a dupe leaf already present; its body is the assigned
        // sequence number in hex.
        match self.backend.read(&leaf_key).await {
            Ok((body, _)) => {
                let text = std::str::from_utf8(&body)
                    .map_err(|_| Error::malformed(format!("leaf mapping {leaf_key} is not UTF-8")))?;
                let original = u64::from_str_radix(text.trim(), 16).map_err(|e| {
                    Error::malformed(format!("leaf mapping {leaf_key} is not a hex index: {e}"))
                })?;
                return Err(Error::dupe_leaf(original));
            }
            Err(e) if e.is_not_exist() => {}
            Err(e) => return Err(e),
        }

        let attrs = self.other_attrs();
        loop {
            let seq = self.next_seq;
            let seq_key = layout::seq_path(seq);

            // The hint may trail reality if other sequencers have been
            // busy; skip past anything already claimed.
            match self.backend.read(&seq_key).await {
                Ok(_) => {
                    debug!(seq, "sequence number in use, trying next");
                    self.next_seq += 1;
                    continue;
                }
                Err(e) if e.is_not_exist() => {}
                Err(e) => return Err(e),
            }

            // Claim the index. Another writer may race us to it, in which
            // case move on to the next number.
            match self.backend.write_if_absent(&seq_key, entry, &attrs).await {
                Ok(()) => {}
                Err(e) if e.is_precondition() => {
                    debug!(seq, "lost claim race, trying next");
                    self.next_seq += 1;
                    continue;
                }
                Err(e) => return Err(e),
            }
            debug!(seq, key = %seq_key, "wrote leaf data");

            // Record the leaf -> sequence mapping. This write is
            // unconditional: racing writers wrote the same hash-keyed
            // object, and whichever index survives is valid.
            self.backend
                .write(&leaf_key, format!("{seq:x}").as_bytes(), &attrs)
                .await?;

            self.next_seq = seq + 1;
            return Ok(seq);
        }
    }

    async fn scan_sequenced(
        &self,
        begin: u64,
        f: &mut (dyn FnMut(u64, Vec<u8>) -> Result<()> + Send),
    ) -> Result<u64> {
        let mut end = begin;
        loop {
            match self.backend.read(&layout::seq_path(end)).await {
                Ok((entry, _)) => {
                    f(end, entry)?;
                    end += 1;
                }
                Err(e) if e.is_not_exist() => return Ok(end - begin),
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_tile(&self, level: u64, index: u64, log_size: u64) -> Result<Option<Tile>> {
        let tile_size = layout::partial_tile_size(level, index, log_size);
        let path = layout::tile_path(level, index, tile_size);
        if let Some(tile) = self.read_tile_at(&path).await? {
            return Ok(Some(tile));
        }
        if tile_size != 0 {
            // The exact partial is gone; the tile may have been filled
            // since the requested tree size.
            return self.read_tile_at(&layout::tile_path(level, index, 0)).await;
        }
        Ok(None)
    }

    async fn store_tile(&self, level: u64, index: u64, tile: &Tile) -> Result<()> {
        let tile_size = tile.num_leaves() as u64;
        if tile_size == 0 || tile_size > TILE_WIDTH {
            return Err(Error::malformed(format!(
                "tile size {tile_size} must be in [1, {TILE_WIDTH}]"
            )));
        }
        let raw = tile.marshal();
        let path = layout::tile_path(level, index, tile_size % TILE_WIDTH);
        debug!(level, index, tile_size, key = %path, "storing tile");

        match self
            .backend
            .write_if_absent(&path, &raw, &self.other_attrs())
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_precondition() => {
                // Tiles are written once. A repeat write is a no-op only
                // if the stored content is identical.
                let (existing, _) = self.backend.read(&path).await?;
                if existing == raw {
                    debug!(level, index, tile_size, "identical tile already stored");
                    Ok(())
                } else {
                    Err(Error::inconsistent(format!(
                        "tile content diverged at {path}"
                    )))
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn read_checkpoint(&mut self) -> Result<Vec<u8>> {
        let (raw, generation) = self.backend.read(layout::CHECKPOINT_PATH).await?;
        self.checkpoint_gen = generation;
        Ok(raw)
    }

    async fn write_checkpoint(&mut self, raw: &[u8]) -> Result<()> {
        let attrs = WriteAttrs {
            cache_control: self.checkpoint_cache_control.clone(),
        };
        if self.checkpoint_gen == 0 {
            self.backend
                .write_if_absent(layout::CHECKPOINT_PATH, raw, &attrs)
                .await
        } else {
            self.backend
                .write_if_generation(layout::CHECKPOINT_PATH, self.checkpoint_gen, raw, &attrs)
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::MemBackend;
    use sigil_core::hash::leaf_hash;

    fn log() -> ObjectLog<MemBackend> {
        ObjectLog::new(MemBackend::new())
    }

    #[tokio::test]
    async fn test_sequence_assigns_dense_indices() {
        let mut log = log();
        for i in 0..5u64 {
            let entry = format!("entry {i}");
            let seq = log
                .sequence(leaf_hash(entry.as_bytes()), entry.as_bytes())
                .await
                .unwrap();
            assert_eq!(seq, i);
        }
        // Entries land at the expected paths.
        let (data, _) = log.backend().read("seq/00/00/00/03").await.unwrap();
        assert_eq!(data, b"entry 3");
    }

    #[tokio::test]
    async fn test_sequence_dedupes() {
        let mut log = log();
        let entry = b"leaf_data_000";
        let hash = leaf_hash(entry);

        assert_eq!(log.sequence(hash, entry).await.unwrap(), 0);

        let err = log.sequence(hash, entry).await.unwrap_err();
        assert_eq!(err.dupe_index(), Some(0));

        // No second seq object was claimed.
        assert!(log
            .backend()
            .read(&layout::seq_path(1))
            .await
            .unwrap_err()
            .is_not_exist());
    }

    #[tokio::test]
    async fn test_sequence_dedupes_across_restart() {
        let backend = MemBackend::new();
        let entry = b"survivor";
        let hash = leaf_hash(entry);

        let mut first = ObjectLog::new(backend.clone());
        assert_eq!(first.sequence(hash, entry).await.unwrap(), 0);
        drop(first);

        // A fresh client with a cold hint still sees the mapping.
        let mut second = ObjectLog::new(backend);
        let err = second.sequence(hash, entry).await.unwrap_err();
        assert_eq!(err.dupe_index(), Some(0));
    }

    #[tokio::test]
    async fn test_sequence_skips_claimed_indices() {
        let backend = MemBackend::new();
        let mut a = ObjectLog::new(backend.clone());
        let mut b = ObjectLog::new(backend);

        // Both clients start with hint 0; the second must skip ahead.
        assert_eq!(a.sequence(leaf_hash(b"one"), b"one").await.unwrap(), 0);
        assert_eq!(b.sequence(leaf_hash(b"two"), b"two").await.unwrap(), 1);
        assert_eq!(a.sequence(leaf_hash(b"three"), b"three").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_scan_sequenced_stops_at_gap() {
        let mut log = log();
        for i in 0..3u64 {
            let entry = format!("e{i}");
            log.sequence(leaf_hash(entry.as_bytes()), entry.as_bytes())
                .await
                .unwrap();
        }

        let mut seen = Vec::new();
        let count = log
            .scan_sequenced(0, &mut |seq, entry| {
                seen.push((seq, entry));
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(count, 3);
        assert_eq!(seen[2], (2, b"e2".to_vec()));

        let count = log.scan_sequenced(3, &mut |_, _| Ok(())).await.unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_store_tile_rejects_bad_sizes() {
        let log = log();
        let empty = Tile::new();
        assert!(log.store_tile(0, 0, &empty).await.is_err());
    }

    #[tokio::test]
    async fn test_store_tile_idempotent_and_divergence() {
        let log = log();
        let mut tile = Tile::new();
        tile.set_node(0, 0, leaf_hash(b"a"));
        tile.set_node(0, 1, leaf_hash(b"b"));

        log.store_tile(0, 0, &tile).await.unwrap();
        // Identical rewrite is a no-op success.
        log.store_tile(0, 0, &tile).await.unwrap();

        // Divergent content for the same path is fatal.
        let mut other = Tile::new();
        other.set_node(0, 0, leaf_hash(b"a"));
        other.set_node(0, 1, leaf_hash(b"DIFFERENT"));
        let err = log.store_tile(0, 0, &other).await.unwrap_err();
        assert!(matches!(err, Error::Inconsistent { .. }));
    }

    #[tokio::test]
    async fn test_get_tile_partial_then_full_fallback() {
        let log = log();
        let mut full = Tile::new();
        for i in 0..256u64 {
            full.set_node(0, i, leaf_hash(format!("{i}").as_bytes()));
        }
        log.store_tile(0, 0, &full).await.unwrap();

        // A reader asking at an older tree size finds the full tile even
        // though the partial it expects was never written.
        let tile = log.get_tile(0, 0, 100).await.unwrap().unwrap();
        assert_eq!(tile.num_leaves(), 256);

        assert!(log.get_tile(0, 7, 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_checkpoint_cas_flow() {
        let backend = MemBackend::new();
        let mut log = ObjectLog::new(backend.clone());

        // First write requires that no checkpoint exists.
        log.write_checkpoint(b"cp-1").await.unwrap();

        // A writer that never read cannot replace it.
        let mut blind = ObjectLog::new(backend.clone());
        assert!(blind
            .write_checkpoint(b"cp-x")
            .await
            .unwrap_err()
            .is_precondition());

        // Read-modify-write succeeds.
        let raw = log.read_checkpoint().await.unwrap();
        assert_eq!(raw, b"cp-1");
        log.write_checkpoint(b"cp-2").await.unwrap();

        // A stale generation is rejected after someone else wrote.
        let mut racer = ObjectLog::new(backend.clone());
        racer.read_checkpoint().await.unwrap();
        log.read_checkpoint().await.unwrap();
        log.write_checkpoint(b"cp-3").await.unwrap();
        assert!(racer
            .write_checkpoint(b"cp-lost")
            .await
            .unwrap_err()
            .is_precondition());
    }

    #[tokio::test]
    async fn test_cache_control_applied() {
        let backend = MemBackend::new();
        let mut log = ObjectLog::new(backend.clone()).with_cache_control(
            Some("no-cache".to_string()),
            Some("max-age=31536000".to_string()),
        );

        log.sequence(leaf_hash(b"e"), b"e").await.unwrap();
        assert_eq!(
            backend.cache_control("seq/00/00/00/00"),
            Some("max-age=31536000".to_string())
        );

        log.write_checkpoint(b"cp").await.unwrap();
        assert_eq!(
            backend.cache_control("checkpoint"),
            Some("no-cache".to_string())
        );
    }
}
