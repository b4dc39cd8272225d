//! Tile-backed node lookups.
//!
//! Proof construction needs individual tree nodes, but the log only
//! serves tiles. `NodeCache` fetches and caches tiles so that a run of
//! adjacent node lookups costs a single fetch: one tile answers up to
//! 256 of them.

use std::collections::HashMap;

use sigil_core::error::Error;
use sigil_core::hash::{node_hash, Hash};
use sigil_core::layout;
use sigil_core::tile::{NodeId, Tile};
use sigil_range::ProofNode;

use crate::errors::Result;
use crate::fetch::Fetcher;

/// Fetches tree nodes for a fixed tree size, caching tiles.
pub struct NodeCache<'a, F: ?Sized> {
    fetcher: &'a F,
    log_size: u64,
    tiles: HashMap<(u64, u64), Tile>,
}

impl<'a, F: Fetcher + ?Sized> NodeCache<'a, F> {
    /// Create a cache resolving nodes against a tree of `log_size` leaves.
    pub fn new(fetcher: &'a F, log_size: u64) -> Self {
        Self {
            fetcher,
            log_size,
            tiles: HashMap::new(),
        }
    }

    /// The tree size this cache resolves against.
    pub fn log_size(&self) -> u64 {
        self.log_size
    }

    /// Fetch the hash of a perfect node.
    pub async fn node(&mut self, id: NodeId) -> Result<Hash> {
        let (tile_level, tile_index, node_level, node_index) =
            layout::node_coords_to_tile_address(id.level, id.index);
        let key = (tile_level, tile_index);
        if !self.tiles.contains_key(&key) {
            let tile = fetch_tile(self.fetcher, tile_level, tile_index, self.log_size).await?;
            self.tiles.insert(key, tile);
        }
        let hash = self
            .tiles
            .get(&key)
            .and_then(|t| t.node(node_level, node_index))
            .ok_or_else(|| {
                Error::inconsistent(format!(
                    "node ({}, {}) not present in tile ({tile_level}, {tile_index})",
                    id.level, id.index
                ))
            })?;
        Ok(hash)
    }

    /// Resolve one proof node: a stored hash, or an ephemeral node folded
    /// from its perfect constituents, right to left.
    pub async fn proof_node(&mut self, node: &ProofNode) -> Result<Hash> {
        match node {
            ProofNode::Perfect(id) => self.node(*id).await,
            ProofNode::Ephemeral(ids) => {
                let mut parts = Vec::with_capacity(ids.len());
                for id in ids {
                    parts.push(self.node(*id).await?);
                }
                let (last, rest) = parts
                    .split_last()
                    .ok_or_else(|| Error::malformed("empty ephemeral node"))?;
                Ok(rest.iter().rev().fold(*last, |acc, h| node_hash(*h, acc)))
            }
        }
    }

    /// Resolve a whole proof node set into its hashes.
    pub async fn proof(&mut self, nodes: &[ProofNode]) -> Result<Vec<Hash>> {
        let mut hashes = Vec::with_capacity(nodes.len());
        for node in nodes {
            hashes.push(self.proof_node(node).await?);
        }
        Ok(hashes)
    }
}

/// Fetch and parse the tile expected at `(level, index)` for `log_size`,
/// falling back to the full tile when the exact partial is absent.
async fn fetch_tile<F: Fetcher + ?Sized>(
    fetcher: &F,
    level: u64,
    index: u64,
    log_size: u64,
) -> Result<Tile> {
    let tile_size = layout::partial_tile_size(level, index, log_size);
    match fetcher.fetch(&layout::tile_path(level, index, tile_size)).await {
        Ok(raw) => Ok(Tile::unmarshal(&raw)?),
        Err(e) if e.is_not_exist() && tile_size != 0 => {
            let raw = fetcher.fetch(&layout::tile_path(level, index, 0)).await?;
            Ok(Tile::unmarshal(&raw)?)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sigil_core::hash::leaf_hash;

    /// Serves a single one-leaf tile regardless of the requested path,
    /// emulating a log that is smaller than the client believes.
    struct OneLeafFetcher;

    #[async_trait]
    impl Fetcher for OneLeafFetcher {
        async fn fetch(&self, _path: &str) -> sigil_core::Result<Vec<u8>> {
            let mut tile = Tile::new();
            tile.set_node(0, 0, leaf_hash(b"one"));
            Ok(tile.marshal())
        }
    }

    #[tokio::test]
    async fn test_node_cache_serves_known_node() {
        let fetcher = OneLeafFetcher;
        let mut cache = NodeCache::new(&fetcher, 10);
        let hash = cache.node(NodeId::new(0, 0)).await.unwrap();
        assert_eq!(hash, leaf_hash(b"one"));
    }

    #[tokio::test]
    async fn test_node_cache_rejects_out_of_range() {
        // The client believes the tree is larger than the tile contents
        // allow; asking for the missing node must error, not panic.
        let fetcher = OneLeafFetcher;
        let mut cache = NodeCache::new(&fetcher, 10);
        assert!(cache.node(NodeId::new(0, 1)).await.is_err());
    }
}
