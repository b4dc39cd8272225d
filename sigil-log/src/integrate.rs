//! The integrator: folds sequenced entries into the tiled tree.
//!
//! Integration is a two-phase fold. First the compact range for the
//! current tree size is loaded by reading one node per set bit of the
//! size from its covering tile. Then every newly sequenced entry is
//! appended to the range, buffering each node the append emits; the
//! buffered nodes are bucketed by covering tile and the affected tiles
//! are written back in level-ascending order, so a reader observing a
//! partially completed integration still sees a consistent prefix.
//!
//! Integration is idempotent for a fixed starting size: a re-run
//! produces byte-identical tiles and the same root, and the conditional
//! tile writes turn repeats into no-ops.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info};

use sigil_core::error::{Error, Result};
use sigil_core::hash::{leaf_hash, Hash};
use sigil_core::layout;
use sigil_core::tile::{NodeId, Tile};
use sigil_range::{range_node_ids, CompactRange};
use sigil_storage::LogStorage;

/// The head of the tree after an integration: size and RFC 6962 root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeHead {
    /// Number of leaves integrated.
    pub size: u64,
    /// Root hash over those leaves.
    pub root: Hash,
}

/// Load the compact range covering `[0, size)` from stored tiles.
async fn load_range<S>(storage: &S, size: u64) -> Result<CompactRange>
where
    S: LogStorage + Sync,
{
    let ids = range_node_ids(size);
    let mut tiles: HashMap<(u64, u64), Tile> = HashMap::new();
    let mut roots = Vec::with_capacity(ids.len());
    for id in ids {
        let (tile_level, tile_index, node_level, node_index) =
            layout::node_coords_to_tile_address(id.level, id.index);
        if !tiles.contains_key(&(tile_level, tile_index)) {
            let tile = storage
                .get_tile(tile_level, tile_index, size)
                .await?
                .ok_or_else(|| {
                    Error::inconsistent(format!(
                        "tile ({tile_level}, {tile_index}) required for tree size {size} is missing"
                    ))
                })?;
            tiles.insert((tile_level, tile_index), tile);
        }
        let hash = tiles
            .get(&(tile_level, tile_index))
            .and_then(|t| t.node(node_level, node_index))
            .ok_or_else(|| {
                Error::inconsistent(format!(
                    "node ({}, {}) missing from tile ({tile_level}, {tile_index})",
                    id.level, id.index
                ))
            })?;
        roots.push(hash);
    }
    CompactRange::from_parts(size, roots)
}

/// Fold all entries sequenced beyond `from_size` into the tree.
///
/// Returns `None` when no new entries exist. Otherwise writes every
/// affected tile and returns the new tree head; the caller signs it into
/// a checkpoint.
pub async fn integrate<S>(from_size: u64, storage: &mut S) -> Result<Option<TreeHead>>
where
    S: LogStorage + Sync,
{
    let mut range = load_range(storage, from_size).await?;

    // Scan the contiguous run of new entries, buffering every node the
    // appends produce together with its tree coordinates.
    let mut new_nodes: Vec<(NodeId, Hash)> = Vec::new();
    let mut count = 0u64;
    {
        let mut fold = |seq: u64, entry: Vec<u8>| -> Result<()> {
            let hash = leaf_hash(&entry);
            debug!(seq, hash = %hash, "integrating entry");
            range.append(hash, &mut |id, h| new_nodes.push((id, h)));
            count += 1;
            Ok(())
        };
        storage.scan_sequenced(from_size, &mut fold).await?;
    }
    if count == 0 {
        debug!(size = from_size, "no new entries to integrate");
        return Ok(None);
    }
    let new_size = range.size();

    // Bucket the new nodes by covering tile, extending any existing
    // partial tile content.
    let mut touched: BTreeMap<(u64, u64), Tile> = BTreeMap::new();
    for (id, hash) in new_nodes {
        let (tile_level, tile_index, node_level, node_index) =
            layout::node_coords_to_tile_address(id.level, id.index);
        let key = (tile_level, tile_index);
        if !touched.contains_key(&key) {
            let existing = storage
                .get_tile(tile_level, tile_index, from_size)
                .await?
                .unwrap_or_default();
            touched.insert(key, existing);
        }
        if let Some(tile) = touched.get_mut(&key) {
            tile.set_node(node_level, node_index, hash);
        }
    }

    // Write back in level-ascending order (the BTreeMap key order).
    for ((tile_level, tile_index), tile) in &touched {
        storage.store_tile(*tile_level, *tile_index, tile).await?;
    }

    let root = range.root();
    info!("New log state: size {} hash: {}", new_size, root.to_hex());
    Ok(Some(TreeHead {
        size: new_size,
        root,
    }))
}
