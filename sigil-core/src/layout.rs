//! Object-store layout: pure functions from log coordinates to paths.
//!
//! These paths are the on-store wire format and must stay byte-exact for
//! interoperability with existing tooling and witnesses:
//!
//! ```text
//! checkpoint
//! seq/00/00/1a/3f
//! leaves/aa/bb/cc/ddeeff...
//! tile/00/0000/00/00/00.04
//! ```

use crate::hash::Hash;
use crate::tile::{TILE_HEIGHT, TILE_WIDTH};

/// Path of the signed checkpoint object.
pub const CHECKPOINT_PATH: &str = "checkpoint";

/// Split a hex string into `/`-separated fragments: everything but the
/// last six digits first, then three two-digit components.
fn split_frags(hex: &str) -> String {
    let head = &hex[..hex.len() - 6];
    let tail = &hex[hex.len() - 6..];
    format!("{head}/{}/{}/{}", &tail[..2], &tail[2..4], &tail[4..6])
}

/// Path of the sequenced entry at index `seq`.
///
/// Eight hex digits split into four components; indices beyond 2^32 widen
/// the leading component.
pub fn seq_path(seq: u64) -> String {
    format!("seq/{}", split_frags(&format!("{seq:08x}")))
}

/// Path of the leaf-hash to sequence-number mapping for `hash`.
pub fn leaf_path(hash: &Hash) -> String {
    let hex = hash.to_hex();
    format!(
        "leaves/{}/{}/{}/{}",
        &hex[..2],
        &hex[2..4],
        &hex[4..6],
        &hex[6..]
    )
}

/// Path of the tile at `(level, index)` in tile space.
///
/// `tile_size` is the number of tile leaves modulo 256: values in
/// `[1, 255]` name a partial tile and append a two-digit hex suffix, while
/// 0 (a full tile, 256 being encoded as 0) names the unsuffixed path.
pub fn tile_path(level: u64, index: u64, tile_size: u64) -> String {
    let ts = tile_size % TILE_WIDTH;
    let mut path = format!("tile/{level:02x}/{}", split_frags(&format!("{index:010x}")));
    if ts != 0 {
        path.push_str(&format!(".{ts:02x}"));
    }
    path
}

/// Expected number of tile leaves for the tile at `(level, index)` in a
/// tree of `log_size` leaves, or 0 if the tile is fully populated.
pub fn partial_tile_size(level: u64, index: u64, log_size: u64) -> u64 {
    let size_at_level = log_size
        .checked_shr((level * TILE_HEIGHT) as u32)
        .unwrap_or(0);
    let full_tiles = size_at_level / TILE_WIDTH;
    if index < full_tiles {
        0
    } else {
        size_at_level % TILE_WIDTH
    }
}

/// Map tree-node coordinates to `(tile level, tile index, node level,
/// node index)`, the address of the node within its covering tile.
///
/// Tree levels that are a multiple of eight are the tile leaves of the
/// stratum above, so `node level` is always in `0..=7`.
pub fn node_coords_to_tile_address(tree_level: u64, tree_index: u64) -> (u64, u64, u64, u64) {
    let tile_row_width = 1u64 << (TILE_HEIGHT - tree_level % TILE_HEIGHT);
    let tile_level = tree_level / TILE_HEIGHT;
    let tile_index = tree_index / tile_row_width;
    let node_level = tree_level % TILE_HEIGHT;
    let node_index = tree_index % tile_row_width;
    (tile_level, tile_index, node_level, node_index)
}
