//! Tiles: fixed-height subtrees of the log, stored as single objects.
//!
//! A tile covers eight levels of the tree and therefore up to 256 "tile
//! leaves". For stratum 0 the tile leaves are entry leaf hashes; for higher
//! strata they are the roots of full tiles one stratum below.
//!
//! Nodes are stored linearised in in-order traversal, indexed by
//! [`tile_node_key`]. Only levels 0..=7 within the tile are stored: the slot
//! that would hold a full tile's own root (key 255) stays empty, because
//! that hash lives as a tile leaf of the parent stratum. Slots for perfect
//! nodes that do not exist yet are serialized as empty lines, so a full
//! tile always serializes 511 hash positions.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hash::{Hash, HASH_SIZE};

/// Height of every tile.
pub const TILE_HEIGHT: u64 = 8;

/// Maximum number of tile leaves: `2^TILE_HEIGHT`.
pub const TILE_WIDTH: u64 = 1 << TILE_HEIGHT;

/// Address of a node in the tree: `level` 0 is the leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// Level of the node; leaves are level 0.
    pub level: u64,
    /// Index of the node within its level.
    pub index: u64,
}

impl NodeId {
    /// Create a node address.
    pub fn new(level: u64, index: u64) -> Self {
        Self { level, index }
    }
}

/// Index of node `(level, index)` within a tile's node array.
///
/// In-order traversal: leaves occupy the even slots, each internal level
/// interleaves between its children. `level` must be in `0..=7`.
pub fn tile_node_key(level: u64, index: u64) -> usize {
    debug_assert!(level < TILE_HEIGHT);
    ((1u64 << (level + 1)) * index + (1u64 << level) - 1) as usize
}

/// A tile of the log tree.
///
/// Between 1 and 256 tile leaves; fewer than 256 makes it a partial tile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tile {
    num_leaves: usize,
    nodes: Vec<Option<Hash>>,
}

impl Tile {
    /// Create an empty tile.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tile leaves currently present.
    pub fn num_leaves(&self) -> usize {
        self.num_leaves
    }

    /// Look up the node at within-tile coordinates, if present.
    pub fn node(&self, level: u64, index: u64) -> Option<Hash> {
        self.nodes.get(tile_node_key(level, index)).copied().flatten()
    }

    /// Set the node at within-tile coordinates, growing the array as
    /// needed. Setting a level-0 node extends the tile leaf count.
    pub fn set_node(&mut self, level: u64, index: u64, hash: Hash) {
        let key = tile_node_key(level, index);
        if self.nodes.len() <= key {
            self.nodes.resize(key + 1, None);
        }
        self.nodes[key] = Some(hash);
        if level == 0 {
            self.num_leaves = self.num_leaves.max(index as usize + 1);
        }
    }

    /// Serialize the tile to its text form.
    ///
    /// ```text
    /// <hash size>\n<leaf count>\n<base64 hash or empty per slot>\n...
    /// ```
    pub fn marshal(&self) -> Vec<u8> {
        let slots = if self.num_leaves == 0 {
            0
        } else {
            2 * self.num_leaves - 1
        };
        let mut out = format!("{HASH_SIZE}\n{}\n", self.num_leaves);
        for i in 0..slots {
            if let Some(hash) = self.nodes.get(i).copied().flatten() {
                out.push_str(&hash.to_base64());
            }
            out.push('\n');
        }
        out.into_bytes()
    }

    /// Parse a tile from its text form.
    pub fn unmarshal(raw: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(raw)
            .map_err(|_| Error::malformed("tile is not valid UTF-8"))?;
        let mut lines = text.split('\n');
        let hash_size: usize = lines
            .next()
            .ok_or_else(|| Error::malformed("tile missing hash size line"))?
            .parse()
            .map_err(|e| Error::malformed(format!("invalid tile hash size: {e}")))?;
        if hash_size != HASH_SIZE {
            return Err(Error::malformed(format!(
                "unsupported tile hash size {hash_size}, want {HASH_SIZE}"
            )));
        }
        let num_leaves: usize = lines
            .next()
            .ok_or_else(|| Error::malformed("tile missing leaf count line"))?
            .parse()
            .map_err(|e| Error::malformed(format!("invalid tile leaf count: {e}")))?;
        if num_leaves == 0 || num_leaves as u64 > TILE_WIDTH {
            return Err(Error::malformed(format!(
                "tile leaf count {num_leaves} out of range [1, {TILE_WIDTH}]"
            )));
        }

        let slot_lines: Vec<&str> = lines.collect();
        // The final split element is the empty string after the trailing
        // newline; everything before it is a slot.
        let slots = match slot_lines.split_last() {
            Some((last, rest)) if last.is_empty() => rest,
            _ => return Err(Error::malformed("tile must end with a newline")),
        };
        if slots.len() != 2 * num_leaves - 1 {
            return Err(Error::malformed(format!(
                "tile with {num_leaves} leaves must carry {} slots, got {}",
                2 * num_leaves - 1,
                slots.len()
            )));
        }

        let mut nodes = Vec::with_capacity(slots.len());
        for slot in slots {
            if slot.is_empty() {
                nodes.push(None);
            } else {
                nodes.push(Some(Hash::from_base64(slot)?));
            }
        }
        Ok(Self { num_leaves, nodes })
    }
}
