//! Compact-range Merkle accumulator and RFC 6962 proofs.
//!
//! A compact range represents the state of a Merkle tree over `[0, n)` as
//! an ordered list of perfect-subtree roots, one per set bit of `n`.
//! Appending a leaf merges equal-height subtrees, emitting every newly
//! created node so callers can persist them into tiles.
//!
//! # Example
//!
//! ```rust
//! use sigil_core::hash::leaf_hash;
//! use sigil_range::CompactRange;
//!
//! let mut range = CompactRange::new();
//! for i in 0..5u32 {
//!     let leaf = leaf_hash(format!("entry {i}").as_bytes());
//!     range.append(leaf, &mut |_id, _hash| {});
//! }
//! assert_eq!(range.size(), 5);
//! let root = range.root();
//! assert!(!root.is_zero());
//! ```

mod compact;
mod proof;

#[cfg(test)]
mod proptest;

pub use compact::{range_node_ids, CompactRange};
pub use proof::{
    consistency_nodes, inclusion_nodes, range_nodes, root_from_inclusion, verify_consistency,
    verify_inclusion, ProofNode,
};
