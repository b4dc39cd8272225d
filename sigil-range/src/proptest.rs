//! Property-based tests for the compact range and proofs.
//!
//! Checks the accumulator against a recursive RFC 6962 reference under
//! arbitrary leaf sequences.

use proptest::prelude::*;

use crate::compact::{range_node_ids, CompactRange};
use crate::proof::tests::{mth, resolve};
use crate::proof::{consistency_nodes, inclusion_nodes, verify_consistency, verify_inclusion};
use sigil_core::hash::Hash;
use sigil_core::tile::NodeId;

/// Generate arbitrary hash values (simulating leaf hashes).
fn arb_hash() -> impl Strategy<Value = Hash> {
    prop::array::uniform32(any::<u8>()).prop_map(Hash::from_bytes)
}

/// Generate a vector of arbitrary hashes.
fn arb_hashes(max_count: usize) -> impl Strategy<Value = Vec<Hash>> {
    prop::collection::vec(arb_hash(), 0..max_count)
}

fn filled(leaves: &[Hash]) -> CompactRange {
    let mut range = CompactRange::new();
    for leaf in leaves {
        range.append(*leaf, &mut |_, _| {});
    }
    range
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// The compact-range root matches the recursive reference.
    #[test]
    fn prop_root_matches_reference(leaves in arb_hashes(300)) {
        let range = filled(&leaves);
        prop_assert_eq!(range.size(), leaves.len() as u64);
        prop_assert_eq!(range.root(), mth(&leaves));
    }

    /// Every node the append visitor emits carries the reference hash for
    /// its coordinates.
    #[test]
    fn prop_visited_nodes_match_reference(leaves in arb_hashes(80)) {
        let mut range = CompactRange::new();
        let mut emitted: Vec<(NodeId, Hash)> = Vec::new();
        for leaf in &leaves {
            range.append(*leaf, &mut |id, h| emitted.push((id, h)));
        }
        for (id, h) in emitted {
            let begin = (id.index << id.level) as usize;
            let end = begin + (1usize << id.level);
            prop_assert_eq!(h, mth(&leaves[begin..end]));
        }
    }

    /// Rebuilding a range from the node ids of its set bits is lossless.
    #[test]
    fn prop_from_parts_preserves_root(leaves in arb_hashes(200)) {
        let range = filled(&leaves);
        let ids = range_node_ids(range.size());
        prop_assert_eq!(ids.len(), range.roots().len());
        let rebuilt = CompactRange::from_parts(range.size(), range.roots().to_vec()).unwrap();
        prop_assert_eq!(rebuilt.root(), range.root());
    }

    /// Inclusion proofs built from the node sets verify for random indices.
    #[test]
    fn prop_inclusion_verifies((leaves, index) in arb_hashes(120)
        .prop_filter("need at least one leaf", |l| !l.is_empty())
        .prop_flat_map(|l| { let n = l.len(); (Just(l), 0..n) }))
    {
        let root = mth(&leaves);
        let nodes = inclusion_nodes(index as u64, leaves.len() as u64).unwrap();
        let proof = resolve(&nodes, &leaves);
        prop_assert!(verify_inclusion(
            index as u64,
            leaves.len() as u64,
            leaves[index],
            &proof,
            root
        )
        .is_ok());
    }

    /// Consistency proofs verify between any two prefixes.
    #[test]
    fn prop_consistency_verifies((leaves, from) in arb_hashes(120)
        .prop_flat_map(|l| { let n = l.len(); (Just(l), 0..=n) }))
    {
        let to = leaves.len();
        let from_root = mth(&leaves[..from]);
        let to_root = mth(&leaves);
        let nodes = consistency_nodes(from as u64, to as u64).unwrap();
        let proof = resolve(&nodes, &leaves);
        prop_assert!(
            verify_consistency(from as u64, to as u64, &proof, from_root, to_root).is_ok()
        );
    }
}
