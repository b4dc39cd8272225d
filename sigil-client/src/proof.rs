//! Proof construction from tiles.

use sigil_core::checkpoint::Checkpoint;
use sigil_core::error::Error;
use sigil_core::hash::Hash;
use sigil_core::layout;
use sigil_core::tile::NodeId;
use sigil_range::{consistency_nodes, inclusion_nodes};

use crate::errors::Result;
use crate::fetch::Fetcher;
use crate::nodes::NodeCache;

/// Builds proofs against one checkpoint, reusing fetched tiles.
///
/// A single builder answers many proofs cheaply: adjacent leaves share
/// tiles, and the tile cache keeps every tile fetched so far.
pub struct ProofBuilder<'a, F: ?Sized> {
    cache: NodeCache<'a, F>,
}

impl<'a, F: Fetcher + ?Sized> ProofBuilder<'a, F> {
    /// Create a builder for proofs against `checkpoint`.
    pub fn new(checkpoint: &Checkpoint, fetcher: &'a F) -> Self {
        Self {
            cache: NodeCache::new(fetcher, checkpoint.size),
        }
    }

    /// The leaf hash stored at `index`.
    pub async fn leaf_hash_at(&mut self, index: u64) -> Result<Hash> {
        if index >= self.cache.log_size() {
            return Err(Error::malformed(format!(
                "leaf index {index} out of range for tree size {}",
                self.cache.log_size()
            ))
            .into());
        }
        Ok(self.cache.node(NodeId::new(0, index)).await?)
    }

    /// Inclusion proof for the leaf at `index`, verifiable against the
    /// checkpoint root with [`sigil_range::verify_inclusion`].
    pub async fn inclusion_proof(&mut self, index: u64) -> Result<Vec<Hash>> {
        let nodes = inclusion_nodes(index, self.cache.log_size())?;
        self.cache.proof(&nodes).await
    }

    /// Consistency proof from a smaller tree size up to the checkpoint,
    /// verifiable with [`sigil_range::verify_consistency`].
    pub async fn consistency_proof(&mut self, from: u64) -> Result<Vec<Hash>> {
        let nodes = consistency_nodes(from, self.cache.log_size())?;
        self.cache.proof(&nodes).await
    }
}

/// Look up the sequence number assigned to a leaf hash.
///
/// Reads the `leaves/` mapping written by the sequencer; absent mappings
/// surface as `NotExist`.
pub async fn lookup_index<F: Fetcher + ?Sized>(fetcher: &F, leaf_hash: &Hash) -> Result<u64> {
    let path = layout::leaf_path(leaf_hash);
    let body = fetcher.fetch(&path).await?;
    let text = std::str::from_utf8(&body)
        .map_err(|_| Error::malformed(format!("leaf mapping {path} is not UTF-8")))?;
    let index = u64::from_str_radix(text.trim(), 16)
        .map_err(|e| Error::malformed(format!("leaf mapping {path} is not a hex index: {e}")))?;
    Ok(index)
}
