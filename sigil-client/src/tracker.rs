//! Checkpoint tracking with consistency verification.
//!
//! A tracker holds the latest checkpoint this client has verified as
//! consistent with everything it saw before. Each `update` fetches the
//! current checkpoint, checks the signature and origin, and then proves
//! RFC 6962 consistency against the held state before adopting the new
//! head. Any violation is fatal and leaves the held state untouched.

use tracing::debug;

use sigil_core::checkpoint::{parse_checkpoint, Checkpoint};
use sigil_core::layout::CHECKPOINT_PATH;
use sigil_core::note::Verifier;
use sigil_range::{consistency_nodes, verify_consistency};

use crate::errors::{ClientError, Result};
use crate::fetch::Fetcher;
use crate::nodes::NodeCache;

/// Tracks the latest consistent checkpoint of one log.
pub struct LogStateTracker<F> {
    fetcher: F,
    verifier: Verifier,
    origin: String,
    latest: Checkpoint,
    latest_raw: Vec<u8>,
}

impl<F: Fetcher> LogStateTracker<F> {
    /// Create a tracker.
    ///
    /// Seeds the tracked state from `trusted` when given (a previously
    /// stored signed checkpoint), otherwise from a fresh fetch.
    pub async fn new(
        fetcher: F,
        verifier: Verifier,
        origin: impl Into<String>,
        trusted: Option<Vec<u8>>,
    ) -> Result<Self> {
        let origin = origin.into();
        let raw = match trusted {
            Some(raw) => raw,
            None => fetcher.fetch(CHECKPOINT_PATH).await?,
        };
        let latest = parse_checkpoint(&raw, &origin, &verifier)?;
        Ok(Self {
            fetcher,
            verifier,
            origin,
            latest,
            latest_raw: raw,
        })
    }

    /// The latest consistent checkpoint.
    pub fn latest(&self) -> &Checkpoint {
        &self.latest
    }

    /// The signed form of the latest consistent checkpoint, as stored.
    pub fn latest_raw(&self) -> &[u8] {
        &self.latest_raw
    }

    /// The fetcher this tracker reads through.
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Fetch the current checkpoint and verify it is consistent with the
    /// tracked state, adopting it if so.
    pub async fn update(&mut self) -> Result<()> {
        let raw = self.fetcher.fetch(CHECKPOINT_PATH).await?;
        let new = parse_checkpoint(&raw, &self.origin, &self.verifier)?;

        if new.size < self.latest.size {
            return Err(ClientError::Inconsistent(format!(
                "checkpoint size regressed from {} to {}",
                self.latest.size, new.size
            )));
        }
        if new.size == self.latest.size {
            if new.hash != self.latest.hash {
                return Err(ClientError::Inconsistent(format!(
                    "two checkpoints of size {} with different roots: {} and {}",
                    new.size, self.latest.hash, new.hash
                )));
            }
            // Same head, possibly re-signed; keep the fresher raw form.
            self.latest_raw = raw;
            return Ok(());
        }

        if self.latest.size > 0 {
            let nodes = consistency_nodes(self.latest.size, new.size)?;
            let mut cache = NodeCache::new(&self.fetcher, new.size);
            let proof = cache.proof(&nodes).await?;
            verify_consistency(
                self.latest.size,
                new.size,
                &proof,
                self.latest.hash,
                new.hash,
            )
            .map_err(|e| ClientError::Inconsistent(e.to_string()))?;
        }

        debug!(
            from = self.latest.size,
            to = new.size,
            "adopting consistent checkpoint"
        );
        self.latest = new;
        self.latest_raw = raw;
        Ok(())
    }
}
