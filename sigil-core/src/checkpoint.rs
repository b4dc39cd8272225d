//! Log checkpoints: the signed head of the tree.
//!
//! A checkpoint commits to a tree size and root hash under a log origin
//! string. Its wire form is a three-line text body wrapped in a signed
//! note (see [`crate::note`]):
//!
//! ```text
//! example.com/log
//! 42
//! <base64 root hash>
//!
//! — example.com/log <base64 signature>
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::note::Verifier;

/// A log checkpoint: `(origin, size, root hash)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Identifier of the log, the first line of every checkpoint.
    pub origin: String,
    /// Number of leaves committed to.
    pub size: u64,
    /// RFC 6962 root hash of the tree of `size` leaves.
    pub hash: Hash,
}

impl Checkpoint {
    /// Create a new checkpoint.
    pub fn new(origin: impl Into<String>, size: u64, hash: Hash) -> Self {
        Self {
            origin: origin.into(),
            size,
            hash,
        }
    }

    /// Serialize the three-line checkpoint body.
    pub fn marshal(&self) -> String {
        format!("{}\n{}\n{}\n", self.origin, self.size, self.hash.to_base64())
    }

    /// Parse a checkpoint body, checking the origin line.
    pub fn from_body(body: &str, expected_origin: &str) -> Result<Self> {
        let lines: Vec<&str> = body.split('\n').collect();
        // A well-formed body is three lines plus the trailing newline split.
        if lines.len() != 4 || !lines[3].is_empty() {
            return Err(Error::malformed(format!(
                "checkpoint body must be 3 lines, got {}",
                lines.len().saturating_sub(1)
            )));
        }
        let origin = lines[0];
        if origin != expected_origin {
            return Err(Error::malformed(format!(
                "checkpoint origin {origin:?} does not match expected {expected_origin:?}"
            )));
        }
        let size: u64 = lines[1]
            .parse()
            .map_err(|e| Error::malformed(format!("invalid checkpoint size: {e}")))?;
        let hash = Hash::from_base64(lines[2])?;
        Ok(Self {
            origin: origin.to_string(),
            size,
            hash,
        })
    }
}

/// Open a signed checkpoint note, verify its signature and origin, and
/// return the parsed checkpoint.
pub fn parse_checkpoint(raw: &[u8], expected_origin: &str, verifier: &Verifier) -> Result<Checkpoint> {
    let body = verifier.open(raw)?;
    Checkpoint::from_body(&body, expected_origin)
}
