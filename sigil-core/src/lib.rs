//! Sigil Core - Fundamental types for the Sigil verifiable log.
//!
//! This crate provides the data structures and primitives shared by every
//! other Sigil crate:
//!
//! - [`hash`] - RFC 6962 domain-separated SHA-256 hashing
//! - [`note`] - The signed-note envelope used for checkpoints
//! - [`checkpoint`] - Signed `(origin, size, root hash)` log heads
//! - [`tile`] - Fixed-height subtree tiles and their text codec
//! - [`layout`] - Pure functions mapping log coordinates to object paths
//!
//! # Example
//!
//! ```rust
//! use sigil_core::hash::{leaf_hash, node_hash};
//! use sigil_core::checkpoint::Checkpoint;
//! use sigil_core::note;
//!
//! let (skey, vkey) = note::generate_key("example.com/log");
//! let signer = note::Signer::new(&skey).unwrap();
//! let verifier = note::Verifier::new(&vkey).unwrap();
//!
//! let root = node_hash(leaf_hash(b"a"), leaf_hash(b"b"));
//! let cp = Checkpoint::new("example.com/log", 2, root);
//! let signed = signer.sign_note(&cp.marshal()).unwrap();
//!
//! let parsed = sigil_core::checkpoint::parse_checkpoint(
//!     signed.as_bytes(),
//!     "example.com/log",
//!     &verifier,
//! )
//! .unwrap();
//! assert_eq!(parsed, cp);
//! ```

pub mod checkpoint;
pub mod error;
pub mod hash;
pub mod layout;
pub mod note;
pub mod tile;

// Re-exports for convenience
pub use checkpoint::{parse_checkpoint, Checkpoint};
pub use error::{Error, Result};
pub use hash::{empty_root, leaf_hash, node_hash, Hash, HASH_SIZE};
pub use tile::{NodeId, Tile, TILE_HEIGHT, TILE_WIDTH};
