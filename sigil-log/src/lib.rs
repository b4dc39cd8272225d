//! Write path of the Sigil log.
//!
//! [`integrate`] folds newly sequenced entries into the tiled Merkle tree
//! and computes the next tree head. The [`runner`] module wraps it, and
//! the sequencer, into the one-shot operations a deployment actually
//! runs: initialise a log, sequence an uploaded directory of entries,
//! integrate and publish a signed checkpoint.
//!
//! The write path assumes at most one active integrator; concurrent
//! sequencers are safe. Serialization comes from the object store's
//! conditional writes, not from in-process locks.

mod integrate;
pub mod runner;

pub use integrate::{integrate, TreeHead};
pub use runner::{init_log, run_integrate, run_sequence, LogConfig};
