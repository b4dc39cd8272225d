//! Read side of the Sigil log.
//!
//! Clients fetch the signed checkpoint and tree tiles through a
//! [`Fetcher`], verify consistency between successive checkpoints with a
//! [`LogStateTracker`], and build inclusion proofs with a
//! [`ProofBuilder`]. Nothing here writes to the log; readers are
//! embarrassingly parallel across independent clients.

mod errors;
mod fetch;
mod nodes;
mod proof;
mod tracker;

pub use errors::{ClientError, Result};
pub use fetch::{Fetcher, ObjectFetcher};
pub use nodes::NodeCache;
pub use proof::{lookup_index, ProofBuilder};
pub use tracker::LogStateTracker;
