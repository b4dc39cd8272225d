//! Storage layer for the Sigil log.
//!
//! Provides:
//! - [`ObjectStore`] - the capability set every backend implements:
//!   read with generations, conditional writes, prefix listing
//! - [`MemBackend`] - in-memory backend for tests and small tools
//! - [`FsBackend`] - local-filesystem backend
//! - [`ObjectLog`] - the log client built on any backend: sequencing,
//!   tile reads/writes, checkpoint read-modify-write
//!
//! Cross-process concurrency is mediated entirely by the backend's
//! conditional writes; the log client holds only a sequence-number hint
//! and the last-read checkpoint generation.

mod fs;
mod mem;
mod object;
mod traits;

pub use fs::FsBackend;
pub use mem::MemBackend;
pub use object::ObjectLog;
pub use traits::{KeyStream, LogStorage, ObjectStore, WriteAttrs};
