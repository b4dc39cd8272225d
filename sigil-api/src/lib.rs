//! HTTP surface of a Sigil log.
//!
//! Exposes the write endpoint used by load generators and integration
//! glue (`POST /add`), and serves the raw log objects (checkpoint, tiles,
//! entries, leaf mappings) so read-side clients can fetch over HTTP with
//! the same paths they would use against the object store directly.

mod rest;
mod server;

pub use rest::ApiError;
pub use server::{ApiConfig, ApiServer, ApiState};
