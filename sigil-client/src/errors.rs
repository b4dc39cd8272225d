//! Error types for the read side.

use thiserror::Error;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced to log readers.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The log presented state that contradicts what this client already
    /// verified: a shrunk tree, a forked root, or a failing consistency
    /// proof. This is the signal witnesses alert on.
    #[error("log consistency violation: {0}")]
    Inconsistent(String),

    /// Anything else bubbling up from fetching or parsing log objects.
    #[error(transparent)]
    Core(#[from] sigil_core::Error),
}

impl ClientError {
    /// True if this error reports a consistency violation, either
    /// detected by the tracker or by proof verification.
    pub fn is_inconsistent(&self) -> bool {
        matches!(
            self,
            ClientError::Inconsistent(_)
                | ClientError::Core(sigil_core::Error::Inconsistent { .. })
        )
    }
}
