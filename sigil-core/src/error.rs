//! Error types for Sigil.
//!
//! The variants follow the behavior the rest of the system relies on:
//! `NotExist` ends contiguity scans, `Precondition` drives optimistic
//! concurrency retries, `DupeLeaf` is the sequencer's silent-dedupe
//! sentinel, and the remaining variants are fatal for the object or
//! checkpoint they concern.

use thiserror::Error;

/// Result type for Sigil operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur across the Sigil log.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested object does not exist.
    ///
    /// Callers treat this as "end of the contiguous scan" or "no checkpoint
    /// written yet" rather than as a failure.
    #[error("object {key:?} does not exist")]
    NotExist {
        /// Object key that was requested.
        key: String,
    },

    /// A conditional write lost an optimistic-concurrency race.
    #[error("precondition failed writing {key:?}")]
    Precondition {
        /// Object key that was being written.
        key: String,
    },

    /// Sentinel: the submitted leaf was already sequenced.
    ///
    /// Not a hard error. Carries the index originally assigned to the leaf.
    #[error("duplicate leaf, already sequenced at index {seq}")]
    DupeLeaf {
        /// Sequence number assigned to the earlier submission.
        seq: u64,
    },

    /// A consistency violation was detected: a regressed or diverged
    /// checkpoint, or tile content that changed after being written.
    ///
    /// Fatal; propagated to the caller for alerting.
    #[error("inconsistency detected: {message}")]
    Inconsistent {
        /// What diverged.
        message: String,
    },

    /// Signature verification of a note failed.
    #[error("note signature verification failed")]
    Signature,

    /// An object failed to parse: tile, checkpoint, key string, or
    /// leaf-hash mapping.
    #[error("malformed object: {message}")]
    Malformed {
        /// What failed to parse.
        message: String,
    },

    /// Underlying I/O failure talking to the object store.
    #[error("transport error on {key:?}: {message}")]
    Transport {
        /// Object key involved, if any.
        key: String,
        /// Description of the failure.
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Create a NotExist error.
    pub fn not_exist(key: impl Into<String>) -> Self {
        Error::NotExist { key: key.into() }
    }

    /// Create a Precondition error.
    pub fn precondition(key: impl Into<String>) -> Self {
        Error::Precondition { key: key.into() }
    }

    /// Create the duplicate-leaf sentinel.
    pub fn dupe_leaf(seq: u64) -> Self {
        Error::DupeLeaf { seq }
    }

    /// Create an Inconsistent error.
    pub fn inconsistent(message: impl Into<String>) -> Self {
        Error::Inconsistent {
            message: message.into(),
        }
    }

    /// Create a Malformed error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Error::Malformed {
            message: message.into(),
        }
    }

    /// Create a Transport error wrapping an underlying cause.
    pub fn transport(
        key: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::Transport {
            key: key.into(),
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// True if the error means the object is absent.
    pub fn is_not_exist(&self) -> bool {
        matches!(self, Error::NotExist { .. })
    }

    /// True if the error is a conditional-write miss.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::Precondition { .. })
    }

    /// The originally assigned index if this is the dedupe sentinel.
    pub fn dupe_index(&self) -> Option<u64> {
        match self {
            Error::DupeLeaf { seq } => Some(*seq),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates() {
        assert!(Error::not_exist("seq/00/00/00/05").is_not_exist());
        assert!(!Error::not_exist("x").is_precondition());
        assert!(Error::precondition("checkpoint").is_precondition());
        assert_eq!(Error::dupe_leaf(7).dupe_index(), Some(7));
        assert_eq!(Error::inconsistent("boom").dupe_index(), None);
    }

    #[test]
    fn test_display() {
        let e = Error::not_exist("tile/00/0000/00/00/00");
        assert!(e.to_string().contains("tile/00/0000/00/00/00"));

        let e = Error::inconsistent("root mismatch");
        assert!(e.to_string().contains("root mismatch"));
    }
}
