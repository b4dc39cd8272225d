//! One-shot sequence and integrate runners.
//!
//! These wrap the storage client and the integrator into the operations a
//! deployment invokes: they process all pending work, then return. The
//! process glue around them (HTTP triggers, CLI flags, key management
//! transports) lives outside this crate and hands in a ready-made
//! [`LogConfig`] and backend.

use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tracing::info;

use sigil_core::checkpoint::{parse_checkpoint, Checkpoint};
use sigil_core::error::{Error, Result};
use sigil_core::hash::{empty_root, leaf_hash};
use sigil_core::note::{Signer, Verifier};
use sigil_storage::{LogStorage, ObjectLog, ObjectStore};

use crate::integrate::integrate;

/// Configuration for the write-side runners.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log identifier; the first line of every checkpoint. Required.
    pub origin: String,
    /// Store root (bucket name or directory). Informational here: the
    /// backend handed to the runners is already rooted.
    #[serde(default)]
    pub root: String,
    /// Note signer key string (`PRIVATE+KEY+...`).
    pub signer_key: String,
    /// Note verifier key string.
    pub verifier_key: String,
    /// Create the empty log instead of integrating (integrator only).
    #[serde(default)]
    pub initialise: bool,
    /// Create the store root before use.
    #[serde(default)]
    pub create_root: bool,
    /// Cache-control applied to the checkpoint object.
    #[serde(default)]
    pub checkpoint_cache_control: Option<String>,
    /// Cache-control applied to every other object.
    #[serde(default)]
    pub other_cache_control: Option<String>,
    /// Prefix holding entries awaiting sequencing (sequencer only).
    #[serde(default)]
    pub entries_dir: Option<String>,
}

impl LogConfig {
    fn require_origin(&self) -> Result<()> {
        if self.origin.is_empty() {
            return Err(Error::malformed("origin must be set"));
        }
        Ok(())
    }
}

/// Initialise an empty log: sign and write the size-0 checkpoint.
///
/// Fails with `Precondition` if the log already has a checkpoint.
pub async fn init_log<B: ObjectStore>(
    cfg: &LogConfig,
    log: &mut ObjectLog<B>,
) -> Result<Checkpoint> {
    cfg.require_origin()?;
    let signer = Signer::new(&cfg.signer_key)?;
    let checkpoint = Checkpoint::new(&cfg.origin, 0, empty_root());
    let signed = signer.sign_note(&checkpoint.marshal())?;
    log.write_checkpoint(signed.as_bytes()).await?;
    info!(origin = %cfg.origin, "initialised empty log");
    Ok(checkpoint)
}

/// Sequence every entry found under `entries_dir`.
///
/// Each object below the prefix is read, hashed, and assigned the next
/// free index; duplicates are squashed against the existing leaf
/// mapping. Returns the number of entries processed.
pub async fn run_sequence<B: ObjectStore>(
    cfg: &LogConfig,
    log: &mut ObjectLog<B>,
) -> Result<u64> {
    cfg.require_origin()?;
    let entries_dir = cfg
        .entries_dir
        .as_deref()
        .ok_or_else(|| Error::malformed("entries_dir must be set to sequence"))?;
    let verifier = Verifier::new(&cfg.verifier_key)?;

    // Seed the sequence hint from the published tree size.
    let raw = log.read_checkpoint().await?;
    let checkpoint = parse_checkpoint(&raw, &cfg.origin, &verifier)?;
    log.set_next_seq(checkpoint.size);

    let mut processed = 0u64;
    let mut keys = log.backend().list(entries_dir).await?;
    while let Some(key) = keys.try_next().await? {
        // Only sequence objects below the directory, not the directory
        // marker itself.
        if key.trim_end_matches('/') == entries_dir.trim_end_matches('/') {
            continue;
        }
        let (entry, _) = log.backend().read(&key).await?;
        let hash = leaf_hash(&entry);
        match log.sequence(hash, &entry).await {
            Ok(seq) => info!("Sequence num {seq} assigned to {key}"),
            Err(Error::DupeLeaf { seq }) => info!("Sequence num {seq} assigned to {key} (dupe)"),
            Err(e) => return Err(e),
        }
        processed += 1;
    }
    Ok(processed)
}

/// Integrate all pending entries and publish a new signed checkpoint.
///
/// With `initialise` set this creates the empty log instead. Returns the
/// latest checkpoint, which is unchanged when nothing was pending.
pub async fn run_integrate<B: ObjectStore>(
    cfg: &LogConfig,
    log: &mut ObjectLog<B>,
) -> Result<Checkpoint> {
    cfg.require_origin()?;
    if cfg.initialise {
        return init_log(cfg, log).await;
    }

    let signer = Signer::new(&cfg.signer_key)?;
    let verifier = Verifier::new(&cfg.verifier_key)?;

    let raw = log.read_checkpoint().await?;
    let checkpoint = parse_checkpoint(&raw, &cfg.origin, &verifier)?;

    match integrate(checkpoint.size, log).await? {
        None => Ok(checkpoint),
        Some(head) => {
            let new_checkpoint = Checkpoint::new(&cfg.origin, head.size, head.root);
            let signed = signer.sign_note(&new_checkpoint.marshal())?;
            log.write_checkpoint(signed.as_bytes()).await?;
            Ok(new_checkpoint)
        }
    }
}
