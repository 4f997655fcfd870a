// Durable traversal snapshots

use crate::state::TraversalState;
use crate::variant::Variant;
use bibcrawl_source::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Checkpoint I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Checkpoint {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode checkpoint for {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Checkpoint format version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Checkpoint belongs to a {found} traversal, not {expected}")]
    VariantMismatch { found: Variant, expected: Variant },

    #[error("Checkpoint was started from seed {found}, not {expected}")]
    SeedMismatch { found: NodeId, expected: NodeId },
}

/// Versioned, self-describing snapshot written to `checkpoint.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub format_version: u32,
    pub variant: Variant,
    pub seed: NodeId,
    pub saved_at: DateTime<Utc>,
    pub state: TraversalState,
}

impl Checkpoint {
    pub fn new(variant: Variant, seed: NodeId, state: TraversalState) -> Self {
        Self {
            format_version: CHECKPOINT_FORMAT_VERSION,
            variant,
            seed,
            saved_at: Utc::now(),
            state,
        }
    }

    /// Reject a checkpoint written by a different traversal.
    pub fn ensure_matches(&self, variant: Variant, seed: &NodeId) -> Result<(), CheckpointError> {
        if self.variant != variant {
            return Err(CheckpointError::VariantMismatch {
                found: self.variant,
                expected: variant,
            });
        }
        if &self.seed != seed {
            return Err(CheckpointError::SeedMismatch {
                found: self.seed.clone(),
                expected: seed.clone(),
            });
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct VersionHeader {
    format_version: u32,
}

/// Reads and writes one checkpoint file.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn io_error(&self, source: std::io::Error) -> CheckpointError {
        CheckpointError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Write the snapshot to a sibling temp file, then rename it over the old one so a
    /// crash mid-write leaves the previous checkpoint intact.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let json = serde_json::to_vec(checkpoint).map_err(|source| CheckpointError::Encode {
            path: self.path.clone(),
            source,
        })?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = fs::File::create(&tmp).map_err(|e| self.io_error(e))?;
        file.write_all(&json).map_err(|e| self.io_error(e))?;
        file.sync_all().map_err(|e| self.io_error(e))?;
        drop(file);
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;

        debug!(
            "Checkpoint saved to {} ({} frontier, {} visited)",
            self.path.display(),
            checkpoint.state.frontier.len(),
            checkpoint.state.visited.len()
        );
        Ok(())
    }

    /// `Ok(None)` when no checkpoint has been written yet.
    pub fn load(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        let corrupt = |source| CheckpointError::Corrupt {
            path: self.path.clone(),
            source,
        };

        let header: VersionHeader = serde_json::from_slice(&raw).map_err(corrupt)?;
        if header.format_version != CHECKPOINT_FORMAT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: header.format_version,
                expected: CHECKPOINT_FORMAT_VERSION,
            });
        }

        let checkpoint: Checkpoint = serde_json::from_slice(&raw).map_err(corrupt)?;
        Ok(Some(checkpoint))
    }

    pub fn remove(&self) -> Result<(), CheckpointError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}
