use std::fs;
use std::path::{Path, PathBuf};

use ising_core::errors::ErrorInfo;
use ising_core::{IsingError, IsingParams, MomentStatistics, SchemaVersion};
use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::metrics::ConvergenceLog;

/// Schema written into every checkpoint payload.
pub const CHECKPOINT_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0, 0);

/// Solver state captured between two iterations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverCheckpoint {
    /// Payload schema; payloads from another major version are refused.
    pub schema_version: SchemaVersion,
    /// Last completed iteration.
    pub iteration: usize,
    /// Configuration snapshot associated with the run.
    pub config: RunConfig,
    /// Master seed used to derive iteration substreams.
    pub master_seed: u64,
    /// Clamped targets the fit is matching.
    pub targets: MomentStatistics,
    /// Parameters after the update of `iteration`.
    pub params: IsingParams,
    /// Sampled statistics of `iteration`.
    pub sampled: MomentStatistics,
    /// Convergence log up to and including `iteration`.
    pub log: ConvergenceLog,
}

impl SolverCheckpoint {
    /// Restores the payload from disk.
    pub fn load(path: &Path) -> Result<Self, IsingError> {
        let contents = fs::read_to_string(path)
            .map_err(|err| IsingError::io("checkpoint-read", err, path))?;
        let payload: Self = serde_json::from_str(&contents)
            .map_err(|err| IsingError::io("checkpoint-parse", err, path))?;
        if !CHECKPOINT_SCHEMA.reads(&payload.schema_version) {
            return Err(IsingError::Serde(
                ErrorInfo::new("checkpoint-schema", "checkpoint schema is not supported")
                    .with_context("path", path.display())
                    .with_context("found", payload.schema_version)
                    .with_context("expected", CHECKPOINT_SCHEMA),
            ));
        }
        Ok(payload)
    }

    /// Writes the payload to disk.
    pub fn store(&self, path: &Path) -> Result<(), IsingError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| IsingError::io("checkpoint-mkdir", err, parent))?;
        }
        let json = serde_json::to_string(self)
            .map_err(|err| IsingError::io("checkpoint-serialize", err, path))?;
        fs::write(path, json).map_err(|err| IsingError::io("checkpoint-write", err, path))
    }
}

/// Determines the checkpoint file path using a deterministic numbering scheme.
pub fn checkpoint_path(root: &Path, iteration: usize) -> PathBuf {
    root.join(format!("ckpt_{iteration:05}.json"))
}

/// Deletes the oldest checkpoints until at most `max_to_keep` remain.
pub fn enforce_retention(paths: &mut Vec<PathBuf>, max_to_keep: usize) -> Result<(), IsingError> {
    while paths.len() > max_to_keep {
        let path = paths.remove(0);
        fs::remove_file(&path).map_err(|err| IsingError::io("checkpoint-remove", err, &path))?;
    }
    Ok(())
}
