use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use ising_core::{
    ErrorInfo, IsingError, IsingParams, MomentStatistics, RunProvenance, SchemaVersion,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::analysis;
use crate::anneal::AnnealedSample;
use crate::config::RunConfig;
use crate::solver::{FitOutcome, FitStatus};

/// File holding fitted or annealed parameters.
pub const PARAMS_FILE: &str = "params.json";
/// File holding the clamped targets of a fit.
pub const TARGETS_FILE: &str = "targets.json";
/// File holding the statistics sampled in the last fit iteration.
pub const SAMPLED_FILE: &str = "sampled.json";
/// Per-sample energy table of an annealing batch.
pub const ENERGIES_FILE: &str = "energies.csv";
/// Distinct-configuration energy histogram of an annealing batch.
pub const HISTOGRAM_FILE: &str = "energy_histogram.csv";

/// Schema written into every run manifest.
pub const MANIFEST_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0, 0);

/// Which workflow produced a run directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunKind {
    /// Moment-matching fit.
    Fit,
    /// Annealing batch.
    Anneal,
}

/// Structured manifest describing a completed run directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    /// Manifest schema.
    pub schema_version: SchemaVersion,
    /// Workflow that produced the run.
    pub kind: RunKind,
    /// Configuration used for the run.
    pub config: RunConfig,
    /// Master seed used to derive every substream.
    pub master_seed: u64,
    /// Optional seed label captured from the configuration.
    pub seed_label: Option<String>,
    /// Terminal fit status; absent for annealing runs.
    pub status: Option<FitStatus>,
    /// Completed solver iterations, or annealing samples produced.
    pub iterations: usize,
    /// Hashes, seed and timestamp of the run.
    pub provenance: RunProvenance,
    /// Artefacts written next to the manifest (relative to the run directory).
    pub files: Vec<PathBuf>,
    /// Retained checkpoints (relative to the run directory, oldest first).
    pub checkpoints: Vec<PathBuf>,
}

impl RunManifest {
    /// Writes the manifest to a JSON file.
    pub fn write(&self, path: &Path) -> Result<(), IsingError> {
        write_json(path, self, "manifest")
    }

    /// Loads a manifest from disk, refusing other major schema versions.
    pub fn load(path: &Path) -> Result<Self, IsingError> {
        let manifest: Self = read_json(path, "manifest")?;
        if !MANIFEST_SCHEMA.reads(&manifest.schema_version) {
            return Err(IsingError::Serde(
                ErrorInfo::new("manifest-schema", "manifest schema is not supported")
                    .with_context("path", path.display())
                    .with_context("found", manifest.schema_version),
            ));
        }
        Ok(manifest)
    }
}

/// Stable SHA-256 hex digest of a value's JSON encoding.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, IsingError> {
    let bytes = serde_json::to_vec(value)
        .map_err(|err| IsingError::Serde(ErrorInfo::new("hash-serialize", err.to_string())))?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// Serializes `value` as pretty JSON, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T, what: &str) -> Result<(), IsingError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| IsingError::io(&format!("{what}-mkdir"), err, parent))?;
    }
    let json = serde_json::to_string_pretty(value)
        .map_err(|err| IsingError::io(&format!("{what}-serialize"), err, path))?;
    fs::write(path, json).map_err(|err| IsingError::io(&format!("{what}-write"), err, path))
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T, IsingError> {
    let contents = fs::read_to_string(path)
        .map_err(|err| IsingError::io(&format!("{what}-read"), err, path))?;
    serde_json::from_str(&contents).map_err(|err| IsingError::io(&format!("{what}-parse"), err, path))
}

/// Loads parameters written by a fit (or by hand) from JSON.
pub fn load_params(path: &Path) -> Result<IsingParams, IsingError> {
    read_json(path, "params")
}

/// Loads target or sampled moment statistics from JSON.
pub fn load_statistics(path: &Path) -> Result<MomentStatistics, IsingError> {
    read_json(path, "statistics")
}

fn provenance(
    config: &RunConfig,
    seed: u64,
    target_hash: Option<String>,
) -> Result<RunProvenance, IsingError> {
    let mut tool_versions = BTreeMap::new();
    tool_versions.insert(
        env!("CARGO_PKG_NAME").to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    Ok(RunProvenance {
        config_hash: stable_hash_string(config)?,
        target_hash,
        seed,
        created_at: Utc::now().to_rfc3339(),
        tool_versions,
    })
}

fn relative_to(run_dir: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(run_dir)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Persists parameters, targets, sampled statistics, the convergence log and
/// a manifest for a finished fit. Returns the manifest path.
pub fn write_fit_artifacts(
    run_dir: &Path,
    config: &RunConfig,
    seed: u64,
    outcome: &FitOutcome,
) -> Result<PathBuf, IsingError> {
    let mut files = Vec::new();
    write_json(&run_dir.join(PARAMS_FILE), &outcome.params, "params")?;
    files.push(PathBuf::from(PARAMS_FILE));
    write_json(&run_dir.join(TARGETS_FILE), &outcome.targets, "targets")?;
    files.push(PathBuf::from(TARGETS_FILE));
    if let Some(sampled) = &outcome.sampled {
        write_json(&run_dir.join(SAMPLED_FILE), sampled, "sampled")?;
        files.push(PathBuf::from(SAMPLED_FILE));
    }
    let convergence_path = run_dir.join(&config.output.convergence_file);
    outcome
        .log
        .write_csv(&convergence_path)
        .map_err(|err| IsingError::io("convergence-write", err, &convergence_path))?;
    files.push(config.output.convergence_file.clone());

    let manifest = RunManifest {
        schema_version: MANIFEST_SCHEMA,
        kind: RunKind::Fit,
        config: config.clone(),
        master_seed: seed,
        seed_label: config.seed_policy.label.clone(),
        status: Some(outcome.status),
        iterations: outcome.log.len(),
        provenance: provenance(config, seed, Some(stable_hash_string(&outcome.targets)?))?,
        files,
        checkpoints: outcome
            .checkpoints
            .iter()
            .map(|path| relative_to(run_dir, path))
            .collect(),
    };
    let manifest_path = run_dir.join(&config.output.manifest_file);
    manifest.write(&manifest_path)?;
    info!(path = %manifest_path.display(), "wrote fit manifest");
    Ok(manifest_path)
}

/// Persists annealed samples, their energy table and histogram, and a
/// manifest. Returns the manifest path.
pub fn write_anneal_artifacts(
    run_dir: &Path,
    config: &RunConfig,
    seed: u64,
    params: &IsingParams,
    samples: &[AnnealedSample],
) -> Result<PathBuf, IsingError> {
    let mut files = Vec::new();
    write_json(&run_dir.join(PARAMS_FILE), params, "params")?;
    files.push(PathBuf::from(PARAMS_FILE));

    let samples_dir = config.output.samples_dir.clone();
    for sample in samples {
        let relative = samples_dir.join(format!("sample_{:05}.json", sample.index));
        write_json(&run_dir.join(&relative), sample, "sample")?;
        files.push(relative);
    }

    let energies_path = run_dir.join(ENERGIES_FILE);
    write_energy_table(&energies_path, samples)
        .map_err(|err| IsingError::io("energies-write", err, &energies_path))?;
    files.push(PathBuf::from(ENERGIES_FILE));

    let histogram_path = run_dir.join(HISTOGRAM_FILE);
    analysis::write_histogram_csv(&histogram_path, &analysis::energy_histogram(samples))
        .map_err(|err| IsingError::io("histogram-write", err, &histogram_path))?;
    files.push(PathBuf::from(HISTOGRAM_FILE));

    let manifest = RunManifest {
        schema_version: MANIFEST_SCHEMA,
        kind: RunKind::Anneal,
        config: config.clone(),
        master_seed: seed,
        seed_label: config.seed_policy.label.clone(),
        status: None,
        iterations: samples.len(),
        provenance: provenance(config, seed, None)?,
        files,
        checkpoints: Vec::new(),
    };
    let manifest_path = run_dir.join(&config.output.manifest_file);
    manifest.write(&manifest_path)?;
    info!(
        path = %manifest_path.display(),
        samples = samples.len(),
        "wrote anneal manifest"
    );
    Ok(manifest_path)
}

fn write_energy_table(path: &Path, samples: &[AnnealedSample]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    writeln!(file, "index,energy,recomputed_energy,magnetization,acceptance")?;
    for sample in samples {
        writeln!(
            file,
            "{},{:.12e},{:.12e},{:.12e},{:.6}",
            sample.index,
            sample.energy,
            sample.recomputed_energy,
            sample.magnetization,
            sample.stats.acceptance_rate()
        )?;
    }
    Ok(())
}
