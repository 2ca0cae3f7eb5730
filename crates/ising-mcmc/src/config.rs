use std::fs;
use std::path::{Path, PathBuf};

use ising_core::errors::ErrorInfo;
use ising_core::{IsingError, LatticeShape};
use serde::{Deserialize, Serialize};

use crate::anneal;

/// YAML-configurable parameters governing a fit or an annealing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Lattice dimensions.
    #[serde(default)]
    pub lattice: LatticeConfig,
    /// Ensemble sampling settings used by every solver iteration.
    #[serde(default)]
    pub sampling: SamplingConfig,
    /// Convergence thresholds and iteration cap.
    #[serde(default)]
    pub solver: SolverConfig,
    /// Annealing schedule and batch size.
    #[serde(default)]
    pub anneal: AnnealConfig,
    /// Checkpointing behaviour.
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Output directory configuration.
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            lattice: LatticeConfig::default(),
            sampling: SamplingConfig::default(),
            solver: SolverConfig::default(),
            anneal: AnnealConfig::default(),
            checkpoint: CheckpointConfig::default(),
            seed_policy: SeedPolicy::default(),
            output: OutputConfig::default(),
        }
    }
}

impl RunConfig {
    /// Parses a YAML document.
    pub fn from_yaml_str(contents: &str) -> Result<Self, IsingError> {
        serde_yaml::from_str(contents)
            .map_err(|err| IsingError::Serde(ErrorInfo::new("config-parse", err.to_string())))
    }

    /// Loads and validates a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, IsingError> {
        let contents =
            fs::read_to_string(path).map_err(|err| IsingError::io("config-read", err, path))?;
        let config = Self::from_yaml_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validated lattice shape.
    pub fn shape(&self) -> Result<LatticeShape, IsingError> {
        LatticeShape::new(self.lattice.rows, self.lattice.cols)
    }

    /// Correlation threshold, defaulting to `eps1 · R · C`.
    pub fn eps2(&self) -> f64 {
        self.solver
            .eps2
            .unwrap_or(self.solver.eps1 * (self.lattice.rows * self.lattice.cols) as f64)
    }

    /// Rejects malformed lattice, sampling and solver options before a fit
    /// starts. The annealing block is checked separately by
    /// [`RunConfig::validate_anneal`].
    pub fn validate(&self) -> Result<(), IsingError> {
        self.shape()?;
        self.sampling.validate()?;
        self.solver.validate()?;
        if !self.eps2().is_finite() || self.eps2() < 0.0 {
            return Err(IsingError::Config(
                ErrorInfo::new("solver-eps2", "eps2 must be finite and non-negative")
                    .with_context("eps2", self.eps2()),
            ));
        }
        Ok(())
    }

    /// Checks the lattice shape and expands the annealing schedule.
    pub fn validate_anneal(&self) -> Result<Vec<ScheduleRung>, IsingError> {
        self.shape()?;
        anneal::build_schedule(&self.anneal.schedule)
    }
}

/// Lattice dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatticeConfig {
    /// Number of rows `R`.
    #[serde(default = "default_rows")]
    pub rows: usize,
    /// Number of columns `C`.
    #[serde(default = "default_cols")]
    pub cols: usize,
}

fn default_rows() -> usize {
    7
}

fn default_cols() -> usize {
    6
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            rows: default_rows(),
            cols: default_cols(),
        }
    }
}

/// Ensemble estimation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Independent replicas `N` drawn per estimate.
    #[serde(default = "default_replicas")]
    pub replicas: usize,
    /// Single-flip attempts per replica.
    #[serde(default = "default_steps")]
    pub steps: usize,
    /// Sampling temperature `T`.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Worker threads; 0 sizes the pool to the available parallelism.
    #[serde(default)]
    pub threads: usize,
}

fn default_replicas() -> usize {
    5000
}

fn default_steps() -> usize {
    8000
}

fn default_temperature() -> f64 {
    1.5
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            replicas: default_replicas(),
            steps: default_steps(),
            temperature: default_temperature(),
            threads: 0,
        }
    }
}

impl SamplingConfig {
    /// Checks the replica count, flip budget and temperature.
    pub fn validate(&self) -> Result<(), IsingError> {
        if self.replicas == 0 {
            return Err(IsingError::Config(
                ErrorInfo::new("replica-count", "replica count must be positive")
                    .with_context("replicas", self.replicas),
            ));
        }
        if self.steps == 0 {
            return Err(IsingError::Config(
                ErrorInfo::new("step-budget", "flip budget must be positive")
                    .with_context("steps", self.steps),
            ));
        }
        check_temperature(self.temperature)
    }
}

/// Rejects temperatures that would make the acceptance rule undefined.
pub fn check_temperature(temperature: f64) -> Result<(), IsingError> {
    if !temperature.is_finite() || temperature <= 0.0 {
        return Err(IsingError::Config(
            ErrorInfo::new("temperature", "temperature must be finite and positive")
                .with_context("temperature", temperature),
        ));
    }
    Ok(())
}

/// Moment-matching convergence settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Threshold on `Σ|ΔM|`.
    #[serde(default = "default_eps1")]
    pub eps1: f64,
    /// Threshold on `½ Σ|ΔC|`; `None` scales `eps1` by the lattice size.
    #[serde(default)]
    pub eps2: Option<f64>,
    /// Maximum number of solver iterations.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// Magnetization clamping applied before the mean-field initialization.
    #[serde(default)]
    pub clamp: ClampConfig,
}

fn default_eps1() -> f64 {
    1e-2
}

fn default_max_steps() -> usize {
    3000
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            eps1: default_eps1(),
            eps2: None,
            max_steps: default_max_steps(),
            clamp: ClampConfig::default(),
        }
    }
}

impl SolverConfig {
    /// Checks thresholds, the iteration cap and the clamp bound.
    pub fn validate(&self) -> Result<(), IsingError> {
        if !self.eps1.is_finite() || self.eps1 < 0.0 {
            return Err(IsingError::Config(
                ErrorInfo::new("solver-eps1", "eps1 must be finite and non-negative")
                    .with_context("eps1", self.eps1),
            ));
        }
        if self.max_steps == 0 {
            return Err(IsingError::Config(
                ErrorInfo::new("solver-max-steps", "max_steps must allow at least one iteration")
                    .with_context("max_steps", self.max_steps),
            ));
        }
        let clamp = &self.clamp;
        if !(clamp.bound > 0.0 && clamp.bound < 1.0) {
            return Err(IsingError::Config(
                ErrorInfo::new("clamp-bound", "clamp bound must lie strictly inside (0, 1)")
                    .with_context("bound", clamp.bound),
            ));
        }
        if !(clamp.rtol >= 0.0 && clamp.atol >= 0.0) {
            return Err(IsingError::Config(
                ErrorInfo::new("clamp-tolerance", "clamp tolerances must be non-negative")
                    .with_context("rtol", clamp.rtol)
                    .with_context("atol", clamp.atol),
            ));
        }
        Ok(())
    }
}

/// Controls how magnetizations at ±1 are pulled inside the open interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClampConfig {
    /// When false a saturated magnetization is a numeric error.
    #[serde(default = "default_clamp_enabled")]
    pub enabled: bool,
    /// Replacement magnitude for saturated entries.
    #[serde(default = "default_clamp_bound")]
    pub bound: f64,
    /// Relative tolerance of the closeness test against ±1.
    #[serde(default = "default_clamp_rtol")]
    pub rtol: f64,
    /// Absolute tolerance of the closeness test against ±1.
    #[serde(default = "default_clamp_atol")]
    pub atol: f64,
}

fn default_clamp_enabled() -> bool {
    true
}

fn default_clamp_bound() -> f64 {
    0.999
}

fn default_clamp_rtol() -> f64 {
    1e-5
}

fn default_clamp_atol() -> f64 {
    1e-8
}

impl Default for ClampConfig {
    fn default() -> Self {
        Self {
            enabled: default_clamp_enabled(),
            bound: default_clamp_bound(),
            rtol: default_clamp_rtol(),
            atol: default_clamp_atol(),
        }
    }
}

/// Annealing run settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnealConfig {
    /// Temperature schedule.
    #[serde(default)]
    pub schedule: SchedulePolicy,
    /// Number of independent samples produced by a batch.
    #[serde(default = "default_samples")]
    pub samples: usize,
}

fn default_samples() -> usize {
    5000
}

impl Default for AnnealConfig {
    fn default() -> Self {
        Self {
            schedule: SchedulePolicy::default(),
            samples: default_samples(),
        }
    }
}

/// Supported annealing schedule constructions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SchedulePolicy {
    /// Linear descent from `start` in `decrement` steps, staying above `floor`.
    Linear {
        /// First (hottest) rung.
        #[serde(default = "default_anneal_start")]
        start: f64,
        /// Exclusive lower bound of the schedule.
        #[serde(default = "default_anneal_floor")]
        floor: f64,
        /// Temperature step between rungs.
        #[serde(default = "default_anneal_decrement")]
        decrement: f64,
        /// Flip budget at every rung.
        #[serde(default = "default_anneal_steps")]
        steps: usize,
        /// Optional rung with an enlarged flip budget.
        #[serde(default = "default_widened")]
        widened: Option<WidenedRung>,
    },
    /// Explicit descending list of rungs.
    Manual {
        /// Rungs in execution order.
        rungs: Vec<ScheduleRung>,
    },
}

fn default_anneal_start() -> f64 {
    1.5
}

fn default_anneal_floor() -> f64 {
    0.1
}

fn default_anneal_decrement() -> f64 {
    0.1
}

fn default_anneal_steps() -> usize {
    300_000
}

fn default_widened() -> Option<WidenedRung> {
    Some(WidenedRung {
        temperature: 0.6,
        steps: 800_000,
    })
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        SchedulePolicy::Linear {
            start: default_anneal_start(),
            floor: default_anneal_floor(),
            decrement: default_anneal_decrement(),
            steps: default_anneal_steps(),
            widened: default_widened(),
        }
    }
}

/// Rung of a linear schedule that receives a larger flip budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidenedRung {
    /// Temperature of the widened rung.
    pub temperature: f64,
    /// Flip budget used at that rung.
    pub steps: usize,
}

/// One temperature of an annealing schedule and its flip budget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRung {
    /// Sampling temperature of the rung.
    pub temperature: f64,
    /// Single-flip attempts at this temperature.
    pub steps: usize,
}

/// Checkpointing configuration for the solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Interval in iterations between checkpoint writes (0 disables checkpoints).
    #[serde(default)]
    pub interval: usize,
    /// Maximum number of checkpoints to retain.
    #[serde(default = "default_checkpoint_retention")]
    pub max_to_keep: usize,
}

fn default_checkpoint_retention() -> usize {
    4
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            interval: 0,
            max_to_keep: default_checkpoint_retention(),
        }
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed used for the run.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label recorded in manifests.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x05EE_D5EE_DD15_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}

/// Output directory layout configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory for run artefacts. Created if it does not exist.
    #[serde(default)]
    pub run_directory: Option<PathBuf>,
    /// Convergence log filename relative to `run_directory`.
    #[serde(default = "default_convergence_filename")]
    pub convergence_file: PathBuf,
    /// Manifest filename relative to `run_directory`.
    #[serde(default = "default_manifest_filename")]
    pub manifest_file: PathBuf,
    /// Subdirectory used for checkpoint files.
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,
    /// Subdirectory for annealed sample lattices.
    #[serde(default = "default_samples_dir")]
    pub samples_dir: PathBuf,
}

fn default_convergence_filename() -> PathBuf {
    PathBuf::from("convergence.csv")
}

fn default_manifest_filename() -> PathBuf {
    PathBuf::from("manifest.json")
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("checkpoints")
}

fn default_samples_dir() -> PathBuf {
    PathBuf::from("samples")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            run_directory: None,
            convergence_file: default_convergence_filename(),
            manifest_file: default_manifest_filename(),
            checkpoint_dir: default_checkpoint_dir(),
            samples_dir: default_samples_dir(),
        }
    }
}
