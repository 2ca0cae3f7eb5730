#![deny(missing_docs)]
#![doc = "Metropolis sampling, annealing and moment-matching fits for 2-D Ising models."]

/// Energy histogram helpers for annealing batches.
pub mod analysis;
/// Temperature schedules and annealing runs.
pub mod anneal;
/// Solver checkpoint payloads and retention.
pub mod checkpoint;
/// YAML configuration schema and defaults.
pub mod config;
/// Deterministic seed derivation helpers.
pub mod determinism;
/// Energy and magnetization from scratch.
pub mod energy;
pub mod ensemble;
/// Single-spin-flip Metropolis kernel.
pub mod kernel;
/// Run manifest and artefact persistence.
pub mod manifest;
/// Convergence log and CSV export.
pub mod metrics;
pub mod solver;
/// Target statistics, clamping and mean-field initialisation.
pub mod statistics;

pub use anneal::{anneal, anneal_batch, build_schedule, AnnealedSample};
pub use config::{
    AnnealConfig, CheckpointConfig, ClampConfig, RunConfig, SamplingConfig, ScheduleRung,
    SchedulePolicy, SeedPolicy, SolverConfig,
};
pub use energy::{energy_and_magnetization, Observables};
pub use ensemble::{EnsembleEstimate, EnsembleEstimator};
pub use kernel::{MetropolisSampler, SamplerState, SweepStats};
pub use manifest::RunManifest;
pub use metrics::{ConvergenceLog, ConvergenceRecord};
pub use solver::{fit, resume, CancelToken, FitOutcome, FitStatus, Residual};
pub use statistics::ObservedConfigurations;
