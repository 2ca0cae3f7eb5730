//! Moment-matching (Boltzmann learning) fit of fields and couplings.
//!
//! Each iteration samples the current parameters, measures the residual
//! against the targets and moves `(h, J)` along it with step `1/√k`. The loop
//! ends when both residual norms fall below their thresholds, when the
//! iteration cap is reached, or when a [`CancelToken`] fires between two
//! iterations.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ising_core::{IsingError, IsingParams, MomentStatistics, TargetSource};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::checkpoint::{self, SolverCheckpoint};
use crate::config::RunConfig;
use crate::determinism;
use crate::ensemble::EnsembleEstimator;
use crate::manifest;
use crate::metrics::{ConvergenceLog, ConvergenceRecord};
use crate::statistics;

/// Terminal state of a fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FitStatus {
    /// Both residual norms fell below their thresholds.
    Converged,
    /// The iteration cap was reached first.
    MaxStepsExceeded,
    /// A cancellation request was observed between iterations.
    Cancelled,
}

/// Cooperative cancellation flag shared with a running fit.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates an unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; the solver stops before its next iteration.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Everything a fit hands to the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitOutcome {
    /// How the loop ended.
    pub status: FitStatus,
    /// Final fields and couplings (after the last update).
    pub params: IsingParams,
    /// Statistics sampled in the last completed iteration, if any ran.
    pub sampled: Option<MomentStatistics>,
    /// Targets actually matched, after magnetization clamping.
    pub targets: MomentStatistics,
    /// One record per completed iteration.
    pub log: ConvergenceLog,
    /// Checkpoint files still on disk.
    pub checkpoints: Vec<PathBuf>,
    /// Manifest written for the run, when a run directory is configured.
    pub manifest_path: Option<PathBuf>,
}

impl FitOutcome {
    /// True for [`FitStatus::Converged`].
    pub fn is_converged(&self) -> bool {
        self.status == FitStatus::Converged
    }

    /// Number of completed iterations.
    pub fn iterations(&self) -> usize {
        self.log.last().map(|record| record.iteration).unwrap_or(0)
    }
}

/// Elementwise residual between targets and a sampled estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct Residual {
    /// `M* − M_sampled`.
    pub magnetization: DMatrix<f64>,
    /// `C* − Corr_sampled`.
    pub correlation: DMatrix<f64>,
    /// `Σ |ΔM|`.
    pub tol1: f64,
    /// `½ Σ |ΔC|`, each unordered pair counted once.
    pub tol2: f64,
}

impl Residual {
    /// Computes the residual and its convergence norms.
    pub fn between(targets: &MomentStatistics, sampled: &MomentStatistics) -> Self {
        let magnetization = &targets.magnetization - &sampled.magnetization;
        let correlation = &targets.correlation - &sampled.correlation;
        let tol1 = magnetization.iter().map(|v| v.abs()).sum();
        let tol2 = 0.5 * correlation.iter().map(|v| v.abs()).sum::<f64>();
        Self {
            magnetization,
            correlation,
            tol1,
            tol2,
        }
    }
}

/// Fits `(h, J)` to the statistics supplied by `source`.
///
/// Without `initial` parameters the fields start from the mean-field inverse
/// of the (clamped) target magnetization and the couplings start at zero.
pub fn fit<S: TargetSource + ?Sized>(
    config: &RunConfig,
    seed: u64,
    source: &S,
    initial: Option<IsingParams>,
    cancel: Option<&CancelToken>,
) -> Result<FitOutcome, IsingError> {
    config.validate()?;
    let shape = config.shape()?;
    let raw = source.target_statistics()?;
    raw.validate(shape)?;
    let targets = MomentStatistics {
        magnetization: statistics::clamp_magnetization(&raw.magnetization, &config.solver.clamp)?,
        correlation: (&raw.correlation + raw.correlation.transpose()) * 0.5,
    };
    let params = match initial {
        Some(params) => params,
        None => statistics::initial_params(&targets.magnetization, &config.solver.clamp)?,
    };
    params.validate(shape)?;
    let estimator = EnsembleEstimator::new(shape, &config.sampling)?;
    iterate(
        config,
        seed,
        &estimator,
        targets,
        LoopState {
            next_iteration: 1,
            params,
            sampled: None,
            log: ConvergenceLog::new(),
        },
        cancel,
    )
}

/// Continues a fit from a checkpoint written by [`fit`].
pub fn resume(path: &Path, cancel: Option<&CancelToken>) -> Result<FitOutcome, IsingError> {
    let payload = SolverCheckpoint::load(path)?;
    let config = &payload.config;
    config.validate()?;
    let shape = config.shape()?;
    payload.targets.validate(shape)?;
    payload.params.validate(shape)?;
    let estimator = EnsembleEstimator::new(shape, &config.sampling)?;
    info!(
        iteration = payload.iteration,
        path = %path.display(),
        "resuming fit from checkpoint"
    );
    iterate(
        config,
        payload.master_seed,
        &estimator,
        payload.targets,
        LoopState {
            next_iteration: payload.iteration + 1,
            params: payload.params,
            sampled: Some(payload.sampled),
            log: payload.log,
        },
        cancel,
    )
}

struct LoopState {
    next_iteration: usize,
    params: IsingParams,
    sampled: Option<MomentStatistics>,
    log: ConvergenceLog,
}

fn iterate(
    config: &RunConfig,
    seed: u64,
    estimator: &EnsembleEstimator,
    targets: MomentStatistics,
    state: LoopState,
    cancel: Option<&CancelToken>,
) -> Result<FitOutcome, IsingError> {
    let LoopState {
        next_iteration,
        mut params,
        mut sampled,
        mut log,
    } = state;
    let eps1 = config.solver.eps1;
    let eps2 = config.eps2();
    let max_steps = config.solver.max_steps;
    let mut checkpoints = Vec::new();
    let mut iteration = next_iteration;

    let status = loop {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            warn!(iteration, "fit cancelled before iteration");
            break FitStatus::Cancelled;
        }
        if iteration > max_steps {
            // Only reachable when resuming a checkpoint taken at the cap.
            break FitStatus::MaxStepsExceeded;
        }

        let estimate = estimator.estimate(&params, determinism::iteration_seed(seed, iteration))?;
        let residual = Residual::between(&targets, &estimate.statistics);

        let eta = 1.0 / (iteration as f64).sqrt();
        params.fields += &residual.magnetization * eta;
        params.couplings += &residual.correlation * eta;

        log.push(ConvergenceRecord {
            iteration,
            tol1: residual.tol1,
            tol2: residual.tol2,
        });
        info!(
            iteration,
            tol1 = residual.tol1,
            tol2 = residual.tol2,
            eps1,
            eps2,
            eta,
            acceptance = estimate.stats.acceptance_rate(),
            "solver iteration"
        );
        sampled = Some(estimate.statistics);

        if residual.tol1 < eps1 && residual.tol2 < eps2 {
            break FitStatus::Converged;
        }
        if iteration + 1 > max_steps {
            break FitStatus::MaxStepsExceeded;
        }

        if let Some(sampled) = &sampled {
            maybe_checkpoint(
                config,
                seed,
                iteration,
                &targets,
                &params,
                sampled,
                &log,
                &mut checkpoints,
            )?;
        }
        iteration += 1;
    };

    info!(
        status = ?status,
        iterations = log.len(),
        tol1 = log.last().map(|r| r.tol1),
        tol2 = log.last().map(|r| r.tol2),
        "fit finished"
    );

    let mut outcome = FitOutcome {
        status,
        params,
        sampled,
        targets,
        log,
        checkpoints,
        manifest_path: None,
    };
    if let Some(run_dir) = &config.output.run_directory {
        outcome.manifest_path = Some(manifest::write_fit_artifacts(run_dir, config, seed, &outcome)?);
    }
    Ok(outcome)
}

#[allow(clippy::too_many_arguments)]
fn maybe_checkpoint(
    config: &RunConfig,
    seed: u64,
    iteration: usize,
    targets: &MomentStatistics,
    params: &IsingParams,
    sampled: &MomentStatistics,
    log: &ConvergenceLog,
    checkpoints: &mut Vec<PathBuf>,
) -> Result<(), IsingError> {
    let interval = config.checkpoint.interval;
    let Some(run_dir) = &config.output.run_directory else {
        return Ok(());
    };
    if interval == 0 || iteration % interval != 0 {
        return Ok(());
    }
    let path = checkpoint::checkpoint_path(&run_dir.join(&config.output.checkpoint_dir), iteration);
    SolverCheckpoint {
        schema_version: checkpoint::CHECKPOINT_SCHEMA,
        iteration,
        config: config.clone(),
        master_seed: seed,
        targets: targets.clone(),
        params: params.clone(),
        sampled: sampled.clone(),
        log: log.clone(),
    }
    .store(&path)?;
    checkpoints.push(path);
    checkpoint::enforce_retention(checkpoints, config.checkpoint.max_to_keep)
}
