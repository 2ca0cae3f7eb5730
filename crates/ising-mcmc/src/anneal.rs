use ising_core::errors::ErrorInfo;
use ising_core::{IsingError, IsingParams, Lattice, RngHandle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{check_temperature, ScheduleRung, SchedulePolicy};
use crate::determinism;
use crate::energy;
use crate::kernel::{MetropolisSampler, SamplerState, SweepStats};

const TEMPERATURE_TOLERANCE: f64 = 1e-9;
/// Upper bound on the number of rungs a linear policy may expand to.
pub const MAX_SCHEDULE_RUNGS: usize = 100_000;

/// Expands a schedule policy into its rungs, rejecting malformed schedules.
///
/// Rungs must be non-empty, strictly descending, at positive temperatures and
/// carry a positive flip budget.
pub fn build_schedule(policy: &SchedulePolicy) -> Result<Vec<ScheduleRung>, IsingError> {
    let rungs = match policy {
        SchedulePolicy::Linear {
            start,
            floor,
            decrement,
            steps,
            widened,
        } => {
            if !(decrement.is_finite() && *decrement > 0.0) {
                return Err(IsingError::Config(
                    ErrorInfo::new("schedule-decrement", "decrement must be positive")
                        .with_context("decrement", decrement),
                ));
            }
            if !floor.is_finite() || *floor < 0.0 {
                return Err(IsingError::Config(
                    ErrorInfo::new("schedule-floor", "floor must be finite and non-negative")
                        .with_context("floor", floor),
                ));
            }
            check_temperature(*start)?;
            let span = ((start - floor) / decrement).ceil();
            if span > MAX_SCHEDULE_RUNGS as f64 {
                return Err(IsingError::Config(
                    ErrorInfo::new("schedule-size", "linear schedule expands to too many rungs")
                        .with_context("rungs", span)
                        .with_context("limit", MAX_SCHEDULE_RUNGS)
                        .with_hint("raise decrement or narrow start..floor"),
                ));
            }
            let mut rungs = Vec::with_capacity(span.max(0.0) as usize);
            let mut index = 0usize;
            loop {
                let temperature = start - index as f64 * decrement;
                if temperature <= floor + TEMPERATURE_TOLERANCE {
                    break;
                }
                let rung_steps = match widened {
                    Some(w) if (w.temperature - temperature).abs() < TEMPERATURE_TOLERANCE => {
                        w.steps
                    }
                    _ => *steps,
                };
                rungs.push(ScheduleRung {
                    temperature,
                    steps: rung_steps,
                });
                index += 1;
            }
            rungs
        }
        SchedulePolicy::Manual { rungs } => rungs.clone(),
    };
    validate_rungs(&rungs)?;
    Ok(rungs)
}

fn validate_rungs(rungs: &[ScheduleRung]) -> Result<(), IsingError> {
    if rungs.is_empty() {
        return Err(IsingError::Config(
            ErrorInfo::new("schedule-empty", "annealing schedule has no rungs")
                .with_hint("start must lie above floor"),
        ));
    }
    for (index, rung) in rungs.iter().enumerate() {
        check_temperature(rung.temperature)?;
        if rung.steps == 0 {
            return Err(IsingError::Config(
                ErrorInfo::new("schedule-steps", "every rung needs a positive flip budget")
                    .with_context("rung", index),
            ));
        }
    }
    if let Some(index) = rungs
        .windows(2)
        .position(|pair| pair[1].temperature >= pair[0].temperature)
    {
        return Err(IsingError::Config(
            ErrorInfo::new("schedule-order", "schedule temperatures must strictly descend")
                .with_context("rung", index + 1)
                .with_context("previous", rungs[index].temperature)
                .with_context("temperature", rungs[index + 1].temperature),
        ));
    }
    Ok(())
}

/// Low-temperature configuration produced by one annealing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnealedSample {
    /// Index of the run within its batch.
    pub index: usize,
    /// Final lattice at the lowest rung.
    pub lattice: Lattice,
    /// Incrementally tracked energy at the end of the run.
    pub energy: f64,
    /// Energy recomputed from scratch for the final lattice.
    pub recomputed_energy: f64,
    /// Incrementally tracked mean spin.
    pub magnetization: f64,
    /// Proposal counters over the whole schedule.
    pub stats: SweepStats,
}

/// Anneals one random lattice through `rungs` in order.
pub fn anneal(
    params: &IsingParams,
    rungs: &[ScheduleRung],
    rng: &mut RngHandle,
) -> Result<AnnealedSample, IsingError> {
    validate_rungs(rungs)?;
    let shape = params.shape()?;
    params.validate(shape)?;
    let lattice = Lattice::random(shape, rng);
    let mut state = SamplerState::new(lattice, params)?;
    let mut stats = SweepStats::default();
    for rung in rungs {
        debug!(temperature = rung.temperature, steps = rung.steps, "annealing rung");
        let sampler = MetropolisSampler::new(params, rung.temperature)?;
        stats.absorb(sampler.run(&mut state, rung.steps, rng));
    }
    let recomputed = energy::energy_and_magnetization(&state.lattice, params)?;
    Ok(AnnealedSample {
        index: 0,
        energy: state.energy,
        recomputed_energy: recomputed.energy,
        magnetization: state.magnetization,
        lattice: state.lattice,
        stats,
    })
}

/// Runs `count` independent annealing runs in parallel.
///
/// Run `i` draws from `sample_seed(master_seed, i)`, so the batch is
/// reproducible regardless of how rayon schedules it.
pub fn anneal_batch(
    params: &IsingParams,
    policy: &SchedulePolicy,
    master_seed: u64,
    count: usize,
) -> Result<Vec<AnnealedSample>, IsingError> {
    let rungs = build_schedule(policy)?;
    params.validate(params.shape()?)?;
    (0..count)
        .into_par_iter()
        .map(|index| -> Result<AnnealedSample, IsingError> {
            let mut rng = RngHandle::from_seed(determinism::sample_seed(master_seed, index));
            let mut sample = anneal(params, &rungs, &mut rng)?;
            sample.index = index;
            Ok(sample)
        })
        .collect()
}
