use ising_core::{IsingError, IsingParams, Lattice};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::check_temperature;
use crate::energy::{self, local_coupling_energy, Observables};

/// Lattice owned by one replica together with its running energy and
/// magnetization.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerState {
    /// Current configuration, mutated in place by accepted flips.
    pub lattice: Lattice,
    /// Incrementally tracked energy.
    pub energy: f64,
    /// Incrementally tracked mean spin.
    pub magnetization: f64,
}

impl SamplerState {
    /// Wraps a lattice, computing its initial observables from scratch.
    pub fn new(lattice: Lattice, params: &IsingParams) -> Result<Self, IsingError> {
        let Observables {
            energy,
            magnetization,
        } = energy::energy_and_magnetization(&lattice, params)?;
        Ok(Self {
            lattice,
            energy,
            magnetization,
        })
    }
}

/// Outcome of a single-flip proposal evaluated by the sampler.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FlipOutcome {
    /// Row of the proposed site.
    pub row: usize,
    /// Column of the proposed site.
    pub col: usize,
    /// Energy change the flip would cause.
    pub delta_energy: f64,
    /// Whether the flip was kept.
    pub accepted: bool,
}

/// Proposal counters accumulated over a run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SweepStats {
    /// Flips proposed.
    pub proposed: usize,
    /// Flips accepted.
    pub accepted: usize,
}

impl SweepStats {
    /// Fraction of accepted proposals (0 when nothing was proposed).
    pub fn acceptance_rate(&self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            self.accepted as f64 / self.proposed as f64
        }
    }

    /// Adds another run's counters.
    pub fn absorb(&mut self, other: SweepStats) {
        self.proposed += other.proposed;
        self.accepted += other.accepted;
    }
}

/// Single-spin-flip Metropolis sampler at a fixed temperature.
#[derive(Debug, Clone, Copy)]
pub struct MetropolisSampler<'a> {
    params: &'a IsingParams,
    temperature: f64,
}

impl<'a> MetropolisSampler<'a> {
    /// Creates a sampler; the temperature must be finite and positive.
    pub fn new(params: &'a IsingParams, temperature: f64) -> Result<Self, IsingError> {
        check_temperature(temperature)?;
        Ok(Self {
            params,
            temperature,
        })
    }

    /// Proposes one flip at a uniformly random site and applies the
    /// Metropolis criterion. A rejected flip leaves the state untouched.
    pub fn step<R: Rng + ?Sized>(&self, state: &mut SamplerState, rng: &mut R) -> FlipOutcome {
        let shape = state.lattice.shape();
        let row = rng.gen_range(0..shape.rows());
        let col = rng.gen_range(0..shape.cols());

        // The delta below is evaluated on the already flipped spin.
        let spin = state.lattice.flip(row, col) as f64;
        let delta_field = -2.0 * spin * self.params.fields[(row, col)];
        let delta_coupling =
            -4.0 * local_coupling_energy(&state.lattice, row, col, &self.params.couplings);
        let delta_energy = delta_field + delta_coupling;

        let accepted = delta_energy < 0.0
            || rng.gen::<f64>() < (-delta_energy / self.temperature).exp();

        if accepted {
            state.energy += delta_energy;
            state.magnetization += 2.0 * spin / shape.sites() as f64;
        } else {
            state.lattice.flip(row, col);
        }

        FlipOutcome {
            row,
            col,
            delta_energy,
            accepted,
        }
    }

    /// Performs `steps` single-flip proposals.
    pub fn run<R: Rng + ?Sized>(
        &self,
        state: &mut SamplerState,
        steps: usize,
        rng: &mut R,
    ) -> SweepStats {
        let mut stats = SweepStats::default();
        for _ in 0..steps {
            let outcome = self.step(state, rng);
            stats.proposed += 1;
            if outcome.accepted {
                stats.accepted += 1;
            }
        }
        stats
    }
}
