//! Ensemble estimation of magnetization and pair correlations.
//!
//! Replicas are independent: each owns its lattice and only reads the shared
//! parameters. Workers fold exact integer spin sums and merge them once the
//! batch completes, so the estimate does not depend on scheduling.

use ising_core::errors::ErrorInfo;
use ising_core::{IsingError, IsingParams, Lattice, LatticeShape, MomentStatistics, RngHandle};
use nalgebra::DMatrix;
use rayon::prelude::*;
use tracing::debug;

use crate::config::SamplingConfig;
use crate::determinism;
use crate::kernel::{MetropolisSampler, SamplerState, SweepStats};

/// Drives `N` replicas through the sampler and reduces their final spins.
#[derive(Debug)]
pub struct EnsembleEstimator {
    shape: LatticeShape,
    replicas: usize,
    steps: usize,
    temperature: f64,
    pool: Option<rayon::ThreadPool>,
}

/// Averaged statistics of one replica batch plus its proposal counters.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleEstimate {
    /// Averaged first and second moments.
    pub statistics: MomentStatistics,
    /// Flip counters summed over all replicas.
    pub stats: SweepStats,
}

impl EnsembleEstimator {
    /// Builds an estimator, validating the sampling settings.
    pub fn new(shape: LatticeShape, config: &SamplingConfig) -> Result<Self, IsingError> {
        config.validate()?;
        let pool = if config.threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.threads)
                .build()
                .map_err(|err| {
                    IsingError::Config(
                        ErrorInfo::new("thread-pool", err.to_string())
                            .with_context("threads", config.threads),
                    )
                })?;
            Some(pool)
        } else {
            None
        };
        Ok(Self {
            shape,
            replicas: config.replicas,
            steps: config.steps,
            temperature: config.temperature,
            pool,
        })
    }

    /// Samples one batch under `params`; replica `r` uses
    /// `replica_seed(batch_seed, r)`.
    pub fn estimate(
        &self,
        params: &IsingParams,
        batch_seed: u64,
    ) -> Result<EnsembleEstimate, IsingError> {
        params.validate(self.shape)?;
        let sampler = MetropolisSampler::new(params, self.temperature)?;
        debug!(
            replicas = self.replicas,
            steps = self.steps,
            temperature = self.temperature,
            "sampling replica batch"
        );
        let totals = match &self.pool {
            Some(pool) => pool.install(|| self.reduce_batch(&sampler, params, batch_seed)),
            None => self.reduce_batch(&sampler, params, batch_seed),
        }?;
        Ok(totals.into_estimate(self.shape, self.replicas))
    }

    fn reduce_batch(
        &self,
        sampler: &MetropolisSampler<'_>,
        params: &IsingParams,
        batch_seed: u64,
    ) -> Result<SpinTotals, IsingError> {
        let sites = self.shape.sites();
        (0..self.replicas)
            .into_par_iter()
            .map(|replica| -> Result<(Lattice, SweepStats), IsingError> {
                let mut rng = RngHandle::from_seed(determinism::replica_seed(batch_seed, replica));
                let lattice = Lattice::random(self.shape, &mut rng);
                let mut state = SamplerState::new(lattice, params)?;
                let stats = sampler.run(&mut state, self.steps, &mut rng);
                Ok((state.lattice, stats))
            })
            .try_fold(
                || SpinTotals::new(sites),
                |mut totals, replica: Result<(Lattice, SweepStats), IsingError>| {
                    let (lattice, stats) = replica?;
                    totals.absorb(lattice.spins(), stats);
                    Ok(totals)
                },
            )
            .try_reduce(|| SpinTotals::new(sites), |a, b| Ok(a.merge(b)))
    }
}

/// Offset of the first `(i, j > i)` pair in the packed upper triangle.
fn triangle_start(sites: usize, i: usize) -> usize {
    i * (2 * sites - i - 1) / 2
}

/// Exact per-worker accumulator: spin sums and upper-triangle product sums
/// packed row by row, `sites·(sites-1)/2` entries.
struct SpinTotals {
    sites: usize,
    spin_sums: Vec<i64>,
    pair_sums: Vec<i64>,
    stats: SweepStats,
}

impl SpinTotals {
    fn new(sites: usize) -> Self {
        Self {
            sites,
            spin_sums: vec![0; sites],
            pair_sums: vec![0; sites * sites.saturating_sub(1) / 2],
            stats: SweepStats::default(),
        }
    }

    fn absorb(&mut self, spins: &[i8], stats: SweepStats) {
        for (i, &si) in spins.iter().enumerate() {
            self.spin_sums[i] += si as i64;
            let start = triangle_start(self.sites, i);
            let row = &mut self.pair_sums[start..start + (self.sites - i - 1)];
            for (slot, &sj) in row.iter_mut().zip(&spins[i + 1..]) {
                *slot += (si * sj) as i64;
            }
        }
        self.stats.absorb(stats);
    }

    fn merge(mut self, other: SpinTotals) -> Self {
        for (a, b) in self.spin_sums.iter_mut().zip(&other.spin_sums) {
            *a += b;
        }
        for (a, b) in self.pair_sums.iter_mut().zip(&other.pair_sums) {
            *a += b;
        }
        self.stats.absorb(other.stats);
        self
    }

    fn into_estimate(self, shape: LatticeShape, replicas: usize) -> EnsembleEstimate {
        let n = replicas as f64;
        let sites = self.sites;
        let magnetization = DMatrix::from_fn(shape.rows(), shape.cols(), |r, c| {
            self.spin_sums[shape.index(r, c)] as f64 / n
        });
        let pair = |i: usize, j: usize| {
            self.pair_sums[triangle_start(sites, i) + (j - i - 1)] as f64 / n
        };
        let correlation = DMatrix::from_fn(sites, sites, |i, j| match i.cmp(&j) {
            std::cmp::Ordering::Equal => 0.0,
            std::cmp::Ordering::Less => pair(i, j),
            std::cmp::Ordering::Greater => pair(j, i),
        });
        EnsembleEstimate {
            statistics: MomentStatistics {
                magnetization,
                correlation,
            },
            stats: self.stats,
        }
    }
}
