use std::fs;
use std::path::Path;

use ising_core::errors::ErrorInfo;
use ising_core::{IsingError, IsingParams, Lattice, LatticeShape, MomentStatistics, TargetSource};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::ClampConfig;

/// Observed training configurations, flattened row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedConfigurations {
    /// Number of rows of every configuration.
    pub rows: usize,
    /// Number of columns of every configuration.
    pub cols: usize,
    /// One row-major spin vector per observation.
    pub configurations: Vec<Vec<i8>>,
}

impl ObservedConfigurations {
    /// Loads observations from a JSON file.
    pub fn load(path: &Path) -> Result<Self, IsingError> {
        let contents = fs::read_to_string(path)
            .map_err(|err| IsingError::io("observations-read", err, path))?;
        serde_json::from_str(&contents)
            .map_err(|err| IsingError::io("observations-parse", err, path))
    }

    /// Validates every observation and converts it to a lattice.
    pub fn lattices(&self) -> Result<Vec<Lattice>, IsingError> {
        let shape = LatticeShape::new(self.rows, self.cols)?;
        self.configurations
            .iter()
            .map(|spins| Lattice::from_spins(shape, spins.clone()))
            .collect()
    }
}

impl TargetSource for ObservedConfigurations {
    fn target_statistics(&self) -> Result<MomentStatistics, IsingError> {
        moments_from_lattices(&self.lattices()?)
    }
}

/// Average spin per site and average pair product (zero diagonal) over a
/// set of equally shaped lattices.
pub fn moments_from_lattices(lattices: &[Lattice]) -> Result<MomentStatistics, IsingError> {
    let Some(first) = lattices.first() else {
        return Err(IsingError::Config(ErrorInfo::new(
            "observations-empty",
            "at least one observed configuration is required",
        )));
    };
    let shape = first.shape();
    let sites = shape.sites();
    let count = lattices.len() as f64;
    let mut spin_sums = vec![0i64; sites];
    let mut pair_sums = DMatrix::<f64>::zeros(sites, sites);
    for (index, lattice) in lattices.iter().enumerate() {
        if lattice.shape() != shape {
            return Err(IsingError::Config(
                ErrorInfo::new("observations-shape", "observations differ in shape")
                    .with_context("observation", index),
            ));
        }
        let spins = lattice.spins();
        for i in 0..sites {
            spin_sums[i] += spins[i] as i64;
            for j in (i + 1)..sites {
                pair_sums[(i, j)] += (spins[i] * spins[j]) as f64;
            }
        }
    }
    let magnetization = DMatrix::from_fn(shape.rows(), shape.cols(), |r, c| {
        spin_sums[shape.index(r, c)] as f64 / count
    });
    let correlation = DMatrix::from_fn(sites, sites, |i, j| {
        if i == j {
            0.0
        } else {
            pair_sums[(i.min(j), i.max(j))] / count
        }
    });
    Ok(MomentStatistics {
        magnetization,
        correlation,
    })
}

/// Pulls magnetizations that sit numerically at ±1 to `±bound`.
///
/// The result lies strictly inside (-1, 1); anything that cannot be brought
/// there is reported as a numeric degeneracy.
pub fn clamp_magnetization(
    magnetization: &DMatrix<f64>,
    clamp: &ClampConfig,
) -> Result<DMatrix<f64>, IsingError> {
    let tolerance = clamp.atol + clamp.rtol;
    let mut clamped = magnetization.clone();
    let mut adjusted = 0usize;
    if clamp.enabled {
        for value in clamped.iter_mut() {
            if (*value - 1.0).abs() <= tolerance {
                *value = clamp.bound;
                adjusted += 1;
            } else if (*value + 1.0).abs() <= tolerance {
                *value = -clamp.bound;
                adjusted += 1;
            }
        }
    }
    if adjusted > 0 {
        warn!(adjusted, bound = clamp.bound, "clamped saturated target magnetizations");
    }
    if let Some(index) = clamped.iter().position(|v| !(v.abs() < 1.0)) {
        // nalgebra iterates column-major.
        let (row, col) = (index % clamped.nrows(), index / clamped.nrows());
        return Err(IsingError::Numeric(
            ErrorInfo::new(
                "magnetization-saturated",
                "magnetization must lie strictly inside (-1, 1)",
            )
            .with_context("row", row)
            .with_context("col", col)
            .with_context("value", clamped[(row, col)])
            .with_hint("enable solver.clamp to pull saturated sites inside the interval"),
        ));
    }
    Ok(clamped)
}

/// One-body mean-field inverse `h₀ = ½ ln((1 + m) / (1 − m))` with zero couplings.
pub fn initial_params(
    magnetization: &DMatrix<f64>,
    clamp: &ClampConfig,
) -> Result<IsingParams, IsingError> {
    let clamped = clamp_magnetization(magnetization, clamp)?;
    let shape = LatticeShape::new(clamped.nrows(), clamped.ncols())?;
    let fields = clamped.map(|m| 0.5 * ((1.0 + m) / (1.0 - m)).ln());
    Ok(IsingParams {
        fields,
        couplings: DMatrix::zeros(shape.sites(), shape.sites()),
    })
}
