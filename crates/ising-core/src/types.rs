use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, IsingError};
use crate::lattice::LatticeShape;

const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// Parameters of the pairwise field: per-site fields `h` and couplings `J`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsingParams {
    /// R×C external field, one bias per site.
    pub fields: DMatrix<f64>,
    /// (R·C)×(R·C) symmetric coupling matrix with a zero diagonal.
    pub couplings: DMatrix<f64>,
}

impl IsingParams {
    /// Zero fields and zero couplings for the given lattice.
    pub fn zeros(shape: LatticeShape) -> Self {
        Self {
            fields: DMatrix::zeros(shape.rows(), shape.cols()),
            couplings: DMatrix::zeros(shape.sites(), shape.sites()),
        }
    }

    /// Builds a parameter pair and validates it against its own field shape.
    pub fn new(fields: DMatrix<f64>, couplings: DMatrix<f64>) -> Result<Self, IsingError> {
        let params = Self { fields, couplings };
        let shape = LatticeShape::new(params.fields.nrows(), params.fields.ncols())?;
        params.validate(shape)?;
        Ok(params)
    }

    /// Lattice shape implied by the field matrix.
    pub fn shape(&self) -> Result<LatticeShape, IsingError> {
        LatticeShape::new(self.fields.nrows(), self.fields.ncols())
    }

    /// Checks dimensions, finiteness, symmetry and the zero coupling diagonal.
    pub fn validate(&self, shape: LatticeShape) -> Result<(), IsingError> {
        check_dims("fields", &self.fields, shape.rows(), shape.cols())?;
        check_dims("couplings", &self.couplings, shape.sites(), shape.sites())?;
        check_finite("fields", &self.fields)?;
        check_finite("couplings", &self.couplings)?;
        check_pair_matrix("couplings", &self.couplings)
    }
}

/// First and second moments of a spin ensemble.
///
/// Used both for the immutable targets handed to the solver and for the
/// per-iteration sampled estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentStatistics {
    /// R×C average spin per site.
    pub magnetization: DMatrix<f64>,
    /// (R·C)×(R·C) average pairwise spin product, zero diagonal.
    pub correlation: DMatrix<f64>,
}

impl MomentStatistics {
    /// All-zero statistics for the given lattice.
    pub fn zeros(shape: LatticeShape) -> Self {
        Self {
            magnetization: DMatrix::zeros(shape.rows(), shape.cols()),
            correlation: DMatrix::zeros(shape.sites(), shape.sites()),
        }
    }

    /// Lattice shape implied by the magnetization matrix.
    pub fn shape(&self) -> Result<LatticeShape, IsingError> {
        LatticeShape::new(self.magnetization.nrows(), self.magnetization.ncols())
    }

    /// Checks dimensions, value ranges, symmetry and the zero diagonal.
    pub fn validate(&self, shape: LatticeShape) -> Result<(), IsingError> {
        check_dims("magnetization", &self.magnetization, shape.rows(), shape.cols())?;
        check_dims("correlation", &self.correlation, shape.sites(), shape.sites())?;
        check_finite("magnetization", &self.magnetization)?;
        check_finite("correlation", &self.correlation)?;
        for (name, matrix) in [
            ("magnetization", &self.magnetization),
            ("correlation", &self.correlation),
        ] {
            if let Some(value) = matrix.iter().find(|v| v.abs() > 1.0 + SYMMETRY_TOLERANCE) {
                return Err(IsingError::Config(
                    ErrorInfo::new("moment-range", "spin moments must lie in [-1, 1]")
                        .with_context("matrix", name)
                        .with_context("value", value),
                ));
            }
        }
        check_pair_matrix("correlation", &self.correlation)
    }
}

/// Supplies target statistics to the solver.
///
/// Implemented by whatever prepares the observed data: precomputed statistics
/// loaded from disk, or raw observed configurations reduced on demand.
pub trait TargetSource {
    /// Returns validated target statistics in row-major site order.
    fn target_statistics(&self) -> Result<MomentStatistics, IsingError>;
}

impl TargetSource for MomentStatistics {
    fn target_statistics(&self) -> Result<MomentStatistics, IsingError> {
        self.validate(self.shape()?)?;
        Ok(self.clone())
    }
}

fn check_dims(
    name: &str,
    matrix: &DMatrix<f64>,
    rows: usize,
    cols: usize,
) -> Result<(), IsingError> {
    if matrix.nrows() != rows || matrix.ncols() != cols {
        return Err(IsingError::Config(
            ErrorInfo::new("matrix-shape", "matrix dimensions do not match the lattice")
                .with_context("matrix", name)
                .with_context("expected", format!("{rows}x{cols}"))
                .with_context("actual", format!("{}x{}", matrix.nrows(), matrix.ncols())),
        ));
    }
    Ok(())
}

fn check_finite(name: &str, matrix: &DMatrix<f64>) -> Result<(), IsingError> {
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(IsingError::Config(
            ErrorInfo::new("matrix-non-finite", "matrix contains NaN or infinite entries")
                .with_context("matrix", name),
        ));
    }
    Ok(())
}

fn check_pair_matrix(name: &str, matrix: &DMatrix<f64>) -> Result<(), IsingError> {
    let n = matrix.nrows();
    for i in 0..n {
        if matrix[(i, i)] != 0.0 {
            return Err(IsingError::Config(
                ErrorInfo::new("pair-diagonal", "pair matrix diagonal must be exactly zero")
                    .with_context("matrix", name)
                    .with_context("index", i)
                    .with_context("value", matrix[(i, i)]),
            ));
        }
        for j in (i + 1)..n {
            if (matrix[(i, j)] - matrix[(j, i)]).abs() > SYMMETRY_TOLERANCE {
                return Err(IsingError::Config(
                    ErrorInfo::new("pair-symmetry", "pair matrix must be symmetric")
                        .with_context("matrix", name)
                        .with_context("i", i)
                        .with_context("j", j),
                ));
            }
        }
    }
    Ok(())
}
