//! Spin lattice and the row-major linear index map.

use nalgebra::DMatrix;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, IsingError};

/// Spin value pointing up.
pub const SPIN_UP: i8 = 1;
/// Spin value pointing down.
pub const SPIN_DOWN: i8 = -1;

/// Dimensions of an R×C lattice together with its linear index map.
///
/// Site `(row, col)` maps to `row * cols + col`. Every flattened
/// representation in the workspace (coupling rows, correlation matrices,
/// observed configurations) uses this ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ShapeRepr")]
pub struct LatticeShape {
    rows: usize,
    cols: usize,
}

#[derive(Deserialize)]
struct ShapeRepr {
    rows: usize,
    cols: usize,
}

impl TryFrom<ShapeRepr> for LatticeShape {
    type Error = IsingError;

    fn try_from(repr: ShapeRepr) -> Result<Self, Self::Error> {
        LatticeShape::new(repr.rows, repr.cols)
    }
}

impl LatticeShape {
    /// Creates a shape, rejecting empty dimensions.
    pub fn new(rows: usize, cols: usize) -> Result<Self, IsingError> {
        if rows == 0 || cols == 0 {
            return Err(IsingError::Config(
                ErrorInfo::new("lattice-dimensions", "lattice dimensions must be positive")
                    .with_context("rows", rows)
                    .with_context("cols", cols),
            ));
        }
        Ok(Self { rows, cols })
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Total number of sites, `R·C`.
    pub fn sites(&self) -> usize {
        self.rows * self.cols
    }

    /// Flat index of site `(row, col)`.
    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        debug_assert!(row < self.rows && col < self.cols);
        row * self.cols + col
    }

    /// Inverse of [`LatticeShape::index`].
    #[inline]
    pub fn coords(&self, index: usize) -> (usize, usize) {
        (index / self.cols, index % self.cols)
    }
}

/// An R×C grid of ±1 spins stored in row-major order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "LatticeRepr")]
pub struct Lattice {
    shape: LatticeShape,
    spins: Vec<i8>,
}

#[derive(Deserialize)]
struct LatticeRepr {
    shape: LatticeShape,
    spins: Vec<i8>,
}

impl TryFrom<LatticeRepr> for Lattice {
    type Error = IsingError;

    fn try_from(repr: LatticeRepr) -> Result<Self, Self::Error> {
        Lattice::from_spins(repr.shape, repr.spins)
    }
}

impl Lattice {
    /// Creates a lattice with every site set to `spin`.
    pub fn filled(shape: LatticeShape, spin: i8) -> Result<Self, IsingError> {
        check_spin(spin, 0)?;
        Ok(Self {
            shape,
            spins: vec![spin; shape.sites()],
        })
    }

    /// Draws every spin independently and uniformly from {-1, +1}.
    pub fn random<R: Rng + ?Sized>(shape: LatticeShape, rng: &mut R) -> Self {
        let spins = (0..shape.sites())
            .map(|_| if rng.gen::<bool>() { SPIN_UP } else { SPIN_DOWN })
            .collect();
        Self { shape, spins }
    }

    /// Builds a lattice from a row-major spin vector.
    pub fn from_spins(shape: LatticeShape, spins: Vec<i8>) -> Result<Self, IsingError> {
        if spins.len() != shape.sites() {
            return Err(IsingError::Config(
                ErrorInfo::new("lattice-length", "spin vector does not match lattice size")
                    .with_context("expected", shape.sites())
                    .with_context("actual", spins.len()),
            ));
        }
        for (index, &spin) in spins.iter().enumerate() {
            check_spin(spin, index)?;
        }
        Ok(Self { shape, spins })
    }

    /// Builds a lattice from nested rows, all of equal length.
    pub fn from_rows(rows: &[Vec<i8>]) -> Result<Self, IsingError> {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        let shape = LatticeShape::new(rows.len(), cols)?;
        if let Some((row, values)) = rows.iter().enumerate().find(|(_, r)| r.len() != cols) {
            return Err(IsingError::Config(
                ErrorInfo::new("lattice-ragged", "rows have different lengths")
                    .with_context("row", row)
                    .with_context("length", values.len())
                    .with_context("expected", cols),
            ));
        }
        Self::from_spins(shape, rows.concat())
    }

    /// Lattice dimensions.
    pub fn shape(&self) -> LatticeShape {
        self.shape
    }

    /// Spin at `(row, col)`.
    #[inline]
    pub fn spin(&self, row: usize, col: usize) -> i8 {
        self.spins[self.shape.index(row, col)]
    }

    /// Flattened row-major spins.
    pub fn spins(&self) -> &[i8] {
        &self.spins
    }

    /// Negates the spin at `(row, col)` and returns its new value.
    #[inline]
    pub fn flip(&mut self, row: usize, col: usize) -> i8 {
        let index = self.shape.index(row, col);
        self.spins[index] = -self.spins[index];
        self.spins[index]
    }

    /// Mean spin over all sites.
    pub fn magnetization(&self) -> f64 {
        let total: i64 = self.spins.iter().map(|&s| s as i64).sum();
        total as f64 / self.shape.sites() as f64
    }

    /// Converts the lattice to an R×C real matrix.
    pub fn to_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.shape.rows, self.shape.cols, |r, c| self.spin(r, c) as f64)
    }
}

fn check_spin(spin: i8, index: usize) -> Result<(), IsingError> {
    if spin == SPIN_UP || spin == SPIN_DOWN {
        Ok(())
    } else {
        Err(IsingError::Config(
            ErrorInfo::new("spin-value", "spins must be exactly -1 or +1")
                .with_context("index", index)
                .with_context("value", spin),
        ))
    }
}
