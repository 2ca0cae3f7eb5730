use ising_core::{IsingError, IsingParams, Lattice};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Energy and mean spin of a lattice under fixed parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Observables {
    /// Total energy `E`.
    pub energy: f64,
    /// Mean spin `M`.
    pub magnetization: f64,
}

/// Half-counted coupling contribution of site `(row, col)`:
/// `s(row, col) / 2 · Σ_k J[k, flat(row, col)] · s_k`.
///
/// Summing this over every site counts each unordered pair exactly once.
/// `J` is symmetric, so the contiguous column of the column-major matrix is
/// read instead of its strided row.
#[inline]
pub fn local_coupling_energy(
    lattice: &Lattice,
    row: usize,
    col: usize,
    couplings: &DMatrix<f64>,
) -> f64 {
    let site = lattice.shape().index(row, col);
    let field: f64 = couplings
        .column(site)
        .iter()
        .zip(lattice.spins())
        .map(|(coupling, &spin)| coupling * spin as f64)
        .sum();
    lattice.spin(row, col) as f64 * field / 2.0
}

/// Computes `E = Σ (-h·s - local_coupling_energy)` and `M = mean(s)` from scratch.
pub fn energy_and_magnetization(
    lattice: &Lattice,
    params: &IsingParams,
) -> Result<Observables, IsingError> {
    let shape = lattice.shape();
    params.validate(shape)?;
    let mut energy = 0.0;
    for row in 0..shape.rows() {
        for col in 0..shape.cols() {
            let spin = lattice.spin(row, col) as f64;
            energy += -params.fields[(row, col)] * spin
                - local_coupling_energy(lattice, row, col, &params.couplings);
        }
    }
    Ok(Observables {
        energy,
        magnetization: lattice.magnetization(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ising_core::LatticeShape;

    #[test]
    fn pair_coupling_counted_once() {
        let shape = LatticeShape::new(1, 2).unwrap();
        let lattice = Lattice::from_spins(shape, vec![1, 1]).unwrap();
        let mut params = IsingParams::zeros(shape);
        params.couplings[(0, 1)] = 1.5;
        params.couplings[(1, 0)] = 1.5;
        let obs = energy_and_magnetization(&lattice, &params).unwrap();
        assert!((obs.energy + 1.5).abs() < 1e-12);
        assert_eq!(obs.magnetization, 1.0);
    }

    #[test]
    fn coupling_energy_matches_explicit_pair_sum() {
        let shape = LatticeShape::new(2, 2).unwrap();
        let spins = vec![1, -1, -1, 1];
        let lattice = Lattice::from_spins(shape, spins.clone()).unwrap();
        let mut params = IsingParams::zeros(shape);
        let weights = [
            (0, 1, 0.3),
            (0, 2, -0.7),
            (0, 3, 1.1),
            (1, 2, 0.4),
            (1, 3, -0.2),
            (2, 3, 0.9),
        ];
        for &(i, j, w) in &weights {
            params.couplings[(i, j)] = w;
            params.couplings[(j, i)] = w;
        }
        let expected: f64 = -weights
            .iter()
            .map(|&(i, j, w)| w * (spins[i] * spins[j]) as f64)
            .sum::<f64>();
        let obs = energy_and_magnetization(&lattice, &params).unwrap();
        assert!((obs.energy - expected).abs() < 1e-12);
    }

    #[test]
    fn field_energy_sums_every_site() {
        let shape = LatticeShape::new(2, 2).unwrap();
        let lattice = Lattice::from_spins(shape, vec![1, -1, -1, -1]).unwrap();
        let mut params = IsingParams::zeros(shape);
        params.fields.fill(0.5);
        let obs = energy_and_magnetization(&lattice, &params).unwrap();
        // -0.5 * (1 - 1 - 1 - 1)
        assert!((obs.energy - 1.0).abs() < 1e-12);
        assert_eq!(obs.magnetization, -0.5);
    }

    #[test]
    fn mismatched_parameters_are_rejected() {
        let lattice = Lattice::filled(LatticeShape::new(2, 2).unwrap(), 1).unwrap();
        let params = IsingParams::zeros(LatticeShape::new(2, 3).unwrap());
        assert!(energy_and_magnetization(&lattice, &params)
            .unwrap_err()
            .is_config());
    }
}
