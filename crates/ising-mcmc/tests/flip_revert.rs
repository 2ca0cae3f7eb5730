use ising_core::{IsingParams, Lattice, LatticeShape, RngHandle, SPIN_UP};
use ising_mcmc::{MetropolisSampler, SamplerState};
use nalgebra::DMatrix;

#[test]
fn uphill_flips_are_reverted_at_low_temperature() {
    let shape = LatticeShape::new(3, 2).unwrap();
    let params = IsingParams::new(
        DMatrix::from_element(3, 2, 10.0),
        DMatrix::zeros(shape.sites(), shape.sites()),
    )
    .unwrap();
    let lattice = Lattice::filled(shape, SPIN_UP).unwrap();
    let mut state = SamplerState::new(lattice.clone(), &params).unwrap();
    let initial = state.clone();
    let sampler = MetropolisSampler::new(&params, 1e-3).unwrap();
    let mut rng = RngHandle::from_seed(99);

    for _ in 0..500 {
        let outcome = sampler.step(&mut state, &mut rng);
        assert!(!outcome.accepted);
        assert!((outcome.delta_energy - 20.0).abs() < 1e-12);
    }
    assert_eq!(state, initial);
    assert_eq!(state.lattice, lattice);
}

#[test]
fn downhill_flips_are_always_accepted() {
    let shape = LatticeShape::new(2, 2).unwrap();
    let params = IsingParams::new(DMatrix::from_element(2, 2, 1.0), DMatrix::zeros(4, 4)).unwrap();
    let lattice = Lattice::filled(shape, -1).unwrap();
    let mut state = SamplerState::new(lattice, &params).unwrap();
    let sampler = MetropolisSampler::new(&params, 1e-3).unwrap();
    let mut rng = RngHandle::from_seed(3);

    let outcome = sampler.step(&mut state, &mut rng);
    assert!(outcome.accepted);
    assert!((outcome.delta_energy + 2.0).abs() < 1e-12);
    assert_eq!(state.lattice.spin(outcome.row, outcome.col), SPIN_UP);
    assert!((state.magnetization + 0.5).abs() < 1e-12);
}

#[test]
fn non_positive_temperature_is_rejected() {
    let params = IsingParams::zeros(LatticeShape::new(1, 1).unwrap());
    for temperature in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        let err = MetropolisSampler::new(&params, temperature).unwrap_err();
        assert!(err.is_config());
    }
}
