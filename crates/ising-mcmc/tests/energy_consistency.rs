use ising_core::{IsingParams, Lattice, LatticeShape, RngHandle};
use ising_mcmc::{energy_and_magnetization, MetropolisSampler, SamplerState};
use nalgebra::DMatrix;
use proptest::prelude::*;
use rand::Rng;

fn random_params(shape: LatticeShape, seed: u64) -> IsingParams {
    let mut rng = RngHandle::from_seed(seed);
    let n = shape.sites();
    let fields = DMatrix::from_fn(shape.rows(), shape.cols(), |_, _| rng.gen_range(-1.0..1.0));
    let mut couplings = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in (i + 1)..n {
            let value: f64 = rng.gen_range(-0.5..0.5);
            couplings[(i, j)] = value;
            couplings[(j, i)] = value;
        }
    }
    IsingParams::new(fields, couplings).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn incremental_observables_track_recomputation(
        rows in 1usize..5,
        cols in 1usize..5,
        seed in any::<u64>(),
        temperature in 0.2f64..3.0,
        steps in 1usize..400,
    ) {
        let shape = LatticeShape::new(rows, cols).unwrap();
        let params = random_params(shape, seed);
        let mut rng = RngHandle::from_seed(seed.wrapping_add(1));
        let lattice = Lattice::random(shape, &mut rng);
        let mut state = SamplerState::new(lattice, &params).unwrap();
        let sampler = MetropolisSampler::new(&params, temperature).unwrap();
        sampler.run(&mut state, steps, &mut rng);

        let recomputed = energy_and_magnetization(&state.lattice, &params).unwrap();
        prop_assert!((state.energy - recomputed.energy).abs() < 1e-8);
        prop_assert!((state.magnetization - recomputed.magnetization).abs() < 1e-9);
        prop_assert!((state.magnetization - state.lattice.magnetization()).abs() < 1e-9);
        prop_assert!(state.lattice.spins().iter().all(|&s| s == 1 || s == -1));
    }
}

#[test]
fn each_step_reports_the_energy_change_it_applied() {
    let shape = LatticeShape::new(3, 3).unwrap();
    let params = random_params(shape, 11);
    let mut rng = RngHandle::from_seed(12);
    let mut state = SamplerState::new(Lattice::random(shape, &mut rng), &params).unwrap();
    let sampler = MetropolisSampler::new(&params, 1.0).unwrap();
    for _ in 0..200 {
        let before = state.energy;
        let outcome = sampler.step(&mut state, &mut rng);
        if outcome.accepted {
            assert!((state.energy - before - outcome.delta_energy).abs() < 1e-12);
        } else {
            assert_eq!(state.energy, before);
        }
    }
}
