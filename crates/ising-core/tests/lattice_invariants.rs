use ising_core::{Lattice, LatticeShape, RngHandle};
use proptest::prelude::*;

proptest! {
    #[test]
    fn random_lattices_hold_only_unit_spins(seed in any::<u64>(), rows in 1usize..8, cols in 1usize..8) {
        let shape = LatticeShape::new(rows, cols).unwrap();
        let mut rng = RngHandle::from_seed(seed);
        let lattice = Lattice::random(shape, &mut rng);
        prop_assert_eq!(lattice.spins().len(), rows * cols);
        prop_assert!(lattice.spins().iter().all(|&s| s == 1 || s == -1));
        let matrix = lattice.to_matrix();
        for r in 0..rows {
            for c in 0..cols {
                prop_assert_eq!(matrix[(r, c)], lattice.spins()[shape.index(r, c)] as f64);
            }
        }
    }

    #[test]
    fn flip_sequences_preserve_unit_spins(seed in any::<u64>(), flips in proptest::collection::vec((0usize..5, 0usize..4), 0..64)) {
        let shape = LatticeShape::new(5, 4).unwrap();
        let mut rng = RngHandle::from_seed(seed);
        let mut lattice = Lattice::random(shape, &mut rng);
        for (r, c) in flips {
            let before = lattice.spin(r, c);
            let after = lattice.flip(r, c);
            prop_assert_eq!(after, -before);
            prop_assert!(lattice.spins().iter().all(|&s| s == 1 || s == -1));
        }
    }
}
