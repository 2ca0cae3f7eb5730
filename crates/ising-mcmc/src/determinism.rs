use ising_core::derive_substream_seed;

/// Derives the seed of the replica batch sampled during solver iteration `iteration`.
pub fn iteration_seed(master_seed: u64, iteration: usize) -> u64 {
    derive_substream_seed(master_seed, iteration as u64)
}

/// Derives the deterministic seed used for a replica within a batch.
pub fn replica_seed(batch_seed: u64, replica_index: usize) -> u64 {
    derive_substream_seed(batch_seed ^ 0x5A5A_5A5A_5A5A_5A5A, replica_index as u64)
}

/// Derives the seed of one annealing run within a sample batch.
pub fn sample_seed(master_seed: u64, sample_index: usize) -> u64 {
    derive_substream_seed(
        master_seed ^ 0xA5A5_A5A5_A5A5_A5A5,
        (sample_index as u64) << 16 | 0xA11E,
    )
}
