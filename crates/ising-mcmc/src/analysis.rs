use std::fs::File;
use std::io::Write;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::anneal::AnnealedSample;

/// One distinct low-temperature configuration and how often it was reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyLevel {
    /// Recomputed energy of the configuration.
    pub energy: f64,
    /// Number of samples that ended in this configuration.
    pub occurrences: usize,
    /// Index of the first sample that reached it.
    pub first_sample: usize,
    /// Mean spin of the configuration.
    pub magnetization: f64,
}

/// Groups samples by final configuration and sorts the groups by energy,
/// lowest first. Ties keep first-seen order.
pub fn energy_histogram(samples: &[AnnealedSample]) -> Vec<EnergyLevel> {
    let mut levels: IndexMap<&[i8], EnergyLevel> = IndexMap::new();
    for sample in samples {
        levels
            .entry(sample.lattice.spins())
            .and_modify(|level| level.occurrences += 1)
            .or_insert_with(|| EnergyLevel {
                energy: sample.recomputed_energy,
                occurrences: 1,
                first_sample: sample.index,
                magnetization: sample.lattice.magnetization(),
            });
    }
    let mut levels: Vec<EnergyLevel> = levels.into_values().collect();
    levels.sort_by(|a, b| a.energy.total_cmp(&b.energy));
    levels
}

/// Writes the histogram as `energy,occurrences,first_sample,magnetization` CSV.
pub fn write_histogram_csv(path: &Path, levels: &[EnergyLevel]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    writeln!(file, "energy,occurrences,first_sample,magnetization")?;
    for level in levels {
        writeln!(
            file,
            "{:.12e},{},{},{:.6}",
            level.energy, level.occurrences, level.first_sample, level.magnetization
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::SweepStats;
    use ising_core::{Lattice, LatticeShape};

    fn sample(index: usize, spins: Vec<i8>, energy: f64) -> AnnealedSample {
        let shape = LatticeShape::new(1, spins.len()).unwrap();
        AnnealedSample {
            index,
            lattice: Lattice::from_spins(shape, spins).unwrap(),
            energy,
            recomputed_energy: energy,
            magnetization: 0.0,
            stats: SweepStats::default(),
        }
    }

    #[test]
    fn duplicates_collapse_and_sort_by_energy() {
        let samples = vec![
            sample(0, vec![1, 1], -1.0),
            sample(1, vec![-1, -1], -3.0),
            sample(2, vec![1, 1], -1.0),
        ];
        let levels = energy_histogram(&samples);
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].energy, -3.0);
        assert_eq!(levels[0].first_sample, 1);
        assert_eq!(levels[1].occurrences, 2);
        assert_eq!(levels[1].magnetization, 1.0);
    }
}
