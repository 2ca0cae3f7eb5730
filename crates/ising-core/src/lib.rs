#![deny(missing_docs)]
#![doc = "Core lattice, parameter and error types shared by the inverse Ising crates."]

pub mod errors;
pub mod lattice;
pub mod provenance;
pub mod rng;
mod types;

pub use errors::{ErrorInfo, IsingError};
pub use lattice::{Lattice, LatticeShape, SPIN_DOWN, SPIN_UP};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, RngHandle};
pub use types::{IsingParams, MomentStatistics, TargetSource};
