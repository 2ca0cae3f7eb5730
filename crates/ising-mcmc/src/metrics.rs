use std::fs::File;
use std::io::Write;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use ising_core::errors::ErrorInfo;
use ising_core::IsingError;
use serde::{Deserialize, Serialize};

/// Residual norms recorded after one solver iteration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ConvergenceRecord {
    /// One-based iteration index.
    #[serde(rename = "step")]
    pub iteration: usize,
    /// `Σ |M* − M_sampled|`.
    pub tol1: f64,
    /// `½ Σ |C* − Corr_sampled|`.
    pub tol2: f64,
}

/// Append-only log of solver iterations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConvergenceLog {
    records: Vec<ConvergenceRecord>,
}

impl ConvergenceLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record. Records are never modified afterwards.
    pub fn push(&mut self, record: ConvergenceRecord) {
        self.records.push(record);
    }

    /// Ordered records.
    pub fn records(&self) -> &[ConvergenceRecord] {
        &self.records
    }

    /// Most recent record.
    pub fn last(&self) -> Option<&ConvergenceRecord> {
        self.records.last()
    }

    /// Number of recorded iterations.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no iteration has been recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Writes the log as `step,tol1,tol2` CSV.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let mut file = File::create(path)?;
        writeln!(file, "step,tol1,tol2")?;
        for record in &self.records {
            writeln!(
                file,
                "{},{:.12e},{:.12e}",
                record.iteration, record.tol1, record.tol2
            )?;
        }
        Ok(())
    }

    /// Reads a log previously written by [`ConvergenceLog::write_csv`].
    ///
    /// Rows must carry exactly the `step,tol1,tol2` columns.
    pub fn read_csv(path: &Path) -> Result<Self, IsingError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_path(path)
            .map_err(|err| wrap_csv("convergence-read", err, path))?;
        let mut log = Self::new();
        for result in reader.deserialize() {
            let record: ConvergenceRecord =
                result.map_err(|err| wrap_csv("convergence-parse", err, path))?;
            log.push(record);
        }
        Ok(log)
    }
}

fn wrap_csv(code: &str, err: csv::Error, path: &Path) -> IsingError {
    IsingError::Serde(
        ErrorInfo::new(code, "convergence CSV failure")
            .with_context("path", path.display())
            .with_hint(err.to_string()),
    )
}
