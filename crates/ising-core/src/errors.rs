//! Structured error types shared across the inverse Ising crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`IsingError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (dimensions, offending values, paths).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the inverse Ising engine.
///
/// Non-convergence is deliberately absent: a solver that exhausts its step
/// budget reports that through its outcome, not through this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum IsingError {
    /// Invalid dimensions, budgets, temperatures or schedules. Raised before
    /// any sampling work starts.
    #[error("configuration error: {0}")]
    Config(ErrorInfo),
    /// A magnetization at (or numerically at) ±1 that could not be clamped.
    #[error("numeric degeneracy: {0}")]
    Numeric(ErrorInfo),
    /// Serialization, parsing and filesystem errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl IsingError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            IsingError::Config(info) | IsingError::Numeric(info) | IsingError::Serde(info) => {
                info
            }
        }
    }

    /// Wraps an I/O or parse failure, recording the path it concerned.
    pub fn io(code: &str, err: impl ToString, path: &std::path::Path) -> Self {
        IsingError::Serde(
            ErrorInfo::new(code, err.to_string()).with_context("path", path.display()),
        )
    }

    /// Returns true when the error was raised by configuration validation.
    pub fn is_config(&self) -> bool {
        matches!(self, IsingError::Config(_))
    }
}
