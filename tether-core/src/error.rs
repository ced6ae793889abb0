#![forbid(unsafe_code)]

use miette::Diagnostic;
use thiserror::Error;

use crate::diagnostics::LinearityError;

/// A module failed the linearity check.
///
/// Diagnostics are grouped by function in module order and sorted by source
/// position within each function.
#[derive(Debug, Error, Diagnostic)]
#[error("linearity check failed with {} error(s)", .diagnostics.len())]
#[diagnostic(code(tether::linear))]
pub struct CheckFailure {
    #[related]
    pub diagnostics: Vec<LinearityError>,
}

impl CheckFailure {
    pub fn new(diagnostics: Vec<LinearityError>) -> Self {
        Self { diagnostics }
    }
}

#[derive(Debug, Error, Diagnostic)]
#[error("config error: {message}")]
#[diagnostic(code(tether::config))]
pub struct ConfigError {
    pub message: String,
}
