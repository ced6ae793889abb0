#![forbid(unsafe_code)]

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// How many diagnostics to collect for a function before moving on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticPolicy {
    /// Report every violation found in a function.
    #[default]
    Accumulate,
    /// Stop checking a function at its first violation.
    FirstError,
}

/// Whether a `Free` leaf may be read directly off a binding that is
/// currently borrowed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FreeLeafReads {
    /// The root binding must not be frozen at all.
    #[default]
    UnfrozenRoot,
    /// Permitted under a read borrow; a write borrow still forbids it.
    Any,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    pub policy: DiagnosticPolicy,
    /// Check functions on the rayon pool.
    pub parallel: bool,
    pub free_leaf_reads: FreeLeafReads,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            policy: DiagnosticPolicy::Accumulate,
            parallel: true,
            free_leaf_reads: FreeLeafReads::UnfrozenRoot,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    linearity: CheckerConfig,
}

impl CheckerConfig {
    /// Parse the `[linearity]` table of a TOML document. A document without
    /// the table yields the defaults.
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(src).map_err(|e| ConfigError {
            message: format!("invalid linearity config: {e}"),
        })?;
        Ok(file.linearity)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let src = fs::read_to_string(path).map_err(|e| ConfigError {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        Self::from_toml_str(&src)
    }

    pub fn with_policy(mut self, policy: DiagnosticPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_free_leaf_reads(mut self, reads: FreeLeafReads) -> Self {
        self.free_leaf_reads = reads;
        self
    }
}
