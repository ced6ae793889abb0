#![forbid(unsafe_code)]

//! Linearity and borrow checking for the tether IR.
//!
//! Values of `Linear` types must be consumed exactly once on every path;
//! borrows suspend that obligation for the lexical extent of a region.

mod checker;
mod config;
mod diagnostics;
mod env;
mod error;
mod events;
mod expr;
mod flow;
mod region;
mod universe;

pub use checker::{CheckReport, LinearityChecker};
pub use config::{CheckerConfig, DiagnosticPolicy, FreeLeafReads};
pub use diagnostics::{DiagnosticReporter, LinearityError, ViolationKind};
pub use env::{Binding, BindingId, BindingState, Environment};
pub use error::{CheckFailure, ConfigError};
pub use events::{BindingFate, FunctionSummary, UsageEvent};
pub use region::{Reference, RegionFrame, RegionKind, RegionStack};
pub use universe::{ParamKinds, TypeTable, param_kinds};
