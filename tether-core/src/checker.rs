#![forbid(unsafe_code)]

use rayon::prelude::*;
use tether_ir::{Function, Module};
use tracing::{debug, debug_span};

use crate::config::CheckerConfig;
use crate::diagnostics::LinearityError;
use crate::error::CheckFailure;
use crate::events::FunctionSummary;
use crate::flow::FlowChecker;
use crate::universe::TypeTable;

/// Result of checking a module that passed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckReport {
    /// One summary per function, in module order.
    pub functions: Vec<FunctionSummary>,
}

impl CheckReport {
    pub fn function(&self, name: &str) -> Option<&FunctionSummary> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// Linearity and borrow checker for a typed module.
///
/// Functions are independent units: each is checked against the shared
/// type table with its own environment and region stack.
#[derive(Clone, Debug, Default)]
pub struct LinearityChecker {
    config: CheckerConfig,
}

impl LinearityChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CheckerConfig) -> Self {
        Self { config }
    }

    pub fn check_module(&self, module: &Module) -> Result<CheckReport, CheckFailure> {
        let _span = debug_span!("check_module", functions = module.functions.len()).entered();

        // Type definitions first; function bodies assume a well-formed table.
        let table = TypeTable::new(&module.types);
        let mut definition_errors = table.validate(&module.types);
        if !definition_errors.is_empty() {
            definition_errors.sort_by_key(|d| d.primary_span().offset());
            debug!(errors = definition_errors.len(), "type definitions rejected");
            return Err(CheckFailure::new(definition_errors));
        }

        let results: Vec<Result<FunctionSummary, Vec<LinearityError>>> = if self.config.parallel {
            module
                .functions
                .par_iter()
                .map(|f| self.check_function(&table, f))
                .collect()
        } else {
            module
                .functions
                .iter()
                .map(|f| self.check_function(&table, f))
                .collect()
        };

        let mut functions = Vec::with_capacity(results.len());
        let mut diagnostics = Vec::new();
        for result in results {
            match result {
                Ok(summary) => functions.push(summary),
                Err(errors) => diagnostics.extend(errors),
            }
        }

        if diagnostics.is_empty() {
            Ok(CheckReport { functions })
        } else {
            Err(CheckFailure::new(diagnostics))
        }
    }

    /// Check one function body. On failure the diagnostics are ordered by
    /// source position.
    pub fn check_function(
        &self,
        table: &TypeTable<'_>,
        function: &Function,
    ) -> Result<FunctionSummary, Vec<LinearityError>> {
        let _span = debug_span!("check_function", name = %function.name.node).entered();

        let (events, reporter) = FlowChecker::new(table, &self.config).check_function(function);
        if reporter.has_errors() {
            debug!(errors = reporter.len(), "function rejected");
            return Err(reporter.into_sorted());
        }
        debug!("function accepted");
        Ok(FunctionSummary {
            name: function.name.node.clone(),
            events: events.into_events(),
        })
    }
}
