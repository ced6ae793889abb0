//! Linearity Diagnostics
//!
//! Every finding of the checker is a contract violation: there are no
//! warnings, and every diagnostic is fatal to the compilation unit. Each
//! category carries the binding (or type) it concerns and labelled spans
//! pointing at the relevant source positions.

use miette::Diagnostic;
use tether_ir::Span;
use thiserror::Error;

#[derive(Clone, Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum LinearityError {
    #[error("linear binding '{name}' of type '{ty}' is never consumed")]
    #[diagnostic(
        code(tether::linear::unconsumed_binding),
        help("pass the value to a function that consumes it, or return it")
    )]
    UnconsumedBinding {
        name: String,
        ty: String,
        #[label("defined here")]
        defined_at: Span,
        #[label("still unconsumed when the scope ends here")]
        scope_end: Span,
    },

    #[error("linear binding '{name}' is consumed more than once")]
    #[diagnostic(
        code(tether::linear::double_consumption),
        help("a linear value can be used exactly once; borrow it with `&` to read it without consuming it")
    )]
    DoubleConsumption {
        name: String,
        #[label("first used here")]
        first_use: Span,
        #[label("used again here")]
        second_use: Span,
    },

    #[error("linear binding '{name}' is consumed in some branches but not in others")]
    #[diagnostic(
        code(tether::linear::inconsistent_branch_consumption),
        help("consume the binding in every branch, or in none of them")
    )]
    InconsistentBranchConsumption {
        name: String,
        #[label(collection, "consumed in this branch")]
        consumed_in: Vec<Span>,
        #[label(collection, "not consumed in this branch")]
        not_consumed_in: Vec<Span>,
    },

    #[error("linear binding '{name}' is used inside a loop it was not defined in")]
    #[diagnostic(
        code(tether::linear::linear_in_loop_body),
        help("the loop may run any number of times; move the use out of the loop or borrow before entering it")
    )]
    LinearInLoopBody {
        name: String,
        #[label("used inside the loop")]
        used_at: Span,
        #[label("defined outside the loop")]
        defined_at: Span,
    },

    #[error("value of linear type '{ty}' is discarded")]
    #[diagnostic(
        code(tether::linear::illegal_discard),
        help("linear values cannot be silently dropped; bind the value and consume it")
    )]
    IllegalDiscard {
        /// The variable the value came from, when there is one.
        name: Option<String>,
        ty: String,
        #[label("dropped here")]
        at: Span,
    },

    #[error("region '{region}' is not in scope")]
    #[diagnostic(
        code(tether::linear::escaping_region),
        help("references cannot outlive the `borrow` block or statement that created them")
    )]
    EscapingRegion {
        /// The binding or variable whose type names the region, when known.
        name: Option<String>,
        region: String,
        #[label("reference used outside its region")]
        at: Span,
    },

    #[error("'{name}' is already borrowed")]
    #[diagnostic(
        code(tether::linear::conflicting_borrow),
        help("a borrowed binding cannot be consumed, read directly, or borrowed again until its region closes")
    )]
    ConflictingBorrow {
        name: String,
        #[label("prior borrow")]
        prior_borrow: Span,
        #[label("conflicting use")]
        at: Span,
    },

    #[error("linear binding '{name}' is used after it was consumed")]
    #[diagnostic(code(tether::linear::use_after_consume))]
    UseAfterConsume {
        name: String,
        #[label("consumed here")]
        consumed_at: Span,
        #[label("used here")]
        used_at: Span,
    },

    #[error("cannot dereference a reference to linear type '{ty}'")]
    #[diagnostic(
        code(tether::linear::linear_dereference),
        help("dereferencing copies the referent; only references to Free values can be dereferenced")
    )]
    LinearDereference {
        ty: String,
        #[label("dereferenced here")]
        at: Span,
    },

    #[error("path through '{name}' ends in a value of linear type '{ty}'")]
    #[diagnostic(
        code(tether::linear::linear_path_leaf),
        help("destructure the record to take ownership of its linear fields")
    )]
    LinearPathLeaf {
        name: String,
        ty: String,
        #[label("this path would copy a linear value")]
        at: Span,
    },

    #[error("cannot write through read reference '{name}'")]
    #[diagnostic(code(tether::linear::write_through_read_reference))]
    WriteThroughReadReference {
        name: String,
        #[label("assigned here")]
        at: Span,
    },

    #[error("type '{type_name}' is declared Free but field '{field}' has linear type '{field_ty}'")]
    #[diagnostic(
        code(tether::linear::free_type_contains_linear),
        help("declare the type Linear, or Type to decide per instantiation")
    )]
    FreeTypeContainsLinear {
        type_name: String,
        field: String,
        field_ty: String,
        #[label("declared Free")]
        declared_at: Span,
        #[label("linear field")]
        field_at: Span,
    },
}

/// Violation category, independent of the data each diagnostic carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    UnconsumedBinding,
    DoubleConsumption,
    InconsistentBranchConsumption,
    LinearInLoopBody,
    IllegalDiscard,
    EscapingRegion,
    ConflictingBorrow,
    UseAfterConsume,
    LinearDereference,
    LinearPathLeaf,
    WriteThroughReadReference,
    FreeTypeContainsLinear,
}

impl LinearityError {
    pub fn kind(&self) -> ViolationKind {
        match self {
            LinearityError::UnconsumedBinding { .. } => ViolationKind::UnconsumedBinding,
            LinearityError::DoubleConsumption { .. } => ViolationKind::DoubleConsumption,
            LinearityError::InconsistentBranchConsumption { .. } => {
                ViolationKind::InconsistentBranchConsumption
            }
            LinearityError::LinearInLoopBody { .. } => ViolationKind::LinearInLoopBody,
            LinearityError::IllegalDiscard { .. } => ViolationKind::IllegalDiscard,
            LinearityError::EscapingRegion { .. } => ViolationKind::EscapingRegion,
            LinearityError::ConflictingBorrow { .. } => ViolationKind::ConflictingBorrow,
            LinearityError::UseAfterConsume { .. } => ViolationKind::UseAfterConsume,
            LinearityError::LinearDereference { .. } => ViolationKind::LinearDereference,
            LinearityError::LinearPathLeaf { .. } => ViolationKind::LinearPathLeaf,
            LinearityError::WriteThroughReadReference { .. } => {
                ViolationKind::WriteThroughReadReference
            }
            LinearityError::FreeTypeContainsLinear { .. } => ViolationKind::FreeTypeContainsLinear,
        }
    }

    /// The binding, region, or type the diagnostic is about.
    pub fn subject(&self) -> &str {
        match self {
            LinearityError::UnconsumedBinding { name, .. }
            | LinearityError::DoubleConsumption { name, .. }
            | LinearityError::InconsistentBranchConsumption { name, .. }
            | LinearityError::LinearInLoopBody { name, .. }
            | LinearityError::ConflictingBorrow { name, .. }
            | LinearityError::UseAfterConsume { name, .. }
            | LinearityError::LinearPathLeaf { name, .. }
            | LinearityError::WriteThroughReadReference { name, .. } => name,
            LinearityError::IllegalDiscard { ty, .. }
            | LinearityError::LinearDereference { ty, .. } => ty,
            LinearityError::EscapingRegion { region, .. } => region,
            LinearityError::FreeTypeContainsLinear { type_name, .. } => type_name,
        }
    }

    /// The binding the diagnostic concerns. Discards and region escapes of
    /// a temporary have none.
    pub fn binding(&self) -> Option<&str> {
        match self {
            LinearityError::IllegalDiscard { name, .. }
            | LinearityError::EscapingRegion { name, .. } => name.as_deref(),
            LinearityError::LinearDereference { .. }
            | LinearityError::FreeTypeContainsLinear { .. } => None,
            other => Some(other.subject()),
        }
    }

    /// Where the violation happens; used to order diagnostics.
    pub fn primary_span(&self) -> Span {
        match self {
            LinearityError::UnconsumedBinding { scope_end, .. } => *scope_end,
            LinearityError::DoubleConsumption { second_use, .. } => *second_use,
            LinearityError::InconsistentBranchConsumption {
                consumed_in,
                not_consumed_in,
                ..
            } => consumed_in
                .iter()
                .chain(not_consumed_in.iter())
                .copied()
                .min_by_key(|s| s.offset())
                .unwrap_or_else(|| tether_ir::span(0, 0)),
            LinearityError::LinearInLoopBody { used_at, .. } => *used_at,
            LinearityError::IllegalDiscard { at, .. }
            | LinearityError::EscapingRegion { at, .. }
            | LinearityError::ConflictingBorrow { at, .. }
            | LinearityError::LinearDereference { at, .. }
            | LinearityError::LinearPathLeaf { at, .. }
            | LinearityError::WriteThroughReadReference { at, .. } => *at,
            LinearityError::UseAfterConsume { used_at, .. } => *used_at,
            LinearityError::FreeTypeContainsLinear { field_at, .. } => *field_at,
        }
    }
}

/// Collects diagnostics for one unit of analysis.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticReporter {
    diagnostics: Vec<LinearityError>,
}

impl DiagnosticReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, diagnostic: LinearityError) {
        self.diagnostics.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Diagnostics ordered by source position; ties keep discovery order.
    pub fn into_sorted(mut self) -> Vec<LinearityError> {
        self.diagnostics.sort_by_key(|d| d.primary_span().offset());
        self.diagnostics
    }

    /// Plain-text listing, one diagnostic per line.
    pub fn report(&self) -> String {
        let mut output = String::new();
        for diag in &self.diagnostics {
            let at = diag.primary_span();
            output.push_str(&format!("error[{:?}] at {}: {}\n", diag.kind(), at.offset(), diag));
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_ir::span;

    fn double(first: usize, second: usize) -> LinearityError {
        LinearityError::DoubleConsumption {
            name: "f".to_string(),
            first_use: span(first, 1),
            second_use: span(second, 1),
        }
    }

    #[test]
    fn messages_name_the_binding() {
        let diag = double(1, 5);
        assert_eq!(diag.to_string(), "linear binding 'f' is consumed more than once");
        assert_eq!(diag.subject(), "f");
        assert_eq!(diag.kind(), ViolationKind::DoubleConsumption);
    }

    #[test]
    fn diagnostic_codes_are_namespaced() {
        let diag = LinearityError::IllegalDiscard {
            name: None,
            ty: "File".to_string(),
            at: span(3, 1),
        };
        let code = diag.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("tether::linear::illegal_discard"));
    }

    #[test]
    fn reporter_sorts_by_position() {
        let mut reporter = DiagnosticReporter::new();
        assert!(reporter.is_empty());
        reporter.add(double(10, 20));
        reporter.add(double(1, 2));
        assert!(reporter.has_errors());
        assert_eq!(reporter.len(), 2);
        let sorted = reporter.into_sorted();
        assert_eq!(sorted[0].primary_span().offset(), 2);
        assert_eq!(sorted[1].primary_span().offset(), 20);
    }

    #[test]
    fn branch_diagnostic_points_at_earliest_branch() {
        let diag = LinearityError::InconsistentBranchConsumption {
            name: "f".to_string(),
            consumed_in: vec![span(8, 1)],
            not_consumed_in: vec![span(4, 1)],
        };
        assert_eq!(diag.primary_span().offset(), 4);
    }

    #[test]
    fn binding_is_known_only_for_named_values() {
        let named = LinearityError::EscapingRegion {
            name: Some("r".to_string()),
            region: "R".to_string(),
            at: span(2, 1),
        };
        assert_eq!(named.subject(), "R");
        assert_eq!(named.binding(), Some("r"));

        let temporary = LinearityError::IllegalDiscard {
            name: None,
            ty: "File".to_string(),
            at: span(3, 1),
        };
        assert_eq!(temporary.binding(), None);
        assert_eq!(double(1, 2).binding(), Some("f"));
    }

    #[test]
    fn report_lists_each_diagnostic() {
        let mut reporter = DiagnosticReporter::new();
        reporter.add(double(1, 2));
        let text = reporter.report();
        assert!(text.contains("DoubleConsumption"));
        assert!(text.contains("'f'"));
    }
}
