//! Borrow/Region Manager
//!
//! Regions are lexical: a stack of named frames pushed and popped with the
//! construct that introduced them. A region name that is not on the stack is
//! simply undefined, which is how references are kept from escaping.

use tether_ir::{RefKind, Span};

use crate::diagnostics::LinearityError;
use crate::env::BindingId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionKind {
    /// `Region`-kinded parameter of the function being checked.
    Function,
    /// Named by a `borrow .. in R do .. end` block.
    Explicit,
    /// Opened by `&x` / `&!x`; closes at the end of the statement.
    Statement,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reference {
    pub kind: RefKind,
    pub binding: BindingId,
    pub at: Span,
    /// Whether this reference froze the referent (only the first of several
    /// shared reads does).
    pub froze: bool,
}

#[derive(Clone, Debug)]
pub struct RegionFrame {
    pub name: String,
    pub kind: RegionKind,
    pub opened_at: Span,
    pub references: Vec<Reference>,
}

#[derive(Clone, Debug, Default)]
pub struct RegionStack {
    frames: Vec<RegionFrame>,
}

impl RegionStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn open(&mut self, name: &str, kind: RegionKind, at: Span) -> Result<(), LinearityError> {
        if let Some(prior) = self.get(name) {
            return Err(LinearityError::ConflictingBorrow {
                name: name.to_string(),
                prior_borrow: prior.opened_at,
                at,
            });
        }
        self.frames.push(RegionFrame {
            name: name.to_string(),
            kind,
            opened_at: at,
            references: Vec::new(),
        });
        Ok(())
    }

    /// Close the innermost region.
    pub fn close(&mut self) -> Option<RegionFrame> {
        self.frames.pop()
    }

    pub fn get(&self, name: &str) -> Option<&RegionFrame> {
        self.frames.iter().rev().find(|f| f.name == name)
    }

    pub fn is_live(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Stack index of a live region; smaller means longer-lived.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.frames.iter().rposition(|f| f.name == name)
    }

    pub fn is_function_region(&self, name: &str) -> bool {
        self.get(name)
            .is_some_and(|f| f.kind == RegionKind::Function)
    }

    /// Record a reference in the named region.
    pub fn attach(&mut self, region: &str, reference: Reference) {
        if let Some(frame) = self.frames.iter_mut().rev().find(|f| f.name == region) {
            frame.references.push(reference);
        }
    }

    /// The live reference, if any, that already points at `binding`.
    pub fn reference_to(&self, binding: BindingId) -> Option<(&RegionFrame, &Reference)> {
        self.frames.iter().rev().find_map(|frame| {
            frame
                .references
                .iter()
                .find(|r| r.binding == binding)
                .map(|r| (frame, r))
        })
    }

    /// Close every statement region opened at or above `base`, innermost
    /// first. Statement regions never interleave with explicit ones, since
    /// a block cannot open inside an expression.
    pub fn close_statement_regions(&mut self, base: usize) -> Vec<RegionFrame> {
        let mut closed = Vec::new();
        while self.frames.len() > base {
            match self.frames.last() {
                Some(frame) if frame.kind == RegionKind::Statement => {
                    if let Some(frame) = self.frames.pop() {
                        closed.push(frame);
                    }
                }
                _ => break,
            }
        }
        closed
    }
}
