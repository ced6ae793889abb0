#![forbid(unsafe_code)]

use tether_ir::{Expr, ExprKind, PathElem, RefKind, Span, Ty};

use crate::config::FreeLeafReads;
use crate::diagnostics::LinearityError;
use crate::events::UsageEvent;
use crate::flow::FlowChecker;
use crate::region::RegionKind;

impl FlowChecker<'_> {
    /// Evaluate an expression as a whole statement's operand, then close
    /// the statement regions its borrows opened.
    pub(crate) fn eval_closed(&mut self, expr: &Expr) {
        let base = self.regions.depth();
        self.eval(expr);
        self.close_statement_regions(base, expr.span);
    }

    /// Evaluate `expr` in a move position: a linear variable is consumed.
    pub(crate) fn eval(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Lit(_) => {}
            ExprKind::Var(name) => self.consume(name, expr.span),
            ExprKind::Call { args, .. } => {
                for arg in args {
                    self.eval(arg);
                }
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.eval(lhs);
                self.eval(rhs);
            }
            ExprKind::Unary { operand, .. } => self.eval(operand),
            ExprKind::Record { fields, .. } => {
                for (_, value) in fields {
                    self.eval(value);
                }
            }
            ExprKind::Union { slots, .. } => {
                for (_, value) in slots {
                    self.eval(value);
                }
            }
            ExprKind::Borrow { kind, target } => {
                self.borrow_expr(*kind, &target.node, &expr.ty, expr.span)
            }
            ExprKind::Deref(reference) => {
                self.eval(reference);
                if self.is_linear(&expr.ty) {
                    self.report(LinearityError::LinearDereference {
                        ty: expr.ty.display(),
                        at: expr.span,
                    });
                }
            }
            ExprKind::Path { head, elems } => self.eval_path(expr, head, elems),
        }
        self.check_regions_live(&expr.ty, expr.as_var(), expr.span);
    }

    fn consume(&mut self, name: &str, at: Span) {
        match self.env.consume(name, at) {
            Ok(Some(_)) => self.events.push(UsageEvent::Consume {
                name: name.to_string(),
                at,
            }),
            Ok(None) => {}
            Err(e) => self.report(e),
        }
    }

    /// `&x` / `&!x`: the region named by the expression's type is the
    /// statement region; it is opened here if this is the statement's first
    /// borrow in it.
    fn borrow_expr(&mut self, kind: RefKind, target: &str, ty: &Ty, at: Span) {
        let Ty::Ref { region, .. } = ty else {
            return;
        };
        match self.regions.get(region) {
            None => {
                if let Err(e) = self.regions.open(region, RegionKind::Statement, at) {
                    self.report(e);
                    return;
                }
            }
            Some(frame) if frame.kind == RegionKind::Statement => {}
            Some(frame) => {
                let prior_borrow = frame.opened_at;
                self.report(LinearityError::ConflictingBorrow {
                    name: region.clone(),
                    prior_borrow,
                    at,
                });
                return;
            }
        }

        let Some((id, _)) = self.env.lookup(target) else {
            return;
        };
        self.borrow_binding(kind, target, id, region, at, true);
    }

    /// `head.f`, `head->f`, `head[i]`.
    ///
    /// A path never moves anything out: it reads its root, and the value it
    /// produces must be Free (a reference counts as Free).
    fn eval_path(&mut self, expr: &Expr, head: &Expr, elems: &[PathElem]) {
        let root = match &head.kind {
            ExprKind::Var(name) => {
                self.read_root(name, &head.ty, head.span);
                self.check_regions_live(&head.ty, Some(name.as_str()), head.span);
                name.clone()
            }
            _ => {
                self.eval(head);
                if self.is_linear(&head.ty) {
                    self.report(LinearityError::IllegalDiscard {
                        name: None,
                        ty: head.ty.display(),
                        at: head.span,
                    });
                }
                head.ty.display()
            }
        };

        for elem in elems {
            if let PathElem::Index(index) = elem {
                self.eval(index);
            }
        }

        if self.is_linear(&expr.ty) {
            self.report(LinearityError::LinearPathLeaf {
                name: root,
                ty: expr.ty.display(),
                at: expr.span,
            });
        }
    }

    /// Non-consuming use of an owned linear root.
    fn read_root(&mut self, name: &str, ty: &Ty, at: Span) {
        if ty.is_ref() {
            return;
        }
        self.read_with(name, at, self.free_leaf_reads());
    }

    fn read_with(&mut self, name: &str, at: Span, policy: FreeLeafReads) {
        match self.env.read(name, at, policy) {
            Ok(Some(_)) => self.events.push(UsageEvent::Read {
                name: name.to_string(),
                at,
            }),
            Ok(None) => {}
            Err(e) => self.report(e),
        }
    }

    /// Assignment into a path or through a dereference.
    pub(crate) fn check_place_write(&mut self, target: &Expr, value: &Expr, at: Span) {
        let (head, elems): (&Expr, &[PathElem]) = match &target.kind {
            ExprKind::Path { head, elems } => (head, elems),
            ExprKind::Deref(reference) => (reference, &[]),
            _ => {
                self.eval(target);
                return;
            }
        };

        let root = match &head.kind {
            ExprKind::Var(name) => {
                self.check_regions_live(&head.ty, Some(name.as_str()), head.span);
                Some(name.as_str())
            }
            _ => {
                self.eval(head);
                None
            }
        };
        for elem in elems {
            if let PathElem::Index(index) = elem {
                self.eval(index);
            }
        }

        match (&head.ty, root) {
            (
                Ty::Ref {
                    kind: RefKind::Read,
                    ..
                },
                _,
            ) => self.report(LinearityError::WriteThroughReadReference {
                name: root.map_or_else(|| head.ty.display(), str::to_string),
                at,
            }),
            (Ty::Ref { region, .. }, _) => {
                // The referent outlives the reference's region.
                if let Some(limit) = self.regions.position(region) {
                    self.check_regions_below(&value.ty, limit, root, value.span);
                }
            }
            (_, Some(name)) => {
                // Writing needs the root unfrozen whatever the read policy.
                self.read_with(name, at, FreeLeafReads::UnfrozenRoot);
                let limit = self.env.lookup(name).map(|(_, b)| b.region_depth);
                if let Some(limit) = limit {
                    self.check_regions_below(&value.ty, limit, root, value.span);
                }
            }
            (_, None) => {}
        }

        if self.is_linear(&target.ty) {
            self.report(LinearityError::IllegalDiscard {
                name: root.map(str::to_string),
                ty: target.ty.display(),
                at,
            });
        }
    }
}
