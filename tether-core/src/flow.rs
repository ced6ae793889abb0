//! Control-Flow Join Engine
//!
//! Walks a function body statement by statement, threading the binding
//! environment through sequencing, branching and loops:
//!
//! ```text
//! entry ──▶ stmt ──▶ stmt ──▶ ... ──▶ scope exit
//!              │
//!              ├─ if/case: one snapshot per branch, joined afterwards
//!              ├─ loop:    barrier at entry, body checked once in isolation
//!              └─ return:  everything still live is stranded
//! ```
//!
//! Branches that end in `return` are excluded from the join.

use std::collections::HashSet;

use tether_ir::{
    AssignStmt, Block, BorrowStmt, CaseStmt, ExprKind, FieldBinding, ForStmt, Function, IfStmt,
    LetStmt, RefKind, ReturnStmt, Span, Stmt, Ty, Universe, WhileStmt,
};
use tracing::debug;

use crate::config::{CheckerConfig, DiagnosticPolicy, FreeLeafReads};
use crate::diagnostics::{DiagnosticReporter, LinearityError};
use crate::env::{self, Binding, BindingId, BindingState, Environment};
use crate::events::{EventLog, UsageEvent};
use crate::region::{Reference, RegionKind, RegionStack};
use crate::universe::{ParamKinds, TypeTable, param_kinds};

/// Whether control can fall through a statement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reach {
    Continues,
    Diverges,
}

/// Per-function checker state. One instance checks one function body.
pub struct FlowChecker<'a> {
    pub(crate) table: &'a TypeTable<'a>,
    pub(crate) config: &'a CheckerConfig,
    pub(crate) params: ParamKinds,
    pub(crate) env: Environment,
    pub(crate) regions: RegionStack,
    pub(crate) events: EventLog,
    pub(crate) reporter: DiagnosticReporter,
    /// Regions already reported as escaping in the current statement.
    pub(crate) escaped: HashSet<String>,
}

/// Exit state of one branch of an `if` or `case`.
struct BranchOutcome {
    span: Span,
    env: Option<Environment>,
}

impl<'a> FlowChecker<'a> {
    pub fn new(table: &'a TypeTable<'a>, config: &'a CheckerConfig) -> Self {
        Self {
            table,
            config,
            params: ParamKinds::new(),
            env: Environment::new(),
            regions: RegionStack::new(),
            events: EventLog::default(),
            reporter: DiagnosticReporter::new(),
            escaped: HashSet::new(),
        }
    }

    /// Check a whole function; parameters live in the outermost frame.
    pub fn check_function(mut self, function: &Function) -> (EventLog, DiagnosticReporter) {
        self.params = param_kinds(&function.type_params);
        for region in function.regions() {
            if let Err(e) = self.regions.open(&region.node, RegionKind::Function, region.span) {
                self.report(e);
            }
        }
        for param in &function.params {
            self.define(&param.name.node, param.ty.clone(), param.span);
        }

        let reach = self.check_block(&function.body);
        let params = self.env.pop_frame();
        if reach == Reach::Continues && !self.halted() {
            self.report_all(env::check_scope_exit(&params, function.span));
        }
        (self.events, self.reporter)
    }

    pub(crate) fn report(&mut self, diagnostic: LinearityError) {
        if self.halted() {
            return;
        }
        debug!(kind = ?diagnostic.kind(), subject = diagnostic.subject(), "violation");
        self.reporter.add(diagnostic);
    }

    fn report_all(&mut self, diagnostics: Vec<LinearityError>) {
        for d in diagnostics {
            self.report(d);
        }
    }

    pub(crate) fn halted(&self) -> bool {
        self.config.policy == DiagnosticPolicy::FirstError && self.reporter.has_errors()
    }

    pub(crate) fn universe(&self, ty: &Ty) -> Universe {
        self.table.classify_in(ty, &self.params)
    }

    pub(crate) fn is_linear(&self, ty: &Ty) -> bool {
        self.universe(ty).is_linear()
    }

    pub(crate) fn define(&mut self, name: &str, ty: Ty, at: Span) -> BindingId {
        let universe = self.universe(&ty);
        let depth = self.regions.depth();
        self.events.push(UsageEvent::Define {
            name: name.to_string(),
            at,
            linear: universe.is_linear(),
        });
        self.env
            .define(Binding::new(name.to_string(), ty, universe, at, depth))
    }

    /// Every region in `ty` must be live here. `name` is the binding or
    /// variable carrying the type, if any.
    pub(crate) fn check_regions_live(&mut self, ty: &Ty, name: Option<&str>, at: Span) {
        let dead: Vec<String> = ty
            .regions()
            .into_iter()
            .filter(|r| !self.regions.is_live(r))
            .map(str::to_string)
            .collect();
        for region in dead {
            self.report_escape(region, name, at);
        }
    }

    /// Every region in `ty` must sit below stack index `limit`.
    pub(crate) fn check_regions_below(
        &mut self,
        ty: &Ty,
        limit: usize,
        name: Option<&str>,
        at: Span,
    ) {
        let escaping: Vec<String> = ty
            .regions()
            .into_iter()
            .filter(|r| self.regions.position(r).is_some_and(|p| p >= limit))
            .map(str::to_string)
            .collect();
        for region in escaping {
            self.report_escape(region, name, at);
        }
    }

    /// Report `region` once per statement.
    fn report_escape(&mut self, region: String, name: Option<&str>, at: Span) {
        if self.escaped.insert(region.clone()) {
            self.report(LinearityError::EscapingRegion {
                name: name.map(str::to_string),
                region,
                at,
            });
        }
    }

    // -- blocks ------------------------------------------------------------

    pub fn check_block(&mut self, block: &Block) -> Reach {
        self.env.push_frame();
        let mut reach = Reach::Continues;
        for stmt in &block.stmts {
            if self.halted() {
                break;
            }
            if self.check_stmt(stmt) == Reach::Diverges {
                reach = Reach::Diverges;
                break;
            }
        }
        let frame = self.env.pop_frame();
        if reach == Reach::Continues && !self.halted() {
            self.report_all(env::check_scope_exit(&frame, block.span));
        }
        reach
    }

    /// Nested statements get their own escape set; the enclosing
    /// statement's set is restored afterwards.
    fn check_stmt(&mut self, stmt: &Stmt) -> Reach {
        let outer = std::mem::take(&mut self.escaped);
        let reach = self.visit_stmt(stmt);
        self.escaped = outer;
        reach
    }

    fn visit_stmt(&mut self, stmt: &Stmt) -> Reach {
        match stmt {
            Stmt::Let(s) => self.check_let(s),
            Stmt::Destructure(s) => {
                self.eval_closed(&s.value);
                self.define_fields(&s.bindings);
            }
            Stmt::Assign(s) => self.check_assign(s),
            Stmt::If(s) => return self.check_if(s),
            Stmt::Case(s) => return self.check_case(s),
            Stmt::While(s) => self.check_while(s),
            Stmt::For(s) => self.check_for(s),
            Stmt::Borrow(s) => return self.check_borrow(s),
            Stmt::Return(s) => return self.check_return(s),
            Stmt::Discard(s) => {
                let base = self.regions.depth();
                self.eval(&s.expr);
                if self.is_linear(&s.expr.ty) {
                    self.report(LinearityError::IllegalDiscard {
                        name: s.expr.as_var().map(str::to_string),
                        ty: s.expr.ty.display(),
                        at: s.span,
                    });
                }
                self.close_statement_regions(base, s.span);
            }
            Stmt::Block(b) => return self.check_block(b),
        }
        Reach::Continues
    }

    fn check_let(&mut self, s: &LetStmt) {
        self.eval_closed(&s.value);
        self.check_regions_live(&s.ty, Some(s.name.node.as_str()), s.span);
        self.define(&s.name.node, s.ty.clone(), s.name.span);
    }

    fn define_fields(&mut self, bindings: &[FieldBinding]) {
        for fb in bindings {
            self.check_regions_live(&fb.ty, Some(fb.name.node.as_str()), fb.span);
            self.define(&fb.name.node, fb.ty.clone(), fb.name.span);
        }
    }

    fn check_assign(&mut self, s: &AssignStmt) {
        let base = self.regions.depth();
        self.eval(&s.value);

        match &s.target.kind {
            ExprKind::Var(name) => {
                let limit = self.env.lookup(name).map(|(_, b)| b.region_depth);
                if let Some(limit) = limit {
                    let name = Some(name.as_str());
                    self.check_regions_below(&s.value.ty, limit, name, s.value.span);
                }
                match self.env.overwrite(name, s.span) {
                    Ok(Some(_)) => self.events.push(UsageEvent::Define {
                        name: name.clone(),
                        at: s.span,
                        linear: true,
                    }),
                    Ok(None) => {}
                    Err(e) => self.report(e),
                }
            }
            _ => self.check_place_write(&s.target, &s.value, s.span),
        }
        self.close_statement_regions(base, s.span);
    }

    // -- branching ---------------------------------------------------------

    fn check_if(&mut self, s: &IfStmt) -> Reach {
        let mut outcomes = Vec::with_capacity(s.branches.len() + 1);
        for branch in &s.branches {
            self.eval_closed(&branch.cond);
            outcomes.push(self.check_branch(branch.span, |c| c.check_block(&branch.body)));
        }
        match &s.else_block {
            Some(block) => outcomes.push(self.check_branch(block.span, |c| c.check_block(block))),
            None => outcomes.push(BranchOutcome {
                span: s.span,
                env: Some(self.env.clone()),
            }),
        }
        self.join(outcomes)
    }

    fn check_case(&mut self, s: &CaseStmt) -> Reach {
        self.eval_closed(&s.scrutinee);
        let mut outcomes = Vec::with_capacity(s.arms.len());
        for arm in &s.arms {
            outcomes.push(self.check_branch(arm.span, |c| {
                c.env.push_frame();
                c.define_fields(&arm.bindings);
                let reach = c.check_block(&arm.body);
                let slots = c.env.pop_frame();
                if reach == Reach::Continues && !c.halted() {
                    c.report_all(env::check_scope_exit(&slots, arm.span));
                }
                reach
            }));
        }
        self.join(outcomes)
    }

    /// Run one branch from the current environment, then restore it.
    fn check_branch(&mut self, span: Span, body: impl FnOnce(&mut Self) -> Reach) -> BranchOutcome {
        let entry = self.env.clone();
        let reach = body(self);
        let exit = std::mem::replace(&mut self.env, entry);
        BranchOutcome {
            span,
            env: (reach == Reach::Continues).then_some(exit),
        }
    }

    /// Merge branch exits into the current environment. Every linear
    /// binding in scope must end up consumed in all continuing branches or
    /// in none of them.
    fn join(&mut self, outcomes: Vec<BranchOutcome>) -> Reach {
        let live: Vec<(Span, Environment)> = outcomes
            .into_iter()
            .filter_map(|o| o.env.map(|env| (o.span, env)))
            .collect();
        if live.is_empty() {
            debug!("every branch diverges");
            return Reach::Diverges;
        }

        let tracked: Vec<(BindingId, String)> = self
            .env
            .linear_bindings()
            .map(|(id, b)| (id, b.name.clone()))
            .collect();
        for (id, name) in tracked {
            let mut consumed_in = Vec::new();
            let mut not_consumed_in = Vec::new();
            let mut consumed_at = None;
            for (span, env) in &live {
                match env.get(id).map(|b| b.state) {
                    Some(BindingState::Consumed { at }) => {
                        consumed_in.push(*span);
                        consumed_at.get_or_insert(at);
                    }
                    _ => not_consumed_in.push(*span),
                }
            }

            if !consumed_in.is_empty() && !not_consumed_in.is_empty() {
                debug!(binding = %name, "branches disagree");
                self.report(LinearityError::InconsistentBranchConsumption {
                    name,
                    consumed_in,
                    not_consumed_in,
                });
            }
            // Consumed in any branch counts as consumed after the join.
            match consumed_at {
                Some(at) => self.env.mark_consumed(id, at),
                None => {
                    if matches!(
                        self.env.get(id).map(|b| b.state),
                        Some(BindingState::Consumed { .. })
                    ) {
                        self.env.restore(id);
                    }
                }
            }
        }
        Reach::Continues
    }

    // -- loops -------------------------------------------------------------

    fn check_while(&mut self, s: &WhileStmt) {
        let saved = self.env.enter_loop();
        self.eval_closed(&s.cond);
        self.check_loop_body(&s.body);
        self.env.exit_loop(saved);
    }

    fn check_for(&mut self, s: &ForStmt) {
        let saved = self.env.enter_loop();
        self.eval_closed(&s.start);
        self.eval_closed(&s.end);
        self.env.push_frame();
        self.define(&s.var.node, Ty::Int, s.var.span);
        self.check_loop_body(&s.body);
        self.env.pop_frame();
        self.env.exit_loop(saved);
    }

    /// The body is checked once as an isolated scope; whatever happens in
    /// it cannot reach bindings outside the barrier, so the environment
    /// after the loop is the one before it. A loop may run zero times, so
    /// it always continues.
    fn check_loop_body(&mut self, body: &Block) {
        let entry = self.env.clone();
        self.check_block(body);
        self.env = entry;
    }

    // -- borrow blocks and return -------------------------------------------

    fn check_borrow(&mut self, s: &BorrowStmt) -> Reach {
        let opened = match self
            .regions
            .open(&s.region.node, RegionKind::Explicit, s.region.span)
        {
            Ok(()) => true,
            Err(e) => {
                self.report(e);
                false
            }
        };

        let source = self
            .env
            .lookup(&s.source.node)
            .map(|(id, b)| (id, b.ty.clone()));
        let source_ty = match source {
            Some((id, ty)) => {
                if opened {
                    self.borrow_binding(s.kind, &s.source.node, id, &s.region.node, s.source.span, false);
                }
                ty
            }
            None => Ty::Unit,
        };

        self.env.push_frame();
        let alias_ty = Ty::reference(s.kind, s.region.node.clone(), source_ty);
        self.define(&s.alias.node, alias_ty, s.alias.span);
        let reach = self.check_block(&s.body);
        let frame = self.env.pop_frame();
        if reach == Reach::Continues && !self.halted() {
            self.report_all(env::check_scope_exit(&frame, s.span));
        }

        if opened {
            self.close_region(s.span);
        }
        reach
    }

    fn check_return(&mut self, s: &ReturnStmt) -> Reach {
        self.eval_closed(&s.value);
        let local: Vec<String> = s
            .value
            .ty
            .regions()
            .into_iter()
            .filter(|r| !self.regions.is_function_region(r))
            .map(str::to_string)
            .collect();
        for region in local {
            self.report_escape(region, s.value.as_var(), s.span);
        }

        let stranded: Vec<LinearityError> = self
            .env
            .live_linear()
            .into_iter()
            .map(|b| env::unconsumed(b, s.span))
            .collect();
        self.report_all(stranded);
        Reach::Diverges
    }

    // -- regions -----------------------------------------------------------

    /// Freeze `id` for a reference in `region`, recording the reference.
    /// Several reads in one statement share the first one's freeze. Reads of
    /// a Free binding may always share; a write is exclusive either way.
    pub(crate) fn borrow_binding(
        &mut self,
        kind: RefKind,
        name: &str,
        id: BindingId,
        region: &str,
        at: Span,
        shareable: bool,
    ) {
        if let Some((frame, prior)) = self.regions.reference_to(id) {
            let linear = self.env.get(id).is_some_and(Binding::is_linear);
            let shared = kind == RefKind::Read
                && prior.kind == RefKind::Read
                && (!linear || (shareable && frame.kind == RegionKind::Statement));
            if !shared {
                let prior_borrow = prior.at;
                self.report(LinearityError::ConflictingBorrow {
                    name: name.to_string(),
                    prior_borrow,
                    at,
                });
                return;
            }
            self.attach(kind, name, id, region, at, false);
            return;
        }

        match self.env.freeze(name, kind, at) {
            Ok(froze) => self.attach(kind, name, id, region, at, froze.is_some()),
            Err(e) => self.report(e),
        }
    }

    fn attach(&mut self, kind: RefKind, name: &str, id: BindingId, region: &str, at: Span, froze: bool) {
        self.events.push(UsageEvent::Borrow {
            name: name.to_string(),
            kind,
            region: region.to_string(),
            at,
        });
        self.regions.attach(
            region,
            Reference {
                kind,
                binding: id,
                at,
                froze,
            },
        );
    }

    fn close_region(&mut self, at: Span) {
        if let Some(frame) = self.regions.close() {
            self.release(frame.name, frame.references, at);
        }
    }

    pub(crate) fn close_statement_regions(&mut self, base: usize, at: Span) {
        for frame in self.regions.close_statement_regions(base) {
            self.release(frame.name, frame.references, at);
        }
    }

    fn release(&mut self, region: String, references: Vec<Reference>, at: Span) {
        for reference in references.iter().filter(|r| r.froze) {
            self.env.thaw(reference.binding);
        }
        self.events.push(UsageEvent::Close { region, at });
    }

    pub(crate) fn free_leaf_reads(&self) -> FreeLeafReads {
        self.config.free_leaf_reads
    }
}
