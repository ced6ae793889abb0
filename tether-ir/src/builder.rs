#![forbid(unsafe_code)]

use std::cell::Cell;

use crate::{
    AssignStmt, BinOp, Block, BorrowStmt, CaseArm, CaseStmt, CondBranch, DestructureStmt,
    DiscardStmt, Expr, ExprKind, Field, FieldBinding, ForStmt, Function, Ident, IfStmt, LetStmt,
    Literal, Param, PathElem, RefKind, ReturnStmt, Span, Spanned, Stmt, Ty, TypeDef, TypeParam,
    TypeShape, UnaryOp, UnionCase, Universe, WhileStmt, span,
};

/// Constructs IR nodes with distinct, monotonically increasing spans.
///
/// Children are built before their parents, so a node's span always sorts
/// after the spans of its operands, and statements sort in program order.
#[derive(Debug, Default)]
pub struct Builder {
    next: Cell<usize>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn span(&self) -> Span {
        let start = self.next.get();
        self.next.set(start + 1);
        span(start, 1)
    }

    pub fn ident(&self, name: &str) -> Ident {
        Spanned::new(self.span(), name.to_string())
    }

    fn expr(&self, ty: Ty, kind: ExprKind) -> Expr {
        Expr {
            span: self.span(),
            ty,
            kind,
        }
    }

    fn block(&self, stmts: Vec<Stmt>) -> Block {
        Block {
            span: self.span(),
            stmts,
        }
    }

    // -- expressions -------------------------------------------------------

    pub fn unit(&self) -> Expr {
        self.expr(Ty::Unit, ExprKind::Lit(Literal::Unit))
    }

    pub fn bool(&self, value: bool) -> Expr {
        self.expr(Ty::Bool, ExprKind::Lit(Literal::Bool(value)))
    }

    pub fn int(&self, value: i64) -> Expr {
        self.expr(Ty::Int, ExprKind::Lit(Literal::Int(value)))
    }

    pub fn text(&self, value: &str) -> Expr {
        self.expr(Ty::Text, ExprKind::Lit(Literal::Text(value.to_string())))
    }

    pub fn var(&self, name: &str, ty: Ty) -> Expr {
        self.expr(ty, ExprKind::Var(name.to_string()))
    }

    pub fn call(&self, callee: &str, ret: Ty, args: Vec<Expr>) -> Expr {
        let callee = self.ident(callee);
        self.expr(ret, ExprKind::Call { callee, args })
    }

    pub fn binary(&self, op: BinOp, lhs: Expr, rhs: Expr, ty: Ty) -> Expr {
        self.expr(
            ty,
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        )
    }

    pub fn not(&self, operand: Expr) -> Expr {
        self.expr(
            Ty::Bool,
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            },
        )
    }

    pub fn record(&self, ty: Ty, fields: Vec<(&str, Expr)>) -> Expr {
        let name = self.ident(&ty.display());
        let fields = fields
            .into_iter()
            .map(|(n, e)| (self.ident(n), e))
            .collect();
        self.expr(ty, ExprKind::Record { name, fields })
    }

    pub fn union_value(&self, ty: Ty, case: &str, slots: Vec<(&str, Expr)>) -> Expr {
        let name = self.ident(&ty.display());
        let case = self.ident(case);
        let slots = slots
            .into_iter()
            .map(|(n, e)| (self.ident(n), e))
            .collect();
        self.expr(ty, ExprKind::Union { name, case, slots })
    }

    /// `&target`, typed as a read reference in `region`.
    pub fn borrow(&self, target: &str, target_ty: Ty, region: &str) -> Expr {
        self.reference(RefKind::Read, target, target_ty, region)
    }

    /// `&!target`, typed as a write reference in `region`.
    pub fn borrow_mut(&self, target: &str, target_ty: Ty, region: &str) -> Expr {
        self.reference(RefKind::Write, target, target_ty, region)
    }

    pub fn reference(&self, kind: RefKind, target: &str, target_ty: Ty, region: &str) -> Expr {
        let target = self.ident(target);
        self.expr(
            Ty::reference(kind, region, target_ty),
            ExprKind::Borrow { kind, target },
        )
    }

    /// `!reference`; `ty` is the referent type.
    pub fn deref(&self, reference: Expr, ty: Ty) -> Expr {
        self.expr(ty, ExprKind::Deref(Box::new(reference)))
    }

    pub fn path(&self, head: Expr, elems: Vec<PathElem>, ty: Ty) -> Expr {
        self.expr(
            ty,
            ExprKind::Path {
                head: Box::new(head),
                elems,
            },
        )
    }

    pub fn field(&self, name: &str) -> PathElem {
        PathElem::Field(self.ident(name))
    }

    pub fn arrow(&self, name: &str) -> PathElem {
        PathElem::Arrow(self.ident(name))
    }

    pub fn index(&self, index: Expr) -> PathElem {
        PathElem::Index(index)
    }

    // -- statements --------------------------------------------------------

    pub fn let_(&self, name: &str, ty: Ty, value: Expr) -> Stmt {
        let name = self.ident(name);
        Stmt::Let(LetStmt {
            span: self.span(),
            name,
            ty,
            value,
        })
    }

    /// `let { field as name, .. } := value`
    pub fn destructure(&self, bindings: Vec<(&str, &str, Ty)>, value: Expr) -> Stmt {
        let bindings = bindings
            .into_iter()
            .map(|(field, name, ty)| self.field_binding(field, name, ty))
            .collect();
        Stmt::Destructure(DestructureStmt {
            span: self.span(),
            bindings,
            value,
        })
    }

    fn field_binding(&self, field: &str, name: &str, ty: Ty) -> FieldBinding {
        let field = self.ident(field);
        let name = self.ident(name);
        FieldBinding {
            span: self.span(),
            field,
            name,
            ty,
        }
    }

    pub fn assign(&self, target: Expr, value: Expr) -> Stmt {
        Stmt::Assign(AssignStmt {
            span: self.span(),
            target,
            value,
        })
    }

    pub fn if_(&self, cond: Expr, then: Vec<Stmt>) -> Stmt {
        self.if_chain(vec![(cond, then)], None)
    }

    pub fn if_else(&self, cond: Expr, then: Vec<Stmt>, otherwise: Vec<Stmt>) -> Stmt {
        self.if_chain(vec![(cond, then)], Some(otherwise))
    }

    pub fn if_chain(&self, branches: Vec<(Expr, Vec<Stmt>)>, otherwise: Option<Vec<Stmt>>) -> Stmt {
        let branches = branches
            .into_iter()
            .map(|(cond, body)| {
                let body = self.block(body);
                CondBranch {
                    span: self.span(),
                    cond,
                    body,
                }
            })
            .collect();
        let else_block = otherwise.map(|stmts| self.block(stmts));
        Stmt::If(IfStmt {
            span: self.span(),
            branches,
            else_block,
        })
    }

    pub fn arm(&self, case: &str, bindings: Vec<(&str, &str, Ty)>, body: Vec<Stmt>) -> CaseArm {
        let case = self.ident(case);
        let bindings = bindings
            .into_iter()
            .map(|(field, name, ty)| self.field_binding(field, name, ty))
            .collect();
        let body = self.block(body);
        CaseArm {
            span: self.span(),
            case,
            bindings,
            body,
        }
    }

    pub fn case(&self, scrutinee: Expr, arms: Vec<CaseArm>) -> Stmt {
        Stmt::Case(CaseStmt {
            span: self.span(),
            scrutinee,
            arms,
        })
    }

    pub fn while_(&self, cond: Expr, body: Vec<Stmt>) -> Stmt {
        let body = self.block(body);
        Stmt::While(WhileStmt {
            span: self.span(),
            cond,
            body,
        })
    }

    pub fn for_(&self, var: &str, start: Expr, end: Expr, body: Vec<Stmt>) -> Stmt {
        let var = self.ident(var);
        let body = self.block(body);
        Stmt::For(ForStmt {
            span: self.span(),
            var,
            start,
            end,
            body,
        })
    }

    /// `borrow source as alias in region do .. end`
    pub fn borrow_block(
        &self,
        kind: RefKind,
        source: &str,
        alias: &str,
        region: &str,
        body: Vec<Stmt>,
    ) -> Stmt {
        let source = self.ident(source);
        let alias = self.ident(alias);
        let region = self.ident(region);
        let body = self.block(body);
        Stmt::Borrow(BorrowStmt {
            span: self.span(),
            kind,
            source,
            alias,
            region,
            body,
        })
    }

    pub fn ret(&self, value: Expr) -> Stmt {
        Stmt::Return(ReturnStmt {
            span: self.span(),
            value,
        })
    }

    pub fn discard(&self, expr: Expr) -> Stmt {
        Stmt::Discard(DiscardStmt {
            span: self.span(),
            expr,
        })
    }

    pub fn scope(&self, stmts: Vec<Stmt>) -> Stmt {
        Stmt::Block(self.block(stmts))
    }

    // -- definitions -------------------------------------------------------

    pub fn function(&self, name: &str, params: Vec<(&str, Ty)>, ret: Ty, body: Vec<Stmt>) -> Function {
        self.function_in(name, vec![], params, ret, body)
    }

    /// A generic function; `Region`-kinded parameters name regions usable
    /// in the signature and body.
    pub fn function_in(
        &self,
        name: &str,
        type_params: Vec<(&str, Universe)>,
        params: Vec<(&str, Ty)>,
        ret: Ty,
        body: Vec<Stmt>,
    ) -> Function {
        let name = self.ident(name);
        let type_params = self.type_params(type_params);
        let params = params
            .into_iter()
            .map(|(n, ty)| {
                let name = self.ident(n);
                Param {
                    span: self.span(),
                    name,
                    ty,
                }
            })
            .collect();
        let body = self.block(body);
        Function {
            span: self.span(),
            name,
            type_params,
            params,
            ret,
            body,
        }
    }

    pub fn opaque_type(&self, name: &str, universe: Universe) -> TypeDef {
        let name = self.ident(name);
        TypeDef {
            span: self.span(),
            name,
            params: Vec::new(),
            universe,
            shape: TypeShape::Opaque,
        }
    }

    pub fn record_type(
        &self,
        name: &str,
        universe: Universe,
        params: Vec<(&str, Universe)>,
        fields: Vec<(&str, Ty)>,
    ) -> TypeDef {
        let name = self.ident(name);
        let params = self.type_params(params);
        let fields = self.fields(fields);
        TypeDef {
            span: self.span(),
            name,
            params,
            universe,
            shape: TypeShape::Record(fields),
        }
    }

    pub fn union_type(
        &self,
        name: &str,
        universe: Universe,
        params: Vec<(&str, Universe)>,
        cases: Vec<(&str, Vec<(&str, Ty)>)>,
    ) -> TypeDef {
        let name = self.ident(name);
        let params = self.type_params(params);
        let cases = cases
            .into_iter()
            .map(|(case, slots)| {
                let name = self.ident(case);
                let slots = self.fields(slots);
                UnionCase {
                    span: self.span(),
                    name,
                    slots,
                }
            })
            .collect();
        TypeDef {
            span: self.span(),
            name,
            params,
            universe,
            shape: TypeShape::Union(cases),
        }
    }

    fn type_params(&self, params: Vec<(&str, Universe)>) -> Vec<TypeParam> {
        params
            .into_iter()
            .map(|(n, kind)| {
                let name = self.ident(n);
                TypeParam {
                    span: self.span(),
                    name,
                    kind,
                }
            })
            .collect()
    }

    fn fields(&self, fields: Vec<(&str, Ty)>) -> Vec<Field> {
        fields
            .into_iter()
            .map(|(n, ty)| {
                let name = self.ident(n);
                Field {
                    span: self.span(),
                    name,
                    ty,
                }
            })
            .collect()
    }
}
