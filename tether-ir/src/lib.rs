#![forbid(unsafe_code)]

//! Typed intermediate representation consumed by the linearity checker.
//!
//! Every expression carries its resolved concrete type. Borrow-related
//! constructs (`&x`, `&!x`, `!r`, `borrow .. in .. do .. end`) are distinct
//! node kinds, already separated by the parser.

use miette::SourceSpan;

mod builder;
mod types;

pub use builder::Builder;
pub use types::{RefKind, Ty, Universe};

pub type Span = SourceSpan;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

impl<T> Spanned<T> {
    pub fn new(span: Span, node: T) -> Self {
        Self { span, node }
    }
}

pub fn span(start: usize, len: usize) -> Span {
    SourceSpan::new(start.into(), len)
}

pub type Ident = Spanned<String>;

#[derive(Clone, Debug, PartialEq, Default)]
pub struct Module {
    pub types: Vec<TypeDef>,
    pub functions: Vec<Function>,
}

// ---------------------------------------------------------------------------
// Type definitions
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct TypeDef {
    pub span: Span,
    pub name: Ident,
    pub params: Vec<TypeParam>,
    pub universe: Universe,
    pub shape: TypeShape,
}

impl TypeDef {
    /// Record fields, or the slots of every union case.
    pub fn fields(&self) -> Vec<&Field> {
        match &self.shape {
            TypeShape::Opaque => Vec::new(),
            TypeShape::Record(fields) => fields.iter().collect(),
            TypeShape::Union(cases) => cases.iter().flat_map(|c| c.slots.iter()).collect(),
        }
    }

    pub fn param_kind(&self, name: &str) -> Option<Universe> {
        self.params
            .iter()
            .find(|p| p.name.node == name)
            .map(|p| p.kind)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeParam {
    pub span: Span,
    pub name: Ident,
    pub kind: Universe,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeShape {
    /// Declared without visible structure (e.g. a foreign handle).
    Opaque,
    Record(Vec<Field>),
    Union(Vec<UnionCase>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub span: Span,
    pub name: Ident,
    pub ty: Ty,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnionCase {
    pub span: Span,
    pub name: Ident,
    pub slots: Vec<Field>,
}

// ---------------------------------------------------------------------------
// Functions and statements
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub span: Span,
    pub name: Ident,
    /// Generic parameters; the `Region`-kinded ones are in scope for the
    /// whole body.
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,
    pub ret: Ty,
    pub body: Block,
}

impl Function {
    pub fn regions(&self) -> impl Iterator<Item = &Ident> {
        self.type_params
            .iter()
            .filter(|p| p.kind == Universe::Region)
            .map(|p| &p.name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub span: Span,
    pub name: Ident,
    pub ty: Ty,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub span: Span,
    pub stmts: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Let(LetStmt),
    Destructure(DestructureStmt),
    Assign(AssignStmt),
    If(IfStmt),
    Case(CaseStmt),
    While(WhileStmt),
    For(ForStmt),
    Borrow(BorrowStmt),
    Return(ReturnStmt),
    Discard(DiscardStmt),
    Block(Block),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Let(s) => s.span,
            Stmt::Destructure(s) => s.span,
            Stmt::Assign(s) => s.span,
            Stmt::If(s) => s.span,
            Stmt::Case(s) => s.span,
            Stmt::While(s) => s.span,
            Stmt::For(s) => s.span,
            Stmt::Borrow(s) => s.span,
            Stmt::Return(s) => s.span,
            Stmt::Discard(s) => s.span,
            Stmt::Block(b) => b.span,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LetStmt {
    pub span: Span,
    pub name: Ident,
    pub ty: Ty,
    pub value: Expr,
}

/// `let { field as name, .. } := value`
#[derive(Clone, Debug, PartialEq)]
pub struct DestructureStmt {
    pub span: Span,
    pub bindings: Vec<FieldBinding>,
    pub value: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldBinding {
    pub span: Span,
    pub field: Ident,
    pub name: Ident,
    pub ty: Ty,
}

/// `target := value`; the target is a variable or a path.
#[derive(Clone, Debug, PartialEq)]
pub struct AssignStmt {
    pub span: Span,
    pub target: Expr,
    pub value: Expr,
}

/// `if c1 then .. else if c2 then .. else .. end if`
#[derive(Clone, Debug, PartialEq)]
pub struct IfStmt {
    pub span: Span,
    pub branches: Vec<CondBranch>,
    pub else_block: Option<Block>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CondBranch {
    pub span: Span,
    pub cond: Expr,
    pub body: Block,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CaseStmt {
    pub span: Span,
    pub scrutinee: Expr,
    pub arms: Vec<CaseArm>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CaseArm {
    pub span: Span,
    pub case: Ident,
    pub bindings: Vec<FieldBinding>,
    pub body: Block,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WhileStmt {
    pub span: Span,
    pub cond: Expr,
    pub body: Block,
}

/// `for var from start to end do .. end for`
#[derive(Clone, Debug, PartialEq)]
pub struct ForStmt {
    pub span: Span,
    pub var: Ident,
    pub start: Expr,
    pub end: Expr,
    pub body: Block,
}

/// `borrow source as alias in region do .. end`
#[derive(Clone, Debug, PartialEq)]
pub struct BorrowStmt {
    pub span: Span,
    pub kind: RefKind,
    pub source: Ident,
    pub alias: Ident,
    pub region: Ident,
    pub body: Block,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReturnStmt {
    pub span: Span,
    pub value: Expr,
}

/// Bare expression statement; the value is dropped.
#[derive(Clone, Debug, PartialEq)]
pub struct DiscardStmt {
    pub span: Span,
    pub expr: Expr,
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub span: Span,
    pub ty: Ty,
    pub kind: ExprKind,
}

impl Expr {
    /// The variable name, if this is a bare variable reference.
    pub fn as_var(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Var(name) => Some(name),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Lit(Literal),
    Var(String),
    Call {
        callee: Ident,
        args: Vec<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// `Name(field => value, ..)`
    Record {
        name: Ident,
        fields: Vec<(Ident, Expr)>,
    },
    /// `Name.Case(slot => value, ..)`
    Union {
        name: Ident,
        case: Ident,
        slots: Vec<(Ident, Expr)>,
    },
    /// `&x` / `&!x`, scoped to the enclosing statement.
    Borrow {
        kind: RefKind,
        target: Ident,
    },
    /// `!r`
    Deref(Box<Expr>),
    /// `head.f`, `head->f`, `head[i]`
    Path {
        head: Box<Expr>,
        elems: Vec<PathElem>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum PathElem {
    Field(Ident),
    Arrow(Ident),
    Index(Expr),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,

    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,

    And,
    Or,
}
