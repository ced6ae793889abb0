#![allow(dead_code)]

use tether_core::{CheckFailure, CheckReport, CheckerConfig, LinearityChecker, ViolationKind};
use tether_ir::{Builder, Expr, Function, Module, Stmt, Ty, TypeDef, Universe};

pub fn file() -> Ty {
    Ty::named("File")
}

pub fn buffer() -> Ty {
    Ty::named("ByteBuffer")
}

pub fn index() -> Ty {
    Ty::named("Index")
}

pub fn logged() -> Ty {
    Ty::named("Logged")
}

pub fn option(arg: Ty) -> Ty {
    Ty::applied("Option", vec![arg])
}

/// Type definitions shared by the tests.
pub fn prelude(b: &Builder) -> Vec<TypeDef> {
    vec![
        b.opaque_type("File", Universe::Linear),
        b.opaque_type("ByteBuffer", Universe::Linear),
        b.opaque_type("Index", Universe::Free),
        b.record_type(
            "Logged",
            Universe::Type,
            vec![],
            vec![("file", file()), ("lines", Ty::Int)],
        ),
        b.record_type(
            "Point",
            Universe::Free,
            vec![],
            vec![("x", Ty::Int), ("y", Ty::Int)],
        ),
        b.union_type(
            "Option",
            Universe::Type,
            vec![("T", Universe::Type)],
            vec![("None", vec![]), ("Some", vec![("value", Ty::Param("T".into()))])],
        ),
    ]
}

pub fn module(b: &Builder, functions: Vec<Function>) -> Module {
    Module {
        types: prelude(b),
        functions,
    }
}

pub fn check(b: &Builder, functions: Vec<Function>) -> Result<CheckReport, CheckFailure> {
    LinearityChecker::new().check_module(&module(b, functions))
}

pub fn check_with(
    config: CheckerConfig,
    b: &Builder,
    functions: Vec<Function>,
) -> Result<CheckReport, CheckFailure> {
    LinearityChecker::with_config(config).check_module(&module(b, functions))
}

/// Body of a single `main() -> Unit`.
pub fn main(b: &Builder, body: Vec<Stmt>) -> Function {
    b.function("main", vec![("p", Ty::Bool)], Ty::Unit, body)
}

pub fn kinds(failure: &CheckFailure) -> Vec<ViolationKind> {
    failure.diagnostics.iter().map(|d| d.kind()).collect()
}

pub fn subjects(failure: &CheckFailure) -> Vec<&str> {
    failure.diagnostics.iter().map(|d| d.subject()).collect()
}

pub fn bindings(failure: &CheckFailure) -> Vec<Option<&str>> {
    failure.diagnostics.iter().map(|d| d.binding()).collect()
}

pub fn open_file(b: &Builder) -> Expr {
    b.call("openFile", file(), vec![b.text("x")])
}

pub fn let_file(b: &Builder, name: &str) -> Stmt {
    b.let_(name, file(), open_file(b))
}

pub fn close_file(b: &Builder, name: &str) -> Stmt {
    b.discard(b.call("closeFile", Ty::Unit, vec![b.var(name, file())]))
}

pub fn let_buffer(b: &Builder, name: &str) -> Stmt {
    b.let_(name, buffer(), b.call("alloc", buffer(), vec![]))
}

pub fn dealloc(b: &Builder, name: &str) -> Stmt {
    b.discard(b.call("dealloc", Ty::Unit, vec![b.var(name, buffer())]))
}

pub fn cond(b: &Builder) -> Expr {
    b.var("p", Ty::Bool)
}
