mod common;

use std::fs;

use common::*;
use tether_core::{CheckerConfig, DiagnosticPolicy, FreeLeafReads, ViolationKind};
use tether_ir::{Builder, Function, RefKind, Stmt, Ty};

fn read_lines_while_borrowed(b: &Builder, kind: RefKind) -> Function {
    let body: Vec<Stmt> = vec![
        b.borrow_block(
            kind,
            "log",
            "r",
            "R",
            vec![b.let_(
                "n",
                Ty::Int,
                b.path(b.var("log", logged()), vec![b.field("lines")], Ty::Int),
            )],
        ),
        b.destructure(
            vec![("file", "inner", file()), ("lines", "count", Ty::Int)],
            b.var("log", logged()),
        ),
        close_file(b, "inner"),
    ];
    b.function("audit", vec![("log", logged())], Ty::Unit, body)
}

#[test]
fn any_policy_allows_free_leaf_reads_under_a_read_borrow() {
    let b = Builder::new();
    let config = CheckerConfig::default().with_free_leaf_reads(FreeLeafReads::Any);
    check_with(config, &b, vec![read_lines_while_borrowed(&b, RefKind::Read)])
        .expect("read under read borrow");
}

#[test]
fn any_policy_still_rejects_reads_under_a_write_borrow() {
    let b = Builder::new();
    let config = CheckerConfig::default().with_free_leaf_reads(FreeLeafReads::Any);
    let err = check_with(config, &b, vec![read_lines_while_borrowed(&b, RefKind::Write)])
        .expect_err("read under write borrow");
    assert_eq!(kinds(&err), vec![ViolationKind::ConflictingBorrow]);
}

#[test]
fn first_error_policy_reports_one_diagnostic_per_function() {
    let b = Builder::new();
    let leaky = |name: &str| {
        b.function(
            name,
            vec![],
            Ty::Unit,
            vec![let_file(&b, "f"), let_file(&b, "g"), b.discard(open_file(&b))],
        )
    };
    let functions = vec![leaky("one"), leaky("two")];
    let config = CheckerConfig::default().with_policy(DiagnosticPolicy::FirstError);
    let err = check_with(config, &b, functions).expect_err("both leak");
    assert_eq!(kinds(&err), vec![ViolationKind::IllegalDiscard, ViolationKind::IllegalDiscard]);
}

#[test]
fn diagnostics_are_ordered_by_function_then_position() {
    let b = Builder::new();
    let one = b.function(
        "one",
        vec![],
        Ty::Unit,
        vec![let_file(&b, "f"), b.discard(open_file(&b))],
    );
    let two = b.function("two", vec![], Ty::Unit, vec![b.discard(open_file(&b))]);
    let err = check(&b, vec![one, two]).expect_err("rejected");
    assert_eq!(
        kinds(&err),
        vec![
            ViolationKind::IllegalDiscard,
            ViolationKind::UnconsumedBinding,
            ViolationKind::IllegalDiscard,
        ]
    );
}

#[test]
fn config_file_drives_the_checker() {
    let path = std::env::temp_dir().join(format!("tether-config-{}.toml", std::process::id()));
    fs::write(
        &path,
        "[linearity]\npolicy = \"first-error\"\nparallel = false\nfree_leaf_reads = \"any\"\n",
    )
    .expect("write config");
    let config = CheckerConfig::load(&path).expect("load config");
    fs::remove_file(&path).ok();

    assert_eq!(config.policy, DiagnosticPolicy::FirstError);
    assert!(!config.parallel);
    let b = Builder::new();
    check_with(config, &b, vec![read_lines_while_borrowed(&b, RefKind::Read)])
        .expect("read under read borrow");
}
