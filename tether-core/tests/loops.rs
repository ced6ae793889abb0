mod common;

use common::*;
use tether_core::ViolationKind;
use tether_ir::{BinOp, Builder, Ty};

#[test]
fn consuming_an_outer_file_in_a_loop_is_rejected() {
    let b = Builder::new();
    let f = main(
        &b,
        vec![
            let_file(&b, "f"),
            b.while_(cond(&b), vec![close_file(&b, "f")]),
            close_file(&b, "f"),
        ],
    );
    let err = check(&b, vec![f]).expect_err("loop consumes outer");
    assert_eq!(kinds(&err), vec![ViolationKind::LinearInLoopBody]);
    assert_eq!(subjects(&err), vec!["f"]);
}

#[test]
fn borrowing_an_outer_buffer_in_a_loop_is_rejected() {
    let b = Builder::new();
    let f = main(
        &b,
        vec![
            let_buffer(&b, "buf"),
            b.while_(
                cond(&b),
                vec![b.discard(b.call(
                    "length",
                    index(),
                    vec![b.borrow("buf", buffer(), "S")],
                ))],
            ),
            dealloc(&b, "buf"),
        ],
    );
    let err = check(&b, vec![f]).expect_err("loop borrows outer");
    assert_eq!(kinds(&err), vec![ViolationKind::LinearInLoopBody]);
}

#[test]
fn loop_condition_is_inside_the_loop() {
    let b = Builder::new();
    let f = main(
        &b,
        vec![
            let_buffer(&b, "buf"),
            b.while_(
                b.call("isEmpty", Ty::Bool, vec![b.borrow("buf", buffer(), "S")]),
                vec![],
            ),
            dealloc(&b, "buf"),
        ],
    );
    let err = check(&b, vec![f]).expect_err("condition borrows outer");
    assert_eq!(kinds(&err), vec![ViolationKind::LinearInLoopBody]);
}

#[test]
fn for_bounds_are_inside_the_loop() {
    let b = Builder::new();
    let f = main(
        &b,
        vec![
            let_buffer(&b, "buf"),
            b.for_(
                "i",
                b.int(0),
                b.call("size", Ty::Int, vec![b.borrow("buf", buffer(), "S")]),
                vec![],
            ),
            dealloc(&b, "buf"),
        ],
    );
    let err = check(&b, vec![f]).expect_err("bound borrows outer");
    assert_eq!(kinds(&err), vec![ViolationKind::LinearInLoopBody]);
}

#[test]
fn loop_local_files_closed_each_iteration_are_accepted() {
    let b = Builder::new();
    let f = main(
        &b,
        vec![b.for_(
            "i",
            b.int(0),
            b.int(10),
            vec![
                let_file(&b, "g"),
                b.discard(b.call(
                    "write",
                    Ty::Unit,
                    vec![b.borrow_mut("g", file(), "S"), b.var("i", Ty::Int)],
                )),
                close_file(&b, "g"),
            ],
        )],
    );
    check(&b, vec![f]).expect("g closed every iteration");
}

#[test]
fn loop_local_file_left_open_is_rejected() {
    let b = Builder::new();
    let f = main(&b, vec![b.while_(cond(&b), vec![let_file(&b, "g")])]);
    let err = check(&b, vec![f]).expect_err("g leaks every iteration");
    assert_eq!(kinds(&err), vec![ViolationKind::UnconsumedBinding]);
    assert_eq!(subjects(&err), vec!["g"]);
}

#[test]
fn free_bindings_are_usable_in_loops() {
    let b = Builder::new();
    let f = main(
        &b,
        vec![
            b.let_("total", Ty::Int, b.int(0)),
            b.for_(
                "i",
                b.int(0),
                b.int(3),
                vec![b.assign(
                    b.var("total", Ty::Int),
                    b.binary(
                        BinOp::Add,
                        b.var("total", Ty::Int),
                        b.var("i", Ty::Int),
                        Ty::Int,
                    ),
                )],
            ),
        ],
    );
    check(&b, vec![f]).expect("Free values are unrestricted");
}

#[test]
fn inner_loop_cannot_touch_the_outer_body_bindings() {
    let b = Builder::new();
    let f = main(
        &b,
        vec![b.while_(
            cond(&b),
            vec![
                let_file(&b, "g"),
                b.while_(cond(&b), vec![close_file(&b, "g")]),
                close_file(&b, "g"),
            ],
        )],
    );
    let err = check(&b, vec![f]).expect_err("inner loop closes g");
    assert_eq!(kinds(&err), vec![ViolationKind::LinearInLoopBody]);
    assert_eq!(subjects(&err), vec!["g"]);
}

#[test]
fn early_return_inside_a_loop_still_checks_live_files() {
    let b = Builder::new();
    let f = main(
        &b,
        vec![
            let_file(&b, "f"),
            b.while_(cond(&b), vec![b.ret(b.unit())]),
            close_file(&b, "f"),
        ],
    );
    let err = check(&b, vec![f]).expect_err("return strands f");
    assert_eq!(kinds(&err), vec![ViolationKind::UnconsumedBinding]);
}
