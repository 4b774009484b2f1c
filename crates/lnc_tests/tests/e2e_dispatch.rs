//! E2E: multiple dispatch through the pipeline.

mod common;

use common::{compile_to_aga, compile_to_amm};
use lnc_compile::compile_text;

#[test]
fn integer_call_selects_the_integer_overload() {
    let amm = compile_to_amm(
        "from @std/app import start\non start { const r: int64 = add(1, 2); }\n",
    );
    assert!(amm.contains("const r: int64 = add(1, 2);"));
}

#[test]
fn float_call_selects_the_float_overload_downstream() {
    let aga = compile_to_aga(
        "from @std/app import start\non start { const r: float64 = add(1.5, 2.5); }\n",
    );
    assert!(aga.contains("addf64"));
    assert!(!aga.contains("addi64"));
}

#[test]
fn integer_call_assembles_to_the_integer_opcode() {
    let aga = compile_to_aga(
        "from @std/app import start\non start { const r: int64 = add(1, 2); }\n",
    );
    assert!(aga.contains("addi64"));
    assert!(!aga.contains("addf64"));
}

#[test]
fn user_overloads_participate_in_dispatch() {
    let amm = compile_to_amm(
        "from @std/app import start, print\n\
         fn describe(n: int64): string = concat('int ', toString(n));\n\
         fn describe(b: bool): string = concat('bool ', toString(b));\n\
         on start { print(describe(42)); }\n",
    );
    // The int64 overload inlines; its literal prefix survives.
    assert!(amm.contains("'int '"));
    assert!(!amm.contains("'bool '"));
}

#[test]
fn ambiguous_calls_fail_with_the_resolver_exit_code() {
    let err = compile_text(
        "test.ln",
        "from @std/app import start\n\
         fn pick(a: int64): int64 = a;\n\
         fn pick(b: int64): int64 = b;\n\
         on start { const x: int64 = pick(1); }\n",
        "ln",
        "amm",
    )
    .unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("ambiguous"));
}

#[test]
fn method_syntax_is_dispatch_sugar() {
    let amm = compile_to_amm(
        "from @std/app import start, print\non start { print(42.toString()); }\n",
    );
    // `42.toString()` and `toString(42)` are the same call.
    assert!(amm.contains("toString(42)"));
}
