//! E2E: the error taxonomy, exit codes, and diagnostic format.

mod common;

use lnc_compile::compile_text;

fn compile_err(source: &str) -> lnc_base::CompileError {
    compile_text("test.ln", source, "ln", "agc").unwrap_err()
}

#[test]
fn parse_errors_exit_one_and_point_at_the_source() {
    let err = compile_err("on start {\n");
    assert_eq!(err.exit_code(), 1);
    let text = err.to_string();
    assert!(text.contains("in file test.ln line "));
}

#[test]
fn undefined_identifiers_exit_two() {
    let err = compile_err("from @std/app import start\non start { missing(1); }\n");
    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("missing"));
}

#[test]
fn dispatch_failures_name_the_argument_types() {
    let err = compile_err(
        "from @std/app import start\non start { const x: int64 = add(1, true); }\n",
    );
    assert_eq!(err.exit_code(), 2);
    let text = err.to_string();
    assert!(text.contains("no matching function"));
    assert!(text.contains("bool"));
}

#[test]
fn width_overflow_exits_three() {
    let err = compile_err("from @std/app import start, exit\non start { emit exit 1000; }\n");
    assert_eq!(err.exit_code(), 3);
    assert!(err.to_string().contains("does not fit in int8"));
}

#[test]
fn branch_type_mismatch_is_a_type_error() {
    let err = compile_err(
        "from @std/app import start\nconst f: bool = true;\non start { const x: int64 = if f { 1 } else { 'two' }; }\n",
    );
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn duplicate_bindings_are_scope_errors() {
    let err = compile_err("from @std/app import start\nconst x: int64 = 1;\nconst x: int64 = 2;\non start { }\n");
    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("cannot redefine"));
}

#[test]
fn unknown_std_modules_exit_four() {
    let err = compile_err("import @std/teleport\n");
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn diagnostics_carry_line_and_column() {
    let err = compile_err("from @std/app import start\non start { const x: int64 = nope; }\n");
    let text = err.to_string();
    // line 2, somewhere after column 20.
    assert!(text.contains("in file test.ln line 2:"));
}
