//! E2E: records, field access, and interface-constrained dispatch.

mod common;

use common::{compile_to_aga, compile_to_amm};

const MEASURED: &str = "\
from @std/app import start, print
type Point { x: int64, y: int64 }
interface Measured { fn measure(Measured): int64; }
fn measure(p: Point): int64 = p.x + p.y;
fn sizeOf(m: Measured): int64 = measure(m);
on start {
  const p: Point = new Point { x: 3, y: 4 };
  print(toString(sizeOf(p)));
}
";

#[test]
fn records_lower_to_indexed_arrays() {
    let amm = compile_to_amm(MEASURED);
    // Construction becomes an array with one push per field, in field
    // order; reads become fldarr with the field index.
    assert!(amm.contains("let p: Array<any> = newarr();"));
    assert!(amm.contains("pusharr(p, 3);"));
    assert!(amm.contains("pusharr(p, 4);"));
    assert!(amm.contains("fldarr("));
}

#[test]
fn interface_typed_parameters_inline_at_the_concrete_type() {
    let amm = compile_to_amm(MEASURED);
    // sizeOf(Measured) accepts the Point and its body re-resolves measure
    // against the concrete record; everything inlines down to opcodes.
    assert!(!amm.contains("sizeOf("));
    assert!(!amm.contains("measure("));
    assert!(amm.contains("add("));
}

#[test]
fn exact_overloads_beat_interface_overloads() {
    let amm = compile_to_amm(
        "\
from @std/app import start
type Point { x: int64, y: int64 }
interface Measured { fn measure(Measured): int64; }
fn measure(p: Point): int64 = p.x + p.y;
fn sizeOf(m: Measured): int64 = measure(m);
fn sizeOf(p: Point): int64 = 99;
on start {
  const p: Point = new Point { x: 3, y: 4 };
  const chosen: int64 = sizeOf(p);
}
",
    );
    assert!(amm.contains("const chosen: int64 = 99;"));
    assert!(!amm.contains("fldarr("));
}

#[test]
fn unsatisfied_interfaces_do_not_dispatch() {
    let err = lnc_compile::compile_text(
        "test.ln",
        "\
from @std/app import start
interface Measured { fn measure(Measured): int64; }
fn sizeOf(m: Measured): int64 = measure(m);
on start {
  const chosen: int64 = sizeOf(5);
}
",
        "ln",
        "amm",
    )
    .unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("no matching function"));
}

#[test]
fn record_programs_reach_the_assembly() {
    let aga = compile_to_aga(MEASURED);
    assert!(aga.contains("newarr()"));
    assert!(aga.contains("pusharr("));
    assert!(aga.contains("fldarr("));
    assert!(aga.contains("addi64("));
}

#[test]
fn type_aliases_are_transparent() {
    let amm = compile_to_amm(
        "\
from @std/app import start
type Count = int64;
const limit: Count = 10;
on start {
  const doubled: int64 = limit + limit;
}
",
    );
    // The alias resolves away in the lowered form.
    assert!(amm.contains("const limit: int64 = 10;"));
    assert!(amm.contains("add(limit, limit)"));
}
