//! E2E: conditional chains as dispatch tables.

mod common;

use common::{compile_to_aga, compile_to_amm};

const CHAIN: &str = "\
from @std/app import start, print
const x: int64 = 5;
on start {
  if x > 0 { print('pos'); } else if x < 0 { print('neg'); } else { print('zero'); }
}
";

#[test]
fn chain_lowers_to_three_pairs_and_one_evalcond() {
    let amm = compile_to_amm(CHAIN);
    // Three (condition, closure) pairs — the terminal else rides a `true`
    // condition — pushed in source order.
    assert_eq!(amm.matches("pusharr(").count(), 6);
    assert_eq!(amm.matches("const _t").count() + amm.matches("let _t").count(), 6);
    assert!(amm.contains("pusharr(_t0, true);"));
    assert_eq!(amm.matches("evalcond(").count(), 1);
}

#[test]
fn branches_become_closures_in_declaration_order() {
    let amm = compile_to_amm(CHAIN);
    let pos = amm.find("'pos'").unwrap();
    let neg = amm.find("'neg'").unwrap();
    let zero = amm.find("'zero'").unwrap();
    assert!(pos < neg && neg < zero);
}

#[test]
fn table_reaches_the_assembly_as_synthetic_events() {
    let aga = compile_to_aga(CHAIN);
    // One closure block per branch.
    assert_eq!(aga.matches("closure for ").count(), 3);
    assert!(aga.contains("evalcond(@0)"));
}

#[test]
fn value_position_conditionals_assign_their_result() {
    let amm = compile_to_amm(
        "from @std/app import start\nconst flag: bool = true;\non start { const x: int64 = if flag { 1 } else { 2 }; }\n",
    );
    // The result variable is declared up front and assigned in each branch.
    assert!(amm.contains("let x: int64 = 0;"));
    assert!(amm.contains("x = 1;"));
    assert!(amm.contains("x = 2;"));
}
