//! E2E: module constants and global memory layout.

mod common;

use common::{compile_to_aga, compile_to_agc, word_at};

#[test]
fn single_float_constant_occupies_one_word() {
    let agc = compile_to_agc("from @std/app import start\nconst pi: float64 = 3.14;\non start { }\n");
    assert_eq!(word_at(&agc, 1), 8);
    assert_eq!(word_at(&agc, 2), 3.14f64.to_bits());
}

#[test]
fn constants_lay_out_downward_from_minus_eight() {
    let aga = compile_to_aga(
        "from @std/app import start\nconst a: int64 = 1;\nconst b: int64 = 2;\nconst words: string = 'twelve bytes';\nconst c: bool = true;\non start { }\n",
    );
    assert!(aga.contains("@-8: 1"));
    assert!(aga.contains("@-16: 2"));
    assert!(aga.contains("@-24: \"twelve bytes\""));
    // 8 length bytes + 16 padded text bytes for the string.
    assert!(aga.contains("@-48: true"));
}

#[test]
fn computed_constants_fold_before_layout() {
    let agc = compile_to_agc(
        "from @std/app import start\nconst six: int64 = 2 * 3;\nconst neg: int64 = -8;\non start { }\n",
    );
    assert_eq!(word_at(&agc, 1), 16);
    assert_eq!(word_at(&agc, 2), 6);
    assert_eq!(word_at(&agc, 3), (-8i64) as u64);
}

#[test]
fn aliased_constants_copy_their_source_value() {
    let agc = compile_to_agc(
        "from @std/app import start\nconst base: int64 = 7;\nconst alias: int64 = base;\non start { }\n",
    );
    assert_eq!(word_at(&agc, 2), 7);
    assert_eq!(word_at(&agc, 3), 7);
}
