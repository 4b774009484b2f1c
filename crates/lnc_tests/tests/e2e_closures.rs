//! E2E: closures extracted as synthetic events.

mod common;

use common::{compile_to_aga, compile_to_agc, tag_positions, words};

const CLOSURE: &str = "\
from @std/app import start, print
on start {
  const f = fn (n: int64): int64 { n * 2 };
  const y: int64 = f(3);
  print(toString(y));
}
";

#[test]
fn aga_carries_the_original_and_the_synthetic_handler() {
    let aga = compile_to_aga(CLOSURE);
    assert!(aga.contains("handler for start with size "));
    assert!(aga.contains("closure for f with size "));
    // Synthetic events declare size 0 after the declared events
    // (start, stdout, exit → ids 0..2, so f is id 3).
    assert!(aga.contains("  f: 0"));
}

#[test]
fn caller_references_the_synthetic_id_as_first_argument() {
    let aga = compile_to_aga(CLOSURE);
    assert!(aga.contains("callfn(3, "));
}

#[test]
fn closure_blocks_share_the_enclosing_frame_size() {
    let aga = compile_to_aga(CLOSURE);
    let handler_size = block_size(&aga, "handler for start with size ");
    let closure_size = block_size(&aga, "closure for f with size ");
    assert_eq!(handler_size, closure_size);

    fn block_size(aga: &str, prefix: &str) -> u64 {
        let at = aga.find(prefix).expect("block exists");
        aga[at + prefix.len()..]
            .split_whitespace()
            .next()
            .expect("size follows")
            .parse()
            .expect("size is numeric")
    }
}

#[test]
fn agc_packs_one_handler_block_per_event() {
    let agc = compile_to_agc(CLOSURE);
    let words = words(&agc);
    // _start bridge + start handler + one synthetic closure block.
    assert_eq!(tag_positions(&words, "handler:").len(), 3);
    // Four eventdd records: start, stdout, exit, and the synthetic f.
    assert_eq!(tag_positions(&words, "eventdd:").len(), 4);
}

#[test]
fn nested_closures_extract_recursively() {
    let aga = compile_to_aga(
        "\
from @std/app import start
on start {
  const outer = fn (): void {
    const inner = fn (): void {
      const k: int64 = 1;
    };
    inner();
  };
  outer();
}
",
    );
    assert!(aga.contains("closure for outer with size "));
    assert!(aga.contains("closure for inner with size "));
}
