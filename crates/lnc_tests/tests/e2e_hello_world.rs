//! E2E: the canonical hello-world program through every stage.

mod common;

use common::{compile_to_agc, compile_to_amm, tag_positions, word_at, words};
use lnc_compile::builtin_event_id;

const HELLO: &str = "\
from @std/app import start, print, exit
on start { print('Hello, World!'); emit exit 0; }
";

#[test]
fn amm_has_one_start_handler_with_three_statements() {
    let amm = compile_to_amm(HELLO);

    // Exactly one handler bound to `start` (the bridge handler binds
    // `_start`).
    assert_eq!(amm.matches("on start fn (): void {").count(), 1);

    let body_start = amm.find("on start fn (): void {").unwrap();
    let body = &amm[body_start..];
    let body_end = body.find("\n}").unwrap();
    let body = &body[..body_end];
    let statements: Vec<&str> = body
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    assert_eq!(
        statements,
        vec!["print('Hello, World!');", "emit exit 0;", "return;"]
    );
}

#[test]
fn amm_declares_the_app_events() {
    let amm = compile_to_amm(HELLO);
    assert!(amm.contains("event start;"));
    assert!(amm.contains("event stdout: string;"));
    assert!(amm.contains("event exit: int8;"));
}

#[test]
fn agc_starts_with_the_magic_word() {
    let agc = compile_to_agc(HELLO);
    assert_eq!(&agc[0..8], b"agc00001");
}

#[test]
fn agc_has_a_handler_block_for_event_id_zero() {
    let agc = compile_to_agc(HELLO);
    let words = words(&agc);

    // `start` is the first declared custom event, so one handler block
    // carries event id 0; the bridge handler carries the builtin id.
    let handler_ids: Vec<u64> = tag_positions(&words, "handler:")
        .into_iter()
        .map(|idx| words[idx + 1])
        .collect();
    assert!(handler_ids.contains(&0));
    assert!(handler_ids.contains(&builtin_event_id("_start")));
}

#[test]
fn agc_global_memory_carries_the_greeting() {
    let agc = compile_to_agc(HELLO);
    // Greeting string: 8 length bytes + 16 padded text bytes.
    assert_eq!(word_at(&agc, 1), 24);
    assert_eq!(word_at(&agc, 2), 13);
    assert_eq!(&agc[24..37], b"Hello, World!");
}
