//! Shared helpers for the end-to-end suites.

#![allow(dead_code)]

use lnc_compile::{compile_text, Artifact};

/// Compiles LN source text to the AMM intermediate form.
pub fn compile_to_amm(source: &str) -> String {
    match compile_text("test.ln", source, "ln", "amm").expect("compiles to amm") {
        Artifact::Text(text) => text,
        other => panic!("expected amm text, got {:?}", other),
    }
}

/// Compiles LN source text to AGA assembly.
pub fn compile_to_aga(source: &str) -> String {
    match compile_text("test.ln", source, "ln", "aga").expect("compiles to aga") {
        Artifact::Text(text) => text,
        other => panic!("expected aga text, got {:?}", other),
    }
}

/// Compiles LN source text all the way to AGC bytes.
pub fn compile_to_agc(source: &str) -> Vec<u8> {
    match compile_text("test.ln", source, "ln", "agc").expect("compiles to agc") {
        Artifact::Bytes(bytes) => bytes,
        other => panic!("expected agc bytes, got {:?}", other),
    }
}

/// The `n`-th little-endian 64-bit word of a byte stream.
pub fn word_at(bytes: &[u8], index: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes[index * 8..index * 8 + 8]);
    u64::from_le_bytes(word)
}

/// All 64-bit words of a byte stream.
pub fn words(bytes: &[u8]) -> Vec<u64> {
    bytes.chunks(8).map(|chunk| {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        u64::from_le_bytes(word)
    }).collect()
}

/// Positions of a tag word within a word stream.
pub fn tag_positions(words: &[u64], tag: &str) -> Vec<usize> {
    let needle = lnc_compile::ascii_word(tag);
    words
        .iter()
        .enumerate()
        .filter(|(_, w)| **w == needle)
        .map(|(idx, _)| idx)
        .collect()
}
