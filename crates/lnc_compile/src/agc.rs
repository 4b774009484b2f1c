//! The AGC writer: AGA text packed into the binary graph-code container.
//!
//! The container is a stream of little-endian 64-bit words:
//!
//! ```text
//! word[0]        = "agc00001"
//! word[1]        = global_mem_size_bytes
//! word[2..2+N]   = global memory words
//! repeated { "eventdd:", event_id, payload_size }
//! repeated {
//!   "handler:", event_id, frame_size_bytes
//!   repeated { "lineno: ", line, dep_count, deps..., opcode, arg1, arg2, arg3 }
//! }
//! ```
//!
//! ASCII tags are exactly 8 bytes, left-aligned and space-padded. The three
//! runtime events are not declared in the event table; their ids are their
//! 8-byte ASCII names with the high bit of the final byte set. Signed
//! values (addresses, payload sizes) travel as two's-complement `u64`; the
//! reader recovers sign from the declared type.
//!
//! The writer accepts hand-written AGA, so it re-validates what it packs:
//! opcode names must fit 8 ASCII bytes, a statement carries at most two
//! operand words, and dependencies must point at earlier lines.

use lnc_base::CompileError;
use lnc_parse::grammar::{collect_list, decode_string};
use lnc_parse::{parse_aga, Cst, ParseArenas};

/// The 8-byte magic at offset 0 of every AGC file.
pub const MAGIC: &str = "agc00001";

/// Packs an 8-byte ASCII tag into its little-endian word.
pub fn ascii_word(tag: &str) -> u64 {
    let mut bytes = [0x20u8; 8];
    for (slot, byte) in bytes.iter_mut().zip(tag.bytes()) {
        *slot = byte;
    }
    u64::from_le_bytes(bytes)
}

/// The id of a runtime-defined event: its space-padded ASCII name with the
/// high bit of the last byte set.
pub fn builtin_event_id(name: &str) -> u64 {
    let mut bytes = [0x20u8; 8];
    for (slot, byte) in bytes.iter_mut().zip(name.bytes()) {
        *slot = byte;
    }
    bytes[7] |= 0x80;
    u64::from_le_bytes(bytes)
}

/// Converts AGA text to AGC bytes.
pub fn write_agc(aga_text: &str) -> lnc_base::Result<Vec<u8>> {
    let arenas = ParseArenas::new();
    let aga = parse_aga(arenas.ctx(), "<aga>", aga_text)?;

    let mut words: Vec<u64> = vec![ascii_word(MAGIC)];

    // Global memory.
    let mut global_words: Vec<u64> = Vec::new();
    let globals_node = aga.req("globals");
    if !globals_node.is_null() {
        let mut expected_addr: i64 = -8;
        for cell in globals_node.req("cells").children() {
            let addr: i64 = parse_int(cell.req("addr"))?;
            if addr != expected_addr {
                return Err(CompileError::emission(format!(
                    "global cell at @{} breaks the layout; expected @{}",
                    addr, expected_addr
                )));
            }
            let before = global_words.len() as i64;
            pack_global(cell.req("value"), &mut global_words)?;
            expected_addr -= (global_words.len() as i64 - before) * 8;
        }
    }
    words.push((global_words.len() * 8) as u64);
    words.extend_from_slice(&global_words);

    // Declared and synthetic events.
    let mut event_names: Vec<String> = Vec::new();
    let events_node = aga.req("events");
    if !events_node.is_null() {
        for (id, event) in events_node.req("events").children().iter().enumerate() {
            let name = event.req("name").text().to_string();
            let size: i64 = parse_int(event.req("size"))?;
            words.push(ascii_word("eventdd:"));
            words.push(id as u64);
            words.push(size as u64);
            event_names.push(name);
        }
    }

    // Handlers, including extracted closures.
    for handler in aga.req("handlers").children() {
        let event = handler.req("event").text();
        let event_id = match event_names.iter().position(|n| n == event) {
            Some(idx) => idx as u64,
            None if lnc_semantic::builtin::BUILTIN_EVENTS.contains(&event) => {
                builtin_event_id(event)
            }
            None => {
                return Err(CompileError::emission(format!(
                    "handler references unknown event `{}`",
                    event
                )))
            }
        };
        let frame_size: i64 = parse_int(handler.req("size"))?;
        words.push(ascii_word("handler:"));
        words.push(event_id);
        words.push(frame_size as u64);

        for stmt in handler.req("stmts").children() {
            pack_statement(stmt, &mut words)?;
        }
    }

    let mut bytes = Vec::with_capacity(words.len() * 8);
    for word in words {
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    log::debug!("packed {} bytes of agc", bytes.len());
    Ok(bytes)
}

fn pack_statement(stmt: &Cst<'_>, words: &mut Vec<u64>) -> lnc_base::Result<()> {
    let line: u64 = parse_int(stmt.req("line"))? as u64;

    let mut deps: Vec<u64> = Vec::new();
    let deps_node = stmt.req("deps");
    if !deps_node.is_null() {
        let list = deps_node.req("clause").req("list");
        for dep in collect_list(list) {
            let dep_line: u64 = parse_int(dep.req("line"))? as u64;
            if dep_line >= line {
                return Err(CompileError::emission(format!(
                    "line {} depends on #{}, which is not an earlier line",
                    line, dep_line
                )));
            }
            deps.push(dep_line);
        }
    }

    let opcode = stmt.req("op").text();
    if opcode.len() > 8 || !opcode.is_ascii() {
        return Err(CompileError::emission(format!(
            "`{}` is not a packable opcode name (over 8 bytes or non-ascii)",
            opcode
        )));
    }

    let mut arg_words: Vec<u64> = Vec::new();
    let args_node = stmt.req("args");
    if !args_node.is_null() {
        for arg in collect_list(args_node) {
            arg_words.push(pack_arg(arg)?);
        }
    }
    if arg_words.len() > 2 {
        return Err(CompileError::emission(format!(
            "line {} carries {} operands; statements pack at most two",
            line,
            arg_words.len()
        )));
    }
    while arg_words.len() < 2 {
        arg_words.push(0);
    }

    let dest_node = stmt.req("dest");
    let result_word = if dest_node.is_null() {
        0u64
    } else {
        parse_int(dest_node.req("addr"))? as u64
    };

    words.push(ascii_word("lineno: "));
    words.push(line);
    words.push(deps.len() as u64);
    words.extend_from_slice(&deps);
    words.push(ascii_word(opcode));
    words.extend_from_slice(&arg_words);
    words.push(result_word);
    Ok(())
}

fn pack_arg(arg: &Cst<'_>) -> lnc_base::Result<u64> {
    let inner = arg.unwrap_choice();
    match arg.label() {
        Some("addr") => Ok(parse_int_node(inner.req("addr"))? as u64),
        Some("real") => {
            let value: f64 = inner.text().parse().map_err(|_| {
                CompileError::emission(format!("malformed real operand `{}`", inner.text()))
            })?;
            Ok(value.to_bits())
        }
        _ => Ok(parse_int_node(inner)? as u64),
    }
}

fn pack_global(value: &Cst<'_>, words: &mut Vec<u64>) -> lnc_base::Result<()> {
    let inner = value.unwrap_choice();
    match value.label() {
        Some("int") => {
            let v: i64 = parse_int_node(inner)?;
            words.push(v as u64);
        }
        Some("real") => {
            let v: f64 = inner.text().parse().map_err(|_| {
                CompileError::emission(format!("malformed real global `{}`", inner.text()))
            })?;
            words.push(v.to_bits());
        }
        Some("bool") => {
            words.push(u64::from(inner.text() == "true"));
        }
        Some("str") => {
            let text = decode_string(value.choice_inner().unwrap_or(inner));
            // Length first as a signed LE word, then the bytes padded to
            // the next 8-byte boundary.
            words.push(text.len() as u64);
            for chunk in text.as_bytes().chunks(8) {
                let mut word = [0u8; 8];
                word[..chunk.len()].copy_from_slice(chunk);
                words.push(u64::from_le_bytes(word));
            }
        }
        other => {
            return Err(CompileError::emission(format!(
                "unrecognised global value form {:?}",
                other
            )))
        }
    }
    Ok(())
}

fn parse_int(node: &Cst<'_>) -> lnc_base::Result<i64> {
    parse_int_node(node)
}

fn parse_int_node(node: &Cst<'_>) -> lnc_base::Result<i64> {
    node.text().parse().map_err(|_| {
        CompileError::emission(format!("malformed integer `{}`", node.text()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word_at(bytes: &[u8], index: usize) -> u64 {
        let mut word = [0u8; 8];
        word.copy_from_slice(&bytes[index * 8..index * 8 + 8]);
        u64::from_le_bytes(word)
    }

    #[test]
    fn magic_occupies_the_first_eight_bytes() {
        let agc = write_agc("agav1\nhandler for _start with size 0\n").unwrap();
        assert_eq!(&agc[0..8], b"agc00001");
        assert_eq!(word_at(&agc, 1), 0);
    }

    #[test]
    fn float_globals_pack_their_bit_pattern() {
        let agc = write_agc("agav1\nglobalMem\n  @-8: 3.14\nhandler for _start with size 0\n")
            .unwrap();
        assert_eq!(word_at(&agc, 1), 8);
        assert_eq!(word_at(&agc, 2), 3.14f64.to_bits());
    }

    #[test]
    fn string_globals_store_length_then_padded_bytes() {
        let agc = write_agc(
            "agav1\nglobalMem\n  @-8: \"Hello, World!\"\nhandler for _start with size 0\n",
        )
        .unwrap();
        assert_eq!(word_at(&agc, 1), 24);
        assert_eq!(word_at(&agc, 2), 13);
        let mut text = Vec::new();
        text.extend_from_slice(&agc[24..24 + 16]);
        assert_eq!(&text[..13], b"Hello, World!");
        assert!(text[13..].iter().all(|b| *b == 0));
    }

    #[test]
    fn events_pack_id_and_signed_size() {
        let agc = write_agc(
            "agav1\ncustomEvents\n  start: 0\n  stdout: -1\nhandler for start with size 0\n",
        )
        .unwrap();
        assert_eq!(word_at(&agc, 2), ascii_word("eventdd:"));
        assert_eq!(word_at(&agc, 3), 0);
        assert_eq!(word_at(&agc, 4), 0);
        assert_eq!(word_at(&agc, 5), ascii_word("eventdd:"));
        assert_eq!(word_at(&agc, 6), 1);
        assert_eq!(word_at(&agc, 7), u64::MAX);
    }

    #[test]
    fn builtin_event_ids_set_the_high_bit_of_the_last_byte() {
        let id = builtin_event_id("_start");
        let bytes = id.to_le_bytes();
        assert_eq!(&bytes[..6], b"_start");
        assert_eq!(bytes[6], 0x20);
        assert_eq!(bytes[7], 0xA0);
    }

    #[test]
    fn statements_pack_line_deps_opcode_and_three_args() {
        let agc = write_agc(
            "agav1\nhandler for _start with size 16\n  @0 = seti64(5) #0\n  @8 = addi64(@0, @0) #1 <- [#0]\n",
        )
        .unwrap();
        // handler:, id, size
        assert_eq!(word_at(&agc, 2), ascii_word("handler:"));
        assert_eq!(word_at(&agc, 3), builtin_event_id("_start"));
        assert_eq!(word_at(&agc, 4), 16);
        // first statement: no deps
        assert_eq!(word_at(&agc, 5), ascii_word("lineno: "));
        assert_eq!(word_at(&agc, 6), 0);
        assert_eq!(word_at(&agc, 7), 0);
        assert_eq!(word_at(&agc, 8), ascii_word("seti64"));
        assert_eq!(word_at(&agc, 9), 5);
        assert_eq!(word_at(&agc, 10), 0);
        assert_eq!(word_at(&agc, 11), 0);
        // second statement: one dep, negative-free addresses
        assert_eq!(word_at(&agc, 12), ascii_word("lineno: "));
        assert_eq!(word_at(&agc, 13), 1);
        assert_eq!(word_at(&agc, 14), 1);
        assert_eq!(word_at(&agc, 15), 0);
        assert_eq!(word_at(&agc, 16), ascii_word("addi64"));
        assert_eq!(word_at(&agc, 17), 0);
        assert_eq!(word_at(&agc, 18), 0);
        assert_eq!(word_at(&agc, 19), 8);
    }

    #[test]
    fn negative_addresses_travel_as_twos_complement() {
        let agc = write_agc(
            "agav1\nglobalMem\n  @-8: 1\nhandler for _start with size 0\n  stdoutp(@-8) #0\n",
        )
        .unwrap();
        // words: magic, size, global, handler:, id, frame, lineno:, 0, 0, opcode, args...
        assert_eq!(word_at(&agc, 10), (-8i64) as u64);
    }

    #[test]
    fn forward_dependencies_are_rejected() {
        let err = write_agc(
            "agav1\nhandler for _start with size 8\n  @0 = seti64(1) #0 <- [#2]\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("not an earlier line"));
    }

    #[test]
    fn oversized_opcode_names_are_rejected() {
        let err = write_agc(
            "agav1\nhandler for _start with size 0\n  anoverlongopcode() #0\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("not a packable opcode name"));
    }

    #[test]
    fn statements_with_three_operands_are_rejected() {
        let err = write_agc(
            "agav1\nhandler for _start with size 0\n  weird(@0, @8, @16) #0\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("at most two"));
    }
}
