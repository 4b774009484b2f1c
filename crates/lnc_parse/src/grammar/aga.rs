//! The AGA grammar — human-readable assembly for the graph-code VM.
//!
//! An AGA text is a version header, an optional `globalMem` block, an
//! optional `customEvents` block, and one or more handler/closure blocks of
//! numbered statements:
//!
//! ```text
//! agav1
//!
//! globalMem
//!   @-8: "Hello, World!"
//!
//! customEvents
//!   start: 0
//!   exit: 8
//!
//! handler for start with size 8
//!   stdoutp(@-8) #0
//!   @0 = seti8(0) #1
//!   emit(2, @0) #2 <- [#1]
//! ```
//!
//! Addresses are signed (globals negative, handler-frame slots non-negative),
//! event payload sizes are signed so `-1` can mark variable-size payloads,
//! and every statement carries its line number plus the line numbers it
//! depends on.

use crate::combinator::{
    lit, named_alt, named_seq, one_or_more, opt, zero_or_more, Combinator,
};

use super::{bool_lit, comma_list, ident, integer, signed_integer, signed_real, string_lit, ws, ws1};

fn name() -> Combinator {
    ident(&[])
}

/// Builds the AGA root combinator.
pub fn aga_grammar() -> Combinator {
    let global_value = named_alt(
        "gmvalue",
        vec![
            ("real", signed_real()),
            ("int", signed_integer()),
            ("bool", bool_lit()),
            ("str", string_lit()),
        ],
    );
    let global_cell = named_seq(
        "gmcell",
        vec![
            ("_", lit("@")),
            ("addr", signed_integer()),
            ("_", lit(":")),
            ("_", ws()),
            ("value", global_value),
            ("_", ws()),
        ],
    );
    let global_block = named_seq(
        "globalmem",
        vec![
            ("_", lit("globalMem")),
            ("_", ws()),
            ("cells", zero_or_more(global_cell)),
        ],
    );

    let event_line = named_seq(
        "ceitem",
        vec![
            ("name", name()),
            ("_", lit(":")),
            ("_", ws()),
            ("size", signed_integer()),
            ("_", ws()),
        ],
    );
    let events_block = named_seq(
        "customevents",
        vec![
            ("_", lit("customEvents")),
            ("_", ws()),
            ("events", zero_or_more(event_line)),
        ],
    );

    let arg = named_alt(
        "agaarg",
        vec![
            (
                "addr",
                named_seq("agaaddr", vec![("_", lit("@")), ("addr", signed_integer())]),
            ),
            ("real", signed_real()),
            ("int", signed_integer()),
        ],
    );

    let dest = named_seq(
        "agadest",
        vec![
            ("_", lit("@")),
            ("addr", signed_integer()),
            ("_", ws()),
            ("_", lit("=")),
            ("_", ws()),
        ],
    );

    let dep_ref = named_seq("depref", vec![("_", lit("#")), ("line", integer())]);
    let deps = named_seq(
        "agadeps",
        vec![
            ("_", lit("<-")),
            ("_", ws()),
            ("_", lit("[")),
            ("_", ws()),
            ("list", opt(comma_list("deplist", dep_ref))),
            ("_", ws()),
            ("_", lit("]")),
        ],
    );

    let stmt_line = named_seq(
        "agastmt",
        vec![
            ("dest", opt(dest)),
            ("op", name()),
            ("_", lit("(")),
            ("_", ws()),
            ("args", opt(comma_list("agaargs", arg))),
            ("_", ws()),
            ("_", lit(")")),
            ("_", ws()),
            ("_", lit("#")),
            ("line", integer()),
            (
                "deps",
                opt(named_seq(
                    "agadepsclause",
                    vec![("_", ws1()), ("clause", deps)],
                )),
            ),
            ("_", ws()),
        ],
    );

    let handler_block = named_seq(
        "handlerblock",
        vec![
            (
                "kind",
                named_alt(
                    "handlerkind",
                    vec![("handler", lit("handler")), ("closure", lit("closure"))],
                ),
            ),
            ("_", ws1()),
            ("_", lit("for")),
            ("_", ws1()),
            ("event", name()),
            ("_", ws1()),
            ("_", lit("with")),
            ("_", ws1()),
            ("_", lit("size")),
            ("_", ws1()),
            ("size", integer()),
            ("_", ws()),
            ("stmts", zero_or_more(stmt_line)),
        ],
    );

    named_seq(
        "aga",
        vec![
            ("_", ws()),
            ("_", lit("agav1")),
            ("_", ws()),
            ("globals", opt(global_block)),
            ("_", ws()),
            ("events", opt(events_block)),
            ("_", ws()),
            ("handlers", one_or_more(handler_block)),
            ("_", ws()),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinator::parse_text;
    use crate::cst::CstContext;
    use lnc_base::Arena;

    macro_rules! with_ctx {
        ($ctx:ident, $body:block) => {
            let nodes = Arena::new();
            let refs = Arena::new();
            let fields = Arena::new();
            let texts = Arena::new();
            let $ctx = CstContext::new(&nodes, &refs, &fields, &texts);
            $body
        };
    }

    #[test]
    fn parses_a_full_program() {
        with_ctx!(ctx, {
            let source = "\
agav1

globalMem
  @-8: \"Hello, World!\"
  @-32: 3.14

customEvents
  start: 0
  stdout: -1
  exit: 8

handler for _start with size 0
  emit(0) #0

handler for start with size 8
  stdoutp(@-8) #0
  @0 = seti8(0) #1
  emit(2, @0) #2 <- [#1]
";
            let program = parse_text(ctx, &aga_grammar(), "main.aga", source).unwrap();
            let globals = program.req("globals").req("cells").children();
            assert_eq!(globals.len(), 2);
            let handlers = program.req("handlers").children();
            assert_eq!(handlers.len(), 2);
        });
    }

    #[test]
    fn parses_closure_blocks_and_dep_lists() {
        with_ctx!(ctx, {
            let source = "\
agav1

customEvents
  tick: 8
  f: 0

handler for tick with size 24
  @8 = seti64(3) #0
  @16 = callfn(1, @8) #1 <- [#0]

closure for f with size 24
  @0 = muli64(@8, @8) #0
";
            let program = parse_text(ctx, &aga_grammar(), "clo.aga", source).unwrap();
            assert_eq!(program.req("handlers").children().len(), 2);
        });
    }

    #[test]
    fn header_is_mandatory() {
        with_ctx!(ctx, {
            let source = "handler for _start with size 0\n";
            assert!(parse_text(ctx, &aga_grammar(), "bad.aga", source).is_err());
        });
    }

    #[test]
    fn global_strings_may_contain_escapes() {
        with_ctx!(ctx, {
            let source = "agav1\nglobalMem\n  @-8: \"line\\none\"\nhandler for _start with size 0\n";
            parse_text(ctx, &aga_grammar(), "esc.aga", source).unwrap();
        });
    }
}
