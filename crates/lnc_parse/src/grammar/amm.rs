//! The AMM grammar — the lowered, type-resolved intermediate form.
//!
//! AMM is a strict subset of the surface syntax: module-level `const` and
//! `event` declarations plus handlers whose bodies are flat statement lists.
//! Every declaration carries an explicit type, calls take arglists of
//! variables and literals, and the only nested functions are closures
//! assigned to a `const`. Operators, generics on functions, and control flow
//! are gone; conditional chains have already been lowered to dispatch
//! tables by the time text reaches this grammar.

use crate::combinator::{
    lit, named_alt, named_seq, opt, zero_or_more, Combinator, DeferredSlot,
};

use super::{
    bool_lit, comma_list, ident, signed_integer, signed_real, string_lit, ws, ws1,
};

/// Reserved words of AMM.
pub const KEYWORDS: &[&str] = &[
    "const", "let", "on", "event", "fn", "emit", "return", "void", "true", "false",
];

fn id() -> Combinator {
    ident(KEYWORDS)
}

/// Builds the AMM root combinator.
pub fn amm_grammar() -> Combinator {
    let type_slot = DeferredSlot::new();
    let typename = type_slot.combinator();

    // Type positions are unambiguous, so type names take the unrestricted
    // identifier form; `void` in particular is both a keyword and a type.
    let type_rule = named_seq(
        "typename",
        vec![
            ("name", ident(&[])),
            (
                "args",
                opt(named_seq(
                    "typeargs",
                    vec![
                        ("_", ws()),
                        ("_", lit("<")),
                        ("_", ws()),
                        ("list", comma_list("typelist", typename.clone())),
                        ("_", ws()),
                        ("_", lit(">")),
                    ],
                )),
            ),
        ],
    );
    type_slot.fill(type_rule);

    let type_annot = named_seq(
        "typeannot",
        vec![("_", ws()), ("_", lit(":")), ("_", ws()), ("type", typename.clone())],
    );

    let literal = named_alt(
        "ammliteral",
        vec![
            ("real", signed_real()),
            ("int", signed_integer()),
            ("str", string_lit()),
            ("bool", bool_lit()),
        ],
    );

    // A call argument or assignment source: one variable or one literal.
    let operand = named_alt("ammoperand", vec![("var", id()), ("literal", literal.clone())]);

    let call = named_seq(
        "ammcall",
        vec![
            ("name", id()),
            ("_", ws()),
            ("_", lit("(")),
            ("_", ws()),
            ("args", opt(comma_list("ammargs", operand.clone()))),
            ("_", ws()),
            ("_", lit(")")),
        ],
    );

    let param = named_seq(
        "param",
        vec![
            ("name", id()),
            ("_", ws()),
            ("_", lit(":")),
            ("_", ws()),
            ("type", typename.clone()),
        ],
    );
    let param_clause = named_seq(
        "paramclause",
        vec![
            ("_", lit("(")),
            ("_", ws()),
            ("list", opt(comma_list("paramlist", param))),
            ("_", ws()),
            ("_", lit(")")),
        ],
    );

    let block_slot = DeferredSlot::new();
    let block = block_slot.combinator();

    let closure = named_seq(
        "ammclosure",
        vec![
            ("_", lit("fn")),
            ("_", ws()),
            ("params", opt(param_clause.clone())),
            ("ret", opt(type_annot.clone())),
            ("_", ws()),
            ("body", block.clone()),
        ],
    );

    let rhs = named_alt(
        "ammrhs",
        vec![
            ("closure", closure),
            ("call", call.clone()),
            ("literal", literal),
            ("var", id()),
        ],
    );

    let const_decl = named_seq(
        "ammconst",
        vec![
            ("_", lit("const")),
            ("_", ws1()),
            ("name", id()),
            ("typeannot", type_annot.clone()),
            ("_", ws()),
            ("_", lit("=")),
            ("_", ws()),
            ("value", rhs.clone()),
            ("_", ws()),
            ("_", lit(";")),
        ],
    );
    let let_decl = named_seq(
        "ammlet",
        vec![
            ("_", lit("let")),
            ("_", ws1()),
            ("name", id()),
            ("typeannot", type_annot.clone()),
            ("_", ws()),
            ("_", lit("=")),
            ("_", ws()),
            ("value", rhs),
            ("_", ws()),
            ("_", lit(";")),
        ],
    );
    let assignment = named_seq(
        "ammassign",
        vec![
            ("name", id()),
            ("_", ws()),
            ("_", lit("=")),
            ("_", ws()),
            ("value", operand.clone()),
            ("_", ws()),
            ("_", lit(";")),
        ],
    );
    let call_stmt = named_seq(
        "ammcallstmt",
        vec![("call", call), ("_", ws()), ("_", lit(";"))],
    );
    let emit_stmt = named_seq(
        "ammemit",
        vec![
            ("_", lit("emit")),
            ("_", ws1()),
            ("event", id()),
            (
                "arg",
                opt(named_seq(
                    "ammemitarg",
                    vec![("_", ws1()), ("value", operand)],
                )),
            ),
            ("_", ws()),
            ("_", lit(";")),
        ],
    );
    let return_stmt = named_seq(
        "ammreturn",
        vec![("_", lit("return")), ("_", ws()), ("_", lit(";"))],
    );

    let stmt = named_alt(
        "ammstmt",
        vec![
            ("constdecl", const_decl.clone()),
            ("letdecl", let_decl),
            ("assignment", assignment),
            ("call", call_stmt),
            ("emit", emit_stmt),
            ("return", return_stmt),
        ],
    );

    let block_rule = named_seq(
        "ammblock",
        vec![
            ("_", lit("{")),
            ("_", ws()),
            (
                "stmts",
                zero_or_more(named_seq(
                    "ammblockstmt",
                    vec![("stmt", stmt), ("_", ws())],
                )),
            ),
            ("_", lit("}")),
        ],
    );
    block_slot.fill(block_rule);

    let event_decl = named_seq(
        "ammevent",
        vec![
            ("_", lit("event")),
            ("_", ws1()),
            ("name", id()),
            ("payload", opt(type_annot.clone())),
            ("_", ws()),
            ("_", lit(";")),
        ],
    );

    let handler = named_seq(
        "ammhandler",
        vec![
            ("_", lit("on")),
            ("_", ws1()),
            ("event", id()),
            ("_", ws1()),
            ("_", lit("fn")),
            ("_", ws()),
            ("params", opt(param_clause)),
            ("ret", opt(type_annot)),
            ("_", ws()),
            ("body", block),
        ],
    );

    named_seq(
        "ammmodule",
        vec![
            ("_", ws()),
            (
                "items",
                zero_or_more(named_seq(
                    "ammitem",
                    vec![
                        (
                            "item",
                            named_alt(
                                "ammtop",
                                vec![
                                    ("constdecl", const_decl),
                                    ("eventdecl", event_decl),
                                    ("handler", handler),
                                ],
                            ),
                        ),
                        ("_", ws()),
                    ],
                )),
            ),
        ],
    )
}
