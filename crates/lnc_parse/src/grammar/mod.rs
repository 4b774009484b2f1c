//! The three grammars of the compiler, plus the lexical pieces they share.
//!
//! Each grammar is a function returning its root [`Combinator`]; apply it with
//! [`parse_text`](crate::combinator::parse_text) and the match must consume
//! the whole input. Grammars are built declaratively from the ParseKit
//! primitives; mutually recursive rules go through [`DeferredSlot`]s that are
//! patched once construction is done.
//!
//! Whitespace is explicit: rules thread [`ws`] (any run of blanks and
//! comments) or [`ws1`] (at least one) between their tokens. Throwaway
//! separator fields all share the key `"_"` and are never navigated.

pub mod aga;
pub mod amm;
pub mod ln;

use crate::combinator::{
    alt, char_range, left_subset, lit, named_alt, named_seq, one_or_more, opt, seq, xor,
    zero_or_more, Combinator,
};
use crate::cst::Cst;

/// Zero or more blanks, line comments, or block comments.
pub fn ws() -> Combinator {
    zero_or_more(ws_unit())
}

/// At least one blank or comment; separates keywords from identifiers.
pub fn ws1() -> Combinator {
    one_or_more(ws_unit())
}

fn ws_unit() -> Combinator {
    alt(vec![
        lit(" "),
        lit("\t"),
        lit("\r"),
        lit("\n"),
        line_comment(),
        block_comment(),
    ])
}

fn line_comment() -> Combinator {
    seq(vec![lit("//"), zero_or_more(not_newline())])
}

fn not_newline() -> Combinator {
    crate::combinator::not_lit("\n")
}

fn block_comment() -> Combinator {
    seq(vec![lit("/*"), zero_or_more(crate::combinator::not_lit("*/")), lit("*/")])
}

/// An identifier: letter or underscore, then letters, digits, underscores.
/// `keywords` are excluded via `LeftSubset`.
pub fn ident(keywords: &[&str]) -> Combinator {
    let head = alt(vec![char_range('a', 'z'), char_range('A', 'Z'), lit("_")]);
    let tail = alt(vec![
        char_range('a', 'z'),
        char_range('A', 'Z'),
        char_range('0', '9'),
        lit("_"),
    ]);
    let core = seq(vec![head, zero_or_more(tail)]);
    if keywords.is_empty() {
        core
    } else {
        left_subset(core, alt(keywords.iter().map(|kw| lit(kw)).collect()))
    }
}

/// An unsigned decimal integer.
pub fn integer() -> Combinator {
    one_or_more(char_range('0', '9'))
}

/// A decimal integer with an optional leading minus.
pub fn signed_integer() -> Combinator {
    seq(vec![opt(lit("-")), integer()])
}

/// An unsigned decimal real: digits, a dot, digits.
pub fn real() -> Combinator {
    seq(vec![integer(), lit("."), integer()])
}

/// A decimal real with an optional leading minus.
pub fn signed_real() -> Combinator {
    seq(vec![opt(lit("-")), real()])
}

/// `true` or `false`.
pub fn bool_lit() -> Combinator {
    alt(vec![lit("true"), lit("false")])
}

/// A string literal. Single quotes take no escapes; double quotes accept
/// backslash escapes (`\\`, `\"`, `\'`, `\n`, `\t`).
pub fn string_lit() -> Combinator {
    named_alt(
        "string",
        vec![
            (
                "single",
                named_seq(
                    "singlequoted",
                    vec![
                        ("_", lit("'")),
                        ("body", zero_or_more(crate::combinator::not_lit("'"))),
                        ("_", lit("'")),
                    ],
                ),
            ),
            (
                "double",
                named_seq(
                    "doublequoted",
                    vec![
                        ("_", lit("\"")),
                        (
                            "body",
                            zero_or_more(alt(vec![
                                lit("\\\\"),
                                lit("\\\""),
                                lit("\\'"),
                                lit("\\n"),
                                lit("\\t"),
                                crate::combinator::not_lit("\""),
                            ])),
                        ),
                        ("_", lit("\"")),
                    ],
                ),
            ),
        ],
    )
}

/// An `=` that is not the head of `==`; keeps assignments from eating
/// equality comparisons.
pub fn assign_eq() -> Combinator {
    xor(vec![lit("="), lit("==")])
}

/// A run of operator-symbol characters.
pub fn op_symbol() -> Combinator {
    one_or_more(alt(vec![
        lit("+"),
        lit("-"),
        lit("*"),
        lit("/"),
        lit("%"),
        lit("^"),
        lit("!"),
        lit("="),
        lit("<"),
        lit(">"),
        lit("&"),
        lit("|"),
        lit("~"),
        lit("?"),
    ]))
}

/// `first (, item)*` with whitespace around the commas. Navigate with
/// [`collect_list`].
pub fn comma_list(rule: &str, item: Combinator) -> Combinator {
    named_seq(
        rule,
        vec![
            ("first", item.clone()),
            (
                "rest",
                zero_or_more(named_seq(
                    "listitem",
                    vec![("_", ws()), ("_", lit(",")), ("_", ws()), ("item", item)],
                )),
            ),
        ],
    )
}

/// Collects the items of a [`comma_list`] node (or nothing, for a `Null`
/// produced by an optional list).
pub fn collect_list<'a>(node: &'a Cst<'a>) -> Vec<&'a Cst<'a>> {
    if node.is_null() {
        return Vec::new();
    }
    let mut items = Vec::new();
    if let Some(first) = node.field("first") {
        items.push(first);
    }
    if let Some(rest) = node.field("rest") {
        for entry in rest.rep_children() {
            items.push(entry.req("item"));
        }
    }
    items
}

/// Decodes the body of a string-literal node into its runtime value.
///
/// Single-quoted bodies are taken verbatim; double-quoted bodies get their
/// backslash escapes resolved.
pub fn decode_string<'a>(node: &'a Cst<'a>) -> String {
    let quoted = node.unwrap_choice();
    let body = match quoted.field("body") {
        Some(body) => body.text(),
        None => return String::new(),
    };
    match node.label() {
        Some("double") => {
            let mut out = String::with_capacity(body.len());
            let mut chars = body.chars();
            while let Some(ch) = chars.next() {
                if ch == '\\' {
                    match chars.next() {
                        Some('n') => out.push('\n'),
                        Some('t') => out.push('\t'),
                        Some(other) => out.push(other),
                        None => {}
                    }
                } else {
                    out.push(ch);
                }
            }
            out
        }
        _ => body.to_string(),
    }
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
    fn ws_swallows_comments() {
        with_ctx!(ctx, {
            let node = parse_text(ctx, &ws(), "t", "  // line\n/* block */ ").unwrap();
            assert_eq!(node.text(), "  // line\n/* block */ ");
        });
    }

    #[test]
    fn ident_excludes_keywords_but_not_their_extensions() {
        with_ctx!(ctx, {
            let grammar = ident(&["fn", "let"]);
            assert!(parse_text(ctx, &grammar, "t", "fn").is_err());
            assert_eq!(parse_text(ctx, &grammar, "t", "fnord").unwrap().text(), "fnord");
            assert_eq!(parse_text(ctx, &grammar, "t", "_start").unwrap().text(), "_start");
        });
    }

    #[test]
    fn string_literals_decode_per_quote_style() {
        with_ctx!(ctx, {
            let single = parse_text(ctx, &string_lit(), "t", "'a\\nb'").unwrap();
            assert_eq!(decode_string(single), "a\\nb");

            let double = parse_text(ctx, &string_lit(), "t", "\"a\\nb\"").unwrap();
            assert_eq!(decode_string(double), "a\nb");

            let quote = parse_text(ctx, &string_lit(), "t", "\"say \\\"hi\\\"\"").unwrap();
            assert_eq!(decode_string(quote), "say \"hi\"");
        });
    }

    #[test]
    fn assign_eq_rejects_double_equals() {
        with_ctx!(ctx, {
            assert!(parse_text(ctx, &assign_eq(), "t", "=").is_ok());
            let mut cur = crate::cursor::Cursor::new("t", "==");
            assert!(assign_eq().apply(ctx, &mut cur).is_err());
        });
    }

    #[test]
    fn comma_list_collects_all_items() {
        with_ctx!(ctx, {
            let grammar = comma_list("names", ident(&[]));
            let node = parse_text(ctx, &grammar, "t", "a, b ,c").unwrap();
            let items = collect_list(node);
            let texts: Vec<&str> = items.iter().map(|n| n.text()).collect();
            assert_eq!(texts, vec!["a", "b", "c"]);
        });
    }
}
