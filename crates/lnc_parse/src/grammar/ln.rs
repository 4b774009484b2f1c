//! The LN surface-language grammar.
//!
//! One root combinator covering imports, declarations (constants, events,
//! functions, types, interfaces, handlers, operator mappings), statements,
//! and operator expressions. Operator precedence is *not* resolved here:
//! expressions parse as a flat `operand (op operand)*` spine and the resolver
//! applies the scope's operator table, because operator sets are extensible
//! per module.
//!
//! Three rules are mutually recursive — expressions contain blocks (through
//! anonymous functions and conditionals), blocks contain statements, and
//! statements contain expressions — so `expr`, `block`, and `typename` are
//! built through deferred slots patched at the end of construction.

use crate::combinator::{
    alt, char_range, lit, named_alt, named_seq, one_or_more, opt, zero_or_more, Combinator,
    DeferredSlot,
};

use super::{
    assign_eq, bool_lit, comma_list, ident, integer, op_symbol, real, string_lit, ws, ws1,
};

/// Reserved words of LN, excluded from identifiers.
pub const KEYWORDS: &[&str] = &[
    "fn",
    "let",
    "const",
    "on",
    "event",
    "type",
    "interface",
    "if",
    "else",
    "return",
    "emit",
    "import",
    "from",
    "export",
    "true",
    "false",
    "prefix",
    "infix",
    "as",
    "precedence",
    "binds",
    "new",
];

fn id() -> Combinator {
    ident(KEYWORDS)
}

/// Builds the LN root combinator. The match must consume the entire input.
pub fn ln_grammar() -> Combinator {
    let expr_slot = DeferredSlot::new();
    let block_slot = DeferredSlot::new();
    let type_slot = DeferredSlot::new();

    let expr = expr_slot.combinator();
    let block = block_slot.combinator();
    let typename = type_slot.combinator();

    // ---- types ----------------------------------------------------------
    let type_rule = named_seq(
        "typename",
        vec![
            ("name", id()),
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
            ("list", opt(comma_list("paramlist", param.clone()))),
            ("_", ws()),
            ("_", lit(")")),
        ],
    );

    // ---- expressions -----------------------------------------------------
    let anonfn = named_seq(
        "anonfn",
        vec![
            ("_", lit("fn")),
            ("_", ws()),
            ("params", opt(param_clause.clone())),
            ("ret", opt(type_annot.clone())),
            ("_", ws()),
            (
                "body",
                named_alt(
                    "anonfnbody",
                    vec![
                        ("block", block.clone()),
                        (
                            "arrow",
                            named_seq(
                                "arrowexpr",
                                vec![("_", assign_eq()), ("_", ws()), ("expr", expr.clone())],
                            ),
                        ),
                    ],
                ),
            ),
        ],
    );

    let elif = named_seq(
        "elif",
        vec![
            ("_", ws()),
            ("_", lit("else")),
            ("_", ws1()),
            ("_", lit("if")),
            ("_", ws1()),
            ("cond", expr.clone()),
            ("_", ws()),
            ("then", block.clone()),
        ],
    );
    let else_clause = named_seq(
        "elseclause",
        vec![("_", ws()), ("_", lit("else")), ("_", ws()), ("body", block.clone())],
    );
    let conditional = named_seq(
        "conditional",
        vec![
            ("_", lit("if")),
            ("_", ws1()),
            ("cond", expr.clone()),
            ("_", ws()),
            ("then", block.clone()),
            ("elifs", zero_or_more(elif)),
            ("else", opt(else_clause)),
        ],
    );

    let call_args = named_seq(
        "callparen",
        vec![
            ("_", ws()),
            ("_", lit("(")),
            ("_", ws()),
            ("args", opt(comma_list("callargs", expr.clone()))),
            ("_", ws()),
            ("_", lit(")")),
        ],
    );

    let call = named_seq(
        "call",
        vec![
            ("name", id()),
            (
                "typeargs",
                opt(named_seq(
                    "calltypeargs",
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
            ("parens", call_args.clone()),
        ],
    );

    let array_literal = named_seq(
        "arrayliteral",
        vec![
            ("_", lit("[")),
            ("_", ws()),
            ("items", opt(comma_list("arrayitems", expr.clone()))),
            ("_", ws()),
            ("_", lit("]")),
        ],
    );

    let new_obj = named_seq(
        "newobj",
        vec![
            ("_", lit("new")),
            ("_", ws1()),
            ("type", typename.clone()),
            ("_", ws()),
            ("_", lit("{")),
            ("_", ws()),
            (
                "fields",
                opt(comma_list(
                    "newfields",
                    named_seq(
                        "newfield",
                        vec![
                            ("name", id()),
                            ("_", ws()),
                            ("_", lit(":")),
                            ("_", ws()),
                            ("value", expr.clone()),
                        ],
                    ),
                )),
            ),
            ("_", ws()),
            ("_", lit("}")),
        ],
    );

    let paren = named_seq(
        "paren",
        vec![
            ("_", lit("(")),
            ("_", ws()),
            ("expr", expr.clone()),
            ("_", ws()),
            ("_", lit(")")),
        ],
    );

    let literal = named_alt(
        "literal",
        vec![
            ("real", real()),
            ("int", integer()),
            ("str", string_lit()),
            ("bool", bool_lit()),
        ],
    );

    let core = named_alt(
        "basicexpr",
        vec![
            ("paren", paren),
            ("anonfn", anonfn.clone()),
            ("conditional", conditional.clone()),
            ("new", new_obj),
            ("array", array_literal),
            ("call", call),
            ("var", id()),
            ("literal", literal),
        ],
    );

    let method_seg = named_seq(
        "method",
        vec![
            ("_", ws()),
            ("_", lit(".")),
            ("_", ws()),
            ("name", id()),
            ("call", opt(call_args)),
        ],
    );
    let index_seg = named_seq(
        "indexseg",
        vec![
            ("_", ws()),
            ("_", lit("[")),
            ("_", ws()),
            ("index", expr.clone()),
            ("_", ws()),
            ("_", lit("]")),
        ],
    );
    let postfixed = named_seq(
        "postfixed",
        vec![
            ("core", core),
            (
                "segments",
                zero_or_more(named_alt(
                    "postfix",
                    vec![("method", method_seg), ("index", index_seg)],
                )),
            ),
        ],
    );

    let prefix_op = named_seq("prefixop", vec![("op", op_symbol()), ("_", ws())]);
    let operand = named_seq(
        "operand",
        vec![("prefixes", zero_or_more(prefix_op)), ("base", postfixed)],
    );
    let infix_item = named_seq(
        "infixitem",
        vec![
            ("_", ws()),
            ("op", op_symbol()),
            ("_", ws()),
            ("operand", operand.clone()),
        ],
    );
    let expr_rule = named_seq(
        "expr",
        vec![("first", operand), ("rest", zero_or_more(infix_item))],
    );
    expr_slot.fill(expr_rule);

    // ---- statements ------------------------------------------------------
    let const_decl = named_seq(
        "constdecl",
        vec![
            ("_", lit("const")),
            ("_", ws1()),
            ("name", id()),
            ("typeannot", opt(type_annot.clone())),
            ("_", ws()),
            ("_", assign_eq()),
            ("_", ws()),
            ("value", expr.clone()),
            ("_", ws()),
            ("_", lit(";")),
        ],
    );
    let let_decl = named_seq(
        "letdecl",
        vec![
            ("_", lit("let")),
            ("_", ws1()),
            ("name", id()),
            ("typeannot", opt(type_annot.clone())),
            ("_", ws()),
            ("_", assign_eq()),
            ("_", ws()),
            ("value", expr.clone()),
            ("_", ws()),
            ("_", lit(";")),
        ],
    );
    let assignment = named_seq(
        "assignment",
        vec![
            ("name", id()),
            ("_", ws()),
            ("_", assign_eq()),
            ("_", ws()),
            ("value", expr.clone()),
            ("_", ws()),
            ("_", lit(";")),
        ],
    );
    let emit_stmt = named_seq(
        "emitstmt",
        vec![
            ("_", lit("emit")),
            ("_", ws1()),
            ("event", id()),
            (
                "arg",
                opt(named_seq(
                    "emitarg",
                    vec![("_", ws1()), ("expr", expr.clone())],
                )),
            ),
            ("_", ws()),
            ("_", lit(";")),
        ],
    );
    let return_stmt = named_seq(
        "returnstmt",
        vec![
            ("_", lit("return")),
            (
                "arg",
                opt(named_seq(
                    "returnarg",
                    vec![("_", ws1()), ("expr", expr.clone())],
                )),
            ),
            ("_", ws()),
            ("_", lit(";")),
        ],
    );
    let expr_stmt = named_seq(
        "exprstmt",
        vec![("expr", expr.clone()), ("_", ws()), ("_", lit(";"))],
    );

    let stmt = named_alt(
        "stmt",
        vec![
            ("constdecl", const_decl.clone()),
            ("letdecl", let_decl),
            ("assignment", assignment),
            ("conditional", conditional),
            ("emit", emit_stmt),
            ("return", return_stmt),
            ("exprstmt", expr_stmt),
        ],
    );

    let block_rule = named_seq(
        "block",
        vec![
            ("_", lit("{")),
            ("_", ws()),
            (
                "stmts",
                zero_or_more(named_seq(
                    "blockstmt",
                    vec![("stmt", stmt), ("_", ws())],
                )),
            ),
            ("tail", opt(expr.clone())),
            ("_", ws()),
            ("_", lit("}")),
        ],
    );
    block_slot.fill(block_rule);

    // ---- declarations ----------------------------------------------------
    let generic_params = named_seq(
        "generics",
        vec![
            ("_", lit("<")),
            ("_", ws()),
            ("list", comma_list("genericlist", id())),
            ("_", ws()),
            ("_", lit(">")),
        ],
    );

    let fn_decl = named_seq(
        "fndecl",
        vec![
            ("_", lit("fn")),
            ("_", ws1()),
            ("name", id()),
            ("generics", opt(generic_params.clone())),
            ("_", ws()),
            ("params", param_clause.clone()),
            ("ret", opt(type_annot.clone())),
            ("_", ws()),
            (
                "body",
                named_alt(
                    "fndeclbody",
                    vec![
                        (
                            "binds",
                            named_seq(
                                "bindsbody",
                                vec![
                                    ("_", lit("binds")),
                                    ("_", ws1()),
                                    ("opcode", ident(&[])),
                                    ("_", ws()),
                                    ("_", lit(";")),
                                ],
                            ),
                        ),
                        ("block", block.clone()),
                        (
                            "arrow",
                            named_seq(
                                "arrowstmt",
                                vec![
                                    ("_", assign_eq()),
                                    ("_", ws()),
                                    ("expr", expr.clone()),
                                    ("_", ws()),
                                    ("_", lit(";")),
                                ],
                            ),
                        ),
                    ],
                ),
            ),
        ],
    );

    let event_decl = named_seq(
        "eventdecl",
        vec![
            ("_", lit("event")),
            ("_", ws1()),
            ("name", id()),
            ("payload", opt(type_annot.clone())),
            ("_", ws()),
            ("_", lit(";")),
        ],
    );

    let type_decl = named_seq(
        "typedecl",
        vec![
            ("_", lit("type")),
            ("_", ws1()),
            ("name", id()),
            ("generics", opt(generic_params)),
            ("_", ws()),
            (
                "body",
                named_alt(
                    "typebody",
                    vec![
                        (
                            "fields",
                            named_seq(
                                "typefields",
                                vec![
                                    ("_", lit("{")),
                                    ("_", ws()),
                                    ("fields", opt(comma_list("fieldlist", param.clone()))),
                                    ("_", ws()),
                                    ("_", lit("}")),
                                ],
                            ),
                        ),
                        (
                            "alias",
                            named_seq(
                                "typealias",
                                vec![
                                    ("_", assign_eq()),
                                    ("_", ws()),
                                    ("target", typename.clone()),
                                    ("_", ws()),
                                    ("_", lit(";")),
                                ],
                            ),
                        ),
                    ],
                ),
            ),
        ],
    );

    let iface_fn = named_seq(
        "ifacefn",
        vec![
            ("_", lit("fn")),
            ("_", ws1()),
            ("name", id()),
            ("_", ws()),
            ("_", lit("(")),
            ("_", ws()),
            ("params", opt(comma_list("ifaceparams", typename.clone()))),
            ("_", ws()),
            ("_", lit(")")),
            ("_", ws()),
            ("_", lit(":")),
            ("_", ws()),
            ("ret", typename.clone()),
            ("_", ws()),
            ("_", lit(";")),
        ],
    );
    let iface_field = named_seq(
        "ifacefield",
        vec![
            ("name", id()),
            ("_", ws()),
            ("_", lit(":")),
            ("_", ws()),
            ("type", typename.clone()),
            ("_", ws()),
            ("_", lit(";")),
        ],
    );
    let interface_decl = named_seq(
        "interfacedecl",
        vec![
            ("_", lit("interface")),
            ("_", ws1()),
            ("name", id()),
            ("_", ws()),
            ("_", lit("{")),
            ("_", ws()),
            (
                "items",
                zero_or_more(named_seq(
                    "ifaceitem",
                    vec![
                        (
                            "member",
                            named_alt(
                                "ifacemember",
                                vec![("fn", iface_fn), ("field", iface_field)],
                            ),
                        ),
                        ("_", ws()),
                    ],
                )),
            ),
            ("_", lit("}")),
        ],
    );

    let handler = named_seq(
        "handler",
        vec![
            ("_", lit("on")),
            ("_", ws1()),
            ("event", id()),
            ("_", ws()),
            (
                "body",
                named_alt(
                    "handlerbody",
                    vec![("anonfn", anonfn), ("block", block.clone())],
                ),
            ),
        ],
    );

    let op_map = named_seq(
        "opmap",
        vec![
            (
                "fixity",
                named_alt(
                    "fixity",
                    vec![("prefix", lit("prefix")), ("infix", lit("infix"))],
                ),
            ),
            ("_", ws1()),
            ("fnname", id()),
            ("_", ws1()),
            ("_", lit("as")),
            ("_", ws1()),
            ("symbol", op_symbol()),
            ("_", ws1()),
            ("_", lit("precedence")),
            ("_", ws1()),
            ("level", integer()),
            ("_", ws()),
            ("_", lit(";")),
        ],
    );

    let reexport = named_seq("reexport", vec![("name", id()), ("_", ws()), ("_", lit(";"))]);

    let decl = named_seq(
        "decl",
        vec![
            (
                "export",
                opt(named_seq(
                    "exportmark",
                    vec![("_", lit("export")), ("_", ws1())],
                )),
            ),
            (
                "item",
                named_alt(
                    "declitem",
                    vec![
                        ("constdecl", const_decl),
                        ("eventdecl", event_decl),
                        ("fndecl", fn_decl),
                        ("typedecl", type_decl),
                        ("interface", interface_decl),
                        ("handler", handler),
                        ("opmap", op_map),
                        ("reexport", reexport),
                    ],
                ),
            ),
        ],
    );

    // ---- imports and the module root ------------------------------------
    let rel_path_char = alt(vec![
        char_range('a', 'z'),
        char_range('A', 'Z'),
        char_range('0', '9'),
        lit("_"),
        lit("/"),
        lit("."),
        lit("-"),
    ]);
    let dep = named_alt(
        "dep",
        vec![
            (
                "std",
                named_seq("stddep", vec![("_", lit("@std/")), ("name", ident(&[]))]),
            ),
            (
                "rel",
                named_seq(
                    "reldep",
                    vec![
                        ("prefix", alt(vec![lit("./"), lit("../")])),
                        ("path", one_or_more(rel_path_char)),
                    ],
                ),
            ),
            ("bare", ident(&[])),
        ],
    );

    let from_import = named_seq(
        "fromimport",
        vec![
            ("_", lit("from")),
            ("_", ws1()),
            ("dep", dep.clone()),
            ("_", ws1()),
            ("_", lit("import")),
            ("_", ws1()),
            ("names", comma_list("importnames", id())),
            ("_", ws()),
            ("_", opt(lit(";"))),
        ],
    );
    let plain_import = named_seq(
        "plainimport",
        vec![
            ("_", lit("import")),
            ("_", ws1()),
            ("dep", dep),
            (
                "alias",
                opt(named_seq(
                    "importalias",
                    vec![("_", ws1()), ("_", lit("as")), ("_", ws1()), ("name", id())],
                )),
            ),
            ("_", ws()),
            ("_", opt(lit(";"))),
        ],
    );
    let import_decl = named_alt(
        "importdecl",
        vec![("from", from_import), ("plain", plain_import)],
    );

    named_seq(
        "module",
        vec![
            ("_", ws()),
            (
                "imports",
                zero_or_more(named_seq(
                    "importitem",
                    vec![("import", import_decl), ("_", ws())],
                )),
            ),
            (
                "decls",
                zero_or_more(named_seq(
                    "moduledecl",
                    vec![("decl", decl), ("_", ws())],
                )),
            ),
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
    fn parses_hello_world() {
        with_ctx!(ctx, {
            let source = "from @std/app import start, print, exit\non start { print('Hello, World!'); emit exit 0; }\n";
            let module = parse_text(ctx, &ln_grammar(), "main.ln", source).unwrap();
            assert_eq!(module.rule_name(), "module");
            assert_eq!(module.req("imports").children().len(), 1);
            assert_eq!(module.req("decls").children().len(), 1);
        });
    }

    #[test]
    fn parses_function_forms() {
        with_ctx!(ctx, {
            let source = "fn double(x: int64): int64 = x * 2;\n\
                          fn log(message: string): void { print(message); }\n\
                          export fn add(a: int64, b: int64): int64 binds addi64;\n";
            let module = parse_text(ctx, &ln_grammar(), "fns.ln", source).unwrap();
            assert_eq!(module.req("decls").children().len(), 3);
        });
    }

    #[test]
    fn parses_conditional_chains() {
        with_ctx!(ctx, {
            let source = "on start {\n  if x > 0 { print('pos'); } else if x < 0 { print('neg'); } else { print('zero'); }\n}\n";
            parse_text(ctx, &ln_grammar(), "cond.ln", source).unwrap();
        });
    }

    #[test]
    fn parses_type_interface_and_operator_declarations() {
        with_ctx!(ctx, {
            let source = "type Point { x: int64, y: int64 }\n\
                          type Alias = Array<int64>;\n\
                          interface Stringish { fn describe(Stringish): string; size: int64; }\n\
                          export prefix negate as - precedence 5;\n\
                          export infix add as + precedence 2;\n";
            let module = parse_text(ctx, &ln_grammar(), "types.ln", source).unwrap();
            assert_eq!(module.req("decls").children().len(), 5);
        });
    }

    #[test]
    fn parses_closures_and_method_chains() {
        with_ctx!(ctx, {
            let source = "on start {\n  const f = fn (n: int64): int64 { n * 2 };\n  const y = f(3).toString();\n}\n";
            parse_text(ctx, &ln_grammar(), "clo.ln", source).unwrap();
        });
    }

    #[test]
    fn keywords_do_not_parse_as_identifiers() {
        with_ctx!(ctx, {
            let source = "on start { let if = 3; }\n";
            assert!(parse_text(ctx, &ln_grammar(), "bad.ln", source).is_err());
        });
    }

    #[test]
    fn assignment_does_not_eat_equality() {
        with_ctx!(ctx, {
            let source = "on start { const eqv: bool = a == b; }\n";
            parse_text(ctx, &ln_grammar(), "eq.ln", source).unwrap();
        });
    }
}
