//! Backtracking parser combinators.
//!
//! A grammar is a tree of [`Combinator`] values; applying the root to a
//! [`Cursor`] yields a [`Cst`] node or a [`ParseFail`]. Failures are cheap
//! and non-fatal: the caller decides whether to try another branch. The one
//! exception is the repetition progress guard, whose failure is fatal and
//! aborts the whole parse, since a repetition that matches without consuming
//! input would loop forever.
//!
//! Grammars may be mutually recursive. A [`DeferredSlot`] is a placeholder
//! that can be referenced while the grammar is being built and patched with
//! its real combinator afterwards; every clone shares the patched value.
//!
//! ## Example
//!
//! ```
//! use lnc_base::Arena;
//! use lnc_parse::combinator::{char_range, one_or_more};
//! use lnc_parse::cst::CstContext;
//! use lnc_parse::cursor::Cursor;
//!
//! let nodes = Arena::new();
//! let refs = Arena::new();
//! let fields = Arena::new();
//! let texts = Arena::new();
//! let ctx = CstContext::new(&nodes, &refs, &fields, &texts);
//!
//! let digits = one_or_more(char_range('0', '9'));
//! let mut cur = Cursor::new("demo", "1234");
//! let node = digits.apply(ctx, &mut cur).unwrap();
//! assert_eq!(node.text(), "1234");
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use lnc_base::{CompileError, Loc, Pos};

use crate::cst::{Cst, CstContext};
use crate::cursor::Cursor;

/// A non-fatal (or, for the loop guard, fatal) parse rejection.
#[derive(Debug, Clone)]
pub struct ParseFail {
    /// Where the rejection happened.
    pub pos: Pos,
    /// The rule or combinator that rejected.
    pub rule: String,
    /// An excerpt of the input at the rejection point.
    pub found: String,
    /// Fatal failures abort the parse instead of triggering backtracking.
    pub fatal: bool,
    /// Rules tried by an enclosing alternative before this one won the
    /// deepest-position contest.
    pub alternatives: Vec<String>,
}

impl ParseFail {
    fn at(cur: &Cursor<'_>, rule: impl Into<String>) -> Self {
        ParseFail {
            pos: cur.pos(),
            rule: rule.into(),
            found: cur.excerpt(20).to_string(),
            fatal: false,
            alternatives: Vec::new(),
        }
    }

    fn fatal(cur: &Cursor<'_>, rule: impl Into<String>) -> Self {
        let mut fail = Self::at(cur, rule);
        fail.fatal = true;
        fail
    }

    /// Renders this failure as the pipeline error type.
    pub fn into_error(self, file: &str) -> CompileError {
        let mut message = format!("expected {}, found {:?}", self.rule, self.found);
        if !self.alternatives.is_empty() {
            message.push_str(&format!(" (alternatives tried: {})", self.alternatives.join(", ")));
        }
        CompileError::parse(message, Loc::new(file, self.pos))
    }
}

impl fmt::Display for ParseFail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {} at {}", self.rule, self.pos)
    }
}

/// A placeholder for a combinator that is defined after it is referenced.
#[derive(Clone)]
pub struct DeferredSlot(Rc<RefCell<Option<Combinator>>>);

impl DeferredSlot {
    pub fn new() -> Self {
        DeferredSlot(Rc::new(RefCell::new(None)))
    }

    /// Patches the placeholder. Every combinator cloned from this slot sees
    /// the patched value.
    pub fn fill(&self, inner: Combinator) {
        *self.0.borrow_mut() = Some(inner);
    }

    /// A combinator that delegates to the patched value.
    pub fn combinator(&self) -> Combinator {
        Combinator::Deferred(self.clone())
    }
}

impl Default for DeferredSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// One node of a grammar.
#[derive(Clone)]
pub enum Combinator {
    /// Match an exact string.
    Literal(String),
    /// Consume one character iff the literal does not occur at the cursor.
    NotLiteral(String),
    /// Consume one character within an inclusive range.
    CharRange(char, char),
    /// Match every child in order; restore the cursor on any failure.
    Seq(Vec<Combinator>),
    /// Like `Seq`, but children are keyed and the node carries a rule name.
    NamedSeq(String, Vec<(String, Combinator)>),
    /// First child to match from the original snapshot wins.
    Alt(Vec<Combinator>),
    /// Like `Alt`; the winning key labels the produced choice node.
    NamedAlt(String, Vec<(String, Combinator)>),
    /// Yield the child's node, or a `Null` sentinel if it fails.
    Opt(Box<Combinator>),
    /// Repeat until failure; zero matches is a success.
    ZeroOrMore(Box<Combinator>),
    /// Repeat until failure; at least one match required.
    OneOrMore(Box<Combinator>),
    /// Match the first combinator, then reject if the second one re-matches
    /// the full matched slice (keyword exclusion).
    LeftSubset(Box<Combinator>, Box<Combinator>),
    /// Succeed iff exactly one child matches at the cursor.
    XOr(Vec<Combinator>),
    /// Placeholder for mutually recursive rules.
    Deferred(DeferredSlot),
}

impl Combinator {
    /// A short human name for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Combinator::Literal(s) => format!("'{}'", s),
            Combinator::NotLiteral(s) => format!("any character but '{}'", s),
            Combinator::CharRange(lo, hi) => format!("character in '{}'..'{}'", lo, hi),
            Combinator::Seq(_) => "sequence".to_string(),
            Combinator::NamedSeq(rule, _) => rule.clone(),
            Combinator::Alt(_) => "one of several alternatives".to_string(),
            Combinator::NamedAlt(rule, _) => rule.clone(),
            Combinator::Opt(inner) => inner.describe(),
            Combinator::ZeroOrMore(inner) | Combinator::OneOrMore(inner) => {
                format!("repeated {}", inner.describe())
            }
            Combinator::LeftSubset(a, _) => a.describe(),
            Combinator::XOr(_) => "exactly one alternative".to_string(),
            Combinator::Deferred(slot) => match &*slot.0.borrow() {
                Some(inner) => inner.describe(),
                None => "unresolved rule".to_string(),
            },
        }
    }

    /// Applies this combinator at the cursor.
    ///
    /// On success the cursor sits after the match; on failure it is restored
    /// to where it was.
    pub fn apply<'a>(
        &self,
        ctx: CstContext<'a>,
        cur: &mut Cursor<'a>,
    ) -> Result<&'a Cst<'a>, ParseFail> {
        match self {
            Combinator::Literal(s) => {
                if cur.rest().starts_with(s.as_str()) {
                    let pos = cur.pos();
                    let text = cur.advance(s.len());
                    Ok(ctx.alloc(Cst::Leaf { text, pos }))
                } else {
                    Err(ParseFail::at(cur, self.describe()))
                }
            }
            Combinator::NotLiteral(s) => {
                let rest = cur.rest();
                if rest.is_empty() || rest.starts_with(s.as_str()) {
                    return Err(ParseFail::at(cur, self.describe()));
                }
                let pos = cur.pos();
                let width = rest.chars().next().map(char::len_utf8).unwrap_or(0);
                let text = cur.advance(width);
                Ok(ctx.alloc(Cst::NotLeaf { text, pos }))
            }
            Combinator::CharRange(lo, hi) => {
                let rest = cur.rest();
                match rest.chars().next() {
                    Some(ch) if ch >= *lo && ch <= *hi => {
                        let pos = cur.pos();
                        let text = cur.advance(ch.len_utf8());
                        Ok(ctx.alloc(Cst::Leaf { text, pos }))
                    }
                    _ => Err(ParseFail::at(cur, self.describe())),
                }
            }
            Combinator::Seq(children) => {
                let start = cur.snapshot();
                let mut nodes = Vec::with_capacity(children.len());
                for child in children {
                    match child.apply(ctx, cur) {
                        Ok(node) => nodes.push(node),
                        Err(fail) => {
                            cur.restore(start);
                            return Err(fail);
                        }
                    }
                }
                let text = cur.slice(start.offset, cur.pos().offset);
                Ok(ctx.alloc(Cst::Seq {
                    text,
                    pos: start,
                    children: ctx.alloc_children(nodes),
                }))
            }
            Combinator::NamedSeq(rule, children) => {
                let start = cur.snapshot();
                let mut fields = Vec::with_capacity(children.len());
                for (key, child) in children {
                    match child.apply(ctx, cur) {
                        Ok(node) => fields.push((ctx.alloc_name(key), node)),
                        Err(fail) => {
                            cur.restore(start);
                            return Err(fail);
                        }
                    }
                }
                let text = cur.slice(start.offset, cur.pos().offset);
                Ok(ctx.alloc(Cst::NamedSeq {
                    rule: ctx.alloc_name(rule),
                    text,
                    pos: start,
                    fields: ctx.alloc_fields(fields),
                }))
            }
            Combinator::Alt(children) => {
                let start = cur.snapshot();
                let mut fails: Vec<ParseFail> = Vec::new();
                for child in children {
                    cur.restore(start);
                    match child.apply(ctx, cur) {
                        Ok(node) => {
                            let text = cur.slice(start.offset, cur.pos().offset);
                            return Ok(ctx.alloc(Cst::Choice {
                                label: None,
                                text,
                                pos: start,
                                inner: node,
                            }));
                        }
                        Err(fail) if fail.fatal => return Err(fail),
                        Err(fail) => fails.push(fail),
                    }
                }
                cur.restore(start);
                Err(merge_alt_fails(fails, cur, "alternatives"))
            }
            Combinator::NamedAlt(rule, children) => {
                let start = cur.snapshot();
                let mut fails: Vec<ParseFail> = Vec::new();
                for (key, child) in children {
                    cur.restore(start);
                    match child.apply(ctx, cur) {
                        Ok(node) => {
                            let text = cur.slice(start.offset, cur.pos().offset);
                            return Ok(ctx.alloc(Cst::Choice {
                                label: Some(ctx.alloc_name(key)),
                                text,
                                pos: start,
                                inner: node,
                            }));
                        }
                        Err(fail) if fail.fatal => return Err(fail),
                        Err(fail) => fails.push(fail),
                    }
                }
                cur.restore(start);
                Err(merge_alt_fails(fails, cur, rule))
            }
            Combinator::Opt(inner) => {
                let start = cur.snapshot();
                match inner.apply(ctx, cur) {
                    Ok(node) => Ok(node),
                    Err(fail) if fail.fatal => Err(fail),
                    Err(_) => {
                        cur.restore(start);
                        Ok(ctx.alloc(Cst::Null { pos: start }))
                    }
                }
            }
            Combinator::ZeroOrMore(inner) => repeat(ctx, cur, inner, 0),
            Combinator::OneOrMore(inner) => repeat(ctx, cur, inner, 1),
            Combinator::LeftSubset(main, excluded) => {
                let start = cur.snapshot();
                let node = main.apply(ctx, cur)?;
                let matched = node.text();
                let mut sub = Cursor::new(cur.file, matched);
                match excluded.apply(ctx, &mut sub) {
                    Ok(_) if sub.at_end() => {
                        cur.restore(start);
                        Err(ParseFail::at(cur, format!("{} (reserved word excluded)", main.describe())))
                    }
                    Err(fail) if fail.fatal => Err(fail),
                    _ => Ok(node),
                }
            }
            Combinator::XOr(children) => {
                let start = cur.snapshot();
                let mut winner: Option<(&'a Cst<'a>, Pos)> = None;
                let mut matches = 0usize;
                for child in children {
                    cur.restore(start);
                    match child.apply(ctx, cur) {
                        Ok(node) => {
                            matches += 1;
                            winner = Some((node, cur.pos()));
                        }
                        Err(fail) if fail.fatal => return Err(fail),
                        Err(_) => {}
                    }
                }
                cur.restore(start);
                match (matches, winner) {
                    (1, Some((node, end))) => {
                        cur.restore(end);
                        Ok(node)
                    }
                    _ => Err(ParseFail::at(cur, format!("exactly one of {} alternatives", children.len()))),
                }
            }
            Combinator::Deferred(slot) => match &*slot.0.borrow() {
                Some(inner) => inner.apply(ctx, cur),
                None => Err(ParseFail::fatal(cur, "deferred combinator was never filled")),
            },
        }
    }
}

/// Shared body of `ZeroOrMore` / `OneOrMore`.
fn repeat<'a>(
    ctx: CstContext<'a>,
    cur: &mut Cursor<'a>,
    inner: &Combinator,
    min: usize,
) -> Result<&'a Cst<'a>, ParseFail> {
    let start = cur.snapshot();
    let mut children = Vec::new();
    loop {
        let iteration = cur.snapshot();
        match inner.apply(ctx, cur) {
            Ok(node) => {
                if cur.pos().offset == iteration.offset {
                    // A match that consumes nothing would repeat forever.
                    return Err(ParseFail::fatal(cur, format!("repetition of {} makes no progress", inner.describe())));
                }
                children.push(node);
            }
            Err(fail) if fail.fatal => return Err(fail),
            Err(fail) => {
                cur.restore(iteration);
                if children.len() < min {
                    cur.restore(start);
                    return Err(fail);
                }
                break;
            }
        }
    }
    let text = cur.slice(start.offset, cur.pos().offset);
    Ok(ctx.alloc(Cst::Rep { text, pos: start, children: ctx.alloc_children(children) }))
}

/// Picks the deepest failure as primary and records the rest as tried
/// alternatives.
fn merge_alt_fails(fails: Vec<ParseFail>, cur: &Cursor<'_>, rule: &str) -> ParseFail {
    let mut primary: Option<ParseFail> = None;
    let mut others = Vec::new();
    for fail in fails {
        match &primary {
            Some(best) if fail.pos.offset <= best.pos.offset => others.push(fail.rule),
            _ => {
                if let Some(prev) = primary.take() {
                    others.push(prev.rule);
                }
                primary = Some(fail);
            }
        }
    }
    match primary {
        Some(mut fail) => {
            fail.alternatives = others;
            fail
        }
        None => ParseFail::at(cur, rule),
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn lit(s: &str) -> Combinator {
    Combinator::Literal(s.to_string())
}

pub fn not_lit(s: &str) -> Combinator {
    Combinator::NotLiteral(s.to_string())
}

pub fn char_range(lo: char, hi: char) -> Combinator {
    Combinator::CharRange(lo, hi)
}

pub fn seq(children: Vec<Combinator>) -> Combinator {
    Combinator::Seq(children)
}

pub fn named_seq(rule: &str, children: Vec<(&str, Combinator)>) -> Combinator {
    Combinator::NamedSeq(
        rule.to_string(),
        children.into_iter().map(|(k, c)| (k.to_string(), c)).collect(),
    )
}

pub fn alt(children: Vec<Combinator>) -> Combinator {
    Combinator::Alt(children)
}

pub fn named_alt(rule: &str, children: Vec<(&str, Combinator)>) -> Combinator {
    Combinator::NamedAlt(
        rule.to_string(),
        children.into_iter().map(|(k, c)| (k.to_string(), c)).collect(),
    )
}

pub fn opt(inner: Combinator) -> Combinator {
    Combinator::Opt(Box::new(inner))
}

pub fn zero_or_more(inner: Combinator) -> Combinator {
    Combinator::ZeroOrMore(Box::new(inner))
}

pub fn one_or_more(inner: Combinator) -> Combinator {
    Combinator::OneOrMore(Box::new(inner))
}

pub fn left_subset(main: Combinator, excluded: Combinator) -> Combinator {
    Combinator::LeftSubset(Box::new(main), Box::new(excluded))
}

pub fn xor(children: Vec<Combinator>) -> Combinator {
    Combinator::XOr(children)
}

/// Applies `root` to the whole of `text`; anything short of a full-input
/// match is a parse error.
pub fn parse_text<'a>(
    ctx: CstContext<'a>,
    root: &Combinator,
    file: &'a str,
    text: &'a str,
) -> lnc_base::Result<&'a Cst<'a>> {
    let mut cur = Cursor::new(file, text);
    let node = root.apply(ctx, &mut cur).map_err(|fail| fail.into_error(file))?;
    if !cur.at_end() {
        return Err(CompileError::parse(
            format!("unconsumed input starting with {:?}", cur.excerpt(20)),
            Loc::new(file, cur.pos()),
        ));
    }
    Ok(node)
}
