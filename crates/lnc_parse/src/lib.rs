//! # lnc-parse
//!
//! The parsing layer of the lnc compiler: a backtracking parser-combinator
//! kit over a single in-memory buffer, and the three grammars built on it.
//!
//! ## Architecture
//!
//! ```text
//! source text ──► Cursor ──► Combinator::apply ──► Cst (arena-allocated)
//!                              ▲
//!                  ln / amm / aga grammar definitions
//! ```
//!
//! - [`cursor`] — the input cursor with snapshot/restore backtracking
//! - [`cst`] — concrete syntax tree nodes preserving the source exactly
//! - [`combinator`] — the ParseKit primitives (literal, charset, sequence,
//!   choice, repetition, keyword exclusion, deferred recursion)
//! - [`grammar`] — the LN, AMM, and AGA grammar definitions
//!
//! Parsing never copies the source: leaves borrow slices of it, and every
//! node is bump-allocated in the caller's arenas. The helper [`ParseArenas`]
//! bundles the four arenas a parse needs.

pub mod combinator;
pub mod cst;
pub mod cursor;
pub mod grammar;

pub use combinator::{parse_text, Combinator, DeferredSlot, ParseFail};
pub use cst::{Cst, CstContext};
pub use cursor::Cursor;

use lnc_base::Arena;

/// Owner of the arenas one parse (or one whole compilation) allocates into.
///
/// Create it first, then hand [`ParseArenas::ctx`] to the parsing entry
/// points; every CST node lives as long as this struct.
#[derive(Default)]
pub struct ParseArenas<'a> {
    pub nodes: Arena<Cst<'a>>,
    pub node_refs: Arena<&'a Cst<'a>>,
    pub fields: Arena<(&'a str, &'a Cst<'a>)>,
    pub texts: Arena<u8>,
}

impl<'a> ParseArenas<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The borrow-view the combinators allocate through.
    pub fn ctx(&'a self) -> CstContext<'a> {
        CstContext::new(&self.nodes, &self.node_refs, &self.fields, &self.texts)
    }
}

/// Parses LN surface source; the whole input must match.
pub fn parse_ln<'a>(
    ctx: CstContext<'a>,
    file: &'a str,
    text: &'a str,
) -> lnc_base::Result<&'a Cst<'a>> {
    log::debug!("parsing {} as ln ({} bytes)", file, text.len());
    parse_text(ctx, &grammar::ln::ln_grammar(), file, text)
}

/// Parses lowered AMM text; the whole input must match.
pub fn parse_amm<'a>(
    ctx: CstContext<'a>,
    file: &'a str,
    text: &'a str,
) -> lnc_base::Result<&'a Cst<'a>> {
    log::debug!("parsing {} as amm ({} bytes)", file, text.len());
    parse_text(ctx, &grammar::amm::amm_grammar(), file, text)
}

/// Parses AGA assembly text; the whole input must match.
pub fn parse_aga<'a>(
    ctx: CstContext<'a>,
    file: &'a str,
    text: &'a str,
) -> lnc_base::Result<&'a Cst<'a>> {
    log::debug!("parsing {} as aga ({} bytes)", file, text.len());
    parse_text(ctx, &grammar::aga::aga_grammar(), file, text)
}
