//! The input cursor combinators advance over.
//!
//! A [`Cursor`] is a view into one immutable source text plus the current
//! [`Pos`]. Backtracking is a snapshot/restore of the position; the text is
//! never copied. Restoring on every failure path is what keeps `Alt` and
//! `Opt` honest, so the cursor API makes snapshots `Copy` and restores
//! infallible.

use lnc_base::Pos;

/// A read position inside one source text.
#[derive(Clone, Copy)]
pub struct Cursor<'a> {
    /// Name of the source, carried into every diagnostic.
    pub file: &'a str,
    text: &'a str,
    pos: Pos,
}

impl<'a> Cursor<'a> {
    pub fn new(file: &'a str, text: &'a str) -> Self {
        Cursor { file, text, pos: Pos::start() }
    }

    /// The current position.
    pub fn pos(&self) -> Pos {
        self.pos
    }

    /// The unconsumed remainder of the input.
    pub fn rest(&self) -> &'a str {
        &self.text[self.pos.offset..]
    }

    /// True once every byte has been consumed.
    pub fn at_end(&self) -> bool {
        self.pos.offset >= self.text.len()
    }

    /// Consumes `n` bytes and returns the consumed slice.
    ///
    /// `n` must land on a character boundary of the remaining input.
    pub fn advance(&mut self, n: usize) -> &'a str {
        let consumed = &self.text[self.pos.offset..self.pos.offset + n];
        self.pos = self.pos.advanced_over(consumed);
        consumed
    }

    /// Captures the state a later [`restore`](Cursor::restore) returns to.
    pub fn snapshot(&self) -> Pos {
        self.pos
    }

    /// Rewinds to a previously captured snapshot.
    pub fn restore(&mut self, snap: Pos) {
        self.pos = snap;
    }

    /// The source slice between two byte offsets.
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.text[start..end]
    }

    /// Up to `limit` characters of the unconsumed input, for diagnostics.
    pub fn excerpt(&self, limit: usize) -> &'a str {
        let rest = self.rest();
        match rest.char_indices().nth(limit) {
            Some((idx, _)) => &rest[..idx],
            None => rest,
        }
    }
}
