//! Source positions.
//!
//! Every CST node records the [`Pos`] where its match began; errors carry a
//! [`Loc`], which adds the file name. Offsets are byte offsets into the
//! source text, so `&source[pos.offset..]` is always the unconsumed tail.
//! Lines and columns are 1-based, the way editors count.

use std::fmt;

/// A position inside one source text: byte offset plus human coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    /// Byte offset from the start of the source.
    pub offset: usize,
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number, counted in characters.
    pub column: u32,
}

impl Pos {
    /// The position of the first character of a source text.
    pub fn start() -> Self {
        Pos { offset: 0, line: 1, column: 1 }
    }

    /// Advances the position over `consumed`, updating line and column.
    pub fn advanced_over(self, consumed: &str) -> Pos {
        let mut line = self.line;
        let mut column = self.column;
        for ch in consumed.chars() {
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        Pos { offset: self.offset + consumed.len(), line, column }
    }
}

impl Default for Pos {
    fn default() -> Self {
        Self::start()
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A position qualified with the file it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Loc {
    /// Path or synthetic name of the source (e.g. `@std/app`).
    pub file: String,
    /// Position inside that source.
    pub pos: Pos,
}

impl Loc {
    pub fn new(file: impl AsRef<str>, pos: Pos) -> Self {
        Loc { file: file.as_ref().to_string(), pos }
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file {} line {}", self.file, self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_is_line_one_column_one() {
        let pos = Pos::start();
        assert_eq!(pos.offset, 0);
        assert_eq!(pos.line, 1);
        assert_eq!(pos.column, 1);
    }

    #[test]
    fn advancing_over_plain_text_moves_the_column() {
        let pos = Pos::start().advanced_over("abcd");
        assert_eq!(pos.offset, 4);
        assert_eq!(pos.line, 1);
        assert_eq!(pos.column, 5);
    }

    #[test]
    fn advancing_over_newlines_resets_the_column() {
        let pos = Pos::start().advanced_over("ab\ncd\ne");
        assert_eq!(pos.offset, 7);
        assert_eq!(pos.line, 3);
        assert_eq!(pos.column, 2);
    }

    #[test]
    fn offset_counts_bytes_not_chars() {
        let pos = Pos::start().advanced_over("héllo");
        assert_eq!(pos.offset, 6);
        assert_eq!(pos.column, 6);
    }

    #[test]
    fn loc_display_matches_diagnostic_format() {
        let loc = Loc::new("main.ln", Pos { offset: 10, line: 3, column: 7 });
        assert_eq!(loc.to_string(), "file main.ln line 3:7");
    }
}
