//! The compiler error type.
//!
//! Every stage of the pipeline reports failure through [`CompileError`]: a
//! kind from the fixed taxonomy, a message, the source location that caused
//! it, and optionally the error it wraps. Parser frames pushed during
//! recursive descent become `caused by` lines, so a failed compile prints the
//! whole chain once, at the top:
//!
//! ```text
//! no matching function for call to add in file main.ln line 4:11
//!   caused by: candidate add(int64, int64) rejected in file @std/root line 2:1
//! ```
//!
//! Errors never produce partial artifacts; whoever catches one at the top of
//! the compile call reports it and stops.

use std::fmt;

use crate::pos::Loc;

/// The failure taxonomy. One variant per pipeline stage that can reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Grammar rejection: rule name + input excerpt.
    Parse,
    /// Cyclic imports, missing modules, unreadable files.
    Import,
    /// Duplicate non-function binding or undefined identifier.
    Scope,
    /// Dispatch failure: no candidate, ambiguity, arity, unification.
    Resolve,
    /// Incompatible branch types, width overflow, bad literals.
    Type,
    /// An emitter invariant broke (re-parse failure, bad opcode name).
    Emission,
    /// Read or write failure.
    Io,
}

impl ErrorKind {
    fn label(self) -> &'static str {
        match self {
            ErrorKind::Parse => "parse error",
            ErrorKind::Import => "import error",
            ErrorKind::Scope => "scope error",
            ErrorKind::Resolve => "resolve error",
            ErrorKind::Type => "type error",
            ErrorKind::Emission => "emission error",
            ErrorKind::Io => "io error",
        }
    }
}

/// An error with its source location and cause chain.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    /// Where the failure was observed; `None` for failures with no single
    /// source position (e.g. a missing output directory).
    pub loc: Option<Loc>,
    pub cause: Option<Box<CompileError>>,
}

impl CompileError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        CompileError { kind, message: message.into(), loc: None, cause: None }
    }

    pub fn parse(message: impl Into<String>, loc: Loc) -> Self {
        Self::new(ErrorKind::Parse, message).at(loc)
    }

    pub fn import(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Import, message)
    }

    pub fn scope(message: impl Into<String>, loc: Loc) -> Self {
        Self::new(ErrorKind::Scope, message).at(loc)
    }

    pub fn resolve(message: impl Into<String>, loc: Loc) -> Self {
        Self::new(ErrorKind::Resolve, message).at(loc)
    }

    pub fn type_error(message: impl Into<String>, loc: Loc) -> Self {
        Self::new(ErrorKind::Type, message).at(loc)
    }

    pub fn emission(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Emission, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    /// Attaches the source location.
    pub fn at(mut self, loc: Loc) -> Self {
        self.loc = Some(loc);
        self
    }

    /// Wraps an inner error as this error's cause.
    pub fn with_cause(mut self, cause: CompileError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// The process exit code the CLI reports for this kind.
    ///
    /// 1 malformed input, 2 resolver, 3 emission, 4 I/O.
    pub fn exit_code(&self) -> i32 {
        match self.kind {
            ErrorKind::Parse => 1,
            ErrorKind::Scope | ErrorKind::Resolve => 2,
            ErrorKind::Type | ErrorKind::Emission => 3,
            ErrorKind::Import | ErrorKind::Io => 4,
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.loc {
            Some(loc) => write!(f, "{}: {} in {}", self.kind.label(), self.message, loc)?,
            None => write!(f, "{}: {}", self.kind.label(), self.message)?,
        }
        let mut next = self.cause.as_deref();
        while let Some(err) = next {
            match &err.loc {
                Some(loc) => write!(f, "\n  caused by: {} in {}", err.message, loc)?,
                None => write!(f, "\n  caused by: {}", err.message)?,
            }
            next = err.cause.as_deref();
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

/// Alias used by every fallible operation in the compiler.
pub type Result<T> = std::result::Result<T, CompileError>;
