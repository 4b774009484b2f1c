//! # lnc-base
//!
//! Structural atoms shared by every stage of the lnc compiler:
//!
//! - [`Arena`] — bump allocation for CST nodes and source texts
//! - [`Pos`]/[`Loc`] — source positions and file-qualified locations
//! - [`CompileError`]/[`Result`] — the single error type of the pipeline
//!
//! This crate knows nothing about the LN language itself; it provides only
//! the infrastructure the parser, resolver, and emitters build on.

pub mod arena;
pub mod error;
pub mod pos;

pub use arena::Arena;
pub use error::{CompileError, ErrorKind, Result};
pub use pos::{Loc, Pos};
