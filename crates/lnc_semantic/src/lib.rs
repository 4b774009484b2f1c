//! # lnc-semantic
//!
//! The middle of the lnc pipeline: everything between a parsed LN module
//! and the AMM emitter.
//!
//! ## Architecture
//!
//! ```text
//! entry source ──► modules (load imports, register declarations)
//!                     │
//!                     ▼
//!            scopes + types + functions + events
//!                     │
//!                     ▼
//!          resolve (dispatch, inference, typed trees)
//! ```
//!
//! - [`stdlib`] — the embedded `@std/*` source table
//! - [`builtin`] — the builtin scope (primitive types, runtime events)
//! - [`modules`] — module graph loading and declaration registration
//! - [`scope`] — upward-linked scopes and entities
//! - [`types`] — the structural/nominal type model
//! - [`function`] — function definitions and the dispatch registry
//! - [`resolve`] — the resolver producing typed, dispatch-decorated trees

pub mod builtin;
pub mod function;
pub mod modules;
pub mod resolve;
pub mod scope;
pub mod stdlib;
pub mod types;

pub use function::{FnBody, FnDef, FnId, Functions, Purity};
pub use modules::{load_entry_file, load_entry_text, Module, Program};
pub use resolve::{
    CallTarget, ClosureDef, CondArm, CondExpr, ResolvedBody, ResolvedConst, ResolvedEvent,
    ResolvedHandler, ResolvedProgram, Resolver, TypedBlock, TypedExpr, TypedStmt,
};
pub use scope::{Entity, EventRef, OpDef, ScopeId, Scopes};
pub use types::{Builtin, IfaceOp, Type};
