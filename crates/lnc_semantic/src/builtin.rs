//! The builtin scope: primitive types and runtime events.
//!
//! This is the root of every scope chain. It holds the primitive type names,
//! the three events the runtime defines on its own (`_start`, `__conn`,
//! `__ctrl`), and nothing else — the surface functions and operators come
//! from the embedded `@std/root` module layered on top.

use lnc_base::{Loc, Pos};

use crate::function::Purity;
use crate::scope::{Entity, EventRef, ScopeId, Scopes};
use crate::types::{Builtin, Type};

/// The events every program gets without declaring them, in id order.
pub const BUILTIN_EVENTS: &[&str] = &["_start", "__conn", "__ctrl"];

/// Creates the builtin scope and installs the primitive bindings.
pub fn install(scopes: &mut Scopes) -> ScopeId {
    let scope = scopes.push(None);
    let loc = Loc::new("<builtin>", Pos::start());
    for builtin in Builtin::all() {
        scopes
            .insert(scope, builtin.name(), Entity::Type(Type::Builtin(*builtin)), &loc)
            .expect("builtin scope starts empty");
    }
    for (index, event) in BUILTIN_EVENTS.iter().enumerate() {
        scopes
            .insert(scope, event, Entity::Event(EventRef::Builtin(index)), &loc)
            .expect("builtin scope starts empty");
    }
    scope
}

/// Effect class of a VM opcode, keyed by opcode name.
///
/// Pure opcodes over literal operands are foldable at global-memory layout;
/// io opcodes touch the outside world; everything else mutates memory the
/// dependency graph has to order.
pub fn opcode_purity(opcode: &str) -> Purity {
    match opcode {
        "stdoutp" => Purity::Io,
        "emit" => Purity::Io,
        "newarr" | "pusharr" | "reparr" | "eacharr" | "callfn" | "evalcond" => Purity::Impure,
        _ => Purity::Pure,
    }
}
