//! Function definitions and the function registry.
//!
//! Scopes bind names to *sets* of functions (multiple dispatch), so the
//! definitions themselves live in one flat registry indexed by [`FnId`].
//! A function body is either a VM opcode binding (`binds` declarations) or
//! source CST that the resolver types on demand and the emitter inlines.

use lnc_base::Loc;
use lnc_parse::Cst;

use crate::scope::ScopeId;
use crate::types::Type;

/// Index into [`Functions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FnId(pub usize);

/// What happens when a function is applied.
#[derive(Debug, Clone, Copy)]
pub enum FnBody<'a> {
    /// Backed directly by a VM opcode; calls stay calls all the way down.
    Opcode(&'a str),
    /// A block body to inline at call sites.
    Block(&'a Cst<'a>),
    /// A single-expression (`= expr;`) body to inline at call sites.
    Expr(&'a Cst<'a>),
}

/// Scheduling-relevant effect class of a function.
///
/// Opcodes are tagged in the standard library table; user functions default
/// to impure. Only `Pure` matters to the compiler itself: pure opcode calls
/// over literal operands may be folded when global memory is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purity {
    Pure,
    Impure,
    Io,
}

/// One function declaration.
#[derive(Debug, Clone)]
pub struct FnDef<'a> {
    pub name: String,
    pub generics: Vec<String>,
    pub params: Vec<(String, Type)>,
    pub ret: Type,
    pub body: FnBody<'a>,
    pub purity: Purity,
    pub loc: Loc,
    /// The scope the function was declared in; bodies resolve against it.
    pub scope: ScopeId,
    /// Declaration order within the defining scope; dispatch tie-breaker.
    pub order: usize,
}

impl<'a> FnDef<'a> {
    pub fn is_opcode(&self) -> bool {
        matches!(self.body, FnBody::Opcode(_))
    }

    pub fn opcode(&self) -> Option<&'a str> {
        match self.body {
            FnBody::Opcode(op) => Some(op),
            _ => None,
        }
    }

    /// `name(type, type): ret` — used by dispatch diagnostics.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.params.iter().map(|(_, t)| t.to_string()).collect();
        format!("{}({}): {}", self.name, params.join(", "), self.ret)
    }
}

/// The flat registry of every function the compilation knows about.
#[derive(Debug, Default)]
pub struct Functions<'a> {
    defs: Vec<FnDef<'a>>,
}

impl<'a> Functions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, def: FnDef<'a>) -> FnId {
        let id = FnId(self.defs.len());
        self.defs.push(def);
        id
    }

    pub fn get(&self, id: FnId) -> &FnDef<'a> {
        &self.defs[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = (FnId, &FnDef<'a>)> {
        self.defs.iter().enumerate().map(|(idx, def)| (FnId(idx), def))
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lnc_base::Pos;

    #[test]
    fn registry_hands_out_sequential_ids() {
        let mut functions = Functions::new();
        let a = functions.add(FnDef {
            name: "add".to_string(),
            generics: vec![],
            params: vec![("a".to_string(), Type::int64()), ("b".to_string(), Type::int64())],
            ret: Type::int64(),
            body: FnBody::Opcode("addi64"),
            purity: Purity::Pure,
            loc: Loc::new("@std/root", Pos::start()),
            scope: ScopeId(0),
            order: 0,
        });
        let b = functions.add(FnDef {
            name: "add".to_string(),
            generics: vec![],
            params: vec![
                ("a".to_string(), Type::float64()),
                ("b".to_string(), Type::float64()),
            ],
            ret: Type::float64(),
            body: FnBody::Opcode("addf64"),
            purity: Purity::Pure,
            loc: Loc::new("@std/root", Pos::start()),
            scope: ScopeId(0),
            order: 1,
        });
        assert_ne!(a, b);
        assert!(functions.get(a).is_opcode());
        assert_eq!(functions.get(a).opcode(), Some("addi64"));
        assert_eq!(functions.get(b).signature(), "add(float64, float64): float64");
    }
}
