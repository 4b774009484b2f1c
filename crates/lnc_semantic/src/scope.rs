//! Lexical scopes.
//!
//! Scopes form an upward-linked chain: handler-local scopes point at their
//! module scope, module scopes at the shared `@std/root` scope, and that at
//! the builtin scope. Lookup walks upward and stops at the first match.
//!
//! A name may bind a *set* of functions (multiple dispatch accumulates
//! overloads) or a set of operator mappings; every other entity kind forbids
//! redefinition within the same scope.

use std::collections::HashMap;

use lnc_base::{CompileError, Loc};

use crate::function::FnId;
use crate::types::Type;

/// Index into [`Scopes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(pub usize);

/// Which event a name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventRef {
    /// One of the three runtime-defined events (`_start`, `__conn`, `__ctrl`).
    Builtin(usize),
    /// Index into the program's declared-event table.
    Custom(usize),
}

/// One operator mapping: symbol + fixity + precedence + backing function name.
#[derive(Debug, Clone, PartialEq)]
pub struct OpDef {
    pub symbol: String,
    pub prefix: bool,
    pub precedence: u32,
    pub fn_name: String,
}

/// What an identifier binds to.
#[derive(Debug, Clone)]
pub enum Entity {
    /// A concrete (non-generic) type.
    Type(Type),
    /// A generic user type awaiting instantiation.
    GenericType { params: Vec<String>, proto: Type },
    /// An interface declaration.
    Interface(Type),
    /// A set of dispatch candidates.
    Functions(Vec<FnId>),
    /// A module-level constant. The type is filled in once the initialiser
    /// has been resolved (annotations may be omitted in source).
    Constant { ty: Option<Type>, module: usize, index: usize },
    /// An event.
    Event(EventRef),
    /// Operator mappings sharing one symbol table slot.
    Operators(Vec<OpDef>),
    /// `import <dep> as <name>`.
    ModuleAlias(usize),
}

impl Entity {
    fn kind(&self) -> &'static str {
        match self {
            Entity::Type(_) | Entity::GenericType { .. } => "type",
            Entity::Interface(_) => "interface",
            Entity::Functions(_) => "function",
            Entity::Constant { .. } => "constant",
            Entity::Event(_) => "event",
            Entity::Operators(_) => "operator",
            Entity::ModuleAlias(_) => "module",
        }
    }
}

#[derive(Debug)]
struct ScopeData {
    parent: Option<ScopeId>,
    bindings: HashMap<String, Entity>,
    /// Insertion order, for deterministic diagnostics and exports.
    names: Vec<String>,
}

/// The arena of all scopes in one compilation.
#[derive(Debug, Default)]
pub struct Scopes {
    data: Vec<ScopeData>,
}

impl Scopes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.data.len());
        self.data.push(ScopeData {
            parent,
            bindings: HashMap::new(),
            names: Vec::new(),
        });
        id
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.data[scope.0].parent
    }

    /// Looks a name up in this scope only.
    pub fn get_local(&self, scope: ScopeId, name: &str) -> Option<&Entity> {
        self.data[scope.0].bindings.get(name)
    }

    /// Walks the chain upward; first match wins.
    pub fn get(&self, scope: ScopeId, name: &str) -> Option<&Entity> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(entity) = self.data[id.0].bindings.get(name) {
                return Some(entity);
            }
            current = self.data[id.0].parent;
        }
        None
    }

    /// Like [`get`](Scopes::get), but also reports how many scope hops away
    /// the match was (dispatch tie-breaker) and walks the *whole* chain so
    /// function sets in outer scopes are still visible.
    pub fn function_sets(&self, scope: ScopeId, name: &str) -> Vec<(FnId, usize)> {
        let mut found = Vec::new();
        let mut distance = 0usize;
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(Entity::Functions(ids)) = self.data[id.0].bindings.get(name) {
                for fn_id in ids {
                    found.push((*fn_id, distance));
                }
            }
            current = self.data[id.0].parent;
            distance += 1;
        }
        found
    }

    /// Collects every operator mapping for a symbol across the chain.
    pub fn operators(&self, scope: ScopeId, symbol: &str, prefix: bool) -> Vec<OpDef> {
        let mut found = Vec::new();
        let mut current = Some(scope);
        while let Some(id) = current {
            for name in &self.data[id.0].names {
                if let Some(Entity::Operators(ops)) = self.data[id.0].bindings.get(name) {
                    for op in ops {
                        if op.symbol == symbol && op.prefix == prefix {
                            found.push(op.clone());
                        }
                    }
                }
            }
            current = self.data[id.0].parent;
        }
        found
    }

    /// Inserts a binding. Functions and operators accumulate; everything
    /// else rejects redefinition in the same scope.
    pub fn insert(
        &mut self,
        scope: ScopeId,
        name: &str,
        entity: Entity,
        loc: &Loc,
    ) -> lnc_base::Result<()> {
        let data = &mut self.data[scope.0];
        if let Some(existing) = data.bindings.get_mut(name) {
            return match (existing, entity) {
                (Entity::Functions(existing), Entity::Functions(mut incoming)) => {
                    existing.append(&mut incoming);
                    Ok(())
                }
                (Entity::Operators(existing), Entity::Operators(mut incoming)) => {
                    existing.append(&mut incoming);
                    Ok(())
                }
                (existing, incoming) => Err(CompileError::scope(
                    format!(
                        "cannot redefine `{}`: already bound as a {} in this scope (new binding is a {})",
                        name,
                        existing.kind(),
                        incoming.kind()
                    ),
                    loc.clone(),
                )),
            };
        }
        data.bindings.insert(name.to_string(), entity);
        data.names.push(name.to_string());
        Ok(())
    }

    /// Replaces the type of a module constant once its initialiser is known.
    pub fn set_constant_type(&mut self, scope: ScopeId, name: &str, ty: Type) {
        if let Some(Entity::Constant { ty: slot, .. }) = self.data[scope.0].bindings.get_mut(name) {
            *slot = Some(ty);
        }
    }

    /// The names bound in a scope, in insertion order.
    pub fn names(&self, scope: ScopeId) -> &[String] {
        &self.data[scope.0].names
    }
}
