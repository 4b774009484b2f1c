//! Multiple-dispatch function selection.
//!
//! A call site collects every function bound to the name anywhere up the
//! scope chain, filters by arity, and tries to unify each candidate's
//! declared parameters against the argument types. Unification succeeds on
//! exact (structural, alias-transparent) equality, on interface
//! satisfaction, or by binding a generic parameter. Survivors are ranked:
//!
//! 1. all-exact candidates beat candidates that needed interface matches,
//! 2. fewer generic substitutions beat more,
//! 3. a candidate declared earlier in its scope beats a later one,
//! 4. a candidate from a closer scope beats a farther one.
//!
//! A tie on the full key is a compile error; so is an empty survivor set.

use lnc_base::{CompileError, Loc};

use crate::function::FnId;
use crate::scope::Entity;
use crate::types::Type;

use super::{CallTarget, Resolver, TypedExpr};

struct Candidate {
    fn_id: FnId,
    key: (u8, usize, usize, usize),
    bindings: Vec<(String, Type)>,
    ret: Type,
    name: String,
    signature: String,
}

/// Dispatches a call over one or more function names (operators map a
/// symbol to several names; plain calls pass one).
pub(crate) fn dispatch_named_call(
    resolver: &mut Resolver<'_>,
    names: &[String],
    args: &[TypedExpr],
    explicit: &[Type],
    hint: Option<&Type>,
    loc: &Loc,
) -> lnc_base::Result<(CallTarget, String, Type)> {
    let scope = resolver.current_scope();
    let mut candidates: Vec<(FnId, usize)> = Vec::new();
    for name in names {
        for (fn_id, distance) in resolver.program.scopes.function_sets(scope, name) {
            if !candidates.iter().any(|(existing, _)| *existing == fn_id) {
                candidates.push((fn_id, distance));
            }
        }
    }
    let described = names.join("/");
    choose(resolver, &described, candidates, args, explicit, hint, loc)
}

/// Dispatches `alias.f(args)` against one module's exported functions.
pub(crate) fn dispatch_module_call(
    resolver: &mut Resolver<'_>,
    module_idx: usize,
    name: &str,
    args: &[TypedExpr],
    loc: &Loc,
) -> lnc_base::Result<(CallTarget, String, Type)> {
    let module = &resolver.program.modules[module_idx];
    if !module.exports.iter().any(|e| e == name) {
        return Err(CompileError::resolve(
            format!("module `{}` does not export `{}`", module.name, name),
            loc.clone(),
        ));
    }
    let candidates: Vec<(FnId, usize)> =
        match resolver.program.scopes.get(module.scope, name) {
            Some(Entity::Functions(ids)) => ids.iter().map(|id| (*id, 0usize)).collect(),
            _ => Vec::new(),
        };
    choose(resolver, name, candidates, args, &[], None, loc)
}

fn choose(
    resolver: &mut Resolver<'_>,
    described: &str,
    candidates: Vec<(FnId, usize)>,
    args: &[TypedExpr],
    explicit: &[Type],
    hint: Option<&Type>,
    loc: &Loc,
) -> lnc_base::Result<(CallTarget, String, Type)> {
    let arg_tys: Vec<Type> = args.iter().map(TypedExpr::ty).collect();
    let mut survivors: Vec<Candidate> = Vec::new();

    for (fn_id, distance) in candidates {
        let def = resolver.program.functions.get(fn_id).clone();
        if def.params.len() != arg_tys.len() || explicit.len() > def.generics.len() {
            continue;
        }

        let mut bindings: Vec<(String, Type)> = def
            .generics
            .iter()
            .zip(explicit.iter())
            .map(|(g, t)| (g.clone(), t.clone()))
            .collect();
        let mut all_exact = true;
        let mut generic_binds = 0usize;
        let mut unified = true;

        for ((_, param), arg_ty) in def.params.iter().zip(&arg_tys) {
            let param_ty = param.substitute(&bindings);
            if param_ty == *arg_ty {
                continue;
            }
            if param_ty.contains_param() {
                match bind_generic(&param_ty, arg_ty, &mut bindings) {
                    Some(new_binds) => {
                        generic_binds += new_binds;
                        continue;
                    }
                    None => {
                        unified = false;
                        break;
                    }
                }
            }
            if matches!(param_ty.resolved(), Type::Interface { .. })
                && satisfies(resolver, arg_ty, param_ty.resolved())
            {
                all_exact = false;
                continue;
            }
            unified = false;
            break;
        }
        if !unified {
            continue;
        }

        let mut ret = def.ret.substitute(&bindings);
        if ret.contains_param() {
            if let Some(hinted) = hint {
                if bind_generic(&ret, hinted, &mut bindings).is_some() {
                    ret = def.ret.substitute(&bindings);
                }
            }
        }
        if ret.contains_param() {
            // Not enough information to solve the return type; let another
            // overload win if one can.
            continue;
        }

        survivors.push(Candidate {
            fn_id,
            key: (u8::from(!all_exact), generic_binds, def.order, distance),
            bindings,
            ret,
            name: def.name.clone(),
            signature: def.signature(),
        });
    }

    if survivors.is_empty() {
        let rendered: Vec<String> = arg_tys.iter().map(Type::to_string).collect();
        return Err(CompileError::resolve(
            format!(
                "no matching function for call to {}({})",
                described,
                rendered.join(", ")
            ),
            loc.clone(),
        ));
    }

    survivors.sort_by(|a, b| a.key.cmp(&b.key));
    if survivors.len() > 1 && survivors[0].key == survivors[1].key {
        return Err(CompileError::resolve(
            format!(
                "ambiguous call to {}: {} and {} both match",
                described, survivors[0].signature, survivors[1].signature
            ),
            loc.clone(),
        ));
    }

    let winner = survivors.into_iter().next().expect("survivor set is non-empty");
    let def = resolver.program.functions.get(winner.fn_id);
    let target = match def.opcode() {
        Some(opcode) => CallTarget::Opcode { opcode: opcode.to_string(), purity: def.purity },
        None => CallTarget::Inline { fn_id: winner.fn_id, bindings: winner.bindings },
    };
    Ok((target, winner.name, winner.ret))
}

/// Structural unification of a parameter type containing generic
/// parameters against a concrete argument type. Returns the number of
/// *new* bindings, or `None` on mismatch.
fn bind_generic(
    param: &Type,
    arg: &Type,
    bindings: &mut Vec<(String, Type)>,
) -> Option<usize> {
    match (param.resolved(), arg.resolved()) {
        (Type::Param(name), _) => {
            if let Some((_, bound)) = bindings.iter().find(|(n, _)| n == name) {
                if bound == arg {
                    Some(0)
                } else {
                    None
                }
            } else {
                bindings.push((name.clone(), arg.resolved().clone()));
                Some(1)
            }
        }
        (
            Type::Generic { name: param_name, args: param_args },
            Type::Generic { name: arg_name, args: arg_args },
        ) if param_name == arg_name && param_args.len() == arg_args.len() => {
            let mut total = 0;
            for (p, a) in param_args.iter().zip(arg_args) {
                total += bind_generic(p, a, bindings)?;
            }
            Some(total)
        }
        _ => {
            if param == arg {
                Some(0)
            } else {
                None
            }
        }
    }
}

/// Interface satisfaction: `ty` satisfies `iface` iff every required field
/// exists on `ty` with the required type, and every required operation
/// resolves in scope with the interface's own name consistently replaced
/// by `ty`. Pure; checking twice yields the same answer.
pub(crate) fn satisfies(resolver: &Resolver<'_>, ty: &Type, iface: &Type) -> bool {
    let (iface_name, ops, fields) = match iface {
        Type::Interface { name, ops, fields } => (name, ops, fields),
        _ => return false,
    };

    if !fields.is_empty() {
        let ty_fields = match ty.resolved() {
            Type::Product { fields, .. } => fields,
            _ => return false,
        };
        for (field_name, field_ty) in fields {
            let found = ty_fields
                .iter()
                .any(|(name, t)| name == field_name && t == field_ty);
            if !found {
                return false;
            }
        }
    }

    let self_binding = vec![(iface_name.clone(), ty.clone())];
    let scope = resolver.current_scope();
    for op in ops {
        let want_params: Vec<Type> =
            op.params.iter().map(|p| p.substitute(&self_binding)).collect();
        let want_ret = op.ret.substitute(&self_binding);
        let mut found = false;
        for (fn_id, _) in resolver.program.scopes.function_sets(scope, &op.name) {
            let def = resolver.program.functions.get(fn_id);
            if def.params.len() != want_params.len() {
                continue;
            }
            let params_match = def
                .params
                .iter()
                .zip(&want_params)
                .all(|((_, declared), wanted)| declared == wanted);
            if params_match && def.ret == want_ret {
                found = true;
                break;
            }
        }
        if !found {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::load_entry_text;
    use lnc_parse::ParseArenas;

    fn entity_type(resolver: &Resolver<'_>, scope: crate::scope::ScopeId, name: &str) -> Type {
        match resolver.program.scopes.get(scope, name) {
            Some(Entity::Type(ty)) => ty.clone(),
            Some(Entity::Interface(ty)) => ty.clone(),
            other => panic!("`{}` is not a type binding: {:?}", name, other),
        }
    }

    #[test]
    fn interface_satisfaction_is_idempotent() {
        let arenas = ParseArenas::new();
        let source = "\
type Point { x: int64, y: int64 }
interface Measured { fn measure(Measured): int64; }
fn measure(p: Point): int64 = p.x + p.y;
";
        let program = load_entry_text(arenas.ctx(), "main.ln", source).unwrap();
        let entry_scope = program.modules[program.entry].scope;
        let mut resolver = Resolver::new(program);
        resolver.scope_stack.push(entry_scope);

        let point = entity_type(&resolver, entry_scope, "Point");
        let measured = entity_type(&resolver, entry_scope, "Measured");

        let first = satisfies(&resolver, &point, &measured);
        let second = satisfies(&resolver, &point, &measured);
        assert!(first);
        assert_eq!(first, second);

        // A type without the required operation does not satisfy.
        assert!(!satisfies(&resolver, &Type::int64(), &measured));
    }

    #[test]
    fn the_empty_interface_admits_every_type() {
        let arenas = ParseArenas::new();
        let program = load_entry_text(arenas.ctx(), "main.ln", "").unwrap();
        let entry_scope = program.modules[program.entry].scope;
        let mut resolver = Resolver::new(program);
        resolver.scope_stack.push(entry_scope);

        let any = entity_type(&resolver, entry_scope, "any");
        assert!(satisfies(&resolver, &Type::int64(), &any));
        assert!(satisfies(&resolver, &Type::string(), &any));
        assert!(satisfies(&resolver, &Type::array_of(Type::bool()), &any));
    }

    #[test]
    fn required_fields_are_checked_structurally() {
        let arenas = ParseArenas::new();
        let source = "\
type Tagged { tag: string, size: int64 }
type Bare { size: int64 }
interface HasTag { tag: string; }
";
        let program = load_entry_text(arenas.ctx(), "main.ln", source).unwrap();
        let entry_scope = program.modules[program.entry].scope;
        let mut resolver = Resolver::new(program);
        resolver.scope_stack.push(entry_scope);

        let tagged = entity_type(&resolver, entry_scope, "Tagged");
        let bare = entity_type(&resolver, entry_scope, "Bare");
        let has_tag = entity_type(&resolver, entry_scope, "HasTag");

        assert!(satisfies(&resolver, &tagged, &has_tag));
        assert!(!satisfies(&resolver, &bare, &has_tag));
    }
}
