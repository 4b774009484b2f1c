//! The resolver: typed, dispatch-decorated trees out of LN syntax.
//!
//! Resolution is bottom-up with contextual top-down hints. Every
//! sub-expression ends up carrying its concrete [`Type`]; every call carries
//! the function dispatch chose (an opcode binding to keep as a call, a user
//! function to inline later, or a closure variable). Operator expressions
//! parse as flat spines and are rebuilt here by shunting-yard against the
//! scope's operator table, since operator sets are extensible per module.
//!
//! Module constants resolve first (in load order, so a dependency's
//! constants are always available), then every handler body. Function bodies
//! resolve lazily when the emitter asks to inline them; generic
//! instantiations are memoised on `(function, concrete argument types)`.

pub mod dispatch;

use std::collections::HashMap;
use std::rc::Rc;

use lnc_base::{CompileError, Loc, Pos};
use lnc_parse::grammar::{collect_list, decode_string};
use lnc_parse::Cst;

use crate::function::{FnBody, FnId, Purity};
use crate::modules::Program;
use crate::scope::{Entity, EventRef, ScopeId};
use crate::types::Type;
use crate::{builtin, modules};

/// What a resolved call dispatches to.
#[derive(Debug, Clone)]
pub enum CallTarget {
    /// An opcode-backed function: stays a named call in AMM, becomes the
    /// opcode in AGA.
    Opcode { opcode: String, purity: Purity },
    /// A user function, inlined by the AMM emitter.
    Inline { fn_id: FnId, bindings: Vec<(String, Type)> },
    /// The callee is a closure-valued constant in scope.
    ClosureVar,
}

/// A typed expression.
#[derive(Debug, Clone)]
pub enum TypedExpr {
    Int { value: i128, ty: Type },
    Float { value: f64, ty: Type },
    Bool { value: bool },
    Str { value: String },
    Var { name: String, ty: Type },
    Call { target: CallTarget, name: String, args: Vec<TypedExpr>, ty: Type },
    Closure(Rc<ClosureDef>),
    Record { fields: Vec<(String, TypedExpr)>, ty: Type },
    Field { base: Box<TypedExpr>, field: String, index: usize, ty: Type },
    ArrayLit { items: Vec<TypedExpr>, elem: Type },
    Cond(CondExpr),
}

impl TypedExpr {
    pub fn ty(&self) -> Type {
        match self {
            TypedExpr::Int { ty, .. } | TypedExpr::Float { ty, .. } => ty.clone(),
            TypedExpr::Bool { .. } => Type::bool(),
            TypedExpr::Str { .. } => Type::string(),
            TypedExpr::Var { ty, .. } => ty.clone(),
            TypedExpr::Call { ty, .. } => ty.clone(),
            TypedExpr::Closure(_) => Type::function(),
            TypedExpr::Record { ty, .. } => ty.clone(),
            TypedExpr::Field { ty, .. } => ty.clone(),
            TypedExpr::ArrayLit { elem, .. } => Type::array_of(elem.clone()),
            TypedExpr::Cond(cond) => cond.ty.clone(),
        }
    }

    /// True for expressions AMM can carry inline as a call argument.
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            TypedExpr::Int { .. }
                | TypedExpr::Float { .. }
                | TypedExpr::Bool { .. }
                | TypedExpr::Str { .. }
        )
    }
}

/// A resolved anonymous function.
#[derive(Debug, Clone)]
pub struct ClosureDef {
    pub params: Vec<(String, Type)>,
    pub ret: Type,
    pub body: TypedBlock,
}

/// One arm of a conditional chain; `cond == None` is the terminal `else`.
#[derive(Debug, Clone)]
pub struct CondArm {
    pub cond: Option<TypedExpr>,
    pub block: TypedBlock,
}

/// A conditional chain; `ty` is void in statement position.
#[derive(Debug, Clone)]
pub struct CondExpr {
    pub arms: Vec<CondArm>,
    pub ty: Type,
}

/// A typed statement.
#[derive(Debug, Clone)]
pub enum TypedStmt {
    Decl { name: String, mutable: bool, ty: Type, value: TypedExpr },
    Assign { name: String, ty: Type, value: TypedExpr },
    Expr(TypedExpr),
    Emit { event: String, arg: Option<TypedExpr> },
    Return(Option<TypedExpr>),
    Cond(CondExpr),
}

/// A typed block; `ty` is the tail expression's type, or void.
#[derive(Debug, Clone)]
pub struct TypedBlock {
    pub stmts: Vec<TypedStmt>,
    pub tail: Option<Box<TypedExpr>>,
    pub ty: Type,
}

/// A module constant after resolution, under its program-unique name.
#[derive(Debug, Clone)]
pub struct ResolvedConst {
    pub name: String,
    pub ty: Type,
    pub value: TypedExpr,
}

/// An event after resolution, under its program-unique name.
#[derive(Debug, Clone)]
pub struct ResolvedEvent {
    pub name: String,
    pub payload: Option<Type>,
}

/// A handler after resolution.
#[derive(Debug, Clone)]
pub struct ResolvedHandler {
    pub event: String,
    pub param: Option<(String, Type)>,
    pub body: TypedBlock,
    pub loc: Loc,
}

/// The resolver's output: everything the AMM emitter needs.
#[derive(Debug, Clone, Default)]
pub struct ResolvedProgram {
    pub constants: Vec<ResolvedConst>,
    pub events: Vec<ResolvedEvent>,
    pub handlers: Vec<ResolvedHandler>,
}

/// A function body resolved for one set of generic bindings.
#[derive(Debug)]
pub struct ResolvedBody {
    pub params: Vec<(String, Type)>,
    pub ret: Type,
    pub block: TypedBlock,
}

#[derive(Clone)]
struct LocalBinding {
    ty: Type,
    mutable: bool,
    closure: Option<(Vec<(String, Type)>, Type)>,
}

enum CoreValue {
    Value(TypedExpr),
    Module(usize),
}

/// The resolver. Owns the loaded [`Program`] and hands out typed trees.
pub struct Resolver<'a> {
    pub program: Program<'a>,
    locals: Vec<HashMap<String, LocalBinding>>,
    scope_stack: Vec<ScopeId>,
    ret_stack: Vec<Option<Type>>,
    type_bindings: Vec<(String, Type)>,
    inline_stack: Vec<FnId>,
    /// Program-unique AMM names for module constants, by (module, index).
    const_names: HashMap<(usize, usize), String>,
    /// Program-unique AMM names for custom events, by event index.
    event_names: Vec<String>,
    body_memo: HashMap<(usize, String), Rc<ResolvedBody>>,
    current_file: String,
}

impl<'a> Resolver<'a> {
    pub fn new(program: Program<'a>) -> Self {
        let mut resolver = Resolver {
            locals: Vec::new(),
            scope_stack: Vec::new(),
            ret_stack: Vec::new(),
            type_bindings: Vec::new(),
            inline_stack: Vec::new(),
            const_names: HashMap::new(),
            event_names: Vec::new(),
            body_memo: HashMap::new(),
            current_file: String::new(),
            program,
        };
        resolver.assign_global_names();
        resolver
    }

    /// AMM has one flat namespace, so constants and events declared under
    /// the same name in different modules get deterministic suffixes.
    fn assign_global_names(&mut self) {
        let mut used: HashMap<String, usize> = HashMap::new();
        for (module_idx, module) in self.program.modules.iter().enumerate() {
            for (const_idx, decl) in module.constants.iter().enumerate() {
                let name = unique_name(&mut used, &decl.name);
                self.const_names.insert((module_idx, const_idx), name);
            }
        }
        for event in &self.program.events {
            let name = unique_name(&mut used, &event.name);
            self.event_names.push(name);
        }
    }

    /// The program-unique name of a custom event.
    pub fn event_name(&self, index: usize) -> &str {
        &self.event_names[index]
    }

    fn current_scope(&self) -> ScopeId {
        *self.scope_stack.last().expect("resolver entered without a scope")
    }

    fn loc(&self, pos: Pos) -> Loc {
        Loc::new(&self.current_file, pos)
    }

    fn lookup_local(&self, name: &str) -> Option<&LocalBinding> {
        self.locals.iter().rev().find_map(|frame| frame.get(name))
    }

    fn bind_local(&mut self, name: &str, binding: LocalBinding) {
        if let Some(frame) = self.locals.last_mut() {
            frame.insert(name.to_string(), binding);
        }
    }

    // ------------------------------------------------------------------
    // Program-level resolution
    // ------------------------------------------------------------------

    /// Resolves every module constant and every handler body.
    pub fn resolve_program(&mut self) -> lnc_base::Result<ResolvedProgram> {
        let mut resolved = ResolvedProgram::default();

        for module_idx in 0..self.program.modules.len() {
            let const_count = self.program.modules[module_idx].constants.len();
            for const_idx in 0..const_count {
                resolved.constants.push(self.resolve_constant(module_idx, const_idx)?);
            }
        }

        for (idx, event) in self.program.events.iter().enumerate() {
            resolved.events.push(ResolvedEvent {
                name: self.event_names[idx].clone(),
                payload: event.payload.clone(),
            });
        }

        for module_idx in 0..self.program.modules.len() {
            let handler_count = self.program.modules[module_idx].handlers.len();
            for handler_idx in 0..handler_count {
                resolved.handlers.push(self.resolve_handler(module_idx, handler_idx)?);
            }
        }

        log::debug!(
            "resolved {} constants, {} events, {} handlers",
            resolved.constants.len(),
            resolved.events.len(),
            resolved.handlers.len()
        );
        Ok(resolved)
    }

    fn resolve_constant(
        &mut self,
        module_idx: usize,
        const_idx: usize,
    ) -> lnc_base::Result<ResolvedConst> {
        let module = &self.program.modules[module_idx];
        let decl = &module.constants[const_idx];
        let name = decl.name.clone();
        let annot = decl.annot.clone();
        let value_node = decl.value;
        let loc = decl.loc.clone();
        let scope = module.scope;
        let file = module.name.clone();

        self.current_file = file;
        self.scope_stack.push(scope);
        self.locals.clear();
        let value = self.resolve_expr(value_node, annot.as_ref())?;
        self.scope_stack.pop();

        let ty = match annot {
            Some(annot) => {
                if value.ty() != annot {
                    return Err(CompileError::type_error(
                        format!(
                            "constant `{}` declared as {} but initialised with {}",
                            name,
                            annot,
                            value.ty()
                        ),
                        loc,
                    ));
                }
                annot
            }
            None => value.ty(),
        };

        self.program.scopes.set_constant_type(scope, &name, ty.clone());
        let unique = self.const_names[&(module_idx, const_idx)].clone();
        Ok(ResolvedConst { name: unique, ty, value })
    }

    fn resolve_handler(
        &mut self,
        module_idx: usize,
        handler_idx: usize,
    ) -> lnc_base::Result<ResolvedHandler> {
        let module = &self.program.modules[module_idx];
        let handler = &module.handlers[handler_idx];
        let event_name = handler.event.clone();
        let body_node = handler.body;
        let loc = handler.loc.clone();
        let scope = module.scope;
        let file = module.name.clone();

        self.current_file = file;
        self.scope_stack.push(scope);

        let (event, payload) = match self.program.scopes.get(scope, &event_name) {
            Some(Entity::Event(EventRef::Builtin(idx))) => {
                (builtin::BUILTIN_EVENTS[*idx].to_string(), None)
            }
            Some(Entity::Event(EventRef::Custom(idx))) => (
                self.event_names[*idx].clone(),
                self.program.events[*idx].payload.clone(),
            ),
            Some(_) => {
                self.scope_stack.pop();
                return Err(CompileError::resolve(
                    format!("`{}` is not an event", event_name),
                    loc,
                ));
            }
            None => {
                self.scope_stack.pop();
                return Err(CompileError::scope(
                    format!("undefined event `{}`", event_name),
                    loc,
                ));
            }
        };

        // Handler body: a bare block, or an anonymous fn carrying the
        // payload parameter.
        let (param, block_node) = match body_node.label() {
            Some("anonfn") => {
                let anonfn = body_node.unwrap_choice();
                let params = self.resolve_params(anonfn.req("params"))?;
                if params.len() > 1 {
                    self.scope_stack.pop();
                    return Err(CompileError::type_error(
                        "handlers take at most one parameter".to_string(),
                        loc,
                    ));
                }
                let param = params.into_iter().next();
                if let Some((_, param_ty)) = &param {
                    match &payload {
                        Some(payload_ty) if payload_ty == param_ty => {}
                        Some(payload_ty) => {
                            self.scope_stack.pop();
                            return Err(CompileError::type_error(
                                format!(
                                    "handler parameter is {} but event {} carries {}",
                                    param_ty, event, payload_ty
                                ),
                                loc,
                            ));
                        }
                        None => {
                            self.scope_stack.pop();
                            return Err(CompileError::type_error(
                                format!("event {} carries no payload", event),
                                loc,
                            ));
                        }
                    }
                }
                let body = anonfn.req("body");
                match body.label() {
                    Some("block") => (param, body.unwrap_choice()),
                    _ => {
                        self.scope_stack.pop();
                        return Err(CompileError::type_error(
                            "handler bodies must be blocks".to_string(),
                            loc,
                        ));
                    }
                }
            }
            _ => (None, body_node.unwrap_choice()),
        };

        self.locals.clear();
        self.locals.push(HashMap::new());
        if let Some((name, ty)) = &param {
            self.bind_local(name, LocalBinding { ty: ty.clone(), mutable: false, closure: None });
        }
        self.ret_stack.push(Some(Type::void()));
        let body = self.resolve_block(block_node, None);
        self.ret_stack.pop();
        self.locals.pop();
        self.scope_stack.pop();

        Ok(ResolvedHandler { event, param, body: body?, loc })
    }

    // ------------------------------------------------------------------
    // Function bodies (inlining support)
    // ------------------------------------------------------------------

    /// Resolves a user function body as the concrete instance a call site
    /// needs: generic bindings substituted, parameters taking the caller's
    /// concrete argument types (which is what lets an interface-typed
    /// parameter re-resolve against the real type). Instances are memoised
    /// on `(function, concrete argument types)`.
    pub fn resolve_fn_body(
        &mut self,
        fn_id: FnId,
        bindings: &[(String, Type)],
        arg_tys: &[Type],
    ) -> lnc_base::Result<Rc<ResolvedBody>> {
        let key = (fn_id.0, instance_key(bindings, arg_tys));
        if let Some(body) = self.body_memo.get(&key) {
            return Ok(Rc::clone(body));
        }
        if self.inline_stack.contains(&fn_id) {
            let def = self.program.functions.get(fn_id);
            return Err(CompileError::resolve(
                format!("recursive call to `{}` cannot be inlined", def.name),
                def.loc.clone(),
            ));
        }

        let def = self.program.functions.get(fn_id).clone();
        let params: Vec<(String, Type)> = def
            .params
            .iter()
            .enumerate()
            .map(|(idx, (n, t))| {
                let ty = arg_tys.get(idx).cloned().unwrap_or_else(|| t.substitute(bindings));
                (n.clone(), ty)
            })
            .collect();
        let ret = def.ret.substitute(bindings);

        // Bodies resolve in their defining scope, not the caller's.
        self.inline_stack.push(fn_id);
        let saved_locals = std::mem::take(&mut self.locals);
        let saved_bindings = std::mem::take(&mut self.type_bindings);
        let saved_file = std::mem::replace(&mut self.current_file, def.loc.file.clone());
        self.type_bindings = bindings.to_vec();
        self.scope_stack.push(def.scope);
        self.locals.push(HashMap::new());
        for (name, ty) in &params {
            self.bind_local(name, LocalBinding { ty: ty.clone(), mutable: false, closure: None });
        }
        self.ret_stack.push(Some(ret.clone()));

        let block = match def.body {
            FnBody::Block(node) => self.resolve_block(node, Some(&ret)).and_then(|block| {
                self.check_body_type(block, &ret, &def.loc)
            }),
            FnBody::Expr(node) => self.resolve_expr(node, Some(&ret)).and_then(|value| {
                if value.ty() != ret {
                    Err(CompileError::type_error(
                        format!(
                            "`{}` declares return type {} but its body is {}",
                            def.name,
                            ret,
                            value.ty()
                        ),
                        def.loc.clone(),
                    ))
                } else {
                    Ok(TypedBlock { stmts: Vec::new(), ty: value.ty(), tail: Some(Box::new(value)) })
                }
            }),
            FnBody::Opcode(_) => Err(CompileError::resolve(
                format!("opcode-backed `{}` has no body to inline", def.name),
                def.loc.clone(),
            )),
        };

        self.ret_stack.pop();
        self.locals.pop();
        self.scope_stack.pop();
        self.current_file = saved_file;
        self.type_bindings = saved_bindings;
        self.locals = saved_locals;
        self.inline_stack.pop();

        let body = Rc::new(ResolvedBody { params, ret, block: block? });
        self.body_memo.insert(key, Rc::clone(&body));
        Ok(body)
    }

    /// Checks a value-returning body: either the tail produces the declared
    /// type, a trailing conditional can be promoted into the tail, or the
    /// body returns explicitly along the way.
    fn check_body_type(
        &mut self,
        mut block: TypedBlock,
        ret: &Type,
        loc: &Loc,
    ) -> lnc_base::Result<TypedBlock> {
        if ret.is_void() {
            return Ok(block);
        }
        if block.tail.is_some() {
            if block.ty != *ret {
                return Err(CompileError::type_error(
                    format!("body yields {} but the declared return type is {}", block.ty, ret),
                    loc.clone(),
                ));
            }
            return Ok(block);
        }
        // A trailing conditional whose arms all yield the return type acts
        // as the tail expression.
        if let Some(TypedStmt::Cond(_)) = block.stmts.last() {
            if let Some(TypedStmt::Cond(cond)) = block.stmts.pop() {
                let promoted = self.promote_conditional(cond, loc)?;
                block.ty = promoted.ty.clone();
                block.tail = Some(Box::new(TypedExpr::Cond(promoted)));
                if block.ty != *ret {
                    return Err(CompileError::type_error(
                        format!(
                            "conditional yields {} but the declared return type is {}",
                            block.ty, ret
                        ),
                        loc.clone(),
                    ));
                }
                return Ok(block);
            }
        }
        if block.stmts.iter().any(|s| matches!(s, TypedStmt::Return(Some(_)))) {
            return Ok(block);
        }
        Err(CompileError::type_error(
            format!("body never produces the declared return type {}", ret),
            loc.clone(),
        ))
    }

    /// Turns a statement conditional into a value conditional by unifying
    /// the arm types.
    fn promote_conditional(&mut self, mut cond: CondExpr, loc: &Loc) -> lnc_base::Result<CondExpr> {
        let mut ty: Option<Type> = None;
        for arm in &cond.arms {
            let arm_ty = arm.block.ty.clone();
            match &ty {
                None => ty = Some(arm_ty),
                Some(expected) if *expected == arm_ty => {}
                Some(expected) => {
                    return Err(CompileError::type_error(
                        format!("conditional branches disagree: {} vs {}", expected, arm_ty),
                        loc.clone(),
                    ))
                }
            }
        }
        let ty = ty.ok_or_else(|| {
            CompileError::type_error("conditional has no branches".to_string(), loc.clone())
        })?;
        if cond.arms.iter().all(|arm| arm.cond.is_some()) {
            return Err(CompileError::type_error(
                "conditional expression requires an else branch".to_string(),
                loc.clone(),
            ));
        }
        cond.ty = ty;
        Ok(cond)
    }

    // ------------------------------------------------------------------
    // Blocks and statements
    // ------------------------------------------------------------------

    fn resolve_block(
        &mut self,
        node: &'a Cst<'a>,
        tail_hint: Option<&Type>,
    ) -> lnc_base::Result<TypedBlock> {
        self.locals.push(HashMap::new());
        let result = self.resolve_block_inner(node, tail_hint);
        self.locals.pop();
        result
    }

    fn resolve_block_inner(
        &mut self,
        node: &'a Cst<'a>,
        tail_hint: Option<&Type>,
    ) -> lnc_base::Result<TypedBlock> {
        let mut stmts = Vec::new();
        for item in node.req("stmts").children() {
            stmts.push(self.resolve_stmt(item.req("stmt"))?);
        }
        let tail_node = node.req("tail");
        let tail = if tail_node.is_null() {
            None
        } else {
            Some(Box::new(self.resolve_expr(tail_node, tail_hint)?))
        };
        let ty = tail.as_ref().map(|t| t.ty()).unwrap_or_else(Type::void);
        Ok(TypedBlock { stmts, tail, ty })
    }

    fn resolve_stmt(&mut self, node: &'a Cst<'a>) -> lnc_base::Result<TypedStmt> {
        let inner = node.unwrap_choice();
        let loc = self.loc(inner.pos());
        match node.label() {
            Some("constdecl") => self.resolve_decl(inner, false),
            Some("letdecl") => self.resolve_decl(inner, true),
            Some("assignment") => {
                let name = inner.req("name").text().to_string();
                let binding = self.lookup_local(&name).cloned().ok_or_else(|| {
                    CompileError::scope(
                        format!("cannot assign to `{}`: not a local variable", name),
                        loc.clone(),
                    )
                })?;
                if !binding.mutable {
                    return Err(CompileError::scope(
                        format!("cannot assign to immutable `{}`", name),
                        loc,
                    ));
                }
                let value = self.resolve_expr(inner.req("value"), Some(&binding.ty))?;
                if value.ty() != binding.ty {
                    return Err(CompileError::type_error(
                        format!(
                            "cannot assign {} to `{}` of type {}",
                            value.ty(),
                            name,
                            binding.ty
                        ),
                        loc,
                    ));
                }
                Ok(TypedStmt::Assign { name, ty: binding.ty, value })
            }
            Some("conditional") => {
                let cond = self.resolve_conditional(inner, false)?;
                Ok(TypedStmt::Cond(cond))
            }
            Some("emit") => {
                let event_node = inner.req("event");
                let event_name = event_node.text();
                let event_loc = self.loc(event_node.pos());
                let (event, payload) =
                    match self.program.scopes.get(self.current_scope(), event_name) {
                        Some(Entity::Event(EventRef::Builtin(idx))) => {
                            (builtin::BUILTIN_EVENTS[*idx].to_string(), None)
                        }
                        Some(Entity::Event(EventRef::Custom(idx))) => (
                            self.event_names[*idx].clone(),
                            self.program.events[*idx].payload.clone(),
                        ),
                        Some(_) => {
                            return Err(CompileError::resolve(
                                format!("`{}` is not an event", event_name),
                                event_loc,
                            ))
                        }
                        None => {
                            return Err(CompileError::scope(
                                format!("undefined event `{}`", event_name),
                                event_loc,
                            ))
                        }
                    };
                let arg_node = inner.req("arg");
                let arg = if arg_node.is_null() {
                    None
                } else {
                    Some(self.resolve_expr(arg_node.req("expr"), payload.as_ref())?)
                };
                match (&payload, &arg) {
                    (Some(_), None) => Err(CompileError::type_error(
                        format!("event {} requires a payload", event),
                        loc,
                    )),
                    (None, Some(_)) => Err(CompileError::type_error(
                        format!("event {} carries no payload", event),
                        loc,
                    )),
                    (Some(expected), Some(value)) if value.ty() != *expected => {
                        Err(CompileError::type_error(
                            format!(
                                "event {} carries {} but the emitted value is {}",
                                event,
                                expected,
                                value.ty()
                            ),
                            loc,
                        ))
                    }
                    _ => Ok(TypedStmt::Emit { event, arg }),
                }
            }
            Some("return") => {
                let expected = self.ret_stack.last().cloned().flatten();
                let arg_node = inner.req("arg");
                let arg = if arg_node.is_null() {
                    None
                } else {
                    Some(self.resolve_expr(arg_node.req("expr"), expected.as_ref())?)
                };
                match (&expected, &arg) {
                    (Some(ret), Some(value)) if !ret.is_void() && value.ty() != *ret => {
                        Err(CompileError::type_error(
                            format!("returning {} from a {} body", value.ty(), ret),
                            loc,
                        ))
                    }
                    (Some(ret), Some(_)) if ret.is_void() => Err(CompileError::type_error(
                        "cannot return a value from a void body".to_string(),
                        loc,
                    )),
                    (Some(ret), None) if !ret.is_void() => Err(CompileError::type_error(
                        format!("bare return in a body declared to produce {}", ret),
                        loc,
                    )),
                    _ => Ok(TypedStmt::Return(arg)),
                }
            }
            Some("exprstmt") => {
                let value = self.resolve_expr(inner.req("expr"), None)?;
                Ok(TypedStmt::Expr(value))
            }
            other => Err(CompileError::resolve(
                format!("unrecognised statement form {:?}", other),
                loc,
            )),
        }
    }

    fn resolve_decl(&mut self, inner: &'a Cst<'a>, mutable: bool) -> lnc_base::Result<TypedStmt> {
        let name = inner.req("name").text().to_string();
        let loc = self.loc(inner.pos());
        let annot_node = inner.req("typeannot");
        let annot = if annot_node.is_null() {
            None
        } else {
            Some(self.resolve_type(annot_node.req("type"))?)
        };
        let value = self.resolve_expr(inner.req("value"), annot.as_ref())?;
        let ty = match annot {
            Some(annot) => {
                if value.ty() != annot {
                    return Err(CompileError::type_error(
                        format!(
                            "`{}` declared as {} but initialised with {}",
                            name,
                            annot,
                            value.ty()
                        ),
                        loc,
                    ));
                }
                annot
            }
            None => value.ty(),
        };
        let closure = match &value {
            TypedExpr::Closure(def) => Some((def.params.clone(), def.ret.clone())),
            _ => None,
        };
        self.bind_local(&name, LocalBinding { ty: ty.clone(), mutable, closure });
        Ok(TypedStmt::Decl { name, mutable, ty, value })
    }

    fn resolve_conditional(
        &mut self,
        inner: &'a Cst<'a>,
        want_value: bool,
    ) -> lnc_base::Result<CondExpr> {
        let loc = self.loc(inner.pos());
        let mut arms = Vec::new();

        let first_cond = self.resolve_condition(inner.req("cond"))?;
        let first_block = self.resolve_block(inner.req("then"), None)?;
        arms.push(CondArm { cond: Some(first_cond), block: first_block });

        for elif in inner.req("elifs").children() {
            let cond = self.resolve_condition(elif.req("cond"))?;
            let block = self.resolve_block(elif.req("then"), None)?;
            arms.push(CondArm { cond: Some(cond), block });
        }

        let else_node = inner.req("else");
        if !else_node.is_null() {
            let block = self.resolve_block(else_node.req("body"), None)?;
            arms.push(CondArm { cond: None, block });
        }

        let cond = CondExpr { arms, ty: Type::void() };
        if want_value {
            self.promote_conditional(cond, &loc)
        } else {
            Ok(cond)
        }
    }

    fn resolve_condition(&mut self, node: &'a Cst<'a>) -> lnc_base::Result<TypedExpr> {
        let loc = self.loc(node.pos());
        let value = self.resolve_expr(node, Some(&Type::bool()))?;
        if value.ty() != Type::bool() {
            return Err(CompileError::type_error(
                format!("condition must be bool, got {}", value.ty()),
                loc,
            ));
        }
        Ok(value)
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Resolves an `expr` node: a single operand, or an operator spine
    /// rebuilt by shunting-yard over the scope's operator table.
    pub fn resolve_expr(
        &mut self,
        node: &'a Cst<'a>,
        hint: Option<&Type>,
    ) -> lnc_base::Result<TypedExpr> {
        let rest = node.req("rest").children();
        if rest.is_empty() {
            return self.resolve_operand(node.req("first"), hint);
        }

        let mut values = vec![self.resolve_operand(node.req("first"), None)?];
        let mut ops: Vec<(String, u32, Pos)> = Vec::new();
        for item in rest {
            let op_node = item.req("op");
            let symbol = op_node.text().to_string();
            let defs = self
                .program
                .scopes
                .operators(self.current_scope(), &symbol, false);
            if defs.is_empty() {
                return Err(CompileError::resolve(
                    format!("unknown infix operator `{}`", symbol),
                    self.loc(op_node.pos()),
                ));
            }
            let precedence = defs.iter().map(|d| d.precedence).max().unwrap_or(0);
            ops.push((symbol, precedence, op_node.pos()));
            values.push(self.resolve_operand(item.req("operand"), None)?);
        }

        // Shunting-yard with left associativity.
        let mut values = values.into_iter();
        let mut out: Vec<TypedExpr> = vec![values.next().expect("expr has a first operand")];
        let mut pending: Vec<(String, u32, Pos)> = Vec::new();
        for op in ops {
            while let Some(top) = pending.last() {
                if top.1 >= op.1 {
                    let top = pending.pop().expect("pending operator stack is non-empty");
                    self.apply_infix(&mut out, top)?;
                } else {
                    break;
                }
            }
            pending.push(op);
            out.push(values.next().expect("one operand per infix operator"));
        }
        while let Some(top) = pending.pop() {
            self.apply_infix(&mut out, top)?;
        }
        let result = out.pop().expect("shunting-yard leaves one value");
        debug_assert!(out.is_empty());
        Ok(result)
    }

    fn apply_infix(
        &mut self,
        out: &mut Vec<TypedExpr>,
        (symbol, _prec, pos): (String, u32, Pos),
    ) -> lnc_base::Result<()> {
        let rhs = out.pop().expect("infix operator has a right operand");
        let lhs = out.pop().expect("infix operator has a left operand");
        let loc = self.loc(pos);
        let defs = self
            .program
            .scopes
            .operators(self.current_scope(), &symbol, false);
        let names: Vec<String> = dedup_names(defs.iter().map(|d| d.fn_name.clone()));
        let args = vec![lhs, rhs];
        let (target, name, ty) =
            dispatch::dispatch_named_call(self, &names, &args, &[], None, &loc)?;
        out.push(TypedExpr::Call { target, name, args, ty });
        Ok(())
    }

    fn resolve_operand(
        &mut self,
        node: &'a Cst<'a>,
        hint: Option<&Type>,
    ) -> lnc_base::Result<TypedExpr> {
        let prefixes = node.req("prefixes").children();
        let base_hint = if prefixes.is_empty() { hint } else { None };
        let mut value = self.resolve_postfixed(node.req("base"), base_hint)?;

        // Innermost prefix first: `!-x` negates, then nots.
        for prefix in prefixes.iter().rev() {
            let op_node = prefix.req("op");
            let symbol = op_node.text().to_string();
            let loc = self.loc(op_node.pos());
            let defs = self
                .program
                .scopes
                .operators(self.current_scope(), &symbol, true);
            if defs.is_empty() {
                return Err(CompileError::resolve(
                    format!("unknown prefix operator `{}`", symbol),
                    loc,
                ));
            }
            let names: Vec<String> = dedup_names(defs.iter().map(|d| d.fn_name.clone()));
            let args = vec![value];
            let (target, name, ty) =
                dispatch::dispatch_named_call(self, &names, &args, &[], None, &loc)?;
            value = TypedExpr::Call { target, name, args, ty };
        }
        Ok(value)
    }

    fn resolve_postfixed(
        &mut self,
        node: &'a Cst<'a>,
        hint: Option<&Type>,
    ) -> lnc_base::Result<TypedExpr> {
        let segments = node.req("segments").children();
        let core_hint = if segments.is_empty() { hint } else { None };
        let mut value = self.resolve_core(node.req("core"), core_hint)?;

        for segment in segments {
            let inner = segment.unwrap_choice();
            let loc = self.loc(inner.pos());
            match segment.label() {
                Some("method") => {
                    let name = inner.req("name").text().to_string();
                    let call_node = inner.req("call");
                    if call_node.is_null() {
                        // Plain `.field` access.
                        value = CoreValue::Value(self.resolve_field_access(value, &name, &loc)?);
                    } else {
                        let mut args = Vec::new();
                        let mut module_target = None;
                        match value {
                            CoreValue::Value(receiver) => args.push(receiver),
                            CoreValue::Module(idx) => module_target = Some(idx),
                        }
                        let args_node = call_node.req("args");
                        if !args_node.is_null() {
                            for arg in collect_list(args_node) {
                                args.push(self.resolve_expr(arg, None)?);
                            }
                        }
                        let (target, name, ty) = match module_target {
                            Some(module_idx) => dispatch::dispatch_module_call(
                                self, module_idx, &name, &args, &loc,
                            )?,
                            None => self.dispatch_or_closure(&name, &args, &[], None, &loc)?,
                        };
                        value = CoreValue::Value(TypedExpr::Call { target, name, args, ty });
                    }
                }
                _ => {
                    let index = self.resolve_expr(inner.req("index"), None)?;
                    let receiver = match value {
                        CoreValue::Value(v) => v,
                        CoreValue::Module(_) => {
                            return Err(CompileError::resolve(
                                "cannot index a module".to_string(),
                                loc,
                            ))
                        }
                    };
                    let args = vec![receiver, index];
                    let (target, name, ty) =
                        dispatch::dispatch_named_call(self, &["index".to_string()], &args, &[], None, &loc)?;
                    value = CoreValue::Value(TypedExpr::Call { target, name, args, ty });
                }
            }
        }

        match value {
            CoreValue::Value(v) => Ok(v),
            CoreValue::Module(idx) => Err(CompileError::resolve(
                format!(
                    "module `{}` cannot be used as a value",
                    self.program.modules[idx].name
                ),
                self.loc(node.pos()),
            )),
        }
    }

    fn resolve_field_access(
        &mut self,
        value: CoreValue,
        field: &str,
        loc: &Loc,
    ) -> lnc_base::Result<TypedExpr> {
        match value {
            CoreValue::Value(base) => {
                let base_ty = base.ty();
                match base_ty.resolved() {
                    Type::Product { fields, name, .. } => {
                        match fields.iter().position(|(f, _)| f == field) {
                            Some(index) => {
                                let ty = fields[index].1.clone();
                                Ok(TypedExpr::Field {
                                    base: Box::new(base),
                                    field: field.to_string(),
                                    index,
                                    ty,
                                })
                            }
                            None => Err(CompileError::resolve(
                                format!("type {} has no field `{}`", name, field),
                                loc.clone(),
                            )),
                        }
                    }
                    other => Err(CompileError::resolve(
                        format!("type {} has no fields", other),
                        loc.clone(),
                    )),
                }
            }
            CoreValue::Module(idx) => {
                // `alias.constant` reads a module-level constant.
                let module_scope = self.program.modules[idx].scope;
                let exported = self.program.modules[idx].exports.iter().any(|e| e == field);
                match (exported, self.program.scopes.get(module_scope, field)) {
                    (true, Some(Entity::Constant { ty: Some(ty), module, index })) => {
                        let name = self.const_names[&(*module, *index)].clone();
                        Ok(TypedExpr::Var { name, ty: ty.clone() })
                    }
                    _ => Err(CompileError::resolve(
                        format!(
                            "module `{}` does not export a constant `{}`",
                            self.program.modules[idx].name, field
                        ),
                        loc.clone(),
                    )),
                }
            }
        }
    }

    fn resolve_core(
        &mut self,
        node: &'a Cst<'a>,
        hint: Option<&Type>,
    ) -> lnc_base::Result<CoreValue> {
        let inner = node.unwrap_choice();
        let loc = self.loc(node.pos());
        match node.label() {
            Some("paren") => Ok(CoreValue::Value(self.resolve_expr(inner.req("expr"), hint)?)),
            Some("anonfn") => Ok(CoreValue::Value(self.resolve_closure(inner)?)),
            Some("conditional") => {
                let cond = self.resolve_conditional(inner, true)?;
                Ok(CoreValue::Value(TypedExpr::Cond(cond)))
            }
            Some("new") => Ok(CoreValue::Value(self.resolve_record(inner)?)),
            Some("array") => Ok(CoreValue::Value(self.resolve_array(inner, hint, &loc)?)),
            Some("call") => Ok(CoreValue::Value(self.resolve_call(inner, hint)?)),
            Some("var") => self.resolve_var(inner, &loc),
            Some("literal") => {
                let literal = node.choice_inner().unwrap_or(node);
                Ok(CoreValue::Value(self.resolve_literal(literal, hint, &loc)?))
            }
            other => Err(CompileError::resolve(
                format!("unrecognised expression form {:?}", other),
                loc,
            )),
        }
    }

    fn resolve_literal(
        &mut self,
        node: &'a Cst<'a>,
        hint: Option<&Type>,
        loc: &Loc,
    ) -> lnc_base::Result<TypedExpr> {
        let inner = node.choice_inner().unwrap_or(node);
        match node.label() {
            Some("int") => {
                let value: i128 = inner.text().parse().map_err(|_| {
                    CompileError::type_error(
                        format!("integer literal `{}` is out of range", inner.text()),
                        loc.clone(),
                    )
                })?;
                let ty = match hint {
                    Some(hinted) if hinted.is_integer() => hinted.resolved().clone(),
                    Some(hinted) if hinted.is_float() => {
                        return Ok(TypedExpr::Float {
                            value: value as f64,
                            ty: hinted.resolved().clone(),
                        })
                    }
                    _ => Type::int64(),
                };
                let (lo, hi) = ty.integer_range().expect("integer type has a range");
                if value < lo || value > hi {
                    return Err(CompileError::type_error(
                        format!("literal {} does not fit in {}", value, ty),
                        loc.clone(),
                    ));
                }
                Ok(TypedExpr::Int { value, ty })
            }
            Some("real") => {
                let value: f64 = inner.text().parse().map_err(|_| {
                    CompileError::type_error(
                        format!("malformed real literal `{}`", inner.text()),
                        loc.clone(),
                    )
                })?;
                let ty = match hint {
                    Some(hinted) if hinted.is_float() => hinted.resolved().clone(),
                    _ => Type::float64(),
                };
                Ok(TypedExpr::Float { value, ty })
            }
            Some("bool") => Ok(TypedExpr::Bool { value: inner.text() == "true" }),
            Some("str") => Ok(TypedExpr::Str { value: decode_string(inner) }),
            other => Err(CompileError::resolve(
                format!("unrecognised literal form {:?}", other),
                loc.clone(),
            )),
        }
    }

    fn resolve_var(&mut self, node: &'a Cst<'a>, loc: &Loc) -> lnc_base::Result<CoreValue> {
        let name = node.text();
        if let Some(binding) = self.lookup_local(name) {
            return Ok(CoreValue::Value(TypedExpr::Var {
                name: name.to_string(),
                ty: binding.ty.clone(),
            }));
        }
        match self.program.scopes.get(self.current_scope(), name) {
            Some(Entity::Constant { ty: Some(ty), module, index }) => {
                let unique = self.const_names[&(*module, *index)].clone();
                Ok(CoreValue::Value(TypedExpr::Var { name: unique, ty: ty.clone() }))
            }
            Some(Entity::Constant { ty: None, .. }) => Err(CompileError::scope(
                format!("constant `{}` is used before its definition", name),
                loc.clone(),
            )),
            Some(Entity::ModuleAlias(idx)) => Ok(CoreValue::Module(*idx)),
            Some(Entity::Functions(_)) => Err(CompileError::resolve(
                format!("function `{}` used as a value; wrap it in a closure", name),
                loc.clone(),
            )),
            Some(Entity::Event(_)) => Err(CompileError::resolve(
                format!("event `{}` cannot be used as a value", name),
                loc.clone(),
            )),
            Some(_) => Err(CompileError::resolve(
                format!("`{}` is not a value", name),
                loc.clone(),
            )),
            None => Err(CompileError::scope(
                format!("undefined identifier `{}`", name),
                loc.clone(),
            )),
        }
    }

    fn resolve_call(
        &mut self,
        inner: &'a Cst<'a>,
        hint: Option<&Type>,
    ) -> lnc_base::Result<TypedExpr> {
        let name_node = inner.req("name");
        let name = name_node.text().to_string();
        let loc = self.loc(name_node.pos());

        let mut explicit = Vec::new();
        let typeargs = inner.req("typeargs");
        if !typeargs.is_null() {
            for arg in collect_list(typeargs.req("list")) {
                explicit.push(self.resolve_type(arg)?);
            }
        }

        let mut args = Vec::new();
        let args_node = inner.req("parens").req("args");
        if !args_node.is_null() {
            for arg in collect_list(args_node) {
                args.push(self.resolve_expr(arg, None)?);
            }
        }

        let (target, name, ty) = self.dispatch_or_closure(&name, &args, &explicit, hint, &loc)?;
        Ok(TypedExpr::Call { target, name, args, ty })
    }

    /// A named call is either a closure-variable invocation or a dispatch
    /// over the function sets in scope.
    fn dispatch_or_closure(
        &mut self,
        name: &str,
        args: &[TypedExpr],
        explicit: &[Type],
        hint: Option<&Type>,
        loc: &Loc,
    ) -> lnc_base::Result<(CallTarget, String, Type)> {
        if let Some(binding) = self.lookup_local(name).cloned() {
            let (params, ret) = match binding.closure {
                Some(sig) => sig,
                None => {
                    return Err(CompileError::resolve(
                        format!("`{}` is not callable", name),
                        loc.clone(),
                    ))
                }
            };
            if params.len() != args.len() {
                return Err(CompileError::resolve(
                    format!(
                        "closure `{}` takes {} argument(s), got {}",
                        name,
                        params.len(),
                        args.len()
                    ),
                    loc.clone(),
                ));
            }
            for ((_, param_ty), arg) in params.iter().zip(args) {
                if arg.ty() != *param_ty {
                    return Err(CompileError::type_error(
                        format!(
                            "closure `{}` expects {} but the argument is {}",
                            name,
                            param_ty,
                            arg.ty()
                        ),
                        loc.clone(),
                    ));
                }
            }
            return Ok((CallTarget::ClosureVar, name.to_string(), ret));
        }
        dispatch::dispatch_named_call(self, &[name.to_string()], args, explicit, hint, loc)
    }

    fn resolve_closure(&mut self, inner: &'a Cst<'a>) -> lnc_base::Result<TypedExpr> {
        let loc = self.loc(inner.pos());
        let params = self.resolve_params(inner.req("params"))?;
        let ret_node = inner.req("ret");
        let annot = if ret_node.is_null() {
            None
        } else {
            Some(self.resolve_type(ret_node.req("type"))?)
        };

        // Closures see their enclosing locals; push one frame for params.
        self.locals.push(HashMap::new());
        for (name, ty) in &params {
            self.bind_local(name, LocalBinding { ty: ty.clone(), mutable: false, closure: None });
        }
        self.ret_stack.push(annot.clone());
        let body_node = inner.req("body");
        let block = match body_node.label() {
            Some("arrow") => {
                let value =
                    self.resolve_expr(body_node.unwrap_choice().req("expr"), annot.as_ref())?;
                Ok(TypedBlock { stmts: Vec::new(), ty: value.ty(), tail: Some(Box::new(value)) })
            }
            _ => self.resolve_block(body_node.unwrap_choice(), annot.as_ref()),
        };
        self.ret_stack.pop();
        self.locals.pop();
        let mut block = block?;

        let ret = match annot {
            Some(ret) => {
                if !ret.is_void() {
                    block = self.check_body_type(block, &ret, &loc)?;
                }
                ret
            }
            None => block.ty.clone(),
        };
        Ok(TypedExpr::Closure(Rc::new(ClosureDef { params, ret, body: block })))
    }

    fn resolve_record(&mut self, inner: &'a Cst<'a>) -> lnc_base::Result<TypedExpr> {
        let loc = self.loc(inner.pos());
        let ty = self.resolve_type(inner.req("type"))?;
        let declared = match ty.resolved() {
            Type::Product { fields, .. } => fields.clone(),
            other => {
                return Err(CompileError::type_error(
                    format!("`new` requires a record type, got {}", other),
                    loc,
                ))
            }
        };

        let mut provided: Vec<(String, &'a Cst<'a>)> = Vec::new();
        let fields_node = inner.req("fields");
        if !fields_node.is_null() {
            for field in collect_list(fields_node) {
                provided.push((field.req("name").text().to_string(), field.req("value")));
            }
        }

        let mut values = Vec::new();
        for (field_name, field_ty) in &declared {
            let node = provided
                .iter()
                .find(|(n, _)| n == field_name)
                .map(|(_, v)| *v)
                .ok_or_else(|| {
                    CompileError::type_error(
                        format!("missing field `{}` in record literal", field_name),
                        loc.clone(),
                    )
                })?;
            let value = self.resolve_expr(node, Some(field_ty))?;
            if value.ty() != *field_ty {
                return Err(CompileError::type_error(
                    format!(
                        "field `{}` is {} but the value is {}",
                        field_name,
                        field_ty,
                        value.ty()
                    ),
                    loc.clone(),
                ));
            }
            values.push((field_name.clone(), value));
        }
        if provided.len() != declared.len() {
            return Err(CompileError::type_error(
                "record literal has extra fields".to_string(),
                loc,
            ));
        }
        Ok(TypedExpr::Record { fields: values, ty })
    }

    fn resolve_array(
        &mut self,
        inner: &'a Cst<'a>,
        hint: Option<&Type>,
        loc: &Loc,
    ) -> lnc_base::Result<TypedExpr> {
        let elem_hint = match hint.map(Type::resolved) {
            Some(Type::Generic { name, args }) if name == "Array" => Some(args[0].clone()),
            _ => None,
        };
        let mut items = Vec::new();
        let items_node = inner.req("items");
        if !items_node.is_null() {
            for item in collect_list(items_node) {
                items.push(self.resolve_expr(item, elem_hint.as_ref())?);
            }
        }
        let elem = match (&elem_hint, items.first()) {
            (Some(elem), _) => elem.clone(),
            (None, Some(first)) => first.ty(),
            (None, None) => {
                return Err(CompileError::type_error(
                    "cannot infer the element type of an empty array literal".to_string(),
                    loc.clone(),
                ))
            }
        };
        for item in &items {
            if item.ty() != elem {
                return Err(CompileError::type_error(
                    format!(
                        "array literal mixes {} and {}",
                        elem,
                        item.ty()
                    ),
                    loc.clone(),
                ));
            }
        }
        Ok(TypedExpr::ArrayLit { items, elem })
    }

    fn resolve_params(&mut self, node: &'a Cst<'a>) -> lnc_base::Result<Vec<(String, Type)>> {
        let mut params = Vec::new();
        if node.is_null() {
            return Ok(params);
        }
        let list = node.req("list");
        for param in collect_list(list) {
            let name = param.req("name").text().to_string();
            let ty = self.resolve_type(param.req("type"))?;
            params.push((name, ty));
        }
        Ok(params)
    }

    /// Resolves a typename in the current scope, honouring the generic
    /// bindings active while a function body is being instantiated.
    fn resolve_type(&mut self, node: &'a Cst<'a>) -> lnc_base::Result<Type> {
        let file = self.current_file.clone();
        let names: Vec<String> = self.type_bindings.iter().map(|(n, _)| n.clone()).collect();
        let ty = modules::resolve_typename(
            &self.program.scopes,
            self.current_scope(),
            node,
            &file,
            &names,
        )?;
        Ok(ty.substitute(&self.type_bindings))
    }
}

fn instance_key(bindings: &[(String, Type)], arg_tys: &[Type]) -> String {
    let bound: Vec<String> = bindings
        .iter()
        .map(|(name, ty)| format!("{}={}", name, ty))
        .collect();
    let args: Vec<String> = arg_tys.iter().map(Type::to_string).collect();
    format!("{}|{}", bound.join(","), args.join(","))
}

fn unique_name(used: &mut HashMap<String, usize>, name: &str) -> String {
    match used.get_mut(name) {
        None => {
            used.insert(name.to_string(), 1);
            name.to_string()
        }
        Some(count) => {
            *count += 1;
            format!("{}_{}", name, *count)
        }
    }
}

fn dedup_names<I: Iterator<Item = String>>(names: I) -> Vec<String> {
    let mut seen = Vec::new();
    for name in names {
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::load_entry_text;
    use lnc_parse::ParseArenas;

    fn resolve(source: &str) -> lnc_base::Result<ResolvedProgram> {
        let arenas = ParseArenas::new();
        let program = load_entry_text(arenas.ctx(), "main.ln", source)?;
        let mut resolver = Resolver::new(program);
        resolver.resolve_program()
    }

    #[test]
    fn hello_world_resolves_to_three_statements() {
        let resolved = resolve(
            "from @std/app import start, print, exit\non start { print('Hello, World!'); emit exit 0; }\n",
        )
        .unwrap();

        // app's _start handler plus the user handler.
        assert_eq!(resolved.handlers.len(), 2);
        let user = &resolved.handlers[1];
        assert_eq!(user.event, "start");
        assert_eq!(user.body.stmts.len(), 2);

        match &user.body.stmts[0] {
            TypedStmt::Expr(TypedExpr::Call { target, name, args, .. }) => {
                assert_eq!(name, "print");
                assert!(matches!(target, CallTarget::Opcode { opcode, .. } if opcode == "stdoutp"));
                assert!(matches!(&args[0], TypedExpr::Str { value } if value == "Hello, World!"));
            }
            other => panic!("unexpected statement {:?}", other),
        }
        match &user.body.stmts[1] {
            TypedStmt::Emit { event, arg: Some(TypedExpr::Int { value: 0, ty }) } => {
                assert_eq!(event, "exit");
                assert_eq!(*ty, Type::Builtin(crate::types::Builtin::Int8));
            }
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn integer_call_prefers_the_integer_overload() {
        let resolved = resolve(
            "from @std/app import start\non start { const r: int64 = add(1, 2); }\n",
        )
        .unwrap();
        let handler = resolved.handlers.last().unwrap();
        match &handler.body.stmts[0] {
            TypedStmt::Decl { ty, value: TypedExpr::Call { target, name, .. }, .. } => {
                assert_eq!(name, "add");
                assert_eq!(*ty, Type::int64());
                assert!(matches!(target, CallTarget::Opcode { opcode, .. } if opcode == "addi64"));
            }
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn operators_lower_to_dispatch_calls_with_precedence() {
        let resolved = resolve(
            "from @std/app import start\non start { const r: int64 = 1 + 2 * 3; }\n",
        )
        .unwrap();
        let handler = resolved.handlers.last().unwrap();
        match &handler.body.stmts[0] {
            TypedStmt::Decl { value: TypedExpr::Call { name, args, .. }, .. } => {
                // + applies last: add(1, mul(2, 3))
                assert_eq!(name, "add");
                assert!(matches!(&args[0], TypedExpr::Int { value: 1, .. }));
                assert!(
                    matches!(&args[1], TypedExpr::Call { name, .. } if name == "mul")
                );
            }
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn comparison_chain_produces_bool_condition() {
        let resolved = resolve(
            "from @std/app import start\nconst x: int64 = 5;\non start { if x > 0 { print('pos'); } else { print('other'); } }\n",
        )
        .unwrap();
        let handler = resolved.handlers.last().unwrap();
        match &handler.body.stmts[0] {
            TypedStmt::Cond(cond) => {
                assert_eq!(cond.arms.len(), 2);
                let first = cond.arms[0].cond.as_ref().unwrap();
                assert_eq!(first.ty(), Type::bool());
                assert!(cond.arms[1].cond.is_none());
            }
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn width_overflow_is_a_type_error() {
        let err = resolve(
            "from @std/app import start, exit\non start { emit exit 300; }\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("does not fit in int8"));
    }

    #[test]
    fn closures_record_their_signature() {
        let resolved = resolve(
            "from @std/app import start\non start { const f = fn (n: int64): int64 { n * 2 }; const y: int64 = f(3); }\n",
        )
        .unwrap();
        let handler = resolved.handlers.last().unwrap();
        match &handler.body.stmts[0] {
            TypedStmt::Decl { value: TypedExpr::Closure(def), .. } => {
                assert_eq!(def.params.len(), 1);
                assert_eq!(def.ret, Type::int64());
                assert_eq!(def.body.ty, Type::int64());
            }
            other => panic!("unexpected statement {:?}", other),
        }
        match &handler.body.stmts[1] {
            TypedStmt::Decl { value: TypedExpr::Call { target, .. }, .. } => {
                assert!(matches!(target, CallTarget::ClosureVar));
            }
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn generic_array_push_binds_the_element_type() {
        let resolved = resolve(
            "from @std/app import start\non start { let xs: Array<int64> = newarr(); push(xs, 7); }\n",
        )
        .unwrap();
        let handler = resolved.handlers.last().unwrap();
        match &handler.body.stmts[0] {
            TypedStmt::Decl { ty, .. } => assert_eq!(*ty, Type::array_of(Type::int64())),
            other => panic!("unexpected statement {:?}", other),
        }
        match &handler.body.stmts[1] {
            TypedStmt::Expr(TypedExpr::Call { target, .. }) => {
                assert!(matches!(target, CallTarget::Opcode { opcode, .. } if opcode == "pusharr"));
            }
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn array_access_yields_result_of_element() {
        let resolved = resolve(
            "from @std/app import start\non start { let xs: Array<int64> = newarr(); const item: Result<int64> = xs[0]; }\n",
        )
        .unwrap();
        let handler = resolved.handlers.last().unwrap();
        match &handler.body.stmts[1] {
            TypedStmt::Decl { ty, value: TypedExpr::Call { name, .. }, .. } => {
                assert_eq!(name, "index");
                assert_eq!(*ty, Type::result_of(Type::int64()));
            }
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn method_chains_insert_the_receiver() {
        let resolved = resolve(
            "from @std/app import start, print\non start { print(7.toString()); }\n",
        )
        .unwrap();
        let handler = resolved.handlers.last().unwrap();
        match &handler.body.stmts[0] {
            TypedStmt::Expr(TypedExpr::Call { args, .. }) => match &args[0] {
                TypedExpr::Call { name, args, ty, .. } => {
                    assert_eq!(name, "toString");
                    assert_eq!(args.len(), 1);
                    assert_eq!(*ty, Type::string());
                }
                other => panic!("unexpected receiver {:?}", other),
            },
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn ambiguous_dispatch_is_rejected() {
        let err = resolve(
            "from @std/app import start\n\
             fn pick(a: int64): int64 = a;\n\
             fn pick(b: int64): int64 = b;\n\
             on start { const x: int64 = pick(1); }\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("ambiguous call"));
    }

    #[test]
    fn missing_function_reports_argument_types() {
        let err = resolve(
            "from @std/app import start\non start { const x: int64 = frobnicate(1, true); }\n",
        )
        .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("no matching function"));
        assert!(text.contains("int64"));
        assert!(text.contains("bool"));
    }

    #[test]
    fn interface_constrained_generic_uses_satisfaction() {
        let resolved = resolve(
            "from @std/app import start\n\
             on start {\n\
               let table: Array<any> = newarr();\n\
               push(table, true);\n\
               evalcond(table);\n\
             }\n",
        )
        .unwrap();
        let handler = resolved.handlers.last().unwrap();
        assert_eq!(handler.body.stmts.len(), 3);
        match &handler.body.stmts[2] {
            TypedStmt::Expr(TypedExpr::Call { target, .. }) => {
                assert!(matches!(target, CallTarget::Opcode { opcode, .. } if opcode == "evalcond"));
            }
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn value_conditionals_unify_branch_types() {
        let resolved = resolve(
            "from @std/app import start\nconst flag: bool = true;\non start { const x: int64 = if flag { 1 } else { 2 }; }\n",
        )
        .unwrap();
        let handler = resolved.handlers.last().unwrap();
        match &handler.body.stmts[0] {
            TypedStmt::Decl { value: TypedExpr::Cond(cond), .. } => {
                assert_eq!(cond.ty, Type::int64());
            }
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn mismatched_conditional_branches_are_a_type_error() {
        let err = resolve(
            "from @std/app import start\nconst flag: bool = true;\non start { const x: int64 = if flag { 1 } else { 'two' }; }\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("branches disagree"));
    }

    #[test]
    fn generic_user_function_bodies_are_memoised() {
        let arenas = ParseArenas::new();
        let source = "from @std/app import start\nfrom @std/seq import second\non start { let xs: Array<int64> = newarr(); const s: Result<int64> = second(xs); }\n";
        let program = load_entry_text(arenas.ctx(), "main.ln", source).unwrap();
        let mut resolver = Resolver::new(program);
        let resolved = resolver.resolve_program().unwrap();

        let handler = resolved.handlers.last().unwrap();
        let (fn_id, bindings) = match &handler.body.stmts[1] {
            TypedStmt::Decl { value: TypedExpr::Call { target: CallTarget::Inline { fn_id, bindings }, .. }, .. } => {
                (*fn_id, bindings.clone())
            }
            other => panic!("unexpected statement {:?}", other),
        };
        assert_eq!(bindings, vec![("T".to_string(), Type::int64())]);

        let arg_tys = vec![Type::array_of(Type::int64())];
        let first = resolver.resolve_fn_body(fn_id, &bindings, &arg_tys).unwrap();
        let second = resolver.resolve_fn_body(fn_id, &bindings, &arg_tys).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(first.ret, Type::result_of(Type::int64()));
    }

    #[test]
    fn events_cannot_be_used_as_values() {
        let err = resolve(
            "from @std/app import start, exit\non start { const x: int64 = exit; }\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("cannot be used as a value"));
    }
}
