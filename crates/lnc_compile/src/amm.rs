//! The AMM emitter: resolved LN down to flat, typed intermediate text.
//!
//! AMM keeps calls to opcode-backed functions by their surface name and
//! erases everything else:
//!
//! - user functions are inlined, their parameters becoming fresh constants
//!   and their locals renamed per inline instance;
//! - operators and method chains are already calls in the resolved tree;
//! - conditional chains become dispatch tables — an `Array<any>` of
//!   (condition, closure) pairs consumed by one `evalcond` call;
//! - records and array literals lower to `newarr`/`pusharr` sequences,
//!   field access to an indexed `fldarr` read;
//! - `return` inside an inlined value body assigns the synthesised result
//!   variable and falls through.
//!
//! The emitter re-parses its own output with the AMM grammar before
//! returning; a failure there is an emitter bug surfaced as an
//! [`EmissionError`](lnc_base::ErrorKind::Emission) with the parse
//! diagnostic as its cause.

use std::collections::HashMap;
use std::fmt::Write as _;

use lnc_base::CompileError;
use lnc_parse::{parse_amm, ParseArenas};
use lnc_semantic::{
    CallTarget, ClosureDef, CondExpr, ResolvedProgram, Resolver, Type, TypedExpr, TypedStmt,
};

/// Emits the whole program as one AMM text.
pub fn emit_amm(resolved: &ResolvedProgram, resolver: &mut Resolver<'_>) -> lnc_base::Result<String> {
    let mut emitter = AmmEmitter { resolver, temp: 0, inline_instance: 0 };
    let text = emitter.emit(resolved)?;

    // Every emitted AMM must re-parse cleanly under the AMM grammar.
    let arenas = ParseArenas::new();
    if let Err(cause) = parse_amm(arenas.ctx(), "<emitted>", &text) {
        return Err(CompileError::emission(
            "emitted amm does not re-parse under the amm grammar".to_string(),
        )
        .with_cause(cause));
    }
    log::debug!("emitted {} bytes of amm", text.len());
    Ok(text)
}

/// Per-inline-instance renaming of parameters and locals, plus the
/// destination a value `return` assigns while a body is being inlined.
#[derive(Default, Clone)]
struct Renames {
    map: HashMap<String, String>,
    prefix: Option<String>,
    /// True while an inlined body is being spliced; its returns vanish.
    inlined: bool,
    ret_target: Option<String>,
}

impl Renames {
    fn top() -> Self {
        Renames::default()
    }

    fn instance(instance: usize) -> Self {
        Renames {
            map: HashMap::new(),
            prefix: Some(format!("_i{}_", instance)),
            inlined: true,
            ret_target: None,
        }
    }

    fn declare(&mut self, name: &str) -> String {
        match &self.prefix {
            None => name.to_string(),
            Some(prefix) => {
                let renamed = format!("{}{}", prefix, name);
                self.map.insert(name.to_string(), renamed.clone());
                renamed
            }
        }
    }

    fn resolve(&self, name: &str) -> String {
        self.map.get(name).cloned().unwrap_or_else(|| name.to_string())
    }
}

struct AmmEmitter<'r, 'a> {
    resolver: &'r mut Resolver<'a>,
    temp: usize,
    inline_instance: usize,
}

impl<'r, 'a> AmmEmitter<'r, 'a> {
    fn emit(&mut self, resolved: &ResolvedProgram) -> lnc_base::Result<String> {
        let mut out = String::new();

        for constant in &resolved.constants {
            self.emit_module_const(constant, &mut out)?;
        }
        if !resolved.constants.is_empty() {
            out.push('\n');
        }

        for event in &resolved.events {
            match &event.payload {
                Some(ty) => {
                    writeln!(out, "event {}: {};", event.name, render_type(ty)).expect("write to string")
                }
                None => writeln!(out, "event {};", event.name).expect("write to string"),
            }
        }
        if !resolved.events.is_empty() {
            out.push('\n');
        }

        for handler in &resolved.handlers {
            self.temp = 0;
            match &handler.param {
                Some((name, ty)) => writeln!(
                    out,
                    "on {} fn ({}: {}): void {{",
                    handler.event,
                    name,
                    render_type(ty)
                )
                .expect("write to string"),
                None => writeln!(out, "on {} fn (): void {{", handler.event).expect("write to string"),
            }
            let mut renames = Renames::top();
            self.emit_stmts(&handler.body.stmts, &mut renames, "  ", &mut out)?;
            if let Some(tail) = &handler.body.tail {
                self.emit_discarded(tail, &mut renames, "  ", &mut out)?;
            }
            out.push_str("  return;\n");
            out.push_str("}\n\n");
        }

        Ok(out)
    }

    // ------------------------------------------------------------------
    // Module constants
    // ------------------------------------------------------------------

    fn emit_module_const(
        &mut self,
        constant: &lnc_semantic::ResolvedConst,
        out: &mut String,
    ) -> lnc_base::Result<()> {
        let rhs = self.const_rhs(&constant.value, out)?;
        writeln!(out, "const {}: {} = {};", constant.name, render_type(&constant.ty), rhs)
            .expect("write to string");
        Ok(())
    }

    /// Renders a module-constant initialiser, splitting complex parts into
    /// synthetic predecessor constants.
    fn const_rhs(&mut self, value: &TypedExpr, out: &mut String) -> lnc_base::Result<String> {
        if let Some(folded) = fold_negate(value) {
            return Ok(render_literal(&folded));
        }
        match value {
            _ if value.is_literal() => Ok(render_literal(value)),
            TypedExpr::Var { name, .. } => Ok(name.clone()),
            TypedExpr::Call { target: CallTarget::Opcode { .. }, name, args, .. } => {
                let mut rendered = Vec::new();
                for arg in args {
                    rendered.push(self.const_operand(arg, out)?);
                }
                Ok(format!("{}({})", name, rendered.join(", ")))
            }
            TypedExpr::Call { target: CallTarget::Inline { fn_id, bindings }, args, name, .. } => {
                let arg_tys: Vec<Type> = args.iter().map(TypedExpr::ty).collect();
                let body = self.resolver.resolve_fn_body(*fn_id, bindings, &arg_tys)?;
                if !body.block.stmts.is_empty() || body.block.tail.is_none() {
                    return Err(CompileError::emission(format!(
                        "module constant initialiser calls `{}`, which does not reduce to a single expression",
                        name
                    )));
                }
                let tail = body.block.tail.as_ref().expect("tail checked above").as_ref().clone();
                let substituted = substitute_params(&tail, &body.params, args);
                self.const_rhs(&substituted, out)
            }
            other => Err(CompileError::emission(format!(
                "module constant initialiser of type {} cannot live in global memory",
                other.ty()
            ))),
        }
    }

    fn const_operand(&mut self, value: &TypedExpr, out: &mut String) -> lnc_base::Result<String> {
        if let Some(folded) = fold_negate(value) {
            return Ok(render_literal(&folded));
        }
        match value {
            _ if value.is_literal() => Ok(render_literal(value)),
            TypedExpr::Var { name, .. } => Ok(name.clone()),
            other => {
                let name = self.fresh_const();
                let rhs = self.const_rhs(other, out)?;
                writeln!(out, "const {}: {} = {};", name, render_type(&other.ty()), rhs)
                    .expect("write to string");
                Ok(name)
            }
        }
    }

    fn fresh_const(&mut self) -> String {
        let name = format!("_c{}", self.temp);
        self.temp += 1;
        name
    }

    fn fresh_temp(&mut self) -> String {
        let name = format!("_t{}", self.temp);
        self.temp += 1;
        name
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn emit_stmts(
        &mut self,
        stmts: &[TypedStmt],
        renames: &mut Renames,
        indent: &str,
        out: &mut String,
    ) -> lnc_base::Result<()> {
        for stmt in stmts {
            self.emit_stmt(stmt, renames, indent, out)?;
        }
        Ok(())
    }

    fn emit_stmt(
        &mut self,
        stmt: &TypedStmt,
        renames: &mut Renames,
        indent: &str,
        out: &mut String,
    ) -> lnc_base::Result<()> {
        match stmt {
            TypedStmt::Decl { name, mutable, ty, value } => {
                let target = renames.declare(name);
                self.emit_value_into(&target, *mutable, ty, value, renames, indent, out)
            }
            TypedStmt::Assign { name, value, .. } => {
                let target = renames.resolve(name);
                let operand = self.operand(value, renames, indent, out)?;
                writeln!(out, "{}{} = {};", indent, target, operand).expect("write to string");
                Ok(())
            }
            TypedStmt::Expr(value) => self.emit_discarded(value, renames, indent, out),
            TypedStmt::Emit { event, arg } => {
                match arg {
                    Some(value) => {
                        let operand = self.operand(value, renames, indent, out)?;
                        writeln!(out, "{}emit {} {};", indent, event, operand)
                            .expect("write to string");
                    }
                    None => writeln!(out, "{}emit {};", indent, event).expect("write to string"),
                }
                Ok(())
            }
            TypedStmt::Return(value) => {
                // Inside an inlined body a value return assigns the call's
                // destination and falls through, a bare return just
                // vanishes; at handler level the bare return stays as the
                // explicit fall-through marker.
                if renames.inlined {
                    if let (Some(target), Some(value)) = (renames.ret_target.clone(), value) {
                        let operand = self.operand(value, renames, indent, out)?;
                        writeln!(out, "{}{} = {};", indent, target, operand)
                            .expect("write to string");
                    }
                } else {
                    writeln!(out, "{}return;", indent).expect("write to string");
                }
                Ok(())
            }
            TypedStmt::Cond(cond) => self.emit_cond(cond, None, renames, indent, out),
        }
    }

    /// A statement-position expression: emitted bare when void, captured
    /// into a discarded temporary otherwise.
    fn emit_discarded(
        &mut self,
        value: &TypedExpr,
        renames: &mut Renames,
        indent: &str,
        out: &mut String,
    ) -> lnc_base::Result<()> {
        match value {
            TypedExpr::Call { target, name, args, ty } if ty.is_void() => match target {
                CallTarget::Opcode { .. } | CallTarget::ClosureVar => {
                    let mut rendered = Vec::new();
                    for arg in args {
                        rendered.push(self.operand(arg, renames, indent, out)?);
                    }
                    let callee = match target {
                        CallTarget::ClosureVar => renames.resolve(name),
                        _ => name.clone(),
                    };
                    writeln!(out, "{}{}({});", indent, callee, rendered.join(", "))
                        .expect("write to string");
                    Ok(())
                }
                CallTarget::Inline { fn_id, bindings } => {
                    self.emit_inline(*fn_id, bindings.clone(), args, None, renames, indent, out)
                }
            },
            other => {
                let temp = self.fresh_temp();
                self.emit_value_into(&temp, false, &other.ty(), other, renames, indent, out)
            }
        }
    }

    /// Emits `value` into a declared variable.
    fn emit_value_into(
        &mut self,
        target: &str,
        mutable: bool,
        ty: &Type,
        value: &TypedExpr,
        renames: &mut Renames,
        indent: &str,
        out: &mut String,
    ) -> lnc_base::Result<()> {
        let keyword = if mutable { "let" } else { "const" };
        if let Some(folded) = fold_negate(value) {
            writeln!(
                out,
                "{}{} {}: {} = {};",
                indent,
                keyword,
                target,
                render_type(ty),
                render_literal(&folded)
            )
            .expect("write to string");
            return Ok(());
        }
        match value {
            _ if value.is_literal() => {
                writeln!(
                    out,
                    "{}{} {}: {} = {};",
                    indent,
                    keyword,
                    target,
                    render_type(ty),
                    render_literal(value)
                )
                .expect("write to string");
                Ok(())
            }
            TypedExpr::Var { name, .. } => {
                writeln!(
                    out,
                    "{}{} {}: {} = {};",
                    indent,
                    keyword,
                    target,
                    render_type(ty),
                    renames.resolve(name)
                )
                .expect("write to string");
                Ok(())
            }
            TypedExpr::Call { target: call_target, name, args, .. } => match call_target {
                CallTarget::Opcode { .. } | CallTarget::ClosureVar => {
                    let mut rendered = Vec::new();
                    for arg in args {
                        rendered.push(self.operand(arg, renames, indent, out)?);
                    }
                    let callee = match call_target {
                        CallTarget::ClosureVar => renames.resolve(name),
                        _ => name.clone(),
                    };
                    writeln!(
                        out,
                        "{}{} {}: {} = {}({});",
                        indent,
                        keyword,
                        target,
                        render_type(ty),
                        callee,
                        rendered.join(", ")
                    )
                    .expect("write to string");
                    Ok(())
                }
                CallTarget::Inline { fn_id, bindings } => self.emit_inline(
                    *fn_id,
                    bindings.clone(),
                    args,
                    Some((target, ty)),
                    renames,
                    indent,
                    out,
                ),
            },
            TypedExpr::Closure(def) => self.emit_closure_decl(target, def, renames, indent, out),
            TypedExpr::Field { base, index, .. } => {
                let base_operand = self.operand(base, renames, indent, out)?;
                writeln!(
                    out,
                    "{}{} {}: {} = fldarr({}, {});",
                    indent,
                    keyword,
                    target,
                    render_type(ty),
                    base_operand,
                    index
                )
                .expect("write to string");
                Ok(())
            }
            TypedExpr::Record { fields, .. } => {
                writeln!(out, "{}let {}: Array<any> = newarr();", indent, target)
                    .expect("write to string");
                for (_, field_value) in fields {
                    let operand = self.operand(field_value, renames, indent, out)?;
                    writeln!(out, "{}pusharr({}, {});", indent, target, operand)
                        .expect("write to string");
                }
                Ok(())
            }
            TypedExpr::ArrayLit { items, elem } => {
                writeln!(
                    out,
                    "{}let {}: {} = newarr();",
                    indent,
                    target,
                    render_type(&Type::array_of(elem.clone()))
                )
                .expect("write to string");
                for item in items {
                    let operand = self.operand(item, renames, indent, out)?;
                    writeln!(out, "{}pusharr({}, {});", indent, target, operand)
                        .expect("write to string");
                }
                Ok(())
            }
            TypedExpr::Cond(cond) => {
                let zero = zero_literal(ty).ok_or_else(|| {
                    CompileError::emission(format!(
                        "conditional values of type {} have no default representation",
                        ty
                    ))
                })?;
                writeln!(out, "{}let {}: {} = {};", indent, target, render_type(ty), zero)
                    .expect("write to string");
                self.emit_cond(cond, Some(target), renames, indent, out)
            }
            other => Err(CompileError::emission(format!(
                "expression of type {} has no amm lowering",
                other.ty()
            ))),
        }
    }

    /// Renders an expression as an AMM call operand: a literal stays
    /// inline, a variable is renamed, anything else is captured into a
    /// synthetic constant first.
    fn operand(
        &mut self,
        value: &TypedExpr,
        renames: &mut Renames,
        indent: &str,
        out: &mut String,
    ) -> lnc_base::Result<String> {
        if let Some(folded) = fold_negate(value) {
            return Ok(render_literal(&folded));
        }
        match value {
            _ if value.is_literal() => Ok(render_literal(value)),
            TypedExpr::Var { name, .. } => Ok(renames.resolve(name)),
            other => {
                let temp = self.fresh_temp();
                self.emit_value_into(&temp, false, &other.ty(), other, renames, indent, out)?;
                Ok(temp)
            }
        }
    }

    // ------------------------------------------------------------------
    // Closures and conditional tables
    // ------------------------------------------------------------------

    fn emit_closure_decl(
        &mut self,
        target: &str,
        def: &ClosureDef,
        renames: &mut Renames,
        indent: &str,
        out: &mut String,
    ) -> lnc_base::Result<()> {
        let params: Vec<String> = def
            .params
            .iter()
            .map(|(name, ty)| format!("{}: {}", name, render_type(ty)))
            .collect();
        let ret = render_type(&def.ret);
        writeln!(
            out,
            "{}const {}: function = fn ({}): {} {{",
            indent,
            target,
            params.join(", "),
            ret
        )
        .expect("write to string");

        let inner_indent = format!("{}  ", indent);
        // Closure params shadow; everything else stays visible (shared
        // frame), so the enclosing rename map carries through. Returns
        // inside a closure belong to the closure, not to any surrounding
        // inline instance.
        let mut inner = renames.clone();
        inner.inlined = false;
        inner.ret_target = None;
        for (name, _) in &def.params {
            inner.map.remove(name);
        }
        self.emit_stmts(&def.body.stmts, &mut inner, &inner_indent, out)?;
        if let Some(tail) = &def.body.tail {
            if def.ret.is_void() {
                self.emit_discarded(tail, &mut inner, &inner_indent, out)?;
            } else {
                let ret_var = self.fresh_ret();
                let ty = tail.ty();
                self.emit_value_into(&ret_var, false, &ty, tail, &mut inner, &inner_indent, out)?;
            }
        }
        writeln!(out, "{}}};", indent).expect("write to string");
        Ok(())
    }

    fn fresh_ret(&mut self) -> String {
        let name = format!("_ret{}", self.temp);
        self.temp += 1;
        name
    }

    /// Lowers a conditional chain to its dispatch table: pairs of
    /// (condition, branch closure) pushed in source order, the terminal
    /// `else` carried as a `true` condition, then one `evalcond` call.
    fn emit_cond(
        &mut self,
        cond: &CondExpr,
        result: Option<&str>,
        renames: &mut Renames,
        indent: &str,
        out: &mut String,
    ) -> lnc_base::Result<()> {
        let table = self.fresh_temp();
        writeln!(out, "{}let {}: Array<any> = newarr();", indent, table).expect("write to string");

        for arm in &cond.arms {
            let cond_operand = match &arm.cond {
                Some(value) => self.operand(value, renames, indent, out)?,
                None => "true".to_string(),
            };
            let branch = self.fresh_temp();
            writeln!(out, "{}const {}: function = fn (): void {{", indent, branch)
                .expect("write to string");
            let inner_indent = format!("{}  ", indent);
            let mut inner = renames.clone();
            self.emit_stmts(&arm.block.stmts, &mut inner, &inner_indent, out)?;
            if let Some(tail) = &arm.block.tail {
                match result {
                    Some(result_var) => {
                        let operand = self.operand(tail, &mut inner, &inner_indent, out)?;
                        writeln!(out, "{}{} = {};", inner_indent, result_var, operand)
                            .expect("write to string");
                    }
                    None => self.emit_discarded(tail, &mut inner, &inner_indent, out)?,
                }
            }
            writeln!(out, "{}}};", indent).expect("write to string");
            writeln!(out, "{}pusharr({}, {});", indent, table, cond_operand)
                .expect("write to string");
            writeln!(out, "{}pusharr({}, {});", indent, table, branch).expect("write to string");
        }

        writeln!(out, "{}evalcond({});", indent, table).expect("write to string");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Inlining
    // ------------------------------------------------------------------

    fn emit_inline(
        &mut self,
        fn_id: lnc_semantic::FnId,
        bindings: Vec<(String, Type)>,
        args: &[TypedExpr],
        dest: Option<(&str, &Type)>,
        renames: &mut Renames,
        indent: &str,
        out: &mut String,
    ) -> lnc_base::Result<()> {
        let arg_tys: Vec<Type> = args.iter().map(TypedExpr::ty).collect();
        let body = self.resolver.resolve_fn_body(fn_id, &bindings, &arg_tys)?;
        let instance = self.inline_instance;
        self.inline_instance += 1;

        let mut inner = Renames::instance(instance);
        for ((param, ty), arg) in body.params.iter().zip(args) {
            let operand = self.operand(arg, renames, indent, out)?;
            let renamed = inner.declare(param);
            writeln!(out, "{}const {}: {} = {};", indent, renamed, render_type(ty), operand)
                .expect("write to string");
        }

        let has_value_return = block_has_value_return(&body.block.stmts);
        let needs_mutable_dest = dest.is_some() && has_value_return;
        if let Some((dest_name, dest_ty)) = dest {
            if needs_mutable_dest {
                let zero = zero_literal(dest_ty).ok_or_else(|| {
                    CompileError::emission(format!(
                        "inlined values of type {} have no default representation",
                        dest_ty
                    ))
                })?;
                writeln!(out, "{}let {}: {} = {};", indent, dest_name, render_type(dest_ty), zero)
                    .expect("write to string");
            }
        }

        inner.ret_target = dest
            .filter(|_| has_value_return)
            .map(|(name, _)| name.to_string());
        self.emit_stmts(&body.block.stmts, &mut inner, indent, out)?;

        if let Some(tail) = &body.block.tail {
            match dest {
                Some((dest_name, dest_ty)) => {
                    if needs_mutable_dest {
                        let operand = self.operand(tail, &mut inner, indent, out)?;
                        writeln!(out, "{}{} = {};", indent, dest_name, operand)
                            .expect("write to string");
                    } else {
                        let tail = tail.as_ref().clone();
                        self.emit_value_into(
                            dest_name, false, dest_ty, &tail, &mut inner, indent, out,
                        )?;
                    }
                }
                None => self.emit_discarded(tail, &mut inner, indent, out)?,
            }
        }
        Ok(())
    }

}

fn block_has_value_return(stmts: &[TypedStmt]) -> bool {
    stmts.iter().any(|stmt| match stmt {
        TypedStmt::Return(Some(_)) => true,
        TypedStmt::Cond(cond) => cond
            .arms
            .iter()
            .any(|arm| block_has_value_return(&arm.block.stmts)),
        _ => false,
    })
}

/// `negate(<numeric literal>)` folds to a signed literal so AMM can carry
/// negative numbers inline.
fn fold_negate(value: &TypedExpr) -> Option<TypedExpr> {
    match value {
        TypedExpr::Call { target: CallTarget::Opcode { opcode, .. }, args, ty, .. }
            if opcode.starts_with("neg") && args.len() == 1 =>
        {
            match &args[0] {
                TypedExpr::Int { value, .. } => {
                    Some(TypedExpr::Int { value: -value, ty: ty.clone() })
                }
                TypedExpr::Float { value, .. } => {
                    Some(TypedExpr::Float { value: -value, ty: ty.clone() })
                }
                _ => None,
            }
        }
        _ => None,
    }
}

/// Rewrites parameter references in an expression to the caller's argument
/// expressions (used when a function body is a single expression).
fn substitute_params(
    expr: &TypedExpr,
    params: &[(String, Type)],
    args: &[TypedExpr],
) -> TypedExpr {
    match expr {
        TypedExpr::Var { name, .. } => {
            for ((param, _), arg) in params.iter().zip(args) {
                if param == name {
                    return arg.clone();
                }
            }
            expr.clone()
        }
        TypedExpr::Call { target, name, args: call_args, ty } => TypedExpr::Call {
            target: target.clone(),
            name: name.clone(),
            args: call_args
                .iter()
                .map(|a| substitute_params(a, params, args))
                .collect(),
            ty: ty.clone(),
        },
        TypedExpr::Field { base, field, index, ty } => TypedExpr::Field {
            base: Box::new(substitute_params(base, params, args)),
            field: field.clone(),
            index: *index,
            ty: ty.clone(),
        },
        other => other.clone(),
    }
}

/// AMM type rendering: aliases resolve away, records and interfaces erase
/// to the array representation their values actually use.
pub fn render_type(ty: &Type) -> String {
    match ty.resolved() {
        Type::Product { .. } | Type::Interface { .. } => "Array<any>".to_string(),
        Type::Generic { name, args } => {
            let rendered: Vec<String> = args.iter().map(render_type).collect();
            format!("{}<{}>", name, rendered.join(", "))
        }
        other => other.to_string(),
    }
}

fn render_literal(value: &TypedExpr) -> String {
    match value {
        TypedExpr::Int { value, .. } => value.to_string(),
        TypedExpr::Float { value, .. } => render_float(*value),
        TypedExpr::Bool { value } => value.to_string(),
        TypedExpr::Str { value } => render_string(value),
        _ => unreachable!("render_literal called on a non-literal"),
    }
}

/// Floats always carry a decimal point so the AMM grammar reads them back
/// as reals.
pub fn render_float(value: f64) -> String {
    let text = format!("{:?}", value);
    if text.contains('.') && !text.contains('e') && !text.contains('E') {
        text
    } else {
        format!("{:.1}", value)
    }
}

/// Single quotes when the text allows it, double quotes with escapes
/// otherwise.
pub fn render_string(value: &str) -> String {
    if !value.contains('\'') && !value.contains('\\') && !value.contains('\n') && !value.contains('\t') {
        format!("'{}'", value)
    } else {
        let mut out = String::with_capacity(value.len() + 2);
        out.push('"');
        for ch in value.chars() {
            match ch {
                '\\' => out.push_str("\\\\"),
                '"' => out.push_str("\\\""),
                '\n' => out.push_str("\\n"),
                '\t' => out.push_str("\\t"),
                other => out.push(other),
            }
        }
        out.push('"');
        out
    }
}

fn zero_literal(ty: &Type) -> Option<String> {
    match ty.resolved() {
        Type::Builtin(b) => match b {
            lnc_semantic::Builtin::Int8
            | lnc_semantic::Builtin::Int16
            | lnc_semantic::Builtin::Int32
            | lnc_semantic::Builtin::Int64 => Some("0".to_string()),
            lnc_semantic::Builtin::Float32 | lnc_semantic::Builtin::Float64 => {
                Some("0.0".to_string())
            }
            lnc_semantic::Builtin::Bool => Some("false".to_string()),
            lnc_semantic::Builtin::Str => Some("''".to_string()),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lnc_semantic::load_entry_text;

    fn emit(source: &str) -> String {
        let arenas = ParseArenas::new();
        let program = load_entry_text(arenas.ctx(), "main.ln", source).unwrap();
        let mut resolver = Resolver::new(program);
        let resolved = resolver.resolve_program().unwrap();
        emit_amm(&resolved, &mut resolver).unwrap()
    }

    #[test]
    fn hello_world_keeps_the_print_call() {
        let amm = emit(
            "from @std/app import start, print, exit\non start { print('Hello, World!'); emit exit 0; }\n",
        );
        assert!(amm.contains("event start;"));
        assert!(amm.contains("event stdout: string;"));
        assert!(amm.contains("event exit: int8;"));
        assert!(amm.contains("on start fn (): void {"));
        assert!(amm.contains("print('Hello, World!');"));
        assert!(amm.contains("emit exit 0;"));
        assert!(amm.contains("return;"));
    }

    #[test]
    fn dispatch_keeps_the_surface_name_and_the_resolved_type() {
        let amm = emit(
            "from @std/app import start\non start { const r: int64 = add(1, 2); }\n",
        );
        assert!(amm.contains("const r: int64 = add(1, 2);"));
    }

    #[test]
    fn operators_emit_as_calls() {
        let amm = emit(
            "from @std/app import start\non start { const r: int64 = 1 + 2 * 3; }\n",
        );
        assert!(amm.contains("mul(2, 3)"));
        assert!(amm.contains("add(1, _t"));
    }

    #[test]
    fn conditionals_lower_to_a_dispatch_table() {
        let amm = emit(
            "from @std/app import start, print\nconst x: int64 = 5;\non start { if x > 0 { print('pos'); } else if x < 0 { print('neg'); } else { print('zero'); } }\n",
        );
        assert!(amm.contains("Array<any> = newarr();"));
        // Three (condition, closure) pairs: two comparisons and the
        // terminal else carried as `true`.
        assert_eq!(amm.matches("pusharr(").count(), 6);
        assert!(amm.contains("pusharr(_t0, true)"));
        assert_eq!(amm.matches("evalcond(").count(), 1);
    }

    #[test]
    fn user_functions_inline_with_renamed_parameters() {
        let amm = emit(
            "from @std/app import start\nfn double(n: int64): int64 = mul(n, 2);\non start { const r: int64 = double(21); }\n",
        );
        assert!(amm.contains("const _i0_n: int64 = 21;"));
        assert!(amm.contains("const r: int64 = mul(_i0_n, 2);"));
        assert!(!amm.contains("double("));
    }

    #[test]
    fn module_constants_split_complex_initialisers() {
        let amm = emit("const x: int64 = add(mul(2, 3), 4);\n");
        assert!(amm.contains("const _c0: int64 = mul(2, 3);"));
        assert!(amm.contains("const x: int64 = add(_c0, 4);"));
    }

    #[test]
    fn negative_literals_fold_inline() {
        let amm = emit("const low: int64 = -8;\n");
        assert!(amm.contains("const low: int64 = -8;"));
    }

    #[test]
    fn closures_keep_their_bodies() {
        let amm = emit(
            "from @std/app import start\non start { const f = fn (n: int64): int64 { n * 2 }; const y: int64 = f(3); }\n",
        );
        assert!(amm.contains("const f: function = fn (n: int64): int64 {"));
        assert!(amm.contains("mul(n, 2)"));
        assert!(amm.contains("const y: int64 = f(3);"));
    }

    #[test]
    fn emitted_amm_reparses() {
        let amm = emit(
            "from @std/app import start, print\nconst pi: float64 = 3.14;\non start { print(toString(pi)); }\n",
        );
        let arenas = ParseArenas::new();
        parse_amm(arenas.ctx(), "check.amm", &amm).unwrap();
        assert!(amm.contains("const pi: float64 = 3.14;"));
    }
}
