//! Module loading and declaration registration.
//!
//! [`load_entry_file`]/[`load_entry_text`] drive the whole front half of the
//! compiler: parse the entry module, walk its imports depth-first (bundled
//! `@std/*` sources from the embedded table, `./`-style paths from disk,
//! anything else pre-staged as a sibling directory), and register every
//! declaration into its module scope. Modules end up in load order, which
//! fixes event-id assignment: a dependency's events are declared before the
//! events of the module that imports it.
//!
//! The scope chain is built here too: builtin scope ← `@std/root` ← every
//! other module. Cyclic imports are rejected with both endpoints named;
//! re-entry into an already-loaded module is idempotent.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use lnc_base::{CompileError, Loc};
use lnc_parse::grammar::collect_list;
use lnc_parse::{parse_ln, Cst, CstContext};

use crate::builtin;
use crate::function::{FnBody, FnDef, Functions, Purity};
use crate::scope::{Entity, EventRef, OpDef, ScopeId, Scopes};
use crate::stdlib;
use crate::types::{IfaceOp, Type, BUILTIN_GENERICS};

/// A module-level constant, pre-resolution.
#[derive(Debug)]
pub struct ConstDecl<'a> {
    pub name: String,
    pub annot: Option<Type>,
    pub value: &'a Cst<'a>,
    pub loc: Loc,
}

/// An `on <event>` handler, pre-resolution. `body` is the handler-body
/// choice node (an anonymous function or a bare block).
#[derive(Debug)]
pub struct HandlerDecl<'a> {
    pub event: String,
    pub body: &'a Cst<'a>,
    pub loc: Loc,
}

/// A declared (custom) event. Ids are indexes into the program's event
/// table, assigned in declaration order across modules.
#[derive(Debug)]
pub struct EventDecl {
    pub name: String,
    pub payload: Option<Type>,
    pub module: usize,
    pub loc: Loc,
}

/// One loaded module.
#[derive(Debug)]
pub struct Module<'a> {
    /// Canonical name: `@std/<x>` or the source path.
    pub name: String,
    /// Directory for resolving this module's relative imports.
    pub dir: Option<PathBuf>,
    pub scope: ScopeId,
    pub constants: Vec<ConstDecl<'a>>,
    pub handlers: Vec<HandlerDecl<'a>>,
    pub exports: Vec<String>,
}

/// Everything the loader produces; input to the resolver.
#[derive(Debug)]
pub struct Program<'a> {
    pub scopes: Scopes,
    pub functions: Functions<'a>,
    pub modules: Vec<Module<'a>>,
    pub events: Vec<EventDecl>,
    pub builtin_scope: ScopeId,
    pub root_scope: ScopeId,
    pub entry: usize,
}

impl<'a> Program<'a> {
    pub fn module_named(&self, name: &str) -> Option<&Module<'a>> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn event_index(&self, name: &str) -> Option<usize> {
        self.events.iter().position(|e| e.name == name)
    }
}

/// Loads a program whose entry module lives on disk.
pub fn load_entry_file<'a>(ctx: CstContext<'a>, path: &Path) -> lnc_base::Result<Program<'a>> {
    // Canonicalise so the cycle detector sees the same key a dependency
    // chain arriving back here will use.
    let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let text = fs::read_to_string(&path)
        .map_err(|err| CompileError::io(format!("cannot read {}: {}", path.display(), err)))?;
    let dir = path.parent().map(Path::to_path_buf);
    let name = path.to_string_lossy().into_owned();
    load_entry(ctx, name, &text, dir)
}

/// Loads a program from an in-memory entry source. Relative imports are
/// rejected since there is no directory to resolve them against.
pub fn load_entry_text<'a>(
    ctx: CstContext<'a>,
    name: &str,
    text: &str,
) -> lnc_base::Result<Program<'a>> {
    load_entry(ctx, name.to_string(), text, None)
}

fn load_entry<'a>(
    ctx: CstContext<'a>,
    name: String,
    text: &str,
    dir: Option<PathBuf>,
) -> lnc_base::Result<Program<'a>> {
    let mut loader = Loader::new(ctx)?;
    let entry = loader.load_module(name, text, dir, loader.program.root_scope)?;
    let mut program = loader.program;
    program.entry = entry;
    log::debug!(
        "loaded {} modules, {} events, {} functions",
        program.modules.len(),
        program.events.len(),
        program.functions.len()
    );
    Ok(program)
}

struct Loader<'a> {
    ctx: CstContext<'a>,
    program: Program<'a>,
    loaded: HashMap<String, usize>,
    loading: Vec<String>,
    next_type_id: u32,
}

impl<'a> Loader<'a> {
    fn new(ctx: CstContext<'a>) -> lnc_base::Result<Self> {
        let mut scopes = Scopes::new();
        let builtin_scope = builtin::install(&mut scopes);
        let mut loader = Loader {
            ctx,
            program: Program {
                scopes,
                functions: Functions::new(),
                modules: Vec::new(),
                events: Vec::new(),
                builtin_scope,
                root_scope: builtin_scope,
                entry: 0,
            },
            loaded: HashMap::new(),
            loading: Vec::new(),
            next_type_id: 0,
        };
        let root_source = stdlib::source("root")
            .ok_or_else(|| CompileError::import("standard library module @std/root is missing"))?;
        let root_idx =
            loader.load_module("@std/root".to_string(), root_source, None, builtin_scope)?;
        loader.program.root_scope = loader.program.modules[root_idx].scope;
        Ok(loader)
    }

    fn load_module(
        &mut self,
        key: String,
        text: &str,
        dir: Option<PathBuf>,
        parent: ScopeId,
    ) -> lnc_base::Result<usize> {
        if let Some(&idx) = self.loaded.get(&key) {
            return Ok(idx);
        }
        if self.loading.iter().any(|k| *k == key) {
            let importer = self.loading.last().cloned().unwrap_or_default();
            return Err(CompileError::import(format!(
                "cyclic import between {} and {}",
                importer, key
            )));
        }
        self.loading.push(key.clone());

        let file = self.ctx.alloc_name(&key);
        let source = self.ctx.alloc_name(text);
        let cst = parse_ln(self.ctx, file, source)?;

        let scope = self.program.scopes.push(Some(parent));

        // Dependencies first; their declarations (and event ids) precede ours.
        for item in cst.req("imports").children() {
            self.process_import(item.req("import"), scope, &dir, &key)?;
        }

        let idx = self.program.modules.len();
        self.program.modules.push(Module {
            name: key.clone(),
            dir,
            scope,
            constants: Vec::new(),
            handlers: Vec::new(),
            exports: Vec::new(),
        });

        for (order, item) in cst.req("decls").children().iter().enumerate() {
            self.register_decl(idx, item.req("decl"), order)?;
        }

        self.loading.pop();
        self.loaded.insert(key, idx);
        Ok(idx)
    }

    fn process_import(
        &mut self,
        node: &'a Cst<'a>,
        scope: ScopeId,
        dir: &Option<PathBuf>,
        importer: &str,
    ) -> lnc_base::Result<()> {
        let inner = node.unwrap_choice();
        match node.label() {
            Some("from") => {
                let dep_idx = self.load_dep(inner.req("dep"), dir, importer)?;
                for name_node in collect_list(inner.req("names")) {
                    let name = name_node.text();
                    let loc = Loc::new(importer, name_node.pos());
                    let entity = self.exported_entity(dep_idx, name).ok_or_else(|| {
                        CompileError::scope(
                            format!(
                                "module {} does not export `{}`",
                                self.program.modules[dep_idx].name, name
                            ),
                            loc.clone(),
                        )
                    })?;
                    self.program.scopes.insert(scope, name, entity, &loc)?;
                }
            }
            Some("plain") => {
                let dep_idx = self.load_dep(inner.req("dep"), dir, importer)?;
                let alias_node = inner.req("alias");
                let alias = if alias_node.is_null() {
                    default_alias(&self.program.modules[dep_idx].name)
                } else {
                    alias_node.req("name").text().to_string()
                };
                let loc = Loc::new(importer, inner.pos());
                self.program
                    .scopes
                    .insert(scope, &alias, Entity::ModuleAlias(dep_idx), &loc)?;
            }
            other => {
                return Err(CompileError::import(format!(
                    "unrecognised import form {:?} in {}",
                    other, importer
                )))
            }
        }
        Ok(())
    }

    fn load_dep(
        &mut self,
        dep: &'a Cst<'a>,
        dir: &Option<PathBuf>,
        importer: &str,
    ) -> lnc_base::Result<usize> {
        let inner = dep.unwrap_choice();
        let loc = Loc::new(importer, dep.pos());
        match dep.label() {
            Some("std") => {
                let name = inner.req("name").text();
                let key = format!("@std/{}", name);
                if let Some(&idx) = self.loaded.get(&key) {
                    return Ok(idx);
                }
                let source = stdlib::source(name).ok_or_else(|| {
                    CompileError::import(format!("unknown standard library module {}", key))
                        .at(loc.clone())
                })?;
                let root = self.program.root_scope;
                self.load_module(key, source, None, root)
            }
            Some("rel") => {
                let base = dir.as_ref().ok_or_else(|| {
                    CompileError::import(format!(
                        "relative import {} from in-memory module {}",
                        dep.text(),
                        importer
                    ))
                    .at(loc.clone())
                })?;
                let path = base.join(format!("{}.ln", dep.text()));
                self.load_file_dep(path, loc)
            }
            Some("bare") => {
                let base = dir.as_ref().ok_or_else(|| {
                    CompileError::import(format!(
                        "dependency import {} from in-memory module {}",
                        dep.text(),
                        importer
                    ))
                    .at(loc.clone())
                })?;
                // Pre-staged dependency: a sibling directory with an index
                // module. The core never fetches anything.
                let path = base.join(dep.text()).join("index.ln");
                self.load_file_dep(path, loc)
            }
            other => Err(CompileError::import(format!(
                "unrecognised dependency form {:?}",
                other
            ))
            .at(loc)),
        }
    }

    fn load_file_dep(&mut self, path: PathBuf, loc: Loc) -> lnc_base::Result<usize> {
        let canonical = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
        let key = canonical.to_string_lossy().into_owned();
        if let Some(&idx) = self.loaded.get(&key) {
            return Ok(idx);
        }
        let text = fs::read_to_string(&canonical).map_err(|err| {
            CompileError::import(format!("cannot read module {}: {}", path.display(), err))
                .at(loc)
        })?;
        let dir = canonical.parent().map(Path::to_path_buf);
        let root = self.program.root_scope;
        self.load_module(key, &text, dir, root)
    }

    fn exported_entity(&self, module: usize, name: &str) -> Option<Entity> {
        let module = &self.program.modules[module];
        if !module.exports.iter().any(|e| e == name) {
            return None;
        }
        self.program.scopes.get(module.scope, name).cloned()
    }

    fn register_decl(
        &mut self,
        idx: usize,
        decl: &'a Cst<'a>,
        order: usize,
    ) -> lnc_base::Result<()> {
        let exported = !decl.req("export").is_null();
        let item = decl.req("item");
        let inner = item.unwrap_choice();
        let scope = self.program.modules[idx].scope;
        let file = self.program.modules[idx].name.clone();
        let loc = Loc::new(&file, inner.pos());

        match item.label() {
            Some("constdecl") => {
                let name = inner.req("name").text().to_string();
                let annot_node = inner.req("typeannot");
                let annot = if annot_node.is_null() {
                    None
                } else {
                    Some(resolve_typename(
                        &self.program.scopes,
                        scope,
                        annot_node.req("type"),
                        &file,
                        &[],
                    )?)
                };
                let index = self.program.modules[idx].constants.len();
                self.program.scopes.insert(
                    scope,
                    &name,
                    Entity::Constant { ty: annot.clone(), module: idx, index },
                    &loc,
                )?;
                self.program.modules[idx].constants.push(ConstDecl {
                    name: name.clone(),
                    annot,
                    value: inner.req("value"),
                    loc,
                });
                if exported {
                    self.program.modules[idx].exports.push(name);
                }
            }
            Some("eventdecl") => {
                let name = inner.req("name").text().to_string();
                let payload_node = inner.req("payload");
                let payload = if payload_node.is_null() {
                    None
                } else {
                    Some(resolve_typename(
                        &self.program.scopes,
                        scope,
                        payload_node.req("type"),
                        &file,
                        &[],
                    )?)
                };
                let event_idx = self.program.events.len();
                self.program.events.push(EventDecl {
                    name: name.clone(),
                    payload,
                    module: idx,
                    loc: loc.clone(),
                });
                self.program.scopes.insert(
                    scope,
                    &name,
                    Entity::Event(EventRef::Custom(event_idx)),
                    &loc,
                )?;
                if exported {
                    self.program.modules[idx].exports.push(name);
                }
            }
            Some("fndecl") => {
                let name = inner.req("name").text().to_string();
                let generics = generic_names(inner.req("generics"));
                let mut params = Vec::new();
                let params_node = inner.req("params").req("list");
                for param in collect_list(params_node) {
                    let pname = param.req("name").text().to_string();
                    let pty = resolve_typename(
                        &self.program.scopes,
                        scope,
                        param.req("type"),
                        &file,
                        &generics,
                    )?;
                    params.push((pname, pty));
                }
                let ret_node = inner.req("ret");
                let ret = if ret_node.is_null() {
                    Type::void()
                } else {
                    resolve_typename(
                        &self.program.scopes,
                        scope,
                        ret_node.req("type"),
                        &file,
                        &generics,
                    )?
                };
                let body_node = inner.req("body");
                let (body, purity) = match body_node.label() {
                    Some("binds") => {
                        let opcode = body_node.unwrap_choice().req("opcode").text();
                        (FnBody::Opcode(opcode), builtin::opcode_purity(opcode))
                    }
                    Some("arrow") => (
                        FnBody::Expr(body_node.unwrap_choice().req("expr")),
                        Purity::Impure,
                    ),
                    _ => (FnBody::Block(body_node.unwrap_choice()), Purity::Impure),
                };
                let id = self.program.functions.add(FnDef {
                    name: name.clone(),
                    generics,
                    params,
                    ret,
                    body,
                    purity,
                    loc: loc.clone(),
                    scope,
                    order,
                });
                self.program
                    .scopes
                    .insert(scope, &name, Entity::Functions(vec![id]), &loc)?;
                if exported {
                    self.program.modules[idx].exports.push(name);
                }
            }
            Some("typedecl") => {
                let name = inner.req("name").text().to_string();
                let generics = generic_names(inner.req("generics"));
                let body = inner.req("body");
                let ty = match body.label() {
                    Some("alias") => {
                        let target = resolve_typename(
                            &self.program.scopes,
                            scope,
                            body.unwrap_choice().req("target"),
                            &file,
                            &generics,
                        )?;
                        Type::Alias { name: name.clone(), target: Box::new(target) }
                    }
                    _ => {
                        let mut fields = Vec::new();
                        let fields_node = body.unwrap_choice().req("fields");
                        for field in collect_list(fields_node) {
                            let fname = field.req("name").text().to_string();
                            let fty = resolve_typename(
                                &self.program.scopes,
                                scope,
                                field.req("type"),
                                &file,
                                &generics,
                            )?;
                            fields.push((fname, fty));
                        }
                        let decl_id = self.next_type_id;
                        self.next_type_id += 1;
                        Type::Product { name: name.clone(), decl_id, fields }
                    }
                };
                let entity = if generics.is_empty() {
                    Entity::Type(ty)
                } else {
                    Entity::GenericType { params: generics, proto: ty }
                };
                self.program.scopes.insert(scope, &name, entity, &loc)?;
                if exported {
                    self.program.modules[idx].exports.push(name);
                }
            }
            Some("interface") => {
                let name = inner.req("name").text().to_string();
                // Occurrences of the interface's own name inside member
                // signatures stand for "the implementing type" and resolve
                // to a parameter marker.
                let self_param = vec![name.clone()];
                let mut ops = Vec::new();
                let mut fields = Vec::new();
                for item_node in inner.req("items").children() {
                    let member = item_node.req("member");
                    let member_inner = member.unwrap_choice();
                    match member.label() {
                        Some("fn") => {
                            let op_name = member_inner.req("name").text().to_string();
                            let mut op_params = Vec::new();
                            for p in collect_list(member_inner.req("params")) {
                                op_params.push(resolve_typename(
                                    &self.program.scopes,
                                    scope,
                                    p,
                                    &file,
                                    &self_param,
                                )?);
                            }
                            let op_ret = resolve_typename(
                                &self.program.scopes,
                                scope,
                                member_inner.req("ret"),
                                &file,
                                &self_param,
                            )?;
                            ops.push(IfaceOp { name: op_name, params: op_params, ret: op_ret });
                        }
                        _ => {
                            let fname = member_inner.req("name").text().to_string();
                            let fty = resolve_typename(
                                &self.program.scopes,
                                scope,
                                member_inner.req("type"),
                                &file,
                                &self_param,
                            )?;
                            fields.push((fname, fty));
                        }
                    }
                }
                let ty = Type::Interface { name: name.clone(), ops, fields };
                self.program
                    .scopes
                    .insert(scope, &name, Entity::Interface(ty), &loc)?;
                if exported {
                    self.program.modules[idx].exports.push(name);
                }
            }
            Some("handler") => {
                if exported {
                    return Err(CompileError::scope(
                        "handlers cannot be exported".to_string(),
                        loc,
                    ));
                }
                let event = inner.req("event").text().to_string();
                self.program.modules[idx].handlers.push(HandlerDecl {
                    event,
                    body: inner.req("body"),
                    loc,
                });
            }
            Some("opmap") => {
                let prefix = matches!(inner.req("fixity").label(), Some("prefix"));
                let fn_name = inner.req("fnname").text().to_string();
                let symbol = inner.req("symbol").text().to_string();
                let level: u32 = inner.req("level").text().parse().map_err(|_| {
                    CompileError::scope(
                        format!("operator precedence out of range for `{}`", symbol),
                        loc.clone(),
                    )
                })?;
                let op = OpDef { symbol: symbol.clone(), prefix, precedence: level, fn_name };
                self.program
                    .scopes
                    .insert(scope, &symbol, Entity::Operators(vec![op]), &loc)?;
                if exported {
                    self.program.modules[idx].exports.push(symbol);
                }
            }
            Some("reexport") => {
                let name = inner.req("name").text().to_string();
                if !exported {
                    return Err(CompileError::scope(
                        format!("stray statement `{}` at module level", name),
                        loc,
                    ));
                }
                if self.program.scopes.get(scope, &name).is_none() {
                    return Err(CompileError::scope(
                        format!("cannot re-export `{}`: not in scope", name),
                        loc,
                    ));
                }
                self.program.modules[idx].exports.push(name);
            }
            other => {
                return Err(CompileError::scope(
                    format!("unrecognised declaration form {:?}", other),
                    loc,
                ))
            }
        }
        Ok(())
    }
}

/// `import @std/app` binds `app`; `import somepkg` binds `somepkg`.
fn default_alias(module_name: &str) -> String {
    module_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(module_name)
        .trim_end_matches(".ln")
        .to_string()
}

fn generic_names<'a>(node: &'a Cst<'a>) -> Vec<String> {
    if node.is_null() {
        return Vec::new();
    }
    collect_list(node.req("list"))
        .iter()
        .map(|n| n.text().to_string())
        .collect()
}

/// Resolves a `typename` CST node against a scope.
///
/// `generics` lists the parameter names in force (a function's generic
/// parameters, or an interface's own name); they resolve to [`Type::Param`].
pub fn resolve_typename(
    scopes: &Scopes,
    scope: ScopeId,
    node: &Cst<'_>,
    file: &str,
    generics: &[String],
) -> lnc_base::Result<Type> {
    let name_node = node.req("name");
    let name = name_node.text();
    let loc = Loc::new(file, name_node.pos());

    let args_node = node.req("args");
    let mut args = Vec::new();
    if !args_node.is_null() {
        for arg in collect_list(args_node.req("list")) {
            args.push(resolve_typename(scopes, scope, arg, file, generics)?);
        }
    }

    if generics.iter().any(|g| g == name) {
        if !args.is_empty() {
            return Err(CompileError::type_error(
                format!("generic parameter `{}` takes no type arguments", name),
                loc,
            ));
        }
        return Ok(Type::Param(name.to_string()));
    }

    if BUILTIN_GENERICS.contains(&name) {
        let arity = if name == "Either" { 2 } else { 1 };
        if args.len() != arity {
            return Err(CompileError::type_error(
                format!("{} takes {} type argument(s), got {}", name, arity, args.len()),
                loc,
            ));
        }
        return Ok(Type::Generic { name: name.to_string(), args });
    }

    match scopes.get(scope, name) {
        Some(Entity::Type(ty)) => {
            if !args.is_empty() {
                return Err(CompileError::type_error(
                    format!("type `{}` takes no type arguments", name),
                    loc,
                ));
            }
            Ok(ty.clone())
        }
        Some(Entity::Interface(ty)) => {
            if !args.is_empty() {
                return Err(CompileError::type_error(
                    format!("interface `{}` takes no type arguments", name),
                    loc,
                ));
            }
            Ok(ty.clone())
        }
        Some(Entity::GenericType { params, proto }) => {
            if args.len() != params.len() {
                return Err(CompileError::type_error(
                    format!(
                        "type `{}` takes {} type argument(s), got {}",
                        name,
                        params.len(),
                        args.len()
                    ),
                    loc,
                ));
            }
            let bindings: Vec<(String, Type)> =
                params.iter().cloned().zip(args).collect();
            Ok(proto.substitute(&bindings))
        }
        Some(_) => Err(CompileError::scope(
            format!("`{}` is not a type", name),
            loc,
        )),
        None => Err(CompileError::scope(
            format!("undefined type `{}`", name),
            loc,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lnc_parse::ParseArenas;

    #[test]
    fn loads_hello_world_with_std_modules() {
        let arenas = ParseArenas::new();
        let source = "from @std/app import start, print, exit\non start { print('Hello, World!'); emit exit 0; }\n";
        let program = load_entry_text(arenas.ctx(), "main.ln", source).unwrap();

        // @std/root, @std/app, main — in load order.
        assert_eq!(program.modules[0].name, "@std/root");
        assert_eq!(program.modules[1].name, "@std/app");
        assert_eq!(program.modules[program.entry].name, "main.ln");

        // Event ids: start is the first declared custom event.
        assert_eq!(program.event_index("start"), Some(0));
        assert_eq!(program.event_index("stdout"), Some(1));
        assert_eq!(program.event_index("exit"), Some(2));

        // The entry module sees the imported names.
        let entry_scope = program.modules[program.entry].scope;
        assert!(matches!(
            program.scopes.get(entry_scope, "start"),
            Some(Entity::Event(EventRef::Custom(0)))
        ));
        assert!(matches!(
            program.scopes.get(entry_scope, "print"),
            Some(Entity::Functions(_))
        ));
    }

    #[test]
    fn missing_std_module_is_an_import_error() {
        let arenas = ParseArenas::new();
        let source = "import @std/nope\n";
        let err = load_entry_text(arenas.ctx(), "main.ln", source).unwrap_err();
        assert!(err.to_string().contains("unknown standard library module"));
    }

    #[test]
    fn relative_imports_load_sibling_files() {
        let dir = tempfile::tempdir().unwrap();
        let util = dir.path().join("util.ln");
        std::fs::write(&util, "export const answer: int64 = 42;\n").unwrap();
        let main = dir.path().join("main.ln");
        std::fs::write(&main, "from ./util import answer\nconst double: int64 = add(answer, answer);\n").unwrap();

        let arenas = ParseArenas::new();
        let program = load_entry_file(arenas.ctx(), &main).unwrap();
        let entry_scope = program.modules[program.entry].scope;
        assert!(matches!(
            program.scopes.get(entry_scope, "answer"),
            Some(Entity::Constant { .. })
        ));
    }

    #[test]
    fn cyclic_imports_name_both_endpoints() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.ln"), "from ./b import x\nexport const y: int64 = 1;\n")
            .unwrap();
        std::fs::write(dir.path().join("b.ln"), "from ./a import y\nexport const x: int64 = 2;\n")
            .unwrap();

        let arenas = ParseArenas::new();
        let err = load_entry_file(arenas.ctx(), &dir.path().join("a.ln")).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("cyclic import"));
        assert!(text.contains("a.ln"));
        assert!(text.contains("b.ln"));
    }

    #[test]
    fn duplicate_non_function_bindings_are_rejected() {
        let arenas = ParseArenas::new();
        let source = "const x: int64 = 1;\nconst x: int64 = 2;\n";
        let err = load_entry_text(arenas.ctx(), "main.ln", source).unwrap_err();
        assert!(err.to_string().contains("cannot redefine"));
    }

    #[test]
    fn function_overloads_accumulate_in_one_set() {
        let arenas = ParseArenas::new();
        let source = "\
fn describe(n: int64): string = toString(n);
fn describe(b: bool): string = toString(b);
";
        let program = load_entry_text(arenas.ctx(), "main.ln", source).unwrap();
        let entry_scope = program.modules[program.entry].scope;
        match program.scopes.get(entry_scope, "describe") {
            Some(Entity::Functions(ids)) => assert_eq!(ids.len(), 2),
            other => panic!("unexpected binding {:?}", other),
        }
    }

    #[test]
    fn generic_product_types_instantiate_nominally() {
        let arenas = ParseArenas::new();
        let source = "type Box<T> { item: T }\nconst b: Box<int64> = new Box<int64> { item: 5 };\n";
        let program = load_entry_text(arenas.ctx(), "main.ln", source).unwrap();
        let entry_scope = program.modules[program.entry].scope;
        match program.scopes.get(entry_scope, "b") {
            Some(Entity::Constant { ty: Some(Type::Product { name, fields, .. }), .. }) => {
                assert_eq!(name, "Box");
                assert_eq!(fields[0].1, Type::int64());
            }
            other => panic!("unexpected binding {:?}", other),
        }
    }
}
