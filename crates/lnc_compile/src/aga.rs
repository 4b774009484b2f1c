//! The AGA emitter: AMM text down to dependency-annotated assembly.
//!
//! The emitter re-parses the AMM text (it may be hand-written, not just the
//! output of the previous stage), then:
//!
//! 1. lays out global memory — module constants in source order at negative
//!    64-bit-aligned addresses from `-8` down, string literals from handler
//!    bodies hoisted after them;
//! 2. assigns every declared event a monotonically increasing id and a
//!    payload size (0 for void, -1 for variable-size payloads, 8 otherwise);
//! 3. builds one memory frame per handler — the payload argument at `@0`,
//!    an 8-byte slot per local, temporaries for literal call arguments —
//!    with closure locals laid out in the *enclosing* frame;
//! 4. extracts each closure as a synthetic event (ids continuing after the
//!    declared ones) with its own `closure for` block sharing the frame;
//! 5. maps every surface-name call back to its VM opcode through the
//!    `@std/root` binding table, numbers statements from 0 per handler, and
//!    records, per statement, the earlier lines whose destination addresses
//!    it reads.
//!
//! Constant initialisers that are calls must fold at emission time; only
//! pure opcodes over literal operands can live in global memory.

use std::collections::HashMap;
use std::fmt::Write as _;

use lnc_base::CompileError;
use lnc_parse::grammar::{collect_list, decode_string};
use lnc_parse::{parse_amm, Cst, ParseArenas};
use lnc_semantic::modules::resolve_typename;
use lnc_semantic::{load_entry_text, Purity, Type};

use crate::amm::render_float;

/// Converts AMM text to AGA text.
pub fn emit_aga(amm_text: &str) -> lnc_base::Result<String> {
    let amm_arenas = ParseArenas::new();
    let amm = parse_amm(amm_arenas.ctx(), "<amm>", amm_text)?;

    // The opcode binding table comes from the embedded @std/root module;
    // an empty entry module loads exactly that.
    let root_arenas = ParseArenas::new();
    let root_program = load_entry_text(root_arenas.ctx(), "<opcodes>", "")?;
    let optable = OpTable::from_program(&root_program);

    let mut emitter = AgaEmitter {
        optable,
        root_program: &root_program,
        globals: Vec::new(),
        global_index: HashMap::new(),
        string_cells: HashMap::new(),
        next_global_addr: -8,
        events: Vec::new(),
        event_ids: HashMap::new(),
        used_event_names: HashMap::new(),
        blocks: Vec::new(),
    };
    emitter.run(amm)
}

// ---------------------------------------------------------------------------
// The opcode binding table
// ---------------------------------------------------------------------------

struct OpSig {
    name: String,
    generics: Vec<String>,
    params: Vec<Type>,
    opcode: String,
    purity: Purity,
}

struct OpTable {
    sigs: Vec<OpSig>,
}

impl OpTable {
    fn from_program(program: &lnc_semantic::Program<'_>) -> Self {
        let mut sigs = Vec::new();
        for (_, def) in program.functions.iter() {
            if let Some(opcode) = def.opcode() {
                sigs.push(OpSig {
                    name: def.name.clone(),
                    generics: def.generics.clone(),
                    params: def.params.iter().map(|(_, t)| t.clone()).collect(),
                    opcode: opcode.to_string(),
                    purity: def.purity,
                });
            }
        }
        OpTable { sigs }
    }

    /// Finds the opcode for a surface name applied to these argument
    /// types. AMM's explicit types make this re-resolution closed: the
    /// first structurally unifying signature wins.
    fn find(&self, name: &str, args: &[Type]) -> Option<&OpSig> {
        self.sigs.iter().find(|sig| {
            if sig.name != name || sig.params.len() != args.len() {
                return false;
            }
            let mut bindings: Vec<(String, Type)> = Vec::new();
            sig.params
                .iter()
                .zip(args)
                .all(|(param, arg)| unify_structural(param, arg, &mut bindings))
                && bindings.iter().all(|(g, _)| sig.generics.contains(g))
        })
    }
}

fn unify_structural(param: &Type, arg: &Type, bindings: &mut Vec<(String, Type)>) -> bool {
    match (param.resolved(), arg.resolved()) {
        (Type::Param(name), _) => {
            if let Some((_, bound)) = bindings.iter().find(|(n, _)| n == name) {
                // A parameter bound to an interface keeps admitting any
                // satisfying type; `any` admits everything.
                bound == arg || matches!(bound, Type::Interface { .. })
            } else {
                bindings.push((name.clone(), arg.resolved().clone()));
                true
            }
        }
        (Type::Interface { .. }, _) => true,
        (
            Type::Generic { name: pn, args: pa },
            Type::Generic { name: an, args: aa },
        ) if pn == an && pa.len() == aa.len() => {
            pa.iter().zip(aa).all(|(p, a)| unify_structural(p, a, bindings))
        }
        _ => param == arg,
    }
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A value packed into global memory.
#[derive(Debug, Clone, PartialEq)]
enum GVal {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl GVal {
    fn packed_size(&self) -> i64 {
        match self {
            GVal::Str(s) => 8 + ((s.len() as i64 + 7) / 8) * 8,
            _ => 8,
        }
    }

    fn render(&self) -> String {
        match self {
            GVal::Int(v) => v.to_string(),
            GVal::Float(v) => render_float(*v),
            GVal::Bool(v) => v.to_string(),
            GVal::Str(v) => render_aga_string(v),
        }
    }
}

fn render_aga_string(value: &str) -> String {
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

struct GlobalCell {
    addr: i64,
    value: GVal,
}

/// An operand resolved inside a handler body.
enum Val {
    Slot(i64, Type),
    Global(i64, Type),
    LitInt(i64),
    LitFloat(f64),
    LitBool(bool),
    LitStr(String),
    ClosureRef(usize),
}

/// One rendered argument word.
#[derive(Clone, Copy)]
enum Arg {
    Addr(i64),
    Imm(i64),
    FImm(f64),
}

impl Arg {
    fn render(&self) -> String {
        match self {
            Arg::Addr(addr) => format!("@{}", addr),
            Arg::Imm(value) => value.to_string(),
            Arg::FImm(value) => render_float(*value),
        }
    }
}

// ---------------------------------------------------------------------------
// Frames and blocks
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct ClosureInfo {
    synth_id: usize,
    params: Vec<(String, Type)>,
}

struct Frame {
    slots: HashMap<String, (i64, Type)>,
    closures: HashMap<String, ClosureInfo>,
    next_slot: i64,
}

impl Frame {
    fn new() -> Self {
        Frame { slots: HashMap::new(), closures: HashMap::new(), next_slot: 0 }
    }

    fn alloc(&mut self, name: &str, ty: Type) -> i64 {
        let addr = self.next_slot;
        self.next_slot += 8;
        self.slots.insert(name.to_string(), (addr, ty));
        addr
    }

    fn alloc_temp(&mut self) -> i64 {
        let addr = self.next_slot;
        self.next_slot += 8;
        addr
    }

    fn size(&self) -> i64 {
        self.next_slot
    }
}

/// One handler or closure block being assembled.
struct BlockBuf {
    event: String,
    lines: Vec<String>,
    written: HashMap<i64, u64>,
}

impl BlockBuf {
    fn new(event: String) -> Self {
        BlockBuf { event, lines: Vec::new(), written: HashMap::new() }
    }

    fn push_line(&mut self, dest: Option<i64>, opcode: &str, args: &[Arg], reads: &[i64]) {
        let line = self.lines.len() as u64;
        let mut deps: Vec<u64> = reads
            .iter()
            .filter_map(|addr| self.written.get(addr).copied())
            .collect();
        deps.sort_unstable();
        deps.dedup();

        let mut text = String::new();
        if let Some(addr) = dest {
            write!(text, "@{} = ", addr).expect("write to string");
        }
        let rendered: Vec<String> = args.iter().map(Arg::render).collect();
        write!(text, "{}({}) #{}", opcode, rendered.join(", "), line).expect("write to string");
        if !deps.is_empty() {
            let refs: Vec<String> = deps.iter().map(|d| format!("#{}", d)).collect();
            write!(text, " <- [{}]", refs.join(", ")).expect("write to string");
        }
        self.lines.push(text);

        if let Some(addr) = dest {
            self.written.insert(addr, line);
        }
    }
}

struct FinishedBlock {
    closure: bool,
    event: String,
    frame_size: i64,
    lines: Vec<String>,
}

struct EventEntry {
    name: String,
    size: i64,
    payload: Option<Type>,
}

// ---------------------------------------------------------------------------
// The emitter
// ---------------------------------------------------------------------------

struct AgaEmitter<'p, 'a> {
    optable: OpTable,
    root_program: &'p lnc_semantic::Program<'a>,
    globals: Vec<GlobalCell>,
    global_index: HashMap<String, usize>,
    string_cells: HashMap<String, i64>,
    next_global_addr: i64,
    events: Vec<EventEntry>,
    event_ids: HashMap<String, usize>,
    used_event_names: HashMap<String, usize>,
    blocks: Vec<FinishedBlock>,
}

impl<'p, 'a> AgaEmitter<'p, 'a> {
    fn run(&mut self, amm: &Cst<'_>) -> lnc_base::Result<String> {
        // Partition the module items first: constants and events shape the
        // address space and the id table before any handler is touched.
        let mut consts = Vec::new();
        let mut events = Vec::new();
        let mut handlers = Vec::new();
        for item in amm.req("items").children() {
            let entry = item.req("item");
            match entry.label() {
                Some("constdecl") => consts.push(entry.unwrap_choice()),
                Some("eventdecl") => events.push(entry.unwrap_choice()),
                _ => handlers.push(entry.unwrap_choice()),
            }
        }

        for node in consts {
            self.layout_const(node)?;
        }
        for node in events {
            self.declare_event(node)?;
        }
        for node in handlers {
            self.emit_handler(node)?;
        }

        Ok(self.render())
    }

    fn resolve_amm_type(&self, node: &Cst<'_>) -> lnc_base::Result<Type> {
        resolve_typename(
            &self.root_program.scopes,
            self.root_program.root_scope,
            node,
            "<amm>",
            &[],
        )
    }

    // ------------------------------------------------------------------
    // Global memory
    // ------------------------------------------------------------------

    fn layout_const(&mut self, node: &Cst<'_>) -> lnc_base::Result<()> {
        let name = node.req("name").text().to_string();
        let ty = self.resolve_amm_type(node.req("typeannot").req("type"))?;
        let value = self.eval_const_rhs(node.req("value"), &ty)?;
        self.push_global(Some(name), value);
        Ok(())
    }

    fn push_global(&mut self, name: Option<String>, value: GVal) -> i64 {
        let addr = self.next_global_addr;
        self.next_global_addr -= value.packed_size();
        if let Some(name) = name {
            self.global_index.insert(name, self.globals.len());
        }
        self.globals.push(GlobalCell { addr, value });
        addr
    }

    /// Hoists a handler-body string literal into global memory, reusing an
    /// existing cell for a repeated value.
    fn string_global(&mut self, value: &str) -> i64 {
        if let Some(addr) = self.string_cells.get(value) {
            return *addr;
        }
        let addr = self.push_global(None, GVal::Str(value.to_string()));
        self.string_cells.insert(value.to_string(), addr);
        addr
    }

    fn eval_const_rhs(&mut self, rhs: &Cst<'_>, ty: &Type) -> lnc_base::Result<GVal> {
        let inner = rhs.unwrap_choice();
        match rhs.label() {
            Some("literal") => Ok(literal_gval(rhs.choice_inner().unwrap_or(inner))),
            Some("var") => {
                let name = inner.text();
                match self.global_index.get(name) {
                    Some(idx) => Ok(self.globals[*idx].value.clone()),
                    None => Err(CompileError::emission(format!(
                        "global constant references `{}`, which is not an earlier global",
                        name
                    ))),
                }
            }
            Some("call") => {
                let callee = inner.req("name").text();
                let mut arg_vals = Vec::new();
                let mut arg_tys = Vec::new();
                let args_node = inner.req("args");
                if !args_node.is_null() {
                    for arg in collect_list(args_node) {
                        let (value, ty) = self.eval_const_operand(arg)?;
                        arg_vals.push(value);
                        arg_tys.push(ty);
                    }
                }
                let sig = self.optable.find(callee, &arg_tys).ok_or_else(|| {
                    CompileError::emission(format!(
                        "global constant calls unknown function `{}`",
                        callee
                    ))
                })?;
                if sig.purity != Purity::Pure {
                    return Err(CompileError::emission(format!(
                        "global constant calls `{}`, which cannot run at load time",
                        callee
                    )));
                }
                fold_opcode(&sig.opcode, &arg_vals).ok_or_else(|| {
                    CompileError::emission(format!(
                        "global constant initialiser `{}` does not fold at load time",
                        callee
                    ))
                })
            }
            Some("closure") => Err(CompileError::emission(
                "closures cannot live in global memory".to_string(),
            )),
            other => Err(CompileError::emission(format!(
                "unrecognised constant initialiser {:?} for type {}",
                other, ty
            ))),
        }
    }

    fn eval_const_operand(&mut self, node: &Cst<'_>) -> lnc_base::Result<(GVal, Type)> {
        let inner = node.unwrap_choice();
        match node.label() {
            Some("var") => {
                let name = inner.text();
                match self.global_index.get(name) {
                    Some(idx) => {
                        let value = self.globals[*idx].value.clone();
                        let ty = gval_type(&value);
                        Ok((value, ty))
                    }
                    None => Err(CompileError::emission(format!(
                        "global constant references `{}`, which is not an earlier global",
                        name
                    ))),
                }
            }
            _ => {
                let value = literal_gval(node.choice_inner().unwrap_or(inner));
                let ty = gval_type(&value);
                Ok((value, ty))
            }
        }
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    fn declare_event(&mut self, node: &Cst<'_>) -> lnc_base::Result<()> {
        let name = node.req("name").text().to_string();
        let payload_node = node.req("payload");
        let payload = if payload_node.is_null() {
            None
        } else {
            Some(self.resolve_amm_type(payload_node.req("type"))?)
        };
        let size = payload.as_ref().map(payload_size).unwrap_or(0);
        if self.event_ids.contains_key(&name) {
            return Err(CompileError::emission(format!("event `{}` declared twice", name)));
        }
        self.event_ids.insert(name.clone(), self.events.len());
        self.used_event_names.insert(name.clone(), 1);
        self.events.push(EventEntry { name, size, payload });
        Ok(())
    }

    fn synthetic_event(&mut self, base: &str) -> (usize, String) {
        let name = match self.used_event_names.get_mut(base) {
            None => {
                self.used_event_names.insert(base.to_string(), 1);
                base.to_string()
            }
            Some(count) => {
                *count += 1;
                format!("{}_{}", base, *count)
            }
        };
        let id = self.events.len();
        self.event_ids.insert(name.clone(), id);
        self.events.push(EventEntry { name: name.clone(), size: 0, payload: None });
        (id, name)
    }

    // ------------------------------------------------------------------
    // Handlers
    // ------------------------------------------------------------------

    fn emit_handler(&mut self, node: &Cst<'_>) -> lnc_base::Result<()> {
        let event = node.req("event").text().to_string();
        if !self.event_ids.contains_key(&event) && !is_builtin_event(&event) {
            return Err(CompileError::emission(format!(
                "handler for undeclared event `{}`",
                event
            )));
        }

        let mut frame = Frame::new();
        let params_node = node.req("params");
        if !params_node.is_null() {
            let list = params_node.req("list");
            for param in collect_list(list) {
                let name = param.req("name").text();
                let ty = self.resolve_amm_type(param.req("type"))?;
                frame.alloc(name, ty);
            }
        }

        let mut block = BlockBuf::new(event);
        let mut closures = Vec::new();
        self.emit_block(node.req("body"), &mut frame, &mut block, &mut closures)?;

        let frame_size = frame.size();
        self.blocks.push(FinishedBlock {
            closure: false,
            event: block.event,
            frame_size,
            lines: block.lines,
        });
        for closure in closures {
            self.blocks.push(FinishedBlock {
                closure: true,
                event: closure.event,
                frame_size,
                lines: closure.lines,
            });
        }
        Ok(())
    }

    fn emit_block(
        &mut self,
        body: &Cst<'_>,
        frame: &mut Frame,
        block: &mut BlockBuf,
        closures: &mut Vec<BlockBuf>,
    ) -> lnc_base::Result<()> {
        for item in body.req("stmts").children() {
            self.emit_stmt(item.req("stmt"), frame, block, closures)?;
        }
        Ok(())
    }

    fn emit_stmt(
        &mut self,
        stmt: &Cst<'_>,
        frame: &mut Frame,
        block: &mut BlockBuf,
        closures: &mut Vec<BlockBuf>,
    ) -> lnc_base::Result<()> {
        let inner = stmt.unwrap_choice();
        match stmt.label() {
            Some("constdecl") | Some("letdecl") => {
                let name = inner.req("name").text();
                let ty = self.resolve_amm_type(inner.req("typeannot").req("type"))?;
                let rhs = inner.req("value");
                match rhs.label() {
                    Some("closure") => {
                        self.extract_closure(name, rhs.unwrap_choice(), frame, closures)
                    }
                    Some("call") => {
                        let slot = frame.alloc(name, ty.clone());
                        self.emit_call(rhs.unwrap_choice(), Some((slot, ty)), frame, block)
                    }
                    _ => {
                        let rhs_val = self.resolve_rhs_operand(rhs, frame)?;
                        if let Val::ClosureRef(synth_id) = rhs_val {
                            // Aliasing a closure binds the same synthetic
                            // event; no statement, no slot.
                            let info = frame
                                .closures
                                .values()
                                .find(|c| c.synth_id == synth_id)
                                .cloned();
                            if let Some(info) = info {
                                frame.closures.insert(name.to_string(), info);
                            }
                            return Ok(());
                        }
                        let slot = frame.alloc(name, ty.clone());
                        self.store_into(slot, &ty, rhs_val, block)
                    }
                }
            }
            Some("assignment") => {
                let name = inner.req("name").text();
                let (slot, ty) = match frame.slots.get(name) {
                    Some((slot, ty)) => (*slot, ty.clone()),
                    None => {
                        return Err(CompileError::emission(format!(
                            "assignment to `{}`, which has no frame slot",
                            name
                        )))
                    }
                };
                let value = self.resolve_operand(inner.req("value"), frame)?;
                self.store_into(slot, &ty, value, block)
            }
            Some("call") => {
                let call = inner.req("call");
                self.emit_call(call, None, frame, block)
            }
            Some("emit") => {
                let event = inner.req("event").text();
                let id = match self.event_ids.get(event) {
                    Some(id) => *id,
                    None => {
                        return Err(CompileError::emission(format!(
                            "emit to undeclared event `{}`",
                            event
                        )))
                    }
                };
                let payload = self.events[id].payload.clone();
                let arg_node = inner.req("arg");
                if arg_node.is_null() {
                    block.push_line(None, "emit", &[Arg::Imm(id as i64)], &[]);
                } else {
                    let value = self.resolve_operand(arg_node.req("value"), frame)?;
                    let payload_ty = payload.unwrap_or_else(Type::int64);
                    let (arg, reads) = self.materialize(value, &payload_ty, frame, block)?;
                    block.push_line(None, "emit", &[Arg::Imm(id as i64), arg], &reads);
                }
                Ok(())
            }
            Some("return") => Ok(()),
            other => Err(CompileError::emission(format!(
                "unrecognised amm statement {:?}",
                other
            ))),
        }
    }

    fn extract_closure(
        &mut self,
        name: &str,
        closure: &Cst<'_>,
        frame: &mut Frame,
        closures: &mut Vec<BlockBuf>,
    ) -> lnc_base::Result<()> {
        let (synth_id, synth_name) = self.synthetic_event(name);

        let mut params = Vec::new();
        let params_node = closure.req("params");
        if !params_node.is_null() {
            let list = params_node.req("list");
            for param in collect_list(list) {
                let pname = param.req("name").text();
                let ty = self.resolve_amm_type(param.req("type"))?;
                // Closure parameters live in the enclosing frame; callers
                // write them before raising the synthetic event.
                frame.alloc(pname, ty.clone());
                params.push((pname.to_string(), ty));
            }
        }
        frame
            .closures
            .insert(name.to_string(), ClosureInfo { synth_id, params });

        let mut body_block = BlockBuf::new(synth_name);
        let mut nested = Vec::new();
        self.emit_block(closure.req("body"), frame, &mut body_block, &mut nested)?;
        closures.push(body_block);
        closures.append(&mut nested);
        Ok(())
    }

    /// Writes a resolved value into a frame slot.
    fn store_into(
        &mut self,
        slot: i64,
        ty: &Type,
        value: Val,
        block: &mut BlockBuf,
    ) -> lnc_base::Result<()> {
        match value {
            Val::LitInt(v) => {
                block.push_line(Some(slot), set_opcode(ty)?, &[Arg::Imm(v)], &[]);
                Ok(())
            }
            Val::LitFloat(v) => {
                block.push_line(Some(slot), set_opcode(ty)?, &[Arg::FImm(v)], &[]);
                Ok(())
            }
            Val::LitBool(v) => {
                block.push_line(Some(slot), "setbool", &[Arg::Imm(i64::from(v))], &[]);
                Ok(())
            }
            Val::LitStr(v) => {
                let addr = self.string_global(&v);
                block.push_line(Some(slot), "copystr", &[Arg::Addr(addr)], &[]);
                Ok(())
            }
            Val::Slot(addr, source_ty) => {
                block.push_line(Some(slot), copy_opcode(&source_ty), &[Arg::Addr(addr)], &[addr]);
                Ok(())
            }
            Val::Global(addr, source_ty) => {
                block.push_line(Some(slot), copy_opcode(&source_ty), &[Arg::Addr(addr)], &[]);
                Ok(())
            }
            Val::ClosureRef(_) => Err(CompileError::emission(
                "closure references can only seed call arguments".to_string(),
            )),
        }
    }

    /// Emits a call statement; `dest` is the declaration slot, if any.
    fn emit_call(
        &mut self,
        call: &Cst<'_>,
        dest: Option<(i64, Type)>,
        frame: &mut Frame,
        block: &mut BlockBuf,
    ) -> lnc_base::Result<()> {
        let callee = call.req("name").text();

        let mut vals = Vec::new();
        let args_node = call.req("args");
        if !args_node.is_null() {
            for arg in collect_list(args_node) {
                vals.push(self.resolve_operand(arg, frame)?);
            }
        }

        // Closure invocation: write the parameter slots, then callfn on the
        // synthetic event id.
        if let Some(info) = frame.closures.get(callee).cloned() {
            if vals.len() != info.params.len() {
                return Err(CompileError::emission(format!(
                    "closure `{}` takes {} argument(s), got {}",
                    callee,
                    info.params.len(),
                    vals.len()
                )));
            }
            if info.params.len() > 1 {
                return Err(CompileError::emission(format!(
                    "closure `{}` takes {} arguments; graph-code closure calls pass at most one",
                    callee,
                    info.params.len()
                )));
            }
            let mut call_args = vec![Arg::Imm(info.synth_id as i64)];
            let mut reads = Vec::new();
            for ((pname, pty), value) in info.params.iter().zip(vals) {
                let slot = frame.slots[pname.as_str()].0;
                self.store_into(slot, pty, value, block)?;
                call_args.push(Arg::Addr(slot));
                reads.push(slot);
            }
            block.push_line(dest.map(|(slot, _)| slot), "callfn", &call_args, &reads);
            return Ok(());
        }

        // Field reads carry their own internal opcode.
        if callee == "fldarr" {
            let (base, index) = match (vals.first(), vals.get(1)) {
                (Some(Val::Slot(addr, _)), Some(Val::LitInt(idx))) => (*addr, *idx),
                (Some(Val::Global(addr, _)), Some(Val::LitInt(idx))) => (*addr, *idx),
                _ => {
                    return Err(CompileError::emission(
                        "fldarr expects a record variable and a field index".to_string(),
                    ))
                }
            };
            block.push_line(
                dest.map(|(slot, _)| slot),
                "fldarr",
                &[Arg::Addr(base), Arg::Imm(index)],
                &[base],
            );
            return Ok(());
        }

        let arg_tys: Vec<Type> = vals.iter().map(|v| self.value_type(v)).collect();
        let sig = self.optable.find(callee, &arg_tys).ok_or_else(|| {
            let rendered: Vec<String> = arg_tys.iter().map(Type::to_string).collect();
            CompileError::emission(format!(
                "no opcode binding for {}({})",
                callee,
                rendered.join(", ")
            ))
        })?;
        let opcode = sig.opcode.clone();
        let params = sig.params.clone();

        let mut args = Vec::new();
        let mut reads = Vec::new();
        for (value, param_ty) in vals.into_iter().zip(&params) {
            let (arg, mut arg_reads) = self.materialize(value, param_ty, frame, block)?;
            args.push(arg);
            reads.append(&mut arg_reads);
        }
        if args.len() > 2 {
            return Err(CompileError::emission(format!(
                "`{}` takes {} operands; graph-code statements carry at most two",
                callee,
                args.len()
            )));
        }

        // Array mutation writes through its first operand, which is what
        // downstream statements must order against.
        let dest_slot = if opcode == "pusharr" {
            match args.first() {
                Some(Arg::Addr(addr)) => Some(*addr),
                _ => None,
            }
        } else {
            dest.map(|(slot, _)| slot)
        };
        block.push_line(dest_slot, &opcode, &args, &reads);
        Ok(())
    }

    /// The AMM-level type of a resolved operand, for opcode matching.
    fn value_type(&self, value: &Val) -> Type {
        match value {
            Val::Slot(_, ty) | Val::Global(_, ty) => ty.clone(),
            Val::LitInt(_) => Type::int64(),
            Val::LitFloat(_) => Type::float64(),
            Val::LitBool(_) => Type::bool(),
            Val::LitStr(_) => Type::string(),
            Val::ClosureRef(_) => Type::function(),
        }
    }

    /// Renders an operand as an argument word, materialising literals into
    /// temporaries (numbers) or global memory (strings).
    fn materialize(
        &mut self,
        value: Val,
        param_ty: &Type,
        frame: &mut Frame,
        block: &mut BlockBuf,
    ) -> lnc_base::Result<(Arg, Vec<i64>)> {
        match value {
            Val::Slot(addr, _) => Ok((Arg::Addr(addr), vec![addr])),
            Val::Global(addr, _) => Ok((Arg::Addr(addr), Vec::new())),
            Val::LitStr(text) => Ok((Arg::Addr(self.string_global(&text)), Vec::new())),
            Val::LitInt(v) => {
                // A generic parameter slot falls back to the literal's
                // lexical width.
                let opcode = set_opcode(param_ty).unwrap_or("seti64");
                let temp = frame.alloc_temp();
                block.push_line(Some(temp), opcode, &[Arg::Imm(v)], &[]);
                Ok((Arg::Addr(temp), vec![temp]))
            }
            Val::LitFloat(v) => {
                let opcode = set_opcode(param_ty).unwrap_or("setf64");
                let temp = frame.alloc_temp();
                block.push_line(Some(temp), opcode, &[Arg::FImm(v)], &[]);
                Ok((Arg::Addr(temp), vec![temp]))
            }
            Val::LitBool(v) => {
                let temp = frame.alloc_temp();
                block.push_line(Some(temp), "setbool", &[Arg::Imm(i64::from(v))], &[]);
                Ok((Arg::Addr(temp), vec![temp]))
            }
            Val::ClosureRef(id) => Ok((Arg::Imm(id as i64), Vec::new())),
        }
    }

    fn resolve_operand(&mut self, node: &Cst<'_>, frame: &Frame) -> lnc_base::Result<Val> {
        let inner = node.unwrap_choice();
        match node.label() {
            Some("var") => self.resolve_var(inner.text(), frame),
            _ => Ok(literal_val(node.choice_inner().unwrap_or(inner))),
        }
    }

    /// Resolves a declaration right-hand side that is neither a closure
    /// nor a call.
    fn resolve_rhs_operand(&mut self, rhs: &Cst<'_>, frame: &mut Frame) -> lnc_base::Result<Val> {
        let inner = rhs.unwrap_choice();
        match rhs.label() {
            Some("var") => self.resolve_var(inner.text(), frame),
            Some("literal") => Ok(literal_val(rhs.choice_inner().unwrap_or(inner))),
            other => Err(CompileError::emission(format!(
                "unrecognised declaration value {:?}",
                other
            ))),
        }
    }

    fn resolve_var(&self, name: &str, frame: &Frame) -> lnc_base::Result<Val> {
        if let Some((addr, ty)) = frame.slots.get(name) {
            return Ok(Val::Slot(*addr, ty.clone()));
        }
        if let Some(info) = frame.closures.get(name) {
            return Ok(Val::ClosureRef(info.synth_id));
        }
        if let Some(idx) = self.global_index.get(name) {
            let cell = &self.globals[*idx];
            return Ok(Val::Global(cell.addr, gval_type(&cell.value)));
        }
        Err(CompileError::emission(format!("`{}` has no memory location", name)))
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    fn render(&self) -> String {
        let mut out = String::from("agav1\n");

        if !self.globals.is_empty() {
            out.push_str("\nglobalMem\n");
            for cell in &self.globals {
                writeln!(out, "  @{}: {}", cell.addr, cell.value.render())
                    .expect("write to string");
            }
        }

        if !self.events.is_empty() {
            out.push_str("\ncustomEvents\n");
            for event in &self.events {
                writeln!(out, "  {}: {}", event.name, event.size).expect("write to string");
            }
        }

        for block in &self.blocks {
            let kind = if block.closure { "closure" } else { "handler" };
            writeln!(
                out,
                "\n{} for {} with size {}",
                kind, block.event, block.frame_size
            )
            .expect("write to string");
            for line in &block.lines {
                writeln!(out, "  {}", line).expect("write to string");
            }
        }

        out
    }
}

// ---------------------------------------------------------------------------
// Literals, opcodes, folding
// ---------------------------------------------------------------------------

fn is_builtin_event(name: &str) -> bool {
    lnc_semantic::builtin::BUILTIN_EVENTS.contains(&name)
}

fn literal_gval(node: &Cst<'_>) -> GVal {
    match node.label() {
        Some("int") => GVal::Int(node.text().parse().unwrap_or_default()),
        Some("real") => GVal::Float(node.text().parse().unwrap_or_default()),
        Some("bool") => GVal::Bool(node.text() == "true"),
        // The string branch holds another choice layer (quote style);
        // descend one level so escape decoding sees it.
        _ => GVal::Str(decode_string(node.choice_inner().unwrap_or(node))),
    }
}

fn literal_val(node: &Cst<'_>) -> Val {
    match literal_gval(node) {
        GVal::Int(v) => Val::LitInt(v),
        GVal::Float(v) => Val::LitFloat(v),
        GVal::Bool(v) => Val::LitBool(v),
        GVal::Str(v) => Val::LitStr(v),
    }
}

fn gval_type(value: &GVal) -> Type {
    match value {
        GVal::Int(_) => Type::int64(),
        GVal::Float(_) => Type::float64(),
        GVal::Bool(_) => Type::bool(),
        GVal::Str(_) => Type::string(),
    }
}

/// Payload sizes: 0 for void (no payload), -1 for variable-size payloads,
/// 8 for everything word-sized.
fn payload_size(ty: &Type) -> i64 {
    if ty.is_numeric() || *ty == Type::bool() || *ty == Type::function() {
        8
    } else {
        -1
    }
}

fn set_opcode(ty: &Type) -> lnc_base::Result<&'static str> {
    use lnc_semantic::Builtin::*;
    match ty.resolved() {
        Type::Builtin(Int8) => Ok("seti8"),
        Type::Builtin(Int16) => Ok("seti16"),
        Type::Builtin(Int32) => Ok("seti32"),
        Type::Builtin(Int64) => Ok("seti64"),
        Type::Builtin(Float32) => Ok("setf32"),
        Type::Builtin(Float64) => Ok("setf64"),
        Type::Builtin(Bool) => Ok("setbool"),
        other => Err(CompileError::emission(format!(
            "no immediate materialisation for type {}",
            other
        ))),
    }
}

fn copy_opcode(ty: &Type) -> &'static str {
    use lnc_semantic::Builtin::*;
    match ty.resolved() {
        Type::Builtin(Int8) => "copyi8",
        Type::Builtin(Int16) => "copyi16",
        Type::Builtin(Int32) => "copyi32",
        Type::Builtin(Int64) => "copyi64",
        Type::Builtin(Float32) => "copyf32",
        Type::Builtin(Float64) => "copyf64",
        Type::Builtin(Bool) => "copybool",
        Type::Builtin(Str) => "copystr",
        _ => "copyarr",
    }
}

/// Load-time evaluation of pure opcodes over literal operands.
fn fold_opcode(opcode: &str, args: &[GVal]) -> Option<GVal> {
    use GVal::*;
    match (opcode, args) {
        // 64-bit integer arithmetic; narrower widths share the math.
        (op, [Int(a), Int(b)]) if op.starts_with("add") => a.checked_add(*b).map(Int),
        (op, [Int(a), Int(b)]) if op.starts_with("sub") => a.checked_sub(*b).map(Int),
        (op, [Int(a), Int(b)]) if op.starts_with("mul") => a.checked_mul(*b).map(Int),
        (op, [Int(a), Int(b)]) if op.starts_with("div") => a.checked_div(*b).map(Int),
        (op, [Int(a), Int(b)]) if op.starts_with("mod") => a.checked_rem(*b).map(Int),
        ("powi64", [Int(a), Int(b)]) => {
            u32::try_from(*b).ok().and_then(|exp| a.checked_pow(exp)).map(Int)
        }
        (op, [Int(a)]) if op.starts_with("neg") => a.checked_neg().map(Int),
        (op, [Float(a), Float(b)]) if op.starts_with("add") => Some(Float(a + b)),
        (op, [Float(a), Float(b)]) if op.starts_with("sub") => Some(Float(a - b)),
        (op, [Float(a), Float(b)]) if op.starts_with("mul") => Some(Float(a * b)),
        (op, [Float(a), Float(b)]) if op.starts_with("div") => Some(Float(a / b)),
        ("powf64", [Float(a), Float(b)]) => Some(Float(a.powf(*b))),
        (op, [Float(a)]) if op.starts_with("neg") => Some(Float(-a)),

        (op, [Int(a), Int(b)]) if op.starts_with("eq") => Some(Bool(a == b)),
        (op, [Int(a), Int(b)]) if op.starts_with("neq") => Some(Bool(a != b)),
        (op, [Int(a), Int(b)]) if op.starts_with("lte") => Some(Bool(a <= b)),
        (op, [Int(a), Int(b)]) if op.starts_with("lt") => Some(Bool(a < b)),
        (op, [Int(a), Int(b)]) if op.starts_with("gte") => Some(Bool(a >= b)),
        (op, [Int(a), Int(b)]) if op.starts_with("gt") => Some(Bool(a > b)),
        (op, [Float(a), Float(b)]) if op.starts_with("eq") => Some(Bool(a == b)),
        (op, [Float(a), Float(b)]) if op.starts_with("neq") => Some(Bool(a != b)),
        (op, [Float(a), Float(b)]) if op.starts_with("lte") => Some(Bool(a <= b)),
        (op, [Float(a), Float(b)]) if op.starts_with("lt") => Some(Bool(a < b)),
        (op, [Float(a), Float(b)]) if op.starts_with("gte") => Some(Bool(a >= b)),
        (op, [Float(a), Float(b)]) if op.starts_with("gt") => Some(Bool(a > b)),
        ("eqstr", [Str(a), Str(b)]) => Some(Bool(a == b)),
        ("neqstr", [Str(a), Str(b)]) => Some(Bool(a != b)),
        ("eqbool", [Bool(a), Bool(b)]) => Some(Bool(a == b)),
        ("neqbool", [Bool(a), Bool(b)]) => Some(Bool(a != b)),

        ("andbool", [Bool(a), Bool(b)]) => Some(Bool(*a && *b)),
        ("orbool", [Bool(a), Bool(b)]) => Some(Bool(*a || *b)),
        ("xorbool", [Bool(a), Bool(b)]) => Some(Bool(a != b)),
        ("notbool", [Bool(a)]) => Some(Bool(!a)),

        ("catstr", [Str(a), Str(b)]) => Some(Str(format!("{}{}", a, b))),
        ("repstr", [Str(a), Int(n)]) => {
            usize::try_from(*n).ok().map(|n| Str(a.repeat(n)))
        }
        ("lenstr", [Str(a)]) => Some(Int(a.len() as i64)),
        ("i64str", [Int(a)]) => Some(Str(a.to_string())),
        ("f64str", [Float(a)]) => Some(Str(render_float(*a))),
        ("boolstr", [Bool(a)]) => Some(Str(a.to_string())),

        // Width conversions: global cells are 8 bytes either way.
        ("i8i64" | "i16i64" | "i32i64", [Int(a)]) => Some(Int(*a)),
        ("i64i8", [Int(a)]) => i8::try_from(*a).ok().map(|v| Int(v as i64)),
        ("i64i16", [Int(a)]) => i16::try_from(*a).ok().map(|v| Int(v as i64)),
        ("i64i32", [Int(a)]) => i32::try_from(*a).ok().map(|v| Int(v as i64)),
        ("i64f64", [Int(a)]) => Some(Float(*a as f64)),
        ("f64i64", [Float(a)]) => Some(Int(*a as i64)),
        ("f64f32", [Float(a)]) => Some(Float(*a as f32 as f64)),

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_world_layout() {
        let aga = emit_aga(
            "\
event start;
event stdout: string;
event exit: int8;

on _start fn (): void {
  emit start;
}

on start fn (): void {
  print('Hello, World!');
  emit exit 0;
  return;
}
",
        )
        .unwrap();

        // The handler string literal is hoisted into global memory.
        assert!(aga.contains("globalMem\n  @-8: \"Hello, World!\""));
        // Declared events in order, sizes by payload class.
        assert!(aga.contains("customEvents\n  start: 0\n  stdout: -1\n  exit: 8"));
        // The bridge handler raises event id 0.
        assert!(aga.contains("handler for _start with size 0\n  emit(0) #0"));
        // The user handler: print from global memory, payload materialised
        // at int8 width, emit depending on the materialisation.
        assert!(aga.contains("handler for start with size 8"));
        assert!(aga.contains("stdoutp(@-8) #0"));
        assert!(aga.contains("@0 = seti8(0) #1"));
        assert!(aga.contains("emit(2, @0) #2 <- [#1]"));
    }

    #[test]
    fn numeric_globals_pack_eight_bytes_each() {
        let aga = emit_aga("const pi: float64 = 3.14;\nconst n: int64 = 42;\non _start fn (): void {\n}\n")
            .unwrap();
        assert!(aga.contains("@-8: 3.14"));
        assert!(aga.contains("@-16: 42"));
    }

    #[test]
    fn global_initialiser_calls_fold_at_load_time() {
        let aga = emit_aga(
            "const _c0: int64 = mul(2, 3);\nconst x: int64 = add(_c0, 4);\non _start fn (): void {\n}\n",
        )
        .unwrap();
        assert!(aga.contains("@-8: 6"));
        assert!(aga.contains("@-16: 10"));
    }

    #[test]
    fn impure_global_initialisers_are_rejected() {
        let err = emit_aga("const s: string = print('x');\non _start fn (): void {\n}\n")
            .unwrap_err();
        assert!(err.to_string().contains("cannot run at load time"));
    }

    #[test]
    fn closures_become_synthetic_events_sharing_the_frame() {
        let aga = emit_aga(
            "\
event tick: int64;

on tick fn (n: int64): void {
  const f: function = fn (m: int64): int64 {
    const doubled: int64 = mul(m, 2);
  };
  const y: int64 = f(3);
}
",
        )
        .unwrap();

        // The synthetic event continues the declared-id sequence with size 0.
        assert!(aga.contains("customEvents\n  tick: 8\n  f: 0"));
        // Caller writes the closure's parameter slot, then callfn references
        // the synthetic id as its first argument.
        assert!(aga.contains("@8 = seti64(3) #0"));
        assert!(aga.contains("@32 = callfn(1, @8) #1 <- [#0]"));
        // Both blocks share the recomputed enclosing frame.
        assert!(aga.contains("handler for tick with size 40"));
        assert!(aga.contains("closure for f with size 40"));
        // The closure body reads its parameter slot.
        assert!(aga.contains("@16 = muli64(@8, @24) #1 <- [#0]"));
    }

    #[test]
    fn conditional_tables_order_against_every_push() {
        let aga = emit_aga(
            "\
event go;

on go fn (): void {
  let t: Array<any> = newarr();
  const c: bool = true;
  const b: function = fn (): void {
    print('x');
  };
  pusharr(t, c);
  pusharr(t, b);
  evalcond(t);
}
",
        )
        .unwrap();

        assert!(aga.contains("@0 = newarr() #0"));
        assert!(aga.contains("@8 = setbool(1) #1"));
        // Pushes write through the table address, so each depends on the
        // previous table writer.
        assert!(aga.contains("@0 = pusharr(@0, @8) #2 <- [#0, #1]"));
        assert!(aga.contains("@0 = pusharr(@0, 1) #3 <- [#2]"));
        assert!(aga.contains("evalcond(@0) #4 <- [#3]"));
    }

    #[test]
    fn repeated_string_literals_share_one_global() {
        let aga = emit_aga(
            "\
event go;

on go fn (): void {
  print('same');
  print('same');
}
",
        )
        .unwrap();
        assert_eq!(aga.matches("\"same\"").count(), 1);
        assert_eq!(aga.matches("stdoutp(@-8)").count(), 2);
    }

    #[test]
    fn emitted_aga_reparses() {
        let aga = emit_aga(
            "\
const pi: float64 = 3.14;
event go;

on go fn (): void {
  const txt: string = 'x';
  print(txt);
}
",
        )
        .unwrap();
        let arenas = ParseArenas::new();
        lnc_parse::parse_aga(arenas.ctx(), "check.aga", &aga).unwrap();
    }
}
