//! WASM module builder.
//!
//! Collects module contents in any order and assembles the sections in the
//! order the binary format requires:
//! Type, Import, Function, Table, Memory, Global, Export, Element, Code,
//! Data, then custom sections.
//!
//! Function indices are handed out at declaration time, imports first. All
//! imports must therefore be added before the first function is declared.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Write as _;

use ascl_types::SrcPos;
use wasm_encoder::{
    CodeSection, ConstExpr, CustomSection, DataSection, ElementSection, Elements, EntityType,
    ExportKind, ExportSection, Function, FunctionSection, GlobalSection, GlobalType,
    ImportSection, Instruction, MemorySection, MemoryType, Module, NameMap, NameSection, RefType,
    TableSection, TableType, TypeSection, ValType,
};

use crate::error::{CodegenError, CodegenResult};
use crate::source_map::{FuncKind, SourceMap};
use crate::types::{MachineType, COMPILER_VERSION, CUSTOM_SECTION_NAME, SRCMAP_SECTION_NAME};

// ══════════════════════════════════════════════════════════════════════════════
// Module parts
// ══════════════════════════════════════════════════════════════════════════════

/// A function signature, used for type deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FuncSig {
    pub params: Vec<ValType>,
    pub results: Vec<ValType>,
}

impl FuncSig {
    pub fn new(params: Vec<ValType>, results: Vec<ValType>) -> Self {
        Self { params, results }
    }
}

/// A finished function body: local declarations after the parameters and
/// the instruction sequence, without the trailing `end`.
#[derive(Debug, Clone, Default)]
pub struct FuncBody {
    pub locals: Vec<(u32, ValType)>,
    pub instrs: Vec<Instruction<'static>>,
}

impl FuncBody {
    /// Encode the body, appending the terminating `end`.
    pub fn encode(&self) -> Function {
        let mut f = Function::new(self.locals.iter().copied());
        for instr in &self.instrs {
            f.instruction(instr);
        }
        f.instruction(&Instruction::End);
        f
    }
}

#[derive(Debug)]
struct ImportDef {
    module: String,
    field: String,
    name: String,
    type_idx: u32,
}

#[derive(Debug)]
struct FuncDef {
    name: String,
    type_idx: u32,
    kind: FuncKind,
    pos: SrcPos,
    body: Option<FuncBody>,
}

#[derive(Debug)]
struct GlobalDef {
    name: String,
    ty: ValType,
    mutable: bool,
    init: i64,
}

#[derive(Debug)]
struct MemoryDef {
    min_pages: u64,
    name: String,
    segments: Vec<(u32, Vec<u8>)>,
}

// ══════════════════════════════════════════════════════════════════════════════
// Builder
// ══════════════════════════════════════════════════════════════════════════════

/// Builder for one WASM module.
#[derive(Debug, Default)]
pub struct ModuleBuilder {
    sigs: Vec<FuncSig>,
    sig_cache: HashMap<FuncSig, u32>,
    imports: Vec<ImportDef>,
    funcs: Vec<FuncDef>,
    func_index: HashMap<String, u32>,
    globals: Vec<GlobalDef>,
    memory: Option<MemoryDef>,
    table: Option<Vec<u32>>,
    exports: Vec<(String, ExportKind, u32)>,
    debug_info: bool,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit name and source-map sections on [`ModuleBuilder::finish`].
    pub fn set_debug_info(&mut self, on: bool) {
        self.debug_info = on;
    }

    // ── Types ────────────────────────────────────────────────────────────

    /// Register a function type, reusing an identical earlier one.
    pub fn add_type(&mut self, sig: FuncSig) -> u32 {
        if let Some(&idx) = self.sig_cache.get(&sig) {
            return idx;
        }
        let idx = self.sigs.len() as u32;
        self.sig_cache.insert(sig.clone(), idx);
        self.sigs.push(sig);
        idx
    }

    pub fn type_count(&self) -> usize {
        self.sigs.len()
    }

    // ── Functions ────────────────────────────────────────────────────────

    /// Import a host function as `module.field`, known inside the module as
    /// `name`. Returns its function index.
    pub fn add_import(
        &mut self,
        module: &str,
        field: &str,
        name: &str,
        type_idx: u32,
    ) -> CodegenResult<u32> {
        if !self.funcs.is_empty() {
            return Err(CodegenError::Internal(format!(
                "import {module}.{field} added after function declarations"
            )));
        }
        let idx = self.imports.len() as u32;
        self.register_name(name, idx)?;
        self.imports.push(ImportDef {
            module: module.to_string(),
            field: field.to_string(),
            name: name.to_string(),
            type_idx,
        });
        Ok(idx)
    }

    /// Declare a function. Its body is supplied later with
    /// [`ModuleBuilder::set_body`], so bodies may call functions declared
    /// after them.
    pub fn declare_function(
        &mut self,
        name: &str,
        type_idx: u32,
        kind: FuncKind,
        pos: SrcPos,
    ) -> CodegenResult<u32> {
        let idx = (self.imports.len() + self.funcs.len()) as u32;
        self.register_name(name, idx)?;
        self.funcs.push(FuncDef {
            name: name.to_string(),
            type_idx,
            kind,
            pos,
            body: None,
        });
        Ok(idx)
    }

    /// Commit the body of a declared function.
    pub fn set_body(&mut self, func_idx: u32, body: FuncBody) -> CodegenResult<()> {
        let def = (func_idx as usize)
            .checked_sub(self.imports.len())
            .and_then(|i| self.funcs.get_mut(i))
            .ok_or_else(|| CodegenError::Internal(format!("no declared function {func_idx}")))?;
        if def.body.is_some() {
            return Err(CodegenError::Internal(format!(
                "body of `{}` committed twice",
                def.name
            )));
        }
        def.body = Some(body);
        Ok(())
    }

    /// Absolute index of an imported or declared function.
    pub fn function_index(&self, name: &str) -> Option<u32> {
        self.func_index.get(name).copied()
    }

    pub fn import_count(&self) -> usize {
        self.imports.len()
    }

    pub fn function_count(&self) -> usize {
        self.funcs.len()
    }

    /// Export a function under its own name.
    pub fn export_function(&mut self, name: &str) -> CodegenResult<()> {
        let idx = self
            .function_index(name)
            .ok_or_else(|| CodegenError::UnresolvedSymbol(name.to_string()))?;
        self.exports.push((name.to_string(), ExportKind::Func, idx));
        Ok(())
    }

    fn register_name(&mut self, name: &str, idx: u32) -> CodegenResult<()> {
        if self.func_index.insert(name.to_string(), idx).is_some() {
            return Err(CodegenError::Internal(format!("duplicate function `{name}`")));
        }
        Ok(())
    }

    // ── Globals ──────────────────────────────────────────────────────────

    /// Add a named global with a constant initial value. Returns its index.
    pub fn add_global(
        &mut self,
        name: &str,
        ty: MachineType,
        mutable: bool,
        init: i64,
    ) -> CodegenResult<u32> {
        let ty = ty
            .val_type()
            .ok_or_else(|| CodegenError::Internal(format!("global `{name}` holds no value")))?;
        let idx = self.globals.len() as u32;
        self.globals.push(GlobalDef {
            name: name.to_string(),
            ty,
            mutable,
            init,
        });
        Ok(idx)
    }

    // ── Memory & table ───────────────────────────────────────────────────

    /// Declare the linear memory, exported as `name`, with initial contents
    /// given as `(address, bytes)` segments.
    pub fn set_memory(&mut self, min_pages: u64, name: &str, segments: Vec<(u32, Vec<u8>)>) {
        self.memory = Some(MemoryDef {
            min_pages,
            name: name.to_string(),
            segments,
        });
    }

    /// Declare the function table, filled with the named functions in order
    /// starting at slot 0. The table has exactly `names.len()` slots.
    pub fn set_function_table(&mut self, names: &[&str]) -> CodegenResult<()> {
        let indices = names
            .iter()
            .map(|name| {
                self.function_index(name)
                    .ok_or_else(|| CodegenError::UnresolvedSymbol(name.to_string()))
            })
            .collect::<CodegenResult<Vec<u32>>>()?;
        self.table = Some(indices);
        Ok(())
    }

    // ══════════════════════════════════════════════════════════════════════
    // Output
    // ══════════════════════════════════════════════════════════════════════

    /// Assemble the module bytes.
    pub fn finish(&self) -> CodegenResult<Vec<u8>> {
        let mut module = Module::new();

        // 1. Type section
        let mut types = TypeSection::new();
        for sig in &self.sigs {
            types
                .ty()
                .function(sig.params.iter().copied(), sig.results.iter().copied());
        }
        module.section(&types);

        // 2. Import section
        if !self.imports.is_empty() {
            let mut imports = ImportSection::new();
            for imp in &self.imports {
                imports.import(&imp.module, &imp.field, EntityType::Function(imp.type_idx));
            }
            module.section(&imports);
        }

        // 3. Function section
        let mut functions = FunctionSection::new();
        for def in &self.funcs {
            functions.function(def.type_idx);
        }
        module.section(&functions);

        // 4. Table section
        if let Some(slots) = &self.table {
            let mut tables = TableSection::new();
            tables.table(TableType {
                element_type: RefType::FUNCREF,
                minimum: slots.len() as u64,
                maximum: Some(slots.len() as u64),
                table64: false,
                shared: false,
            });
            module.section(&tables);
        }

        // 5. Memory section
        if let Some(mem) = &self.memory {
            let mut memory = MemorySection::new();
            memory.memory(MemoryType {
                minimum: mem.min_pages,
                maximum: None,
                memory64: false,
                shared: false,
                page_size_log2: None,
            });
            module.section(&memory);
        }

        // 6. Global section
        if !self.globals.is_empty() {
            let mut globals = GlobalSection::new();
            for g in &self.globals {
                globals.global(
                    GlobalType {
                        val_type: g.ty,
                        mutable: g.mutable,
                        shared: false,
                    },
                    &const_expr(g.ty, g.init),
                );
            }
            module.section(&globals);
        }

        // 7. Export section
        let mut exports = ExportSection::new();
        for (name, kind, idx) in &self.exports {
            exports.export(name, *kind, *idx);
        }
        if let Some(mem) = &self.memory {
            exports.export(&mem.name, ExportKind::Memory, 0);
        }
        module.section(&exports);

        // 8. Element section
        if let Some(slots) = self.table.as_ref().filter(|s| !s.is_empty()) {
            let mut elements = ElementSection::new();
            elements.active(
                Some(0),
                &ConstExpr::i32_const(0),
                Elements::Functions(Cow::Borrowed(slots.as_slice())),
            );
            module.section(&elements);
        }

        // 9. Code section
        let mut code = CodeSection::new();
        for def in &self.funcs {
            let body = def.body.as_ref().ok_or_else(|| {
                CodegenError::Internal(format!("function `{}` has no body", def.name))
            })?;
            code.function(&body.encode());
        }
        module.section(&code);

        // 10. Data section
        if let Some(mem) = self.memory.as_ref().filter(|m| !m.segments.is_empty()) {
            let mut data = DataSection::new();
            for (addr, bytes) in &mem.segments {
                data.active(0, &ConstExpr::i32_const(*addr as i32), bytes.iter().copied());
            }
            module.section(&data);
        }

        // 11. Custom sections
        module.section(&CustomSection {
            name: Cow::Borrowed(CUSTOM_SECTION_NAME),
            data: Cow::Borrowed(COMPILER_VERSION.as_bytes()),
        });
        if self.debug_info {
            module.section(&self.name_section());
            let srcmap = self.source_map().to_json();
            module.section(&CustomSection {
                name: Cow::Borrowed(SRCMAP_SECTION_NAME),
                data: Cow::Owned(srcmap),
            });
        }

        Ok(module.finish())
    }

    /// Check the assembled module against the WASM validation rules.
    pub fn validate(&self) -> CodegenResult<()> {
        let bytes = self.finish()?;
        wasmparser::validate(&bytes)
            .map(|_| ())
            .map_err(|e| CodegenError::ValidationFailed(format!("{e}")))
    }

    /// Serialize into at most `capacity` bytes.
    pub fn write(&self, capacity: usize) -> CodegenResult<Vec<u8>> {
        let bytes = self.finish()?;
        if bytes.len() > capacity {
            return Err(CodegenError::BinaryOverflow { size: bytes.len() });
        }
        Ok(bytes)
    }

    /// Function index → declaration position, for every defined function.
    pub fn source_map(&self) -> SourceMap {
        let base = self.imports.len() as u32;
        let mut sm = SourceMap::new();
        for (i, def) in self.funcs.iter().enumerate() {
            sm.push(base + i as u32, &def.name, def.kind, def.pos);
        }
        sm
    }

    fn name_section(&self) -> NameSection {
        let mut names = NameSection::new();
        names.module(CUSTOM_SECTION_NAME);

        let mut funcs = NameMap::new();
        for (i, imp) in self.imports.iter().enumerate() {
            funcs.append(i as u32, &imp.name);
        }
        let base = self.imports.len() as u32;
        for (i, def) in self.funcs.iter().enumerate() {
            funcs.append(base + i as u32, &def.name);
        }
        names.functions(&funcs);

        if !self.globals.is_empty() {
            let mut globals = NameMap::new();
            for (i, g) in self.globals.iter().enumerate() {
                globals.append(i as u32, &g.name);
            }
            names.globals(&globals);
        }
        names
    }

    // ══════════════════════════════════════════════════════════════════════
    // Textual form
    // ══════════════════════════════════════════════════════════════════════

    /// Render the module in a WAT-like text form, for debugging.
    pub fn print(&self) -> String {
        let mut out = String::from("(module\n");

        for (i, sig) in self.sigs.iter().enumerate() {
            let _ = writeln!(out, "  (type {i} (func{}))", sig_text(sig));
        }
        for (i, imp) in self.imports.iter().enumerate() {
            let _ = writeln!(
                out,
                "  (import {:?} {:?} (func {i} ${} (type {})))",
                imp.module, imp.field, imp.name, imp.type_idx
            );
        }

        let base = self.imports.len();
        for (i, def) in self.funcs.iter().enumerate() {
            let _ = writeln!(out, "  (func {} ${} (type {})", base + i, def.name, def.type_idx);
            match &def.body {
                Some(body) => {
                    for (count, ty) in &body.locals {
                        let _ = writeln!(out, "    (local {count} {})", val_type_text(*ty));
                    }
                    for instr in &body.instrs {
                        let _ = writeln!(out, "    {instr:?}");
                    }
                }
                None => out.push_str("    ;; no body\n"),
            }
            out.push_str("  )\n");
        }

        if let Some(slots) = &self.table {
            let _ = writeln!(out, "  (table {} {} funcref)", slots.len(), slots.len());
            let list: Vec<String> = slots.iter().map(u32::to_string).collect();
            let _ = writeln!(out, "  (elem (i32.const 0) func {})", list.join(" "));
        }
        if let Some(mem) = &self.memory {
            let _ = writeln!(out, "  (memory {} (export {:?}))", mem.min_pages, mem.name);
            for (addr, bytes) in &mem.segments {
                let _ = writeln!(out, "  (data (i32.const {addr}) {:?})", escape_bytes(bytes));
            }
        }
        for (i, g) in self.globals.iter().enumerate() {
            let ty = val_type_text(g.ty);
            let ty = if g.mutable { format!("(mut {ty})") } else { ty.to_string() };
            let _ = writeln!(out, "  (global {i} ${} {ty} {})", g.name, g.init);
        }
        for (name, kind, idx) in &self.exports {
            let _ = writeln!(out, "  (export {name:?} ({kind:?} {idx}))");
        }

        out.push(')');
        out
    }
}

fn const_expr(ty: ValType, init: i64) -> ConstExpr {
    match ty {
        ValType::I64 => ConstExpr::i64_const(init),
        ValType::F32 => ConstExpr::f32_const((init as f32).into()),
        ValType::F64 => ConstExpr::f64_const((init as f64).into()),
        _ => ConstExpr::i32_const(init as i32),
    }
}

fn val_type_text(ty: ValType) -> &'static str {
    match ty {
        ValType::I32 => "i32",
        ValType::I64 => "i64",
        ValType::F32 => "f32",
        ValType::F64 => "f64",
        ValType::V128 => "v128",
        ValType::Ref(_) => "ref",
    }
}

fn sig_text(sig: &FuncSig) -> String {
    let mut s = String::new();
    if !sig.params.is_empty() {
        let params: Vec<_> = sig.params.iter().map(|t| val_type_text(*t)).collect();
        let _ = write!(s, " (param {})", params.join(" "));
    }
    if !sig.results.is_empty() {
        let results: Vec<_> = sig.results.iter().map(|t| val_type_text(*t)).collect();
        let _ = write!(s, " (result {})", results.join(" "));
    }
    s
}

fn escape_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
