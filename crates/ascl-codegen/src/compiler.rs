//! Module assembly engine.
//!
//! Orchestrates the code generation pipeline:
//! 1. Skip everything if an earlier phase reported errors
//! 2. Declare interface imports, forwarding stubs and functions
//! 3. Generate stub bodies, then function bodies
//! 4. Build the call table and the memory segment with layout globals
//! 5. Dump the textual form (on request) and validate
//! 6. Serialize, check the size limit and write `<input>.wasm`

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ascl_types::meta::TypeKind;
use ascl_types::CompileErrors;
use sha2::{Digest, Sha256};
use wasm_encoder::{Instruction, ValType};

use crate::buffer::FuncBuffer;
use crate::builder::{FuncSig, ModuleBuilder};
use crate::error::{CodegenError, CodegenResult};
use crate::flags::Flags;
use crate::ir::{Ir, IrAbi, IrFn, IrOp, IrSgmt};
use crate::source_map::FuncKind;
use crate::types::*;

// ══════════════════════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════════════════════

/// Result of one [`generate`] run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenOutput {
    /// An earlier phase failed; nothing was generated.
    Skipped,
    /// Test-only mode: the module was validated but not written.
    TestOnly { bytes: Vec<u8> },
    /// The module was written to `path`.
    Written {
        path: PathBuf,
        size: usize,
        /// Lowercase hex SHA-256 of the written bytes.
        sha256: String,
    },
}

/// Generate the WASM module for `ir` and write it next to `infile`.
///
/// Returns [`GenOutput::Skipped`] without doing any work when `upstream`
/// already holds errors. Every error returned is fatal for the compilation;
/// see [`CodegenError::is_internal`].
pub fn generate(
    ir: &Ir,
    flags: &Flags,
    infile: &Path,
    upstream: &CompileErrors,
) -> CodegenResult<GenOutput> {
    if upstream.has_errors() {
        log::info!(
            "skipping code generation for {}: {} upstream error(s)",
            infile.display(),
            upstream.total_errors
        );
        return Ok(GenOutput::Skipped);
    }

    let mut generator = Generator::new(flags);
    generator.builder.set_debug_info(true);

    generator.declare(ir)?;
    for abi in &ir.abis {
        generator.abi_gen(abi)?;
    }
    for func in &ir.fns {
        generator.fn_gen(func)?;
    }
    generator.table_gen(&ir.fns)?;
    generator.sgmt_gen(&ir.sgmt)?;

    if flags.dump_wat {
        println!("{}", generator.builder.print());
    }

    generator.builder.validate()?;
    log::debug!("module for {} validated", infile.display());

    if flags.test {
        let bytes = generator.builder.finish()?;
        log::info!("test mode: {} bytes not written", bytes.len());
        return Ok(GenOutput::TestOnly { bytes });
    }

    let bytes = generator.builder.write(WASM_MAX_LEN * 2)?;
    check_binary_size(bytes.len())?;

    let path = flags
        .outfile
        .clone()
        .unwrap_or_else(|| output_path(infile));
    std::fs::write(&path, &bytes).map_err(|source| CodegenError::Io {
        path: path.clone(),
        source,
    })?;

    let sha256 = hex_digest(&bytes);
    log::info!("wrote {} ({} bytes, sha256 {})", path.display(), bytes.len(), sha256);

    Ok(GenOutput::Written {
        path,
        size: bytes.len(),
        sha256,
    })
}

/// Output path for `infile`: its final extension replaced by `wasm`, or
/// `wasm` appended when it has none. A leading dot starts a file name, not
/// an extension, so `.src` becomes `.src.wasm`.
pub fn output_path(infile: &Path) -> PathBuf {
    infile.with_extension(WASM_EXT)
}

/// Check a serialized module against [`WASM_MAX_LEN`].
pub fn check_binary_size(len: usize) -> CodegenResult<()> {
    if len > WASM_MAX_LEN {
        return Err(CodegenError::BinaryOverflow { size: len });
    }
    Ok(())
}

fn hex_digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

// ══════════════════════════════════════════════════════════════════════════════
// Generator
// ══════════════════════════════════════════════════════════════════════════════

/// State of one generation pass.
struct Generator<'a> {
    flags: &'a Flags,
    builder: ModuleBuilder,
    buffer: FuncBuffer,
    /// Interface name → function index of its import.
    imports: HashMap<String, u32>,
    /// Function name → call table slot.
    slots: HashMap<String, u32>,
}

impl<'a> Generator<'a> {
    fn new(flags: &'a Flags) -> Self {
        log::debug!("generator: opt_lvl={} debug={}", flags.opt_lvl, flags.debug);
        Self {
            flags,
            builder: ModuleBuilder::new(),
            buffer: FuncBuffer::new(),
            imports: HashMap::new(),
            slots: HashMap::new(),
        }
    }

    /// Assign every function index up front so bodies can call forward.
    fn declare(&mut self, ir: &Ir) -> CodegenResult<()> {
        for abi in &ir.abis {
            let ty = self.add_sig(&abi.params, abi.result)?;
            let idx = self
                .builder
                .add_import(&abi.module, &abi.field, &import_name(abi), ty)?;
            self.imports.insert(abi.name.clone(), idx);
        }
        for abi in &ir.abis {
            let ty = self.add_sig(&abi.params, abi.result)?;
            self.builder
                .declare_function(&abi.name, ty, FuncKind::AbiStub, Default::default())?;
        }
        for (slot, func) in ir.fns.iter().enumerate() {
            let ty = self.add_sig(&func.params, func.result)?;
            self.builder
                .declare_function(&func.name, ty, FuncKind::Function, func.pos)?;
            self.slots.insert(func.name.clone(), slot as u32);
        }
        log::debug!(
            "declared {} import(s), {} function(s)",
            self.builder.import_count(),
            self.builder.function_count()
        );
        Ok(())
    }

    /// Forwarding stub: pass every parameter to the import unchanged.
    fn abi_gen(&mut self, abi: &IrAbi) -> CodegenResult<()> {
        let import = self.imports.get(&abi.name).copied().ok_or_else(|| {
            CodegenError::Internal(format!("interface `{}` was not imported", abi.name))
        })?;

        self.buffer.clear();
        for &ty in &abi.params {
            let idx = self.buffer.local_add(ty)?;
            self.buffer.instr_add(Some(Instruction::LocalGet(idx)));
        }
        self.buffer.instr_add(Some(Instruction::Call(import)));

        self.commit(&abi.name, abi.params.len())
    }

    fn fn_gen(&mut self, func: &IrFn) -> CodegenResult<()> {
        self.buffer.clear();
        for &ty in &func.params {
            self.buffer.local_add(ty)?;
        }
        for op in &func.body {
            if let IrOp::Local(ty) = op {
                self.buffer.local_add(*ty)?;
                continue;
            }
            let instr = self.lower_op(op)?;
            self.buffer.instr_add(instr);
        }
        log::trace!(
            "fn {}: {} local(s), {} instruction(s)",
            func.name,
            self.buffer.local_count(),
            self.buffer.instr_count()
        );

        self.commit(&func.name, func.params.len())?;
        if func.exported {
            self.builder.export_function(&func.name)?;
        }
        Ok(())
    }

    fn commit(&mut self, name: &str, param_count: usize) -> CodegenResult<()> {
        let idx = self
            .builder
            .function_index(name)
            .ok_or_else(|| CodegenError::UnresolvedSymbol(name.to_string()))?;
        let body = self.buffer.take_body(param_count)?;
        self.builder.set_body(idx, body)
    }

    /// Resolve the symbolic operand of one operation.
    fn lower_op(&mut self, op: &IrOp) -> CodegenResult<Option<Instruction<'static>>> {
        let instr = match op {
            IrOp::Local(_) | IrOp::Nop => return Ok(None),
            IrOp::Wasm(instr) => instr.clone(),
            IrOp::Call(name) => Instruction::Call(self.function(name)?),
            IrOp::CallIndirect { params, result } => {
                let type_index = self.add_sig(params, *result)?;
                Instruction::CallIndirect {
                    type_index,
                    table_index: 0,
                }
            }
            IrOp::FnRef(name) => {
                let slot = self
                    .slots
                    .get(name)
                    .ok_or_else(|| CodegenError::UnresolvedSymbol(name.clone()))?;
                Instruction::I32Const(*slot as i32)
            }
            IrOp::GlobalGet(name) => Instruction::GlobalGet(global(name)?),
            IrOp::GlobalSet(name) => Instruction::GlobalSet(global(name)?),
        };
        Ok(Some(instr))
    }

    fn function(&self, name: &str) -> CodegenResult<u32> {
        self.builder
            .function_index(name)
            .ok_or_else(|| CodegenError::UnresolvedSymbol(name.to_string()))
    }

    fn add_sig(&mut self, params: &[TypeKind], result: TypeKind) -> CodegenResult<u32> {
        let results: Vec<ValType> = map_type(result)?.val_type().into_iter().collect();
        let sig = FuncSig::new(val_types(params)?, results);
        Ok(self.builder.add_type(sig))
    }

    /// One table slot per function, in declaration order.
    fn table_gen(&mut self, fns: &[IrFn]) -> CodegenResult<()> {
        let names: Vec<&str> = fns.iter().map(|f| f.name.as_str()).collect();
        self.builder.set_function_table(&names)?;
        log::debug!("call table: {} slot(s)", names.len());
        Ok(())
    }

    fn sgmt_gen(&mut self, sgmt: &IrSgmt) -> CodegenResult<()> {
        let min_pages = u64::from(sgmt.offset / MEMORY_PAGE_DIVISOR + 1);
        let segments = sgmt
            .blobs()
            .map(|(addr, bytes)| (addr, bytes.to_vec()))
            .collect();
        self.builder.set_memory(min_pages, MEMORY_NAME, segments);

        // indices must agree with types::global_index
        self.builder
            .add_global(GLOBAL_STACK_OFFSET, MachineType::I32, true, i64::from(STACK_SIZE))?;
        self.builder
            .add_global(GLOBAL_HEAP_OFFSET, MachineType::I32, true, i64::from(STACK_SIZE) + 1)?;

        log::debug!(
            "memory: {} page(s), {} segment(s), used offset {}",
            min_pages,
            sgmt.size(),
            sgmt.offset
        );
        if self.flags.verbose {
            for (addr, len) in sgmt.addrs.iter().zip(sgmt.lens()) {
                log::debug!("  data @{addr}: {len} byte(s)");
            }
        }
        Ok(())
    }
}

fn global(name: &str) -> CodegenResult<u32> {
    global_index(name).ok_or_else(|| CodegenError::UnresolvedSymbol(name.to_string()))
}

fn import_name(abi: &IrAbi) -> String {
    format!("{}$import", abi.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gen_test(ir: &Ir) -> CodegenResult<GenOutput> {
        let flags = Flags {
            test: true,
            ..Flags::default()
        };
        generate(ir, &flags, Path::new("unit.src"), &CompileErrors::empty())
    }

    #[test]
    fn output_path_replaces_final_extension() {
        assert_eq!(output_path(Path::new("foo.src")), PathBuf::from("foo.wasm"));
        assert_eq!(output_path(Path::new("foo")), PathBuf::from("foo.wasm"));
        assert_eq!(output_path(Path::new("a.b.src")), PathBuf::from("a.b.wasm"));
        assert_eq!(output_path(Path::new("dir/c.ascl")), PathBuf::from("dir/c.wasm"));
    }

    #[test]
    fn output_path_keeps_dot_files_whole() {
        assert_eq!(output_path(Path::new(".src")), PathBuf::from(".src.wasm"));
        assert_eq!(output_path(Path::new("dir/.src")), PathBuf::from("dir/.src.wasm"));
        assert_eq!(output_path(Path::new(".hidden.src")), PathBuf::from(".hidden.wasm"));
    }

    #[test]
    fn size_boundary_is_exact() {
        assert!(check_binary_size(WASM_MAX_LEN).is_ok());
        assert!(matches!(
            check_binary_size(WASM_MAX_LEN + 1),
            Err(CodegenError::BinaryOverflow { size }) if size == WASM_MAX_LEN + 1
        ));
    }

    #[test]
    fn empty_ir_generates() {
        assert!(matches!(gen_test(&Ir::new()).unwrap(), GenOutput::TestOnly { .. }));
    }

    #[test]
    fn unknown_callee_is_unresolved() {
        let mut ir = Ir::new();
        ir.fns.push(
            IrFn::new("main", vec![], TypeKind::Void).with_body(vec![IrOp::Call("nowhere".into())]),
        );
        assert!(matches!(
            gen_test(&ir),
            Err(CodegenError::UnresolvedSymbol(ref n)) if n == "nowhere"
        ));
    }

    #[test]
    fn unknown_global_is_unresolved() {
        let mut ir = Ir::new();
        ir.fns.push(IrFn::new("main", vec![], TypeKind::Void).with_body(vec![
            IrOp::GlobalGet("stack$low".into()),
            IrOp::Wasm(Instruction::Drop),
        ]));
        assert!(matches!(gen_test(&ir), Err(CodegenError::UnresolvedSymbol(_))));
    }

    #[test]
    fn fn_ref_of_stub_is_unresolved() {
        let mut ir = Ir::new();
        ir.abis.push(IrAbi::new("log", "env", "log", vec![], TypeKind::Void));
        ir.fns.push(IrFn::new("main", vec![], TypeKind::Void).with_body(vec![
            IrOp::FnRef("log".into()),
            IrOp::Wasm(Instruction::Drop),
        ]));
        assert!(matches!(gen_test(&ir), Err(CodegenError::UnresolvedSymbol(_))));
    }

    #[test]
    fn duplicate_function_is_internal() {
        let mut ir = Ir::new();
        ir.fns.push(IrFn::new("f", vec![], TypeKind::Void));
        ir.fns.push(IrFn::new("f", vec![], TypeKind::Void));
        let err = gen_test(&ir).unwrap_err();
        assert!(matches!(err, CodegenError::Internal(_)));
        assert!(err.is_internal());
    }

    #[test]
    fn digest_is_lowercase_hex() {
        let d = hex_digest(b"abc");
        assert_eq!(
            d,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
