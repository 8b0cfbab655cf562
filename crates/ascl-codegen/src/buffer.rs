//! Per-function code buffer.
//!
//! Accumulates local declarations and lowered instructions while one
//! function is being generated. The buffer is reset between functions: its
//! contents move into the committed body and both sequences start empty.

use ascl_types::meta::TypeKind;
use wasm_encoder::{Instruction, ValType};

use crate::builder::FuncBody;
use crate::error::{CodegenError, CodegenResult};
use crate::types::{map_type, MachineType};

#[derive(Debug, Default)]
pub struct FuncBuffer {
    /// Local types by index, parameters first.
    locals: Vec<MachineType>,
    instrs: Vec<Instruction<'static>>,
}

impl FuncBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a local of the given source type and return its index.
    pub fn local_add(&mut self, ty: TypeKind) -> CodegenResult<u32> {
        let mt = map_type(ty)?;
        if mt == MachineType::None {
            return Err(CodegenError::Internal(format!(
                "local of type {ty} holds no value"
            )));
        }
        let idx = self.locals.len() as u32;
        self.locals.push(mt);
        Ok(idx)
    }

    /// Append a lowered instruction. `None` means the lowered node produced
    /// nothing and is skipped.
    pub fn instr_add(&mut self, instr: Option<Instruction<'static>>) {
        if let Some(instr) = instr {
            self.instrs.push(instr);
        }
    }

    pub fn local_count(&self) -> usize {
        self.locals.len()
    }

    pub fn instr_count(&self) -> usize {
        self.instrs.len()
    }

    pub fn locals(&self) -> &[MachineType] {
        &self.locals
    }

    pub fn clear(&mut self) {
        self.locals.clear();
        self.instrs.clear();
    }

    /// Move the buffered function into a committed body.
    ///
    /// The first `param_count` locals are the parameters and are declared by
    /// the function type, not the body. The remaining locals are run-length
    /// encoded. The buffer is left empty.
    pub fn take_body(&mut self, param_count: usize) -> CodegenResult<FuncBody> {
        if param_count > self.locals.len() {
            return Err(CodegenError::Internal(format!(
                "{param_count} parameters but only {} locals declared",
                self.locals.len()
            )));
        }

        let mut groups: Vec<(u32, ValType)> = Vec::new();
        for mt in &self.locals[param_count..] {
            let Some(vt) = mt.val_type() else {
                return Err(CodegenError::Internal("no-value local in buffer".into()));
            };
            if let Some((count, last)) = groups.last_mut() {
                if *last == vt {
                    *count += 1;
                    continue;
                }
            }
            groups.push((1, vt));
        }

        let instrs = std::mem::take(&mut self.instrs);
        self.locals.clear();
        Ok(FuncBody {
            locals: groups,
            instrs,
        })
    }
}
