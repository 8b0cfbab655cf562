//! Lowering of constant expressions.
//!
//! Literals and `null` become a single `*.const` instruction of the machine
//! type given by the node's meta. String literals are placed in the memory
//! segment, NUL-terminated, and lower to their address. Every other node kind
//! lowers to nothing here, so the result can be passed straight to
//! [`FuncBuffer::instr_add`](crate::buffer::FuncBuffer::instr_add).

use ascl_types::ast::{Expr, ExprKind, Value};
use wasm_encoder::Instruction;

use crate::error::{CodegenError, CodegenResult};
use crate::ir::IrSgmt;
use crate::types::{expr_machine_type, MachineType};

/// Lower a constant expression to one instruction.
pub fn lower_const(
    expr: &Expr,
    sgmt: &mut IrSgmt,
) -> CodegenResult<Option<Instruction<'static>>> {
    let value = match &expr.kind {
        ExprKind::Null => {
            let mt = expr_machine_type(expr)?;
            if mt != MachineType::I32 {
                return Err(CodegenError::Internal(format!("null typed as {mt}")));
            }
            return Ok(Some(Instruction::I32Const(0)));
        }
        ExprKind::Lit(value) => value,
        _ => return Ok(None),
    };

    let mt = expr_machine_type(expr)?;
    let instr = match value {
        Value::Str(s) => {
            if mt != MachineType::I32 {
                return Err(mismatch(value, mt));
            }
            let mut bytes = s.as_bytes().to_vec();
            bytes.push(0);
            Instruction::I32Const(sgmt.add(bytes)? as i32)
        }
        Value::Bool(b) => match mt {
            MachineType::I32 => Instruction::I32Const(i32::from(*b)),
            _ => return Err(mismatch(value, mt)),
        },
        Value::Int(v) => int_const(*v, mt).ok_or_else(|| mismatch(value, mt))?,
        Value::UInt(v) => int_const(*v as i64, mt).ok_or_else(|| mismatch(value, mt))?,
        Value::Float(v) => match mt {
            MachineType::F32 => Instruction::F32Const((*v as f32).into()),
            MachineType::F64 => Instruction::F64Const((*v).into()),
            _ => return Err(mismatch(value, mt)),
        },
    };
    Ok(Some(instr))
}

// integer literals also initialize float-typed operands
fn int_const(v: i64, mt: MachineType) -> Option<Instruction<'static>> {
    match mt {
        MachineType::I32 => Some(Instruction::I32Const(v as i32)),
        MachineType::I64 => Some(Instruction::I64Const(v)),
        MachineType::F32 => Some(Instruction::F32Const((v as f32).into())),
        MachineType::F64 => Some(Instruction::F64Const((v as f64).into())),
        MachineType::None => None,
    }
}

fn mismatch(value: &Value, mt: MachineType) -> CodegenError {
    CodegenError::Internal(format!("literal {value} typed as {mt}"))
}
