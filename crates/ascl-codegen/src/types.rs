//! Source-type to machine-type mapping and module layout constants.
//!
//! Every source type lowers to exactly one WASM value type:
//!
//! | Source type                                         | Machine type |
//! |-----------------------------------------------------|--------------|
//! | none, void                                          | (no value)   |
//! | bool, byte, int8..int32, uint8..uint32              | i32          |
//! | int64, uint64                                       | i64          |
//! | float                                               | f32          |
//! | double                                              | f64          |
//! | string, account, struct, map, object                | i32 (address)|
//!
//! Tuples never reach codegen as a single value; the semantic checker splits
//! them first.

use std::fmt;

use ascl_types::ast::Expr;
use ascl_types::meta::TypeKind;
use wasm_encoder::ValType;

use crate::error::{CodegenError, CodegenResult};

/// A WASM value type, or the absence of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineType {
    None,
    I32,
    I64,
    F32,
    F64,
}

impl MachineType {
    /// The encoder value type, `None` for the no-value marker.
    pub fn val_type(self) -> Option<ValType> {
        match self {
            MachineType::None => None,
            MachineType::I32 => Some(ValType::I32),
            MachineType::I64 => Some(ValType::I64),
            MachineType::F32 => Some(ValType::F32),
            MachineType::F64 => Some(ValType::F64),
        }
    }
}

impl fmt::Display for MachineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MachineType::None => "none",
            MachineType::I32 => "i32",
            MachineType::I64 => "i64",
            MachineType::F32 => "f32",
            MachineType::F64 => "f64",
        };
        f.write_str(s)
    }
}

/// Map a source type to its machine type.
pub fn map_type(ty: TypeKind) -> CodegenResult<MachineType> {
    match ty {
        TypeKind::None | TypeKind::Void => Ok(MachineType::None),

        TypeKind::Bool
        | TypeKind::Byte
        | TypeKind::Int8
        | TypeKind::Int16
        | TypeKind::Int32
        | TypeKind::Uint8
        | TypeKind::Uint16
        | TypeKind::Uint32 => Ok(MachineType::I32),

        TypeKind::Int64 | TypeKind::Uint64 => Ok(MachineType::I64),

        TypeKind::Float => Ok(MachineType::F32),
        TypeKind::Double => Ok(MachineType::F64),

        TypeKind::String
        | TypeKind::Account
        | TypeKind::Struct
        | TypeKind::Map
        | TypeKind::Object => Ok(MachineType::I32),

        TypeKind::Tuple => Err(CodegenError::InvalidType(ty.to_string())),
    }
}

/// Map a raw type tag, as found in serialized IR.
pub fn map_type_tag(tag: u8) -> CodegenResult<MachineType> {
    let ty = TypeKind::try_from(tag).map_err(|e| CodegenError::InvalidType(e.to_string()))?;
    map_type(ty)
}

/// Map the inferred type of an expression.
pub fn expr_machine_type(expr: &Expr) -> CodegenResult<MachineType> {
    let meta = expr
        .meta()
        .ok_or_else(|| CodegenError::MissingMeta(expr.kind_name().to_string()))?;
    if meta.is_array() {
        // arrays live in linear memory
        return Ok(MachineType::I32);
    }
    map_type(meta.ty)
}

/// Map a list of source types to encoder value types, skipping no-value
/// entries. Used for function signatures.
pub fn val_types(tys: &[TypeKind]) -> CodegenResult<Vec<ValType>> {
    let mut out = Vec::with_capacity(tys.len());
    for &ty in tys {
        if let Some(vt) = map_type(ty)?.val_type() {
            out.push(vt);
        }
    }
    Ok(out)
}

// ── Memory layout ────────────────────────────────────────────────────────────

/// Size of the reserved stack region `[0, STACK_SIZE)`.
pub const STACK_SIZE: u32 = u16::MAX as u32;
/// Divisor used to size linear memory from the segment's used offset.
pub const MEMORY_PAGE_DIVISOR: u32 = u16::MAX as u32;
/// Export name of the linear memory.
pub const MEMORY_NAME: &str = "memory";

// ── Global variable names and indices ────────────────────────────────────────
// (order must match the global emission in compiler.rs)

/// Top of the reserved stack region.
pub const GLOBAL_STACK_OFFSET: &str = "stack$offset";
/// First byte of the heap.
pub const GLOBAL_HEAP_OFFSET: &str = "heap$offset";

/// Layout globals in index order.
pub const LAYOUT_GLOBALS: [&str; 2] = [GLOBAL_STACK_OFFSET, GLOBAL_HEAP_OFFSET];

/// Resolve a layout global name to its index.
pub fn global_index(name: &str) -> Option<u32> {
    LAYOUT_GLOBALS
        .iter()
        .position(|g| *g == name)
        .map(|i| i as u32)
}

// ── Output ───────────────────────────────────────────────────────────────────

/// Extension of the written module.
pub const WASM_EXT: &str = "wasm";
/// Maximum size of a serialized module (1 MiB).
pub const WASM_MAX_LEN: usize = 1024 * 1024;

// ── Custom sections ──────────────────────────────────────────────────────────

/// Custom section holding the function source map.
pub const SRCMAP_SECTION_NAME: &str = "ascl.srcmap";
/// Custom section holding the compiler version.
pub const CUSTOM_SECTION_NAME: &str = "ascl";
/// Compiler version embedded in the custom section.
pub const COMPILER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use ascl_types::meta::Meta;
    use ascl_types::SrcPos;
    use std::rc::Rc;

    #[test]
    fn mapping_table() {
        use MachineType::*;
        let expected = [
            (TypeKind::None, None),
            (TypeKind::Void, None),
            (TypeKind::Bool, I32),
            (TypeKind::Byte, I32),
            (TypeKind::Int8, I32),
            (TypeKind::Int16, I32),
            (TypeKind::Int32, I32),
            (TypeKind::Uint8, I32),
            (TypeKind::Uint16, I32),
            (TypeKind::Uint32, I32),
            (TypeKind::Int64, I64),
            (TypeKind::Uint64, I64),
            (TypeKind::Float, F32),
            (TypeKind::Double, F64),
            (TypeKind::String, I32),
            (TypeKind::Account, I32),
            (TypeKind::Struct, I32),
            (TypeKind::Map, I32),
            (TypeKind::Object, I32),
        ];
        for (ty, mt) in expected {
            assert_eq!(map_type(ty).unwrap(), mt, "{ty}");
        }
    }

    #[test]
    fn mapping_is_deterministic() {
        for &ty in TypeKind::all() {
            let first = map_type(ty).ok();
            for _ in 0..100 {
                assert_eq!(map_type(ty).ok(), first, "{ty}");
            }
        }
    }

    #[test]
    fn tuple_is_invalid() {
        let err = map_type(TypeKind::Tuple).unwrap_err();
        assert!(matches!(err, CodegenError::InvalidType(ref s) if s == "tuple"));
        assert!(err.is_internal());
    }

    #[test]
    fn unknown_tag_is_invalid() {
        assert!(matches!(map_type_tag(200), Err(CodegenError::InvalidType(_))));
        assert_eq!(map_type_tag(TypeKind::Double.tag()).unwrap(), MachineType::F64);
        assert!(map_type_tag(TypeKind::Tuple.tag()).is_err());
    }

    #[test]
    fn no_value_has_no_val_type() {
        assert_eq!(MachineType::None.val_type(), Option::None);
        assert_eq!(MachineType::I64.val_type(), Some(ValType::I64));
    }

    #[test]
    fn expr_without_meta_is_rejected() {
        let e = Expr::reference("balance", SrcPos::default());
        assert!(matches!(
            expr_machine_type(&e),
            Err(CodegenError::MissingMeta(ref k)) if k == "ref"
        ));

        let e = e.with_meta(Rc::new(Meta::new(TypeKind::Uint64)));
        assert_eq!(expr_machine_type(&e).unwrap(), MachineType::I64);
    }

    #[test]
    fn array_expressions_are_addresses() {
        let meta = Meta::new(TypeKind::Double).with_dims(vec![Some(4)]);
        let e = Expr::reference("prices", SrcPos::default()).with_meta(Rc::new(meta));
        assert_eq!(expr_machine_type(&e).unwrap(), MachineType::I32);
    }

    #[test]
    fn signature_skips_void() {
        let vts = val_types(&[TypeKind::Int32, TypeKind::Void, TypeKind::Double]).unwrap();
        assert_eq!(vts, vec![ValType::I32, ValType::F64]);
    }

    #[test]
    fn layout_global_indices() {
        assert_eq!(global_index(GLOBAL_STACK_OFFSET), Some(0));
        assert_eq!(global_index(GLOBAL_HEAP_OFFSET), Some(1));
        assert_eq!(global_index("stack$low"), Option::None);
    }
}
