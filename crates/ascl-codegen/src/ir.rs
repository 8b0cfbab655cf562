//! Intermediate representation handed to the code generator.
//!
//! Function bodies arrive already lowered to target-level operations; the
//! generator only resolves symbolic operands (function names, globals,
//! indirect-call signatures) and assembles the module around them.

use ascl_types::meta::TypeKind;
use ascl_types::SrcPos;
use wasm_encoder::Instruction;

use crate::error::{CodegenError, CodegenResult};

/// A whole compilation unit.
#[derive(Debug, Clone, Default)]
pub struct Ir {
    /// External interface signatures, in declaration order.
    pub abis: Vec<IrAbi>,
    /// Function bodies, in declaration order.
    pub fns: Vec<IrFn>,
    /// Static data and the used size of linear memory.
    pub sgmt: IrSgmt,
}

impl Ir {
    pub fn new() -> Self {
        Self::default()
    }
}

/// An external interface signature.
///
/// The host provides `module.field`; the generator imports it and emits a
/// forwarding stub called `name` so contract code can call it like any
/// other function.
#[derive(Debug, Clone, PartialEq)]
pub struct IrAbi {
    pub name: String,
    pub module: String,
    pub field: String,
    pub params: Vec<TypeKind>,
    pub result: TypeKind,
}

impl IrAbi {
    pub fn new(
        name: impl Into<String>,
        module: impl Into<String>,
        field: impl Into<String>,
        params: Vec<TypeKind>,
        result: TypeKind,
    ) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            field: field.into(),
            params,
            result,
        }
    }
}

/// A lowered function.
#[derive(Debug, Clone)]
pub struct IrFn {
    pub name: String,
    pub params: Vec<TypeKind>,
    pub result: TypeKind,
    pub body: Vec<IrOp>,
    /// Exported from the module under `name`.
    pub exported: bool,
    pub pos: SrcPos,
}

impl IrFn {
    pub fn new(name: impl Into<String>, params: Vec<TypeKind>, result: TypeKind) -> Self {
        Self {
            name: name.into(),
            params,
            result,
            body: Vec::new(),
            exported: false,
            pos: SrcPos::default(),
        }
    }

    pub fn exported(mut self) -> Self {
        self.exported = true;
        self
    }

    pub fn at(mut self, pos: SrcPos) -> Self {
        self.pos = pos;
        self
    }

    pub fn with_body(mut self, body: Vec<IrOp>) -> Self {
        self.body = body;
        self
    }
}

/// One target-level operation of a lowered function body.
#[derive(Debug, Clone)]
pub enum IrOp {
    /// Declare the next local. Produces no instruction.
    Local(TypeKind),
    /// Produces no instruction.
    Nop,
    /// A fully resolved instruction.
    Wasm(Instruction<'static>),
    /// Direct call of an interface stub or function by name.
    Call(String),
    /// Call through the function table; the callee index is on the stack.
    CallIndirect {
        params: Vec<TypeKind>,
        result: TypeKind,
    },
    /// Push the table index of a function, for first-class function values.
    FnRef(String),
    GlobalGet(String),
    GlobalSet(String),
}

/// Linear-memory initial contents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IrSgmt {
    pub datas: Vec<Vec<u8>>,
    pub addrs: Vec<u32>,
    /// Used size of linear memory; the next free address for static data.
    pub offset: u32,
}

impl IrSgmt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start placing static data at `offset`.
    pub fn starting_at(offset: u32) -> Self {
        Self {
            offset,
            ..Self::default()
        }
    }

    /// Place a blob at the current offset and return its address.
    ///
    /// Fails without placing anything if the blob would run past the 32-bit
    /// address space.
    pub fn add(&mut self, data: impl Into<Vec<u8>>) -> CodegenResult<u32> {
        let data = data.into();
        let addr = self.offset;
        self.offset = u32::try_from(data.len())
            .ok()
            .and_then(|len| addr.checked_add(len))
            .ok_or_else(|| {
                CodegenError::Internal(format!(
                    "{} byte blob at {addr} exceeds the address space",
                    data.len()
                ))
            })?;
        self.datas.push(data);
        self.addrs.push(addr);
        Ok(addr)
    }

    /// Number of blobs.
    pub fn size(&self) -> usize {
        self.datas.len()
    }

    pub fn lens(&self) -> Vec<u32> {
        self.datas.iter().map(|d| d.len() as u32).collect()
    }

    /// `(address, bytes)` pairs in insertion order.
    pub fn blobs(&self) -> impl Iterator<Item = (u32, &[u8])> {
        self.addrs
            .iter()
            .copied()
            .zip(self.datas.iter().map(Vec::as_slice))
    }
}
