//! Source value types and the shape information (`Meta`) the semantic checker
//! attaches to expressions and declarations.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A source-level value type.
///
/// The numeric tags are stable: they are what serialized IR and the raw-tag
/// entry point of the type mapper use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    None,
    Bool,
    Byte,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float,
    Double,
    String,
    Account,
    Struct,
    Map,
    Object,
    Void,
    Tuple,
}

/// A raw type tag that does not name any [`TypeKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown type tag: {0}")]
pub struct UnknownTypeTag(pub u8);

const ALL_KINDS: [TypeKind; 20] = [
    TypeKind::None,
    TypeKind::Bool,
    TypeKind::Byte,
    TypeKind::Int8,
    TypeKind::Int16,
    TypeKind::Int32,
    TypeKind::Int64,
    TypeKind::Uint8,
    TypeKind::Uint16,
    TypeKind::Uint32,
    TypeKind::Uint64,
    TypeKind::Float,
    TypeKind::Double,
    TypeKind::String,
    TypeKind::Account,
    TypeKind::Struct,
    TypeKind::Map,
    TypeKind::Object,
    TypeKind::Void,
    TypeKind::Tuple,
];

impl TypeKind {
    /// Every type kind, in tag order.
    pub fn all() -> &'static [TypeKind] {
        &ALL_KINDS
    }

    /// The stable numeric tag of this type.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Source spelling of the type, for dumps and diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            TypeKind::None => "none",
            TypeKind::Bool => "bool",
            TypeKind::Byte => "byte",
            TypeKind::Int8 => "int8",
            TypeKind::Int16 => "int16",
            TypeKind::Int32 => "int32",
            TypeKind::Int64 => "int64",
            TypeKind::Uint8 => "uint8",
            TypeKind::Uint16 => "uint16",
            TypeKind::Uint32 => "uint32",
            TypeKind::Uint64 => "uint64",
            TypeKind::Float => "float",
            TypeKind::Double => "double",
            TypeKind::String => "string",
            TypeKind::Account => "account",
            TypeKind::Struct => "struct",
            TypeKind::Map => "map",
            TypeKind::Object => "object",
            TypeKind::Void => "void",
            TypeKind::Tuple => "tuple",
        }
    }
}

impl TryFrom<u8> for TypeKind {
    type Error = UnknownTypeTag;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        ALL_KINDS
            .get(tag as usize)
            .copied()
            .ok_or(UnknownTypeTag(tag))
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type and shape of a value, as inferred by the semantic checker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub ty: TypeKind,
    /// Declared type name for structs and contracts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Element shapes of a tuple, or field shapes of a struct.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elems: Vec<Meta>,
    /// Array dimensions, outermost first. `None` is an unsized dimension.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dims: Vec<Option<u32>>,
}

impl Meta {
    pub fn new(ty: TypeKind) -> Self {
        Self {
            ty,
            name: None,
            elems: Vec::new(),
            dims: Vec::new(),
        }
    }

    /// Shape of a multi-value expression such as `(a, b)`.
    pub fn tuple(elems: Vec<Meta>) -> Self {
        Self {
            elems,
            ..Self::new(TypeKind::Tuple)
        }
    }

    /// Attach array dimensions.
    pub fn with_dims(mut self, dims: Vec<Option<u32>>) -> Self {
        self.dims = dims;
        self
    }

    /// Attach a declared type name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_array(&self) -> bool {
        !self.dims.is_empty()
    }

    pub fn is_tuple(&self) -> bool {
        self.ty == TypeKind::Tuple
    }
}

impl fmt::Display for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, self.is_tuple()) {
            (Some(name), _) => write!(f, "{} {}", self.ty, name)?,
            (None, true) => {
                f.write_str("(")?;
                for (i, elem) in self.elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{elem}")?;
                }
                f.write_str(")")?;
            }
            (None, false) => write!(f, "{}", self.ty)?,
        }
        for dim in &self.dims {
            match dim {
                Some(n) => write!(f, "[{n}]")?,
                None => f.write_str("[]")?,
            }
        }
        Ok(())
    }
}
