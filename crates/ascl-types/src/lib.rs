//! Shared types for the ASCL compiler.
//!
//! This crate defines the expression node model, source positions, source
//! types and their inferred shape, the symbol table the semantic checker
//! resolves into, and the diagnostics collected by the front-end stages.

mod error;
mod pos;
pub mod ast;
pub mod meta;
pub mod symtab;

pub use error::{AsclError, CompileErrors, ErrorCategory, ErrorCode, Severity, MAX_ERRORS};
pub use pos::{FileId, SrcPos};
