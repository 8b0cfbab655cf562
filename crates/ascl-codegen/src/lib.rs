//! ASCL WASM code generator: assembles lowered IR into a `.wasm` module.
//!
//! # Architecture
//!
//! [`generate`] takes the [`Ir`] produced by the lowering pass and emits a
//! self-contained module:
//!
//! ## Functions
//! - one import per external interface (`module.field`), followed by a
//!   forwarding stub under the interface's own name
//! - one function per [`IrFn`], exported when marked so
//! - a `funcref` table holding every [`IrFn`] in declaration order
//!
//! ## Memory
//! - one linear memory, exported as `memory`, sized from the segment's used
//!   offset and initialized with its static data
//! - `stack$offset` (global 0) and `heap$offset` (global 1) mark the
//!   boundary between the reserved stack region and the heap
//!
//! ## Value Representation
//!
//! Scalars map onto `i32`/`i64`/`f32`/`f64`; strings, accounts, structs,
//! maps and objects are `i32` addresses into linear memory. See [`types`].

pub mod buffer;
pub mod builder;
pub mod compiler;
pub mod error;
pub mod flags;
pub mod ir;
pub mod lower;
pub mod source_map;
pub mod types;

pub use ascl_types::meta::TypeKind;
pub use compiler::{check_binary_size, generate, output_path, GenOutput};
pub use error::{CodegenError, CodegenResult};
pub use flags::Flags;
pub use ir::{Ir, IrAbi, IrFn, IrOp, IrSgmt};
pub use source_map::SourceMap;
