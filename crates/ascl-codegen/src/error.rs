//! Codegen error types.

use std::path::PathBuf;

use ascl_types::ErrorCode;
use thiserror::Error;

/// Errors that can occur during WASM code generation.
///
/// Code generation runs after semantic checking, so apart from I/O and
/// configuration problems every variant reports a defect in an earlier stage
/// or in the generator itself. See [`CodegenError::is_internal`].
#[derive(Debug, Error)]
pub enum CodegenError {
    /// A tuple or unknown source type reached the type mapper.
    #[error("invalid type: {0}")]
    InvalidType(String),

    /// An expression was handed to codegen without semantic annotations.
    #[error("missing meta on {0} expression")]
    MissingMeta(String),

    /// A function or global name could not be resolved during codegen.
    #[error("unresolved symbol: {0}")]
    UnresolvedSymbol(String),

    /// An internal consistency check failed.
    #[error("internal codegen error: {0}")]
    Internal(String),

    /// The generated WASM module failed validation.
    #[error("WASM validation failed: {0}")]
    ValidationFailed(String),

    /// The serialized module is larger than the allowed maximum.
    #[error("binary overflow: module is {size} bytes")]
    BinaryOverflow { size: usize },

    /// The module could not be written to disk.
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Compiler flags could not be parsed.
    #[error("invalid flags: {0}")]
    Config(#[from] serde_json::Error),
}

impl CodegenError {
    /// Whether this error signals an internal defect rather than an
    /// environment problem. Internal errors must abort the compilation.
    pub fn is_internal(&self) -> bool {
        !matches!(self, CodegenError::Io { .. } | CodegenError::Config(_))
    }

    /// The diagnostic code reported for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            CodegenError::InvalidType(_) => ErrorCode::INVALID_TYPE,
            CodegenError::MissingMeta(_) => ErrorCode::MISSING_META,
            CodegenError::UnresolvedSymbol(_) => ErrorCode::UNRESOLVED_SYMBOL,
            CodegenError::Internal(_) => ErrorCode::INTERNAL,
            CodegenError::ValidationFailed(_) => ErrorCode::INVALID_MODULE,
            CodegenError::BinaryOverflow { .. } => ErrorCode::BINARY_OVERFLOW,
            CodegenError::Io { .. } => ErrorCode::WRITE_FAILED,
            CodegenError::Config(_) => ErrorCode::INVALID_CONFIG,
        }
    }
}

/// Codegen result type alias.
pub type CodegenResult<T> = Result<T, CodegenError>;
