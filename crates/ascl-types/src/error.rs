use crate::SrcPos;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of errors kept before further ones are only counted.
pub const MAX_ERRORS: usize = 20;

/// Error severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Error category, determined by error code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Syntax,
    Type,
    Semantic,
    Internal,
}

/// Numeric error code (E100–E999).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    // ── Syntax errors (E100–E199) ──
    pub const UNEXPECTED_TOKEN: Self = Self(100);
    pub const UNTERMINATED_STRING: Self = Self(101);

    // ── Type errors (E200–E299) ──
    pub const TYPE_MISMATCH: Self = Self(200);
    pub const INVALID_CAST: Self = Self(201);
    pub const WRONG_ARG_COUNT: Self = Self(202);

    // ── Semantic errors (E300–E399) ──
    pub const UNDEFINED_ID: Self = Self(300);
    pub const DUPLICATED_ID: Self = Self(301);
    pub const INVALID_LVALUE: Self = Self(302);

    // ── Internal errors (E900–E999), raised by code generation ──
    pub const INVALID_TYPE: Self = Self(900);
    pub const MISSING_META: Self = Self(901);
    pub const UNRESOLVED_SYMBOL: Self = Self(902);
    pub const INTERNAL: Self = Self(903);
    pub const INVALID_MODULE: Self = Self(904);
    pub const BINARY_OVERFLOW: Self = Self(905);
    pub const WRITE_FAILED: Self = Self(906);
    pub const INVALID_CONFIG: Self = Self(907);

    /// Get the category for this error code.
    pub fn category(self) -> ErrorCategory {
        match self.0 {
            100..=199 => ErrorCategory::Syntax,
            200..=299 => ErrorCategory::Type,
            300..=399 => ErrorCategory::Semantic,
            _ => ErrorCategory::Internal,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// A structured diagnostic reported by a front-end stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsclError {
    /// Source file name.
    pub file: String,
    pub code: ErrorCode,
    pub severity: Severity,
    /// Derived from `code`.
    pub category: ErrorCategory,
    pub message: String,
    pub pos: SrcPos,
}

impl AsclError {
    pub fn new(
        file: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
        pos: SrcPos,
    ) -> Self {
        Self {
            file: file.into(),
            code,
            severity: Severity::Error,
            category: code.category(),
            message: message.into(),
            pos,
        }
    }

    /// Downgrade to a warning.
    pub fn warning(mut self) -> Self {
        self.severity = Severity::Warning;
        self
    }
}

impl fmt::Display for AsclError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} [{}] {}",
            self.file, self.pos, self.code, self.category, self.message
        )
    }
}

impl std::error::Error for AsclError {}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax => write!(f, "syntax"),
            Self::Type => write!(f, "type"),
            Self::Semantic => write!(f, "semantic"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Diagnostics accumulated by the stages before code generation.
///
/// Code generation consults [`CompileErrors::has_errors`] and does no work
/// when an earlier stage failed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompileErrors {
    pub errors: Vec<AsclError>,
    pub warnings: Vec<AsclError>,
    pub total_errors: usize,
    pub total_warnings: usize,
}

impl CompileErrors {
    /// Create an empty result (no errors).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    /// Add a diagnostic, routed by its severity. Errors beyond
    /// [`MAX_ERRORS`] are counted but not stored.
    pub fn push(&mut self, diag: AsclError) {
        match diag.severity {
            Severity::Error => {
                if self.errors.len() < MAX_ERRORS {
                    self.errors.push(diag);
                }
                self.total_errors += 1;
            }
            Severity::Warning => {
                self.warnings.push(diag);
                self.total_warnings += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FileId;

    fn pos() -> SrcPos {
        SrcPos::new(FileId(0), 12, 5, 12, 22)
    }

    #[test]
    fn test_error_code_category() {
        assert_eq!(ErrorCode::UNEXPECTED_TOKEN.category(), ErrorCategory::Syntax);
        assert_eq!(ErrorCode::TYPE_MISMATCH.category(), ErrorCategory::Type);
        assert_eq!(ErrorCode::INVALID_LVALUE.category(), ErrorCategory::Semantic);
        assert_eq!(ErrorCode::BINARY_OVERFLOW.category(), ErrorCategory::Internal);
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(format!("{}", ErrorCode::TYPE_MISMATCH), "E200");
        assert_eq!(format!("{}", ErrorCode::INVALID_MODULE), "E904");
    }

    #[test]
    fn test_error_display() {
        let err = AsclError::new("token.ascl", ErrorCode::UNDEFINED_ID, "undefined `bal`", pos());
        assert_eq!(err.to_string(), "token.ascl:12:5: E300 [semantic] undefined `bal`");
    }

    #[test]
    fn test_compile_errors_max_limit() {
        let mut errs = CompileErrors::empty();
        for i in 0..25 {
            errs.push(AsclError::new(
                "test.ascl",
                ErrorCode::UNEXPECTED_TOKEN,
                format!("Error {i}"),
                SrcPos::point(FileId(0), i + 1, 1),
            ));
        }
        // Only 20 stored, but total count is 25
        assert_eq!(errs.errors.len(), 20);
        assert_eq!(errs.total_errors, 25);
        assert!(errs.has_errors());
    }

    #[test]
    fn test_warnings_do_not_count_as_errors() {
        let mut errs = CompileErrors::empty();
        errs.push(
            AsclError::new("test.ascl", ErrorCode::TYPE_MISMATCH, "narrowing", pos()).warning(),
        );
        assert!(!errs.has_errors());
        assert_eq!(errs.total_warnings, 1);
    }

    #[test]
    fn test_compile_errors_json_output() {
        let mut errs = CompileErrors::empty();
        errs.push(AsclError::new("test.ascl", ErrorCode::TYPE_MISMATCH, "Type mismatch", pos()));

        let json = serde_json::to_string(&errs).unwrap();
        assert!(json.contains("\"total_errors\":1"));
        assert!(json.contains("\"total_warnings\":0"));
        assert!(json.contains("\"category\":\"type\""));
    }
}
