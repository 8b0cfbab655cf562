use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a source file in the compilation unit's file list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(pub u32);

/// Source position of a node.
///
/// All line/column values are 1-based for human-readable error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SrcPos {
    pub file: FileId,
    pub first_line: u32,
    pub first_col: u32,
    pub last_line: u32,
    pub last_col: u32,
}

impl SrcPos {
    /// Create a new position range.
    pub fn new(
        file: FileId,
        first_line: u32,
        first_col: u32,
        last_line: u32,
        last_col: u32,
    ) -> Self {
        Self {
            file,
            first_line,
            first_col,
            last_line,
            last_col,
        }
    }

    /// Create a zero-width position at a single line/column.
    pub fn point(file: FileId, line: u32, col: u32) -> Self {
        Self::new(file, line, col, line, col)
    }
}

impl Default for SrcPos {
    fn default() -> Self {
        Self::point(FileId::default(), 1, 1)
    }
}

impl fmt::Display for SrcPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.first_line, self.first_col)
    }
}
