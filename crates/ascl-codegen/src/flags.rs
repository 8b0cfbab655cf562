//! Compiler flags consumed by the code generator.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::CodegenResult;

/// Options for one [`generate`](crate::generate) run.
///
/// Missing JSON fields take their default values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Flags {
    /// Optimization level. Recorded only; no optimizer runs.
    pub opt_lvl: u8,
    /// Output file. Overrides the path derived from the input file.
    pub outfile: Option<PathBuf>,
    /// Print the textual module to stdout before validation.
    pub dump_wat: bool,
    /// Validate only; nothing is serialized or written.
    pub test: bool,
    /// Debug build of the contract.
    pub debug: bool,
    pub verbose: bool,
}

impl Flags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse flags from a JSON object.
    pub fn from_json(json: &str) -> CodegenResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
