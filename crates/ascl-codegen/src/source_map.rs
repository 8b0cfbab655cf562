//! Source mapping: WASM function index → ASCL source position.
//!
//! Each entry maps a compiled WASM function to the position of the
//! declaration it was generated from, so a trap inside the module can be
//! attributed to contract source. Emitted as a custom section when debug
//! info is on. Granularity is per-function.

use ascl_types::SrcPos;
use serde::{Deserialize, Serialize};

/// A complete source map for a compiled module.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceMap {
    pub entries: Vec<SourceMapEntry>,
}

/// A single source map entry: one WASM function → one source position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMapEntry {
    /// Absolute WASM function index (imports + stubs + functions).
    pub wasm_func_index: u32,
    pub func_name: String,
    pub kind: FuncKind,
    pub pos: SrcPos,
}

/// Classification of a compiled function for the host.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FuncKind {
    /// Forwarding stub for an external interface.
    AbiStub,
    /// A contract function.
    Function,
}

impl SourceMap {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Push a new entry.
    pub fn push(
        &mut self,
        wasm_func_index: u32,
        func_name: impl Into<String>,
        kind: FuncKind,
        pos: SrcPos,
    ) {
        self.entries.push(SourceMapEntry {
            wasm_func_index,
            func_name: func_name.into(),
            kind,
            pos,
        });
    }

    /// Look up the entry whose WASM function index matches.
    pub fn find_by_func_index(&self, idx: u32) -> Option<&SourceMapEntry> {
        self.entries.iter().find(|e| e.wasm_func_index == idx)
    }

    /// Serialize to JSON bytes for embedding in a WASM custom section.
    pub fn to_json(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Deserialize from JSON bytes.
    pub fn from_json(data: &[u8]) -> Option<Self> {
        serde_json::from_slice(data).ok()
    }
}
