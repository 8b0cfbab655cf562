//! Declarations resolved by the semantic checker.
//!
//! Expressions refer to declarations through an [`IdRef`] key instead of a
//! borrowed pointer, so the expression tree has no lifetime tied to the table.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::meta::Meta;
use crate::SrcPos;

/// Key of a declaration in a [`SymbolTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdRef(pub u32);

/// A declared identifier: variable, constant, field or function.
#[derive(Debug, Clone, PartialEq)]
pub struct IdDecl {
    pub name: String,
    pub is_const: bool,
    pub meta: Rc<Meta>,
    pub pos: SrcPos,
}

impl IdDecl {
    pub fn new(name: impl Into<String>, meta: Meta, pos: SrcPos) -> Self {
        Self {
            name: name.into(),
            is_const: false,
            meta: Rc::new(meta),
            pos,
        }
    }

    /// Mark the declaration as `const`.
    pub fn constant(mut self) -> Self {
        self.is_const = true;
        self
    }
}

/// Declarations in resolution order. An [`IdRef`] is an index into it.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    decls: Vec<IdDecl>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a declaration and return its key.
    pub fn declare(&mut self, decl: IdDecl) -> IdRef {
        let id = IdRef(self.decls.len() as u32);
        self.decls.push(decl);
        id
    }

    pub fn get(&self, id: IdRef) -> Option<&IdDecl> {
        self.decls.get(id.0 as usize)
    }

    /// Whether `id` names a constant. Unknown keys are not constant.
    pub fn is_const(&self, id: IdRef) -> bool {
        self.get(id).is_some_and(|d| d.is_const)
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }
}
