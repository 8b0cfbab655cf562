//! Expression nodes for the ASCL language.
//!
//! Every node carries a [`SrcPos`] plus the two results of semantic
//! checking: the resolved identifier and the inferred [`Meta`]. Both are
//! `None` until the checker runs. Children are owned exclusively by their
//! parent, so an expression is always a strict tree.
//!
//! `Clone` is a deep copy of the tree. The semantic annotations are shared
//! with the original rather than copied: `id` is a plain key and `meta` is
//! reference counted.

use std::fmt;
use std::rc::Rc;

use crate::meta::{Meta, TypeKind};
use crate::symtab::{IdRef, SymbolTable};
use crate::SrcPos;

// ══════════════════════════════════════════════════════════════════════════════
// Expressions
// ══════════════════════════════════════════════════════════════════════════════

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: SrcPos,
    /// Declaration this expression refers to, set by the semantic checker.
    pub id: Option<IdRef>,
    /// Inferred type/shape, set by the semantic checker.
    pub meta: Option<Rc<Meta>>,
}

/// The kind of expression, with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// `null`
    Null,
    /// `true`, `1`, `1.0`, `0x1`, `"..."`
    Lit(Value),
    /// `name`
    Ref { name: String },
    /// `base[index]`
    Array { base: Box<Expr>, index: Box<Expr> },
    /// `(type)value`
    Cast { to: TypeKind, value: Box<Expr> },
    /// `callee(args, ...)`
    Call { callee: Box<Expr>, args: Vec<Expr> },
    /// `base.field`
    Access { base: Box<Expr>, field: Box<Expr> },
    /// `-x`, `!x`, `x++`, ...
    Unary { op: OpKind, operand: Box<Expr> },
    /// `l op r`
    Binary {
        op: OpKind,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `cond ? then : els`
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        els: Box<Expr>,
    },
    /// Embedded DML or query; the text is passed through untouched.
    Sql { kind: SqlKind, sql: String },
    /// `(exp, exp, ...)`
    Tuple(Vec<Expr>),
    /// `new {exp, exp, ...}`
    Init(Vec<Expr>),
}

/// A literal scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::UInt(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
        }
    }
}

// ── Operators ─────────────────────────────────────────────────────────────────

/// Unary and binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    Shl,
    Shr,
    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    // Logical
    And,
    Or,
    Not,
    // Unary arithmetic
    Neg,
    Inc,
    Dec,
}

impl OpKind {
    /// Returns the operator symbol for dumps and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Add => "+",
            OpKind::Sub => "-",
            OpKind::Mul => "*",
            OpKind::Div => "/",
            OpKind::Mod => "%",
            OpKind::BitAnd => "&",
            OpKind::BitOr => "|",
            OpKind::BitXor => "^",
            OpKind::BitNot => "~",
            OpKind::Shl => "<<",
            OpKind::Shr => ">>",
            OpKind::Eq => "==",
            OpKind::Ne => "!=",
            OpKind::Lt => "<",
            OpKind::Gt => ">",
            OpKind::Le => "<=",
            OpKind::Ge => ">=",
            OpKind::And => "&&",
            OpKind::Or => "||",
            OpKind::Not => "!",
            OpKind::Neg => "-",
            OpKind::Inc => "++",
            OpKind::Dec => "--",
        }
    }
}

/// Kind of an embedded SQL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlKind {
    Query,
    Insert,
    Update,
    Delete,
    Replace,
    Ddl,
}

impl SqlKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlKind::Query => "query",
            SqlKind::Insert => "insert",
            SqlKind::Update => "update",
            SqlKind::Delete => "delete",
            SqlKind::Replace => "replace",
            SqlKind::Ddl => "ddl",
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Construction
// ══════════════════════════════════════════════════════════════════════════════

impl Expr {
    /// Create an unannotated node. The typed constructors below are the
    /// usual entry points.
    pub fn new(kind: ExprKind, pos: SrcPos) -> Self {
        Self {
            kind,
            pos,
            id: None,
            meta: None,
        }
    }

    pub fn null(pos: SrcPos) -> Self {
        Self::new(ExprKind::Null, pos)
    }

    pub fn lit(value: Value, pos: SrcPos) -> Self {
        Self::new(ExprKind::Lit(value), pos)
    }

    pub fn reference(name: impl Into<String>, pos: SrcPos) -> Self {
        Self::new(ExprKind::Ref { name: name.into() }, pos)
    }

    pub fn array(base: Expr, index: Expr, pos: SrcPos) -> Self {
        Self::new(
            ExprKind::Array {
                base: Box::new(base),
                index: Box::new(index),
            },
            pos,
        )
    }

    pub fn cast(to: TypeKind, value: Expr, pos: SrcPos) -> Self {
        Self::new(
            ExprKind::Cast {
                to,
                value: Box::new(value),
            },
            pos,
        )
    }

    pub fn call(callee: Expr, args: Vec<Expr>, pos: SrcPos) -> Self {
        Self::new(
            ExprKind::Call {
                callee: Box::new(callee),
                args,
            },
            pos,
        )
    }

    pub fn access(base: Expr, field: Expr, pos: SrcPos) -> Self {
        Self::new(
            ExprKind::Access {
                base: Box::new(base),
                field: Box::new(field),
            },
            pos,
        )
    }

    pub fn unary(op: OpKind, operand: Expr, pos: SrcPos) -> Self {
        Self::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            pos,
        )
    }

    pub fn binary(op: OpKind, left: Expr, right: Expr, pos: SrcPos) -> Self {
        Self::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            pos,
        )
    }

    pub fn ternary(cond: Expr, then: Expr, els: Expr, pos: SrcPos) -> Self {
        Self::new(
            ExprKind::Ternary {
                cond: Box::new(cond),
                then: Box::new(then),
                els: Box::new(els),
            },
            pos,
        )
    }

    pub fn sql(kind: SqlKind, sql: impl Into<String>, pos: SrcPos) -> Self {
        Self::new(
            ExprKind::Sql {
                kind,
                sql: sql.into(),
            },
            pos,
        )
    }

    pub fn tuple(elems: Vec<Expr>, pos: SrcPos) -> Self {
        Self::new(ExprKind::Tuple(elems), pos)
    }

    pub fn init(elems: Vec<Expr>, pos: SrcPos) -> Self {
        Self::new(ExprKind::Init(elems), pos)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Semantic annotations
// ══════════════════════════════════════════════════════════════════════════════

impl Expr {
    /// Bind this node to a declaration.
    pub fn set_id(&mut self, id: IdRef) {
        self.id = Some(id);
    }

    /// Attach inferred shape information.
    pub fn set_meta(&mut self, meta: Rc<Meta>) {
        self.meta = Some(meta);
    }

    /// Builder form of [`Expr::set_id`].
    pub fn with_id(mut self, id: IdRef) -> Self {
        self.set_id(id);
        self
    }

    /// Builder form of [`Expr::set_meta`].
    pub fn with_meta(mut self, meta: Rc<Meta>) -> Self {
        self.set_meta(meta);
        self
    }

    pub fn meta(&self) -> Option<&Meta> {
        self.meta.as_deref()
    }

    /// Whether the node can be assigned to.
    ///
    /// Requires a resolved, non-constant declaration and a location-shaped
    /// kind (`Ref`, `Array` or `Access`). A key missing from `symtab` is
    /// treated as unresolved.
    pub fn is_usable_lval(&self, symtab: &SymbolTable) -> bool {
        let Some(id) = self.id else {
            return false;
        };
        let Some(decl) = symtab.get(id) else {
            return false;
        };
        !decl.is_const
            && matches!(
                self.kind,
                ExprKind::Ref { .. } | ExprKind::Array { .. } | ExprKind::Access { .. }
            )
    }

    /// Short kind name used by dumps and error messages.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ExprKind::Null => "null",
            ExprKind::Lit(_) => "lit",
            ExprKind::Ref { .. } => "ref",
            ExprKind::Array { .. } => "array",
            ExprKind::Cast { .. } => "cast",
            ExprKind::Call { .. } => "call",
            ExprKind::Access { .. } => "access",
            ExprKind::Unary { .. } => "unary",
            ExprKind::Binary { .. } => "binary",
            ExprKind::Ternary { .. } => "ternary",
            ExprKind::Sql { .. } => "sql",
            ExprKind::Tuple(_) => "tuple",
            ExprKind::Init(_) => "init",
        }
    }

    /// Direct children in source order.
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Null | ExprKind::Lit(_) | ExprKind::Ref { .. } | ExprKind::Sql { .. } => {
                Vec::new()
            }
            ExprKind::Array { base, index } => vec![base.as_ref(), index.as_ref()],
            ExprKind::Cast { value, .. } => vec![value.as_ref()],
            ExprKind::Call { callee, args } => {
                std::iter::once(callee.as_ref()).chain(args.iter()).collect()
            }
            ExprKind::Access { base, field } => vec![base.as_ref(), field.as_ref()],
            ExprKind::Unary { operand, .. } => vec![operand.as_ref()],
            ExprKind::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            ExprKind::Ternary { cond, then, els } => {
                vec![cond.as_ref(), then.as_ref(), els.as_ref()]
            }
            ExprKind::Tuple(elems) | ExprKind::Init(elems) => elems.iter().collect(),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Dump
// ══════════════════════════════════════════════════════════════════════════════

impl Expr {
    /// Render the tree, one node per line, indented two spaces per depth.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(&mut out, 0);
        out
    }

    fn dump_into(&self, out: &mut String, depth: usize) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(self.kind_name());

        match &self.kind {
            ExprKind::Lit(v) => out.push_str(&format!(" {v}")),
            ExprKind::Ref { name } => out.push_str(&format!(" `{name}`")),
            ExprKind::Cast { to, .. } => out.push_str(&format!(" to {to}")),
            ExprKind::Unary { op, .. } | ExprKind::Binary { op, .. } => {
                out.push_str(&format!(" ({})", op.as_str()))
            }
            ExprKind::Sql { kind, sql } => out.push_str(&format!(" {} {sql:?}", kind.as_str())),
            _ => {}
        }

        out.push_str(&format!(" @{}", self.pos));
        if let Some(id) = self.id {
            out.push_str(&format!(" id=#{}", id.0));
        }
        if let Some(meta) = &self.meta {
            out.push_str(&format!(" meta={meta}"));
        }
        out.push('\n');

        for child in self.children() {
            child.dump_into(out, depth + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symtab::IdDecl;
    use crate::FileId;

    fn pos(line: u32, col: u32) -> SrcPos {
        SrcPos::point(FileId(0), line, col)
    }

    #[test]
    fn constructors_leave_annotations_empty() {
        let e = Expr::binary(
            OpKind::Add,
            Expr::reference("a", pos(1, 1)),
            Expr::lit(Value::Int(1), pos(1, 5)),
            pos(1, 1),
        );
        assert!(e.id.is_none());
        assert!(e.meta.is_none());
        assert_eq!(e.kind_name(), "binary");
        assert_eq!(e.children().len(), 2);
    }

    #[test]
    fn call_children_start_with_callee() {
        let e = Expr::call(
            Expr::reference("f", pos(1, 1)),
            vec![Expr::null(pos(1, 3)), Expr::lit(Value::Bool(true), pos(1, 9))],
            pos(1, 1),
        );
        let kinds: Vec<_> = e.children().iter().map(|c| c.kind_name()).collect();
        assert_eq!(kinds, vec!["ref", "null", "lit"]);
    }

    #[test]
    fn lval_requires_mutable_binding() {
        let mut tab = SymbolTable::new();
        let var = tab.declare(IdDecl::new("x", Meta::new(TypeKind::Int32), pos(1, 1)));
        let cst = tab.declare(IdDecl::new("K", Meta::new(TypeKind::Int32), pos(2, 1)).constant());

        assert!(Expr::reference("x", pos(3, 1)).with_id(var).is_usable_lval(&tab));
        assert!(!Expr::reference("K", pos(3, 1)).with_id(cst).is_usable_lval(&tab));
        assert!(!Expr::reference("x", pos(3, 1)).is_usable_lval(&tab));
        assert!(!Expr::reference("y", pos(3, 1))
            .with_id(IdRef(42))
            .is_usable_lval(&tab));
    }

    #[test]
    fn dump_indents_by_depth() {
        let meta = Rc::new(Meta::new(TypeKind::Int32));
        let e = Expr::binary(
            OpKind::Mul,
            Expr::reference("a", pos(1, 1)).with_id(IdRef(0)),
            Expr::lit(Value::Int(7), pos(1, 5)),
            pos(1, 1),
        )
        .with_meta(meta);

        let text = e.dump();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "binary (*) @1:1 meta=int32");
        assert_eq!(lines[1], "  ref `a` @1:1 id=#0");
        assert_eq!(lines[2], "  lit 7 @1:5");
    }

    #[test]
    fn dump_does_not_touch_tree() {
        let e = Expr::sql(SqlKind::Query, "select * from t", pos(4, 2));
        let before = e.clone();
        let text = e.dump();
        assert_eq!(text, "sql query \"select * from t\" @4:2\n");
        assert_eq!(e, before);
    }
}
