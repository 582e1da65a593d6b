//! Typed imperative statement trees.
//!
//! This is the artifact the lowering pipeline produces for each function:
//! a loop/if/block/store tree over typed expressions, ready to be handed to
//! a native-code backend. Loop nodes keep the init/cond/inc shape the AST
//! machine produces instead of a min/extent pair.

use crate::expr::Expr;
use std::fmt;

/// How a lowered loop should be executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopKind {
    Serial,
    Parallel,
    Vector,
    Unrolled,
}

/// A typed statement.
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    /// Binds a scalar value for the duration of `body`.
    Let {
        name: String,
        value: Expr,
        body: Box<Stmt>,
    },

    /// Writes `value` into `buffer` at `indices`.
    Store {
        buffer: String,
        indices: Vec<Expr>,
        value: Expr,
    },

    For {
        iterator: String,
        init: Expr,
        cond: Expr,
        inc: Expr,
        kind: LoopKind,
        body: Box<Stmt>,
    },

    If {
        cond: Expr,
        then_case: Box<Stmt>,
        else_case: Option<Box<Stmt>>,
    },

    /// Sequential composition.
    Block(Vec<Stmt>),
}

impl Stmt {
    /// Depth of the outermost perfect loop nest, counting only `For` nodes
    /// on the leftmost spine.
    pub fn loop_depth(&self) -> usize {
        match self {
            Stmt::For { body, .. } => 1 + body.loop_depth(),
            Stmt::If { then_case, .. } => then_case.loop_depth(),
            Stmt::Block(children) => children.first().map_or(0, Stmt::loop_depth),
            Stmt::Let { body, .. } => body.loop_depth(),
            _ => 0,
        }
    }

    /// Loop kinds along the leftmost spine, outermost first.
    pub fn loop_kinds(&self) -> Vec<LoopKind> {
        let mut kinds = Vec::new();
        let mut cur = self;
        loop {
            match cur {
                Stmt::For { kind, body, .. } => {
                    kinds.push(*kind);
                    cur = body;
                }
                Stmt::If { then_case, .. } => cur = then_case,
                Stmt::Let { body, .. } => cur = body,
                Stmt::Block(children) => match children.first() {
                    Some(first) => cur = first,
                    None => break,
                },
                _ => break,
            }
        }
        kinds
    }

    /// Every store statement in the tree, in emission order.
    pub fn stores(&self) -> Vec<&Stmt> {
        let mut out = Vec::new();
        self.collect_stores(&mut out);
        out
    }

    fn collect_stores<'a>(&'a self, out: &mut Vec<&'a Stmt>) {
        match self {
            Stmt::Store { .. } => out.push(self),
            Stmt::For { body, .. } | Stmt::Let { body, .. } => body.collect_stores(out),
            Stmt::If {
                then_case,
                else_case,
                ..
            } => {
                then_case.collect_stores(out);
                if let Some(e) = else_case {
                    e.collect_stores(out);
                }
            }
            Stmt::Block(children) => {
                for c in children {
                    c.collect_stores(out);
                }
            }
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.pretty(f, 0)
    }
}

impl Stmt {
    fn pretty(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pad = "  ".repeat(indent);
        match self {
            Stmt::Let { name, value, body } => {
                writeln!(f, "{}let {} = {};", pad, name, value)?;
                body.pretty(f, indent)
            }
            Stmt::Store {
                buffer,
                indices,
                value,
            } => {
                write!(f, "{}{}[", pad, buffer)?;
                for (i, idx) in indices.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", idx)?;
                }
                writeln!(f, "] = {};", value)
            }
            Stmt::For {
                iterator,
                init,
                cond,
                inc,
                kind,
                body,
            } => {
                let tag = match kind {
                    LoopKind::Serial => "",
                    LoopKind::Parallel => " // parallel",
                    LoopKind::Vector => " // vector",
                    LoopKind::Unrolled => " // unrolled",
                };
                writeln!(
                    f,
                    "{}for ({} = {}; {}; {} += {}) {{{}",
                    pad, iterator, init, cond, iterator, inc, tag
                )?;
                body.pretty(f, indent + 1)?;
                writeln!(f, "{}}}", pad)
            }
            Stmt::If {
                cond,
                then_case,
                else_case,
            } => {
                writeln!(f, "{}if ({}) {{", pad, cond)?;
                then_case.pretty(f, indent + 1)?;
                if let Some(e) = else_case {
                    writeln!(f, "{}}} else {{", pad)?;
                    e.pretty(f, indent + 1)?;
                }
                writeln!(f, "{}}}", pad)
            }
            Stmt::Block(children) => {
                for c in children {
                    c.pretty(f, indent)?;
                }
                Ok(())
            }
        }
    }
}
