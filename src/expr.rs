//! Symbolic expression trees.
//!
//! Expressions are the values computed at each point of an iteration
//! domain. They are build-only: once constructed a tree is never mutated,
//! so trees can be shared freely between computations. Rewrites (iterator
//! substitution, constant folding) always return a structurally new tree.
//!
//! An [`Expr::Access`] leaf may name either a buffer or another computation;
//! the distinction is resolved during statement emission, where computation
//! references are lowered through the target's access relation.

use std::collections::HashMap;
use std::fmt;

/// Element type carried by every expression node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
}

impl ElementType {
    /// Size of one element in bytes.
    pub const fn size_bytes(self) -> usize {
        match self {
            ElementType::Bool | ElementType::Int8 | ElementType::UInt8 => 1,
            ElementType::Int16 | ElementType::UInt16 => 2,
            ElementType::Int32 | ElementType::UInt32 | ElementType::Float32 => 4,
            ElementType::Int64 | ElementType::UInt64 | ElementType::Float64 => 8,
        }
    }

    pub const fn is_integer(self) -> bool {
        !matches!(
            self,
            ElementType::Float32 | ElementType::Float64 | ElementType::Bool
        )
    }
}

/// A typed scalar constant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
}

impl Literal {
    pub fn ty(&self) -> ElementType {
        match self {
            Literal::Bool(_) => ElementType::Bool,
            Literal::Int8(_) => ElementType::Int8,
            Literal::Int16(_) => ElementType::Int16,
            Literal::Int32(_) => ElementType::Int32,
            Literal::Int64(_) => ElementType::Int64,
            Literal::UInt8(_) => ElementType::UInt8,
            Literal::UInt16(_) => ElementType::UInt16,
            Literal::UInt32(_) => ElementType::UInt32,
            Literal::UInt64(_) => ElementType::UInt64,
            Literal::Float32(_) => ElementType::Float32,
            Literal::Float64(_) => ElementType::Float64,
        }
    }

    /// The value as a signed 64-bit integer, when it fits without loss.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Literal::Int8(v) => Some(v as i64),
            Literal::Int16(v) => Some(v as i64),
            Literal::Int32(v) => Some(v as i64),
            Literal::Int64(v) => Some(v),
            Literal::UInt8(v) => Some(v as i64),
            Literal::UInt16(v) => Some(v as i64),
            Literal::UInt32(v) => Some(v as i64),
            Literal::UInt64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    fn from_i64(ty: ElementType, v: i64) -> Option<Literal> {
        match ty {
            ElementType::Int8 => i8::try_from(v).ok().map(Literal::Int8),
            ElementType::Int16 => i16::try_from(v).ok().map(Literal::Int16),
            ElementType::Int32 => i32::try_from(v).ok().map(Literal::Int32),
            ElementType::Int64 => Some(Literal::Int64(v)),
            ElementType::UInt8 => u8::try_from(v).ok().map(Literal::UInt8),
            ElementType::UInt16 => u16::try_from(v).ok().map(Literal::UInt16),
            ElementType::UInt32 => u32::try_from(v).ok().map(Literal::UInt32),
            ElementType::UInt64 => u64::try_from(v).ok().map(Literal::UInt64),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Min,
    Max,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
}

/// A symbolic expression node. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Const(Literal),
    Var {
        name: String,
        ty: ElementType,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Cmp {
        op: CmpOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Cast {
        ty: ElementType,
        value: Box<Expr>,
    },
    Select {
        cond: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },
    /// Indexed access into a buffer or another computation.
    Access {
        name: String,
        indices: Vec<Expr>,
        ty: ElementType,
    },
}

impl Expr {
    pub fn int32(v: i32) -> Expr {
        Expr::Const(Literal::Int32(v))
    }

    pub fn uint8(v: u8) -> Expr {
        Expr::Const(Literal::UInt8(v))
    }

    pub fn float32(v: f32) -> Expr {
        Expr::Const(Literal::Float32(v))
    }

    pub fn var(name: &str, ty: ElementType) -> Expr {
        Expr::Var {
            name: name.to_owned(),
            ty,
        }
    }

    /// An iterator reference. Iterators are 32-bit signed, matching the
    /// integer expressions produced by the AST machine.
    pub fn iter(name: &str) -> Expr {
        Expr::var(name, ElementType::Int32)
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn add(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Add, lhs, rhs)
    }

    pub fn sub(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Sub, lhs, rhs)
    }

    pub fn mul(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Mul, lhs, rhs)
    }

    pub fn neg(operand: Expr) -> Expr {
        Expr::Unary {
            op: UnOp::Neg,
            operand: Box::new(operand),
        }
    }

    pub fn cmp(op: CmpOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Cmp {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn cast(ty: ElementType, value: Expr) -> Expr {
        Expr::Cast {
            ty,
            value: Box::new(value),
        }
    }

    pub fn select(cond: Expr, if_true: Expr, if_false: Expr) -> Expr {
        Expr::Select {
            cond: Box::new(cond),
            if_true: Box::new(if_true),
            if_false: Box::new(if_false),
        }
    }

    pub fn access(name: &str, indices: Vec<Expr>, ty: ElementType) -> Expr {
        Expr::Access {
            name: name.to_owned(),
            indices,
            ty,
        }
    }

    /// The element type of the value this node evaluates to.
    pub fn ty(&self) -> ElementType {
        match self {
            Expr::Const(l) => l.ty(),
            Expr::Var { ty, .. } => *ty,
            Expr::Binary { lhs, .. } => lhs.ty(),
            Expr::Unary { operand, .. } => operand.ty(),
            Expr::Cmp { .. } | Expr::Logical { .. } => ElementType::Bool,
            Expr::Cast { ty, .. } => *ty,
            Expr::Select { if_true, .. } => if_true.ty(),
            Expr::Access { ty, .. } => *ty,
        }
    }

    /// Pre-order traversal over every node of the tree, including access
    /// index expressions.
    pub fn visit(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Const(_) | Expr::Var { .. } => {}
            Expr::Binary { lhs, rhs, .. }
            | Expr::Cmp { lhs, rhs, .. }
            | Expr::Logical { lhs, rhs, .. } => {
                lhs.visit(f);
                rhs.visit(f);
            }
            Expr::Unary { operand, .. } => operand.visit(f),
            Expr::Cast { value, .. } => value.visit(f),
            Expr::Select {
                cond,
                if_true,
                if_false,
            } => {
                cond.visit(f);
                if_true.visit(f);
                if_false.visit(f);
            }
            Expr::Access { indices, .. } => {
                for idx in indices {
                    idx.visit(f);
                }
            }
        }
    }

    /// Returns a structurally new tree with every variable whose name
    /// appears in `mapping` replaced by the mapped expression. Constant
    /// integer sub-trees are folded afterwards when the fold cannot
    /// overflow or change the element type.
    pub fn substitute(&self, mapping: &HashMap<String, Expr>) -> Expr {
        let out = match self {
            Expr::Const(_) => self.clone(),
            Expr::Var { name, .. } => match mapping.get(name) {
                Some(replacement) => replacement.clone(),
                None => self.clone(),
            },
            Expr::Binary { op, lhs, rhs } => {
                Expr::binary(*op, lhs.substitute(mapping), rhs.substitute(mapping))
            }
            Expr::Unary { op, operand } => Expr::Unary {
                op: *op,
                operand: Box::new(operand.substitute(mapping)),
            },
            Expr::Cmp { op, lhs, rhs } => {
                Expr::cmp(*op, lhs.substitute(mapping), rhs.substitute(mapping))
            }
            Expr::Logical { op, lhs, rhs } => Expr::Logical {
                op: *op,
                lhs: Box::new(lhs.substitute(mapping)),
                rhs: Box::new(rhs.substitute(mapping)),
            },
            Expr::Cast { ty, value } => Expr::cast(*ty, value.substitute(mapping)),
            Expr::Select {
                cond,
                if_true,
                if_false,
            } => Expr::select(
                cond.substitute(mapping),
                if_true.substitute(mapping),
                if_false.substitute(mapping),
            ),
            Expr::Access { name, indices, ty } => Expr::Access {
                name: name.clone(),
                indices: indices.iter().map(|i| i.substitute(mapping)).collect(),
                ty: *ty,
            },
        };
        out.fold()
    }

    /// Folds constant integer arithmetic. Folding is skipped whenever the
    /// operation would overflow the node's element type, so the fold never
    /// widens.
    pub fn fold(&self) -> Expr {
        match self {
            Expr::Binary { op, lhs, rhs } => {
                let lhs = lhs.fold();
                let rhs = rhs.fold();
                if let (Expr::Const(a), Expr::Const(b)) = (&lhs, &rhs) {
                    if a.ty() == b.ty() && a.ty().is_integer() {
                        if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
                            let folded = match op {
                                BinOp::Add => x.checked_add(y),
                                BinOp::Sub => x.checked_sub(y),
                                BinOp::Mul => x.checked_mul(y),
                                BinOp::Div if y != 0 => Some(x.div_euclid(y)),
                                BinOp::Mod if y != 0 => Some(x.rem_euclid(y)),
                                BinOp::Min => Some(x.min(y)),
                                BinOp::Max => Some(x.max(y)),
                                _ => None,
                            };
                            if let Some(v) = folded.and_then(|v| Literal::from_i64(a.ty(), v)) {
                                return Expr::Const(v);
                            }
                        }
                    }
                }
                Expr::binary(*op, lhs, rhs)
            }
            Expr::Unary { op, operand } => {
                let operand = operand.fold();
                if let (UnOp::Neg, Expr::Const(a)) = (op, &operand) {
                    if a.ty().is_integer() {
                        if let Some(v) = a
                            .as_i64()
                            .and_then(|v| v.checked_neg())
                            .and_then(|v| Literal::from_i64(a.ty(), v))
                        {
                            return Expr::Const(v);
                        }
                    }
                }
                Expr::Unary {
                    op: *op,
                    operand: Box::new(operand),
                }
            }
            Expr::Cmp { op, lhs, rhs } => {
                let lhs = lhs.fold();
                let rhs = rhs.fold();
                if let (Expr::Const(a), Expr::Const(b)) = (&lhs, &rhs) {
                    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
                        let v = match op {
                            CmpOp::Eq => x == y,
                            CmpOp::Ne => x != y,
                            CmpOp::Lt => x < y,
                            CmpOp::Le => x <= y,
                            CmpOp::Gt => x > y,
                            CmpOp::Ge => x >= y,
                        };
                        return Expr::Const(Literal::Bool(v));
                    }
                }
                Expr::cmp(*op, lhs, rhs)
            }
            _ => self.clone(),
        }
    }

    /// All free variable names, in first-occurrence order.
    pub fn free_vars(&self) -> Vec<String> {
        let mut seen = Vec::new();
        self.visit(&mut |e| {
            if let Expr::Var { name, .. } = e {
                if !seen.iter().any(|n| n == name) {
                    seen.push(name.clone());
                }
            }
        });
        seen
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(l) => match l {
                Literal::Bool(v) => write!(f, "{}", v),
                Literal::Int8(v) => write!(f, "{}", v),
                Literal::Int16(v) => write!(f, "{}", v),
                Literal::Int32(v) => write!(f, "{}", v),
                Literal::Int64(v) => write!(f, "{}", v),
                Literal::UInt8(v) => write!(f, "{}", v),
                Literal::UInt16(v) => write!(f, "{}", v),
                Literal::UInt32(v) => write!(f, "{}", v),
                Literal::UInt64(v) => write!(f, "{}", v),
                Literal::Float32(v) => write!(f, "{}", v),
                Literal::Float64(v) => write!(f, "{}", v),
            },
            Expr::Var { name, .. } => write!(f, "{}", name),
            Expr::Binary { op, lhs, rhs } => {
                let sym = match op {
                    BinOp::Add => "+",
                    BinOp::Sub => "-",
                    BinOp::Mul => "*",
                    BinOp::Div => "/",
                    BinOp::Mod => "%",
                    BinOp::Min => return write!(f, "min({}, {})", lhs, rhs),
                    BinOp::Max => return write!(f, "max({}, {})", lhs, rhs),
                };
                write!(f, "({} {} {})", lhs, sym, rhs)
            }
            Expr::Unary { op, operand } => match op {
                UnOp::Neg => write!(f, "(-{})", operand),
                UnOp::Not => write!(f, "(!{})", operand),
            },
            Expr::Cmp { op, lhs, rhs } => {
                let sym = match op {
                    CmpOp::Eq => "==",
                    CmpOp::Ne => "!=",
                    CmpOp::Lt => "<",
                    CmpOp::Le => "<=",
                    CmpOp::Gt => ">",
                    CmpOp::Ge => ">=",
                };
                write!(f, "({} {} {})", lhs, sym, rhs)
            }
            Expr::Logical { op, lhs, rhs } => {
                let sym = match op {
                    LogicalOp::And => "&&",
                    LogicalOp::Or => "||",
                };
                write!(f, "({} {} {})", lhs, sym, rhs)
            }
            Expr::Cast { ty, value } => write!(f, "({:?}){}", ty, value),
            Expr::Select {
                cond,
                if_true,
                if_false,
            } => write!(f, "({} ? {} : {})", cond, if_true, if_false),
            Expr::Access { name, indices, .. } => {
                write!(f, "{}[", name)?;
                for (i, idx) in indices.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", idx)?;
                }
                write!(f, "]")
            }
        }
    }
}
