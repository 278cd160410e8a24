use std::fmt;
use std::sync::Arc;

use crate::error::Span;
use crate::object_model::{Indexer, Member, Method};
use crate::value::{Type, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    /// Logical not on `bool`, bitwise complement on `int`.
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Negate => "-",
            Self::Not => "!",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    LogicalOr,
    LogicalAnd,
    BitOr,
    BitXor,
    BitAnd,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    ShiftLeft,
    ShiftRight,
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::LogicalOr => "||",
            Self::LogicalAnd => "&&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::BitAnd => "&",
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::ShiftLeft => "<<",
            Self::ShiftRight => ">>",
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
        }
    }
}

/// What a member, method or indexer is applied to.
#[derive(Clone, Debug)]
pub enum Receiver {
    /// The context object bound to the parser.
    Context,
    /// A registered type; the accessor is static.
    Static(Arc<str>),
    Value(Box<Expr>),
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    Literal(Value),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Member {
        receiver: Receiver,
        member: Arc<Member>,
    },
    Call {
        receiver: Receiver,
        method: Arc<Method>,
        args: Vec<Expr>,
    },
    Index {
        receiver: Receiver,
        indexer: Arc<Indexer>,
        args: Vec<Expr>,
    },
}

/// A bound expression node.
///
/// Every node carries its declared result type and the span of formula text it was built from.
/// Children are owned exclusively by their parent and never change after construction.
#[derive(Clone, Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
    pub span: Span,
}

impl Expr {
    pub(crate) fn literal(value: Value, span: Span) -> Self {
        Self {
            ty: value.ty(),
            kind: ExprKind::Literal(value),
            span,
        }
    }

    /// Span of the first node found more than `limit` levels below the root, if any.
    ///
    /// Walks with an explicit stack, so it is safe on trees too deep for the recursive passes.
    pub(crate) fn first_deeper_than(&self, limit: usize) -> Option<Span> {
        let mut stack: Vec<(&Expr, usize)> = vec![(self, 1)];
        while let Some((expr, level)) = stack.pop() {
            if level > limit {
                return Some(expr.span);
            }
            let receiver = match &expr.kind {
                ExprKind::Literal(_) => None,
                ExprKind::Unary { operand, .. } => {
                    stack.push((operand.as_ref(), level + 1));
                    None
                }
                ExprKind::Binary { left, right, .. } => {
                    stack.push((right.as_ref(), level + 1));
                    stack.push((left.as_ref(), level + 1));
                    None
                }
                ExprKind::Member { receiver, .. } => Some(receiver),
                ExprKind::Call { receiver, args, .. } | ExprKind::Index { receiver, args, .. } => {
                    stack.extend(args.iter().rev().map(|arg| (arg, level + 1)));
                    Some(receiver)
                }
            };
            if let Some(Receiver::Value(target)) = receiver {
                stack.push((target.as_ref(), level + 1));
            }
        }
        None
    }

    /// Number of nodes in the tree, including `self`.
    pub fn node_count(&self) -> usize {
        let receiver_count = |receiver: &Receiver| match receiver {
            Receiver::Value(expr) => expr.node_count(),
            Receiver::Context | Receiver::Static(_) => 0,
        };
        1 + match &self.kind {
            ExprKind::Literal(_) => 0,
            ExprKind::Unary { operand, .. } => operand.node_count(),
            ExprKind::Binary { left, right, .. } => left.node_count() + right.node_count(),
            ExprKind::Member { receiver, .. } => receiver_count(receiver),
            ExprKind::Call { receiver, args, .. } | ExprKind::Index { receiver, args, .. } => {
                receiver_count(receiver) + args.iter().map(Expr::node_count).sum::<usize>()
            }
        }
    }
}

fn write_number(f: &mut fmt::Formatter<'_>, digits: String, suffix: &str) -> fmt::Result {
    f.write_str(&digits)?;
    if !digits.contains(['.', 'e', 'E']) {
        f.write_str(".0")?;
    }
    f.write_str(suffix)
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Float(v) => write_number(f, v.to_string(), "f"),
        Value::Double(v) => write_number(f, v.to_string(), ""),
        Value::Decimal(v) => write_number(f, v.to_string(), "m"),
        Value::Text(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
        other => write!(f, "{other}"),
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Expr]) -> fmt::Result {
    for (idx, arg) in args.iter().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{arg}")?;
    }
    Ok(())
}

/// Writes `receiver.` (or nothing for the context). Literals and unary nodes are wrapped so the
/// dot cannot be read as part of a number or bind tighter than the operator.
fn write_receiver(f: &mut fmt::Formatter<'_>, receiver: &Receiver) -> fmt::Result {
    match receiver {
        Receiver::Context => Ok(()),
        Receiver::Static(name) => write!(f, "{name}."),
        Receiver::Value(expr) => match expr.kind {
            ExprKind::Literal(_) | ExprKind::Unary { .. } => write!(f, "({expr})."),
            _ => write!(f, "{expr}."),
        },
    }
}

/// Formats the node as a formula that parses back to an equivalent tree. Binary operations are
/// fully parenthesized.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal(value) => write_literal(f, value),
            ExprKind::Unary { op, operand } => write!(f, "{}{operand}", op.symbol()),
            ExprKind::Binary { op, left, right } => {
                write!(f, "({left} {} {right})", op.symbol())
            }
            ExprKind::Member { receiver, member } => {
                write_receiver(f, receiver)?;
                f.write_str(member.name())
            }
            ExprKind::Call {
                receiver,
                method,
                args,
            } => {
                write_receiver(f, receiver)?;
                write!(f, "{}(", method.name())?;
                write_args(f, args)?;
                f.write_str(")")
            }
            ExprKind::Index { receiver, args, .. } => {
                if let Receiver::Value(target) = receiver {
                    write!(f, "{target}")?;
                }
                f.write_str("[")?;
                write_args(f, args)?;
                f.write_str("]")
            }
        }
    }
}
