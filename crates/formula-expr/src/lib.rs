//! `formula-expr` evaluates small typed expressions ("formulas") against host objects.
//!
//! A formula such as `Order.Total * 2.0` or `Math.Pow(2.0, 3.0).ToString()` is tokenized by
//! [`Lexer`], parsed by [`Parser`] with names bound as they are read, and compiled into a
//! [`CompiledExpr`] that can be evaluated many times.
//!
//! Names resolve against:
//! - an optional context [`Object`], whose registered members are reachable unqualified;
//! - the types in a [`TypeRegistry`], reachable by (possibly dotted) type name for static access.
//!
//! Overloads are matched by exact parameter types; there are no implicit conversions.
//!
//! ```
//! use std::sync::Arc;
//! use formula_expr::{get_value, TypeRegistry, Value};
//!
//! let registry = Arc::new(TypeRegistry::with_builtins());
//! let value = get_value("(2 + 3) * 4", None, &registry).unwrap();
//! assert_eq!(value, Value::Int(20));
//! ```

#![forbid(unsafe_code)]

mod ast;
mod binder;
mod builtins;
mod compile;
mod error;
mod lexer;
mod object_model;
mod ops;
mod parser;
mod value;

pub use crate::ast::{BinaryOp, Expr, ExprKind, Receiver, UnaryOp};
pub use crate::compile::CompiledExpr;
pub use crate::error::{ErrorKind, ExprError, ExprResult, HostError, RegistryError, Span};
pub use crate::lexer::{tokenize, Lexer, Token, TokenKind};
pub use crate::object_model::{
    Indexer, Member, MemberKind, Method, Signature, TypeBuilder, TypeInfo, TypeRegistry,
};
pub use crate::parser::{ParseOptions, Parser};
pub use crate::value::{Object, Type, Value};

/// Parse, compile and evaluate `formula` in one call.
pub fn get_value(
    formula: &str,
    context: Option<Object>,
    registry: &std::sync::Arc<TypeRegistry>,
) -> ExprResult<Value> {
    let mut parser = Parser::new(registry.clone());
    parser.set_context(context);
    parser.compile(formula)?.evaluate()
}
