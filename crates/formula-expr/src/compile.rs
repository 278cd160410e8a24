use std::fmt;

use crate::ast::{Expr, ExprKind, Receiver};
use crate::error::{ErrorKind, ExprError, ExprResult, HostError, Span};
use crate::ops;
use crate::value::{Object, Type, Value};

struct Env<'a> {
    context: Option<&'a Object>,
}

type Thunk = Box<dyn Fn(&Env<'_>) -> ExprResult<Value> + Send + Sync>;

fn thunk<F>(f: F) -> Thunk
where
    F: Fn(&Env<'_>) -> ExprResult<Value> + Send + Sync + 'static,
{
    Box::new(f)
}

fn host_error(what: &str, err: HostError, span: Span) -> ExprError {
    ExprError::runtime(format!("{what} failed: {err}"), span)
}

/// A bound formula turned into a tree of closures.
///
/// Evaluation is post-order and left to right: receivers before arguments, operands before their
/// operator. The evaluator holds no parse state, so it is `Send + Sync` and can be invoked from
/// several threads at once; it is as thread-safe as the context members it calls.
pub struct CompiledExpr {
    root: Thunk,
    ty: Type,
    span: Span,
    context: Option<Object>,
}

impl fmt::Debug for CompiledExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledExpr")
            .field("ty", &self.ty)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl CompiledExpr {
    pub fn new(expr: &Expr, context: Option<Object>) -> Self {
        log::debug!("compiling {expr} ({} nodes)", expr.node_count());
        Self {
            root: compile(expr),
            ty: expr.ty.clone(),
            span: expr.span,
            context,
        }
    }

    /// Declared type of every value [`CompiledExpr::evaluate`] returns.
    pub fn result_type(&self) -> &Type {
        &self.ty
    }

    pub fn context(&self) -> Option<&Object> {
        self.context.as_ref()
    }

    pub fn evaluate(&self) -> ExprResult<Value> {
        (self.root)(&Env {
            context: self.context.as_ref(),
        })
    }

    /// Evaluate against a different context object of the type the formula was bound to.
    pub fn evaluate_with(&self, context: &Object) -> ExprResult<Value> {
        if let Some(bound) = &self.context {
            if bound.type_name() != context.type_name() {
                return Err(ExprError::new(
                    ErrorKind::Runtime,
                    format!(
                        "formula was bound to `{}` but evaluated with `{}`",
                        bound.type_name(),
                        context.type_name()
                    ),
                    self.span,
                ));
            }
        }
        (self.root)(&Env {
            context: Some(context),
        })
    }
}

fn compile_receiver(receiver: &Receiver, span: Span) -> Thunk {
    match receiver {
        Receiver::Context => thunk(move |env| {
            env.context
                .cloned()
                .map(Value::Object)
                .ok_or_else(|| ExprError::runtime("no context object to evaluate against", span))
        }),
        Receiver::Static(_) => thunk(|_| Ok(Value::Unit)),
        Receiver::Value(target) => compile(target),
    }
}

fn compile_args(args: &[Expr]) -> Vec<Thunk> {
    args.iter().map(compile).collect()
}

fn eval_args(args: &[Thunk], env: &Env<'_>) -> ExprResult<Vec<Value>> {
    args.iter().map(|arg| arg(env)).collect()
}

fn compile(expr: &Expr) -> Thunk {
    let span = expr.span;
    match &expr.kind {
        ExprKind::Literal(value) => {
            let value = value.clone();
            thunk(move |_| Ok(value.clone()))
        }
        ExprKind::Unary { op, operand } => {
            let op = *op;
            let operand = compile(operand);
            thunk(move |env| {
                let value = operand(env)?;
                ops::eval_unary(op, value).map_err(|message| ExprError::runtime(message, span))
            })
        }
        ExprKind::Binary { op, left, right } => {
            let op = *op;
            let left = compile(left);
            let right = compile(right);
            thunk(move |env| {
                let lhs = left(env)?;
                let rhs = right(env)?;
                ops::eval_binary(op, lhs, rhs).map_err(|message| ExprError::runtime(message, span))
            })
        }
        ExprKind::Member { receiver, member } => {
            let member = member.clone();
            let receiver = compile_receiver(receiver, span);
            thunk(move |env| {
                let target = receiver(env)?;
                member
                    .get(&target)
                    .map_err(|err| host_error(member.name(), err, span))
            })
        }
        ExprKind::Call {
            receiver,
            method,
            args,
        } => {
            let method = method.clone();
            let receiver = compile_receiver(receiver, span);
            let args = compile_args(args);
            thunk(move |env| {
                let target = receiver(env)?;
                let values = eval_args(&args, env)?;
                method
                    .invoke(&target, &values)
                    .map_err(|err| host_error(method.name(), err, span))
            })
        }
        ExprKind::Index {
            receiver,
            indexer,
            args,
        } => {
            let indexer = indexer.clone();
            let receiver = compile_receiver(receiver, span);
            let args = compile_args(args);
            thunk(move |env| {
                let target = receiver(env)?;
                let values = eval_args(&args, env)?;
                indexer
                    .get(&target, &values)
                    .map_err(|err| host_error("indexer", err, span))
            })
        }
    }
}
