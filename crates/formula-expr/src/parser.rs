use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ast::{BinaryOp, Expr, ExprKind, UnaryOp};
use crate::compile::CompiledExpr;
use crate::error::{ErrorKind, ExprError, ExprResult, Span};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::object_model::TypeRegistry;
use crate::ops;
use crate::value::{Object, Value};

/// Limits applied while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Longest accepted formula, in bytes.
    pub max_formula_len: usize,
    /// How deeply groups, unary operators and argument lists may nest.
    pub max_depth: usize,
    /// Height limit of the bound tree. Operator chains such as `1 + 1 + ...` grow the tree
    /// without nesting, and compiling, evaluating and printing all recurse over it.
    pub max_tree_height: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_formula_len: 8 * 1024,
            max_depth: 64,
            max_tree_height: 256,
        }
    }
}

/// Parses formulas and binds their names against a [`TypeRegistry`] and an optional context
/// object.
///
/// Binding happens while the tree is built, so a successful [`Parser::parse`] returns a fully
/// typed [`Expr`]. A parser keeps lexer state between calls and is meant to be used by one
/// thread at a time; the [`CompiledExpr`] it produces can be shared freely.
#[derive(Debug)]
pub struct Parser {
    lexer: Lexer,
    pub(crate) registry: Arc<TypeRegistry>,
    pub(crate) context: Option<Object>,
    options: ParseOptions,
    depth: usize,
}

impl Parser {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            lexer: Lexer::new(),
            registry,
            context: None,
            options: ParseOptions::default(),
            depth: 0,
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: Object) -> Self {
        self.context = Some(context);
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn set_context(&mut self, context: Option<Object>) {
        self.context = context;
    }

    pub fn context(&self) -> Option<&Object> {
        self.context.as_ref()
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parse and bind `formula`.
    pub fn parse(&mut self, formula: &str) -> ExprResult<Expr> {
        if formula.len() > self.options.max_formula_len {
            return Err(ExprError::new(
                ErrorKind::FormulaTooLong,
                format!(
                    "formula is {} bytes long; the limit is {}",
                    formula.len(),
                    self.options.max_formula_len
                ),
                Span::new(self.options.max_formula_len, formula.len()),
            ));
        }

        self.lexer.set_source(formula);
        self.depth = 0;
        self.bump()?;
        let expr = self.parse_expr(0)?;
        if self.current().kind != TokenKind::End {
            return Err(ExprError::syntax(
                format!("expected `||` or end of formula, found {}", self.current().kind),
                self.current().span,
            ));
        }
        if let Some(span) = expr.first_deeper_than(self.options.max_tree_height) {
            return Err(ExprError::new(
                ErrorKind::NestingLimit,
                format!(
                    "expression tree is deeper than {} levels",
                    self.options.max_tree_height
                ),
                span,
            ));
        }
        log::debug!("parsed {formula:?} as {expr}: {}", expr.ty);
        Ok(expr)
    }

    /// Parse, bind and compile `formula`. The returned evaluator keeps the current context.
    pub fn compile(&mut self, formula: &str) -> ExprResult<CompiledExpr> {
        let expr = self.parse(formula)?;
        Ok(CompiledExpr::new(&expr, self.context.clone()))
    }

    pub(crate) fn current(&self) -> &Token {
        self.lexer.current()
    }

    pub(crate) fn bump(&mut self) -> ExprResult<()> {
        self.lexer.next_token()?;
        Ok(())
    }

    pub(crate) fn expect(&mut self, kind: TokenKind) -> ExprResult<Span> {
        let token = self.current();
        if token.kind != kind {
            return Err(ExprError::syntax(
                format!("expected {kind}, found {}", token.kind),
                token.span,
            ));
        }
        let span = token.span;
        self.bump()?;
        Ok(span)
    }

    /// Run `f` one nesting level deeper.
    pub(crate) fn nested<T>(
        &mut self,
        span: Span,
        f: impl FnOnce(&mut Self) -> ExprResult<T>,
    ) -> ExprResult<T> {
        if self.depth >= self.options.max_depth {
            return Err(ExprError::new(
                ErrorKind::NestingLimit,
                format!("formula nests deeper than {} levels", self.options.max_depth),
                span,
            ));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    pub(crate) fn parse_expr(&mut self, min_prec: u8) -> ExprResult<Expr> {
        let mut left = self.parse_operand()?;
        loop {
            let (op, prec) = match self.infix_binding_power() {
                Some(v) => v,
                None => break,
            };
            if prec < min_prec {
                break;
            }
            let op_span = self.current().span;
            self.bump()?;
            let right = self.parse_expr(prec + 1)?;
            left = self.bind_binary(op, op_span, left, right)?;
        }
        Ok(left)
    }

    /// A primary followed by any number of `.name` / `.name(...)` suffixes.
    fn parse_operand(&mut self) -> ExprResult<Expr> {
        let expr = self.parse_primary()?;
        self.parse_chain(expr)
    }

    fn parse_chain(&mut self, mut expr: Expr) -> ExprResult<Expr> {
        while self.current().kind == TokenKind::Dot {
            self.bump()?;
            let token = self.current().clone();
            let TokenKind::Name(name) = token.kind else {
                return Err(ExprError::syntax(
                    format!("expected member or method name, found {}", token.kind),
                    token.span,
                ));
            };
            expr = self.parse_name(&name, token.span, Some(expr))?;
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> ExprResult<Expr> {
        let token = self.current().clone();
        let literal = match token.kind {
            TokenKind::Int(v) => Some(Value::Int(v)),
            TokenKind::Float(v) => Some(Value::Float(v)),
            TokenKind::Double(v) => Some(Value::Double(v)),
            TokenKind::Decimal(v) => Some(Value::Decimal(v)),
            TokenKind::Bool(v) => Some(Value::Bool(v)),
            TokenKind::Text(ref s) => Some(Value::text(s)),
            _ => None,
        };
        if let Some(value) = literal {
            self.bump()?;
            return Ok(Expr::literal(value, token.span));
        }

        match token.kind {
            // The group keeps its member chain, so `-(x).Y` negates `(x).Y`.
            TokenKind::LParen => {
                let group = self.nested(token.span, |p| {
                    p.bump()?;
                    let inner = p.parse_expr(0)?;
                    let close = p.expect(TokenKind::RParen)?;
                    Ok(Expr {
                        span: token.span.to(close),
                        ..inner
                    })
                })?;
                self.parse_chain(group)
            }
            TokenKind::Minus => self.parse_unary(UnaryOp::Negate, token.span),
            TokenKind::Not => self.parse_unary(UnaryOp::Not, token.span),
            TokenKind::LBracket => {
                if self.context.is_none() {
                    return Err(ExprError::new(
                        ErrorKind::NoContext,
                        "indexer access needs a context object",
                        token.span,
                    ));
                }
                self.parse_indexer(None, token.span)
            }
            TokenKind::Name(name) => self.parse_name(&name, token.span, None),
            other => Err(ExprError::syntax(
                format!("expected a literal, name, `(`, `-` or `!`, found {other}"),
                token.span,
            )),
        }
    }

    fn parse_unary(&mut self, op: UnaryOp, op_span: Span) -> ExprResult<Expr> {
        self.nested(op_span, |p| {
            p.bump()?;
            let operand = p.parse_primary()?;
            p.bind_unary(op, op_span, operand)
        })
    }

    /// Comma separated expressions up to `close`. The opening token is current on entry; the
    /// span of `close` is returned.
    pub(crate) fn parse_arguments(&mut self, close: TokenKind) -> ExprResult<(Vec<Expr>, Span)> {
        let open = self.current().span;
        self.bump()?;
        let mut args = Vec::new();
        if self.current().kind != close {
            loop {
                args.push(self.nested(open, |p| p.parse_expr(0))?);
                match self.current().kind.clone() {
                    TokenKind::Comma => self.bump()?,
                    kind if kind == close => break,
                    kind => {
                        return Err(ExprError::syntax(
                            format!("expected `,` or {close}, found {kind}"),
                            self.current().span,
                        ))
                    }
                }
            }
        }
        let close_span = self.current().span;
        self.bump()?;
        Ok((args, close_span))
    }

    fn bind_unary(&self, op: UnaryOp, op_span: Span, operand: Expr) -> ExprResult<Expr> {
        let ty = ops::unary_type(op, &operand.ty).ok_or_else(|| {
            ExprError::new(
                ErrorKind::OperatorMismatch,
                format!("operator `{}` cannot be applied to {}", op.symbol(), operand.ty),
                op_span,
            )
        })?;
        Ok(Expr {
            ty,
            span: op_span.to(operand.span),
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
        })
    }

    fn bind_binary(&self, op: BinaryOp, op_span: Span, left: Expr, right: Expr) -> ExprResult<Expr> {
        let ty = ops::binary_type(op, &left.ty, &right.ty).ok_or_else(|| {
            ExprError::new(
                ErrorKind::OperatorMismatch,
                format!(
                    "operator `{}` is not defined for {} and {}",
                    op.symbol(),
                    left.ty,
                    right.ty
                ),
                op_span,
            )
        })?;
        Ok(Expr {
            ty,
            span: left.span.to(right.span),
            kind: ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        })
    }

    fn infix_binding_power(&self) -> Option<(BinaryOp, u8)> {
        match self.current().kind {
            TokenKind::OrOr => Some((BinaryOp::LogicalOr, 1)),
            TokenKind::AndAnd => Some((BinaryOp::LogicalAnd, 2)),
            TokenKind::BitOr => Some((BinaryOp::BitOr, 3)),
            TokenKind::BitXor => Some((BinaryOp::BitXor, 4)),
            TokenKind::BitAnd => Some((BinaryOp::BitAnd, 5)),
            TokenKind::Eq => Some((BinaryOp::Equal, 6)),
            TokenKind::Ne => Some((BinaryOp::NotEqual, 6)),
            TokenKind::Lt => Some((BinaryOp::Less, 7)),
            TokenKind::Le => Some((BinaryOp::LessEqual, 7)),
            TokenKind::Gt => Some((BinaryOp::Greater, 7)),
            TokenKind::Ge => Some((BinaryOp::GreaterEqual, 7)),
            TokenKind::Shl => Some((BinaryOp::ShiftLeft, 8)),
            TokenKind::Shr => Some((BinaryOp::ShiftRight, 8)),
            TokenKind::Plus => Some((BinaryOp::Add, 9)),
            TokenKind::Minus => Some((BinaryOp::Subtract, 9)),
            TokenKind::Star => Some((BinaryOp::Multiply, 10)),
            TokenKind::Slash => Some((BinaryOp::Divide, 10)),
            _ => None,
        }
    }
}
