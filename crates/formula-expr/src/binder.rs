//! Name resolution. Runs while the parser builds the tree, so every name is bound against the
//! context object or a registered type as soon as it is read.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::ast::{Expr, ExprKind, Receiver};
use crate::error::{ErrorKind, ExprError, ExprResult, Span};
use crate::lexer::TokenKind;
use crate::object_model::{Signature, TypeInfo};
use crate::parser::Parser;
use crate::value::Type;

/// Split a dotted name into its segments and their spans.
fn segments(name: &str, span: Span) -> SmallVec<[(&str, Span); 4]> {
    let mut offset = span.start;
    name.split('.')
        .map(|segment| {
            let segment_span = Span::new(offset, offset + segment.len());
            offset += segment.len() + 1;
            (segment, segment_span)
        })
        .collect()
}

fn signature_text(types: &[Type]) -> String {
    types
        .iter()
        .map(Type::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn arg_types(args: &[Expr]) -> Signature {
    args.iter().map(|arg| arg.ty.clone()).collect()
}

fn not_found(message: String, span: Span) -> ExprError {
    ExprError::new(ErrorKind::NotFound, message, span)
}

impl Parser {
    /// Resolve the name token at `span`, optionally as a suffix of `target`.
    ///
    /// The name token is current on entry; the token after it decides between a method call, an
    /// indexer and a plain member access.
    pub(crate) fn parse_name(
        &mut self,
        name: &str,
        span: Span,
        target: Option<Expr>,
    ) -> ExprResult<Expr> {
        self.bump()?;
        match self.current().kind {
            TokenKind::LParen => self.parse_call(name, span, target),
            TokenKind::LBracket => {
                let target = self.resolve_members(name, span, target)?;
                self.parse_indexer(Some(target), span)
            }
            _ => self.resolve_members(name, span, target),
        }
    }

    fn context_info(&self, span: Span) -> ExprResult<Arc<TypeInfo>> {
        let context = self.context.as_ref().ok_or_else(|| {
            ExprError::new(ErrorKind::NoContext, "no context object is bound", span)
        })?;
        self.registry.get(context.type_name()).cloned().ok_or_else(|| {
            not_found(
                format!("context type `{}` is not registered", context.type_name()),
                span,
            )
        })
    }

    fn type_info(&self, ty: &Type, span: Span) -> ExprResult<Arc<TypeInfo>> {
        self.registry
            .get(ty.name())
            .cloned()
            .ok_or_else(|| not_found(format!("type `{ty}` is not registered"), span))
    }

    /// Walk a dotted name as a chain of field/property accesses.
    fn resolve_members(
        &self,
        name: &str,
        span: Span,
        target: Option<Expr>,
    ) -> ExprResult<Expr> {
        let segments = segments(name, span);
        let (mut expr, consumed) = match target {
            Some(target) => (target, 0),
            None => self.resolve_root(name, span, &segments)?,
        };
        for &(segment, segment_span) in &segments[consumed..] {
            expr = self.instance_member(expr, segment, segment_span)?;
        }
        Ok(expr)
    }

    /// Resolve the leading segments of an untargeted name: a member of the context if the first
    /// segment names one, otherwise a static member of the longest matching type prefix.
    /// Returns the node and how many segments it consumed.
    fn resolve_root(
        &self,
        name: &str,
        span: Span,
        segments: &[(&str, Span)],
    ) -> ExprResult<(Expr, usize)> {
        let (first, first_span) = segments[0];

        if let Some(context) = &self.context {
            let member = self
                .registry
                .get(context.type_name())
                .and_then(|info| info.find_member(first));
            if let Some(member) = member {
                log::trace!("`{first}` bound to {} member", context.type_name());
                return Ok((
                    Expr {
                        ty: member.ty().clone(),
                        span: first_span,
                        kind: ExprKind::Member {
                            receiver: Receiver::Context,
                            member: member.clone(),
                        },
                    },
                    1,
                ));
            }
        }

        for count in (1..segments.len()).rev() {
            let type_name = &name[..segments[count - 1].1.end - span.start];
            let Some(info) = self.registry.get(type_name) else {
                continue;
            };
            let (member_name, member_span) = segments[count];
            let member = info.find_static_member(member_name).ok_or_else(|| {
                not_found(
                    format!("type `{type_name}` has no static field or property `{member_name}`"),
                    member_span,
                )
            })?;
            log::trace!("`{type_name}.{member_name}` bound to static member");
            return Ok((
                Expr {
                    ty: member.ty().clone(),
                    span: Span::new(span.start, member_span.end),
                    kind: ExprKind::Member {
                        receiver: Receiver::Static(Arc::from(type_name)),
                        member: member.clone(),
                    },
                },
                count + 1,
            ));
        }

        Err(match &self.context {
            Some(context) => not_found(
                format!(
                    "`{first}` is neither a member of `{}` nor a type",
                    context.type_name()
                ),
                first_span,
            ),
            None if segments.len() == 1 => ExprError::new(
                ErrorKind::NoContext,
                format!("no context object is bound to resolve `{first}`"),
                first_span,
            ),
            None => not_found(format!("unknown type `{first}`"), first_span),
        })
    }

    fn instance_member(&self, target: Expr, name: &str, span: Span) -> ExprResult<Expr> {
        let member = self
            .registry
            .get(target.ty.name())
            .and_then(|info| info.find_member(name))
            .cloned()
            .ok_or_else(|| {
                not_found(
                    format!("type `{}` has no field or property `{name}`", target.ty),
                    span,
                )
            })?;
        log::trace!("`{name}` bound to {} member", target.ty);
        Ok(Expr {
            ty: member.ty().clone(),
            span: target.span.to(span),
            kind: ExprKind::Member {
                receiver: Receiver::Value(Box::new(target)),
                member,
            },
        })
    }

    /// `name(args)`. The part of a dotted name before its last dot is first tried as a type
    /// name (static call), then walked as members.
    fn parse_call(&mut self, name: &str, span: Span, target: Option<Expr>) -> ExprResult<Expr> {
        let (receiver, info, method_name, method_span) = match name.rfind('.') {
            Some(dot) => {
                let prefix = &name[..dot];
                let method_span = Span::new(span.start + dot + 1, span.end);
                let method_name = &name[dot + 1..];
                match (target, self.registry.get(prefix).cloned()) {
                    (None, Some(info)) => {
                        (Receiver::Static(Arc::from(prefix)), info, method_name, method_span)
                    }
                    (target, _) => {
                        let prefix_span = Span::new(span.start, span.start + dot);
                        let receiver = self.resolve_members(prefix, prefix_span, target)?;
                        let info = self.type_info(&receiver.ty, receiver.span)?;
                        (Receiver::Value(Box::new(receiver)), info, method_name, method_span)
                    }
                }
            }
            None => match target {
                Some(target) => {
                    let info = self.type_info(&target.ty, target.span)?;
                    (Receiver::Value(Box::new(target)), info, name, span)
                }
                None => (Receiver::Context, self.context_info(span)?, name, span),
            },
        };

        let (args, close) = self.parse_arguments(TokenKind::RParen)?;
        let types = arg_types(&args);
        let is_static = matches!(receiver, Receiver::Static(_));
        let found = if is_static {
            info.find_static_method(method_name, &types)
        } else {
            info.find_method(method_name, &types)
        };
        let method = found.cloned().ok_or_else(|| {
            let message = if info.has_method(method_name, is_static) {
                format!(
                    "no overload of `{}.{method_name}` takes ({})",
                    info.name(),
                    signature_text(&types)
                )
            } else {
                format!(
                    "type `{}` has no {}method `{method_name}({})`",
                    info.name(),
                    if is_static { "static " } else { "" },
                    signature_text(&types)
                )
            };
            ExprError::new(ErrorKind::NoMatchingMethod, message, method_span)
        })?;
        log::trace!(
            "`{method_name}({})` bound on {}",
            signature_text(&types),
            info.name()
        );

        let start = match &receiver {
            Receiver::Value(target) => target.span,
            Receiver::Context | Receiver::Static(_) => span,
        };
        Ok(Expr {
            ty: method.ret().clone(),
            span: start.to(close),
            kind: ExprKind::Call {
                receiver,
                method,
                args,
            },
        })
    }

    /// `[args]` on `target`, or on the context when there is no target. The `[` is current on
    /// entry.
    pub(crate) fn parse_indexer(&mut self, target: Option<Expr>, span: Span) -> ExprResult<Expr> {
        let (receiver, info, start) = match target {
            Some(target) => {
                let info = self.type_info(&target.ty, target.span)?;
                let start = target.span;
                (Receiver::Value(Box::new(target)), info, start)
            }
            None => (Receiver::Context, self.context_info(span)?, span),
        };

        let open = self.current().span;
        let (args, close) = self.parse_arguments(TokenKind::RBracket)?;
        let types = arg_types(&args);
        let indexer = info.find_indexer(&types).cloned().ok_or_else(|| {
            ExprError::new(
                ErrorKind::NoMatchingIndexer,
                format!(
                    "type `{}` has no indexer taking [{}]",
                    info.name(),
                    signature_text(&types)
                ),
                open.to(close),
            )
        })?;
        log::trace!("[{}] bound on {}", signature_text(&types), info.name());

        Ok(Expr {
            ty: indexer.ret().clone(),
            span: start.to(close),
            kind: ExprKind::Index {
                receiver,
                indexer,
                args,
            },
        })
    }
}
