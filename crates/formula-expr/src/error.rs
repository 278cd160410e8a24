use serde::{Deserialize, Serialize};

/// Byte range inside a formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both `self` and `other`.
    #[must_use]
    pub fn to(self, other: Span) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    #[must_use]
    pub fn len(self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn range(self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

/// Classification of an [`ExprError`].
///
/// Format errors (`MalformedNumber`) and range errors (`NumberOverflow`) are kept apart so a
/// caller can tell a typo from a value that simply does not fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidCharacter,
    MalformedNumber,
    NumberOverflow,
    UnterminatedText,
    InvalidName,
    InvalidOperator,
    Syntax,
    NoContext,
    NotFound,
    NoMatchingMethod,
    NoMatchingIndexer,
    OperatorMismatch,
    NestingLimit,
    FormulaTooLong,
    Runtime,
}

/// The single error type raised by lexing, parsing, binding and evaluation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{message} (at {}..{})", .span.start, .span.end)]
pub struct ExprError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Span,
}

impl ExprError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
        }
    }

    pub(crate) fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Syntax, message, span)
    }

    pub(crate) fn runtime(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Runtime, message, span)
    }

    /// Offset of the first offending byte.
    #[must_use]
    pub fn position(&self) -> usize {
        self.span.start
    }

    /// Length of the offending substring; never less than 1 so the span is always selectable.
    #[must_use]
    pub fn len(&self) -> usize {
        self.span.len().max(1)
    }

    /// Slice of `formula` the error refers to, clamped to the formula bounds.
    #[must_use]
    pub fn snippet<'a>(&self, formula: &'a str) -> &'a str {
        let start = self.position().min(formula.len());
        let mut end = (start + self.len()).min(formula.len());
        while !formula.is_char_boundary(end) {
            end += 1;
        }
        formula.get(start..end).unwrap_or("")
    }
}

pub type ExprResult<T> = Result<T, ExprError>;

/// Failure reported by a host accessor (property getter, method or indexer body).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HostError(pub String);

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<&str> for HostError {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for HostError {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate type: {0}")]
    DuplicateType(String),
}
