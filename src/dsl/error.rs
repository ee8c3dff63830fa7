//! Error types for parsing and evaluating queries.

use thiserror::Error;

use super::ast::ArithOp;
use super::value::Value;

/// Longest fragment of the query echoed back in a syntax error.
const FRAGMENT_LEN: usize = 24;

/// A malformed query. Carries the byte offset where parsing stopped and a
/// short excerpt of the input from that point.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("syntax error at offset {offset} (near {fragment:?}): {kind}")]
pub struct SyntaxError {
    pub offset: usize,
    pub fragment: String,
    pub kind: SyntaxErrorKind,
}

impl SyntaxError {
    pub fn new(source: &str, offset: usize, kind: SyntaxErrorKind) -> Self {
        let offset = offset.min(source.len());
        let fragment = source
            .get(offset..)
            .unwrap_or_default()
            .chars()
            .take(FRAGMENT_LEN)
            .collect();
        Self {
            offset,
            fragment,
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyntaxErrorKind {
    #[error("empty query")]
    Empty,

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("invalid escape sequence `\\{0}`")]
    InvalidEscape(char),

    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),

    #[error("expected {expected}, found {found}")]
    Unexpected {
        expected: &'static str,
        found: String,
    },

    #[error("empty group")]
    EmptyGroup,

    #[error("nesting deeper than {0} levels")]
    TooDeep(usize),
}

/// A failure while evaluating a compiled predicate against one record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("cannot compare {0:?}: not an ISO-8601 timestamp or a number")]
    Coercion(String),

    #[error("operator `{op}` needs numeric operands, found {found}")]
    ArithmeticType { op: ArithOp, found: &'static str },

    #[error("division by zero")]
    DivisionByZero,

    #[error("operator `{0}` produced a non-finite result")]
    NotFinite(ArithOp),

    #[error("query produces the {kind} value `{0}`, not a boolean", kind = .0.kind())]
    NotBoolean(Value),
}
