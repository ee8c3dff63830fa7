//! AST types for the query language.

use std::fmt;

/// A parsed query. Boolean-shaped nodes (tags, negation, intersection, union,
/// comparison) appear at filter level; the rest only inside comparisons.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// `left | right`
    Union(Box<Node>, Box<Node>),

    /// `left, right`
    Intersection(Box<Node>, Box<Node>),

    /// `-tag` or `-(query)`
    Negation(Box<Node>),

    /// Bare word run, matched as a substring of any tag.
    Tag(String),

    /// Quoted literal, matched by equality against any tag.
    ExactString(String),

    /// `.rating >= 4`
    Comparison {
        op: CompareOp,
        left: Box<Node>,
        right: Box<Node>,
    },

    /// `.a + .b`, `.a ^ 2`
    Arithmetic {
        op: ArithOp,
        left: Box<Node>,
        right: Box<Node>,
    },

    Number(f64),

    /// Quoted literal inside a comparison.
    StringLiteral(String),

    /// `.meta.words`
    FieldPath(Vec<String>),

    /// `( ... )`
    Grouping(Box<Node>),
}

impl Node {
    /// Whether the node evaluates to a boolean rather than a scalar value.
    pub fn is_boolean(&self) -> bool {
        match self {
            Node::Union(..)
            | Node::Intersection(..)
            | Node::Negation(_)
            | Node::Tag(_)
            | Node::ExactString(_)
            | Node::Comparison { .. } => true,
            Node::Grouping(inner) => inner.is_boolean(),
            Node::Arithmetic { .. }
            | Node::Number(_)
            | Node::StringLiteral(_)
            | Node::FieldPath(_) => false,
        }
    }
}

/// Comparison operator. `=` and `==` are the same operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq, // = or ==
    Lt, // <
    Le, // <=
    Gt, // >
    Ge, // >=
}

impl CompareOp {
    pub fn apply(self, left: f64, right: f64) -> bool {
        match self {
            CompareOp::Eq => left == right,
            CompareOp::Lt => left < right,
            CompareOp::Le => left <= right,
            CompareOp::Gt => left > right,
            CompareOp::Ge => left >= right,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Le => write!(f, "<="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Ge => write!(f, ">="),
        }
    }
}

/// Arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add, // +
    Sub, // -
    Mul, // *
    Div, // /
    Pow, // ^
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArithOp::Add => write!(f, "+"),
            ArithOp::Sub => write!(f, "-"),
            ArithOp::Mul => write!(f, "*"),
            ArithOp::Div => write!(f, "/"),
            ArithOp::Pow => write!(f, "^"),
        }
    }
}

/// Renders the node as query text that parses back to the same tree.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Union(left, right) => write!(f, "{left} | {right}"),
            Node::Intersection(left, right) => write!(f, "{left}, {right}"),
            Node::Negation(inner) => write!(f, "-{inner}"),
            Node::Tag(pattern) => write!(f, "{}", pattern.trim()),
            Node::ExactString(literal) | Node::StringLiteral(literal) => {
                write_quoted(f, literal)
            }
            Node::Comparison { op, left, right } => write!(f, "{left} {op} {right}"),
            Node::Arithmetic { op, left, right } => write!(f, "{left} {op} {right}"),
            Node::Number(n) => write!(f, "{n}"),
            Node::FieldPath(segments) => {
                for segment in segments {
                    write!(f, ".{segment}")?;
                }
                Ok(())
            }
            Node::Grouping(inner) => write!(f, "({inner})"),
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, literal: &str) -> fmt::Result {
    write!(f, "\"")?;
    for c in literal.chars() {
        match c {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            '\r' => write!(f, "\\r")?,
            c if c.is_control() => write!(f, "\\u{:04x}", c as u32)?,
            c => write!(f, "{c}")?,
        }
    }
    write!(f, "\"")
}
