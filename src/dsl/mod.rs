//! Tag and field query language.
//!
//! Syntax:
//!   fan                     - some tag contains "fan"
//!   science fiction         - some tag contains "science fiction"
//!   "fantasy"               - some tag is exactly "fantasy"
//!   -tag, -(expr)           - NOT
//!   expr1, expr2            - AND
//!   expr1 | expr2           - OR (lower precedence than ,)
//!   (expr)                  - grouping
//!   .rating >= 4            - compare a field (<, >, <=, >=, =, ==)
//!   .published < "2020-01-01T00:00:00"
//!                           - text operands compare as ISO-8601 timestamps
//!   .likes / (.views + 1) > 0.1
//!                           - arithmetic inside comparisons (+ - * / ^)

mod ast;
mod compile;
mod error;
mod feature;
mod lexer;
mod parser;
mod value;

pub use ast::*;
pub use compile::{Compiler, Predicate, TagsFn};
pub use error::{EvalError, SyntaxError, SyntaxErrorKind};
pub use feature::{Feature, FeatureGrammar, FieldPath, Record};
pub use lexer::PResult;
pub use parser::{DEFAULT_MAX_DEPTH, parse, parse_with};
pub use value::{Value, parse_timestamp};
