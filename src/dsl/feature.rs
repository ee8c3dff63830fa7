//! Records and the pluggable "feature" leaf of comparisons.
//!
//! A feature is whatever appears as a bare operand inside a comparison or an
//! arithmetic expression. By default that is a dotted field path (`.a.b`),
//! resolved through [`Record::resolve`]. Callers can swap in their own syntax
//! and lookup by implementing [`Feature`].

use winnow::combinator::{preceded, repeat};
use winnow::prelude::*;
use winnow::token::{one_of, take_while};

use super::lexer::PResult;
use super::value::Value;

/// Data a query is evaluated against.
pub trait Record {
    /// Tags matched by bare and quoted tag patterns.
    fn tags(&self) -> Vec<String> {
        Vec::new()
    }

    /// Resolve a field path, or [`Value::Absent`] if it does not exist.
    fn resolve(&self, path: &[String]) -> Value;
}

/// Syntax of a feature leaf.
///
/// `parse_feature` runs at operand position with leading whitespace already
/// skipped. It must consume the feature and return its segments, or fail
/// without meaningful consumption; the lexer restores the input on failure.
pub trait FeatureGrammar {
    fn parse_feature(&self, input: &mut &str) -> PResult<Vec<String>>;
}

/// Syntax and lookup of a feature leaf for records of type `R`.
pub trait Feature<R: ?Sized>: FeatureGrammar + Send + Sync {
    fn resolve(&self, record: &R, segments: &[String]) -> Value;
}

/// The default feature: one or more `.name` segments with no spaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldPath;

fn cname<'a>(input: &mut &'a str) -> PResult<&'a str> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .parse_next(input)
}

impl FeatureGrammar for FieldPath {
    fn parse_feature(&self, input: &mut &str) -> PResult<Vec<String>> {
        repeat(1.., preceded('.', cname.map(str::to_owned))).parse_next(input)
    }
}

impl<R: Record + ?Sized> Feature<R> for FieldPath {
    fn resolve(&self, record: &R, segments: &[String]) -> Value {
        record.resolve(segments)
    }
}
