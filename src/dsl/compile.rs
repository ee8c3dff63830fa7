//! Compilation of syntax trees into reusable predicates.

use std::fmt;
use std::sync::Arc;

use super::ast::Node;
use super::error::{EvalError, SyntaxError};
use super::feature::{Feature, FieldPath, Record};
use super::parser::{DEFAULT_MAX_DEPTH, parse_with};
use super::value::Value;

type Test<R> = Box<dyn Fn(&R) -> Result<bool, EvalError> + Send + Sync>;
type Eval<R> = Box<dyn Fn(&R) -> Result<Value, EvalError> + Send + Sync>;

/// Extracts the tags of a record.
pub type TagsFn<R> = Arc<dyn Fn(&R) -> Vec<String> + Send + Sync>;

/// Turns query strings into predicates over records of type `R`.
///
/// The feature syntax and tag extraction are fixed at construction and shared
/// by every predicate the compiler produces.
pub struct Compiler<R: ?Sized> {
    feature: Arc<dyn Feature<R>>,
    tags_of: TagsFn<R>,
    max_depth: usize,
}

impl<R: ?Sized> Clone for Compiler<R> {
    fn clone(&self) -> Self {
        Self {
            feature: Arc::clone(&self.feature),
            tags_of: Arc::clone(&self.tags_of),
            max_depth: self.max_depth,
        }
    }
}

impl<R: Record + ?Sized + 'static> Compiler<R> {
    /// Field-path features and tags taken from [`Record::tags`].
    pub fn new() -> Self {
        Self::with_extension(FieldPath, |record: &R| record.tags())
    }
}

impl<R: Record + ?Sized + 'static> Default for Compiler<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ?Sized + 'static> Compiler<R> {
    /// A compiler for records that need not implement [`Record`].
    pub fn with_extension<F, T>(feature: F, tags_of: T) -> Self
    where
        F: Feature<R> + 'static,
        T: Fn(&R) -> Vec<String> + Send + Sync + 'static,
    {
        Self {
            feature: Arc::new(feature),
            tags_of: Arc::new(tags_of),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Replace the feature syntax and lookup.
    pub fn with_feature<F: Feature<R> + 'static>(mut self, feature: F) -> Self {
        self.feature = Arc::new(feature);
        self
    }

    /// Replace tag extraction.
    pub fn with_tags<T>(mut self, tags_of: T) -> Self
    where
        T: Fn(&R) -> Vec<String> + Send + Sync + 'static,
    {
        self.tags_of = Arc::new(tags_of);
        self
    }

    /// Limit parenthesis nesting.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Parse a query with this compiler's feature syntax.
    pub fn parse(&self, query: &str) -> Result<Node, SyntaxError> {
        parse_with(query, self.feature.as_ref(), self.max_depth)
    }

    /// Parse and compile a query.
    pub fn compile(&self, query: &str) -> Result<Predicate<R>, SyntaxError> {
        let node = self.parse(query)?;
        let predicate = self.compile_node(&node);
        tracing::debug!(
            "Compiled query {:?} as {} ({})",
            query,
            node,
            if predicate.is_boolean() { "boolean" } else { "value" }
        );
        Ok(predicate)
    }

    /// Compile an already parsed tree.
    pub fn compile_node(&self, node: &Node) -> Predicate<R> {
        let root = if node.is_boolean() {
            Root::Test(Arc::from(self.compile_test(node)))
        } else {
            Root::Value(Arc::from(self.compile_value(node)))
        };
        Predicate {
            root,
            source: Arc::from(node.to_string()),
        }
    }

    fn compile_test(&self, node: &Node) -> Test<R> {
        match node {
            Node::Tag(pattern) => {
                let pattern = pattern.trim().to_string();
                let tags_of = Arc::clone(&self.tags_of);
                Box::new(move |record| {
                    Ok(tags_of(record)
                        .iter()
                        .any(|tag| tag.contains(pattern.as_str())))
                })
            }
            Node::ExactString(literal) => {
                let literal = literal.clone();
                let tags_of = Arc::clone(&self.tags_of);
                Box::new(move |record| Ok(tags_of(record).iter().any(|tag| *tag == literal)))
            }
            Node::Negation(inner) => {
                let inner = self.compile_test(inner);
                Box::new(move |record| Ok(!inner(record)?))
            }
            Node::Intersection(left, right) => {
                let (left, right) = (self.compile_test(left), self.compile_test(right));
                Box::new(move |record| Ok(left(record)? && right(record)?))
            }
            Node::Union(left, right) => {
                let (left, right) = (self.compile_test(left), self.compile_test(right));
                Box::new(move |record| Ok(left(record)? || right(record)?))
            }
            Node::Grouping(inner) => self.compile_test(inner),
            Node::Comparison { op, left, right } => {
                let op = *op;
                let (left, right) = (self.compile_value(left), self.compile_value(right));
                Box::new(move |record| {
                    let l = left(record)?.coerce()?;
                    let r = right(record)?.coerce()?;
                    Ok(op.apply(l, r))
                })
            }
            Node::Arithmetic { .. }
            | Node::Number(_)
            | Node::StringLiteral(_)
            | Node::FieldPath(_) => {
                let eval = self.compile_value(node);
                Box::new(move |record| match eval(record)? {
                    Value::Bool(b) => Ok(b),
                    other => Err(EvalError::NotBoolean(other)),
                })
            }
        }
    }

    fn compile_value(&self, node: &Node) -> Eval<R> {
        match node {
            Node::Number(n) => {
                let n = *n;
                Box::new(move |_| Ok(Value::Number(n)))
            }
            Node::StringLiteral(literal) => {
                let value = Value::Text(literal.clone());
                Box::new(move |_| Ok(value.clone()))
            }
            Node::FieldPath(segments) => {
                let segments = segments.clone();
                let feature = Arc::clone(&self.feature);
                Box::new(move |record| Ok(feature.resolve(record, &segments)))
            }
            Node::Arithmetic { op, left, right } => {
                let op = *op;
                let (left, right) = (self.compile_value(left), self.compile_value(right));
                Box::new(move |record| op.apply(&left(record)?, &right(record)?))
            }
            Node::Grouping(inner) => self.compile_value(inner),
            Node::Union(..)
            | Node::Intersection(..)
            | Node::Negation(_)
            | Node::Tag(_)
            | Node::ExactString(_)
            | Node::Comparison { .. } => {
                let test = self.compile_test(node);
                Box::new(move |record| test(record).map(Value::Bool))
            }
        }
    }
}

enum Root<R: ?Sized> {
    Test(Arc<dyn Fn(&R) -> Result<bool, EvalError> + Send + Sync>),
    Value(Arc<dyn Fn(&R) -> Result<Value, EvalError> + Send + Sync>),
}

/// A compiled query. Cheap to clone and safe to share between threads.
pub struct Predicate<R: ?Sized> {
    root: Root<R>,
    source: Arc<str>,
}

impl<R: ?Sized> Clone for Predicate<R> {
    fn clone(&self) -> Self {
        let root = match &self.root {
            Root::Test(f) => Root::Test(Arc::clone(f)),
            Root::Value(f) => Root::Value(Arc::clone(f)),
        };
        Self {
            root,
            source: Arc::clone(&self.source),
        }
    }
}

impl<R: ?Sized> fmt::Debug for Predicate<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("source", &self.source)
            .field("boolean", &self.is_boolean())
            .finish()
    }
}

impl<R: ?Sized> Predicate<R> {
    /// Whether the query root is boolean-shaped. Value roots (a bare field or
    /// arithmetic) are allowed but only [`Predicate::evaluate`] is meaningful
    /// for them.
    pub fn is_boolean(&self) -> bool {
        matches!(self.root, Root::Test(_))
    }

    /// Canonical text of the compiled query.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Test a record. A value root must itself produce a boolean.
    pub fn test(&self, record: &R) -> Result<bool, EvalError> {
        match &self.root {
            Root::Test(test) => test(record),
            Root::Value(eval) => match eval(record)? {
                Value::Bool(b) => Ok(b),
                other => Err(EvalError::NotBoolean(other)),
            },
        }
    }

    /// Evaluate the query to a value; boolean roots yield [`Value::Bool`].
    pub fn evaluate(&self, record: &R) -> Result<Value, EvalError> {
        match &self.root {
            Root::Test(test) => test(record).map(Value::Bool),
            Root::Value(eval) => eval(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// A story with flat fields.
    struct Story {
        tags: Vec<&'static str>,
        fields: HashMap<&'static str, Value>,
    }

    impl Record for Story {
        fn tags(&self) -> Vec<String> {
            self.tags.iter().map(|t| t.to_string()).collect()
        }

        fn resolve(&self, path: &[String]) -> Value {
            match path {
                [name] => self.fields.get(name.as_str()).cloned().unwrap_or(Value::Absent),
                _ => Value::Absent,
            }
        }
    }

    fn story(tags: &[&'static str], fields: &[(&'static str, Value)]) -> Story {
        Story {
            tags: tags.to_vec(),
            fields: fields.iter().cloned().collect(),
        }
    }

    fn matches(query: &str, record: &Story) -> bool {
        Compiler::new().compile(query).unwrap().test(record).unwrap()
    }

    #[test]
    fn test_partial_tag_match() {
        assert!(matches("fan", &story(&["fantasy", "adventure"], &[])));
        assert!(!matches("fan", &story(&["scifi", "drama"], &[])));
        assert!(matches("  fan  ", &story(&["fantasy"], &[])));
    }

    #[test]
    fn test_exact_tag_match() {
        assert!(matches(r#""fantasy""#, &story(&["fantasy"], &[])));
        assert!(!matches(r#""fantasy""#, &story(&["fantasy-romance"], &[])));
    }

    #[test]
    fn test_boolean_operators() {
        let s = story(&["fantasy", "drama"], &[]);
        assert!(matches("fan, drama", &s));
        assert!(!matches("fan, comedy", &s));
        assert!(matches("comedy | drama", &s));
        assert!(matches("-comedy", &s));
        assert!(!matches("-(comedy | drama)", &s));
    }

    #[test]
    fn test_numeric_comparison() {
        let s = story(&[], &[("rating", Value::Number(4.5))]);
        assert!(matches(".rating>=4", &s));
        assert!(!matches(".rating>=5", &s));
        assert!(matches(".rating = 4.5", &s));
        assert!(matches(".rating == 4.5", &s));
    }

    #[test]
    fn test_date_comparison() {
        let s = story(&[], &[("published", Value::from("2019-06-01T00:00:00"))]);
        assert!(matches(r#".published<"2020-01-01T00:00:00""#, &s));
        assert!(!matches(r#".published>"2020-01-01""#, &s));
    }

    #[test]
    fn test_missing_field_is_zero() {
        let s = story(&[], &[]);
        assert!(matches(".rating < 1", &s));
        assert!(matches(".rating = 0", &s));
        assert!(!matches(".rating > 0", &s));
    }

    #[test]
    fn test_arithmetic() {
        let s = story(
            &[],
            &[
                ("a", Value::Number(1.0)),
                ("b", Value::Number(2.0)),
                ("c", Value::Number(3.0)),
            ],
        );
        assert!(matches(".a+.b*.c = 7", &s));
        assert!(matches("(.a+.b)*.c = 9", &s));
        assert!(matches(".c / .b = 1.5", &s));
        assert!(matches(".b ^ .c = 8", &s));
        assert!(matches(".c - .b - .a = 0", &s));
    }

    #[test]
    fn test_evaluation_errors_propagate() {
        let s = story(
            &[],
            &[("title", Value::from("Dawn")), ("zero", Value::Number(0.0))],
        );
        let compiler = Compiler::new();

        let err = compiler.compile(".title > 3").unwrap().test(&s).unwrap_err();
        assert_eq!(err, EvalError::Coercion("Dawn".into()));

        let err = compiler.compile(".missing + 1 > 3").unwrap().test(&s).unwrap_err();
        assert!(matches!(err, EvalError::ArithmeticType { found: "absent", .. }));

        let err = compiler.compile("1 / .zero > 3").unwrap().test(&s).unwrap_err();
        assert_eq!(err, EvalError::DivisionByZero);

        // Errors are not turned into `false` under negation or union.
        let err = compiler.compile("-(.title > 3) | x").unwrap().test(&s);
        assert!(err.is_err());
    }

    #[test]
    fn test_value_root() {
        let s = story(&[], &[("a", Value::Number(2.0))]);
        let predicate = Compiler::new().compile(".a * 3").unwrap();
        assert!(!predicate.is_boolean());
        assert_eq!(predicate.evaluate(&s), Ok(Value::Number(6.0)));
        assert_eq!(predicate.test(&s), Err(EvalError::NotBoolean(Value::Number(6.0))));

        let flag = story(&[], &[("done", Value::Bool(true))]);
        assert_eq!(Compiler::new().compile(".done").unwrap().test(&flag), Ok(true));
    }

    #[test]
    fn test_custom_tags_and_features() {
        use crate::dsl::lexer::PResult;
        use crate::dsl::feature::FeatureGrammar;
        use winnow::prelude::*;
        use winnow::token::take_while;

        /// `@name` looks up a key in a plain map.
        struct AtKey;

        impl FeatureGrammar for AtKey {
            fn parse_feature(&self, input: &mut &str) -> PResult<Vec<String>> {
                let _ = '@'.parse_next(input)?;
                let name = take_while(1.., |c: char| c.is_ascii_alphanumeric()).parse_next(input)?;
                Ok(vec![name.to_string()])
            }
        }

        impl Feature<HashMap<String, f64>> for AtKey {
            fn resolve(&self, record: &HashMap<String, f64>, segments: &[String]) -> Value {
                record.get(&segments[0]).copied().into()
            }
        }

        let compiler = Compiler::with_extension(AtKey, |record: &HashMap<String, f64>| {
            record.keys().cloned().collect()
        });
        let record: HashMap<String, f64> = [("words".to_string(), 1200.0)].into();

        let predicate = compiler.compile("@words > 1000, word").unwrap();
        assert_eq!(predicate.test(&record), Ok(true));
        assert!(compiler.parse(".words > 1000").is_err());
    }

    #[test]
    fn test_predicate_is_shareable() {
        fn assert_send_sync<T: Send + Sync>(_: &T) {}

        let predicate = Compiler::<Story>::new().compile("fan, .rating > 3").unwrap();
        assert_send_sync(&predicate);

        let s = story(&["fantasy"], &[("rating", Value::Number(5.0))]);
        let copy = predicate.clone();
        std::thread::scope(|scope| {
            scope.spawn(|| assert_eq!(copy.test(&s), Ok(true)));
            scope.spawn(|| assert_eq!(predicate.test(&s), Ok(true)));
        });
    }
}
