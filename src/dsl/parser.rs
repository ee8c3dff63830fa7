//! Parser for the query language.
//!
//! Grammar (in rough EBNF), lowest precedence first:
//!
//! root         = query | shift
//! query        = union
//! union        = intersection ("|" intersection)*
//! intersection = negation ("," negation)*
//! negation     = comparison | "-" (group | tag) | group | tag
//! group        = "(" query ")"
//! tag          = PATTERN | STRING
//! comparison   = shift COMPARATOR shift
//! shift        = scale (("+" | "-") scale)*
//! scale        = exp (("*" | "/") exp)*
//! exp          = atom ("^" atom)*
//! atom         = FEATURE | NUMBER | STRING | "(" shift ")"
//!
//! A filter atom such as `"x"`, `4` or `(` can start either a comparison or a
//! tag/group, so the comparison reading is tried first and the parser backs up
//! to the tag reading if it fails. Likewise a whole input that is not a
//! filter is read as a bare value expression (`.a * 2`), whose compiled
//! predicate yields a value instead of a boolean.

use super::ast::{ArithOp, Node};
use super::error::{SyntaxError, SyntaxErrorKind};
use super::feature::{FeatureGrammar, FieldPath};
use super::lexer::{Lexeme, Lexer, Mode, Token};

/// Default limit on parenthesis nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Parser state.
struct Parser<'a, G: ?Sized> {
    lexer: Lexer<'a, G>,
    depth: usize,
    max_depth: usize,
}

impl<'a, G: FeatureGrammar + ?Sized> Parser<'a, G> {
    fn unexpected(&self, expected: &'static str, found: &Lexeme) -> SyntaxError {
        self.lexer.error(
            found.offset,
            SyntaxErrorKind::Unexpected {
                expected,
                found: found.token.describe(),
            },
        )
    }

    fn expect_rparen(&mut self, mode: Mode) -> Result<(), SyntaxError> {
        let lexeme = self.lexer.next(mode)?;
        if lexeme.token == Token::RParen {
            Ok(())
        } else {
            Err(self.unexpected("`)`", &lexeme))
        }
    }

    /// Run `parse` and ensure it consumed the whole input.
    fn parse_whole(
        &mut self,
        parse: fn(&mut Self) -> Result<Node, SyntaxError>,
    ) -> Result<Node, SyntaxError> {
        let node = parse(self)?;
        let end = self.lexer.next(Mode::Filter)?;
        if end.token != Token::Eof {
            return Err(self.unexpected("`,`, `|` or end of query", &end));
        }
        Ok(node)
    }

    /// Run `f` one nesting level deeper.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, SyntaxError>,
    ) -> Result<T, SyntaxError> {
        if self.depth >= self.max_depth {
            let offset = self.lexer.offset();
            return Err(self
                .lexer
                .error(offset, SyntaxErrorKind::TooDeep(self.max_depth)));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Parse a full query: union ("|" union)*
    fn parse_query(&mut self) -> Result<Node, SyntaxError> {
        self.nested(Self::parse_union)
    }

    /// Parse union: intersection ("|" intersection)*
    fn parse_union(&mut self) -> Result<Node, SyntaxError> {
        let mut left = self.parse_intersection()?;

        while self.lexer.peek(Mode::Filter)?.token == Token::Pipe {
            self.lexer.next(Mode::Filter)?; // consume |
            let right = self.parse_intersection()?;
            left = Node::Union(Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    /// Parse intersection: negation ("," negation)*
    fn parse_intersection(&mut self) -> Result<Node, SyntaxError> {
        let mut left = self.parse_negation()?;

        while self.lexer.peek(Mode::Filter)?.token == Token::Comma {
            self.lexer.next(Mode::Filter)?; // consume ,
            let right = self.parse_negation()?;
            left = Node::Intersection(Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    /// Parse negation: comparison | "-" (group | tag) | group | tag
    fn parse_negation(&mut self) -> Result<Node, SyntaxError> {
        let checkpoint = self.lexer.checkpoint();
        let comparison_err = match self.parse_comparison() {
            Ok(node) => return Ok(node),
            Err(err) => err,
        };
        self.lexer.reset(checkpoint);

        // Report whichever reading got further into the input.
        self.parse_negated_primary().map_err(|err| {
            if comparison_err.offset > err.offset {
                comparison_err
            } else {
                err
            }
        })
    }

    /// Parse "-" primary | primary
    fn parse_negated_primary(&mut self) -> Result<Node, SyntaxError> {
        if self.lexer.peek(Mode::Filter)?.token == Token::Minus {
            self.lexer.next(Mode::Filter)?; // consume -
            let inner = self.parse_primary()?;
            Ok(Node::Negation(Box::new(inner)))
        } else {
            self.parse_primary()
        }
    }

    /// Parse primary: "(" query ")" | PATTERN | STRING
    fn parse_primary(&mut self) -> Result<Node, SyntaxError> {
        let lexeme = self.lexer.next(Mode::Filter)?;
        match &lexeme.token {
            Token::LParen => {
                // `(` may open a comparison, which filter mode cannot lex
                if let Ok(next) = self.lexer.peek(Mode::Filter) {
                    if next.token == Token::RParen {
                        return Err(self.lexer.error(next.offset, SyntaxErrorKind::EmptyGroup));
                    }
                }
                let inner = self.parse_query()?;
                self.expect_rparen(Mode::Filter)?;
                Ok(Node::Grouping(Box::new(inner)))
            }
            Token::Pattern(pattern) => Ok(Node::Tag(pattern.clone())),
            Token::Quoted(literal) => Ok(Node::ExactString(literal.clone())),
            _ => Err(self.unexpected("a tag, a quoted tag or `(`", &lexeme)),
        }
    }

    /// Parse comparison: shift COMPARATOR shift
    fn parse_comparison(&mut self) -> Result<Node, SyntaxError> {
        let left = self.parse_shift()?;

        let lexeme = self.lexer.next(Mode::Operator)?;
        let Token::Compare(op) = &lexeme.token else {
            return Err(self.unexpected("a comparison operator", &lexeme));
        };

        let op = *op;
        let right = self.parse_shift()?;
        Ok(Node::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// Parse a left-associative chain of `next` joined by any of `ops`.
    fn parse_chain(
        &mut self,
        ops: &[ArithOp],
        next: fn(&mut Self) -> Result<Node, SyntaxError>,
    ) -> Result<Node, SyntaxError> {
        let mut left = next(self)?;

        loop {
            // Anything else is left for the caller to reject.
            let op = match self.lexer.peek(Mode::Operator) {
                Ok(Lexeme {
                    token: Token::Arith(op),
                    ..
                }) if ops.contains(&op) => op,
                _ => break,
            };
            self.lexer.next(Mode::Operator)?; // consume operator
            let right = next(self)?;
            left = Node::Arithmetic {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// Parse shift: scale (("+" | "-") scale)*
    fn parse_shift(&mut self) -> Result<Node, SyntaxError> {
        self.nested(|p| p.parse_chain(&[ArithOp::Add, ArithOp::Sub], Self::parse_scale))
    }

    /// Parse scale: exp (("*" | "/") exp)*
    fn parse_scale(&mut self) -> Result<Node, SyntaxError> {
        self.parse_chain(&[ArithOp::Mul, ArithOp::Div], Self::parse_exp)
    }

    /// Parse exp: atom ("^" atom)*
    fn parse_exp(&mut self) -> Result<Node, SyntaxError> {
        self.parse_chain(&[ArithOp::Pow], Self::parse_atom)
    }

    /// Parse atom: FEATURE | NUMBER | STRING | "(" shift ")"
    fn parse_atom(&mut self) -> Result<Node, SyntaxError> {
        let lexeme = self.lexer.next(Mode::Operand)?;
        match &lexeme.token {
            Token::Feature(segments) => Ok(Node::FieldPath(segments.clone())),
            Token::Number(n) => Ok(Node::Number(*n)),
            Token::Quoted(literal) => Ok(Node::StringLiteral(literal.clone())),
            Token::LParen => {
                let inner = self.parse_shift()?;
                self.expect_rparen(Mode::Operator)?;
                Ok(Node::Grouping(Box::new(inner)))
            }
            _ => Err(self.unexpected("a field, a number, a string or `(`", &lexeme)),
        }
    }
}

/// Parse a query with the default field-path feature syntax.
pub fn parse(query: &str) -> Result<Node, SyntaxError> {
    parse_with(query, &FieldPath, DEFAULT_MAX_DEPTH)
}

/// Parse a query, reading feature leaves with `grammar`.
pub fn parse_with<G: FeatureGrammar + ?Sized>(
    query: &str,
    grammar: &G,
    max_depth: usize,
) -> Result<Node, SyntaxError> {
    let mut parser = Parser {
        lexer: Lexer::new(query, grammar),
        depth: 0,
        max_depth,
    };

    if query.trim().is_empty() {
        return Err(parser.lexer.error(query.len(), SyntaxErrorKind::Empty));
    }

    // A query that is not a filter may still be a bare value expression.
    let checkpoint = parser.lexer.checkpoint();
    let node = match parser.parse_whole(Parser::parse_query) {
        Ok(node) => node,
        Err(query_err) => {
            parser.lexer.reset(checkpoint);
            parser
                .parse_whole(Parser::parse_shift)
                .map_err(|value_err| {
                    if value_err.offset > query_err.offset {
                        value_err
                    } else {
                        query_err
                    }
                })?
        }
    };

    tracing::trace!("Parsed {:?} as {:?}", parser.lexer.source(), node);
    Ok(node)
}
