//! Lexer/tokenizer for the query language.
//!
//! The same characters mean different things depending on where the parser
//! is: `-` negates a tag at filter level but subtracts between two operands,
//! and `4` is a tag pattern on its own but a number inside a comparison. The
//! parser therefore asks for each token in a [`Mode`].

use winnow::ascii::{digit0, digit1, multispace0};
use winnow::combinator::{alt, opt};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{one_of, take_while};

use super::ast::{ArithOp, CompareOp};
use super::error::{SyntaxError, SyntaxErrorKind};
use super::feature::FeatureGrammar;

// Manually define PResult for resilience against winnow version changes
pub type PResult<T> = Result<T, ErrMode<ContextError>>;

/// Token types for the query language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Filter level
    Pattern(String), // bare word run, trailing spaces dropped
    Quoted(String),  // unescaped string contents
    Comma,           // ,
    Pipe,            // |
    Minus,           // - (negation)

    // Operand level
    Number(f64),
    Feature(Vec<String>),

    // Operator level
    Compare(CompareOp),
    Arith(ArithOp),

    // Punctuation
    LParen, // (
    RParen, // )

    // End of input
    Eof,
}

impl Token {
    /// Short description used in "expected X, found Y" errors.
    pub fn describe(&self) -> String {
        match self {
            Token::Pattern(p) => format!("tag pattern {p:?}"),
            Token::Quoted(s) => format!("string {s:?}"),
            Token::Comma => "`,`".into(),
            Token::Pipe => "`|`".into(),
            Token::Minus => "`-`".into(),
            Token::Number(n) => format!("number {n}"),
            Token::Feature(segments) => format!("field `.{}`", segments.join(".")),
            Token::Compare(op) => format!("`{op}`"),
            Token::Arith(op) => format!("`{op}`"),
            Token::LParen => "`(`".into(),
            Token::RParen => "`)`".into(),
            Token::Eof => "end of query".into(),
        }
    }
}

/// Which token set the parser expects next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Tags, quoted tags, `-`, `,`, `|` and parentheses.
    Filter,
    /// A comparison or arithmetic operand: feature, number, string or `(`.
    Operand,
    /// After an operand: comparators, arithmetic operators and closers.
    Operator,
}

/// A token and the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub offset: usize,
}

/// Saved lexer position for backtracking.
#[derive(Debug, Clone, Copy)]
pub struct Checkpoint<'a>(&'a str);

pub struct Lexer<'a, G: ?Sized> {
    source: &'a str,
    rest: &'a str,
    grammar: &'a G,
}

impl<G: ?Sized> Clone for Lexer<'_, G> {
    fn clone(&self) -> Self {
        Self {
            source: self.source,
            rest: self.rest,
            grammar: self.grammar,
        }
    }
}

impl<'a, G: FeatureGrammar + ?Sized> Lexer<'a, G> {
    pub fn new(source: &'a str, grammar: &'a G) -> Self {
        Self {
            source,
            rest: source,
            grammar,
        }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Byte offset of the next unread character.
    pub fn offset(&self) -> usize {
        self.source.len() - self.rest.len()
    }

    pub fn checkpoint(&self) -> Checkpoint<'a> {
        Checkpoint(self.rest)
    }

    pub fn reset(&mut self, checkpoint: Checkpoint<'a>) {
        self.rest = checkpoint.0;
    }

    pub fn error(&self, offset: usize, kind: SyntaxErrorKind) -> SyntaxError {
        SyntaxError::new(self.source, offset, kind)
    }

    /// Look at the next token without consuming it.
    pub fn peek(&self, mode: Mode) -> Result<Lexeme, SyntaxError> {
        self.clone().next(mode)
    }

    /// Consume the next token.
    pub fn next(&mut self, mode: Mode) -> Result<Lexeme, SyntaxError> {
        let _ = multispace0::<_, ContextError>.parse_next(&mut self.rest);
        let offset = self.offset();

        if self.rest.is_empty() {
            return Ok(Lexeme {
                token: Token::Eof,
                offset,
            });
        }

        if self.rest.starts_with('"') {
            let token = lex_quoted(&mut self.rest)
                .map(Token::Quoted)
                .map_err(|(at, kind)| self.error(offset + at, kind))?;
            return Ok(Lexeme { token, offset });
        }

        let lexed = match mode {
            Mode::Filter => lex_filter_token.parse_next(&mut self.rest),
            Mode::Operand => self.lex_operand(),
            Mode::Operator => lex_operator_token.parse_next(&mut self.rest),
        };

        match lexed {
            Ok(token) => Ok(Lexeme { token, offset }),
            Err(_) => {
                let c = self.rest.chars().next().unwrap_or_default();
                Err(self.error(offset, SyntaxErrorKind::UnexpectedChar(c)))
            }
        }
    }

    fn lex_operand(&mut self) -> PResult<Token> {
        let checkpoint = self.rest;
        if let Ok(segments) = self.grammar.parse_feature(&mut self.rest) {
            return Ok(Token::Feature(segments));
        }
        self.rest = checkpoint;

        alt(("(".value(Token::LParen), lex_number.map(Token::Number))).parse_next(&mut self.rest)
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Lex a tag pattern: a word character followed by word characters or spaces.
fn lex_pattern(input: &mut &str) -> PResult<Token> {
    let text = (
        take_while(1, is_word_char),
        take_while(0.., |c: char| is_word_char(c) || c == ' '),
    )
        .take()
        .parse_next(input)?;
    Ok(Token::Pattern(text.trim_end().to_string()))
}

/// Lex a signed decimal number with optional fraction and exponent.
fn lex_number(input: &mut &str) -> PResult<f64> {
    let text = (
        opt(one_of(['+', '-'])),
        alt(((digit1, opt(('.', digit0))).void(), ('.', digit1).void())),
        opt((one_of(['e', 'E']), opt(one_of(['+', '-'])), digit1)),
    )
        .take()
        .parse_next(input)?;
    text.parse()
        .map_err(|_| ErrMode::Backtrack(ContextError::default()))
}

fn lex_filter_token(input: &mut &str) -> PResult<Token> {
    alt((
        ",".value(Token::Comma),
        "|".value(Token::Pipe),
        "-".value(Token::Minus),
        "(".value(Token::LParen),
        ")".value(Token::RParen),
        lex_pattern,
    ))
    .parse_next(input)
}

fn lex_operator_token(input: &mut &str) -> PResult<Token> {
    alt((
        // Multi-char comparators first
        "<=".value(Token::Compare(CompareOp::Le)),
        ">=".value(Token::Compare(CompareOp::Ge)),
        "==".value(Token::Compare(CompareOp::Eq)),
        "<".value(Token::Compare(CompareOp::Lt)),
        ">".value(Token::Compare(CompareOp::Gt)),
        "=".value(Token::Compare(CompareOp::Eq)),
        "+".value(Token::Arith(ArithOp::Add)),
        "-".value(Token::Arith(ArithOp::Sub)),
        "*".value(Token::Arith(ArithOp::Mul)),
        "/".value(Token::Arith(ArithOp::Div)),
        "^".value(Token::Arith(ArithOp::Pow)),
        ",".value(Token::Comma),
        "|".value(Token::Pipe),
        ")".value(Token::RParen),
    ))
    .parse_next(input)
}

/// Lex a double-quoted string and unescape it. Errors carry the offset of the
/// problem relative to the opening quote.
fn lex_quoted(input: &mut &str) -> Result<String, (usize, SyntaxErrorKind)> {
    let body = &input[1..];
    let mut out = String::new();
    let mut chars = body.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '"' => {
                *input = &body[i + 1..];
                return Ok(out);
            }
            '\\' => {
                let Some((_, escaped)) = chars.next() else {
                    break;
                };
                let unescaped = match escaped {
                    '"' => '"',
                    '\\' => '\\',
                    '/' => '/',
                    '\'' => '\'',
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    'b' => '\u{8}',
                    'f' => '\u{c}',
                    '0' => '\0',
                    'u' => {
                        let hex = body.get(i + 2..i + 6).unwrap_or_default();
                        let code = (hex.len() == 4)
                            .then(|| u32::from_str_radix(hex, 16).ok())
                            .flatten()
                            .and_then(char::from_u32)
                            .ok_or((i + 1, SyntaxErrorKind::InvalidEscape('u')))?;
                        for _ in 0..4 {
                            chars.next();
                        }
                        code
                    }
                    other => return Err((i + 1, SyntaxErrorKind::InvalidEscape(other))),
                };
                out.push(unescaped);
            }
            c => out.push(c),
        }
    }

    Err((0, SyntaxErrorKind::UnterminatedString))
}
