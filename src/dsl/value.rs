//! Runtime values and comparison coercion.

use std::borrow::Cow;
use std::fmt;

use time::format_description::well_known::Iso8601;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

use super::ast::ArithOp;
use super::error::EvalError;

/// A scalar produced by a feature, a literal or a sub-expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The field does not exist on the record.
    Absent,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Absent => "absent",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
        }
    }

    /// Normalize a comparison operand to a number.
    ///
    /// Absence is zero, booleans are one or zero, and text is read as an
    /// ISO-8601 timestamp (epoch seconds) or, failing that, a decimal number.
    pub fn coerce(&self) -> Result<f64, EvalError> {
        match self {
            Value::Absent => Ok(0.0),
            Value::Bool(b) => Ok(f64::from(u8::from(*b))),
            Value::Number(n) => Ok(*n),
            Value::Text(text) => parse_timestamp(text)
                .or_else(|| parse_decimal(text))
                .ok_or_else(|| EvalError::Coercion(text.clone())),
        }
    }

    /// The value as an arithmetic operand. Text and absence are rejected.
    fn operand(&self, op: ArithOp) -> Result<f64, EvalError> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Bool(b) => Ok(f64::from(u8::from(*b))),
            other => Err(EvalError::ArithmeticType {
                op,
                found: other.kind(),
            }),
        }
    }
}

impl ArithOp {
    pub fn apply(self, left: &Value, right: &Value) -> Result<Value, EvalError> {
        let (l, r) = (left.operand(self)?, right.operand(self)?);
        let n = match self {
            ArithOp::Add => l + r,
            ArithOp::Sub => l - r,
            ArithOp::Mul => l * r,
            ArithOp::Div if r == 0.0 => return Err(EvalError::DivisionByZero),
            ArithOp::Div => l / r,
            ArithOp::Pow => l.powf(r),
        };
        if !n.is_finite() {
            return Err(EvalError::NotFinite(self));
        }
        Ok(Value::Number(n))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Absent => write!(f, "absent"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Absent, Into::into)
    }
}

/// Parse an ISO-8601 date or date-time into epoch seconds.
///
/// Date-times without an offset are taken as UTC; a bare date is midnight UTC.
/// A single space is accepted in place of the `T` separator.
pub fn parse_timestamp(text: &str) -> Option<f64> {
    let text = text.trim();
    let text: Cow<'_, str> = if text.as_bytes().get(10) == Some(&b' ') {
        Cow::Owned(format!("{}T{}", &text[..10], &text[11..]))
    } else {
        Cow::Borrowed(text)
    };

    let datetime = OffsetDateTime::parse(&text, &Iso8601::DEFAULT)
        .or_else(|_| PrimitiveDateTime::parse(&text, &Iso8601::DEFAULT).map(|dt| dt.assume_utc()))
        .or_else(|_| Date::parse(&text, &Iso8601::DEFAULT).map(|d| d.midnight().assume_utc()))
        .ok()?;

    Some(datetime.unix_timestamp_nanos() as f64 / 1e9)
}

fn parse_decimal(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}
