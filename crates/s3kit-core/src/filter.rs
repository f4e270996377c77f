//! Declarative result filter for bucket listings.
//!
//! An [`ObjectFilter`] is either built directly or parsed from a small
//! JMESPath-style language over the fields of a listed object:
//!
//! ```text
//! Contents[?Size > `50` && starts_with(Key, 'logs/')][]
//! [?StorageClass == 'GLACIER']
//! LastModified >= '2024-01-01T00:00:00Z' || !(Size < `1024`)
//! ```
//!
//! Field names are `Key`, `Size`, `ETag`, `StorageClass` and `LastModified`.
//! Literals are backtick-quoted JSON (a backtick literal that is not valid
//! JSON is read as a string), single-quoted raw strings or bare numbers.
//! Comparisons between values of different types are false, except that a
//! string compared with `LastModified` is read as an RFC 3339 timestamp.

use std::cmp::Ordering;
use std::fmt;
use std::iter::Peekable;
use std::str::{Chars, FromStr};

use chrono::{DateTime, Utc};
use s3kit_model::S3Object;

use crate::error::S3ClientError;

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

/// A field of a listed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// `Key`
    Key,
    /// `Size`
    Size,
    /// `ETag`
    ETag,
    /// `StorageClass`
    StorageClass,
    /// `LastModified`
    LastModified,
}

impl Field {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "Key" => Some(Self::Key),
            "Size" => Some(Self::Size),
            "ETag" => Some(Self::ETag),
            "StorageClass" => Some(Self::StorageClass),
            "LastModified" => Some(Self::LastModified),
            _ => None,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn value_of(self, object: &S3Object) -> Value {
        match self {
            Self::Key => Value::String(object.key.clone()),
            Self::Size => Value::Number(object.size as f64),
            Self::ETag => Value::String(object.etag.clone()),
            Self::StorageClass => Value::String(object.storage_class.clone()),
            Self::LastModified => Value::Timestamp(object.last_modified),
        }
    }
}

/// A literal or field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// JSON `null`.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number. Sizes are compared as `f64`.
    Number(f64),
    /// A string.
    String(String),
    /// A point in time.
    Timestamp(DateTime<Utc>),
}

impl From<u64> for Value {
    #[allow(clippy::cast_precision_loss)]
    fn from(n: u64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Timestamp(t)
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

/// String functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterFunction {
    /// `starts_with(subject, prefix)`
    StartsWith,
    /// `ends_with(subject, suffix)`
    EndsWith,
    /// `contains(subject, needle)`
    Contains,
}

impl FilterFunction {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "starts_with" => Some(Self::StartsWith),
            "ends_with" => Some(Self::EndsWith),
            "contains" => Some(Self::Contains),
            _ => None,
        }
    }
}

/// One side of a comparison or a function argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A field of the object under test.
    Field(Field),
    /// A constant.
    Literal(Value),
}

impl Operand {
    fn resolve(&self, object: &S3Object) -> Value {
        match self {
            Self::Field(field) => field.value_of(object),
            Self::Literal(value) => value.clone(),
        }
    }
}

/// A predicate over listed objects.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectFilter {
    /// `left op right`
    Compare {
        /// Left-hand operand.
        left: Operand,
        /// Operator.
        op: CompareOp,
        /// Right-hand operand.
        right: Operand,
    },
    /// `function(subject, argument)`
    Call {
        /// The function.
        function: FilterFunction,
        /// The string searched.
        subject: Operand,
        /// The string searched for.
        argument: Operand,
    },
    /// Both filters match.
    And(Box<ObjectFilter>, Box<ObjectFilter>),
    /// Either filter matches.
    Or(Box<ObjectFilter>, Box<ObjectFilter>),
    /// The filter does not match.
    Not(Box<ObjectFilter>),
}

impl ObjectFilter {
    /// Compare a field with a constant.
    ///
    /// ```
    /// use s3kit_core::filter::{CompareOp, Field, ObjectFilter};
    ///
    /// let filter = ObjectFilter::compare(Field::Size, CompareOp::Gt, 50u64);
    /// assert_eq!(filter, "Contents[?Size > `50`][]".parse::<ObjectFilter>().unwrap());
    /// ```
    pub fn compare(field: Field, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare {
            left: Operand::Field(field),
            op,
            right: Operand::Literal(value.into()),
        }
    }

    /// Both `self` and `other` match.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    /// Either `self` or `other` matches.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    /// Parse a filter expression.
    ///
    /// # Errors
    ///
    /// Returns [`S3ClientError::InvalidFilter`] if the expression is malformed
    /// or names an unknown field or function.
    pub fn parse(input: &str) -> Result<Self, S3ClientError> {
        let tokens = Lexer::new(input).tokenize()?;
        Parser::new(tokens).parse_query()
    }

    /// Whether `object` satisfies the filter.
    #[must_use]
    pub fn matches(&self, object: &S3Object) -> bool {
        match self {
            Self::Compare { left, op, right } => {
                let ordering = compare_values(&left.resolve(object), &right.resolve(object));
                match op {
                    CompareOp::Eq => ordering == Some(Ordering::Equal),
                    CompareOp::Ne => ordering != Some(Ordering::Equal),
                    CompareOp::Lt => ordering == Some(Ordering::Less),
                    CompareOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                    CompareOp::Gt => ordering == Some(Ordering::Greater),
                    CompareOp::Ge => {
                        matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
                    }
                }
            }
            Self::Call {
                function,
                subject,
                argument,
            } => {
                let (Value::String(subject), Value::String(argument)) =
                    (subject.resolve(object), argument.resolve(object))
                else {
                    return false;
                };
                match function {
                    FilterFunction::StartsWith => subject.starts_with(&argument),
                    FilterFunction::EndsWith => subject.ends_with(&argument),
                    FilterFunction::Contains => subject.contains(&argument),
                }
            }
            Self::And(left, right) => left.matches(object) && right.matches(object),
            Self::Or(left, right) => left.matches(object) || right.matches(object),
            Self::Not(inner) => !inner.matches(object),
        }
    }

    /// Keep the objects that satisfy the filter, preserving order.
    #[must_use]
    pub fn apply(&self, objects: Vec<S3Object>) -> Vec<S3Object> {
        objects.into_iter().filter(|o| self.matches(o)).collect()
    }
}

impl FromStr for ObjectFilter {
    type Err = S3ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
        (Value::Timestamp(a), Value::String(b)) => parse_timestamp(b).map(|b| a.cmp(&b)),
        (Value::String(a), Value::Timestamp(b)) => parse_timestamp(a).map(|a| a.cmp(b)),
        _ => None,
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Identifier(String),
    Literal(Value),
    Op(CompareOp),
    And,
    Or,
    Not,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Question,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(s) => write!(f, "identifier '{s}'"),
            Self::Literal(v) => write!(f, "literal {v:?}"),
            Self::Op(op) => write!(f, "operator {op:?}"),
            Self::And => f.write_str("'&&'"),
            Self::Or => f.write_str("'||'"),
            Self::Not => f.write_str("'!'"),
            Self::Comma => f.write_str("','"),
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
            Self::LBracket => f.write_str("'['"),
            Self::RBracket => f.write_str("']'"),
            Self::Question => f.write_str("'?'"),
            Self::Eof => f.write_str("end of input"),
        }
    }
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn tokenize(&mut self) -> Result<Vec<Token>, S3ClientError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let end = token == Token::Eof;
            tokens.push(token);
            if end {
                return Ok(tokens);
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, S3ClientError> {
        while self.chars.peek().is_some_and(char::is_ascii_whitespace) {
            self.chars.next();
        }

        let Some(&ch) = self.chars.peek() else {
            return Ok(Token::Eof);
        };

        let single = match ch {
            ',' => Some(Token::Comma),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            '?' => Some(Token::Question),
            _ => None,
        };
        if let Some(token) = single {
            self.chars.next();
            return Ok(token);
        }

        match ch {
            '&' => self.read_pair('&', Token::And),
            '|' => self.read_pair('|', Token::Or),
            '=' => self.read_pair('=', Token::Op(CompareOp::Eq)),
            '!' => Ok(self.read_with_eq(Token::Not, CompareOp::Ne)),
            '<' => Ok(self.read_with_eq(Token::Op(CompareOp::Lt), CompareOp::Le)),
            '>' => Ok(self.read_with_eq(Token::Op(CompareOp::Gt), CompareOp::Ge)),
            '`' => self.read_json_literal(),
            '\'' => self.read_raw_string(),
            '"' => self.read_quoted_identifier(),
            c if c.is_ascii_digit() || c == '-' => self.read_number(),
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&c) = self.chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        ident.push(c);
                        self.chars.next();
                    } else {
                        break;
                    }
                }
                Ok(Token::Identifier(ident))
            }
            other => Err(invalid(format!("unexpected character '{other}'"))),
        }
    }

    fn read_pair(&mut self, second: char, token: Token) -> Result<Token, S3ClientError> {
        let first = self.chars.next();
        if self.chars.next_if_eq(&second).is_some() {
            Ok(token)
        } else {
            Err(invalid(format!(
                "expected '{}{second}'",
                first.unwrap_or(second)
            )))
        }
    }

    fn read_with_eq(&mut self, alone: Token, with_eq: CompareOp) -> Token {
        self.chars.next();
        if self.chars.next_if_eq(&'=').is_some() {
            Token::Op(with_eq)
        } else {
            alone
        }
    }

    /// Read up to the unescaped `delimiter`, which has already been consumed.
    fn read_delimited(&mut self, delimiter: char) -> Result<String, S3ClientError> {
        let mut s = String::new();
        loop {
            match self.chars.next() {
                Some('\\') if self.chars.peek() == Some(&delimiter) => {
                    s.push(delimiter);
                    self.chars.next();
                }
                Some(c) if c == delimiter => return Ok(s),
                Some(c) => s.push(c),
                None => return Err(invalid(format!("unterminated {delimiter} literal"))),
            }
        }
    }

    fn read_json_literal(&mut self) -> Result<Token, S3ClientError> {
        self.chars.next();
        let raw = self.read_delimited('`')?;
        let value = match serde_json::from_str::<serde_json::Value>(raw.trim()) {
            Ok(serde_json::Value::Null) => Value::Null,
            Ok(serde_json::Value::Bool(b)) => Value::Bool(b),
            Ok(serde_json::Value::Number(n)) => Value::Number(
                n.as_f64()
                    .ok_or_else(|| invalid(format!("number out of range: {n}")))?,
            ),
            Ok(serde_json::Value::String(s)) => Value::String(s),
            Ok(_) => return Err(invalid(format!("unsupported literal `{raw}`"))),
            Err(_) => Value::String(raw),
        };
        Ok(Token::Literal(value))
    }

    fn read_raw_string(&mut self) -> Result<Token, S3ClientError> {
        self.chars.next();
        Ok(Token::Literal(Value::String(self.read_delimited('\'')?)))
    }

    fn read_quoted_identifier(&mut self) -> Result<Token, S3ClientError> {
        self.chars.next();
        Ok(Token::Identifier(self.read_delimited('"')?))
    }

    fn read_number(&mut self) -> Result<Token, S3ClientError> {
        let mut s = String::new();
        if let Some(minus) = self.chars.next_if_eq(&'-') {
            s.push(minus);
        }
        while let Some(c) = self.chars.next_if(|c| c.is_ascii_digit() || *c == '.') {
            s.push(c);
        }
        s.parse::<f64>()
            .map(|n| Token::Literal(Value::Number(n)))
            .map_err(|_| invalid(format!("invalid number '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<(), S3ClientError> {
        let token = self.advance();
        if &token == expected {
            Ok(())
        } else {
            Err(invalid(format!("expected {expected}, found {token}")))
        }
    }

    /// `Contents[?expr][]`, `[?expr]` or a bare expression.
    fn parse_query(&mut self) -> Result<ObjectFilter, S3ClientError> {
        if matches!(self.peek(), Token::Identifier(name) if name == "Contents")
            && self.tokens.get(self.pos + 1) == Some(&Token::LBracket)
        {
            self.advance();
        }

        let filter = if self.peek() == &Token::LBracket {
            self.advance();
            self.expect(&Token::Question)?;
            let filter = self.parse_or()?;
            self.expect(&Token::RBracket)?;
            if self.peek() == &Token::LBracket {
                self.advance();
                self.expect(&Token::RBracket)?;
            }
            filter
        } else {
            self.parse_or()?
        };

        self.expect(&Token::Eof)?;
        Ok(filter)
    }

    fn parse_or(&mut self) -> Result<ObjectFilter, S3ClientError> {
        let mut left = self.parse_and()?;
        while self.peek() == &Token::Or {
            self.advance();
            left = left.or(self.parse_and()?);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<ObjectFilter, S3ClientError> {
        let mut left = self.parse_not()?;
        while self.peek() == &Token::And {
            self.advance();
            left = left.and(self.parse_not()?);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<ObjectFilter, S3ClientError> {
        if self.peek() == &Token::Not {
            self.advance();
            return Ok(ObjectFilter::Not(Box::new(self.parse_not()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<ObjectFilter, S3ClientError> {
        if self.peek() == &Token::LParen {
            self.advance();
            let filter = self.parse_or()?;
            self.expect(&Token::RParen)?;
            return Ok(filter);
        }

        if let Token::Identifier(name) = self.peek() {
            if self.tokens.get(self.pos + 1) == Some(&Token::LParen) {
                let function = FilterFunction::from_name(name)
                    .ok_or_else(|| invalid(format!("unknown function '{name}'")))?;
                self.advance();
                self.advance();
                let subject = self.parse_operand()?;
                self.expect(&Token::Comma)?;
                let argument = self.parse_operand()?;
                self.expect(&Token::RParen)?;
                return Ok(ObjectFilter::Call {
                    function,
                    subject,
                    argument,
                });
            }
        }

        let left = self.parse_operand()?;
        let op = match self.advance() {
            Token::Op(op) => op,
            other => return Err(invalid(format!("expected comparison operator, found {other}"))),
        };
        let right = self.parse_operand()?;
        Ok(ObjectFilter::Compare { left, op, right })
    }

    fn parse_operand(&mut self) -> Result<Operand, S3ClientError> {
        match self.advance() {
            Token::Identifier(name) => Field::from_name(&name)
                .map(Operand::Field)
                .ok_or_else(|| invalid(format!("unknown field '{name}'"))),
            Token::Literal(value) => Ok(Operand::Literal(value)),
            other => Err(invalid(format!("expected field or literal, found {other}"))),
        }
    }
}

fn invalid(message: String) -> S3ClientError {
    S3ClientError::InvalidFilter(message)
}
