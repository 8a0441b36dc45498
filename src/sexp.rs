//! Minimal s-expression reader and writer.
//!
//! The descriptor file and the `Package-Requires` header share one textual
//! grammar: symbols, quoted strings, integers, proper lists, and two-element
//! dotted pairs. Line comments start with `;` and run to end of line.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Sexp {
    Symbol(String),
    Str(String),
    Int(i64),
    List(Vec<Sexp>),
    /// A dotted pair `(car . cdr)`.
    Cons(Box<Sexp>, Box<Sexp>),
}

#[derive(Debug, Error, PartialEq)]
#[error("s-expression parse error at byte {pos}: {msg}")]
pub struct ParseError {
    pub pos: usize,
    pub msg: String,
}

impl Sexp {
    pub fn symbol(s: impl Into<String>) -> Self {
        Sexp::Symbol(s.into())
    }

    pub fn string(s: impl Into<String>) -> Self {
        Sexp::Str(s.into())
    }

    /// The symbol `nil`, used for absent optional fields.
    pub fn nil() -> Self {
        Sexp::Symbol("nil".into())
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Sexp::Symbol(s) if s == "nil")
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Sexp::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Sexp::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Symbol or string content; both are accepted where a name is expected.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Sexp::Symbol(s) | Sexp::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Sexp]> {
        match self {
            Sexp::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Sexp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sexp::Symbol(s) => write!(f, "{}", s),
            Sexp::Str(s) => {
                write!(f, "\"")?;
                for c in s.chars() {
                    match c {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        _ => write!(f, "{}", c)?,
                    }
                }
                write!(f, "\"")
            }
            Sexp::Int(n) => write!(f, "{}", n),
            Sexp::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Sexp::Cons(car, cdr) => write!(f, "({} . {})", car, cdr),
        }
    }
}

/// Parse a single s-expression, ignoring comments and surrounding whitespace.
/// Trailing non-whitespace input is an error.
pub fn parse(input: &str) -> Result<Sexp, ParseError> {
    let mut parser = Parser::new(input);
    let value = parser.parse_value()?;
    parser.skip_trivia();
    if parser.pos < parser.bytes.len() {
        return Err(parser.error("trailing input after expression"));
    }
    Ok(value)
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Parser {
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn error(&self, msg: &str) -> ParseError {
        ParseError {
            pos: self.pos,
            msg: msg.to_string(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_trivia(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                b';' => {
                    while let Some(c) = self.peek() {
                        self.pos += 1;
                        if c == b'\n' {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn parse_value(&mut self) -> Result<Sexp, ParseError> {
        self.skip_trivia();
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some(b'(') => self.parse_list(),
            Some(b')') => Err(self.error("unexpected ')'")),
            Some(b'"') => self.parse_string(),
            Some(_) => self.parse_atom(),
        }
    }

    fn parse_list(&mut self) -> Result<Sexp, ParseError> {
        self.pos += 1; // consume '('
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                None => return Err(self.error("unterminated list")),
                Some(b')') => {
                    self.pos += 1;
                    return Ok(Sexp::List(items));
                }
                Some(b'.') if self.dot_is_separator() => {
                    self.pos += 1;
                    if items.len() != 1 {
                        return Err(self.error("dotted pair must have exactly one car"));
                    }
                    let cdr = self.parse_value()?;
                    self.skip_trivia();
                    if self.peek() != Some(b')') {
                        return Err(self.error("expected ')' after dotted pair"));
                    }
                    self.pos += 1;
                    let car = items.pop().expect("one car element");
                    return Ok(Sexp::Cons(Box::new(car), Box::new(cdr)));
                }
                Some(_) => items.push(self.parse_value()?),
            }
        }
    }

    /// A lone `.` separates a dotted pair; `.5` or `.foo` would be an atom.
    fn dot_is_separator(&self) -> bool {
        matches!(
            self.bytes.get(self.pos + 1),
            None | Some(b' ' | b'\t' | b'\r' | b'\n' | b'(' | b')')
        )
    }

    fn parse_string(&mut self) -> Result<Sexp, ParseError> {
        self.pos += 1; // consume '"'
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string")),
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(Sexp::Str(out));
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(b'"') => out.push('"'),
                        Some(b'\\') => out.push('\\'),
                        Some(b'n') => out.push('\n'),
                        Some(other) => {
                            return Err(ParseError {
                                pos: self.pos,
                                msg: format!("unknown escape '\\{}'", other as char),
                            });
                        }
                        None => return Err(self.error("unterminated escape")),
                    }
                    self.pos += 1;
                }
                Some(_) => {
                    // Re-borrow as str to keep multi-byte characters intact.
                    let rest = &self.bytes[self.pos..];
                    let s = std::str::from_utf8(rest).map_err(|_| self.error("invalid utf-8"))?;
                    let c = s.chars().next().expect("non-empty remainder");
                    out.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
    }

    fn parse_atom(&mut self) -> Result<Sexp, ParseError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            match b {
                b' ' | b'\t' | b'\r' | b'\n' | b'(' | b')' | b'"' | b';' => break,
                _ => self.pos += 1,
            }
        }
        let token = std::str::from_utf8(&self.bytes[start..self.pos])
            .map_err(|_| self.error("invalid utf-8"))?;
        if token.is_empty() {
            return Err(self.error("empty atom"));
        }
        if let Ok(n) = token.parse::<i64>() {
            return Ok(Sexp::Int(n));
        }
        Ok(Sexp::Symbol(token.to_string()))
    }
}
