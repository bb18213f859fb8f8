//! Recursive-descent parser for descriptor strings.
//!
//! Grammar:
//!
//! ```text
//! shape   := (dim ',')* element
//! dim     := NUMBER | 'var'
//! element := SCALAR_TOKEN | record
//! record  := '{' (field (';' field)*)? '}'
//! field   := NAME ':' shape
//! ```
//!
//! A shape inside a record terminates at the enclosing `;` or `}`.

use super::{DataShape, Dim, ElementType};
use crate::error::ShapeError;
use crate::scalar::ScalarType;

pub fn parse(text: &str) -> Result<DataShape, ShapeError> {
    let mut parser = Parser::new(text);
    let shape = parser.parse_shape()?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(parser.err("unexpected trailing input"));
    }
    Ok(shape)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn err(&self, message: impl Into<String>) -> ShapeError {
        ShapeError::Malformed {
            position: self.pos,
            message: message.into(),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    /// Consume `c` if it is next; the caller has already skipped whitespace.
    fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Lex `[0-9]+`; the caller has peeked a digit.
    fn lex_number(&mut self) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    /// Lex `[A-Za-z_][A-Za-z0-9_]*`; the caller has peeked a word start.
    fn lex_ident(&mut self) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c == b'_' || c.is_ascii_alphanumeric()) {
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    fn parse_shape(&mut self) -> Result<DataShape, ShapeError> {
        let mut dims = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b'{') => {
                    let element = self.parse_record()?;
                    return Ok(DataShape::new(dims, element));
                }
                Some(c) if c.is_ascii_digit() => {
                    let literal = self.lex_number();
                    self.skip_ws();
                    if !self.eat(b',') {
                        return Err(self.err("descriptor must end with an element type"));
                    }
                    let extent: u64 = literal
                        .parse()
                        .map_err(|_| self.err("dimension extent out of range"))?;
                    if extent == 0 {
                        return Err(self.err("dimension extent must be positive"));
                    }
                    dims.push(Dim::Fixed(extent));
                }
                Some(c) if c == b'_' || c.is_ascii_alphabetic() => {
                    let word = self.lex_ident();
                    self.skip_ws();
                    if self.eat(b',') {
                        if word == "var" {
                            dims.push(Dim::Var);
                        } else {
                            return Err(self.err("dimension must be a fixed extent or `var`"));
                        }
                    } else {
                        if word == "var" {
                            return Err(self.err("descriptor must end with an element type"));
                        }
                        let elem = ScalarType::from_token(word)
                            .ok_or_else(|| self.err(format!("unknown element type `{word}`")))?;
                        return Ok(DataShape::new(dims, ElementType::Scalar(elem)));
                    }
                }
                _ => return Err(self.err("expected a dimension or element type")),
            }
        }
    }

    fn parse_record(&mut self) -> Result<ElementType, ShapeError> {
        self.eat(b'{');
        let mut fields = Vec::new();
        self.skip_ws();
        if self.eat(b'}') {
            return Ok(ElementType::Record(fields));
        }
        loop {
            self.skip_ws();
            let name = match self.peek() {
                Some(c) if c == b'_' || c.is_ascii_alphabetic() => self.lex_ident().to_string(),
                _ => return Err(self.err("expected a record field name")),
            };
            self.skip_ws();
            if !self.eat(b':') {
                return Err(self.err("expected `:` after record field name"));
            }
            let shape = self.parse_shape()?;
            fields.push((name, shape));
            self.skip_ws();
            if self.eat(b';') {
                continue;
            }
            if self.eat(b'}') {
                return Ok(ElementType::Record(fields));
            }
            return Err(self.err("expected `;` or `}` in record"));
        }
    }
}
