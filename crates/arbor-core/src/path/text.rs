//! Canonical text form of paths
//!
//! Grammar:
//!
//! ```text
//! path    := first? rest*
//! first   := ident | index | quoted
//! rest    := "." ident | index | quoted
//! index   := "[" digits "]"
//! quoted  := "[" '"' (char | '\"' | '\\')* '"' "]"
//! ident   := [A-Za-z_][A-Za-z0-9_]*
//! ```
//!
//! Field names that are not identifiers are written quoted, so every path
//! formats to text that parses back to the same path.

use std::fmt;

use super::{NodePath, PathPart};
use crate::errors::{ArborError, Result};

fn is_ident(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub(super) fn write_path(f: &mut fmt::Formatter<'_>, parts: &[PathPart]) -> fmt::Result {
    for (i, part) in parts.iter().enumerate() {
        match part {
            PathPart::Index(index) => write!(f, "[{}]", index)?,
            PathPart::Field(name) if is_ident(name) => {
                if i > 0 {
                    f.write_str(".")?;
                }
                f.write_str(name)?;
            }
            PathPart::Field(name) => {
                f.write_str("[\"")?;
                for c in name.chars() {
                    if c == '"' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{}", c)?;
                }
                f.write_str("\"]")?;
            }
        }
    }
    Ok(())
}

struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, reason: impl Into<String>) -> ArborError {
        ArborError::PathParse {
            input: self.input.to_string(),
            offset: self.pos,
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", byte as char)))
        }
    }

    fn ident(&mut self) -> Result<PathPart> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == b'_' => self.pos += 1,
            _ => return Err(self.error("expected field name")),
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
            self.pos += 1;
        }
        Ok(PathPart::Field(self.input[start..self.pos].to_string()))
    }

    fn bracket(&mut self) -> Result<PathPart> {
        self.expect(b'[')?;
        let part = if self.peek() == Some(b'"') {
            self.quoted()?
        } else {
            self.digits()?
        };
        self.expect(b']')?;
        Ok(part)
    }

    fn digits(&mut self) -> Result<PathPart> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected index digits"));
        }
        let digits = &self.input[start..self.pos];
        if digits.len() > 1 && digits.starts_with('0') {
            self.pos = start;
            return Err(self.error("index has leading zero"));
        }
        digits
            .parse::<usize>()
            .map(PathPart::Index)
            .map_err(|_| self.error("index out of range"))
    }

    fn quoted(&mut self) -> Result<PathPart> {
        self.expect(b'"')?;
        let mut name = String::new();
        let rest = &self.input[self.pos..];
        let mut chars = rest.char_indices();
        while let Some((offset, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += offset + 1;
                    return Ok(PathPart::Field(name));
                }
                '\\' => match chars.next() {
                    Some((_, escaped @ ('"' | '\\'))) => name.push(escaped),
                    _ => {
                        self.pos += offset;
                        return Err(self.error("invalid escape in quoted field"));
                    }
                },
                other => name.push(other),
            }
        }
        self.pos = self.input.len();
        Err(self.error("unterminated quoted field"))
    }
}

pub(super) fn parse(input: &str) -> Result<NodePath> {
    let mut parser = Parser {
        input,
        bytes: input.as_bytes(),
        pos: 0,
    };
    let mut parts = Vec::new();

    while let Some(c) = parser.peek() {
        let part = match c {
            b'[' => parser.bracket()?,
            b'.' if !parts.is_empty() => {
                parser.pos += 1;
                parser.ident()?
            }
            _ if parts.is_empty() => parser.ident()?,
            _ => return Err(parser.error("expected '.' or '['")),
        };
        parts.push(part);
    }

    Ok(NodePath::from_parts(parts))
}
