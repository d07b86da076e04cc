//! Parser for the dict-literal text that trails a stringified record, e.g.
//! `{'source': 'data/docs/paper1.pdf', 'page': 3}`.
//!
//! Only literals are accepted: strings, numbers, `True`/`False`/`None`,
//! lists, tuples (read as lists) and nested dicts. Dict keys must be strings.

use std::num::IntErrorKind;

use crate::error::ReferenceError;
use crate::models::{Metadata, MetadataValue};

pub fn parse_mapping(text: &str) -> Result<Metadata, ReferenceError> {
    let mut parser = Parser::new(text);
    parser.skip_ws();
    let mapping = parser.parse_dict()?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(parser.error("unexpected input after closing brace"));
    }
    Ok(mapping)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn error(&self, reason: &str) -> ReferenceError {
        ReferenceError::MetadataParse {
            position: self.pos,
            reason: reason.to_string(),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn expect(&mut self, wanted: char) -> Result<(), ReferenceError> {
        match self.peek() {
            Some(c) if c == wanted => {
                self.pos += c.len_utf8();
                Ok(())
            }
            _ => Err(self.error(&format!("expected '{}'", wanted))),
        }
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn parse_value(&mut self) -> Result<MetadataValue, ReferenceError> {
        match self.peek() {
            Some('{') => Ok(MetadataValue::Map(self.parse_dict()?)),
            Some('[') => self.parse_sequence('[', ']').map(MetadataValue::List),
            Some('(') => self.parse_sequence('(', ')').map(MetadataValue::List),
            Some(q @ ('\'' | '"')) => self.parse_string(q).map(MetadataValue::Str),
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => self.parse_number(),
            Some(c) if c.is_ascii_alphabetic() => self.parse_keyword(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn parse_dict(&mut self) -> Result<Metadata, ReferenceError> {
        self.expect('{')?;
        let mut mapping = Metadata::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.pos += 1;
                return Ok(mapping);
            }

            let key = match self.peek() {
                Some(q @ ('\'' | '"')) => self.parse_string(q)?,
                _ => return Err(self.error("dict keys must be strings")),
            };
            self.skip_ws();
            self.expect(':')?;
            self.skip_ws();
            let value = self.parse_value()?;
            mapping.insert(key, value);

            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(mapping),
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn parse_sequence(
        &mut self,
        open: char,
        close: char,
    ) -> Result<Vec<MetadataValue>, ReferenceError> {
        self.expect(open)?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(items);
            }
            items.push(self.parse_value()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(c) if c == close => return Ok(items),
                _ => return Err(self.error(&format!("expected ',' or '{}'", close))),
            }
        }
    }

    fn parse_string(&mut self, quote: char) -> Result<String, ReferenceError> {
        self.expect(quote)?;
        let mut out = String::new();
        loop {
            let c = self.bump().ok_or_else(|| self.error("unterminated string"))?;
            if c == quote {
                return Ok(out);
            }
            if c != '\\' {
                out.push(c);
                continue;
            }

            let escaped = self.bump().ok_or_else(|| self.error("unterminated string"))?;
            match escaped {
                '\n' => {}
                '\\' | '\'' | '"' => out.push(escaped),
                'a' => out.push('\u{07}'),
                'b' => out.push('\u{08}'),
                'f' => out.push('\u{0c}'),
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                'v' => out.push('\u{0b}'),
                '0'..='7' => out.push(self.parse_octal_escape(escaped)),
                'x' => out.push(self.parse_hex_escape(2)?),
                'u' => out.push(self.parse_hex_escape(4)?),
                'U' => out.push(self.parse_hex_escape(8)?),
                other => {
                    out.push('\\');
                    out.push(other);
                }
            }
        }
    }

    /// Up to three octal digits, the first already consumed.
    fn parse_octal_escape(&mut self, first: char) -> char {
        let mut code = first.to_digit(8).unwrap_or(0);
        for _ in 0..2 {
            match self.peek().and_then(|c| c.to_digit(8)) {
                Some(digit) => {
                    code = code * 8 + digit;
                    self.pos += 1;
                }
                None => break,
            }
        }
        // At most 0o777.
        char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER)
    }

    fn parse_hex_escape(&mut self, digits: usize) -> Result<char, ReferenceError> {
        let hex = self
            .src
            .get(self.pos..self.pos + digits)
            .filter(|h| h.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| self.error("truncated escape sequence"))?;
        let code = u32::from_str_radix(hex, 16).map_err(|_| self.error("bad escape sequence"))?;
        let c = char::from_u32(code).ok_or_else(|| self.error("escape is not a valid character"))?;
        self.pos += digits;
        Ok(c)
    }

    fn parse_number(&mut self) -> Result<MetadataValue, ReferenceError> {
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.pos += 1;
        }
        let mut prev = ' ';
        while let Some(c) = self.peek() {
            let sign_in_exponent = matches!(c, '-' | '+') && matches!(prev, 'e' | 'E');
            if !(c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '_') || sign_in_exponent) {
                break;
            }
            prev = c;
            self.pos += 1;
        }

        let literal: String = self.src[start..self.pos].chars().filter(|&c| c != '_').collect();
        let is_float = literal.contains(['.', 'e', 'E']);
        let parsed = if is_float {
            literal.parse::<f64>().ok().map(MetadataValue::Float)
        } else {
            match literal.parse::<i64>() {
                Ok(n) => Some(MetadataValue::Int(n)),
                // Too wide for i64: keep the digits so they still print as written.
                Err(e) if matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => {
                    Some(MetadataValue::Str(literal.clone()))
                }
                Err(_) => None,
            }
        };
        parsed.ok_or(ReferenceError::MetadataParse {
            position: start,
            reason: format!("invalid number literal '{}'", literal),
        })
    }

    fn parse_keyword(&mut self) -> Result<MetadataValue, ReferenceError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        match &self.src[start..self.pos] {
            "True" => Ok(MetadataValue::Bool(true)),
            "False" => Ok(MetadataValue::Bool(false)),
            "None" => Ok(MetadataValue::Null),
            word => Err(ReferenceError::MetadataParse {
                position: start,
                reason: format!("'{}' is not a literal", word),
            }),
        }
    }
}
