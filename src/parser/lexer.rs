//! Tokenizer for PDF file and content stream syntax.

use crate::error::{Error, Result};

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    /// Integer number
    Integer(i64),
    /// Real number
    Real(f64),
    /// Name (`/Type`), with `#xx` escapes resolved
    Name(String),
    /// Literal or hexadecimal string bytes
    String(Vec<u8>),
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// `<<`
    DictStart,
    /// `>>`
    DictEnd,
    /// Any other run of regular characters (`obj`, `R`, `Tj`, `true`, ...)
    Keyword(&'a [u8]),
}

/// A byte-level lexer over PDF syntax.
///
/// The lexer never owns its input; callers reposition it freely with
/// [`Lexer::set_pos`] for lookahead and for raw reads (stream data, inline
/// image data).
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Create a lexer positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Create a lexer positioned at `pos`.
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos: pos.min(data.len()),
        }
    }

    /// Current byte offset.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Move to a byte offset.
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    /// The underlying input.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Whether the lexer has consumed all input.
    pub fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.data.get(self.pos + offset).copied()
    }

    /// Skip whitespace and `%` comments.
    pub fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if b == b'%' {
                while let Some(c) = self.peek() {
                    if c == b'\r' || c == b'\n' {
                        break;
                    }
                    self.pos += 1;
                }
                continue;
            }
            if !is_whitespace(b) {
                return;
            }
            self.pos += 1;
        }
    }

    /// Skip a single end-of-line marker (CR, LF or CRLF) if present.
    pub fn skip_eol(&mut self) {
        match self.peek() {
            Some(b'\r') => {
                self.pos += 1;
                if self.peek() == Some(b'\n') {
                    self.pos += 1;
                }
            }
            Some(b'\n') => self.pos += 1,
            _ => {}
        }
    }

    /// Read the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token<'a>>> {
        self.skip_whitespace();
        let Some(b) = self.peek() else {
            return Ok(None);
        };

        let token = match b {
            b'/' => self.read_name(),
            b'(' => Token::String(self.read_literal_string()?),
            b'<' => {
                if self.peek_at(1) == Some(b'<') {
                    self.pos += 2;
                    Token::DictStart
                } else {
                    Token::String(self.read_hex_string()?)
                }
            }
            b'>' => {
                if self.peek_at(1) == Some(b'>') {
                    self.pos += 2;
                    Token::DictEnd
                } else {
                    self.pos += 1;
                    Token::Keyword(&self.data[self.pos - 1..self.pos])
                }
            }
            b'[' => {
                self.pos += 1;
                Token::ArrayStart
            }
            b']' => {
                self.pos += 1;
                Token::ArrayEnd
            }
            b'{' | b'}' | b')' => {
                self.pos += 1;
                Token::Keyword(&self.data[self.pos - 1..self.pos])
            }
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.read_number_or_keyword(),
            _ => Token::Keyword(self.read_regular()),
        };

        Ok(Some(token))
    }

    /// Read the next token, failing at end of input.
    pub fn expect_token(&mut self) -> Result<Token<'a>> {
        let pos = self.pos;
        self.next_token()?
            .ok_or_else(|| Error::syntax(pos, "unexpected end of data"))
    }

    fn read_regular(&mut self) -> &'a [u8] {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_whitespace(b) || is_delimiter(b) {
                break;
            }
            self.pos += 1;
        }
        &self.data[start..self.pos]
    }

    fn read_name(&mut self) -> Token<'a> {
        self.pos += 1; // '/'
        let raw = self.read_regular();
        let mut name = Vec::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            if raw[i] == b'#' && i + 2 < raw.len() {
                if let (Some(h), Some(l)) = (hex_value(raw[i + 1]), hex_value(raw[i + 2])) {
                    name.push((h << 4) | l);
                    i += 3;
                    continue;
                }
            }
            name.push(raw[i]);
            i += 1;
        }
        Token::Name(String::from_utf8_lossy(&name).into_owned())
    }

    fn read_number_or_keyword(&mut self) -> Token<'a> {
        let raw = self.read_regular();
        match parse_number(raw) {
            Some(token) => token,
            None => Token::Keyword(raw),
        }
    }

    fn read_literal_string(&mut self) -> Result<Vec<u8>> {
        let start = self.pos;
        self.pos += 1; // '('
        let mut out = Vec::new();
        let mut depth = 1usize;

        loop {
            let Some(b) = self.peek() else {
                return Err(Error::syntax(start, "unterminated literal string"));
            };
            self.pos += 1;
            match b {
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    out.push(b);
                }
                b'\\' => {
                    let Some(esc) = self.peek() else {
                        return Err(Error::syntax(start, "unterminated escape"));
                    };
                    self.pos += 1;
                    match esc {
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0c),
                        b'\r' => {
                            if self.peek() == Some(b'\n') {
                                self.pos += 1;
                            }
                        }
                        b'\n' => {}
                        b'0'..=b'7' => {
                            let mut value = u32::from(esc - b'0');
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        self.pos += 1;
                                        value = value * 8 + u32::from(d - b'0');
                                    }
                                    _ => break,
                                }
                            }
                            out.push((value & 0xFF) as u8);
                        }
                        other => out.push(other),
                    }
                }
                b'\r' => {
                    // An unescaped EOL in a literal string reads as a single LF.
                    if self.peek() == Some(b'\n') {
                        self.pos += 1;
                    }
                    out.push(b'\n');
                }
                other => out.push(other),
            }
        }

        Ok(out)
    }

    fn read_hex_string(&mut self) -> Result<Vec<u8>> {
        let start = self.pos;
        self.pos += 1; // '<'
        let mut out = Vec::new();
        let mut pending: Option<u8> = None;

        loop {
            let Some(b) = self.peek() else {
                return Err(Error::syntax(start, "unterminated hex string"));
            };
            self.pos += 1;
            if b == b'>' {
                break;
            }
            if is_whitespace(b) {
                continue;
            }
            let Some(nibble) = hex_value(b) else {
                return Err(Error::syntax(self.pos - 1, "invalid hex digit"));
            };
            match pending.take() {
                Some(high) => out.push((high << 4) | nibble),
                None => pending = Some(nibble),
            }
        }

        if let Some(high) = pending {
            out.push(high << 4);
        }
        Ok(out)
    }
}

/// Parse a numeric token leniently (`4.`, `-.5`, `+3`).
fn parse_number(raw: &[u8]) -> Option<Token<'static>> {
    let text = std::str::from_utf8(raw).ok()?;
    let body = text.trim_start_matches(['+', '-']);
    if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return None;
    }
    if body.bytes().filter(|&b| b == b'.').count() > 1 {
        return None;
    }
    let negative = text.len() - body.len() > 0 && text.starts_with('-');

    if body.contains('.') {
        let digits = if body == "." { "0" } else { body };
        let value: f64 = digits.parse().ok()?;
        Some(Token::Real(if negative { -value } else { value }))
    } else {
        match body.parse::<i64>() {
            Ok(value) => Some(Token::Integer(if negative { -value } else { value })),
            Err(_) => {
                let value: f64 = body.parse().ok()?;
                Some(Token::Real(if negative { -value } else { value }))
            }
        }
    }
}

/// PDF whitespace characters.
pub fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x00' | b'\x0c')
}

/// PDF delimiter characters.
pub fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

/// Value of an ASCII hex digit.
pub fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
