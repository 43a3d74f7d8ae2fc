//! CMap parsing: ToUnicode maps and embedded CID encodings.

use crate::parser::lexer::{Lexer, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CodeSpace {
    low: u32,
    high: u32,
    bytes: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum RangeTarget {
    /// First destination as UTF-16 units; later codes bump the last unit
    Start(Vec<u16>),
    /// One destination per code
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
struct UnicodeRange {
    low: u32,
    high: u32,
    target: RangeTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CidRange {
    low: u32,
    high: u32,
    cid: u32,
}

/// A parsed CMap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CMap {
    codespace: Vec<CodeSpace>,
    chars: std::collections::HashMap<u32, String>,
    ranges: Vec<UnicodeRange>,
    cid_ranges: Vec<CidRange>,
}

impl CMap {
    /// A two-byte CMap whose codes are their own CIDs.
    pub fn identity() -> Self {
        Self {
            codespace: vec![CodeSpace {
                low: 0,
                high: 0xFFFF,
                bytes: 2,
            }],
            cid_ranges: vec![CidRange {
                low: 0,
                high: 0xFFFF,
                cid: 0,
            }],
            ..Default::default()
        }
    }

    /// Parse CMap program text. Malformed sections are skipped.
    pub fn parse(data: &[u8]) -> Self {
        let mut cmap = CMap::default();
        let mut lexer = Lexer::new(data);
        let mut operands: Vec<Token<'_>> = Vec::new();

        loop {
            let token = match lexer.next_token() {
                Ok(Some(token)) => token,
                Ok(None) => break,
                Err(err) => {
                    log::debug!("CMap parsing stopped: {}", err);
                    break;
                }
            };
            match token {
                Token::Keyword(b"begincodespacerange") => cmap.read_codespace(&mut lexer),
                Token::Keyword(b"beginbfchar") => cmap.read_bfchar(&mut lexer),
                Token::Keyword(b"beginbfrange") => cmap.read_bfrange(&mut lexer),
                Token::Keyword(b"begincidrange") => cmap.read_cidrange(&mut lexer),
                Token::Keyword(b"begincidchar") => cmap.read_cidchar(&mut lexer),
                Token::Keyword(b"usecmap") => {
                    if let Some(Token::Name(name)) = operands.last() {
                        if name.starts_with("Identity") {
                            let identity = CMap::identity();
                            cmap.codespace.extend(identity.codespace);
                            cmap.cid_ranges.extend(identity.cid_ranges);
                        }
                    }
                }
                other => {
                    operands.push(other);
                    if operands.len() > 4 {
                        operands.remove(0);
                    }
                }
            }
        }
        cmap
    }

    fn read_section<'a>(lexer: &mut Lexer<'a>, end: &[u8]) -> Vec<Token<'a>> {
        let mut tokens = Vec::new();
        let mut depth = 0usize;
        let mut array: Vec<Token<'a>> = Vec::new();
        while let Ok(Some(token)) = lexer.next_token() {
            match token {
                Token::Keyword(k) if k == end => break,
                Token::ArrayStart => depth += 1,
                Token::ArrayEnd if depth > 0 => {
                    depth -= 1;
                    tokens.push(Token::Keyword(b"["));
                    tokens.append(&mut array);
                    tokens.push(Token::Keyword(b"]"));
                }
                other if depth > 0 => array.push(other),
                other => tokens.push(other),
            }
        }
        tokens
    }

    fn read_codespace(&mut self, lexer: &mut Lexer<'_>) {
        let tokens = Self::read_section(lexer, b"endcodespacerange");
        for pair in tokens.chunks_exact(2) {
            if let (Token::String(low), Token::String(high)) = (&pair[0], &pair[1]) {
                if low.is_empty() || low.len() > 4 {
                    continue;
                }
                self.codespace.push(CodeSpace {
                    low: be_code(low),
                    high: be_code(high),
                    bytes: low.len(),
                });
            }
        }
    }

    fn read_bfchar(&mut self, lexer: &mut Lexer<'_>) {
        let tokens = Self::read_section(lexer, b"endbfchar");
        for pair in tokens.chunks_exact(2) {
            let Token::String(src) = &pair[0] else { continue };
            let text = match &pair[1] {
                Token::String(dst) => utf16_text(dst),
                Token::Name(name) => match super::encoding::glyph_name_to_unicode(name) {
                    Some(text) => text,
                    None => continue,
                },
                _ => continue,
            };
            self.chars.insert(be_code(src), text);
        }
    }

    fn read_bfrange(&mut self, lexer: &mut Lexer<'_>) {
        let tokens = Self::read_section(lexer, b"endbfrange");
        let mut i = 0;
        while i + 2 < tokens.len() {
            let (Token::String(low), Token::String(high)) = (&tokens[i], &tokens[i + 1]) else {
                i += 1;
                continue;
            };
            let (low, high) = (be_code(low), be_code(high));
            match &tokens[i + 2] {
                Token::String(dst) => {
                    if high >= low {
                        self.ranges.push(UnicodeRange {
                            low,
                            high,
                            target: RangeTarget::Start(utf16_units(dst)),
                        });
                    }
                    i += 3;
                }
                Token::Keyword(b"[") => {
                    let mut list = Vec::new();
                    let mut j = i + 3;
                    while j < tokens.len() {
                        match &tokens[j] {
                            Token::Keyword(b"]") => break,
                            Token::String(dst) => list.push(utf16_text(dst)),
                            _ => {}
                        }
                        j += 1;
                    }
                    self.ranges.push(UnicodeRange {
                        low,
                        high,
                        target: RangeTarget::List(list),
                    });
                    i = j + 1;
                }
                _ => i += 3,
            }
        }
    }

    fn read_cidrange(&mut self, lexer: &mut Lexer<'_>) {
        let tokens = Self::read_section(lexer, b"endcidrange");
        for triple in tokens.chunks_exact(3) {
            if let (Token::String(low), Token::String(high), Token::Integer(cid)) =
                (&triple[0], &triple[1], &triple[2])
            {
                self.cid_ranges.push(CidRange {
                    low: be_code(low),
                    high: be_code(high),
                    cid: (*cid).max(0) as u32,
                });
            }
        }
    }

    fn read_cidchar(&mut self, lexer: &mut Lexer<'_>) {
        let tokens = Self::read_section(lexer, b"endcidchar");
        for pair in tokens.chunks_exact(2) {
            if let (Token::String(src), Token::Integer(cid)) = (&pair[0], &pair[1]) {
                let code = be_code(src);
                self.cid_ranges.push(CidRange {
                    low: code,
                    high: code,
                    cid: (*cid).max(0) as u32,
                });
            }
        }
    }

    /// Whether a code-space range was declared.
    pub fn has_codespace(&self) -> bool {
        !self.codespace.is_empty()
    }

    /// Split the next character code off `bytes`, returning the code and its
    /// length. Without a matching code-space range, `default_len` bytes are
    /// taken.
    pub fn next_code(&self, bytes: &[u8], default_len: usize) -> (u32, usize) {
        for len in 1..=4usize.min(bytes.len()) {
            let code = be_code(&bytes[..len]);
            if self
                .codespace
                .iter()
                .any(|cs| cs.bytes == len && cs.low <= code && code <= cs.high)
            {
                return (code, len);
            }
        }
        let preferred = if self.codespace.is_empty() {
            default_len
        } else {
            self.codespace.iter().map(|cs| cs.bytes).min().unwrap_or(default_len)
        };
        let len = preferred.max(1).min(bytes.len());
        (be_code(&bytes[..len]), len)
    }

    /// Unicode text for a code.
    pub fn lookup_unicode(&self, code: u32) -> Option<String> {
        if let Some(text) = self.chars.get(&code) {
            return Some(text.clone());
        }
        let range = self
            .ranges
            .iter()
            .rev()
            .find(|r| r.low <= code && code <= r.high)?;
        let offset = code - range.low;
        match &range.target {
            RangeTarget::Start(units) => {
                let mut units = units.clone();
                let last = units.last_mut()?;
                *last = last.wrapping_add(offset as u16);
                Some(String::from_utf16_lossy(&units))
            }
            RangeTarget::List(list) => list.get(offset as usize).cloned(),
        }
    }

    /// CID for a code, from `cidrange`/`cidchar` sections.
    pub fn lookup_cid(&self, code: u32) -> Option<u32> {
        self.cid_ranges
            .iter()
            .rev()
            .find(|r| r.low <= code && code <= r.high)
            .map(|r| r.cid + (code - r.low))
    }

    /// Whether the map carries any Unicode mappings.
    pub fn has_unicode(&self) -> bool {
        !self.chars.is_empty() || !self.ranges.is_empty()
    }
}

fn be_code(bytes: &[u8]) -> u32 {
    bytes.iter().take(4).fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    if bytes.len() == 1 {
        return vec![u16::from(bytes[0])];
    }
    bytes
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [single] => u16::from(*single),
            _ => 0,
        })
        .collect()
}

fn utf16_text(bytes: &[u8]) -> String {
    String::from_utf16_lossy(&utf16_units(bytes))
}
