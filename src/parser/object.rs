//! PDF object model and object-level parsing.

use super::lexer::{Lexer, Token};
use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// Object identifier: (object number, generation number).
pub type ObjectId = (u32, u16);

/// Nesting bound for arrays and dictionaries.
const MAX_NESTING: usize = 256;

/// A PDF object.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Name(String),
    String(Vec<u8>),
    Array(Vec<Object>),
    Dictionary(Dictionary),
    Stream(Stream),
    Reference(ObjectId),
}

impl Object {
    /// Integer value. Reals are truncated.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            Object::Real(r) => Some(*r as i64),
            _ => None,
        }
    }

    /// Numeric value as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        self.as_f64().map(|v| v as f32)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_string_bytes(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Object]> {
        match self {
            Object::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Dictionary value. A stream yields its dictionary.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Object::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            Object::Reference(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// Short type label for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "null",
            Object::Boolean(_) => "boolean",
            Object::Integer(_) => "integer",
            Object::Real(_) => "real",
            Object::Name(_) => "name",
            Object::String(_) => "string",
            Object::Array(_) => "array",
            Object::Dictionary(_) => "dictionary",
            Object::Stream(_) => "stream",
            Object::Reference(_) => "reference",
        }
    }
}

/// A PDF dictionary with name keys (without the leading slash).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary(BTreeMap<String, Object>);

impl Dictionary {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&Object> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Object) {
        self.0.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Object> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Object)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Name value of a key, if it is a direct name.
    pub fn get_name(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Object::as_name)
    }

    /// Whether `/Type` equals the given name.
    pub fn has_type(&self, type_name: &str) -> bool {
        self.get_name("Type") == Some(type_name)
    }
}

impl FromIterator<(String, Object)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (String, Object)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A stream object. `content` holds the raw, still-encoded bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    pub dict: Dictionary,
    pub content: Vec<u8>,
}

impl Stream {
    pub fn new(dict: Dictionary, content: Vec<u8>) -> Self {
        Self { dict, content }
    }

    /// Filter names applied to this stream, in decode order.
    pub fn filters(&self) -> Vec<&str> {
        match self.dict.get("Filter") {
            Some(Object::Name(name)) => vec![name.as_str()],
            Some(Object::Array(items)) => items.iter().filter_map(Object::as_name).collect(),
            _ => Vec::new(),
        }
    }
}

/// Decode a PDF text string (UTF-16BE with BOM, UTF-8 with BOM, or
/// PDFDocEncoding).
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    bytes.iter().map(|&b| pdf_doc_char(b)).collect()
}

/// PDFDocEncoding differs from Latin-1 in 0x80..=0xA0.
fn pdf_doc_char(b: u8) -> char {
    const HIGH: [u16; 33] = [
        0x2022, 0x2020, 0x2021, 0x2026, 0x2014, 0x2013, 0x0192, 0x2044, 0x2039, 0x203A, 0x2212,
        0x2030, 0x201E, 0x201C, 0x201D, 0x2018, 0x2019, 0x201A, 0x2122, 0xFB01, 0xFB02, 0x0141,
        0x0152, 0x0160, 0x0178, 0x017D, 0x0131, 0x0142, 0x0153, 0x0161, 0x017E, 0xFFFD, 0x20AC,
    ];
    match b {
        0x80..=0xA0 => char::from_u32(u32::from(HIGH[(b - 0x80) as usize])).unwrap_or('\u{FFFD}'),
        _ => char::from(b),
    }
}

/// Parse one object starting at the lexer's position.
///
/// When `allow_refs` is set, `N G R` triples are folded into
/// [`Object::Reference`]. Content streams pass `false`.
pub fn parse_object(lexer: &mut Lexer<'_>, allow_refs: bool) -> Result<Object> {
    let token = lexer.expect_token()?;
    parse_object_from(token, lexer, allow_refs, 0)
}

/// Parse an object whose first token has already been read.
pub fn parse_object_from(
    token: Token<'_>,
    lexer: &mut Lexer<'_>,
    allow_refs: bool,
    depth: usize,
) -> Result<Object> {
    if depth > MAX_NESTING {
        return Err(Error::syntax(lexer.pos(), "objects nested too deeply"));
    }

    match token {
        Token::Integer(value) => {
            if allow_refs {
                if let Some(id) = try_reference(lexer, value) {
                    return Ok(Object::Reference(id));
                }
            }
            Ok(Object::Integer(value))
        }
        Token::Real(value) => Ok(Object::Real(value)),
        Token::Name(name) => Ok(Object::Name(name)),
        Token::String(bytes) => Ok(Object::String(bytes)),
        Token::ArrayStart => {
            let mut items = Vec::new();
            loop {
                match lexer.expect_token()? {
                    Token::ArrayEnd => break,
                    next => items.push(parse_object_from(next, lexer, allow_refs, depth + 1)?),
                }
            }
            Ok(Object::Array(items))
        }
        Token::DictStart => Ok(Object::Dictionary(parse_dict_body(
            lexer, allow_refs, depth,
        )?)),
        Token::Keyword(b"true") => Ok(Object::Boolean(true)),
        Token::Keyword(b"false") => Ok(Object::Boolean(false)),
        Token::Keyword(b"null") => Ok(Object::Null),
        Token::Keyword(other) => Err(Error::syntax(
            lexer.pos(),
            format!("unexpected keyword '{}'", String::from_utf8_lossy(other)),
        )),
        Token::ArrayEnd | Token::DictEnd => {
            Err(Error::syntax(lexer.pos(), "unexpected closing delimiter"))
        }
    }
}

/// Parse dictionary entries after `<<` up to and including `>>`.
pub fn parse_dict_body(lexer: &mut Lexer<'_>, allow_refs: bool, depth: usize) -> Result<Dictionary> {
    let mut dict = Dictionary::new();
    loop {
        let key = match lexer.expect_token()? {
            Token::DictEnd => break,
            Token::Name(name) => name,
            // Stray values in key position are skipped.
            _ => continue,
        };
        match lexer.expect_token()? {
            Token::DictEnd => {
                dict.insert(key, Object::Null);
                break;
            }
            value => {
                let object = parse_object_from(value, lexer, allow_refs, depth + 1)?;
                dict.insert(key, object);
            }
        }
    }
    Ok(dict)
}

/// Look ahead for `G R` after an integer; restores the position on a miss.
fn try_reference(lexer: &mut Lexer<'_>, number: i64) -> Option<ObjectId> {
    let saved = lexer.pos();
    let result = (|| {
        let Ok(Some(Token::Integer(generation))) = lexer.next_token() else {
            return None;
        };
        let Ok(Some(Token::Keyword(b"R"))) = lexer.next_token() else {
            return None;
        };
        let number = u32::try_from(number).ok()?;
        let generation = u16::try_from(generation).ok()?;
        Some((number, generation))
    })();
    if result.is_none() {
        lexer.set_pos(saved);
    }
    result
}

/// Resolves an indirect `/Length` to its integer value.
pub trait LengthResolver {
    fn resolve_length(&self, id: ObjectId) -> Option<usize>;
}

/// A resolver that knows no objects; lengths fall back to `endstream`.
pub struct NoLengths;

impl LengthResolver for NoLengths {
    fn resolve_length(&self, _id: ObjectId) -> Option<usize> {
        None
    }
}

/// Parse an indirect object (`N G obj ... endobj`) starting at `offset`.
pub fn parse_indirect_object(
    data: &[u8],
    offset: usize,
    lengths: &dyn LengthResolver,
) -> Result<(ObjectId, Object)> {
    let mut lexer = Lexer::at(data, offset);

    let number = match lexer.expect_token()? {
        Token::Integer(n) => u32::try_from(n).map_err(|_| Error::syntax(offset, "bad object number"))?,
        _ => return Err(Error::syntax(offset, "expected object number")),
    };
    let generation = match lexer.expect_token()? {
        Token::Integer(g) => u16::try_from(g).map_err(|_| Error::syntax(offset, "bad generation"))?,
        _ => return Err(Error::syntax(offset, "expected generation number")),
    };
    match lexer.expect_token()? {
        Token::Keyword(b"obj") => {}
        _ => return Err(Error::syntax(offset, "expected 'obj' keyword")),
    }

    let object = parse_object(&mut lexer, true)?;

    let after_object = lexer.pos();
    if let (Object::Dictionary(dict), Ok(Some(Token::Keyword(b"stream")))) =
        (&object, lexer.next_token())
    {
        lexer.skip_eol();
        let start = lexer.pos();
        let content = read_stream_data(data, start, dict, lengths)?;
        return Ok(((number, generation), Object::Stream(Stream::new(dict.clone(), content))));
    }
    lexer.set_pos(after_object);

    Ok(((number, generation), object))
}

/// Read stream bytes starting right after the `stream` EOL.
fn read_stream_data(
    data: &[u8],
    start: usize,
    dict: &Dictionary,
    lengths: &dyn LengthResolver,
) -> Result<Vec<u8>> {
    let declared = match dict.get("Length") {
        Some(Object::Integer(n)) => usize::try_from(*n).ok(),
        Some(Object::Reference(id)) => lengths.resolve_length(*id),
        _ => None,
    };

    if let Some(length) = declared {
        if let Some(end) = start.checked_add(length) {
            if end <= data.len() && endstream_follows(data, end) {
                return Ok(data[start..end].to_vec());
            }
        }
        log::debug!(
            "Stream at offset {} has a bad /Length {}, scanning for endstream",
            start,
            length
        );
    }

    let end = find_endstream(data, start)
        .ok_or_else(|| Error::syntax(start, "stream without endstream"))?;
    Ok(data[start..end].to_vec())
}

fn endstream_follows(data: &[u8], pos: usize) -> bool {
    let mut lexer = Lexer::at(data, pos);
    lexer.skip_whitespace();
    data[lexer.pos()..].starts_with(b"endstream")
}

/// Position of the stream end before the next `endstream`, minus the EOL
/// that precedes the keyword.
fn find_endstream(data: &[u8], start: usize) -> Option<usize> {
    let rel = data[start..]
        .windows(b"endstream".len())
        .position(|w| w == b"endstream")?;
    let mut end = start + rel;
    if end > start && data[end - 1] == b'\n' {
        end -= 1;
    }
    if end > start && data[end - 1] == b'\r' {
        end -= 1;
    }
    Some(end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(data: &[u8]) -> Object {
        parse_object(&mut Lexer::new(data), true).unwrap()
    }

    #[test]
    fn test_parse_dictionary_with_reference() {
        let obj = parse(b"<< /Type /Page /Parent 3 0 R /Count 2 >>");
        let dict = obj.as_dict().unwrap();
        assert!(dict.has_type("Page"));
        assert_eq!(dict.get("Parent").unwrap().as_reference(), Some((3, 0)));
        assert_eq!(dict.get("Count").unwrap().as_i64(), Some(2));
    }

    #[test]
    fn test_integers_without_r_stay_integers() {
        let obj = parse(b"[0 0 612 792]");
        let items = obj.as_array().unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items[2].as_f64(), Some(612.0));
    }

    #[test]
    fn test_missing_dict_value_is_null() {
        let obj = parse(b"<< /A 1 /B >>");
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.get("B"), Some(&Object::Null));
    }

    #[test]
    fn test_nesting_limit() {
        let mut data = vec![b'['; MAX_NESTING + 10];
        data.extend(vec![b']'; MAX_NESTING + 10]);
        assert!(parse_object(&mut Lexer::new(&data), true).is_err());
    }

    #[test]
    fn test_indirect_stream_with_direct_length() {
        let data = b"4 0 obj\n<< /Length 5 >>\nstream\nhello\nendstream\nendobj";
        let (id, obj) = parse_indirect_object(data, 0, &NoLengths).unwrap();
        assert_eq!(id, (4, 0));
        assert_eq!(obj.as_stream().unwrap().content, b"hello");
    }

    #[test]
    fn test_stream_with_wrong_length_falls_back() {
        let data = b"4 0 obj\n<< /Length 99 >>\nstream\r\nhello world\r\nendstream\nendobj";
        let (_, obj) = parse_indirect_object(data, 0, &NoLengths).unwrap();
        assert_eq!(obj.as_stream().unwrap().content, b"hello world");
    }

    #[test]
    fn test_stream_with_indirect_length() {
        struct Fixed;
        impl LengthResolver for Fixed {
            fn resolve_length(&self, id: ObjectId) -> Option<usize> {
                (id == (9, 0)).then_some(3)
            }
        }
        let data = b"1 0 obj << /Length 9 0 R >> stream\nabc\nendstream endobj";
        let (_, obj) = parse_indirect_object(data, 0, &Fixed).unwrap();
        assert_eq!(obj.as_stream().unwrap().content, b"abc");
    }

    #[test]
    fn test_decode_text_string() {
        assert_eq!(decode_text_string(b"Plain"), "Plain");
        assert_eq!(decode_text_string(&[0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69]), "Hi");
        assert_eq!(decode_text_string(&[0x93]), "\u{FB01}");
        assert_eq!(decode_text_string(&[0xE9]), "é");
    }

    #[test]
    fn test_stream_filters() {
        let obj = parse(b"<< /Filter [/ASCIIHexDecode /FlateDecode] >>");
        let stream = Stream::new(obj.as_dict().unwrap().clone(), Vec::new());
        assert_eq!(stream.filters(), vec!["ASCIIHexDecode", "FlateDecode"]);
    }
}
