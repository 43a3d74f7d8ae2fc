//! Content stream tokenizing into operator/operand groups.

use crate::error::{Error, Result};
use crate::parser::lexer::{is_delimiter, is_whitespace, Lexer, Token};
use crate::parser::object::parse_object_from;
use crate::parser::{Dictionary, Object};

/// One operator with the operands that preceded it.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub operator: String,
    pub operands: Vec<Object>,
}

impl Operation {
    fn new(operator: impl Into<String>, operands: Vec<Object>) -> Self {
        Self {
            operator: operator.into(),
            operands,
        }
    }
}

/// Parse a content stream.
///
/// Parsing stops at the first syntax error; the operations read up to
/// that point are returned together with the error. Inline images come
/// back as a `BI` operation whose operands are the expanded image
/// dictionary and the raw image data.
pub fn parse_content(data: &[u8]) -> (Vec<Operation>, Option<Error>) {
    let mut lexer = Lexer::new(data);
    let mut ops = Vec::new();
    let mut operands = Vec::new();

    loop {
        let token = match lexer.next_token() {
            Ok(Some(token)) => token,
            Ok(None) => break,
            Err(e) => return (ops, Some(e)),
        };
        match token {
            Token::Keyword(b"true") => operands.push(Object::Boolean(true)),
            Token::Keyword(b"false") => operands.push(Object::Boolean(false)),
            Token::Keyword(b"null") => operands.push(Object::Null),
            Token::Keyword(b"BI") => match read_inline_image(&mut lexer) {
                Ok((dict, bytes)) => {
                    operands.clear();
                    ops.push(Operation::new(
                        "BI",
                        vec![Object::Dictionary(dict), Object::String(bytes)],
                    ));
                }
                Err(e) => return (ops, Some(e)),
            },
            Token::Keyword(keyword) => {
                let operator = String::from_utf8_lossy(keyword).into_owned();
                ops.push(Operation::new(operator, std::mem::take(&mut operands)));
            }
            other => match parse_object_from(other, &mut lexer, false, 0) {
                Ok(obj) => operands.push(obj),
                Err(e) => return (ops, Some(e)),
            },
        }
    }
    (ops, None)
}

/// Read `key value ... ID <data> EI` after a `BI` keyword.
fn read_inline_image(lexer: &mut Lexer<'_>) -> Result<(Dictionary, Vec<u8>)> {
    let mut dict = Dictionary::new();
    loop {
        match lexer.expect_token()? {
            Token::Keyword(b"ID") => break,
            Token::Name(key) => {
                let value = lexer.expect_token()?;
                let value = parse_object_from(value, lexer, false, 0)?;
                dict.insert(expand_key(&key), expand_value(value));
            }
            _ => {
                return Err(Error::syntax(
                    lexer.pos(),
                    "unexpected token in inline image dictionary",
                ))
            }
        }
    }

    let data = lexer.data();
    // Exactly one whitespace byte separates ID from the data.
    let mut start = lexer.pos();
    if data.get(start).copied().is_some_and(is_whitespace) {
        start += 1;
    }
    let end = find_inline_end(data, start)
        .ok_or_else(|| Error::syntax(start, "inline image without EI"))?;
    lexer.set_pos(end.1);
    Ok((dict, data[start..end.0].to_vec()))
}

/// Find `<ws>EI` followed by whitespace, a delimiter or the end of data.
/// Returns the end of the image data and the position after `EI`.
fn find_inline_end(data: &[u8], start: usize) -> Option<(usize, usize)> {
    let mut i = start;
    while i + 3 <= data.len() {
        if is_whitespace(data[i]) && &data[i + 1..i + 3] == b"EI" {
            let after = i + 3;
            if after == data.len() || is_whitespace(data[after]) || is_delimiter(data[after]) {
                return Some((i, after));
            }
        }
        i += 1;
    }
    // `ID` immediately followed by `EI` (empty data)
    if data.get(start..start + 2) == Some(b"EI".as_slice()) {
        return Some((start, start + 2));
    }
    None
}

fn expand_key(key: &str) -> String {
    match key {
        "BPC" => "BitsPerComponent",
        "CS" => "ColorSpace",
        "D" => "Decode",
        "DP" => "DecodeParms",
        "F" => "Filter",
        "H" => "Height",
        "IM" => "ImageMask",
        "I" => "Interpolate",
        "L" => "Length",
        "W" => "Width",
        other => other,
    }
    .to_string()
}

fn expand_value(value: Object) -> Object {
    match value {
        Object::Name(name) => Object::Name(expand_name(&name)),
        Object::Array(items) => Object::Array(items.into_iter().map(expand_value).collect()),
        other => other,
    }
}

fn expand_name(name: &str) -> String {
    match name {
        "G" => "DeviceGray",
        "RGB" => "DeviceRGB",
        "CMYK" => "DeviceCMYK",
        "I" => "Indexed",
        "AHx" => "ASCIIHexDecode",
        "A85" => "ASCII85Decode",
        "LZW" => "LZWDecode",
        "Fl" => "FlateDecode",
        "RL" => "RunLengthDecode",
        "CCF" => "CCITTFaxDecode",
        "DCT" => "DCTDecode",
        other => other,
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operators_and_operands() {
        let (ops, err) = parse_content(b"BT /F1 12 Tf 72 720 Td (Hello) Tj ET");
        assert!(err.is_none());
        let names: Vec<&str> = ops.iter().map(|o| o.operator.as_str()).collect();
        assert_eq!(names, ["BT", "Tf", "Td", "Tj", "ET"]);
        assert_eq!(
            ops[1].operands,
            vec![Object::Name("F1".into()), Object::Integer(12)]
        );
        assert_eq!(ops[3].operands, vec![Object::String(b"Hello".to_vec())]);
    }

    #[test]
    fn test_tj_array_and_quote_operators() {
        let (ops, err) = parse_content(b"[(A) -120 (B)] TJ 1 2 (x) \" (y) '");
        assert!(err.is_none());
        assert_eq!(ops[0].operator, "TJ");
        assert_eq!(ops[0].operands[0].as_array().map(|a| a.len()), Some(3));
        assert_eq!(ops[1].operator, "\"");
        assert_eq!(ops[1].operands.len(), 3);
        assert_eq!(ops[2].operator, "'");
    }

    #[test]
    fn test_inline_image() {
        let mut data = b"q BI /W 2 /H 1 /CS /G /BPC 8 /F [/AHx] ID ".to_vec();
        data.extend_from_slice(b"\x00EI\xff");
        data.extend_from_slice(b"\nEI Q");
        let (ops, err) = parse_content(&data);
        assert!(err.is_none());
        let names: Vec<&str> = ops.iter().map(|o| o.operator.as_str()).collect();
        assert_eq!(names, ["q", "BI", "Q"]);
        let dict = ops[1].operands[0].as_dict().unwrap();
        assert_eq!(dict.get("Width"), Some(&Object::Integer(2)));
        assert_eq!(dict.get_name("ColorSpace"), Some("DeviceGray"));
        assert_eq!(
            dict.get("Filter"),
            Some(&Object::Array(vec![Object::Name("ASCIIHexDecode".into())]))
        );
        assert_eq!(ops[1].operands[1].as_string_bytes(), Some(&b"\x00EI\xff"[..]));
    }

    #[test]
    fn test_error_keeps_parsed_operations() {
        let (ops, err) = parse_content(b"1 0 0 1 0 0 cm [1 2");
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].operator, "cm");
        assert!(err.is_some());
    }

    #[test]
    fn test_unterminated_inline_image() {
        let (ops, err) = parse_content(b"q BI /W 1 /H 1 ID \x01\x02");
        assert_eq!(ops.len(), 1);
        assert!(err.is_some());
    }
}
