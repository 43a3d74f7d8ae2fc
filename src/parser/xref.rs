//! Cross-reference tables, cross-reference streams and recovery scanning.

use super::filters;
use super::lexer::{Lexer, Token};
use super::object::{self, Dictionary, LengthResolver, Object, ObjectId};
use crate::error::{Error, Result};
use regex::bytes::Regex;
use std::collections::{BTreeMap, HashSet};

/// Where an object lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    /// Free or deleted object
    Free,
    /// Uncompressed object at a byte offset
    InUse { offset: usize, generation: u16 },
    /// Object stored inside an object stream
    Compressed { stream: u32, index: u32 },
}

/// A merged cross-reference index and trailer.
#[derive(Debug, Clone, Default)]
pub struct XrefTable {
    pub entries: BTreeMap<u32, XrefEntry>,
    pub trailer: Dictionary,
}

impl XrefTable {
    pub fn get(&self, number: u32) -> Option<XrefEntry> {
        self.entries.get(&number).copied()
    }

    /// Offset of an uncompressed object, when known.
    pub fn offset_of(&self, id: ObjectId) -> Option<usize> {
        match self.get(id.0)? {
            XrefEntry::InUse { offset, .. } => Some(offset),
            _ => None,
        }
    }

    /// Merge an older section: existing (newer) entries and trailer keys win.
    fn merge_older(&mut self, older: XrefTable) {
        for (number, entry) in older.entries {
            self.entries.entry(number).or_insert(entry);
        }
        for (key, value) in older.trailer.iter() {
            if !self.trailer.contains_key(key) {
                self.trailer.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Resolves indirect stream lengths through a partially built table.
struct TableLengths<'a> {
    data: &'a [u8],
    table: &'a XrefTable,
}

impl LengthResolver for TableLengths<'_> {
    fn resolve_length(&self, id: ObjectId) -> Option<usize> {
        let offset = self.table.offset_of(id)?;
        let (_, obj) = object::parse_indirect_object(self.data, offset, &object::NoLengths).ok()?;
        obj.as_i64().and_then(|n| usize::try_from(n).ok())
    }
}

/// Locate the offset named by the last `startxref` in the file.
pub fn find_startxref(data: &[u8]) -> Option<usize> {
    const KEYWORD: &[u8] = b"startxref";
    let pos = data.windows(KEYWORD.len()).rposition(|w| w == KEYWORD)?;
    let mut lexer = Lexer::at(data, pos + KEYWORD.len());
    match lexer.next_token() {
        Ok(Some(Token::Integer(offset))) => usize::try_from(offset).ok(),
        _ => None,
    }
}

/// Load the newest xref section at `start` and follow its `/Prev` chain.
///
/// The first section must load; failures further down the chain are logged
/// and end the chain.
pub fn load_xref_chain(data: &[u8], start: usize) -> Result<XrefTable> {
    let mut visited = HashSet::new();
    let mut table = load_section(data, start)?;
    visited.insert(start);

    let mut next = prev_offset(&table.trailer);
    table.trailer.remove("Prev");

    while let Some(offset) = next {
        if !visited.insert(offset) {
            log::warn!("Cross-reference /Prev loop at offset {}", offset);
            break;
        }
        match load_section(data, offset) {
            Ok(mut older) => {
                next = prev_offset(&older.trailer);
                older.trailer.remove("Prev");
                table.merge_older(older);
            }
            Err(err) => {
                log::warn!("Ignoring cross-reference section at {}: {}", offset, err);
                break;
            }
        }
    }

    Ok(table)
}

fn prev_offset(trailer: &Dictionary) -> Option<usize> {
    trailer
        .get("Prev")
        .and_then(Object::as_i64)
        .and_then(|n| usize::try_from(n).ok())
}

/// Load one section: a classic table (plus its hybrid `/XRefStm`) or an
/// xref stream.
fn load_section(data: &[u8], offset: usize) -> Result<XrefTable> {
    if offset >= data.len() {
        return Err(Error::syntax(offset, "xref offset beyond end of file"));
    }
    let mut lexer = Lexer::at(data, offset);
    lexer.skip_whitespace();

    if data[lexer.pos()..].starts_with(b"xref") {
        let mut table = parse_classic_table(&mut lexer)?;
        if let Some(stm) = table
            .trailer
            .get("XRefStm")
            .and_then(Object::as_i64)
            .and_then(|n| usize::try_from(n).ok())
        {
            match parse_xref_stream(data, stm) {
                Ok(hidden) => {
                    for (number, entry) in hidden.entries {
                        table.entries.entry(number).or_insert(entry);
                    }
                }
                Err(err) => log::warn!("Ignoring /XRefStm at {}: {}", stm, err),
            }
        }
        Ok(table)
    } else {
        parse_xref_stream(data, lexer.pos())
    }
}

fn parse_classic_table(lexer: &mut Lexer<'_>) -> Result<XrefTable> {
    match lexer.expect_token()? {
        Token::Keyword(b"xref") => {}
        _ => return Err(Error::syntax(lexer.pos(), "expected 'xref'")),
    }

    let mut table = XrefTable::default();
    loop {
        match lexer.expect_token()? {
            Token::Keyword(b"trailer") => break,
            Token::Integer(first) => {
                let count = match lexer.expect_token()? {
                    Token::Integer(n) => n,
                    _ => return Err(Error::syntax(lexer.pos(), "bad xref subsection header")),
                };
                let first = u32::try_from(first)
                    .map_err(|_| Error::syntax(lexer.pos(), "negative xref subsection start"))?;
                for i in 0..count.max(0) as u32 {
                    let entry = parse_classic_entry(lexer)?;
                    table.entries.entry(first + i).or_insert(entry);
                }
            }
            _ => return Err(Error::syntax(lexer.pos(), "unexpected token in xref table")),
        }
    }

    match object::parse_object(lexer, true)? {
        Object::Dictionary(trailer) => table.trailer = trailer,
        other => {
            return Err(Error::syntax(
                lexer.pos(),
                format!("trailer is a {}, not a dictionary", other.type_name()),
            ))
        }
    }
    Ok(table)
}

fn parse_classic_entry(lexer: &mut Lexer<'_>) -> Result<XrefEntry> {
    let pos = lexer.pos();
    let (Token::Integer(offset), Token::Integer(generation), Token::Keyword(kind)) =
        (lexer.expect_token()?, lexer.expect_token()?, lexer.expect_token()?)
    else {
        return Err(Error::syntax(pos, "malformed xref entry"));
    };
    match kind {
        b"n" => Ok(XrefEntry::InUse {
            offset: usize::try_from(offset).map_err(|_| Error::syntax(pos, "negative offset"))?,
            generation: u16::try_from(generation).unwrap_or(u16::MAX),
        }),
        b"f" => Ok(XrefEntry::Free),
        _ => Err(Error::syntax(pos, "xref entry type must be 'n' or 'f'")),
    }
}

fn parse_xref_stream(data: &[u8], offset: usize) -> Result<XrefTable> {
    // An xref stream's /Length is direct in practice; indirect lengths
    // fall back to the endstream scan.
    let (_, obj) = object::parse_indirect_object(data, offset, &object::NoLengths)?;
    let stream = obj
        .as_stream()
        .filter(|s| s.dict.has_type("XRef"))
        .ok_or_else(|| Error::syntax(offset, "expected an xref stream"))?;

    let widths: Vec<usize> = stream
        .dict
        .get("W")
        .and_then(Object::as_array)
        .ok_or_else(|| Error::syntax(offset, "xref stream without /W"))?
        .iter()
        .map(|w| w.as_i64().unwrap_or(0).clamp(0, 8) as usize)
        .collect();
    if widths.len() != 3 {
        return Err(Error::syntax(offset, "xref stream /W must have three entries"));
    }

    let size = stream.dict.get("Size").and_then(Object::as_i64).unwrap_or(0);
    let index: Vec<i64> = match stream.dict.get("Index").and_then(Object::as_array) {
        Some(items) => items.iter().filter_map(Object::as_i64).collect(),
        None => vec![0, size],
    };

    let body = filters::decode_stream(stream)?;
    let row_len: usize = widths.iter().sum();
    if row_len == 0 {
        return Err(Error::syntax(offset, "xref stream rows are empty"));
    }

    let mut table = XrefTable {
        entries: BTreeMap::new(),
        trailer: stream.dict.clone(),
    };
    let mut rows = body.chunks_exact(row_len);
    for pair in index.chunks_exact(2) {
        let (first, count) = (pair[0].max(0) as u32, pair[1].max(0) as u32);
        for i in 0..count {
            let Some(row) = rows.next() else {
                return Ok(table);
            };
            let (a, rest) = row.split_at(widths[0]);
            let (b, c) = rest.split_at(widths[1]);
            let kind = if widths[0] == 0 { 1 } else { be_int(a) };
            let entry = match kind {
                0 => XrefEntry::Free,
                1 => XrefEntry::InUse {
                    offset: be_int(b) as usize,
                    generation: be_int(c) as u16,
                },
                2 => XrefEntry::Compressed {
                    stream: be_int(b) as u32,
                    index: be_int(c) as u32,
                },
                // Unknown types are treated as null references.
                _ => XrefEntry::Free,
            };
            table.entries.entry(first + i).or_insert(entry);
        }
    }
    Ok(table)
}

fn be_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// Rebuild a cross-reference table by scanning for `N G obj` headers.
///
/// Later definitions of the same object number win. The trailer is taken
/// from the last `trailer` dictionary that names a `/Root`, if any.
pub fn recover(data: &[u8]) -> Result<XrefTable> {
    let header = Regex::new(r"(?-u)(\d{1,10})[ \t\r\n\x0c\x00]+(\d{1,5})[ \t\r\n\x0c\x00]+obj")
        .map_err(|e| Error::CorruptDocument(format!("recovery pattern: {}", e)))?;

    let mut table = XrefTable::default();
    for caps in header.captures_iter(data) {
        let (Some(whole), Some(num), Some(gen)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        if whole.start() > 0 && data[whole.start() - 1].is_ascii_digit() {
            continue;
        }
        let (Some(number), Some(generation)) = (ascii_int::<u32>(num.as_bytes()), ascii_int::<u16>(gen.as_bytes()))
        else {
            continue;
        };
        table.entries.insert(
            number,
            XrefEntry::InUse {
                offset: whole.start(),
                generation,
            },
        );
    }

    let mut search_from = 0usize;
    while let Some(rel) = data[search_from..]
        .windows(b"trailer".len())
        .position(|w| w == b"trailer")
    {
        let pos = search_from + rel + b"trailer".len();
        search_from = pos;
        let mut lexer = Lexer::at(data, pos);
        if let Ok(Object::Dictionary(trailer)) = object::parse_object(&mut lexer, true) {
            if trailer.contains_key("Root") {
                table.trailer = trailer;
            }
        }
    }

    if table.entries.is_empty() {
        return Err(Error::CorruptDocument(
            "no objects found while scanning for recovery".to_string(),
        ));
    }
    log::warn!(
        "Rebuilt cross-reference table from {} scanned objects",
        table.entries.len()
    );
    Ok(table)
}

fn ascii_int<T: std::str::FromStr>(bytes: &[u8]) -> Option<T> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

/// Length resolver backed by an xref table.
pub fn lengths<'a>(data: &'a [u8], table: &'a XrefTable) -> impl LengthResolver + 'a {
    TableLengths { data, table }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_startxref_tolerates_trailing_garbage() {
        let data = b"%PDF-1.4\nstartxref\n10\n%%EOF\nstartxref\n42\n%%EOF\n\x00\x00junk";
        assert_eq!(find_startxref(data), Some(42));
    }

    #[test]
    fn test_classic_table_with_subsections() {
        let data = b"xref\n0 2\n0000000000 65535 f \n0000000017 00000 n \n5 1\n0000000099 00000 n \ntrailer\n<< /Size 6 /Root 1 0 R >>\nstartxref\n0\n%%EOF";
        let table = load_xref_chain(data, 0).unwrap();
        assert_eq!(table.get(0), Some(XrefEntry::Free));
        assert_eq!(table.offset_of((1, 0)), Some(17));
        assert_eq!(table.offset_of((5, 0)), Some(99));
        assert_eq!(table.trailer.get("Root").unwrap().as_reference(), Some((1, 0)));
    }

    #[test]
    fn test_prev_chain_newer_wins_and_loops_stop() {
        // Older section at 0, newer at `newer`, which points back to 0. The
        // older section points at the newer one to form a loop.
        let older = b"xref\n0 2\n0000000000 65535 f \n0000000010 00000 n \ntrailer\n<< /Size 2 /Prev 1000 /Info 7 0 R >>\n";
        let mut data = older.to_vec();
        let newer_offset = data.len();
        data.extend_from_slice(
            b"xref\n1 1\n0000000020 00000 n \ntrailer\n<< /Size 2 /Root 1 0 R /Prev 0 >>\n",
        );
        // Patch the older /Prev to point at the newer section.
        let text = String::from_utf8(data.clone()).unwrap();
        let patched = text.replacen("/Prev 1000", &format!("/Prev {:<4}", newer_offset), 1);
        let data = patched.into_bytes();

        let table = load_xref_chain(&data, newer_offset).unwrap();
        assert_eq!(table.offset_of((1, 0)), Some(20));
        assert!(table.trailer.contains_key("Root"));
        assert!(table.trailer.contains_key("Info"));
        assert!(!table.trailer.contains_key("Prev"));
    }

    #[test]
    fn test_xref_stream() {
        // W [1 2 1]: free 0, object 1 at offset 15, object 2 in stream 5 index 0.
        let rows: Vec<u8> = vec![0, 0, 0, 0xFF, 1, 0, 15, 0, 2, 0, 5, 0];
        let mut data = format!(
            "9 0 obj\n<< /Type /XRef /Size 3 /W [1 2 1] /Root 1 0 R /Length {} >>\nstream\n",
            rows.len()
        )
        .into_bytes();
        data.extend_from_slice(&rows);
        data.extend_from_slice(b"\nendstream\nendobj\n");

        let table = load_xref_chain(&data, 0).unwrap();
        assert_eq!(table.get(0), Some(XrefEntry::Free));
        assert_eq!(table.offset_of((1, 0)), Some(15));
        assert_eq!(
            table.get(2),
            Some(XrefEntry::Compressed { stream: 5, index: 0 })
        );
        assert!(table.trailer.contains_key("Root"));
    }

    #[test]
    fn test_recover_scans_objects_and_trailer() {
        let data = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n12 0 obj\n(x)\nendobj\n1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\ntrailer\n<< /Root 1 0 R >>\n";
        let table = recover(data).unwrap();
        let second = data.windows(7).rposition(|w| w == b"1 0 obj").unwrap();
        assert_eq!(table.offset_of((1, 0)), Some(second));
        assert!(table.offset_of((12, 0)).is_some());
        assert!(table.offset_of((2, 0)).is_none());
        assert!(table.trailer.contains_key("Root"));
    }

    #[test]
    fn test_recover_without_objects_fails() {
        assert!(matches!(
            recover(b"%PDF-1.4\nnothing here"),
            Err(Error::CorruptDocument(_))
        ));
    }
}
