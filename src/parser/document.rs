//! Document loading: header, cross-reference index, object arena, page
//! tree and document information.

use super::filters::{self, Decoded};
use super::lexer::{Lexer, Token};
use super::object::{self, decode_text_string, Dictionary, Object, ObjectId, Stream};
use super::pages::{self, PdfPage};
use super::xref::{self, XrefEntry, XrefTable};
use crate::detect;
use crate::error::{Error, Result};
use crate::model::metadata::{parse_pdf_date, DocumentInfo};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Longest reference chain followed before giving up.
const MAX_REFERENCE_CHAIN: usize = 32;

/// A loaded PDF document.
///
/// All objects are parsed into an arena keyed by [`ObjectId`] at load time,
/// so a `PdfDocument` is immutable afterwards and can be shared across
/// threads by reference.
#[derive(Debug)]
pub struct PdfDocument {
    version: String,
    objects: HashMap<ObjectId, Object>,
    trailer: Dictionary,
    catalog: Dictionary,
    pages: Vec<PdfPage>,
    info: DocumentInfo,
    recovered: bool,
}

impl PdfDocument {
    /// Load a document from a file.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::load(&data)
    }

    /// Load a document from bytes.
    pub fn load(data: &[u8]) -> Result<Self> {
        let header = detect::detect_header(data)?;
        // Offsets count from the %PDF- marker when junk precedes it.
        let data = &data[header.offset..];

        let primary = xref::find_startxref(data)
            .ok_or_else(|| Error::CorruptDocument("startxref not found".to_string()))
            .and_then(|offset| xref::load_xref_chain(data, offset));

        let (objects, trailer, recovered) = match primary {
            Ok(table) => {
                reject_encrypted(&table.trailer)?;
                match build_arena(data, &table) {
                    Ok(objects) if catalog_of(&objects, &table.trailer).is_some() => {
                        (objects, table.trailer, false)
                    }
                    Ok(_) => {
                        log::warn!("Document catalog does not resolve, scanning for objects");
                        let (objects, trailer) = recover_arena(data, Some(&table.trailer))?;
                        (objects, trailer, true)
                    }
                    Err(err) => {
                        log::warn!("Cross-reference entry is invalid ({}), scanning for objects", err);
                        let (objects, trailer) = recover_arena(data, Some(&table.trailer))?;
                        (objects, trailer, true)
                    }
                }
            }
            Err(err) => {
                log::warn!("Cross-reference index unusable ({}), scanning for objects", err);
                let (objects, trailer) = recover_arena(data, None)?;
                (objects, trailer, true)
            }
        };

        let catalog = catalog_of(&objects, &trailer)
            .cloned()
            .ok_or_else(|| Error::CorruptDocument("no document catalog found".to_string()))?;

        let mut doc = PdfDocument {
            version: header.version.clone(),
            objects,
            trailer,
            catalog,
            pages: Vec::new(),
            info: DocumentInfo::with_version(header.version),
            recovered,
        };

        doc.pages = pages::collect_pages(&doc, &doc.catalog)?;
        doc.info = doc.read_info();

        log::debug!(
            "Loaded PDF {} with {} objects and {} pages{}",
            doc.version,
            doc.objects.len(),
            doc.pages.len(),
            if doc.recovered { " (recovered)" } else { "" }
        );
        Ok(doc)
    }

    /// PDF version from the header.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[PdfPage] {
        &self.pages
    }

    /// Page by 0-based index.
    pub fn page(&self, index: usize) -> Option<&PdfPage> {
        self.pages.get(index)
    }

    pub fn info(&self) -> &DocumentInfo {
        &self.info
    }

    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    pub fn catalog(&self) -> &Dictionary {
        &self.catalog
    }

    /// Whether the object table had to be rebuilt by scanning.
    pub fn is_recovered(&self) -> bool {
        self.recovered
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Look up an object by id.
    pub fn get(&self, id: ObjectId) -> Result<&Object> {
        self.objects.get(&id).ok_or_else(|| Error::missing(id))
    }

    /// Follow references until a direct object is reached.
    pub fn resolve<'a>(&'a self, obj: &'a Object) -> Result<&'a Object> {
        let mut current = obj;
        let mut seen = HashSet::new();
        while let Object::Reference(id) = current {
            if !seen.insert(*id) || seen.len() > MAX_REFERENCE_CHAIN {
                return Err(Error::CorruptDocument(format!(
                    "reference cycle at {} {} R",
                    id.0, id.1
                )));
            }
            current = self.get(*id)?;
        }
        Ok(current)
    }

    /// Like [`resolve`](Self::resolve), mapping failures to `None`.
    pub fn resolve_opt<'a>(&'a self, obj: &'a Object) -> Option<&'a Object> {
        self.resolve(obj).ok()
    }

    /// Resolve a dictionary entry.
    pub fn get_in<'a>(&'a self, dict: &'a Dictionary, key: &str) -> Option<&'a Object> {
        dict.get(key).and_then(|obj| self.resolve_opt(obj))
    }

    /// Decode a stream through all of its filters.
    pub fn decode_stream(&self, stream: &Stream) -> Result<Vec<u8>> {
        let dict = self.direct_filter_params(&stream.dict);
        let decoded = filters::decode(&dict, &stream.content)?;
        match decoded.image_codec {
            None => Ok(decoded.data),
            Some(codec) => Err(Error::Decode(format!(
                "{:?} data cannot be decoded as a general stream",
                codec
            ))),
        }
    }

    /// Decode a stream, stopping before any image codec.
    pub fn decode_stream_partial(&self, stream: &Stream) -> Result<Decoded> {
        let dict = self.direct_filter_params(&stream.dict);
        filters::decode(&dict, &stream.content)
    }

    /// Replace indirect `/Filter` and `/DecodeParms` values with direct ones.
    fn direct_filter_params<'a>(&self, dict: &'a Dictionary) -> Cow<'a, Dictionary> {
        const KEYS: [&str; 4] = ["Filter", "DecodeParms", "F", "DP"];
        let has_refs = KEYS.iter().any(|key| match dict.get(key) {
            Some(Object::Reference(_)) => true,
            Some(Object::Array(items)) => items.iter().any(|i| matches!(i, Object::Reference(_))),
            _ => false,
        });
        if !has_refs {
            return Cow::Borrowed(dict);
        }

        let mut owned = dict.clone();
        for key in KEYS {
            let Some(value) = dict.get(key) else { continue };
            let direct = match self.resolve_opt(value) {
                Some(Object::Array(items)) => Object::Array(
                    items
                        .iter()
                        .map(|i| self.resolve_opt(i).cloned().unwrap_or(Object::Null))
                        .collect(),
                ),
                Some(other) => other.clone(),
                None => Object::Null,
            };
            owned.insert(key, direct);
        }
        Cow::Owned(owned)
    }

    fn read_info(&self) -> DocumentInfo {
        let mut info = DocumentInfo::with_version(self.version.clone());
        let Some(dict) = self.get_in(&self.trailer, "Info").and_then(Object::as_dict) else {
            return info;
        };

        let text = |key: &str| -> Option<String> {
            let bytes = self.get_in(dict, key)?.as_string_bytes()?;
            let value = decode_text_string(bytes).trim().to_string();
            (!value.is_empty()).then_some(value)
        };

        info.title = text("Title");
        info.author = text("Author");
        info.subject = text("Subject");
        info.keywords = text("Keywords");
        info.creator = text("Creator");
        info.producer = text("Producer");
        info.created = text("CreationDate").and_then(|d| parse_pdf_date(&d));
        info.modified = text("ModDate").and_then(|d| parse_pdf_date(&d));
        info
    }
}

fn reject_encrypted(trailer: &Dictionary) -> Result<()> {
    if trailer.contains_key("Encrypt") {
        return Err(Error::EncryptedDocument);
    }
    Ok(())
}

/// The catalog named by the trailer's `/Root`, if it is a dictionary.
fn catalog_of<'a>(objects: &'a HashMap<ObjectId, Object>, trailer: &Dictionary) -> Option<&'a Dictionary> {
    let id = trailer.get("Root")?.as_reference()?;
    objects.get(&id)?.as_dict()
}

/// Parse every in-use entry of a trusted xref table. Any entry that fails
/// to parse, or parses to a different id, fails the whole table.
fn build_arena(data: &[u8], table: &XrefTable) -> Result<HashMap<ObjectId, Object>> {
    let lengths = xref::lengths(data, table);
    let mut objects = HashMap::with_capacity(table.entries.len());

    for (&number, entry) in &table.entries {
        if let XrefEntry::InUse { offset, generation } = *entry {
            if number == 0 {
                continue;
            }
            let (id, obj) = object::parse_indirect_object(data, offset, &lengths)?;
            if id.0 != number {
                return Err(Error::syntax(
                    offset,
                    format!("xref entry for object {} points at object {}", number, id.0),
                ));
            }
            objects.insert((number, generation), obj);
        }
    }

    let mut by_stream: HashMap<u32, Vec<u32>> = HashMap::new();
    for (&number, entry) in &table.entries {
        if let XrefEntry::Compressed { stream, .. } = *entry {
            by_stream.entry(stream).or_default().push(number);
        }
    }
    for (stream_number, members) in by_stream {
        let Some(Object::Stream(stream)) = objects.get(&(stream_number, 0)) else {
            return Err(Error::missing((stream_number, 0)));
        };
        let expanded = expand_object_stream(stream)?;
        let members: HashSet<u32> = members.into_iter().collect();
        for (number, obj) in expanded {
            if members.contains(&number) {
                objects.insert((number, 0), obj);
            }
        }
    }

    Ok(objects)
}

/// Rebuild the arena from a linear scan.
fn recover_arena(
    data: &[u8],
    previous_trailer: Option<&Dictionary>,
) -> Result<(HashMap<ObjectId, Object>, Dictionary)> {
    let table = xref::recover(data)?;
    reject_encrypted(&table.trailer)?;

    let mut objects = HashMap::new();
    {
        let lengths = xref::lengths(data, &table);
        for entry in table.entries.values() {
            if let XrefEntry::InUse { offset, .. } = *entry {
                match object::parse_indirect_object(data, offset, &lengths) {
                    Ok((id, obj)) => {
                        objects.insert(id, obj);
                    }
                    Err(err) => log::debug!("Skipping unparsable object at {}: {}", offset, err),
                }
            }
        }
    }

    let object_streams: Vec<Stream> = objects
        .values()
        .filter_map(Object::as_stream)
        .filter(|s| s.dict.has_type("ObjStm"))
        .cloned()
        .collect();
    for stream in &object_streams {
        match expand_object_stream(stream) {
            Ok(expanded) => {
                for (number, obj) in expanded {
                    objects.entry((number, 0)).or_insert(obj);
                }
            }
            Err(err) => log::debug!("Skipping damaged object stream: {}", err),
        }
    }

    let mut trailer = if catalog_of(&objects, &table.trailer).is_some() {
        table.trailer
    } else if let Some(previous) = previous_trailer.filter(|t| catalog_of(&objects, t).is_some()) {
        previous.clone()
    } else {
        let mut trailer = table.trailer;
        let mut catalogs: Vec<ObjectId> = objects
            .iter()
            .filter(|(_, obj)| obj.as_dict().is_some_and(|d| d.has_type("Catalog")))
            .map(|(id, _)| *id)
            .collect();
        catalogs.sort_unstable();
        let root = catalogs
            .first()
            .copied()
            .ok_or_else(|| Error::CorruptDocument("no document catalog found".to_string()))?;
        trailer.insert("Root", Object::Reference(root));
        trailer
    };

    if !trailer.contains_key("Info") {
        if let Some(info) = previous_trailer.and_then(|t| t.get("Info")) {
            trailer.insert("Info", info.clone());
        }
    }

    Ok((objects, trailer))
}

/// Parse the objects of an object stream (`/Type /ObjStm`).
fn expand_object_stream(stream: &Stream) -> Result<Vec<(u32, Object)>> {
    let count = stream.dict.get("N").and_then(Object::as_i64).unwrap_or(0).max(0) as usize;
    let first = stream.dict.get("First").and_then(Object::as_i64).unwrap_or(0).max(0) as usize;
    let data = filters::decode_stream(stream)?;

    let mut header = Lexer::new(&data);
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        match (header.next_token()?, header.next_token()?) {
            (Some(Token::Integer(number)), Some(Token::Integer(offset))) => {
                entries.push((number.max(0) as u32, offset.max(0) as usize));
            }
            _ => break,
        }
    }

    let mut out = Vec::with_capacity(entries.len());
    for (number, offset) in entries {
        let mut lexer = Lexer::at(&data, first + offset);
        match object::parse_object(&mut lexer, true) {
            Ok(obj) => out.push((number, obj)),
            Err(err) => log::debug!("Object {} in object stream is unreadable: {}", number, err),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{text_pdf, PdfBuilder};

    #[test]
    fn test_load_simple_document() {
        let doc = PdfDocument::load(&text_pdf(&["one", "two", "three"])).unwrap();
        assert_eq!(doc.version(), "1.4");
        assert_eq!(doc.page_count(), 3);
        assert!(!doc.is_recovered());
        let page = doc.page(1).unwrap();
        assert_eq!(page.index, 1);
        assert_eq!(page.media_box.x1, 612.0);
        assert!(page.resources.contains_key("Font"));
        assert_eq!(page.contents.len(), 1);
    }

    #[test]
    fn test_page_order_follows_kids() {
        let pdf = PdfBuilder::new()
            .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
            .object(2, "<< /Type /Pages /Kids [5 0 R 3 0 R] /Count 3 /MediaBox [0 0 100 200] >>")
            .object(3, "<< /Type /Pages /Parent 2 0 R /Kids [4 0 R 6 0 R] /Rotate 90 >>")
            .object(4, "<< /Type /Page /Parent 3 0 R >>")
            .object(5, "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 300 400] >>")
            .object(6, "<< /Type /Page /Parent 3 0 R /Rotate -90 >>")
            .build("/Root 1 0 R");
        let doc = PdfDocument::load(&pdf).unwrap();
        let ids: Vec<u32> = doc.pages().iter().map(|p| p.id.0).collect();
        assert_eq!(ids, vec![5, 4, 6]);
        assert_eq!(doc.page(0).unwrap().media_box.x1, 300.0);
        assert_eq!(doc.page(1).unwrap().media_box.y1, 200.0);
        assert_eq!(doc.page(1).unwrap().rotate, 90);
        assert_eq!(doc.page(2).unwrap().rotate, 270);
    }

    #[test]
    fn test_missing_media_box_defaults_to_letter() {
        let pdf = PdfBuilder::new()
            .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
            .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
            .object(3, "<< /Type /Page /Parent 2 0 R >>")
            .build("/Root 1 0 R");
        let doc = PdfDocument::load(&pdf).unwrap();
        assert_eq!(doc.page(0).unwrap().media_box, crate::model::Rect::LETTER);
    }

    #[test]
    fn test_page_tree_cycle_is_malformed() {
        let pdf = PdfBuilder::new()
            .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
            .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
            .object(3, "<< /Type /Pages /Kids [2 0 R] /Count 1 >>")
            .build("/Root 1 0 R");
        assert!(matches!(
            PdfDocument::load(&pdf),
            Err(Error::MalformedPageTree(_))
        ));
    }

    #[test]
    fn test_catalog_without_pages_is_malformed() {
        let pdf = PdfBuilder::new()
            .object(1, "<< /Type /Catalog >>")
            .build("/Root 1 0 R");
        assert!(matches!(
            PdfDocument::load(&pdf),
            Err(Error::MalformedPageTree(_))
        ));
    }

    #[test]
    fn test_encrypted_document_is_rejected() {
        let pdf = PdfBuilder::new()
            .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
            .object(2, "<< /Type /Pages /Kids [] /Count 0 >>")
            .object(3, "<< /Filter /Standard /V 2 /R 3 >>")
            .build("/Root 1 0 R /Encrypt 3 0 R");
        assert!(matches!(
            PdfDocument::load(&pdf),
            Err(Error::EncryptedDocument)
        ));
    }

    #[test]
    fn test_broken_xref_offsets_are_recovered() {
        let mut pdf = text_pdf(&["Recovered text"]);
        // Shift every object by inserting bytes after the header.
        pdf.splice(15..15, b"% padding that invalidates offsets\n".iter().copied());
        let doc = PdfDocument::load(&pdf).unwrap();
        assert!(doc.is_recovered());
        assert_eq!(doc.page_count(), 1);
    }

    #[test]
    fn test_missing_startxref_is_recovered() {
        let pdf = text_pdf(&["a", "b"]);
        let cut = pdf.windows(4).rposition(|w| w == b"xref").unwrap();
        let doc = PdfDocument::load(&pdf[..cut]).unwrap();
        assert!(doc.is_recovered());
        assert_eq!(doc.page_count(), 2);
    }

    #[test]
    fn test_unrecoverable_document_is_corrupt() {
        let result = PdfDocument::load(b"%PDF-1.4\nthis is not a pdf body\n%%EOF");
        assert!(matches!(result, Err(Error::CorruptDocument(_))));
    }

    #[test]
    fn test_info_dictionary() {
        let pdf = PdfBuilder::new()
            .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
            .object(2, "<< /Type /Pages /Kids [] /Count 0 >>")
            .object(
                3,
                "<< /Title (Quarterly Report) /Author <FEFF004A006F> /CreationDate (D:20240115103045Z) >>",
            )
            .build("/Root 1 0 R /Info 3 0 R");
        let doc = PdfDocument::load(&pdf).unwrap();
        assert_eq!(doc.info().title.as_deref(), Some("Quarterly Report"));
        assert_eq!(doc.info().author.as_deref(), Some("Jo"));
        assert!(doc.info().created.is_some());
        assert_eq!(doc.info().pdf_version, "1.4");
    }

    #[test]
    fn test_missing_object_error() {
        let doc = PdfDocument::load(&text_pdf(&["x"])).unwrap();
        assert!(matches!(doc.get((999, 0)), Err(Error::MissingObject(999, 0))));
    }

    #[test]
    fn test_xref_stream_with_object_stream() {
        // Objects 1 (catalog) and 2 (pages) live in object stream 5.
        let inner = b"1 0 2 40 << /Type /Catalog /Pages 2 0 R >>            << /Type /Pages /Kids [3 0 R] /Count 1 >>";
        let first = 9;
        let mut out = b"%PDF-1.5\n".to_vec();
        let mut offsets = [0usize; 7];

        offsets[3] = out.len();
        out.extend_from_slice(b"3 0 obj\n<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>\nendobj\n");
        offsets[4] = out.len();
        out.extend_from_slice(b"4 0 obj\n<< /Length 0 >>\nstream\n\nendstream\nendobj\n");
        offsets[5] = out.len();
        out.extend_from_slice(
            format!(
                "5 0 obj\n<< /Type /ObjStm /N 2 /First {} /Length {} >>\nstream\n",
                first,
                inner.len()
            )
            .as_bytes(),
        );
        out.extend_from_slice(inner);
        out.extend_from_slice(b"\nendstream\nendobj\n");

        offsets[6] = out.len();
        let mut rows = Vec::new();
        let entry = |kind: u8, field: u32, gen: u8| {
            let mut row = vec![kind];
            row.extend_from_slice(&field.to_be_bytes());
            row.push(gen);
            row
        };
        rows.extend(entry(0, 0, 255));
        rows.extend(entry(2, 5, 0));
        rows.extend(entry(2, 5, 1));
        for n in 3..=6 {
            rows.extend(entry(1, offsets[n] as u32, 0));
        }
        out.extend_from_slice(
            format!(
                "6 0 obj\n<< /Type /XRef /Size 7 /W [1 4 1] /Root 1 0 R /Length {} >>\nstream\n",
                rows.len()
            )
            .as_bytes(),
        );
        out.extend_from_slice(&rows);
        out.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{}\n%%EOF\n", offsets[6]).as_bytes());

        let doc = PdfDocument::load(&out).unwrap();
        assert!(!doc.is_recovered());
        assert_eq!(doc.page_count(), 1);
        assert!(doc.catalog().has_type("Catalog"));
    }
}
