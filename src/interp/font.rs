//! Font loading and text decoding.
//!
//! A [`PdfFont`] turns the bytes of a text-showing operand into characters
//! with their advance widths. Loading never fails: anything unusable in a
//! font dictionary degrades to defaults and marks the font as degraded.

use super::cmap::CMap;
use super::encoding::{glyph_name_to_unicode, BaseEncoding};
use super::metrics::StandardFamily;
use crate::parser::{Dictionary, Object, PdfDocument};
use std::collections::HashMap;

const FLAG_SYMBOLIC: i64 = 1 << 2;
const FLAG_ITALIC: i64 = 1 << 6;
const FLAG_FORCE_BOLD: i64 = 1 << 18;

/// Advance used when nothing better is known, in glyph units.
const DEFAULT_WIDTH: f32 = 500.0;
const DEFAULT_CID_WIDTH: f32 = 1000.0;

/// One decoded character code.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedChar {
    pub code: u32,
    /// Unicode text; empty when the code has no known mapping
    pub text: String,
    /// Horizontal advance in text space units, before font size scaling
    pub width: f32,
    /// A single-byte code 32, which receives word spacing
    pub word_space: bool,
}

#[derive(Debug, Clone)]
enum Encoding {
    /// Single-byte codes mapped through a 256-entry table
    Simple(Vec<Option<String>>),
    /// Multi-byte codes split by a CMap. With `unicode_codes` the code is
    /// itself a UCS-2 value.
    Cid { cmap: CMap, unicode_codes: bool },
}

#[derive(Debug, Clone)]
enum Widths {
    Simple { first_char: u32, widths: Vec<f32> },
    Cid { widths: HashMap<u32, f32>, default: f32 },
    Unknown,
}

/// A loaded font resource.
#[derive(Debug, Clone)]
pub struct PdfFont {
    /// Base font name without the subset tag
    pub base_name: String,
    pub bold: bool,
    pub italic: bool,
    encoding: Encoding,
    to_unicode: Option<CMap>,
    widths: Widths,
    standard: Option<StandardFamily>,
    missing_width: Option<f32>,
    /// Glyph space to text space scale
    glyph_scale: f32,
    degraded: bool,
}

impl PdfFont {
    /// Load a font from its dictionary.
    pub fn load(doc: &PdfDocument, dict: &Dictionary) -> PdfFont {
        let subtype = dict.get_name("Subtype").unwrap_or("Type1");
        let base_name = doc
            .get_in(dict, "BaseFont")
            .and_then(Object::as_name)
            .map(strip_subset_tag)
            .unwrap_or_else(|| subtype.to_string());

        let descendant = if subtype == "Type0" {
            doc.get_in(dict, "DescendantFonts")
                .and_then(Object::as_array)
                .and_then(|fonts| fonts.first())
                .and_then(|font| doc.resolve_opt(font))
                .and_then(Object::as_dict)
        } else {
            None
        };
        let descriptor = doc
            .get_in(descendant.unwrap_or(dict), "FontDescriptor")
            .and_then(Object::as_dict);

        let flags = descriptor
            .and_then(|d| doc.get_in(d, "Flags"))
            .and_then(Object::as_i64)
            .unwrap_or(0);
        let weight = descriptor
            .and_then(|d| doc.get_in(d, "FontWeight"))
            .and_then(Object::as_f64)
            .unwrap_or(0.0);
        let lower = base_name.to_ascii_lowercase();
        let bold = ["bold", "black", "heavy", "semibold"]
            .iter()
            .any(|marker| lower.contains(marker))
            || flags & FLAG_FORCE_BOLD != 0
            || weight >= 600.0;
        let italic =
            lower.contains("italic") || lower.contains("oblique") || flags & FLAG_ITALIC != 0;

        let to_unicode = doc
            .get_in(dict, "ToUnicode")
            .and_then(Object::as_stream)
            .and_then(|stream| match doc.decode_stream(stream) {
                Ok(data) => Some(CMap::parse(&data)),
                Err(e) => {
                    log::warn!("ToUnicode of font {} unreadable: {}", base_name, e);
                    None
                }
            })
            .filter(CMap::has_unicode);

        let missing_width = descriptor
            .and_then(|d| doc.get_in(d, "MissingWidth"))
            .and_then(Object::as_f32)
            .filter(|w| *w > 0.0);

        let mut font = PdfFont {
            base_name,
            bold,
            italic,
            encoding: Encoding::Simple(Vec::new()),
            to_unicode,
            widths: Widths::Unknown,
            standard: None,
            missing_width,
            glyph_scale: 0.001,
            degraded: false,
        };

        if subtype == "Type0" {
            font.encoding = cid_encoding(doc, dict);
            match descendant {
                Some(cid_font) => font.widths = cid_widths(doc, cid_font),
                None => {
                    font.widths = Widths::Cid {
                        widths: HashMap::new(),
                        default: DEFAULT_CID_WIDTH,
                    };
                    font.degraded = true;
                }
            }
            return font;
        }

        let symbolic = flags & FLAG_SYMBOLIC != 0
            || font.base_name.starts_with("Symbol")
            || font.base_name.starts_with("ZapfDingbats");
        let default_base = if subtype == "TrueType" {
            BaseEncoding::WinAnsi
        } else if symbolic && descriptor.is_none() {
            BaseEncoding::Identity
        } else {
            BaseEncoding::Standard
        };
        font.encoding = Encoding::Simple(simple_encoding(doc, dict, default_base));
        font.widths = simple_widths(doc, dict);
        font.standard = StandardFamily::from_base_font(&font.base_name);

        if subtype == "Type3" {
            font.glyph_scale = doc
                .get_in(dict, "FontMatrix")
                .and_then(Object::as_array)
                .and_then(|m| m.first())
                .and_then(Object::as_f32)
                .filter(|s| *s != 0.0)
                .unwrap_or(0.001);
        }

        font.degraded = matches!(font.widths, Widths::Unknown)
            && font.standard.is_none()
            && font.missing_width.is_none();
        font
    }

    /// A stand-in for a font resource that could not be found. Uses
    /// Helvetica metrics and is always degraded.
    pub fn fallback(name: &str) -> PdfFont {
        PdfFont {
            base_name: name.to_string(),
            bold: false,
            italic: false,
            encoding: Encoding::Simple(build_table(BaseEncoding::Standard)),
            to_unicode: None,
            widths: Widths::Unknown,
            standard: Some(StandardFamily::Helvetica),
            missing_width: None,
            glyph_scale: 0.001,
            degraded: true,
        }
    }

    /// Whether widths had to be guessed.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Whether character codes are multi-byte.
    pub fn is_composite(&self) -> bool {
        matches!(self.encoding, Encoding::Cid { .. })
    }

    /// Split a string operand into decoded characters.
    pub fn decode(&self, bytes: &[u8]) -> Vec<DecodedChar> {
        match &self.encoding {
            Encoding::Simple(table) => bytes
                .iter()
                .map(|&b| {
                    let code = u32::from(b);
                    let text = self
                        .to_unicode
                        .as_ref()
                        .and_then(|cmap| cmap.lookup_unicode(code))
                        .or_else(|| table.get(usize::from(b)).cloned().flatten())
                        .unwrap_or_default();
                    let width = self.simple_width(code, &text);
                    DecodedChar {
                        code,
                        text,
                        width,
                        word_space: b == b' ',
                    }
                })
                .collect(),
            Encoding::Cid {
                cmap,
                unicode_codes,
            } => {
                let mut out = Vec::new();
                let mut pos = 0;
                while pos < bytes.len() {
                    let (code, len) = cmap.next_code(&bytes[pos..], 2);
                    pos += len.max(1);
                    let cid = if *unicode_codes {
                        code
                    } else {
                        cmap.lookup_cid(code).unwrap_or(code)
                    };
                    let text = self
                        .to_unicode
                        .as_ref()
                        .and_then(|m| m.lookup_unicode(code))
                        .or_else(|| {
                            let value = if *unicode_codes { code } else { cid };
                            char::from_u32(value)
                                .filter(|c| !c.is_control())
                                .map(String::from)
                        })
                        .unwrap_or_default();
                    out.push(DecodedChar {
                        code,
                        text,
                        width: self.cid_width(cid),
                        word_space: len == 1 && code == 32,
                    });
                }
                out
            }
        }
    }

    fn simple_width(&self, code: u32, text: &str) -> f32 {
        if let Widths::Simple { first_char, widths } = &self.widths {
            if let Some(w) = code
                .checked_sub(*first_char)
                .and_then(|i| widths.get(i as usize))
            {
                return w * self.glyph_scale;
            }
        }
        let glyph = match (self.standard, self.missing_width) {
            (Some(family), _) => text
                .chars()
                .next()
                .map(|c| family.width(c))
                .unwrap_or_else(|| family.average_width()),
            (None, Some(missing)) => missing,
            (None, None) => DEFAULT_WIDTH,
        };
        glyph * self.glyph_scale
    }

    fn cid_width(&self, cid: u32) -> f32 {
        let glyph = match &self.widths {
            Widths::Cid { widths, default } => widths.get(&cid).copied().unwrap_or(*default),
            _ => DEFAULT_CID_WIDTH,
        };
        glyph * self.glyph_scale
    }
}

/// `ABCDEF+Name` → `Name`.
fn strip_subset_tag(name: &str) -> String {
    match name.split_once('+') {
        Some((tag, rest))
            if tag.len() == 6 && tag.bytes().all(|b| b.is_ascii_uppercase()) =>
        {
            rest.to_string()
        }
        _ => name.to_string(),
    }
}

fn build_table(base: BaseEncoding) -> Vec<Option<String>> {
    (0..=255u8)
        .map(|code| base.decode(code).map(String::from))
        .collect()
}

fn simple_encoding(
    doc: &PdfDocument,
    dict: &Dictionary,
    default_base: BaseEncoding,
) -> Vec<Option<String>> {
    let encoding = doc.get_in(dict, "Encoding");
    let base = match encoding {
        Some(Object::Name(name)) => BaseEncoding::from_name(name).unwrap_or(default_base),
        Some(Object::Dictionary(enc)) => enc
            .get_name("BaseEncoding")
            .and_then(BaseEncoding::from_name)
            .unwrap_or(default_base),
        _ => default_base,
    };
    let mut table = build_table(base);

    let differences = encoding
        .and_then(Object::as_dict)
        .and_then(|enc| doc.get_in(enc, "Differences"))
        .and_then(Object::as_array);
    if let Some(differences) = differences {
        let mut code: usize = 0;
        for item in differences {
            match doc.resolve_opt(item) {
                Some(Object::Integer(n)) => code = (*n).clamp(0, 255) as usize,
                Some(Object::Name(glyph)) => {
                    if let Some(slot) = table.get_mut(code) {
                        *slot = glyph_name_to_unicode(glyph);
                    }
                    code += 1;
                }
                _ => {}
            }
        }
    }
    table
}

fn simple_widths(doc: &PdfDocument, dict: &Dictionary) -> Widths {
    let widths: Vec<f32> = match doc.get_in(dict, "Widths").and_then(Object::as_array) {
        Some(items) => items
            .iter()
            .map(|w| doc.resolve_opt(w).and_then(Object::as_f32).unwrap_or(0.0))
            .collect(),
        None => return Widths::Unknown,
    };
    if widths.is_empty() {
        return Widths::Unknown;
    }
    let first_char = doc
        .get_in(dict, "FirstChar")
        .and_then(Object::as_i64)
        .unwrap_or(0)
        .max(0) as u32;
    Widths::Simple { first_char, widths }
}

fn cid_encoding(doc: &PdfDocument, dict: &Dictionary) -> Encoding {
    match doc.get_in(dict, "Encoding") {
        Some(Object::Name(name)) => {
            let unicode_codes = name.starts_with("Uni")
                && (name.contains("UCS2") || name.contains("UTF16"));
            if !unicode_codes && !name.starts_with("Identity") {
                log::debug!("predefined CMap {} read as Identity", name);
            }
            Encoding::Cid {
                cmap: CMap::identity(),
                unicode_codes,
            }
        }
        Some(Object::Stream(stream)) => {
            let cmap = doc
                .decode_stream(stream)
                .map(|data| CMap::parse(&data))
                .ok()
                .filter(CMap::has_codespace)
                .unwrap_or_else(CMap::identity);
            Encoding::Cid {
                cmap,
                unicode_codes: false,
            }
        }
        _ => Encoding::Cid {
            cmap: CMap::identity(),
            unicode_codes: false,
        },
    }
}

/// Parse `/W` in both forms: `c [w1 w2 ...]` and `c_first c_last w`.
fn cid_widths(doc: &PdfDocument, cid_font: &Dictionary) -> Widths {
    let default = doc
        .get_in(cid_font, "DW")
        .and_then(Object::as_f32)
        .unwrap_or(DEFAULT_CID_WIDTH);
    let mut widths = HashMap::new();

    if let Some(w) = doc.get_in(cid_font, "W").and_then(Object::as_array) {
        let items: Vec<&Object> = w.iter().filter_map(|o| doc.resolve_opt(o)).collect();
        let mut i = 0;
        while i < items.len() {
            let Some(first) = items[i].as_i64() else {
                i += 1;
                continue;
            };
            match items.get(i + 1) {
                Some(Object::Array(list)) => {
                    for (offset, width) in list.iter().enumerate() {
                        if let Some(width) = doc.resolve_opt(width).and_then(Object::as_f32) {
                            widths.insert(first.max(0) as u32 + offset as u32, width);
                        }
                    }
                    i += 2;
                }
                Some(last) => {
                    let (Some(last), Some(width)) = (
                        last.as_i64(),
                        items.get(i + 2).and_then(|o| o.as_f32()),
                    ) else {
                        break;
                    };
                    // Guard against absurd ranges.
                    let last = last.min(first + 0xFFFF);
                    for cid in first.max(0)..=last.max(0) {
                        widths.insert(cid as u32, width);
                    }
                    i += 3;
                }
                None => break,
            }
        }
    }
    Widths::Cid { widths, default }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::PdfBuilder;

    /// Load a document whose object 5 is the font under test.
    fn doc_with_font(builder: PdfBuilder) -> PdfDocument {
        let data = builder
            .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
            .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
            .object(3, "<< /Type /Page /Parent 2 0 R >>")
            .build("/Root 1 0 R");
        PdfDocument::load(&data).unwrap()
    }

    fn font_at(doc: &PdfDocument, num: u32) -> PdfFont {
        let dict = doc.get((num, 0)).unwrap().as_dict().unwrap();
        PdfFont::load(doc, dict)
    }

    fn text_of(chars: &[DecodedChar]) -> String {
        chars.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn test_standard_font_widths() {
        let doc = doc_with_font(
            PdfBuilder::new().object(5, "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>"),
        );
        let font = font_at(&doc, 5);
        assert!(!font.is_degraded());
        let chars = font.decode(b"Hi ");
        assert_eq!(text_of(&chars), "Hi ");
        assert!((chars[0].width - 0.722).abs() < 1e-6);
        assert!((chars[1].width - 0.222).abs() < 1e-6);
        assert!(chars[2].word_space);
    }

    #[test]
    fn test_widths_array_and_subset_tag() {
        let doc = doc_with_font(PdfBuilder::new().object(
            5,
            "<< /Type /Font /Subtype /TrueType /BaseFont /ABCDEF+Georgia-Bold /FirstChar 65 /Widths [700 600] >>",
        ));
        let font = font_at(&doc, 5);
        assert_eq!(font.base_name, "Georgia-Bold");
        assert!(font.bold);
        assert!(!font.italic);
        let chars = font.decode(b"ABC");
        assert!((chars[0].width - 0.7).abs() < 1e-6);
        assert!((chars[1].width - 0.6).abs() < 1e-6);
        // Outside the Widths range and no standard metrics
        assert!((chars[2].width - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_font_without_widths_is_degraded() {
        let doc = doc_with_font(
            PdfBuilder::new().object(5, "<< /Type /Font /Subtype /Type1 /BaseFont /Garamond >>"),
        );
        let font = font_at(&doc, 5);
        assert!(font.is_degraded());
        assert_eq!(text_of(&font.decode(b"ok")), "ok");
    }

    #[test]
    fn test_differences() {
        let doc = doc_with_font(PdfBuilder::new().object(
            5,
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding << /BaseEncoding /WinAnsiEncoding /Differences [65 /fi /eacute] >> >>",
        ));
        let font = font_at(&doc, 5);
        assert_eq!(text_of(&font.decode(b"ABC")), "\u{fb01}\u{e9}C");
    }

    #[test]
    fn test_to_unicode_wins() {
        let cmap = b"begincmap\n1 begincodespacerange <00> <FF> endcodespacerange\n1 beginbfchar <41> <0058> endbfchar\nendcmap";
        let doc = doc_with_font(
            PdfBuilder::new()
                .object(5, "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /ToUnicode 6 0 R >>")
                .stream(6, "", cmap),
        );
        let font = font_at(&doc, 5);
        assert_eq!(text_of(&font.decode(b"AB")), "XB");
    }

    #[test]
    fn test_type0_identity_with_widths() {
        let cmap = b"begincmap\n1 begincodespacerange <0000> <FFFF> endcodespacerange\n2 beginbfchar <0003> <0048> <0004> <0069> endbfchar\nendcmap";
        let doc = doc_with_font(
            PdfBuilder::new()
                .object(
                    5,
                    "<< /Type /Font /Subtype /Type0 /BaseFont /NotoSans /Encoding /Identity-H /DescendantFonts [7 0 R] /ToUnicode 6 0 R >>",
                )
                .stream(6, "", cmap)
                .object(
                    7,
                    "<< /Type /Font /Subtype /CIDFontType2 /BaseFont /NotoSans /DW 800 /W [3 [600 250]] >>",
                ),
        );
        let font = font_at(&doc, 5);
        assert!(font.is_composite());
        let chars = font.decode(&[0x00, 0x03, 0x00, 0x04, 0x00, 0x09]);
        assert_eq!(chars.len(), 3);
        assert_eq!(chars[0].text, "H");
        assert_eq!(chars[1].text, "i");
        assert!((chars[0].width - 0.6).abs() < 1e-6);
        assert!((chars[1].width - 0.25).abs() < 1e-6);
        assert!((chars[2].width - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_type0_ucs2_and_range_widths() {
        let doc = doc_with_font(
            PdfBuilder::new()
                .object(
                    5,
                    "<< /Type /Font /Subtype /Type0 /BaseFont /MSMincho /Encoding /UniJIS-UCS2-H /DescendantFonts [7 0 R] >>",
                )
                .object(7, "<< /Type /Font /Subtype /CIDFontType0 /W [20 40 500] >>"),
        );
        let font = font_at(&doc, 5);
        let chars = font.decode(&[0x65, 0xE5, 0x00, 0x20]);
        assert_eq!(chars[0].text, "\u{65e5}");
        assert!((chars[1].width - 0.5).abs() < 1e-6);
        assert!(!chars[1].word_space);
    }

    #[test]
    fn test_type3_font_matrix_scale() {
        let doc = doc_with_font(PdfBuilder::new().object(
            5,
            "<< /Type /Font /Subtype /Type3 /FontMatrix [0.01 0 0 0.01 0 0] /FirstChar 97 /Widths [50] /Encoding << /Differences [97 /a] >> >>",
        ));
        let font = font_at(&doc, 5);
        let chars = font.decode(b"a");
        assert_eq!(chars[0].text, "a");
        assert!((chars[0].width - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_fallback_font() {
        let font = PdfFont::fallback("F9");
        assert!(font.is_degraded());
        let chars = font.decode(b"A");
        assert_eq!(chars[0].text, "A");
        assert!((chars[0].width - 0.667).abs() < 1e-6);
    }
}
