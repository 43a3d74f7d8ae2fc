//! Simple-font encodings and glyph name mapping.

/// A base encoding for single-byte fonts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseEncoding {
    Standard,
    WinAnsi,
    MacRoman,
    /// Codes map straight to Latin-1 (used for symbolic fonts we cannot map)
    Identity,
}

impl BaseEncoding {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "StandardEncoding" => Some(Self::Standard),
            "WinAnsiEncoding" => Some(Self::WinAnsi),
            "MacRomanEncoding" => Some(Self::MacRoman),
            // Expert glyph sets are read through Standard.
            "MacExpertEncoding" => Some(Self::Standard),
            _ => None,
        }
    }

    /// Character for a code, or `None` when the code is unassigned.
    pub fn decode(self, code: u8) -> Option<char> {
        match self {
            Self::Standard => standard(code),
            Self::WinAnsi => win_ansi(code),
            Self::MacRoman => mac_roman(code),
            Self::Identity => Some(char::from(code)),
        }
    }
}

fn printable_ascii(code: u8) -> Option<char> {
    (0x20..=0x7E).contains(&code).then_some(char::from(code))
}

fn win_ansi(code: u8) -> Option<char> {
    const HIGH: [u16; 32] = [
        0x20AC, 0, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, 0x02C6, 0x2030, 0x0160, 0x2039,
        0x0152, 0, 0x017D, 0, 0, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014, 0x02DC,
        0x2122, 0x0161, 0x203A, 0x0153, 0, 0x017E, 0x0178,
    ];
    match code {
        0x80..=0x9F => from_u16(HIGH[(code - 0x80) as usize]),
        0xA0..=0xFF => Some(char::from(code)),
        b'\t' | b'\n' | b'\r' => Some(char::from(code)),
        _ => printable_ascii(code),
    }
}

fn mac_roman(code: u8) -> Option<char> {
    const HIGH: [u16; 128] = [
        0x00C4, 0x00C5, 0x00C7, 0x00C9, 0x00D1, 0x00D6, 0x00DC, 0x00E1, 0x00E0, 0x00E2, 0x00E4,
        0x00E3, 0x00E5, 0x00E7, 0x00E9, 0x00E8, 0x00EA, 0x00EB, 0x00ED, 0x00EC, 0x00EE, 0x00EF,
        0x00F1, 0x00F3, 0x00F2, 0x00F4, 0x00F6, 0x00F5, 0x00FA, 0x00F9, 0x00FB, 0x00FC, 0x2020,
        0x00B0, 0x00A2, 0x00A3, 0x00A7, 0x2022, 0x00B6, 0x00DF, 0x00AE, 0x00A9, 0x2122, 0x00B4,
        0x00A8, 0x2260, 0x00C6, 0x00D8, 0x221E, 0x00B1, 0x2264, 0x2265, 0x00A5, 0x00B5, 0x2202,
        0x2211, 0x220F, 0x03C0, 0x222B, 0x00AA, 0x00BA, 0x03A9, 0x00E6, 0x00F8, 0x00BF, 0x00A1,
        0x00AC, 0x221A, 0x0192, 0x2248, 0x2206, 0x00AB, 0x00BB, 0x2026, 0x00A0, 0x00C0, 0x00C3,
        0x00D5, 0x0152, 0x0153, 0x2013, 0x2014, 0x201C, 0x201D, 0x2018, 0x2019, 0x00F7, 0x25CA,
        0x00FF, 0x0178, 0x2044, 0x20AC, 0x2039, 0x203A, 0xFB01, 0xFB02, 0x2021, 0x00B7, 0x201A,
        0x201E, 0x2030, 0x00C2, 0x00CA, 0x00C1, 0x00CB, 0x00C8, 0x00CD, 0x00CE, 0x00CF, 0x00CC,
        0x00D3, 0x00D4, 0xF8FF, 0x00D2, 0x00DA, 0x00DB, 0x00D9, 0x0131, 0x02C6, 0x02DC, 0x00AF,
        0x02D8, 0x02D9, 0x02DA, 0x00B8, 0x02DD, 0x02DB, 0x02C7,
    ];
    match code {
        0x80..=0xFF => from_u16(HIGH[(code - 0x80) as usize]),
        _ => printable_ascii(code),
    }
}

fn standard(code: u8) -> Option<char> {
    let unicode: u16 = match code {
        0x27 => 0x2019,
        0x60 => 0x2018,
        0x20..=0x7E => return Some(char::from(code)),
        0xA1 => 0x00A1,
        0xA2 => 0x00A2,
        0xA3 => 0x00A3,
        0xA4 => 0x2044,
        0xA5 => 0x00A5,
        0xA6 => 0x0192,
        0xA7 => 0x00A7,
        0xA8 => 0x00A4,
        0xA9 => 0x0027,
        0xAA => 0x201C,
        0xAB => 0x00AB,
        0xAC => 0x2039,
        0xAD => 0x203A,
        0xAE => 0xFB01,
        0xAF => 0xFB02,
        0xB1 => 0x2013,
        0xB2 => 0x2020,
        0xB3 => 0x2021,
        0xB4 => 0x00B7,
        0xB6 => 0x00B6,
        0xB7 => 0x2022,
        0xB8 => 0x201A,
        0xB9 => 0x201E,
        0xBA => 0x201D,
        0xBB => 0x00BB,
        0xBC => 0x2026,
        0xBD => 0x2030,
        0xBF => 0x00BF,
        0xC1 => 0x0060,
        0xC2 => 0x00B4,
        0xC3 => 0x02C6,
        0xC4 => 0x02DC,
        0xC5 => 0x00AF,
        0xC6 => 0x02D8,
        0xC7 => 0x02D9,
        0xC8 => 0x00A8,
        0xCA => 0x02DA,
        0xCB => 0x00B8,
        0xCD => 0x02DD,
        0xCE => 0x02DB,
        0xCF => 0x02C7,
        0xD0 => 0x2014,
        0xE1 => 0x00C6,
        0xE3 => 0x00AA,
        0xE8 => 0x0141,
        0xE9 => 0x00D8,
        0xEA => 0x0152,
        0xEB => 0x00BA,
        0xF1 => 0x00E6,
        0xF5 => 0x0131,
        0xF8 => 0x0142,
        0xF9 => 0x00F8,
        0xFA => 0x0153,
        0xFB => 0x00DF,
        _ => return None,
    };
    from_u16(unicode)
}

fn from_u16(value: u16) -> Option<char> {
    if value == 0 {
        None
    } else {
        char::from_u32(u32::from(value))
    }
}

/// Map a glyph name to Unicode text.
///
/// Handles `uniXXXX[XXXX...]`, `uXXXX[XX]`, single-letter and digit names,
/// suffixed variants (`a.sc`, `f_i`) and a table of common names.
pub fn glyph_name_to_unicode(name: &str) -> Option<String> {
    // Variants like `a.sc` or `one.oldstyle` map through the base name.
    let base = name.split('.').next().unwrap_or(name);
    if base.is_empty() {
        return None;
    }

    if base.contains('_') {
        let parts: Option<String> = base.split('_').map(glyph_name_to_unicode).collect();
        return parts;
    }

    if let Some(hex) = base.strip_prefix("uni") {
        if hex.len() >= 4 && hex.len() % 4 == 0 && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            let units: Vec<u16> = hex
                .as_bytes()
                .chunks(4)
                .filter_map(|c| std::str::from_utf8(c).ok())
                .filter_map(|c| u16::from_str_radix(c, 16).ok())
                .collect();
            return Some(String::from_utf16_lossy(&units));
        }
    }

    if let Some(hex) = base.strip_prefix('u') {
        if (4..=6).contains(&hex.len()) && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return u32::from_str_radix(hex, 16)
                .ok()
                .and_then(char::from_u32)
                .map(String::from);
        }
    }

    if base.len() == 1 && base.as_bytes()[0].is_ascii_alphabetic() {
        return Some(base.to_string());
    }

    GLYPH_NAMES
        .binary_search_by(|(n, _)| n.cmp(&base))
        .ok()
        .and_then(|i| char::from_u32(GLYPH_NAMES[i].1))
        .map(String::from)
}

/// Common glyph names, sorted by name for binary search.
const GLYPH_NAMES: &[(&str, u32)] = &[
    ("AE", 0x00C6),
    ("Aacute", 0x00C1),
    ("Acircumflex", 0x00C2),
    ("Adieresis", 0x00C4),
    ("Agrave", 0x00C0),
    ("Aring", 0x00C5),
    ("Atilde", 0x00C3),
    ("Ccedilla", 0x00C7),
    ("Eacute", 0x00C9),
    ("Ecircumflex", 0x00CA),
    ("Edieresis", 0x00CB),
    ("Egrave", 0x00C8),
    ("Eth", 0x00D0),
    ("Euro", 0x20AC),
    ("Iacute", 0x00CD),
    ("Icircumflex", 0x00CE),
    ("Idieresis", 0x00CF),
    ("Igrave", 0x00CC),
    ("Lslash", 0x0141),
    ("Ntilde", 0x00D1),
    ("OE", 0x0152),
    ("Oacute", 0x00D3),
    ("Ocircumflex", 0x00D4),
    ("Odieresis", 0x00D6),
    ("Ograve", 0x00D2),
    ("Oslash", 0x00D8),
    ("Otilde", 0x00D5),
    ("Scaron", 0x0160),
    ("Thorn", 0x00DE),
    ("Uacute", 0x00DA),
    ("Ucircumflex", 0x00DB),
    ("Udieresis", 0x00DC),
    ("Ugrave", 0x00D9),
    ("Yacute", 0x00DD),
    ("Ydieresis", 0x0178),
    ("Zcaron", 0x017D),
    ("aacute", 0x00E1),
    ("acircumflex", 0x00E2),
    ("acute", 0x00B4),
    ("adieresis", 0x00E4),
    ("ae", 0x00E6),
    ("agrave", 0x00E0),
    ("ampersand", 0x0026),
    ("aring", 0x00E5),
    ("arrowdown", 0x2193),
    ("arrowleft", 0x2190),
    ("arrowright", 0x2192),
    ("arrowup", 0x2191),
    ("asciicircum", 0x005E),
    ("asciitilde", 0x007E),
    ("asterisk", 0x002A),
    ("at", 0x0040),
    ("atilde", 0x00E3),
    ("backslash", 0x005C),
    ("bar", 0x007C),
    ("braceleft", 0x007B),
    ("braceright", 0x007D),
    ("bracketleft", 0x005B),
    ("bracketright", 0x005D),
    ("breve", 0x02D8),
    ("brokenbar", 0x00A6),
    ("bullet", 0x2022),
    ("caron", 0x02C7),
    ("ccedilla", 0x00E7),
    ("cedilla", 0x00B8),
    ("cent", 0x00A2),
    ("circumflex", 0x02C6),
    ("colon", 0x003A),
    ("comma", 0x002C),
    ("copyright", 0x00A9),
    ("currency", 0x00A4),
    ("dagger", 0x2020),
    ("daggerdbl", 0x2021),
    ("degree", 0x00B0),
    ("dieresis", 0x00A8),
    ("divide", 0x00F7),
    ("dollar", 0x0024),
    ("dotaccent", 0x02D9),
    ("dotlessi", 0x0131),
    ("eacute", 0x00E9),
    ("ecircumflex", 0x00EA),
    ("edieresis", 0x00EB),
    ("egrave", 0x00E8),
    ("eight", 0x0038),
    ("ellipsis", 0x2026),
    ("emdash", 0x2014),
    ("endash", 0x2013),
    ("equal", 0x003D),
    ("eth", 0x00F0),
    ("exclam", 0x0021),
    ("exclamdown", 0x00A1),
    ("ff", 0xFB00),
    ("ffi", 0xFB03),
    ("ffl", 0xFB04),
    ("fi", 0xFB01),
    ("five", 0x0035),
    ("fl", 0xFB02),
    ("florin", 0x0192),
    ("four", 0x0034),
    ("fraction", 0x2044),
    ("germandbls", 0x00DF),
    ("grave", 0x0060),
    ("greater", 0x003E),
    ("greaterequal", 0x2265),
    ("guillemotleft", 0x00AB),
    ("guillemotright", 0x00BB),
    ("guilsinglleft", 0x2039),
    ("guilsinglright", 0x203A),
    ("hungarumlaut", 0x02DD),
    ("hyphen", 0x002D),
    ("iacute", 0x00ED),
    ("icircumflex", 0x00EE),
    ("idieresis", 0x00EF),
    ("igrave", 0x00EC),
    ("infinity", 0x221E),
    ("less", 0x003C),
    ("lessequal", 0x2264),
    ("logicalnot", 0x00AC),
    ("lslash", 0x0142),
    ("macron", 0x00AF),
    ("minus", 0x2212),
    ("mu", 0x00B5),
    ("multiply", 0x00D7),
    ("nine", 0x0039),
    ("notequal", 0x2260),
    ("ntilde", 0x00F1),
    ("numbersign", 0x0023),
    ("oacute", 0x00F3),
    ("ocircumflex", 0x00F4),
    ("odieresis", 0x00F6),
    ("oe", 0x0153),
    ("ogonek", 0x02DB),
    ("ograve", 0x00F2),
    ("one", 0x0031),
    ("onehalf", 0x00BD),
    ("onequarter", 0x00BC),
    ("onesuperior", 0x00B9),
    ("ordfeminine", 0x00AA),
    ("ordmasculine", 0x00BA),
    ("oslash", 0x00F8),
    ("otilde", 0x00F5),
    ("paragraph", 0x00B6),
    ("parenleft", 0x0028),
    ("parenright", 0x0029),
    ("percent", 0x0025),
    ("period", 0x002E),
    ("periodcentered", 0x00B7),
    ("perthousand", 0x2030),
    ("plus", 0x002B),
    ("plusminus", 0x00B1),
    ("question", 0x003F),
    ("questiondown", 0x00BF),
    ("quotedbl", 0x0022),
    ("quotedblbase", 0x201E),
    ("quotedblleft", 0x201C),
    ("quotedblright", 0x201D),
    ("quoteleft", 0x2018),
    ("quoteright", 0x2019),
    ("quotesinglbase", 0x201A),
    ("quotesingle", 0x0027),
    ("registered", 0x00AE),
    ("ring", 0x02DA),
    ("scaron", 0x0161),
    ("section", 0x00A7),
    ("semicolon", 0x003B),
    ("seven", 0x0037),
    ("six", 0x0036),
    ("slash", 0x002F),
    ("space", 0x0020),
    ("sterling", 0x00A3),
    ("thorn", 0x00FE),
    ("three", 0x0033),
    ("threequarters", 0x00BE),
    ("threesuperior", 0x00B3),
    ("tilde", 0x02DC),
    ("trademark", 0x2122),
    ("two", 0x0032),
    ("twosuperior", 0x00B2),
    ("uacute", 0x00FA),
    ("ucircumflex", 0x00FB),
    ("udieresis", 0x00FC),
    ("ugrave", 0x00F9),
    ("underscore", 0x005F),
    ("yacute", 0x00FD),
    ("ydieresis", 0x00FF),
    ("yen", 0x00A5),
    ("zcaron", 0x017E),
    ("zero", 0x0030),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glyph_table_is_sorted() {
        assert!(GLYPH_NAMES.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_glyph_names() {
        assert_eq!(glyph_name_to_unicode("A").as_deref(), Some("A"));
        assert_eq!(glyph_name_to_unicode("eacute").as_deref(), Some("é"));
        assert_eq!(glyph_name_to_unicode("uni0041").as_deref(), Some("A"));
        assert_eq!(glyph_name_to_unicode("uni00410042").as_deref(), Some("AB"));
        assert_eq!(glyph_name_to_unicode("u1F600").as_deref(), Some("😀"));
        assert_eq!(glyph_name_to_unicode("a.sc").as_deref(), Some("a"));
        assert_eq!(glyph_name_to_unicode("f_i").as_deref(), Some("fi"));
        assert_eq!(glyph_name_to_unicode("zero").as_deref(), Some("0"));
        assert_eq!(glyph_name_to_unicode("g123"), None);
    }

    #[test]
    fn test_base_encodings() {
        assert_eq!(BaseEncoding::WinAnsi.decode(0x41), Some('A'));
        assert_eq!(BaseEncoding::WinAnsi.decode(0x93), Some('\u{201C}'));
        assert_eq!(BaseEncoding::WinAnsi.decode(0xE9), Some('é'));
        assert_eq!(BaseEncoding::WinAnsi.decode(0x81), None);
        assert_eq!(BaseEncoding::MacRoman.decode(0x8E), Some('é'));
        assert_eq!(BaseEncoding::Standard.decode(0x27), Some('\u{2019}'));
        assert_eq!(BaseEncoding::Standard.decode(0xAE), Some('\u{FB01}'));
    }
}
