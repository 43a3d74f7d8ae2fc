//! Built-in advance widths for the standard Type 1 fonts.
//!
//! Widths are in glyph space (1/1000 em) and indexed by Unicode char, so
//! they apply after encoding resolution.

/// Metrics family of a standard font.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardFamily {
    Helvetica,
    HelveticaBold,
    TimesRoman,
    TimesBold,
    Courier,
}

impl StandardFamily {
    /// Pick a family from a base font name. Common metric-compatible
    /// substitutes (Arial, Times New Roman) map onto their standard family.
    pub fn from_base_font(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        let bold = lower.contains("bold") || lower.contains("black") || lower.contains("heavy");
        if lower.starts_with("courier") {
            Some(Self::Courier)
        } else if lower.starts_with("helvetica") || lower.starts_with("arial") {
            Some(if bold { Self::HelveticaBold } else { Self::Helvetica })
        } else if lower.starts_with("times") {
            Some(if bold { Self::TimesBold } else { Self::TimesRoman })
        } else {
            None
        }
    }

    fn ascii_table(self) -> Option<&'static [u16; 95]> {
        match self {
            Self::Helvetica => Some(&HELVETICA),
            Self::HelveticaBold => Some(&HELVETICA_BOLD),
            Self::TimesRoman => Some(&TIMES_ROMAN),
            Self::TimesBold => Some(&TIMES_BOLD),
            Self::Courier => None,
        }
    }

    /// Width used for characters outside the table.
    pub fn average_width(self) -> f32 {
        match self {
            Self::Helvetica | Self::HelveticaBold => 556.0,
            Self::TimesRoman | Self::TimesBold => 500.0,
            Self::Courier => 600.0,
        }
    }

    /// Advance width of a character.
    pub fn width(self, ch: char) -> f32 {
        let Some(table) = self.ascii_table() else {
            return 600.0;
        };
        let code = ch as u32;
        if (32..=126).contains(&code) {
            return f32::from(table[(code - 32) as usize]);
        }
        let serif = matches!(self, Self::TimesRoman | Self::TimesBold);
        match ch {
            '\u{a0}' => self.width(' '),
            '\u{2018}' | '\u{2019}' | '\u{201a}' => match self {
                Self::Helvetica => 222.0,
                Self::HelveticaBold => 278.0,
                _ => 333.0,
            },
            '\u{201c}' | '\u{201d}' | '\u{201e}' => match self {
                Self::Helvetica => 333.0,
                Self::HelveticaBold => 500.0,
                Self::TimesRoman => 444.0,
                _ => 500.0,
            },
            '\u{2022}' => 350.0,
            '\u{2013}' if serif => 500.0,
            '\u{2013}' => 556.0,
            '\u{2014}' | '\u{2026}' => 1000.0,
            _ => self.average_width(),
        }
    }
}

const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

const TIMES_ROMAN: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

const TIMES_BOLD: [u16; 95] = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500,
    930, 722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944, 722, 778,
    611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667, 333, 278, 333, 581, 500,
    333, 500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833, 556, 500,
    556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444, 394, 220, 394, 520,
];
