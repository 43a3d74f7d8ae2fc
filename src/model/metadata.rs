//! Document information dictionary.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Document metadata from the `/Info` dictionary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// Document title
    pub title: Option<String>,

    /// Document author
    pub author: Option<String>,

    /// Document subject
    pub subject: Option<String>,

    /// Keywords
    pub keywords: Option<String>,

    /// Creator application
    pub creator: Option<String>,

    /// PDF producer
    pub producer: Option<String>,

    /// Creation date
    pub created: Option<DateTime<Utc>>,

    /// Last modification date
    pub modified: Option<DateTime<Utc>>,

    /// PDF version from the file header (e.g., "1.7")
    pub pdf_version: String,
}

impl DocumentInfo {
    /// Create new metadata with PDF version.
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            pdf_version: version.into(),
            ..Default::default()
        }
    }

    /// Format line used in chunk metadata, e.g. `PDF 1.7`.
    pub fn format(&self) -> String {
        format!("PDF {}", self.pdf_version)
    }
}

/// Parse a PDF date string (`D:YYYYMMDDHHmmSSOHH'mm'`).
///
/// Every field after the year is optional. A missing offset is read as UTC.
pub fn parse_pdf_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    let s = s.strip_prefix("D:").unwrap_or(s);

    if s.len() < 4 {
        return None;
    }

    let field = |range: std::ops::Range<usize>, default: u32| -> Option<u32> {
        match s.get(range) {
            Some(text) if text.bytes().all(|b| b.is_ascii_digit()) => text.parse().ok(),
            Some(_) => None,
            None => Some(default),
        }
    };

    let year: i32 = s.get(0..4)?.parse().ok()?;
    let month = field(4..6, 1)?;
    let day = field(6..8, 1)?;
    let hour = field(8..10, 0)?;
    let minute = field(10..12, 0)?;
    let second = field(12..14, 0)?;

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;

    let offset_seconds = match s.get(14..15) {
        Some(sign @ ("+" | "-")) => {
            let rest: String = s[15..].chars().filter(char::is_ascii_digit).collect();
            let hours: i32 = rest.get(0..2).and_then(|h| h.parse().ok()).unwrap_or(0);
            let minutes: i32 = rest.get(2..4).and_then(|m| m.parse().ok()).unwrap_or(0);
            let total = hours * 3600 + minutes * 60;
            if sign == "-" {
                -total
            } else {
                total
            }
        }
        _ => 0,
    };

    let offset = FixedOffset::east_opt(offset_seconds)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_pdf_date() {
        let date = parse_pdf_date("D:20240115103045").unwrap();
        assert_eq!(date.year(), 2024);
        assert_eq!(date.month(), 1);
        assert_eq!(date.day(), 15);
        assert_eq!(date.hour(), 10);
    }

    #[test]
    fn test_parse_pdf_date_minimal() {
        let date = parse_pdf_date("D:2024").unwrap();
        assert_eq!(date.year(), 2024);
        assert_eq!(date.month(), 1);
        assert_eq!(date.day(), 1);
    }

    #[test]
    fn test_parse_pdf_date_with_offset() {
        let date = parse_pdf_date("D:20240115103045+02'00'").unwrap();
        assert_eq!(date.hour(), 8);

        let date = parse_pdf_date("D:20240115103045-05'30'").unwrap();
        assert_eq!(date.hour(), 16);
        assert_eq!(date.minute(), 0);
    }

    #[test]
    fn test_parse_pdf_date_invalid() {
        assert!(parse_pdf_date("D:20").is_none());
        assert!(parse_pdf_date("D:2024AB").is_none());
        assert!(parse_pdf_date("D:20241345").is_none());
    }

    #[test]
    fn test_format() {
        assert_eq!(DocumentInfo::with_version("1.7").format(), "PDF 1.7");
    }
}
