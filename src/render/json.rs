//! JSON export of extraction output.

use crate::error::{Error, Result};
use crate::model::MarkdownOutput;

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

/// Convert extraction output to JSON. Chunks serialize as an array of
/// `{text, metadata}` objects, unchunked output as a string.
pub fn to_json(output: &MarkdownOutput, format: JsonFormat) -> Result<String> {
    let result = match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(output),
        JsonFormat::Compact => serde_json::to_string(output),
    };

    result.map_err(|e| Error::Render(format!("JSON serialization error: {}", e)))
}

impl MarkdownOutput {
    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        to_json(self, JsonFormat::Pretty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChunkMetadata, PageChunk, Warning};

    fn chunks() -> MarkdownOutput {
        MarkdownOutput::Chunks(vec![PageChunk {
            text: "# Title".into(),
            metadata: ChunkMetadata {
                page: Some(1),
                page_count: 1,
                format: "PDF 1.4".into(),
                warnings: vec![Warning::UnbalancedRestore],
                ..Default::default()
            },
        }])
    }

    #[test]
    fn test_to_json_pretty() {
        let json = chunks().to_json().unwrap();
        assert!(json.contains("\"page\": 1"));
        assert!(json.contains("\"kind\": \"unbalanced_restore\""));
        assert!(json.contains('\n'));
    }

    #[test]
    fn test_to_json_compact() {
        let json = to_json(&chunks(), JsonFormat::Compact).unwrap();
        assert!(!json.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["text"], "# Title");
        assert_eq!(value[0]["metadata"]["format"], "PDF 1.4");
    }

    #[test]
    fn test_text_output_omits_empty_warnings() {
        let json = to_json(&MarkdownOutput::text("Hi"), JsonFormat::Compact).unwrap();
        assert_eq!(json, r#"{"text":"Hi"}"#);
    }
}
