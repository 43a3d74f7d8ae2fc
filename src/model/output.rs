//! Extraction output: Markdown text or per-page chunks.

use super::metadata::DocumentInfo;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A non-fatal problem recorded against a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// A font had no usable widths; a default advance was used
    MetricsDegraded { font: String },

    /// An unknown content stream operator was skipped
    UnsupportedOperator { operator: String },

    /// An image could not be decoded or written
    ImageDecodeFailed { name: String, reason: String },

    /// Content stream data could not be read or parsed
    ContentError { message: String },

    /// `Q` without a matching `q`
    UnbalancedRestore,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MetricsDegraded { font } => {
                write!(f, "metrics degraded for font {}", font)
            }
            Warning::UnsupportedOperator { operator } => {
                write!(f, "unsupported operator '{}'", operator)
            }
            Warning::ImageDecodeFailed { name, reason } => {
                write!(f, "image {} failed: {}", name, reason)
            }
            Warning::ContentError { message } => write!(f, "content error: {}", message),
            Warning::UnbalancedRestore => write!(f, "unbalanced graphics state restore"),
        }
    }
}

/// Metadata attached to one page chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// 1-based page number; `None` when unknown
    pub page: Option<u32>,
    pub page_count: usize,
    pub file_path: Option<String>,
    pub format: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub mod_date: Option<String>,
    /// Images written or embedded for this page
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

impl ChunkMetadata {
    /// Build chunk metadata from document info.
    pub fn from_info(info: &DocumentInfo, page: Option<u32>, page_count: usize) -> Self {
        Self {
            page,
            page_count,
            file_path: None,
            format: info.format(),
            title: info.title.clone(),
            author: info.author.clone(),
            subject: info.subject.clone(),
            keywords: info.keywords.clone(),
            creator: info.creator.clone(),
            producer: info.producer.clone(),
            creation_date: info.created.map(|d| d.to_rfc3339()),
            mod_date: info.modified.map(|d| d.to_rfc3339()),
            images: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Page label used in saved output: the number or `unknown`.
    pub fn page_label(&self) -> String {
        self.page
            .map(|p| p.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Markdown for a single page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Result of an extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MarkdownOutput {
    /// The whole selection as one Markdown string, with the advisories of
    /// every page in page order
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<Warning>,
    },
    /// One chunk per selected page, in page order
    Chunks(Vec<PageChunk>),
}

impl MarkdownOutput {
    /// Unchunked output without advisories.
    pub fn text(text: impl Into<String>) -> Self {
        MarkdownOutput::Text {
            text: text.into(),
            warnings: Vec::new(),
        }
    }

    /// Whether this is chunked output.
    pub fn is_chunked(&self) -> bool {
        matches!(self, MarkdownOutput::Chunks(_))
    }

    /// The unchunked text, if this is unchunked output.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MarkdownOutput::Text { text, .. } => Some(text),
            MarkdownOutput::Chunks(_) => None,
        }
    }

    /// The chunks, if this is chunked output.
    pub fn chunks(&self) -> Option<&[PageChunk]> {
        match self {
            MarkdownOutput::Text { .. } => None,
            MarkdownOutput::Chunks(chunks) => Some(chunks),
        }
    }

    /// The text as written by [`crate::save`]: chunks get `# Page <n>`
    /// headers.
    pub fn to_markdown(&self) -> String {
        match self {
            MarkdownOutput::Text { text, .. } => text.clone(),
            MarkdownOutput::Chunks(chunks) => {
                let mut out = String::new();
                for chunk in chunks {
                    out.push_str("# Page ");
                    out.push_str(&chunk.metadata.page_label());
                    out.push_str("\n\n");
                    out.push_str(&chunk.text);
                    out.push_str("\n\n");
                }
                out
            }
        }
    }

    /// Every warning, in page order.
    pub fn warnings(&self) -> Vec<&Warning> {
        match self {
            MarkdownOutput::Text { warnings, .. } => warnings.iter().collect(),
            MarkdownOutput::Chunks(chunks) => chunks
                .iter()
                .flat_map(|c| c.metadata.warnings.iter())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(page: Option<u32>, text: &str) -> PageChunk {
        PageChunk {
            text: text.to_string(),
            metadata: ChunkMetadata {
                page,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_chunked_markdown_layout() {
        let output = MarkdownOutput::Chunks(vec![chunk(Some(1), "First"), chunk(Some(2), "Second")]);
        assert_eq!(
            output.to_markdown(),
            "# Page 1\n\nFirst\n\n# Page 2\n\nSecond\n\n"
        );
    }

    #[test]
    fn test_unknown_page_label() {
        let output = MarkdownOutput::Chunks(vec![chunk(None, "Body")]);
        assert_eq!(output.to_markdown(), "# Page unknown\n\nBody\n\n");
    }

    #[test]
    fn test_from_info() {
        let mut info = DocumentInfo::with_version("1.7");
        info.title = Some("Report".into());
        let meta = ChunkMetadata::from_info(&info, Some(3), 5);
        assert_eq!(meta.format, "PDF 1.7");
        assert_eq!(meta.title.as_deref(), Some("Report"));
        assert_eq!(meta.page, Some(3));
        assert_eq!(meta.page_count, 5);
    }

    #[test]
    fn test_text_output_keeps_warnings() {
        let output = MarkdownOutput::Text {
            text: "Body".into(),
            warnings: vec![Warning::UnbalancedRestore],
        };
        assert_eq!(output.warnings(), vec![&Warning::UnbalancedRestore]);
        assert_eq!(output.to_markdown(), "Body");
        assert!(MarkdownOutput::text("Body").warnings().is_empty());
    }

    #[test]
    fn test_warning_display() {
        let w = Warning::UnsupportedOperator {
            operator: "xyz".into(),
        };
        assert_eq!(w.to_string(), "unsupported operator 'xyz'");
    }
}
