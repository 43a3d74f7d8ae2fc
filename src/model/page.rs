//! Reconstructed page content.

use super::Table;
use serde::{Deserialize, Serialize};

/// A styled run of paragraph text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
}

impl TextRun {
    /// Create a plain run.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
            italic: false,
        }
    }

    /// Whether two runs share styling and can be joined.
    pub fn same_style(&self, other: &TextRun) -> bool {
        self.bold == other.bold && self.italic == other.italic
    }
}

/// The kind of a content block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockKind {
    /// A heading (level 1..=6)
    Heading { level: u8, text: String },

    /// A paragraph of styled runs
    Paragraph { runs: Vec<TextRun> },

    /// A list item; depth 0 is top level. Ordered items keep their
    /// number in `text`.
    ListItem {
        depth: u8,
        #[serde(default)]
        ordered: bool,
        text: String,
    },

    /// A table
    Table(Table),

    /// An image: a file path or an inline data URI
    ImageRef { target: String },
}

/// A content block on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Source page index (0-based)
    pub page: usize,
    #[serde(flatten)]
    pub kind: BlockKind,
}

impl Block {
    pub fn new(page: usize, kind: BlockKind) -> Self {
        Self { page, kind }
    }

    /// Plain text content of the block.
    pub fn plain_text(&self) -> String {
        match &self.kind {
            BlockKind::Heading { text, .. } | BlockKind::ListItem { text, .. } => text.clone(),
            BlockKind::Paragraph { runs } => runs.iter().map(|r| r.text.as_str()).collect(),
            BlockKind::Table(table) => table.plain_text(),
            BlockKind::ImageRef { .. } => String::new(),
        }
    }
}

/// A page with reconstructed blocks in reading order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Page index (0-based)
    pub index: usize,

    /// Page width in points (1 point = 1/72 inch)
    pub width: f32,

    /// Page height in points
    pub height: f32,

    /// Content blocks in reading order
    pub blocks: Vec<Block>,
}

impl Page {
    pub fn new(index: usize, width: f32, height: f32) -> Self {
        Self {
            index,
            width,
            height,
            blocks: Vec::new(),
        }
    }

    /// Add a block of the given kind.
    pub fn push(&mut self, kind: BlockKind) {
        self.blocks.push(Block::new(self.index, kind));
    }

    /// Get plain text content of the page.
    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(Block::plain_text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_plain_text() {
        let mut page = Page::new(2, 612.0, 792.0);
        page.push(BlockKind::Heading {
            level: 1,
            text: "Title".into(),
        });
        page.push(BlockKind::Paragraph {
            runs: vec![TextRun::plain("Hello "), TextRun::plain("world")],
        });
        page.push(BlockKind::ImageRef {
            target: "images/x.png".into(),
        });
        assert_eq!(page.plain_text(), "Title\n\nHello world");
        assert!(page.blocks.iter().all(|b| b.page == 2));
    }

    #[test]
    fn test_block_serializes_with_type_tag() {
        let block = Block::new(
            0,
            BlockKind::ListItem {
                depth: 1,
                ordered: false,
                text: "item".into(),
            },
        );
        let json = serde_json::to_string(&block).unwrap();
        assert!(json.contains("\"type\":\"list_item\""));
        assert!(json.contains("\"page\":0"));
    }
}
