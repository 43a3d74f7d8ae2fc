//! Layout reconstruction: from positioned primitives to blocks in reading
//! order.
//!
//! The pipeline for one page:
//!
//! 1. glyphs merge into spans, and duplicated spans are dropped
//! 2. tables are detected (ruling lines, then text alignment) and their
//!    spans removed
//! 3. remaining spans group into lines, column by column
//! 4. lines become headings, list items and paragraphs
//! 5. tables and images are merged into the flow by their top edge

mod blocks;
mod lines;
mod spans;
mod table;

pub use blocks::{build_blocks, is_bullet_marker, is_number_marker, FlowBlock};
pub use lines::{detect_columns, group_into_lines, Column, FontStatistics, TextLine};
pub use spans::{build_spans, dedupe_spans, TextSpan};
pub use table::{DetectedTable, TableDetector};

use crate::model::{BlockKind, Page, Primitive, Rect};

/// Tunable thresholds for table detection.
#[derive(Debug, Clone, PartialEq)]
pub struct TableConfig {
    /// Minimum rows for a table
    pub min_rows: usize,
    /// Minimum columns for a table
    pub min_columns: usize,
    /// More columns than this is treated as scattered text
    pub max_columns: usize,
    /// Baseline tolerance for rows, as a fraction of font size
    pub row_tolerance: f32,
    /// Fraction of rows that must share a column edge
    pub min_alignment_ratio: f32,
    /// Minimum distance between column edges, in points
    pub min_column_gap: f32,
    /// Ruling lines within this distance are the same line, in points
    pub ruling_tolerance: f32,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            min_rows: 2,
            min_columns: 2,
            max_columns: 6,
            row_tolerance: 0.4,
            min_alignment_ratio: 0.3,
            min_column_gap: 15.0,
            ruling_tolerance: 2.0,
        }
    }
}

impl TableConfig {
    pub fn with_min_rows(mut self, rows: usize) -> Self {
        self.min_rows = rows.max(1);
        self
    }

    pub fn with_min_columns(mut self, columns: usize) -> Self {
        self.min_columns = columns.max(1);
        self
    }

    pub fn with_max_columns(mut self, columns: usize) -> Self {
        self.max_columns = columns;
        self
    }

    pub fn with_min_alignment_ratio(mut self, ratio: f32) -> Self {
        self.min_alignment_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn with_ruling_tolerance(mut self, tolerance: f32) -> Self {
        self.ruling_tolerance = tolerance.max(0.0);
        self
    }
}

/// Tunable thresholds for layout reconstruction.
///
/// Distances marked "fraction of font size" scale with the text they are
/// applied to.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    /// Baseline difference that still counts as the same line (fraction
    /// of font size)
    pub line_tolerance: f32,
    /// Horizontal gap above which a space is inserted (fraction of font
    /// size)
    pub word_gap: f32,
    /// Horizontal gap above which a span ends (fraction of font size)
    pub span_gap: f32,
    /// Spans repeating text within this distance are duplicates, in points
    pub duplicate_tolerance: f32,
    /// A line this many times the body size or larger is a heading
    pub heading_ratio: f32,
    pub max_heading_level: u8,
    /// Vertical gap that ends a paragraph, as a multiple of the median line
    /// spacing
    pub paragraph_gap: f32,
    /// Left edge shift that ends a paragraph, in points
    pub indent_tolerance: f32,
    /// Indentation per list nesting level, in points
    pub list_indent_step: f32,
    pub detect_columns: bool,
    pub detect_tables: bool,
    pub table: TableConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            line_tolerance: 0.3,
            word_gap: 0.15,
            span_gap: 1.0,
            duplicate_tolerance: 1.0,
            heading_ratio: 1.2,
            max_heading_level: 6,
            paragraph_gap: 1.5,
            indent_tolerance: 20.0,
            list_indent_step: 18.0,
            detect_columns: true,
            detect_tables: true,
            table: TableConfig::default(),
        }
    }
}

impl LayoutConfig {
    pub fn with_line_tolerance(mut self, tolerance: f32) -> Self {
        self.line_tolerance = tolerance.max(0.0);
        self
    }

    pub fn with_word_gap(mut self, gap: f32) -> Self {
        self.word_gap = gap.max(0.0);
        self
    }

    pub fn with_span_gap(mut self, gap: f32) -> Self {
        self.span_gap = gap.max(0.0);
        self
    }

    pub fn with_heading_ratio(mut self, ratio: f32) -> Self {
        self.heading_ratio = ratio;
        self
    }

    /// Set the deepest heading level (1..=6).
    pub fn with_max_heading_level(mut self, level: u8) -> Self {
        self.max_heading_level = level.clamp(1, 6);
        self
    }

    pub fn with_paragraph_gap(mut self, gap: f32) -> Self {
        self.paragraph_gap = gap.max(0.0);
        self
    }

    pub fn with_indent_tolerance(mut self, tolerance: f32) -> Self {
        self.indent_tolerance = tolerance.max(0.0);
        self
    }

    pub fn with_list_indent_step(mut self, step: f32) -> Self {
        self.list_indent_step = step.max(1.0);
        self
    }

    pub fn with_columns(mut self, enabled: bool) -> Self {
        self.detect_columns = enabled;
        self
    }

    pub fn with_tables(mut self, enabled: bool) -> Self {
        self.detect_tables = enabled;
        self
    }

    pub fn with_table_config(mut self, table: TableConfig) -> Self {
        self.table = table;
        self
    }
}

/// An image already written or embedded, placed on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedImage {
    pub bbox: Rect,
    /// File path or data URI
    pub target: String,
}

/// Something placed into the text flow by its top edge.
struct Placed {
    top: f32,
    kind: BlockKind,
}

/// Reconstruct one page's blocks in reading order.
pub fn reconstruct_page(
    index: usize,
    primitives: &[Primitive],
    media_box: Rect,
    images: &[PlacedImage],
    config: &LayoutConfig,
) -> Page {
    let mut page = Page::new(index, media_box.width(), media_box.height());

    let spans = build_spans(primitives, config);
    let spans = dedupe_spans(spans, config.duplicate_tolerance);

    let (tables, spans) = if config.detect_tables {
        TableDetector::new(&config.table).detect(spans, primitives)
    } else {
        (Vec::new(), spans)
    };

    let lines = group_into_lines(spans, config);
    let flow = build_blocks(&lines, config);

    let mut placed: Vec<Placed> = tables
        .into_iter()
        .map(|t| Placed {
            top: t.top,
            kind: BlockKind::Table(t.table),
        })
        .chain(images.iter().map(|image| Placed {
            top: image.bbox.y1,
            kind: BlockKind::ImageRef {
                target: image.target.clone(),
            },
        }))
        .collect();
    // Highest first; equal tops keep tables before images.
    placed.sort_by(|a, b| b.top.total_cmp(&a.top));

    log::debug!(
        "page {}: {} text blocks, {} placed items",
        index,
        flow.len(),
        placed.len()
    );

    let mut placed = placed.into_iter().peekable();
    for block in flow {
        while let Some(item) = placed.next_if(|item| block.top < item.top) {
            page.push(item.kind);
        }
        page.push(block.kind);
    }
    for item in placed {
        page.push(item.kind);
    }
    page
}
