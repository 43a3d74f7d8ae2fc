//! Markdown emission for reconstructed pages.

use super::text::{escape_line_start, escape_markdown, escape_table_cell, normalize_text};
use super::RenderOptions;
use crate::model::{Block, BlockKind, Page, Table, TextRun};

/// Render one page's blocks to a Markdown body, trailing whitespace trimmed.
pub fn page_to_markdown(page: &Page, options: &RenderOptions) -> String {
    MarkdownRenderer::new(options).render_page(page)
}

/// Join page bodies into unchunked output: each body is followed by one
/// blank line.
pub fn join_pages<S: AsRef<str>>(bodies: &[S], options: &RenderOptions) -> String {
    let mut output = String::new();
    for (i, body) in bodies.iter().enumerate() {
        if options.page_separators && i > 0 {
            output.push_str("-----\n\n");
        }
        output.push_str(body.as_ref());
        output.push_str("\n\n");
    }
    output
}

/// Markdown renderer.
pub struct MarkdownRenderer<'a> {
    options: &'a RenderOptions,
}

impl<'a> MarkdownRenderer<'a> {
    pub fn new(options: &'a RenderOptions) -> Self {
        Self { options }
    }

    /// Render a page body.
    pub fn render_page(&self, page: &Page) -> String {
        let mut output = String::new();
        for block in &page.blocks {
            self.render_block(&mut output, block);
        }
        let trimmed = output.trim_end().len();
        output.truncate(trimmed);
        output
    }

    fn render_block(&self, output: &mut String, block: &Block) {
        let is_list = matches!(block.kind, BlockKind::ListItem { .. });
        // A list ends with a blank line.
        if !is_list && output.ends_with('\n') && !output.ends_with("\n\n") {
            output.push('\n');
        }

        match &block.kind {
            BlockKind::Heading { level, text } => {
                let text = self.text(text);
                if text.is_empty() {
                    return;
                }
                output.push_str(&"#".repeat(usize::from((*level).clamp(1, 6))));
                output.push(' ');
                output.push_str(&text);
                output.push_str("\n\n");
            }
            BlockKind::Paragraph { runs } => {
                let mut paragraph = String::new();
                for run in runs {
                    self.render_run(&mut paragraph, run);
                }
                if !paragraph.is_empty() {
                    if self.options.escape_special_chars {
                        paragraph = escape_line_start(&paragraph);
                    }
                    output.push_str(&paragraph);
                    output.push_str("\n\n");
                }
            }
            BlockKind::ListItem {
                depth,
                ordered,
                text,
            } => {
                output.push_str(&"  ".repeat(usize::from(*depth)));
                let text = self.text(text);
                if *ordered {
                    output.push_str(&text);
                } else {
                    output.push(self.options.list_marker);
                    output.push(' ');
                    if self.options.escape_special_chars {
                        output.push_str(&escape_line_start(&text));
                    } else {
                        output.push_str(&text);
                    }
                }
                output.push('\n');
            }
            BlockKind::Table(table) => self.render_table(output, table),
            BlockKind::ImageRef { target } => {
                output.push_str("![](");
                output.push_str(target);
                output.push_str(")\n\n");
            }
        }
    }

    /// Normalized and escaped text.
    fn text(&self, text: &str) -> String {
        let text = normalize_text(text.trim(), self.options);
        if self.options.escape_special_chars {
            escape_markdown(&text)
        } else {
            text
        }
    }

    fn render_run(&self, output: &mut String, run: &TextRun) {
        let text = normalize_text(&run.text, self.options);
        let text = if self.options.escape_special_chars {
            escape_markdown(&text)
        } else {
            text
        };
        if !run.bold && !run.italic {
            output.push_str(&text);
            return;
        }

        // Emphasis markers must hug the text, so surrounding spaces move
        // outside them.
        let core = text.trim();
        if core.is_empty() {
            output.push_str(&text);
            return;
        }
        let lead = &text[..text.len() - text.trim_start().len()];
        let trail = &text[text.trim_end().len()..];
        let marker = match (run.bold, run.italic) {
            (true, true) => "***",
            (true, false) => "**",
            _ => "*",
        };
        output.push_str(lead);
        output.push_str(marker);
        output.push_str(core);
        output.push_str(marker);
        output.push_str(trail);
    }

    fn render_table(&self, output: &mut String, table: &Table) {
        let columns = table.column_count();
        if table.is_empty() || columns == 0 {
            return;
        }

        for (i, row) in table.rows.iter().enumerate() {
            output.push('|');
            for c in 0..columns {
                let cell = row.cells.get(c).map(String::as_str).unwrap_or("");
                let content = normalize_text(cell.replace('\n', " ").trim(), self.options);
                let content = if self.options.escape_special_chars {
                    escape_table_cell(&content)
                } else {
                    content
                };
                output.push(' ');
                output.push_str(&content);
                output.push_str(" |");
            }
            output.push('\n');

            // Separator after the header row
            if i == 0 {
                output.push('|');
                for _ in 0..columns {
                    output.push_str(" --- |");
                }
                output.push('\n');
            }
        }
        output.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TableRow;

    fn page(kinds: Vec<BlockKind>) -> Page {
        let mut page = Page::new(0, 612.0, 792.0);
        for kind in kinds {
            page.push(kind);
        }
        page
    }

    fn render(kinds: Vec<BlockKind>) -> String {
        page_to_markdown(&page(kinds), &RenderOptions::default())
    }

    #[test]
    fn test_heading_and_paragraph() {
        let md = render(vec![
            BlockKind::Heading {
                level: 2,
                text: "Chapter 1".into(),
            },
            BlockKind::Paragraph {
                runs: vec![TextRun::plain("Hello, world!")],
            },
        ]);
        assert_eq!(md, "## Chapter 1\n\nHello, world!");
    }

    #[test]
    fn test_styled_runs() {
        let md = render(vec![BlockKind::Paragraph {
            runs: vec![
                TextRun::plain("Plain "),
                TextRun {
                    text: "bold ".into(),
                    bold: true,
                    italic: false,
                },
                TextRun {
                    text: "slanted".into(),
                    bold: false,
                    italic: true,
                },
            ],
        }]);
        assert_eq!(md, "Plain **bold** *slanted*");
    }

    #[test]
    fn test_list_items() {
        let md = render(vec![
            BlockKind::ListItem {
                depth: 0,
                ordered: false,
                text: "first".into(),
            },
            BlockKind::ListItem {
                depth: 1,
                ordered: false,
                text: "nested".into(),
            },
            BlockKind::ListItem {
                depth: 0,
                ordered: true,
                text: "2. second".into(),
            },
            BlockKind::Paragraph {
                runs: vec![TextRun::plain("After")],
            },
        ]);
        assert_eq!(md, "- first\n  - nested\n2. second\n\nAfter");
    }

    #[test]
    fn test_table_padding_and_escape() {
        let mut table = Table::with_header();
        table.add_row(["Name", "Qty"].into_iter().collect());
        table.add_row(TableRow::new(vec!["a|b".into()]));
        let md = render(vec![BlockKind::Table(table)]);
        assert_eq!(md, "| Name | Qty |\n| --- | --- |\n| a\\|b |  |");
    }

    #[test]
    fn test_image_ref() {
        let md = render(vec![BlockKind::ImageRef {
            target: "images/doc-0-0.png".into(),
        }]);
        assert_eq!(md, "![](images/doc-0-0.png)");
    }

    #[test]
    fn test_escaping_and_ligatures() {
        let md = render(vec![BlockKind::Paragraph {
            runs: vec![TextRun::plain("\u{FB01}le_name *x*")],
        }]);
        assert_eq!(md, "file_name \\*x\\*");
    }

    #[test]
    fn test_body_text_never_becomes_block_syntax() {
        let md = render(vec![
            BlockKind::Paragraph {
                runs: vec![TextRun::plain("# not a heading Body continues here.")],
            },
            BlockKind::Paragraph {
                runs: vec![TextRun::plain("1. looks numbered")],
            },
            BlockKind::ListItem {
                depth: 0,
                ordered: false,
                text: "> arrow".into(),
            },
        ]);
        assert_eq!(
            md,
            "\\# not a heading Body continues here.\n\n1\\. looks numbered\n\n- \\> arrow"
        );

        let raw = RenderOptions::default().with_escaping(false);
        let page = page(vec![BlockKind::Paragraph {
            runs: vec![TextRun::plain("# raw")],
        }]);
        assert_eq!(page_to_markdown(&page, &raw), "# raw");
    }

    #[test]
    fn test_join_pages() {
        let options = RenderOptions::default();
        assert_eq!(join_pages(&["A", "B"], &options), "A\n\nB\n\n");
        let options = options.with_page_separators(true);
        assert_eq!(join_pages(&["A", "B"], &options), "A\n\n-----\n\nB\n\n");
        assert_eq!(join_pages::<&str>(&[], &options), "");
    }
}
