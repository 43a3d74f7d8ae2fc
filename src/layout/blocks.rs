//! Line classification and block building: headings, list items and
//! paragraphs.

use super::lines::{FontStatistics, TextLine};
use super::spans::is_spaceless_script_char;
use super::LayoutConfig;
use crate::model::{BlockKind, TextRun};
use regex::Regex;
use std::sync::OnceLock;

/// Deepest list nesting emitted.
const MAX_LIST_DEPTH: u8 = 8;

/// A block in text flow with the position used for merging.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowBlock {
    pub kind: BlockKind,
    /// Top edge of the first line
    pub top: f32,
    pub column: usize,
}

/// Check if text is a bullet marker (•, -, etc.).
pub fn is_bullet_marker(text: &str) -> bool {
    matches!(
        text.trim(),
        "-" | "–"
            | "—"
            | "•"
            | "·"
            | "*"
            | "○"
            | "▪"
            | "◦"
            | "▸"
            | "▹"
            | "►"
            | "■"
            | "●"
            | "※"
            | "□"
            | "◆"
            | "◇"
            | "▶"
            | "▷"
            | "☞"
            | "➤"
            | "➜"
    )
}

/// Check if text is a number-style list marker (1., 2), a., etc.).
pub fn is_number_marker(text: &str) -> bool {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return false;
    }
    number_marker_regex().is_some_and(|re| re.is_match(&cleaned))
        || cleaned.parse::<u32>().is_ok()
}

fn number_marker_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:\d{1,3}|[A-Za-z])[.)]$").ok())
        .as_ref()
}

/// `1. text`, `a) text`
fn numbered_line_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:\d{1,3}|[A-Za-z])[.)]\s+\S").ok())
        .as_ref()
}

/// What a line starts.
#[derive(Debug, Clone, PartialEq)]
enum LineRole {
    Heading(u8),
    /// Bullet item with the marker removed
    Bullet(String),
    /// Numbered item, number kept
    Numbered(String),
    Body,
}

fn classify(line: &TextLine, stats: &FontStatistics, config: &LayoutConfig) -> LineRole {
    let text = line.text(config);
    let text = text.trim();
    if let Some(level) = stats.heading_level(line.font_size, config) {
        return LineRole::Heading(level);
    }

    let mut parts = text.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("");
    let rest = parts.next().map(str::trim).unwrap_or("");
    if is_bullet_marker(first) && !rest.is_empty() {
        return LineRole::Bullet(rest.to_string());
    }
    // A bullet glued to its text, e.g. "•item"
    let mut chars = text.chars();
    if let Some(c) = chars.next() {
        let tail = chars.as_str().trim_start();
        if c != '-' && c != '*' && is_bullet_marker(c.encode_utf8(&mut [0; 4])) && !tail.is_empty()
        {
            return LineRole::Bullet(tail.to_string());
        }
    }
    if numbered_line_regex().is_some_and(|re| re.is_match(text)) {
        return LineRole::Numbered(text.to_string());
    }
    LineRole::Body
}

/// Median vertical distance between consecutive lines of a column, at most
/// 2.5 times the body size.
fn line_spacing(lines: &[TextLine], stats: &FontStatistics) -> f32 {
    let mut gaps: Vec<f32> = lines
        .windows(2)
        .filter(|w| w[0].column == w[1].column)
        .map(|w| w[0].y - w[1].y)
        .filter(|gap| *gap > 0.1)
        .collect();
    if gaps.is_empty() {
        return if stats.body_size > 0.0 {
            stats.body_size * 1.2
        } else {
            12.0
        };
    }
    gaps.sort_by(f32::total_cmp);
    let median = gaps[(gaps.len() - 1) / 2];
    if stats.body_size > 0.0 {
        median.min(stats.body_size * 2.5)
    } else {
        median
    }
}

/// Left margin of each column: the smallest line start.
fn column_margins(lines: &[TextLine]) -> Vec<f32> {
    let columns = lines.iter().map(|l| l.column + 1).max().unwrap_or(0);
    let mut margins = vec![f32::INFINITY; columns];
    for line in lines {
        margins[line.column] = margins[line.column].min(line.x);
    }
    margins
}

enum Pending {
    Heading {
        level: u8,
        text: String,
        top: f32,
        last: usize,
    },
    List {
        depth: u8,
        ordered: bool,
        text: String,
        top: f32,
        marker_x: f32,
        last: usize,
    },
    Paragraph {
        runs: Vec<TextRun>,
        top: f32,
        first: usize,
        last: usize,
    },
}

impl Pending {
    fn last(&self) -> usize {
        match self {
            Pending::Heading { last, .. }
            | Pending::List { last, .. }
            | Pending::Paragraph { last, .. } => *last,
        }
    }

    fn finish(self, column: usize) -> Option<FlowBlock> {
        let (kind, top) = match self {
            Pending::Heading {
                level, text, top, ..
            } => (BlockKind::Heading { level, text }, top),
            Pending::List {
                depth,
                ordered,
                text,
                top,
                ..
            } => (
                BlockKind::ListItem {
                    depth,
                    ordered,
                    text,
                },
                top,
            ),
            Pending::Paragraph { mut runs, top, .. } => {
                if let Some(last) = runs.last_mut() {
                    let trimmed = last.text.trim_end().len();
                    last.text.truncate(trimmed);
                }
                runs.retain(|r| !r.text.is_empty());
                if runs.is_empty() {
                    return None;
                }
                (BlockKind::Paragraph { runs }, top)
            }
        };
        Some(FlowBlock { kind, top, column })
    }
}

/// Build blocks from lines already in reading order.
pub fn build_blocks(lines: &[TextLine], config: &LayoutConfig) -> Vec<FlowBlock> {
    let stats = FontStatistics::from_lines(lines, config);
    let spacing = line_spacing(lines, &stats);
    let margins = column_margins(lines);
    let max_gap = spacing * config.paragraph_gap;
    log::debug!(
        "block building: body {:.1}pt, headings {:?}, line spacing {:.1}",
        stats.body_size,
        stats.heading_sizes,
        spacing
    );

    let mut blocks = Vec::new();
    let mut pending: Option<Pending> = None;

    for (i, line) in lines.iter().enumerate() {
        let role = classify(line, &stats, config);
        let previous = pending.as_ref().map(|p| &lines[p.last()]);
        let close = previous.is_some_and(|prev| {
            prev.column == line.column && prev.y - line.y >= 0.0 && prev.y - line.y <= max_gap
        });

        // Continue the pending block when the line belongs to it.
        let continued = match (&mut pending, &role) {
            (
                Some(Pending::Heading {
                    level, text, last, ..
                }),
                LineRole::Heading(l),
            ) if close && l == level => {
                join_text(text, &line.text(config));
                *last = i;
                true
            }
            (
                Some(Pending::List {
                    text,
                    marker_x,
                    last,
                    ..
                }),
                LineRole::Body,
            ) if close && line.x > *marker_x + 1.0 => {
                join_text(text, &line.text(config));
                *last = i;
                true
            }
            (
                Some(Pending::Paragraph {
                    runs, first, last, ..
                }),
                LineRole::Body,
            ) if close && !breaks_paragraph(&lines[*last], line, *last == *first, config) => {
                append_line_runs(runs, line, config);
                *last = i;
                true
            }
            _ => false,
        };
        if continued {
            continue;
        }

        if let Some(done) = pending.take() {
            let column = lines[done.last()].column;
            blocks.extend(done.finish(column));
        }

        let top = line.top();
        pending = Some(match role {
            LineRole::Heading(level) => Pending::Heading {
                level,
                text: line.text(config).trim().to_string(),
                top,
                last: i,
            },
            LineRole::Bullet(text) | LineRole::Numbered(text) => {
                let ordered = !line
                    .text(config)
                    .trim_start()
                    .starts_with(|c: char| is_bullet_marker(c.encode_utf8(&mut [0; 4])));
                let margin = margins.get(line.column).copied().unwrap_or(line.x);
                let depth = ((line.x - margin) / config.list_indent_step.max(1.0))
                    .round()
                    .clamp(0.0, f32::from(MAX_LIST_DEPTH)) as u8;
                Pending::List {
                    depth,
                    ordered,
                    text,
                    top,
                    marker_x: line.x,
                    last: i,
                }
            }
            LineRole::Body => {
                let mut runs = Vec::new();
                append_line_runs(&mut runs, line, config);
                Pending::Paragraph {
                    runs,
                    top,
                    first: i,
                    last: i,
                }
            }
        });
    }
    if let Some(done) = pending {
        let column = lines[done.last()].column;
        blocks.extend(done.finish(column));
    }
    blocks
}

/// Whether `line` starts a new paragraph after `prev`.
fn breaks_paragraph(prev: &TextLine, line: &TextLine, single: bool, config: &LayoutConfig) -> bool {
    if (prev.font_size - line.font_size).abs() > 1.0 {
        return true;
    }
    let dx = line.x - prev.x;
    if dx.abs() > config.indent_tolerance {
        // First-line indent: the second line returns to the margin.
        return !(single && dx < 0.0);
    }
    false
}

/// Join line text onto a heading or list item.
fn join_text(text: &mut String, next: &str) {
    let next = next.trim();
    if next.is_empty() {
        return;
    }
    if dehyphenate(text, next) {
        text.push_str(next);
        return;
    }
    if needs_line_space(text, next) {
        text.push(' ');
    }
    text.push_str(next);
}

/// Drop a trailing hyphen when the next line continues the word.
fn dehyphenate(text: &mut String, next: &str) -> bool {
    let trimmed = text.trim_end();
    let hyphenated = trimmed.ends_with('-')
        && trimmed
            .chars()
            .rev()
            .nth(1)
            .is_some_and(char::is_alphabetic)
        && next.chars().next().is_some_and(char::is_lowercase);
    if hyphenated {
        let len = trimmed.len() - 1;
        text.truncate(len);
    }
    hyphenated
}

fn needs_line_space(text: &str, next: &str) -> bool {
    if text.is_empty() || text.ends_with(char::is_whitespace) {
        return false;
    }
    let last = text.chars().last().is_some_and(is_spaceless_script_char);
    let first = next.chars().next().is_some_and(is_spaceless_script_char);
    !(last && first)
}

fn push_run(runs: &mut Vec<TextRun>, text: &str, bold: bool, italic: bool) {
    match runs.last_mut() {
        Some(last) if last.bold == bold && last.italic == italic => last.text.push_str(text),
        _ => runs.push(TextRun {
            text: text.to_string(),
            bold,
            italic,
        }),
    }
}

/// Append a line's spans as runs, joining it to the previous line.
fn append_line_runs(runs: &mut Vec<TextRun>, line: &TextLine, config: &LayoutConfig) {
    for (i, span) in line.spans.iter().enumerate() {
        let mut text = span.text.as_str();
        if i == 0 {
            text = text.trim_start();
            if let Some(last) = runs.last_mut() {
                if !dehyphenate(&mut last.text, text) && needs_line_space(&last.text, text) {
                    last.text.push(' ');
                }
            }
        } else if line.needs_space_before(i, config) {
            match runs.last_mut() {
                Some(last) => last.text.push(' '),
                None => push_run(runs, " ", span.bold, span.italic),
            }
        }
        push_run(runs, text, span.bold, span.italic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::spans::TextSpan;

    fn line(text: &str, x: f32, y: f32, size: f32) -> TextLine {
        styled_line(&[(text, false)], x, y, size)
    }

    fn styled_line(parts: &[(&str, bool)], x: f32, y: f32, size: f32) -> TextLine {
        let mut spans = Vec::new();
        let mut cursor = x;
        for (i, (text, bold)) in parts.iter().enumerate() {
            let width = text.chars().count() as f32 * size * 0.5;
            spans.push(TextSpan {
                text: text.to_string(),
                x: cursor,
                y,
                width,
                font_size: size,
                font_name: "Helvetica".into(),
                bold: *bold,
                italic: false,
                order: i,
            });
            cursor += width + size * 0.3;
        }
        TextLine::from_spans(spans, 0)
    }

    fn kinds(blocks: &[FlowBlock]) -> Vec<&BlockKind> {
        blocks.iter().map(|b| &b.kind).collect()
    }

    fn paragraph_text(block: &FlowBlock) -> String {
        match &block.kind {
            BlockKind::Paragraph { runs } => runs.iter().map(|r| r.text.as_str()).collect(),
            other => panic!("expected paragraph, got {:?}", other),
        }
    }

    #[test]
    fn test_markers() {
        assert!(is_bullet_marker("•"));
        assert!(is_bullet_marker(" - "));
        assert!(!is_bullet_marker("a"));
        assert!(is_number_marker("1."));
        assert!(is_number_marker("12)"));
        assert!(is_number_marker("b."));
        assert!(is_number_marker("3"));
        assert!(!is_number_marker("Name"));
        assert!(!is_number_marker("1.5"));
    }

    #[test]
    fn test_heading_and_paragraph() {
        let lines = vec![
            line("Title", 72.0, 700.0, 24.0),
            line("First line of body", 72.0, 670.0, 12.0),
            line("second line of body.", 72.0, 656.0, 12.0),
        ];
        let blocks = build_blocks(&lines, &LayoutConfig::default());
        assert_eq!(blocks.len(), 2);
        assert_eq!(
            blocks[0].kind,
            BlockKind::Heading {
                level: 1,
                text: "Title".into()
            }
        );
        assert_eq!(paragraph_text(&blocks[1]), "First line of body second line of body.");
    }

    #[test]
    fn test_paragraph_gap_splits() {
        let lines = vec![
            line("One", 72.0, 700.0, 12.0),
            line("two", 72.0, 686.0, 12.0),
            line("three", 72.0, 672.0, 12.0),
            line("Four", 72.0, 630.0, 12.0),
        ];
        let blocks = build_blocks(&lines, &LayoutConfig::default());
        assert_eq!(blocks.len(), 2);
        assert_eq!(paragraph_text(&blocks[0]), "One two three");
        assert_eq!(paragraph_text(&blocks[1]), "Four");
    }

    #[test]
    fn test_first_line_indent_kept() {
        let lines = vec![
            line("Indented start", 100.0, 700.0, 12.0),
            line("continues here", 72.0, 686.0, 12.0),
            line("Next paragraph", 100.0, 672.0, 12.0),
        ];
        let blocks = build_blocks(&lines, &LayoutConfig::default());
        assert_eq!(blocks.len(), 2);
        assert_eq!(paragraph_text(&blocks[0]), "Indented start continues here");
    }

    #[test]
    fn test_dehyphenation() {
        let lines = vec![
            line("An extra-", 72.0, 700.0, 12.0),
            line("ordinary case", 72.0, 686.0, 12.0),
        ];
        let blocks = build_blocks(&lines, &LayoutConfig::default());
        assert_eq!(paragraph_text(&blocks[0]), "An extraordinary case");
    }

    #[test]
    fn test_bullets_and_depth() {
        let lines = vec![
            line("Intro text", 72.0, 700.0, 12.0),
            line("• first", 72.0, 686.0, 12.0),
            line("• nested", 90.0, 672.0, 12.0),
            line("wraps here", 100.0, 658.0, 12.0),
            line("2. second", 72.0, 644.0, 12.0),
        ];
        let blocks = build_blocks(&lines, &LayoutConfig::default());
        let kinds = kinds(&blocks);
        assert_eq!(kinds.len(), 4);
        assert_eq!(
            kinds[1],
            &BlockKind::ListItem {
                depth: 0,
                ordered: false,
                text: "first".into()
            }
        );
        assert_eq!(
            kinds[2],
            &BlockKind::ListItem {
                depth: 1,
                ordered: false,
                text: "nested wraps here".into()
            }
        );
        assert_eq!(
            kinds[3],
            &BlockKind::ListItem {
                depth: 0,
                ordered: true,
                text: "2. second".into()
            }
        );
    }

    #[test]
    fn test_bold_runs() {
        let lines = vec![styled_line(
            &[("Plain", false), ("bold", true), ("tail", false)],
            72.0,
            700.0,
            12.0,
        )];
        let blocks = build_blocks(&lines, &LayoutConfig::default());
        match &blocks[0].kind {
            BlockKind::Paragraph { runs } => {
                assert_eq!(runs.len(), 3);
                assert_eq!(runs[0].text, "Plain ");
                assert!(runs[1].bold);
                assert_eq!(runs[1].text, "bold ");
                assert_eq!(runs[2].text, "tail");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_multiline_heading_joined() {
        let lines = vec![
            line("A Long", 72.0, 700.0, 20.0),
            line("Heading", 72.0, 676.0, 20.0),
            line("Body text", 72.0, 640.0, 10.0),
            line("more body text here", 72.0, 628.0, 10.0),
        ];
        let blocks = build_blocks(&lines, &LayoutConfig::default());
        assert_eq!(
            blocks[0].kind,
            BlockKind::Heading {
                level: 1,
                text: "A Long Heading".into()
            }
        );
        assert_eq!(blocks.len(), 2);
    }
}
