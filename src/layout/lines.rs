//! Column detection, line grouping and font size statistics.

use super::spans::{is_spaceless_script_char, TextSpan};
use super::LayoutConfig;
use std::collections::BTreeMap;

/// Spans sharing a baseline, left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub spans: Vec<TextSpan>,
    /// Baseline of the first span
    pub y: f32,
    /// Left edge
    pub x: f32,
    /// Character-weighted mean font size
    pub font_size: f32,
    /// Column index (0 = leftmost)
    pub column: usize,
}

impl TextLine {
    /// Build a line; spans are ordered by x, earlier drawing first on ties.
    pub fn from_spans(mut spans: Vec<TextSpan>, column: usize) -> Self {
        spans.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.order.cmp(&b.order)));

        let total_chars: usize = spans.iter().map(|s| s.text.chars().count()).sum();
        let font_size = if total_chars > 0 {
            spans
                .iter()
                .map(|s| s.font_size * s.text.chars().count() as f32)
                .sum::<f32>()
                / total_chars as f32
        } else {
            spans.first().map(|s| s.font_size).unwrap_or(0.0)
        };
        let (x, y) = spans.first().map(|s| (s.x, s.y)).unwrap_or((0.0, 0.0));

        Self {
            spans,
            y,
            x,
            font_size,
            column,
        }
    }

    pub fn right(&self) -> f32 {
        self.spans.iter().map(TextSpan::right).fold(self.x, f32::max)
    }

    pub fn top(&self) -> f32 {
        self.y + self.font_size * 0.8
    }

    pub fn char_count(&self) -> usize {
        self.spans.iter().map(|s| s.text.chars().count()).sum()
    }

    /// Whether a space belongs between span `i - 1` and span `i`.
    pub fn needs_space_before(&self, i: usize, config: &LayoutConfig) -> bool {
        let (Some(prev), Some(span)) = (self.spans.get(i.wrapping_sub(1)), self.spans.get(i)) else {
            return false;
        };
        let gap = span.x - prev.right();
        if gap <= span.font_size * config.word_gap {
            return false;
        }
        if prev.text.ends_with([' ', '\u{a0}']) || span.text.starts_with([' ', '\u{a0}']) {
            return false;
        }
        let prev_last = prev.text.chars().last().is_some_and(is_spaceless_script_char);
        let next_first = span.text.chars().next().is_some_and(is_spaceless_script_char);
        !(prev_last && next_first)
    }

    /// Line text with gap-based spacing between spans.
    pub fn text(&self, config: &LayoutConfig) -> String {
        let mut out = String::new();
        for (i, span) in self.spans.iter().enumerate() {
            if self.needs_space_before(i, config) {
                out.push(' ');
            }
            out.push_str(&span.text);
        }
        out
    }

    /// Whether more than half the characters are bold.
    pub fn is_bold(&self) -> bool {
        let bold: usize = self
            .spans
            .iter()
            .filter(|s| s.bold)
            .map(|s| s.text.chars().count())
            .sum();
        let total = self.char_count();
        total > 0 && bold * 2 > total
    }
}

/// A column of the page layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Column {
    pub left: f32,
    pub right: f32,
    pub index: usize,
}

impl Column {
    pub fn contains(&self, x: f32) -> bool {
        x >= self.left && x <= self.right
    }

    /// A span belongs to a column if its left edge or centre falls in it.
    pub fn contains_span(&self, span: &TextSpan) -> bool {
        self.contains(span.x) || self.contains(span.center_x())
    }
}

const SLICE_WIDTH: f32 = 3.0;
const MIN_GUTTER: f32 = 12.0;
const MIN_COLUMN_WIDTH: f32 = 80.0;
const MIN_LAYOUT_WIDTH: f32 = 250.0;

/// Find a two-column gutter: the widest empty vertical band near the
/// middle of the text area. Falls back to one column.
pub fn detect_columns(spans: &[TextSpan]) -> Vec<Column> {
    let Some(min_x) = spans.iter().map(|s| s.x).min_by(f32::total_cmp) else {
        return Vec::new();
    };
    let max_x = spans.iter().map(TextSpan::right).fold(min_x, f32::max);
    let single = vec![Column {
        left: min_x - 10.0,
        right: max_x + 10.0,
        index: 0,
    }];

    let text_width = max_x - min_x;
    if text_width < MIN_LAYOUT_WIDTH {
        return single;
    }

    let slices = (text_width / SLICE_WIDTH) as usize + 1;
    let mut occupancy = vec![0usize; slices];
    for span in spans {
        let start = ((span.x - min_x) / SLICE_WIDTH) as usize;
        let end = ((span.right() - min_x) / SLICE_WIDTH) as usize;
        for slot in occupancy.iter_mut().take(end.min(slices - 1) + 1).skip(start) {
            *slot += 1;
        }
    }

    // Only the middle 70% is searched.
    let search_start = slices * 15 / 100;
    let search_end = slices * 85 / 100;
    let center = slices as f32 / 2.0;
    let mut best: Option<(usize, usize)> = None;
    let mut run_start = 0;
    let mut run_len = 0;

    let consider = |start: usize, len: usize, best: &mut Option<(usize, usize)>| {
        let width = len as f32 * SLICE_WIDTH;
        if width < MIN_GUTTER {
            return;
        }
        let dist = |s: usize, l: usize| ((s + l / 2) as f32 - center).abs();
        let better = match *best {
            None => true,
            Some((bs, bl)) => {
                let best_width = bl as f32 * SLICE_WIDTH;
                width > best_width * 1.5 || (width >= best_width * 0.7 && dist(start, len) < dist(bs, bl))
            }
        };
        if better {
            *best = Some((start, len));
        }
    };

    for (i, &count) in occupancy
        .iter()
        .enumerate()
        .take(search_end)
        .skip(search_start)
    {
        if count == 0 {
            if run_len == 0 {
                run_start = i;
            }
            run_len += 1;
        } else {
            if run_len > 0 {
                consider(run_start, run_len, &mut best);
            }
            run_len = 0;
        }
    }
    if run_len > 0 {
        consider(run_start, run_len, &mut best);
    }

    let Some((gap_start, gap_len)) = best else {
        return single;
    };
    let gutter = min_x + (gap_start as f32 + gap_len as f32 / 2.0) * SLICE_WIDTH;
    if gutter - min_x < MIN_COLUMN_WIDTH || max_x - gutter < MIN_COLUMN_WIDTH {
        log::debug!("gutter at {:.1} leaves a column too narrow", gutter);
        return single;
    }

    let left = spans.iter().filter(|s| s.center_x() < gutter).count();
    let right = spans.len() - left;
    let min_spans = (spans.len() / 10).max(2);
    if left < min_spans || right < min_spans {
        log::debug!("gutter at {:.1} rejected: {} / {} spans", gutter, left, right);
        return single;
    }

    log::debug!("two columns split at x={:.1}", gutter);
    vec![
        Column {
            left: min_x - 10.0,
            right: gutter,
            index: 0,
        },
        Column {
            left: gutter,
            right: max_x + 10.0,
            index: 1,
        },
    ]
}

/// Group spans into lines, column by column. Lines come back in reading
/// order: all of column 0 top to bottom, then column 1.
pub fn group_into_lines(spans: Vec<TextSpan>, config: &LayoutConfig) -> Vec<TextLine> {
    let columns = if config.detect_columns {
        detect_columns(&spans)
    } else {
        Vec::new()
    };

    if columns.len() <= 1 {
        return group_column(spans, 0, config);
    }

    let mut per_column: Vec<Vec<TextSpan>> = vec![Vec::new(); columns.len()];
    for span in spans {
        let index = columns
            .iter()
            .position(|c| c.contains_span(&span))
            .unwrap_or(0);
        per_column[index].push(span);
    }
    per_column
        .into_iter()
        .enumerate()
        .flat_map(|(i, spans)| group_column(spans, i, config))
        .collect()
}

fn group_column(mut spans: Vec<TextSpan>, column: usize, config: &LayoutConfig) -> Vec<TextLine> {
    // Top to bottom, then left to right; earlier drawing wins ties.
    spans.sort_by(|a, b| {
        b.y.total_cmp(&a.y)
            .then(a.x.total_cmp(&b.x))
            .then(a.order.cmp(&b.order))
    });

    let mut lines = Vec::new();
    let mut current: Vec<TextSpan> = Vec::new();
    let mut line_y = 0.0f32;
    let mut line_size = 0.0f32;

    for span in spans {
        let tolerance = span.font_size.max(line_size) * config.line_tolerance;
        if !current.is_empty() && (span.y - line_y).abs() <= tolerance {
            line_size = line_size.max(span.font_size);
            current.push(span);
            continue;
        }
        if !current.is_empty() {
            lines.push(TextLine::from_spans(std::mem::take(&mut current), column));
        }
        line_y = span.y;
        line_size = span.font_size;
        current.push(span);
    }
    if !current.is_empty() {
        lines.push(TextLine::from_spans(current, column));
    }
    lines
}

/// Font size statistics of a page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontStatistics {
    /// Most common size, weighted by characters
    pub body_size: f32,
    /// Sizes classified as headings, largest first
    pub heading_sizes: Vec<f32>,
}

/// Sizes are bucketed to 0.1pt.
fn size_key(size: f32) -> i32 {
    (size * 10.0).round() as i32
}

impl FontStatistics {
    pub fn from_lines(lines: &[TextLine], config: &LayoutConfig) -> Self {
        let mut histogram: BTreeMap<i32, usize> = BTreeMap::new();
        for line in lines {
            *histogram.entry(size_key(line.font_size)).or_insert(0) += line.char_count();
        }
        // Highest count wins; ties go to the smaller size.
        let Some((&body_key, _)) = histogram
            .iter()
            .max_by(|(ka, ca), (kb, cb)| ca.cmp(cb).then(kb.cmp(ka)))
        else {
            return Self::default();
        };
        let body_size = body_key as f32 / 10.0;

        let heading_sizes = histogram
            .keys()
            .rev()
            .map(|&k| k as f32 / 10.0)
            .filter(|&size| is_heading_size(size, body_size, config.heading_ratio))
            .collect();

        Self {
            body_size,
            heading_sizes,
        }
    }

    /// Heading level for a line size: 1 for the largest heading size,
    /// capped at `max_level`. `None` for body text.
    pub fn heading_level(&self, font_size: f32, config: &LayoutConfig) -> Option<u8> {
        if self.body_size <= 0.0 || !is_heading_size(font_size, self.body_size, config.heading_ratio)
        {
            return None;
        }
        let key = size_key(font_size);
        let rank = self
            .heading_sizes
            .iter()
            .position(|&s| size_key(s) <= key)
            .unwrap_or(self.heading_sizes.len());
        Some((rank + 1).min(usize::from(config.max_heading_level.max(1))) as u8)
    }
}

fn is_heading_size(size: f32, body: f32, ratio: f32) -> bool {
    size + 1e-3 >= body * ratio
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, x: f32, y: f32, size: f32, order: usize) -> TextSpan {
        TextSpan {
            text: text.to_string(),
            x,
            y,
            width: text.chars().count() as f32 * size * 0.5,
            font_size: size,
            font_name: "Helvetica".to_string(),
            bold: false,
            italic: false,
            order,
        }
    }

    fn config() -> LayoutConfig {
        LayoutConfig::default()
    }

    #[test]
    fn test_lines_grouped_by_baseline() {
        let spans = vec![
            span("second", 10.0, 680.0, 10.0, 2),
            span("world", 50.0, 701.0, 10.0, 1),
            span("Hello", 10.0, 700.0, 10.0, 0),
        ];
        let lines = group_into_lines(spans, &config());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(&config()), "Hello world");
        assert_eq!(lines[1].text(&config()), "second");
    }

    #[test]
    fn test_line_tolerance_boundary() {
        let c = config();
        // 3pt apart at 10pt with tolerance 0.3: same line
        let lines = group_into_lines(
            vec![span("a", 0.0, 100.0, 10.0, 0), span("b", 40.0, 97.0, 10.0, 1)],
            &c,
        );
        assert_eq!(lines.len(), 1);
        let lines = group_into_lines(
            vec![span("a", 0.0, 100.0, 10.0, 0), span("b", 40.0, 96.5, 10.0, 1)],
            &c,
        );
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_cjk_spans_join_without_space() {
        let line = TextLine::from_spans(
            vec![span("日本", 0.0, 0.0, 10.0, 0), span("語", 12.0, 0.0, 10.0, 1)],
            0,
        );
        assert_eq!(line.text(&config()), "日本語");
    }

    #[test]
    fn test_two_columns_read_column_major() {
        let mut spans = Vec::new();
        for i in 0..6 {
            let y = 700.0 - i as f32 * 14.0;
            spans.push(span("left column text", 50.0, y, 10.0, i * 2));
            spans.push(span("right column text", 330.0, y, 10.0, i * 2 + 1));
        }
        let lines = group_into_lines(spans, &config());
        assert_eq!(lines.len(), 12);
        assert!(lines[..6].iter().all(|l| l.column == 0));
        assert!(lines[6..].iter().all(|l| l.column == 1));
        assert_eq!(lines[6].text(&config()), "right column text");
    }

    #[test]
    fn test_narrow_text_is_single_column() {
        let spans = vec![span("a", 0.0, 0.0, 10.0, 0), span("b", 100.0, 0.0, 10.0, 1)];
        assert_eq!(detect_columns(&spans).len(), 1);
    }

    #[test]
    fn test_font_statistics_and_heading_boundary() {
        let c = config();
        let lines = vec![
            TextLine::from_spans(vec![span("a body line of text", 0.0, 500.0, 10.0, 0)], 0),
            TextLine::from_spans(vec![span("another body line", 0.0, 486.0, 10.0, 1)], 0),
            TextLine::from_spans(vec![span("Title", 0.0, 700.0, 20.0, 2)], 0),
            TextLine::from_spans(vec![span("Sub", 0.0, 650.0, 12.0, 3)], 0),
        ];
        let stats = FontStatistics::from_lines(&lines, &c);
        assert_eq!(stats.body_size, 10.0);
        assert_eq!(stats.heading_sizes, vec![20.0, 12.0]);
        assert_eq!(stats.heading_level(20.0, &c), Some(1));
        assert_eq!(stats.heading_level(12.0, &c), Some(2));
        // Exactly at body × ratio is a heading; just below is not.
        assert_eq!(stats.heading_level(11.9, &c), None);
        assert_eq!(stats.heading_level(10.0, &c), None);
    }

    #[test]
    fn test_heading_level_cap() {
        let c = LayoutConfig::default().with_max_heading_level(1);
        let lines = vec![
            TextLine::from_spans(vec![span("body body body", 0.0, 0.0, 10.0, 0)], 0),
            TextLine::from_spans(vec![span("H", 0.0, 50.0, 30.0, 1)], 0),
            TextLine::from_spans(vec![span("H", 0.0, 90.0, 20.0, 2)], 0),
        ];
        let stats = FontStatistics::from_lines(&lines, &c);
        assert_eq!(stats.heading_level(20.0, &c), Some(1));
    }

    #[test]
    fn test_bold_line() {
        let mut bold = span("Bold", 0.0, 0.0, 10.0, 0);
        bold.bold = true;
        let line = TextLine::from_spans(vec![bold, span("x", 30.0, 0.0, 10.0, 1)], 0);
        assert!(line.is_bold());
    }
}
