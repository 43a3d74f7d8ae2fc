//! Table detection from ruling lines and from text alignment.
//!
//! Ruled tables are found first: painted horizontal and vertical segments
//! form a grid and spans are assigned to its cells. Remaining spans go
//! through alignment analysis, where rows whose spans start at shared x
//! positions form a table.

use super::spans::TextSpan;
use super::TableConfig;
use crate::model::{PathPrimitive, Primitive, Table, TableRow};
use std::collections::{HashMap, HashSet};

/// Bucket width for column edge voting.
const EDGE_BUCKET: f32 = 5.0;
/// Alignment tolerance between a span and a column edge.
const ALIGN_TOLERANCE: f32 = 5.0;
/// Minimum ruling length.
const MIN_RULING: f32 = 5.0;

/// A table found on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedTable {
    /// Top edge in page space
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
    pub table: Table,
}

/// A row of spans during detection.
#[derive(Debug, Clone)]
struct RowData {
    y: f32,
    spans: Vec<TextSpan>,
}

/// Detects tables in a page's spans.
pub struct TableDetector<'a> {
    config: &'a TableConfig,
}

impl<'a> TableDetector<'a> {
    pub fn new(config: &'a TableConfig) -> Self {
        Self { config }
    }

    /// Detect tables. Returns the tables and the spans not used by them.
    pub fn detect(
        &self,
        spans: Vec<TextSpan>,
        primitives: &[Primitive],
    ) -> (Vec<DetectedTable>, Vec<TextSpan>) {
        let mut tables = Vec::new();
        let (ruled, spans) = self.detect_ruled(spans, primitives);
        tables.extend(ruled);
        let (aligned, spans) = self.detect_aligned(spans);
        tables.extend(aligned);
        (tables, spans)
    }

    /// Grid tables drawn with ruling lines.
    fn detect_ruled(
        &self,
        spans: Vec<TextSpan>,
        primitives: &[Primitive],
    ) -> (Option<DetectedTable>, Vec<TextSpan>) {
        let paths: Vec<&PathPrimitive> = primitives
            .iter()
            .filter_map(|p| match p {
                Primitive::Path(path) => Some(path),
                _ => None,
            })
            .collect();
        if paths.is_empty() {
            return (None, spans);
        }

        let tolerance = self.config.ruling_tolerance;
        let (xs, ys) = ruling_positions(&paths, tolerance);
        if xs.len() < self.config.min_columns + 1 || ys.len() < self.config.min_rows + 1 {
            return (None, spans);
        }

        // ys run top to bottom
        let (left, right) = (xs[0], xs[xs.len() - 1]);
        let (top, bottom) = (ys[0], ys[ys.len() - 1]);
        let columns = xs.len() - 1;
        let mut grid: Vec<Vec<Vec<TextSpan>>> = vec![vec![Vec::new(); columns]; ys.len() - 1];
        let mut rest = Vec::new();

        for span in spans {
            let cx = span.center_x();
            let cy = span.y + span.font_size * 0.3;
            let inside = cx > left && cx < right && cy < top && cy > bottom;
            let col = xs.windows(2).position(|w| cx >= w[0] && cx < w[1]);
            let row = ys.windows(2).position(|w| cy <= w[0] && cy > w[1]);
            match (inside, row, col) {
                (true, Some(r), Some(c)) => grid[r][c].push(span),
                _ => rest.push(span),
            }
        }

        let filled: Vec<Vec<Vec<TextSpan>>> = grid
            .into_iter()
            .filter(|row| row.iter().any(|cell| !cell.is_empty()))
            .collect();
        if filled.len() < self.config.min_rows {
            // Not a table after all; give the spans back.
            rest.extend(filled.into_iter().flatten().flatten());
            rest.sort_by_key(|s| s.order);
            return (None, rest);
        }
        let rows: Vec<TableRow> = filled
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect();

        log::debug!("ruled table: {} rows x {} columns", rows.len(), columns);
        let mut table = Table::with_header();
        for row in rows {
            table.add_row(row);
        }
        let detected = DetectedTable {
            top,
            bottom,
            left,
            right,
            table,
        };
        (Some(detected), rest)
    }

    /// Tables recognised from repeated column alignment.
    fn detect_aligned(&self, spans: Vec<TextSpan>) -> (Vec<DetectedTable>, Vec<TextSpan>) {
        let config = self.config;
        if spans.len() < config.min_rows * config.min_columns {
            return (Vec::new(), spans);
        }

        let rows = self.group_into_rows(&spans);
        if rows.len() < config.min_rows {
            return (Vec::new(), spans);
        }
        let columns = self.detect_columns(&rows);
        if columns.len() < config.min_columns {
            return (Vec::new(), spans);
        }

        let mut tables = Vec::new();
        let mut used: HashSet<usize> = HashSet::new();
        for (start, end) in self.find_table_regions(&rows, &columns) {
            let region = &rows[start..=end];
            let region_columns = self.detect_columns(region);
            if region_columns.len() < config.min_columns {
                continue;
            }
            if region_columns.len() > config.max_columns {
                log::debug!(
                    "skipping table region: {} columns > {}",
                    region_columns.len(),
                    config.max_columns
                );
                continue;
            }
            if is_list_pattern(region, &region_columns) {
                log::debug!("skipping table region: list markers");
                continue;
            }

            for span in region.iter().flat_map(|r| &r.spans) {
                used.extend(
                    spans
                        .iter()
                        .enumerate()
                        .filter(|(_, s)| s.order == span.order && s.text == span.text)
                        .map(|(i, _)| i),
                );
            }
            tables.push(self.to_detected(region, &region_columns));
        }

        let rest = spans
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !used.contains(i))
            .map(|(_, s)| s)
            .collect();
        (tables, rest)
    }

    fn group_into_rows(&self, spans: &[TextSpan]) -> Vec<RowData> {
        let mut sorted = spans.to_vec();
        sorted.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

        let mut rows = Vec::new();
        let mut current: Vec<TextSpan> = Vec::new();
        let mut current_y = 0.0f32;
        for span in sorted {
            let tolerance = span.font_size * self.config.row_tolerance;
            if !current.is_empty() && (span.y - current_y).abs() <= tolerance {
                current.push(span);
                continue;
            }
            if !current.is_empty() {
                rows.push(make_row(std::mem::take(&mut current)));
            }
            current_y = span.y;
            current.push(span);
        }
        if !current.is_empty() {
            rows.push(make_row(current));
        }
        rows
    }

    /// Column left edges shared by enough rows.
    fn detect_columns(&self, rows: &[RowData]) -> Vec<f32> {
        let multi: Vec<&RowData> = rows.iter().filter(|r| r.spans.len() >= 2).collect();
        let (voters, per_row_once): (Vec<&RowData>, bool) = if multi.len() >= self.config.min_rows {
            (multi, true)
        } else {
            (rows.iter().collect(), false)
        };

        let mut counts: HashMap<i32, usize> = HashMap::new();
        for row in &voters {
            let buckets = row.spans.iter().map(|s| (s.x / EDGE_BUCKET).round() as i32);
            if per_row_once {
                for bucket in buckets.collect::<HashSet<_>>() {
                    *counts.entry(bucket).or_insert(0) += 1;
                }
            } else {
                for bucket in buckets {
                    *counts.entry(bucket).or_insert(0) += 1;
                }
            }
        }

        let min_occurrences =
            ((voters.len() as f32 * self.config.min_alignment_ratio) as usize).max(2);
        let mut edges: Vec<f32> = counts
            .iter()
            .filter(|(_, &count)| count >= min_occurrences)
            .map(|(&bucket, _)| bucket as f32 * EDGE_BUCKET)
            .collect();
        edges.sort_by(f32::total_cmp);

        let mut merged: Vec<f32> = Vec::new();
        for edge in edges {
            match merged.last() {
                Some(&last) if edge - last < self.config.min_column_gap => {}
                _ => merged.push(edge),
            }
        }
        merged
    }

    fn find_table_regions(&self, rows: &[RowData], columns: &[f32]) -> Vec<(usize, usize)> {
        let mut regions = Vec::new();
        let mut start: Option<usize> = None;
        for (i, row) in rows.iter().enumerate() {
            let aligned = alignment_score(row, columns) >= self.config.min_alignment_ratio
                && row.spans.len() >= 2;
            match (aligned, start) {
                (true, None) => start = Some(i),
                (false, Some(s)) => {
                    if i - s >= self.config.min_rows {
                        regions.push((s, i - 1));
                    }
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            if rows.len() - s >= self.config.min_rows {
                regions.push((s, rows.len() - 1));
            }
        }
        regions
    }

    fn to_detected(&self, rows: &[RowData], columns: &[f32]) -> DetectedTable {
        let spans = || rows.iter().flat_map(|r| r.spans.iter());
        let left = spans().map(|s| s.x).fold(f32::INFINITY, f32::min);
        let right = spans().map(TextSpan::right).fold(f32::NEG_INFINITY, f32::max);
        let top = spans().map(TextSpan::top).fold(f32::NEG_INFINITY, f32::max);
        let bottom = spans().map(TextSpan::bottom).fold(f32::INFINITY, f32::min);

        let mut table = if rows.len() > 1 {
            Table::with_header()
        } else {
            Table::new()
        };
        for row in rows {
            let mut cells: Vec<Vec<TextSpan>> = vec![Vec::new(); columns.len()];
            for span in &row.spans {
                let index = column_for(span.x, columns, right);
                if let Some(cell) = cells.get_mut(index) {
                    cell.push(span.clone());
                }
            }
            table.add_row(cells.into_iter().map(cell_text).collect());
        }

        DetectedTable {
            top,
            bottom,
            left,
            right,
            table,
        }
    }
}

fn make_row(spans: Vec<TextSpan>) -> RowData {
    let y = spans.iter().map(|s| s.y).sum::<f32>() / spans.len() as f32;
    let mut spans = spans;
    spans.sort_by(|a, b| a.x.total_cmp(&b.x));
    RowData { y, spans }
}

/// Cell text: spans in reading order joined by spaces.
fn cell_text(mut spans: Vec<TextSpan>) -> String {
    spans.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));
    spans
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn alignment_score(row: &RowData, columns: &[f32]) -> f32 {
    if row.spans.is_empty() || columns.is_empty() {
        return 0.0;
    }
    let aligned = row
        .spans
        .iter()
        .filter(|s| columns.iter().any(|c| (s.x - c).abs() <= ALIGN_TOLERANCE))
        .count();
    aligned as f32 / row.spans.len() as f32
}

/// Column index for a span's left edge.
fn column_for(x: f32, columns: &[f32], right: f32) -> usize {
    for (i, &start) in columns.iter().enumerate() {
        let end = columns.get(i + 1).copied().unwrap_or(right + 100.0);
        if x >= start - 10.0 && x < end - 10.0 {
            return i;
        }
    }
    columns
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (x - **a).abs().total_cmp(&(x - **b).abs()))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Rows whose first cell is a list marker are a list, not a table.
fn is_list_pattern(rows: &[RowData], columns: &[f32]) -> bool {
    if columns.len() < 2 || rows.is_empty() {
        return false;
    }
    let mut bullets = 0;
    let mut numbers = 0;
    for row in rows {
        if let Some(first) = row.spans.first() {
            let text = first.text.trim();
            if super::blocks::is_bullet_marker(text) {
                bullets += 1;
            } else if super::blocks::is_number_marker(text) {
                numbers += 1;
            }
        }
    }
    let bullet_ratio = bullets as f32 / rows.len() as f32;
    let marker_ratio = (bullets + numbers) as f32 / rows.len() as f32;
    bullet_ratio >= 0.5 || (columns.len() == 2 && marker_ratio >= 0.5)
}

/// Distinct x positions of vertical rulings and y positions of horizontal
/// rulings (top to bottom), merged within `tolerance`.
fn ruling_positions(paths: &[&PathPrimitive], tolerance: f32) -> (Vec<f32>, Vec<f32>) {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for path in paths {
        for subpath in &path.subpaths {
            // Thin filled rectangles act as rulings too.
            if path.style.fill && subpath.len() >= 4 {
                let (min_x, max_x) = bounds(subpath.iter().map(|p| p.x));
                let (min_y, max_y) = bounds(subpath.iter().map(|p| p.y));
                let (w, h) = (max_x - min_x, max_y - min_y);
                if w <= tolerance * 2.0 && h >= MIN_RULING {
                    xs.push((min_x + max_x) / 2.0);
                    continue;
                }
                if h <= tolerance * 2.0 && w >= MIN_RULING {
                    ys.push((min_y + max_y) / 2.0);
                    continue;
                }
            }
            if !path.style.stroke {
                continue;
            }
            for pair in subpath.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                let (dx, dy) = ((b.x - a.x).abs(), (b.y - a.y).abs());
                if dx <= tolerance && dy >= MIN_RULING {
                    xs.push((a.x + b.x) / 2.0);
                } else if dy <= tolerance && dx >= MIN_RULING {
                    ys.push((a.y + b.y) / 2.0);
                }
            }
        }
    }
    let xs = merge_positions(xs, tolerance);
    let mut ys = merge_positions(ys, tolerance);
    ys.reverse();
    (xs, ys)
}

fn bounds(values: impl Iterator<Item = f32>) -> (f32, f32) {
    values.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

fn merge_positions(mut values: Vec<f32>, tolerance: f32) -> Vec<f32> {
    values.sort_by(f32::total_cmp);
    let mut merged: Vec<f32> = Vec::new();
    for v in values {
        match merged.last() {
            Some(&last) if v - last <= tolerance => {}
            _ => merged.push(v),
        }
    }
    merged
}
