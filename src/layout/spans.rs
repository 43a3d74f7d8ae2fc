//! Glyph to span merging.

use super::LayoutConfig;
use crate::model::{Glyph, Primitive};

/// A run of glyphs on one baseline sharing font and style.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    /// Left edge
    pub x: f32,
    /// Baseline
    pub y: f32,
    pub width: f32,
    pub font_size: f32,
    pub font_name: String,
    pub bold: bool,
    pub italic: bool,
    /// Drawing order of the first glyph
    pub order: usize,
}

impl TextSpan {
    fn start(glyph: &Glyph) -> Self {
        Self {
            text: glyph.text.clone(),
            x: glyph.origin.x,
            y: glyph.origin.y,
            width: glyph.advance.max(0.0),
            font_size: glyph.font_size,
            font_name: glyph.font_name.clone(),
            bold: glyph.bold,
            italic: glyph.italic,
            order: glyph.order,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    /// Approximate top edge (ascender).
    pub fn top(&self) -> f32 {
        self.y + self.font_size * 0.8
    }

    /// Approximate bottom edge (descender).
    pub fn bottom(&self) -> f32 {
        self.y - self.font_size * 0.2
    }

    fn same_style(&self, glyph: &Glyph) -> bool {
        self.bold == glyph.bold
            && self.italic == glyph.italic
            && (self.font_size - glyph.font_size).abs() <= self.font_size.max(1.0) * 0.1
    }

    /// Whether `glyph` continues this span, and if so whether a space
    /// belongs before it.
    fn continuation(&self, glyph: &Glyph, config: &LayoutConfig) -> Option<bool> {
        let size = self.font_size.max(1.0);
        if !self.same_style(glyph) || (glyph.origin.y - self.y).abs() > size * config.line_tolerance
        {
            return None;
        }
        let gap = glyph.origin.x - self.right();
        if gap < -size * 0.5 || gap > size * config.span_gap {
            return None;
        }
        Some(gap > size * config.word_gap)
    }
}

/// Merge the page's glyphs, in drawing order, into spans.
pub fn build_spans(primitives: &[Primitive], config: &LayoutConfig) -> Vec<TextSpan> {
    let mut spans = Vec::new();
    let mut current: Option<TextSpan> = None;

    for glyph in primitives.iter().filter_map(|p| match p {
        Primitive::Glyph(g) => Some(g),
        _ => None,
    }) {
        let blank = glyph.text.trim().is_empty();
        if let Some(span) = current.as_mut() {
            match span.continuation(glyph, config) {
                Some(needs_space) => {
                    if needs_space && !blank && !span.text.ends_with(' ') {
                        span.text.push(' ');
                    }
                    span.text.push_str(if blank { " " } else { &glyph.text });
                    span.width = (glyph.origin.x + glyph.advance - span.x).max(span.width);
                    continue;
                }
                None => {
                    if let Some(done) = current.take() {
                        push_span(&mut spans, done);
                    }
                }
            }
        }
        // Whitespace never starts a span.
        if !blank {
            current = Some(TextSpan::start(glyph));
        }
    }
    if let Some(done) = current {
        push_span(&mut spans, done);
    }
    spans
}

fn push_span(spans: &mut Vec<TextSpan>, mut span: TextSpan) {
    let trimmed = span.text.trim_end();
    if trimmed.is_empty() {
        return;
    }
    if trimmed.len() != span.text.len() {
        span.text.truncate(trimmed.len());
    }
    spans.push(span);
}

/// Drop spans that repeat an earlier span's text at the same position
/// (fake bold, shadows). The earliest drawn copy is kept.
pub fn dedupe_spans(mut spans: Vec<TextSpan>, tolerance: f32) -> Vec<TextSpan> {
    spans.sort_by_key(|s| s.order);
    let mut kept: Vec<TextSpan> = Vec::with_capacity(spans.len());
    for span in spans {
        let duplicate = kept.iter().any(|k| {
            k.text == span.text
                && (k.x - span.x).abs() <= tolerance
                && (k.y - span.y).abs() <= tolerance
        });
        if duplicate {
            log::debug!("dropping duplicate span '{}'", span.text);
        } else {
            kept.push(span);
        }
    }
    kept
}

/// Whether a character belongs to a script written without word spaces.
/// Korean uses spaces and is not included.
pub fn is_spaceless_script_char(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF
        | 0x3400..=0x4DBF
        | 0x20000..=0x2EBEF
        | 0x3040..=0x309F
        | 0x30A0..=0x30FF
        | 0x3000..=0x303F)
}
