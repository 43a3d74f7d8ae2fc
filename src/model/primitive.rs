//! Drawing primitives produced by the content stream interpreter.

use super::geometry::{Matrix, Point, Rect};
use crate::parser::{Dictionary, ObjectId};

/// One drawing primitive, in the order it was painted.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Glyph(Glyph),
    Path(PathPrimitive),
    Image(ImagePrimitive),
}

impl Primitive {
    /// Drawing order on the page.
    pub fn order(&self) -> usize {
        match self {
            Primitive::Glyph(g) => g.order,
            Primitive::Path(p) => p.order,
            Primitive::Image(i) => i.order,
        }
    }
}

/// A shown glyph with its decoded text.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    /// Unicode text for the glyph (may be several chars for ligatures)
    pub text: String,
    /// Baseline origin in page space
    pub origin: Point,
    /// Advance along the baseline in page space
    pub advance: f32,
    /// Effective font size in page space
    pub font_size: f32,
    /// Base font name without subset prefix
    pub font_name: String,
    pub bold: bool,
    pub italic: bool,
    pub order: usize,
}

/// How a path was painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaintStyle {
    pub stroke: bool,
    pub fill: bool,
}

/// A painted path, flattened to its construction points.
#[derive(Debug, Clone, PartialEq)]
pub struct PathPrimitive {
    /// Subpaths in page space
    pub subpaths: Vec<Vec<Point>>,
    pub style: PaintStyle,
    /// Line width in page space
    pub line_width: f32,
    pub order: usize,
}

impl PathPrimitive {
    pub fn bbox(&self) -> Option<Rect> {
        let points: Vec<Point> = self.subpaths.iter().flatten().copied().collect();
        Rect::from_points(&points)
    }
}

/// Where an image's samples come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    /// An image XObject in the page (or form) resources
    XObject { name: String, id: ObjectId },
    /// Inline image data (`BI ... ID ... EI`) with abbreviations expanded,
    /// or a direct image stream
    Inline { dict: Dictionary, data: Vec<u8> },
}

/// A placed image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePrimitive {
    pub source: ImageSource,
    /// CTM at the time of painting; maps the unit square to the page
    pub placement: Matrix,
    pub bbox: Rect,
    pub order: usize,
}
