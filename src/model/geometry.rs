//! Points, rectangles and affine matrices in PDF user space.

use serde::{Deserialize, Serialize};

/// A point in user space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle with normalised corners (`x0 <= x1`, `y0 <= y1`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    /// US Letter, used when a page has no MediaBox.
    pub const LETTER: Rect = Rect {
        x0: 0.0,
        y0: 0.0,
        x1: 612.0,
        y1: 792.0,
    };

    /// Build a rectangle from any two opposite corners.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Bounding box of a set of points.
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let mut rect = Rect::new(first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            rect.x0 = rect.x0.min(p.x);
            rect.y0 = rect.y0.min(p.y);
            rect.x1 = rect.x1.max(p.x);
            rect.y1 = rect.y1.max(p.y);
        }
        Some(rect)
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x0 && p.x <= self.x1 && p.y >= self.y0 && p.y <= self.y1
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// A PDF transformation matrix `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translate(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        Point {
            x: self.a * p.x + self.c * p.y + self.e,
            y: self.b * p.x + self.d * p.y + self.f,
        }
    }

    /// Bounding box of the unit square under this matrix.
    pub fn unit_square_bbox(&self) -> Rect {
        let corners = [
            self.apply(Point::new(0.0, 0.0)),
            self.apply(Point::new(1.0, 0.0)),
            self.apply(Point::new(0.0, 1.0)),
            self.apply(Point::new(1.0, 1.0)),
        ];
        Rect::from_points(&corners).unwrap_or_default()
    }

    /// Vertical scale: length of the transformed unit y vector.
    pub fn scale_y(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }

    /// Horizontal scale: length of the transformed unit x vector.
    pub fn scale_x(&self) -> f32 {
        (self.a * self.a + self.b * self.b).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_normalises_corners() {
        let r = Rect::new(100.0, 50.0, 10.0, 5.0);
        assert_eq!((r.x0, r.y0, r.x1, r.y1), (10.0, 5.0, 100.0, 50.0));
        assert_eq!(r.width(), 90.0);
    }

    #[test]
    fn test_matrix_multiply_order() {
        let scale = Matrix::new(2.0, 0.0, 0.0, 2.0, 0.0, 0.0);
        let shift = Matrix::translate(10.0, 20.0);
        let p = scale.multiply(&shift).apply(Point::new(1.0, 1.0));
        assert_eq!(p, Point::new(12.0, 22.0));
        let p = shift.multiply(&scale).apply(Point::new(1.0, 1.0));
        assert_eq!(p, Point::new(22.0, 42.0));
    }

    #[test]
    fn test_unit_square_bbox() {
        let m = Matrix::new(200.0, 0.0, 0.0, 100.0, 50.0, 600.0);
        let bbox = m.unit_square_bbox();
        assert_eq!((bbox.x0, bbox.y0, bbox.x1, bbox.y1), (50.0, 600.0, 250.0, 700.0));
    }
}
