//! Vector paths used by fill and stroke nodes.

use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox, Point, Rect, RoundedRect, BOTTOM_LEFT, BOTTOM_RIGHT, TOP_LEFT, TOP_RIGHT};

/// Kappa for approximating a quarter ellipse with one cubic.
const KAPPA: f32 = 0.552_284_8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PathVerb {
    Move(Point),
    Line(Point),
    Quad(Point, Point),
    Cubic(Point, Point, Point),
    Close,
}

/// An immutable sequence of contours.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Path {
    verbs: Vec<PathVerb>,
}

impl Path {
    pub fn verbs(&self) -> &[PathVerb] {
        &self.verbs
    }

    pub fn is_empty(&self) -> bool {
        self.verbs.is_empty()
    }

    /// Bounds of all points including control points, so the box is
    /// conservative for curves.
    pub fn bounds(&self) -> Option<BoundingBox> {
        let points: Vec<Point> = self
            .verbs
            .iter()
            .flat_map(|v| match *v {
                PathVerb::Move(p) | PathVerb::Line(p) => vec![p],
                PathVerb::Quad(a, b) => vec![a, b],
                PathVerb::Cubic(a, b, c) => vec![a, b, c],
                PathVerb::Close => Vec::new(),
            })
            .collect();
        BoundingBox::from_points(&points)
    }

    /// Checks that every contour starts with a move and all points are finite.
    pub fn is_well_formed(&self) -> bool {
        let mut open = false;
        for verb in &self.verbs {
            let finite = match *verb {
                PathVerb::Move(p) => {
                    open = true;
                    p.is_finite()
                }
                PathVerb::Line(p) => open && p.is_finite(),
                PathVerb::Quad(a, b) => open && a.is_finite() && b.is_finite(),
                PathVerb::Cubic(a, b, c) => open && a.is_finite() && b.is_finite() && c.is_finite(),
                PathVerb::Close => open,
            };
            if !finite {
                return false;
            }
        }
        true
    }

    pub(crate) fn to_skia(&self) -> Option<tiny_skia::Path> {
        let mut pb = tiny_skia::PathBuilder::new();
        for verb in &self.verbs {
            match *verb {
                PathVerb::Move(p) => pb.move_to(p.x, p.y),
                PathVerb::Line(p) => pb.line_to(p.x, p.y),
                PathVerb::Quad(a, b) => pb.quad_to(a.x, a.y, b.x, b.y),
                PathVerb::Cubic(a, b, c) => pb.cubic_to(a.x, a.y, b.x, b.y, c.x, c.y),
                PathVerb::Close => pb.close(),
            }
        }
        pb.finish()
    }
}

#[derive(Debug, Default)]
pub struct PathBuilder {
    verbs: Vec<PathVerb>,
    has_current: bool,
}

impl PathBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(&mut self, x: f32, y: f32) -> &mut Self {
        self.verbs.push(PathVerb::Move(Point::new(x, y)));
        self.has_current = true;
        self
    }

    fn ensure_current(&mut self) {
        if !self.has_current {
            self.move_to(0.0, 0.0);
        }
    }

    pub fn line_to(&mut self, x: f32, y: f32) -> &mut Self {
        self.ensure_current();
        self.verbs.push(PathVerb::Line(Point::new(x, y)));
        self
    }

    pub fn quad_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> &mut Self {
        self.ensure_current();
        self.verbs
            .push(PathVerb::Quad(Point::new(x1, y1), Point::new(x2, y2)));
        self
    }

    pub fn cubic_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x3: f32, y3: f32) -> &mut Self {
        self.ensure_current();
        self.verbs.push(PathVerb::Cubic(
            Point::new(x1, y1),
            Point::new(x2, y2),
            Point::new(x3, y3),
        ));
        self
    }

    pub fn close(&mut self) -> &mut Self {
        if self.has_current {
            self.verbs.push(PathVerb::Close);
            self.has_current = false;
        }
        self
    }

    pub fn add_rect(&mut self, rect: Rect) -> &mut Self {
        self.move_to(rect.x, rect.y)
            .line_to(rect.right(), rect.y)
            .line_to(rect.right(), rect.bottom())
            .line_to(rect.x, rect.bottom())
            .close()
    }

    pub fn add_rounded_rect(&mut self, rr: &RoundedRect) -> &mut Self {
        let b = rr.bounds;
        let c = &rr.corners;
        let tl = c[TOP_LEFT];
        let tr = c[TOP_RIGHT];
        let br = c[BOTTOM_RIGHT];
        let bl = c[BOTTOM_LEFT];

        self.move_to(b.x + tl.width, b.y);
        self.line_to(b.right() - tr.width, b.y);
        self.cubic_to(
            b.right() - tr.width * (1.0 - KAPPA),
            b.y,
            b.right(),
            b.y + tr.height * (1.0 - KAPPA),
            b.right(),
            b.y + tr.height,
        );
        self.line_to(b.right(), b.bottom() - br.height);
        self.cubic_to(
            b.right(),
            b.bottom() - br.height * (1.0 - KAPPA),
            b.right() - br.width * (1.0 - KAPPA),
            b.bottom(),
            b.right() - br.width,
            b.bottom(),
        );
        self.line_to(b.x + bl.width, b.bottom());
        self.cubic_to(
            b.x + bl.width * (1.0 - KAPPA),
            b.bottom(),
            b.x,
            b.bottom() - bl.height * (1.0 - KAPPA),
            b.x,
            b.bottom() - bl.height,
        );
        self.line_to(b.x, b.y + tl.height);
        self.cubic_to(
            b.x,
            b.y + tl.height * (1.0 - KAPPA),
            b.x + tl.width * (1.0 - KAPPA),
            b.y,
            b.x + tl.width,
            b.y,
        );
        self.close()
    }

    pub fn add_circle(&mut self, center: Point, radius: f32) -> &mut Self {
        let r = Rect::new(center.x - radius, center.y - radius, radius * 2.0, radius * 2.0);
        self.add_rounded_rect(&RoundedRect::uniform(r, radius))
    }

    pub fn to_path(&self) -> Path {
        Path {
            verbs: self.verbs.clone(),
        }
    }

    pub fn build(self) -> Path {
        Path { verbs: self.verbs }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FillRule {
    #[default]
    Winding,
    EvenOdd,
}

impl FillRule {
    pub(crate) fn to_skia(self) -> tiny_skia::FillRule {
        match self {
            FillRule::Winding => tiny_skia::FillRule::Winding,
            FillRule::EvenOdd => tiny_skia::FillRule::EvenOdd,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

/// Stroke parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub line_width: f32,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub miter_limit: f32,
    pub dash: Vec<f32>,
    pub dash_offset: f32,
}

impl Default for Stroke {
    fn default() -> Self {
        Self {
            line_width: 1.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter,
            miter_limit: 4.0,
            dash: Vec::new(),
            dash_offset: 0.0,
        }
    }
}

impl Stroke {
    pub fn new(line_width: f32) -> Self {
        Self {
            line_width,
            ..Default::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        self.line_width.is_finite()
            && self.line_width >= 0.0
            && self.miter_limit.is_finite()
            && self.miter_limit >= 0.0
            && self.dash_offset.is_finite()
            && self.dash.iter().all(|d| d.is_finite() && *d >= 0.0)
    }

    /// How far the stroke can reach past the path's own bounds.
    pub fn bounds_padding(&self) -> f32 {
        let half = self.line_width / 2.0;
        let join = match self.line_join {
            LineJoin::Miter => self.miter_limit.max(1.0),
            LineJoin::Round | LineJoin::Bevel => 1.0,
        };
        let cap = match self.line_cap {
            LineCap::Square => std::f32::consts::SQRT_2,
            LineCap::Butt | LineCap::Round => 1.0,
        };
        half * join.max(cap)
    }

    /// Bounds covered by stroking `path`.
    pub fn stroke_bounds(&self, path: &Path) -> Option<BoundingBox> {
        path.bounds().map(|b| b.expand(self.bounds_padding()))
    }

    pub(crate) fn to_skia(&self) -> tiny_skia::Stroke {
        let dash = if self.dash.iter().any(|d| *d > 0.0) {
            let mut intervals = self.dash.clone();
            // tiny-skia wants an even number of intervals
            if intervals.len() % 2 == 1 {
                intervals.extend_from_within(..);
            }
            tiny_skia::StrokeDash::new(intervals, self.dash_offset)
        } else {
            None
        };
        tiny_skia::Stroke {
            width: self.line_width,
            miter_limit: self.miter_limit,
            line_cap: match self.line_cap {
                LineCap::Butt => tiny_skia::LineCap::Butt,
                LineCap::Round => tiny_skia::LineCap::Round,
                LineCap::Square => tiny_skia::LineCap::Square,
            },
            line_join: match self.line_join {
                LineJoin::Miter => tiny_skia::LineJoin::Miter,
                LineJoin::Round => tiny_skia::LineJoin::Round,
                LineJoin::Bevel => tiny_skia::LineJoin::Bevel,
            },
            dash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_path_bounds() {
        let mut pb = PathBuilder::new();
        pb.add_rect(Rect::new(1.0, 2.0, 3.0, 4.0));
        let path = pb.build();
        assert_eq!(
            path.bounds().map(|b| b.to_rect()),
            Some(Rect::new(1.0, 2.0, 3.0, 4.0))
        );
        assert!(path.is_well_formed());
        assert!(path.to_skia().is_some());
    }

    #[test]
    fn test_line_without_move_starts_at_origin() {
        let mut pb = PathBuilder::new();
        pb.line_to(5.0, 5.0);
        let path = pb.build();
        assert_eq!(path.verbs()[0], PathVerb::Move(Point::ZERO));
    }

    #[test]
    fn test_empty_path() {
        let path = PathBuilder::new().build();
        assert!(path.is_empty());
        assert!(path.bounds().is_none());
        assert!(path.to_skia().is_none());
    }

    #[test]
    fn test_stroke_bounds_padding() {
        let mut pb = PathBuilder::new();
        pb.move_to(0.0, 0.0).line_to(10.0, 0.0);
        let path = pb.build();
        let stroke = Stroke {
            line_width: 4.0,
            line_join: LineJoin::Round,
            ..Default::default()
        };
        let b = stroke.stroke_bounds(&path).unwrap();
        assert_eq!(b.to_rect(), Rect::new(-2.0, -2.0, 14.0, 4.0));
    }
}
