//! Geometry primitives shared by nodes, renderers and the codec.
//!
//! [`Rect`] is the origin + size form callers hand in; [`BoundingBox`] is the
//! min/max form used while computing node bounds, because unions and
//! intersections of min/max pairs do not accumulate floating point error the
//! way repeated origin + size arithmetic does.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const ZERO: Size = Size {
        width: 0.0,
        height: 0.0,
    };

    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
    };

    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_size(size: Size) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: size.width,
            height: size.height,
        }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    /// Flip negative widths/heights so the size is non-negative.
    pub fn normalize(&self) -> Self {
        let (x, width) = if self.width < 0.0 {
            (self.x + self.width, -self.width)
        } else {
            (self.x, self.width)
        };
        let (y, height) = if self.height < 0.0 {
            (self.y + self.height, -self.height)
        } else {
            (self.y, self.height)
        };
        Self::new(x, y, width, height)
    }

    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// Shrink by `amount` on every side. Negative amounts grow the rect.
    pub fn inset(&self, amount: f32) -> Self {
        Self {
            x: self.x + amount,
            y: self.y + amount,
            width: (self.width - amount * 2.0).max(0.0),
            height: (self.height - amount * 2.0).max(0.0),
        }
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// Half-open containment, matching pixel coverage.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Rect::new(x1, y1, x2 - x1, y2 - y1))
    }

    pub fn union(&self, other: &Rect) -> Rect {
        BoundingBox::from_rect(*self)
            .union(&BoundingBox::from_rect(*other))
            .to_rect()
    }

    /// Smallest integer-aligned rect containing this one.
    pub fn round_out(&self) -> Rect {
        let x = self.x.floor();
        let y = self.y.floor();
        Rect::new(
            x,
            y,
            self.right().ceil() - x,
            self.bottom().ceil() - y,
        )
    }
}

/// Axis-aligned box stored as its two extreme corners.
///
/// Invariant: `min.x <= max.x` and `min.y <= max.y`. Degenerate boxes where
/// `min == max` are valid and contain exactly one point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    pub const EMPTY: BoundingBox = BoundingBox {
        min: Point::ZERO,
        max: Point::ZERO,
    };

    /// Create from two arbitrary corners; they are sorted per axis.
    pub fn new(a: Point, b: Point) -> Self {
        Self {
            min: Point::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn from_rect(rect: Rect) -> Self {
        Self::new(
            rect.origin(),
            Point::new(rect.x + rect.width, rect.y + rect.height),
        )
    }

    /// Smallest box containing every point. Returns `None` for an empty slice.
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bbox = Self {
            min: *first,
            max: *first,
        };
        for p in rest {
            bbox.min.x = bbox.min.x.min(p.x);
            bbox.min.y = bbox.min.y.min(p.y);
            bbox.max.x = bbox.max.x.max(p.x);
            bbox.max.y = bbox.max.y.max(p.y);
        }
        Some(bbox)
    }

    /// Convert back to origin + size.
    ///
    /// The corners of the result are only guaranteed to be within floating
    /// point tolerance of the input rect's corners; `max - min` can round.
    pub fn to_rect(&self) -> Rect {
        Rect::new(
            self.min.x,
            self.min.y,
            self.max.x - self.min.x,
            self.max.y - self.min.y,
        )
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Closed-interval containment: points on `min` or `max` are inside.
    pub fn contains_point(&self, point: Point) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        self.contains_point(other.min) && self.contains_point(other.max)
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// Intersection of the two boxes; disjoint boxes yield `None`.
    pub fn intersect(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let min = Point::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y));
        let max = Point::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y));
        if min.x > max.x || min.y > max.y {
            return None;
        }
        Some(BoundingBox { min, max })
    }

    /// Grow by `amount` on every side.
    pub fn expand(&self, amount: f32) -> BoundingBox {
        BoundingBox {
            min: Point::new(self.min.x - amount, self.min.y - amount),
            max: Point::new(self.max.x + amount, self.max.y + amount),
        }
    }

    pub fn translate(&self, dx: f32, dy: f32) -> BoundingBox {
        BoundingBox {
            min: Point::new(self.min.x + dx, self.min.y + dy),
            max: Point::new(self.max.x + dx, self.max.y + dy),
        }
    }

    pub fn corners(&self) -> [Point; 4] {
        [
            self.min,
            Point::new(self.max.x, self.min.y),
            self.max,
            Point::new(self.min.x, self.max.y),
        ]
    }
}

impl From<Rect> for BoundingBox {
    fn from(rect: Rect) -> Self {
        BoundingBox::from_rect(rect)
    }
}

/// Corner order used by [`RoundedRect`] and border widths/colors.
pub const TOP_LEFT: usize = 0;
pub const TOP_RIGHT: usize = 1;
pub const BOTTOM_RIGHT: usize = 2;
pub const BOTTOM_LEFT: usize = 3;

/// A rectangle with elliptical corners, one radius pair per corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RoundedRect {
    pub bounds: Rect,
    /// Corner radii in [`TOP_LEFT`], [`TOP_RIGHT`], [`BOTTOM_RIGHT`],
    /// [`BOTTOM_LEFT`] order.
    pub corners: [Size; 4],
}

impl RoundedRect {
    pub fn from_rect(bounds: Rect) -> Self {
        Self {
            bounds: bounds.normalize(),
            corners: [Size::ZERO; 4],
        }
    }

    pub fn new(bounds: Rect, corners: [Size; 4]) -> Self {
        Self {
            bounds: bounds.normalize(),
            corners,
        }
        .normalized()
    }

    pub fn uniform(bounds: Rect, radius: f32) -> Self {
        Self::new(bounds, [Size::new(radius, radius); 4])
    }

    pub fn is_rectilinear(&self) -> bool {
        self.corners
            .iter()
            .all(|c| c.width <= 0.0 || c.height <= 0.0)
    }

    /// Scale radii down uniformly so adjacent corners never overlap.
    fn normalized(mut self) -> Self {
        for c in &mut self.corners {
            c.width = c.width.max(0.0);
            c.height = c.height.max(0.0);
        }
        let b = self.bounds;
        let c = &self.corners;
        let mut factor = 1.0f32;
        let mut limit = |sum: f32, extent: f32| {
            if sum > extent && sum > 0.0 {
                factor = factor.min(extent / sum);
            }
        };
        limit(c[TOP_LEFT].width + c[TOP_RIGHT].width, b.width);
        limit(c[BOTTOM_LEFT].width + c[BOTTOM_RIGHT].width, b.width);
        limit(c[TOP_LEFT].height + c[BOTTOM_LEFT].height, b.height);
        limit(c[TOP_RIGHT].height + c[BOTTOM_RIGHT].height, b.height);
        if factor < 1.0 {
            for c in &mut self.corners {
                c.width *= factor;
                c.height *= factor;
            }
        }
        self
    }

    /// Move every edge inward by the given per-side amounts
    /// (top, right, bottom, left), shrinking radii accordingly.
    pub fn shrink(&self, top: f32, right: f32, bottom: f32, left: f32) -> Self {
        let b = self.bounds;
        let width = (b.width - left - right).max(0.0);
        let height = (b.height - top - bottom).max(0.0);
        let shrink_corner = |c: Size, dx: f32, dy: f32| {
            Size::new((c.width - dx).max(0.0), (c.height - dy).max(0.0))
        };
        Self::new(
            Rect::new(b.x + left, b.y + top, width, height),
            [
                shrink_corner(self.corners[TOP_LEFT], left, top),
                shrink_corner(self.corners[TOP_RIGHT], right, top),
                shrink_corner(self.corners[BOTTOM_RIGHT], right, bottom),
                shrink_corner(self.corners[BOTTOM_LEFT], left, bottom),
            ],
        )
    }

    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Self {
            bounds: self.bounds.offset(dx, dy),
            corners: self.corners,
        }
    }

    pub fn contains_point(&self, p: Point) -> bool {
        let b = self.bounds;
        if !b.contains(p.x, p.y) {
            return false;
        }
        let check = |cx: f32, cy: f32, r: Size| {
            if r.width <= 0.0 || r.height <= 0.0 {
                return true;
            }
            let dx = (p.x - cx) / r.width;
            let dy = (p.y - cy) / r.height;
            dx * dx + dy * dy <= 1.0
        };
        let c = &self.corners;
        if p.x < b.x + c[TOP_LEFT].width && p.y < b.y + c[TOP_LEFT].height {
            return check(b.x + c[TOP_LEFT].width, b.y + c[TOP_LEFT].height, c[TOP_LEFT]);
        }
        if p.x > b.right() - c[TOP_RIGHT].width && p.y < b.y + c[TOP_RIGHT].height {
            return check(
                b.right() - c[TOP_RIGHT].width,
                b.y + c[TOP_RIGHT].height,
                c[TOP_RIGHT],
            );
        }
        if p.x > b.right() - c[BOTTOM_RIGHT].width && p.y > b.bottom() - c[BOTTOM_RIGHT].height {
            return check(
                b.right() - c[BOTTOM_RIGHT].width,
                b.bottom() - c[BOTTOM_RIGHT].height,
                c[BOTTOM_RIGHT],
            );
        }
        if p.x < b.x + c[BOTTOM_LEFT].width && p.y > b.bottom() - c[BOTTOM_LEFT].height {
            return check(
                b.x + c[BOTTOM_LEFT].width,
                b.bottom() - c[BOTTOM_LEFT].height,
                c[BOTTOM_LEFT],
            );
        }
        true
    }

    /// Conservative test: true only if `rect` lies entirely inside.
    pub fn contains_rect(&self, rect: &Rect) -> bool {
        if !self.bounds.contains_rect(rect) {
            return false;
        }
        let corners = [
            Point::new(rect.x, rect.y),
            Point::new(rect.right() - f32::EPSILON, rect.y),
            Point::new(rect.right() - f32::EPSILON, rect.bottom() - f32::EPSILON),
            Point::new(rect.x, rect.bottom() - f32::EPSILON),
        ];
        corners.iter().all(|p| self.contains_point(*p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 0.001;

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < EPSILON && (a.y - b.y).abs() < EPSILON
    }

    #[test]
    fn test_rect_roundtrip_is_close() {
        let rects = [
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(-5.5, 3.25, 0.1, 1000.0),
            Rect::new(1e6, -1e6, 0.3, 0.7),
            Rect::new(0.1, 0.2, 0.3, 0.4),
        ];
        for r in rects {
            let back = BoundingBox::from_rect(r).to_rect();
            assert!(close(back.origin(), r.origin()), "{r:?} -> {back:?}");
            assert!(
                close(
                    Point::new(back.right(), back.bottom()),
                    Point::new(r.right(), r.bottom())
                ),
                "{r:?} -> {back:?}"
            );
        }
    }

    #[test]
    fn test_contains_corners_and_midpoint() {
        let b = BoundingBox::from_rect(Rect::new(2.0, 3.0, 4.0, 5.0));
        assert!(b.contains_point(b.min));
        assert!(b.contains_point(b.max));
        let mid = Point::new((b.min.x + b.max.x) / 2.0, (b.min.y + b.max.y) / 2.0);
        assert!(b.contains_point(mid));
        assert!(!b.contains_point(Point::new(6.01, 3.0)));
    }

    #[test]
    fn test_point_box_contains_its_point() {
        let p = Point::new(7.0, -2.0);
        let b = BoundingBox::new(p, p);
        assert!(b.is_empty());
        assert!(b.contains_point(p));
    }

    #[test]
    fn test_union_commutes() {
        let a = BoundingBox::from_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        let b = BoundingBox::from_rect(Rect::new(-3.0, 5.0, 2.0, 20.0));
        assert_eq!(a.union(&b), b.union(&a));
        assert_eq!(a.union(&b).to_rect(), Rect::new(-3.0, 0.0, 13.0, 25.0));
    }

    #[test]
    fn test_negative_size_rect_normalizes() {
        let b = BoundingBox::from_rect(Rect::new(10.0, 10.0, -4.0, -6.0));
        assert_eq!(b.min, Point::new(6.0, 4.0));
        assert_eq!(b.max, Point::new(10.0, 10.0));
    }

    #[test]
    fn test_intersection() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        assert_eq!(a.intersection(&b), Some(Rect::new(5.0, 5.0, 5.0, 5.0)));
        assert_eq!(a.intersection(&Rect::new(20.0, 0.0, 1.0, 1.0)), None);
    }

    #[test]
    fn test_round_out() {
        let r = Rect::new(0.5, 1.2, 2.0, 2.0).round_out();
        assert_eq!(r, Rect::new(0.0, 1.0, 3.0, 3.0));
    }

    #[test]
    fn test_rounded_rect_radii_are_clamped() {
        let rr = RoundedRect::uniform(Rect::new(0.0, 0.0, 10.0, 10.0), 8.0);
        assert!((rr.corners[TOP_LEFT].width - 5.0).abs() < EPSILON);
        assert!(!rr.contains_point(Point::new(0.2, 0.2)));
        assert!(rr.contains_point(Point::new(5.0, 5.0)));
    }

    #[test]
    fn test_rounded_rect_shrink() {
        let rr = RoundedRect::uniform(Rect::new(0.0, 0.0, 20.0, 20.0), 5.0);
        let inner = rr.shrink(2.0, 2.0, 2.0, 2.0);
        assert_eq!(inner.bounds, Rect::new(2.0, 2.0, 16.0, 16.0));
        assert_eq!(inner.corners[TOP_LEFT], Size::new(3.0, 3.0));
    }
}
