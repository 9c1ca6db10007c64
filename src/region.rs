//! Damage regions: unions of integer-aligned rectangles.

use crate::geometry::{Point, Rect};

/// A set of pixel rectangles, used to describe which parts of a surface
/// changed between two frames.
///
/// Rectangles are rounded out to whole pixels when added. Rectangles fully
/// covered by another are dropped; overlapping ones are kept as-is, so the
/// list may cover some pixels twice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Region {
    rects: Vec<Rect>,
}

impl Region {
    pub fn new() -> Self {
        Self { rects: Vec::new() }
    }

    pub fn from_rect(rect: Rect) -> Self {
        let mut region = Self::new();
        region.add_rect(rect);
        region
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    pub fn add_rect(&mut self, rect: Rect) {
        let rect = rect.normalize();
        if rect.is_empty() || !rect.is_finite() {
            return;
        }
        let rect = rect.round_out();
        if self.rects.iter().any(|r| r.contains_rect(&rect)) {
            return;
        }
        self.rects.retain(|r| !rect.contains_rect(r));
        self.rects.push(rect);
    }

    pub fn union(&mut self, other: &Region) {
        for r in &other.rects {
            self.add_rect(*r);
        }
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        for r in &mut self.rects {
            *r = r.offset(dx, dy);
        }
    }

    /// Restrict the region to `clip`.
    pub fn intersect_rect(&mut self, clip: &Rect) {
        self.rects = self
            .rects
            .iter()
            .filter_map(|r| r.intersection(clip))
            .collect();
    }

    /// Bounding rectangle of the whole region.
    pub fn extents(&self) -> Option<Rect> {
        let (first, rest) = self.rects.split_first()?;
        Some(rest.iter().fold(*first, |acc, r| acc.union(r)))
    }

    pub fn contains_point(&self, point: Point) -> bool {
        self.rects.iter().any(|r| r.contains(point.x, point.y))
    }
}

impl From<Rect> for Region {
    fn from(rect: Rect) -> Self {
        Region::from_rect(rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rects_are_rounded_out() {
        let region = Region::from_rect(Rect::new(0.5, 0.5, 1.0, 1.0));
        assert_eq!(region.rects(), &[Rect::new(0.0, 0.0, 2.0, 2.0)]);
    }

    #[test]
    fn test_contained_rects_collapse() {
        let mut region = Region::new();
        region.add_rect(Rect::new(2.0, 2.0, 2.0, 2.0));
        region.add_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        region.add_rect(Rect::new(1.0, 1.0, 1.0, 1.0));
        assert_eq!(region.rects().len(), 1);
        assert_eq!(region.extents(), Some(Rect::new(0.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn test_empty_rects_ignored() {
        let mut region = Region::new();
        region.add_rect(Rect::new(5.0, 5.0, 0.0, 3.0));
        assert!(region.is_empty());
        assert_eq!(region.extents(), None);
    }

    #[test]
    fn test_intersect_and_translate() {
        let mut region = Region::new();
        region.add_rect(Rect::new(0.0, 0.0, 4.0, 4.0));
        region.add_rect(Rect::new(10.0, 10.0, 4.0, 4.0));
        region.intersect_rect(&Rect::new(0.0, 0.0, 2.0, 2.0));
        assert_eq!(region.rects(), &[Rect::new(0.0, 0.0, 2.0, 2.0)]);
        region.translate(1.0, 1.0);
        assert!(region.contains_point(Point::new(2.5, 2.5)));
        assert!(!region.contains_point(Point::new(0.5, 0.5)));
    }
}
