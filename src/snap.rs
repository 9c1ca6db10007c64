//! Pixel-grid snapping policies for points.

use crate::geometry::Point;

/// How a single coordinate is moved onto the device pixel grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum SnapDirection {
    /// Leave the coordinate alone.
    #[default]
    None = 0,
    Floor = 1,
    Ceil = 2,
    Round = 3,
}

impl SnapDirection {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::None),
            1 => Some(Self::Floor),
            2 => Some(Self::Ceil),
            3 => Some(Self::Round),
            _ => None,
        }
    }

    /// Snap `value` (in user units) on a grid of `1 / scale` user units.
    pub fn apply(self, value: f32, scale: f32) -> f32 {
        let device = value * scale;
        let snapped = match self {
            Self::None => return value,
            Self::Floor => device.floor(),
            Self::Ceil => device.ceil(),
            Self::Round => device.round(),
        };
        snapped / scale
    }
}

/// Per-axis snap directions packed into one integer: x in the low 8 bits,
/// y in the next 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PointSnap(u16);

impl PointSnap {
    pub const NONE: PointSnap = PointSnap(0);

    pub const fn new(x: SnapDirection, y: SnapDirection) -> Self {
        Self((x as u16) | ((y as u16) << 8))
    }

    pub const fn uniform(direction: SnapDirection) -> Self {
        Self::new(direction, direction)
    }

    /// Rebuild from a packed value. Unknown per-axis codes are rejected.
    pub fn from_bits(bits: u16) -> Option<Self> {
        SnapDirection::from_bits((bits & 0xFF) as u8)?;
        SnapDirection::from_bits((bits >> 8) as u8)?;
        Some(Self(bits))
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub fn x(self) -> SnapDirection {
        SnapDirection::from_bits((self.0 & 0xFF) as u8).unwrap_or_default()
    }

    pub fn y(self) -> SnapDirection {
        SnapDirection::from_bits((self.0 >> 8) as u8).unwrap_or_default()
    }

    pub fn snap(self, point: Point, scale: f32) -> Point {
        if scale <= 0.0 {
            return point;
        }
        Point::new(self.x().apply(point.x, scale), self.y().apply(point.y, scale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packing() {
        let snap = PointSnap::new(SnapDirection::Floor, SnapDirection::Round);
        assert_eq!(snap.bits(), 0x0301);
        assert_eq!(snap.x(), SnapDirection::Floor);
        assert_eq!(snap.y(), SnapDirection::Round);
        assert_eq!(PointSnap::from_bits(0x0301), Some(snap));
        assert_eq!(PointSnap::from_bits(0x0009), None);
    }

    #[test]
    fn test_snap_with_scale() {
        let snap = PointSnap::new(SnapDirection::Ceil, SnapDirection::Floor);
        let p = snap.snap(Point::new(1.2, 1.7), 2.0);
        assert_eq!(p, Point::new(1.5, 1.5));
        assert_eq!(PointSnap::NONE.snap(Point::new(1.2, 1.7), 2.0), Point::new(1.2, 1.7));
    }
}
