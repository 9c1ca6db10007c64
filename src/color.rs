use serde::{Deserialize, Serialize};

/// A straight (non-premultiplied) sRGB color with components in 0..=1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xFF) as f32 / 255.0,
            g: ((hex >> 8) & 0xFF) as f32 / 255.0,
            b: (hex & 0xFF) as f32 / 255.0,
            a: 1.0,
        }
    }

    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: a as f32 / 255.0,
        }
    }

    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const RED: Color = Color::rgb(1.0, 0.0, 0.0);
    pub const GREEN: Color = Color::rgb(0.0, 1.0, 0.0);
    pub const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);
    /// Drawn in place of content the software path cannot project.
    pub const HOT_PINK: Color = Color::rgb(1.0, 105.0 / 255.0, 180.0 / 255.0);

    pub fn is_opaque(&self) -> bool {
        self.a >= 1.0
    }

    pub fn is_clear(&self) -> bool {
        self.a <= 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite() && self.a.is_finite()
    }

    /// Clamp every component into 0..=1.
    pub fn clamped(&self) -> Self {
        Self {
            r: self.r.clamp(0.0, 1.0),
            g: self.g.clamp(0.0, 1.0),
            b: self.b.clamp(0.0, 1.0),
            a: self.a.clamp(0.0, 1.0),
        }
    }

    pub fn with_alpha(&self, a: f32) -> Self {
        Self { a, ..*self }
    }

    pub fn to_rgba8(&self) -> [u8; 4] {
        let c = self.clamped();
        [
            (c.r * 255.0).round() as u8,
            (c.g * 255.0).round() as u8,
            (c.b * 255.0).round() as u8,
            (c.a * 255.0).round() as u8,
        ]
    }

    pub fn to_premultiplied(&self) -> [f32; 4] {
        let c = self.clamped();
        [c.r * c.a, c.g * c.a, c.b * c.a, c.a]
    }

    pub(crate) fn to_skia(self) -> tiny_skia::Color {
        let c = self.clamped();
        tiny_skia::Color::from_rgba(c.r, c.g, c.b, c.a).unwrap_or(tiny_skia::Color::TRANSPARENT)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::TRANSPARENT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hex() {
        assert_eq!(Color::from_hex(0xFF0000), Color::RED);
        assert_eq!(Color::from_hex(0x00FF00).to_rgba8(), [0, 255, 0, 255]);
    }

    #[test]
    fn test_premultiplied() {
        let c = Color::rgba(1.0, 0.5, 0.0, 0.5);
        assert_eq!(c.to_premultiplied(), [0.5, 0.25, 0.0, 0.5]);
    }

    #[test]
    fn test_clamped() {
        let c = Color::rgba(2.0, -1.0, 0.5, 1.5).clamped();
        assert_eq!(c, Color::rgba(1.0, 0.0, 0.5, 1.0));
    }
}
