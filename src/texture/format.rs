//! Pixel memory layouts and conversion between them.

use serde::{Deserialize, Serialize};

/// Byte order of one pixel in memory, named by byte position.
///
/// `B8G8R8A8Premultiplied` stores blue first, so an opaque red pixel read
/// as a little-endian `u32` is `0xFFFF0000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MemoryFormat {
    #[default]
    B8G8R8A8Premultiplied,
    A8R8G8B8Premultiplied,
    R8G8B8A8Premultiplied,
    B8G8R8A8,
    A8R8G8B8,
    R8G8B8A8,
    R8G8B8,
    B8G8R8,
}

impl MemoryFormat {
    pub const ALL: [MemoryFormat; 8] = [
        MemoryFormat::B8G8R8A8Premultiplied,
        MemoryFormat::A8R8G8B8Premultiplied,
        MemoryFormat::R8G8B8A8Premultiplied,
        MemoryFormat::B8G8R8A8,
        MemoryFormat::A8R8G8B8,
        MemoryFormat::R8G8B8A8,
        MemoryFormat::R8G8B8,
        MemoryFormat::B8G8R8,
    ];

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            MemoryFormat::R8G8B8 | MemoryFormat::B8G8R8 => 3,
            _ => 4,
        }
    }

    pub fn has_alpha(self) -> bool {
        !matches!(self, MemoryFormat::R8G8B8 | MemoryFormat::B8G8R8)
    }

    pub fn is_premultiplied(self) -> bool {
        matches!(
            self,
            MemoryFormat::B8G8R8A8Premultiplied
                | MemoryFormat::A8R8G8B8Premultiplied
                | MemoryFormat::R8G8B8A8Premultiplied
        )
    }

    /// Byte offsets of r, g, b and a within a pixel. Alpha is `None` for
    /// opaque formats.
    fn layout(self) -> ([usize; 3], Option<usize>) {
        match self {
            MemoryFormat::B8G8R8A8Premultiplied | MemoryFormat::B8G8R8A8 => ([2, 1, 0], Some(3)),
            MemoryFormat::A8R8G8B8Premultiplied | MemoryFormat::A8R8G8B8 => ([1, 2, 3], Some(0)),
            MemoryFormat::R8G8B8A8Premultiplied | MemoryFormat::R8G8B8A8 => ([0, 1, 2], Some(3)),
            MemoryFormat::R8G8B8 => ([0, 1, 2], None),
            MemoryFormat::B8G8R8 => ([2, 1, 0], None),
        }
    }

    /// Read one pixel as RGBA, premultiplied if `premultiplied` is set.
    fn read(self, px: &[u8], premultiplied: bool) -> [u8; 4] {
        let ([r, g, b], a) = self.layout();
        let mut rgba = [px[r], px[g], px[b], a.map_or(255, |a| px[a])];
        if premultiplied != self.is_premultiplied() && self.has_alpha() {
            rgba = if premultiplied {
                premultiply(rgba)
            } else {
                unpremultiply(rgba)
            };
        }
        rgba
    }

    /// Store RGBA that is premultiplied if `premultiplied` is set.
    fn write(self, px: &mut [u8], rgba: [u8; 4], premultiplied: bool) {
        let rgba = if !self.has_alpha() {
            // Opaque formats drop alpha; composite over black
            if premultiplied {
                rgba
            } else {
                premultiply(rgba)
            }
        } else if premultiplied != self.is_premultiplied() {
            if premultiplied {
                unpremultiply(rgba)
            } else {
                premultiply(rgba)
            }
        } else {
            rgba
        };
        let ([r, g, b], a) = self.layout();
        px[r] = rgba[0];
        px[g] = rgba[1];
        px[b] = rgba[2];
        if let Some(a) = a {
            px[a] = rgba[3];
        }
    }
}

fn mul_div_255(a: u8, b: u8) -> u8 {
    let t = a as u32 * b as u32 + 128;
    ((t + (t >> 8)) >> 8) as u8
}

pub(crate) fn premultiply([r, g, b, a]: [u8; 4]) -> [u8; 4] {
    [mul_div_255(r, a), mul_div_255(g, a), mul_div_255(b, a), a]
}

pub(crate) fn unpremultiply([r, g, b, a]: [u8; 4]) -> [u8; 4] {
    if a == 0 {
        return [0, 0, 0, 0];
    }
    let un = |c: u8| ((c.min(a) as u32 * 255 + a as u32 / 2) / a as u32) as u8;
    [un(r), un(g), un(b), a]
}

/// Minimum buffer length for `height` rows of `row_bytes` at `stride`, or
/// `None` if it does not fit in `usize`.
pub(crate) fn required_len(stride: usize, row_bytes: usize, height: u32) -> Option<usize> {
    if height == 0 {
        return Some(0);
    }
    stride
        .checked_mul(height as usize - 1)?
        .checked_add(row_bytes)
}

/// Copy `width` x `height` pixels between layouts.
///
/// Callers check that both buffers are large enough for their strides.
#[allow(clippy::too_many_arguments)]
pub(crate) fn convert(
    src_format: MemoryFormat,
    src: &[u8],
    src_stride: usize,
    dst_format: MemoryFormat,
    dst: &mut [u8],
    dst_stride: usize,
    width: u32,
    height: u32,
) {
    let width = width as usize;
    let src_bpp = src_format.bytes_per_pixel();
    let dst_bpp = dst_format.bytes_per_pixel();

    if src_format == dst_format {
        let row = width * src_bpp;
        for y in 0..height as usize {
            dst[y * dst_stride..y * dst_stride + row]
                .copy_from_slice(&src[y * src_stride..y * src_stride + row]);
        }
        return;
    }

    // Work premultiplied unless both sides are straight alpha
    let premultiplied = src_format.is_premultiplied() || dst_format.is_premultiplied();
    for y in 0..height as usize {
        let src_row = &src[y * src_stride..];
        let dst_row = &mut dst[y * dst_stride..];
        for x in 0..width {
            let rgba = src_format.read(&src_row[x * src_bpp..], premultiplied);
            dst_format.write(&mut dst_row[x * dst_bpp..], rgba, premultiplied);
        }
    }
}
