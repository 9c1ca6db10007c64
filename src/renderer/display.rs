//! Displays and drawing surfaces a renderer can be realized against.

use std::fmt;
use std::sync::{Arc, Mutex};

use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};
use tiny_skia::Pixmap;

use crate::error::RenderError;
use crate::geometry::Rect;
use crate::region::Region;
use crate::texture::{MemoryFormat, Texture};

/// Environment variable that stops any display from offering GPU backends.
pub const DISABLE_GPU_ENV: &str = "RENDERNODE_DISABLE_GPU";

/// The connection renderers are realized for.
///
/// A display decides which backends may be probed. GPU backends are only
/// tried when the display allows it.
#[derive(Debug, Clone)]
pub struct Display {
    name: String,
    gpu: bool,
}

impl Default for Display {
    fn default() -> Self {
        Self::new("default")
    }
}

impl Display {
    /// A display that offers GPU backends unless `RENDERNODE_DISABLE_GPU`
    /// is set to something other than `0`.
    pub fn new(name: impl Into<String>) -> Self {
        let disabled = std::env::var(DISABLE_GPU_ENV)
            .map(|v| !v.is_empty() && v != "0")
            .unwrap_or(false);
        let name = name.into();
        if disabled {
            log::info!("GPU backends disabled for display {} by {}", name, DISABLE_GPU_ENV);
        }
        Self { name, gpu: !disabled }
    }

    /// A display without GPU support.
    pub fn software_only(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            gpu: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supports_gpu(&self) -> bool {
        self.gpu
    }
}

/// A native window a GPU renderer can present to.
pub trait WindowSource: HasWindowHandle + HasDisplayHandle + Send + Sync {}

impl<T: HasWindowHandle + HasDisplayHandle + Send + Sync> WindowSource for T {}

/// A clonable handle to a surface's window, passed to wgpu.
#[derive(Clone)]
pub(crate) struct SharedWindow(Arc<dyn WindowSource>);

impl HasWindowHandle for SharedWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.0.window_handle()
    }
}

impl HasDisplayHandle for SharedWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.0.display_handle()
    }
}

enum Target {
    Offscreen(Mutex<Pixmap>),
    Window(Arc<dyn WindowSource>),
}

struct SurfaceInner {
    width: u32,
    height: u32,
    target: Target,
}

/// A drawing surface. Cloning gives another handle to the same surface.
#[derive(Clone)]
pub struct Surface {
    inner: Arc<SurfaceInner>,
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.inner.width)
            .field("height", &self.inner.height)
            .field("window", &self.is_window())
            .finish()
    }
}

/// An integer pixel rectangle inside a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn to_rect(self) -> Rect {
        Rect::new(
            self.x as f32,
            self.y as f32,
            self.width as f32,
            self.height as f32,
        )
    }
}

impl Surface {
    /// A transparent surface in CPU memory.
    pub fn offscreen(width: u32, height: u32) -> Result<Self, RenderError> {
        let pixmap = Pixmap::new(width, height)
            .ok_or(RenderError::InvalidViewport(width as f32, height as f32))?;
        Ok(Self {
            inner: Arc::new(SurfaceInner {
                width,
                height,
                target: Target::Offscreen(Mutex::new(pixmap)),
            }),
        })
    }

    /// A window surface. Only GPU renderers can draw to it.
    pub fn for_window(window: impl WindowSource + 'static, width: u32, height: u32) -> Self {
        Self {
            inner: Arc::new(SurfaceInner {
                width,
                height,
                target: Target::Window(Arc::new(window)),
            }),
        }
    }

    pub fn width(&self) -> u32 {
        self.inner.width
    }

    pub fn height(&self) -> u32 {
        self.inner.height
    }

    pub fn is_window(&self) -> bool {
        matches!(self.inner.target, Target::Window(_))
    }

    pub fn ptr_eq(&self, other: &Surface) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn window(&self) -> Option<SharedWindow> {
        match &self.inner.target {
            Target::Window(window) => Some(SharedWindow(window.clone())),
            Target::Offscreen(_) => None,
        }
    }

    /// Copy the current contents of an offscreen surface into a texture.
    /// Window surfaces cannot be read back and return `None`.
    pub fn snapshot(&self) -> Option<Texture> {
        let Target::Offscreen(pixmap) = &self.inner.target else {
            return None;
        };
        let pixmap = pixmap.lock().unwrap_or_else(|e| e.into_inner());
        Texture::from_memory(
            self.width(),
            self.height(),
            MemoryFormat::R8G8B8A8Premultiplied,
            pixmap.data().to_vec(),
            self.width() as usize * 4,
        )
        .ok()
    }

    /// The pixel rectangles of `region` inside this surface; the whole
    /// surface when `region` is `None`.
    pub(crate) fn damage_rects(&self, region: Option<&Region>) -> Vec<PixelRect> {
        let full = PixelRect {
            x: 0,
            y: 0,
            width: self.width(),
            height: self.height(),
        };
        let Some(region) = region else {
            return vec![full];
        };
        let bounds = full.to_rect();
        region
            .rects()
            .iter()
            .filter_map(|r| r.intersection(&bounds))
            .map(|r| r.round_out())
            .filter(|r| r.width >= 1.0 && r.height >= 1.0)
            .map(|r| PixelRect {
                x: r.x as u32,
                y: r.y as u32,
                width: r.width as u32,
                height: r.height as u32,
            })
            .collect()
    }

    /// Replace a rectangle of an offscreen surface with premultiplied RGBA
    /// rows. Returns an error for window surfaces.
    pub(crate) fn write_pixels(
        &self,
        rect: PixelRect,
        data: &[u8],
        stride: usize,
    ) -> Result<(), RenderError> {
        let Target::Offscreen(pixmap) = &self.inner.target else {
            return Err(RenderError::Surface(
                "window surfaces cannot be written from the CPU".to_string(),
            ));
        };
        let mut pixmap = pixmap.lock().unwrap_or_else(|e| e.into_inner());
        let surface_stride = self.width() as usize * 4;
        let x1 = (rect.x + rect.width).min(self.width());
        let y1 = (rect.y + rect.height).min(self.height());
        if x1 <= rect.x || y1 <= rect.y {
            return Ok(());
        }
        let row_bytes = (x1 - rect.x) as usize * 4;
        let dst = pixmap.data_mut();
        for (row, y) in (rect.y..y1).enumerate() {
            let src = &data[row * stride..row * stride + row_bytes];
            let start = y as usize * surface_stride + rect.x as usize * 4;
            dst[start..start + row_bytes].copy_from_slice(src);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_software_only_display() {
        let display = Display::software_only("test");
        assert!(!display.supports_gpu());
        assert_eq!(display.name(), "test");
    }

    #[test]
    fn test_damage_rects_are_clamped() {
        let surface = Surface::offscreen(10, 10).unwrap();
        assert_eq!(surface.damage_rects(None).len(), 1);

        let mut region = Region::new();
        region.add_rect(Rect::new(8.0, 8.0, 5.0, 5.0));
        region.add_rect(Rect::new(20.0, 20.0, 5.0, 5.0));
        let rects = surface.damage_rects(Some(&region));
        assert_eq!(
            rects,
            vec![PixelRect {
                x: 8,
                y: 8,
                width: 2,
                height: 2
            }]
        );
    }

    #[test]
    fn test_write_pixels_and_snapshot() {
        let surface = Surface::offscreen(4, 4).unwrap();
        let rect = PixelRect {
            x: 1,
            y: 1,
            width: 2,
            height: 2,
        };
        let data = [0u8, 0, 255, 255].repeat(4);
        surface.write_pixels(rect, &data, 8).unwrap();

        let texture = surface.snapshot().unwrap();
        let mut out = vec![0u8; 64];
        texture.download(&mut out, 16).unwrap();
        let px = |x: usize, y: usize| &out[y * 16 + x * 4..y * 16 + x * 4 + 4];
        assert_eq!(px(1, 1), &[255, 0, 0, 255]);
        assert_eq!(px(0, 0), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_zero_sized_offscreen_surface() {
        assert!(matches!(
            Surface::offscreen(0, 4),
            Err(RenderError::InvalidViewport(..))
        ));
    }
}
