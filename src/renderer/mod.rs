//! Renderer selection and the realize/render/unrealize lifecycle.
//!
//! A [`Renderer`] starts unrealized. Realizing it against a [`Display`]
//! (and optionally a [`Surface`]) creates a backend: a wgpu device limited
//! to GL or Vulkan, or the tiny-skia software rasteriser. Rendering before
//! realizing is a programming error and panics.

mod display;

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

pub use display::{Display, Surface, WindowSource, DISABLE_GPU_ENV};
pub(crate) use display::{PixelRect, SharedWindow};

use crate::config::{Config, DebugFlags};
use crate::error::{RealizeError, RenderError};
use crate::geometry::Rect;
use crate::gpu::{GpuContext, GpuRenderer};
use crate::node::RenderNode;
use crate::region::Region;
use crate::software::SoftwareRenderer;
use crate::texture::Texture;

/// The available backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RendererKind {
    /// wgpu on its OpenGL backend
    Gl,
    /// wgpu on its Vulkan backend
    Vulkan,
    /// CPU rasterisation with tiny-skia
    Software,
}

impl RendererKind {
    /// Probe order for automatic selection.
    pub const AUTO_ORDER: [RendererKind; 3] =
        [RendererKind::Gl, RendererKind::Vulkan, RendererKind::Software];

    pub fn is_gpu(self) -> bool {
        !matches!(self, RendererKind::Software)
    }
}

impl fmt::Display for RendererKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RendererKind::Gl => "gl",
            RendererKind::Vulkan => "vulkan",
            RendererKind::Software => "software",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRenderer(pub String);

impl fmt::Display for UnknownRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown renderer '{}'", self.0)
    }
}

impl std::error::Error for UnknownRenderer {}

impl FromStr for RendererKind {
    type Err = UnknownRenderer;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gl" | "ngl" | "opengl" => Ok(RendererKind::Gl),
            "vulkan" => Ok(RendererKind::Vulkan),
            "software" | "cairo" | "fallback" => Ok(RendererKind::Software),
            _ => Err(UnknownRenderer(s.to_string())),
        }
    }
}

/// Which backend a caller wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendRequest {
    /// Probe [`RendererKind::AUTO_ORDER`] and take the first that realizes
    #[default]
    Auto,
    /// Try this backend first, then the automatic order
    Kind(RendererKind),
}

impl BackendRequest {
    /// Backends to try, in order, without duplicates.
    pub fn candidates(self) -> Vec<RendererKind> {
        match self {
            BackendRequest::Auto => RendererKind::AUTO_ORDER.to_vec(),
            BackendRequest::Kind(kind) => std::iter::once(kind)
                .chain(RendererKind::AUTO_ORDER.into_iter().filter(|k| *k != kind))
                .collect(),
        }
    }
}

/// A realized backend.
pub(crate) trait RendererBackend: Send {
    fn kind(&self) -> RendererKind;

    /// Render the part of `node` inside `viewport` into a new texture the
    /// size of the viewport.
    fn render_texture(&mut self, node: &RenderNode, viewport: &Rect) -> Result<Texture, RenderError>;

    /// Render `node` onto `surface`, touching at least the pixels in
    /// `region` (everything when `None`).
    fn render_to_surface(
        &mut self,
        node: &RenderNode,
        surface: &Surface,
        region: Option<&Region>,
    ) -> Result<(), RenderError>;
}

/// Pixel size of a viewport, rounded up.
pub(crate) fn viewport_size(viewport: &Rect) -> Result<(u32, u32), RenderError> {
    let width = viewport.width.ceil();
    let height = viewport.height.ceil();
    if !(width >= 1.0 && height >= 1.0 && width <= u32::MAX as f32 && height <= u32::MAX as f32) {
        return Err(RenderError::InvalidViewport(viewport.width, viewport.height));
    }
    Ok((width as u32, height as u32))
}

fn create_backend(
    kind: RendererKind,
    display: &Display,
    config: &Config,
    surface: Option<&Surface>,
) -> Result<Box<dyn RendererBackend>, RealizeError> {
    match kind {
        RendererKind::Software => {
            if surface.is_some_and(Surface::is_window) {
                return Err(RealizeError::UnsupportedSurface(kind));
            }
            Ok(Box::new(SoftwareRenderer::new()))
        }
        RendererKind::Gl | RendererKind::Vulkan => {
            if !display.supports_gpu() {
                return Err(RealizeError::BackendDisabled(kind, display.name().to_string()));
            }
            let context = GpuContext::new(kind, config.power_preference)?;
            Ok(Box::new(GpuRenderer::new(context, config.debug, surface)?))
        }
    }
}

/// Turns node trees into pixels with one backend.
pub struct Renderer {
    kind: RendererKind,
    config: Config,
    backend: Option<Box<dyn RendererBackend>>,
    surface: Option<Surface>,
    previous: Option<RenderNode>,
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("kind", &self.kind)
            .field("realized", &self.is_realized())
            .field("surface", &self.surface)
            .finish()
    }
}

impl Renderer {
    /// An unrealized renderer for `kind`, configured from the environment.
    pub fn new(kind: RendererKind) -> Self {
        Self::with_config(kind, Config::from_env())
    }

    pub fn with_config(kind: RendererKind, config: Config) -> Self {
        Self {
            kind,
            config,
            backend: None,
            surface: None,
            previous: None,
        }
    }

    /// Probe backends for `display` in the order `config` asks for and
    /// return the first that realizes. The software renderer always
    /// realizes without a surface, so this cannot fail.
    pub fn for_display(display: &Display, config: &Config) -> Self {
        match Self::probe(display, None, config) {
            Ok(renderer) => renderer,
            Err(e) => {
                // Only reachable if every candidate, software included, failed
                log::error!("No renderer could be realized: {}", e);
                Self::with_config(RendererKind::Software, config.clone())
            }
        }
    }

    /// Like [`Renderer::for_display`], bound to `surface`. Fails with the
    /// last backend's error when none can draw to it.
    pub fn for_surface(
        display: &Display,
        surface: &Surface,
        config: &Config,
    ) -> Result<Self, RealizeError> {
        Self::probe(display, Some(surface), config)
    }

    fn probe(
        display: &Display,
        surface: Option<&Surface>,
        config: &Config,
    ) -> Result<Self, RealizeError> {
        let verbose = config.debug.contains(DebugFlags::RENDERER);
        let mut last_error = None;
        for kind in config.backend.candidates() {
            let mut renderer = Self::with_config(kind, config.clone());
            if verbose {
                log::info!("Trying {} renderer on display {}", kind, display.name());
            }
            let result = match surface {
                Some(surface) => renderer.realize(display, surface),
                None => renderer.realize_for_display(display),
            };
            match result {
                Ok(()) => {
                    log::info!("Using {} renderer", kind);
                    return Ok(renderer);
                }
                Err(e) => {
                    if verbose {
                        log::info!("Failed to realize {} renderer: {}", kind, e);
                    } else {
                        log::debug!("Failed to realize {} renderer: {}", kind, e);
                    }
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or(RealizeError::NoAdapter(RendererKind::Software)))
    }

    pub fn kind(&self) -> RendererKind {
        self.kind
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_realized(&self) -> bool {
        self.backend.is_some()
    }

    /// The surface this renderer was realized with, if any.
    pub fn surface(&self) -> Option<&Surface> {
        self.surface.as_ref()
    }

    /// Acquire backend resources for `display` without a surface. On
    /// failure the renderer stays unrealized.
    pub fn realize_for_display(&mut self, display: &Display) -> Result<(), RealizeError> {
        self.realize_inner(display, None)
    }

    /// Acquire backend resources for drawing to `surface`.
    pub fn realize(&mut self, display: &Display, surface: &Surface) -> Result<(), RealizeError> {
        self.realize_inner(display, Some(surface))
    }

    fn realize_inner(
        &mut self,
        display: &Display,
        surface: Option<&Surface>,
    ) -> Result<(), RealizeError> {
        assert!(!self.is_realized(), "renderer is already realized");
        let backend = create_backend(self.kind, display, &self.config, surface)?;
        log::debug!("Realized {} renderer for display {}", backend.kind(), display.name());
        self.backend = Some(backend);
        self.surface = surface.cloned();
        Ok(())
    }

    /// Release backend resources. Safe to call more than once.
    pub fn unrealize(&mut self) {
        if self.backend.take().is_some() {
            log::debug!("Unrealized {} renderer", self.kind);
        }
        self.surface = None;
        self.previous = None;
    }

    fn backend(&mut self) -> &mut (dyn RendererBackend + 'static) {
        match self.backend.as_deref_mut() {
            Some(backend) => backend,
            None => panic!("{} renderer used before it was realized", self.kind),
        }
    }

    /// Render `node` into a new texture covering `viewport`, or the node's
    /// bounds when `None`.
    ///
    /// # Panics
    ///
    /// If the renderer is not realized.
    pub fn render_texture(
        &mut self,
        node: &RenderNode,
        viewport: Option<Rect>,
    ) -> Result<Texture, RenderError> {
        let viewport = viewport.unwrap_or_else(|| node.bounds().to_rect());
        let start = Instant::now();
        let texture = self.backend().render_texture(node, &viewport)?;
        log::debug!(
            "{} renderer drew {} nodes into {}x{} in {:?}",
            self.kind,
            node.node_count(),
            texture.width(),
            texture.height(),
            start.elapsed()
        );
        Ok(texture)
    }

    /// Render `node` onto the surface this renderer was realized with,
    /// restricted to `region` when given.
    ///
    /// # Panics
    ///
    /// If the renderer is not realized or was realized without a surface.
    pub fn render_to_surface(
        &mut self,
        node: &RenderNode,
        region: Option<&Region>,
    ) -> Result<(), RenderError> {
        let surface = match &self.surface {
            Some(surface) => surface.clone(),
            None => panic!("render_to_surface() on a renderer realized without a surface"),
        };

        if self.config.debug.contains(DebugFlags::DIFF) {
            if let Some(previous) = &self.previous {
                let mut damage = Region::new();
                previous.diff(node, &mut damage);
                log::info!(
                    "Damage since last frame: {:?} ({} rects)",
                    damage.extents(),
                    damage.rects().len()
                );
            }
        }

        self.backend().render_to_surface(node, &surface, region)?;
        self.previous = Some(node.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;

    #[test]
    fn test_kind_names() {
        assert_eq!("NGL".parse::<RendererKind>(), Ok(RendererKind::Gl));
        assert_eq!("vulkan".parse::<RendererKind>(), Ok(RendererKind::Vulkan));
        assert_eq!("cairo".parse::<RendererKind>(), Ok(RendererKind::Software));
        assert!("metal".parse::<RendererKind>().is_err());
        assert_eq!(RendererKind::Gl.to_string(), "gl");
    }

    #[test]
    fn test_candidates() {
        assert_eq!(BackendRequest::Auto.candidates(), RendererKind::AUTO_ORDER.to_vec());
        assert_eq!(
            BackendRequest::Kind(RendererKind::Vulkan).candidates(),
            vec![RendererKind::Vulkan, RendererKind::Gl, RendererKind::Software]
        );
    }

    #[test]
    fn test_viewport_size() {
        assert_eq!(viewport_size(&Rect::new(0.0, 0.0, 9.5, 3.0)).unwrap(), (10, 3));
        assert!(viewport_size(&Rect::new(0.0, 0.0, 0.0, 3.0)).is_err());
        assert!(viewport_size(&Rect::new(0.0, 0.0, f32::NAN, 3.0)).is_err());
    }

    #[test]
    fn test_unrealize_is_idempotent() {
        let mut renderer = Renderer::with_config(RendererKind::Software, Config::new());
        renderer
            .realize_for_display(&Display::software_only("test"))
            .unwrap();
        assert!(renderer.is_realized());
        renderer.unrealize();
        renderer.unrealize();
        assert!(!renderer.is_realized());
    }

    #[test]
    fn test_gpu_disabled_display_fails_cleanly() {
        let mut renderer = Renderer::with_config(RendererKind::Gl, Config::new());
        let err = renderer
            .realize_for_display(&Display::software_only("headless"))
            .unwrap_err();
        assert!(matches!(err, RealizeError::BackendDisabled(RendererKind::Gl, _)));
        assert!(!renderer.is_realized());
    }

    #[test]
    #[should_panic(expected = "before it was realized")]
    fn test_render_unrealized_panics() {
        let mut renderer = Renderer::with_config(RendererKind::Software, Config::new());
        let node = RenderNode::color(Rect::new(0.0, 0.0, 1.0, 1.0), Color::RED);
        let _ = renderer.render_texture(&node, None);
    }

    #[test]
    fn test_for_surface_falls_back_to_software() {
        let display = Display::software_only("test");
        let surface = Surface::offscreen(4, 4).unwrap();
        let renderer = Renderer::for_surface(&display, &surface, &Config::new()).unwrap();
        assert_eq!(renderer.kind(), RendererKind::Software);
        assert!(renderer.surface().is_some_and(|s| s.ptr_eq(&surface)));
    }
}
