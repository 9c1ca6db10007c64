//! The CPU renderer.
//!
//! Always available, and the reference for exact output: tests and the
//! comparison tool render through it.

mod blur;
mod canvas;

pub(crate) use canvas::rasterize;

use crate::error::RenderError;
use crate::geometry::Rect;
use crate::node::RenderNode;
use crate::region::Region;
use crate::renderer::{viewport_size, RendererBackend, RendererKind, Surface};
use crate::texture::{MemoryFormat, Texture};
use crate::transform::Transform;

pub(crate) struct SoftwareRenderer;

impl SoftwareRenderer {
    pub fn new() -> Self {
        SoftwareRenderer
    }
}

impl RendererBackend for SoftwareRenderer {
    fn kind(&self) -> RendererKind {
        RendererKind::Software
    }

    fn render_texture(&mut self, node: &RenderNode, viewport: &Rect) -> Result<Texture, RenderError> {
        let (width, height) = viewport_size(viewport)?;
        let pixmap = rasterize(node, viewport.x, viewport.y, width, height, &Transform::IDENTITY)?;
        Ok(Texture::from_memory(
            width,
            height,
            MemoryFormat::R8G8B8A8Premultiplied,
            pixmap.take(),
            width as usize * 4,
        )?)
    }

    fn render_to_surface(
        &mut self,
        node: &RenderNode,
        surface: &Surface,
        region: Option<&Region>,
    ) -> Result<(), RenderError> {
        if surface.is_window() {
            return Err(RenderError::Surface(
                "the software renderer only draws to offscreen surfaces".to_string(),
            ));
        }
        for rect in surface.damage_rects(region) {
            let pixmap = rasterize(
                node,
                rect.x as f32,
                rect.y as f32,
                rect.width,
                rect.height,
                &Transform::IDENTITY,
            )?;
            surface.write_pixels(rect, pixmap.data(), rect.width as usize * 4)?;
        }
        Ok(())
    }
}
