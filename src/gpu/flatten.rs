//! Flattening a node tree into a list of quads for the GPU backend.
//!
//! Colors, textures, containers, 2D transforms, axis-aligned clips and
//! opacity over a single primitive are drawn natively. Every other subtree
//! is rasterised on the CPU at its device size and drawn as a texture.

use crate::config::DebugFlags;
use crate::error::RenderError;
use crate::geometry::Rect;
use crate::node::{NodeKind, RenderNode};
use crate::software::rasterize;
use crate::texture::{MemoryFormat, Texture};
use crate::transform::{Transform, TransformCategory};

use super::pipeline::{QuadInstance, NO_CLIP};

/// What a quad samples from.
pub(crate) enum QuadSource {
    /// The shared 1x1 white texture; the quad color is the output
    Solid,
    Texture(Texture),
}

impl QuadSource {
    pub fn same_as(&self, other: &QuadSource) -> bool {
        match (self, other) {
            (QuadSource::Solid, QuadSource::Solid) => true,
            (QuadSource::Texture(a), QuadSource::Texture(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

pub(crate) struct DrawQuad {
    pub instance: QuadInstance,
    pub source: QuadSource,
}

#[derive(Clone, Copy)]
struct Frame {
    world: Transform,
    /// Device-space clip
    clip: Option<Rect>,
    opacity: f32,
}

struct Flattener {
    target: Rect,
    debug: DebugFlags,
    quads: Vec<DrawQuad>,
}

/// Flatten `node` for a `width` x `height` target whose top-left sits at
/// (`x`, `y`) in node coordinates.
pub(crate) fn flatten(
    node: &RenderNode,
    x: f32,
    y: f32,
    width: u32,
    height: u32,
    debug: DebugFlags,
) -> Result<Vec<DrawQuad>, RenderError> {
    let mut flattener = Flattener {
        target: Rect::new(0.0, 0.0, width as f32, height as f32),
        debug,
        quads: Vec::new(),
    };
    let frame = Frame {
        world: Transform::translate(-x, -y),
        clip: None,
        opacity: 1.0,
    };
    flattener.visit(node, frame)?;
    Ok(flattener.quads)
}

fn clip_array(clip: Option<Rect>) -> [f32; 4] {
    match clip {
        Some(r) => [r.x, r.y, r.right(), r.bottom()],
        None => NO_CLIP,
    }
}

impl Flattener {
    fn visit(&mut self, node: &RenderNode, frame: Frame) -> Result<(), RenderError> {
        if node.bounds().is_empty() {
            return Ok(());
        }
        match node.kind() {
            NodeKind::Color { rect, color } => {
                if !color.is_clear() {
                    let [r, g, b, a] = color.to_premultiplied();
                    let o = frame.opacity;
                    self.push_quad(rect, [r * o, g * o, b * o, a * o], QuadSource::Solid, &frame);
                }
            }
            NodeKind::Texture { rect, texture } => {
                let o = frame.opacity;
                self.push_quad(rect, [o; 4], QuadSource::Texture(texture.clone()), &frame);
            }
            NodeKind::Container { children } => {
                for child in children {
                    self.visit(child, frame)?;
                }
            }
            NodeKind::Debug { child, .. } => self.visit(child, frame)?,
            NodeKind::Transform { child, transform } => match transform.to_2d() {
                Some((xx, yx, xy, yy, _, _)) => {
                    if xx * yy - yx * xy != 0.0 {
                        let inner = Frame {
                            world: frame.world.then(transform),
                            ..frame
                        };
                        self.visit(child, inner)?;
                    }
                }
                None => self.fallback(node, &frame)?,
            },
            NodeKind::Clip { child, clip } => self.visit_clip(node, child, clip, &frame)?,
            NodeKind::RoundedClip { child, clip } if clip.is_rectilinear() => {
                self.visit_clip(node, child, &clip.bounds, &frame)?
            }
            NodeKind::Opacity { child, opacity } => {
                let leaf = matches!(
                    child.kind(),
                    NodeKind::Color { .. } | NodeKind::Texture { .. }
                );
                if *opacity <= 0.0 {
                    return Ok(());
                }
                if leaf || *opacity >= 1.0 {
                    let inner = Frame {
                        opacity: frame.opacity * opacity,
                        ..frame
                    };
                    self.visit(child, inner)?;
                } else {
                    self.fallback(node, &frame)?;
                }
            }
            _ => self.fallback(node, &frame)?,
        }
        Ok(())
    }

    fn visit_clip(
        &mut self,
        node: &RenderNode,
        child: &RenderNode,
        clip: &Rect,
        frame: &Frame,
    ) -> Result<(), RenderError> {
        if clip.contains_rect(&child.bounds().to_rect()) {
            return self.visit(child, *frame);
        }
        if frame.world.category() < TransformCategory::Affine2d {
            return self.fallback(node, frame);
        }
        let device = frame.world.transform_rect(clip);
        let device = match frame.clip {
            Some(outer) => device.intersection(&outer),
            None => Some(device),
        };
        match device {
            Some(device) => {
                let inner = Frame {
                    clip: Some(device),
                    ..*frame
                };
                self.visit(child, inner)
            }
            None => Ok(()),
        }
    }

    fn push_quad(&mut self, rect: &Rect, color: [f32; 4], source: QuadSource, frame: &Frame) {
        let Some(matrix) = frame.world.to_2d() else {
            return;
        };
        let instance = QuadInstance {
            rect: [rect.x, rect.y, rect.width, rect.height],
            color,
            clip_rect: clip_array(frame.clip),
            ..Default::default()
        }
        .with_transform(matrix);
        self.quads.push(DrawQuad { instance, source });
    }

    /// Rasterise `node` on the CPU and draw the result unscaled.
    fn fallback(&mut self, node: &RenderNode, frame: &Frame) -> Result<(), RenderError> {
        let device = frame.world.transform_bounds(&node.bounds()).to_rect();
        let visible = frame
            .clip
            .and_then(|clip| clip.intersection(&self.target))
            .unwrap_or(self.target);
        let Some(area) = device.intersection(&visible).map(|r| r.round_out()) else {
            return Ok(());
        };
        let (width, height) = (area.width as u32, area.height as u32);
        if width == 0 || height == 0 {
            return Ok(());
        }

        if self.debug.contains(DebugFlags::FALLBACK) {
            log::info!(
                "Software fallback for {} node ({}x{} at {},{})",
                node.kind().name(),
                width,
                height,
                area.x,
                area.y
            );
        } else {
            log::debug!("Software fallback for {} node", node.kind().name());
        }

        let pixmap = rasterize(node, area.x, area.y, width, height, &frame.world)?;
        let texture = Texture::from_memory(
            width,
            height,
            MemoryFormat::R8G8B8A8Premultiplied,
            pixmap.take(),
            width as usize * 4,
        )?;
        let instance = QuadInstance {
            rect: [area.x, area.y, area.width, area.height],
            color: [frame.opacity; 4],
            clip_rect: clip_array(frame.clip),
            ..Default::default()
        };
        self.quads.push(DrawQuad {
            instance,
            source: QuadSource::Texture(texture),
        });
        Ok(())
    }
}
