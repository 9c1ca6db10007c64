//! Rasterising node trees with tiny-skia.
//!
//! Effects that need the composited result of a subtree (opacity, blur,
//! color matrix, fills, strokes, cross-fades) draw it into a transparent
//! layer the size of the target and composite that layer back.

use std::rc::Rc;

use tiny_skia::{
    BlendMode, FilterQuality, GradientStop, IntSize, LinearGradient, Mask, Paint, Pattern, Pixmap,
    PixmapPaint, SpreadMode,
};

use super::blur::blur_rgba;
use crate::color::Color;
use crate::error::RenderError;
use crate::geometry::{BoundingBox, Point, Rect, RoundedRect, Size};
use crate::node::{blur_padding, ColorStop, NodeKind, RenderNode};
use crate::path::PathBuilder;
use crate::texture::{MemoryFormat, Texture, TextureDownloader};
use crate::transform::{Transform, TransformCategory};

#[derive(Clone)]
struct State {
    transform: Transform,
    clip: Option<Rc<Mask>>,
}

impl State {
    fn clip(&self) -> Option<&Mask> {
        self.clip.as_deref()
    }

    fn unclipped(&self) -> State {
        State {
            transform: self.transform,
            clip: None,
        }
    }

    fn device_scale(&self) -> f32 {
        let (sx, sy) = self.transform.scale_factors();
        (sx + sy) / 2.0
    }
}

/// Draw `node` into a new `width` x `height` pixmap. `transform` maps node
/// coordinates to device pixels; the pixmap's top-left is at device
/// position (`x`, `y`).
pub(crate) fn rasterize(
    node: &RenderNode,
    x: f32,
    y: f32,
    width: u32,
    height: u32,
    transform: &Transform,
) -> Result<Pixmap, RenderError> {
    let mut pixmap =
        Pixmap::new(width, height).ok_or(RenderError::InvalidViewport(width as f32, height as f32))?;
    let state = State {
        transform: Transform::translate(-x, -y).then(transform),
        clip: None,
    };
    draw(&mut pixmap, node, &state)?;
    Ok(pixmap)
}

fn skia_rect(rect: &Rect) -> Option<tiny_skia::Rect> {
    tiny_skia::Rect::from_xywh(rect.x, rect.y, rect.width, rect.height)
}

fn solid_paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color.to_skia());
    paint.anti_alias = true;
    paint
}

fn new_layer(target: &Pixmap) -> Result<Pixmap, RenderError> {
    Pixmap::new(target.width(), target.height()).ok_or(RenderError::OutOfMemory)
}

fn composite(
    target: &mut Pixmap,
    layer: &Pixmap,
    offset: i32,
    opacity: f32,
    blend_mode: BlendMode,
    clip: Option<&Mask>,
) {
    let paint = PixmapPaint {
        opacity,
        blend_mode,
        quality: FilterQuality::Nearest,
    };
    target.draw_pixmap(
        offset,
        offset,
        layer.as_ref(),
        &paint,
        tiny_skia::Transform::identity(),
        clip,
    );
}

/// The current clip narrowed to `path`, in the target's pixel space.
fn clip_to_path(
    target: &Pixmap,
    state: &State,
    path: &tiny_skia::Path,
    fill_rule: tiny_skia::FillRule,
) -> Result<Mask, RenderError> {
    let transform = state.transform.to_skia();
    match state.clip() {
        Some(mask) => {
            let mut mask = mask.clone();
            mask.intersect_path(path, fill_rule, true, transform);
            Ok(mask)
        }
        None => {
            let mut mask =
                Mask::new(target.width(), target.height()).ok_or(RenderError::OutOfMemory)?;
            mask.fill_path(path, fill_rule, true, transform);
            Ok(mask)
        }
    }
}

fn draw(target: &mut Pixmap, node: &RenderNode, state: &State) -> Result<(), RenderError> {
    match node.kind() {
        NodeKind::Color { rect, color } => {
            if !color.is_clear() {
                if let Some(rect) = skia_rect(rect) {
                    target.fill_rect(rect, &solid_paint(*color), state.transform.to_skia(), state.clip());
                }
            }
        }
        NodeKind::LinearGradient {
            rect,
            start,
            end,
            stops,
        } => draw_linear_gradient(target, rect, *start, *end, stops, state),
        NodeKind::Border {
            outline,
            widths,
            colors,
        } => draw_border(target, outline, widths, colors, state)?,
        NodeKind::Texture { rect, texture } => draw_texture(target, rect, texture, state)?,
        NodeKind::OutsetShadow {
            outline,
            color,
            dx,
            dy,
            spread,
            blur_radius,
        } => draw_outset_shadow(
            target,
            node.bounds(),
            outline,
            *color,
            (*dx, *dy),
            *spread,
            *blur_radius,
            state,
        )?,
        NodeKind::Container { children } => {
            for child in children {
                draw(target, child, state)?;
            }
        }
        NodeKind::Transform { child, transform } => {
            if transform.category() < TransformCategory::TwoD {
                // Projective transforms are not supported here; mark the area
                if let Some(rect) = skia_rect(&node.bounds().to_rect()) {
                    target.fill_rect(
                        rect,
                        &solid_paint(Color::HOT_PINK),
                        state.transform.to_skia(),
                        state.clip(),
                    );
                }
                return Ok(());
            }
            if let Some((xx, yx, xy, yy, _, _)) = transform.to_2d() {
                if xx * yy - yx * xy == 0.0 {
                    return Ok(());
                }
            }
            let inner = State {
                transform: state.transform.then(transform),
                clip: state.clip.clone(),
            };
            draw(target, child, &inner)?;
        }
        NodeKind::Opacity { child, opacity } => {
            if *opacity >= 1.0 {
                draw(target, child, state)?;
            } else if *opacity > 0.0 {
                let mut layer = new_layer(target)?;
                draw(&mut layer, child, &state.unclipped())?;
                composite(target, &layer, 0, *opacity, BlendMode::SourceOver, state.clip());
            }
        }
        NodeKind::ColorMatrix {
            child,
            matrix,
            offset,
        } => {
            let mut layer = new_layer(target)?;
            draw(&mut layer, child, &state.unclipped())?;
            let area = state.transform.transform_bounds(&node.bounds()).to_rect();
            apply_color_matrix(&mut layer, &area, matrix, offset);
            composite(target, &layer, 0, 1.0, BlendMode::SourceOver, state.clip());
        }
        NodeKind::Clip { child, clip } => {
            let axis_aligned = state.transform.category() >= TransformCategory::Affine2d;
            if axis_aligned && BoundingBox::from_rect(*clip).contains_box(&child.bounds()) {
                return draw(target, child, state);
            }
            let Some(rect) = skia_rect(clip) else {
                return Ok(());
            };
            let path = tiny_skia::PathBuilder::from_rect(rect);
            let mask = clip_to_path(target, state, &path, tiny_skia::FillRule::Winding)?;
            let inner = State {
                transform: state.transform,
                clip: Some(Rc::new(mask)),
            };
            draw(target, child, &inner)?;
        }
        NodeKind::RoundedClip { child, clip } => {
            let mut pb = PathBuilder::new();
            pb.add_rounded_rect(clip);
            let Some(path) = pb.build().to_skia() else {
                return Ok(());
            };
            let mask = clip_to_path(target, state, &path, tiny_skia::FillRule::Winding)?;
            let inner = State {
                transform: state.transform,
                clip: Some(Rc::new(mask)),
            };
            draw(target, child, &inner)?;
        }
        NodeKind::Blur { child, radius } => {
            if *radius <= 0.0 {
                return draw(target, child, state);
            }
            let sigma = radius / 2.0 * state.device_scale();
            let margin = blur_padding(sigma) as u32;
            let width = target.width() + margin * 2;
            let height = target.height() + margin * 2;
            let mut layer = Pixmap::new(width, height).ok_or(RenderError::OutOfMemory)?;
            let shifted = State {
                transform: Transform::translate(margin as f32, margin as f32).then(&state.transform),
                clip: None,
            };
            draw(&mut layer, child, &shifted)?;
            blur_rgba(layer.data_mut(), width as usize, height as usize, sigma);
            composite(
                target,
                &layer,
                -(margin as i32),
                1.0,
                BlendMode::SourceOver,
                state.clip(),
            );
        }
        NodeKind::Fill {
            child,
            path,
            fill_rule,
        } => {
            let Some(path) = path.to_skia() else {
                return Ok(());
            };
            let mut layer = new_layer(target)?;
            draw(&mut layer, child, &state.unclipped())?;
            let mask = clip_to_path(target, state, &path, fill_rule.to_skia())?;
            composite(target, &layer, 0, 1.0, BlendMode::SourceOver, Some(&mask));
        }
        NodeKind::Stroke {
            child,
            path,
            stroke,
        } => {
            let Some(path) = path.to_skia() else {
                return Ok(());
            };
            let res_scale = tiny_skia::PathStroker::compute_resolution_scale(&state.transform.to_skia());
            let Some(outline) = path.stroke(&stroke.to_skia(), res_scale) else {
                return Ok(());
            };
            let mut layer = new_layer(target)?;
            draw(&mut layer, child, &state.unclipped())?;
            let mask = clip_to_path(target, state, &outline, tiny_skia::FillRule::Winding)?;
            composite(target, &layer, 0, 1.0, BlendMode::SourceOver, Some(&mask));
        }
        NodeKind::CrossFade {
            start,
            end,
            progress,
        } => {
            let unclipped = state.unclipped();
            let mut from = new_layer(target)?;
            draw(&mut from, start, &unclipped)?;
            let mut to = new_layer(target)?;
            draw(&mut to, end, &unclipped)?;
            let mut mixed = new_layer(target)?;
            composite(&mut mixed, &from, 0, 1.0 - progress, BlendMode::SourceOver, None);
            composite(&mut mixed, &to, 0, *progress, BlendMode::Plus, None);
            composite(target, &mixed, 0, 1.0, BlendMode::SourceOver, state.clip());
        }
        NodeKind::Debug { child, .. } => draw(target, child, state)?,
    }
    Ok(())
}

fn draw_linear_gradient(
    target: &mut Pixmap,
    rect: &Rect,
    start: Point,
    end: Point,
    stops: &[ColorStop],
    state: &State,
) {
    let Some(skia) = skia_rect(rect) else {
        return;
    };
    let skia_stops = stops
        .iter()
        .map(|s| GradientStop::new(s.offset, s.color.to_skia()))
        .collect();
    let shader = LinearGradient::new(
        tiny_skia::Point::from_xy(start.x, start.y),
        tiny_skia::Point::from_xy(end.x, end.y),
        skia_stops,
        SpreadMode::Pad,
        tiny_skia::Transform::identity(),
    );
    let paint = match shader {
        Some(shader) => Paint {
            shader,
            anti_alias: true,
            ..Default::default()
        },
        // Degenerate gradient line: the last stop wins
        None => match stops.last() {
            Some(stop) => solid_paint(stop.color),
            None => return,
        },
    };
    target.fill_rect(skia, &paint, state.transform.to_skia(), state.clip());
}

fn draw_border(
    target: &mut Pixmap,
    outline: &RoundedRect,
    widths: &[f32; 4],
    colors: &[Color; 4],
    state: &State,
) -> Result<(), RenderError> {
    let [top, right, bottom, left] = *widths;
    let inner = outline.shrink(top, right, bottom, left);

    let mut pb = PathBuilder::new();
    pb.add_rounded_rect(outline);
    pb.add_rounded_rect(&inner);
    let Some(ring) = pb.build().to_skia() else {
        return Ok(());
    };
    let transform = state.transform.to_skia();

    if colors.iter().all(|c| c == &colors[0]) {
        if !colors[0].is_clear() {
            target.fill_path(
                &ring,
                &solid_paint(colors[0]),
                tiny_skia::FillRule::EvenOdd,
                transform,
                state.clip(),
            );
        }
        return Ok(());
    }

    // One trapezoid per side, split along the corner diagonals
    let o = outline.bounds;
    let i = inner.bounds;
    let sides = [
        [(o.x, o.y), (o.right(), o.y), (i.right(), i.y), (i.x, i.y)],
        [(o.right(), o.y), (o.right(), o.bottom()), (i.right(), i.bottom()), (i.right(), i.y)],
        [(o.right(), o.bottom()), (o.x, o.bottom()), (i.x, i.bottom()), (i.right(), i.bottom())],
        [(o.x, o.bottom()), (o.x, o.y), (i.x, i.y), (i.x, i.bottom())],
    ];
    for (side, color) in sides.iter().zip(colors) {
        if color.is_clear() {
            continue;
        }
        let mut pb = tiny_skia::PathBuilder::new();
        pb.move_to(side[0].0, side[0].1);
        for &(x, y) in &side[1..] {
            pb.line_to(x, y);
        }
        pb.close();
        let Some(trapezoid) = pb.finish() else {
            continue;
        };
        let mask = clip_to_path(target, state, &trapezoid, tiny_skia::FillRule::Winding)?;
        target.fill_path(
            &ring,
            &solid_paint(*color),
            tiny_skia::FillRule::EvenOdd,
            transform,
            Some(&mask),
        );
    }
    Ok(())
}

fn texture_pixmap(texture: &Texture) -> Result<Pixmap, RenderError> {
    let (bytes, _) = TextureDownloader::new(texture)
        .format(MemoryFormat::R8G8B8A8Premultiplied)
        .download_bytes()?;
    IntSize::from_wh(texture.width(), texture.height())
        .and_then(|size| Pixmap::from_vec(bytes, size))
        .ok_or(RenderError::OutOfMemory)
}

fn draw_texture(
    target: &mut Pixmap,
    rect: &Rect,
    texture: &Texture,
    state: &State,
) -> Result<(), RenderError> {
    let Some(skia) = skia_rect(rect) else {
        return Ok(());
    };
    let pixels = texture_pixmap(texture)?;
    let sx = rect.width / texture.width() as f32;
    let sy = rect.height / texture.height() as f32;
    let quality = if sx == 1.0 && sy == 1.0 {
        FilterQuality::Nearest
    } else {
        FilterQuality::Bilinear
    };
    let paint = Paint {
        shader: Pattern::new(
            pixels.as_ref(),
            SpreadMode::Pad,
            quality,
            1.0,
            tiny_skia::Transform::from_row(sx, 0.0, 0.0, sy, rect.x, rect.y),
        ),
        anti_alias: true,
        ..Default::default()
    };
    target.fill_rect(skia, &paint, state.transform.to_skia(), state.clip());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn draw_outset_shadow(
    target: &mut Pixmap,
    bounds: BoundingBox,
    outline: &RoundedRect,
    color: Color,
    (dx, dy): (f32, f32),
    spread: f32,
    blur_radius: f32,
    state: &State,
) -> Result<(), RenderError> {
    if color.is_clear() {
        return Ok(());
    }
    let grow = |c: Size| {
        if c.width > 0.0 && c.height > 0.0 {
            Size::new((c.width + spread).max(0.0), (c.height + spread).max(0.0))
        } else {
            c
        }
    };
    let shadow = RoundedRect::new(
        outline.bounds.offset(dx, dy).inset(-spread),
        outline.corners.map(grow),
    );

    let mut pb = PathBuilder::new();
    pb.add_rounded_rect(&shadow);
    let Some(shadow_path) = pb.build().to_skia() else {
        return Ok(());
    };

    let sigma = blur_radius / 2.0 * state.device_scale();
    let margin = blur_padding(sigma) as u32;
    let width = target.width() + margin * 2;
    let height = target.height() + margin * 2;
    let mut layer = Pixmap::new(width, height).ok_or(RenderError::OutOfMemory)?;
    let shifted = Transform::translate(margin as f32, margin as f32).then(&state.transform);
    layer.fill_path(
        &shadow_path,
        &solid_paint(color),
        tiny_skia::FillRule::Winding,
        shifted.to_skia(),
        None,
    );
    if sigma > 0.0 {
        blur_rgba(layer.data_mut(), width as usize, height as usize, sigma);
    }

    // The shadow only shows outside the outline
    let mut pb = PathBuilder::new();
    pb.add_rect(bounds.expand(1.0).to_rect());
    pb.add_rounded_rect(outline);
    let Some(outside) = pb.build().to_skia() else {
        return Ok(());
    };
    let mask = clip_to_path(target, state, &outside, tiny_skia::FillRule::EvenOdd)?;
    composite(
        target,
        &layer,
        -(margin as i32),
        1.0,
        BlendMode::SourceOver,
        Some(&mask),
    );
    Ok(())
}

/// Apply the matrix to every pixel of `layer` inside `area`.
fn apply_color_matrix(layer: &mut Pixmap, area: &Rect, matrix: &[f32; 16], offset: &[f32; 4]) {
    let width = layer.width() as i64;
    let height = layer.height() as i64;
    let area = area.round_out();
    let x0 = (area.x as i64).clamp(0, width) as usize;
    let y0 = (area.y as i64).clamp(0, height) as usize;
    let x1 = (area.right() as i64).clamp(0, width) as usize;
    let y1 = (area.bottom() as i64).clamp(0, height) as usize;
    let stride = width as usize * 4;
    let data = layer.data_mut();

    for y in y0..y1 {
        for x in x0..x1 {
            let px = &mut data[y * stride + x * 4..y * stride + x * 4 + 4];
            let a = px[3] as f32 / 255.0;
            let input = if a > 0.0 {
                [
                    px[0] as f32 / 255.0 / a,
                    px[1] as f32 / 255.0 / a,
                    px[2] as f32 / 255.0 / a,
                    a,
                ]
            } else {
                [0.0; 4]
            };
            let mut out = [0.0f32; 4];
            for (i, value) in out.iter_mut().enumerate() {
                let row = &matrix[i * 4..i * 4 + 4];
                *value = (row[0] * input[0]
                    + row[1] * input[1]
                    + row[2] * input[2]
                    + row[3] * input[3]
                    + offset[i])
                    .clamp(0.0, 1.0);
            }
            let alpha = out[3];
            px[0] = (out[0] * alpha * 255.0).round() as u8;
            px[1] = (out[1] * alpha * 255.0).round() as u8;
            px[2] = (out[2] * alpha * 255.0).round() as u8;
            px[3] = (alpha * 255.0).round() as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(pixmap: &Pixmap, x: u32, y: u32) -> [u8; 4] {
        let c = pixmap.pixel(x, y).unwrap();
        [c.red(), c.green(), c.blue(), c.alpha()]
    }

    fn render(node: &RenderNode, width: u32, height: u32) -> Pixmap {
        rasterize(node, 0.0, 0.0, width, height, &Transform::IDENTITY).unwrap()
    }

    #[test]
    fn test_solid_color() {
        let node = RenderNode::color(Rect::new(2.0, 2.0, 4.0, 4.0), Color::RED);
        let pixmap = render(&node, 8, 8);
        assert_eq!(pixel(&pixmap, 3, 3), [255, 0, 0, 255]);
        assert_eq!(pixel(&pixmap, 0, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn test_viewport_offset() {
        let node = RenderNode::color(Rect::new(10.0, 10.0, 4.0, 4.0), Color::BLUE);
        let pixmap = rasterize(&node, 10.0, 10.0, 4, 4, &Transform::IDENTITY).unwrap();
        assert_eq!(pixel(&pixmap, 0, 0), [0, 0, 255, 255]);
        assert_eq!(pixel(&pixmap, 3, 3), [0, 0, 255, 255]);
    }

    #[test]
    fn test_clip() {
        let node = RenderNode::clip(
            RenderNode::color(Rect::new(0.0, 0.0, 8.0, 8.0), Color::GREEN),
            Rect::new(0.0, 0.0, 4.0, 8.0),
        );
        let pixmap = render(&node, 8, 8);
        assert_eq!(pixel(&pixmap, 1, 1), [0, 255, 0, 255]);
        assert_eq!(pixel(&pixmap, 6, 1), [0, 0, 0, 0]);
    }

    #[test]
    fn test_opacity_layer() {
        let node = RenderNode::opacity(
            RenderNode::color(Rect::new(0.0, 0.0, 4.0, 4.0), Color::WHITE),
            0.5,
        );
        let pixmap = render(&node, 4, 4);
        let [r, _, _, a] = pixel(&pixmap, 1, 1);
        assert!((127..=128).contains(&a));
        assert_eq!(r, a);
    }

    #[test]
    fn test_3d_transform_draws_pink() {
        let child = RenderNode::color(Rect::new(0.0, 0.0, 4.0, 4.0), Color::RED);
        let node = RenderNode::transform(child, Transform::rotate_3d(0.5, [0.0, 1.0, 0.0]));
        let pixmap = render(&node, 8, 8);
        assert_eq!(pixel(&pixmap, 1, 1), [255, 105, 180, 255]);
    }

    #[test]
    fn test_singular_transform_draws_nothing() {
        let child = RenderNode::color(Rect::new(0.0, 0.0, 4.0, 4.0), Color::RED);
        let node = RenderNode::transform(child, Transform::scale_xy(0.0, 1.0));
        let pixmap = render(&node, 8, 8);
        assert!(pixmap.data().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_color_matrix_inverts_red() {
        let mut matrix = [0.0; 16];
        matrix[0] = -1.0;
        matrix[5] = 1.0;
        matrix[10] = 1.0;
        matrix[15] = 1.0;
        let node = RenderNode::color_matrix(
            RenderNode::color(Rect::new(0.0, 0.0, 2.0, 2.0), Color::RED),
            matrix,
            [1.0, 0.0, 0.0, 0.0],
        );
        let pixmap = render(&node, 2, 2);
        assert_eq!(pixel(&pixmap, 0, 0), [0, 0, 0, 255]);
    }

    #[test]
    fn test_blur_softens_edge() {
        let node = RenderNode::blur(
            RenderNode::color(Rect::new(8.0, 8.0, 16.0, 16.0), Color::BLACK),
            4.0,
        );
        let pixmap = render(&node, 32, 32);
        assert_eq!(pixel(&pixmap, 16, 16)[3], 255);
        let edge = pixel(&pixmap, 8, 16)[3];
        assert!(edge > 0 && edge < 255);
    }
}
