//! Binary node files.
//!
//! A file is the magic `RNDN`, a little-endian `u32` format version and a
//! bincode payload. The payload lists textures and nodes in post-order:
//! children always refer to nodes earlier in the list, the root is the last
//! node. Shared subtrees and textures are written once.
//!
//! Decoding checks every value before any node is built, so a malformed
//! file produces a [`DecodeError`] and never a partial tree.

use std::collections::HashMap;
use std::path::Path as FsPath;

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::error::{DecodeError, Error, Result};
use crate::geometry::{Point, Rect, RoundedRect};
use crate::node::{ColorStop, NodeKind, RenderNode};
use crate::path::{FillRule, Path, Stroke};
use crate::texture::{MemoryFormat, Texture, TextureDownloader};
use crate::transform::Transform;

pub const MAGIC: &[u8; 4] = b"RNDN";
pub const VERSION: u32 = 1;

/// Deepest node nesting a file may contain.
pub const MAX_DEPTH: usize = 512;

/// Most nodes a file may reach when shared subtrees are counted once per
/// parent, which is what rendering walks.
pub const MAX_EXPANDED_NODES: usize = 1 << 20;

const HEADER_LEN: usize = 8;

type NodeRef = u32;

#[derive(Serialize, Deserialize)]
struct TextureRecord {
    width: u32,
    height: u32,
    format: MemoryFormat,
    stride: u32,
    bytes: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
enum NodeRecord {
    Color {
        rect: Rect,
        color: Color,
    },
    LinearGradient {
        rect: Rect,
        start: Point,
        end: Point,
        stops: Vec<(f32, Color)>,
    },
    Border {
        outline: RoundedRect,
        widths: [f32; 4],
        colors: [Color; 4],
    },
    Texture {
        rect: Rect,
        texture: u32,
    },
    OutsetShadow {
        outline: RoundedRect,
        color: Color,
        dx: f32,
        dy: f32,
        spread: f32,
        blur_radius: f32,
    },
    Container {
        children: Vec<NodeRef>,
    },
    Transform {
        child: NodeRef,
        transform: Transform,
    },
    Opacity {
        child: NodeRef,
        opacity: f32,
    },
    ColorMatrix {
        child: NodeRef,
        matrix: [f32; 16],
        offset: [f32; 4],
    },
    Clip {
        child: NodeRef,
        clip: Rect,
    },
    RoundedClip {
        child: NodeRef,
        clip: RoundedRect,
    },
    Blur {
        child: NodeRef,
        radius: f32,
    },
    Fill {
        child: NodeRef,
        path: Path,
        fill_rule: FillRule,
    },
    Stroke {
        child: NodeRef,
        path: Path,
        stroke: Stroke,
    },
    CrossFade {
        start: NodeRef,
        end: NodeRef,
        progress: f32,
    },
    Debug {
        child: NodeRef,
        message: String,
    },
}

impl NodeRecord {
    fn name(&self) -> &'static str {
        match self {
            NodeRecord::Color { .. } => "color",
            NodeRecord::LinearGradient { .. } => "linear-gradient",
            NodeRecord::Border { .. } => "border",
            NodeRecord::Texture { .. } => "texture",
            NodeRecord::OutsetShadow { .. } => "outset-shadow",
            NodeRecord::Container { .. } => "container",
            NodeRecord::Transform { .. } => "transform",
            NodeRecord::Opacity { .. } => "opacity",
            NodeRecord::ColorMatrix { .. } => "color-matrix",
            NodeRecord::Clip { .. } => "clip",
            NodeRecord::RoundedClip { .. } => "rounded-clip",
            NodeRecord::Blur { .. } => "blur",
            NodeRecord::Fill { .. } => "fill",
            NodeRecord::Stroke { .. } => "stroke",
            NodeRecord::CrossFade { .. } => "cross-fade",
            NodeRecord::Debug { .. } => "debug",
        }
    }

    fn children(&self) -> Vec<NodeRef> {
        match self {
            NodeRecord::Container { children } => children.clone(),
            NodeRecord::Transform { child, .. }
            | NodeRecord::Opacity { child, .. }
            | NodeRecord::ColorMatrix { child, .. }
            | NodeRecord::Clip { child, .. }
            | NodeRecord::RoundedClip { child, .. }
            | NodeRecord::Blur { child, .. }
            | NodeRecord::Fill { child, .. }
            | NodeRecord::Stroke { child, .. }
            | NodeRecord::Debug { child, .. } => vec![*child],
            NodeRecord::CrossFade { start, end, .. } => vec![*start, *end],
            NodeRecord::Color { .. }
            | NodeRecord::LinearGradient { .. }
            | NodeRecord::Border { .. }
            | NodeRecord::Texture { .. }
            | NodeRecord::OutsetShadow { .. } => Vec::new(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct NodeFile {
    textures: Vec<TextureRecord>,
    nodes: Vec<NodeRecord>,
}

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
}

/// Encode `node` and everything below it.
///
/// GPU textures are downloaded, so this can fail with a texture error.
pub fn serialize(node: &RenderNode) -> Result<Vec<u8>> {
    let mut encoder = Encoder::default();
    encoder.node(node)?;
    let file = NodeFile {
        textures: encoder.textures,
        nodes: encoder.nodes,
    };

    let mut out = Vec::with_capacity(HEADER_LEN);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    options()
        .serialize_into(&mut out, &file)
        .map_err(Error::Encode)?;
    Ok(out)
}

/// Decode a node tree produced by [`serialize`].
pub fn deserialize(bytes: &[u8]) -> Result<RenderNode, DecodeError> {
    decode(bytes).map_err(|err| {
        log::debug!("Failed to decode render node data: {}", err);
        err
    })
}

/// Write `node` to a file.
pub fn save(node: &RenderNode, path: impl AsRef<FsPath>) -> Result<()> {
    let bytes = serialize(node)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Read a node file written by [`save`].
pub fn load(path: impl AsRef<FsPath>) -> Result<RenderNode> {
    let bytes = std::fs::read(path)?;
    Ok(deserialize(&bytes)?)
}

#[derive(Default)]
struct Encoder {
    textures: Vec<TextureRecord>,
    nodes: Vec<NodeRecord>,
    texture_ids: HashMap<*const (), u32>,
    node_ids: HashMap<*const (), NodeRef>,
}

impl Encoder {
    fn node(&mut self, node: &RenderNode) -> Result<NodeRef> {
        if let Some(id) = self.node_ids.get(&node.as_ptr()) {
            return Ok(*id);
        }

        let record = match node.kind() {
            NodeKind::Color { rect, color } => NodeRecord::Color {
                rect: *rect,
                color: *color,
            },
            NodeKind::LinearGradient {
                rect,
                start,
                end,
                stops,
            } => NodeRecord::LinearGradient {
                rect: *rect,
                start: *start,
                end: *end,
                stops: stops.iter().map(|s| (s.offset, s.color)).collect(),
            },
            NodeKind::Border {
                outline,
                widths,
                colors,
            } => NodeRecord::Border {
                outline: *outline,
                widths: *widths,
                colors: *colors,
            },
            NodeKind::Texture { rect, texture } => NodeRecord::Texture {
                rect: *rect,
                texture: self.texture(texture)?,
            },
            NodeKind::OutsetShadow {
                outline,
                color,
                dx,
                dy,
                spread,
                blur_radius,
            } => NodeRecord::OutsetShadow {
                outline: *outline,
                color: *color,
                dx: *dx,
                dy: *dy,
                spread: *spread,
                blur_radius: *blur_radius,
            },
            NodeKind::Container { children } => {
                let children = children
                    .iter()
                    .map(|c| self.node(c))
                    .collect::<Result<Vec<_>>>()?;
                NodeRecord::Container { children }
            }
            NodeKind::Transform { child, transform } => NodeRecord::Transform {
                child: self.node(child)?,
                transform: *transform,
            },
            NodeKind::Opacity { child, opacity } => NodeRecord::Opacity {
                child: self.node(child)?,
                opacity: *opacity,
            },
            NodeKind::ColorMatrix {
                child,
                matrix,
                offset,
            } => NodeRecord::ColorMatrix {
                child: self.node(child)?,
                matrix: *matrix,
                offset: *offset,
            },
            NodeKind::Clip { child, clip } => NodeRecord::Clip {
                child: self.node(child)?,
                clip: *clip,
            },
            NodeKind::RoundedClip { child, clip } => NodeRecord::RoundedClip {
                child: self.node(child)?,
                clip: *clip,
            },
            NodeKind::Blur { child, radius } => NodeRecord::Blur {
                child: self.node(child)?,
                radius: *radius,
            },
            NodeKind::Fill {
                child,
                path,
                fill_rule,
            } => NodeRecord::Fill {
                child: self.node(child)?,
                path: path.clone(),
                fill_rule: *fill_rule,
            },
            NodeKind::Stroke {
                child,
                path,
                stroke,
            } => NodeRecord::Stroke {
                child: self.node(child)?,
                path: path.clone(),
                stroke: stroke.clone(),
            },
            NodeKind::CrossFade {
                start,
                end,
                progress,
            } => NodeRecord::CrossFade {
                start: self.node(start)?,
                end: self.node(end)?,
                progress: *progress,
            },
            NodeKind::Debug { child, message } => NodeRecord::Debug {
                child: self.node(child)?,
                message: message.clone(),
            },
        };

        let id = self.nodes.len() as NodeRef;
        self.nodes.push(record);
        self.node_ids.insert(node.as_ptr(), id);
        Ok(id)
    }

    fn texture(&mut self, texture: &Texture) -> Result<u32> {
        if let Some(id) = self.texture_ids.get(&texture.as_ptr()) {
            return Ok(*id);
        }
        let format = texture.format();
        let (bytes, stride) = TextureDownloader::new(texture)
            .format(format)
            .download_bytes()?;
        let id = self.textures.len() as u32;
        self.textures.push(TextureRecord {
            width: texture.width(),
            height: texture.height(),
            format,
            stride: stride as u32,
            bytes,
        });
        self.texture_ids.insert(texture.as_ptr(), id);
        Ok(id)
    }
}

fn decode(bytes: &[u8]) -> Result<RenderNode, DecodeError> {
    if bytes.len() < HEADER_LEN {
        return Err(if MAGIC.starts_with(&bytes[..bytes.len().min(MAGIC.len())]) {
            DecodeError::Truncated
        } else {
            DecodeError::BadMagic
        });
    }
    if &bytes[..4] != MAGIC {
        return Err(DecodeError::BadMagic);
    }
    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    let payload = &bytes[HEADER_LEN..];
    let file: NodeFile = options()
        .with_limit(payload.len() as u64)
        .deserialize(payload)?;

    check_structure(&file.nodes)?;
    for record in &file.nodes {
        check_record(record, file.textures.len())?;
    }

    let textures = file
        .textures
        .into_iter()
        .map(|t| {
            Texture::from_memory(t.width, t.height, t.format, t.bytes, t.stride as usize).map_err(
                |err| DecodeError::InvalidValue {
                    node: "texture",
                    reason: err.to_string(),
                },
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut built: Vec<RenderNode> = Vec::with_capacity(file.nodes.len());
    for record in file.nodes {
        let node = build(record, &built, &textures);
        built.push(node);
    }
    built.pop().ok_or_else(|| DecodeError::Malformed("file contains no nodes".to_string()))
}

/// Children must point backwards, nesting must stay within [`MAX_DEPTH`]
/// and the unshared tree within [`MAX_EXPANDED_NODES`].
fn check_structure(nodes: &[NodeRecord]) -> Result<(), DecodeError> {
    if nodes.is_empty() {
        return Err(DecodeError::Malformed("file contains no nodes".to_string()));
    }
    let mut depths: Vec<usize> = Vec::with_capacity(nodes.len());
    let mut expanded: Vec<usize> = Vec::with_capacity(nodes.len());
    for (index, record) in nodes.iter().enumerate() {
        let mut depth = 1;
        let mut count: usize = 1;
        for child in record.children() {
            let child = child as usize;
            if child >= index {
                return Err(DecodeError::Malformed(format!(
                    "{} node {} refers to node {} which is not defined before it",
                    record.name(),
                    index,
                    child
                )));
            }
            depth = depth.max(depths[child] + 1);
            count = count.saturating_add(expanded[child]);
        }
        if depth > MAX_DEPTH {
            return Err(DecodeError::TooDeep(MAX_DEPTH));
        }
        if count > MAX_EXPANDED_NODES {
            return Err(DecodeError::TooManyNodes(MAX_EXPANDED_NODES));
        }
        depths.push(depth);
        expanded.push(count);
    }
    Ok(())
}

fn check_record(record: &NodeRecord, texture_count: usize) -> Result<(), DecodeError> {
    let name = record.name();
    let fail = |reason: &str| {
        Err(DecodeError::InvalidValue {
            node: name,
            reason: reason.to_string(),
        })
    };
    let rect_ok = |r: &Rect| r.is_finite() && r.width >= 0.0 && r.height >= 0.0;
    let rounded_ok = |r: &RoundedRect| {
        rect_ok(&r.bounds)
            && r
                .corners
                .iter()
                .all(|c| c.width.is_finite() && c.height.is_finite() && c.width >= 0.0 && c.height >= 0.0)
    };
    let finite = |values: &[f32]| values.iter().all(|v| v.is_finite());

    match record {
        NodeRecord::Color { rect, color } => {
            if !rect_ok(rect) {
                return fail("invalid rectangle");
            }
            if !color.is_finite() {
                return fail("non-finite color");
            }
        }
        NodeRecord::LinearGradient {
            rect,
            start,
            end,
            stops,
        } => {
            if !rect_ok(rect) || !start.is_finite() || !end.is_finite() {
                return fail("invalid geometry");
            }
            if stops.len() < 2 {
                return fail("fewer than two color stops");
            }
            if !stops.iter().all(|(o, c)| o.is_finite() && c.is_finite()) {
                return fail("non-finite color stop");
            }
            if !stops.windows(2).all(|w| w[0].0 <= w[1].0) {
                return fail("color stops not sorted");
            }
        }
        NodeRecord::Border {
            outline,
            widths,
            colors,
        } => {
            if !rounded_ok(outline) {
                return fail("invalid outline");
            }
            if !widths.iter().all(|w| w.is_finite() && *w >= 0.0) {
                return fail("invalid border width");
            }
            if !colors.iter().all(Color::is_finite) {
                return fail("non-finite color");
            }
        }
        NodeRecord::Texture { rect, texture } => {
            if !rect_ok(rect) {
                return fail("invalid rectangle");
            }
            if *texture as usize >= texture_count {
                return fail("texture index out of range");
            }
        }
        NodeRecord::OutsetShadow {
            outline,
            color,
            dx,
            dy,
            spread,
            blur_radius,
        } => {
            if !rounded_ok(outline) {
                return fail("invalid outline");
            }
            if !color.is_finite() || !finite(&[*dx, *dy, *spread, *blur_radius]) {
                return fail("non-finite shadow parameters");
            }
        }
        NodeRecord::Container { .. } => {}
        NodeRecord::Transform { transform, .. } => {
            if !transform.is_finite() {
                return fail("non-finite matrix");
            }
        }
        NodeRecord::Opacity { opacity, .. } => {
            if opacity.is_nan() {
                return fail("opacity is NaN");
            }
        }
        NodeRecord::ColorMatrix { matrix, offset, .. } => {
            if !finite(matrix) || !finite(offset) {
                return fail("non-finite color matrix");
            }
        }
        NodeRecord::Clip { clip, .. } => {
            if !rect_ok(clip) {
                return fail("invalid clip rectangle");
            }
        }
        NodeRecord::RoundedClip { clip, .. } => {
            if !rounded_ok(clip) {
                return fail("invalid clip outline");
            }
        }
        NodeRecord::Blur { radius, .. } => {
            if !radius.is_finite() || *radius < 0.0 {
                return fail("invalid blur radius");
            }
        }
        NodeRecord::Fill { path, .. } => {
            if !path.is_well_formed() {
                return fail("malformed path");
            }
        }
        NodeRecord::Stroke { path, stroke, .. } => {
            if !path.is_well_formed() {
                return fail("malformed path");
            }
            if !stroke.is_valid() {
                return fail("invalid stroke parameters");
            }
        }
        NodeRecord::CrossFade { progress, .. } => {
            if progress.is_nan() {
                return fail("progress is NaN");
            }
        }
        NodeRecord::Debug { .. } => {}
    }
    Ok(())
}

/// Records have been checked, so the constructors' assertions hold.
fn build(record: NodeRecord, built: &[RenderNode], textures: &[Texture]) -> RenderNode {
    let node = |id: NodeRef| built[id as usize].clone();
    match record {
        NodeRecord::Color { rect, color } => RenderNode::color(rect, color),
        NodeRecord::LinearGradient {
            rect,
            start,
            end,
            stops,
        } => RenderNode::linear_gradient(
            rect,
            start,
            end,
            stops
                .into_iter()
                .map(|(offset, color)| ColorStop::new(offset, color))
                .collect(),
        ),
        NodeRecord::Border {
            outline,
            widths,
            colors,
        } => RenderNode::border(outline, widths, colors),
        NodeRecord::Texture { rect, texture } => {
            RenderNode::texture(rect, textures[texture as usize].clone())
        }
        NodeRecord::OutsetShadow {
            outline,
            color,
            dx,
            dy,
            spread,
            blur_radius,
        } => RenderNode::outset_shadow(outline, color, dx, dy, spread, blur_radius),
        NodeRecord::Container { children } => {
            RenderNode::container(children.into_iter().map(node).collect())
        }
        NodeRecord::Transform { child, transform } => RenderNode::transform(node(child), transform),
        NodeRecord::Opacity { child, opacity } => RenderNode::opacity(node(child), opacity),
        NodeRecord::ColorMatrix {
            child,
            matrix,
            offset,
        } => RenderNode::color_matrix(node(child), matrix, offset),
        NodeRecord::Clip { child, clip } => RenderNode::clip(node(child), clip),
        NodeRecord::RoundedClip { child, clip } => RenderNode::rounded_clip(node(child), clip),
        NodeRecord::Blur { child, radius } => RenderNode::blur(node(child), radius),
        NodeRecord::Fill {
            child,
            path,
            fill_rule,
        } => RenderNode::fill(node(child), path, fill_rule),
        NodeRecord::Stroke {
            child,
            path,
            stroke,
        } => RenderNode::stroke(node(child), path, stroke),
        NodeRecord::CrossFade {
            start,
            end,
            progress,
        } => RenderNode::cross_fade(node(start), node(end), progress),
        NodeRecord::Debug { child, message } => RenderNode::debug(node(child), message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::PathBuilder;

    fn sample() -> RenderNode {
        let red = RenderNode::color(Rect::new(0.0, 0.0, 10.0, 10.0), Color::RED);
        let mut builder = PathBuilder::new();
        builder.add_circle(Point::new(5.0, 5.0), 4.0);
        RenderNode::container(vec![
            RenderNode::transform(red.clone(), Transform::translate(3.0, 4.0)),
            RenderNode::fill(red.clone(), builder.build(), FillRule::EvenOdd),
            RenderNode::debug(RenderNode::blur(red, 2.0), "blurred"),
        ])
    }

    #[test]
    fn test_header() {
        let bytes = serialize(&sample()).unwrap();
        assert_eq!(&bytes[..4], b"RNDN");
        assert_eq!(&bytes[4..8], &1u32.to_le_bytes());
    }

    #[test]
    fn test_shared_nodes_written_once() {
        let bytes = serialize(&sample()).unwrap();
        let file: NodeFile = options().deserialize(&bytes[HEADER_LEN..]).unwrap();
        // red, transform, fill, blur, debug, container
        assert_eq!(file.nodes.len(), 6);

        let node = deserialize(&bytes).unwrap();
        let children = node.children();
        assert!(children[0].children()[0].ptr_eq(children[1].children()[0]));
    }

    #[test]
    fn test_roundtrip_preserves_structure() {
        let node = sample();
        let decoded = deserialize(&serialize(&node).unwrap()).unwrap();
        assert_eq!(decoded.bounds(), node.bounds());
        assert_eq!(decoded.node_count(), node.node_count());
        match decoded.children()[2].kind() {
            NodeKind::Debug { message, .. } => assert_eq!(message, "blurred"),
            _ => panic!("expected a debug node"),
        }
    }

    #[test]
    fn test_bad_magic_and_version() {
        assert!(matches!(deserialize(b"PNG!\x01\0\0\0"), Err(DecodeError::BadMagic)));
        assert!(matches!(deserialize(b"RN"), Err(DecodeError::Truncated)));
        assert!(matches!(
            deserialize(b"RNDN\x02\0\0\0"),
            Err(DecodeError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn test_every_truncation_fails() {
        let bytes = serialize(&sample()).unwrap();
        for len in 0..bytes.len() {
            assert!(deserialize(&bytes[..len]).is_err(), "prefix of {} bytes decoded", len);
        }
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = serialize(&sample()).unwrap();
        bytes.push(0);
        assert!(deserialize(&bytes).is_err());
    }

    fn encode(file: &NodeFile) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&VERSION.to_le_bytes());
        options().serialize_into(&mut out, file).unwrap();
        out
    }

    #[test]
    fn test_forward_reference_rejected() {
        let file = NodeFile {
            textures: Vec::new(),
            nodes: vec![NodeRecord::Opacity {
                child: 0,
                opacity: 0.5,
            }],
        };
        assert!(matches!(deserialize(&encode(&file)), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_depth_limit() {
        let mut nodes = vec![NodeRecord::Color {
            rect: Rect::new(0.0, 0.0, 1.0, 1.0),
            color: Color::RED,
        }];
        for i in 0..MAX_DEPTH {
            nodes.push(NodeRecord::Opacity {
                child: i as NodeRef,
                opacity: 1.0,
            });
        }
        let file = NodeFile {
            textures: Vec::new(),
            nodes,
        };
        assert!(matches!(
            deserialize(&encode(&file)),
            Err(DecodeError::TooDeep(MAX_DEPTH))
        ));
    }

    #[test]
    fn test_expanded_node_limit() {
        let mut nodes = vec![NodeRecord::Color {
            rect: Rect::new(0.0, 0.0, 1.0, 1.0),
            color: Color::RED,
        }];
        // Each level references the previous one twice
        for i in 0..60 {
            nodes.push(NodeRecord::Container {
                children: vec![i, i],
            });
        }
        let file = NodeFile {
            textures: Vec::new(),
            nodes,
        };
        assert!(matches!(
            deserialize(&encode(&file)),
            Err(DecodeError::TooManyNodes(MAX_EXPANDED_NODES))
        ));

        // A few doublings stay well under the limit
        let mut nodes = vec![NodeRecord::Color {
            rect: Rect::new(0.0, 0.0, 1.0, 1.0),
            color: Color::RED,
        }];
        for i in 0..10 {
            nodes.push(NodeRecord::Container {
                children: vec![i, i],
            });
        }
        let file = NodeFile {
            textures: Vec::new(),
            nodes,
        };
        let node = deserialize(&encode(&file)).unwrap();
        assert_eq!(node.node_count(), (1 << 11) - 1);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let file = NodeFile {
            textures: Vec::new(),
            nodes: vec![NodeRecord::Color {
                rect: Rect::new(0.0, 0.0, f32::NAN, 1.0),
                color: Color::RED,
            }],
        };
        assert!(matches!(
            deserialize(&encode(&file)),
            Err(DecodeError::InvalidValue { node: "color", .. })
        ));

        let file = NodeFile {
            textures: vec![TextureRecord {
                width: 4,
                height: 4,
                format: MemoryFormat::R8G8B8A8,
                stride: 16,
                bytes: vec![0; 10],
            }],
            nodes: vec![NodeRecord::Texture {
                rect: Rect::new(0.0, 0.0, 4.0, 4.0),
                texture: 0,
            }],
        };
        assert!(matches!(
            deserialize(&encode(&file)),
            Err(DecodeError::InvalidValue { node: "texture", .. })
        ));
    }

    #[test]
    fn test_texture_roundtrip() {
        let pixels: Vec<u8> = (0..16u8).flat_map(|i| [i, 255 - i, i * 2, 255]).collect();
        let texture = Texture::from_memory(4, 4, MemoryFormat::R8G8B8A8, pixels.clone(), 16).unwrap();
        let node = RenderNode::texture(Rect::new(0.0, 0.0, 8.0, 8.0), texture);

        let decoded = deserialize(&serialize(&node).unwrap()).unwrap();
        let NodeKind::Texture { texture, rect } = decoded.kind() else {
            panic!("expected a texture node");
        };
        assert_eq!(*rect, Rect::new(0.0, 0.0, 8.0, 8.0));
        assert_eq!(texture.format(), MemoryFormat::R8G8B8A8);
        let (bytes, _) = TextureDownloader::new(texture)
            .format(MemoryFormat::R8G8B8A8)
            .download_bytes()
            .unwrap();
        assert_eq!(bytes, pixels);
    }
}
