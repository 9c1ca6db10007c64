//! Immutable paint nodes.
//!
//! A [`RenderNode`] is a cheap handle to a shared node. Children are held by
//! handle, so the same subtree can sit under several parents. Bounds are
//! computed once, when the node is built.

mod diff;

use std::fmt;
use std::sync::Arc;

use crate::color::Color;
use crate::geometry::{BoundingBox, Point, Rect, RoundedRect};
use crate::path::{FillRule, Path, Stroke};
use crate::texture::Texture;
use crate::transform::{Transform, TransformCategory};

/// Number of pixels a gaussian blur of standard deviation `radius` spreads
/// content, using the three-box-blur approximation.
pub fn blur_padding(radius: f32) -> f32 {
    let factor = 3.0 * (2.0 * std::f32::consts::PI).sqrt() / 4.0 * 1.5;
    (radius * factor + 0.5).floor()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    pub offset: f32,
    pub color: Color,
}

impl ColorStop {
    pub fn new(offset: f32, color: Color) -> Self {
        Self { offset, color }
    }
}

/// The closed set of node variants.
#[derive(Clone)]
pub enum NodeKind {
    Color {
        rect: Rect,
        color: Color,
    },
    LinearGradient {
        rect: Rect,
        start: Point,
        end: Point,
        stops: Vec<ColorStop>,
    },
    /// Borders drawn inside `outline`, widths and colors in top, right,
    /// bottom, left order.
    Border {
        outline: RoundedRect,
        widths: [f32; 4],
        colors: [Color; 4],
    },
    Texture {
        rect: Rect,
        texture: Texture,
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
        children: Vec<RenderNode>,
    },
    Transform {
        child: RenderNode,
        transform: Transform,
    },
    Opacity {
        child: RenderNode,
        opacity: f32,
    },
    /// `out[i] = sum(matrix[i * 4 + j] * in[j]) + offset[i]` on straight
    /// RGBA in 0..=1.
    ColorMatrix {
        child: RenderNode,
        matrix: [f32; 16],
        offset: [f32; 4],
    },
    Clip {
        child: RenderNode,
        clip: Rect,
    },
    RoundedClip {
        child: RenderNode,
        clip: RoundedRect,
    },
    Blur {
        child: RenderNode,
        radius: f32,
    },
    Fill {
        child: RenderNode,
        path: Path,
        fill_rule: FillRule,
    },
    Stroke {
        child: RenderNode,
        path: Path,
        stroke: Stroke,
    },
    CrossFade {
        start: RenderNode,
        end: RenderNode,
        progress: f32,
    },
    Debug {
        child: RenderNode,
        message: String,
    },
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Color { .. } => "color",
            NodeKind::LinearGradient { .. } => "linear-gradient",
            NodeKind::Border { .. } => "border",
            NodeKind::Texture { .. } => "texture",
            NodeKind::OutsetShadow { .. } => "outset-shadow",
            NodeKind::Container { .. } => "container",
            NodeKind::Transform { .. } => "transform",
            NodeKind::Opacity { .. } => "opacity",
            NodeKind::ColorMatrix { .. } => "color-matrix",
            NodeKind::Clip { .. } => "clip",
            NodeKind::RoundedClip { .. } => "rounded-clip",
            NodeKind::Blur { .. } => "blur",
            NodeKind::Fill { .. } => "fill",
            NodeKind::Stroke { .. } => "stroke",
            NodeKind::CrossFade { .. } => "cross-fade",
            NodeKind::Debug { .. } => "debug",
        }
    }

    fn compute_bounds(&self) -> BoundingBox {
        match self {
            NodeKind::Color { rect, .. }
            | NodeKind::LinearGradient { rect, .. }
            | NodeKind::Texture { rect, .. } => BoundingBox::from_rect(*rect),
            NodeKind::Border { outline, .. } => BoundingBox::from_rect(outline.bounds),
            NodeKind::OutsetShadow {
                outline,
                dx,
                dy,
                spread,
                blur_radius,
                ..
            } => {
                let shadow = BoundingBox::from_rect(outline.bounds.offset(*dx, *dy))
                    .expand(spread.max(0.0) + blur_padding(blur_radius / 2.0));
                shadow.union(&BoundingBox::from_rect(outline.bounds))
            }
            NodeKind::Container { children } => {
                // Children that draw nothing must not drag the box to their origin
                let mut iter = children.iter().map(|c| c.bounds()).filter(|b| !b.is_empty());
                match iter.next() {
                    Some(first) => iter.fold(first, |acc, b| acc.union(&b)),
                    None => BoundingBox::EMPTY,
                }
            }
            NodeKind::Transform { child, transform } => transform.transform_bounds(&child.bounds()),
            NodeKind::Opacity { child, .. }
            | NodeKind::ColorMatrix { child, .. }
            | NodeKind::Debug { child, .. } => child.bounds(),
            NodeKind::Clip { child, clip } => clip_bounds(child, BoundingBox::from_rect(*clip)),
            NodeKind::RoundedClip { child, clip } => {
                clip_bounds(child, BoundingBox::from_rect(clip.bounds))
            }
            NodeKind::Blur { child, radius } => child.bounds().expand(blur_padding(radius / 2.0)),
            NodeKind::Fill { child, path, .. } => match path.bounds() {
                Some(b) => clip_bounds(child, b),
                None => BoundingBox::EMPTY,
            },
            NodeKind::Stroke {
                child,
                path,
                stroke,
            } => match stroke.stroke_bounds(path) {
                Some(b) => clip_bounds(child, b),
                None => BoundingBox::EMPTY,
            },
            NodeKind::CrossFade { start, end, .. } => start.bounds().union(&end.bounds()),
        }
    }
}

fn clip_bounds(child: &RenderNode, clip: BoundingBox) -> BoundingBox {
    child
        .bounds()
        .intersect(&clip)
        .unwrap_or(BoundingBox::new(clip.min, clip.min))
}

struct NodeInner {
    kind: NodeKind,
    bounds: BoundingBox,
}

/// Shared handle to an immutable paint node.
#[derive(Clone)]
pub struct RenderNode(Arc<NodeInner>);

impl RenderNode {
    fn from_kind(kind: NodeKind) -> Self {
        let bounds = kind.compute_bounds();
        RenderNode(Arc::new(NodeInner { kind, bounds }))
    }

    pub fn kind(&self) -> &NodeKind {
        &self.0.kind
    }

    pub fn bounds(&self) -> BoundingBox {
        self.0.bounds
    }

    /// Whether both handles refer to the same node.
    pub fn ptr_eq(&self, other: &RenderNode) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn as_ptr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }

    /// Direct children in drawing order.
    pub fn children(&self) -> Vec<&RenderNode> {
        match self.kind() {
            NodeKind::Container { children } => children.iter().collect(),
            NodeKind::Transform { child, .. }
            | NodeKind::Opacity { child, .. }
            | NodeKind::ColorMatrix { child, .. }
            | NodeKind::Clip { child, .. }
            | NodeKind::RoundedClip { child, .. }
            | NodeKind::Blur { child, .. }
            | NodeKind::Fill { child, .. }
            | NodeKind::Stroke { child, .. }
            | NodeKind::Debug { child, .. } => vec![child],
            NodeKind::CrossFade { start, end, .. } => vec![start, end],
            NodeKind::Color { .. }
            | NodeKind::LinearGradient { .. }
            | NodeKind::Border { .. }
            | NodeKind::Texture { .. }
            | NodeKind::OutsetShadow { .. } => Vec::new(),
        }
    }

    pub fn color(rect: Rect, color: Color) -> Self {
        assert_finite_rect(&rect, "color");
        assert!(color.is_finite(), "color node with non-finite color");
        Self::from_kind(NodeKind::Color {
            rect: rect.normalize(),
            color: color.clamped(),
        })
    }

    /// Stops must be sorted by offset and there must be at least two.
    pub fn linear_gradient(rect: Rect, start: Point, end: Point, stops: Vec<ColorStop>) -> Self {
        assert_finite_rect(&rect, "linear-gradient");
        assert!(stops.len() >= 2, "linear gradient needs at least two color stops");
        assert!(
            stops.windows(2).all(|w| w[0].offset <= w[1].offset),
            "linear gradient stops must be sorted by offset"
        );
        let stops = stops
            .into_iter()
            .map(|s| ColorStop::new(s.offset.clamp(0.0, 1.0), s.color.clamped()))
            .collect();
        Self::from_kind(NodeKind::LinearGradient {
            rect: rect.normalize(),
            start,
            end,
            stops,
        })
    }

    pub fn border(outline: RoundedRect, widths: [f32; 4], colors: [Color; 4]) -> Self {
        assert!(
            widths.iter().all(|w| w.is_finite() && *w >= 0.0),
            "border widths must be finite and non-negative"
        );
        Self::from_kind(NodeKind::Border {
            outline,
            widths,
            colors: colors.map(|c| c.clamped()),
        })
    }

    pub fn texture(rect: Rect, texture: Texture) -> Self {
        assert_finite_rect(&rect, "texture");
        Self::from_kind(NodeKind::Texture {
            rect: rect.normalize(),
            texture,
        })
    }

    pub fn outset_shadow(
        outline: RoundedRect,
        color: Color,
        dx: f32,
        dy: f32,
        spread: f32,
        blur_radius: f32,
    ) -> Self {
        assert!(
            dx.is_finite() && dy.is_finite() && spread.is_finite() && blur_radius.is_finite(),
            "outset shadow parameters must be finite"
        );
        Self::from_kind(NodeKind::OutsetShadow {
            outline,
            color: color.clamped(),
            dx,
            dy,
            spread,
            blur_radius: blur_radius.max(0.0),
        })
    }

    pub fn container(children: Vec<RenderNode>) -> Self {
        Self::from_kind(NodeKind::Container { children })
    }

    pub fn transform(child: RenderNode, transform: Transform) -> Self {
        assert!(transform.is_finite(), "transform node with non-finite matrix");
        Self::from_kind(NodeKind::Transform { child, transform })
    }

    pub fn opacity(child: RenderNode, opacity: f32) -> Self {
        assert!(!opacity.is_nan(), "opacity must not be NaN");
        Self::from_kind(NodeKind::Opacity {
            child,
            opacity: opacity.clamp(0.0, 1.0),
        })
    }

    pub fn color_matrix(child: RenderNode, matrix: [f32; 16], offset: [f32; 4]) -> Self {
        assert!(
            matrix.iter().chain(offset.iter()).all(|v| v.is_finite()),
            "color matrix must be finite"
        );
        Self::from_kind(NodeKind::ColorMatrix {
            child,
            matrix,
            offset,
        })
    }

    pub fn clip(child: RenderNode, clip: Rect) -> Self {
        assert_finite_rect(&clip, "clip");
        Self::from_kind(NodeKind::Clip {
            child,
            clip: clip.normalize(),
        })
    }

    pub fn rounded_clip(child: RenderNode, clip: RoundedRect) -> Self {
        assert_finite_rect(&clip.bounds, "rounded-clip");
        Self::from_kind(NodeKind::RoundedClip { child, clip })
    }

    pub fn blur(child: RenderNode, radius: f32) -> Self {
        assert!(
            radius.is_finite() && radius >= 0.0,
            "blur radius must be finite and non-negative, got {}",
            radius
        );
        Self::from_kind(NodeKind::Blur { child, radius })
    }

    pub fn fill(child: RenderNode, path: Path, fill_rule: FillRule) -> Self {
        assert!(path.is_well_formed(), "fill node with malformed path");
        Self::from_kind(NodeKind::Fill {
            child,
            path,
            fill_rule,
        })
    }

    pub fn stroke(child: RenderNode, path: Path, stroke: Stroke) -> Self {
        assert!(path.is_well_formed(), "stroke node with malformed path");
        assert!(stroke.is_valid(), "stroke node with invalid stroke parameters");
        Self::from_kind(NodeKind::Stroke {
            child,
            path,
            stroke,
        })
    }

    pub fn cross_fade(start: RenderNode, end: RenderNode, progress: f32) -> Self {
        assert!(!progress.is_nan(), "cross-fade progress must not be NaN");
        Self::from_kind(NodeKind::CrossFade {
            start,
            end,
            progress: progress.clamp(0.0, 1.0),
        })
    }

    pub fn debug(child: RenderNode, message: impl Into<String>) -> Self {
        Self::from_kind(NodeKind::Debug {
            child,
            message: message.into(),
        })
    }

    /// Whether any node in this subtree uses a transform that cannot be
    /// flattened to 2D.
    pub fn has_3d_transform(&self) -> bool {
        if let NodeKind::Transform { transform, .. } = self.kind() {
            if transform.category() < TransformCategory::TwoD {
                return true;
            }
        }
        self.children().into_iter().any(|c| c.has_3d_transform())
    }

    /// Number of nodes reachable from here, counting shared nodes once per
    /// occurrence.
    pub fn node_count(&self) -> usize {
        1 + self
            .children()
            .into_iter()
            .map(RenderNode::node_count)
            .sum::<usize>()
    }
}

fn assert_finite_rect(rect: &Rect, node: &str) {
    assert!(rect.is_finite(), "{} node with non-finite rectangle {:?}", node, rect);
}

impl fmt::Debug for RenderNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("RenderNode");
        s.field("type", &self.kind().name())
            .field("bounds", &self.bounds().to_rect());
        let children = self.children();
        if !children.is_empty() {
            s.field("children", &children);
        }
        s.finish()
    }
}
