//! Builder that turns a sequence of drawing calls into a node tree.

use crate::color::Color;
use crate::geometry::{Point, Rect, RoundedRect};
use crate::node::{ColorStop, RenderNode};
use crate::path::{FillRule, Path, Stroke};
use crate::texture::Texture;
use crate::transform::Transform;

enum FrameKind {
    Root,
    Save,
    Transform(Transform),
    Clip(Rect),
    RoundedClip(RoundedRect),
    Opacity(f32),
    Blur(f32),
    ColorMatrix([f32; 16], [f32; 4]),
    Fill(Path, FillRule),
    Stroke(Path, Stroke),
    Debug(String),
    CrossFadeStart,
    CrossFadeEnd {
        progress: f32,
        start: Option<RenderNode>,
    },
}

impl FrameKind {
    fn name(&self) -> &'static str {
        match self {
            FrameKind::Root => "root",
            FrameKind::Save => "save",
            FrameKind::Transform(_) => "transform",
            FrameKind::Clip(_) => "clip",
            FrameKind::RoundedClip(_) => "rounded clip",
            FrameKind::Opacity(_) => "opacity",
            FrameKind::Blur(_) => "blur",
            FrameKind::ColorMatrix(..) => "color matrix",
            FrameKind::Fill(..) => "fill",
            FrameKind::Stroke(..) => "stroke",
            FrameKind::Debug(_) => "debug",
            FrameKind::CrossFadeStart | FrameKind::CrossFadeEnd { .. } => "cross-fade",
        }
    }
}

struct Frame {
    kind: FrameKind,
    /// Transform applied to nodes appended in this frame.
    transform: Transform,
    nodes: Vec<RenderNode>,
}

impl Frame {
    fn new(kind: FrameKind, transform: Transform) -> Self {
        Self {
            kind,
            transform,
            nodes: Vec::new(),
        }
    }

    fn collect(&mut self) -> Option<RenderNode> {
        match self.nodes.len() {
            0 => None,
            1 => self.nodes.pop(),
            _ => Some(RenderNode::container(std::mem::take(&mut self.nodes))),
        }
    }
}

/// Accumulates drawing operations into an immutable [`RenderNode`].
///
/// Every `push_*` must be matched by a [`pop`](Self::pop), and every
/// [`save`](Self::save) by a [`restore`](Self::restore). Mismatches panic
/// immediately, at the call that gets it wrong.
///
/// ```ignore
/// let mut snapshot = Snapshot::new();
/// snapshot.translate(10.0, 10.0);
/// snapshot.push_opacity(0.5);
/// snapshot.append_color(Color::RED, Rect::new(0.0, 0.0, 64.0, 64.0));
/// snapshot.pop();
/// let node = snapshot.finish();
/// ```
pub struct Snapshot {
    frames: Vec<Frame>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl Snapshot {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::new(FrameKind::Root, Transform::IDENTITY)],
        }
    }

    fn current(&mut self) -> &mut Frame {
        // The root frame is never popped
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn innermost_kind(&self) -> &FrameKind {
        &self.frames[self.frames.len() - 1].kind
    }

    /// Nesting depth, 0 when nothing is pushed.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Return the finished tree, or `None` if nothing was drawn.
    ///
    /// # Panics
    ///
    /// If any pushed frame was not popped.
    pub fn finish(mut self) -> Option<RenderNode> {
        assert!(
            self.frames.len() == 1,
            "Snapshot finished with {} unpopped frame(s), innermost is {}",
            self.frames.len() - 1,
            self.innermost_kind().name()
        );
        self.current().collect()
    }

    // -------------------------------------------------------------------------
    // Transforms
    // -------------------------------------------------------------------------

    /// Compose `transform` into the current transform. It applies to
    /// everything drawn afterwards in the current frame.
    pub fn transform(&mut self, transform: &Transform) {
        if !transform.is_identity() {
            let frame = self.current();
            frame.transform = frame.transform.then(transform);
        }
    }

    pub fn translate(&mut self, x: f32, y: f32) {
        self.transform(&Transform::translate(x, y));
    }

    pub fn scale(&mut self, sx: f32, sy: f32) {
        self.transform(&Transform::scale_xy(sx, sy));
    }

    /// Rotate by `degrees` around the current origin.
    pub fn rotate(&mut self, degrees: f32) {
        self.transform(&Transform::rotate_degrees(degrees));
    }

    /// Remember the current transform until the matching [`restore`](Self::restore).
    pub fn save(&mut self) {
        let transform = self.current().transform;
        self.frames.push(Frame::new(FrameKind::Save, transform));
    }

    pub fn restore(&mut self) {
        assert!(
            self.frames.len() > 1,
            "Snapshot::restore called without a matching save"
        );
        assert!(
            matches!(self.innermost_kind(), FrameKind::Save),
            "Snapshot::restore called while a {} is pushed",
            self.innermost_kind().name()
        );
        let Some(mut frame) = self.frames.pop() else {
            unreachable!()
        };
        // Nodes in a save frame already carry the parent transform
        let nodes = std::mem::take(&mut frame.nodes);
        self.current().nodes.extend(nodes);
    }

    /// Draw everything until the matching `pop` through `transform`.
    pub fn push_transform(&mut self, transform: Transform) {
        self.push(FrameKind::Transform(transform));
    }

    // -------------------------------------------------------------------------
    // Effects
    // -------------------------------------------------------------------------

    fn push(&mut self, kind: FrameKind) {
        self.frames.push(Frame::new(kind, Transform::IDENTITY));
    }

    pub fn push_clip(&mut self, clip: Rect) {
        self.push(FrameKind::Clip(clip));
    }

    pub fn push_rounded_clip(&mut self, clip: RoundedRect) {
        self.push(FrameKind::RoundedClip(clip));
    }

    pub fn push_opacity(&mut self, opacity: f32) {
        self.push(FrameKind::Opacity(opacity));
    }

    pub fn push_blur(&mut self, radius: f32) {
        self.push(FrameKind::Blur(radius));
    }

    pub fn push_color_matrix(&mut self, matrix: [f32; 16], offset: [f32; 4]) {
        self.push(FrameKind::ColorMatrix(matrix, offset));
    }

    /// Use what is drawn until `pop` as the source filling `path`.
    pub fn push_fill(&mut self, path: Path, fill_rule: FillRule) {
        self.push(FrameKind::Fill(path, fill_rule));
    }

    pub fn push_stroke(&mut self, path: Path, stroke: Stroke) {
        self.push(FrameKind::Stroke(path, stroke));
    }

    pub fn push_debug(&mut self, message: impl Into<String>) {
        self.push(FrameKind::Debug(message.into()));
    }

    /// Start a cross-fade. The first `pop` ends the start image, the second
    /// ends the end image and emits the node.
    pub fn push_cross_fade(&mut self, progress: f32) {
        self.push(FrameKind::CrossFadeEnd {
            progress,
            start: None,
        });
        self.push(FrameKind::CrossFadeStart);
    }

    /// End the innermost `push_*`.
    ///
    /// # Panics
    ///
    /// If nothing is pushed or the innermost frame came from `save`.
    pub fn pop(&mut self) {
        assert!(self.frames.len() > 1, "Snapshot::pop called without a matching push");
        assert!(
            !matches!(self.innermost_kind(), FrameKind::Save),
            "Snapshot::pop called while a save is active, use restore"
        );
        let Some(mut frame) = self.frames.pop() else {
            unreachable!()
        };
        let child = frame.collect();

        let node = match frame.kind {
            FrameKind::Root | FrameKind::Save => unreachable!(),
            FrameKind::CrossFadeStart => {
                let empty = RenderNode::container(Vec::new());
                if let FrameKind::CrossFadeEnd { start, .. } = &mut self.current().kind {
                    *start = Some(child.unwrap_or(empty));
                }
                return;
            }
            FrameKind::CrossFadeEnd { progress, start } => {
                let start = start.unwrap_or_else(|| RenderNode::container(Vec::new()));
                let end = child.unwrap_or_else(|| RenderNode::container(Vec::new()));
                Some(RenderNode::cross_fade(start, end, progress))
            }
            FrameKind::Transform(transform) => {
                child.map(|c| RenderNode::transform(c, transform))
            }
            FrameKind::Clip(rect) => child.map(|c| RenderNode::clip(c, rect)),
            FrameKind::RoundedClip(rr) => child.map(|c| RenderNode::rounded_clip(c, rr)),
            FrameKind::Opacity(opacity) if opacity >= 1.0 => child,
            FrameKind::Opacity(opacity) => child.map(|c| RenderNode::opacity(c, opacity)),
            FrameKind::Blur(radius) if radius <= 0.0 => child,
            FrameKind::Blur(radius) => child.map(|c| RenderNode::blur(c, radius)),
            FrameKind::ColorMatrix(matrix, offset) => {
                child.map(|c| RenderNode::color_matrix(c, matrix, offset))
            }
            FrameKind::Fill(path, rule) => child.map(|c| RenderNode::fill(c, path, rule)),
            FrameKind::Stroke(path, stroke) => child.map(|c| RenderNode::stroke(c, path, stroke)),
            FrameKind::Debug(message) => child.map(|c| RenderNode::debug(c, message)),
        };

        if let Some(node) = node {
            self.append_node(node);
        }
    }

    // -------------------------------------------------------------------------
    // Primitives
    // -------------------------------------------------------------------------

    /// Add an existing node, e.g. one cached from a previous frame.
    pub fn append_node(&mut self, node: RenderNode) {
        let frame = self.current();
        let node = if frame.transform.is_identity() {
            node
        } else {
            RenderNode::transform(node, frame.transform)
        };
        frame.nodes.push(node);
    }

    pub fn append_color(&mut self, color: Color, rect: Rect) {
        self.append_node(RenderNode::color(rect, color));
    }

    pub fn append_linear_gradient(
        &mut self,
        rect: Rect,
        start: Point,
        end: Point,
        stops: Vec<ColorStop>,
    ) {
        self.append_node(RenderNode::linear_gradient(rect, start, end, stops));
    }

    pub fn append_border(&mut self, outline: RoundedRect, widths: [f32; 4], colors: [Color; 4]) {
        self.append_node(RenderNode::border(outline, widths, colors));
    }

    pub fn append_texture(&mut self, texture: Texture, rect: Rect) {
        self.append_node(RenderNode::texture(rect, texture));
    }

    pub fn append_outset_shadow(
        &mut self,
        outline: RoundedRect,
        color: Color,
        dx: f32,
        dy: f32,
        spread: f32,
        blur_radius: f32,
    ) {
        self.append_node(RenderNode::outset_shadow(
            outline,
            color,
            dx,
            dy,
            spread,
            blur_radius,
        ));
    }
}
