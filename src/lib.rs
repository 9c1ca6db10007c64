//! Immutable render-node trees and the renderers that draw them.
//!
//! Widgets describe a frame by emitting nodes into a [`Snapshot`]. The
//! finished [`RenderNode`] tree is handed to a [`Renderer`], realized for a
//! [`Display`] with the GL, Vulkan or software backend, which draws it into
//! a [`Texture`] or onto a [`Surface`]. Trees can be written to and read from
//! binary node files with the [`codec`] module.

pub mod codec;
pub mod color;
pub mod config;
pub mod error;
pub mod geometry;
pub mod gpu;
pub mod node;
pub mod path;
pub mod region;
pub mod renderer;
pub mod snap;
pub mod snapshot;
pub mod texture;
pub mod transform;

mod software;

pub use color::Color;
pub use config::{Config, DebugFlags, PowerPreference};
pub use error::{DecodeError, Error, RealizeError, RenderError, Result, TextureError};
pub use geometry::{BoundingBox, Point, Rect, RoundedRect, Size};
pub use node::{blur_padding, ColorStop, NodeKind, RenderNode};
pub use path::{FillRule, LineCap, LineJoin, Path, PathBuilder, Stroke};
pub use region::Region;
pub use renderer::{BackendRequest, Display, Renderer, RendererKind, Surface};
pub use snap::{PointSnap, SnapDirection};
pub use snapshot::Snapshot;
pub use texture::{GpuTextureBuilder, MemoryFormat, Texture, TextureDownloader};
pub use transform::{Transform, TransformCategory};

pub mod prelude {
    pub use crate::geometry::{BoundingBox, Point, Rect, RoundedRect, Size};
    pub use crate::node::{ColorStop, RenderNode};
    pub use crate::path::{FillRule, PathBuilder, Stroke};
    pub use crate::renderer::{Display, Renderer, RendererKind, Surface};
    pub use crate::texture::{MemoryFormat, Texture};
    pub use crate::{Color, Config, Region, Snapshot, Transform};
}
