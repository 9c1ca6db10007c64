use thiserror::Error;

use crate::renderer::RendererKind;
use crate::texture::MemoryFormat;

/// Failure to acquire backend resources in `realize`.
///
/// These are recoverable: the caller can retry with another backend.
#[derive(Error, Debug)]
pub enum RealizeError {
    #[error("{0} renderer is not available on display \"{1}\"")]
    BackendDisabled(RendererKind, String),
    #[error("No {0} support: no suitable adapter found")]
    NoAdapter(RendererKind),
    #[error("Failed to create {0} device: {1}")]
    Device(RendererKind, String),
    #[error("Failed to create surface: {0}")]
    Surface(String),
    #[error("{0} renderer cannot draw to this surface")]
    UnsupportedSurface(RendererKind),
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Surface lost or outdated")]
    SurfaceLost,
    #[error("Out of memory while rendering")]
    OutOfMemory,
    #[error("Surface error: {0}")]
    Surface(String),
    #[error("Viewport {0}x{1} is empty or too large")]
    InvalidViewport(f32, f32),
    #[error("GPU validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Texture(#[from] TextureError),
}

#[derive(Error, Debug)]
pub enum TextureError {
    #[error("Buffer too small: need {needed} bytes, got {actual}")]
    BufferTooSmall { needed: usize, actual: usize },
    #[error("Stride {stride} too small for {width} pixels of {format:?}")]
    StrideTooSmall {
        stride: usize,
        width: u32,
        format: MemoryFormat,
    },
    #[error("Stride {stride} over {height} rows overflows the address space")]
    StrideOverflow { stride: usize, height: u32 },
    #[error("Texture size {0}x{1} is invalid")]
    InvalidSize(u32, u32),
    #[error("Failed to map GPU buffer: {0}")]
    Readback(String),
    #[error("Missing required builder field: {0}")]
    MissingField(&'static str),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Malformed serialized node data.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Not a render node file (bad magic)")]
    BadMagic,
    #[error("Unsupported format version {0}")]
    UnsupportedVersion(u32),
    #[error("Unexpected end of data")]
    Truncated,
    #[error("Malformed node data: {0}")]
    Malformed(String),
    #[error("Nodes nested deeper than {0} levels")]
    TooDeep(usize),
    #[error("Nodes expand to more than {0} nodes through sharing")]
    TooManyNodes(usize),
    #[error("Invalid value in {node} node: {reason}")]
    InvalidValue { node: &'static str, reason: String },
}

impl From<bincode::Error> for DecodeError {
    fn from(err: bincode::Error) -> Self {
        match *err {
            bincode::ErrorKind::Io(ref io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                DecodeError::Truncated
            }
            bincode::ErrorKind::SizeLimit => DecodeError::Truncated,
            other => DecodeError::Malformed(other.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Realize(#[from] RealizeError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Texture(#[from] TextureError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("Failed to encode nodes: {0}")]
    Encode(bincode::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
