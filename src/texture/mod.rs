//! Pixel buffers held in CPU or GPU memory.
//!
//! A [`Texture`] is immutable and can be shared between threads. Reading
//! pixels back always goes through [`Texture::download`] or a
//! [`TextureDownloader`], which copy into a caller supplied layout.

mod format;
mod gpu;

use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

pub use format::MemoryFormat;
pub(crate) use format::{convert, premultiply, required_len};
pub use gpu::GpuTextureBuilder;
pub(crate) use gpu::GpuTexture;

use crate::error::TextureError;

pub(crate) enum Storage {
    Memory { bytes: Vec<u8>, stride: usize },
    Gpu(GpuTexture),
}

struct TextureInner {
    width: u32,
    height: u32,
    format: MemoryFormat,
    storage: Storage,
}

#[derive(Clone)]
pub struct Texture(Arc<TextureInner>);

impl Texture {
    pub(crate) fn from_storage(width: u32, height: u32, format: MemoryFormat, storage: Storage) -> Self {
        Texture(Arc::new(TextureInner {
            width,
            height,
            format,
            storage,
        }))
    }

    /// Wrap CPU pixel data laid out as `format` with rows `stride` bytes apart.
    pub fn from_memory(
        width: u32,
        height: u32,
        format: MemoryFormat,
        bytes: impl Into<Vec<u8>>,
        stride: usize,
    ) -> Result<Self, TextureError> {
        let bytes = bytes.into();
        if width == 0 || height == 0 {
            return Err(TextureError::InvalidSize(width, height));
        }
        let row_bytes = width as usize * format.bytes_per_pixel();
        if stride < row_bytes {
            return Err(TextureError::StrideTooSmall {
                stride,
                width,
                format,
            });
        }
        let needed = required_len(stride, row_bytes, height)
            .ok_or(TextureError::StrideOverflow { stride, height })?;
        if bytes.len() < needed {
            return Err(TextureError::BufferTooSmall {
                needed,
                actual: bytes.len(),
            });
        }
        Ok(Self::from_storage(
            width,
            height,
            format,
            Storage::Memory { bytes, stride },
        ))
    }

    pub fn from_png(path: impl AsRef<Path>) -> Result<Self, TextureError> {
        let img = image::open(path)?;
        Self::from_rgba_image(img.to_rgba8())
    }

    pub fn from_png_bytes(bytes: &[u8]) -> Result<Self, TextureError> {
        let img = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)?;
        Self::from_rgba_image(img.to_rgba8())
    }

    fn from_rgba_image(rgba: image::RgbaImage) -> Result<Self, TextureError> {
        let (width, height) = rgba.dimensions();
        Self::from_memory(
            width,
            height,
            MemoryFormat::R8G8B8A8,
            rgba.into_raw(),
            width as usize * 4,
        )
    }

    pub fn width(&self) -> u32 {
        self.0.width
    }

    pub fn height(&self) -> u32 {
        self.0.height
    }

    /// Layout of the stored pixels.
    pub fn format(&self) -> MemoryFormat {
        self.0.format
    }

    pub fn is_gpu(&self) -> bool {
        matches!(self.0.storage, Storage::Gpu(_))
    }

    pub fn ptr_eq(&self, other: &Texture) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn as_ptr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }

    pub(crate) fn gpu(&self) -> Option<&GpuTexture> {
        match &self.0.storage {
            Storage::Gpu(gpu) => Some(gpu),
            Storage::Memory { .. } => None,
        }
    }

    /// Copy the pixels into `data` as premultiplied BGRA
    /// ([`MemoryFormat::B8G8R8A8Premultiplied`]) with rows `stride` bytes
    /// apart.
    ///
    /// Safe to call from any thread, concurrently with other downloads. For
    /// GPU textures the owning context is bound only for the duration of
    /// the call.
    pub fn download(&self, data: &mut [u8], stride: usize) -> Result<(), TextureError> {
        TextureDownloader::new(self).download_into(data, stride)
    }

    pub fn to_rgba_image(&self) -> Result<image::RgbaImage, TextureError> {
        let (bytes, _) = TextureDownloader::new(self)
            .format(MemoryFormat::R8G8B8A8)
            .download_bytes()?;
        image::RgbaImage::from_raw(self.width(), self.height(), bytes)
            .ok_or(TextureError::InvalidSize(self.width(), self.height()))
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), TextureError> {
        self.to_rgba_image()?
            .save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }

    pub fn to_png_bytes(&self) -> Result<Vec<u8>, TextureError> {
        let mut out = Cursor::new(Vec::new());
        self.to_rgba_image()?
            .write_to(&mut out, image::ImageFormat::Png)?;
        Ok(out.into_inner())
    }

    /// Run `f` with the pixels in their stored format and their stride.
    fn with_pixels<R>(&self, f: impl FnOnce(&[u8], usize) -> R) -> Result<R, TextureError> {
        match &self.0.storage {
            Storage::Memory { bytes, stride } => Ok(f(bytes, *stride)),
            Storage::Gpu(gpu) => {
                let bytes = gpu.read_pixels(self.width(), self.height())?;
                Ok(f(&bytes, self.width() as usize * 4))
            }
        }
    }
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("format", &self.format())
            .field("gpu", &self.is_gpu())
            .finish()
    }
}

/// Downloads a texture into a chosen [`MemoryFormat`].
pub struct TextureDownloader<'a> {
    texture: &'a Texture,
    format: MemoryFormat,
}

impl<'a> TextureDownloader<'a> {
    pub fn new(texture: &'a Texture) -> Self {
        Self {
            texture,
            format: MemoryFormat::default(),
        }
    }

    pub fn format(mut self, format: MemoryFormat) -> Self {
        self.format = format;
        self
    }

    pub fn download_into(&self, data: &mut [u8], stride: usize) -> Result<(), TextureError> {
        let width = self.texture.width();
        let height = self.texture.height();
        let row_bytes = width as usize * self.format.bytes_per_pixel();
        if stride < row_bytes {
            return Err(TextureError::StrideTooSmall {
                stride,
                width,
                format: self.format,
            });
        }
        let needed = required_len(stride, row_bytes, height)
            .ok_or(TextureError::StrideOverflow { stride, height })?;
        if data.len() < needed {
            return Err(TextureError::BufferTooSmall {
                needed,
                actual: data.len(),
            });
        }
        let src_format = self.texture.format();
        self.texture.with_pixels(|src, src_stride| {
            convert(
                src_format,
                src,
                src_stride,
                self.format,
                data,
                stride,
                width,
                height,
            )
        })
    }

    /// Download into a new buffer with tightly packed rows. Returns the
    /// bytes and the stride.
    pub fn download_bytes(&self) -> Result<(Vec<u8>, usize), TextureError> {
        let stride = self.texture.width() as usize * self.format.bytes_per_pixel();
        let mut data = vec![0u8; stride * self.texture.height() as usize];
        self.download_into(&mut data, stride)?;
        Ok((data, stride))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red_texture() -> Texture {
        let pixels: Vec<u8> = [255u8, 0, 0, 255].repeat(4);
        Texture::from_memory(2, 2, MemoryFormat::R8G8B8A8, pixels, 8).unwrap()
    }

    #[test]
    fn test_download_default_format() {
        let texture = red_texture();
        let mut data = vec![0u8; 16];
        texture.download(&mut data, 8).unwrap();
        for px in data.chunks_exact(4) {
            assert_eq!(u32::from_le_bytes([px[0], px[1], px[2], px[3]]), 0xFFFF0000);
        }
    }

    #[test]
    fn test_download_buffer_checks() {
        let texture = red_texture();
        let mut small = vec![0u8; 15];
        assert!(matches!(
            texture.download(&mut small, 8),
            Err(TextureError::BufferTooSmall { needed: 16, .. })
        ));
        let mut data = vec![0u8; 64];
        assert!(matches!(
            texture.download(&mut data, 4),
            Err(TextureError::StrideTooSmall { .. })
        ));
    }

    #[test]
    fn test_huge_stride_is_an_error() {
        let texture = Texture::from_memory(
            2,
            3,
            MemoryFormat::B8G8R8A8Premultiplied,
            vec![0u8; 24],
            8,
        )
        .unwrap();
        let stride = usize::MAX / 2 + 1;
        assert!(matches!(
            texture.download(&mut [0u8; 64], stride),
            Err(TextureError::StrideOverflow { height: 3, .. })
        ));
        let result = Texture::from_memory(
            2,
            3,
            MemoryFormat::B8G8R8A8Premultiplied,
            vec![0u8; 24],
            stride,
        );
        assert!(matches!(result, Err(TextureError::StrideOverflow { .. })));
    }

    #[test]
    fn test_from_memory_rejects_short_data() {
        let result = Texture::from_memory(4, 4, MemoryFormat::B8G8R8A8, vec![0u8; 10], 16);
        assert!(matches!(result, Err(TextureError::BufferTooSmall { .. })));
        let result = Texture::from_memory(0, 4, MemoryFormat::B8G8R8A8, vec![], 16);
        assert!(matches!(result, Err(TextureError::InvalidSize(0, 4))));
    }

    #[test]
    fn test_png_roundtrip_in_memory() {
        let texture = red_texture();
        let png = texture.to_png_bytes().unwrap();
        let decoded = Texture::from_png_bytes(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (2, 2));
        let (a, _) = TextureDownloader::new(&texture).download_bytes().unwrap();
        let (b, _) = TextureDownloader::new(&decoded).download_bytes().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_downloader_rgb() {
        let texture = red_texture();
        let (bytes, stride) = TextureDownloader::new(&texture)
            .format(MemoryFormat::B8G8R8)
            .download_bytes()
            .unwrap();
        assert_eq!(stride, 6);
        assert_eq!(&bytes[..3], &[0, 0, 255]);
    }
}
