//! Textures that live in GPU memory.

use std::sync::mpsc::channel;

use super::format::MemoryFormat;
use super::{Storage, Texture};
use crate::error::TextureError;
use crate::gpu::GpuContext;

pub(crate) struct GpuTexture {
    pub(crate) context: GpuContext,
    pub(crate) texture: wgpu::Texture,
}

impl GpuTexture {
    /// Copy the texture into tightly packed rows. Binds the owning context
    /// for the duration of the copy.
    pub(crate) fn read_pixels(&self, width: u32, height: u32) -> Result<Vec<u8>, TextureError> {
        let _current = self.context.make_current();
        let device = self.context.device();
        let queue = self.context.queue();

        let row_bytes = width * 4;
        let padded_bpr = row_bytes.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("texture download"),
            size: u64::from(padded_bpr) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("texture download"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bpr),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit([encoder.finish()]);

        let slice = readback.slice(..);
        let (sender, receiver) = channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = sender.send(res);
        });
        device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| TextureError::Readback(e.to_string()))?;
        receiver
            .recv()
            .map_err(|e| TextureError::Readback(e.to_string()))?
            .map_err(|e| TextureError::Readback(e.to_string()))?;

        let mapped = slice.get_mapped_range();
        let mut data = vec![0u8; row_bytes as usize * height as usize];
        for (dst, src) in data
            .chunks_exact_mut(row_bytes as usize)
            .zip(mapped.chunks(padded_bpr as usize))
        {
            dst.copy_from_slice(&src[..row_bytes as usize]);
        }
        drop(mapped);
        readback.unmap();
        Ok(data)
    }
}

fn memory_format_for(format: wgpu::TextureFormat) -> Option<MemoryFormat> {
    match format {
        wgpu::TextureFormat::Rgba8Unorm => Some(MemoryFormat::R8G8B8A8Premultiplied),
        wgpu::TextureFormat::Bgra8Unorm => Some(MemoryFormat::B8G8R8A8Premultiplied),
        _ => None,
    }
}

/// Wraps an existing GPU texture as a [`Texture`].
///
/// Building does not copy pixels; they stay on the GPU until downloaded.
/// The texture must have `COPY_SRC` usage and an 8-bit RGBA or BGRA format
/// holding premultiplied alpha.
///
/// ```ignore
/// let texture = GpuTextureBuilder::new()
///     .context(&context)
///     .texture(wgpu_texture)
///     .build()?;
/// ```
#[derive(Default)]
pub struct GpuTextureBuilder {
    context: Option<GpuContext>,
    texture: Option<wgpu::Texture>,
    width: Option<u32>,
    height: Option<u32>,
}

impl GpuTextureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(mut self, context: &GpuContext) -> Self {
        self.context = Some(context.clone());
        self
    }

    pub fn texture(mut self, texture: wgpu::Texture) -> Self {
        self.texture = Some(texture);
        self
    }

    /// Override the width; defaults to the texture's own.
    pub fn width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    pub fn build(self) -> Result<Texture, TextureError> {
        let context = self.context.ok_or(TextureError::MissingField("context"))?;
        let texture = self.texture.ok_or(TextureError::MissingField("texture"))?;
        let size = texture.size();
        let width = self.width.unwrap_or(size.width);
        let height = self.height.unwrap_or(size.height);
        if width == 0 || height == 0 || width > size.width || height > size.height {
            return Err(TextureError::InvalidSize(width, height));
        }
        let format = memory_format_for(texture.format()).ok_or_else(|| {
            TextureError::Readback(format!("unsupported texture format {:?}", texture.format()))
        })?;
        if !texture.usage().contains(wgpu::TextureUsages::COPY_SRC) {
            return Err(TextureError::Readback(
                "texture was created without COPY_SRC usage".to_string(),
            ));
        }
        Ok(Texture::from_storage(
            width,
            height,
            format,
            Storage::Gpu(GpuTexture { context, texture }),
        ))
    }
}
