//! The wgpu backend shared by the GL and Vulkan renderers.

use std::collections::HashMap;
use std::ops::Range;

use wgpu::util::DeviceExt;
use wgpu::{BindGroup, BindGroupLayout, Buffer, BufferUsages, RenderPipeline, Sampler};

use super::context::GpuContext;
use super::flatten::{flatten, DrawQuad, QuadSource};
use super::pipeline::{
    create_quad_pipeline, create_texture_layout, create_uniform_layout, QuadInstance, Uniforms,
    QUAD_INDICES, QUAD_VERTICES,
};
use crate::config::DebugFlags;
use crate::error::{RealizeError, RenderError};
use crate::geometry::Rect;
use crate::node::RenderNode;
use crate::region::Region;
use crate::renderer::{viewport_size, RendererBackend, RendererKind, SharedWindow, Surface};
use crate::texture::{GpuTextureBuilder, MemoryFormat, Texture, TextureDownloader};

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

struct WindowTarget {
    // Keeps the native window alive as long as the wgpu surface
    _window: SharedWindow,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
}

/// Pixels of a texture this renderer cannot sample directly.
struct ForeignPixels {
    texture: Texture,
    bytes: Vec<u8>,
}

pub(crate) struct GpuRenderer {
    context: GpuContext,
    debug: DebugFlags,
    uniform_layout: BindGroupLayout,
    texture_layout: BindGroupLayout,
    pipelines: HashMap<wgpu::TextureFormat, RenderPipeline>,
    sampler: Sampler,
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    uniform_buffer: Buffer,
    uniform_bind_group: BindGroup,
    white_bind_group: BindGroup,
    instance_buffer: Buffer,
    instance_buffer_capacity: usize,
    window: Option<WindowTarget>,
}

impl GpuRenderer {
    pub fn new(
        context: GpuContext,
        debug: DebugFlags,
        surface: Option<&Surface>,
    ) -> Result<Self, RealizeError> {
        let _current = context.make_current();
        let device = context.device();

        let uniform_layout = create_uniform_layout(device);
        let texture_layout = create_texture_layout(device);

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad vertices"),
            contents: bytemuck::cast_slice(QUAD_VERTICES),
            usage: BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad indices"),
            contents: bytemuck::cast_slice(QUAD_INDICES),
            usage: BufferUsages::INDEX,
        });
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad uniforms"),
            contents: bytemuck::cast_slice(&[Uniforms::new(1, 1)]),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("quad uniforms"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("quad sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let white = upload_rgba(&context, &[255, 255, 255, 255], 1, 1);
        let white_bind_group = texture_bind_group(device, &texture_layout, &white, &sampler);

        let initial_capacity = 256;
        let instance_buffer = create_instance_buffer(device, initial_capacity);

        let window = match surface.and_then(Surface::window) {
            Some(window) => Some(configure_window(&context, window, surface)?),
            None => None,
        };

        Ok(Self {
            context: context.clone(),
            debug,
            uniform_layout,
            texture_layout,
            pipelines: HashMap::new(),
            sampler,
            vertex_buffer,
            index_buffer,
            uniform_buffer,
            uniform_bind_group,
            white_bind_group,
            instance_buffer,
            instance_buffer_capacity: initial_capacity,
            window,
        })
    }

    fn ensure_instance_capacity(&mut self, count: usize) {
        if count > self.instance_buffer_capacity {
            let new_capacity = (self.instance_buffer_capacity * 2).max(count);
            self.instance_buffer = create_instance_buffer(self.context.device(), new_capacity);
            self.instance_buffer_capacity = new_capacity;
        }
    }

    /// Whether `texture` can be sampled directly by this renderer.
    fn samples_in_place(&self, texture: &Texture) -> bool {
        texture.gpu().is_some_and(|gpu| {
            gpu.context.same_context(&self.context)
                && gpu.texture.usage().contains(wgpu::TextureUsages::TEXTURE_BINDING)
                && gpu.texture.size().width == texture.width()
                && gpu.texture.size().height == texture.height()
        })
    }

    /// Download every texture in `quads` that cannot be sampled in place.
    ///
    /// Must run before this renderer's context is bound. Textures from
    /// another context bind that context to read back, and holding two
    /// context locks at once can deadlock against a thread taking them in
    /// the other order.
    fn download_foreign(&self, quads: &[DrawQuad]) -> Result<Vec<ForeignPixels>, RenderError> {
        let max = self.context.max_texture_size();
        let mut foreign: Vec<ForeignPixels> = Vec::new();
        for quad in quads {
            let QuadSource::Texture(texture) = &quad.source else {
                continue;
            };
            if self.samples_in_place(texture) || foreign.iter().any(|f| f.texture.ptr_eq(texture)) {
                continue;
            }
            if texture.width() > max || texture.height() > max {
                return Err(RenderError::Validation(format!(
                    "texture {}x{} exceeds the maximum size {}",
                    texture.width(),
                    texture.height(),
                    max
                )));
            }
            let (bytes, _) = TextureDownloader::new(texture)
                .format(MemoryFormat::R8G8B8A8Premultiplied)
                .download_bytes()?;
            foreign.push(ForeignPixels {
                texture: texture.clone(),
                bytes,
            });
        }
        Ok(foreign)
    }

    /// Bind group sampling `texture`. GPU textures from this context are
    /// sampled in place; anything else is uploaded from `foreign`.
    fn bind_texture(
        &self,
        texture: &Texture,
        foreign: &[ForeignPixels],
    ) -> Result<BindGroup, RenderError> {
        let device = self.context.device();
        if let Some(gpu) = texture.gpu().filter(|_| self.samples_in_place(texture)) {
            return Ok(texture_bind_group(
                device,
                &self.texture_layout,
                &gpu.texture,
                &self.sampler,
            ));
        }

        let pixels = foreign
            .iter()
            .find(|f| f.texture.ptr_eq(texture))
            .ok_or_else(|| RenderError::Validation("texture was not downloaded before drawing".to_string()))?;
        let uploaded = upload_rgba(&self.context, &pixels.bytes, texture.width(), texture.height());
        Ok(texture_bind_group(
            device,
            &self.texture_layout,
            &uploaded,
            &self.sampler,
        ))
    }

    /// Draw `quads` into `view`, clearing it first.
    fn draw(
        &mut self,
        quads: &[DrawQuad],
        foreign: &[ForeignPixels],
        view: &wgpu::TextureView,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Result<(), RenderError> {
        // Consecutive quads sampling the same texture share one draw call
        let mut textures: Vec<(Texture, BindGroup)> = Vec::new();
        let mut batches: Vec<(Option<usize>, Range<u32>)> = Vec::new();
        let mut previous: Option<&QuadSource> = None;
        for (i, quad) in quads.iter().enumerate() {
            let i = i as u32;
            if let (Some(prev), Some((_, range))) = (previous, batches.last_mut()) {
                if prev.same_as(&quad.source) {
                    range.end = i + 1;
                    continue;
                }
            }
            let slot = match &quad.source {
                QuadSource::Solid => None,
                QuadSource::Texture(texture) => {
                    match textures.iter().position(|(t, _)| t.ptr_eq(texture)) {
                        Some(index) => Some(index),
                        None => {
                            let bind_group = self.bind_texture(texture, foreign)?;
                            textures.push((texture.clone(), bind_group));
                            Some(textures.len() - 1)
                        }
                    }
                }
            };
            batches.push((slot, i..i + 1));
            previous = Some(&quad.source);
        }

        let instances: Vec<QuadInstance> = quads.iter().map(|q| q.instance).collect();
        self.ensure_instance_capacity(instances.len());

        let queue = self.context.queue();
        queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::cast_slice(&[Uniforms::new(width, height)]),
        );
        if !instances.is_empty() {
            queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));
        }

        let device = self.context.device();
        let pipeline = self.pipelines.entry(format).or_insert_with(|| {
            log::debug!("Creating quad pipeline for {:?}", format);
            create_quad_pipeline(device, &self.uniform_layout, &self.texture_layout, format)
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("render nodes"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("render nodes"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
            pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            for (slot, range) in &batches {
                let bind_group = match slot {
                    Some(index) => &textures[*index].1,
                    None => &self.white_bind_group,
                };
                pass.set_bind_group(1, bind_group, &[]);
                pass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, range.clone());
            }
        }
        queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn render_window(&mut self, node: &RenderNode) -> Result<(), RenderError> {
        let Some(window) = self.window.as_ref() else {
            return Err(RenderError::Surface(
                "renderer was not realized for a window".to_string(),
            ));
        };
        let format = window.config.format;
        let (width, height) = (window.config.width, window.config.height);

        // Flattening may rasterise fallbacks that read other contexts' textures
        let quads = flatten(node, 0.0, 0.0, width, height, self.debug)?;
        let foreign = self.download_foreign(&quads)?;

        let context = self.context.clone();
        let _current = context.make_current();
        let frame = match window.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                window.surface.configure(self.context.device(), &window.config);
                return Err(RenderError::SurfaceLost);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Out of GPU memory");
                return Err(RenderError::OutOfMemory);
            }
            Err(e) => {
                log::error!("Surface error: {:?}", e);
                return Err(RenderError::Surface(e.to_string()));
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.draw(&quads, &foreign, &view, format, width, height)?;
        frame.present();
        Ok(())
    }
}

impl RendererBackend for GpuRenderer {
    fn kind(&self) -> RendererKind {
        self.context.kind()
    }

    fn render_texture(&mut self, node: &RenderNode, viewport: &Rect) -> Result<Texture, RenderError> {
        let (width, height) = viewport_size(viewport)?;
        let max = self.context.max_texture_size();
        if width > max || height > max {
            return Err(RenderError::InvalidViewport(viewport.width, viewport.height));
        }

        let quads = flatten(node, viewport.x, viewport.y, width, height, self.debug)?;
        let foreign = self.download_foreign(&quads)?;

        let context = self.context.clone();
        let _current = context.make_current();

        let target = context.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("render target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());
        self.draw(&quads, &foreign, &view, TARGET_FORMAT, width, height)?;

        Ok(GpuTextureBuilder::new()
            .context(&context)
            .texture(target)
            .build()?)
    }

    fn render_to_surface(
        &mut self,
        node: &RenderNode,
        surface: &Surface,
        region: Option<&Region>,
    ) -> Result<(), RenderError> {
        if surface.is_window() {
            if region.is_some() {
                log::debug!("Window surfaces are always redrawn in full");
            }
            return self.render_window(node);
        }

        let full = Rect::new(0.0, 0.0, surface.width() as f32, surface.height() as f32);
        let texture = self.render_texture(node, &full)?;
        let (bytes, stride) = TextureDownloader::new(&texture)
            .format(MemoryFormat::R8G8B8A8Premultiplied)
            .download_bytes()?;
        for rect in surface.damage_rects(region) {
            let offset = rect.y as usize * stride + rect.x as usize * 4;
            surface.write_pixels(rect, &bytes[offset..], stride)?;
        }
        Ok(())
    }
}

fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("quad instances"),
        size: (capacity * std::mem::size_of::<QuadInstance>()) as u64,
        usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn upload_rgba(context: &GpuContext, bytes: &[u8], width: u32, height: u32) -> wgpu::Texture {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = context.device().create_texture(&wgpu::TextureDescriptor {
        label: Some("node texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TARGET_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    context.queue().write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        bytes,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * 4),
            rows_per_image: Some(height),
        },
        size,
    );
    texture
}

fn texture_bind_group(
    device: &wgpu::Device,
    layout: &BindGroupLayout,
    texture: &wgpu::Texture,
    sampler: &Sampler,
) -> BindGroup {
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("quad texture"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

fn configure_window(
    context: &GpuContext,
    window: SharedWindow,
    surface: Option<&Surface>,
) -> Result<WindowTarget, RealizeError> {
    let (width, height) = surface
        .map(|s| (s.width(), s.height()))
        .unwrap_or((1, 1));
    let wgpu_surface = context
        .instance()
        .create_surface(window.clone())
        .map_err(|e| RealizeError::Surface(e.to_string()))?;

    let caps = wgpu_surface.get_capabilities(context.adapter());
    // Prefer plain 8-bit formats; shaders output premultiplied values as is
    let format = caps
        .formats
        .iter()
        .find(|f| {
            matches!(
                f,
                wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Rgba8Unorm
            )
        })
        .or_else(|| caps.formats.first())
        .copied()
        .ok_or(RealizeError::UnsupportedSurface(context.kind()))?;
    log::info!("Using surface format: {:?}", format);

    let alpha_mode = if caps
        .alpha_modes
        .contains(&wgpu::CompositeAlphaMode::PreMultiplied)
    {
        wgpu::CompositeAlphaMode::PreMultiplied
    } else {
        caps.alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto)
    };

    let config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: width.max(1),
        height: height.max(1),
        present_mode: wgpu::PresentMode::Fifo,
        alpha_mode,
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    wgpu_surface.configure(context.device(), &config);

    Ok(WindowTarget {
        _window: window,
        surface: wgpu_surface,
        config,
    })
}
