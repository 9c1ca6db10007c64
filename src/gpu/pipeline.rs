//! Vertex/instance layouts and the textured quad pipeline.
//!
//! Every primitive the GPU backend draws is one instance of a unit quad:
//! placed by a local rect and a 2D affine transform, sampling a texture
//! (a 1x1 white one for solid colors), tinted by a premultiplied color and
//! discarded outside an axis-aligned device clip.

use wgpu::{
    BindGroupLayout, Device, RenderPipeline, TextureFormat, VertexAttribute, VertexBufferLayout,
    VertexFormat, VertexStepMode,
};

const SHADER_SOURCE: &str = r#"
struct Uniforms {
    target_size: vec2<f32>,
    _pad: vec2<f32>,
}

@group(0) @binding(0) var<uniform> uniforms: Uniforms;
@group(1) @binding(0) var quad_texture: texture_2d<f32>;
@group(1) @binding(1) var quad_sampler: sampler;

struct VertexInput {
    @location(0) position: vec2<f32>,
}

struct InstanceInput {
    @location(1) rect: vec4<f32>,        // x, y, width, height in local space
    @location(2) uv_rect: vec4<f32>,     // u0, v0, u1, v1
    @location(3) color: vec4<f32>,       // premultiplied tint
    @location(4) transform_x: vec4<f32>, // a, b, tx, _
    @location(5) transform_y: vec4<f32>, // c, d, ty, _
    @location(6) clip_rect: vec4<f32>,   // x0, y0, x1, y1 in target pixels
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) color: vec4<f32>,
    @location(2) clip_rect: vec4<f32>,
}

@vertex
fn vs_main(vertex: VertexInput, instance: InstanceInput) -> VertexOutput {
    var out: VertexOutput;

    let local = vec3<f32>(instance.rect.xy + vertex.position * instance.rect.zw, 1.0);
    let device = vec2<f32>(
        dot(instance.transform_x.xyz, local),
        dot(instance.transform_y.xyz, local)
    );

    // Target pixels to NDC, y down
    let ndc = vec2<f32>(
        device.x / uniforms.target_size.x * 2.0 - 1.0,
        1.0 - device.y / uniforms.target_size.y * 2.0
    );
    out.clip_position = vec4<f32>(ndc, 0.0, 1.0);
    out.uv = mix(instance.uv_rect.xy, instance.uv_rect.zw, vertex.position);
    out.color = instance.color;
    out.clip_rect = instance.clip_rect;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let texel = textureSample(quad_texture, quad_sampler, in.uv);
    let p = in.clip_position.xy;
    if (p.x < in.clip_rect.x || p.y < in.clip_rect.y || p.x > in.clip_rect.z || p.y > in.clip_rect.w) {
        discard;
    }
    return texel * in.color;
}
"#;

/// Uniform buffer contents.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct Uniforms {
    /// Render target size in pixels
    pub target_size: [f32; 2],
    pub _pad: [f32; 2],
}

impl Uniforms {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            target_size: [width as f32, height as f32],
            _pad: [0.0; 2],
        }
    }
}

/// A corner of the unit quad.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct QuadVertex {
    pub position: [f32; 2],
}

impl QuadVertex {
    pub fn desc() -> VertexBufferLayout<'static> {
        VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as u64,
            step_mode: VertexStepMode::Vertex,
            attributes: &[VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: VertexFormat::Float32x2,
            }],
        }
    }
}

pub(crate) const QUAD_VERTICES: &[QuadVertex] = &[
    QuadVertex {
        position: [0.0, 0.0],
    },
    QuadVertex {
        position: [1.0, 0.0],
    },
    QuadVertex {
        position: [0.0, 1.0],
    },
    QuadVertex {
        position: [1.0, 1.0],
    },
];

pub(crate) const QUAD_INDICES: &[u16] = &[0, 1, 2, 1, 3, 2];

/// Clip rect that lets everything through.
pub(crate) const NO_CLIP: [f32; 4] = [-1.0e9, -1.0e9, 1.0e9, 1.0e9];

/// Per-instance data for one quad.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct QuadInstance {
    pub rect: [f32; 4],
    pub uv_rect: [f32; 4],
    pub color: [f32; 4],
    pub transform_x: [f32; 4],
    pub transform_y: [f32; 4],
    pub clip_rect: [f32; 4],
}

impl Default for QuadInstance {
    fn default() -> Self {
        Self {
            rect: [0.0; 4],
            uv_rect: [0.0, 0.0, 1.0, 1.0],
            color: [1.0; 4],
            transform_x: [1.0, 0.0, 0.0, 0.0],
            transform_y: [0.0, 1.0, 0.0, 0.0],
            clip_rect: NO_CLIP,
        }
    }
}

impl QuadInstance {
    /// Set the transform from cairo-order 2D components.
    pub fn with_transform(mut self, (xx, yx, xy, yy, dx, dy): (f32, f32, f32, f32, f32, f32)) -> Self {
        self.transform_x = [xx, xy, dx, 0.0];
        self.transform_y = [yx, yy, dy, 0.0];
        self
    }

    pub fn desc() -> VertexBufferLayout<'static> {
        const ATTRIBUTES: [VertexAttribute; 6] = wgpu::vertex_attr_array![
            1 => Float32x4,
            2 => Float32x4,
            3 => Float32x4,
            4 => Float32x4,
            5 => Float32x4,
            6 => Float32x4
        ];
        VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadInstance>() as u64,
            step_mode: VertexStepMode::Instance,
            attributes: &ATTRIBUTES,
        }
    }
}

pub(crate) fn create_uniform_layout(device: &Device) -> BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("quad uniforms"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

pub(crate) fn create_texture_layout(device: &Device) -> BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("quad texture"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

pub(crate) fn create_quad_pipeline(
    device: &Device,
    uniform_layout: &BindGroupLayout,
    texture_layout: &BindGroupLayout,
    format: TextureFormat,
) -> RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("quad shader"),
        source: wgpu::ShaderSource::Wgsl(SHADER_SOURCE.into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("quad pipeline layout"),
        bind_group_layouts: &[uniform_layout, texture_layout],
        immediate_size: 0,
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("quad pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[QuadVertex::desc(), QuadInstance::desc()],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_layout() {
        assert_eq!(std::mem::size_of::<QuadInstance>(), 96);
        assert_eq!(QuadInstance::desc().attributes.len(), 6);
        assert_eq!(QUAD_INDICES.len(), 6);
    }

    #[test]
    fn test_with_transform() {
        let instance = QuadInstance::default().with_transform((2.0, 0.0, 0.0, 3.0, 5.0, 7.0));
        assert_eq!(instance.transform_x, [2.0, 0.0, 5.0, 0.0]);
        assert_eq!(instance.transform_y, [0.0, 3.0, 7.0, 0.0]);
    }
}
