//! Instanced textured-quad pipeline.
//!
//! Geometry is a shared vertex buffer (position + uv). Every sprite is one
//! instance carrying its full clip-space transform and tint, so a run of
//! sprites sharing a texture is a single draw call.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use crate::backend::DrawCall;

/// WGSL for sprite rendering.
pub(crate) const SPRITE_SHADER: &str = r#"
struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) uv: vec2<f32>,
};

struct InstanceInput {
    @location(2) transform_0: vec4<f32>,
    @location(3) transform_1: vec4<f32>,
    @location(4) transform_2: vec4<f32>,
    @location(5) transform_3: vec4<f32>,
    @location(6) tint: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) tint: vec4<f32>,
};

@group(0) @binding(0)
var sprite_texture: texture_2d<f32>;
@group(0) @binding(1)
var sprite_sampler: sampler;

@vertex
fn vs_main(vertex: VertexInput, instance: InstanceInput) -> VertexOutput {
    let transform = mat4x4<f32>(
        instance.transform_0,
        instance.transform_1,
        instance.transform_2,
        instance.transform_3,
    );

    var out: VertexOutput;
    out.clip_position = transform * vec4<f32>(vertex.position, 0.0, 1.0);
    out.uv = vertex.uv;
    out.tint = instance.tint;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let texel = textureSample(sprite_texture, sprite_sampler, in.uv);
    return vec4<f32>(texel.rgb * in.tint.rgb, texel.a * in.tint.a);
}
"#;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub(crate) struct QuadVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

impl QuadVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x2,
        1 => Float32x2,
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }

    /// Interleave positions and uvs. Extra entries in the longer slice are
    /// dropped.
    pub fn interleave(positions: &[Vec2], uvs: &[Vec2]) -> Vec<Self> {
        positions
            .iter()
            .zip(uvs)
            .map(|(p, uv)| Self {
                position: p.to_array(),
                uv: uv.to_array(),
            })
            .collect()
    }
}

/// Per-sprite instance data.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub(crate) struct SpriteInstance {
    pub transform: [[f32; 4]; 4],
    pub tint: [f32; 4],
}

impl SpriteInstance {
    const ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        2 => Float32x4,
        3 => Float32x4,
        4 => Float32x4,
        5 => Float32x4,
        6 => Float32x4,
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

impl From<&DrawCall> for SpriteInstance {
    fn from(draw: &DrawCall) -> Self {
        Self {
            transform: draw.transform.to_cols_array_2d(),
            tint: draw.tint.to_array(),
        }
    }
}

/// A run of consecutive draws that share geometry and texture.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Batch<G, T> {
    pub geometry: G,
    pub texture: T,
    pub instances: std::ops::Range<u32>,
}

/// Split draws into batches, keeping submission order so later sprites
/// still paint over earlier ones.
pub(crate) fn batch_draws<G, T>(draws: &[DrawCall], key: impl Fn(&DrawCall) -> (G, T)) -> Vec<Batch<G, T>>
where
    G: PartialEq,
    T: PartialEq,
{
    let mut batches: Vec<Batch<G, T>> = Vec::new();
    for (index, draw) in draws.iter().enumerate() {
        let index = index as u32;
        let (geometry, texture) = key(draw);
        match batches.last_mut() {
            Some(last) if last.geometry == geometry && last.texture == texture => {
                last.instances.end = index + 1;
            }
            _ => batches.push(Batch {
                geometry,
                texture,
                instances: index..index + 1,
            }),
        }
    }
    batches
}

/// Render pipeline plus the texture bind group layout it samples through.
pub(crate) struct SpritePipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub texture_layout: wgpu::BindGroupLayout,
    pub sampler: wgpu::Sampler,
}

impl SpritePipeline {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Sprite Texture Layout"),
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
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Sprite Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Sprite Shader"),
            source: wgpu::ShaderSource::Wgsl(SPRITE_SHADER.into()),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Sprite Pipeline Layout"),
            bind_group_layouts: &[&texture_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Sprite Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[QuadVertex::layout(), SpriteInstance::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
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
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            texture_layout,
            sampler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{GeometryHandle, TextureHandle};
    use glam::{Mat4, Vec4};

    fn draw(texture: u64) -> DrawCall {
        DrawCall {
            geometry: GeometryHandle(1),
            transform: Mat4::IDENTITY,
            texture: TextureHandle(texture),
            tint: Vec4::ONE,
        }
    }

    #[test]
    fn test_batches_keep_submission_order() {
        let draws = [draw(1), draw(1), draw(2), draw(1), draw(1), draw(1)];
        let batches = batch_draws(&draws, |d| (d.geometry, d.texture));

        let ranges: Vec<_> = batches.iter().map(|b| (b.texture.0, b.instances.clone())).collect();
        assert_eq!(ranges, vec![(1, 0..2), (2, 2..3), (1, 3..6)]);
    }

    #[test]
    fn test_no_draws_no_batches() {
        assert!(batch_draws(&[], |d| (d.geometry, d.texture)).is_empty());
    }

    #[test]
    fn test_instance_layout_matches_shader() {
        assert_eq!(std::mem::size_of::<SpriteInstance>(), 80);
        assert_eq!(std::mem::size_of::<QuadVertex>(), 16);

        let d = DrawCall {
            tint: Vec4::new(0.1, 0.2, 0.3, 0.4),
            transform: Mat4::from_translation(glam::Vec3::new(5.0, 6.0, 0.0)),
            ..draw(1)
        };
        let instance = SpriteInstance::from(&d);
        assert_eq!(instance.transform[3], [5.0, 6.0, 0.0, 1.0]);
        assert_eq!(instance.tint, [0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_interleave_pairs_attributes() {
        let v = QuadVertex::interleave(&[Vec2::new(-0.5, 0.5)], &[Vec2::new(0.0, 1.0), Vec2::ONE]);
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].position, [-0.5, 0.5]);
        assert_eq!(v[0].uv, [0.0, 1.0]);
    }

    fn validate_wgsl(code: &str) -> Result<(), String> {
        let module = naga::front::wgsl::parse_str(code).map_err(|e| format!("WGSL parse error: {:?}", e))?;

        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        validator
            .validate(&module)
            .map_err(|e| format!("WGSL validation error: {:?}", e))?;

        Ok(())
    }

    #[test]
    fn test_sprite_shader_is_valid() {
        validate_wgsl(SPRITE_SHADER).expect("sprite shader should be valid");
    }

    #[test]
    fn test_blit_shader_is_valid() {
        validate_wgsl(crate::gpu::target::BLIT_SHADER).expect("blit shader should be valid");
    }
}
