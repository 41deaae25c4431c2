// Screen-space glow sprites: constant pixel size, additive, drawn over everything.

use super::{markers::MarkerGpu, quad_buffer, quad_layout};
use crate::data::types::GlowInstance;
use crate::markers::{glow_texture, GLOW_TEXTURE_SIZE};
use wgpu::util::DeviceExt;

pub struct GlowPipeline {
    pipeline: wgpu::RenderPipeline,
    texture: wgpu::Texture,
    texture_bind: wgpu::BindGroup,
    quad_vb: wgpu::Buffer,
}

impl GlowPipeline {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        scene_layout: &wgpu::BindGroupLayout,
        color_fmt: wgpu::TextureFormat,
        depth_fmt: wgpu::TextureFormat,
    ) -> Self {
        let size = GLOW_TEXTURE_SIZE;
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("Glow Gradient"),
                size: wgpu::Extent3d {
                    width: size,
                    height: size,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &glow_texture(size),
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Glow Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Glow Texture Layout"),
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
        let texture_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Glow Texture BindGroup"),
            layout: &texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Glow WGSL"),
            source: wgpu::ShaderSource::Wgsl(GLOW_WGSL.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Glow PipelineLayout"),
            bind_group_layouts: &[scene_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        const GLOW_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x3];

        let additive = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Glow Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[
                    quad_layout(),
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<GlowInstance>() as u64,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &GLOW_ATTRS,
                    },
                ],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState::default(),
            // Never occluded, never occludes.
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_fmt,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_fmt,
                    blend: Some(wgpu::BlendState {
                        color: additive,
                        alpha: additive,
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Self {
            pipeline,
            texture,
            texture_bind,
            quad_vb: quad_buffer(device, "Glow Quad VB"),
        }
    }

    pub fn draw<'a>(
        &'a self,
        rpass: &mut wgpu::RenderPass<'a>,
        scene: &'a wgpu::BindGroup,
        markers: &'a MarkerGpu,
    ) {
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, scene, &[]);
        rpass.set_bind_group(1, &self.texture_bind, &[]);
        rpass.set_vertex_buffer(0, self.quad_vb.slice(..));
        rpass.set_vertex_buffer(1, markers.glows.slice(..));
        rpass.draw(0..6, 0..markers.len);
    }

    /// Releases the gradient texture and sprite quad.
    pub fn release(&self) {
        self.texture.destroy();
        self.quad_vb.destroy();
    }
}

pub const GLOW_WGSL: &str = r#"
struct Scene {
    view_proj: mat4x4<f32>,
    world: mat4x4<f32>,
    viewport_size: vec2<f32>,
    point_size: f32,
    glow_size_px: f32,
    light_dir: vec3<f32>,
    ambient: f32,
    camera_pos: vec3<f32>,
    _pad0: f32,
};
@group(0) @binding(0) var<uniform> S: Scene;
@group(1) @binding(0) var glow_tex: texture_2d<f32>;
@group(1) @binding(1) var glow_samp: sampler;

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@location(0) corner: vec2<f32>, @location(1) position: vec3<f32>) -> VsOut {
    var out: VsOut;
    var clip = S.view_proj * S.world * vec4<f32>(position, 1.0);
    // corner is in [-1,1]; the sprite spans glow_size_px on screen.
    clip.x += corner.x * S.glow_size_px / S.viewport_size.x * clip.w;
    clip.y += corner.y * S.glow_size_px / S.viewport_size.y * clip.w;
    out.clip = clip;
    out.uv = vec2<f32>(corner.x * 0.5 + 0.5, 0.5 - corner.y * 0.5);
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    return textureSample(glow_tex, glow_samp, in.uv);
}
"#;
