use super::{quad_buffer, quad_layout};
use crate::data::{types::PointVertex, PointCloud};
use wgpu::util::DeviceExt;

/// World-space splat size before attenuation.
pub const POINT_SIZE: f32 = 0.02;

/// GPU copy of the installed cloud. Owned by the renderer's cloud slot.
#[derive(Debug)]
pub struct CloudGpu {
    pub vtx: wgpu::Buffer,
    pub len: u32,
}

impl CloudGpu {
    pub fn upload(device: &wgpu::Device, cloud: &PointCloud) -> Self {
        let vtx = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Point Cloud Instances"),
            contents: bytemuck::cast_slice(&cloud.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Self {
            vtx,
            len: cloud.vertices.len() as u32,
        }
    }

    pub fn release(self) {
        self.vtx.destroy();
    }
}

pub struct PointsPipeline {
    pipeline: wgpu::RenderPipeline,
    quad_vb: wgpu::Buffer,
}

impl PointsPipeline {
    pub fn new(
        device: &wgpu::Device,
        scene_layout: &wgpu::BindGroupLayout,
        color_fmt: wgpu::TextureFormat,
        depth_fmt: wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shaders/points.wgsl"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../../shaders/points.wgsl").into()),
        });

        let quad_vb = quad_buffer(device, "Points Quad VB");

        let vbuf_layouts = [
            quad_layout(),
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<PointVertex>() as u64,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &[
                    // Position
                    wgpu::VertexAttribute {
                        shader_location: 1,
                        offset: 0,
                        format: wgpu::VertexFormat::Float32x3,
                    },
                    // Colour
                    wgpu::VertexAttribute {
                        shader_location: 2,
                        offset: 12,
                        format: wgpu::VertexFormat::Float32x3,
                    },
                    // Normal
                    wgpu::VertexAttribute {
                        shader_location: 3,
                        offset: 24,
                        format: wgpu::VertexFormat::Float32x3,
                    },
                ],
            },
        ];

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Points PipelineLayout"),
            bind_group_layouts: &[scene_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Points Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &vbuf_layouts,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_fmt,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_fmt,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Self { pipeline, quad_vb }
    }

    pub fn draw<'a>(
        &'a self,
        rpass: &mut wgpu::RenderPass<'a>,
        scene: &'a wgpu::BindGroup,
        cloud: &'a CloudGpu,
    ) {
        if cloud.len == 0 {
            return;
        }
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, scene, &[]);
        rpass.set_vertex_buffer(0, self.quad_vb.slice(..));
        rpass.set_vertex_buffer(1, cloud.vtx.slice(..));
        rpass.draw(0..6, 0..cloud.len);
    }
}
