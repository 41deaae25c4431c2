// Reference grid on the y = 0 plane, drawn outside the scan group.

use super::hex_to_linear;
use wgpu::util::DeviceExt;

pub const GRID_SIZE: f32 = 100.0;
pub const GRID_DIVISIONS: u32 = 100;
pub const GRID_COLOR: u32 = 0x333333;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GridVertex {
    pub position: [f32; 3],
    pub color: [f32; 3], // linear
}

/// Line-list vertices: `divisions + 1` lines along each axis, centred on the origin.
pub fn grid_lines(size: f32, divisions: u32, color: [f32; 3]) -> Vec<GridVertex> {
    let half = size * 0.5;
    let step = size / divisions.max(1) as f32;
    let mut out = Vec::with_capacity(((divisions + 1) * 4) as usize);

    for i in 0..=divisions {
        let k = -half + i as f32 * step;
        for position in [[-half, 0.0, k], [half, 0.0, k], [k, 0.0, -half], [k, 0.0, half]] {
            out.push(GridVertex { position, color });
        }
    }
    out
}

pub struct GridPipeline {
    pipeline: wgpu::RenderPipeline,
    vb: wgpu::Buffer,
    vertex_count: u32,
}

impl GridPipeline {
    pub fn new(
        device: &wgpu::Device,
        scene_layout: &wgpu::BindGroupLayout,
        color_fmt: wgpu::TextureFormat,
        depth_fmt: wgpu::TextureFormat,
    ) -> Self {
        let vertices = grid_lines(GRID_SIZE, GRID_DIVISIONS, hex_to_linear(GRID_COLOR));
        let vb = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Grid VB"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Grid WGSL"),
            source: wgpu::ShaderSource::Wgsl(GRID_WGSL.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Grid Pipeline Layout"),
            bind_group_layouts: &[scene_layout],
            push_constant_ranges: &[],
        });

        const ATTRS: [wgpu::VertexAttribute; 2] =
            wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Grid Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<GridVertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &ATTRS,
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
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
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_fmt,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Self {
            pipeline,
            vb,
            vertex_count: vertices.len() as u32,
        }
    }

    pub fn draw<'a>(&'a self, rpass: &mut wgpu::RenderPass<'a>, scene: &'a wgpu::BindGroup) {
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, scene, &[]);
        rpass.set_vertex_buffer(0, self.vb.slice(..));
        rpass.draw(0..self.vertex_count, 0..1);
    }

    pub fn release(&self) {
        self.vb.destroy();
    }
}

pub const GRID_WGSL: &str = r#"
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

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) color: vec3<f32>,
};

@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) color: vec3<f32>) -> VsOut {
    var out: VsOut;
    out.clip = S.view_proj * vec4<f32>(position, 1.0);
    out.color = color;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    return vec4<f32>(in.color, 1.0);
}
"#;
