// Instanced, lit marker spheres.

use crate::data::icosphere::icosphere;
use crate::data::types::{GlowInstance, MarkerInstance, MeshVertex};
use crate::markers::{MARKER_COLOR, MARKER_EMISSIVE, MARKER_ROUGHNESS, SPHERE_DETAIL};
use super::hex_to_linear;
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MarkerMaterialStd140 {
    pub base_color: [f32; 3], // linear
    pub roughness: f32,       // -> 16
    pub emissive: [f32; 3],   // linear
    pub _pad0: f32,           // -> 32
}

const _: [(); 32] = [(); core::mem::size_of::<MarkerMaterialStd140>()];

/// Instance and glow buffers for the current marker set, sized exactly to it.
#[derive(Debug)]
pub struct MarkerGpu {
    pub instances: wgpu::Buffer,
    pub glows: wgpu::Buffer,
    pub len: u32,
}

impl MarkerGpu {
    /// `None` for an empty set: nothing is allocated.
    pub fn upload(
        device: &wgpu::Device,
        instances: &[MarkerInstance],
        glows: &[GlowInstance],
    ) -> Option<Self> {
        if instances.is_empty() {
            return None;
        }
        let instances_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Marker Instances"),
            contents: bytemuck::cast_slice(instances),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        let glows_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Marker Glow Instances"),
            contents: bytemuck::cast_slice(glows),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Some(Self {
            instances: instances_buf,
            glows: glows_buf,
            len: instances.len() as u32,
        })
    }

    /// Overwrites the transforms in place. Returns false on a count mismatch.
    pub fn rewrite(&self, queue: &wgpu::Queue, instances: &[MarkerInstance]) -> bool {
        if instances.len() != self.len as usize {
            return false;
        }
        queue.write_buffer(&self.instances, 0, bytemuck::cast_slice(instances));
        true
    }

    pub fn release(self) {
        self.instances.destroy();
        self.glows.destroy();
    }
}

pub struct MarkerPipeline {
    pipeline: wgpu::RenderPipeline,
    material_bind: wgpu::BindGroup,
    material_ubo: wgpu::Buffer,
    mesh_vb: wgpu::Buffer,
    mesh_ib: wgpu::Buffer,
    index_count: u32,
}

impl MarkerPipeline {
    pub fn new(
        device: &wgpu::Device,
        scene_layout: &wgpu::BindGroupLayout,
        color_fmt: wgpu::TextureFormat,
        depth_fmt: wgpu::TextureFormat,
    ) -> Self {
        let (vertices, indices) = icosphere(SPHERE_DETAIL);

        let mesh_vb = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Marker Sphere VB"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let mesh_ib = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Marker Sphere IB"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let material = MarkerMaterialStd140 {
            base_color: hex_to_linear(MARKER_COLOR),
            roughness: MARKER_ROUGHNESS,
            emissive: hex_to_linear(MARKER_EMISSIVE),
            _pad0: 0.0,
        };
        let material_ubo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Marker Material UBO"),
            contents: bytemuck::bytes_of(&material),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Marker Material Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let material_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Marker Material BindGroup"),
            layout: &material_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: material_ubo.as_entire_binding(),
            }],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Marker WGSL"),
            source: wgpu::ShaderSource::Wgsl(MARKER_WGSL.into()),
        });

        const MESH_ATTRS: [wgpu::VertexAttribute; 2] =
            wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];
        const INSTANCE_ATTRS: [wgpu::VertexAttribute; 4] =
            wgpu::vertex_attr_array![2 => Float32x4, 3 => Float32x4, 4 => Float32x4, 5 => Float32x4];

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Marker PipelineLayout"),
            bind_group_layouts: &[scene_layout, &material_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Marker Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<MeshVertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &MESH_ATTRS,
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<MarkerInstance>() as u64,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &INSTANCE_ATTRS,
                    },
                ],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
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

        Self {
            pipeline,
            material_bind,
            material_ubo,
            mesh_vb,
            mesh_ib,
            index_count: indices.len() as u32,
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
        rpass.set_bind_group(1, &self.material_bind, &[]);
        rpass.set_vertex_buffer(0, self.mesh_vb.slice(..));
        rpass.set_vertex_buffer(1, markers.instances.slice(..));
        rpass.set_index_buffer(self.mesh_ib.slice(..), wgpu::IndexFormat::Uint16);
        rpass.draw_indexed(0..self.index_count, 0, 0..markers.len);
    }

    /// Releases the shared sphere mesh and material.
    pub fn release(&self) {
        self.mesh_vb.destroy();
        self.mesh_ib.destroy();
        self.material_ubo.destroy();
    }
}

pub const MARKER_WGSL: &str = r#"
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

struct Material {
    base_color: vec3<f32>,
    roughness: f32,
    emissive: vec3<f32>,
    _pad0: f32,
};
@group(1) @binding(0) var<uniform> M: Material;

struct VsIn {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) m0: vec4<f32>,
    @location(3) m1: vec4<f32>,
    @location(4) m2: vec4<f32>,
    @location(5) m3: vec4<f32>,
};

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) normal: vec3<f32>,
    @location(1) world_pos: vec3<f32>,
};

@vertex
fn vs_main(in: VsIn) -> VsOut {
    var out: VsOut;
    let model = S.world * mat4x4<f32>(in.m0, in.m1, in.m2, in.m3);
    let world_pos = model * vec4<f32>(in.position, 1.0);
    out.clip = S.view_proj * world_pos;
    // Uniform scale: the model matrix keeps normals perpendicular.
    out.normal = (model * vec4<f32>(in.normal, 0.0)).xyz;
    out.world_pos = world_pos.xyz;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    let n = normalize(in.normal);
    let l = S.light_dir;
    let ndl = max(dot(n, l), 0.0);

    // Blinn-Phong lobe whose width follows roughness.
    let v = normalize(S.camera_pos - in.world_pos);
    let shininess = 2.0 / max(M.roughness * M.roughness, 1e-3) - 2.0;
    let h = normalize(l + v);
    let spec = pow(max(dot(n, h), 0.0), shininess) * (1.0 - M.roughness) * 0.25;

    let lit = M.base_color * (S.ambient + ndl) + vec3<f32>(spec) * ndl + M.emissive;
    return vec4<f32>(lit, 1.0);
}
"#;
